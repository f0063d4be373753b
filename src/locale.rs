use chrono::Weekday;
use serde::{Deserialize, Serialize};

/// Language used for filenames and note headings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
pub enum Language {
    #[default]
    #[serde(rename = "en")]
    #[value(name = "en")]
    English,
    #[serde(rename = "nb")]
    #[value(name = "nb")]
    Norwegian,
}

const EN_MONTH_ABBREV: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];
const NB_MONTH_ABBREV: [&str; 12] = [
    "jan", "feb", "mar", "apr", "mai", "jun", "jul", "aug", "sep", "okt", "nov", "des",
];
const EN_MONTHS: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];
const NB_MONTHS: [&str; 12] = [
    "januar",
    "februar",
    "mars",
    "april",
    "mai",
    "juni",
    "juli",
    "august",
    "september",
    "oktober",
    "november",
    "desember",
];
const EN_WEEKDAYS: [&str; 7] = [
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
    "Sunday",
];
const NB_WEEKDAYS: [&str; 7] = [
    "mandag", "tirsdag", "onsdag", "torsdag", "fredag", "lørdag", "søndag",
];
const EN_WEEKDAY_SHORT: [&str; 7] = ["Mo", "Tu", "We", "Th", "Fr", "Sa", "Su"];
const NB_WEEKDAY_SHORT: [&str; 7] = ["ma", "ti", "on", "to", "fr", "lø", "sø"];

impl Language {
    pub fn code(&self) -> &'static str {
        match self {
            Language::English => "en",
            Language::Norwegian => "nb",
        }
    }

    /// Three-letter month abbreviation used in filenames. `month` is 1-based.
    pub fn month_abbrev(&self, month: u32) -> &'static str {
        self.month_abbrevs()[month_index(month)]
    }

    pub fn month_abbrevs(&self) -> &'static [&'static str; 12] {
        match self {
            Language::English => &EN_MONTH_ABBREV,
            Language::Norwegian => &NB_MONTH_ABBREV,
        }
    }

    /// Looks up a month by its exact abbreviation, returning the 1-based month.
    pub fn month_from_abbrev(&self, abbrev: &str) -> Option<u32> {
        self.month_abbrevs()
            .iter()
            .position(|candidate| *candidate == abbrev)
            .map(|idx| idx as u32 + 1)
    }

    pub fn month_name(&self, month: u32) -> &'static str {
        let names = match self {
            Language::English => &EN_MONTHS,
            Language::Norwegian => &NB_MONTHS,
        };
        names[month_index(month)]
    }

    pub fn weekday_name(&self, weekday: Weekday) -> &'static str {
        let names = match self {
            Language::English => &EN_WEEKDAYS,
            Language::Norwegian => &NB_WEEKDAYS,
        };
        names[weekday.num_days_from_monday() as usize]
    }

    /// Two-letter weekday headers, Monday first.
    pub fn weekday_headers(&self) -> &'static [&'static str; 7] {
        match self {
            Language::English => &EN_WEEKDAY_SHORT,
            Language::Norwegian => &NB_WEEKDAY_SHORT,
        }
    }
}

fn month_index(month: u32) -> usize {
    (month.clamp(1, 12) - 1) as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn abbreviations_are_three_chars_and_unique() {
        for lang in [Language::English, Language::Norwegian] {
            let abbrevs = lang.month_abbrevs();
            for (idx, abbrev) in abbrevs.iter().enumerate() {
                assert_eq!(abbrev.chars().count(), 3, "{abbrev}");
                assert_eq!(lang.month_from_abbrev(abbrev), Some(idx as u32 + 1));
            }
        }
    }

    #[test]
    fn month_lookup_is_language_specific() {
        assert_eq!(Language::English.month_from_abbrev("Oct"), Some(10));
        assert_eq!(Language::English.month_from_abbrev("okt"), None);
        assert_eq!(Language::Norwegian.month_from_abbrev("okt"), Some(10));
        assert_eq!(Language::Norwegian.month_from_abbrev("Oct"), None);
    }

    #[test]
    fn names_follow_language() {
        assert_eq!(Language::English.weekday_name(Weekday::Fri), "Friday");
        assert_eq!(Language::Norwegian.weekday_name(Weekday::Sat), "lørdag");
        assert_eq!(Language::Norwegian.month_name(12), "desember");
    }
}
