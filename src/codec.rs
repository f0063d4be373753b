use crate::locale::Language;
use chrono::{Datelike, NaiveDate};

/// The key of a daily note. Supported years are 0001 through 9999.
pub type CalendarDate = NaiveDate;

pub const NOTE_EXTENSION: &str = ".md";
pub const MIN_YEAR: i32 = 1;
pub const MAX_YEAR: i32 = 9999;

/// True when `date` has a four-digit year and so a decodable filename.
pub fn is_supported(date: CalendarDate) -> bool {
    (MIN_YEAR..=MAX_YEAR).contains(&date.year())
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("not a note file (expected .md extension): {0}")]
    Extension(String),
    #[error("expected DD-Mon-YYYY.md: {0}")]
    Shape(String),
    #[error("day is not two digits: {0}")]
    Day(String),
    #[error("year is not four digits: {0}")]
    Year(String),
    #[error("unknown month abbreviation `{month}` in {name}")]
    Month { name: String, month: String },
    #[error("no such calendar date: {0}")]
    InvalidDate(String),
}

/// Maps dates to note filenames of the form `DD-Mon-YYYY.md` and back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateCodec {
    language: Language,
}

impl DateCodec {
    pub fn new(language: Language) -> Self {
        DateCodec { language }
    }

    pub fn language(&self) -> Language {
        self.language
    }

    pub fn encode(&self, date: CalendarDate) -> String {
        format!("{}{}", self.stem(date), NOTE_EXTENSION)
    }

    /// Filename without the extension, e.g. `21-Nov-2025`.
    pub fn stem(&self, date: CalendarDate) -> String {
        format!(
            "{:02}-{}-{:04}",
            date.day(),
            self.language.month_abbrev(date.month()),
            date.year()
        )
    }

    pub fn decode(&self, filename: &str) -> Result<CalendarDate, ParseError> {
        let stem = filename
            .strip_suffix(NOTE_EXTENSION)
            .ok_or_else(|| ParseError::Extension(filename.to_string()))?;
        self.decode_stem(stem)
            .map_err(|err| err.with_name(filename.to_string()))
    }

    pub fn decode_stem(&self, stem: &str) -> Result<CalendarDate, ParseError> {
        let mut parts = stem.split('-');
        let (day, month, year) = match (parts.next(), parts.next(), parts.next(), parts.next()) {
            (Some(d), Some(m), Some(y), None) => (d, m, y),
            _ => return Err(ParseError::Shape(stem.to_string())),
        };
        if day.len() != 2 || !day.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ParseError::Day(stem.to_string()));
        }
        if year.len() != 4 || !year.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ParseError::Year(stem.to_string()));
        }
        let month_num =
            self.language
                .month_from_abbrev(month)
                .ok_or_else(|| ParseError::Month {
                    name: stem.to_string(),
                    month: month.to_string(),
                })?;
        let day_num: u32 = day
            .parse()
            .map_err(|_| ParseError::Day(stem.to_string()))?;
        let year_num: i32 = year
            .parse()
            .map_err(|_| ParseError::Year(stem.to_string()))?;
        NaiveDate::from_ymd_opt(year_num, month_num, day_num)
            .ok_or_else(|| ParseError::InvalidDate(stem.to_string()))
    }

    /// Heading line for a date, e.g. `# Friday, 21 November 2025`.
    pub fn heading(&self, date: CalendarDate) -> String {
        format!(
            "# {}, {:02} {} {:04}",
            self.language.weekday_name(date.weekday()),
            date.day(),
            self.language.month_name(date.month()),
            date.year()
        )
    }

    /// Content of a note that has never been written: heading plus a blank line.
    pub fn default_content(&self, date: CalendarDate) -> String {
        format!("{}\n\n", self.heading(date))
    }

    /// Short human form used in status lines and listings, e.g. `21 Nov 2025`.
    pub fn display(&self, date: CalendarDate) -> String {
        format!(
            "{:02} {} {:04}",
            date.day(),
            self.language.month_abbrev(date.month()),
            date.year()
        )
    }
}

impl ParseError {
    fn with_name(self, name: String) -> Self {
        match self {
            ParseError::Shape(_) => ParseError::Shape(name),
            ParseError::Day(_) => ParseError::Day(name),
            ParseError::Year(_) => ParseError::Year(name),
            ParseError::Month { month, .. } => ParseError::Month { name, month },
            ParseError::InvalidDate(_) => ParseError::InvalidDate(name),
            ParseError::Extension(_) => ParseError::Extension(name),
        }
    }
}
