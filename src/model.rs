use crate::codec::{self, CalendarDate, ParseError};
use chrono::Days;
use std::io;
use std::path::PathBuf;

/// One day's note as read from the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteFile {
    pub date: CalendarDate,
    pub path: PathBuf,
    pub content: String,
    pub exists_on_disk: bool,
}

/// A `##` heading found in a note. Derived from disk, never stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TodoEntry {
    pub source_date: CalendarDate,
    /// 1-based line within the source note.
    pub line_number: usize,
    pub text: String,
    pub done: bool,
}

/// A ranked search hit. Derived from disk, never stored.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchResult {
    pub source_date: CalendarDate,
    /// 1-based line within the source note.
    pub line_number: usize,
    pub snippet: String,
    pub match_score: f64,
    /// Edit distance of the best match, 0 for a substring hit.
    pub distance: usize,
}

/// Zero-based (line, column) position inside a note buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Cursor {
    pub line: usize,
    pub column: usize,
}

impl Cursor {
    /// First body line, directly below the date heading.
    pub const BODY_START: Cursor = Cursor { line: 1, column: 0 };

    pub fn new(line: usize, column: usize) -> Self {
        Cursor { line, column }
    }

    /// Clamps the cursor so it points inside `text`.
    pub fn clamped_to(self, text: &str) -> Cursor {
        let lines: Vec<&str> = text.split('\n').collect();
        let line = self.line.min(lines.len().saturating_sub(1));
        let width = lines.get(line).map(|l| l.chars().count()).unwrap_or(0);
        Cursor {
            line,
            column: self.column.min(width),
        }
    }
}

/// Events the core emits for the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    /// The note for this date changed on disk; reload it if displayed.
    ContentChanged(CalendarDate),
    TodoIndexUpdated,
    SearchIndexUpdated,
    WriteFailed { date: CalendarDate, reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Jump {
    NextDay,
    PrevDay,
    NextWeek,
    PrevWeek,
    Today,
}

impl Jump {
    pub fn apply(self, from: CalendarDate, today: CalendarDate) -> CalendarDate {
        let shifted = match self {
            Jump::NextDay => from.checked_add_days(Days::new(1)),
            Jump::PrevDay => from.checked_sub_days(Days::new(1)),
            Jump::NextWeek => from.checked_add_days(Days::new(7)),
            Jump::PrevWeek => from.checked_sub_days(Days::new(7)),
            Jump::Today => Some(today),
        };
        shifted.filter(|date| codec::is_supported(*date)).unwrap_or(from)
    }
}

#[derive(thiserror::Error, Debug)]
pub enum NoteError {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error("{action} {}: {source}", .path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("no open todo on line {line} of {date}")]
    NotFound { date: CalendarDate, line: usize },
}

impl NoteError {
    pub fn io(action: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        NoteError::Io {
            action,
            path: path.into(),
            source,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, NoteError::NotFound { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn date(y: i32, m: u32, d: u32) -> CalendarDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn jumps_shift_by_days_and_weeks() {
        let from = date(2025, 11, 21);
        let today = date(2026, 1, 2);
        assert_eq!(Jump::NextDay.apply(from, today), date(2025, 11, 22));
        assert_eq!(Jump::PrevDay.apply(from, today), date(2025, 11, 20));
        assert_eq!(Jump::NextWeek.apply(from, today), date(2025, 11, 28));
        assert_eq!(Jump::PrevWeek.apply(from, today), date(2025, 11, 14));
        assert_eq!(Jump::Today.apply(from, today), today);
        assert_eq!(Jump::NextDay.apply(date(2025, 12, 31), today), date(2026, 1, 1));
    }

    #[test]
    fn jumps_stay_inside_four_digit_years() {
        let today = date(2025, 11, 21);
        let last = date(9999, 12, 31);
        let first = date(1, 1, 1);
        assert_eq!(Jump::NextDay.apply(last, today), last);
        assert_eq!(Jump::NextWeek.apply(date(9999, 12, 28), today), date(9999, 12, 28));
        assert_eq!(Jump::PrevDay.apply(first, today), first);
        assert_eq!(Jump::PrevWeek.apply(date(1, 1, 3), today), date(1, 1, 3));
        assert_eq!(Jump::PrevDay.apply(date(1, 1, 2), today), first);
    }

    #[test]
    fn cursor_clamps_into_text() {
        let text = "# head\n\nabc";
        assert_eq!(Cursor::new(9, 9).clamped_to(text), Cursor::new(2, 3));
        assert_eq!(Cursor::new(0, 2).clamped_to(text), Cursor::new(0, 2));
        assert_eq!(Cursor::new(1, 4).clamped_to(text), Cursor::new(1, 0));
        assert_eq!(Cursor::BODY_START.clamped_to(""), Cursor::new(0, 0));
    }

    #[test]
    fn io_errors_name_the_path() {
        let err = NoteError::io(
            "writing",
            "/tmp/notes/01-Jan-2025.md",
            io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        );
        let text = err.to_string();
        assert!(text.contains("writing"));
        assert!(text.contains("01-Jan-2025.md"));
        assert!(!err.is_not_found());
    }
}
