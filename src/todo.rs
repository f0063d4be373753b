//! Task headings collected from every note.
//!
//! A task is a line whose first non-blank characters are exactly `##`. Lines
//! with three or more markers are ordinary section headings. A task is done
//! when its text is wrapped in `~~`, so completing one only rewrites the line.

use crate::codec::CalendarDate;
use crate::model::{NoteError, NoteFile, TodoEntry};
use crate::storage::NoteStore;
use log::info;

const TASK_MARKER: &str = "##";
const STRIKE: &str = "~~";

/// A classified task line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task<'a> {
    /// Text shown to the user, without markers or strikethrough.
    pub text: &'a str,
    pub done: bool,
}

/// Classifies a single line. Returns `None` for anything that is not a task.
pub fn classify(line: &str) -> Option<Task<'_>> {
    let rest = line.trim_start().strip_prefix(TASK_MARKER)?;
    if rest.starts_with('#') {
        return None;
    }
    let text = rest.trim();
    match struck_inner(text) {
        Some(inner) => Some(Task {
            text: inner,
            done: true,
        }),
        None => Some(Task { text, done: false }),
    }
}

fn struck_inner(text: &str) -> Option<&str> {
    let inner = text.strip_prefix(STRIKE)?.strip_suffix(STRIKE)?;
    if inner.is_empty() {
        None
    } else {
        Some(inner)
    }
}

/// Rewrites an open task line as a completed one, keeping its indentation and
/// any trailing carriage return. Returns `None` when the line is not an open
/// task, or when it has no text: `## ~~~~` would read back as open.
pub fn complete_line(line: &str) -> Option<String> {
    let task = classify(line)?;
    if task.done || task.text.is_empty() {
        return None;
    }
    let indent_len = line.len() - line.trim_start().len();
    let indent = &line[..indent_len];
    let eol = if line.ends_with('\r') { "\r" } else { "" };
    Some(format!("{indent}{TASK_MARKER} {STRIKE}{}{STRIKE}{eol}", task.text))
}

/// Every task in one note, in line order.
pub fn scan(date: CalendarDate, content: &str) -> Vec<TodoEntry> {
    content
        .split('\n')
        .enumerate()
        .filter_map(|(idx, line)| {
            classify(line).map(|task| TodoEntry {
                source_date: date,
                line_number: idx + 1,
                text: task.text.to_string(),
                done: task.done,
            })
        })
        .collect()
}

pub fn filter_open(entries: &[TodoEntry]) -> Vec<TodoEntry> {
    entries.iter().filter(|e| !e.done).cloned().collect()
}

/// Snapshot of all tasks across the collection, ordered by date then line.
#[derive(Debug, Clone, Default)]
pub struct TodoIndex {
    entries: Vec<TodoEntry>,
}

impl TodoIndex {
    pub fn rebuild(notes: &[NoteFile]) -> Self {
        let mut entries: Vec<TodoEntry> = notes
            .iter()
            .flat_map(|note| scan(note.date, &note.content))
            .collect();
        entries.sort_by(|a, b| {
            a.source_date
                .cmp(&b.source_date)
                .then(a.line_number.cmp(&b.line_number))
        });
        TodoIndex { entries }
    }

    pub fn entries(&self) -> &[TodoEntry] {
        &self.entries
    }

    pub fn open(&self) -> Vec<TodoEntry> {
        filter_open(&self.entries)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Strikes through the open task on `line_number` (1-based) of `date` and saves
/// the note. Fails with `NotFound` when that line is no longer an open task,
/// which includes a task that is already done.
pub fn mark_done(
    store: &NoteStore,
    date: CalendarDate,
    line_number: usize,
) -> Result<TodoEntry, NoteError> {
    let not_found = || NoteError::NotFound {
        date,
        line: line_number,
    };
    let note = store.load(date)?;
    if !note.exists_on_disk || line_number == 0 {
        return Err(not_found());
    }
    let lines: Vec<&str> = note.content.split('\n').collect();
    let idx = line_number - 1;
    let current = lines.get(idx).copied().ok_or_else(not_found)?;
    let rewritten = complete_line(current).ok_or_else(not_found)?;
    let text = classify(current).map(|t| t.text.to_string()).unwrap_or_default();
    let updated: Vec<&str> = lines
        .iter()
        .enumerate()
        .map(|(i, line)| if i == idx { rewritten.as_str() } else { *line })
        .collect();
    store.write(date, &updated.join("\n"))?;
    info!("event=todo_done date={} line={}", date, line_number);
    Ok(TodoEntry {
        source_date: date,
        line_number,
        text,
        done: true,
    })
}

/// Like [`mark_done`], but when the indexed line moved since the last scan it
/// falls back to the first open task in the same note with identical text.
pub fn mark_entry_done(store: &NoteStore, entry: &TodoEntry) -> Result<TodoEntry, NoteError> {
    let content = store.read(entry.source_date)?;
    let lines: Vec<&str> = content.split('\n').collect();
    let still_there = lines
        .get(entry.line_number.wrapping_sub(1))
        .and_then(|line| classify(line))
        .map(|task| !task.done && task.text == entry.text)
        .unwrap_or(false);
    if still_there {
        return mark_done(store, entry.source_date, entry.line_number);
    }
    let moved = lines.iter().position(|line| {
        classify(line)
            .map(|task| !task.done && task.text == entry.text)
            .unwrap_or(false)
    });
    match moved {
        Some(idx) => mark_done(store, entry.source_date, idx + 1),
        None => Err(NoteError::NotFound {
            date: entry.source_date,
            line: entry.line_number,
        }),
    }
}
