//! Line-level search over every note.
//!
//! Each non-blank line is kept with its date and line number. A query matches
//! a line case-insensitively either as a substring or, for queries of at
//! least [`MIN_FUZZY_CHARS`] characters, within a small edit distance of some
//! substring of the line.

use crate::codec::CalendarDate;
use crate::model::{NoteFile, SearchResult};

pub const MIN_FUZZY_CHARS: usize = 3;
const SNIPPET_CHARS: usize = 80;
const ELLIPSIS: char = '…';

#[derive(Debug, Clone)]
struct IndexedLine {
    date: CalendarDate,
    line_number: usize,
    text: String,
    folded: Vec<char>,
}

#[derive(Debug, Clone, Default)]
pub struct SearchIndex {
    lines: Vec<IndexedLine>,
}

impl SearchIndex {
    pub fn rebuild(notes: &[NoteFile]) -> Self {
        let mut lines = Vec::new();
        for note in notes {
            for (idx, raw) in note.content.split('\n').enumerate() {
                let text = raw.trim();
                if text.is_empty() {
                    continue;
                }
                lines.push(IndexedLine {
                    date: note.date,
                    line_number: idx + 1,
                    text: text.to_string(),
                    folded: fold(text),
                });
            }
        }
        SearchIndex { lines }
    }

    /// Number of indexed lines.
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Ranked hits for `text`: substring matches first, then fuzzy matches by
    /// edit distance, then newest date, then line number.
    pub fn query(&self, text: &str) -> Vec<SearchResult> {
        let needle = fold(text.trim());
        if needle.is_empty() {
            return Vec::new();
        }
        let max_distance = max_distance(needle.len());
        let mut results: Vec<SearchResult> = self
            .lines
            .iter()
            .filter_map(|line| {
                let (distance, end) = best_match(&needle, &line.folded, max_distance)?;
                let start = end.saturating_sub(needle.len());
                Some(SearchResult {
                    source_date: line.date,
                    line_number: line.line_number,
                    snippet: snippet(&line.text, start),
                    match_score: 1.0 - distance as f64 / needle.len() as f64,
                    distance,
                })
            })
            .collect();
        results.sort_by(|a, b| {
            b.match_score
                .total_cmp(&a.match_score)
                .then(a.distance.cmp(&b.distance))
                .then(b.source_date.cmp(&a.source_date))
                .then(a.line_number.cmp(&b.line_number))
        });
        results
    }
}

/// Lowercases char by char, keeping one folded char per source char so match
/// offsets index the original text too.
fn fold(text: &str) -> Vec<char> {
    text.chars()
        .map(|ch| ch.to_lowercase().next().unwrap_or(ch))
        .collect()
}

/// Edit budget for a query of `len` characters.
fn max_distance(len: usize) -> usize {
    if len < MIN_FUZZY_CHARS {
        0
    } else {
        (len / 3).max(1)
    }
}

/// Smallest edit distance between `needle` and any substring of `hay`, with
/// the char offset where that substring ends. `None` when over `max_distance`.
fn best_match(needle: &[char], hay: &[char], max_distance: usize) -> Option<(usize, usize)> {
    if let Some(pos) = find_exact(needle, hay) {
        return Some((0, pos + needle.len()));
    }
    if max_distance == 0 {
        return None;
    }
    let distance_and_end = substring_distance(needle, hay);
    match distance_and_end {
        (distance, end) if distance <= max_distance => Some((distance, end)),
        _ => None,
    }
}

fn find_exact(needle: &[char], hay: &[char]) -> Option<usize> {
    if needle.len() > hay.len() {
        return None;
    }
    hay.windows(needle.len()).position(|window| window == needle)
}

/// Approximate substring matching: the first row of the edit table is zero so
/// the match may start anywhere in `hay`.
fn substring_distance(needle: &[char], hay: &[char]) -> (usize, usize) {
    let m = needle.len();
    let mut col: Vec<usize> = (0..=m).collect();
    let mut best = (m, 0);
    for (j, &hc) in hay.iter().enumerate() {
        let mut diag = col[0];
        col[0] = 0;
        for i in 1..=m {
            let left = col[i];
            let cost = if needle[i - 1] == hc { 0 } else { 1 };
            col[i] = (col[i - 1] + 1).min(left + 1).min(diag + cost);
            diag = left;
        }
        if col[m] < best.0 {
            best = (col[m], j + 1);
        }
    }
    best
}

/// Bounded window of `text` around char offset `start`.
fn snippet(text: &str, start: usize) -> String {
    let chars: Vec<char> = text.chars().collect();
    if chars.len() <= SNIPPET_CHARS {
        return text.to_string();
    }
    let start = start.min(chars.len());
    let lead = SNIPPET_CHARS / 4;
    let from = start
        .saturating_sub(lead)
        .min(chars.len() - SNIPPET_CHARS);
    let to = from + SNIPPET_CHARS;
    let mut out = String::new();
    if from > 0 {
        out.push(ELLIPSIS);
    }
    out.extend(&chars[from..to]);
    if to < chars.len() {
        out.push(ELLIPSIS);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::path::PathBuf;

    fn date(y: i32, m: u32, d: u32) -> CalendarDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn note(date: CalendarDate, content: &str) -> NoteFile {
        NoteFile {
            date,
            path: PathBuf::from(format!("{date}.md")),
            content: content.to_string(),
            exists_on_disk: true,
        }
    }

    fn corpus() -> SearchIndex {
        SearchIndex::rebuild(&[
            note(date(2025, 11, 20), "# Thursday\n\n## Buy milk\nCall dentist"),
            note(date(2025, 11, 21), "# Friday\n\nmilkshake with Mia\nsimilar thing"),
        ])
    }

    #[test]
    fn empty_queries_return_nothing() {
        let index = corpus();
        assert!(index.query("").is_empty());
        assert!(index.query("   ").is_empty());
    }

    #[test]
    fn zero_notes_is_an_empty_corpus() {
        let index = SearchIndex::rebuild(&[]);
        assert!(index.is_empty());
        assert!(index.query("milk").is_empty());
    }

    #[test]
    fn blank_lines_are_not_indexed() {
        let index = SearchIndex::rebuild(&[note(date(2025, 1, 1), "# h\n\n  \nbody\n")]);
        assert_eq!(index.len(), 2);
    }

    #[test]
    fn substring_hits_rank_first_and_newest_wins_ties() {
        let hits = corpus().query("MILK");
        assert!(hits.len() >= 2);
        assert_eq!(hits[0].snippet, "milkshake with Mia");
        assert_eq!(hits[0].source_date, date(2025, 11, 21));
        assert_eq!(hits[0].line_number, 3);
        assert_eq!(hits[1].snippet, "## Buy milk");
        assert_eq!(hits[1].line_number, 3);
        assert_eq!(hits[0].match_score, 1.0);
        assert_eq!(hits[1].match_score, 1.0);
        for fuzzy in &hits[2..] {
            assert!(fuzzy.distance > 0);
            assert!(fuzzy.match_score < 1.0);
        }
    }

    #[test]
    fn exact_hits_beat_fuzzy_ones() {
        let index = SearchIndex::rebuild(&[
            note(date(2025, 11, 22), "## Buy mlk"),
            note(date(2025, 11, 20), "## Buy milk\nCall dentist"),
        ]);
        let hits = index.query("milk");
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].snippet, "## Buy milk");
        assert_eq!(hits[0].distance, 0);
        assert_eq!(hits[1].snippet, "## Buy mlk");
        assert_eq!(hits[1].distance, 1);
        assert!(hits[0].match_score > hits[1].match_score);
    }

    #[test]
    fn no_match_returns_nothing() {
        let index = SearchIndex::rebuild(&[note(date(2025, 1, 1), "# head\nCall dentist\nwalk")]);
        assert!(index.query("milk").is_empty());
        assert!(index.query("zebra crossing").is_empty());
    }

    #[test]
    fn short_queries_are_substring_only() {
        let index = SearchIndex::rebuild(&[note(date(2025, 1, 1), "ab\nxy")]);
        assert_eq!(index.query("ab").len(), 1);
        assert!(index.query("ac").is_empty());
    }

    #[test]
    fn edit_distance_orders_fuzzy_hits() {
        let index = SearchIndex::rebuild(&[note(
            date(2025, 1, 1),
            "dentistry\ndentst\ndntst appointment",
        )]);
        let hits = index.query("dentist");
        let order: Vec<_> = hits.iter().map(|h| (h.line_number, h.distance)).collect();
        assert_eq!(order, vec![(1, 0), (2, 1), (3, 2)]);
    }

    #[test]
    fn long_lines_are_windowed_around_the_match() {
        let line = format!("{} needle {}", "a".repeat(200), "b".repeat(200));
        let index = SearchIndex::rebuild(&[note(date(2025, 1, 1), &line)]);
        let hit = &index.query("needle")[0];
        assert!(hit.snippet.contains("needle"));
        assert!(hit.snippet.starts_with(ELLIPSIS));
        assert!(hit.snippet.ends_with(ELLIPSIS));
        assert_eq!(hit.snippet.chars().count(), SNIPPET_CHARS + 2);
    }

    #[test]
    fn expanding_lowercase_does_not_shift_the_snippet() {
        let line = format!("{} needle {}", "İ".repeat(200), "b".repeat(200));
        assert_eq!(fold(&line).len(), line.chars().count());
        let index = SearchIndex::rebuild(&[note(date(2025, 1, 1), &line)]);
        let hit = &index.query("needle")[0];
        assert_eq!(hit.distance, 0);
        assert!(hit.snippet.contains("needle"));
        assert_eq!(index.query("iii").len(), 1);
    }

    #[test]
    fn substring_distance_finds_best_window() {
        let q: Vec<char> = "milk".chars().collect();
        assert_eq!(substring_distance(&q, &fold("buy milk")), (0, 8));
        assert_eq!(substring_distance(&q, &fold("buy mlk")).0, 1);
        assert_eq!(substring_distance(&q, &fold("")), (4, 0));
    }
}
