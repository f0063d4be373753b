use crate::codec::{self, CalendarDate, DateCodec, MAX_YEAR, MIN_YEAR, NOTE_EXTENSION};
use crate::config::Config;
use crate::model::{Jump, SearchResult, TodoEntry};
use crate::storage::NoteStore;
use crate::sync::{EditorSession, RebuildMode, SyncCoordinator};
use crate::ui;
use anyhow::{bail, Context, Result};
use chrono::{Local, NaiveDate};
use std::io::{self, Read};

pub fn show(config: &Config, date: Option<String>) -> Result<()> {
    let store = open_store(config);
    let date = resolve_date(date.as_deref(), store.codec())?;
    let content = store
        .read(date)
        .with_context(|| format!("reading note for {}", date))?;
    print!("{}", content);
    if !content.ends_with('\n') {
        println!();
    }
    Ok(())
}

pub fn write(config: &Config, date: Option<String>) -> Result<()> {
    let store = open_store(config);
    let date = resolve_date(date.as_deref(), store.codec())?;
    let mut content = String::new();
    io::stdin()
        .read_to_string(&mut content)
        .context("reading note text from stdin")?;
    store
        .write(date, &content)
        .with_context(|| format!("writing note for {}", date))?;
    println!("Wrote {}", store.path_for(date).display());
    Ok(())
}

pub fn todos(config: &Config, all: bool) -> Result<()> {
    let sync = indexed(config);
    let entries = if all {
        sync.todos().entries().to_vec()
    } else {
        sync.list_open_todos()
    };
    if entries.is_empty() {
        println!("No {}todos", if all { "" } else { "open " });
    }
    for entry in &entries {
        println!("{}", format_todo(sync.store().codec(), entry));
    }
    Ok(())
}

pub fn done(config: &Config, date: String, line: usize) -> Result<()> {
    let mut sync = SyncCoordinator::new(open_store(config), RebuildMode::Inline);
    let codec = *sync.store().codec();
    let date = resolve_date(Some(&date), &codec)?;
    let entry = sync
        .mark_todo_done(&mut EditorSession::new(), date, line)
        .with_context(|| format!("marking line {} of {} done", line, codec.stem(date)))?;
    println!("Done: {}", entry.text);
    Ok(())
}

pub fn search(config: &Config, query: String, limit: Option<usize>) -> Result<()> {
    let sync = indexed(config);
    let hits = sync.search(&query);
    if hits.is_empty() {
        println!("No matches for {:?}", query);
        return Ok(());
    }
    let limit = limit.unwrap_or(config.search_limit);
    for hit in hits.iter().take(limit) {
        println!("{}", format_hit(sync.store().codec(), hit));
    }
    if hits.len() > limit {
        println!("({} more)", hits.len() - limit);
    }
    Ok(())
}

pub fn list(config: &Config) -> Result<()> {
    let store = open_store(config);
    let notes = store
        .list_all()
        .with_context(|| format!("listing {}", store.dir().display()))?;
    if notes.is_empty() {
        println!("No notes in {}", store.dir().display());
    }
    for (date, path) in notes {
        println!("{}  {}", date, path.display());
    }
    Ok(())
}

pub fn path(config: &Config, date: Option<String>) -> Result<()> {
    let store = open_store(config);
    let date = resolve_date(date.as_deref(), store.codec())?;
    println!("{}", store.path_for(date).display());
    Ok(())
}

pub fn tui(config: &Config) -> Result<()> {
    let mode = if config.background_rebuild {
        RebuildMode::Background
    } else {
        RebuildMode::Inline
    };
    let sync = SyncCoordinator::new(open_store(config), mode);
    ui::run(sync, config.search_limit)
}

pub fn today() -> CalendarDate {
    Local::now().date_naive()
}

fn open_store(config: &Config) -> NoteStore {
    NoteStore::new(&config.notes_dir, DateCodec::new(config.language))
}

fn indexed(config: &Config) -> SyncCoordinator {
    let mut sync = SyncCoordinator::new(open_store(config), RebuildMode::Inline);
    sync.request_rebuild();
    sync
}

fn resolve_date(arg: Option<&str>, codec: &DateCodec) -> Result<CalendarDate> {
    match arg {
        Some(raw) => parse_date_arg(raw, today(), codec),
        None => Ok(today()),
    }
}

/// Accepts `today`, `yesterday`, `tomorrow`, `YYYY-MM-DD`, or a note name
/// such as `21-Nov-2025` with or without the extension.
pub fn parse_date_arg(raw: &str, today: CalendarDate, codec: &DateCodec) -> Result<CalendarDate> {
    let raw = raw.trim();
    match raw.to_ascii_lowercase().as_str() {
        "today" => return Ok(today),
        "yesterday" => return Ok(Jump::PrevDay.apply(today, today)),
        "tomorrow" => return Ok(Jump::NextDay.apply(today, today)),
        _ => {}
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        if !codec::is_supported(date) {
            bail!(
                "date {:?} is out of range (years {:04} to {:04})",
                raw,
                MIN_YEAR,
                MAX_YEAR
            );
        }
        return Ok(date);
    }
    let decoded = if raw.ends_with(NOTE_EXTENSION) {
        codec.decode(raw)
    } else {
        codec.decode_stem(raw)
    };
    match decoded {
        Ok(date) => Ok(date),
        Err(err) => bail!(
            "invalid date {:?} (use today, yesterday, tomorrow, YYYY-MM-DD or {}): {}",
            raw,
            codec.stem(today),
            err
        ),
    }
}

fn format_todo(codec: &DateCodec, entry: &TodoEntry) -> String {
    format!(
        "{}:{}  [{}] {}",
        codec.stem(entry.source_date),
        entry.line_number,
        if entry.done { "x" } else { " " },
        entry.text
    )
}

fn format_hit(codec: &DateCodec, hit: &SearchResult) -> String {
    format!(
        "{}:{}  {}",
        codec.stem(hit.source_date),
        hit.line_number,
        hit.snippet
    )
}
