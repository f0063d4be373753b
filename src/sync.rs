//! Ordering of saves, loads and index refreshes.
//!
//! The presentation layer owns an [`EditorSession`] and hands it to the
//! coordinator on every navigation, save or todo action. The coordinator is
//! the only place that decides when the buffer is written and when another
//! date is loaded; a pending edit is always written to the date it belongs to
//! before anything else is read.

use crate::codec::CalendarDate;
use crate::model::{Cursor, Jump, NoteError, Notification, SearchResult, TodoEntry};
use crate::search::SearchIndex;
use crate::storage::NoteStore;
use crate::todo::{self, TodoIndex};
use log::{debug, error, info, warn};
use std::collections::VecDeque;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    Idle,
    SavingPrevious,
    LoadingNext,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RebuildMode {
    /// Rescan on the calling thread before returning.
    Inline,
    /// Rescan on a worker thread; results are picked up by `poll_rebuilds`.
    Background,
}

/// Editor state owned by the presentation layer.
#[derive(Debug, Clone, Default)]
pub struct EditorSession {
    date: Option<CalendarDate>,
    pub buffer: String,
    pub cursor: Cursor,
    pub show_calendar: bool,
    saved: String,
}

impl EditorSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// The date whose note is in the buffer.
    pub fn date(&self) -> Option<CalendarDate> {
        self.date
    }

    /// True when the buffer differs from what was last read or written.
    pub fn is_dirty(&self) -> bool {
        self.date.is_some() && self.buffer != self.saved
    }

    fn load(&mut self, date: CalendarDate, content: String) {
        self.date = Some(date);
        self.saved = content.clone();
        self.buffer = content;
        self.cursor = Cursor::BODY_START.clamped_to(&self.buffer);
    }

    fn mark_saved(&mut self) {
        self.saved = self.buffer.clone();
    }
}

struct RebuildOutcome {
    generation: u64,
    indexes: Result<(TodoIndex, SearchIndex), NoteError>,
}

fn build_indexes(store: &NoteStore) -> Result<(TodoIndex, SearchIndex), NoteError> {
    let corpus = store.load_corpus()?;
    Ok((TodoIndex::rebuild(&corpus), SearchIndex::rebuild(&corpus)))
}

pub struct SyncCoordinator {
    store: NoteStore,
    mode: RebuildMode,
    state: SyncState,
    todos: TodoIndex,
    search: SearchIndex,
    requested: u64,
    applied: u64,
    outcomes_tx: Sender<RebuildOutcome>,
    outcomes_rx: Receiver<RebuildOutcome>,
    notifications: VecDeque<Notification>,
}

impl SyncCoordinator {
    pub fn new(store: NoteStore, mode: RebuildMode) -> Self {
        let (outcomes_tx, outcomes_rx) = mpsc::channel();
        SyncCoordinator {
            store,
            mode,
            state: SyncState::Idle,
            todos: TodoIndex::default(),
            search: SearchIndex::default(),
            requested: 0,
            applied: 0,
            outcomes_tx,
            outcomes_rx,
            notifications: VecDeque::new(),
        }
    }

    pub fn store(&self) -> &NoteStore {
        &self.store
    }

    pub fn state(&self) -> SyncState {
        self.state
    }

    pub fn todos(&self) -> &TodoIndex {
        &self.todos
    }

    pub fn list_open_todos(&self) -> Vec<TodoEntry> {
        self.todos.open()
    }

    pub fn search(&self, query: &str) -> Vec<SearchResult> {
        self.search.query(query)
    }

    pub fn is_rebuilding(&self) -> bool {
        self.applied < self.requested
    }

    /// Notifications emitted since the last drain, oldest first.
    pub fn drain_notifications(&mut self) -> Vec<Notification> {
        self.notifications.drain(..).collect()
    }

    /// Switches the session to `date`.
    ///
    /// A dirty buffer is written to the date it was loaded from first. If that
    /// write fails nothing else happens: the error is returned and the session
    /// keeps its date and unsaved text.
    pub fn navigate(
        &mut self,
        session: &mut EditorSession,
        date: CalendarDate,
    ) -> Result<(), NoteError> {
        if let Some(previous) = session.date {
            if session.is_dirty() {
                self.state = SyncState::SavingPrevious;
                if let Err(err) = self.persist(previous, session) {
                    self.state = SyncState::Idle;
                    return Err(err);
                }
            }
        }

        self.state = SyncState::LoadingNext;
        let content = match self.store.read(date) {
            Ok(content) => content,
            Err(err) => {
                self.state = SyncState::Idle;
                warn!("event=navigate status=error date={} reason={}", date, err);
                return Err(err);
            }
        };
        session.load(date, content);
        debug!("event=navigate status=ok date={}", date);

        self.state = SyncState::Idle;
        self.request_rebuild();
        Ok(())
    }

    pub fn jump(
        &mut self,
        session: &mut EditorSession,
        jump: Jump,
        today: CalendarDate,
    ) -> Result<CalendarDate, NoteError> {
        let target = jump.apply(session.date.unwrap_or(today), today);
        self.navigate(session, target)?;
        Ok(target)
    }

    /// Opens the note a search hit came from with the cursor on the hit's line.
    pub fn open_search_result(
        &mut self,
        session: &mut EditorSession,
        result: &SearchResult,
    ) -> Result<(), NoteError> {
        self.navigate(session, result.source_date)?;
        session.cursor =
            Cursor::new(result.line_number.saturating_sub(1), 0).clamped_to(&session.buffer);
        Ok(())
    }

    /// Writes the buffer to the active date, dirty or not.
    pub fn save(&mut self, session: &mut EditorSession) -> Result<(), NoteError> {
        let Some(date) = session.date else {
            return Ok(());
        };
        self.persist(date, session)?;
        self.request_rebuild();
        Ok(())
    }

    /// Writes the buffer only when it has unsaved changes. Returns whether a
    /// write happened.
    pub fn flush(&mut self, session: &mut EditorSession) -> Result<bool, NoteError> {
        if !session.is_dirty() {
            return Ok(false);
        }
        self.save(session)?;
        Ok(true)
    }

    /// Completes the todo on `line_number` of `date` on disk.
    ///
    /// When that date is on screen, pending edits are saved first and the
    /// buffer is then reloaded from disk with the cursor kept in place, so the
    /// stale buffer can never overwrite the strikethrough.
    pub fn mark_todo_done(
        &mut self,
        session: &mut EditorSession,
        date: CalendarDate,
        line_number: usize,
    ) -> Result<TodoEntry, NoteError> {
        self.complete_externally(session, date, |store| {
            todo::mark_done(store, date, line_number)
        })
    }

    /// Same as [`mark_todo_done`](Self::mark_todo_done) for an index entry,
    /// tolerating a task that moved to another line since the last rescan.
    pub fn mark_entry_done(
        &mut self,
        session: &mut EditorSession,
        entry: &TodoEntry,
    ) -> Result<TodoEntry, NoteError> {
        self.complete_externally(session, entry.source_date, |store| {
            todo::mark_entry_done(store, entry)
        })
    }

    fn complete_externally<F>(
        &mut self,
        session: &mut EditorSession,
        date: CalendarDate,
        op: F,
    ) -> Result<TodoEntry, NoteError>
    where
        F: FnOnce(&NoteStore) -> Result<TodoEntry, NoteError>,
    {
        let displayed = session.date == Some(date);
        if displayed && session.is_dirty() {
            self.persist(date, session)?;
        }
        let entry = match op(&self.store) {
            Ok(entry) => entry,
            Err(err) => {
                if err.is_not_found() {
                    info!("event=todo_stale date={} reason={}", date, err);
                } else {
                    self.notify(Notification::WriteFailed {
                        date,
                        reason: err.to_string(),
                    });
                }
                self.request_rebuild();
                return Err(err);
            }
        };

        self.notify(Notification::ContentChanged(date));
        self.request_rebuild();
        if displayed {
            let cursor = session.cursor;
            let content = self.store.read(date)?;
            session.load(date, content);
            session.cursor = cursor.clamped_to(&session.buffer);
        }
        Ok(entry)
    }

    /// Completes the task on the cursor's line of the buffer and saves it.
    /// Returns `None` when no note is loaded.
    pub fn finish_todo_at_cursor(
        &mut self,
        session: &mut EditorSession,
    ) -> Result<Option<TodoEntry>, NoteError> {
        let Some(date) = session.date else {
            return Ok(None);
        };
        let line_idx = session.cursor.line;
        let not_found = NoteError::NotFound {
            date,
            line: line_idx + 1,
        };
        let lines: Vec<&str> = session.buffer.split('\n').collect();
        let Some(current) = lines.get(line_idx).copied() else {
            return Err(not_found);
        };
        let Some(rewritten) = todo::complete_line(current) else {
            return Err(not_found);
        };
        let text = todo::classify(current)
            .map(|task| task.text.to_string())
            .unwrap_or_default();
        let updated = lines
            .iter()
            .enumerate()
            .map(|(idx, line)| if idx == line_idx { rewritten.as_str() } else { *line })
            .collect::<Vec<_>>()
            .join("\n");
        session.buffer = updated;
        session.cursor = session.cursor.clamped_to(&session.buffer);
        self.save(session)?;
        Ok(Some(TodoEntry {
            source_date: date,
            line_number: line_idx + 1,
            text,
            done: true,
        }))
    }

    fn persist(&mut self, date: CalendarDate, session: &mut EditorSession) -> Result<(), NoteError> {
        match self.store.write(date, &session.buffer) {
            Ok(()) => {
                session.mark_saved();
                Ok(())
            }
            Err(err) => {
                error!("event=note_write status=error date={} reason={}", date, err);
                self.notify(Notification::WriteFailed {
                    date,
                    reason: err.to_string(),
                });
                Err(err)
            }
        }
    }

    /// Starts a full rescan. Any rescan still in flight becomes stale and its
    /// result will be dropped.
    pub fn request_rebuild(&mut self) {
        self.requested += 1;
        let generation = self.requested;
        match self.mode {
            RebuildMode::Inline => {
                let indexes = build_indexes(&self.store);
                self.apply(RebuildOutcome {
                    generation,
                    indexes,
                });
            }
            RebuildMode::Background => {
                let store = self.store.clone();
                let tx = self.outcomes_tx.clone();
                let spawned = thread::Builder::new()
                    .name("daynote-rebuild".into())
                    .spawn(move || {
                        let indexes = build_indexes(&store);
                        let _ = tx.send(RebuildOutcome {
                            generation,
                            indexes,
                        });
                    });
                if let Err(err) = spawned {
                    warn!("event=rebuild_spawn status=error reason={}", err);
                    let indexes = build_indexes(&self.store);
                    self.apply(RebuildOutcome {
                        generation,
                        indexes,
                    });
                }
            }
        }
    }

    /// Applies finished background rescans. Returns true when the indexes changed.
    pub fn poll_rebuilds(&mut self) -> bool {
        let mut changed = false;
        while let Ok(outcome) = self.outcomes_rx.try_recv() {
            changed |= self.apply(outcome);
        }
        changed
    }

    /// Blocks until the most recent rescan has been applied.
    pub fn wait_for_rebuild(&mut self) {
        while self.is_rebuilding() {
            match self.outcomes_rx.recv() {
                Ok(outcome) => {
                    self.apply(outcome);
                }
                Err(_) => break,
            }
        }
    }

    fn apply(&mut self, outcome: RebuildOutcome) -> bool {
        if outcome.generation != self.requested || outcome.generation <= self.applied {
            debug!(
                "event=rebuild_discarded generation={} latest={}",
                outcome.generation, self.requested
            );
            return false;
        }
        self.applied = outcome.generation;
        match outcome.indexes {
            Ok((todos, search)) => {
                info!(
                    "event=rebuild_applied generation={} todos={} lines={}",
                    outcome.generation,
                    todos.len(),
                    search.len()
                );
                self.todos = todos;
                self.search = search;
                self.notify(Notification::TodoIndexUpdated);
                self.notify(Notification::SearchIndexUpdated);
                true
            }
            Err(err) => {
                error!(
                    "event=rebuild_failed generation={} reason={}",
                    outcome.generation, err
                );
                false
            }
        }
    }

    fn notify(&mut self, notification: Notification) {
        self.notifications.push_back(notification);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::DateCodec;
    use crate::locale::Language;
    use chrono::NaiveDate;
    use std::fs;
    use tempfile::TempDir;

    fn date(y: i32, m: u32, d: u32) -> CalendarDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn coordinator(dir: &TempDir, mode: RebuildMode) -> SyncCoordinator {
        let store = NoteStore::new(dir.path().join("notes"), DateCodec::new(Language::English));
        SyncCoordinator::new(store, mode)
    }

    #[test]
    fn first_navigation_shows_default_content_on_body_line() {
        let dir = TempDir::new().unwrap();
        let mut sync = coordinator(&dir, RebuildMode::Inline);
        let mut session = EditorSession::new();
        let today = date(2025, 11, 21);

        sync.navigate(&mut session, today).unwrap();

        assert_eq!(session.date(), Some(today));
        assert_eq!(session.buffer, "# Friday, 21 November 2025\n\n");
        assert_eq!(session.cursor, Cursor::BODY_START);
        assert!(!session.is_dirty());
        assert_eq!(sync.state(), SyncState::Idle);
        assert!(!sync.store().exists(today));
    }

    #[test]
    fn edits_survive_leaving_and_returning() {
        let dir = TempDir::new().unwrap();
        let mut sync = coordinator(&dir, RebuildMode::Inline);
        let mut session = EditorSession::new();
        let a = date(2025, 11, 21);
        let b = date(2025, 11, 22);

        sync.navigate(&mut session, a).unwrap();
        session.buffer.push_str("## Buy milk\n");
        sync.navigate(&mut session, b).unwrap();
        assert_eq!(session.date(), Some(b));
        assert!(!sync.store().exists(b));

        sync.navigate(&mut session, a).unwrap();
        assert!(session.buffer.ends_with("## Buy milk\n"));
        assert_eq!(sync.list_open_todos()[0].text, "Buy milk");
    }

    #[test]
    fn rapid_navigation_never_loses_or_misplaces_edits() {
        let dir = TempDir::new().unwrap();
        let mut sync = coordinator(&dir, RebuildMode::Inline);
        let mut session = EditorSession::new();
        let days: Vec<_> = (1..=5).map(|d| date(2025, 3, d)).collect();

        for round in 0..4 {
            for day in &days {
                sync.navigate(&mut session, *day).unwrap();
                session.buffer.push_str(&format!("edit {round} for {day}\n"));
            }
        }
        sync.navigate(&mut session, date(2025, 4, 1)).unwrap();

        for day in &days {
            let content = sync.store().read(*day).unwrap();
            for round in 0..4 {
                assert!(content.contains(&format!("edit {round} for {day}\n")));
            }
            for other in days.iter().filter(|d| *d != day) {
                assert!(!content.contains(&format!("for {other}")));
            }
        }
    }

    #[test]
    fn failed_save_keeps_previous_date_and_text() {
        let dir = TempDir::new().unwrap();
        let mut sync = coordinator(&dir, RebuildMode::Inline);
        let mut session = EditorSession::new();
        let a = date(2025, 11, 21);

        sync.navigate(&mut session, a).unwrap();
        session.buffer.push_str("unsaved thought\n");
        fs::write(dir.path().join("notes"), "blocks the notes directory").unwrap();
        sync.drain_notifications();

        let err = sync.navigate(&mut session, date(2025, 11, 22)).unwrap_err();
        assert!(matches!(err, NoteError::Io { .. }));
        assert_eq!(session.date(), Some(a));
        assert!(session.buffer.ends_with("unsaved thought\n"));
        assert!(session.is_dirty());
        assert_eq!(sync.state(), SyncState::Idle);
        let notes = sync.drain_notifications();
        assert!(matches!(
            notes.as_slice(),
            [Notification::WriteFailed { date, .. }] if *date == a
        ));
    }

    #[test]
    fn mark_done_reloads_displayed_note_and_keeps_cursor() {
        let dir = TempDir::new().unwrap();
        let mut sync = coordinator(&dir, RebuildMode::Inline);
        let mut session = EditorSession::new();
        let a = date(2025, 11, 21);
        sync.store()
            .write(a, "# Friday\n\n## Buy milk\nsome prose here")
            .unwrap();

        sync.navigate(&mut session, a).unwrap();
        session.cursor = Cursor::new(3, 4);
        sync.drain_notifications();

        let entry = sync.mark_todo_done(&mut session, a, 3).unwrap();
        assert_eq!(entry.text, "Buy milk");
        assert_eq!(session.buffer, "# Friday\n\n## ~~Buy milk~~\nsome prose here");
        assert_eq!(session.cursor, Cursor::new(3, 4));
        assert!(!session.is_dirty());
        assert!(sync.list_open_todos().is_empty());
        assert!(sync.todos().entries()[0].done);
        let notes = sync.drain_notifications();
        assert_eq!(notes[0], Notification::ContentChanged(a));
        assert!(notes.contains(&Notification::TodoIndexUpdated));

        sync.navigate(&mut session, date(2025, 11, 22)).unwrap();
        assert!(sync.store().read(a).unwrap().contains("## ~~Buy milk~~"));
    }

    #[test]
    fn mark_done_saves_pending_edits_of_the_displayed_note_first() {
        let dir = TempDir::new().unwrap();
        let mut sync = coordinator(&dir, RebuildMode::Inline);
        let mut session = EditorSession::new();
        let a = date(2025, 11, 21);
        sync.store().write(a, "# Friday\n\n## Buy milk\n").unwrap();

        sync.navigate(&mut session, a).unwrap();
        session.buffer.push_str("typed just now\n");
        sync.mark_todo_done(&mut session, a, 3).unwrap();

        let on_disk = sync.store().read(a).unwrap();
        assert_eq!(on_disk, "# Friday\n\n## ~~Buy milk~~\ntyped just now\n");
        assert_eq!(session.buffer, on_disk);
    }

    #[test]
    fn mark_done_on_another_date_leaves_buffer_alone() {
        let dir = TempDir::new().unwrap();
        let mut sync = coordinator(&dir, RebuildMode::Inline);
        let mut session = EditorSession::new();
        let a = date(2025, 11, 20);
        let b = date(2025, 11, 21);
        sync.store().write(a, "# Thursday\n## Call dentist").unwrap();

        sync.navigate(&mut session, b).unwrap();
        session.buffer.push_str("draft");
        sync.mark_todo_done(&mut session, a, 2).unwrap();

        assert!(session.buffer.ends_with("draft"));
        assert!(session.is_dirty());
        assert_eq!(sync.store().read(a).unwrap(), "# Thursday\n## ~~Call dentist~~");
    }

    #[test]
    fn stale_mark_done_is_not_found_and_rescans() {
        let dir = TempDir::new().unwrap();
        let mut sync = coordinator(&dir, RebuildMode::Inline);
        let mut session = EditorSession::new();
        let a = date(2025, 11, 21);
        sync.store().write(a, "# Friday\n\n## task").unwrap();
        sync.navigate(&mut session, a).unwrap();
        sync.drain_notifications();

        let err = sync.mark_todo_done(&mut session, a, 2).unwrap_err();
        assert!(err.is_not_found());
        let notes = sync.drain_notifications();
        assert!(notes.contains(&Notification::TodoIndexUpdated));
        assert!(!notes
            .iter()
            .any(|n| matches!(n, Notification::WriteFailed { .. })));

        sync.mark_todo_done(&mut session, a, 3).unwrap();
        assert!(sync.mark_todo_done(&mut session, a, 3).unwrap_err().is_not_found());
    }

    #[test]
    fn finish_at_cursor_completes_the_current_line() {
        let dir = TempDir::new().unwrap();
        let mut sync = coordinator(&dir, RebuildMode::Inline);
        let mut session = EditorSession::new();
        let a = date(2025, 11, 21);
        sync.navigate(&mut session, a).unwrap();
        session.buffer.push_str("## water plants\nprose");

        session.cursor = Cursor::new(2, 5);
        let entry = sync.finish_todo_at_cursor(&mut session).unwrap().unwrap();
        assert_eq!(entry.text, "water plants");
        assert_eq!(entry.line_number, 3);
        assert!(sync.store().read(a).unwrap().contains("## ~~water plants~~\nprose"));

        assert!(sync.finish_todo_at_cursor(&mut session).unwrap_err().is_not_found());
        session.cursor = Cursor::new(3, 0);
        assert!(sync.finish_todo_at_cursor(&mut session).unwrap_err().is_not_found());
    }

    #[test]
    fn finish_at_cursor_refuses_an_empty_task() {
        let dir = TempDir::new().unwrap();
        let mut sync = coordinator(&dir, RebuildMode::Inline);
        let mut session = EditorSession::new();
        let a = date(2025, 11, 21);
        sync.navigate(&mut session, a).unwrap();
        session.buffer.push_str("##");
        session.cursor = Cursor::new(2, 0);

        assert!(sync.finish_todo_at_cursor(&mut session).unwrap_err().is_not_found());
        assert!(session.buffer.ends_with("\n##"));
        assert!(!sync.store().exists(a));
    }

    #[test]
    fn failed_reload_after_mark_done_still_rescans() {
        let dir = TempDir::new().unwrap();
        let mut sync = coordinator(&dir, RebuildMode::Inline);
        let mut session = EditorSession::new();
        let a = date(2025, 11, 21);
        sync.store().write(a, "# Friday\n\n## Buy milk").unwrap();
        sync.navigate(&mut session, a).unwrap();
        assert_eq!(sync.list_open_todos().len(), 1);

        let path = sync.store().path_for(a);
        let err = sync
            .complete_externally(&mut session, a, |store| {
                let entry = todo::mark_done(store, a, 3)?;
                fs::remove_file(&path).unwrap();
                fs::create_dir(&path).unwrap();
                Ok(entry)
            })
            .unwrap_err();

        assert!(matches!(err, NoteError::Io { .. }));
        assert!(!sync.is_rebuilding());
        assert!(sync.list_open_todos().is_empty());
    }

    #[test]
    fn failed_load_after_saving_keeps_the_saved_date() {
        let dir = TempDir::new().unwrap();
        let mut sync = coordinator(&dir, RebuildMode::Inline);
        let mut session = EditorSession::new();
        let a = date(2025, 11, 21);
        let b = date(2025, 11, 22);
        sync.navigate(&mut session, a).unwrap();
        session.buffer.push_str("kept\n");
        fs::create_dir_all(sync.store().path_for(b)).unwrap();

        let err = sync.navigate(&mut session, b).unwrap_err();
        assert!(matches!(err, NoteError::Io { .. }));
        assert_eq!(sync.state(), SyncState::Idle);
        assert_eq!(session.date(), Some(a));
        assert!(!session.is_dirty());
        assert!(sync.store().read(a).unwrap().ends_with("kept\n"));
    }

    #[test]
    fn saved_text_is_searchable_and_hits_open_at_their_line() {
        let dir = TempDir::new().unwrap();
        let mut sync = coordinator(&dir, RebuildMode::Inline);
        let mut session = EditorSession::new();
        let a = date(2025, 11, 20);
        sync.navigate(&mut session, a).unwrap();
        session.buffer.push_str("## Buy milk\nCall dentist\n");
        sync.save(&mut session).unwrap();
        sync.navigate(&mut session, date(2025, 11, 25)).unwrap();

        let hits = sync.search("milk");
        assert_eq!(hits.len(), 1);
        assert_eq!((hits[0].source_date, hits[0].line_number), (a, 3));
        assert!(sync.search("").is_empty());

        sync.open_search_result(&mut session, &hits[0]).unwrap();
        assert_eq!(session.date(), Some(a));
        assert_eq!(session.cursor, Cursor::new(2, 0));
    }

    #[test]
    fn jumps_move_relative_to_the_active_date() {
        let dir = TempDir::new().unwrap();
        let mut sync = coordinator(&dir, RebuildMode::Inline);
        let mut session = EditorSession::new();
        let today = date(2025, 11, 21);

        assert_eq!(sync.jump(&mut session, Jump::NextDay, today).unwrap(), date(2025, 11, 22));
        assert_eq!(sync.jump(&mut session, Jump::NextWeek, today).unwrap(), date(2025, 11, 29));
        assert_eq!(sync.jump(&mut session, Jump::Today, today).unwrap(), today);
        assert_eq!(session.date(), Some(today));
    }

    #[test]
    fn flush_only_writes_dirty_buffers() {
        let dir = TempDir::new().unwrap();
        let mut sync = coordinator(&dir, RebuildMode::Inline);
        let mut session = EditorSession::new();
        let a = date(2025, 11, 21);
        assert!(!sync.flush(&mut session).unwrap());
        sync.navigate(&mut session, a).unwrap();
        assert!(!sync.flush(&mut session).unwrap());
        assert!(!sync.store().exists(a));
        session.buffer.push_str("x");
        assert!(sync.flush(&mut session).unwrap());
        assert!(sync.store().exists(a));
    }

    #[test]
    fn background_rebuild_keeps_only_the_latest_result() {
        let dir = TempDir::new().unwrap();
        let mut sync = coordinator(&dir, RebuildMode::Background);
        let store = sync.store().clone();

        store.write(date(2025, 1, 1), "# h\n## one").unwrap();
        sync.request_rebuild();
        store.write(date(2025, 1, 2), "# h\n## two").unwrap();
        sync.request_rebuild();
        sync.wait_for_rebuild();

        assert!(!sync.is_rebuilding());
        let texts: Vec<_> = sync.list_open_todos().into_iter().map(|e| e.text).collect();
        assert_eq!(texts, vec!["one", "two"]);
        assert!(!sync.poll_rebuilds());
    }

    #[test]
    fn out_of_order_results_are_discarded() {
        let dir = TempDir::new().unwrap();
        let mut sync = coordinator(&dir, RebuildMode::Inline);
        sync.request_rebuild();
        sync.request_rebuild();
        sync.drain_notifications();

        let stale = RebuildOutcome {
            generation: 1,
            indexes: Ok((
                TodoIndex::rebuild(&[crate::model::NoteFile {
                    date: date(2025, 1, 1),
                    path: dir.path().join("x.md"),
                    content: "## stale".into(),
                    exists_on_disk: true,
                }]),
                SearchIndex::default(),
            )),
        };
        assert!(!sync.apply(stale));
        assert!(sync.todos().is_empty());
        assert!(sync.drain_notifications().is_empty());
    }
}
