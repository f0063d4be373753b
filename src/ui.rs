use crate::codec::{self, CalendarDate};
use crate::commands;
use crate::logging;
use crate::model::{Cursor, Jump, Notification, SearchResult, TodoEntry};
use crate::sync::{EditorSession, SyncCoordinator};
use crate::todo;
use anyhow::Result;
use chrono::{Datelike, Months, NaiveDate};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use log::{info, warn};
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout};
use ratatui::prelude::{Alignment, Color, Modifier, Rect, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::ListState;
use ratatui::widgets::{Block, Borders, Clear, List, ListItem, Paragraph, Wrap};
use ratatui::Terminal;
use std::collections::BTreeSet;
use std::io::{stdout, Stdout};
use std::time::Duration;

const SCROLLOFF: usize = 2;
const GUTTER_WIDTH: usize = 5;

pub fn run(sync: SyncCoordinator, search_limit: usize) -> Result<()> {
    let mut app = App::new(sync, search_limit, commands::today)?;
    let mut terminal = setup_terminal()?;
    let result = app.event_loop(&mut terminal);
    teardown_terminal(&mut terminal)?;
    result
}

struct App {
    sync: SyncCoordinator,
    session: EditorSession,
    clock: fn() -> CalendarDate,
    focus: Focus,
    overlay: Overlay,
    calendar: CalendarState,
    search_limit: usize,
    todo_idx: usize,
    todo_offset: usize,
    editor_offset: usize,
    editor_hscroll: usize,
    status: String,
    status_is_error: bool,
    quit_armed: bool,
}

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
enum Focus {
    Editor,
    Todos,
}

enum Overlay {
    None,
    Search(SearchState),
    Help,
}

struct CalendarState {
    cursor: CalendarDate,
    with_notes: BTreeSet<CalendarDate>,
}

struct SearchState {
    query: FieldValue,
    results: Vec<SearchResult>,
    selected: usize,
}

/// Single-line text input with a byte cursor.
#[derive(Clone, Default)]
struct FieldValue {
    value: String,
    cursor: usize,
}

impl FieldValue {
    fn move_left(&mut self) {
        if self.cursor == 0 {
            return;
        }
        self.cursor = prev_grapheme(self.cursor, &self.value);
    }

    fn move_right(&mut self) {
        if self.cursor >= self.value.len() {
            return;
        }
        self.cursor = next_grapheme(self.cursor, &self.value);
    }

    fn backspace(&mut self) {
        if self.cursor == 0 {
            return;
        }
        let prev = prev_grapheme(self.cursor, &self.value);
        self.value.drain(prev..self.cursor);
        self.cursor = prev;
    }

    fn insert_char(&mut self, ch: char) {
        self.value.insert(self.cursor, ch);
        self.cursor += ch.len_utf8();
    }

    fn with_caret(&self) -> String {
        let mut text = self.value.clone();
        text.insert_str(self.cursor, "▌");
        text
    }
}

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
enum Motion {
    Left,
    Right,
    Up,
    Down,
    Home,
    End,
    PageUp,
    PageDown,
}

impl App {
    fn new(
        mut sync: SyncCoordinator,
        search_limit: usize,
        clock: fn() -> CalendarDate,
    ) -> Result<Self> {
        let today = clock();
        let mut session = EditorSession::new();
        sync.navigate(&mut session, today)?;
        let status = format!("Notes in {}", sync.store().dir().display());
        info!("event=tui_start date={}", today);
        Ok(App {
            sync,
            session,
            clock,
            focus: Focus::Editor,
            overlay: Overlay::None,
            calendar: CalendarState {
                cursor: today,
                with_notes: BTreeSet::new(),
            },
            search_limit,
            todo_idx: 0,
            todo_offset: 0,
            editor_offset: 0,
            editor_hscroll: 0,
            status,
            status_is_error: false,
            quit_armed: false,
        })
    }

    fn event_loop(&mut self, terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
        loop {
            self.tick();
            terminal.draw(|f| self.draw(f))?;
            if event::poll(Duration::from_millis(200))? {
                if let Event::Key(key) = event::read()? {
                    if key.kind != KeyEventKind::Press {
                        continue;
                    }
                    if self.handle_key(key) {
                        break;
                    }
                }
            }
        }
        Ok(())
    }

    /// Picks up finished rescans and turns notifications into screen state.
    fn tick(&mut self) {
        self.sync.poll_rebuilds();
        for notification in self.sync.drain_notifications() {
            match notification {
                Notification::ContentChanged(date) => {
                    self.calendar.with_notes.insert(date);
                }
                Notification::TodoIndexUpdated => {
                    let open = self.sync.list_open_todos().len();
                    self.todo_idx = self.todo_idx.min(open.saturating_sub(1));
                }
                Notification::SearchIndexUpdated => self.refresh_search(),
                Notification::WriteFailed { date, reason } => {
                    let name = self.sync.store().codec().display(date);
                    self.set_error(format!("Could not save {}: {}", name, reason));
                }
            }
        }
    }

    fn handle_key(&mut self, key: KeyEvent) -> bool {
        if self.session.show_calendar {
            self.handle_calendar_key(key);
            return false;
        }
        match self.overlay {
            Overlay::Help => {
                if matches!(key.code, KeyCode::Esc | KeyCode::F(1) | KeyCode::Enter) {
                    self.overlay = Overlay::None;
                }
                return false;
            }
            Overlay::Search(_) => {
                self.handle_search_key(key);
                return false;
            }
            Overlay::None => {}
        }

        if key.modifiers.contains(KeyModifiers::CONTROL) {
            match key.code {
                KeyCode::Char('q') => return self.quit(),
                KeyCode::Char('s') => self.save(),
                KeyCode::Char('n') => self.jump(Jump::NextDay),
                KeyCode::Char('p') => self.jump(Jump::PrevDay),
                KeyCode::Char('f') => self.jump(Jump::NextWeek),
                KeyCode::Char('b') => self.jump(Jump::PrevWeek),
                KeyCode::Char('t') => self.jump(Jump::Today),
                KeyCode::Char('c') => self.open_calendar(),
                KeyCode::Char('g') => self.open_search(),
                KeyCode::Char('d') => match self.focus {
                    Focus::Editor => self.finish_at_cursor(),
                    Focus::Todos => self.finish_selected_todo(),
                },
                _ => {}
            }
            return false;
        }
        if key.code == KeyCode::F(1) {
            self.overlay = Overlay::Help;
            return false;
        }

        self.quit_armed = false;
        match self.focus {
            Focus::Editor => self.handle_editor_key(key),
            Focus::Todos => self.handle_todo_key(key),
        }
        false
    }

    fn handle_editor_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Tab => self.focus = Focus::Todos,
            KeyCode::Char(ch) => insert_char(&mut self.session, ch),
            KeyCode::Enter => insert_char(&mut self.session, '\n'),
            KeyCode::Backspace => backspace(&mut self.session),
            KeyCode::Delete => delete_forward(&mut self.session),
            KeyCode::Left => move_cursor(&mut self.session, Motion::Left),
            KeyCode::Right => move_cursor(&mut self.session, Motion::Right),
            KeyCode::Up => move_cursor(&mut self.session, Motion::Up),
            KeyCode::Down => move_cursor(&mut self.session, Motion::Down),
            KeyCode::Home => move_cursor(&mut self.session, Motion::Home),
            KeyCode::End => move_cursor(&mut self.session, Motion::End),
            KeyCode::PageUp => move_cursor(&mut self.session, Motion::PageUp),
            KeyCode::PageDown => move_cursor(&mut self.session, Motion::PageDown),
            _ => {}
        }
    }

    fn handle_todo_key(&mut self, key: KeyEvent) {
        let open = self.sync.list_open_todos();
        match key.code {
            KeyCode::Tab | KeyCode::Esc => self.focus = Focus::Editor,
            KeyCode::Up | KeyCode::Char('k') => {
                self.todo_idx = self.todo_idx.saturating_sub(1);
            }
            KeyCode::Down | KeyCode::Char('j') => {
                if self.todo_idx + 1 < open.len() {
                    self.todo_idx += 1;
                }
            }
            KeyCode::Enter => {
                if let Some(entry) = open.get(self.todo_idx) {
                    self.open_todo(entry);
                }
            }
            KeyCode::Char('x') => self.finish_selected_todo(),
            _ => {}
        }
    }

    fn handle_calendar_key(&mut self, key: KeyEvent) {
        let cursor = self.calendar.cursor;
        let moved = match key.code {
            KeyCode::Esc => {
                self.session.show_calendar = false;
                return;
            }
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.session.show_calendar = false;
                return;
            }
            KeyCode::Enter => {
                self.session.show_calendar = false;
                self.navigate(cursor);
                return;
            }
            KeyCode::Left | KeyCode::Char('h') => Jump::PrevDay.apply(cursor, cursor),
            KeyCode::Right | KeyCode::Char('l') => Jump::NextDay.apply(cursor, cursor),
            KeyCode::Up | KeyCode::Char('k') => Jump::PrevWeek.apply(cursor, cursor),
            KeyCode::Down | KeyCode::Char('j') => Jump::NextWeek.apply(cursor, cursor),
            KeyCode::PageUp => cursor
                .checked_sub_months(Months::new(1))
                .filter(|date| codec::is_supported(*date))
                .unwrap_or(cursor),
            KeyCode::PageDown => cursor
                .checked_add_months(Months::new(1))
                .filter(|date| codec::is_supported(*date))
                .unwrap_or(cursor),
            KeyCode::Char('t') => (self.clock)(),
            _ => cursor,
        };
        self.calendar.cursor = moved;
    }

    fn handle_search_key(&mut self, key: KeyEvent) {
        let Overlay::Search(state) = &mut self.overlay else {
            return;
        };
        match key.code {
            KeyCode::Esc => {
                self.overlay = Overlay::None;
                return;
            }
            KeyCode::Char('g') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.overlay = Overlay::None;
                return;
            }
            KeyCode::Enter => {
                let hit = state.results.get(state.selected).cloned();
                self.overlay = Overlay::None;
                if let Some(hit) = hit {
                    self.open_hit(&hit);
                }
                return;
            }
            KeyCode::Up => {
                state.selected = state.selected.saturating_sub(1);
                return;
            }
            KeyCode::Down => {
                if state.selected + 1 < state.results.len() {
                    state.selected += 1;
                }
                return;
            }
            KeyCode::Left => state.query.move_left(),
            KeyCode::Right => state.query.move_right(),
            KeyCode::Backspace => state.query.backspace(),
            KeyCode::Char(ch) => state.query.insert_char(ch),
            _ => return,
        }
        self.refresh_search();
    }

    fn refresh_search(&mut self) {
        if let Overlay::Search(state) = &mut self.overlay {
            let mut results = self.sync.search(&state.query.value);
            results.truncate(self.search_limit);
            state.selected = state.selected.min(results.len().saturating_sub(1));
            state.results = results;
        }
    }

    fn quit(&mut self) -> bool {
        if self.quit_armed {
            warn!("event=tui_quit status=unsaved");
            return true;
        }
        match self.sync.flush(&mut self.session) {
            Ok(_) => {
                info!("event=tui_quit status=ok");
                true
            }
            Err(err) => {
                self.quit_armed = true;
                self.set_error(format!(
                    "Save failed: {}. Press Ctrl+Q again to quit without saving",
                    err
                ));
                false
            }
        }
    }

    fn save(&mut self) {
        let Some(date) = self.session.date() else {
            return;
        };
        match self.sync.save(&mut self.session) {
            Ok(()) => {
                let path = self.sync.store().path_for(date);
                self.set_status(format!("Saved {}", path.display()));
            }
            Err(err) => self.set_error(format!("Save failed: {}", err)),
        }
    }

    fn jump(&mut self, jump: Jump) {
        let today = (self.clock)();
        match self.sync.jump(&mut self.session, jump, today) {
            Ok(date) => self.arrived(date),
            Err(err) => self.set_error(format!("Could not switch day: {}", err)),
        }
    }

    fn navigate(&mut self, date: CalendarDate) {
        match self.sync.navigate(&mut self.session, date) {
            Ok(()) => self.arrived(date),
            Err(err) => self.set_error(format!("Could not switch day: {}", err)),
        }
    }

    fn arrived(&mut self, date: CalendarDate) {
        self.editor_offset = 0;
        self.editor_hscroll = 0;
        let name = self.sync.store().codec().display(date);
        self.set_status(format!("Opened {}", name));
    }

    fn open_calendar(&mut self) {
        self.calendar.cursor = self.session.date().unwrap_or_else(self.clock);
        match self.sync.store().list_all() {
            Ok(notes) => {
                self.calendar.with_notes = notes.into_iter().map(|(date, _)| date).collect();
            }
            Err(err) => self.set_error(format!("Could not list notes: {}", err)),
        }
        self.session.show_calendar = true;
    }

    fn open_search(&mut self) {
        self.overlay = Overlay::Search(SearchState {
            query: FieldValue::default(),
            results: Vec::new(),
            selected: 0,
        });
    }

    fn open_hit(&mut self, hit: &SearchResult) {
        match self.sync.open_search_result(&mut self.session, hit) {
            Ok(()) => {
                self.focus = Focus::Editor;
                self.arrived(hit.source_date);
            }
            Err(err) => self.set_error(format!("Could not open result: {}", err)),
        }
    }

    fn open_todo(&mut self, entry: &TodoEntry) {
        match self.sync.navigate(&mut self.session, entry.source_date) {
            Ok(()) => {
                self.arrived(entry.source_date);
                self.session.cursor = Cursor::new(entry.line_number.saturating_sub(1), 0)
                    .clamped_to(&self.session.buffer);
                self.focus = Focus::Editor;
            }
            Err(err) => self.set_error(format!("Could not open todo: {}", err)),
        }
    }

    fn finish_at_cursor(&mut self) {
        match self.sync.finish_todo_at_cursor(&mut self.session) {
            Ok(Some(entry)) => self.set_status(format!("Done: {}", entry.text)),
            Ok(None) => {}
            Err(err) if err.is_not_found() => {
                self.set_status("No open todo on this line".to_string());
            }
            Err(err) => self.set_error(format!("Could not finish todo: {}", err)),
        }
    }

    fn finish_selected_todo(&mut self) {
        let open = self.sync.list_open_todos();
        let Some(entry) = open.get(self.todo_idx) else {
            self.set_status("No todo selected".to_string());
            return;
        };
        match self.sync.mark_entry_done(&mut self.session, entry) {
            Ok(done) => self.set_status(format!("Done: {}", done.text)),
            Err(err) if err.is_not_found() => {
                self.set_status("That todo changed on disk; list refreshed".to_string());
            }
            Err(err) => self.set_error(format!("Could not finish todo: {}", err)),
        }
    }

    fn set_status(&mut self, message: String) {
        self.status = message;
        self.status_is_error = false;
    }

    fn set_error(&mut self, message: String) {
        self.status = message;
        self.status_is_error = true;
    }

    fn draw(&mut self, f: &mut ratatui::Frame<'_>) {
        let layout = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(2),
                Constraint::Min(6),
                Constraint::Length(2),
            ])
            .split(f.size());

        self.draw_header(f, layout[0]);
        let panes = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(68), Constraint::Percentage(32)])
            .split(layout[1]);
        self.draw_editor(f, panes[0]);
        self.draw_todos(f, panes[1]);
        self.draw_footer(f, layout[2]);

        if self.session.show_calendar {
            self.draw_calendar(f);
        }
        match &self.overlay {
            Overlay::Search(state) => self.draw_search(f, state),
            Overlay::Help => self.draw_help(f),
            Overlay::None => {}
        }
    }

    fn draw_header(&self, f: &mut ratatui::Frame<'_>, area: Rect) {
        let Some(date) = self.session.date() else {
            return;
        };
        let store = self.sync.store();
        let heading = store.codec().heading(date);
        let (marker, marker_color) = if self.session.is_dirty() {
            ("modified", Color::LightYellow)
        } else if store.exists(date) {
            ("saved", Color::Green)
        } else {
            ("new", Color::Gray)
        };
        let mut spans = vec![
            Span::styled(
                "daynote ",
                Style::default()
                    .fg(Color::Cyan)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::styled(
                heading.trim_start_matches('#').trim().to_string(),
                Style::default().add_modifier(Modifier::BOLD),
            ),
            Span::raw("  •  "),
            Span::styled(marker, Style::default().fg(marker_color)),
            Span::raw("  •  "),
            Span::styled(
                format!("{}", store.path_for(date).display()),
                Style::default().fg(Color::DarkGray),
            ),
        ];
        if self.sync.is_rebuilding() {
            spans.push(Span::raw("  •  "));
            spans.push(Span::styled("indexing", Style::default().fg(Color::Magenta)));
        }

        let block = Block::default()
            .borders(Borders::BOTTOM)
            .border_style(Style::default().fg(Color::DarkGray));
        let paragraph = Paragraph::new(Line::from(spans))
            .alignment(Alignment::Center)
            .block(block);
        f.render_widget(paragraph, area);
    }

    fn draw_editor(&mut self, f: &mut ratatui::Frame<'_>, area: Rect) {
        let focused = self.focus == Focus::Editor && matches!(self.overlay, Overlay::None);
        let block = pane_block("Note", focused);
        let inner = block.inner(area);
        f.render_widget(block, area);

        let lines: Vec<&str> = self.session.buffer.split('\n').collect();
        let cursor = self.session.cursor.clamped_to(&self.session.buffer);
        let viewport = inner.height as usize;
        let text_width = (inner.width as usize).saturating_sub(GUTTER_WIDTH);
        self.editor_offset =
            adjust_offset(cursor.line, self.editor_offset, viewport, SCROLLOFF, lines.len());
        let line_len = lines.get(cursor.line).map(|l| l.chars().count()).unwrap_or(0);
        self.editor_hscroll =
            adjust_offset(cursor.column, self.editor_hscroll, text_width, 0, line_len + 1);

        let rendered: Vec<Line<'static>> = lines
            .iter()
            .enumerate()
            .skip(self.editor_offset)
            .take(viewport)
            .map(|(idx, line)| {
                let visible: String = line
                    .chars()
                    .skip(self.editor_hscroll)
                    .take(text_width)
                    .collect();
                Line::from(vec![
                    Span::styled(
                        format!("{:>4} ", idx + 1),
                        Style::default().fg(if idx == cursor.line {
                            Color::Gray
                        } else {
                            Color::DarkGray
                        }),
                    ),
                    Span::styled(visible, line_style(idx, line)),
                ])
            })
            .collect();
        f.render_widget(Paragraph::new(rendered), inner);

        if focused && !self.session.show_calendar {
            let x = inner.x as usize
                + GUTTER_WIDTH
                + cursor.column.saturating_sub(self.editor_hscroll);
            let y = inner.y as usize + cursor.line.saturating_sub(self.editor_offset);
            if x < (inner.x + inner.width) as usize && y < (inner.y + inner.height) as usize {
                f.set_cursor(x as u16, y as u16);
            }
        }
    }

    fn draw_todos(&mut self, f: &mut ratatui::Frame<'_>, area: Rect) {
        let focused = self.focus == Focus::Todos && matches!(self.overlay, Overlay::None);
        let open = self.sync.list_open_todos();
        let codec = *self.sync.store().codec();
        let viewport = area.height.saturating_sub(2) as usize;
        let selected = self.todo_idx.min(open.len().saturating_sub(1));
        self.todo_offset = adjust_offset(selected, self.todo_offset, viewport, 1, open.len());

        let mut state = ListState::default();
        *state.offset_mut() = self.todo_offset;
        if focused && !open.is_empty() {
            state.select(Some(selected));
        }
        let text_width = (area.width as usize).saturating_sub(10);
        let items: Vec<ListItem<'static>> = if open.is_empty() {
            vec![ListItem::new("No open todos")]
        } else {
            open.iter()
                .map(|entry| {
                    let stamp = format!(
                        "{:02} {} ",
                        entry.source_date.day(),
                        codec.language().month_abbrev(entry.source_date.month())
                    );
                    ListItem::new(Line::from(vec![
                        Span::styled(stamp, Style::default().fg(Color::DarkGray)),
                        Span::raw(truncate_text(&entry.text, text_width)),
                    ]))
                })
                .collect()
        };
        let block = pane_block(&format!("Todos ({})", open.len()), focused);
        let list = List::new(items).block(block).highlight_style(
            Style::default()
                .bg(Color::LightCyan)
                .fg(Color::Black)
                .add_modifier(Modifier::BOLD),
        );
        f.render_stateful_widget(list, area, &mut state);
    }

    fn draw_footer(&self, f: &mut ratatui::Frame<'_>, area: Rect) {
        let status_style = if self.status_is_error {
            Style::default().fg(Color::LightRed)
        } else {
            Style::default().fg(Color::Gray)
        };
        let line = Line::from(vec![
            Span::styled(self.status.clone(), status_style),
            Span::raw("  "),
            Span::styled("F1", Style::default().fg(Color::LightCyan)),
            Span::raw(" help  "),
            Span::styled("Ctrl+Q", Style::default().fg(Color::LightCyan)),
            Span::raw(" quit"),
        ]);
        let footer = Paragraph::new(line).block(
            Block::default()
                .borders(Borders::TOP)
                .border_style(Style::default().fg(Color::DarkGray)),
        );
        f.render_widget(footer, area);
    }

    fn draw_calendar(&self, f: &mut ratatui::Frame<'_>) {
        let area = centered_rect(50, 60, f.size());
        let cursor = self.calendar.cursor;
        let today = (self.clock)();
        let language = self.sync.store().codec().language();
        let month_start =
            NaiveDate::from_ymd_opt(cursor.year(), cursor.month(), 1).unwrap_or(cursor);
        let days = days_in_month(month_start.year(), month_start.month());
        let start_offset = month_start.weekday().num_days_from_monday();

        let mut lines = Vec::new();
        lines.push(Line::from(Span::styled(
            format!(
                "{} {}",
                language.month_name(month_start.month()),
                month_start.year()
            ),
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        )));
        let header_spans: Vec<Span<'static>> = language
            .weekday_headers()
            .iter()
            .map(|h| Span::styled(format!("{:>4}", h), Style::default().fg(Color::Gray)))
            .collect();
        lines.push(Line::from(header_spans));

        let mut day: i32 = 1 - start_offset as i32;
        while day <= days as i32 {
            let mut spans = Vec::new();
            for _ in 0..7 {
                if day < 1 || day > days as i32 {
                    spans.push(Span::raw("    "));
                } else if let Some(date) =
                    NaiveDate::from_ymd_opt(month_start.year(), month_start.month(), day as u32)
                {
                    let mut style = if self.calendar.with_notes.contains(&date) {
                        Style::default()
                            .fg(Color::LightYellow)
                            .add_modifier(Modifier::BOLD)
                    } else {
                        Style::default().fg(Color::Gray)
                    };
                    if date == today {
                        style = style.add_modifier(Modifier::UNDERLINED);
                    }
                    if date == cursor {
                        style = style.bg(Color::Cyan).fg(Color::Black);
                    }
                    spans.push(Span::styled(format!("{:>4}", day), style));
                }
                day += 1;
            }
            lines.push(Line::from(spans));
        }
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            "arrows move • PgUp/PgDn month • t today • Enter open • Esc close",
            Style::default().fg(Color::DarkGray),
        )));

        let dialog = Paragraph::new(lines)
            .alignment(Alignment::Center)
            .block(overlay_block("Calendar"));
        f.render_widget(Clear, area);
        f.render_widget(dialog, area);
    }

    fn draw_search(&self, f: &mut ratatui::Frame<'_>, state: &SearchState) {
        let area = centered_rect(70, 70, f.size());
        f.render_widget(Clear, area);
        let block = overlay_block("Search");
        let inner = block.inner(area);
        f.render_widget(block, area);

        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(2), Constraint::Min(1)])
            .split(inner);
        let prompt = Paragraph::new(Line::from(vec![
            Span::styled("› ", Style::default().fg(Color::Cyan)),
            Span::raw(state.query.with_caret()),
        ]))
        .block(
            Block::default()
                .borders(Borders::BOTTOM)
                .border_style(Style::default().fg(Color::DarkGray)),
        );
        f.render_widget(prompt, rows[0]);

        let codec = self.sync.store().codec();
        let width = (rows[1].width as usize).saturating_sub(20);
        let items: Vec<ListItem<'static>> = if state.results.is_empty() {
            let hint = if state.query.value.trim().is_empty() {
                "Type to search every note"
            } else {
                "No matches"
            };
            vec![ListItem::new(Span::styled(
                hint,
                Style::default().fg(Color::DarkGray),
            ))]
        } else {
            state
                .results
                .iter()
                .map(|hit| {
                    ListItem::new(Line::from(vec![
                        Span::styled(
                            format!("{}:{:<4} ", codec.stem(hit.source_date), hit.line_number),
                            Style::default().fg(if hit.distance == 0 {
                                Color::LightYellow
                            } else {
                                Color::Gray
                            }),
                        ),
                        Span::raw(truncate_text(&hit.snippet, width)),
                    ]))
                })
                .collect()
        };
        let mut list_state = ListState::default();
        if !state.results.is_empty() {
            list_state.select(Some(state.selected));
        }
        let list = List::new(items).highlight_style(
            Style::default()
                .bg(Color::LightCyan)
                .fg(Color::Black)
                .add_modifier(Modifier::BOLD),
        );
        f.render_stateful_widget(list, rows[1], &mut list_state);
    }

    fn draw_help(&self, f: &mut ratatui::Frame<'_>) {
        let area = centered_rect(60, 70, f.size());
        let keys = [
            ("Ctrl+S", "save now"),
            ("Ctrl+N / Ctrl+P", "next / previous day"),
            ("Ctrl+F / Ctrl+B", "next / previous week"),
            ("Ctrl+T", "today"),
            ("Ctrl+C", "calendar"),
            ("Ctrl+G", "search all notes"),
            ("Ctrl+D", "finish the todo under the cursor"),
            ("Tab", "switch between note and todo list"),
            ("Enter / x", "open / finish the selected todo"),
            ("Ctrl+Q", "save and quit"),
        ];
        let mut lines: Vec<Line<'static>> = keys
            .iter()
            .map(|(key, what)| {
                Line::from(vec![
                    Span::styled(format!("{:>16}  ", key), Style::default().fg(Color::LightCyan)),
                    Span::raw(*what),
                ])
            })
            .collect();
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            "Lines starting with ## are todos; ## ~~text~~ is done.",
            Style::default().fg(Color::Gray),
        )));
        if let Some((level, dir)) = logging::logging_status() {
            lines.push(Line::from(Span::styled(
                format!("Logs ({}): {}", level, dir.display()),
                Style::default().fg(Color::DarkGray),
            )));
        }
        let dialog = Paragraph::new(lines)
            .block(overlay_block("Help"))
            .wrap(Wrap { trim: false });
        f.render_widget(Clear, area);
        f.render_widget(dialog, area);
    }
}

fn pane_block(title: &str, focused: bool) -> Block<'static> {
    Block::default()
        .title(Span::styled(
            title.to_string(),
            Style::default()
                .fg(if focused { Color::Cyan } else { Color::Gray })
                .add_modifier(Modifier::BOLD),
        ))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(if focused {
            Color::Cyan
        } else {
            Color::DarkGray
        }))
}

fn overlay_block(title: &'static str) -> Block<'static> {
    Block::default()
        .title(Span::styled(
            title,
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        ))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
}

fn line_style(idx: usize, line: &str) -> Style {
    if idx == 0 && line.starts_with('#') {
        return Style::default()
            .fg(Color::Cyan)
            .add_modifier(Modifier::BOLD);
    }
    match todo::classify(line) {
        Some(task) if task.done => Style::default()
            .fg(Color::DarkGray)
            .add_modifier(Modifier::CROSSED_OUT),
        Some(_) => Style::default().fg(Color::LightYellow),
        None => Style::default(),
    }
}

fn insert_char(session: &mut EditorSession, ch: char) {
    let at = byte_offset(&session.buffer, session.cursor);
    session.buffer.insert(at, ch);
    session.cursor = cursor_at(&session.buffer, at + ch.len_utf8());
}

fn backspace(session: &mut EditorSession) {
    let at = byte_offset(&session.buffer, session.cursor);
    if at == 0 {
        return;
    }
    let prev = prev_grapheme(at, &session.buffer);
    session.buffer.drain(prev..at);
    session.cursor = cursor_at(&session.buffer, prev);
}

fn delete_forward(session: &mut EditorSession) {
    let at = byte_offset(&session.buffer, session.cursor);
    if at >= session.buffer.len() {
        return;
    }
    let next = next_grapheme(at, &session.buffer);
    session.buffer.drain(at..next);
    session.cursor = cursor_at(&session.buffer, at);
}

fn move_cursor(session: &mut EditorSession, motion: Motion) {
    let text = &session.buffer;
    let cursor = session.cursor.clamped_to(text);
    session.cursor = match motion {
        Motion::Left => cursor_at(text, prev_grapheme(byte_offset(text, cursor), text)),
        Motion::Right => {
            let at = byte_offset(text, cursor);
            if at >= text.len() {
                cursor
            } else {
                cursor_at(text, next_grapheme(at, text))
            }
        }
        Motion::Up => Cursor::new(cursor.line.saturating_sub(1), cursor.column).clamped_to(text),
        Motion::Down => Cursor::new(cursor.line + 1, cursor.column).clamped_to(text),
        Motion::Home => Cursor::new(cursor.line, 0),
        Motion::End => Cursor::new(cursor.line, usize::MAX).clamped_to(text),
        Motion::PageUp => Cursor::new(cursor.line.saturating_sub(10), cursor.column).clamped_to(text),
        Motion::PageDown => Cursor::new(cursor.line + 10, cursor.column).clamped_to(text),
    };
}

/// Byte index of `cursor` inside `text`, clamped to the text.
fn byte_offset(text: &str, cursor: Cursor) -> usize {
    let starts = line_starts(text);
    let line = cursor.line.min(starts.len() - 1);
    index_at_col(text, start_of_line(line, &starts), cursor.column)
}

fn cursor_at(text: &str, offset: usize) -> Cursor {
    let (_, line, column) = line_state(text, offset.min(text.len()));
    Cursor::new(line, column)
}

fn setup_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>> {
    enable_raw_mode()?;
    let mut stdout = stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let terminal = Terminal::new(backend)?;
    Ok(terminal)
}

fn teardown_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    Ok(())
}

fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}

fn adjust_offset(
    selected: usize,
    current_offset: usize,
    viewport: usize,
    scrolloff: usize,
    len: usize,
) -> usize {
    if viewport == 0 || len == 0 {
        return 0;
    }
    let max_offset = len.saturating_sub(viewport);
    let margin = scrolloff.min(viewport.saturating_sub(1));
    let mut offset = current_offset.min(max_offset);
    if selected < offset.saturating_add(margin) {
        offset = selected.saturating_sub(margin);
    } else {
        let upper = offset
            .saturating_add(viewport.saturating_sub(1))
            .saturating_sub(margin);
        if selected > upper {
            offset = selected.saturating_add(margin + 1).saturating_sub(viewport);
        }
    }
    offset.min(max_offset)
}

fn days_in_month(year: i32, month: u32) -> u32 {
    NaiveDate::from_ymd_opt(year, month, 1)
        .and_then(|first| first.checked_add_months(Months::new(1)))
        .and_then(|next| next.pred_opt())
        .map(|last| last.day())
        .unwrap_or(28)
}

fn prev_grapheme(cursor: usize, text: &str) -> usize {
    if cursor == 0 {
        return 0;
    }
    let mut prev = 0;
    for (idx, _) in text.char_indices() {
        if idx >= cursor {
            break;
        }
        prev = idx;
    }
    prev
}

fn next_grapheme(cursor: usize, text: &str) -> usize {
    for (idx, ch) in text.char_indices() {
        if idx > cursor {
            return idx;
        }
        if idx == cursor {
            return cursor + ch.len_utf8();
        }
    }
    text.len()
}

fn line_starts(text: &str) -> Vec<usize> {
    let mut starts = vec![0];
    for (idx, ch) in text.char_indices() {
        if ch == '\n' {
            starts.push(idx + 1);
        }
    }
    starts
}

fn line_state(text: &str, cursor: usize) -> (Vec<usize>, usize, usize) {
    let starts = line_starts(text);
    let mut line_idx = 0;
    for (i, start) in starts.iter().enumerate() {
        if *start <= cursor {
            line_idx = i;
        } else {
            break;
        }
    }
    let col = text[start_of_line(line_idx, &starts)..cursor]
        .chars()
        .count();
    (starts, line_idx, col)
}

fn start_of_line(line_idx: usize, starts: &[usize]) -> usize {
    *starts.get(line_idx).unwrap_or(&0)
}

fn index_at_col(text: &str, start: usize, target_col: usize) -> usize {
    let slice = &text[start..];
    let limit = slice.find('\n').unwrap_or(slice.len());
    let mut col = 0;
    for (idx, _) in slice[..limit].char_indices() {
        if col == target_col {
            return start + idx;
        }
        col += 1;
    }
    start + limit
}

fn truncate_text(text: &str, max: usize) -> String {
    if max == 0 {
        return String::new();
    }
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max.saturating_sub(1)).collect();
    out.push('…');
    out
}
