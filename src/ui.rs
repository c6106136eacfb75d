use std::cell::Cell;
use std::collections::VecDeque;
use std::io::{self, Stdout};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::Result;
use crossbeam_channel::{unbounded, Receiver, Sender};
use crossterm::event::{
    self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEventKind, MouseButton,
    MouseEvent, MouseEventKind,
};
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::ExecutableCommand;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Wrap};
use ratatui::{Frame, Terminal};
use textwrap::wrap;
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use crate::gallery::Post;
use crate::links::LinkDecoder;
use crate::notify::{self, Signal};
use crate::overlay::{CloseEvent, Overlay};
use crate::storage;
use crate::sync::{SyncProgress, SyncReport, Synchronizer};
use crate::view::{self, AppState, Location};

const COLOR_BG: Color = Color::Rgb(30, 30, 46);
const COLOR_PANEL_BG: Color = Color::Rgb(24, 24, 36);
const COLOR_PANEL_SELECTED_BG: Color = Color::Rgb(69, 71, 90);
const COLOR_BORDER_IDLE: Color = Color::Rgb(49, 50, 68);
const COLOR_BORDER_FOCUSED: Color = Color::Rgb(137, 180, 250);
const COLOR_TEXT_PRIMARY: Color = Color::Rgb(205, 214, 244);
const COLOR_TEXT_SECONDARY: Color = Color::Rgb(166, 173, 200);
const COLOR_ACCENT: Color = Color::Rgb(137, 180, 250);
const COLOR_SUCCESS: Color = Color::Rgb(166, 227, 161);
const COLOR_ERROR: Color = Color::Rgb(243, 139, 168);

const SPINNER_FRAMES: [&str; 10] = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];
const CELL_WIDTH: u16 = 28;
const CELL_HEIGHT: u16 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pane {
    Categories,
    Grid,
}

impl Pane {
    fn title(self) -> &'static str {
        match self {
            Pane::Categories => "Categories",
            Pane::Grid => "Gallery",
        }
    }

    fn toggle(self) -> Self {
        match self {
            Pane::Categories => Pane::Grid,
            Pane::Grid => Pane::Categories,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Transition {
    Filter { category: String, save: bool },
    Next,
    Previous,
}

struct PendingTransition {
    due: Instant,
    transition: Transition,
}

struct PendingSync {
    request_id: u64,
    progress: Option<SyncProgress>,
}

enum AsyncResponse {
    Progress {
        request_id: u64,
        progress: SyncProgress,
    },
    Synced {
        request_id: u64,
        result: Result<SyncReport>,
    },
}

struct OverlayView {
    overlay: Overlay,
    selected: usize,
}

struct Spinner {
    index: usize,
    last_tick: Instant,
}

impl Spinner {
    fn new() -> Self {
        Self {
            index: 0,
            last_tick: Instant::now(),
        }
    }

    fn frame(&self) -> &'static str {
        SPINNER_FRAMES[self.index % SPINNER_FRAMES.len()]
    }

    fn advance(&mut self) -> bool {
        let now = Instant::now();
        if now.duration_since(self.last_tick) >= Duration::from_millis(120) {
            self.index = (self.index + 1) % SPINNER_FRAMES.len();
            self.last_tick = now;
            true
        } else {
            false
        }
    }

    fn reset(&mut self) {
        self.index = 0;
        self.last_tick = Instant::now();
    }
}

pub struct Options {
    pub status_message: String,
    pub synchronizer: Option<Arc<Synchronizer>>,
    pub store: Arc<storage::Store>,
    pub decoder: LinkDecoder,
    pub fragment: Option<String>,
    pub transition_delay: Duration,
    pub background_sync: bool,
    pub signal_tx: Sender<Signal>,
    pub signal_rx: Receiver<Signal>,
}

pub struct Model {
    status_message: String,
    state: AppState,
    location: Location,
    categories: Vec<String>,
    nav_index: usize,
    focused_pane: Pane,
    selected: usize,
    overlay: Option<OverlayView>,
    overlay_area: Cell<Option<Rect>>,
    grid_columns: Cell<usize>,
    grid_offset: Cell<usize>,
    pending_sync: Option<PendingSync>,
    pending_transitions: VecDeque<PendingTransition>,
    transition_delay: Duration,
    synchronizer: Option<Arc<Synchronizer>>,
    store: Arc<storage::Store>,
    decoder: LinkDecoder,
    background_sync: bool,
    background_registered: bool,
    signal_tx: Sender<Signal>,
    signal_rx: Receiver<Signal>,
    response_tx: Sender<AsyncResponse>,
    response_rx: Receiver<AsyncResponse>,
    next_request_id: u64,
    needs_redraw: bool,
    spinner: Spinner,
}

impl Model {
    pub fn new(opts: Options) -> Self {
        let (response_tx, response_rx) = unbounded();
        let mut model = Self {
            status_message: opts.status_message,
            state: AppState::new(),
            location: Location::from_fragment(opts.fragment.as_deref()),
            categories: vec![view::HOME.to_string()],
            nav_index: 0,
            focused_pane: Pane::Grid,
            selected: 0,
            overlay: None,
            overlay_area: Cell::new(None),
            grid_columns: Cell::new(1),
            grid_offset: Cell::new(0),
            pending_sync: None,
            pending_transitions: VecDeque::new(),
            transition_delay: opts.transition_delay,
            synchronizer: opts.synchronizer,
            store: opts.store,
            decoder: opts.decoder,
            background_sync: opts.background_sync,
            background_registered: false,
            signal_tx: opts.signal_tx,
            signal_rx: opts.signal_rx,
            response_tx,
            response_rx,
            next_request_id: 1,
            needs_redraw: true,
            spinner: Spinner::new(),
        };
        model.reload();
        model
    }

    pub fn run(&mut self) -> Result<()> {
        let mut stdout = io::stdout();
        enable_raw_mode()?;
        stdout.execute(EnterAlternateScreen)?;
        stdout.execute(EnableMouseCapture)?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;
        terminal.clear()?;

        let result = self.event_loop(&mut terminal);

        disable_raw_mode()?;
        terminal.backend_mut().execute(DisableMouseCapture)?;
        terminal.backend_mut().execute(LeaveAlternateScreen)?;
        terminal.show_cursor()?;

        result
    }

    fn event_loop(&mut self, terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
        let mut last_tick = Instant::now();
        let tick_rate = Duration::from_millis(120);

        loop {
            if self.poll_background() {
                self.mark_dirty();
            }

            if self.needs_redraw {
                terminal.draw(|frame| self.draw(frame))?;
                self.needs_redraw = false;
            }

            let timeout = tick_rate
                .checked_sub(last_tick.elapsed())
                .unwrap_or_else(|| Duration::from_millis(16));

            if event::poll(timeout)? {
                match event::read()? {
                    Event::Key(key) if key.kind == KeyEventKind::Press => {
                        match self.handle_key(key.code) {
                            Ok(true) => break,
                            Ok(false) => {}
                            Err(err) => {
                                self.status_message = format!("Error: {}", err);
                                self.mark_dirty();
                            }
                        }
                    }
                    Event::Mouse(mouse) => self.handle_mouse(mouse),
                    Event::Resize(_, _) => self.mark_dirty(),
                    _ => {}
                }
            }

            if self.poll_background() {
                self.mark_dirty();
            }

            if last_tick.elapsed() >= tick_rate {
                last_tick = Instant::now();
                if self.is_loading() {
                    if self.spinner.advance() {
                        self.mark_dirty();
                    }
                } else {
                    self.spinner.reset();
                }
            }
        }

        Ok(())
    }

    fn mark_dirty(&mut self) {
        self.needs_redraw = true;
    }

    fn is_loading(&self) -> bool {
        self.pending_sync.is_some() || !self.pending_transitions.is_empty()
    }

    /// Drains sync results and notifier signals, then applies a due transition.
    fn poll_background(&mut self) -> bool {
        let mut changed = false;
        while let Ok(message) = self.response_rx.try_recv() {
            self.handle_async_response(message);
            changed = true;
        }
        while let Ok(signal) = self.signal_rx.try_recv() {
            match signal {
                Signal::ContentUpdated => {
                    tracing::info!("content updated; reloading");
                    self.reload();
                    changed = true;
                }
            }
        }
        if self.apply_due_transition(Instant::now()) {
            changed = true;
        }
        changed
    }

    /// Discards every piece of view state and synchronizes from scratch.
    fn reload(&mut self) {
        self.state.clear();
        self.categories = vec![view::HOME.to_string()];
        self.nav_index = 0;
        self.selected = 0;
        self.grid_offset.set(0);
        self.overlay = None;
        self.pending_transitions.clear();
        self.mark_dirty();

        let Some(synchronizer) = self.synchronizer.clone() else {
            self.pending_sync = None;
            self.schedule(Transition::Filter {
                category: self.location.category(),
                save: false,
            });
            return;
        };

        let request_id = self.next_request_id;
        self.next_request_id = self.next_request_id.wrapping_add(1);
        self.pending_sync = Some(PendingSync {
            request_id,
            progress: None,
        });
        self.status_message = "Synchronizing gallery…".to_string();
        self.spinner.reset();

        let tx = self.response_tx.clone();
        thread::spawn(move || {
            let progress_tx = tx.clone();
            let result = synchronizer.synchronize(|progress| {
                let _ = progress_tx.send(AsyncResponse::Progress {
                    request_id,
                    progress,
                });
            });
            let _ = tx.send(AsyncResponse::Synced { request_id, result });
        });
    }

    fn handle_async_response(&mut self, message: AsyncResponse) {
        match message {
            AsyncResponse::Progress {
                request_id,
                progress,
            } => {
                if let Some(pending) = self.pending_sync.as_mut() {
                    if pending.request_id == request_id {
                        pending.progress = Some(progress);
                    }
                }
            }
            AsyncResponse::Synced { request_id, result } => {
                let Some(pending) = &self.pending_sync else {
                    return;
                };
                if pending.request_id != request_id {
                    return;
                }
                self.pending_sync = None;
                match result {
                    Ok(report) => self.apply_sync_report(report),
                    Err(err) => {
                        tracing::error!(error = %format!("{err:#}"), "synchronization failed");
                        self.status_message = format!("Failed to load posts: {err}");
                    }
                }
                self.schedule(Transition::Filter {
                    category: self.location.category(),
                    save: false,
                });
            }
        }
    }

    fn apply_sync_report(&mut self, report: SyncReport) {
        let total = report.posts.len();
        let fetched = report.fetched.len();
        self.state.replace_posts(report.posts);
        self.categories = self.state.categories();
        self.status_message = if fetched > 0 {
            format!("Loaded {total} posts ({fetched} new).")
        } else {
            format!("Loaded {total} posts.")
        };
        self.register_background_sync();
    }

    fn register_background_sync(&mut self) {
        if !self.background_sync || self.background_registered {
            return;
        }
        let Some(synchronizer) = self.synchronizer.clone() else {
            return;
        };
        self.background_registered = true;
        if let Err(err) = notify::register_background_sync(synchronizer, self.signal_tx.clone()) {
            tracing::error!(error = %err, "could not register background sync");
        }
    }

    /// Queues a transition. Each one runs after its own delay, in order.
    fn schedule(&mut self, transition: Transition) {
        self.pending_transitions.push_back(PendingTransition {
            due: Instant::now() + self.transition_delay,
            transition,
        });
        if self.transition_delay.is_zero() {
            self.apply_due_transition(Instant::now());
        }
        self.mark_dirty();
    }

    fn apply_due_transition(&mut self, now: Instant) -> bool {
        let mut applied = false;
        while self
            .pending_transitions
            .front()
            .is_some_and(|pending| pending.due <= now)
        {
            if let Some(pending) = self.pending_transitions.pop_front() {
                self.apply_transition(pending.transition);
                applied = true;
            }
        }
        applied
    }

    fn apply_transition(&mut self, transition: Transition) {
        match transition {
            Transition::Filter { category, save } => {
                self.state.filter(&category);
                self.selected = 0;
                self.grid_offset.set(0);
                if save && self.location.push(&category) {
                    self.persist_location();
                }
                self.sync_nav_with_category();
                if self.state.posts().is_empty() && self.pending_sync.is_none() {
                    return;
                }
                self.status_message = format!(
                    "{} · {} post(s)",
                    display_category(self.state.view().category()),
                    self.state.view().filtered_len()
                );
            }
            Transition::Next => {
                if self.state.next_page() {
                    self.selected = 0;
                    self.grid_offset.set(0);
                }
            }
            Transition::Previous => {
                if self.state.previous_page() {
                    self.selected = 0;
                    self.grid_offset.set(0);
                }
            }
        }
        self.mark_dirty();
    }

    fn persist_location(&self) {
        if let Some(fragment) = self.location.fragment() {
            if let Err(err) = self.store.set_location(fragment) {
                tracing::warn!(error = %err, "could not save location");
            }
        }
    }

    fn sync_nav_with_category(&mut self) {
        let category = self.state.view().category();
        let active = if view::is_unfiltered(category) {
            Some(0)
        } else {
            self.categories
                .iter()
                .position(|name| !view::is_unfiltered(name) && name.eq_ignore_ascii_case(category))
        };
        if let Some(index) = active {
            self.nav_index = index;
        }
    }

    fn go_back(&mut self) {
        match self.location.back() {
            Some(category) => {
                self.persist_location();
                self.schedule(Transition::Filter {
                    category,
                    save: false,
                });
            }
            None => {
                self.status_message = "No earlier category.".to_string();
                self.mark_dirty();
            }
        }
    }

    fn handle_key(&mut self, code: KeyCode) -> Result<bool> {
        if self.overlay.is_some() {
            self.handle_overlay_key(code);
            return Ok(false);
        }

        match code {
            KeyCode::Char('q') => return Ok(true),
            KeyCode::Tab | KeyCode::BackTab => {
                self.focused_pane = self.focused_pane.toggle();
                self.status_message = format!("Focus: {}", self.focused_pane.title());
            }
            KeyCode::Char('r') => {
                self.status_message = "Refreshing…".to_string();
                self.reload();
            }
            KeyCode::Char('n') | KeyCode::PageDown => self.schedule(Transition::Next),
            KeyCode::Char('p') | KeyCode::PageUp => self.schedule(Transition::Previous),
            KeyCode::Char('b') | KeyCode::Backspace => self.go_back(),
            _ => match self.focused_pane {
                Pane::Categories => self.handle_categories_key(code),
                Pane::Grid => self.handle_grid_key(code),
            },
        }
        self.mark_dirty();
        Ok(false)
    }

    fn handle_categories_key(&mut self, code: KeyCode) {
        match code {
            KeyCode::Up | KeyCode::Char('k') => {
                self.nav_index = self.nav_index.saturating_sub(1);
            }
            KeyCode::Down | KeyCode::Char('j') => {
                if self.nav_index + 1 < self.categories.len() {
                    self.nav_index += 1;
                }
            }
            KeyCode::Enter | KeyCode::Right | KeyCode::Char('l') => {
                if let Some(category) = self.categories.get(self.nav_index).cloned() {
                    self.focused_pane = Pane::Grid;
                    self.schedule(Transition::Filter {
                        category,
                        save: true,
                    });
                }
            }
            _ => {}
        }
    }

    fn handle_grid_key(&mut self, code: KeyCode) {
        let count = self.state.current_page_posts().len();
        let columns = self.grid_columns.get().max(1);
        match code {
            KeyCode::Left | KeyCode::Char('h') => {
                if self.selected == 0 {
                    self.focused_pane = Pane::Categories;
                } else {
                    self.selected -= 1;
                }
            }
            KeyCode::Right | KeyCode::Char('l') => {
                if self.selected + 1 < count {
                    self.selected += 1;
                }
            }
            KeyCode::Up | KeyCode::Char('k') => {
                self.selected = self.selected.saturating_sub(columns);
            }
            KeyCode::Down | KeyCode::Char('j') => {
                if self.selected + columns < count {
                    self.selected += columns;
                } else if count > 0 {
                    self.selected = count - 1;
                }
            }
            KeyCode::Enter | KeyCode::Char('o') => self.open_overlay(),
            _ => {}
        }
    }

    fn open_overlay(&mut self) {
        let posts = self.state.current_page_posts();
        let Some(post) = posts.get(self.selected) else {
            return;
        };
        let overlay = Overlay::open(post, &self.decoder);
        self.status_message = format!("{} · Enter opens a link · Esc closes", post.title);
        self.overlay = Some(OverlayView {
            overlay,
            selected: 0,
        });
    }

    fn close_overlay(&mut self, event: CloseEvent) {
        if Overlay::close(event) && self.overlay.take().is_some() {
            self.overlay_area.set(None);
            self.status_message = "Details closed.".to_string();
            self.mark_dirty();
        }
    }

    fn handle_overlay_key(&mut self, code: KeyCode) {
        let Some(view) = self.overlay.as_mut() else {
            return;
        };
        let count = view.overlay.entry_count();
        match code {
            KeyCode::Esc | KeyCode::Char('q') | KeyCode::Char('x') => {
                self.close_overlay(CloseEvent::CloseControl);
                return;
            }
            KeyCode::Up | KeyCode::Char('k') => {
                view.selected = view.selected.saturating_sub(1);
            }
            KeyCode::Down | KeyCode::Char('j') => {
                if view.selected + 1 < count {
                    view.selected += 1;
                }
            }
            KeyCode::Enter | KeyCode::Char('o') => self.open_selected_link(),
            _ => {}
        }
        self.mark_dirty();
    }

    fn open_selected_link(&mut self) {
        let Some(view) = self.overlay.as_ref() else {
            return;
        };
        let entries = view.overlay.entries();
        let Some(entry) = entries.get(view.selected) else {
            self.status_message = "No links for this post.".to_string();
            return;
        };
        if !entry.is_navigable() {
            self.status_message = format!("{} has no usable link.", entry.label);
            return;
        }

        let label = entry.label.clone();
        let url = entry.url.clone();
        self.status_message = match webbrowser::open(&url) {
            Ok(_) => format!("Opened {label} in your browser."),
            Err(err) => {
                tracing::warn!(%url, error = %err, "could not open link");
                format!("Failed to open {label}: {err} (URL: {url})")
            }
        };
    }

    fn handle_mouse(&mut self, mouse: MouseEvent) {
        if !matches!(mouse.kind, MouseEventKind::Down(MouseButton::Left)) {
            return;
        }
        if self.overlay.is_none() {
            return;
        }
        let inside = self
            .overlay_area
            .get()
            .map(|area| rect_contains(area, mouse.column, mouse.row))
            .unwrap_or(false);
        if inside {
            self.close_overlay(CloseEvent::Inside);
        } else {
            self.close_overlay(CloseEvent::Backdrop);
        }
    }

    fn draw(&mut self, frame: &mut Frame<'_>) {
        let area = frame.size();
        frame.render_widget(Block::default().style(Style::default().bg(COLOR_BG)), area);

        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(1),
                Constraint::Min(3),
                Constraint::Length(2),
            ])
            .split(area);

        self.draw_header(frame, rows[0]);

        let body = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(22), Constraint::Percentage(78)])
            .split(rows[1]);
        self.draw_categories(frame, body[0]);
        self.draw_grid(frame, body[1]);
        self.draw_footer(frame, rows[2]);

        if self.overlay.is_some() {
            self.draw_overlay(frame, area);
        } else {
            self.overlay_area.set(None);
        }
        if self.is_loading() {
            self.draw_loader(frame, area);
        }
    }

    fn draw_header(&self, frame: &mut Frame<'_>, area: Rect) {
        let view = self.state.view();
        let total_pages = view.total_pages().max(1);
        let mut spans = vec![
            Span::styled(
                " Gallery ",
                Style::default()
                    .fg(COLOR_BG)
                    .bg(COLOR_ACCENT)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::styled(
                format!(
                    "  {}  ·  page {}/{}  ·  {} post(s)",
                    display_category(view.category()),
                    view.page(),
                    total_pages,
                    view.filtered_len()
                ),
                Style::default().fg(COLOR_TEXT_PRIMARY),
            ),
        ];
        if self.location.can_go_back() {
            spans.push(Span::styled(
                "  ·  b back",
                Style::default().fg(COLOR_TEXT_SECONDARY),
            ));
        }
        frame.render_widget(
            Paragraph::new(Line::from(spans)).style(Style::default().bg(COLOR_BG)),
            area,
        );
    }

    fn pane_block(&self, pane: Pane) -> Block<'static> {
        let focused = self.focused_pane == pane && self.overlay.is_none();
        let border = if focused {
            COLOR_BORDER_FOCUSED
        } else {
            COLOR_BORDER_IDLE
        };
        Block::default()
            .title(Span::styled(
                pane.title(),
                Style::default().fg(border).add_modifier(Modifier::BOLD),
            ))
            .borders(Borders::ALL)
            .border_style(Style::default().fg(border))
            .style(Style::default().bg(COLOR_PANEL_BG))
    }

    fn draw_categories(&self, frame: &mut Frame<'_>, area: Rect) {
        let active = self.state.view().category();
        let items: Vec<ListItem> = self
            .categories
            .iter()
            .map(|name| {
                let is_active = if view::is_unfiltered(active) {
                    view::is_unfiltered(name)
                } else {
                    !view::is_unfiltered(name) && name.eq_ignore_ascii_case(active)
                };
                let style = if is_active {
                    Style::default()
                        .fg(COLOR_SUCCESS)
                        .add_modifier(Modifier::BOLD)
                } else {
                    Style::default().fg(COLOR_TEXT_PRIMARY)
                };
                ListItem::new(Line::from(Span::styled(display_category(name), style)))
            })
            .collect();

        let list = List::new(items)
            .block(self.pane_block(Pane::Categories))
            .highlight_style(
                Style::default()
                    .bg(COLOR_PANEL_SELECTED_BG)
                    .add_modifier(Modifier::BOLD),
            )
            .highlight_symbol("▶ ");

        let mut state = ListState::default();
        if !self.categories.is_empty() {
            state.select(Some(self.nav_index.min(self.categories.len() - 1)));
        }
        frame.render_stateful_widget(list, area, &mut state);
    }

    fn draw_grid(&self, frame: &mut Frame<'_>, area: Rect) {
        let block = self.pane_block(Pane::Grid);
        let inner = block.inner(area);
        frame.render_widget(block, area);

        let posts = self.state.current_page_posts();
        if posts.is_empty() {
            let message = if self.pending_sync.is_some() {
                "Loading posts…"
            } else {
                "No posts to show."
            };
            frame.render_widget(
                Paragraph::new(message)
                    .alignment(Alignment::Center)
                    .style(
                        Style::default()
                            .fg(COLOR_TEXT_SECONDARY)
                            .add_modifier(Modifier::ITALIC),
                    ),
                inner,
            );
            return;
        }

        let (columns, visible_rows) = grid_dimensions(inner);
        self.grid_columns.set(columns);
        let selected_row = self.selected / columns;
        let mut offset = self.grid_offset.get();
        if selected_row < offset {
            offset = selected_row;
        } else if selected_row >= offset + visible_rows {
            offset = selected_row + 1 - visible_rows;
        }
        self.grid_offset.set(offset);

        for (index, post) in posts.iter().enumerate() {
            let row = index / columns;
            if row < offset || row >= offset + visible_rows {
                continue;
            }
            let col = index % columns;
            let cell = Rect {
                x: inner.x + (col as u16) * CELL_WIDTH,
                y: inner.y + ((row - offset) as u16) * CELL_HEIGHT,
                width: CELL_WIDTH.min(inner.width),
                height: CELL_HEIGHT,
            };
            self.draw_cell(frame, cell, post, index == self.selected);
        }
    }

    fn draw_cell(&self, frame: &mut Frame<'_>, area: Rect, post: &Post, selected: bool) {
        let border = if selected && self.focused_pane == Pane::Grid {
            COLOR_BORDER_FOCUSED
        } else {
            COLOR_BORDER_IDLE
        };
        let bg = if selected {
            COLOR_PANEL_SELECTED_BG
        } else {
            COLOR_PANEL_BG
        };
        let width = area.width.saturating_sub(2) as usize;
        let lines = vec![
            Line::from(Span::styled(
                truncate_to_width(&post.title, width),
                Style::default()
                    .fg(COLOR_TEXT_PRIMARY)
                    .add_modifier(Modifier::BOLD),
            )),
            Line::from(Span::styled(
                truncate_to_width(post.genre.as_deref().unwrap_or("—"), width),
                Style::default().fg(COLOR_ACCENT),
            )),
            Line::from(Span::styled(
                truncate_to_width(&post.date, width),
                Style::default().fg(COLOR_TEXT_SECONDARY),
            )),
        ];
        let paragraph = Paragraph::new(Text::from(lines)).block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(border))
                .style(Style::default().bg(bg)),
        );
        frame.render_widget(paragraph, area);
    }

    fn draw_footer(&self, frame: &mut Frame<'_>, area: Rect) {
        let status_style = if self.status_message.starts_with("Failed")
            || self.status_message.starts_with("Error")
        {
            Style::default().fg(COLOR_ERROR)
        } else {
            Style::default().fg(COLOR_TEXT_PRIMARY)
        };
        let lines = vec![
            Line::from(Span::styled(self.status_message.clone(), status_style)),
            Line::from(Span::styled(
                self.footer_text(),
                Style::default()
                    .fg(COLOR_TEXT_SECONDARY)
                    .add_modifier(Modifier::ITALIC),
            )),
        ];
        frame.render_widget(
            Paragraph::new(Text::from(lines)).style(Style::default().bg(COLOR_BG)),
            area,
        );
    }

    fn draw_overlay(&self, frame: &mut Frame<'_>, area: Rect) {
        let Some(view) = self.overlay.as_ref() else {
            return;
        };
        let popup_area = centered_rect(70, 70, area);
        self.overlay_area.set(Some(popup_area));
        frame.render_widget(Clear, popup_area);

        let width = popup_area.width.saturating_sub(4).max(10) as usize;
        let mut lines: Vec<Line<'static>> = vec![Line::from(Span::styled(
            format!("[image: {}]", view.overlay.image),
            Style::default().fg(COLOR_TEXT_SECONDARY),
        ))];
        lines.push(Line::default());
        for chunk in wrap(&view.overlay.title, width) {
            lines.push(Line::from(Span::styled(
                chunk.into_owned(),
                Style::default()
                    .fg(COLOR_TEXT_PRIMARY)
                    .add_modifier(Modifier::BOLD),
            )));
        }

        let mut entry_index = 0usize;
        let mut selected_line = 0usize;
        for section in &view.overlay.sections {
            lines.push(Line::default());
            lines.push(Line::from(Span::styled(
                section.heading(),
                Style::default()
                    .fg(COLOR_ACCENT)
                    .add_modifier(Modifier::BOLD),
            )));
            for entry in &section.entries {
                let selected = entry_index == view.selected;
                if selected {
                    selected_line = lines.len();
                }
                let marker = if selected { "▶ " } else { "  " };
                let style = if selected {
                    Style::default()
                        .fg(COLOR_TEXT_PRIMARY)
                        .bg(COLOR_PANEL_SELECTED_BG)
                        .add_modifier(Modifier::BOLD)
                } else {
                    Style::default().fg(COLOR_TEXT_PRIMARY)
                };
                let url_style = if entry.is_navigable() {
                    Style::default().fg(COLOR_SUCCESS)
                } else {
                    Style::default().fg(COLOR_ERROR)
                };
                lines.push(Line::from(vec![
                    Span::styled(format!("{marker}{}", entry.label), style),
                    Span::raw("  "),
                    Span::styled(
                        truncate_to_width(&entry.url, width.saturating_sub(entry.label.width() + 4)),
                        url_style,
                    ),
                ]));
                entry_index += 1;
            }
        }
        if view.overlay.sections.is_empty() {
            lines.push(Line::default());
            lines.push(Line::from(Span::styled(
                "No download links.",
                Style::default()
                    .fg(COLOR_TEXT_SECONDARY)
                    .add_modifier(Modifier::ITALIC),
            )));
        }

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(1), Constraint::Length(1)])
            .split(popup_area);

        let inner_height = chunks[0].height.saturating_sub(2) as usize;
        let scroll = selected_line.saturating_sub(inner_height.saturating_sub(1)) as u16;

        let body = Paragraph::new(Text::from(lines))
            .block(
                Block::default()
                    .title(Span::styled(
                        "Details",
                        Style::default()
                            .fg(COLOR_ACCENT)
                            .add_modifier(Modifier::BOLD),
                    ))
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(COLOR_ACCENT))
                    .style(Style::default().bg(COLOR_PANEL_BG)),
            )
            .wrap(Wrap { trim: false })
            .scroll((scroll, 0));
        frame.render_widget(body, chunks[0]);

        let instructions = Paragraph::new("j/k move · Enter open · Esc/q/x close · click outside closes")
            .alignment(Alignment::Center)
            .style(
                Style::default()
                    .fg(COLOR_TEXT_SECONDARY)
                    .bg(COLOR_PANEL_BG)
                    .add_modifier(Modifier::ITALIC),
            );
        frame.render_widget(instructions, chunks[1]);
    }

    fn draw_loader(&self, frame: &mut Frame<'_>, area: Rect) {
        let popup = centered_rect(30, 20, area);
        let popup = Rect {
            height: 3.min(area.height),
            ..popup
        };
        frame.render_widget(Clear, popup);
        let label = match self.pending_sync.as_ref().and_then(|p| p.progress) {
            Some(progress) => format!("{} Loading… {}%", self.spinner.frame(), progress.percent),
            None => format!("{} Loading…", self.spinner.frame()),
        };
        frame.render_widget(
            Paragraph::new(label)
                .alignment(Alignment::Center)
                .style(Style::default().fg(COLOR_TEXT_PRIMARY))
                .block(
                    Block::default()
                        .borders(Borders::ALL)
                        .border_style(Style::default().fg(COLOR_ACCENT))
                        .style(Style::default().bg(COLOR_PANEL_BG)),
                ),
            popup,
        );
    }

    fn footer_text(&self) -> String {
        if self.overlay.is_some() {
            return "Details: j/k move · Enter open link · Esc close".to_string();
        }

        let mut parts: Vec<String> = Vec::new();
        match self.focused_pane {
            Pane::Categories => parts.push("Categories: j/k move, Enter filter".to_string()),
            Pane::Grid => {
                if self.state.current_page_posts().is_empty() {
                    parts.push("Gallery: nothing here yet".to_string());
                } else {
                    parts.push("Gallery: arrows/hjkl move, Enter details".to_string());
                }
            }
        }
        parts.push("n/p page".to_string());
        parts.push("Tab switch pane".to_string());
        if self.location.can_go_back() {
            parts.push("b back".to_string());
        }
        if self.pending_sync.is_some() {
            parts.push("Synchronizing…".to_string());
        }
        parts.push("r refresh".to_string());
        parts.push("q quit".to_string());
        parts.join(" · ")
    }
}

fn display_category(category: &str) -> String {
    if view::is_unfiltered(category) {
        "Home".to_string()
    } else {
        category.to_string()
    }
}

fn grid_dimensions(area: Rect) -> (usize, usize) {
    let columns = (area.width / CELL_WIDTH).max(1) as usize;
    let rows = (area.height / CELL_HEIGHT).max(1) as usize;
    (columns, rows)
}

fn rect_contains(area: Rect, column: u16, row: u16) -> bool {
    column >= area.x
        && column < area.x.saturating_add(area.width)
        && row >= area.y
        && row < area.y.saturating_add(area.height)
}

fn truncate_to_width(text: &str, width: usize) -> String {
    if text.width() <= width {
        return text.to_string();
    }
    if width == 0 {
        return String::new();
    }
    let mut out = String::new();
    let mut used = 0usize;
    for ch in text.chars() {
        let w = ch.width().unwrap_or(0);
        if used + w + 1 > width {
            break;
        }
        out.push(ch);
        used += w;
    }
    out.push('…');
    out
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let percent_x = percent_x.min(100);
    let percent_y = percent_y.min(100);
    let horizontal = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage(100 - percent_x - (100 - percent_x) / 2),
        ])
        .split(area);
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage(100 - percent_y - (100 - percent_y) / 2),
        ])
        .split(horizontal[1]);
    vertical[1]
}
