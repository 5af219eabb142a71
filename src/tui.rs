//! Terminal front end
//!
//! Thin adapter over [`ChatManager`]: keys become controller calls, the
//! controller's view becomes widgets. Remote turns resolve on spawned tasks
//! and report back over a channel, so the draw loop never waits on the
//! network.

use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    prelude::*,
    widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Wrap},
};
use std::io;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use unicode_width::UnicodeWidthStr;

use crate::chat::{ChatManager, TurnOutcome, TurnResult};
use crate::client::RecommendationService;
use crate::config::{Config, Theme};
use crate::dialog::{DeleteDialog, DialogEvent};
use crate::models::Role;
use crate::render::{self, RecommendationPanel, RenderedMessage, SessionEntry, SpanStyle};
use crate::store;

const SIDEBAR_WIDTH: u16 = 34;

// ═══════════════════════════════════════════════════════════════
// THEME
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy)]
struct Palette {
    fg: Color,
    bg: Color,
    accent: Color,
    muted: Color,
    error: Color,
    user: Color,
}

impl Palette {
    fn for_theme(theme: Theme) -> Self {
        match theme {
            Theme::Light => Palette {
                fg: Color::Black,
                bg: Color::White,
                accent: Color::Blue,
                muted: Color::Gray,
                error: Color::Red,
                user: Color::Magenta,
            },
            Theme::Dark => Palette {
                fg: Color::White,
                bg: Color::Black,
                accent: Color::Cyan,
                muted: Color::DarkGray,
                error: Color::LightRed,
                user: Color::LightMagenta,
            },
        }
    }

    fn base(&self) -> Style {
        Style::default().fg(self.fg).bg(self.bg)
    }
}

// ═══════════════════════════════════════════════════════════════
// STATE
// ═══════════════════════════════════════════════════════════════

/// Which widget receives typed characters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Focus {
    Input,
    Sidebar,
    Search,
}

impl Focus {
    fn next(self) -> Self {
        match self {
            Focus::Input => Focus::Sidebar,
            Focus::Sidebar => Focus::Search,
            Focus::Search => Focus::Input,
        }
    }
}

/// Messages from background tasks
enum TuiMsg {
    Finished(TurnOutcome),
}

struct TuiState {
    input: String,
    search: String,
    focus: Focus,
    selected: usize,
    status: String,
    dialog: DeleteDialog,
    tick: usize,
    quit: bool,
}

impl TuiState {
    fn new() -> Self {
        Self {
            input: String::new(),
            search: String::new(),
            focus: Focus::Input,
            selected: 0,
            status: String::new(),
            dialog: DeleteDialog::new(),
            tick: 0,
            quit: false,
        }
    }

    fn status(&mut self, msg: impl Into<String>) {
        let now = chrono::Local::now().format("%H:%M:%S");
        self.status = format!("[{}] {}", now, msg.into());
    }
}

/// Everything the key handler can touch
struct App {
    manager: ChatManager,
    service: Arc<dyn RecommendationService>,
    config: Config,
    state: TuiState,
    tx: mpsc::Sender<TuiMsg>,
}

// ═══════════════════════════════════════════════════════════════
// MAIN LOOP
// ═══════════════════════════════════════════════════════════════

/// Run the interactive chat until the user quits
pub async fn run_tui(
    manager: ChatManager,
    service: Arc<dyn RecommendationService>,
    config: Config,
) -> Result<()> {
    let mut terminal = setup_terminal()?;
    let result = run_tui_loop(&mut terminal, manager, service, config).await;
    restore_terminal(terminal)?;
    result
}

async fn run_tui_loop(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    manager: ChatManager,
    service: Arc<dyn RecommendationService>,
    config: Config,
) -> Result<()> {
    let (tx, mut rx) = mpsc::channel::<TuiMsg>(16);
    let mut app = App {
        manager,
        service,
        config,
        state: TuiState::new(),
        tx,
    };

    while !app.state.quit {
        app.state.tick += 1;

        // Finished turns
        while let Ok(msg) = rx.try_recv() {
            match msg {
                TuiMsg::Finished(outcome) => app.finish(outcome),
            }
        }

        if app.state.dialog.tick(Instant::now()) == Some(DialogEvent::Hidden) {
            app.manager.cancel_delete();
        }

        let entries = app.manager.session_list(&app.state.search);
        app.state.selected = app.state.selected.min(entries.len().saturating_sub(1));

        terminal.draw(|f| render_tui(f, &app, &entries))?;

        if event::poll(Duration::from_millis(50))? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    app.handle_key(key, &entries);
                }
            }
        }
    }

    Ok(())
}

impl App {
    fn finish(&mut self, outcome: TurnOutcome) {
        match self.manager.finish_turn(outcome) {
            Ok(report) => match report.result {
                TurnResult::Failed(e) => self.state.status(format!("Request failed: {}", e)),
                TurnResult::Discarded => self.state.status("Reply dropped: its chat was deleted"),
                TurnResult::Answered { recommendations } if report.stale => self.state.status(format!(
                    "Reply with {} books saved to another chat",
                    recommendations
                )),
                _ => {}
            },
            Err(e) => self.state.status(format!("Could not save reply: {}", e)),
        }
    }

    /// Start a turn and resolve it off the draw loop
    fn submit(&mut self, text: &str) {
        let turn = match self.manager.begin_turn(text) {
            Ok(Some(turn)) => turn,
            Ok(None) => return,
            Err(e) => {
                self.state.status(format!("Could not save message: {}", e));
                return;
            }
        };

        let service = self.service.clone();
        let delay = self.manager.casual_delay();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let outcome = turn.resolve(service.as_ref(), delay).await;
            let _ = tx.send(TuiMsg::Finished(outcome)).await;
        });
    }

    fn handle_key(&mut self, key: KeyEvent, entries: &[SessionEntry]) {
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        let selected = entries.get(self.state.selected).map(|e| e.id.clone());

        if ctrl && matches!(key.code, KeyCode::Char('c') | KeyCode::Char('q')) {
            self.state.quit = true;
            return;
        }

        // The dialog swallows everything else while visible
        if self.state.dialog.is_visible() {
            match key.code {
                KeyCode::Char('y') | KeyCode::Enter => {
                    match self.manager.confirm_delete() {
                        Ok(Some(id)) => self.state.status(format!("Deleted chat {}", id)),
                        Ok(None) => {}
                        Err(e) => self.state.status(format!("Delete failed: {}", e)),
                    }
                    self.state.dialog.close(Instant::now());
                }
                KeyCode::Char('n') | KeyCode::Esc => self.state.dialog.close(Instant::now()),
                _ => {}
            }
            return;
        }

        if ctrl {
            match key.code {
                KeyCode::Char('n') => {
                    if let Err(e) = self.manager.new_session() {
                        self.state.status(format!("Could not start chat: {}", e));
                    }
                    self.state.input.clear();
                    self.state.focus = Focus::Input;
                }
                KeyCode::Char('d') => {
                    if let Some(id) = selected {
                        self.manager.request_delete(&id);
                        self.state.dialog.open(Instant::now());
                    }
                }
                KeyCode::Char('o') => self.open_selected(selected),
                KeyCode::Char('f') => self.state.focus = Focus::Search,
                KeyCode::Char('r') => {
                    if let Some(query) = self.manager.last_query().map(str::to_string) {
                        self.submit(&query);
                    }
                }
                KeyCode::Char('t') => self.toggle_theme(),
                KeyCode::Char('e') => self.export(),
                KeyCode::Enter => self.submit_input(),
                _ => {}
            }
            return;
        }

        match key.code {
            KeyCode::Tab => self.state.focus = self.state.focus.next(),
            KeyCode::Up => self.state.selected = self.state.selected.saturating_sub(1),
            KeyCode::Down => {
                self.state.selected = (self.state.selected + 1).min(entries.len().saturating_sub(1))
            }
            KeyCode::F(n @ 1..=4) => {
                let suggestion = render::WELCOME_SUGGESTIONS[usize::from(n - 1)];
                self.submit(suggestion);
            }
            KeyCode::Esc => match self.state.focus {
                Focus::Search => self.state.search.clear(),
                _ => self.state.input.clear(),
            },
            KeyCode::Enter => match self.state.focus {
                Focus::Input => self.submit_input(),
                Focus::Sidebar | Focus::Search => self.open_selected(selected),
            },
            KeyCode::Backspace => {
                match self.state.focus {
                    Focus::Input => self.state.input.pop(),
                    Focus::Search => self.state.search.pop(),
                    Focus::Sidebar => None,
                };
            }
            KeyCode::Char(c) => match self.state.focus {
                Focus::Input => self.state.input.push(c),
                Focus::Search => {
                    self.state.search.push(c);
                    self.state.selected = 0;
                }
                Focus::Sidebar => {}
            },
            _ => {}
        }
    }

    fn submit_input(&mut self) {
        if !self.manager.view().input_enabled {
            return;
        }
        let text = std::mem::take(&mut self.state.input);
        self.submit(&text);
    }

    fn open_selected(&mut self, selected: Option<String>) {
        if let Some(id) = selected {
            match self.manager.load_session(&id) {
                Ok(()) => self.state.focus = Focus::Input,
                Err(e) => self.state.status(format!("Could not open chat: {}", e)),
            }
        }
    }

    fn toggle_theme(&mut self) {
        self.config.theme = self.config.theme.toggled();
        match self.config.save() {
            Ok(()) => self.state.status(format!("Theme: {}", self.config.theme.name())),
            Err(e) => self.state.status(format!("Could not save theme: {}", e)),
        }
    }

    fn export(&mut self) {
        let name = store::export_file_name(chrono::Local::now().date_naive());
        let result = self
            .manager
            .export()
            .map_err(anyhow::Error::from)
            .and_then(|bytes| Ok(std::fs::write(&name, bytes)?));
        match result {
            Ok(()) => self.state.status(format!("Exported chats to {}", name)),
            Err(e) => self.state.status(format!("Export failed: {}", e)),
        }
    }
}

// ═══════════════════════════════════════════════════════════════
// DRAWING
// ═══════════════════════════════════════════════════════════════

fn render_tui(f: &mut Frame, app: &App, entries: &[SessionEntry]) {
    let palette = Palette::for_theme(app.config.theme);
    let area = f.size();
    f.render_widget(Block::default().style(palette.base()), area);

    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Length(SIDEBAR_WIDTH), Constraint::Min(20)])
        .split(area);

    render_sidebar(f, app, entries, columns[0], palette);

    let view = app.manager.view();
    let panel_height = view
        .transcript
        .panel
        .as_ref()
        .map(|p| (p.cards.len() as u16 * 4 + 3).min(area.height / 2))
        .unwrap_or(0);

    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(5),               // Transcript
            Constraint::Length(panel_height), // Recommendations
            Constraint::Length(3),            // Input
            Constraint::Length(1),            // Status
        ])
        .split(columns[1]);

    render_transcript(f, app, rows[0], palette);
    if let Some(panel) = &view.transcript.panel {
        render_panel(f, panel, rows[1], palette);
    }

    let (input_title, input_style) = if view.input_enabled {
        ("Ask for a book (Enter to send)".to_string(), palette.base())
    } else {
        (
            format!("{} Thinking", spinner_char(app.state.tick)),
            palette.base().fg(palette.muted),
        )
    };
    let input = Paragraph::new(app.state.input.as_str())
        .style(input_style)
        .block(focused_block(&input_title, app.state.focus == Focus::Input, palette));
    f.render_widget(input, rows[2]);

    let status = if app.state.status.is_empty() {
        " ^N new  ^D delete  ^O open  ^F search  ^R retry  ^T theme  ^E export  ^Q quit".to_string()
    } else {
        format!(" {}", app.state.status)
    };
    f.render_widget(
        Paragraph::new(status).style(palette.base().fg(palette.muted)),
        rows[3],
    );

    if app.state.dialog.is_visible() {
        render_dialog(f, app, area, palette);
    }
}

fn focused_block(title: &str, focused: bool, palette: Palette) -> Block<'static> {
    let border = if focused { palette.accent } else { palette.muted };
    Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border))
        .title(title.to_string())
}

fn render_sidebar(f: &mut Frame, app: &App, entries: &[SessionEntry], area: Rect, palette: Palette) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(3)])
        .split(area);

    let search = Paragraph::new(app.state.search.as_str())
        .style(palette.base())
        .block(focused_block("Search conversations", app.state.focus == Focus::Search, palette));
    f.render_widget(search, chunks[0]);

    let width = area.width.saturating_sub(4) as usize;
    let items: Vec<ListItem> = entries
        .iter()
        .map(|entry| {
            let marker = if entry.active { "● " } else { "  " };
            let style = if entry.active {
                palette.base().fg(palette.accent).add_modifier(Modifier::BOLD)
            } else {
                palette.base()
            };
            ListItem::new(vec![
                Line::from(Span::styled(
                    format!("{}{}", marker, fit_width(&entry.preview, width.saturating_sub(2))),
                    style,
                )),
                Line::from(Span::styled(
                    format!("  {}", entry.date),
                    palette.base().fg(palette.muted),
                )),
            ])
        })
        .collect();

    let mut list_state = ListState::default();
    if !entries.is_empty() {
        list_state.select(Some(app.state.selected));
    }
    let list = List::new(items)
        .block(focused_block(
            &format!("Chats ({})", entries.len()),
            app.state.focus == Focus::Sidebar,
            palette,
        ))
        .highlight_style(Style::default().add_modifier(Modifier::REVERSED));
    f.render_stateful_widget(list, chunks[1], &mut list_state);
}

fn render_transcript(f: &mut Frame, app: &App, area: Rect, palette: Palette) {
    let view = app.manager.view();
    let mut lines: Vec<Line> = Vec::new();
    for message in &view.transcript.messages {
        lines.extend(message_lines(message, palette));
        lines.push(Line::from(""));
    }
    if view.thinking {
        lines.push(Line::from(Span::styled(
            format!("Thinking {}", spinner_char(app.state.tick)),
            palette.base().fg(palette.muted).add_modifier(Modifier::ITALIC),
        )));
    }

    // Keep the newest lines in view
    let inner_width = area.width.saturating_sub(2).max(1) as usize;
    let total: usize = lines
        .iter()
        .map(|l| l.width().max(1).div_ceil(inner_width))
        .sum();
    let scroll = total.saturating_sub(area.height.saturating_sub(2) as usize);

    let para = Paragraph::new(lines)
        .style(palette.base())
        .wrap(Wrap { trim: false })
        .scroll((scroll.min(u16::MAX as usize) as u16, 0))
        .block(focused_block("Chat", false, palette));
    f.render_widget(para, area);
}

/// Turn a rendered message into styled lines, one per text line
fn message_lines(message: &RenderedMessage, palette: Palette) -> Vec<Line<'static>> {
    let (prefix, base) = match message.role {
        Role::User => ("> ", palette.base().fg(palette.user)),
        Role::Error => ("! ", palette.base().fg(palette.error)),
        _ => ("", palette.base()),
    };
    let title = base.fg(palette.accent).add_modifier(Modifier::BOLD);

    let mut lines = Vec::new();
    let mut current: Vec<Span<'static>> = vec![Span::styled(prefix, base)];
    for span in &message.spans {
        let style = match span.style {
            SpanStyle::Plain => base,
            SpanStyle::Title => title,
        };
        let mut parts = span.text.split('\n').peekable();
        while let Some(part) = parts.next() {
            if !part.is_empty() {
                current.push(Span::styled(part.to_string(), style));
            }
            if parts.peek().is_some() {
                lines.push(Line::from(std::mem::take(&mut current)));
            }
        }
    }
    lines.push(Line::from(current));
    lines
}

fn render_panel(f: &mut Frame, panel: &RecommendationPanel, area: Rect, palette: Palette) {
    let mut lines: Vec<Line> = Vec::new();
    for card in &panel.cards {
        lines.push(Line::from(Span::styled(
            card.title.clone(),
            palette.base().fg(palette.accent).add_modifier(Modifier::BOLD),
        )));
        let mut meta = format!("  {}", card.category);
        if !card.reading_time.is_empty() {
            meta.push_str(&format!("  ·  {}", card.reading_time));
        }
        lines.push(Line::from(Span::styled(meta, palette.base().fg(palette.muted))));
        if let Some(themes) = &card.themes {
            let tags: Vec<String> = themes.iter().map(|t| format!("#{}", t)).collect();
            lines.push(Line::from(Span::styled(
                format!("  {}", tags.join(" ")),
                palette.base().fg(palette.user),
            )));
        }
        lines.push(Line::from(format!("  {}", card.summary)));
    }

    let para = Paragraph::new(lines)
        .style(palette.base())
        .wrap(Wrap { trim: false })
        .block(focused_block(panel.heading, false, palette));
    f.render_widget(para, area);
}

fn render_dialog(f: &mut Frame, app: &App, area: Rect, palette: Palette) {
    let target = app.manager.pending_delete().unwrap_or("");
    let preview = app
        .manager
        .messages(target)
        .map(|m| render::session_preview(&m))
        .unwrap_or_default();

    let popup = centered(area, 50, 7);
    let body = vec![
        Line::from("Delete this chat? This cannot be undone."),
        Line::from(Span::styled(preview, palette.base().fg(palette.muted))),
        Line::from(""),
        Line::from(Span::styled(
            "y / Enter: delete    n / Esc: cancel",
            palette.base().fg(palette.accent),
        )),
    ];
    // Dim while fading in or out
    let style = if app.state.dialog.is_shown() {
        palette.base()
    } else {
        palette.base().add_modifier(Modifier::DIM)
    };
    f.render_widget(Clear, popup);
    f.render_widget(
        Paragraph::new(body)
            .style(style)
            .block(Block::default().borders(Borders::ALL).title("Delete Chat")),
        popup,
    );
}

fn centered(area: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    Rect {
        x: area.x + (area.width - width) / 2,
        y: area.y + (area.height - height) / 2,
        width,
        height,
    }
}

/// Clip to a display width, marking the cut
fn fit_width(text: &str, width: usize) -> String {
    if text.width() <= width {
        return text.to_string();
    }
    let mut out = String::new();
    for c in text.chars() {
        if out.width() + 2 > width {
            break;
        }
        out.push(c);
    }
    out.push('…');
    out
}

fn spinner_char(tick: usize) -> char {
    const SPINNER: &[char] = &['⠋', '⠙', '⠹', '⠸', '⠼', '⠴', '⠦', '⠧', '⠇', '⠏'];
    SPINNER[tick % SPINNER.len()]
}

// ═══════════════════════════════════════════════════════════════
// TERMINAL SETUP
// ═══════════════════════════════════════════════════════════════

fn setup_terminal() -> Result<Terminal<CrosstermBackend<io::Stdout>>> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    Ok(Terminal::new(backend)?)
}

fn restore_terminal(mut terminal: Terminal<CrosstermBackend<io::Stdout>>) -> Result<()> {
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    Ok(())
}
