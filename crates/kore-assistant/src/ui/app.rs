//! Application loop for the TUI host.

use std::io;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph, Wrap};
use ratatui::{Frame, Terminal};

use crate::app::workspace::{DocumentEvent, Reveal, Workspace};
use crate::infra::watch::WorkspaceWatcher;
use crate::ui::components::element_tree::{ElementTree, ElementTreeState};
use crate::ui::components::preview::{Preview, PreviewPane};

const TICK_RATE: Duration = Duration::from_millis(120);
const PREVIEW_CONTEXT: usize = 6;

/// Terminal host for the element tree, acting as the editor shell.
pub struct UiApp {
    workspace: Workspace,
    root: PathBuf,
    tree: ElementTreeState,
    preview: Option<PreviewPane>,
    watcher: Option<WorkspaceWatcher>,
    status: Option<StatusMessage>,
    should_quit: bool,
}

impl UiApp {
    pub fn new(workspace: Workspace, root: PathBuf) -> Self {
        Self {
            workspace,
            root,
            tree: ElementTreeState::default(),
            preview: None,
            watcher: None,
            status: None,
            should_quit: false,
        }
    }

    /// Launch the terminal UI and enter the event loop.
    pub fn run(&mut self) -> Result<()> {
        self.bootstrap()?;

        enable_raw_mode().context("failed to enable raw mode")?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen).context("failed to enter alternate screen")?;

        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend).context("failed to initialize terminal")?;
        terminal.hide_cursor().ok();

        let event_loop_result = self.event_loop(&mut terminal);

        disable_raw_mode().ok();
        let _ = execute!(terminal.backend_mut(), LeaveAlternateScreen);
        let _ = terminal.show_cursor();

        event_loop_result
    }

    fn bootstrap(&mut self) -> Result<()> {
        let summary = self.workspace.index_root(&self.root)?;
        let extensions = self.workspace.config().scan.extensions();
        self.watcher = match WorkspaceWatcher::new(&self.root, &extensions) {
            Ok(watcher) => Some(watcher),
            Err(err) => {
                tracing::warn!(error = %err, "file watching disabled");
                None
            }
        };
        self.rebuild_tree();
        self.set_status(
            StatusLevel::Info,
            format!(
                "Indexed {} elements in {} files",
                summary.elements, summary.files
            ),
        );
        Ok(())
    }

    fn event_loop(&mut self, terminal: &mut Terminal<CrosstermBackend<io::Stdout>>) -> Result<()> {
        loop {
            terminal.draw(|frame| self.render(frame))?;
            self.tick();

            if self.should_quit {
                break;
            }

            if event::poll(TICK_RATE)?
                && let Event::Key(key) = event::read()?
            {
                self.handle_key(key);
            }
        }
        Ok(())
    }

    fn tick(&mut self) {
        let events = self
            .watcher
            .as_ref()
            .map(WorkspaceWatcher::drain)
            .unwrap_or_default();
        for event in events {
            tracing::debug!(?event, "workspace event");
            self.workspace.handle(event);
        }

        if self.workspace.presenter().take_stale() {
            self.rebuild_tree();
        }

        if let Some(status) = &self.status
            && status.is_expired()
        {
            self.status = None;
        }
    }

    fn rebuild_tree(&mut self) {
        self.tree
            .rebuild(self.workspace.presenter(), self.workspace.store());
        self.reload_preview();
    }

    fn render(&mut self, frame: &mut Frame<'_>) {
        let size = frame.size();
        let layout = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Min(3),
                Constraint::Length(1),
                Constraint::Length(1),
            ])
            .split(size);

        let main_chunks = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(45), Constraint::Percentage(55)])
            .split(layout[0]);

        ElementTree.render(
            frame,
            main_chunks[0],
            &self.tree,
            self.workspace.presenter().options(),
            true,
        );
        Preview.render(self.preview.as_ref(), main_chunks[1], frame.buffer_mut());

        let hints = Paragraph::new(Line::from(vec![
            Span::styled("j/k", Style::default().fg(Color::Cyan)),
            Span::raw(" move · "),
            Span::styled("h/l", Style::default().fg(Color::Cyan)),
            Span::raw(" fold · "),
            Span::styled("↵", Style::default().fg(Color::Cyan)),
            Span::raw(" reveal · "),
            Span::styled("g", Style::default().fg(Color::Cyan)),
            Span::raw(" group by file · "),
            Span::styled("s", Style::default().fg(Color::Cyan)),
            Span::raw(" sort by file · "),
            Span::styled("r", Style::default().fg(Color::Cyan)),
            Span::raw(" refresh · "),
            Span::styled("q", Style::default().fg(Color::Cyan)),
            Span::raw(" quit"),
        ]))
        .wrap(Wrap { trim: true })
        .style(Style::default().fg(Color::Gray));
        frame.render_widget(hints, layout[1]);

        self.render_status(frame, layout[2]);
    }

    fn render_status(&self, frame: &mut Frame<'_>, area: Rect) {
        let line = match &self.status {
            Some(status) => {
                let style = match status.level {
                    StatusLevel::Info => Style::default().fg(Color::Gray),
                    StatusLevel::Error => Style::default().fg(Color::Red),
                };
                Line::styled(status.text.clone(), style)
            }
            None => Line::styled(
                self.selection_tooltip(),
                Style::default().fg(Color::DarkGray),
            ),
        };
        frame.render_widget(
            Paragraph::new(line).block(Block::default().borders(Borders::NONE)),
            area,
        );
    }

    fn selection_tooltip(&self) -> String {
        self.tree
            .selected_node()
            .map(|node| node.tooltip().replace('\n', " · "))
            .unwrap_or_default()
    }

    fn handle_key(&mut self, key: KeyEvent) {
        if key.kind != KeyEventKind::Press {
            return;
        }
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            self.should_quit = true;
            return;
        }

        let options = self.workspace.presenter().options();
        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => self.should_quit = true,
            KeyCode::Char('j') | KeyCode::Down => self.tree.select_next(),
            KeyCode::Char('k') | KeyCode::Up => self.tree.select_previous(),
            KeyCode::Char('h') | KeyCode::Left => {
                if self.tree.collapse_or_parent() {
                    self.rebuild_tree();
                }
            }
            KeyCode::Char('l') | KeyCode::Right => {
                if self.tree.expand_or_enter() {
                    self.rebuild_tree();
                }
            }
            KeyCode::Char(' ') => {
                if self.tree.toggle_expansion() {
                    self.rebuild_tree();
                }
            }
            KeyCode::Enter => self.reveal_selected(),
            KeyCode::Char('g') => {
                let value = !options.group_by_file;
                self.workspace.presenter_mut().set_group_by_file(value);
            }
            KeyCode::Char('s') => {
                let value = !options.sort_by_file;
                self.workspace.presenter_mut().set_sort_by_file(value);
            }
            KeyCode::Char('r') => match self.workspace.refresh_active() {
                Ok(()) => self.set_status(StatusLevel::Info, "Active document rescanned"),
                Err(err) => self.set_status(StatusLevel::Error, err.to_string()),
            },
            _ => {}
        }
    }

    fn reveal_selected(&mut self) {
        let Some(activation) = self.tree.selected_node().and_then(|node| node.activation()) else {
            if self.tree.toggle_expansion() {
                self.rebuild_tree();
            }
            return;
        };

        self.workspace
            .handle(DocumentEvent::ActiveChanged(Some(activation.document.clone())));
        match self.workspace.reveal(&activation) {
            Ok(reveal) => {
                match PreviewPane::load(&reveal, self.workspace.gutter(), PREVIEW_CONTEXT) {
                    Ok(pane) => self.preview = Some(pane),
                    Err(err) => self.set_status(StatusLevel::Error, format!("{err:#}")),
                }
            }
            Err(err) => self.set_status(StatusLevel::Error, format!("{err:#}")),
        }
    }

    /// Keep an open preview in step with rescans of its document.
    fn reload_preview(&mut self) {
        let Some(pane) = &self.preview else {
            return;
        };
        let reveal = Reveal {
            document: pane.document.clone(),
            line: pane.focus_line,
            column: pane.column,
            text: String::new(),
        };
        match PreviewPane::load(&reveal, self.workspace.gutter(), PREVIEW_CONTEXT) {
            Ok(pane) => self.preview = Some(pane),
            Err(_) => self.preview = None,
        }
    }

    fn set_status<S: Into<String>>(&mut self, level: StatusLevel, message: S) {
        self.status = Some(StatusMessage::new(level, message.into()));
    }
}

#[derive(Debug)]
struct StatusMessage {
    level: StatusLevel,
    text: String,
    expires_at: Instant,
}

impl StatusMessage {
    fn new(level: StatusLevel, text: String) -> Self {
        Self {
            level,
            text,
            expires_at: Instant::now() + Duration::from_secs(4),
        }
    }

    fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}

#[derive(Debug, Clone, Copy)]
enum StatusLevel {
    Info,
    Error,
}
