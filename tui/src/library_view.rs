use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    prelude::*,
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Wrap},
};
use slide_client::ClientError;
use slide_common::SlideLibraryMetadata;
use slide_core::{LibraryPhase, LibraryWorkflow, RefreshStatus, RefreshTicket, SlideViewModel};
use std::collections::HashMap;
use std::io;
use std::path::PathBuf;
use tokio::sync::mpsc;
use tokio::time::Duration;

/// Which descriptions are unfolded, keyed by view-model id.
#[derive(Debug, Default, Clone)]
pub struct Disclosure {
    open: HashMap<String, bool>,
}

impl Disclosure {
    pub fn toggle(&mut self, id: &str) {
        let entry = self.open.entry(id.to_string()).or_insert(false);
        *entry = !*entry;
    }

    pub fn is_open(&self, id: &str) -> bool {
        self.open.get(id).copied().unwrap_or(false)
    }

    pub fn reset(&mut self) {
        self.open.clear();
    }
}

enum UiEvent {
    Refreshed(RefreshTicket, Result<Vec<SlideLibraryMetadata>, ClientError>),
    Downloaded(Result<PathBuf, String>),
}

pub struct LibraryBrowser {
    running: bool,
    input: String,
    workflow: LibraryWorkflow,
    disclosure: Disclosure,
    list_state: ListState,
    status: Option<String>,
    download_dir: PathBuf,
    tx: mpsc::UnboundedSender<UiEvent>,
    rx: mpsc::UnboundedReceiver<UiEvent>,
}

impl LibraryBrowser {
    pub fn new(workflow: LibraryWorkflow, download_dir: PathBuf) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            running: true,
            input: String::new(),
            workflow,
            disclosure: Disclosure::default(),
            list_state: ListState::default(),
            status: None,
            download_dir,
            tx,
            rx,
        }
    }

    pub async fn run(&mut self) -> Result<()> {
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen)?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;

        self.start_refresh();
        let outcome = self.event_loop(&mut terminal).await;

        disable_raw_mode()?;
        execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
        terminal.show_cursor()?;

        outcome
    }

    async fn event_loop<B: Backend>(&mut self, terminal: &mut Terminal<B>) -> Result<()> {
        while self.running {
            terminal.draw(|f| self.draw(f))?;

            tokio::select! {
                Some(ev) = self.rx.recv() => {
                    self.handle_ui_event(ev);
                }
                event_result = tokio::task::spawn_blocking(|| event::poll(Duration::from_millis(100))) => {
                    if let Ok(Ok(true)) = event_result {
                        if let Event::Key(key) = event::read()? {
                            if key.kind == KeyEventKind::Press {
                                self.handle_key(key.code, key.modifiers);
                            }
                        }
                    }
                }
            }
        }
        Ok(())
    }

    /// Issue a refresh for the typed query and await it on a task.
    fn start_refresh(&mut self) {
        let query = self.input.clone();
        let (ticket, plan) = self.workflow.begin_refresh(&query);
        let api = self.workflow.api().clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let outcome = slide_core::library::fetch(&api, plan).await;
            let _ = tx.send(UiEvent::Refreshed(ticket, outcome));
        });
    }

    fn start_download(&mut self) {
        let Some(item) = self.selected() else { return };
        let id = item.id.clone();
        let api = self.workflow.api().clone();
        let target = self.download_dir.join(format!("{id}.pptx"));
        let tx = self.tx.clone();
        self.status = Some(format!("Downloading {id}..."));
        tokio::spawn(async move {
            let outcome = match api.download_slide(&id).await {
                Ok(bytes) => tokio::fs::write(&target, bytes)
                    .await
                    .map(|_| target)
                    .map_err(|e| e.to_string()),
                Err(e) => Err(e.to_string()),
            };
            let _ = tx.send(UiEvent::Downloaded(outcome));
        });
    }

    fn handle_ui_event(&mut self, ev: UiEvent) {
        match ev {
            UiEvent::Refreshed(ticket, outcome) => {
                match self.workflow.complete_refresh(ticket, outcome) {
                    Ok(RefreshStatus::Discarded) => {}
                    Ok(RefreshStatus::Applied) | Err(_) => {
                        self.disclosure.reset();
                        let selected = (!self.workflow.results().is_empty()).then_some(0);
                        self.list_state.select(selected);
                    }
                }
            }
            UiEvent::Downloaded(Ok(path)) => {
                self.status = Some(format!("Saved {}", path.display()));
            }
            UiEvent::Downloaded(Err(message)) => {
                tracing::warn!("slide download failed: {message}");
                self.status = Some(format!("Download failed: {message}"));
            }
        }
    }

    fn handle_key(&mut self, code: KeyCode, modifiers: KeyModifiers) {
        let ctrl = modifiers.contains(KeyModifiers::CONTROL);
        match code {
            KeyCode::Esc => self.running = false,
            KeyCode::Char('q') if ctrl => self.running = false,
            KeyCode::Char('d') if ctrl => self.start_download(),
            KeyCode::Enter => self.start_refresh(),
            KeyCode::Tab => {
                if let Some(id) = self.selected().map(|item| item.id.clone()) {
                    self.disclosure.toggle(&id);
                }
            }
            KeyCode::Up => self.move_selection(-1),
            KeyCode::Down => self.move_selection(1),
            KeyCode::Backspace => {
                self.input.pop();
            }
            KeyCode::Char(c) => self.input.push(c),
            _ => {}
        }
    }

    fn move_selection(&mut self, delta: isize) {
        let len = self.workflow.results().len();
        if len == 0 {
            return;
        }
        let current = self.list_state.selected().unwrap_or(0) as isize;
        let next = (current + delta).clamp(0, len as isize - 1);
        self.list_state.select(Some(next as usize));
    }

    fn selected(&self) -> Option<&SlideViewModel> {
        self.list_state
            .selected()
            .and_then(|i| self.workflow.results().get(i))
    }

    fn draw(&mut self, f: &mut Frame) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3),
                Constraint::Min(3),
                Constraint::Length(1),
            ])
            .split(f.area());

        let search = Paragraph::new(self.input.as_str()).block(
            Block::default()
                .title("Search by description or tags (Enter)")
                .borders(Borders::ALL),
        );
        f.render_widget(search, chunks[0]);

        let title = match self.workflow.phase() {
            LibraryPhase::Loading => "Slide Library · Loading slides...".to_string(),
            _ => {
                let n = self.workflow.results().len();
                format!(
                    "Slide Library · Showing {n} result{}",
                    if n == 1 { "" } else { "s" }
                )
            }
        };
        let block = Block::default().title(title).borders(Borders::ALL);

        if let Some(error) = self.workflow.error_message() {
            let message = Paragraph::new(error.to_string())
                .style(Style::default().fg(Color::Red))
                .block(block)
                .wrap(Wrap { trim: true });
            f.render_widget(message, chunks[1]);
        } else if self.workflow.results().is_empty()
            && self.workflow.phase() == LibraryPhase::Ready
        {
            let empty = Paragraph::new(
                "No slides match your search. Try a different keyword or import more slides.",
            )
            .block(block)
            .wrap(Wrap { trim: true });
            f.render_widget(empty, chunks[1]);
        } else {
            let items: Vec<ListItem> = self
                .workflow
                .results()
                .iter()
                .map(|item| ListItem::new(item_lines(item, self.disclosure.is_open(&item.id))))
                .collect();
            let list = List::new(items)
                .block(block)
                .highlight_style(Style::default().add_modifier(Modifier::REVERSED));
            f.render_stateful_widget(list, chunks[1], &mut self.list_state);
        }

        let hints = "Tab: description · Ctrl+D: download · Esc: quit";
        let status = match &self.status {
            Some(status) => format!("{status}  |  {hints}"),
            None => hints.to_string(),
        };
        f.render_widget(Paragraph::new(status), chunks[2]);
    }
}

fn item_lines(item: &SlideViewModel, open: bool) -> Vec<Line<'static>> {
    let mut lines = vec![Line::from(vec![
        Span::styled(item.id.clone(), Style::default().add_modifier(Modifier::BOLD)),
        Span::raw(format!("  {} · Updated {}", item.subtitle, item.updated_display)),
    ])];
    if open {
        lines.push(Line::from(format!("  {}", item.description)));
        if !item.tags.is_empty() {
            lines.push(Line::from(format!("  tags: {}", item.tags.join(", "))));
        }
        lines.push(Line::from(format!("  {}", item.download_url)));
    }
    lines
}
