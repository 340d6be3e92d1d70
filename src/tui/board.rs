//! Kanban board for one project.
//!
//! The five columns are the task statuses in board order. Moving a card
//! (Ctrl+Left/Right, or a digit to jump straight to a column) is a drag:
//! the card lands in its new column on the next frame while the request
//! runs in the background, and snaps back with an error message if the
//! service refuses it.

use std::cell::Cell;
use std::io;
use std::rc::Rc;
use std::time::Duration;

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use ratatui::{
    backend::Backend,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
    Frame, Terminal,
};
use tracing::debug;

use crate::board::Board;
use crate::cache::CacheKey;
use crate::fields::Status;
use crate::notify::Level;
use crate::notify::ToastQueue;
use crate::orchestrator::ChangeState;
use crate::project::Project;
use crate::session::BoardSession;
use crate::task::TaskSummary;
use crate::tui::colors::{status_color, text_on};

const TICK: Duration = Duration::from_millis(50);
const CARD_HEIGHT: usize = 4;

/// First and last row of an area, for the scroll indicators. `None` when
/// the area has no rows.
fn edge_rows(area: Rect) -> Option<(Rect, Rect)> {
    if area.height == 0 {
        return None;
    }
    let row = |y| Rect { x: area.x, y, width: area.width, height: 1 };
    Some((row(area.y), row(area.y + area.height - 1)))
}
const HELP: &str =
    "Help: Enter: Details | Ctrl+Left/Right or 1-5: Move | /: Filter | r: Refresh | Esc: Exit";

/// What a key press asks the app to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BoardCommand {
    None,
    Quit,
    Move { task_id: String, status: Status },
    OpenDetail(String),
    CloseDetail,
    Refresh,
}

/// Selection, filter and popup state. Knows nothing about the terminal.
#[derive(Debug, Default)]
pub struct BoardView {
    pub selected_column: usize,
    pub selected_card: usize,
    column_scroll_offsets: [usize; 5],
    pub filter_active: bool,
    pub filter_text: String,
    pub show_task_detail: bool,
    pub status_message: String,
}

impl BoardView {
    pub fn new() -> Self {
        Self::default()
    }

    /// The board as displayed, with the text filter applied.
    pub fn visible(&self, board: &Board) -> Board {
        board.filter(&self.filter_text)
    }

    pub fn selected_status(&self) -> Status {
        Status::ALL[self.selected_column.min(Status::ALL.len() - 1)]
    }

    pub fn selected_task<'a>(&self, board: &'a Board) -> Option<&'a TaskSummary> {
        board.bucket(self.selected_status()).get(self.selected_card)
    }

    /// Ensure selected column and card indices are valid.
    pub fn clamp_selection(&mut self, board: &Board) {
        if self.selected_column >= Status::ALL.len() {
            self.selected_column = 0;
        }
        let column_len = board.bucket(self.selected_status()).len();
        if column_len == 0 {
            self.selected_card = 0;
            self.column_scroll_offsets[self.selected_column] = 0;
        } else if self.selected_card >= column_len {
            self.selected_card = column_len - 1;
        }
    }

    /// Move the selection onto `task_id`, wherever it is now.
    pub fn select_task(&mut self, board: &Board, task_id: &str) -> bool {
        match board.locate(task_id) {
            Some((status, position)) => {
                self.selected_column = status.index();
                self.selected_card = position;
                true
            }
            None => false,
        }
    }

    fn set_status_message(&mut self, msg: impl Into<String>) {
        self.status_message = msg.into();
    }

    fn move_selected(&self, board: &Board, status: Status) -> BoardCommand {
        match self.selected_task(board) {
            Some(task) => BoardCommand::Move { task_id: task.id.clone(), status },
            None => BoardCommand::None,
        }
    }

    /// Interpret a key press against the visible board.
    pub fn handle_key(&mut self, key: KeyEvent, board: &Board) -> BoardCommand {
        if self.filter_active {
            match key.code {
                KeyCode::Esc => {
                    self.filter_active = false;
                    self.filter_text.clear();
                    self.status_message.clear();
                }
                KeyCode::Enter => {
                    self.filter_active = false;
                    if self.filter_text.is_empty() {
                        self.set_status_message("Filter cleared");
                    } else {
                        let shown = board.filter(&self.filter_text).total();
                        self.set_status_message(format!("Filter: '{}' ({} tasks shown)", self.filter_text, shown));
                    }
                }
                KeyCode::Backspace => {
                    self.filter_text.pop();
                }
                KeyCode::Char(c) => self.filter_text.push(c),
                _ => {}
            }
            return BoardCommand::None;
        }

        if self.show_task_detail {
            return match key.code {
                KeyCode::Enter | KeyCode::Esc => {
                    self.show_task_detail = false;
                    BoardCommand::CloseDetail
                }
                KeyCode::Char(c @ '1'..='5') => self.move_selected(board, digit_status(c)),
                _ => BoardCommand::None,
            };
        }

        self.status_message.clear();

        match key.code {
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => BoardCommand::Quit,
            KeyCode::Char('q') if key.modifiers.contains(KeyModifiers::CONTROL) => BoardCommand::Quit,
            KeyCode::Esc => BoardCommand::Quit,

            KeyCode::Enter => match self.selected_task(board) {
                Some(task) => {
                    self.show_task_detail = true;
                    BoardCommand::OpenDetail(task.id.clone())
                }
                None => BoardCommand::None,
            },

            // Card movement between columns (check first, before regular navigation)
            KeyCode::Left if key.modifiers.contains(KeyModifiers::CONTROL) => {
                if self.selected_column == 0 {
                    return BoardCommand::None;
                }
                self.move_selected(board, Status::ALL[self.selected_column - 1])
            }
            KeyCode::Right if key.modifiers.contains(KeyModifiers::CONTROL) => {
                if self.selected_column + 1 >= Status::ALL.len() {
                    return BoardCommand::None;
                }
                self.move_selected(board, Status::ALL[self.selected_column + 1])
            }
            KeyCode::Char(c @ '1'..='5') => self.move_selected(board, digit_status(c)),

            KeyCode::Left => {
                if self.selected_column > 0 {
                    self.selected_column -= 1;
                    self.clamp_selection(board);
                }
                BoardCommand::None
            }
            KeyCode::Right => {
                if self.selected_column + 1 < Status::ALL.len() {
                    self.selected_column += 1;
                    self.clamp_selection(board);
                }
                BoardCommand::None
            }
            KeyCode::Up => {
                self.selected_card = self.selected_card.saturating_sub(1);
                BoardCommand::None
            }
            KeyCode::Down => {
                let column_len = board.bucket(self.selected_status()).len();
                if column_len > 0 && self.selected_card < column_len - 1 {
                    self.selected_card += 1;
                }
                BoardCommand::None
            }

            KeyCode::Char('/') => {
                self.filter_active = true;
                self.set_status_message("Filter: type to search name/description, Enter to apply, Esc to cancel");
                BoardCommand::None
            }
            KeyCode::Char('r') => {
                self.set_status_message("Refreshing...");
                BoardCommand::Refresh
            }
            KeyCode::Char('h') => {
                self.set_status_message(HELP);
                BoardCommand::None
            }
            _ => BoardCommand::None,
        }
    }

    /// Scroll offset for a column so the selected card stays visible.
    fn scroll_offset(&mut self, column_index: usize, visible_cards: usize) -> usize {
        if column_index != self.selected_column {
            return self.column_scroll_offsets[column_index];
        }
        let start_visible = self.column_scroll_offsets[column_index];
        let end_visible = start_visible + visible_cards;
        let offset = if self.selected_card < start_visible {
            self.selected_card
        } else if self.selected_card >= end_visible && visible_cards > 0 {
            self.selected_card + 1 - visible_cards
        } else {
            start_visible
        };
        self.column_scroll_offsets[column_index] = offset;
        offset
    }
}

fn digit_status(c: char) -> Status {
    let index = c.to_digit(10).map(|d| d as usize).unwrap_or(1).clamp(1, Status::ALL.len());
    Status::ALL[index - 1]
}

/// The interactive board for a single project.
pub struct BoardApp {
    session: Rc<BoardSession>,
    toasts: Rc<ToastQueue>,
    project_id: String,
    project_name: String,
    view: BoardView,
    status_level: Option<Level>,
    /// A moved card the selection should follow into its new column.
    follow: Option<(String, Status)>,
    detail_task: Option<String>,
    refetching: Rc<Cell<bool>>,
}

impl BoardApp {
    pub fn new(session: Rc<BoardSession>, toasts: Rc<ToastQueue>, project: &Project) -> Self {
        session.watch(&CacheKey::project(&project.id));
        BoardApp {
            session,
            toasts,
            project_id: project.id.clone(),
            project_name: project.name.clone(),
            view: BoardView::new(),
            status_level: None,
            follow: None,
            detail_task: None,
            refetching: Rc::new(Cell::new(false)),
        }
    }

    fn visible_board(&self) -> Board {
        let board = self.session.board(&self.project_id).unwrap_or_default();
        self.view.visible(&board)
    }

    /// Execute a command. Returns true when the app should exit.
    fn apply(&mut self, command: BoardCommand) -> bool {
        match command {
            BoardCommand::None => {}
            BoardCommand::Quit => return true,
            BoardCommand::Move { task_id, status } => {
                debug!(task = %task_id, ?status, "board move");
                self.follow = Some((task_id.clone(), status));
                let session = Rc::clone(&self.session);
                let project_id = self.project_id.clone();
                tokio::task::spawn_local(async move {
                    session.select_status(&project_id, &task_id, status).await;
                });
            }
            BoardCommand::OpenDetail(task_id) => {
                self.session.watch(&CacheKey::task(&task_id));
                self.detail_task = Some(task_id.clone());
                let session = Rc::clone(&self.session);
                let project_id = self.project_id.clone();
                tokio::task::spawn_local(async move {
                    // Errors surface as toasts through the refetch path.
                    if let Err(err) = session.task(&project_id, &task_id).await {
                        debug!(error = %err, "task detail fetch failed");
                    }
                });
            }
            BoardCommand::CloseDetail => {
                if let Some(task_id) = self.detail_task.take() {
                    self.session.unwatch(&CacheKey::task(&task_id));
                }
            }
            BoardCommand::Refresh => {
                self.session.cache().borrow_mut().invalidate(&CacheKey::project(&self.project_id));
            }
        }
        false
    }

    /// Per-frame housekeeping: start background refetches, surface toasts,
    /// and keep the selection on a card that was just moved.
    fn tick(&mut self) {
        let pending = self.session.cache().borrow().has_pending_refetch();
        if pending && !self.refetching.get() {
            self.refetching.set(true);
            let session = Rc::clone(&self.session);
            let flag = Rc::clone(&self.refetching);
            tokio::task::spawn_local(async move {
                session.refetch_stale().await;
                flag.set(false);
            });
        }

        if let Some(toast) = self.toasts.drain().pop() {
            self.view.status_message = toast.message;
            self.status_level = Some(toast.level);
        }

        let board = self.visible_board();
        if let Some((task_id, status)) = self.follow.clone() {
            let settled = self.session.change_state(&task_id) == ChangeState::Idle;
            match board.locate(&task_id) {
                Some((at, _)) if at == status => {
                    self.view.select_task(&board, &task_id);
                    self.follow = None;
                }
                _ if settled => self.follow = None,
                _ => {}
            }
        }
        self.view.clamp_selection(&board);
    }

    /// Render the board
    fn render(&mut self, f: &mut Frame) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3), // Header
                Constraint::Min(0),    // Board
                Constraint::Length(1), // Status bar
            ])
            .split(f.area());

        let board = self.visible_board();
        self.render_header(f, chunks[0]);
        self.render_board(f, chunks[1], &board);
        self.render_status_bar(f, chunks[2], &board);

        if self.view.show_task_detail {
            self.render_task_detail_popup(f, &board);
        }
    }

    fn render_header(&self, f: &mut Frame, area: Rect) {
        let header_text = vec![Line::from(vec![
            Span::styled("TASK BOARD", Style::default().add_modifier(Modifier::BOLD)),
            Span::raw("  "),
            Span::styled(
                format!("Project: {}", self.project_name),
                Style::default().fg(Color::Cyan).add_modifier(Modifier::ITALIC),
            ),
        ])];

        let header_block = Paragraph::new(header_text)
            .block(Block::default().borders(Borders::ALL))
            .alignment(Alignment::Center);
        f.render_widget(header_block, area);
    }

    fn render_board(&mut self, f: &mut Frame, area: Rect, board: &Board) {
        let constraints: Vec<Constraint> =
            Status::ALL.iter().map(|_| Constraint::Ratio(1, Status::ALL.len() as u32)).collect();

        let columns_layout = Layout::default()
            .direction(Direction::Horizontal)
            .constraints(constraints)
            .split(area);

        for (i, &column_area) in columns_layout.iter().enumerate() {
            self.render_column(f, column_area, Status::ALL[i], board.bucket(Status::ALL[i]));
        }
    }

    fn render_column(&mut self, f: &mut Frame, area: Rect, status: Status, cards: &[TaskSummary]) {
        let column_index = status.index();
        let is_selected = column_index == self.view.selected_column;
        let color = status_color(status);

        let border_style = if is_selected {
            Style::default().fg(color).add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(color)
        };

        let block = Block::default()
            .borders(Borders::ALL)
            .title(format!("{} ({})", status.label(), cards.len()))
            .border_style(border_style);

        let inner = block.inner(area);
        f.render_widget(block, area);

        if cards.is_empty() || inner.height == 0 {
            return;
        }

        let available_height = inner.height as usize;
        let visible_cards = available_height / CARD_HEIGHT;
        let scroll_offset = self.view.scroll_offset(column_index, visible_cards);

        let mut current_y = 0;
        let mut rendered_cards = 0;
        for (card_index, task) in cards.iter().enumerate().skip(scroll_offset) {
            if current_y + CARD_HEIGHT > available_height {
                break;
            }
            let card_area = Rect {
                x: inner.x,
                y: inner.y + current_y as u16,
                width: inner.width,
                height: CARD_HEIGHT as u16,
            };
            let is_this_card_selected = is_selected && card_index == self.view.selected_card;
            self.render_card(f, card_area, task, is_this_card_selected);
            current_y += CARD_HEIGHT;
            rendered_cards += 1;
        }

        let Some((top, bottom)) = edge_rows(inner) else {
            return;
        };
        if scroll_offset > 0 {
            let indicator = Paragraph::new(format!("▲ +{} above", scroll_offset)).style(Style::default().fg(Color::Cyan));
            f.render_widget(indicator, top);
        }
        let remaining = cards.len().saturating_sub(scroll_offset + rendered_cards);
        if remaining > 0 {
            let indicator = Paragraph::new(format!("▼ +{} below", remaining)).style(Style::default().fg(Color::Cyan));
            f.render_widget(indicator, bottom);
        }
    }

    fn render_card(&self, f: &mut Frame, area: Rect, task: &TaskSummary, is_selected: bool) {
        let style = if is_selected {
            Style::default().bg(status_color(task.status)).fg(text_on(task.status)).add_modifier(Modifier::BOLD)
        } else {
            Style::default().bg(Color::DarkGray)
        };

        let footer = match self.session.change_state(&task.id) {
            ChangeState::Pending { previous, .. } => format!("saving... (was {})", previous.label()),
            ChangeState::Idle => task.description.lines().next().unwrap_or("").to_string(),
        };
        let card_text = vec![Line::from(task.name.clone()), Line::from(footer)];

        let card_block = Paragraph::new(card_text)
            .block(Block::default().borders(Borders::ALL))
            .style(style)
            .wrap(Wrap { trim: true });
        f.render_widget(card_block, area);
    }

    fn render_status_bar(&self, f: &mut Frame, area: Rect, board: &Board) {
        let status_text = if self.view.filter_active {
            format!("Filter: {} | Type to search, Enter to apply, Esc to cancel", self.view.filter_text)
        } else if !self.view.status_message.is_empty() {
            self.view.status_message.clone()
        } else {
            let filter_indicator = if self.view.filter_text.is_empty() {
                String::new()
            } else {
                format!(" [Filter: {}]", self.view.filter_text)
            };
            format!("Tasks: {}{} | Ctrl+Left/Right: Move | /: Filter | r: Refresh | h: Help", board.total(), filter_indicator)
        };

        let style = match self.status_level {
            Some(Level::Error) if !self.view.status_message.is_empty() => {
                Style::default().bg(status_color(Status::OnHold)).fg(Color::White)
            }
            _ => {
                let status = self.view.selected_status();
                Style::default().bg(status_color(status)).fg(text_on(status))
            }
        };

        f.render_widget(Paragraph::new(status_text).style(style).alignment(Alignment::Left), area);
    }

    fn render_task_detail_popup(&self, f: &mut Frame, board: &Board) {
        let Some(summary) = self.view.selected_task(board) else {
            return;
        };

        let popup_area = {
            let area = f.area();
            let popup_width = (area.width * 80) / 100;
            let popup_height = (area.height * 80) / 100;
            let x = (area.width - popup_width) / 2;
            let y = (area.height - popup_height) / 2;
            Rect::new(x, y, popup_width, popup_height)
        };
        f.render_widget(Clear, popup_area);

        let mut detail_lines = vec![
            Line::from(vec![Span::styled(summary.name.clone(), Style::default().add_modifier(Modifier::BOLD))]),
            Line::from(""),
            Line::from(format!("Status:       {}", summary.status.label())),
            Line::from(format!("ID:           {}", summary.id)),
            Line::from(""),
            Line::from("Description:"),
            Line::from(summary.description.clone()),
        ];

        let task = self.session.cache().borrow().task(&summary.id);
        match task {
            Some(task) => {
                detail_lines.push(Line::from(""));
                detail_lines.push(Line::from(format!(
                    "Created:      {}   Updated: {}",
                    task.created_at.format("%Y-%m-%d %H:%M"),
                    task.updated_at.format("%Y-%m-%d %H:%M")
                )));
                if !task.status_log.is_empty() {
                    detail_lines.push(Line::from(""));
                    detail_lines.push(Line::from("History:"));
                    for entry in &task.status_log {
                        detail_lines.push(Line::from(format!("  {} -> {}", entry.user.name, entry.status.label())));
                    }
                }
                detail_lines.push(Line::from(""));
                detail_lines.push(Line::from(format!("Notes ({}):", task.notes.len())));
                for note in &task.notes {
                    detail_lines.push(Line::from(format!("  {}: {}", note.author.name, note.content)));
                }
            }
            None => detail_lines.push(Line::from("Loading details...")),
        }

        let popup_block = Block::default()
            .borders(Borders::ALL)
            .title("Task Details (Enter to close, 1-5 to change status)")
            .title_alignment(Alignment::Center)
            .border_style(Style::default().fg(status_color(summary.status)).add_modifier(Modifier::BOLD));

        let popup_paragraph = Paragraph::new(detail_lines)
            .block(popup_block)
            .wrap(Wrap { trim: true })
            .style(Style::default().bg(Color::Black));
        f.render_widget(popup_paragraph, popup_area);
    }

    /// Main event loop. Must run inside a `LocalSet`; requests started by
    /// key presses run as local tasks while the loop sleeps between frames.
    pub async fn run<B: Backend>(&mut self, terminal: &mut Terminal<B>) -> io::Result<()> {
        loop {
            self.tick();
            terminal.draw(|f| self.render(f))?;

            if event::poll(Duration::ZERO)? {
                if let Event::Key(key) = event::read()? {
                    if key.kind == KeyEventKind::Press {
                        let board = self.visible_board();
                        let command = self.view.handle_key(key, &board);
                        if command != BoardCommand::None {
                            self.status_level = None;
                        }
                        if self.apply(command) {
                            break;
                        }
                    }
                }
            }

            tokio::time::sleep(TICK).await;
        }
        Ok(())
    }
}

impl Drop for BoardApp {
    fn drop(&mut self) {
        self.session.unwatch(&CacheKey::project(&self.project_id));
        if let Some(task_id) = self.detail_task.take() {
            self.session.unwatch(&CacheKey::task(&task_id));
        }
    }
}
