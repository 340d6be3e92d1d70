//! Board TUI entry point and setup.

use std::io;
use std::rc::Rc;

use crossterm::{
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{prelude::CrosstermBackend, Terminal};
use tokio::task::LocalSet;

use crate::notify::ToastQueue;
use crate::project::Project;
use crate::session::BoardSession;
use crate::tui::board::BoardApp;

/// Initialise and run the board for `project` until the user exits.
pub async fn run_board_tui(session: Rc<BoardSession>, toasts: Rc<ToastQueue>, project: &Project) -> io::Result<()> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let local = LocalSet::new();
    let result = local
        .run_until(async {
            let mut app = BoardApp::new(session, toasts, project);
            app.run(&mut terminal).await
        })
        .await;

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    // Requests still in flight when the board closed settle before we return.
    local.await;
    result
}
