use std::rc::Rc;

use clap::Parser;

use task_board::cli::Cli;
use task_board::cmd::{cmd_completions, dispatch, Commands};
use task_board::config::Settings;
use task_board::logging;
use task_board::notify::ToastQueue;
use task_board::session::BoardSession;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();

    if let Commands::Completions { shell } = &cli.command {
        cmd_completions(*shell);
        return;
    }

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let settings = Settings::resolve(cli.options())?;

    // The board owns the terminal, so its logs go to a file.
    if matches!(cli.command, Commands::Ui { .. }) {
        settings.ensure_data_dir()?;
        logging::init_file(cli.verbose, &settings.log_file())?;
    } else {
        logging::init_stderr(cli.verbose);
    }
    tracing::debug!(backend = %settings.describe(), "starting");

    let service = settings.connect()?;
    let toasts = Rc::new(ToastQueue::new());
    let session = Rc::new(BoardSession::new(service, toasts.clone()));
    dispatch(cli.command, session, toasts).await
}
