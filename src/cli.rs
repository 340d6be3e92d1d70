use std::path::PathBuf;

use clap::Parser;

use crate::cmd::Commands;
use crate::config::Options;

/// Terminal client for a project/task service with a kanban board.
/// Talks to a remote API when --api-url is set, otherwise serves a local
/// store at ~/.taskboard/store.json.
#[derive(Parser)]
#[command(name = "tb", version, about = "Project boards from the terminal")]
pub struct Cli {
    /// Base URL of the remote task API.
    #[arg(long, global = true, env = "TASKBOARD_API_URL")]
    pub api_url: Option<String>,

    /// Bearer token for the remote API.
    #[arg(long, global = true, env = "TASKBOARD_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Path to the local JSON store (ignored with --api-url).
    #[arg(long, global = true, env = "TASKBOARD_STORE")]
    pub store: Option<PathBuf>,

    /// Local user to act as (ignored with --api-url).
    #[arg(long, global = true, env = "TASKBOARD_USER")]
    pub user: Option<String>,

    /// Debug logging (RUST_LOG overrides).
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    pub fn options(&self) -> Options {
        Options {
            api_url: self.api_url.clone(),
            token: self.token.clone(),
            store: self.store.clone(),
            user: self.user.clone(),
        }
    }
}
