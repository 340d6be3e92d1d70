//! # task_board
//!
//! Client for a project/task management service, built around an
//! optimistic kanban board.
//!
//! A project's tasks are grouped into five status columns ([`board`]).
//! Everything shown is a cached copy of what the authoritative service
//! returned ([`cache`], [`service`]). Dragging a card to another column is
//! applied to the cache at once and confirmed or rolled back when the
//! service answers ([`orchestrator`]); the outcome is reported as a
//! notification ([`notify`]). [`session::BoardSession`] wires these together
//! and reconciles the cache after every other mutation.
//!
//! Two service implementations are provided: [`http::HttpTaskService`] for
//! the remote REST API and [`memory::InMemoryTaskService`], a local
//! JSON-backed store with the same rules.
//!
//! ## Quick Start
//!
//! ```bash
//! # Create a project and a task in the local store
//! tb project add "Website" --client Acme --desc "Relaunch"
//! tb task add Website "Design mockups" --desc "Landing page"
//!
//! # Move it and look at the board
//! tb move Website "Design mockups" in-progress
//! tb board Website
//!
//! # Interactive board
//! tb ui Website
//!
//! # Against a remote API
//! TASKBOARD_API_URL=https://tasks.example.com/api TASKBOARD_TOKEN=... tb projects
//! ```

pub mod board;
pub mod cache;
pub mod cli;
pub mod cmd;
pub mod config;
pub mod db;
pub mod error;
pub mod fields;
pub mod http;
pub mod logging;
pub mod memory;
pub mod notify;
pub mod orchestrator;
pub mod project;
pub mod service;
pub mod session;
pub mod task;
pub mod tui {
    pub mod board;
    pub mod colors;
    pub mod run;
}

#[cfg(test)]
pub(crate) mod testing;
