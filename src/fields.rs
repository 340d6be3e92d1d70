//! Enumerations and field types for task management.
//!
//! The board is organised around a single workflow enumeration, [`Status`],
//! whose canonical order is also the left-to-right column order of the board.

use std::fmt;
use std::str::FromStr;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Workflow stage of a task.
///
/// Serialised in camelCase to match the remote API (`onHold`, `inProgress`,
/// ...). The command line uses the kebab-case spelling (`on-hold`).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, ValueEnum, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "camelCase")]
pub enum Status {
    Pending,
    OnHold,
    InProgress,
    UnderReview,
    Completed,
}

impl Status {
    /// Every status, in board order.
    pub const ALL: [Status; 5] = [
        Status::Pending,
        Status::OnHold,
        Status::InProgress,
        Status::UnderReview,
        Status::Completed,
    ];

    /// Column position of this status on the board.
    pub fn index(self) -> usize {
        match self {
            Status::Pending => 0,
            Status::OnHold => 1,
            Status::InProgress => 2,
            Status::UnderReview => 3,
            Status::Completed => 4,
        }
    }

    /// Wire identifier, as used by the API and as drop-target ids.
    pub fn as_str(self) -> &'static str {
        match self {
            Status::Pending => "pending",
            Status::OnHold => "onHold",
            Status::InProgress => "inProgress",
            Status::UnderReview => "underReview",
            Status::Completed => "completed",
        }
    }

    /// Human-readable column title.
    pub fn label(self) -> &'static str {
        match self {
            Status::Pending => "Pending",
            Status::OnHold => "On hold",
            Status::InProgress => "In progress",
            Status::UnderReview => "Under review",
            Status::Completed => "Completed",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Raised when a string names none of the five statuses.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown status '{0}'")]
pub struct UnknownStatus(pub String);

impl FromStr for Status {
    type Err = UnknownStatus;

    /// Accepts the wire spelling (`onHold`) and the CLI spelling (`on-hold`),
    /// case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalised: String = s
            .trim()
            .chars()
            .filter(|c| *c != '-' && *c != '_' && *c != ' ')
            .collect::<String>()
            .to_lowercase();
        match normalised.as_str() {
            "pending" => Ok(Status::Pending),
            "onhold" => Ok(Status::OnHold),
            "inprogress" => Ok(Status::InProgress),
            "underreview" => Ok(Status::UnderReview),
            "completed" => Ok(Status::Completed),
            _ => Err(UnknownStatus(s.to_string())),
        }
    }
}
