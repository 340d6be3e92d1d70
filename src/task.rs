//! Task data structures and related functionality.
//!
//! This module defines the full [`Task`] returned by the task-detail endpoint,
//! the lighter [`TaskSummary`] a project embeds for its board, and the notes
//! and users hanging off a task. Field names follow the remote API's JSON.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::fields::Status;

/// A user as referenced by tasks, notes and projects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    pub email: String,
}

/// Team members carry the same fields as users.
pub type TeamMember = User;

/// One entry of a task's status-change log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusLogEntry {
    #[serde(rename = "_id")]
    pub id: String,
    pub user: User,
    pub status: Status,
}

/// A comment attached to a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    #[serde(rename = "_id")]
    pub id: String,
    pub content: String,
    #[serde(rename = "createdBy")]
    pub author: User,
    pub task: String,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
}

impl Note {
    /// Only the author of a note may delete it.
    pub fn can_delete(&self, user_id: &str) -> bool {
        self.author.id == user_id
    }
}

/// A work item with its full history, as shown in the task-detail view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    pub description: String,
    pub status: Status,
    pub project: String,
    #[serde(rename = "completedBy", default)]
    pub status_log: Vec<StatusLogEntry>,
    #[serde(default)]
    pub notes: Vec<Note>,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// The subset of fields a project carries for its board.
    pub fn summary(&self) -> TaskSummary {
        TaskSummary {
            id: self.id.clone(),
            name: self.name.clone(),
            description: self.description.clone(),
            status: self.status,
        }
    }
}

/// The project-level view of a task: enough to place it on the board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskSummary {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    pub description: String,
    pub status: Status,
}

/// Editable fields of a task.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskForm {
    pub name: String,
    pub description: String,
}

/// Payload for creating a note.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteForm {
    pub content: String,
}

/// Editable fields of the current user's profile.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileForm {
    pub name: String,
    pub email: String,
}

/// Password change for the current user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PasswordForm {
    pub current_password: String,
    pub password: String,
    pub password_confirmation: String,
}
