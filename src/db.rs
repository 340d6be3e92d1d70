//! On-disk store for the local task service.
//!
//! The local backend keeps every user, project and task in one JSON file,
//! written atomically (temp file + rename) after each mutation.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::project::{Project, ProjectSummary};
use crate::task::{Task, User};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to access store {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse store {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to encode store: {0}")]
    Encode(#[from] serde_json::Error),
}

/// A project as persisted: its tasks live in [`Store::tasks`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredProject {
    pub id: String,
    pub name: String,
    pub client_name: String,
    pub description: String,
    pub manager: String,
    #[serde(default)]
    pub team: Vec<String>,
}

impl StoredProject {
    pub fn summary(&self) -> ProjectSummary {
        ProjectSummary {
            id: self.id.clone(),
            name: self.name.clone(),
            client_name: self.client_name.clone(),
            description: self.description.clone(),
            manager: self.manager.clone(),
        }
    }

    pub fn has_access(&self, user_id: &str) -> bool {
        self.manager == user_id || self.team.iter().any(|m| m == user_id)
    }
}

/// Everything the local backend knows.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Store {
    #[serde(default)]
    pub users: Vec<User>,
    /// Passwords by user id. Users without an entry have not set one.
    #[serde(default)]
    pub passwords: BTreeMap<String, String>,
    #[serde(default)]
    pub projects: Vec<StoredProject>,
    #[serde(default)]
    pub tasks: Vec<Task>,
}

impl Store {
    /// Load the store from a JSON file. A missing file is an empty store.
    pub fn load(path: &Path) -> Result<Self, StoreError> {
        if !path.exists() {
            return Ok(Store::default());
        }
        let mut buf = String::new();
        File::open(path)
            .and_then(|mut f| f.read_to_string(&mut buf))
            .map_err(|source| StoreError::Io { path: path.display().to_string(), source })?;
        serde_json::from_str(&buf).map_err(|source| StoreError::Parse { path: path.display().to_string(), source })
    }

    /// Save the store to a JSON file using atomic write (temp file + rename).
    pub fn save(&self, path: &Path) -> Result<(), StoreError> {
        let io_err = |source| StoreError::Io { path: path.display().to_string(), source };
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(io_err)?;
            }
        }
        let tmp = path.with_extension("json.tmp");
        let data = serde_json::to_string_pretty(self)?;
        let mut f = File::create(&tmp).map_err(io_err)?;
        f.write_all(data.as_bytes()).map_err(io_err)?;
        f.flush().map_err(io_err)?;
        fs::rename(&tmp, path).map_err(io_err)?;
        Ok(())
    }

    pub fn user(&self, id: &str) -> Option<&User> {
        self.users.iter().find(|u| u.id == id)
    }

    pub fn user_mut(&mut self, id: &str) -> Option<&mut User> {
        self.users.iter_mut().find(|u| u.id == id)
    }

    pub fn user_by_email(&self, email: &str) -> Option<&User> {
        self.users.iter().find(|u| u.email.eq_ignore_ascii_case(email))
    }

    pub fn user_by_name(&self, name: &str) -> Option<&User> {
        self.users.iter().find(|u| u.name == name)
    }

    pub fn project(&self, id: &str) -> Option<&StoredProject> {
        self.projects.iter().find(|p| p.id == id)
    }

    pub fn project_mut(&mut self, id: &str) -> Option<&mut StoredProject> {
        self.projects.iter_mut().find(|p| p.id == id)
    }

    pub fn task(&self, id: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    pub fn task_mut(&mut self, id: &str) -> Option<&mut Task> {
        self.tasks.iter_mut().find(|t| t.id == id)
    }

    /// Assemble the API view of a project, tasks in creation order.
    pub fn project_view(&self, id: &str) -> Option<Project> {
        let stored = self.project(id)?;
        Some(Project {
            id: stored.id.clone(),
            name: stored.name.clone(),
            client_name: stored.client_name.clone(),
            description: stored.description.clone(),
            manager: stored.manager.clone(),
            tasks: self.tasks.iter().filter(|t| t.project == id).map(Task::summary).collect(),
            team: stored.team.clone(),
        })
    }

    /// Remove a project together with its tasks.
    pub fn remove_project(&mut self, id: &str) {
        self.projects.retain(|p| p.id != id);
        self.tasks.retain(|t| t.project != id);
    }
}
