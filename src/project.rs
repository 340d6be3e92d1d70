//! Project data structures.
//!
//! A [`Project`] owns an ordered list of [`TaskSummary`] values (the board's
//! source) and a team of user ids. The dashboard works with the lighter
//! [`ProjectSummary`].

use serde::{Deserialize, Serialize};

use crate::fields::Status;
use crate::task::TaskSummary;

/// A project with its board tasks and team.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "projectName")]
    pub name: String,
    #[serde(rename = "clientName")]
    pub client_name: String,
    pub description: String,
    pub manager: String,
    #[serde(default)]
    pub tasks: Vec<TaskSummary>,
    #[serde(default)]
    pub team: Vec<String>,
}

impl Project {
    /// Look up one of the project's tasks.
    pub fn task(&self, task_id: &str) -> Option<&TaskSummary> {
        self.tasks.iter().find(|t| t.id == task_id)
    }

    /// Set the status of one task in place. Returns false if the task is not
    /// part of this project.
    pub fn set_task_status(&mut self, task_id: &str, status: Status) -> bool {
        match self.tasks.iter_mut().find(|t| t.id == task_id) {
            Some(task) => {
                task.status = status;
                true
            }
            None => false,
        }
    }

    /// Only the manager edits the project and its tasks.
    pub fn is_manager(&self, user_id: &str) -> bool {
        self.manager == user_id
    }

    /// Whether the user may see the project and work its board.
    pub fn has_access(&self, user_id: &str) -> bool {
        self.is_manager(user_id) || self.team.iter().any(|m| m == user_id)
    }

    pub fn summary(&self) -> ProjectSummary {
        ProjectSummary {
            id: self.id.clone(),
            name: self.name.clone(),
            client_name: self.client_name.clone(),
            description: self.description.clone(),
            manager: self.manager.clone(),
        }
    }
}

/// Dashboard list item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectSummary {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "projectName")]
    pub name: String,
    #[serde(rename = "clientName")]
    pub client_name: String,
    pub description: String,
    pub manager: String,
}

impl ProjectSummary {
    pub fn is_manager(&self, user_id: &str) -> bool {
        self.manager == user_id
    }
}

/// Editable fields of a project.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectForm {
    #[serde(rename = "projectName")]
    pub name: String,
    #[serde(rename = "clientName")]
    pub client_name: String,
    pub description: String,
}

/// Resolve a project identifier (either id or name) against the dashboard list.
/// Returns an error listing the candidates when a name is ambiguous.
pub fn resolve_project_identifier(identifier: &str, projects: &[ProjectSummary]) -> Result<String, String> {
    if let Some(p) = projects.iter().find(|p| p.id == identifier) {
        return Ok(p.id.clone());
    }

    let matches: Vec<&ProjectSummary> = projects
        .iter()
        .filter(|p| p.name.to_lowercase() == identifier.to_lowercase())
        .collect();

    match matches.len() {
        0 => Err(format!("No project found with id or name '{}'", identifier)),
        1 => Ok(matches[0].id.clone()),
        _ => {
            let mut error_msg = format!("Multiple projects found with name '{}':\n", identifier);
            for p in matches {
                error_msg.push_str(&format!("  ID {}: {} [client: {}]\n", p.id, p.name, p.client_name));
            }
            error_msg.push_str("Please use the specific ID instead.");
            Err(error_msg)
        }
    }
}

/// Resolve a task identifier (either id or name) within a project.
pub fn resolve_task_identifier(identifier: &str, project: &Project) -> Result<String, String> {
    if project.task(identifier).is_some() {
        return Ok(identifier.to_string());
    }

    let matches: Vec<&TaskSummary> = project
        .tasks
        .iter()
        .filter(|t| t.name.to_lowercase() == identifier.to_lowercase())
        .collect();

    match matches.len() {
        0 => Err(format!("No task found with id or name '{}' in project '{}'", identifier, project.name)),
        1 => Ok(matches[0].id.clone()),
        _ => {
            let mut error_msg = format!("Multiple tasks found with name '{}':\n", identifier);
            for t in matches {
                error_msg.push_str(&format!("  ID {}: {} ({})\n", t.id, t.name, t.status.label()));
            }
            error_msg.push_str("Please use the specific ID instead.");
            Err(error_msg)
        }
    }
}
