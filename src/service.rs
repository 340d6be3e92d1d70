//! Remote task service contract.
//!
//! The service is the authoritative store for projects, tasks, notes and
//! team membership. Everything the client shows is a cached copy of what an
//! implementation of [`TaskService`] returned.

use async_trait::async_trait;
use thiserror::Error;

use crate::fields::Status;
use crate::project::{Project, ProjectForm, ProjectSummary};
use crate::task::{NoteForm, PasswordForm, ProfileForm, Task, TaskForm, TeamMember, User};

/// Failure of a service call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceError {
    /// The service answered and refused the request.
    #[error("{reason}")]
    Rejected { reason: String },

    /// The service could not be reached.
    #[error("service unreachable: {0}")]
    Unreachable(String),

    /// The service answered with something we could not decode.
    #[error("malformed response: {0}")]
    Malformed(String),

    /// The local store failed to persist a change.
    #[error("storage error: {0}")]
    Storage(String),
}

impl ServiceError {
    pub fn rejected(reason: impl Into<String>) -> Self {
        ServiceError::Rejected { reason: reason.into() }
    }

    /// Human-readable reason, suitable for a notification.
    pub fn reason(&self) -> String {
        match self {
            ServiceError::Rejected { reason } => reason.clone(),
            other => other.to_string(),
        }
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Request/response operations offered by the remote service.
///
/// Mutations resolve to the service's confirmation message. Implementations
/// run on a single-threaded executor, so futures need not be `Send`.
#[async_trait(?Send)]
pub trait TaskService {
    /// The authenticated user.
    async fn current_user(&self) -> ServiceResult<User>;
    async fn update_profile(&self, form: &ProfileForm) -> ServiceResult<String>;
    async fn update_password(&self, form: &PasswordForm) -> ServiceResult<String>;
    /// Confirm the current user's password ahead of a destructive action.
    async fn check_password(&self, password: &str) -> ServiceResult<String>;
    /// End the authenticated session on the server.
    async fn logout(&self) -> ServiceResult<String>;

    /// Projects visible to the current user.
    async fn projects(&self) -> ServiceResult<Vec<ProjectSummary>>;
    async fn create_project(&self, form: &ProjectForm) -> ServiceResult<String>;
    async fn project(&self, project_id: &str) -> ServiceResult<Project>;
    async fn update_project(&self, project_id: &str, form: &ProjectForm) -> ServiceResult<String>;
    async fn delete_project(&self, project_id: &str) -> ServiceResult<String>;

    async fn create_task(&self, project_id: &str, form: &TaskForm) -> ServiceResult<String>;
    async fn task(&self, project_id: &str, task_id: &str) -> ServiceResult<Task>;
    async fn update_task(&self, project_id: &str, task_id: &str, form: &TaskForm) -> ServiceResult<String>;
    async fn delete_task(&self, project_id: &str, task_id: &str) -> ServiceResult<String>;
    async fn change_task_status(&self, project_id: &str, task_id: &str, status: Status) -> ServiceResult<String>;

    async fn create_note(&self, project_id: &str, task_id: &str, form: &NoteForm) -> ServiceResult<String>;
    async fn delete_note(&self, project_id: &str, task_id: &str, note_id: &str) -> ServiceResult<String>;

    async fn team(&self, project_id: &str) -> ServiceResult<Vec<TeamMember>>;
    /// Look a user up by email so they can be added to the team.
    async fn find_member(&self, project_id: &str, email: &str) -> ServiceResult<TeamMember>;
    async fn add_member(&self, project_id: &str, user_id: &str) -> ServiceResult<String>;
    async fn remove_member(&self, project_id: &str, user_id: &str) -> ServiceResult<String>;
}
