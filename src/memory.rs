//! Local, file-backed implementation of [`TaskService`].
//!
//! Behaves like the remote API: it is the authority for every entity,
//! enforces the same permission rules (manager-only project and task edits,
//! team access for status changes and notes, author-only note deletion),
//! records a status-log entry for each status change, and answers mutations
//! with a confirmation message.
//!
//! A mutation is applied to a copy of the store and only becomes visible
//! once that copy has been saved. A failed save leaves the service as it was.
//!
//! Passwords are optional for local users. Until one is set with
//! `update_password`, the password checks accept any input.

use std::cell::RefCell;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::db::{Store, StoreError, StoredProject};
use crate::fields::Status;
use crate::project::{Project, ProjectForm, ProjectSummary};
use crate::service::{ServiceError, ServiceResult, TaskService};
use crate::task::{Note, NoteForm, PasswordForm, ProfileForm, StatusLogEntry, Task, TaskForm, TeamMember, User};

fn new_id() -> String {
    Uuid::new_v4().simple().to_string()
}

fn require(value: &str, message: &str) -> ServiceResult<()> {
    if value.trim().is_empty() {
        return Err(ServiceError::rejected(message));
    }
    Ok(())
}

/// Authoritative in-process task service, optionally persisted to disk.
#[derive(Debug)]
pub struct InMemoryTaskService {
    store: RefCell<Store>,
    path: Option<PathBuf>,
    current_user: RefCell<String>,
}

impl InMemoryTaskService {
    /// Serve `store` on behalf of `user`, registering the user if needed.
    pub fn new(mut store: Store, user: User) -> Self {
        if store.user(&user.id).is_none() {
            store.users.push(user.clone());
        }
        InMemoryTaskService {
            store: RefCell::new(store),
            path: None,
            current_user: RefCell::new(user.id),
        }
    }

    /// Open (or create) a store file and act as the user called `user_name`.
    pub fn open(path: &Path, user_name: &str) -> Result<Self, StoreError> {
        let mut store = Store::load(path)?;
        let user = match store.user_by_name(user_name) {
            Some(u) => u.clone(),
            None => {
                let user = User {
                    id: new_id(),
                    name: user_name.to_string(),
                    email: format!("{}@localhost", user_name.to_lowercase()),
                };
                info!(name = %user.name, "registering local user");
                store.users.push(user.clone());
                store.save(path)?;
                user
            }
        };
        let mut service = Self::new(store, user);
        service.path = Some(path.to_path_buf());
        Ok(service)
    }

    /// Register another user (e.g. a future team member).
    pub fn add_user(&self, user: User) {
        let mut store = self.store.borrow_mut();
        if store.user(&user.id).is_none() {
            store.users.push(user);
        }
    }

    /// Act as a different registered user from now on.
    pub fn switch_user(&self, user_id: &str) -> ServiceResult<()> {
        if self.store.borrow().user(user_id).is_none() {
            return Err(ServiceError::rejected("User not found"));
        }
        *self.current_user.borrow_mut() = user_id.to_string();
        Ok(())
    }

    fn user_id(&self) -> String {
        self.current_user.borrow().clone()
    }

    fn persist(&self, store: &Store) -> ServiceResult<()> {
        if let Some(path) = &self.path {
            store.save(path).map_err(|e| ServiceError::Storage(e.to_string()))?;
        }
        Ok(())
    }

    /// Run a mutation against a copy of the store. The copy replaces the
    /// live store only after the mutation succeeded and was saved.
    fn mutate<T>(&self, f: impl FnOnce(&mut Store, &str) -> ServiceResult<T>) -> ServiceResult<T> {
        let user_id = self.user_id();
        let mut draft = self.store.borrow().clone();
        let result = f(&mut draft, &user_id)?;
        self.persist(&draft)?;
        *self.store.borrow_mut() = draft;
        Ok(result)
    }

    fn password_matches(store: &Store, user_id: &str, password: &str) -> bool {
        match store.passwords.get(user_id) {
            Some(stored) => stored == password,
            None => true,
        }
    }

    fn accessible<'a>(store: &'a Store, project_id: &str, user_id: &str) -> ServiceResult<&'a StoredProject> {
        let project = store.project(project_id).ok_or_else(|| ServiceError::rejected("Project not found"))?;
        if !project.has_access(user_id) {
            return Err(ServiceError::rejected("Invalid action"));
        }
        Ok(project)
    }

    fn managed<'a>(store: &'a Store, project_id: &str, user_id: &str) -> ServiceResult<&'a StoredProject> {
        let project = Self::accessible(store, project_id, user_id)?;
        if project.manager != user_id {
            return Err(ServiceError::rejected("Invalid action"));
        }
        Ok(project)
    }

    fn task_in<'a>(store: &'a mut Store, project_id: &str, task_id: &str) -> ServiceResult<&'a mut Task> {
        match store.task_mut(task_id) {
            Some(task) if task.project == project_id => Ok(task),
            _ => Err(ServiceError::rejected("Task not found")),
        }
    }
}

#[async_trait(?Send)]
impl TaskService for InMemoryTaskService {
    async fn current_user(&self) -> ServiceResult<User> {
        let id = self.user_id();
        self.store.borrow().user(&id).cloned().ok_or_else(|| ServiceError::rejected("User not found"))
    }

    async fn update_profile(&self, form: &ProfileForm) -> ServiceResult<String> {
        require(&form.name, "Name is required")?;
        require(&form.email, "Email is required")?;
        let email = form.email.trim().to_string();
        self.mutate(|store, user_id| {
            if store.user_by_email(&email).is_some_and(|u| u.id != user_id) {
                return Err(ServiceError::rejected("That email is already registered"));
            }
            let user = store.user_mut(user_id).ok_or_else(|| ServiceError::rejected("User not found"))?;
            user.name = form.name.trim().to_string();
            user.email = email.clone();
            Ok("Profile updated successfully".to_string())
        })
    }

    async fn update_password(&self, form: &PasswordForm) -> ServiceResult<String> {
        require(&form.password, "New password is required")?;
        if form.password != form.password_confirmation {
            return Err(ServiceError::rejected("The passwords do not match"));
        }
        self.mutate(|store, user_id| {
            if !Self::password_matches(store, user_id, &form.current_password) {
                return Err(ServiceError::rejected("Current password is incorrect"));
            }
            store.passwords.insert(user_id.to_string(), form.password.clone());
            Ok("Password updated successfully".to_string())
        })
    }

    async fn check_password(&self, password: &str) -> ServiceResult<String> {
        let user_id = self.user_id();
        if !Self::password_matches(&self.store.borrow(), &user_id, password) {
            return Err(ServiceError::rejected("Incorrect password"));
        }
        Ok("Password is correct".to_string())
    }

    async fn logout(&self) -> ServiceResult<String> {
        debug!(user = %self.user_id(), "local logout");
        Ok("Logged out successfully".to_string())
    }

    async fn projects(&self) -> ServiceResult<Vec<ProjectSummary>> {
        let user_id = self.user_id();
        let store = self.store.borrow();
        Ok(store
            .projects
            .iter()
            .filter(|p| p.has_access(&user_id))
            .map(StoredProject::summary)
            .collect())
    }

    async fn create_project(&self, form: &ProjectForm) -> ServiceResult<String> {
        require(&form.name, "Project name is required")?;
        require(&form.client_name, "Client name is required")?;
        self.mutate(|store, user_id| {
            store.projects.push(StoredProject {
                id: new_id(),
                name: form.name.trim().to_string(),
                client_name: form.client_name.trim().to_string(),
                description: form.description.clone(),
                manager: user_id.to_string(),
                team: Vec::new(),
            });
            Ok("Project created successfully".to_string())
        })
    }

    async fn project(&self, project_id: &str) -> ServiceResult<Project> {
        let user_id = self.user_id();
        let store = self.store.borrow();
        Self::accessible(&store, project_id, &user_id)?;
        store.project_view(project_id).ok_or_else(|| ServiceError::rejected("Project not found"))
    }

    async fn update_project(&self, project_id: &str, form: &ProjectForm) -> ServiceResult<String> {
        require(&form.name, "Project name is required")?;
        require(&form.client_name, "Client name is required")?;
        self.mutate(|store, user_id| {
            Self::managed(store, project_id, user_id)?;
            if let Some(project) = store.project_mut(project_id) {
                project.name = form.name.trim().to_string();
                project.client_name = form.client_name.trim().to_string();
                project.description = form.description.clone();
            }
            Ok("Project updated".to_string())
        })
    }

    async fn delete_project(&self, project_id: &str) -> ServiceResult<String> {
        self.mutate(|store, user_id| {
            Self::managed(store, project_id, user_id)?;
            store.remove_project(project_id);
            Ok("Project deleted".to_string())
        })
    }

    async fn create_task(&self, project_id: &str, form: &TaskForm) -> ServiceResult<String> {
        require(&form.name, "Task name is required")?;
        self.mutate(|store, user_id| {
            Self::managed(store, project_id, user_id)?;
            let now = Utc::now();
            store.tasks.push(Task {
                id: new_id(),
                name: form.name.trim().to_string(),
                description: form.description.clone(),
                status: Status::Pending,
                project: project_id.to_string(),
                status_log: Vec::new(),
                notes: Vec::new(),
                created_at: now,
                updated_at: now,
            });
            Ok("Task created successfully".to_string())
        })
    }

    async fn task(&self, project_id: &str, task_id: &str) -> ServiceResult<Task> {
        let user_id = self.user_id();
        let store = self.store.borrow();
        Self::accessible(&store, project_id, &user_id)?;
        match store.task(task_id) {
            Some(task) if task.project == project_id => Ok(task.clone()),
            _ => Err(ServiceError::rejected("Task not found")),
        }
    }

    async fn update_task(&self, project_id: &str, task_id: &str, form: &TaskForm) -> ServiceResult<String> {
        require(&form.name, "Task name is required")?;
        self.mutate(|store, user_id| {
            Self::managed(store, project_id, user_id)?;
            let task = Self::task_in(store, project_id, task_id)?;
            task.name = form.name.trim().to_string();
            task.description = form.description.clone();
            task.updated_at = Utc::now();
            Ok("Task updated".to_string())
        })
    }

    async fn delete_task(&self, project_id: &str, task_id: &str) -> ServiceResult<String> {
        self.mutate(|store, user_id| {
            Self::managed(store, project_id, user_id)?;
            Self::task_in(store, project_id, task_id)?;
            store.tasks.retain(|t| t.id != task_id);
            Ok("Task deleted".to_string())
        })
    }

    async fn change_task_status(&self, project_id: &str, task_id: &str, status: Status) -> ServiceResult<String> {
        self.mutate(|store, user_id| {
            Self::accessible(store, project_id, user_id)?;
            let user = store.user(user_id).cloned().ok_or_else(|| ServiceError::rejected("User not found"))?;
            let task = Self::task_in(store, project_id, task_id)?;
            debug!(task = %task_id, from = ?task.status, to = ?status, "status change");
            task.status = status;
            task.updated_at = Utc::now();
            task.status_log.push(StatusLogEntry { id: new_id(), user, status });
            Ok("Task status updated".to_string())
        })
    }

    async fn create_note(&self, project_id: &str, task_id: &str, form: &NoteForm) -> ServiceResult<String> {
        require(&form.content, "Content is required")?;
        self.mutate(|store, user_id| {
            Self::accessible(store, project_id, user_id)?;
            let author = store.user(user_id).cloned().ok_or_else(|| ServiceError::rejected("User not found"))?;
            let task = Self::task_in(store, project_id, task_id)?;
            task.notes.push(Note {
                id: new_id(),
                content: form.content.clone(),
                author,
                task: task_id.to_string(),
                created_at: Utc::now(),
            });
            Ok("Note created".to_string())
        })
    }

    async fn delete_note(&self, project_id: &str, task_id: &str, note_id: &str) -> ServiceResult<String> {
        self.mutate(|store, user_id| {
            Self::accessible(store, project_id, user_id)?;
            let task = Self::task_in(store, project_id, task_id)?;
            let note = task
                .notes
                .iter()
                .find(|n| n.id == note_id)
                .ok_or_else(|| ServiceError::rejected("Note not found"))?;
            if !note.can_delete(user_id) {
                return Err(ServiceError::rejected("Invalid action"));
            }
            task.notes.retain(|n| n.id != note_id);
            Ok("Note deleted".to_string())
        })
    }

    async fn team(&self, project_id: &str) -> ServiceResult<Vec<TeamMember>> {
        let user_id = self.user_id();
        let store = self.store.borrow();
        let project = Self::accessible(&store, project_id, &user_id)?;
        Ok(project.team.iter().filter_map(|id| store.user(id).cloned()).collect())
    }

    async fn find_member(&self, project_id: &str, email: &str) -> ServiceResult<TeamMember> {
        let user_id = self.user_id();
        let store = self.store.borrow();
        Self::managed(&store, project_id, &user_id)?;
        store.user_by_email(email.trim()).cloned().ok_or_else(|| ServiceError::rejected("User not found"))
    }

    async fn add_member(&self, project_id: &str, member_id: &str) -> ServiceResult<String> {
        self.mutate(|store, user_id| {
            Self::managed(store, project_id, user_id)?;
            if store.user(member_id).is_none() {
                return Err(ServiceError::rejected("User not found"));
            }
            let project = store.project_mut(project_id).ok_or_else(|| ServiceError::rejected("Project not found"))?;
            if project.manager == member_id || project.team.iter().any(|m| m == member_id) {
                return Err(ServiceError::rejected("User already exists in project"));
            }
            project.team.push(member_id.to_string());
            Ok("Member added successfully".to_string())
        })
    }

    async fn remove_member(&self, project_id: &str, member_id: &str) -> ServiceResult<String> {
        self.mutate(|store, user_id| {
            Self::managed(store, project_id, user_id)?;
            let project = store.project_mut(project_id).ok_or_else(|| ServiceError::rejected("Project not found"))?;
            if !project.team.iter().any(|m| m == member_id) {
                return Err(ServiceError::rejected("User does not exist in project"));
            }
            project.team.retain(|m| m != member_id);
            Ok("Member removed successfully".to_string())
        })
    }
}
