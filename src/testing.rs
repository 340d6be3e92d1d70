//! Test doubles shared by unit tests.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use async_trait::async_trait;
use tokio::sync::Notify;

use crate::db::Store;
use crate::fields::Status;
use crate::memory::InMemoryTaskService;
use crate::project::{Project, ProjectForm, ProjectSummary};
use crate::service::{ServiceError, ServiceResult, TaskService};
use crate::task::{NoteForm, PasswordForm, ProfileForm, Task, TaskForm, TeamMember, User};

pub fn user(id: &str, name: &str) -> User {
    User { id: id.into(), name: name.into(), email: format!("{name}@example.com") }
}

/// A service with users `ana` (u1, manager) and `ben` (u2), one project
/// and one pending task. Returns the project and task ids.
pub async fn seeded_service() -> (InMemoryTaskService, String, String) {
    let service = InMemoryTaskService::new(Store::default(), user("u1", "ana"));
    service.add_user(user("u2", "ben"));
    service
        .create_project(&ProjectForm { name: "Website".into(), client_name: "Acme".into(), description: "Relaunch".into() })
        .await
        .unwrap();
    let project_id = service.projects().await.unwrap()[0].id.clone();
    service
        .create_task(&project_id, &TaskForm { name: "Design".into(), description: "mockups".into() })
        .await
        .unwrap();
    let task_id = service.project(&project_id).await.unwrap().tasks[0].id.clone();
    (service, project_id, task_id)
}

/// Wraps a real service. Status changes can be held at a gate, forced to
/// fail, and are counted. Project fetches can be held after the server
/// snapshot is taken.
pub struct GatedService {
    inner: InMemoryTaskService,
    gate: RefCell<Option<Rc<Notify>>>,
    fetch_gate: RefCell<Option<Rc<Notify>>>,
    failure: RefCell<Option<ServiceError>>,
    status_calls: Cell<usize>,
}

impl GatedService {
    pub fn new(inner: InMemoryTaskService) -> Self {
        GatedService {
            inner,
            gate: RefCell::new(None),
            fetch_gate: RefCell::new(None),
            failure: RefCell::new(None),
            status_calls: Cell::new(0),
        }
    }

    /// Project fetches read the server state, then wait until the returned
    /// gate is notified before answering with it.
    pub fn hold_project_fetches(&self) -> Rc<Notify> {
        let gate = Rc::new(Notify::new());
        *self.fetch_gate.borrow_mut() = Some(Rc::clone(&gate));
        gate
    }

    /// Status changes wait until the returned gate is notified.
    pub fn hold_status_changes(&self) -> Rc<Notify> {
        let gate = Rc::new(Notify::new());
        *self.gate.borrow_mut() = Some(Rc::clone(&gate));
        gate
    }

    pub fn fail_status_changes(&self, err: ServiceError) {
        *self.failure.borrow_mut() = Some(err);
    }

    pub fn status_calls(&self) -> usize {
        self.status_calls.get()
    }
}

#[async_trait(?Send)]
impl TaskService for GatedService {
    async fn current_user(&self) -> ServiceResult<User> {
        self.inner.current_user().await
    }

    async fn update_profile(&self, form: &ProfileForm) -> ServiceResult<String> {
        self.inner.update_profile(form).await
    }

    async fn update_password(&self, form: &PasswordForm) -> ServiceResult<String> {
        self.inner.update_password(form).await
    }

    async fn check_password(&self, password: &str) -> ServiceResult<String> {
        self.inner.check_password(password).await
    }

    async fn logout(&self) -> ServiceResult<String> {
        self.inner.logout().await
    }

    async fn projects(&self) -> ServiceResult<Vec<ProjectSummary>> {
        self.inner.projects().await
    }

    async fn create_project(&self, form: &ProjectForm) -> ServiceResult<String> {
        self.inner.create_project(form).await
    }

    async fn project(&self, project_id: &str) -> ServiceResult<Project> {
        let snapshot = self.inner.project(project_id).await;
        let gate = self.fetch_gate.borrow().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        snapshot
    }

    async fn update_project(&self, project_id: &str, form: &ProjectForm) -> ServiceResult<String> {
        self.inner.update_project(project_id, form).await
    }

    async fn delete_project(&self, project_id: &str) -> ServiceResult<String> {
        self.inner.delete_project(project_id).await
    }

    async fn create_task(&self, project_id: &str, form: &TaskForm) -> ServiceResult<String> {
        self.inner.create_task(project_id, form).await
    }

    async fn task(&self, project_id: &str, task_id: &str) -> ServiceResult<Task> {
        self.inner.task(project_id, task_id).await
    }

    async fn update_task(&self, project_id: &str, task_id: &str, form: &TaskForm) -> ServiceResult<String> {
        self.inner.update_task(project_id, task_id, form).await
    }

    async fn delete_task(&self, project_id: &str, task_id: &str) -> ServiceResult<String> {
        self.inner.delete_task(project_id, task_id).await
    }

    async fn change_task_status(&self, project_id: &str, task_id: &str, status: Status) -> ServiceResult<String> {
        self.status_calls.set(self.status_calls.get() + 1);
        let gate = self.gate.borrow().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        let failure = self.failure.borrow().clone();
        if let Some(err) = failure {
            return Err(err);
        }
        self.inner.change_task_status(project_id, task_id, status).await
    }

    async fn create_note(&self, project_id: &str, task_id: &str, form: &NoteForm) -> ServiceResult<String> {
        self.inner.create_note(project_id, task_id, form).await
    }

    async fn delete_note(&self, project_id: &str, task_id: &str, note_id: &str) -> ServiceResult<String> {
        self.inner.delete_note(project_id, task_id, note_id).await
    }

    async fn team(&self, project_id: &str) -> ServiceResult<Vec<TeamMember>> {
        self.inner.team(project_id).await
    }

    async fn find_member(&self, project_id: &str, email: &str) -> ServiceResult<TeamMember> {
        self.inner.find_member(project_id, email).await
    }

    async fn add_member(&self, project_id: &str, user_id: &str) -> ServiceResult<String> {
        self.inner.add_member(project_id, user_id).await
    }

    async fn remove_member(&self, project_id: &str, user_id: &str) -> ServiceResult<String> {
        self.inner.remove_member(project_id, user_id).await
    }
}
