//! Client session: the entity cache, the remote service, the status-change
//! orchestrator and the notification sink, wired together.
//!
//! Reads go through the cache (fresh entries are served without a request).
//! Every mutation reconciles the cache the same way the web client does:
//! the views that aggregate the mutated entity are invalidated and refetched
//! when something is watching them. Board drags go through the optimistic
//! [`StatusOrchestrator`].
//!
//! All state is single-threaded (`Rc`/`RefCell`). No borrow is held across
//! an `.await`, so several operations may be in flight on one executor.

use std::cell::RefCell;
use std::rc::Rc;

use tracing::{debug, warn};

use crate::board::{group_by_status, Board};
use crate::cache::{CacheHandle, CacheKey, CachedValue, EntityCache, EntityKind, FetchTicket};
use crate::error::{SessionError, SessionResult};
use crate::fields::Status;
use crate::notify::{Notification, Notifier};
use crate::orchestrator::{ChangeState, DragEnd, DropRejected, Resolution, StatusOrchestrator};
use crate::project::{Project, ProjectForm, ProjectSummary};
use crate::service::{ServiceResult, TaskService};
use crate::task::{NoteForm, PasswordForm, ProfileForm, Task, TaskForm, TeamMember, User};

/// What became of a drag-end event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropOutcome {
    /// No transition: nothing was mutated, sent or notified.
    Ignored(DropRejected),
    /// The change went to the service and was committed or rolled back.
    Settled(Resolution),
}

/// Cached, optimistic view of the remote task service.
pub struct BoardSession {
    cache: CacheHandle,
    service: Rc<dyn TaskService>,
    orchestrator: RefCell<StatusOrchestrator>,
    notifier: Rc<dyn Notifier>,
}

impl BoardSession {
    pub fn new(service: Rc<dyn TaskService>, notifier: Rc<dyn Notifier>) -> Self {
        Self::with_cache(EntityCache::shared(), service, notifier)
    }

    /// Share an existing cache (e.g. across sessions of one process).
    pub fn with_cache(cache: CacheHandle, service: Rc<dyn TaskService>, notifier: Rc<dyn Notifier>) -> Self {
        BoardSession { cache, service, orchestrator: RefCell::new(StatusOrchestrator::new()), notifier }
    }

    pub fn cache(&self) -> CacheHandle {
        Rc::clone(&self.cache)
    }

    pub fn change_state(&self, task_id: &str) -> ChangeState {
        self.orchestrator.borrow().state(task_id)
    }

    /// A view starts displaying `key`; invalidations of it will refetch.
    pub fn watch(&self, key: &CacheKey) {
        self.cache.borrow_mut().observe(key);
    }

    /// A view stops displaying `key`.
    pub fn unwatch(&self, key: &CacheKey) {
        self.cache.borrow_mut().release(key);
    }

    /// Group the cached project's tasks into board columns. Reflects
    /// optimistic changes as soon as they are applied.
    pub fn board(&self, project_id: &str) -> Option<Board> {
        let cache = self.cache.borrow();
        cache.project(project_id).map(|p| group_by_status(&p.tasks))
    }

    fn fresh<T>(&self, key: &CacheKey, get: impl FnOnce(&EntityCache) -> Option<T>) -> Option<T> {
        let cache = self.cache.borrow();
        if cache.is_stale(key) {
            return None;
        }
        get(&cache)
    }

    pub async fn current_user(&self) -> SessionResult<User> {
        let key = CacheKey::user();
        if let Some(user) = self.fresh(&key, |c| c.user()) {
            return Ok(user);
        }
        let ticket = self.cache.borrow().ticket(&key);
        let user = self.service.current_user().await?;
        self.cache.borrow_mut().write_fetched(ticket, CachedValue::User(user.clone()));
        Ok(user)
    }

    pub async fn projects(&self) -> SessionResult<Vec<ProjectSummary>> {
        let key = CacheKey::projects();
        if let Some(projects) = self.fresh(&key, |c| c.projects()) {
            return Ok(projects);
        }
        let ticket = self.cache.borrow().ticket(&key);
        let projects = self.service.projects().await?;
        self.cache.borrow_mut().write_fetched(ticket, CachedValue::Projects(projects.clone()));
        Ok(projects)
    }

    pub async fn project(&self, project_id: &str) -> SessionResult<Project> {
        let key = CacheKey::project(project_id);
        if let Some(project) = self.fresh(&key, |c| c.project(project_id)) {
            return Ok(project);
        }
        let ticket = self.cache.borrow().ticket(&key);
        let project = self.service.project(project_id).await?;
        Ok(self.store_project(ticket, project))
    }

    /// Write a fetched project and put back any optimistic status still in
    /// flight for it. A response overtaken by a later invalidation is not
    /// written; the newer cached copy is returned instead.
    fn store_project(&self, ticket: FetchTicket, project: Project) -> Project {
        let id = ticket.key().id.clone();
        let mut cache = self.cache.borrow_mut();
        if cache.write_fetched(ticket, CachedValue::Project(project.clone())) {
            self.orchestrator.borrow().reapply_pending(&mut cache, &id);
        }
        cache.project(&id).unwrap_or(project)
    }

    pub async fn task(&self, project_id: &str, task_id: &str) -> SessionResult<Task> {
        let key = CacheKey::task(task_id);
        if let Some(task) = self.fresh(&key, |c| c.task(task_id)) {
            return Ok(task);
        }
        let ticket = self.cache.borrow().ticket(&key);
        let task = self.service.task(project_id, task_id).await?;
        self.cache.borrow_mut().write_fetched(ticket, CachedValue::Task(task.clone()));
        Ok(task)
    }

    pub async fn team(&self, project_id: &str) -> SessionResult<Vec<TeamMember>> {
        let key = CacheKey::team(project_id);
        if let Some(team) = self.fresh(&key, |c| c.team(project_id)) {
            return Ok(team);
        }
        let ticket = self.cache.borrow().ticket(&key);
        let team = self.service.team(project_id).await?;
        self.cache.borrow_mut().write_fetched(ticket, CachedValue::Team(team.clone()));
        Ok(team)
    }

    /// Refetch every key scheduled by an invalidation that is still being
    /// watched. Failures are reported and the entry stays stale.
    pub async fn refetch_stale(&self) -> Vec<(CacheKey, SessionError)> {
        let keys = self.cache.borrow_mut().take_refetch_queue();
        let mut failures = Vec::new();
        for key in keys {
            if !self.cache.borrow().is_observed(&key) {
                continue;
            }
            debug!(?key, "background refetch");
            if let Err(err) = self.refetch(&key).await {
                warn!(?key, error = %err, "background refetch failed");
                self.notifier.notify(Notification::error(err.reason()));
                failures.push((key, err));
            }
        }
        failures
    }

    async fn refetch(&self, key: &CacheKey) -> SessionResult<()> {
        let ticket = self.cache.borrow().ticket(key);
        match key.kind {
            EntityKind::Projects => {
                let projects = self.service.projects().await?;
                self.cache.borrow_mut().write_fetched(ticket, CachedValue::Projects(projects));
            }
            EntityKind::Project => {
                let project = self.service.project(&key.id).await?;
                self.store_project(ticket, project);
            }
            EntityKind::Task => {
                // The route needs the owning project, known from the cached copy.
                let project_id = match self.cache.borrow().task(&key.id) {
                    Some(task) => task.project,
                    None => return Ok(()),
                };
                let task = self.service.task(&project_id, &key.id).await?;
                self.cache.borrow_mut().write_fetched(ticket, CachedValue::Task(task));
            }
            EntityKind::Team => {
                let team = self.service.team(&key.id).await?;
                self.cache.borrow_mut().write_fetched(ticket, CachedValue::Team(team));
            }
            EntityKind::User => {
                let user = self.service.current_user().await?;
                self.cache.borrow_mut().write_fetched(ticket, CachedValue::User(user));
            }
        }
        Ok(())
    }

    /// Handle a completed drag on the board of `project_id`.
    ///
    /// The optimistic patch is visible to [`BoardSession::board`] before this
    /// future first yields; the cache is settled once the service answers.
    pub async fn handle_drag_end(&self, project_id: &str, event: DragEnd) -> DropOutcome {
        let change = {
            let mut cache = self.cache.borrow_mut();
            match self.orchestrator.borrow_mut().begin(&mut cache, project_id, &event) {
                Ok(change) => change,
                Err(rejected) => {
                    debug!(reason = %rejected, "drop ignored");
                    return DropOutcome::Ignored(rejected);
                }
            }
        };

        let outcome = self
            .service
            .change_task_status(&change.project_id, &change.task_id, change.requested)
            .await;

        let mut cache = self.cache.borrow_mut();
        let resolution = self
            .orchestrator
            .borrow_mut()
            .settle(&mut cache, &change, outcome, self.notifier.as_ref());
        DropOutcome::Settled(resolution)
    }

    /// Status picked from the task-detail view. Same state machine as a drag.
    pub async fn select_status(&self, project_id: &str, task_id: &str, status: Status) -> DropOutcome {
        self.handle_drag_end(project_id, DragEnd::to_status(task_id, status)).await
    }

    /// Apply the outcome of a mutation: on success invalidate `stale` and
    /// toast the server's message; on failure toast the reason.
    fn reconcile(&self, outcome: ServiceResult<String>, stale: &[CacheKey]) -> SessionResult<String> {
        match outcome {
            Ok(message) => {
                let mut cache = self.cache.borrow_mut();
                for key in stale {
                    cache.invalidate(key);
                }
                self.notifier.notify(Notification::success(message.clone()));
                Ok(message)
            }
            Err(err) => {
                self.notifier.notify(Notification::error(err.reason()));
                Err(err.into())
            }
        }
    }

    pub async fn create_project(&self, form: &ProjectForm) -> SessionResult<String> {
        validate_project_form(form)?;
        let outcome = self.service.create_project(form).await;
        self.reconcile(outcome, &[CacheKey::projects()])
    }

    pub async fn update_project(&self, project_id: &str, form: &ProjectForm) -> SessionResult<String> {
        validate_project_form(form)?;
        let outcome = self.service.update_project(project_id, form).await;
        self.reconcile(outcome, &[CacheKey::projects(), CacheKey::project(project_id)])
    }

    pub async fn delete_project(&self, project_id: &str) -> SessionResult<String> {
        let outcome = self.service.delete_project(project_id).await;
        let message = self.reconcile(outcome, &[CacheKey::projects()])?;
        self.cache.borrow_mut().remove(&CacheKey::project(project_id));
        Ok(message)
    }

    /// Delete a project after the service confirmed the user's password.
    /// A wrong password deletes nothing.
    pub async fn delete_project_checked(&self, project_id: &str, password: &str) -> SessionResult<String> {
        if password.is_empty() {
            return Err(SessionError::validation("Password is required"));
        }
        self.service.check_password(password).await.map_err(|err| {
            self.notifier.notify(Notification::error(err.reason()));
            SessionError::from(err)
        })?;
        self.delete_project(project_id).await
    }

    pub async fn create_task(&self, project_id: &str, form: &TaskForm) -> SessionResult<String> {
        validate_task_form(form)?;
        let outcome = self.service.create_task(project_id, form).await;
        self.reconcile(outcome, &[CacheKey::project(project_id)])
    }

    pub async fn update_task(&self, project_id: &str, task_id: &str, form: &TaskForm) -> SessionResult<String> {
        validate_task_form(form)?;
        let outcome = self.service.update_task(project_id, task_id, form).await;
        self.reconcile(outcome, &[CacheKey::project(project_id), CacheKey::task(task_id)])
    }

    pub async fn delete_task(&self, project_id: &str, task_id: &str) -> SessionResult<String> {
        let outcome = self.service.delete_task(project_id, task_id).await;
        let message = self.reconcile(outcome, &[CacheKey::project(project_id)])?;
        self.cache.borrow_mut().remove(&CacheKey::task(task_id));
        Ok(message)
    }

    pub async fn add_note(&self, project_id: &str, task_id: &str, form: &NoteForm) -> SessionResult<String> {
        if form.content.trim().is_empty() {
            return Err(SessionError::validation("Content is required"));
        }
        let outcome = self.service.create_note(project_id, task_id, form).await;
        self.reconcile(outcome, &[CacheKey::task(task_id)])
    }

    /// Delete a note. When both the task and the current user are cached,
    /// deleting someone else's note is refused locally.
    pub async fn delete_note(&self, project_id: &str, task_id: &str, note_id: &str) -> SessionResult<String> {
        {
            let cache = self.cache.borrow();
            if let (Some(task), Some(user)) = (cache.task(task_id), cache.user()) {
                if let Some(note) = task.notes.iter().find(|n| n.id == note_id) {
                    if !note.can_delete(&user.id) {
                        return Err(SessionError::validation("Only the author can delete this note"));
                    }
                }
            }
        }
        let outcome = self.service.delete_note(project_id, task_id, note_id).await;
        self.reconcile(outcome, &[CacheKey::task(task_id)])
    }

    /// Look a user up by email ahead of adding them to the team.
    pub async fn find_member(&self, project_id: &str, email: &str) -> SessionResult<TeamMember> {
        validate_email(email)?;
        self.service.find_member(project_id, email).await.map_err(|err| {
            self.notifier.notify(Notification::error(err.reason()));
            SessionError::from(err)
        })
    }

    pub async fn add_member(&self, project_id: &str, user_id: &str) -> SessionResult<String> {
        let outcome = self.service.add_member(project_id, user_id).await;
        self.reconcile(outcome, &[CacheKey::team(project_id)])
    }

    pub async fn remove_member(&self, project_id: &str, user_id: &str) -> SessionResult<String> {
        let outcome = self.service.remove_member(project_id, user_id).await;
        self.reconcile(outcome, &[CacheKey::team(project_id)])
    }

    pub async fn update_profile(&self, form: &ProfileForm) -> SessionResult<String> {
        if form.name.trim().is_empty() {
            return Err(SessionError::validation("Username is required"));
        }
        validate_email(&form.email)?;
        let outcome = self.service.update_profile(form).await;
        self.reconcile(outcome, &[CacheKey::user()])
    }

    pub async fn update_password(&self, form: &PasswordForm) -> SessionResult<String> {
        validate_password_form(form)?;
        let outcome = self.service.update_password(form).await;
        self.reconcile(outcome, &[])
    }

    /// End the session on the server, then forget every cached entity.
    /// If the server refuses, the cache is kept.
    pub async fn logout(&self) -> SessionResult<()> {
        if let Err(err) = self.service.logout().await {
            self.notifier.notify(Notification::error(err.reason()));
            return Err(err.into());
        }
        self.cache.borrow_mut().clear();
        self.notifier.notify(Notification::success("Logged out successfully"));
        Ok(())
    }
}

fn validate_project_form(form: &ProjectForm) -> SessionResult<()> {
    if form.name.trim().is_empty() {
        return Err(SessionError::validation("Project name is required"));
    }
    if form.client_name.trim().is_empty() {
        return Err(SessionError::validation("Client name is required"));
    }
    if form.description.trim().is_empty() {
        return Err(SessionError::validation("Description is required"));
    }
    Ok(())
}

fn validate_task_form(form: &TaskForm) -> SessionResult<()> {
    if form.name.trim().is_empty() {
        return Err(SessionError::validation("Task name is required"));
    }
    if form.description.trim().is_empty() {
        return Err(SessionError::validation("Description is required"));
    }
    Ok(())
}

fn validate_password_form(form: &PasswordForm) -> SessionResult<()> {
    if form.current_password.is_empty() {
        return Err(SessionError::validation("Current password is required"));
    }
    if form.password.chars().count() < 8 {
        return Err(SessionError::validation("New password must be at least 8 characters"));
    }
    if form.password != form.password_confirmation {
        return Err(SessionError::validation("The passwords do not match"));
    }
    Ok(())
}

fn validate_email(email: &str) -> SessionResult<()> {
    let email = email.trim();
    match email.split_once('@') {
        Some((user, domain)) if !user.is_empty() && !domain.is_empty() => Ok(()),
        _ if email.is_empty() => Err(SessionError::validation("Email is required")),
        _ => Err(SessionError::validation("Invalid email")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::{Level, ToastQueue};
    use crate::service::ServiceError;
    use crate::testing::{seeded_service, GatedService};
    use futures::poll;
    use pretty_assertions::assert_eq;

    struct Fixture {
        session: BoardSession,
        service: Rc<GatedService>,
        toasts: Rc<ToastQueue>,
        project_id: String,
        task_id: String,
    }

    async fn fixture() -> Fixture {
        let (inner, project_id, task_id) = seeded_service().await;
        let service = Rc::new(GatedService::new(inner));
        let toasts = Rc::new(ToastQueue::new());
        let session = BoardSession::new(service.clone(), toasts.clone());
        session.project(&project_id).await.unwrap();
        Fixture { session, service, toasts, project_id, task_id }
    }

    fn column(f: &Fixture) -> Option<Status> {
        f.session.board(&f.project_id)?.locate(&f.task_id).map(|(s, _)| s)
    }

    #[tokio::test]
    async fn test_drag_shows_immediately_and_commits() {
        let f = fixture().await;
        let gate = f.service.hold_status_changes();
        assert_eq!(column(&f), Some(Status::Pending));

        let drag = f.session.handle_drag_end(&f.project_id, DragEnd::to_status(&f.task_id, Status::Completed));
        tokio::pin!(drag);
        assert!(poll!(&mut drag).is_pending());

        // Optimistic state is visible while the request is in flight.
        assert_eq!(column(&f), Some(Status::Completed));
        assert!(matches!(f.session.change_state(&f.task_id), ChangeState::Pending { .. }));

        gate.notify_one();
        let outcome = drag.await;
        assert_eq!(outcome, DropOutcome::Settled(Resolution::Committed { message: "Task status updated".into() }));
        assert_eq!(column(&f), Some(Status::Completed));
        assert!(f.session.cache().borrow().is_stale(&CacheKey::project(&f.project_id)));
        assert_eq!(f.session.change_state(&f.task_id), ChangeState::Idle);
        assert_eq!(f.toasts.drain(), vec![Notification::success("Task status updated")]);

        // The refetched project agrees with the optimistic one.
        let project = f.session.project(&f.project_id).await.unwrap();
        assert_eq!(project.task(&f.task_id).map(|t| t.status), Some(Status::Completed));
    }

    #[tokio::test]
    async fn test_failed_change_reverts_with_reason() {
        let f = fixture().await;
        f.service.fail_status_changes(ServiceError::rejected("Task not found"));

        let outcome = f
            .session
            .handle_drag_end(&f.project_id, DragEnd::to_status(&f.task_id, Status::Completed))
            .await;

        assert_eq!(outcome, DropOutcome::Settled(Resolution::RolledBack { reason: "Task not found".into() }));
        assert_eq!(column(&f), Some(Status::Pending));
        let toasts = f.toasts.drain();
        assert_eq!(toasts.len(), 1);
        assert_eq!(toasts[0].level, Level::Error);
        assert_eq!(toasts[0].message, "Task not found");
    }

    #[tokio::test]
    async fn test_second_drag_while_pending_sends_one_request() {
        let f = fixture().await;
        let gate = f.service.hold_status_changes();

        let first = f.session.handle_drag_end(&f.project_id, DragEnd::to_status(&f.task_id, Status::InProgress));
        tokio::pin!(first);
        assert!(poll!(&mut first).is_pending());

        let second = f
            .session
            .handle_drag_end(&f.project_id, DragEnd::to_status(&f.task_id, Status::Completed))
            .await;
        assert_eq!(second, DropOutcome::Ignored(DropRejected::AlreadyPending(f.task_id.clone())));

        gate.notify_one();
        assert!(matches!(first.await, DropOutcome::Settled(Resolution::Committed { .. })));
        assert_eq!(f.service.status_calls(), 1);
        assert_eq!(column(&f), Some(Status::InProgress));
    }

    #[tokio::test]
    async fn test_drop_on_current_column_does_nothing() {
        let f = fixture().await;
        let before = f.session.cache().borrow().project(&f.project_id);

        let outcome = f
            .session
            .handle_drag_end(&f.project_id, DragEnd::to_status(&f.task_id, Status::Pending))
            .await;

        assert_eq!(outcome, DropOutcome::Ignored(DropRejected::SameStatus(f.task_id.clone())));
        assert_eq!(f.service.status_calls(), 0);
        assert_eq!(f.session.cache().borrow().project(&f.project_id), before);
        assert!(f.toasts.is_empty());
    }

    #[tokio::test]
    async fn test_drop_of_unknown_task_does_nothing() {
        let f = fixture().await;
        let before = f.session.cache().borrow().project(&f.project_id);

        let outcome = f
            .session
            .handle_drag_end(&f.project_id, DragEnd::to_status("not-a-task", Status::Completed))
            .await;

        assert!(matches!(outcome, DropOutcome::Ignored(DropRejected::UnknownTask(_))));
        assert_eq!(f.service.status_calls(), 0);
        assert_eq!(f.session.cache().borrow().project(&f.project_id), before);
        assert!(f.toasts.is_empty());
    }

    #[tokio::test]
    async fn test_unreachable_service_rolls_back() {
        let f = fixture().await;
        f.service.fail_status_changes(ServiceError::Unreachable("connection refused".into()));
        let outcome = f
            .session
            .handle_drag_end(&f.project_id, DragEnd::to_status(&f.task_id, Status::OnHold))
            .await;
        assert!(matches!(outcome, DropOutcome::Settled(Resolution::RolledBack { .. })));
        assert_eq!(column(&f), Some(Status::Pending));
    }

    #[tokio::test]
    async fn test_watched_project_is_refetched_after_commit() {
        let f = fixture().await;
        let key = CacheKey::project(&f.project_id);
        f.session.watch(&key);

        f.session
            .handle_drag_end(&f.project_id, DragEnd::to_status(&f.task_id, Status::UnderReview))
            .await;
        assert!(f.session.cache().borrow().has_pending_refetch());

        let failures = f.session.refetch_stale().await;
        assert!(failures.is_empty());
        let cache = f.session.cache();
        let cache = cache.borrow();
        assert!(!cache.is_stale(&key));
        assert_eq!(cache.project(&f.project_id).unwrap().task(&f.task_id).unwrap().status, Status::UnderReview);
    }

    #[tokio::test]
    async fn test_unwatched_view_is_not_refetched_but_change_still_settles() {
        let f = fixture().await;
        let key = CacheKey::project(&f.project_id);
        f.session.watch(&key);
        let gate = f.service.hold_status_changes();

        let drag = f.session.handle_drag_end(&f.project_id, DragEnd::to_status(&f.task_id, Status::Completed));
        tokio::pin!(drag);
        assert!(poll!(&mut drag).is_pending());

        // The board is torn down while the request is in flight.
        f.session.unwatch(&key);
        gate.notify_one();
        assert!(matches!(drag.await, DropOutcome::Settled(Resolution::Committed { .. })));

        let cache = f.session.cache();
        assert!(!cache.borrow().has_pending_refetch());
        assert!(cache.borrow().is_stale(&key));
        assert_eq!(column(&f), Some(Status::Completed));
    }

    #[tokio::test]
    async fn test_refetch_during_flight_keeps_optimistic_status() {
        let f = fixture().await;
        let gate = f.service.hold_status_changes();
        let drag = f.session.handle_drag_end(&f.project_id, DragEnd::to_status(&f.task_id, Status::Completed));
        tokio::pin!(drag);
        assert!(poll!(&mut drag).is_pending());

        f.session.cache().borrow_mut().invalidate(&CacheKey::project(&f.project_id));
        let project = f.session.project(&f.project_id).await.unwrap();
        assert_eq!(project.task(&f.task_id).unwrap().status, Status::Completed);

        gate.notify_one();
        drag.await;
    }

    #[tokio::test]
    async fn test_create_task_invalidates_project() {
        let f = fixture().await;
        let form = TaskForm { name: "Deploy".into(), description: "to prod".into() };
        let msg = f.session.create_task(&f.project_id, &form).await.unwrap();
        assert_eq!(msg, "Task created successfully");
        assert!(f.session.cache().borrow().is_stale(&CacheKey::project(&f.project_id)));

        let board = {
            f.session.project(&f.project_id).await.unwrap();
            f.session.board(&f.project_id).unwrap()
        };
        assert_eq!(board.bucket(Status::Pending).len(), 2);
    }

    #[tokio::test]
    async fn test_update_task_invalidates_project_and_task() {
        let f = fixture().await;
        f.session.task(&f.project_id, &f.task_id).await.unwrap();
        let form = TaskForm { name: "Design v2".into(), description: "mockups".into() };
        f.session.update_task(&f.project_id, &f.task_id, &form).await.unwrap();

        let cache = f.session.cache();
        assert!(cache.borrow().is_stale(&CacheKey::project(&f.project_id)));
        assert!(cache.borrow().is_stale(&CacheKey::task(&f.task_id)));
        let task = f.session.task(&f.project_id, &f.task_id).await.unwrap();
        assert_eq!(task.name, "Design v2");
    }

    #[tokio::test]
    async fn test_delete_task_drops_detail_entry() {
        let f = fixture().await;
        f.session.task(&f.project_id, &f.task_id).await.unwrap();
        f.session.delete_task(&f.project_id, &f.task_id).await.unwrap();
        let cache = f.session.cache();
        assert!(!cache.borrow().contains(&CacheKey::task(&f.task_id)));
        assert!(cache.borrow().is_stale(&CacheKey::project(&f.project_id)));
    }

    #[tokio::test]
    async fn test_validation_errors_stay_local() {
        let f = fixture().await;
        let err = f.session.add_note(&f.project_id, &f.task_id, &NoteForm { content: "  ".into() }).await.unwrap_err();
        assert_eq!(err, SessionError::validation("Content is required"));
        let err = f.session.find_member(&f.project_id, "not-an-email").await.unwrap_err();
        assert_eq!(err, SessionError::validation("Invalid email"));
        assert!(f.toasts.is_empty());
    }

    #[tokio::test]
    async fn test_notes_invalidate_task_detail() {
        let f = fixture().await;
        f.session.current_user().await.unwrap();
        f.session.task(&f.project_id, &f.task_id).await.unwrap();
        f.session
            .add_note(&f.project_id, &f.task_id, &NoteForm { content: "Ship it".into() })
            .await
            .unwrap();
        assert!(f.session.cache().borrow().is_stale(&CacheKey::task(&f.task_id)));

        let task = f.session.task(&f.project_id, &f.task_id).await.unwrap();
        assert_eq!(task.notes.len(), 1);
        let note_id = task.notes[0].id.clone();
        assert_eq!(f.session.delete_note(&f.project_id, &f.task_id, &note_id).await.unwrap(), "Note deleted");
    }

    #[tokio::test]
    async fn test_team_changes_invalidate_team() {
        let f = fixture().await;
        assert!(f.session.team(&f.project_id).await.unwrap().is_empty());
        let member = f.session.find_member(&f.project_id, "ben@example.com").await.unwrap();
        f.session.add_member(&f.project_id, &member.id).await.unwrap();
        assert!(f.session.cache().borrow().is_stale(&CacheKey::team(&f.project_id)));
        assert_eq!(f.session.team(&f.project_id).await.unwrap().len(), 1);

        let err = f.session.add_member(&f.project_id, &member.id).await.unwrap_err();
        assert_eq!(err.reason(), "User already exists in project");
        let toasts = f.toasts.drain();
        assert_eq!(toasts.last().map(|t| t.level), Some(Level::Error));
    }

    #[tokio::test]
    async fn test_project_mutations_invalidate_dashboard() {
        let f = fixture().await;
        assert_eq!(f.session.projects().await.unwrap().len(), 1);
        let form = ProjectForm { name: "Mobile".into(), client_name: "Acme".into(), description: "App".into() };
        f.session.create_project(&form).await.unwrap();
        assert_eq!(f.session.projects().await.unwrap().len(), 2);

        f.session.delete_project(&f.project_id).await.unwrap();
        assert!(!f.session.cache().borrow().contains(&CacheKey::project(&f.project_id)));
        assert_eq!(f.session.projects().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_fetch_started_before_commit_does_not_undo_it() {
        let f = fixture().await;
        let key = CacheKey::project(&f.project_id);
        let status_gate = f.service.hold_status_changes();
        let drag = f.session.handle_drag_end(&f.project_id, DragEnd::to_status(&f.task_id, Status::Completed));
        tokio::pin!(drag);
        assert!(poll!(&mut drag).is_pending());

        // A refresh reads the server while the change is still in flight.
        f.session.cache().borrow_mut().invalidate(&key);
        let fetch_gate = f.service.hold_project_fetches();
        let fetch = f.session.project(&f.project_id);
        tokio::pin!(fetch);
        assert!(poll!(&mut fetch).is_pending());

        status_gate.notify_one();
        assert_eq!(
            drag.await,
            DropOutcome::Settled(Resolution::Committed { message: "Task status updated".into() })
        );

        // The old snapshot lands after the commit.
        fetch_gate.notify_one();
        let project = fetch.await.unwrap();
        assert_eq!(project.task(&f.task_id).map(|t| t.status), Some(Status::Completed));
        assert_eq!(column(&f), Some(Status::Completed));
        assert!(f.session.cache().borrow().is_stale(&key));

        fetch_gate.notify_one();
        let project = f.session.project(&f.project_id).await.unwrap();
        assert_eq!(project.task(&f.task_id).map(|t| t.status), Some(Status::Completed));
        assert!(!f.session.cache().borrow().is_stale(&key));
    }

    #[tokio::test]
    async fn test_watched_refetch_overtaken_by_commit_is_queued_again() {
        let f = fixture().await;
        let key = CacheKey::project(&f.project_id);
        f.session.watch(&key);
        f.session.cache().borrow_mut().invalidate(&key);

        let status_gate = f.service.hold_status_changes();
        let drag = f.session.handle_drag_end(&f.project_id, DragEnd::to_status(&f.task_id, Status::InProgress));
        tokio::pin!(drag);
        assert!(poll!(&mut drag).is_pending());

        let fetch_gate = f.service.hold_project_fetches();
        let refetch = f.session.refetch_stale();
        tokio::pin!(refetch);
        assert!(poll!(&mut refetch).is_pending());

        status_gate.notify_one();
        drag.await;
        fetch_gate.notify_one();
        assert!(refetch.await.is_empty());

        assert_eq!(column(&f), Some(Status::InProgress));
        assert!(f.session.cache().borrow().has_pending_refetch());
        fetch_gate.notify_one();
        f.session.refetch_stale().await;
        assert!(!f.session.cache().borrow().is_stale(&key));
        assert_eq!(column(&f), Some(Status::InProgress));
    }

    #[tokio::test]
    async fn test_logout_clears_cache() {
        let f = fixture().await;
        f.session.logout().await.unwrap();
        assert!(f.session.board(&f.project_id).is_none());
        assert_eq!(f.toasts.drain(), vec![Notification::success("Logged out successfully")]);
    }

    #[tokio::test]
    async fn test_profile_update_invalidates_user() {
        let f = fixture().await;
        assert_eq!(f.session.current_user().await.unwrap().name, "ana");

        let err = f
            .session
            .update_profile(&ProfileForm { name: " ".into(), email: "ana@example.com".into() })
            .await
            .unwrap_err();
        assert_eq!(err, SessionError::validation("Username is required"));

        let form = ProfileForm { name: "Ana Lima".into(), email: "ana@example.com".into() };
        f.session.update_profile(&form).await.unwrap();
        assert!(f.session.cache().borrow().is_stale(&CacheKey::user()));
        assert_eq!(f.session.current_user().await.unwrap().name, "Ana Lima");
    }

    #[tokio::test]
    async fn test_password_change_is_validated_locally() {
        let f = fixture().await;
        let short = PasswordForm {
            current_password: "unset".into(),
            password: "short".into(),
            password_confirmation: "short".into(),
        };
        let err = f.session.update_password(&short).await.unwrap_err();
        assert_eq!(err, SessionError::validation("New password must be at least 8 characters"));

        let mismatch = PasswordForm { password: "long-enough".into(), ..short.clone() };
        let err = f.session.update_password(&mismatch).await.unwrap_err();
        assert_eq!(err, SessionError::validation("The passwords do not match"));
        assert!(f.toasts.is_empty());

        let form = PasswordForm { password_confirmation: "long-enough".into(), ..mismatch };
        assert_eq!(f.session.update_password(&form).await.unwrap(), "Password updated successfully");
    }

    #[tokio::test]
    async fn test_checked_delete_needs_the_right_password() {
        let f = fixture().await;
        let form = PasswordForm {
            current_password: "unset".into(),
            password: "long-enough".into(),
            password_confirmation: "long-enough".into(),
        };
        f.session.update_password(&form).await.unwrap();
        f.toasts.drain();

        let err = f.session.delete_project_checked(&f.project_id, "guess").await.unwrap_err();
        assert_eq!(err.reason(), "Incorrect password");
        assert_eq!(f.toasts.drain().last().map(|t| t.level), Some(Level::Error));
        assert_eq!(f.session.projects().await.unwrap().len(), 1);

        assert_eq!(
            f.session.delete_project_checked(&f.project_id, "").await.unwrap_err(),
            SessionError::validation("Password is required")
        );

        f.session.delete_project_checked(&f.project_id, "long-enough").await.unwrap();
        assert!(f.session.projects().await.unwrap().is_empty());
    }

    #[test]
    fn test_validate_email() {
        assert!(validate_email("ana@example.com").is_ok());
        assert_eq!(validate_email(""), Err(SessionError::validation("Email is required")));
        assert!(validate_email("ana@localhost").is_ok());
        assert_eq!(validate_email("ana@"), Err(SessionError::validation("Invalid email")));
    }
}
