//! Status-change orchestration for board drags.
//!
//! Each task has its own small state machine:
//!
//! ```text
//! Idle --drag-end--> Pending(previous, requested) --success--> Committed --> Idle
//!                                                 \--failure--> RolledBack --> Idle
//! ```
//!
//! Entering `Pending` patches the cached project so the board shows the task
//! in its new column immediately. The service response then either commits
//! the optimistic state (and invalidates the views that aggregate it) or
//! restores the previous status. At most one change per task is in flight;
//! drags of a task that is still pending are ignored.

use std::collections::HashMap;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::cache::{CacheKey, EntityCache};
use crate::fields::Status;
use crate::notify::{Notification, Notifier};
use crate::service::ServiceError;

/// A completed drag gesture reported by the board: the dragged task and the
/// id of the column it was dropped on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DragEnd {
    pub task_id: String,
    pub destination: String,
}

impl DragEnd {
    pub fn new(task_id: impl Into<String>, destination: impl Into<String>) -> Self {
        DragEnd { task_id: task_id.into(), destination: destination.into() }
    }

    /// A drop onto the column of `status`.
    pub fn to_status(task_id: impl Into<String>, status: Status) -> Self {
        Self::new(task_id, status.as_str())
    }
}

/// Why a drag-end produced no transition. None of these mutate anything.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DropRejected {
    #[error("'{0}' is not a board column")]
    InvalidDestination(String),
    #[error("task {0} is not on the cached board")]
    UnknownTask(String),
    #[error("task {0} is already in that column")]
    SameStatus(String),
    #[error("task {0} already has a status change in flight")]
    AlreadyPending(String),
}

/// Per-task state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeState {
    Idle,
    Pending { previous: Status, requested: Status },
}

/// An accepted, in-flight status change: what to send to the service and
/// what to restore if it fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingChange {
    pub project_id: String,
    pub task_id: String,
    pub previous: Status,
    pub requested: Status,
}

/// How an in-flight change ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Committed { message: String },
    RolledBack { reason: String },
    /// The response did not match the task's pending change; nothing applied.
    Discarded,
}

/// Tracks in-flight status changes and applies their cache effects.
#[derive(Debug, Default)]
pub struct StatusOrchestrator {
    in_flight: HashMap<String, PendingChange>,
}

impl StatusOrchestrator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self, task_id: &str) -> ChangeState {
        match self.in_flight.get(task_id) {
            Some(change) => ChangeState::Pending { previous: change.previous, requested: change.requested },
            None => ChangeState::Idle,
        }
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// `Idle -> Pending`: validate the drop, patch the cached project and
    /// record the change. On rejection nothing is touched.
    pub fn begin(
        &mut self,
        cache: &mut EntityCache,
        project_id: &str,
        event: &DragEnd,
    ) -> Result<PendingChange, DropRejected> {
        let requested: Status = event
            .destination
            .parse()
            .map_err(|_| DropRejected::InvalidDestination(event.destination.clone()))?;

        if self.in_flight.contains_key(&event.task_id) {
            return Err(DropRejected::AlreadyPending(event.task_id.clone()));
        }

        let previous = cache
            .project(project_id)
            .and_then(|p| p.task(&event.task_id).map(|t| t.status))
            .ok_or_else(|| DropRejected::UnknownTask(event.task_id.clone()))?;

        if previous == requested {
            return Err(DropRejected::SameStatus(event.task_id.clone()));
        }

        cache.patch_project(project_id, |p| {
            p.set_task_status(&event.task_id, requested);
        });

        let change = PendingChange {
            project_id: project_id.to_string(),
            task_id: event.task_id.clone(),
            previous,
            requested,
        };
        debug!(task = %change.task_id, from = ?previous, to = ?requested, "status change pending");
        self.in_flight.insert(change.task_id.clone(), change.clone());
        Ok(change)
    }

    /// `Pending -> Committed | RolledBack -> Idle`: apply the outcome of the
    /// service call for `change`.
    pub fn settle(
        &mut self,
        cache: &mut EntityCache,
        change: &PendingChange,
        outcome: Result<String, ServiceError>,
        notifier: &dyn Notifier,
    ) -> Resolution {
        match self.in_flight.get(&change.task_id) {
            Some(pending) if pending == change => {}
            _ => {
                warn!(task = %change.task_id, "response for a change that is not pending, ignoring");
                return Resolution::Discarded;
            }
        }
        self.in_flight.remove(&change.task_id);

        match outcome {
            Ok(message) => {
                info!(task = %change.task_id, status = ?change.requested, "status change committed");
                cache.invalidate(&CacheKey::project(&change.project_id));
                cache.invalidate(&CacheKey::task(&change.task_id));
                notifier.notify(Notification::success(message.clone()));
                Resolution::Committed { message }
            }
            Err(err) => {
                let reason = err.reason();
                warn!(task = %change.task_id, %reason, "status change failed, rolling back");
                cache.patch_project(&change.project_id, |p| {
                    p.set_task_status(&change.task_id, change.previous);
                });
                cache.invalidate(&CacheKey::project(&change.project_id));
                notifier.notify(Notification::error(reason.clone()));
                Resolution::RolledBack { reason }
            }
        }
    }

    /// Re-apply in-flight optimistic statuses to a freshly written project
    /// snapshot, so a refetch that raced a pending change does not undo it
    /// on screen.
    pub fn reapply_pending(&self, cache: &mut EntityCache, project_id: &str) {
        let pending: Vec<&PendingChange> =
            self.in_flight.values().filter(|c| c.project_id == project_id).collect();
        if pending.is_empty() {
            return;
        }
        cache.patch_project(project_id, |p| {
            for change in pending {
                p.set_task_status(&change.task_id, change.requested);
            }
        });
    }
}
