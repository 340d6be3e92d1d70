//! Transient user notifications ("toasts").

use std::cell::RefCell;
use std::collections::VecDeque;

use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub level: Level,
    pub message: String,
}

impl Notification {
    pub fn success(message: impl Into<String>) -> Self {
        Notification { level: Level::Success, message: message.into() }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Notification { level: Level::Error, message: message.into() }
    }
}

/// Sink for user-visible notifications.
pub trait Notifier {
    fn notify(&self, notification: Notification);
}

/// Bounded FIFO of notifications, drained by whichever surface displays them.
#[derive(Debug)]
pub struct ToastQueue {
    queue: RefCell<VecDeque<Notification>>,
    capacity: usize,
}

impl Default for ToastQueue {
    fn default() -> Self {
        Self::with_capacity(32)
    }
}

impl ToastQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Oldest notifications are dropped once `capacity` is reached.
    pub fn with_capacity(capacity: usize) -> Self {
        ToastQueue { queue: RefCell::new(VecDeque::new()), capacity: capacity.max(1) }
    }

    pub fn drain(&self) -> Vec<Notification> {
        self.queue.borrow_mut().drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.queue.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.borrow().is_empty()
    }
}

impl Notifier for ToastQueue {
    fn notify(&self, notification: Notification) {
        match notification.level {
            Level::Success => info!(message = %notification.message, "toast"),
            Level::Error => warn!(message = %notification.message, "toast"),
        }
        let mut queue = self.queue.borrow_mut();
        if queue.len() == self.capacity {
            queue.pop_front();
        }
        queue.push_back(notification);
    }
}
