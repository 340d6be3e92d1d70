//! Local entity cache.
//!
//! A keyed store of the last-known-good server responses. Readers get the
//! cached snapshot (fresh or stale) synchronously; writers replace entries
//! after a successful fetch; `invalidate` marks an entry stale and, when the
//! key is currently observed by a view, schedules a background refetch;
//! `patch` applies an in-place speculative edit for optimistic updates.
//!
//! Each key carries a generation that `invalidate`, `remove` and `clear`
//! advance. A fetch takes a [`FetchTicket`] before it leaves and lands with
//! [`EntityCache::write_fetched`]; a response that was overtaken by an
//! invalidation is dropped, so an older server snapshot never replaces a
//! newer local state.
//!
//! The cache is populated lazily on first read of each key and cleared on
//! logout. It is shared through a [`CacheHandle`] rather than a global.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use tracing::{debug, trace};

use crate::project::{Project, ProjectSummary};
use crate::task::{Task, TeamMember, User};

/// Shared, single-threaded handle to the cache.
pub type CacheHandle = Rc<RefCell<EntityCache>>;

/// Kind of entity stored under a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Projects,
    Project,
    Task,
    Team,
    User,
}

/// Cache address: entity kind plus identifier (empty for singletons).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub kind: EntityKind,
    pub id: String,
}

impl CacheKey {
    pub fn projects() -> Self {
        CacheKey { kind: EntityKind::Projects, id: String::new() }
    }

    pub fn project(id: &str) -> Self {
        CacheKey { kind: EntityKind::Project, id: id.to_string() }
    }

    pub fn task(id: &str) -> Self {
        CacheKey { kind: EntityKind::Task, id: id.to_string() }
    }

    pub fn team(project_id: &str) -> Self {
        CacheKey { kind: EntityKind::Team, id: project_id.to_string() }
    }

    pub fn user() -> Self {
        CacheKey { kind: EntityKind::User, id: String::new() }
    }
}

/// A cached server response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CachedValue {
    Projects(Vec<ProjectSummary>),
    Project(Project),
    Task(Task),
    Team(Vec<TeamMember>),
    User(User),
}

#[derive(Debug, Clone)]
struct CacheEntry {
    value: CachedValue,
    stale: bool,
}

/// Taken when a fetch starts; identifies the cache state it was issued for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchTicket {
    key: CacheKey,
    generation: u64,
}

impl FetchTicket {
    pub fn key(&self) -> &CacheKey {
        &self.key
    }
}

/// Process-wide store of entity snapshots.
#[derive(Debug, Default)]
pub struct EntityCache {
    entries: HashMap<CacheKey, CacheEntry>,
    observers: HashMap<CacheKey, usize>,
    refetch_queue: Vec<CacheKey>,
    queued: HashSet<CacheKey>,
    generations: HashMap<CacheKey, u64>,
    clock: u64,
    cleared_at: u64,
}

impl EntityCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// A fresh cache wrapped in a shareable handle.
    pub fn shared() -> CacheHandle {
        Rc::new(RefCell::new(Self::new()))
    }

    /// Last-known value for a key, stale or not.
    pub fn read(&self, key: &CacheKey) -> Option<&CachedValue> {
        self.entries.get(key).map(|e| &e.value)
    }

    /// Replace an entry with a server-confirmed value. Clears staleness.
    pub fn write(&mut self, key: CacheKey, value: CachedValue) {
        trace!(?key, "cache write");
        self.entries.insert(key, CacheEntry { value, stale: false });
    }

    /// Current generation of a key.
    pub fn generation(&self, key: &CacheKey) -> u64 {
        self.generations.get(key).copied().unwrap_or(0).max(self.cleared_at)
    }

    fn advance(&mut self, key: &CacheKey) {
        self.clock += 1;
        self.generations.insert(key.clone(), self.clock);
    }

    /// Record the generation a fetch of `key` is issued against.
    pub fn ticket(&self, key: &CacheKey) -> FetchTicket {
        FetchTicket { key: key.clone(), generation: self.generation(key) }
    }

    /// Write a fetched value unless the key was invalidated, removed or
    /// cleared after the ticket was taken. A dropped response leaves the
    /// entry as it is (still stale, and queued again if a view watches it).
    pub fn write_fetched(&mut self, ticket: FetchTicket, value: CachedValue) -> bool {
        if self.generation(&ticket.key) != ticket.generation {
            debug!(key = ?ticket.key, "dropping overtaken fetch");
            return false;
        }
        self.write(ticket.key, value);
        true
    }

    /// Mark an entry stale. If a view currently observes the key, a refetch
    /// is scheduled even when nothing is cached yet.
    pub fn invalidate(&mut self, key: &CacheKey) {
        self.advance(key);
        if let Some(entry) = self.entries.get_mut(key) {
            entry.stale = true;
        }
        if self.is_observed(key) && self.queued.insert(key.clone()) {
            debug!(?key, "scheduling refetch");
            self.refetch_queue.push(key.clone());
        }
    }

    /// Apply a speculative edit in place. Absent keys are left untouched and
    /// `false` is returned. Staleness is not affected.
    pub fn patch<F>(&mut self, key: &CacheKey, mutator: F) -> bool
    where
        F: FnOnce(&mut CachedValue),
    {
        match self.entries.get_mut(key) {
            Some(entry) => {
                mutator(&mut entry.value);
                true
            }
            None => false,
        }
    }

    /// Drop a single entry (e.g. after the entity was deleted server-side).
    pub fn remove(&mut self, key: &CacheKey) {
        self.advance(key);
        self.entries.remove(key);
    }

    /// Forget everything, including pending refetches. Called on logout.
    /// Observation counts belong to live views and survive.
    pub fn clear(&mut self) {
        self.clock += 1;
        self.cleared_at = self.clock;
        self.generations.clear();
        self.entries.clear();
        self.refetch_queue.clear();
        self.queued.clear();
    }

    pub fn contains(&self, key: &CacheKey) -> bool {
        self.entries.contains_key(key)
    }

    /// True for cached entries marked stale. Absent keys are not stale.
    pub fn is_stale(&self, key: &CacheKey) -> bool {
        self.entries.get(key).is_some_and(|e| e.stale)
    }

    /// A view starts watching a key.
    pub fn observe(&mut self, key: &CacheKey) {
        *self.observers.entry(key.clone()).or_insert(0) += 1;
    }

    /// A view stops watching a key.
    pub fn release(&mut self, key: &CacheKey) {
        if let Some(count) = self.observers.get_mut(key) {
            *count -= 1;
            if *count == 0 {
                self.observers.remove(key);
            }
        }
    }

    pub fn is_observed(&self, key: &CacheKey) -> bool {
        self.observers.contains_key(key)
    }

    pub fn has_pending_refetch(&self) -> bool {
        !self.refetch_queue.is_empty()
    }

    /// Drain the keys scheduled for refetch, in scheduling order.
    pub fn take_refetch_queue(&mut self) -> Vec<CacheKey> {
        self.queued.clear();
        std::mem::take(&mut self.refetch_queue)
    }

    pub fn project(&self, id: &str) -> Option<Project> {
        match self.read(&CacheKey::project(id)) {
            Some(CachedValue::Project(p)) => Some(p.clone()),
            _ => None,
        }
    }

    pub fn task(&self, id: &str) -> Option<Task> {
        match self.read(&CacheKey::task(id)) {
            Some(CachedValue::Task(t)) => Some(t.clone()),
            _ => None,
        }
    }

    pub fn projects(&self) -> Option<Vec<ProjectSummary>> {
        match self.read(&CacheKey::projects()) {
            Some(CachedValue::Projects(p)) => Some(p.clone()),
            _ => None,
        }
    }

    pub fn team(&self, project_id: &str) -> Option<Vec<TeamMember>> {
        match self.read(&CacheKey::team(project_id)) {
            Some(CachedValue::Team(t)) => Some(t.clone()),
            _ => None,
        }
    }

    pub fn user(&self) -> Option<User> {
        match self.read(&CacheKey::user()) {
            Some(CachedValue::User(u)) => Some(u.clone()),
            _ => None,
        }
    }

    /// Patch the cached project, if present.
    pub fn patch_project<F>(&mut self, id: &str, mutator: F) -> bool
    where
        F: FnOnce(&mut Project),
    {
        let mut applied = false;
        self.patch(&CacheKey::project(id), |value| {
            if let CachedValue::Project(p) = value {
                mutator(p);
                applied = true;
            }
        });
        applied
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::Status;
    use crate::task::TaskSummary;

    fn project() -> Project {
        Project {
            id: "p1".into(),
            name: "Website".into(),
            client_name: "Acme".into(),
            description: String::new(),
            manager: "u1".into(),
            tasks: vec![TaskSummary {
                id: "t1".into(),
                name: "Design".into(),
                description: String::new(),
                status: Status::Pending,
            }],
            team: vec![],
        }
    }

    #[test]
    fn test_read_write_roundtrip_and_staleness() {
        let mut cache = EntityCache::new();
        let key = CacheKey::project("p1");
        assert!(cache.read(&key).is_none());

        cache.write(key.clone(), CachedValue::Project(project()));
        assert!(!cache.is_stale(&key));
        assert_eq!(cache.project("p1").map(|p| p.name), Some("Website".to_string()));

        cache.invalidate(&key);
        assert!(cache.is_stale(&key));
        // Stale values are still readable.
        assert!(cache.project("p1").is_some());

        cache.write(key.clone(), CachedValue::Project(project()));
        assert!(!cache.is_stale(&key));
    }

    #[test]
    fn test_patch_absent_key_is_silent_noop() {
        let mut cache = EntityCache::new();
        let applied = cache.patch_project("p1", |p| {
            p.set_task_status("t1", Status::Completed);
        });
        assert!(!applied);
        assert!(!cache.contains(&CacheKey::project("p1")));
    }

    #[test]
    fn test_patch_keeps_staleness_flag() {
        let mut cache = EntityCache::new();
        cache.write(CacheKey::project("p1"), CachedValue::Project(project()));
        assert!(cache.patch_project("p1", |p| {
            p.set_task_status("t1", Status::Completed);
        }));
        assert_eq!(cache.project("p1").unwrap().tasks[0].status, Status::Completed);
        assert!(!cache.is_stale(&CacheKey::project("p1")));
    }

    #[test]
    fn test_patch_ignores_mismatched_variant() {
        let mut cache = EntityCache::new();
        cache.write(CacheKey::project("p1"), CachedValue::Projects(vec![]));
        assert!(!cache.patch_project("p1", |_| {}));
    }

    #[test]
    fn test_invalidate_schedules_refetch_only_when_observed() {
        let mut cache = EntityCache::new();
        let observed = CacheKey::project("p1");
        let unobserved = CacheKey::task("t1");
        cache.write(observed.clone(), CachedValue::Project(project()));

        cache.invalidate(&unobserved);
        assert!(!cache.has_pending_refetch());

        cache.observe(&observed);
        cache.invalidate(&observed);
        cache.invalidate(&observed);
        assert_eq!(cache.take_refetch_queue(), vec![observed.clone()]);
        assert!(!cache.has_pending_refetch());

        cache.release(&observed);
        cache.invalidate(&observed);
        assert!(!cache.has_pending_refetch());
    }

    #[test]
    fn test_observe_is_counted() {
        let mut cache = EntityCache::new();
        let key = CacheKey::team("p1");
        cache.observe(&key);
        cache.observe(&key);
        cache.release(&key);
        assert!(cache.is_observed(&key));
        cache.release(&key);
        assert!(!cache.is_observed(&key));
        cache.release(&key);
        assert!(!cache.is_observed(&key));
    }

    #[test]
    fn test_clear_forgets_entries_and_queue() {
        let mut cache = EntityCache::new();
        let key = CacheKey::project("p1");
        cache.observe(&key);
        cache.write(key.clone(), CachedValue::Project(project()));
        cache.invalidate(&key);
        cache.clear();
        assert!(!cache.contains(&key));
        assert!(!cache.has_pending_refetch());
        assert!(cache.is_observed(&key));
    }

    #[test]
    fn test_fetch_overtaken_by_invalidation_is_dropped() {
        let mut cache = EntityCache::new();
        let key = CacheKey::project("p1");
        cache.observe(&key);
        cache.write(key.clone(), CachedValue::Project(project()));

        let ticket = cache.ticket(&key);
        cache.patch_project("p1", |p| {
            p.set_task_status("t1", Status::Completed);
        });
        cache.invalidate(&key);

        assert!(!cache.write_fetched(ticket, CachedValue::Project(project())));
        assert_eq!(cache.project("p1").unwrap().tasks[0].status, Status::Completed);
        assert!(cache.is_stale(&key));
        assert_eq!(cache.take_refetch_queue(), vec![key.clone()]);

        let ticket = cache.ticket(&key);
        assert!(cache.write_fetched(ticket, CachedValue::Project(project())));
        assert!(!cache.is_stale(&key));
    }

    #[test]
    fn test_fetch_does_not_resurrect_removed_or_cleared_entries() {
        let mut cache = EntityCache::new();
        let key = CacheKey::task("t1");
        let ticket = cache.ticket(&key);
        cache.remove(&key);
        assert!(!cache.write_fetched(ticket, CachedValue::Projects(vec![])));
        assert!(!cache.contains(&key));

        let user = CacheKey::user();
        let ticket = cache.ticket(&user);
        cache.clear();
        assert!(!cache.write_fetched(ticket, CachedValue::Projects(vec![])));
        assert!(!cache.contains(&user));
    }
}
