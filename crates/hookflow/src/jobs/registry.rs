use std::collections::{HashMap, HashSet};

use parking_lot::Mutex;
use uuid::Uuid;

use crate::jobs::model::Job;

/// In-memory view of every non-terminal job plus the set of jobs
/// currently held by a worker.
///
/// Both maps are safe for concurrent read/insert/delete. `snapshot`
/// is not atomic across the whole pass; entries may be updated while a
/// scheduling sweep iterates, which is fine because eligibility checks
/// are per-entry. The in-flight set is what guarantees a job is never
/// handed to two workers at once: `mark_in_flight` only succeeds for
/// the first caller until the mark is cleared.
#[derive(Default)]
pub struct JobRegistry {
    jobs: Mutex<HashMap<Uuid, Job>>,
    in_flight: Mutex<HashSet<Uuid>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite by id. Idempotent.
    pub fn put(&self, job: Job) {
        self.jobs.lock().insert(job.id, job);
    }

    /// Drop a job from the registry and the in-flight set.
    pub fn remove(&self, id: Uuid) {
        self.jobs.lock().remove(&id);
        self.in_flight.lock().remove(&id);
    }

    pub fn get(&self, id: Uuid) -> Option<Job> {
        self.jobs.lock().get(&id).cloned()
    }

    /// Current entries, cloned out so the sweep never holds the lock
    /// across an await point.
    pub fn snapshot(&self) -> Vec<Job> {
        self.jobs.lock().values().cloned().collect()
    }

    /// Claim a job for delivery. Returns true only for the caller that
    /// took the mark; everyone else sees false until `clear_in_flight`.
    pub fn mark_in_flight(&self, id: Uuid) -> bool {
        self.in_flight.lock().insert(id)
    }

    pub fn clear_in_flight(&self, id: Uuid) {
        self.in_flight.lock().remove(&id);
    }

    pub fn is_in_flight(&self, id: Uuid) -> bool {
        self.in_flight.lock().contains(&id)
    }

    pub fn len(&self) -> usize {
        self.jobs.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.lock().is_empty()
    }
}
