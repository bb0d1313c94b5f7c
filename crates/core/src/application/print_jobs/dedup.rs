// Session-scoped set of jobs already claimed by a discovery channel

use std::collections::HashSet;
use std::sync::Mutex;

use crate::domain::JobKey;

/// Deduplicates push and poll discovery while the initial sweep runs.
///
/// Membership only grows. Once the sweep has finished the set is dropped and
/// every claim succeeds.
#[derive(Debug)]
pub struct ProcessedJobSet {
    seen: Mutex<Option<HashSet<JobKey>>>,
}

impl Default for ProcessedJobSet {
    fn default() -> Self {
        Self {
            seen: Mutex::new(Some(HashSet::new())),
        }
    }
}

impl ProcessedJobSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim a job for dispatch. Returns `false` if it was already claimed
    /// during the sweep.
    pub fn claim(&self, key: &JobKey) -> bool {
        match self.seen.lock() {
            Ok(mut guard) => match guard.as_mut() {
                Some(seen) => seen.insert(key.clone()),
                None => true,
            },
            // A poisoned set only loses deduplication; jobs are still processed
            Err(_) => true,
        }
    }

    /// Drop the set after the sweep completes
    pub fn close(&self) {
        if let Ok(mut guard) = self.seen.lock() {
            guard.take();
        }
    }
}
