use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock};

/// Occurrence count per failure kind.
///
/// Known kinds are bumped under the shared read lock. A kind seen for the first time is inserted
/// under the write lock with `entry`, so racing first sightings end up on the same counter.
#[derive(Default)]
pub(crate) struct ErrorTally {
    counts: RwLock<HashMap<String, AtomicU64>>,
}

impl ErrorTally {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment(&self, kind: &str) {
        {
            let counts = self.counts.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(count) = counts.get(kind) {
                count.fetch_add(1, Ordering::Relaxed);
                return;
            }
        }

        let mut counts = self.counts.write().unwrap_or_else(PoisonError::into_inner);
        counts
            .entry(kind.to_string())
            .or_insert_with(|| AtomicU64::new(0))
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn get(&self, kind: &str) -> u64 {
        self.counts
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(kind)
            .map_or(0, |count| count.load(Ordering::Relaxed))
    }

    /// Counts keyed by kind, sorted by kind.
    pub fn snapshot(&self) -> BTreeMap<String, u64> {
        self.counts
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(kind, count)| (kind.clone(), count.load(Ordering::Relaxed)))
            .collect()
    }
}
