//! Queue of jobs interrupted by a previous shutdown or crash.
//!
//! Filled once at startup with every job still PROCESSING, before any worker
//! runs. The queue starts with a fixed capacity; a push into a full queue
//! grows it by the configured increment and keeps every pending entry.

use std::collections::VecDeque;
use std::sync::Mutex;

use tracing::warn;

use shareclip_models::JobId;

/// Default initial capacity, also used as the growth increment.
pub const DEFAULT_RECOVERY_CAPACITY: usize = 100;

#[derive(Debug)]
pub struct RecoveryQueue {
    inner: Mutex<Inner>,
    increment: usize,
}

#[derive(Debug)]
struct Inner {
    entries: VecDeque<JobId>,
    capacity: usize,
}

impl Default for RecoveryQueue {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_RECOVERY_CAPACITY)
    }
}

impl RecoveryQueue {
    /// Create a queue whose capacity starts at, and grows by, `capacity`.
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            inner: Mutex::new(Inner {
                entries: VecDeque::with_capacity(capacity),
                capacity,
            }),
            increment: capacity,
        }
    }

    /// Append an entry, growing the queue when it is full.
    pub fn push(&self, id: JobId) {
        let mut inner = self.lock();
        if inner.entries.len() >= inner.capacity {
            let grown = inner.capacity + self.increment;
            warn!(
                "Recovery queue full at {} entries, growing to {}",
                inner.capacity, grown
            );
            let mut entries = VecDeque::with_capacity(grown);
            entries.extend(inner.entries.drain(..));
            inner.entries = entries;
            inner.capacity = grown;
        }
        inner.entries.push_back(id);
    }

    /// Take the oldest entry.
    pub fn pop(&self) -> Option<JobId> {
        self.lock().entries.pop_front()
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[cfg(test)]
    fn capacity(&self) -> usize {
        self.lock().capacity
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        // Entries stay consistent even if a holder panicked
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
