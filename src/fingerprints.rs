//! # Fingerprint Store
//! Bounded memory of plays that were already evaluated.
//!
//! Insertion-ordered with FIFO eviction: the window only has to outlive the
//! overlap between consecutive polls of the same game, not the whole season.

use std::{
    collections::{HashSet, VecDeque},
    sync::Mutex,
};

/// Thread-safe, capacity-bounded set of play fingerprints.
#[derive(Debug)]
pub struct FingerprintStore {
    inner: Mutex<Inner>,
    cap: usize,
}

#[derive(Debug, Default)]
struct Inner {
    /// Insertion order, oldest at the front.
    order: VecDeque<String>,
    members: HashSet<String>,
}

impl FingerprintStore {
    /// `cap` of 0 is treated as 1.
    pub fn with_capacity(cap: usize) -> Self {
        let cap = cap.max(1);
        Self {
            inner: Mutex::new(Inner {
                order: VecDeque::with_capacity(cap),
                members: HashSet::with_capacity(cap),
            }),
            cap,
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        let inner = self.inner.lock().expect("fingerprint mutex poisoned");
        inner.members.contains(id)
    }

    /// Record `id`. Returns `false` if it was already present, in which case
    /// nothing moves and nothing is evicted.
    pub fn record(&self, id: &str) -> bool {
        let mut inner = self.inner.lock().expect("fingerprint mutex poisoned");
        if inner.members.contains(id) {
            return false;
        }
        while inner.order.len() >= self.cap {
            if let Some(oldest) = inner.order.pop_front() {
                inner.members.remove(&oldest);
                tracing::trace!(target: "fingerprints", evicted = %oldest, "fingerprint evicted");
            }
        }
        inner.order.push_back(id.to_string());
        inner.members.insert(id.to_string());
        true
    }

    pub fn len(&self) -> usize {
        self.inner.lock().expect("fingerprint mutex poisoned").order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.cap
    }
}
