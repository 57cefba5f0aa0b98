//! queue.rs: bounded FIFO of pending notification jobs.

use std::collections::{HashSet, VecDeque};
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::enrich::Enrichment;
use crate::feed::PlayEvent;

/// One detected scoring play waiting to be announced.
#[derive(Debug, Clone, PartialEq)]
pub struct NotificationJob {
    pub fingerprint: String,
    pub payload: PlayEvent,
    pub enrichment: Option<Enrichment>,
    pub attempts: u32,
    pub first_queued_at: DateTime<Utc>,
    pub last_attempt_at: Option<DateTime<Utc>>,
}

impl NotificationJob {
    pub fn new(payload: PlayEvent, now: DateTime<Utc>) -> Self {
        Self {
            fingerprint: payload.fingerprint(),
            payload,
            enrichment: None,
            attempts: 0,
            first_queued_at: now,
            last_attempt_at: None,
        }
    }

    /// Never attempted, or last attempted at least `min_spacing` before `now`.
    pub fn is_eligible(&self, now: DateTime<Utc>, min_spacing: Duration) -> bool {
        match self.last_attempt_at {
            None => true,
            Some(ts) => now.signed_duration_since(ts) >= min_spacing,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Enqueue {
    Accepted,
    /// Queue already holds `capacity` jobs.
    Full,
    /// A job with the same fingerprint is already pending.
    Duplicate,
}

/// Compact view of a pending job for the status surface.
#[derive(Debug, Clone, Serialize)]
pub struct JobSummary {
    pub fingerprint: String,
    pub player: String,
    pub inning: u32,
    pub attempts: u32,
    pub enriched: bool,
    pub first_queued_at: DateTime<Utc>,
    pub last_attempt_at: Option<DateTime<Utc>>,
}

#[derive(Debug)]
pub struct DispatchQueue {
    inner: Mutex<VecDeque<NotificationJob>>,
    cap: usize,
}

impl DispatchQueue {
    /// `cap` of 0 is treated as 1.
    pub fn with_capacity(cap: usize) -> Self {
        let cap = cap.max(1);
        Self {
            inner: Mutex::new(VecDeque::with_capacity(cap)),
            cap,
        }
    }

    /// Append `job` at the tail unless the queue is full or already holds
    /// the fingerprint.
    pub fn enqueue(&self, job: NotificationJob) -> Enqueue {
        let mut q = self.inner.lock().expect("queue mutex poisoned");
        if q.iter().any(|j| j.fingerprint == job.fingerprint) {
            return Enqueue::Duplicate;
        }
        if q.len() >= self.cap {
            return Enqueue::Full;
        }
        q.push_back(job);
        Enqueue::Accepted
    }

    /// First job from the head that is eligible at `now` and not in `skip`.
    /// The job stays queued; callers finish with `remove` or `requeue`.
    pub fn peek_eligible(
        &self,
        now: DateTime<Utc>,
        min_spacing: Duration,
        skip: &HashSet<String>,
    ) -> Option<NotificationJob> {
        let q = self.inner.lock().expect("queue mutex poisoned");
        q.iter()
            .find(|j| !skip.contains(&j.fingerprint) && j.is_eligible(now, min_spacing))
            .cloned()
    }

    pub fn remove(&self, fingerprint: &str) -> Option<NotificationJob> {
        let mut q = self.inner.lock().expect("queue mutex poisoned");
        let idx = q.iter().position(|j| j.fingerprint == fingerprint)?;
        q.remove(idx)
    }

    /// Store the mutated `job` and move it to the tail. Returns `false` if the
    /// job is no longer queued.
    pub fn requeue(&self, job: NotificationJob) -> bool {
        let mut q = self.inner.lock().expect("queue mutex poisoned");
        let Some(idx) = q.iter().position(|j| j.fingerprint == job.fingerprint) else {
            return false;
        };
        q.remove(idx);
        q.push_back(job);
        true
    }

    pub fn contains(&self, fingerprint: &str) -> bool {
        let q = self.inner.lock().expect("queue mutex poisoned");
        q.iter().any(|j| j.fingerprint == fingerprint)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().expect("queue mutex poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.cap
    }

    pub fn pending(&self) -> Vec<JobSummary> {
        let q = self.inner.lock().expect("queue mutex poisoned");
        q.iter()
            .map(|j| JobSummary {
                fingerprint: j.fingerprint.clone(),
                player: j.payload.player_name.clone(),
                inning: j.payload.inning,
                attempts: j.attempts,
                enriched: j.enrichment.is_some(),
                first_queued_at: j.first_queued_at,
                last_attempt_at: j.last_attempt_at,
            })
            .collect()
    }
}
