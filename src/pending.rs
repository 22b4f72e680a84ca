//! Pending-request table for correlated request/response pairs.
//!
//! The embedded app answers host requests (currently only inline
//! completions) asynchronously, on the same channel the request went out on.
//! Each outstanding request gets its own entry keyed by `requestId`, owning a
//! [`oneshot`] continuation and a deadline:
//!
//! ```text
//! begin("r-1") ──▶ slots["r-1"] = Sender      PendingRequest { rx, deadline }
//!                        │                                │
//! resolve("r-1", v) ─────┘ remove + send ──────▶ settle() = Some(v)
//!                                   (or) deadline ──▶ settle() = None
//! ```
//!
//! Whichever of `resolve` and the deadline removes the entry first decides
//! the outcome. A late or duplicate `resolve` finds no entry and is a no-op.
//! Because entries are keyed, a late reply to one request can never settle
//! another.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::time::Instant;

struct Slot<T> {
    /// Distinguishes reuses of the same `requestId`.
    generation: u64,
    tx: oneshot::Sender<T>,
}

type Slots<T> = Arc<Mutex<HashMap<String, Slot<T>>>>;

fn lock<T>(slots: &Slots<T>) -> MutexGuard<'_, HashMap<String, Slot<T>>> {
    slots.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Table of in-flight requests awaiting a reply.
pub struct PendingRequests<T> {
    slots: Slots<T>,
    timeout: Duration,
    next_generation: AtomicU64,
}

impl<T> std::fmt::Debug for PendingRequests<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingRequests")
            .field("outstanding", &self.len())
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl<T> PendingRequests<T> {
    /// Create an empty table whose requests expire after `timeout`.
    pub fn new(timeout: Duration) -> Self {
        Self {
            slots: Arc::new(Mutex::new(HashMap::new())),
            timeout,
            next_generation: AtomicU64::new(0),
        }
    }

    /// Register a request and start its deadline.
    ///
    /// Reusing an id that is still outstanding supersedes the older request,
    /// which then settles with `None`.
    pub fn begin(&self, request_id: impl Into<String>) -> PendingRequest<T> {
        let request_id = request_id.into();
        let (tx, rx) = oneshot::channel();
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);

        let mut slots = lock(&self.slots);
        let superseded = slots
            .insert(request_id.clone(), Slot { generation, tx })
            .is_some();
        drop(slots);
        if superseded {
            log::warn!("Pending request {request_id} superseded by a request with the same id");
        }

        PendingRequest {
            request_id,
            generation,
            rx,
            deadline: Instant::now() + self.timeout,
            slots: Arc::clone(&self.slots),
        }
    }

    /// Deliver `value` to the request registered under `request_id`.
    ///
    /// Returns `false` if no such request is outstanding (already settled,
    /// timed out, or never begun).
    pub fn resolve(&self, request_id: &str, value: T) -> bool {
        // Send under the lock: once the entry is gone the value is in flight.
        let mut slots = lock(&self.slots);
        let Some(slot) = slots.remove(request_id) else {
            log::debug!("Ignoring reply for unknown or settled request {request_id}");
            return false;
        };
        slot.tx.send(value).is_ok()
    }

    /// Deliver `value` to the only outstanding request.
    ///
    /// Used for replies that carry no `requestId`. When zero or several
    /// requests are outstanding the reply is ambiguous and is dropped.
    pub fn resolve_sole(&self, value: T) -> bool {
        let mut slots = lock(&self.slots);
        if slots.len() != 1 {
            log::debug!(
                "Dropping uncorrelated reply: {} requests outstanding",
                slots.len()
            );
            return false;
        }
        let Some(key) = slots.keys().next().cloned() else {
            return false;
        };
        slots
            .remove(&key)
            .is_some_and(|slot| slot.tx.send(value).is_ok())
    }

    /// Settle every outstanding request with `None`.
    pub fn clear(&self) {
        lock(&self.slots).clear();
    }

    /// Whether `request_id` is still awaiting a reply.
    pub fn contains(&self, request_id: &str) -> bool {
        lock(&self.slots).contains_key(request_id)
    }

    /// Number of outstanding requests.
    pub fn len(&self) -> usize {
        lock(&self.slots).len()
    }

    /// Whether no request is outstanding.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Caller's side of one outstanding request.
///
/// Dropping it without settling withdraws the request from the table.
pub struct PendingRequest<T> {
    request_id: String,
    generation: u64,
    rx: oneshot::Receiver<T>,
    deadline: Instant,
    slots: Slots<T>,
}

impl<T> std::fmt::Debug for PendingRequest<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingRequest")
            .field("request_id", &self.request_id)
            .field("deadline", &self.deadline)
            .finish_non_exhaustive()
    }
}

impl<T> PendingRequest<T> {
    /// The correlation id this request was registered under.
    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    /// Wait for the reply or the deadline, whichever comes first.
    ///
    /// `None` means no reply: timed out, superseded, or cleared. Callers
    /// treat it as "nothing available", not as a failure.
    pub async fn settle(mut self) -> Option<T> {
        match tokio::time::timeout_at(self.deadline, &mut self.rx).await {
            Ok(Ok(value)) => Some(value),
            Ok(Err(_)) => None,
            Err(_) => self.expire().await,
        }
    }

    /// Deadline passed: withdraw, unless a resolve already took the entry.
    async fn expire(&mut self) -> Option<T> {
        if self.withdraw() {
            log::debug!("Request {} timed out", self.request_id);
            return None;
        }
        // Whoever removed the entry sent or dropped the sender before
        // releasing the lock, so this completes immediately.
        (&mut self.rx).await.ok()
    }

    /// Remove this request's own entry. Returns whether it was still there.
    fn withdraw(&self) -> bool {
        let mut slots = lock(&self.slots);
        let ours = slots
            .get(&self.request_id)
            .is_some_and(|slot| slot.generation == self.generation);
        if ours {
            slots.remove(&self.request_id);
        }
        ours
    }
}

impl<T> Drop for PendingRequest<T> {
    fn drop(&mut self) {
        self.withdraw();
    }
}
