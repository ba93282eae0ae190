//! Wait-record table shared by dispatchers and handler workers.
//!
//! Records are sharded by stream id. Every operation on a record
//! (registration, report, expiry, cancellation) happens under its shard's
//! lock, which makes the Satisfied/TimedOut transition exactly-once while
//! records on unrelated streams proceed independently. A record leaves the
//! table the moment it reaches a terminal state, so a report that arrives
//! afterwards finds nothing to update and is discarded.

use std::collections::hash_map::DefaultHasher;
use std::collections::{HashMap, HashSet};
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::oneshot;
use tracing::{debug, warn};

const DEFAULT_SHARDS: usize = 16;

/// One completion a wait record is waiting for.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Expectation {
    /// Name of the handler that must report.
    pub handler: String,
    /// Stream version the handler must report for.
    pub version: u64,
}

impl Expectation {
    /// Creates an expectation for `handler` at `version`.
    #[must_use]
    pub fn new(handler: impl Into<String>, version: u64) -> Self {
        Self {
            handler: handler.into(),
            version,
        }
    }
}

/// Terminal state of a wait record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Every expected handler reported before the deadline.
    Satisfied,
    /// The deadline passed first.
    TimedOut,
}

#[derive(Debug)]
struct WaitRecord {
    stream_id: String,
    outstanding: HashSet<Expectation>,
    notify: oneshot::Sender<()>,
}

#[derive(Debug, Default)]
struct Shard {
    records: HashMap<u64, WaitRecord>,
}

#[derive(Debug)]
struct TrackerInner {
    shards: Vec<Mutex<Shard>>,
    next_id: AtomicU64,
}

/// Table of pending dispatch wait records.
///
/// Cloning is cheap; clones share the same table.
#[derive(Debug, Clone)]
pub struct ConsistencyTracker {
    inner: Arc<TrackerInner>,
}

impl Default for ConsistencyTracker {
    fn default() -> Self {
        Self::with_shards(DEFAULT_SHARDS)
    }
}

impl ConsistencyTracker {
    /// Creates a tracker with the default shard count.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a tracker with `shards` independently locked partitions
    /// (at least one).
    #[must_use]
    pub fn with_shards(shards: usize) -> Self {
        let shards = (0..shards.max(1))
            .map(|_| Mutex::new(Shard::default()))
            .collect();
        Self {
            inner: Arc::new(TrackerInner {
                shards,
                next_id: AtomicU64::new(1),
            }),
        }
    }

    /// Registers a wait record for `stream_id`.
    ///
    /// With no expectations the returned handle is already satisfied and no
    /// record is created.
    #[must_use]
    pub fn register(
        &self,
        stream_id: &str,
        expectations: impl IntoIterator<Item = Expectation>,
    ) -> WaitHandle {
        let outstanding: HashSet<Expectation> = expectations.into_iter().collect();
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);

        if outstanding.is_empty() {
            debug!(stream_id, wait_id = id, "no strong handlers to wait for");
            return WaitHandle {
                tracker: self.clone(),
                id,
                stream_id: stream_id.to_owned(),
                receiver: None,
                resolved: true,
            };
        }

        let (notify, receiver) = oneshot::channel();
        debug!(
            stream_id,
            wait_id = id,
            expected = outstanding.len(),
            "wait record registered"
        );
        self.shard(stream_id).records.insert(
            id,
            WaitRecord {
                stream_id: stream_id.to_owned(),
                outstanding,
                notify,
            },
        );

        WaitHandle {
            tracker: self.clone(),
            id,
            stream_id: stream_id.to_owned(),
            receiver: Some(receiver),
            resolved: false,
        }
    }

    /// Records that `handler` finished processing `stream_id@version`.
    ///
    /// Returns how many wait records this report satisfied. Reports that
    /// match no pending record are no-ops.
    pub fn report(&self, stream_id: &str, version: u64, handler: &str) -> usize {
        let key = Expectation::new(handler, version);
        let mut shard = self.shard(stream_id);

        let satisfied: Vec<u64> = shard
            .records
            .iter_mut()
            .filter(|(_, record)| record.stream_id == stream_id)
            .filter_map(|(id, record)| {
                (record.outstanding.remove(&key) && record.outstanding.is_empty()).then_some(*id)
            })
            .collect();

        for id in &satisfied {
            if let Some(record) = shard.records.remove(id) {
                // The waiter may already be gone if its future was dropped.
                let _ = record.notify.send(());
                debug!(stream_id, wait_id = id, handler, "wait record satisfied");
            }
        }

        satisfied.len()
    }

    /// Number of wait records still pending across all shards.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.inner
            .shards
            .iter()
            .map(|shard| lock(shard).records.len())
            .sum()
    }

    /// Settles a record whose waiter stopped waiting. The record was either
    /// still pending (now timed out) or already removed by a satisfying report.
    fn expire(&self, id: u64, stream_id: &str) -> Resolution {
        match self.shard(stream_id).records.remove(&id) {
            Some(record) => {
                warn!(
                    stream_id,
                    wait_id = id,
                    outstanding = record.outstanding.len(),
                    "wait record timed out"
                );
                Resolution::TimedOut
            }
            None => Resolution::Satisfied,
        }
    }

    fn cancel(&self, id: u64, stream_id: &str) {
        if self.shard(stream_id).records.remove(&id).is_some() {
            debug!(stream_id, wait_id = id, "wait record discarded");
        }
    }

    fn shard(&self, stream_id: &str) -> MutexGuard<'_, Shard> {
        let mut hasher = DefaultHasher::new();
        stream_id.hash(&mut hasher);
        let shards = &self.inner.shards;
        // Truncation is fine: only the low bits pick a shard.
        #[allow(clippy::cast_possible_truncation)]
        let index = (hasher.finish() as usize) % shards.len();
        lock(&shards[index])
    }
}

fn lock(shard: &Mutex<Shard>) -> MutexGuard<'_, Shard> {
    shard.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A dispatcher's claim on one wait record.
///
/// Dropping an unresolved handle discards the record, which is how a failed
/// append or a cancelled dispatch cleans up after itself.
#[derive(Debug)]
pub struct WaitHandle {
    tracker: ConsistencyTracker,
    id: u64,
    stream_id: String,
    receiver: Option<oneshot::Receiver<()>>,
    resolved: bool,
}

impl WaitHandle {
    /// Identifier of the underlying wait record.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Stream the record is waiting on.
    #[must_use]
    pub fn stream_id(&self) -> &str {
        &self.stream_id
    }

    /// Waits until the record is satisfied or `timeout` elapses.
    pub async fn wait(mut self, timeout: Duration) -> Resolution {
        let Some(receiver) = self.receiver.take() else {
            return Resolution::Satisfied;
        };

        let resolution = match tokio::time::timeout(timeout, receiver).await {
            Ok(Ok(())) => Resolution::Satisfied,
            // Deadline hit (or the sender vanished): the table decides which
            // transition happened first.
            Ok(Err(_)) | Err(_) => self.tracker.expire(self.id, &self.stream_id),
        };
        self.resolved = true;
        resolution
    }
}

impl Drop for WaitHandle {
    fn drop(&mut self) {
        if !self.resolved {
            self.tracker.cancel(self.id, &self.stream_id);
        }
    }
}
