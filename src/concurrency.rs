//! Generation Lock Manager
//!
//! Per-key singleflight. The first caller for a key becomes the leader and
//! runs the pipeline; every concurrent caller for the same key joins as a
//! follower and receives a clone of the leader's result, success or error.
//! The key's entry is removed as soon as the leader publishes, so a later
//! request for the same key starts fresh.

use crate::error::OverlayError;
use crate::key::CacheKey;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{debug, warn};

type Waiter<T> = oneshot::Sender<Result<T, OverlayError>>;

struct InFlight<T> {
    generation: u64,
    waiters: Vec<Waiter<T>>,
}

type InFlightMap<T> = Arc<Mutex<HashMap<CacheKey, InFlight<T>>>>;

/// Outcome of [`GenerationLockManager::acquire_or_join`].
pub enum LockRole<T> {
    Leader(LeaderGuard<T>),
    Follower(FollowerHandle<T>),
}

impl<T> LockRole<T> {
    pub fn is_leader(&self) -> bool {
        matches!(self, LockRole::Leader(_))
    }
}

/// Held by the single caller running the pipeline for a key.
///
/// Dropping the guard without publishing releases the key and hands every
/// waiter a `LockTimeoutError`.
pub struct LeaderGuard<T> {
    key: CacheKey,
    generation: u64,
    deadline: Duration,
    in_flight: InFlightMap<T>,
    published: bool,
}

impl<T: Clone> LeaderGuard<T> {
    pub fn key(&self) -> &CacheKey {
        &self.key
    }

    /// Release the key and deliver `result` to every follower.
    pub fn publish(mut self, result: Result<T, OverlayError>) {
        self.published = true;
        let waiters = take_waiters(&self.in_flight, &self.key, self.generation);
        debug!(key = %self.key, waiters = waiters.len(), ok = result.is_ok(), "Publishing generation result");
        for tx in waiters {
            let _ = tx.send(result.clone());
        }
    }
}

impl<T> Drop for LeaderGuard<T> {
    fn drop(&mut self) {
        if self.published {
            return;
        }
        let waiters = take_waiters(&self.in_flight, &self.key, self.generation);
        warn!(key = %self.key, waiters = waiters.len(), "Leader abandoned generation");
        for tx in waiters {
            let _ = tx.send(Err(OverlayError::LockTimeoutError {
                key: self.key.to_string(),
                deadline: self.deadline,
            }));
        }
    }
}

fn take_waiters<T>(in_flight: &InFlightMap<T>, key: &CacheKey, generation: u64) -> Vec<Waiter<T>> {
    let mut map = in_flight.lock();
    match map.get(key) {
        Some(entry) if entry.generation == generation => map
            .remove(key)
            .map(|entry| entry.waiters)
            .unwrap_or_default(),
        _ => Vec::new(),
    }
}

/// Held by callers that joined an in-flight generation.
pub struct FollowerHandle<T> {
    key: CacheKey,
    receiver: oneshot::Receiver<Result<T, OverlayError>>,
}

impl<T> FollowerHandle<T> {
    pub fn key(&self) -> &CacheKey {
        &self.key
    }

    /// Wait for the leader's result, at most `deadline`.
    pub async fn await_result(self, deadline: Duration) -> Result<T, OverlayError> {
        let timeout_error = || OverlayError::LockTimeoutError {
            key: self.key.to_string(),
            deadline,
        };
        match tokio::time::timeout(deadline, self.receiver).await {
            Ok(Ok(result)) => result,
            Ok(Err(_closed)) => Err(timeout_error()),
            Err(_elapsed) => Err(timeout_error()),
        }
    }
}

pub struct GenerationLockManager<T> {
    in_flight: InFlightMap<T>,
    next_generation: AtomicU64,
    default_deadline: Duration,
}

pub const DEFAULT_PIPELINE_DEADLINE: Duration = Duration::from_secs(60);

impl<T> Default for GenerationLockManager<T> {
    fn default() -> Self {
        Self::new(DEFAULT_PIPELINE_DEADLINE)
    }
}

impl<T> GenerationLockManager<T> {
    /// `default_deadline` is reported when a leader is dropped without
    /// publishing.
    pub fn new(default_deadline: Duration) -> Self {
        Self {
            in_flight: Arc::new(Mutex::new(HashMap::new())),
            next_generation: AtomicU64::new(0),
            default_deadline,
        }
    }

    pub fn acquire_or_join(&self, key: &CacheKey) -> LockRole<T> {
        let mut map = self.in_flight.lock();
        if let Some(entry) = map.get_mut(key) {
            let (tx, rx) = oneshot::channel();
            entry.waiters.push(tx);
            debug!(key = %key, waiters = entry.waiters.len(), "Joined in-flight generation");
            return LockRole::Follower(FollowerHandle {
                key: key.clone(),
                receiver: rx,
            });
        }

        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        map.insert(
            key.clone(),
            InFlight {
                generation,
                waiters: Vec::new(),
            },
        );
        debug!(key = %key, "Acquired generation lock");
        LockRole::Leader(LeaderGuard {
            key: key.clone(),
            generation,
            deadline: self.default_deadline,
            in_flight: Arc::clone(&self.in_flight),
            published: false,
        })
    }

    /// Number of keys currently generating.
    pub fn in_flight(&self) -> usize {
        self.in_flight.lock().len()
    }

    pub fn is_in_flight(&self, key: &CacheKey) -> bool {
        self.in_flight.lock().contains_key(key)
    }
}

impl<T: Clone> GenerationLockManager<T> {
    /// Run `make_future` as leader, or join the leader already running for
    /// `key`. The leader's run is bounded by `deadline`; on expiry the key is
    /// released and every caller gets `LockTimeoutError`.
    pub async fn run_exclusive<F, Fut>(
        &self,
        key: &CacheKey,
        deadline: Duration,
        make_future: F,
    ) -> Result<T, OverlayError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, OverlayError>>,
    {
        match self.acquire_or_join(key) {
            LockRole::Leader(mut guard) => {
                guard.deadline = deadline;
                let result = match tokio::time::timeout(deadline, make_future()).await {
                    Ok(result) => result,
                    Err(_elapsed) => {
                        warn!(key = %key, deadline_ms = deadline.as_millis() as u64, "Generation exceeded deadline");
                        Err(OverlayError::LockTimeoutError {
                            key: key.to_string(),
                            deadline,
                        })
                    }
                };
                guard.publish(result.clone());
                result
            }
            LockRole::Follower(handle) => handle.await_result(deadline).await,
        }
    }
}
