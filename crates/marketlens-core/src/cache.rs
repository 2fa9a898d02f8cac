//! In-memory memoization of fetch outcomes.

use std::collections::HashMap;
use std::fmt::{Display, Formatter};
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

use crate::{Capability, FetchOutcome, Symbol};

/// Identity of a cached request.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub capability: Capability,
    pub symbol: Symbol,
    /// Normalized representation of the remaining request parameters.
    pub fingerprint: String,
}

impl CacheKey {
    pub fn new(capability: Capability, symbol: Symbol, fingerprint: impl Into<String>) -> Self {
        Self {
            capability,
            symbol,
            fingerprint: fingerprint.into(),
        }
    }
}

impl Display for CacheKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.capability, self.symbol)?;
        if !self.fingerprint.is_empty() {
            write!(f, ":{}", self.fingerprint)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
struct CacheEntry<T> {
    outcome: FetchOutcome<T>,
    expires_at: Instant,
}

impl<T> CacheEntry<T> {
    fn is_fresh(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

type Slot<T> = Arc<tokio::sync::Mutex<Option<CacheEntry<T>>>>;

/// A slot may go only when the map holds its sole reference and its entry is
/// empty or stale. Callers clone the slot under the map lock, so a count of
/// one means nobody is waiting on it or fetching into it.
fn is_reclaimable<T>(slot: &Slot<T>, now: Instant) -> bool {
    if Arc::strong_count(slot) > 1 {
        return false;
    }
    match slot.try_lock() {
        Ok(entry) => !entry.as_ref().is_some_and(|cached| cached.is_fresh(now)),
        Err(_) => false,
    }
}

fn sweep<T>(slots: &mut HashMap<CacheKey, Slot<T>>, now: Instant) -> usize {
    let before = slots.len();
    slots.retain(|_, slot| !is_reclaimable(slot, now));
    before - slots.len()
}

/// Thread-safe outcome cache with per-key single flight.
///
/// Each key owns an async lock held across the fetch, so concurrent misses
/// for one key produce a single upstream call. Every lookup sweeps expired
/// entries that no caller is holding, so the map stays bounded by the keys
/// that are still fresh or in flight. Nothing runs in the background.
#[derive(Debug)]
pub struct RequestCache<T> {
    slots: Mutex<HashMap<CacheKey, Slot<T>>>,
}

impl<T> Default for RequestCache<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> RequestCache<T> {
    pub fn new() -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// Removes expired entries. Keys that a caller is waiting on or fetching
    /// are kept.
    pub fn purge_expired(&self) -> usize {
        let mut slots = self.lock_slots();
        sweep(&mut slots, Instant::now())
    }

    /// Number of tracked keys, including expired entries not yet purged.
    pub fn len(&self) -> usize {
        self.lock_slots().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.lock_slots().clear();
    }

    fn slot(&self, key: &CacheKey) -> Slot<T> {
        let mut slots = self.lock_slots();
        let swept = sweep(&mut slots, Instant::now());
        if swept > 0 {
            debug!(swept, remaining = slots.len(), "expired cache entries dropped");
        }
        Arc::clone(slots.entry(key.clone()).or_default())
    }

    fn lock_slots(&self) -> std::sync::MutexGuard<'_, HashMap<CacheKey, Slot<T>>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T: Clone> RequestCache<T> {
    /// Returns the stored outcome for `key` while it is younger than `ttl`,
    /// otherwise runs `fetch` and stores its outcome. Failures are cached
    /// like successes. A zero `ttl` bypasses the cache entirely.
    pub async fn get_or_fetch<F, Fut>(&self, key: CacheKey, ttl: Duration, fetch: F) -> FetchOutcome<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = FetchOutcome<T>>,
    {
        if ttl.is_zero() {
            debug!(capability = %key.capability, key = %key, outcome = "bypass", "cache disabled");
            return fetch().await;
        }

        let slot = self.slot(&key);
        let mut entry = slot.lock().await;

        if let Some(cached) = entry.as_ref() {
            if cached.is_fresh(Instant::now()) {
                debug!(capability = %key.capability, key = %key, outcome = "hit", "cache lookup");
                return cached.outcome.clone();
            }
        }

        debug!(capability = %key.capability, key = %key, outcome = "miss", "cache lookup");
        let outcome = fetch().await;
        *entry = Some(CacheEntry {
            outcome: outcome.clone(),
            expires_at: Instant::now() + ttl,
        });
        outcome
    }
}
