//! Counter storage for rate limit windows.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, trace, warn};

use super::counter::{Hit, WindowCounter};
use super::key::CounterKey;
use crate::clock::Clock;
use crate::error::{PacerError, Result};

/// Default number of shards for the in-memory store.
pub const DEFAULT_SHARD_AMOUNT: usize = 64;

/// Trait for counter store implementations.
///
/// The in-process [`InMemoryCounterStore`] is enough for a single
/// instance. A deployment with several instances needs an implementation
/// backed by a shared key-value store with atomic increment-and-expire.
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Record one hit for `key`, creating or resetting its window if needed.
    ///
    /// Hits for the same key must be serialized: `N` concurrent hits move
    /// the count by exactly `N`.
    async fn hit(&self, key: &CounterKey) -> Result<Hit>;

    /// Read the live count for `key` without recording a hit.
    async fn peek(&self, key: &CounterKey) -> Result<Option<u64>>;

    /// Drop expired counters, returning how many were removed.
    async fn sweep(&self) -> Result<usize>;
}

/// A sharded in-process counter store.
///
/// Each key lives in one shard of a [`DashMap`]; the read-modify-write
/// of a hit happens under that shard's lock, so hits on keys in other
/// shards are never blocked. Counters are not persisted.
pub struct InMemoryCounterStore {
    counters: DashMap<CounterKey, WindowCounter>,
    clock: Arc<dyn Clock>,
}

impl InMemoryCounterStore {
    /// Create a store with the default shard amount.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            counters: DashMap::with_shard_amount(DEFAULT_SHARD_AMOUNT),
            clock,
        }
    }

    /// Create a store with a specific shard amount.
    ///
    /// The amount must be a power of two greater than one.
    pub fn with_shard_amount(clock: Arc<dyn Clock>, shard_amount: usize) -> Result<Self> {
        if shard_amount < 2 || !shard_amount.is_power_of_two() {
            return Err(PacerError::Config(format!(
                "shard amount must be a power of two greater than one, got {}",
                shard_amount
            )));
        }

        Ok(Self {
            counters: DashMap::with_shard_amount(shard_amount),
            clock,
        })
    }

    /// Record a hit. The whole update runs without yielding, so a caller
    /// that is cancelled cannot leave a counter half-updated.
    fn hit_now(&self, key: &CounterKey) -> Hit {
        let mut counter = match self.counters.get_mut(key) {
            Some(counter) => counter,
            None => self.counters.entry(key.clone()).or_insert_with(|| {
                debug!(key = %key, window = ?key.window, "Creating new rate limit counter");
                WindowCounter::new(key.window, self.clock.now())
            }),
        };

        // Read the clock while holding the shard lock so concurrent hits
        // observe time in the order they mutate the counter.
        let now = self.clock.now();
        if counter.is_expired(now) {
            debug!(key = %key, window = ?key.window, "Resetting expired rate limit counter");
        }
        let hit = counter.hit(now);

        trace!(key = %key, count = hit.count, "Recorded hit");
        hit
    }

    /// Get the number of tracked counters, live or expired.
    pub fn len(&self) -> usize {
        self.counters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counters.is_empty()
    }

    /// Clear all counters.
    ///
    /// Counters carry no durable state, so this only relaxes limits until
    /// the windows fill up again.
    pub fn clear(&self) {
        self.counters.clear();
    }
}

#[async_trait]
impl CounterStore for InMemoryCounterStore {
    async fn hit(&self, key: &CounterKey) -> Result<Hit> {
        Ok(self.hit_now(key))
    }

    async fn peek(&self, key: &CounterKey) -> Result<Option<u64>> {
        let now = self.clock.now();
        Ok(self.counters.get(key).map(|c| c.current_count(now)))
    }

    async fn sweep(&self) -> Result<usize> {
        let now = self.clock.now();
        let mut removed = 0;
        self.counters.retain(|_, counter| {
            let keep = !counter.is_expired(now);
            if !keep {
                removed += 1;
            }
            keep
        });
        Ok(removed)
    }
}

/// Periodically sweep expired counters out of `store`.
///
/// The task runs until the returned handle is aborted. A zero interval is
/// rejected.
pub fn spawn_sweeper(store: Arc<dyn CounterStore>, every: Duration) -> Result<JoinHandle<()>> {
    if every.is_zero() {
        return Err(PacerError::Config(
            "sweep interval must be greater than zero".to_string(),
        ));
    }

    Ok(tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        ticker.tick().await;

        info!(interval = ?every, "Counter sweeper started");
        loop {
            ticker.tick().await;
            match store.sweep().await {
                Ok(0) => {}
                Ok(removed) => debug!(removed, "Swept expired counters"),
                Err(e) => warn!(error = %e, "Counter sweep failed"),
            }
        }
    }))
}
