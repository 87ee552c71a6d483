//! Process-wide throttling and pagination handles.
//!
//! Build one [`Pacer`] at startup and hand clones of its handles to every
//! request path; nothing in the crate keeps global state.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::info;

use crate::clock::Clock;
use crate::config::PacerConfig;
use crate::error::Result;
use crate::pagination::Paginator;
use crate::ratelimit::{spawn_sweeper, CounterStore, InMemoryCounterStore, RateLimiter};

pub struct Pacer {
    store: Arc<InMemoryCounterStore>,
    limiter: Arc<RateLimiter>,
    paginator: Arc<Paginator>,
    sweeper: Option<JoinHandle<()>>,
}

impl Pacer {
    /// Build the counter store, limiter and paginator described by `config`.
    ///
    /// The sweeper is not started; see [`Pacer::start_sweeper`].
    pub fn from_config(config: &PacerConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        config.validate()?;

        let store = Arc::new(InMemoryCounterStore::with_shard_amount(
            clock.clone(),
            config.store.shard_amount,
        )?);
        let rules = config.rate_limiting.load_rules()?;
        let action_count = rules.actions.len();

        let limiter = RateLimiter::with_config(store.clone(), clock, rules)
            .with_evaluation(config.rate_limiting.evaluation);
        let paginator = Paginator::from_config(&config.pagination)?;

        info!(
            shards = config.store.shard_amount,
            actions = action_count,
            evaluation = ?config.rate_limiting.evaluation,
            signed_cursors = paginator.codec().is_signed(),
            "Pacer initialized"
        );

        Ok(Self {
            store,
            limiter: Arc::new(limiter),
            paginator: Arc::new(paginator),
            sweeper: None,
        })
    }

    /// Start sweeping expired counters every `interval`. Must be called
    /// from within a tokio runtime. Replaces any running sweeper; on error
    /// the running one is kept.
    pub fn start_sweeper(&mut self, interval: std::time::Duration) -> Result<()> {
        let store: Arc<dyn CounterStore> = self.store.clone();
        let sweeper = spawn_sweeper(store, interval)?;
        if let Some(previous) = self.sweeper.replace(sweeper) {
            previous.abort();
        }
        Ok(())
    }

    pub fn store(&self) -> &Arc<InMemoryCounterStore> {
        &self.store
    }

    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    pub fn paginator(&self) -> &Arc<Paginator> {
        &self.paginator
    }

    /// Stop background work.
    pub fn shutdown(mut self) {
        if let Some(sweeper) = self.sweeper.take() {
            sweeper.abort();
        }
        info!(counters = self.store.len(), "Pacer stopped");
    }
}

impl Drop for Pacer {
    fn drop(&mut self) {
        if let Some(sweeper) = self.sweeper.take() {
            sweeper.abort();
        }
    }
}
