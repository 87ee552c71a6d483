//! Core rate limiter implementation.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, trace, warn};

use super::key::{Actor, CounterKey, RateLimitKey};
use super::rules::{ActionPolicy, RateLimitConfig};
use super::store::CounterStore;
use crate::clock::Clock;
use crate::error::{PacerError, Result};

/// How the windows of one action are charged when one of them denies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvaluationMode {
    /// Stop at the first denying window. Later windows are not charged,
    /// so a burst denial leaves the sustained budget untouched.
    #[default]
    ShortCircuit,
    /// Charge every window, then deny if any of them denied.
    ConsumeAll,
}

/// The result of a single window check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// The hit fits in the window
    Allowed { count: u64, limit: u64 },
    /// The window is exhausted until `retry_after` has passed
    Limited {
        count: u64,
        limit: u64,
        retry_after: Duration,
    },
    /// The counter store failed; treated as a denial
    Unavailable,
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allowed { .. })
    }

    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Decision::Limited { retry_after, .. } => Some(*retry_after),
            _ => None,
        }
    }
}

/// The rate limiter that checks actions against their configured windows.
///
/// This struct is thread-safe and is meant to be constructed once at
/// startup and shared by every request path.
pub struct RateLimiter {
    /// Window counters
    store: Arc<dyn CounterStore>,
    /// Time source the counters are measured against
    clock: Arc<dyn Clock>,
    /// Per-action policies
    rules: RwLock<RateLimitConfig>,
    /// What to do with later windows once one denies
    evaluation: EvaluationMode,
}

impl RateLimiter {
    /// Create a rate limiter with no action policies.
    pub fn new(store: Arc<dyn CounterStore>, clock: Arc<dyn Clock>) -> Self {
        Self::with_config(store, clock, RateLimitConfig::new())
    }

    /// Create a rate limiter with action policies.
    pub fn with_config(
        store: Arc<dyn CounterStore>,
        clock: Arc<dyn Clock>,
        rules: RateLimitConfig,
    ) -> Self {
        Self {
            store,
            clock,
            rules: RwLock::new(rules),
            evaluation: EvaluationMode::default(),
        }
    }

    pub fn with_evaluation(mut self, evaluation: EvaluationMode) -> Self {
        self.evaluation = evaluation;
        self
    }

    pub fn evaluation(&self) -> EvaluationMode {
        self.evaluation
    }

    /// Replace the action policies.
    pub fn set_config(&self, rules: RateLimitConfig) {
        *self.rules.write() = rules;
    }

    /// Get the current action policies.
    pub fn config(&self) -> RateLimitConfig {
        self.rules.read().clone()
    }

    /// Record a hit for `key` in a window of `window` and check it against
    /// `limit`.
    ///
    /// Denied hits are still counted, so hammering a limited key does not
    /// let it recover any sooner. A store failure is reported as
    /// [`Decision::Unavailable`], never as an admission. So is a zero
    /// window or a zero limit, since neither can be enforced meaningfully.
    pub async fn admit(&self, key: &RateLimitKey, window: Duration, limit: u64) -> Decision {
        let counter_key = CounterKey::new(key.clone(), window);

        if window.is_zero() || limit == 0 {
            warn!(key = %counter_key, limit, "Rejected degenerate rate limit window");
            return Decision::Unavailable;
        }

        let hit = match self.store.hit(&counter_key).await {
            Ok(hit) => hit,
            Err(e) => {
                warn!(key = %counter_key, error = %e, "Counter store failed, denying");
                return Decision::Unavailable;
            }
        };

        trace!(key = %counter_key, count = hit.count, limit, "Checked window");

        if hit.count <= limit {
            Decision::Allowed {
                count: hit.count,
                limit,
            }
        } else {
            let retry_after = (hit.window_start + window).saturating_duration_since(self.clock.now());
            debug!(
                key = %counter_key,
                count = hit.count,
                limit,
                retry_after = ?retry_after,
                "Rate limit exceeded"
            );
            Decision::Limited {
                count: hit.count,
                limit,
                retry_after,
            }
        }
    }

    /// Check `action` performed by `actor` against the action's policy.
    ///
    /// Returns `RateLimitExceeded` when any window denies, `StoreUnavailable`
    /// when the counters cannot be reached and `UnknownAction` when the
    /// action has no policy.
    #[instrument(level = "debug", skip(self))]
    pub async fn check(&self, action: &str, actor: &Actor) -> Result<()> {
        let policy = self
            .rules
            .read()
            .find_policy(action)
            .cloned()
            .ok_or_else(|| PacerError::UnknownAction(action.to_string()))?;

        let key = RateLimitKey::new(action, actor.clone());
        self.check_policy(&key, &policy).await
    }

    /// Check `key` against an explicit list of windows.
    ///
    /// The policy is validated first, as it would be when loaded from YAML.
    pub async fn check_policy(&self, key: &RateLimitKey, policy: &ActionPolicy) -> Result<()> {
        policy.validate(&key.action)?;

        let mut denial: Option<PacerError> = None;

        for rule in &policy.windows {
            let err = match self.admit(key, rule.window(), rule.limit).await {
                Decision::Allowed { .. } => continue,
                Decision::Limited { retry_after, .. } => PacerError::RateLimitExceeded {
                    action: key.action.clone(),
                    retry_after,
                },
                Decision::Unavailable => PacerError::StoreUnavailable(format!(
                    "counter store unavailable for {}",
                    key.action
                )),
            };

            match self.evaluation {
                EvaluationMode::ShortCircuit => return Err(err),
                EvaluationMode::ConsumeAll => denial = Some(merge_denials(denial, err)),
            }
        }

        match denial {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Get the live count of one window of `key`.
    ///
    /// Returns `None` if no counter exists for it.
    pub async fn counter_value(&self, key: &RateLimitKey, window: Duration) -> Result<Option<u64>> {
        self.store.peek(&CounterKey::new(key.clone(), window)).await
    }
}

/// Keep the most severe denial: a store failure outranks throttling, and
/// of two throttles the longer wait wins.
fn merge_denials(prev: Option<PacerError>, next: PacerError) -> PacerError {
    match (prev, next) {
        (None, next) => next,
        (Some(prev @ PacerError::StoreUnavailable(_)), _) => prev,
        (Some(prev), next) => match (prev.retry_after(), next.retry_after()) {
            (Some(a), Some(b)) if a >= b => prev,
            _ => next,
        },
    }
}
