//! Rate limiting logic and state management.

mod counter;
mod key;
mod limiter;
mod rules;
mod store;

pub use counter::{Hit, WindowCounter};
pub use key::{Actor, CounterKey, RateLimitKey};
pub use limiter::{Decision, EvaluationMode, RateLimiter};
pub use rules::{ActionPolicy, RateLimitConfig, TimeUnit, WindowRule};
pub use store::{spawn_sweeper, CounterStore, InMemoryCounterStore, DEFAULT_SHARD_AMOUNT};
