//! Rate limit rules configuration.
//!
//! Each throttled action is guarded by an ordered list of windows, usually
//! a tight burst window followed by a longer sustained one. Rules are
//! loaded from YAML:
//!
//! ```yaml
//! actions:
//!   join_community:
//!     windows:
//!       - limit: 1
//!         unit: second
//!       - limit: 500
//!         unit: hour
//! ```

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::time::Duration;
use tracing::info;

use crate::error::{PacerError, Result};

/// A complete rate limit configuration: the policy for every action.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Map of action tag to its policy
    #[serde(default)]
    pub actions: BTreeMap<String, ActionPolicy>,
}

/// The windows guarding one action, evaluated in order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionPolicy {
    pub windows: Vec<WindowRule>,
}

/// A limit over a window of `units` x `unit`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowRule {
    /// Hits allowed per window
    pub limit: u64,
    /// Number of time units the window spans
    #[serde(default = "default_units")]
    pub units: u32,
    /// The time unit
    pub unit: TimeUnit,
}

fn default_units() -> u32 {
    1
}

/// Time unit for window lengths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeUnit {
    Second,
    Minute,
    Hour,
    Day,
}

impl TimeUnit {
    /// Get the duration of one unit.
    pub fn duration(&self) -> Duration {
        match self {
            TimeUnit::Second => Duration::from_secs(1),
            TimeUnit::Minute => Duration::from_secs(60),
            TimeUnit::Hour => Duration::from_secs(3600),
            TimeUnit::Day => Duration::from_secs(86400),
        }
    }
}

impl WindowRule {
    /// `limit` hits per `units` x `unit`.
    pub fn new(limit: u64, units: u32, unit: TimeUnit) -> Self {
        Self { limit, units, unit }
    }

    /// The window length.
    pub fn window(&self) -> Duration {
        self.unit.duration() * self.units
    }
}

impl ActionPolicy {
    pub fn new(windows: Vec<WindowRule>) -> Self {
        Self { windows }
    }

    /// Reject empty, zero or duplicate windows. `action` only names the
    /// policy in the error.
    pub fn validate(&self, action: &str) -> Result<()> {
        if self.windows.is_empty() {
            return Err(PacerError::Config(format!(
                "action {} has no windows",
                action
            )));
        }

        let mut seen = HashSet::new();
        for rule in &self.windows {
            if rule.limit == 0 {
                return Err(PacerError::Config(format!(
                    "action {} has a window with a zero limit",
                    action
                )));
            }
            if rule.units == 0 {
                return Err(PacerError::Config(format!(
                    "action {} has a zero-length window",
                    action
                )));
            }
            // Windows of equal length would share one counter.
            if !seen.insert(rule.window()) {
                return Err(PacerError::Config(format!(
                    "action {} declares the {:?} window twice",
                    action,
                    rule.window()
                )));
            }
        }

        Ok(())
    }
}

impl RateLimitConfig {
    /// Create an empty configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// The action set used by the forum's handlers.
    pub fn forum_defaults() -> Self {
        use TimeUnit::*;

        let entries = [
            ("join_community", vec![WindowRule::new(1, 1, Second), WindowRule::new(500, 1, Hour)]),
            ("reporting", vec![WindowRule::new(1, 5, Second), WindowRule::new(50, 24, Hour)]),
            ("request_community", vec![WindowRule::new(5, 12, Hour)]),
            ("list_create", vec![WindowRule::new(1, 2, Second), WindowRule::new(100, 24, Hour)]),
            ("list_edit", vec![WindowRule::new(1, 1, Second)]),
            ("list_item_add", vec![WindowRule::new(2, 1, Second), WindowRule::new(1000, 1, Hour)]),
            ("delete_account", vec![WindowRule::new(1, 5, Second)]),
            ("login_ip", vec![WindowRule::new(10, 1, Second)]),
            ("login_user", vec![WindowRule::new(20, 1, Hour)]),
            ("signup", vec![WindowRule::new(2, 1, Minute), WindowRule::new(10, 6, Hour)]),
            ("update_notifications", vec![WindowRule::new(5, 1, Second)]),
            ("update_settings", vec![WindowRule::new(5, 1, Second), WindowRule::new(100, 1, Hour)]),
        ];

        let mut config = Self::new();
        for (action, windows) in entries {
            config.insert(action, ActionPolicy::new(windows));
        }
        config
    }

    /// Load configuration from a YAML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "Loading rate limit rules");

        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Load and validate configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: RateLimitConfig = serde_yaml::from_str(yaml)
            .map_err(|e| PacerError::Config(format!("Failed to parse rate limit rules: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Check every policy for empty, zero or duplicate windows.
    pub fn validate(&self) -> Result<()> {
        for (action, policy) in &self.actions {
            policy.validate(action)?;
        }
        Ok(())
    }

    /// Add or replace the policy for an action.
    pub fn insert(&mut self, action: impl Into<String>, policy: ActionPolicy) {
        self.actions.insert(action.into(), policy);
    }

    /// Get the policy for an action.
    pub fn find_policy(&self, action: &str) -> Option<&ActionPolicy> {
        self.actions.get(action)
    }
}
