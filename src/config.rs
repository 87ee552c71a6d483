//! Configuration management for Pacer.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::info;

use crate::error::{PacerError, Result};
use crate::ratelimit::{EvaluationMode, RateLimitConfig, DEFAULT_SHARD_AMOUNT};

/// Prefix of environment variables that override file settings,
/// e.g. `PACER__PAGINATION__MAX_LIMIT=100`.
pub const ENV_PREFIX: &str = "PACER";

/// Main configuration for Pacer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PacerConfig {
    /// Counter store configuration
    #[serde(default)]
    pub store: StoreConfig,

    /// Pagination configuration
    #[serde(default)]
    pub pagination: PaginationConfig,

    /// Rate limiting configuration
    #[serde(default)]
    pub rate_limiting: RateLimitingConfig,
}

/// Counter store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Number of shards, a power of two
    #[serde(default = "default_shard_amount")]
    pub shard_amount: usize,

    /// How often expired counters are swept, in seconds. Zero disables
    /// the sweeper and leaves expiry to the next hit.
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            shard_amount: default_shard_amount(),
            sweep_interval_secs: default_sweep_interval(),
        }
    }
}

impl StoreConfig {
    pub fn sweep_interval(&self) -> Option<Duration> {
        match self.sweep_interval_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }
}

fn default_shard_amount() -> usize {
    DEFAULT_SHARD_AMOUNT
}

fn default_sweep_interval() -> u64 {
    60
}

/// Pagination configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaginationConfig {
    /// Page size when the client does not ask for one
    #[serde(default = "default_limit")]
    pub default_limit: usize,

    /// Largest page size served; larger requests are clamped
    #[serde(default = "default_max_limit")]
    pub max_limit: usize,

    /// Secret used to sign cursors. Unsigned when absent.
    #[serde(default)]
    pub cursor_secret: Option<String>,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            default_limit: default_limit(),
            max_limit: default_max_limit(),
            cursor_secret: None,
        }
    }
}

fn default_limit() -> usize {
    10
}

fn default_max_limit() -> usize {
    50
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RateLimitingConfig {
    /// Path to the action rules file; the built-in forum rules when unset
    #[serde(default)]
    pub rules_path: Option<String>,

    /// Whether later windows are charged once an earlier one denies
    #[serde(default)]
    pub evaluation: EvaluationMode,
}

impl RateLimitingConfig {
    /// Load the action rules this configuration points at.
    pub fn load_rules(&self) -> Result<RateLimitConfig> {
        match &self.rules_path {
            Some(path) => RateLimitConfig::from_file(path),
            None => Ok(RateLimitConfig::forum_defaults()),
        }
    }
}

impl PacerConfig {
    /// Load configuration from a YAML file.
    pub fn from_file(path: &str) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: PacerConfig = serde_yaml::from_str(&contents)
            .map_err(|e| PacerError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from defaults, an optional YAML file and
    /// `PACER__`-prefixed environment variables, later sources winning.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            info!(path = %path.display(), "Loading configuration file");
            builder = builder.add_source(
                config::File::from(path).format(config::FileFormat::Yaml),
            );
        }
        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true),
        );

        let config: PacerConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Check values the type system cannot.
    pub fn validate(&self) -> Result<()> {
        let shards = self.store.shard_amount;
        if shards < 2 || !shards.is_power_of_two() {
            return Err(PacerError::Config(format!(
                "store.shard_amount must be a power of two greater than one, got {}",
                shards
            )));
        }

        let pagination = &self.pagination;
        if pagination.default_limit == 0 || pagination.max_limit == 0 {
            return Err(PacerError::Config(
                "pagination limits must be positive".to_string(),
            ));
        }
        if pagination.default_limit > pagination.max_limit {
            return Err(PacerError::Config(format!(
                "pagination.default_limit ({}) exceeds max_limit ({})",
                pagination.default_limit, pagination.max_limit
            )));
        }
        if matches!(&pagination.cursor_secret, Some(secret) if secret.is_empty()) {
            return Err(PacerError::Config(
                "pagination.cursor_secret must not be empty".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_temp(name: &str, contents: &str) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(format!("pacer-{}-{}", std::process::id(), name));
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_defaults() {
        let config = PacerConfig::default();
        config.validate().unwrap();
        assert_eq!(config.pagination.default_limit, 10);
        assert_eq!(config.pagination.max_limit, 50);
        assert_eq!(config.store.shard_amount, 64);
        assert_eq!(config.store.sweep_interval(), Some(Duration::from_secs(60)));
        assert_eq!(config.rate_limiting.evaluation, EvaluationMode::ShortCircuit);
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let yaml = r#"
pagination:
  max_limit: 100
rate_limiting:
  evaluation: consume_all
"#;
        let config: PacerConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.pagination.max_limit, 100);
        assert_eq!(config.pagination.default_limit, 10);
        assert_eq!(config.rate_limiting.evaluation, EvaluationMode::ConsumeAll);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = PacerConfig::default();
        config.store.shard_amount = 48;
        assert!(config.validate().is_err());

        let mut config = PacerConfig::default();
        config.pagination.default_limit = 80;
        assert!(config.validate().is_err());

        let mut config = PacerConfig::default();
        config.pagination.cursor_secret = Some(String::new());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_sweeper_disabled() {
        let store = StoreConfig {
            sweep_interval_secs: 0,
            ..StoreConfig::default()
        };
        assert_eq!(store.sweep_interval(), None);
    }

    #[test]
    fn test_from_file() {
        let path = write_temp(
            "config.yaml",
            "store:\n  shard_amount: 16\npagination:\n  cursor_secret: s3cret\n",
        );
        let config = PacerConfig::from_file(path.to_str().unwrap()).unwrap();
        assert_eq!(config.store.shard_amount, 16);
        assert_eq!(config.pagination.cursor_secret.as_deref(), Some("s3cret"));
        std::fs::remove_file(path).unwrap();
    }

    #[test]
    fn test_load_layers_file_over_defaults() {
        let path = write_temp("layered.yaml", "pagination:\n  default_limit: 20\n");
        let config = PacerConfig::load(Some(&path)).unwrap();
        assert_eq!(config.pagination.default_limit, 20);
        assert_eq!(config.pagination.max_limit, 50);
        std::fs::remove_file(path).unwrap();
    }

    #[test]
    fn test_env_overrides_file() {
        // Only fields no other test reads through `load`, since the
        // environment is shared by every test in the process.
        let path = write_temp("env.yaml", "store:\n  sweep_interval_secs: 30\n");
        std::env::set_var("PACER__STORE__SWEEP_INTERVAL_SECS", "7");
        std::env::set_var("PACER__RATE_LIMITING__EVALUATION", "consume_all");

        let result = PacerConfig::load(Some(&path));

        std::env::remove_var("PACER__STORE__SWEEP_INTERVAL_SECS");
        std::env::remove_var("PACER__RATE_LIMITING__EVALUATION");
        std::fs::remove_file(path).unwrap();

        let config = result.unwrap();
        assert_eq!(config.store.sweep_interval(), Some(Duration::from_secs(7)));
        assert_eq!(config.rate_limiting.evaluation, EvaluationMode::ConsumeAll);
    }

    #[test]
    fn test_load_rules_from_file() {
        let path = write_temp(
            "rules.yaml",
            "actions:\n  vote:\n    windows:\n      - limit: 30\n        unit: minute\n",
        );
        let rl = RateLimitingConfig {
            rules_path: Some(path.to_string_lossy().into_owned()),
            ..RateLimitingConfig::default()
        };
        let rules = rl.load_rules().unwrap();
        assert!(rules.find_policy("vote").is_some());
        assert!(rules.find_policy("signup").is_none());
        std::fs::remove_file(path).unwrap();

        let defaults = RateLimitingConfig::default().load_rules().unwrap();
        assert!(defaults.find_policy("signup").is_some());
    }
}
