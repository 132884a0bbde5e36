//! Screen configuration loaded from TOML.
//!
//! Every field has a default, so an empty file (or no file) is a valid config:
//!
//! ```toml
//! [fetch]
//! pool_size = 8
//! task_timeout_secs = 20
//!
//! [portfolio]
//! top_n = 50
//! order = "highest_first"
//!
//! [cache]
//! ttl_secs = 3600
//! manual_refresh = false
//! ```

use rvscreen_core::rank::ScoreOrder;
use rvscreen_core::DEFAULT_TOP_N;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScreenConfig {
    pub fetch: FetchConfig,
    pub portfolio: PortfolioConfig,
    pub cache: CacheConfig,
}

/// Fetcher pool and provider settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FetchConfig {
    /// Concurrent fetch tasks. 1 means sequential.
    pub pool_size: usize,
    /// Upper bound on a single symbol's fetch.
    pub task_timeout_secs: u64,
    /// How long the provider stays blocked after a ban or repeated rate limits.
    pub breaker_cooldown_secs: u64,
    /// Consecutive provider failures before the breaker trips.
    pub breaker_threshold: u32,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            pool_size: 8,
            task_timeout_secs: 20,
            breaker_cooldown_secs: 30 * 60,
            breaker_threshold: 5,
        }
    }
}

impl FetchConfig {
    pub fn task_timeout(&self) -> Duration {
        Duration::from_secs(self.task_timeout_secs)
    }

    pub fn breaker_cooldown(&self) -> Duration {
        Duration::from_secs(self.breaker_cooldown_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PortfolioConfig {
    /// Number of names held when capital is given.
    pub top_n: usize,
    pub order: ScoreOrder,
}

impl Default for PortfolioConfig {
    fn default() -> Self {
        Self {
            top_n: DEFAULT_TOP_N,
            order: ScoreOrder::HighestFirst,
        }
    }
}

/// Session fetch cache settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CacheConfig {
    /// Seconds a fetched universe stays fresh.
    pub ttl_secs: u64,
    /// Ignore `ttl_secs` and keep entries until explicitly invalidated.
    pub manual_refresh: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 3600,
            manual_refresh: false,
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

impl ScreenConfig {
    /// Load and validate a config from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Parse and validate a config from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.fetch.pool_size == 0 {
            return Err(ConfigError::Invalid("fetch.pool_size must be at least 1".into()));
        }
        if self.fetch.task_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "fetch.task_timeout_secs must be at least 1".into(),
            ));
        }
        if self.portfolio.top_n == 0 {
            return Err(ConfigError::Invalid("portfolio.top_n must be at least 1".into()));
        }
        Ok(())
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Invalid(format!("serialize: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_is_default() {
        let cfg = ScreenConfig::from_toml("").unwrap();
        assert_eq!(cfg, ScreenConfig::default());
        assert_eq!(cfg.portfolio.top_n, 50);
        assert_eq!(cfg.fetch.task_timeout(), Duration::from_secs(20));
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let cfg = ScreenConfig::from_toml(
            r#"
[fetch]
pool_size = 2

[portfolio]
order = "lowest_first"
"#,
        )
        .unwrap();
        assert_eq!(cfg.fetch.pool_size, 2);
        assert_eq!(cfg.fetch.task_timeout_secs, 20);
        assert_eq!(cfg.portfolio.order, ScoreOrder::LowestFirst);
        assert_eq!(cfg.portfolio.top_n, 50);
    }

    #[test]
    fn rejects_unknown_keys() {
        let err = ScreenConfig::from_toml("[fetch]\nthreads = 4\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn rejects_zero_values() {
        assert!(matches!(
            ScreenConfig::from_toml("[fetch]\npool_size = 0\n"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            ScreenConfig::from_toml("[portfolio]\ntop_n = 0\n"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            ScreenConfig::from_toml("[fetch]\ntask_timeout_secs = 0\n"),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn toml_roundtrip() {
        let mut cfg = ScreenConfig::default();
        cfg.cache.manual_refresh = true;
        cfg.fetch.pool_size = 3;
        let parsed = ScreenConfig::from_toml(&cfg.to_toml().unwrap()).unwrap();
        assert_eq!(parsed, cfg);
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = ScreenConfig::from_file(Path::new("/no/such/rvscreen.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
