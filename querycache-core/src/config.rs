//! Configuration types

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{ConfigError, QueryCacheError, QueryCacheResult};

/// Environment variable toggling result caching.
pub const ENV_ENABLED: &str = "QUERYCACHE_ENABLED";
/// Environment variable selecting the caching strategy.
pub const ENV_STRATEGY: &str = "QUERYCACHE_STRATEGY";
/// Environment variable holding the default entry lifetime in seconds.
pub const ENV_DEFAULT_LIFETIME_SECS: &str = "QUERYCACHE_DEFAULT_LIFETIME_SECS";

/// Upper bound on a configured lifetime (one year).
pub const MAX_LIFETIME_SECS: u64 = 365 * 24 * 3600;

/// How a live result is written to the cache store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CacheStrategy {
    /// The whole result set under one key.
    #[default]
    WholeResult,
    /// One entry per row plus an ordered index of row keys.
    PerRow,
}

impl CacheStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheStrategy::WholeResult => "whole",
            CacheStrategy::PerRow => "per-row",
        }
    }
}

impl fmt::Display for CacheStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CacheStrategy {
    type Err = QueryCacheError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "whole" | "whole-result" | "whole_result" => Ok(CacheStrategy::WholeResult),
            "per-row" | "per_row" | "row" => Ok(CacheStrategy::PerRow),
            other => Err(ConfigError::InvalidValue {
                field: ENV_STRATEGY.to_string(),
                value: other.to_string(),
                reason: "expected 'whole' or 'per-row'".to_string(),
            }
            .into()),
        }
    }
}

/// Result cache configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Whether lookups and writes happen at all.
    pub enabled: bool,
    /// Strategy used to populate the cache on a miss.
    pub strategy: CacheStrategy,
    /// Lifetime given to policies built from this config; 0 defers to the
    /// cache store's own default.
    pub default_lifetime_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            strategy: CacheStrategy::WholeResult,
            default_lifetime_secs: 0,
        }
    }
}

impl CacheConfig {
    /// Create a new cache config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the strategy.
    pub fn with_strategy(mut self, strategy: CacheStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Set the default lifetime in seconds.
    pub fn with_lifetime(mut self, secs: u64) -> Self {
        self.default_lifetime_secs = secs;
        self
    }

    /// Enable or disable caching.
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Load from `QUERYCACHE_*` environment variables, defaulting any that
    /// are unset.
    pub fn from_env() -> QueryCacheResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> QueryCacheResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(raw) = lookup(ENV_ENABLED) {
            config.enabled = match raw.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => true,
                "0" | "false" | "no" | "off" => false,
                _ => {
                    return Err(ConfigError::InvalidValue {
                        field: ENV_ENABLED.to_string(),
                        value: raw,
                        reason: "expected a boolean".to_string(),
                    }
                    .into())
                }
            };
        }

        if let Some(raw) = lookup(ENV_STRATEGY) {
            config.strategy = raw.parse()?;
        }

        if let Some(raw) = lookup(ENV_DEFAULT_LIFETIME_SECS) {
            config.default_lifetime_secs =
                raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
                    field: ENV_DEFAULT_LIFETIME_SECS.to_string(),
                    value: raw.clone(),
                    reason: "expected a non-negative integer".to_string(),
                })?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> QueryCacheResult<()> {
        if self.default_lifetime_secs > MAX_LIFETIME_SECS {
            return Err(ConfigError::InvalidValue {
                field: "default_lifetime_secs".to_string(),
                value: self.default_lifetime_secs.to_string(),
                reason: format!("must not exceed {} seconds", MAX_LIFETIME_SECS),
            }
            .into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_cache_config_builder() {
        let config = CacheConfig::new()
            .with_strategy(CacheStrategy::PerRow)
            .with_lifetime(300)
            .with_enabled(false);

        assert_eq!(config.strategy, CacheStrategy::PerRow);
        assert_eq!(config.default_lifetime_secs, 300);
        assert!(!config.enabled);
    }

    #[test]
    fn test_from_lookup_defaults_when_unset() {
        let config = CacheConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config, CacheConfig::default());
    }

    #[test]
    fn test_from_lookup_reads_all_fields() {
        let config = CacheConfig::from_lookup(lookup_from(&[
            (ENV_ENABLED, "false"),
            (ENV_STRATEGY, "per-row"),
            (ENV_DEFAULT_LIFETIME_SECS, "120"),
        ]))
        .unwrap();
        assert!(!config.enabled);
        assert_eq!(config.strategy, CacheStrategy::PerRow);
        assert_eq!(config.default_lifetime_secs, 120);
    }

    #[test]
    fn test_from_lookup_rejects_bad_values() {
        let bad_strategy = CacheConfig::from_lookup(lookup_from(&[(ENV_STRATEGY, "sometimes")]));
        assert!(matches!(
            bad_strategy,
            Err(QueryCacheError::Config(ConfigError::InvalidValue { .. }))
        ));

        let bad_lifetime =
            CacheConfig::from_lookup(lookup_from(&[(ENV_DEFAULT_LIFETIME_SECS, "-5")]));
        assert!(bad_lifetime.is_err());

        let bad_flag = CacheConfig::from_lookup(lookup_from(&[(ENV_ENABLED, "maybe")]));
        assert!(bad_flag.is_err());
    }

    #[test]
    fn test_validate_caps_lifetime() {
        assert!(CacheConfig::new().with_lifetime(MAX_LIFETIME_SECS).validate().is_ok());
        assert!(CacheConfig::new()
            .with_lifetime(MAX_LIFETIME_SECS + 1)
            .validate()
            .is_err());
    }
}
