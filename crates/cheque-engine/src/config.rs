//! Engine configuration
//!
//! Loaded from TOML. Every field has a default, so an empty file is valid.
//! Durations are whole seconds; `schedule_start` is an RFC 3339 string.
//!
//! ```toml
//! cache_capacity = 256
//! cache_ttl = 900
//! schedule_start = "2026-01-05T08:00:00Z"
//! trend_bucket = 604800
//! persist_critical_flags = true
//!
//! [risk_weights]
//! criticality = 0.7
//! slack = 0.3
//! slack_horizon = 1209600
//! ```

use crate::error::ConfigError;
use cheque_analytics::RiskWeights;
use cheque_milestone::duration_secs;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default number of cached contract schedules
pub const DEFAULT_CACHE_CAPACITY: u64 = 1_024;

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Contracts whose computed schedule is kept in memory (0 disables caching)
    pub cache_capacity: u64,
    /// Lifetime of a cached schedule; none keeps entries until invalidated
    #[serde(with = "duration_secs")]
    pub cache_ttl: Option<Duration>,
    /// Schedule zero on the calendar; falls back to the earliest planned start
    pub schedule_start: Option<DateTime<Utc>>,
    /// Risk score weights
    pub risk_weights: RiskWeights,
    /// Width of progress trend buckets
    #[serde(with = "duration_secs::required")]
    pub trend_bucket: Duration,
    /// Write critical-path flags back to the store after every committed batch
    pub persist_critical_flags: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            cache_ttl: None,
            schedule_start: None,
            risk_weights: RiskWeights::default(),
            trend_bucket: Duration::days(7),
            persist_critical_flags: false,
        }
    }
}

impl EngineConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With cache capacity
    #[inline]
    #[must_use]
    pub fn with_cache_capacity(mut self, capacity: u64) -> Self {
        self.cache_capacity = capacity;
        self
    }

    /// With cache TTL
    #[inline]
    #[must_use]
    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = Some(ttl);
        self
    }

    /// With schedule anchor
    #[inline]
    #[must_use]
    pub fn with_schedule_start(mut self, start: DateTime<Utc>) -> Self {
        self.schedule_start = Some(start);
        self
    }

    /// With risk weights
    #[inline]
    #[must_use]
    pub fn with_risk_weights(mut self, weights: RiskWeights) -> Self {
        self.risk_weights = weights;
        self
    }

    /// With trend bucket width
    #[inline]
    #[must_use]
    pub fn with_trend_bucket(mut self, bucket: Duration) -> Self {
        self.trend_bucket = bucket;
        self
    }

    /// With critical-flag persistence
    #[inline]
    #[must_use]
    pub fn with_persist_critical_flags(mut self, enabled: bool) -> Self {
        self.persist_critical_flags = enabled;
        self
    }

    /// Parse and validate TOML
    ///
    /// # Errors
    /// `ConfigError::Parse` on bad syntax, `ConfigError::Invalid` on bad values.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file
    ///
    /// # Errors
    /// `ConfigError::Io` if the file cannot be read, plus everything
    /// [`EngineConfig::from_toml_str`] reports.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&raw)?;
        tracing::debug!(path = %path.display(), "engine config loaded");
        Ok(config)
    }

    /// Reject values the engine cannot run with
    ///
    /// # Errors
    /// `ConfigError::Invalid` naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.trend_bucket < Duration::seconds(1) {
            return Err(ConfigError::Invalid(format!(
                "trend_bucket must be at least 1s, got {}ms",
                self.trend_bucket.num_milliseconds()
            )));
        }
        if let Some(ttl) = self.cache_ttl {
            if ttl <= Duration::zero() {
                return Err(ConfigError::Invalid(format!(
                    "cache_ttl must be positive, got {}s",
                    ttl.num_seconds()
                )));
            }
        }
        self.risk_weights
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))
    }
}
