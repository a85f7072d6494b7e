//! Declarative store configuration.
//!
//! Everything a builder can be told apart from the loader, actions and
//! selectors can also come from a TOML document:
//!
//! ```
//! use signal_store_runtime::config::StoreConfig;
//! use std::time::Duration;
//!
//! # fn main() -> Result<(), signal_store_runtime::config::ConfigError> {
//! let config = StoreConfig::from_toml_str(
//!     r#"
//!     scope = "catalog"
//!     ttl_ms = 30000
//!     cache_window_ms = 300000
//!     record_history = true
//!     "#,
//! )?;
//!
//! assert_eq!(config.ttl(), Duration::from_secs(30));
//! assert_eq!(config.cache_window(), Some(Duration::from_secs(300)));
//! # Ok(())
//! # }
//! ```

use serde::{Deserialize, Serialize};
use signal_store_core::StoreError;
use std::time::Duration;
use thiserror::Error;

/// Configuration error
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Failed to parse configuration
    #[error("Failed to parse store configuration: {0}")]
    ParseError(String),
    /// Configuration validation failed
    #[error("Store configuration validation failed: {0}")]
    ValidationError(String),
}

impl From<ConfigError> for StoreError {
    fn from(error: ConfigError) -> Self {
        Self::Configuration(error.to_string())
    }
}

/// Store configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StoreConfig {
    /// Scope name; derived from the state type when absent
    pub scope: Option<String>,
    /// TTL in milliseconds; 0 disables TTL reloads
    pub ttl_ms: u64,
    /// Lazy cache window in milliseconds
    pub cache_window_ms: Option<u64>,
    /// Auto-refresh interval in milliseconds
    pub refresh_interval_ms: Option<u64>,
    /// Record tracked actions in the process-wide history
    pub record_history: bool,
}

impl StoreConfig {
    /// Parse and validate a TOML document.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ParseError`] for malformed TOML or unknown
    /// keys and [`ConfigError::ValidationError`] for invalid values.
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(source).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    ///
    /// # Errors
    ///
    /// Returns error if the scope is blank or a window or interval is zero
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.scope.as_deref().is_some_and(|scope| scope.trim().is_empty()) {
            return Err(ConfigError::ValidationError("scope cannot be empty".to_string()));
        }
        if self.cache_window_ms == Some(0) {
            return Err(ConfigError::ValidationError("cache_window_ms must be > 0".to_string()));
        }
        if self.refresh_interval_ms == Some(0) {
            return Err(ConfigError::ValidationError(
                "refresh_interval_ms must be > 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Get TTL as Duration
    #[must_use]
    pub const fn ttl(&self) -> Duration {
        Duration::from_millis(self.ttl_ms)
    }

    /// Get cache window as Duration
    #[must_use]
    pub fn cache_window(&self) -> Option<Duration> {
        self.cache_window_ms.map(Duration::from_millis)
    }

    /// Get refresh interval as Duration
    #[must_use]
    pub fn refresh_interval(&self) -> Option<Duration> {
        self.refresh_interval_ms.map(Duration::from_millis)
    }

    /// Set the scope
    #[must_use]
    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    /// Set the TTL
    #[must_use]
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl_ms = duration_ms(ttl);
        self
    }

    /// Set the cache window
    #[must_use]
    pub fn with_cache_window(mut self, window: Duration) -> Self {
        self.cache_window_ms = Some(duration_ms(window));
        self
    }

    /// Set the refresh interval
    #[must_use]
    pub fn with_refresh_interval(mut self, interval: Duration) -> Self {
        self.refresh_interval_ms = Some(duration_ms(interval));
        self
    }

    /// Enable history recording
    #[must_use]
    pub const fn with_history(mut self) -> Self {
        self.record_history = true;
        self
    }
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
