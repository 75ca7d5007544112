//! OPP core configuration and validation
//!
//! # Example
//!
//! ```ignore
//! use opp_core::OppConfig;
//!
//! let config = OppConfig::default()
//!     .with_event_stream_capacity(1024)
//!     .with_slow_dispatch_threshold_ms(10);
//! config.validate()?;
//! ```

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::warn;

/// Environment variable overriding `event_stream_capacity`.
pub const ENV_EVENT_STREAM_CAPACITY: &str = "OPP_EVENT_STREAM_CAPACITY";

/// Environment variable overriding `slow_dispatch_threshold_ms`.
pub const ENV_SLOW_DISPATCH_MS: &str = "OPP_SLOW_DISPATCH_MS";

/// Tunables for the OPP core.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OppConfig {
    /// Buffered notifications per async event stream before lagging.
    pub event_stream_capacity: usize,
    /// A notification round slower than this is reported with `warn!`.
    pub slow_dispatch_threshold_ms: u64,
}

impl Default for OppConfig {
    fn default() -> Self {
        Self {
            event_stream_capacity: 256,
            slow_dispatch_threshold_ms: 50,
        }
    }
}

impl OppConfig {
    /// Defaults overridden by `OPP_*` environment variables.
    ///
    /// Unparseable values are ignored with a warning and the default kept.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(capacity) = env_parse::<usize>(ENV_EVENT_STREAM_CAPACITY) {
            config.event_stream_capacity = capacity;
        }
        if let Some(ms) = env_parse::<u64>(ENV_SLOW_DISPATCH_MS) {
            config.slow_dispatch_threshold_ms = ms;
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.event_stream_capacity == 0 {
            return Err(ConfigError::ZeroStreamCapacity);
        }

        if self.slow_dispatch_threshold_ms == 0 {
            return Err(ConfigError::InvalidValue {
                key: "slow_dispatch_threshold_ms",
                value: "0".to_string(),
            });
        }

        Ok(())
    }

    /// Threshold as a `Duration`.
    #[must_use]
    pub fn slow_dispatch_threshold(&self) -> Duration {
        Duration::from_millis(self.slow_dispatch_threshold_ms)
    }

    /// Builder-style method to set the event stream capacity
    #[must_use]
    pub fn with_event_stream_capacity(mut self, capacity: usize) -> Self {
        self.event_stream_capacity = capacity;
        self
    }

    /// Builder-style method to set the slow dispatch threshold
    #[must_use]
    pub fn with_slow_dispatch_threshold_ms(mut self, ms: u64) -> Self {
        self.slow_dispatch_threshold_ms = ms;
        self
    }
}

fn env_parse<T: std::str::FromStr>(key: &'static str) -> Option<T> {
    let raw = std::env::var(key).ok()?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(key, value = %raw, "Ignoring unparseable environment override");
            None
        }
    }
}
