//! Configuration types for ledger-host.
//!
//! Config structs validate their values at construction time via fallible
//! builders. Post-deserialization validation is available via the
//! `validate()` method.

// The schemars `JsonSchema` derive expands to code that unwraps internally.
#![allow(clippy::unwrap_used)]

use std::time::Duration;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use snafu::Snafu;

/// Minimum time a fenced-and-deleted ledger is remembered.
const MIN_RECENTLY_DELETED_TTL: Duration = Duration::from_secs(1);

/// Configuration validation error.
///
/// Returned when a configuration value is outside its valid range.
#[derive(Debug, Snafu)]
pub enum ConfigError {
    /// A configuration value is invalid.
    #[snafu(display("invalid config: {message}"))]
    Validation {
        /// Description of the validation failure.
        message: String,
    },
}

/// Ledger handle and handle cache configuration.
///
/// # Validation Rules
///
/// - `recently_deleted_ttl` must be >= 1 second
/// - `recently_deleted_capacity` must be >= 1
///
/// # Example
///
/// ```no_run
/// # use std::time::Duration;
/// # use ledger_host_types::config::HandleConfig;
/// let config = HandleConfig::builder()
///     .recently_deleted_ttl(Duration::from_secs(60))
///     .recently_deleted_capacity(1_000)
///     .build()
///     .expect("valid handle config");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct HandleConfig {
    /// How long a ledger that was fenced and then deleted keeps refusing new
    /// writable handles outside journal replay.
    #[serde(default = "default_recently_deleted_ttl")]
    #[serde(with = "humantime_serde")]
    #[schemars(with = "String")]
    pub recently_deleted_ttl: Duration,
    /// Upper bound on remembered fenced-and-deleted ledgers.
    #[serde(default = "default_recently_deleted_capacity")]
    pub recently_deleted_capacity: usize,
    /// Whether the journal may acknowledge the fence marker before fsync.
    #[serde(default)]
    pub fence_ack_before_sync: bool,
}

#[bon::bon]
impl HandleConfig {
    /// Creates a new handle configuration with validation.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] if:
    /// - `recently_deleted_ttl` < 1 second
    /// - `recently_deleted_capacity` is zero
    #[builder]
    pub fn new(
        #[builder(default = default_recently_deleted_ttl())] recently_deleted_ttl: Duration,
        #[builder(default = default_recently_deleted_capacity())] recently_deleted_capacity: usize,
        #[builder(default)] fence_ack_before_sync: bool,
    ) -> Result<Self, ConfigError> {
        let config = Self { recently_deleted_ttl, recently_deleted_capacity, fence_ack_before_sync };
        config.validate()?;
        Ok(config)
    }
}

impl HandleConfig {
    /// Validates the configuration values.
    ///
    /// Call after deserialization to ensure values are within valid ranges.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] if any value is out of range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.recently_deleted_ttl < MIN_RECENTLY_DELETED_TTL {
            return Err(ConfigError::Validation {
                message: format!(
                    "recently_deleted_ttl must be >= {:?}, got {:?}",
                    MIN_RECENTLY_DELETED_TTL, self.recently_deleted_ttl
                ),
            });
        }
        if self.recently_deleted_capacity == 0 {
            return Err(ConfigError::Validation {
                message: "recently_deleted_capacity must be >= 1, got 0".to_string(),
            });
        }
        Ok(())
    }
}

impl Default for HandleConfig {
    fn default() -> Self {
        Self {
            recently_deleted_ttl: default_recently_deleted_ttl(),
            recently_deleted_capacity: default_recently_deleted_capacity(),
            fence_ack_before_sync: false,
        }
    }
}

fn default_recently_deleted_ttl() -> Duration {
    Duration::from_secs(300) // 5 minutes
}

fn default_recently_deleted_capacity() -> usize {
    10_000
}

/// Duration serialization using humantime format.
mod humantime_serde {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&humantime::format_duration(*duration).to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        humantime::parse_duration(&s).map_err(serde::de::Error::custom)
    }
}
