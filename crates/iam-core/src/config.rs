//! Core configuration.
//!
//! Configuration is loaded from environment variables with defaults that
//! match the membership table and a conservative cleanup retry policy.

use chrono::Duration as ChronoDuration;
use iam_org::TransitionTable;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::retry::RetryConfig;

/// Longest accepted token lifetime, in days.
pub const MAX_TOKEN_TTL_DAYS: i64 = 3650;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Invalid configuration value.
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue {
        /// Configuration key.
        key: String,
        /// Error message.
        message: String,
    },
}

/// Retry policy for draining relationship cleanups.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CleanupRetryConfig {
    /// Attempts per cleanup, including the first.
    pub max_attempts: u32,
    /// Delay before the first retry, in milliseconds.
    pub initial_delay_ms: u64,
    /// Upper bound on the delay between retries, in milliseconds.
    pub max_delay_ms: u64,
}

impl Default for CleanupRetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay_ms: 100,
            max_delay_ms: 5_000,
        }
    }
}

/// IAM core configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IamConfig {
    /// Legal organization status transitions.
    pub organization_transitions: TransitionTable,

    /// Retry policy for post-commit relationship cleanup.
    pub cleanup_retry: CleanupRetryConfig,

    /// Lifetime of newly issued personal access tokens, in days.
    pub token_ttl_days: i64,
}

impl Default for IamConfig {
    fn default() -> Self {
        Self {
            organization_transitions: TransitionTable::organization(),
            cleanup_retry: CleanupRetryConfig::default(),
            token_ttl_days: 90,
        }
    }
}

impl IamConfig {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `IAM_ORG_TRANSITIONS`: Organization table, e.g. `RGS:RGS,ACT,DEL;ACT:ACT,SSP,DEL;...`
    /// - `IAM_CLEANUP_MAX_ATTEMPTS`: Cleanup attempts (default: 5)
    /// - `IAM_CLEANUP_INITIAL_DELAY_MS`: First retry delay (default: 100)
    /// - `IAM_CLEANUP_MAX_DELAY_MS`: Maximum retry delay (default: 5000)
    /// - `IAM_TOKEN_TTL_DAYS`: Token lifetime (default: 90)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let default = Self::default();

        let organization_transitions = match lookup("IAM_ORG_TRANSITIONS") {
            Some(text) => TransitionTable::parse("organization", &text).map_err(|e| {
                ConfigError::InvalidValue {
                    key: "IAM_ORG_TRANSITIONS".to_string(),
                    message: e.to_string(),
                }
            })?,
            None => default.organization_transitions,
        };

        let config = Self {
            organization_transitions,
            cleanup_retry: CleanupRetryConfig {
                max_attempts: parse_or(
                    &lookup,
                    "IAM_CLEANUP_MAX_ATTEMPTS",
                    default.cleanup_retry.max_attempts,
                )?,
                initial_delay_ms: parse_or(
                    &lookup,
                    "IAM_CLEANUP_INITIAL_DELAY_MS",
                    default.cleanup_retry.initial_delay_ms,
                )?,
                max_delay_ms: parse_or(
                    &lookup,
                    "IAM_CLEANUP_MAX_DELAY_MS",
                    default.cleanup_retry.max_delay_ms,
                )?,
            },
            token_ttl_days: parse_or(&lookup, "IAM_TOKEN_TTL_DAYS", default.token_ttl_days)?,
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.cleanup_retry.max_attempts == 0 {
            return Err(ConfigError::InvalidValue {
                key: "IAM_CLEANUP_MAX_ATTEMPTS".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if !(1..=MAX_TOKEN_TTL_DAYS).contains(&self.token_ttl_days) {
            return Err(ConfigError::InvalidValue {
                key: "IAM_TOKEN_TTL_DAYS".to_string(),
                message: format!("must be between 1 and {}", MAX_TOKEN_TTL_DAYS),
            });
        }
        Ok(())
    }

    /// Retry policy for the cleanup drain.
    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig {
            max_attempts: self.cleanup_retry.max_attempts,
            initial_delay: Duration::from_millis(self.cleanup_retry.initial_delay_ms),
            max_delay: Duration::from_millis(self.cleanup_retry.max_delay_ms),
            exponential_base: 2.0,
        }
    }

    /// Lifetime of new tokens, clamped to `1..=MAX_TOKEN_TTL_DAYS` days.
    pub fn token_ttl(&self) -> ChronoDuration {
        ChronoDuration::days(self.token_ttl_days.clamp(1, MAX_TOKEN_TTL_DAYS))
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        }),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use iam_org::Status;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = IamConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, IamConfig::default());
        assert_eq!(config.retry_config().max_attempts, 5);
        assert_eq!(config.token_ttl(), ChronoDuration::days(90));
    }

    #[test]
    fn test_overrides() {
        let config = IamConfig::from_lookup(lookup(&[
            ("IAM_ORG_TRANSITIONS", "RGS:ACT,DEL;ACT:SSP,DEL;SSP:ACT,DEL;DEL:"),
            ("IAM_CLEANUP_MAX_ATTEMPTS", "2"),
            ("IAM_CLEANUP_INITIAL_DELAY_MS", "1"),
            ("IAM_TOKEN_TTL_DAYS", "30"),
        ]))
        .unwrap();

        assert!(config
            .organization_transitions
            .transition(Status::Active, Status::Active)
            .is_err());
        assert_eq!(config.cleanup_retry.max_attempts, 2);
        assert_eq!(config.retry_config().initial_delay, Duration::from_millis(1));
        assert_eq!(config.token_ttl_days, 30);
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let err = IamConfig::from_lookup(lookup(&[("IAM_CLEANUP_MAX_ATTEMPTS", "many")]))
            .unwrap_err();
        assert!(err.to_string().contains("IAM_CLEANUP_MAX_ATTEMPTS"));

        assert!(IamConfig::from_lookup(lookup(&[("IAM_ORG_TRANSITIONS", "DEL:ACT")])).is_err());
        assert!(IamConfig::from_lookup(lookup(&[("IAM_CLEANUP_MAX_ATTEMPTS", "0")])).is_err());
        assert!(IamConfig::from_lookup(lookup(&[("IAM_TOKEN_TTL_DAYS", "-1")])).is_err());
    }

    #[test]
    fn test_token_ttl_is_bounded() {
        let err = IamConfig::from_lookup(lookup(&[("IAM_TOKEN_TTL_DAYS", "9000000000000")]))
            .unwrap_err();
        assert!(err.to_string().contains("IAM_TOKEN_TTL_DAYS"));
        assert!(IamConfig::from_lookup(lookup(&[("IAM_TOKEN_TTL_DAYS", "3651")])).is_err());

        let config = IamConfig::from_lookup(lookup(&[("IAM_TOKEN_TTL_DAYS", "3650")])).unwrap();
        assert_eq!(config.token_ttl(), ChronoDuration::days(MAX_TOKEN_TTL_DAYS));

        let unchecked = IamConfig {
            token_ttl_days: i64::MAX,
            ..IamConfig::default()
        };
        assert_eq!(unchecked.token_ttl(), ChronoDuration::days(MAX_TOKEN_TTL_DAYS));
    }

    #[test]
    fn test_serde_round_trip() {
        let json = serde_json::to_string(&IamConfig::default()).unwrap();
        let parsed: IamConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, IamConfig::default());
    }
}
