//! Worker configuration.

use std::env;

use crate::domain::{CirrusError, MAX_NON_REMOTE_PAYLOAD_SIZE, Result};
use crate::retry::RetryPolicy;

/// Longest accepted retention of an offloaded envelope.
pub const MAX_REMOTE_EXPIRY_DAYS: i64 = 3650;

/// Settings shared by every worker of a deployment.
#[derive(Debug, Clone, PartialEq)]
pub struct CoreConfig {
    /// Bucket for offloaded envelopes when the message names none.
    pub system_bucket: Option<String>,
    /// Serialized size (bytes) at which envelopes are offloaded (default: 10_000)
    pub offload_threshold: usize,
    /// Days an offloaded envelope is kept (default: 7)
    pub remote_expiry_days: i64,
    /// Page size for execution history lookups (default: 40)
    pub history_max_results: usize,
    /// Backoff for throttled history lookups (default: 1s ×1.5 up to 10s, 10 retries)
    pub history_retry: RetryPolicy,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            system_bucket: None,
            offload_threshold: MAX_NON_REMOTE_PAYLOAD_SIZE,
            remote_expiry_days: 7,
            history_max_results: 40,
            history_retry: RetryPolicy::default(),
        }
    }
}

impl CoreConfig {
    /// Load configuration from environment variables.
    ///
    /// # Optional Environment Variables
    /// - `CIRRUS_SYSTEM_BUCKET` - Fallback bucket for offloaded envelopes
    /// - `CIRRUS_OFFLOAD_THRESHOLD` - Offload threshold in bytes (default: 10000)
    /// - `CIRRUS_REMOTE_EXPIRY_DAYS` - Expiry of offloaded envelopes, 1 to 3650 (default: 7)
    /// - `CIRRUS_HISTORY_MAX_RESULTS` - History page size (default: 40)
    /// - `CIRRUS_HISTORY_MAX_RETRIES` - Retries of a throttled history lookup (default: 10)
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Same as [`CoreConfig::from_env`] with an explicit variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();

        let system_bucket = lookup("CIRRUS_SYSTEM_BUCKET").filter(|b| !b.is_empty());

        let offload_threshold = parse_or(
            &lookup,
            "CIRRUS_OFFLOAD_THRESHOLD",
            defaults.offload_threshold,
        )?;
        let remote_expiry_days = parse_or(
            &lookup,
            "CIRRUS_REMOTE_EXPIRY_DAYS",
            defaults.remote_expiry_days,
        )?;
        if !(1..=MAX_REMOTE_EXPIRY_DAYS).contains(&remote_expiry_days) {
            return Err(CirrusError::Configuration(format!(
                "CIRRUS_REMOTE_EXPIRY_DAYS must be between 1 and {MAX_REMOTE_EXPIRY_DAYS}, got {remote_expiry_days}"
            )));
        }
        let history_max_results = parse_or(
            &lookup,
            "CIRRUS_HISTORY_MAX_RESULTS",
            defaults.history_max_results,
        )?;
        let history_retry = RetryPolicy {
            max_retries: parse_or(
                &lookup,
                "CIRRUS_HISTORY_MAX_RETRIES",
                defaults.history_retry.max_retries,
            )?,
            ..defaults.history_retry
        };

        Ok(Self {
            system_bucket,
            offload_threshold,
            remote_expiry_days,
            history_max_results,
            history_retry,
        })
    }

    pub fn with_system_bucket(mut self, bucket: impl Into<String>) -> Self {
        self.system_bucket = Some(bucket.into());
        self
    }
}

fn parse_or<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
    default: T,
) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    match lookup(name) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| CirrusError::Configuration(format!("invalid {name}: {e}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::collections::HashMap;

    fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn defaults_when_nothing_is_set() {
        let config = CoreConfig::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(config, CoreConfig::default());
        assert_eq!(config.offload_threshold, 10_000);
    }

    #[test]
    fn reads_overrides() {
        let config = CoreConfig::from_lookup(lookup_from(&[
            ("CIRRUS_SYSTEM_BUCKET", "internal"),
            ("CIRRUS_OFFLOAD_THRESHOLD", "2048"),
            ("CIRRUS_HISTORY_MAX_RESULTS", "10"),
            ("CIRRUS_HISTORY_MAX_RETRIES", "3"),
        ]))
        .unwrap();
        assert_eq!(config.system_bucket.as_deref(), Some("internal"));
        assert_eq!(config.offload_threshold, 2048);
        assert_eq!(config.history_max_results, 10);
        assert_eq!(config.remote_expiry_days, 7);
        assert_eq!(config.history_retry.max_retries, 3);
        assert_eq!(config.history_retry.multiplier, 1.5);
    }

    #[rstest]
    #[case("0")]
    #[case("-1")]
    #[case("9223372036854775807")]
    fn rejects_out_of_range_expiry(#[case] days: &str) {
        let err = CoreConfig::from_lookup(lookup_from(&[("CIRRUS_REMOTE_EXPIRY_DAYS", days)]))
            .unwrap_err();
        assert!(matches!(err, CirrusError::Configuration(_)));
        assert!(err.to_string().contains("CIRRUS_REMOTE_EXPIRY_DAYS"));
    }

    #[test]
    fn rejects_garbage_numbers() {
        let err =
            CoreConfig::from_lookup(lookup_from(&[("CIRRUS_OFFLOAD_THRESHOLD", "big")]))
                .unwrap_err();
        assert!(err.to_string().contains("CIRRUS_OFFLOAD_THRESHOLD"));
    }
}
