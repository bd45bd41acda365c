//! Orchestration settings stored in profiles
//!
//! Polling cadence, timeout budgets, retry behaviour and cleanup policy.
//! Every field has a serde default so partial tables are valid.

use serde::{Deserialize, Deserializer, Serialize, de};
use std::time::Duration;

use crate::orchestrator::PollConfig;
use crate::workflow::FailurePolicy;

/// Settings for how workflows submit, poll and clean up
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrchestrationConfig {
    /// Seconds between operation status queries; at least 1
    #[serde(
        default = "default_poll_interval",
        deserialize_with = "deserialize_poll_interval"
    )]
    pub poll_interval_secs: u64,

    /// Budget in seconds for a single operation; unset waits indefinitely
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,

    /// Budget in seconds for an instance group to settle after a resize
    #[serde(default = "default_settle_timeout")]
    pub settle_timeout_secs: u64,

    /// Delete temporary snapshots and disks once they are no longer needed
    #[serde(default = "default_true")]
    pub cleanup_temporary_resources: bool,

    /// What to do with temporaries when a workflow fails
    #[serde(default)]
    pub on_failure: FailurePolicy,

    /// Suffix appended to names of temporary resources
    #[serde(default = "default_temporary_suffix")]
    pub temporary_suffix: String,

    /// Retry configuration for transient API failures
    #[serde(default)]
    pub retry: RetryConfig,
}

impl Default for OrchestrationConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval(),
            timeout_secs: None,
            settle_timeout_secs: default_settle_timeout(),
            cleanup_temporary_resources: true,
            on_failure: FailurePolicy::default(),
            temporary_suffix: default_temporary_suffix(),
            retry: RetryConfig::default(),
        }
    }
}

impl OrchestrationConfig {
    /// Poll settings for operation completion
    pub fn operation_poll(&self) -> PollConfig {
        PollConfig {
            interval: Duration::from_secs(self.poll_interval_secs),
            timeout: self.timeout_secs.map(Duration::from_secs),
        }
    }

    /// Poll settings for waiting on a resized group
    pub fn settle_poll(&self) -> PollConfig {
        PollConfig {
            interval: Duration::from_secs(self.poll_interval_secs),
            timeout: Some(Duration::from_secs(self.settle_timeout_secs)),
        }
    }
}

/// Retry configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Whether retry is enabled
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Maximum number of attempts per API call
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Initial backoff in milliseconds
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,

    /// Maximum backoff in milliseconds
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_attempts: 3,
            backoff_ms: 100,
            max_backoff_ms: 5000,
        }
    }
}

// Default value functions for serde
fn default_true() -> bool {
    true
}

fn default_poll_interval() -> u64 {
    1
}

fn deserialize_poll_interval<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    match u64::deserialize(deserializer)? {
        0 => Err(de::Error::custom("poll_interval_secs must be at least 1")),
        secs => Ok(secs),
    }
}

fn default_settle_timeout() -> u64 {
    100
}

fn default_temporary_suffix() -> String {
    "tmp".to_string()
}

fn default_max_attempts() -> u32 {
    3
}

fn default_backoff_ms() -> u64 {
    100
}

fn default_max_backoff_ms() -> u64 {
    5000
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = OrchestrationConfig::default();
        assert_eq!(config.poll_interval_secs, 1);
        assert_eq!(config.timeout_secs, None);
        assert!(config.cleanup_temporary_resources);
        assert_eq!(config.on_failure, FailurePolicy::Halt);
        assert!(config.retry.enabled);
        assert_eq!(config.retry.max_attempts, 3);
    }

    #[test]
    fn test_partial_table_fills_defaults() {
        let config: OrchestrationConfig = toml::from_str(
            r#"
timeout_secs = 600
on_failure = "delete-temporaries"

[retry]
max_attempts = 5
"#,
        )
        .unwrap();

        assert_eq!(config.poll_interval_secs, 1);
        assert_eq!(config.timeout_secs, Some(600));
        assert_eq!(config.on_failure, FailurePolicy::DeleteTemporaries);
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.retry.backoff_ms, 100);
    }

    #[test]
    fn test_zero_poll_interval_is_rejected() {
        let err = toml::from_str::<OrchestrationConfig>("poll_interval_secs = 0").unwrap_err();
        assert!(err.to_string().contains("at least 1"));

        let config: OrchestrationConfig = toml::from_str("poll_interval_secs = 3").unwrap();
        assert_eq!(config.poll_interval_secs, 3);
    }

    #[test]
    fn test_poll_configs() {
        let config = OrchestrationConfig {
            poll_interval_secs: 2,
            timeout_secs: Some(60),
            settle_timeout_secs: 30,
            ..OrchestrationConfig::default()
        };
        let op = config.operation_poll();
        assert_eq!(op.interval, Duration::from_secs(2));
        assert_eq!(op.timeout, Some(Duration::from_secs(60)));
        assert_eq!(config.settle_poll().timeout, Some(Duration::from_secs(30)));
    }
}
