//! Per-campaign runtime configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use super::error::RuntimeError;

/// Retry policy applied to failed operations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RetryPolicy {
    /// Retries allowed after the first attempt
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Delay before the first retry, doubled for each further retry
    #[serde(default = "default_base_backoff_ms")]
    pub base_backoff_ms: u64,

    /// Upper bound on any single retry delay
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

fn default_max_retries() -> u32 {
    3
}

fn default_base_backoff_ms() -> u64 {
    1_000
}

fn default_max_backoff_ms() -> u64 {
    3_600_000 // 1 hour
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            base_backoff_ms: default_base_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
        }
    }
}

impl RetryPolicy {
    pub fn max_backoff(&self) -> Duration {
        Duration::from_millis(self.max_backoff_ms)
    }
}

/// Candidate-source thresholds consulted by placement handlers
///
/// The scheduler never reads these; they ride along so handlers see the
/// owning campaign's values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct QualityThresholds {
    #[serde(default = "default_min_domain_authority")]
    pub min_domain_authority: u32,

    #[serde(default = "default_min_quality_score")]
    pub min_quality_score: u32,

    #[serde(default = "default_max_spam_score")]
    pub max_spam_score: u32,
}

fn default_min_domain_authority() -> u32 {
    30
}

fn default_min_quality_score() -> u32 {
    60
}

fn default_max_spam_score() -> u32 {
    20
}

impl Default for QualityThresholds {
    fn default() -> Self {
        Self {
            min_domain_authority: default_min_domain_authority(),
            min_quality_score: default_min_quality_score(),
            max_spam_score: default_max_spam_score(),
        }
    }
}

/// Optional runtime behaviors
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct FeatureFlags {
    /// Queue a verify operation after every successful placement
    #[serde(default)]
    pub auto_verify: bool,

    /// Send lifecycle and operation events to the notification collaborator
    #[serde(default = "default_realtime_events")]
    pub realtime_events: bool,
}

fn default_realtime_events() -> bool {
    true
}

impl Default for FeatureFlags {
    fn default() -> Self {
        Self {
            auto_verify: false,
            realtime_events: default_realtime_events(),
        }
    }
}

/// Tunables for one campaign's runtime
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RuntimeConfig {
    /// Max operations executing at once
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Scheduler loop period
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,

    /// How long `stop` waits for in-flight operations
    #[serde(default = "default_drain_timeout_ms")]
    pub drain_timeout_ms: u64,

    #[serde(default)]
    pub retry: RetryPolicy,

    #[serde(default)]
    pub thresholds: QualityThresholds,

    /// Snapshots kept in the metrics ring buffer (also caps finished history)
    #[serde(default = "default_metrics_history_limit")]
    pub metrics_history_limit: usize,

    /// Look-back window for throughput and success rate
    #[serde(default = "default_metrics_window_ms")]
    pub metrics_window_ms: u64,

    #[serde(default)]
    pub features: FeatureFlags,
}

fn default_batch_size() -> usize {
    5
}

fn default_tick_interval_ms() -> u64 {
    30_000
}

fn default_drain_timeout_ms() -> u64 {
    30_000
}

fn default_metrics_history_limit() -> usize {
    100
}

fn default_metrics_window_ms() -> u64 {
    60_000
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            tick_interval_ms: default_tick_interval_ms(),
            drain_timeout_ms: default_drain_timeout_ms(),
            retry: RetryPolicy::default(),
            thresholds: QualityThresholds::default(),
            metrics_history_limit: default_metrics_history_limit(),
            metrics_window_ms: default_metrics_window_ms(),
            features: FeatureFlags::default(),
        }
    }
}

impl RuntimeConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn drain_timeout(&self) -> Duration {
        Duration::from_millis(self.drain_timeout_ms)
    }

    pub fn metrics_window(&self) -> Duration {
        Duration::from_millis(self.metrics_window_ms)
    }

    /// Copy of this config with every `Some` override applied
    pub fn merged(&self, overrides: &RuntimeConfigOverrides) -> Self {
        debug!(?overrides, "RuntimeConfig::merged: called");
        let mut config = self.clone();
        if let Some(batch_size) = overrides.batch_size {
            config.batch_size = batch_size;
        }
        if let Some(tick_interval_ms) = overrides.tick_interval_ms {
            config.tick_interval_ms = tick_interval_ms;
        }
        if let Some(drain_timeout_ms) = overrides.drain_timeout_ms {
            config.drain_timeout_ms = drain_timeout_ms;
        }
        if let Some(max_retries) = overrides.max_retries {
            config.retry.max_retries = max_retries;
        }
        if let Some(base_backoff_ms) = overrides.base_backoff_ms {
            config.retry.base_backoff_ms = base_backoff_ms;
        }
        if let Some(max_backoff_ms) = overrides.max_backoff_ms {
            config.retry.max_backoff_ms = max_backoff_ms;
        }
        if let Some(thresholds) = &overrides.thresholds {
            config.thresholds = thresholds.clone();
        }
        if let Some(features) = &overrides.features {
            config.features = features.clone();
        }
        config
    }

    /// Reject values the scheduler cannot run with
    pub fn validate(&self) -> Result<(), RuntimeError> {
        debug!("RuntimeConfig::validate: called");
        if self.batch_size == 0 {
            return Err(RuntimeError::InvalidConfig("batch-size must be at least 1".to_string()));
        }
        if self.tick_interval_ms == 0 {
            return Err(RuntimeError::InvalidConfig(
                "tick-interval-ms must be greater than zero".to_string(),
            ));
        }
        if self.metrics_history_limit == 0 {
            return Err(RuntimeError::InvalidConfig(
                "metrics-history-limit must be at least 1".to_string(),
            ));
        }
        if self.metrics_window_ms == 0 {
            return Err(RuntimeError::InvalidConfig(
                "metrics-window-ms must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Caller overrides applied on top of the process defaults at `start`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RuntimeConfigOverrides {
    pub batch_size: Option<usize>,
    pub tick_interval_ms: Option<u64>,
    pub drain_timeout_ms: Option<u64>,
    pub max_retries: Option<u32>,
    pub base_backoff_ms: Option<u64>,
    pub max_backoff_ms: Option<u64>,
    pub thresholds: Option<QualityThresholds>,
    pub features: Option<FeatureFlags>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RuntimeConfig::default();
        assert_eq!(config.batch_size, 5);
        assert_eq!(config.tick_interval(), Duration::from_secs(30));
        assert_eq!(config.drain_timeout(), Duration::from_secs(30));
        assert_eq!(config.retry.max_retries, 3);
        assert_eq!(config.metrics_history_limit, 100);
        assert_eq!(config.metrics_window(), Duration::from_secs(60));
        assert!(config.features.realtime_events);
        assert!(!config.features.auto_verify);
    }

    #[test]
    fn test_merge_overrides() {
        let overrides = RuntimeConfigOverrides {
            batch_size: Some(2),
            base_backoff_ms: Some(250),
            features: Some(FeatureFlags {
                auto_verify: true,
                realtime_events: false,
            }),
            ..Default::default()
        };

        let config = RuntimeConfig::default().merged(&overrides);
        assert_eq!(config.batch_size, 2);
        assert_eq!(config.retry.base_backoff_ms, 250);
        assert_eq!(config.retry.max_retries, 3);
        assert_eq!(config.tick_interval_ms, 30_000);
        assert!(config.features.auto_verify);
        assert!(!config.features.realtime_events);
    }

    #[test]
    fn test_empty_overrides_are_identity() {
        let defaults = RuntimeConfig::default();
        assert_eq!(defaults.merged(&RuntimeConfigOverrides::default()), defaults);
    }

    #[test]
    fn test_validate_rejects_zero_batch() {
        let config = RuntimeConfig {
            batch_size: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(RuntimeError::InvalidConfig(_))));
        assert!(RuntimeConfig::default().validate().is_ok());
    }

    #[test]
    fn test_deserialize_partial_yaml() {
        let yaml = r#"
batch-size: 8
retry:
  max-retries: 1
thresholds:
  min-domain-authority: 50
"#;
        let config: RuntimeConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.batch_size, 8);
        assert_eq!(config.retry.max_retries, 1);
        assert_eq!(config.retry.base_backoff_ms, 1_000);
        assert_eq!(config.thresholds.min_domain_authority, 50);
        assert_eq!(config.thresholds.min_quality_score, 60);
        assert_eq!(config.tick_interval_ms, 30_000);
    }
}
