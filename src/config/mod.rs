use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub mod duration_serde;

/// Policy configuration for the daily digest job.
///
/// Everything here is fixed policy with sensible defaults; an empty TOML
/// table yields the reference behavior. Durations accept humantime
/// strings ("2500ms", "1h", "2days") or plain seconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DigestJobConfig {
    /// Feature flag gating whether the job runs at all.
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Name of the cluster-wide throttling lock.
    #[serde(default = "default_lock_name")]
    pub lock_name: String,

    /// Lock time-to-live. Matches the run interval so a stuck run cannot
    /// block more than one subsequent invocation beyond its TTL.
    #[serde(default = "default_lock_ttl", with = "duration_serde::duration")]
    pub lock_ttl: Duration,

    /// Fixed interval between scheduled runs.
    #[serde(default = "default_run_interval", with = "duration_serde::duration")]
    pub run_interval: Duration,

    /// Delay before the first scheduled run after startup.
    #[serde(default = "default_initial_delay", with = "duration_serde::duration")]
    pub initial_delay: Duration,

    /// Passed through to the repository's due-projects query; the
    /// repository derives its due threshold from this.
    #[serde(default = "default_max_age_hours")]
    pub max_age_hours: i64,

    /// Windows whose start predates now minus this threshold are skipped
    /// without processing.
    #[serde(default = "default_stale_after", with = "duration_serde::duration")]
    pub stale_after: Duration,

    /// Backpressure sleep after each sent digest (a send just triggered a
    /// downstream aggregation query).
    #[serde(default = "default_send_backoff", with = "duration_serde::duration")]
    pub send_backoff: Duration,

    /// Backpressure sleep after each page's batch pointer advance.
    #[serde(default = "default_advance_backoff", with = "duration_serde::duration")]
    pub advance_backoff: Duration,
}

fn default_enabled() -> bool {
    true
}
fn default_lock_name() -> String {
    "daily-digest".to_string()
}
fn default_lock_ttl() -> Duration {
    Duration::from_secs(3600)
}
fn default_run_interval() -> Duration {
    Duration::from_secs(3600)
}
fn default_initial_delay() -> Duration {
    Duration::from_secs(60)
}
fn default_max_age_hours() -> i64 {
    24
}
fn default_stale_after() -> Duration {
    Duration::from_secs(2 * 86400)
}
fn default_send_backoff() -> Duration {
    Duration::from_millis(2500)
}
fn default_advance_backoff() -> Duration {
    Duration::from_secs(1)
}

impl Default for DigestJobConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            lock_name: default_lock_name(),
            lock_ttl: default_lock_ttl(),
            run_interval: default_run_interval(),
            initial_delay: default_initial_delay(),
            max_age_hours: default_max_age_hours(),
            stale_after: default_stale_after(),
            send_backoff: default_send_backoff(),
            advance_backoff: default_advance_backoff(),
        }
    }
}

impl DigestJobConfig {
    /// Load configuration from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_toml(&contents)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml(contents: &str) -> Result<Self> {
        toml::from_str(contents).context("Failed to parse digest job configuration")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_yields_reference_defaults() {
        let config = DigestJobConfig::from_toml("").unwrap();

        assert!(config.enabled);
        assert_eq!(config.lock_name, "daily-digest");
        assert_eq!(config.lock_ttl, Duration::from_secs(3600));
        assert_eq!(config.run_interval, Duration::from_secs(3600));
        assert_eq!(config.max_age_hours, 24);
        assert_eq!(config.stale_after, Duration::from_secs(172_800));
        assert_eq!(config.send_backoff, Duration::from_millis(2500));
        assert_eq!(config.advance_backoff, Duration::from_secs(1));
    }

    #[test]
    fn durations_accept_humantime_strings() {
        let config = DigestJobConfig::from_toml(
            r#"
            enabled = false
            lock_ttl = "30m"
            stale_after = "3days"
            send_backoff = "2500ms"
            "#,
        )
        .unwrap();

        assert!(!config.enabled);
        assert_eq!(config.lock_ttl, Duration::from_secs(1800));
        assert_eq!(config.stale_after, Duration::from_secs(3 * 86400));
        assert_eq!(config.send_backoff, Duration::from_millis(2500));
    }

    #[test]
    fn malformed_duration_is_rejected() {
        assert!(DigestJobConfig::from_toml("lock_ttl = \"not-a-duration\"").is_err());
    }
}
