//! Poller configuration that downstream crates can serialize/deserialize.

use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollerConfig {
    /// Sampling period in milliseconds. Zero or negative disables the internal
    /// timer; the owner must then call `poll()` from its own heartbeat.
    pub poll_interval_ms: i64,

    /// Upper bound on how long `stop()` waits for an in-flight sampling cycle.
    pub shutdown_timeout_ms: u64,

    /// Name given to the internal timer thread.
    pub thread_name: String,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 0,
            shutdown_timeout_ms: 10_000,
            thread_name: "executor-metrics-poller".to_string(),
        }
    }
}

impl PollerConfig {
    /// Create a config from environment variables, falling back to defaults.
    ///
    /// Environment variables:
    /// - `TASKPEAK_POLL_INTERVAL_MS`: sampling period (<= 0 means heartbeat-driven)
    /// - `TASKPEAK_SHUTDOWN_TIMEOUT_MS`: bounded wait in `stop()`
    /// - `TASKPEAK_POLLER_THREAD_NAME`: timer thread name
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Ok(s) = std::env::var("TASKPEAK_POLL_INTERVAL_MS") {
            if let Ok(v) = s.trim().parse::<i64>() {
                cfg.poll_interval_ms = v;
            }
        }

        if let Ok(s) = std::env::var("TASKPEAK_SHUTDOWN_TIMEOUT_MS") {
            if let Ok(v) = s.trim().parse::<u64>() {
                cfg.shutdown_timeout_ms = v;
            }
        }

        if let Ok(s) = std::env::var("TASKPEAK_POLLER_THREAD_NAME") {
            if !s.trim().is_empty() {
                cfg.thread_name = s;
            }
        }

        cfg
    }

    pub fn with_poll_interval_ms(mut self, ms: i64) -> Self {
        self.poll_interval_ms = ms;
        self
    }

    /// `Some(period)` only when the internal timer should run.
    pub fn poll_interval(&self) -> Option<Duration> {
        if self.poll_interval_ms > 0 {
            Some(Duration::from_millis(self.poll_interval_ms as u64))
        } else {
            None
        }
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_positive_interval_disables_timer() {
        assert_eq!(PollerConfig::default().poll_interval(), None);
        let cfg = PollerConfig::default().with_poll_interval_ms(-5);
        assert_eq!(cfg.poll_interval(), None);
        let cfg = PollerConfig::default().with_poll_interval_ms(250);
        assert_eq!(cfg.poll_interval(), Some(Duration::from_millis(250)));
    }

    #[test]
    fn default_shutdown_wait_is_ten_seconds() {
        assert_eq!(PollerConfig::default().shutdown_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn config_roundtrips_through_json() {
        let cfg = PollerConfig::default().with_poll_interval_ms(100);
        let json = serde_json::to_string(&cfg).unwrap();
        let back: PollerConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.poll_interval_ms, 100);
        assert_eq!(back.thread_name, cfg.thread_name);
    }
}
