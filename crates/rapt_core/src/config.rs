//! Engine configuration.
//!
//! One value object is built by the caller and handed to the engine; nothing
//! is read from process-wide state.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Namespace to work in (`None` = kubeconfig default)
    pub namespace: Option<String>,
    /// Interval between pod readiness polls
    pub poll_interval: Duration,
    /// Pod readiness polls made while a run is being followed
    pub pod_max_attempts: u32,
    /// Pod readiness polls made by `rapt logs`
    pub logs_max_attempts: u32,
    /// Deadline for the whole lifecycle wait (zero = no deadline)
    pub watch_deadline: Duration,
    /// Seconds a finished job is kept before the cluster deletes it
    pub job_ttl_seconds: i32,
    /// How long output may keep draining after the job reaches a terminal state
    pub log_drain_grace: Duration,
    /// Blobs younger than this are never swept
    pub gc_min_age: Duration,
}

impl EngineConfig {
    /// Create a config with default limits
    #[must_use]
    pub fn new() -> Self {
        Self {
            namespace: None,
            poll_interval: Duration::from_secs(1),
            pod_max_attempts: 30,
            logs_max_attempts: 60,
            watch_deadline: Duration::from_secs(300),
            job_ttl_seconds: 300,
            log_drain_grace: Duration::from_secs(5),
            gc_min_age: Duration::from_secs(300),
        }
    }

    /// Set namespace
    #[must_use]
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// Set pod readiness poll interval
    #[must_use]
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Set pod readiness attempts for followed runs
    #[must_use]
    pub fn with_pod_max_attempts(mut self, attempts: u32) -> Self {
        self.pod_max_attempts = attempts;
        self
    }

    /// Set pod readiness attempts for `rapt logs`
    #[must_use]
    pub fn with_logs_max_attempts(mut self, attempts: u32) -> Self {
        self.logs_max_attempts = attempts;
        self
    }

    /// Set watch deadline in seconds (0 = no deadline)
    #[must_use]
    pub fn with_timeout_secs(mut self, seconds: u64) -> Self {
        self.watch_deadline = Duration::from_secs(seconds);
        self
    }

    /// Set watch deadline
    #[must_use]
    pub fn with_watch_deadline(mut self, deadline: Duration) -> Self {
        self.watch_deadline = deadline;
        self
    }

    /// Set job TTL after completion
    #[must_use]
    pub fn with_job_ttl(mut self, seconds: i32) -> Self {
        self.job_ttl_seconds = seconds;
        self
    }

    /// Set log drain grace period
    #[must_use]
    pub fn with_log_drain_grace(mut self, grace: Duration) -> Self {
        self.log_drain_grace = grace;
        self
    }

    /// Set minimum blob age for sweeps
    #[must_use]
    pub fn with_gc_min_age(mut self, age: Duration) -> Self {
        self.gc_min_age = age;
        self
    }

    /// Effective deadline, `None` when waiting is unbounded
    #[must_use]
    pub fn deadline(&self) -> Option<Duration> {
        if self.watch_deadline.is_zero() {
            None
        } else {
            Some(self.watch_deadline)
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new()
    }
}
