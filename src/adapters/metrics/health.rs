//! Health State - Liveness and Readiness Inputs
//!
//! Shared flags the poll loop updates and the `/ready` route reads.
//! Ready means the loop is running and has committed at least once.

use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};

use chrono::{DateTime, Utc};

/// Shared health state polled by the readiness route.
#[derive(Debug, Default)]
pub struct HealthState {
    /// Whether the poll loop is running.
    poller_running: AtomicBool,
    /// Unix ms of the last successful commit (0 = never).
    last_publish_ms: AtomicI64,
}

impl HealthState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_poller_running(&self, running: bool) {
        self.poller_running.store(running, Ordering::Relaxed);
    }

    pub fn poller_running(&self) -> bool {
        self.poller_running.load(Ordering::Relaxed)
    }

    pub fn record_publish(&self, at: DateTime<Utc>) {
        self.last_publish_ms.store(at.timestamp_millis(), Ordering::Relaxed);
    }

    /// Time of the last successful commit, if any.
    pub fn last_publish(&self) -> Option<DateTime<Utc>> {
        match self.last_publish_ms.load(Ordering::Relaxed) {
            0 => None,
            ms => DateTime::from_timestamp_millis(ms),
        }
    }

    /// Check if the system has something fresh to serve.
    pub fn is_ready(&self) -> bool {
        self.poller_running() && self.last_publish().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ready_requires_running_and_published() {
        let health = HealthState::new();
        assert!(!health.is_ready());

        health.set_poller_running(true);
        assert!(!health.is_ready());

        health.record_publish(Utc::now());
        assert!(health.is_ready());

        health.set_poller_running(false);
        assert!(!health.is_ready());
    }
}
