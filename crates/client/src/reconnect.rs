//! Exponential backoff for a caller-driven reconnect loop.
//!
//! The client never reconnects by itself. A [`ReconnectSupervisor`] watches
//! connection events and tells the caller whether, and after how long, to
//! call `connect` again.

use crate::connection::ConnectionEvent;
use serde::{Deserialize, Serialize};
use std::cell::Cell;
use std::time::Duration;

/// Backoff parameters.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconnectPolicy {
    /// Delay before the first retry; doubled on each further retry.
    pub base_delay_ms: u64,
    /// Upper bound on any single delay.
    pub max_delay_ms: u64,
    /// Retries allowed after consecutive failures. Zero disables retrying.
    pub max_retries: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            base_delay_ms: 1000,
            max_delay_ms: 30_000,
            max_retries: 5,
        }
    }
}

impl ReconnectPolicy {
    /// A policy that never retries.
    pub fn disabled() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Delay before retry number `attempt` (zero-based), or `None` once
    /// retries are exhausted.
    pub fn delay_for(&self, attempt: u32) -> Option<Duration> {
        if attempt >= self.max_retries {
            return None;
        }
        let delay = self
            .base_delay_ms
            .saturating_mul(2u64.saturating_pow(attempt))
            .min(self.max_delay_ms);
        Some(Duration::from_millis(delay))
    }
}

/// What the caller should do after a connection event.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReconnectDecision {
    /// Nothing to do.
    Idle,
    /// Call `connect` again after this delay.
    RetryAfter(Duration),
    /// Retries are exhausted.
    GiveUp,
}

/// Counts consecutive failures and applies a [`ReconnectPolicy`].
#[derive(Debug)]
pub struct ReconnectSupervisor {
    policy: ReconnectPolicy,
    failures: Cell<u32>,
}

impl ReconnectSupervisor {
    pub fn new(policy: ReconnectPolicy) -> Self {
        Self {
            policy,
            failures: Cell::new(0),
        }
    }

    /// Feeds one connection event.
    ///
    /// A successful connect resets the failure count, and a disconnect the
    /// caller asked for never triggers a retry.
    pub fn observe(&self, event: &ConnectionEvent) -> ReconnectDecision {
        match event {
            ConnectionEvent::Connected(_) => {
                self.failures.set(0);
                ReconnectDecision::Idle
            }
            ConnectionEvent::Disconnected {
                requested: true, ..
            } => ReconnectDecision::Idle,
            ConnectionEvent::ConnectFailed(_) | ConnectionEvent::Disconnected { .. } => {
                let attempt = self.failures.get();
                self.failures.set(attempt.saturating_add(1));
                match self.policy.delay_for(attempt) {
                    Some(delay) => {
                        tracing::info!(attempt = attempt + 1, delay_ms = delay.as_millis() as u64, "scheduling reconnect");
                        ReconnectDecision::RetryAfter(delay)
                    }
                    None => {
                        tracing::warn!(max_retries = self.policy.max_retries, "reconnect attempts exhausted");
                        ReconnectDecision::GiveUp
                    }
                }
            }
        }
    }

    /// Consecutive failures since the last successful connect.
    pub fn failures(&self) -> u32 {
        self.failures.get()
    }

    pub fn reset(&self) {
        self.failures.set(0);
    }

    pub fn policy(&self) -> &ReconnectPolicy {
        &self.policy
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::Session;
    use goban_core::{Error, Identity, IDENTITY_LEN};

    fn dropped() -> ConnectionEvent {
        ConnectionEvent::Disconnected {
            session: Some(1),
            reason: None,
            requested: false,
        }
    }

    #[test]
    fn test_delay_doubles_and_caps() {
        let policy = ReconnectPolicy {
            base_delay_ms: 500,
            max_delay_ms: 3000,
            max_retries: 5,
        };
        assert_eq!(policy.delay_for(0), Some(Duration::from_millis(500)));
        assert_eq!(policy.delay_for(1), Some(Duration::from_millis(1000)));
        assert_eq!(policy.delay_for(2), Some(Duration::from_millis(2000)));
        assert_eq!(policy.delay_for(3), Some(Duration::from_millis(3000)));
        assert_eq!(policy.delay_for(4), Some(Duration::from_millis(3000)));
        assert_eq!(policy.delay_for(5), None);
    }

    #[test]
    fn test_delay_does_not_overflow() {
        let policy = ReconnectPolicy {
            base_delay_ms: u64::MAX / 2,
            max_delay_ms: u64::MAX,
            max_retries: u32::MAX,
        };
        assert_eq!(policy.delay_for(100), Some(Duration::from_millis(u64::MAX)));
    }

    #[test]
    fn test_disabled_policy() {
        assert_eq!(ReconnectPolicy::disabled().delay_for(0), None);
    }

    #[test]
    fn test_supervisor_counts_and_resets() {
        let supervisor = ReconnectSupervisor::new(ReconnectPolicy {
            base_delay_ms: 100,
            max_delay_ms: 1000,
            max_retries: 2,
        });

        assert_eq!(
            supervisor.observe(&dropped()),
            ReconnectDecision::RetryAfter(Duration::from_millis(100))
        );
        assert_eq!(
            supervisor.observe(&ConnectionEvent::ConnectFailed(Error::connection("refused"))),
            ReconnectDecision::RetryAfter(Duration::from_millis(200))
        );
        assert_eq!(
            supervisor.observe(&ConnectionEvent::ConnectFailed(Error::connection("refused"))),
            ReconnectDecision::GiveUp
        );
        assert_eq!(supervisor.failures(), 3);

        let session = Session {
            id: 2,
            identity: Identity::new([1; IDENTITY_LEN]),
            token: "t".into(),
            uri: "ws://localhost:3000".into(),
            module_name: "quickstart-chat".into(),
        };
        assert_eq!(
            supervisor.observe(&ConnectionEvent::Connected(session)),
            ReconnectDecision::Idle
        );
        assert_eq!(supervisor.failures(), 0);
    }

    #[test]
    fn test_requested_disconnect_is_idle() {
        let supervisor = ReconnectSupervisor::new(ReconnectPolicy::default());
        let event = ConnectionEvent::Disconnected {
            session: Some(1),
            reason: None,
            requested: true,
        };
        assert_eq!(supervisor.observe(&event), ReconnectDecision::Idle);
        assert_eq!(supervisor.failures(), 0);
    }
}
