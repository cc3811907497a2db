//! Client configuration and the reconnection policy.

use std::time::Duration;

/// Default session server endpoint.
pub const DEFAULT_URL: &str = "ws://127.0.0.1:3000/ws";

// ---------------------------------------------------------------------------
// ReconnectPolicy
// ---------------------------------------------------------------------------

/// Bounded exponential backoff for unexpected disconnects.
///
/// After the `n`th consecutive failure (counting from 0) the next attempt
/// waits `min(base_delay * 2^n, max_delay)`. Once `max_attempts`
/// reconnects have failed the client gives up and resets.
///
/// ```text
/// attempt:  1     2     3     4      5      (give up)
/// delay:    1s    2s    4s    8s     16s
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Reconnects tried before giving up. Default: 5.
    pub max_attempts: u32,
    /// Delay before the first reconnect. Default: 1 second.
    pub base_delay: Duration,
    /// Ceiling on any single delay. Default: 30 seconds.
    pub max_delay: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl ReconnectPolicy {
    /// Delay before the reconnect that follows `attempts` failures.
    pub fn delay_for(&self, attempts: u32) -> Duration {
        let factor = 1u32.checked_shl(attempts).unwrap_or(u32::MAX);
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    /// Whether another reconnect is allowed after `attempts` failures.
    pub fn allows(&self, attempts: u32) -> bool {
        attempts < self.max_attempts
    }
}

// ---------------------------------------------------------------------------
// ClientConfig
// ---------------------------------------------------------------------------

/// Configuration for a [`SessionClient`](crate::SessionClient) and its
/// driver.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// WebSocket endpoint of the session server.
    pub url: String,

    /// Character name attached to every outbound message, as supplied by
    /// the identity provider. `None` sends messages as the bare user.
    pub character_name: Option<String>,

    /// Reconnection backoff.
    pub reconnect: ReconnectPolicy,

    /// Capacity of the driver's broadcast channel of client events. Slow
    /// subscribers that fall further behind miss events.
    pub event_capacity: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_URL.to_owned(),
            character_name: None,
            reconnect: ReconnectPolicy::default(),
            event_capacity: 256,
        }
    }
}

impl ClientConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    pub fn with_character_name(mut self, name: impl Into<String>) -> Self {
        self.character_name = Some(name.into());
        self
    }

    pub fn with_reconnect(mut self, policy: ReconnectPolicy) -> Self {
        self.reconnect = policy;
        self
    }

    /// Sets the event channel capacity (clamped to at least 1).
    pub fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity.max(1);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy_delays_double_from_one_second() {
        let policy = ReconnectPolicy::default();
        let delays: Vec<u64> = (0..5)
            .map(|n| policy.delay_for(n).as_millis() as u64)
            .collect();
        assert_eq!(delays, vec![1000, 2000, 4000, 8000, 16000]);
    }

    #[test]
    fn test_delay_is_capped_at_max() {
        let policy = ReconnectPolicy::default();
        assert_eq!(policy.delay_for(5), Duration::from_secs(30));
        assert_eq!(policy.delay_for(40), Duration::from_secs(30));
    }

    #[test]
    fn test_allows_stops_at_max_attempts() {
        let policy = ReconnectPolicy::default();
        assert!(policy.allows(4));
        assert!(!policy.allows(5));
    }

    #[test]
    fn test_client_config_defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.url, DEFAULT_URL);
        assert_eq!(config.character_name, None);
        assert_eq!(config.reconnect, ReconnectPolicy::default());
    }

    #[test]
    fn test_client_config_builder_methods() {
        let config = ClientConfig::new("ws://example/ws")
            .with_character_name("Mara")
            .with_event_capacity(0);
        assert_eq!(config.url, "ws://example/ws");
        assert_eq!(config.character_name.as_deref(), Some("Mara"));
        assert_eq!(config.event_capacity, 1);
    }
}
