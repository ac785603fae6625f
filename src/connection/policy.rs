//! Reconnect policy and backoff schedule.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default number of reconnect attempts before giving up.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Default base interval between reconnect attempts.
pub const DEFAULT_BASE_INTERVAL: Duration = Duration::from_millis(1000);

/// Static reconnect configuration for one [`super::Connection`].
///
/// The delay before attempt `k` (0-indexed) is `base_interval × 2^k`. There
/// is no jitter and no ceiling other than `max_attempts`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconnectPolicy {
    /// Master switch for automatic reconnects.
    pub enabled: bool,
    /// Attempts allowed after a drop before the connection stays down.
    pub max_attempts: u32,
    /// Delay before the first attempt; doubles on each later one.
    #[serde(with = "millis")]
    pub base_interval: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_interval: DEFAULT_BASE_INTERVAL,
        }
    }
}

impl ReconnectPolicy {
    /// A policy that never reconnects on its own.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    /// Returns the delay to wait before attempt `attempt` (0-indexed).
    ///
    /// Saturates at `u64::MAX` milliseconds instead of overflowing.
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let base_ms = u64::try_from(self.base_interval.as_millis()).unwrap_or(u64::MAX);
        Duration::from_millis(base_ms.saturating_mul(2u64.saturating_pow(attempt)))
    }

    /// Returns `true` if another attempt may be scheduled after `attempts`
    /// attempts have already been made.
    #[must_use]
    pub const fn allows(&self, attempts: u32) -> bool {
        self.enabled && attempts < self.max_attempts
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub(super) fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(value.as_millis()).unwrap_or(u64::MAX))
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
