//! Recovery pacing after failed turns
//!
//! The session keeps re-arming itself after backend failures, but the delay
//! between visible error states doubles per consecutive failure so a
//! persistently failing backend cannot produce a hot retry loop. A successful
//! turn resets the clock.

use std::time::Duration;

/// Pacing policy for post-failure recovery
#[derive(Debug, Clone)]
pub struct RecoveryPolicy {
    /// Delay before the first retry (doubles per consecutive failure)
    pub base_delay: Duration,
    /// Maximum delay cap
    pub max_delay: Duration,
}

impl Default for RecoveryPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RecoveryPolicy {
    /// Delay before re-arming after the nth consecutive failure (1-based)
    #[must_use]
    pub fn delay_for_attempt(&self, consecutive_failures: u32) -> Duration {
        let exponent = consecutive_failures.saturating_sub(1);
        self.base_delay
            .saturating_mul(2_u32.saturating_pow(exponent))
            .min(self.max_delay)
    }
}
