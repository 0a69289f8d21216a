use crate::policy::{Jitter, Policy};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Retry policy parameters as they appear in a config file section.
///
/// Missing fields take the [`Policy`] defaults (no delay, no jitter, unbounded attempts).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    /// First backoff delay in milliseconds.
    pub min_delay_ms: u64,
    /// Ceiling for the doubling delay in milliseconds; below `min_delay_ms` means `min_delay_ms`.
    pub max_delay_ms: u64,
    /// Maximum number of attempts including the first; 0 retries forever.
    pub max_count: u32,
    /// Jitter magnitude in milliseconds; negative values shorten the delay.
    pub jitter_ms: i64,
}

impl From<PolicyConfig> for Policy {
    fn from(config: PolicyConfig) -> Self {
        let magnitude = Duration::from_millis(config.jitter_ms.unsigned_abs());
        let jitter = match config.jitter_ms {
            0 => Jitter::None,
            ms if ms < 0 => Jitter::Shorten(magnitude),
            _ => Jitter::Lengthen(magnitude),
        };
        Policy::new()
            .with_min_delay(Duration::from_millis(config.min_delay_ms))
            .with_max_delay(Duration::from_millis(config.max_delay_ms))
            .with_max_count(config.max_count)
            .with_jitter(jitter)
    }
}
