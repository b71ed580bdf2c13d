//! Retry policy for conflicting updates.
use serde::Deserialize;
use serde::Serialize;

/// Backoff configuration for updates that conflict with concurrent changes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UpdaterBackoff {
    /// Random extra fraction of each delay, to spread competing writers apart.
    #[serde(default = "UpdaterBackoff::default_jitter")]
    pub jitter: f64,

    /// Total number of attempts, including the first one.
    #[serde(default = "UpdaterBackoff::default_max_attempts")]
    pub max_attempts: u16,

    /// Maximum time, in milliseconds, to wait between attempts.
    #[serde(default = "UpdaterBackoff::default_max_delay")]
    pub max_delay: u64,

    /// Delay multiplier applied after every conflict.
    #[serde(default = "UpdaterBackoff::default_multiplier")]
    pub multiplier: u32,

    /// Initial delay, in milliseconds, to wait before the second attempt.
    #[serde(default = "UpdaterBackoff::default_start_delay")]
    pub start_delay: u64,
}

impl Default for UpdaterBackoff {
    fn default() -> Self {
        UpdaterBackoff {
            jitter: UpdaterBackoff::default_jitter(),
            max_attempts: UpdaterBackoff::default_max_attempts(),
            max_delay: UpdaterBackoff::default_max_delay(),
            multiplier: UpdaterBackoff::default_multiplier(),
            start_delay: UpdaterBackoff::default_start_delay(),
        }
    }
}

impl UpdaterBackoff {
    fn default_jitter() -> f64 {
        0.1
    }

    fn default_max_attempts() -> u16 {
        10
    }

    fn default_max_delay() -> u64 {
        50
    }

    fn default_multiplier() -> u32 {
        2
    }

    fn default_start_delay() -> u64 {
        5
    }
}
