use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CleanupConfig {
    /// Period of the stale-entry sweep and process reap.
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
    /// Quiet period after which a guild's error counter starts over.
    #[serde(default = "default_error_notify_cooldown_secs")]
    pub error_notify_cooldown_secs: u64,
    /// Error messages posted to a guild before the cooldown applies.
    #[serde(default = "default_max_error_notifications")]
    pub max_error_notifications: u32,
    /// Entries sampled per registry in the diagnostics report.
    #[serde(default = "default_diagnostics_sample_size")]
    pub diagnostics_sample_size: usize,
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            sweep_interval_secs: default_sweep_interval_secs(),
            error_notify_cooldown_secs: default_error_notify_cooldown_secs(),
            max_error_notifications: default_max_error_notifications(),
            diagnostics_sample_size: default_diagnostics_sample_size(),
        }
    }
}

fn default_sweep_interval_secs() -> u64 {
    3600
}

fn default_error_notify_cooldown_secs() -> u64 {
    60
}

fn default_max_error_notifications() -> u32 {
    3
}

fn default_diagnostics_sample_size() -> usize {
    5
}
