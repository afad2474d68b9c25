use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Inactivity teardown thresholds.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct TimeoutsConfig {
    /// Delay after the queue runs dry before the guild is torn down.
    #[serde(default = "default_idle_timeout_secs")]
    pub idle_timeout_secs: u64,
    /// Delay a guild may stay paused before it is torn down.
    #[serde(default = "default_pause_timeout_secs")]
    pub pause_timeout_secs: u64,
}

impl TimeoutsConfig {
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    pub fn pause_timeout(&self) -> Duration {
        Duration::from_secs(self.pause_timeout_secs)
    }
}

impl Default for TimeoutsConfig {
    fn default() -> Self {
        Self {
            idle_timeout_secs: default_idle_timeout_secs(),
            pause_timeout_secs: default_pause_timeout_secs(),
        }
    }
}

fn default_idle_timeout_secs() -> u64 {
    300
}

fn default_pause_timeout_secs() -> u64 {
    600
}
