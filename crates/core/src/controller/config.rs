//! Configuration for the job controller.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the job controller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControllerConfig {
    /// Delay between success and the hide-progress UI event.
    #[serde(default = "default_ui_hide_delay_ms")]
    pub ui_hide_delay_ms: u64,

    /// Capacity of the UI event channel. Events beyond it are dropped.
    #[serde(default = "default_ui_buffer")]
    pub ui_buffer: usize,

    /// How long to wait for the engine to acknowledge a cancellation.
    #[serde(default = "default_cancel_grace_ms")]
    pub cancel_grace_ms: u64,
}

fn default_ui_hide_delay_ms() -> u64 {
    50
}

fn default_ui_buffer() -> usize {
    256
}

fn default_cancel_grace_ms() -> u64 {
    10_000
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            ui_hide_delay_ms: default_ui_hide_delay_ms(),
            ui_buffer: default_ui_buffer(),
            cancel_grace_ms: default_cancel_grace_ms(),
        }
    }
}

impl ControllerConfig {
    pub fn ui_hide_delay(&self) -> Duration {
        Duration::from_millis(self.ui_hide_delay_ms)
    }

    pub fn cancel_grace(&self) -> Duration {
        Duration::from_millis(self.cancel_grace_ms)
    }

    /// Sets the cancellation grace period.
    pub fn with_cancel_grace_ms(mut self, ms: u64) -> Self {
        self.cancel_grace_ms = ms;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ControllerConfig::default();
        assert_eq!(config.ui_hide_delay(), Duration::from_millis(50));
        assert_eq!(config.ui_buffer, 256);
        assert_eq!(config.cancel_grace(), Duration::from_secs(10));
    }
}
