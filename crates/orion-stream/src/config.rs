use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Invalid coordinator configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("{field} must be greater than 0")]
    Zero { field: &'static str },
    #[error("invalid value for {key}: {value:?}")]
    InvalidEnv { key: &'static str, value: String },
}

/// Runtime options for the stream coordinator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoordinatorConfig {
    /// Flush cadence for coalesced text/thinking deltas.
    #[serde(default = "default_frame_interval_ms")]
    pub frame_interval_ms: u64,
    /// When false every text chunk is published as soon as it is applied.
    #[serde(default = "default_coalesce_text")]
    pub coalesce_text: bool,
    /// Bounded inbound event channel size used by the async driver.
    #[serde(default = "default_event_buffer_capacity")]
    pub event_buffer_capacity: usize,
    /// Events held per request id while a submission waits for its ack.
    #[serde(default = "default_early_event_capacity")]
    pub early_event_capacity: usize,
}

const fn default_frame_interval_ms() -> u64 {
    16
}

const fn default_coalesce_text() -> bool {
    true
}

const fn default_event_buffer_capacity() -> usize {
    256
}

const fn default_early_event_capacity() -> usize {
    64
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            frame_interval_ms: default_frame_interval_ms(),
            coalesce_text: default_coalesce_text(),
            event_buffer_capacity: default_event_buffer_capacity(),
            early_event_capacity: default_early_event_capacity(),
        }
    }
}

pub(crate) fn parse_bool_env(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" | "enabled" => Some(true),
        "0" | "false" | "no" | "off" | "disabled" => Some(false),
        _ => None,
    }
}

fn env_number<T: std::str::FromStr>(key: &'static str) -> Result<Option<T>, ConfigError> {
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| ConfigError::InvalidEnv { key, value: raw }),
        Err(_) => Ok(None),
    }
}

impl CoordinatorConfig {
    /// Builds a config from defaults overridden by `ORION_STREAM_*` variables.
    ///
    /// - `ORION_STREAM_FRAME_MS`: flush cadence in milliseconds.
    /// - `ORION_STREAM_COALESCE`: enable/disable text coalescing.
    /// - `ORION_STREAM_EVENT_BUFFER`: inbound channel capacity.
    /// - `ORION_STREAM_EARLY_BUFFER`: pre-acknowledgement event capacity.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Some(ms) = env_number::<u64>("ORION_STREAM_FRAME_MS")? {
            config.frame_interval_ms = ms;
        }
        if let Ok(raw) = std::env::var("ORION_STREAM_COALESCE") {
            config.coalesce_text = parse_bool_env(&raw).ok_or(ConfigError::InvalidEnv {
                key: "ORION_STREAM_COALESCE",
                value: raw,
            })?;
        }
        if let Some(n) = env_number::<usize>("ORION_STREAM_EVENT_BUFFER")? {
            config.event_buffer_capacity = n;
        }
        if let Some(n) = env_number::<usize>("ORION_STREAM_EARLY_BUFFER")? {
            config.early_event_capacity = n;
        }
        config.validate()?;
        Ok(config)
    }

    pub fn frame_interval_ms(mut self, ms: u64) -> Self {
        self.frame_interval_ms = ms;
        self
    }

    pub fn coalesce_text(mut self, enabled: bool) -> Self {
        self.coalesce_text = enabled;
        self
    }

    pub fn event_buffer_capacity(mut self, capacity: usize) -> Self {
        self.event_buffer_capacity = capacity;
        self
    }

    pub fn early_event_capacity(mut self, capacity: usize) -> Self {
        self.early_event_capacity = capacity;
        self
    }

    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.frame_interval_ms == 0 {
            return Err(ConfigError::Zero {
                field: "frame_interval_ms",
            });
        }
        if self.event_buffer_capacity == 0 {
            return Err(ConfigError::Zero {
                field: "event_buffer_capacity",
            });
        }
        if self.early_event_capacity == 0 {
            return Err(ConfigError::Zero {
                field: "early_event_capacity",
            });
        }
        Ok(())
    }
}
