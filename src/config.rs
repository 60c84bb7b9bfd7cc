//! Worker configuration surface.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{name} must be a power of two, got {got}")]
    CapacityNotPowerOfTwo { name: &'static str, got: usize },
    #[error("window_size must be positive, got {got}")]
    WindowNotPositive { got: i32 },
    #[error("window_padding must be non-negative, got {got}")]
    PaddingNegative { got: i32 },
    #[error("max_connections must be at least 1")]
    NoConnections,
    #[error("max_message_length {got} exceeds streams_buffer_capacity {capacity}")]
    MessageLargerThanRing { got: usize, capacity: usize },
    #[error("max_message_length {got} exceeds the u16 payload length prefix")]
    MessageLengthOverflow { got: usize },
}

/// Recognized options for one TCP worker instance.
///
/// Ring capacities size the shared-memory conduits and must be powers of
/// two. `window_size` is the initial credit granted per stream in each
/// direction; `window_padding` is the per-frame overhead reserved out of
/// that credit.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TcpConfig {
    pub max_connections: usize,
    pub window_size: i32,
    pub window_padding: i32,
    pub max_message_length: usize,
    pub command_buffer_capacity: usize,
    pub response_buffer_capacity: usize,
    pub counter_values_buffer_capacity: usize,
    pub streams_buffer_capacity: usize,
}

impl Default for TcpConfig {
    fn default() -> Self {
        Self {
            max_connections: 512,
            window_size: 65_536,
            window_padding: 0,
            max_message_length: 16_384,
            command_buffer_capacity: 64 * 1024,
            response_buffer_capacity: 64 * 1024,
            counter_values_buffer_capacity: 16 * 1024,
            streams_buffer_capacity: 1024 * 1024,
        }
    }
}

impl TcpConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_connections == 0 {
            return Err(ConfigError::NoConnections);
        }
        if self.window_size <= 0 {
            return Err(ConfigError::WindowNotPositive {
                got: self.window_size,
            });
        }
        if self.window_padding < 0 {
            return Err(ConfigError::PaddingNegative {
                got: self.window_padding,
            });
        }
        for (name, got) in [
            ("command_buffer_capacity", self.command_buffer_capacity),
            ("response_buffer_capacity", self.response_buffer_capacity),
            (
                "counter_values_buffer_capacity",
                self.counter_values_buffer_capacity,
            ),
            ("streams_buffer_capacity", self.streams_buffer_capacity),
        ] {
            if !got.is_power_of_two() {
                return Err(ConfigError::CapacityNotPowerOfTwo { name, got });
            }
        }
        if self.max_message_length > u16::MAX as usize {
            return Err(ConfigError::MessageLengthOverflow {
                got: self.max_message_length,
            });
        }
        if self.max_message_length + 64 > self.streams_buffer_capacity {
            return Err(ConfigError::MessageLargerThanRing {
                got: self.max_message_length,
                capacity: self.streams_buffer_capacity,
            });
        }
        Ok(())
    }
}
