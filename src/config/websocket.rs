//! WebSocket configuration

use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;

/// WebSocket configuration
///
/// Tunes the per-connection pump pair and the liveness protocol. The
/// ping interval must stay strictly below the read timeout, otherwise
/// healthy but idle clients would be reaped between pings.
#[derive(Debug, Clone, Deserialize)]
pub struct WebSocketConfig {
    /// Capacity of each connection's bounded outbound queue.
    ///
    /// When a queue is full, new deliveries to that connection are
    /// dropped rather than blocking the sender.
    #[serde(default = "default_queue_capacity")]
    pub outbound_queue_capacity: usize,

    /// Maximum accepted inbound frame size in bytes
    #[serde(default = "default_max_frame_bytes")]
    pub max_frame_bytes: usize,

    /// Read deadline: a connection that produces no liveness pong for
    /// this long is torn down
    #[serde(default = "default_read_timeout")]
    pub read_timeout_secs: u64,

    /// Deadline applied to each individual socket write
    #[serde(default = "default_write_timeout")]
    pub write_timeout_secs: u64,

    /// Period between server liveness pings
    #[serde(default = "default_ping_interval")]
    pub ping_interval_secs: u64,
}

impl WebSocketConfig {
    /// Get the read deadline as a Duration
    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }

    /// Get the per-write deadline as a Duration
    pub fn write_timeout(&self) -> Duration {
        Duration::from_secs(self.write_timeout_secs)
    }

    /// Get the ping period as a Duration
    pub fn ping_interval(&self) -> Duration {
        Duration::from_secs(self.ping_interval_secs)
    }

    /// Validate WebSocket configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.outbound_queue_capacity == 0 {
            return Err(ValidationError::InvalidQueueCapacity);
        }
        if self.max_frame_bytes < 1024 || self.max_frame_bytes > 1024 * 1024 {
            return Err(ValidationError::InvalidFrameSize);
        }
        if self.write_timeout_secs == 0 {
            return Err(ValidationError::InvalidWriteTimeout);
        }
        if self.ping_interval_secs == 0 || self.ping_interval_secs >= self.read_timeout_secs {
            return Err(ValidationError::PingIntervalTooLong);
        }
        Ok(())
    }
}

impl Default for WebSocketConfig {
    fn default() -> Self {
        Self {
            outbound_queue_capacity: default_queue_capacity(),
            max_frame_bytes: default_max_frame_bytes(),
            read_timeout_secs: default_read_timeout(),
            write_timeout_secs: default_write_timeout(),
            ping_interval_secs: default_ping_interval(),
        }
    }
}

fn default_queue_capacity() -> usize {
    256
}

fn default_max_frame_bytes() -> usize {
    64 * 1024
}

fn default_read_timeout() -> u64 {
    60
}

fn default_write_timeout() -> u64 {
    10
}

fn default_ping_interval() -> u64 {
    30
}
