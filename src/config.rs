//! Design constants and runtime tunables of the bridge.

pub use crate::codec::MAX_FRAME_LEN;

/// Receive buffer size of the control link assembler.
pub const CONTROL_RX_CAPACITY: usize = 32;
/// Receive buffer size of the device link assembler.
pub const DEVICE_RX_CAPACITY: usize = 48;
/// Number of requests that may wait for a device response at once.
pub const TRACKER_CAPACITY: usize = 16;
/// Longest control request a pending entry can hold.
pub const MAX_REQUEST_LEN: usize = 32;

/// Runtime configuration of a [`Bridge`](crate::Bridge).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BridgeConfig {
    /// Age at which an unanswered request is evicted.
    pub command_timeout_ms: u32,
    /// Inter-byte silence that resets the control assembler mid-frame.
    pub control_silence_ms: Option<u32>,
    /// Inter-byte silence that resets the device assembler mid-frame.
    pub device_silence_ms: Option<u32>,
}

impl BridgeConfig {
    pub const fn new() -> Self {
        Self {
            command_timeout_ms: 1000,
            control_silence_ms: Some(50),
            device_silence_ms: None,
        }
    }

    pub const fn with_command_timeout(mut self, timeout_ms: u32) -> Self {
        self.command_timeout_ms = timeout_ms;
        self
    }

    pub const fn with_control_silence(mut self, silence_ms: Option<u32>) -> Self {
        self.control_silence_ms = silence_ms;
        self
    }

    pub const fn with_device_silence(mut self, silence_ms: Option<u32>) -> Self {
        self.device_silence_ms = silence_ms;
        self
    }
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = BridgeConfig::default();
        assert_eq!(config.command_timeout_ms, 1000);
        assert_eq!(config.control_silence_ms, Some(50));
        assert_eq!(config.device_silence_ms, None);

        let config = config.with_command_timeout(200).with_device_silence(Some(20));
        assert_eq!(config.command_timeout_ms, 200);
        assert_eq!(config.device_silence_ms, Some(20));
    }
}
