//! Client configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default CAN interface
pub const DEFAULT_INTERFACE: &str = "can0";
/// Default functional tester -> ECU id
pub const DEFAULT_TX_ID: u32 = 0x7E0;
/// Default ECU -> tester id
pub const DEFAULT_RX_ID: u32 = 0x7E8;
/// Default timeout for OBD requests
pub const DEFAULT_TIMEOUT_MS: u64 = 2000;

/// Transport addressing and request timeout, fixed for the whole run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// CAN interface name (e.g., "can0", "vcan0")
    pub interface: String,
    /// Transmit CAN id (tester -> ECU)
    pub tx_id: u32,
    /// Receive CAN id (ECU -> tester)
    pub rx_id: u32,
    /// Time to wait for each response
    pub timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            interface: DEFAULT_INTERFACE.to_string(),
            tx_id: DEFAULT_TX_ID,
            rx_id: DEFAULT_RX_ID,
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
        }
    }
}
