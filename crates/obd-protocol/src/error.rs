//! OBD-II Error Types

use thiserror::Error;

/// Errors raised by the transport collaborator (CAN bus + ISO-TP stack)
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    /// The named CAN interface could not be bound
    #[error("CAN interface open error on {interface}: {reason}")]
    Open { interface: String, reason: String },

    /// Transport not available on this platform/build
    #[error("Transport not supported: {0}")]
    Unsupported(String),

    /// Request payload could not be handed to the stack
    #[error("Send failed: {0}")]
    SendFailed(String),

    /// Reading from the stack failed
    #[error("Receive failed: {0}")]
    ReceiveFailed(String),

    /// Invalid addressing configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Stack used after shutdown
    #[error("Transport is shut down")]
    Closed,
}

/// Errors that can occur during OBD-II communication
///
/// Transport failures inside an exchange are logged and surface as
/// `NoResponse`.
#[derive(Debug, Error)]
pub enum ObdError {
    /// ECU did not answer a mandatory request within the timeout
    #[error("No response from ECU for mode {mode:02X} after {timeout_ms}ms (ignition on? bitrate 500k? TX/RX ids?)")]
    NoResponse { mode: u8, timeout_ms: u64 },
}
