//! OBD-II Protocol Implementation
//!
//! Encodes OBD-II service requests, decodes responses into trouble codes and
//! sensor values, and runs the bounded-timeout request/response exchange over
//! a CAN ISO-TP transport.

mod client;
mod config;
pub mod dtc;
mod error;
pub mod pid;
pub mod transport;

pub use client::{ClearOutcome, DiagnosticRequest, ExchangeState, ObdClient, POLL_INTERVAL};
pub use config::{ClientConfig, DEFAULT_INTERFACE, DEFAULT_RX_ID, DEFAULT_TIMEOUT_MS, DEFAULT_TX_ID};
pub use dtc::{DtcCategory, DtcCode};
pub use error::{ObdError, TransportError};
pub use pid::{Pid, PidDefinition};
pub use transport::Transport;

/// OBD-II mode constants
pub mod mode {
    /// Current data
    pub const CURRENT_DATA: u8 = 0x01;
    /// Freeze frame data
    pub const FREEZE_FRAME: u8 = 0x02;
    /// Diagnostic trouble codes
    pub const READ_DTC: u8 = 0x03;
    /// Clear trouble codes
    pub const CLEAR_DTC: u8 = 0x04;
    /// Pending trouble codes
    pub const PENDING_DTC: u8 = 0x07;
    /// Freeze frame PID carrying the DTC that set it
    pub const FREEZE_FRAME_DTC_PID: u8 = 0x02;
    /// Added to the mode byte in a positive response
    pub const POSITIVE_RESPONSE_OFFSET: u8 = 0x40;
}
