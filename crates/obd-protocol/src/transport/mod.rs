//! Segmented transport collaborator
//!
//! The diagnostic layer drives the transport through a small polled interface:
//! hand over a request, tick the stack while waiting, and pick up the
//! reassembled response once it is available.
//!
//! - SocketCAN ISO-TP binding (Linux, `socketcan` feature)
//! - Scripted mock for tests

pub mod mock;

#[cfg(all(target_os = "linux", feature = "socketcan"))]
pub mod socketcan;

use crate::config::ClientConfig;
use crate::error::TransportError;

/// Polled ISO-TP request/response stack
pub trait Transport {
    /// Hand a request payload to the stack (non-blocking)
    fn send(&mut self, payload: &[u8]) -> Result<(), TransportError>;

    /// Advance the stack's internal state by one step
    fn process(&mut self) -> Result<(), TransportError>;

    /// Whether a complete response has been reassembled
    fn available(&self) -> bool;

    /// Take the reassembled response, clearing it
    fn recv(&mut self) -> Option<Vec<u8>>;

    /// Release the bus. Calling it again is a no-op.
    fn shutdown(&mut self);
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn send(&mut self, payload: &[u8]) -> Result<(), TransportError> {
        (**self).send(payload)
    }

    fn process(&mut self) -> Result<(), TransportError> {
        (**self).process()
    }

    fn available(&self) -> bool {
        (**self).available()
    }

    fn recv(&mut self) -> Option<Vec<u8>> {
        (**self).recv()
    }

    fn shutdown(&mut self) {
        (**self).shutdown()
    }
}

/// Open the CAN interface named in `config` and bind the ISO-TP stack
#[cfg(all(target_os = "linux", feature = "socketcan"))]
pub fn open(config: &ClientConfig) -> Result<Box<dyn Transport>, TransportError> {
    let transport = socketcan::SocketCanTransport::open(config)?;
    Ok(Box::new(transport))
}

/// Open the CAN interface named in `config` and bind the ISO-TP stack
#[cfg(not(all(target_os = "linux", feature = "socketcan")))]
pub fn open(config: &ClientConfig) -> Result<Box<dyn Transport>, TransportError> {
    Err(TransportError::Unsupported(format!(
        "cannot open {}: SocketCAN requires Linux and the 'socketcan' feature",
        config.interface
    )))
}
