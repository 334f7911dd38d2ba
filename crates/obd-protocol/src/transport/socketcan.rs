//! SocketCAN binding using the kernel ISO-TP socket
//!
//! Segmentation, flow control and consecutive-frame timing are handled by the
//! kernel; this side only moves whole payloads.

use socketcan_isotp::{IsoTpSocket, StandardId};
use tracing::{debug, info};

use super::Transport;
use crate::config::ClientConfig;
use crate::error::TransportError;

/// ISO-TP stack on a SocketCAN interface, normal 11-bit addressing
pub struct SocketCanTransport {
    interface: String,
    socket: Option<IsoTpSocket>,
    response: Option<Vec<u8>>,
}

impl SocketCanTransport {
    /// Bind the ISO-TP socket on `config.interface`
    pub fn open(config: &ClientConfig) -> Result<Self, TransportError> {
        let rx_id = standard_id(config.rx_id)?;
        let tx_id = standard_id(config.tx_id)?;

        info!("Opening {} @ 500k", config.interface);
        info!("TX ID: 0x{:03X}, RX ID: 0x{:03X}", config.tx_id, config.rx_id);

        let mut socket =
            IsoTpSocket::open(&config.interface, rx_id, tx_id).map_err(|e| TransportError::Open {
                interface: config.interface.clone(),
                reason: e.to_string(),
            })?;

        socket
            .set_nonblocking(true)
            .map_err(|e| TransportError::Open {
                interface: config.interface.clone(),
                reason: format!("failed to set non-blocking: {}", e),
            })?;

        Self::drain(&mut socket);

        Ok(Self {
            interface: config.interface.clone(),
            socket: Some(socket),
            response: None,
        })
    }

    /// Drop responses left over from earlier sessions
    fn drain(socket: &mut IsoTpSocket) {
        while let Ok(data) = socket.read() {
            if data.is_empty() {
                break;
            }
            debug!("Drained stale message: {:02X?}", data);
        }
    }

    fn socket(&mut self) -> Result<&mut IsoTpSocket, TransportError> {
        self.socket.as_mut().ok_or(TransportError::Closed)
    }
}

impl Transport for SocketCanTransport {
    fn send(&mut self, payload: &[u8]) -> Result<(), TransportError> {
        self.response = None;
        self.socket()?
            .write(payload)
            .map_err(|e| TransportError::SendFailed(e.to_string()))
    }

    fn process(&mut self) -> Result<(), TransportError> {
        if self.response.is_some() {
            return Ok(());
        }
        let received = match self.socket()?.read() {
            Ok(data) if !data.is_empty() => Some(data.to_vec()),
            Ok(_) => None,
            Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => None,
            Err(e) => return Err(TransportError::ReceiveFailed(e.to_string())),
        };
        if let Some(data) = received {
            debug!("Received {} bytes: {:02X?}", data.len(), data);
            self.response = Some(data);
        }
        Ok(())
    }

    fn available(&self) -> bool {
        self.response.is_some()
    }

    fn recv(&mut self) -> Option<Vec<u8>> {
        self.response.take()
    }

    fn shutdown(&mut self) {
        if self.socket.take().is_some() {
            info!("Shutting down {}", self.interface);
        }
    }
}

impl Drop for SocketCanTransport {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn standard_id(raw: u32) -> Result<StandardId, TransportError> {
    u16::try_from(raw)
        .ok()
        .and_then(StandardId::new)
        .ok_or_else(|| TransportError::InvalidConfig(format!("Invalid 11-bit CAN ID: 0x{:X}", raw)))
}
