//! Scripted mock transport for testing (no hardware required)

use std::collections::HashMap;

use tracing::debug;

use super::Transport;
use crate::error::TransportError;

/// Mock ISO-TP stack answering requests from a request -> response table
///
/// A response becomes available after `latency_ticks` calls to `process`.
/// Requests without an entry are never answered.
#[derive(Debug, Default)]
pub struct MockTransport {
    responses: HashMap<Vec<u8>, Vec<u8>>,
    latency_ticks: u32,
    in_flight: Option<(Vec<u8>, u32)>,
    ready: Option<Vec<u8>>,
    sent: Vec<Vec<u8>>,
    ticks: u64,
    shutdown_calls: u32,
}

impl MockTransport {
    /// Create a mock that answers nothing
    pub fn new() -> Self {
        Self::default()
    }

    /// Mock answering a few Mode 01 PIDs, one stored DTC and clear requests
    pub fn vehicle() -> Self {
        Self::new()
            .with_response(&[0x01, 0x0C], &[0x41, 0x0C, 0x1A, 0xF8])
            .with_response(&[0x01, 0x0D], &[0x41, 0x0D, 0x37])
            .with_response(&[0x01, 0x05], &[0x41, 0x05, 0x82])
            .with_response(&[0x01, 0x11], &[0x41, 0x11, 0x33])
            .with_response(&[0x03], &[0x43, 0x01, 0x33, 0x00, 0x00])
            .with_response(&[0x04], &[0x44])
    }

    /// Add a response for a request payload
    pub fn with_response(mut self, request: &[u8], response: &[u8]) -> Self {
        self.add_response(request, response);
        self
    }

    /// Number of `process` calls before a response becomes available
    pub fn with_latency(mut self, ticks: u32) -> Self {
        self.latency_ticks = ticks;
        self
    }

    /// Add a response for a request payload
    pub fn add_response(&mut self, request: &[u8], response: &[u8]) {
        self.responses.insert(request.to_vec(), response.to_vec());
    }

    /// Every payload handed to `send`, in order
    pub fn sent(&self) -> &[Vec<u8>] {
        &self.sent
    }

    /// Total `process` calls
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// How many times `shutdown` was called
    pub fn shutdown_calls(&self) -> u32 {
        self.shutdown_calls
    }

    fn is_shut_down(&self) -> bool {
        self.shutdown_calls > 0
    }
}

impl Transport for MockTransport {
    fn send(&mut self, payload: &[u8]) -> Result<(), TransportError> {
        if self.is_shut_down() {
            return Err(TransportError::Closed);
        }
        debug!("Mock transport: sent {:02X?}", payload);
        self.sent.push(payload.to_vec());
        self.ready = None;
        self.in_flight = self
            .responses
            .get(payload)
            .map(|response| (response.clone(), self.latency_ticks));
        Ok(())
    }

    fn process(&mut self) -> Result<(), TransportError> {
        if self.is_shut_down() {
            return Err(TransportError::Closed);
        }
        self.ticks += 1;
        if let Some((response, remaining)) = self.in_flight.take() {
            if remaining == 0 {
                self.ready = Some(response);
            } else {
                self.in_flight = Some((response, remaining - 1));
            }
        }
        Ok(())
    }

    fn available(&self) -> bool {
        self.ready.is_some()
    }

    fn recv(&mut self) -> Option<Vec<u8>> {
        self.ready.take()
    }

    fn shutdown(&mut self) {
        self.shutdown_calls += 1;
    }
}
