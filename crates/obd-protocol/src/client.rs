//! OBD-II Client over an ISO-TP transport
//!
//! Issues one request at a time and polls the transport until the response
//! arrives or the timeout elapses. `&mut self` on every request keeps a single
//! exchange in flight.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::ClientConfig;
use crate::dtc::{self, DtcCode};
use crate::error::ObdError;
use crate::mode;
use crate::pid::PidDefinition;
use crate::transport::Transport;

/// Pause between transport ticks while waiting for a response
pub const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// A single OBD-II service request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiagnosticRequest {
    /// Service mode
    pub mode: u8,
    /// Parameter id (Mode 01/02 only)
    pub pid: Option<u8>,
    /// Time to wait for the response
    pub timeout: Duration,
}

impl DiagnosticRequest {
    fn new(mode: u8, pid: Option<u8>) -> Self {
        Self {
            mode,
            pid,
            timeout: Duration::from_millis(crate::config::DEFAULT_TIMEOUT_MS),
        }
    }

    /// Mode 01 current data for `pid`
    pub fn current_data(pid: u8) -> Self {
        Self::new(mode::CURRENT_DATA, Some(pid))
    }

    /// Mode 02 PID 02, the DTC that triggered the freeze frame
    pub fn freeze_frame_dtc() -> Self {
        Self::new(mode::FREEZE_FRAME, Some(mode::FREEZE_FRAME_DTC_PID))
    }

    /// Mode 03 stored DTCs
    pub fn stored_dtcs() -> Self {
        Self::new(mode::READ_DTC, None)
    }

    /// Mode 04 clear DTCs
    pub fn clear_dtcs() -> Self {
        Self::new(mode::CLEAR_DTC, None)
    }

    /// Mode 07 pending DTCs
    pub fn pending_dtcs() -> Self {
        Self::new(mode::PENDING_DTC, None)
    }

    /// Override the response timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Wire payload: mode byte, then the PID if any
    pub fn payload(&self) -> Vec<u8> {
        std::iter::once(self.mode).chain(self.pid).collect()
    }

    /// First byte of a positive response
    pub fn positive_response_sid(&self) -> u8 {
        self.mode.wrapping_add(mode::POSITIVE_RESPONSE_OFFSET)
    }
}

/// Where the last exchange ended up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExchangeState {
    /// No request issued yet
    Idle,
    /// Request handed to the transport, waiting
    Sent,
    /// Response obtained
    Received,
    /// Timeout elapsed without a response
    TimedOut,
}

/// Outcome of a Mode 04 clear request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClearOutcome {
    /// Positive `44` response
    Cleared,
    /// Some other response
    Unexpected(Vec<u8>),
    /// Nothing came back before the timeout
    NoResponse,
}

/// OBD-II diagnostic session controller
pub struct ObdClient<T: Transport> {
    /// Transport stack, exclusively owned
    transport: T,
    /// Addressing and default timeout
    config: ClientConfig,
    /// State of the most recent exchange
    state: ExchangeState,
}

impl<T: Transport> ObdClient<T> {
    /// Create a new OBD client on an opened transport
    pub fn new(transport: T, config: ClientConfig) -> Self {
        info!(
            "OBD client on {} (TX 0x{:03X}, RX 0x{:03X}, timeout {:?})",
            config.interface, config.tx_id, config.rx_id, config.timeout
        );
        Self {
            transport,
            config,
            state: ExchangeState::Idle,
        }
    }

    /// Client configuration
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// State of the most recent exchange
    pub fn state(&self) -> ExchangeState {
        self.state
    }

    /// Set command timeout
    pub fn set_timeout(&mut self, timeout: Duration) {
        self.config.timeout = timeout;
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Give the transport back, e.g. to shut it down
    pub fn into_transport(self) -> T {
        self.transport
    }

    /// Send `request` and wait up to `request.timeout` for a response.
    ///
    /// Returns `None` on timeout. Transport failures are logged and reported
    /// the same way. No retry is attempted and the response framing is not
    /// checked here.
    pub async fn exchange(&mut self, request: &DiagnosticRequest) -> Option<Vec<u8>> {
        self.state = ExchangeState::Idle;
        let payload = request.payload();
        debug!("Request {:02X?} (timeout {:?})", payload, request.timeout);

        if let Err(e) = self.transport.send(&payload) {
            warn!("Failed to send {:02X?}: {}", payload, e);
            self.state = ExchangeState::TimedOut;
            return None;
        }
        self.state = ExchangeState::Sent;

        let start = Instant::now();
        while start.elapsed() < request.timeout {
            if let Err(e) = self.transport.process() {
                warn!("Transport error while waiting for mode {:02X}: {}", request.mode, e);
                break;
            }
            tokio::time::sleep(POLL_INTERVAL).await;
            if self.transport.available() {
                if let Some(response) = self.transport.recv() {
                    debug!("Response {:02X?}", response);
                    self.state = ExchangeState::Received;
                    return Some(response);
                }
            }
        }

        debug!("No response to {:02X?} within {:?}", payload, request.timeout);
        self.state = ExchangeState::TimedOut;
        None
    }

    fn request(&self, request: DiagnosticRequest) -> DiagnosticRequest {
        request.with_timeout(self.config.timeout)
    }

    /// Read stored DTCs (Mode 03).
    ///
    /// A missing response is an error: this read is the one the scan cannot do
    /// without.
    pub async fn read_stored_dtcs(&mut self) -> Result<Vec<DtcCode>, ObdError> {
        info!("Reading stored DTCs (Mode 03)");
        let request = self.request(DiagnosticRequest::stored_dtcs());
        let response = self
            .exchange(&request)
            .await
            .ok_or(ObdError::NoResponse {
                mode: request.mode,
                timeout_ms: request.timeout.as_millis() as u64,
            })?;
        let codes = dtc::decode_stored_dtcs(&response);
        if codes.is_empty() {
            debug!("Raw response: {:02X?}", response);
        }
        Ok(codes)
    }

    /// Read pending DTCs (Mode 07). `None` when the ECU does not answer.
    pub async fn read_pending_dtcs(&mut self) -> Option<Vec<DtcCode>> {
        info!("Reading pending DTCs (Mode 07)");
        let request = self.request(DiagnosticRequest::pending_dtcs());
        let response = self.exchange(&request).await?;
        let codes = dtc::decode_pending_dtcs(&response);
        if codes.is_empty() {
            debug!("Raw response: {:02X?}", response);
        }
        Some(codes)
    }

    /// Read the freeze-frame DTC (Mode 02 PID 02). `None` when the ECU does not answer.
    pub async fn read_freeze_frame_dtc(&mut self) -> Option<Vec<DtcCode>> {
        info!("Reading freeze-frame DTC (Mode 02)");
        let request = self.request(DiagnosticRequest::freeze_frame_dtc());
        let response = self.exchange(&request).await?;
        let codes = dtc::decode_freeze_frame_dtc(&response);
        if codes.is_empty() {
            debug!("No freeze-frame DTC available: {:02X?}", response);
        }
        Some(codes)
    }

    /// Clear DTCs and the MIL (Mode 04)
    pub async fn clear_dtcs(&mut self) -> ClearOutcome {
        info!("Clearing DTCs (Mode 04)");
        let request = self.request(DiagnosticRequest::clear_dtcs());
        match self.exchange(&request).await {
            Some(response) if response.first() == Some(&request.positive_response_sid()) => {
                info!("DTCs cleared");
                ClearOutcome::Cleared
            }
            Some(response) => {
                warn!("Unexpected clear response: {:02X?}", response);
                ClearOutcome::Unexpected(response)
            }
            None => {
                warn!("No response to clear request");
                ClearOutcome::NoResponse
            }
        }
    }

    /// Query one Mode 01 PID and return its data bytes.
    ///
    /// `None` on timeout or when the response does not start with `41 <pid>`.
    pub async fn query_pid(&mut self, pid: &PidDefinition) -> Option<Vec<u8>> {
        let request = self.request(DiagnosticRequest::current_data(pid.id));
        let response = self.exchange(&request).await?;
        match response.as_slice() {
            [sid, echoed, data @ ..]
                if *sid == request.positive_response_sid() && *echoed == pid.id =>
            {
                Some(data.to_vec())
            }
            _ => {
                debug!("Malformed response for PID {:02X}: {:02X?}", pid.id, response);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pid::{resolve, Pid};
    use crate::transport::mock::MockTransport;

    fn client(mock: MockTransport) -> ObdClient<MockTransport> {
        ObdClient::new(mock, ClientConfig::default())
    }

    #[test]
    fn test_request_payloads() {
        assert_eq!(DiagnosticRequest::current_data(0x0C).payload(), vec![0x01, 0x0C]);
        assert_eq!(DiagnosticRequest::freeze_frame_dtc().payload(), vec![0x02, 0x02]);
        assert_eq!(DiagnosticRequest::stored_dtcs().payload(), vec![0x03]);
        assert_eq!(DiagnosticRequest::clear_dtcs().payload(), vec![0x04]);
        assert_eq!(DiagnosticRequest::pending_dtcs().payload(), vec![0x07]);
        assert_eq!(DiagnosticRequest::pending_dtcs().positive_response_sid(), 0x47);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exchange_returns_response() {
        let mock = MockTransport::new()
            .with_response(&[0x03], &[0x43, 0x01, 0x33])
            .with_latency(3);
        let mut client = client(mock);
        assert_eq!(client.state(), ExchangeState::Idle);

        let response = client.exchange(&DiagnosticRequest::stored_dtcs()).await;
        assert_eq!(response, Some(vec![0x43, 0x01, 0x33]));
        assert_eq!(client.state(), ExchangeState::Received);
        assert_eq!(client.transport().ticks(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exchange_times_out() {
        let mut client = client(MockTransport::new());
        let request = DiagnosticRequest::stored_dtcs().with_timeout(Duration::from_millis(100));

        let start = Instant::now();
        assert_eq!(client.exchange(&request).await, None);
        assert!(start.elapsed() >= Duration::from_millis(100));
        assert_eq!(client.state(), ExchangeState::TimedOut);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_timeout_returns_immediately() {
        let mut client = client(MockTransport::vehicle());
        let request = DiagnosticRequest::stored_dtcs().with_timeout(Duration::ZERO);
        assert_eq!(client.exchange(&request).await, None);
        assert_eq!(client.state(), ExchangeState::TimedOut);

        // Shorter than one poll interval
        let request = DiagnosticRequest::stored_dtcs().with_timeout(Duration::from_millis(5));
        let mut slow = ObdClient::new(
            MockTransport::vehicle().with_latency(5),
            ClientConfig::default(),
        );
        assert_eq!(slow.exchange(&request).await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exchange_after_shutdown_is_no_response() {
        let mut mock = MockTransport::vehicle();
        mock.shutdown();
        let mut client = client(mock);
        assert_eq!(client.exchange(&DiagnosticRequest::stored_dtcs()).await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_read_stored_dtcs() {
        let mut client = client(MockTransport::vehicle());
        let codes = client.read_stored_dtcs().await.unwrap();
        let codes: Vec<String> = codes.iter().map(|c| c.to_string()).collect();
        assert_eq!(codes, vec!["P0133"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_read_stored_dtcs_no_response_is_error() {
        let mut client = client(MockTransport::new());
        client.set_timeout(Duration::from_millis(50));
        let err = client.read_stored_dtcs().await.unwrap_err();
        assert!(matches!(err, ObdError::NoResponse { mode: 0x03, timeout_ms: 50 }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_pending_and_freeze_frame() {
        let mock = MockTransport::new()
            .with_response(&[0x07], &[0x47, 0x00, 0x00])
            .with_response(&[0x02, 0x02], &[0x42, 0x02, 0x83, 0x01]);
        let mut client = client(mock);
        assert_eq!(client.read_pending_dtcs().await, Some(vec![]));
        let freeze = client.read_freeze_frame_dtc().await.unwrap();
        assert_eq!(freeze[0].to_string(), "B0301");

        let mut silent = ObdClient::new(MockTransport::new(), ClientConfig::default());
        silent.set_timeout(Duration::from_millis(30));
        assert_eq!(silent.read_pending_dtcs().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_clear_outcomes() {
        let mut client = client(MockTransport::vehicle());
        assert_eq!(client.clear_dtcs().await, ClearOutcome::Cleared);

        let mock = MockTransport::new().with_response(&[0x04], &[0x7F, 0x04, 0x22]);
        let mut client = ObdClient::new(mock, ClientConfig::default());
        assert_eq!(
            client.clear_dtcs().await,
            ClearOutcome::Unexpected(vec![0x7F, 0x04, 0x22])
        );

        let mut client = ObdClient::new(MockTransport::new(), ClientConfig::default());
        client.set_timeout(Duration::from_millis(20));
        assert_eq!(client.clear_dtcs().await, ClearOutcome::NoResponse);
    }

    #[tokio::test(start_paused = true)]
    async fn test_query_pid_checks_header() {
        let mock = MockTransport::vehicle().with_response(&[0x01, 0x0D], &[0x41, 0x0C, 0x37]);
        let mut client = client(mock);

        let rpm = PidDefinition::known(Pid::Rpm);
        assert_eq!(client.query_pid(&rpm).await, Some(vec![0x1A, 0xF8]));

        // PID echo does not match the request
        let speed = resolve("speed").unwrap();
        assert_eq!(client.query_pid(&speed).await, None);
    }
}
