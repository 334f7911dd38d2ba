//! Live PID polling loop

use std::io::{self, Write};
use std::path::PathBuf;
use std::time::Duration;

use chrono::Local;
use obd_protocol::{ObdClient, PidDefinition, Transport};
use thiserror::Error;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::csv::CsvSink;
use crate::sample::{LiveRow, LiveSample};

/// Shortest pause between two ticks
pub const MIN_TICK_PERIOD: Duration = Duration::from_millis(50);

/// Default pause between two ticks
const DEFAULT_INTERVAL_MS: u64 = 500;

/// Configuration for a live session
#[derive(Debug, Clone, PartialEq)]
pub struct LiveConfig {
    /// Pause after each completed tick (clamped to [`MIN_TICK_PERIOD`])
    pub interval: Duration,
    /// Total session length; `None` or zero runs until cancelled
    pub duration: Option<Duration>,
    /// Optional CSV destination
    pub csv_path: Option<PathBuf>,
}

impl Default for LiveConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(DEFAULT_INTERVAL_MS),
            duration: None,
            csv_path: None,
        }
    }
}

/// Errors that end a live session
#[derive(Debug, Error)]
pub enum LiveError {
    /// CSV file could not be created or written
    #[error("CSV file {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Console output failed
    #[error("Output error: {0}")]
    Output(#[from] io::Error),
}

/// How a live session went
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LiveSummary {
    /// Completed ticks
    pub ticks: u64,
    /// Rows appended to the CSV file
    pub rows_written: u64,
    /// Stopped by cancellation rather than by the duration bound
    pub interrupted: bool,
}

/// Pause before the next tick
pub fn inter_tick_delay(interval: Duration) -> Duration {
    interval.max(MIN_TICK_PERIOD)
}

/// Polls a fixed, ordered PID set once per tick
pub struct LivePoller {
    /// PIDs in request (and column) order
    pids: Vec<PidDefinition>,
    /// Configuration
    config: LiveConfig,
}

impl LivePoller {
    /// Create a new poller
    pub fn new(pids: Vec<PidDefinition>, config: LiveConfig) -> Self {
        info!(
            "Live poller created with {} PIDs, interval {:?}",
            pids.len(),
            config.interval
        );
        Self { pids, config }
    }

    pub fn pids(&self) -> &[PidDefinition] {
        &self.pids
    }

    /// Column labels in request order
    pub fn labels(&self) -> Vec<String> {
        self.pids.iter().map(|pid| pid.label.clone()).collect()
    }

    /// Query every PID once, sequentially, and collect the row.
    ///
    /// `None` if cancelled before every PID was queried.
    async fn poll_all<T: Transport>(
        &self,
        client: &mut ObdClient<T>,
        shutdown: &watch::Receiver<bool>,
    ) -> Option<LiveRow> {
        let timestamp = Local::now();
        let mut samples = Vec::with_capacity(self.pids.len());

        for pid in &self.pids {
            if *shutdown.borrow() {
                return None;
            }
            let raw = client.query_pid(pid).await;
            let value = raw.as_deref().and_then(|bytes| pid.decode(bytes));
            if value.is_none() {
                debug!("PID {:02X} ({}) unavailable", pid.id, pid.label);
            }
            samples.push(LiveSample {
                timestamp: Local::now(),
                label: pid.label.clone(),
                unit: pid.unit(),
                raw,
                value,
            });
        }

        Some(LiveRow { timestamp, samples })
    }

    /// Run until the duration elapses or `shutdown` turns true.
    ///
    /// Each row goes to `out`, and to the CSV file when one is configured. The
    /// CSV file is flushed and closed on every exit path.
    pub async fn run<T: Transport, W: Write>(
        &self,
        client: &mut ObdClient<T>,
        out: &mut W,
        shutdown: watch::Receiver<bool>,
    ) -> Result<LiveSummary, LiveError> {
        let mut csv = match &self.config.csv_path {
            Some(path) => Some(CsvSink::create(path, self.labels()).map_err(|source| {
                LiveError::Csv {
                    path: path.clone(),
                    source,
                }
            })?),
            None => None,
        };

        let result = self.run_ticks(client, out, csv.as_mut(), shutdown).await;

        if let Some(sink) = csv.take() {
            let path = sink.path().to_path_buf();
            let rows = sink.rows_written();
            sink.close().map_err(|source| LiveError::Csv { path, source })?;
            debug!("CSV closed with {} rows", rows);
        }

        result
    }

    async fn run_ticks<T: Transport, W: Write>(
        &self,
        client: &mut ObdClient<T>,
        out: &mut W,
        mut csv: Option<&mut CsvSink>,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<LiveSummary, LiveError> {
        info!("Starting live session");
        let start = Instant::now();
        let limit = self.config.duration.filter(|d| !d.is_zero());
        let delay = inter_tick_delay(self.config.interval);
        let mut summary = LiveSummary::default();

        loop {
            if *shutdown.borrow() {
                summary.interrupted = true;
                break;
            }
            if limit.is_some_and(|limit| start.elapsed() >= limit) {
                info!("Live session duration reached");
                break;
            }

            let Some(row) = self.poll_all(client, &shutdown).await else {
                summary.interrupted = true;
                break;
            };

            writeln!(out, "{}", row.console_line())?;
            if let Some(sink) = csv.as_deref_mut() {
                sink.write_row(&row).map_err(|source| LiveError::Csv {
                    path: sink.path().to_path_buf(),
                    source,
                })?;
                summary.rows_written += 1;
            }
            summary.ticks += 1;

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = cancelled(&mut shutdown) => {
                    summary.interrupted = true;
                    break;
                }
            }
        }

        if summary.interrupted {
            warn!("Live session interrupted after {} ticks", summary.ticks);
        } else {
            info!("Live session finished after {} ticks", summary.ticks);
        }
        Ok(summary)
    }
}

/// Resolves once cancellation is requested; never if the sender is gone
async fn cancelled(shutdown: &mut watch::Receiver<bool>) {
    loop {
        if *shutdown.borrow_and_update() {
            return;
        }
        if shutdown.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use obd_protocol::pid::resolve_list;
    use obd_protocol::transport::mock::MockTransport;
    use obd_protocol::ClientConfig;

    fn client(mock: MockTransport) -> ObdClient<MockTransport> {
        let config = ClientConfig {
            timeout: Duration::from_millis(100),
            ..ClientConfig::default()
        };
        ObdClient::new(mock, config)
    }

    async fn poll_once(poller: &LivePoller, client: &mut ObdClient<MockTransport>) -> LiveRow {
        let (_tx, rx) = watch::channel(false);
        poller.poll_all(client, &rx).await.unwrap()
    }

    #[test]
    fn test_inter_tick_delay_floor() {
        assert_eq!(inter_tick_delay(Duration::from_millis(10)), Duration::from_millis(50));
        assert_eq!(inter_tick_delay(Duration::ZERO), MIN_TICK_PERIOD);
        assert_eq!(inter_tick_delay(Duration::from_millis(500)), Duration::from_millis(500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_tick_unanswered_pid_is_na() {
        // 0x10 (maf) is not scripted in the mock vehicle
        let poller = LivePoller::new(resolve_list("rpm,maf,speed"), LiveConfig::default());
        let mut client = client(MockTransport::vehicle());

        let row = poll_once(&poller, &mut client).await;
        let rendered: Vec<_> = row.samples.iter().map(|s| s.render()).collect();
        assert_eq!(
            rendered,
            vec!["rpm=1726.00 rpm", "maf=NA", "speed=55.00 km/h"]
        );
        assert_eq!(row.samples[1].raw, None);
        assert_eq!(
            client.transport().sent(),
            &[vec![0x01, 0x0C], vec![0x01, 0x10], vec![0x01, 0x0D]]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_tick_bad_framing_is_na() {
        let mock = MockTransport::vehicle()
            .with_response(&[0x01, 0x05], &[0x7F, 0x01, 0x12])
            .with_response(&[0x01, 0x0C], &[0x41, 0x0C, 0x1A]);
        let poller = LivePoller::new(resolve_list("coolant,rpm"), LiveConfig::default());
        let mut client = client(mock);

        let row = poll_once(&poller, &mut client).await;
        assert_eq!(row.samples[0].value, None);
        assert_eq!(row.samples[0].raw, None);
        // Header fine but one byte short for the formula
        assert_eq!(row.samples[1].raw, Some(vec![0x1A]));
        assert_eq!(row.samples[1].value, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_stops_at_duration_and_writes_csv() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("live.csv");
        let config = LiveConfig {
            interval: Duration::from_millis(200),
            duration: Some(Duration::from_secs(1)),
            csv_path: Some(path.clone()),
        };
        let poller = LivePoller::new(resolve_list("rpm,0x2F,coolant"), config);
        let mut client = client(MockTransport::vehicle());
        let mut out: Vec<u8> = Vec::new();
        let (_tx, rx) = watch::channel(false);

        let summary = poller.run(&mut client, &mut out, rx).await.unwrap();
        assert!(!summary.interrupted);
        assert!(summary.ticks >= 2);
        assert_eq!(summary.rows_written, summary.ticks);

        let console = String::from_utf8(out).unwrap();
        assert_eq!(console.lines().count() as u64, summary.ticks);
        assert!(console.lines().all(|l| l.contains("0x2F=NA")));

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = content.lines().collect();
        assert_eq!(lines[0], "timestamp,rpm,0x2F,coolant");
        assert_eq!(lines.len() as u64, summary.ticks + 1);
        assert_eq!(lines.iter().filter(|l| l.starts_with("timestamp")).count(), 1);
        for line in &lines[1..] {
            assert_eq!(line.split(',').count(), 4);
            assert!(line.ends_with(",1726.00,NA,90.00"));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_cancelled_closes_csv() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("live.csv");
        let config = LiveConfig {
            interval: Duration::from_millis(100),
            duration: None,
            csv_path: Some(path.clone()),
        };
        let poller = LivePoller::new(resolve_list("speed"), config);
        let mut client = client(MockTransport::vehicle());
        let mut out: Vec<u8> = Vec::new();
        let (tx, rx) = watch::channel(false);

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(350)).await;
            let _ = tx.send(true);
        });

        let summary = poller.run(&mut client, &mut out, rx).await.unwrap();
        assert!(summary.interrupted);
        assert!(summary.ticks >= 1);

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count() as u64, summary.ticks + 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_already_cancelled_sends_nothing() {
        let poller = LivePoller::new(resolve_list("rpm"), LiveConfig::default());
        let mut client = client(MockTransport::vehicle());
        let mut out: Vec<u8> = Vec::new();
        let (_tx, rx) = watch::channel(true);

        let summary = poller.run(&mut client, &mut out, rx).await.unwrap();
        assert!(summary.interrupted);
        assert_eq!(summary.ticks, 0);
        assert!(client.transport().sent().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_csv_open_failure() {
        let config = LiveConfig {
            csv_path: Some(PathBuf::from("/nonexistent-dir/live.csv")),
            ..LiveConfig::default()
        };
        let poller = LivePoller::new(resolve_list("rpm"), config);
        let mut client = client(MockTransport::vehicle());
        let (_tx, rx) = watch::channel(false);

        let err = poller.run(&mut client, &mut Vec::<u8>::new(), rx).await.unwrap_err();
        assert!(matches!(err, LiveError::Csv { .. }));
    }
}
