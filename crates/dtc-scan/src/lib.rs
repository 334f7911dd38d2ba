//! DTC scanner over CAN-bus
//!
//! Reads stored (and optionally pending / freeze-frame) trouble codes, clears
//! them on request, or streams live PIDs. The CAN transport is opened once per
//! run and shut down on every exit path.

pub mod cli;
pub mod scan_log;

use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Mutex;

use anyhow::Context;
use chrono::Local;
use obd_protocol::dtc::join_codes;
use obd_protocol::pid::resolve_list;
use obd_protocol::{transport, ClearOutcome, ObdClient, PidDefinition, Transport};
use obd_scheduler::LivePoller;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{fmt, prelude::*};

pub use cli::Cli;

/// How a run ended, mapped to the process exit code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Everything requested was done
    Success,
    /// Transport could not be opened, the mandatory DTC read got no answer,
    /// or an output file failed
    Failure,
    /// Live session requested but no PID could be resolved
    NoPids,
}

impl Outcome {
    pub fn exit_code(&self) -> u8 {
        match self {
            Outcome::Success => 0,
            Outcome::Failure => 1,
            Outcome::NoPids => 2,
        }
    }
}

impl From<Outcome> for ExitCode {
    fn from(outcome: Outcome) -> Self {
        ExitCode::from(outcome.exit_code())
    }
}

/// Initialize logging: stderr, plus `log_file` when given
pub fn init_logging(verbose: bool, log_file: Option<&Path>) -> anyhow::Result<()> {
    let level = if verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    };

    let file_layer = match log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("cannot open log file {}", path.display()))?;
            Some(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
        .with(file_layer)
        .with(level)
        .try_init()
        .context("failed to set tracing subscriber")?;
    Ok(())
}

/// Run the scan or live session described by `cli` on the CAN interface
pub async fn run(cli: &Cli) -> Outcome {
    let live_pids = if cli.live {
        let pids = resolve_list(&cli.pids);
        if pids.is_empty() {
            error!("No valid PID in '{}'", cli.pids);
            return Outcome::NoPids;
        }
        Some(pids)
    } else {
        None
    };

    let transport = match transport::open(&cli.client_config()) {
        Ok(transport) => transport,
        Err(e) => {
            error!("{}", e);
            return Outcome::Failure;
        }
    };

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let interrupt = live_pids.is_some().then(|| {
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Interrupt received, stopping");
                let _ = shutdown_tx.send(true);
            }
        })
    });

    let (outcome, _) = run_with(
        cli,
        live_pids,
        transport,
        &mut std::io::stdout(),
        shutdown_rx,
    )
    .await;

    if let Some(task) = interrupt {
        task.abort();
    }
    outcome
}

/// Run on an already opened transport and shut it down before returning it.
///
/// `live_pids` selects a live session; `None` runs the DTC scan.
pub async fn run_with<T: Transport, W: Write>(
    cli: &Cli,
    live_pids: Option<Vec<PidDefinition>>,
    transport: T,
    out: &mut W,
    shutdown: watch::Receiver<bool>,
) -> (Outcome, T) {
    let mut client = ObdClient::new(transport, cli.client_config());

    let result = match live_pids {
        Some(pids) => live(cli, pids, &mut client, out, shutdown).await,
        None => scan(cli, &mut client, out).await,
    };

    client.transport_mut().shutdown();
    info!("Session finished");

    let outcome = match result {
        Ok(outcome) => outcome,
        Err(e) => {
            error!("{:#}", e);
            Outcome::Failure
        }
    };
    (outcome, client.into_transport())
}

/// Stream live PIDs until the duration elapses or `shutdown` fires
pub async fn live<T: Transport, W: Write>(
    cli: &Cli,
    pids: Vec<PidDefinition>,
    client: &mut ObdClient<T>,
    out: &mut W,
    shutdown: watch::Receiver<bool>,
) -> anyhow::Result<Outcome> {
    let poller = LivePoller::new(pids, cli.live_config());
    let summary = poller
        .run(client, out, shutdown)
        .await
        .context("live session failed")?;
    if summary.interrupted {
        info!("Live session interrupted after {} ticks", summary.ticks);
    }
    if summary.rows_written > 0 {
        debug!("{} CSV rows written", summary.rows_written);
    }
    Ok(Outcome::Success)
}

/// Read DTCs (Mode 03, optionally 07 and 02), log them and clear if asked
pub async fn scan<T: Transport, W: Write>(
    cli: &Cli,
    client: &mut ObdClient<T>,
    out: &mut W,
) -> anyhow::Result<Outcome> {
    let mut stored = Vec::new();

    if !cli.no_scan {
        stored = match client.read_stored_dtcs().await {
            Ok(codes) => codes,
            Err(e) => {
                error!("{}", e);
                return Ok(Outcome::Failure);
            }
        };

        if stored.is_empty() {
            info!("No stored DTC");
            writeln!(out, "=> No stored DTC")?;
        } else {
            info!("DTC found: {}", join_codes(&stored));
            writeln!(out, "=> DTC found: {}", join_codes(&stored))?;
        }

        if let Some(path) = &cli.log_file {
            scan_log::append(path, &stored, Local::now())
                .with_context(|| format!("cannot append to {}", path.display()))?;
            info!("DTCs recorded in {}", path.display());
        }

        if cli.pending {
            match client.read_pending_dtcs().await {
                Some(codes) if codes.is_empty() => writeln!(out, "=> No pending DTC")?,
                Some(codes) => writeln!(out, "=> Pending DTC: {}", join_codes(&codes))?,
                None => {
                    warn!("No response to pending DTC request");
                    writeln!(out, "=> No response for pending DTC")?;
                }
            }
        }

        if cli.freeze {
            match client.read_freeze_frame_dtc().await {
                Some(codes) if codes.is_empty() => {
                    writeln!(out, "=> No freeze-frame DTC available")?
                }
                Some(codes) => writeln!(out, "=> Freeze-frame DTC: {}", join_codes(&codes))?,
                None => {
                    warn!("No response to freeze-frame request");
                    writeln!(out, "=> No response for freeze-frame DTC")?;
                }
            }
        }
    }

    if cli.clear || cli.no_scan {
        if cli.no_scan || !stored.is_empty() {
            match client.clear_dtcs().await {
                ClearOutcome::Cleared => writeln!(out, "=> DTC cleared successfully")?,
                ClearOutcome::Unexpected(response) => {
                    writeln!(out, "=> Clear response: {}", hex(&response))?
                }
                ClearOutcome::NoResponse => writeln!(out, "=> No response to clear request")?,
            }
        } else {
            info!("No DTC to clear");
            writeln!(out, "=> No DTC to clear")?;
        }
    }

    Ok(Outcome::Success)
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}
