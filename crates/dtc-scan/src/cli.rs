//! Command-line arguments

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use obd_protocol::pid::parse_numeric_literal;
use obd_protocol::{ClientConfig, DEFAULT_INTERFACE};
use obd_scheduler::LiveConfig;

#[derive(Debug, Clone, Parser)]
#[command(name = "dtc-scan")]
#[command(author, version, about = "Read/clear OBD-II trouble codes and stream live data over CAN-bus")]
pub struct Cli {
    /// CAN interface to use
    #[arg(short, long, default_value = DEFAULT_INTERFACE)]
    pub interface: String,

    /// CAN id for requests (tester -> ECU)
    #[arg(short, long, value_parser = parse_can_id, default_value = "0x7E0")]
    pub txid: u32,

    /// CAN id for responses (ECU -> tester)
    #[arg(short, long, value_parser = parse_can_id, default_value = "0x7E8")]
    pub rxid: u32,

    /// Clear DTCs after reading them
    #[arg(short, long)]
    pub clear: bool,

    /// Append scan results (and log output) to this file
    #[arg(short, long)]
    pub log_file: Option<PathBuf>,

    /// Debug logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Response timeout in seconds
    #[arg(long, value_parser = parse_seconds, default_value = "2.0")]
    pub timeout: Duration,

    /// Skip the DTC read and clear straight away
    #[arg(long)]
    pub no_scan: bool,

    /// Stream live PIDs instead of scanning DTCs
    #[arg(long)]
    pub live: bool,

    /// Comma-separated PID labels or numeric ids for --live
    #[arg(long, default_value = "rpm,speed,coolant,throttle")]
    pub pids: String,

    /// Seconds between live samples (at least 0.05 in practice)
    #[arg(long, value_parser = parse_seconds, default_value = "0.5")]
    pub interval: Duration,

    /// Stop the live session after this many seconds
    #[arg(long, value_parser = parse_seconds)]
    pub duration: Option<Duration>,

    /// Write live samples to this CSV file
    #[arg(long)]
    pub csv_file: Option<PathBuf>,

    /// Also read pending DTCs (Mode 07)
    #[arg(long)]
    pub pending: bool,

    /// Also read the freeze-frame DTC (Mode 02)
    #[arg(long)]
    pub freeze: bool,
}

impl Cli {
    /// Transport and session settings
    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            interface: self.interface.clone(),
            tx_id: self.txid,
            rx_id: self.rxid,
            timeout: self.timeout,
        }
    }

    /// Live session settings
    pub fn live_config(&self) -> LiveConfig {
        LiveConfig {
            interval: self.interval,
            duration: self.duration,
            csv_path: self.csv_file.clone(),
        }
    }
}

/// Parse a CAN id, accepting `0x` hex and other prefixed literals
fn parse_can_id(s: &str) -> Result<u32, String> {
    match parse_numeric_literal(s) {
        Some(id) if id <= 0x1FFF_FFFF => Ok(id),
        Some(id) => Err(format!("CAN id 0x{:X} out of range", id)),
        None => Err(format!("invalid CAN id '{}'", s)),
    }
}

/// Parse fractional seconds into a `Duration`
fn parse_seconds(s: &str) -> Result<Duration, String> {
    let value: f64 = s
        .trim()
        .parse()
        .map_err(|e| format!("invalid number of seconds '{}': {}", s, e))?;
    if !value.is_finite() || value < 0.0 {
        return Err(format!("seconds must be a non-negative number, got {}", s));
    }
    Duration::try_from_secs_f64(value).map_err(|e| format!("{} seconds: {}", s, e))
}
