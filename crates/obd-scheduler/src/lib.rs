//! Live OBD-II Telemetry
//!
//! Polls a fixed list of Mode 01 PIDs on a fixed cadence, one row per tick,
//! rendered to the console and optionally appended to a CSV file.

mod csv;
mod sample;
mod scheduler;

pub use csv::CsvSink;
pub use sample::{LiveRow, LiveSample, TIMESTAMP_FORMAT};
pub use scheduler::{inter_tick_delay, LiveConfig, LiveError, LivePoller, LiveSummary, MIN_TICK_PERIOD};
