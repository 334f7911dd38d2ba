//! Live samples and rows

use chrono::{DateTime, Local};
use serde::Serialize;

/// Timestamp format for console rows, CSV rows and the scan log
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Marker for an unavailable value
const NOT_AVAILABLE: &str = "NA";

/// One PID reading from one tick
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LiveSample {
    /// When the response was taken
    pub timestamp: DateTime<Local>,
    /// PID label
    pub label: String,
    /// Display unit
    pub unit: &'static str,
    /// Data bytes after the `41 <pid>` header, absent on timeout or bad framing
    pub raw: Option<Vec<u8>>,
    /// Decoded value, absent whenever `raw` is absent or too short
    pub value: Option<f64>,
}

impl LiveSample {
    /// Value column for CSV output
    pub fn csv_value(&self) -> String {
        match self.value {
            Some(value) => format!("{:.2}", value),
            None => NOT_AVAILABLE.to_string(),
        }
    }

    /// `label=value unit`, or `label=NA`
    pub fn render(&self) -> String {
        match self.value {
            Some(value) if self.unit.is_empty() => format!("{}={:.2}", self.label, value),
            Some(value) => format!("{}={:.2} {}", self.label, value, self.unit),
            None => format!("{}={}", self.label, NOT_AVAILABLE),
        }
    }
}

/// All samples of one tick, in request order
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LiveRow {
    /// Tick start time
    pub timestamp: DateTime<Local>,
    pub samples: Vec<LiveSample>,
}

impl LiveRow {
    /// Console line: timestamp then the rendered samples
    pub fn console_line(&self) -> String {
        let mut line = self.timestamp.format(TIMESTAMP_FORMAT).to_string();
        for sample in &self.samples {
            line.push(' ');
            line.push_str(&sample.render());
        }
        line
    }

    /// CSV record in the same column order as the header
    pub fn csv_record(&self) -> String {
        let mut record = self.timestamp.format(TIMESTAMP_FORMAT).to_string();
        for sample in &self.samples {
            record.push(',');
            record.push_str(&sample.csv_value());
        }
        record
    }
}
