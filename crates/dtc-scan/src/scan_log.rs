//! Scan log: one appended text block per DTC scan

use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::Path;

use chrono::{DateTime, Local};
use obd_protocol::dtc::join_codes;
use obd_protocol::DtcCode;
use obd_scheduler::TIMESTAMP_FORMAT;

const SEPARATOR_WIDTH: usize = 40;

/// Render the block for one scan
pub fn format_block(codes: &[DtcCode], at: DateTime<Local>) -> String {
    let mut block = format!("\n=== Scan DTC - {} ===\n", at.format(TIMESTAMP_FORMAT));
    if codes.is_empty() {
        block.push_str("No DTC found\n");
    } else {
        block.push_str(&format!("DTC found: {}\n", join_codes(codes)));
    }
    block.push_str(&"-".repeat(SEPARATOR_WIDTH));
    block.push('\n');
    block
}

/// Append the block for one scan to `path`, creating the file if needed
pub fn append(path: &Path, codes: &[DtcCode], at: DateTime<Local>) -> io::Result<()> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    file.write_all(format_block(codes, at).as_bytes())?;
    file.flush()
}
