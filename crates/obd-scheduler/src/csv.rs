//! CSV sink for live rows

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::sample::LiveRow;

/// Writes `timestamp,<label>...` once, then one record per row.
///
/// Every row is flushed so an abrupt stop loses at most the row in progress.
/// The file is flushed again and closed when the sink is closed or dropped.
pub struct CsvSink {
    path: PathBuf,
    writer: Option<BufWriter<File>>,
    columns: Vec<String>,
    header_written: bool,
    rows_written: u64,
}

impl CsvSink {
    /// Create (truncate) the CSV file at `path`
    pub fn create(path: &Path, columns: Vec<String>) -> io::Result<Self> {
        let file = File::create(path)?;
        info!("Writing live data to {}", path.display());
        Ok(Self {
            path: path.to_path_buf(),
            writer: Some(BufWriter::new(file)),
            columns,
            header_written: false,
            rows_written: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Data rows written so far
    pub fn rows_written(&self) -> u64 {
        self.rows_written
    }

    /// Append one row, writing the header first if needed
    pub fn write_row(&mut self, row: &LiveRow) -> io::Result<()> {
        if row.samples.len() != self.columns.len() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!(
                    "row has {} values, header has {} PIDs",
                    row.samples.len(),
                    self.columns.len()
                ),
            ));
        }

        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::BrokenPipe, "CSV sink closed"))?;

        if !self.header_written {
            let mut header = String::from("timestamp");
            for name in &self.columns {
                header.push(',');
                header.push_str(name);
            }
            writeln!(writer, "{}", header)?;
            self.header_written = true;
        }

        writeln!(writer, "{}", row.csv_record())?;
        writer.flush()?;
        self.rows_written += 1;
        Ok(())
    }

    /// Flush and close the file
    pub fn close(mut self) -> io::Result<()> {
        self.finish()
    }

    fn finish(&mut self) -> io::Result<()> {
        match self.writer.take() {
            Some(mut writer) => {
                writer.flush()?;
                debug!(
                    "Closed {} after {} rows",
                    self.path.display(),
                    self.rows_written
                );
                Ok(())
            }
            None => Ok(()),
        }
    }
}

impl Drop for CsvSink {
    fn drop(&mut self) {
        let _ = self.finish();
    }
}
