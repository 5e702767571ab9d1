//! Append-only CSV log of sampled readings.
//!
//! The header row is written lazily, the first time a row is appended to a
//! missing or empty file. Rows are CRLF-terminated and never rewritten.

use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, FixedOffset};
use tracing::{debug, warn};

use crate::errors::StorageFault;
use crate::models::{SensorReadings, DATE_FORMAT, TIME_FORMAT};

// ---

/// Fixed column schema of the log.
pub const HEADER: [&str; 8] = [
    "date", "time", "Temp_C", "Temp_F", "Humidity", "Pressure", "Gas", "AQI",
];

#[derive(Debug, Clone)]
pub struct CsvLog {
    path: PathBuf,
}

impl CsvLog {
    // ---
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one row for `readings`, stamped with the write time `at`.
    ///
    /// A failure writing the header is logged and the row is still attempted.
    pub fn append(
        &self,
        readings: &SensorReadings,
        at: DateTime<FixedOffset>,
    ) -> Result<(), StorageFault> {
        // ---
        if let Err(e) = self.ensure_header() {
            warn!(error = %e, "Could not write csv header, appending row anyway");
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| StorageFault::io("open for append", &self.path, e))?;

        let record = [
            at.format(DATE_FORMAT).to_string(),
            at.format(TIME_FORMAT).to_string(),
            format!("{:.2}", readings.temperature_c),
            format!("{:.2}", readings.temperature_f),
            format!("{:.2}", readings.humidity_pct),
            format!("{:.2}", readings.pressure_hpa),
            format!("{:.2}", readings.gas_kohm),
            format!("{:.2}", readings.aqi),
        ];
        self.write_record(file, &record)
    }

    /// Whole log contents; [`StorageFault::NotFound`] when there is no log yet.
    pub fn read_all(&self) -> Result<Vec<u8>, StorageFault> {
        fs::read(&self.path).map_err(|e| StorageFault::io("read", &self.path, e))
    }

    /// Remove the log. Deleting a log that does not exist succeeds.
    pub fn delete(&self) -> Result<(), StorageFault> {
        // ---
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "No csv to delete");
                Ok(())
            }
            Err(e) => Err(StorageFault::io("delete", &self.path, e)),
        }
    }

    fn ensure_header(&self) -> Result<(), StorageFault> {
        // ---
        match fs::metadata(&self.path) {
            Ok(meta) if meta.len() > 0 => return Ok(()),
            Ok(_) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "CSV does not exist, creating it");
            }
            Err(e) => return Err(StorageFault::io("inspect", &self.path, e)),
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| StorageFault::io("create", &self.path, e))?;
        self.write_record(file, &HEADER)
    }

    fn write_record<I, T>(&self, file: File, record: I) -> Result<(), StorageFault>
    where
        I: IntoIterator<Item = T>,
        T: AsRef<[u8]>,
    {
        // ---
        let mut wtr = csv::WriterBuilder::new()
            .has_headers(false)
            .terminator(csv::Terminator::CRLF)
            .quote_style(csv::QuoteStyle::Never)
            .from_writer(file);

        wtr.write_record(record).map_err(|source| StorageFault::Csv {
            path: self.path.clone(),
            source,
        })?;
        wtr.flush()
            .map_err(|e| StorageFault::io("flush", &self.path, e))
    }
}
