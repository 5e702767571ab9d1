//! Interfaces to everything outside the server core: the sensor driver, the
//! wall clock, static asset storage and the activity LED.
//!
//! Each interface has one host implementation here; tests substitute their own.

use chrono::{DateTime, FixedOffset};

use crate::errors::{SensorFault, StorageFault};
use crate::models::RawReading;
use crate::Config;

mod blobs;
mod clock;
mod indicator;
mod sensor;

pub use blobs::DirBlobStore;
pub use clock::SystemClock;
pub use indicator::LogIndicator;
pub use sensor::{poll, FileSensor, SimulatedSensor, MAX_WARMUP_READS};

// ---

/// Polling interface of the physical sensor driver.
pub trait Sensor: Send {
    fn read(&mut self) -> Result<RawReading, SensorFault>;
}

/// Local date-time source. Epoch seconds come from `DateTime::timestamp`.
pub trait Clock: Send {
    fn now(&self) -> DateTime<FixedOffset>;
}

/// Byte-blob-by-path retrieval for icons, manifest and other static assets.
pub trait BlobStore: Send {
    fn fetch(&self, path: &str) -> Result<Vec<u8>, StorageFault>;
}

/// Fire-and-forget activity indicator.
pub trait ActivityIndicator: Send {
    fn on(&mut self);
    fn off(&mut self);
}

/// The full set of collaborators the server loop owns.
pub struct Collaborators {
    pub sensor: Box<dyn Sensor>,
    pub clock: Box<dyn Clock>,
    pub blobs: Box<dyn BlobStore>,
    pub indicator: Box<dyn ActivityIndicator>,
}

/// Where sensor readings come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SensorSource {
    Simulated,
    File(std::path::PathBuf),
}

impl Collaborators {
    // ---
    /// Build the host collaborators described by `cfg`.
    pub fn from_config(cfg: &Config) -> Self {
        // ---
        let sensor: Box<dyn Sensor> = match &cfg.sensor_source {
            SensorSource::Simulated => Box::new(SimulatedSensor::new()),
            SensorSource::File(path) => Box::new(FileSensor::new(path)),
        };

        Collaborators {
            sensor,
            clock: Box::new(SystemClock::new(cfg.utc_offset)),
            blobs: Box::new(DirBlobStore::new(&cfg.static_dir)),
            indicator: Box::new(LogIndicator::default()),
        }
    }
}
