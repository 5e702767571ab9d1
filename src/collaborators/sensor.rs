use std::fs;
use std::path::PathBuf;

use chrono::{DateTime, FixedOffset};
use tracing::debug;

use super::Sensor;
use crate::errors::SensorFault;
use crate::models::{RawReading, SensorReadings};

// ---

/// Upper bound on warm-up reads per poll.
pub const MAX_WARMUP_READS: u8 = 5;

/// Poll `sensor` for a trustworthy snapshot stamped `at`.
///
/// Performs `warmup_reads` reads (clamped to `1..=MAX_WARMUP_READS`) and keeps
/// the last one, giving the sensor time to settle after an idle period. Only
/// the final read decides success; earlier failures are discarded.
pub fn poll(
    sensor: &mut dyn Sensor,
    warmup_reads: u8,
    at: DateTime<FixedOffset>,
) -> Result<SensorReadings, SensorFault> {
    // ---
    let reads = warmup_reads.clamp(1, MAX_WARMUP_READS);
    for n in 1..reads {
        if let Err(e) = sensor.read() {
            debug!(read = n, error = %e, "Discarded warm-up read failed");
        }
    }
    sensor.read()?.to_readings(at)
}

/// Deterministic drifting readings for hosts without sensor hardware.
#[derive(Debug, Default)]
pub struct SimulatedSensor {
    step: u64,
}

impl SimulatedSensor {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Sensor for SimulatedSensor {
    fn read(&mut self) -> Result<RawReading, SensorFault> {
        // ---
        self.step += 1;
        let t = self.step as f64;
        Ok(RawReading {
            temperature_c: 22.0 + 2.5 * (t / 240.0).sin(),
            humidity_pct: 55.0 + 8.0 * (t / 360.0).cos(),
            pressure_hpa: 1013.0 + 3.0 * (t / 900.0).sin(),
            gas_ohms: 60_000.0 + 15_000.0 * (t / 120.0).sin(),
        })
    }
}

/// Reads the latest sample from a JSON file maintained by an external driver.
///
/// Expected shape:
/// `{"temperature_c": 21.3, "humidity_pct": 48.2, "pressure_hpa": 1012.6, "gas_ohms": 58231}`
#[derive(Debug, Clone)]
pub struct FileSensor {
    path: PathBuf,
}

impl FileSensor {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl Sensor for FileSensor {
    fn read(&mut self) -> Result<RawReading, SensorFault> {
        // ---
        let text = fs::read_to_string(&self.path)
            .map_err(|e| SensorFault::Read(format!("{}: {}", self.path.display(), e)))?;
        serde_json::from_str(&text)
            .map_err(|e| SensorFault::Read(format!("{}: {}", self.path.display(), e)))
    }
}
