//! Sensor data models: the raw quantities a sensor driver reports and the
//! rounded, derived snapshot the rest of the server works with.

use chrono::{DateTime, FixedOffset};
use serde::Deserialize;

use crate::errors::SensorFault;

// ---

/// Raw quantities as reported by the sensor driver.
///
/// Gas resistance arrives in ohms, the unit the BME680 driver reports.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct RawReading {
    // ---
    pub temperature_c: f64,
    pub humidity_pct: f64,
    pub pressure_hpa: f64,
    pub gas_ohms: f64,
}

/// Immutable snapshot taken at one poll instant.
#[derive(Debug, Clone, PartialEq)]
pub struct SensorReadings {
    // ---
    pub temperature_c: f64,
    pub temperature_f: f64,
    pub humidity_pct: f64,
    pub pressure_hpa: f64,
    pub gas_kohm: f64,
    pub aqi: f64,
    pub timestamp: DateTime<FixedOffset>,
}

/// `chrono` format of the log's date column, e.g. `7-3-2025`.
pub const DATE_FORMAT: &str = "%-d-%-m-%Y";

/// `chrono` format of the log's time column, e.g. `9:05:03`.
pub const TIME_FORMAT: &str = "%-H:%M:%S";

/// Round to the fixed two-decimal display precision.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Derived air-quality index: `ln(gas_kohm) + 0.04 * humidity_pct`, rounded.
///
/// The logarithm is undefined for non-positive resistance, which is reported as
/// a [`SensorFault`] instead of letting NaN reach the dashboard.
pub fn aqi(gas_kohm: f64, humidity_pct: f64) -> Result<f64, SensorFault> {
    // ---
    if gas_kohm <= 0.0 || gas_kohm.is_nan() {
        return Err(SensorFault::NonPositiveGas(gas_kohm));
    }
    Ok(round2(gas_kohm.ln() + 0.04 * humidity_pct))
}

/// Transformation helpers
impl RawReading {
    // ---
    pub fn to_readings(&self, at: DateTime<FixedOffset>) -> Result<SensorReadings, SensorFault> {
        // ---
        let fields = [
            ("temperature", self.temperature_c),
            ("humidity", self.humidity_pct),
            ("pressure", self.pressure_hpa),
            ("gas", self.gas_ohms),
        ];
        if let Some(&(name, _)) = fields.iter().find(|(_, v)| !v.is_finite()) {
            return Err(SensorFault::NonFinite(name));
        }

        let humidity_pct = round2(self.humidity_pct);
        let gas_kohm = round2(self.gas_ohms / 1000.0);
        let aqi = aqi(gas_kohm, humidity_pct)?;

        Ok(SensorReadings {
            temperature_c: round2(self.temperature_c),
            temperature_f: round2(self.temperature_c * 9.0 / 5.0 + 32.0),
            humidity_pct,
            pressure_hpa: round2(self.pressure_hpa),
            gas_kohm,
            aqi,
            timestamp: at,
        })
    }
}
