//! Running min/max envelope across the tracked metrics.
//!
//! Kept in memory only; a restart starts a fresh envelope.

use crate::models::SensorReadings;

// ---

/// Metrics whose extremes are tracked for the dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    // ---
    TemperatureF,
    Humidity,
    Pressure,
    Gas,
    Aqi,
}

impl Metric {
    // ---
    pub const ALL: [Metric; 5] = [
        Metric::TemperatureF,
        Metric::Humidity,
        Metric::Pressure,
        Metric::Gas,
        Metric::Aqi,
    ];

    pub fn value_of(self, readings: &SensorReadings) -> f64 {
        // ---
        match self {
            Metric::TemperatureF => readings.temperature_f,
            Metric::Humidity => readings.humidity_pct,
            Metric::Pressure => readings.pressure_hpa,
            Metric::Gas => readings.gas_kohm,
            Metric::Aqi => readings.aqi,
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

/// One `(min, max)` pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MinMax {
    pub min: f64,
    pub max: f64,
}

impl MinMax {
    // ---
    /// Sentinel pair: any finite sample replaces both bounds.
    const UNOBSERVED: MinMax = MinMax {
        min: f64::INFINITY,
        max: f64::NEG_INFINITY,
    };

    fn observe(&mut self, value: f64) {
        // ---
        self.min = self.min.min(value);
        self.max = self.max.max(value);
    }

    fn is_observed(&self) -> bool {
        self.min <= self.max
    }
}

/// Min/max tracker fed from every successful poll.
#[derive(Debug, Clone)]
pub struct RunningExtremes {
    ranges: [MinMax; 5],
}

/// Rendering view of [`RunningExtremes`]; `None` until a sample has been seen.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtremesSnapshot {
    pub temperature_f: Option<MinMax>,
    pub humidity: Option<MinMax>,
    pub pressure: Option<MinMax>,
    pub gas: Option<MinMax>,
    pub aqi: Option<MinMax>,
}

impl Default for RunningExtremes {
    fn default() -> Self {
        Self::new()
    }
}

impl RunningExtremes {
    // ---
    pub fn new() -> Self {
        Self {
            ranges: [MinMax::UNOBSERVED; 5],
        }
    }

    /// Widen the envelope to include `readings`. Bounds only ever move outward.
    pub fn observe(&mut self, readings: &SensorReadings) {
        // ---
        for metric in Metric::ALL {
            self.ranges[metric.index()].observe(metric.value_of(readings));
        }
    }

    pub fn get(&self, metric: Metric) -> Option<MinMax> {
        // ---
        let range = self.ranges[metric.index()];
        range.is_observed().then_some(range)
    }

    pub fn snapshot(&self) -> ExtremesSnapshot {
        // ---
        ExtremesSnapshot {
            temperature_f: self.get(Metric::TemperatureF),
            humidity: self.get(Metric::Humidity),
            pressure: self.get(Metric::Pressure),
            gas: self.get(Metric::Gas),
            aqi: self.get(Metric::Aqi),
        }
    }
}
