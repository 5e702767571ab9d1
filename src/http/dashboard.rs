//! Dashboard page: a structured view model rendered through a `minijinja` template.

use minijinja::Environment;
use serde::Serialize;

use crate::extremes::{ExtremesSnapshot, MinMax};
use crate::models::SensorReadings;

// ---

const TEMPLATE_NAME: &str = "dashboard.html";
const TEMPLATE_SOURCE: &str = include_str!("../../templates/dashboard.html");

/// Display strings for the current snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReadingsView {
    pub temperature_f: String,
    pub temperature_c: String,
    pub humidity: String,
    pub pressure: String,
    pub gas: String,
    pub aqi: String,
}

impl From<&SensorReadings> for ReadingsView {
    fn from(r: &SensorReadings) -> Self {
        // ---
        ReadingsView {
            temperature_f: format!("{:.2}", r.temperature_f),
            temperature_c: format!("{:.2}", r.temperature_c),
            humidity: format!("{:.2}", r.humidity_pct),
            pressure: format!("{:.2}", r.pressure_hpa),
            gas: format!("{:.2}", r.gas_kohm),
            aqi: format!("{:.2}", r.aqi),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnvelopeView {
    pub min: String,
    pub max: String,
}

/// Min/max strings per card; `None` until the metric has been observed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtremesView {
    pub temperature_f: Option<EnvelopeView>,
    pub humidity: Option<EnvelopeView>,
    pub pressure: Option<EnvelopeView>,
    pub gas: Option<EnvelopeView>,
    pub aqi: Option<EnvelopeView>,
}

impl From<&ExtremesSnapshot> for ExtremesView {
    fn from(snap: &ExtremesSnapshot) -> Self {
        // ---
        let view = |range: Option<MinMax>| {
            range.map(|r| EnvelopeView {
                min: format!("{:.2}", r.min),
                max: format!("{:.2}", r.max),
            })
        };
        ExtremesView {
            temperature_f: view(snap.temperature_f),
            humidity: view(snap.humidity),
            pressure: view(snap.pressure),
            gas: view(snap.gas),
            aqi: view(snap.aqi),
        }
    }
}

/// Time since process start, split for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Runtime {
    pub days: i64,
    pub hours: i64,
    pub minutes: i64,
    pub seconds: i64,
}

impl Runtime {
    pub fn from_secs(elapsed: i64) -> Self {
        // ---
        let elapsed = elapsed.max(0);
        Runtime {
            days: elapsed / 86_400,
            hours: elapsed % 86_400 / 3_600,
            minutes: elapsed % 3_600 / 60,
            seconds: elapsed % 60,
        }
    }
}

/// Everything the dashboard template needs.
#[derive(Debug, Clone, Serialize)]
pub struct DashboardView {
    pub title: String,
    pub refresh_secs: u32,
    pub refresh_url: String,
    pub readings: Option<ReadingsView>,
    pub extremes: ExtremesView,
    /// Cache-busting value for the CSV download link.
    pub download_token: i64,
    pub local_time: String,
    pub runtime: Runtime,
}

/// Compiled dashboard template.
pub struct DashboardTemplate {
    env: Environment<'static>,
}

impl DashboardTemplate {
    // ---
    pub fn new() -> Result<Self, minijinja::Error> {
        // ---
        let mut env = Environment::new();
        env.add_template(TEMPLATE_NAME, TEMPLATE_SOURCE)?;
        Ok(Self { env })
    }

    pub fn render(&self, view: &DashboardView) -> Result<String, minijinja::Error> {
        self.env.get_template(TEMPLATE_NAME)?.render(view)
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use crate::extremes::RunningExtremes;
    use chrono::{FixedOffset, TimeZone};

    fn readings(temp_c: f64, humidity: f64) -> SensorReadings {
        // ---
        SensorReadings {
            temperature_c: temp_c,
            temperature_f: temp_c * 9.0 / 5.0 + 32.0,
            humidity_pct: humidity,
            pressure_hpa: 1013.25,
            gas_kohm: 10.0,
            aqi: 4.3,
            timestamp: FixedOffset::east_opt(0)
                .unwrap()
                .with_ymd_and_hms(2025, 6, 14, 9, 30, 0)
                .unwrap(),
        }
    }

    fn view(current: Option<&SensorReadings>, extremes: &RunningExtremes) -> DashboardView {
        // ---
        DashboardView {
            title: "Plant <Tent>".to_string(),
            refresh_secs: 15,
            refresh_url: "/".to_string(),
            readings: current.map(ReadingsView::from),
            extremes: ExtremesView::from(&extremes.snapshot()),
            download_token: 1_718_357_400,
            local_time: "6-14-2025 9:30:00 AM".to_string(),
            runtime: Runtime::from_secs(90_061),
        }
    }

    #[test]
    fn test_runtime_split() {
        // ---
        assert_eq!(
            Runtime::from_secs(90_061),
            Runtime {
                days: 1,
                hours: 1,
                minutes: 1,
                seconds: 1
            }
        );
        assert_eq!(Runtime::from_secs(-5), Runtime::from_secs(0));
        assert_eq!(Runtime::from_secs(86_399).hours, 23);
        assert_eq!(Runtime::from_secs(86_400).days, 1);
    }

    #[test]
    fn test_renders_cards_and_links() {
        // ---
        let mut extremes = RunningExtremes::new();
        let first = readings(21.0, 45.0);
        let second = readings(20.0, 50.0);
        extremes.observe(&first);
        extremes.observe(&second);

        let html = DashboardTemplate::new()
            .unwrap()
            .render(&view(Some(&second), &extremes))
            .unwrap();

        assert!(html.starts_with("<!DOCTYPE HTML>"));
        assert!(html.contains("68.00 F"));
        assert!(html.contains("20.00 C"));
        assert!(html.contains("min: 68.00 F max: 69.80 F"));
        assert!(html.contains("min: 45.00 % max: 50.00 %"));
        assert!(html.contains("AQI: 4.30"));
        assert!(html.contains("10.00 KOhms"));
        assert!(html.contains("1013.25 hPa"));
        assert!(html.contains(r#"href="/stats.csv?token=1718357400""#));
        assert!(html.contains(r#"href="/delete.html""#));
        assert!(html.contains("Runtime: 1 day(s) 1 hour(s) 1 minute(s) 1 second(s)"));
        assert!(html.contains(r#"<meta http-equiv="refresh" content="15;"#));
        assert!(!html.contains("Sensor unavailable"));
    }

    #[test]
    fn test_title_is_escaped() {
        // ---
        let html = DashboardTemplate::new()
            .unwrap()
            .render(&view(None, &RunningExtremes::new()))
            .unwrap();

        assert!(html.contains("Plant &lt;Tent&gt;"));
        assert!(!html.contains("Plant <Tent>"));
    }

    #[test]
    fn test_placeholders_without_readings() {
        // ---
        let html = DashboardTemplate::new()
            .unwrap()
            .render(&view(None, &RunningExtremes::new()))
            .unwrap();

        assert!(html.contains("Sensor unavailable"));
        assert!(html.contains("-- F"));
        assert!(html.contains("min: -- max: --"));
    }
}
