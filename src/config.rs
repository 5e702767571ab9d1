//! Configuration loader for the sensor dashboard server.
//!
//! This module centralizes all runtime configuration values and their defaults,
//! loading from environment variables (with optional `.env` file support
//! provided by the caller). By consolidating configuration logic here, we
//! avoid scattering `env::var` calls throughout the codebase.
//!
use std::env;
use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{anyhow, Result};
use chrono::{FixedOffset, Offset, Utc};

use crate::collaborators::{SensorSource, MAX_WARMUP_READS};

/// Parse an optional environment variable into `$ty`, falling back to a default.
macro_rules! parse_env {
    ($lookup:expr, $var_name:expr, $ty:ty, $default:expr) => {
        $lookup($var_name)
            .map(|v| v.trim().parse::<$ty>())
            .transpose()
            .map_err(|e| anyhow!("Invalid {}: {}", $var_name, e))?
            .unwrap_or($default)
    };
}

/// Read an optional string environment variable with a default.
macro_rules! string_env {
    ($lookup:expr, $var_name:expr, $default:expr) => {
        $lookup($var_name).unwrap_or_else(|| String::from($default))
    };
}

/// Strongly typed application configuration.
///
/// All fields are immutable after loading, ensuring a consistent configuration
/// snapshot for the lifetime of the server loop.
#[derive(Debug, Clone)]
pub struct Config {
    // ---
    /// Local address the device was given by network bring-up.
    pub bind_addr: IpAddr,

    /// TCP port to listen on.
    pub port: u16,

    /// Pending connection queue depth.
    pub listen_backlog: u32,

    /// CSV log location.
    pub log_path: PathBuf,

    /// Root of the static asset store.
    pub static_dir: PathBuf,

    /// Minimum seconds between CSV samples.
    pub sample_interval_secs: i64,

    /// Seconds between idle-time sensor polls.
    pub poll_interval_secs: i64,

    /// Bounded wait for an inbound connection before housekeeping runs.
    pub accept_wait: Duration,

    /// Budget for reading one request and sending its response.
    pub socket_timeout: Duration,

    /// Discarded sensor reads per poll, `1..=5`.
    pub warmup_reads: u8,

    /// Fixed local offset applied to the system clock.
    pub utc_offset: FixedOffset,

    /// Dashboard auto-refresh period in seconds.
    pub refresh_secs: u32,

    /// Dashboard auto-refresh target.
    pub refresh_url: String,

    /// Dashboard title.
    pub site_title: String,

    /// Sensor implementation to poll.
    pub sensor_source: SensorSource,
}

impl Default for Config {
    fn default() -> Self {
        // ---
        Config {
            bind_addr: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: 8080,
            listen_backlog: 3,
            log_path: PathBuf::from("stats.csv"),
            static_dir: PathBuf::from("static"),
            sample_interval_secs: 3600,
            poll_interval_secs: 10,
            accept_wait: Duration::from_millis(1000),
            socket_timeout: Duration::from_secs(30),
            warmup_reads: 3,
            utc_offset: Utc.fix(),
            refresh_secs: 15,
            refresh_url: String::from("/"),
            site_title: String::from("Plant Tent"),
            sensor_source: SensorSource::Simulated,
        }
    }
}

/// Load configuration from environment variables with defaults.
///
/// Optional:
/// - `BIND_ADDR` – local IP to bind (default: 0.0.0.0)
/// - `PORT` – TCP port (default: 8080)
/// - `LISTEN_BACKLOG` – accept queue depth (default: 3)
/// - `LOG_PATH` – CSV log file (default: stats.csv)
/// - `STATIC_DIR` – static asset root (default: static)
/// - `SAMPLE_INTERVAL_SECS` – CSV sample interval (default: 3600)
/// - `POLL_INTERVAL_SECS` – idle sensor poll interval (default: 10)
/// - `ACCEPT_WAIT_MS` – bounded accept wait (default: 1000)
/// - `SOCKET_TIMEOUT_SECS` – per-connection budget (default: 30)
/// - `WARMUP_READS` – warm-up reads per poll, 1..=5 (default: 3)
/// - `UTC_OFFSET_MINUTES` – local clock offset (default: 0)
/// - `REFRESH_SECS` / `REFRESH_URL` – dashboard auto-refresh (default: 15, /)
/// - `SITE_TITLE` – dashboard title (default: Plant Tent)
/// - `SENSOR_SOURCE` – `simulated` or a path to a JSON reading file
///
/// Returns an error if any variable is present but invalid.
pub fn load_from_env() -> Result<Config> {
    load_with(|name| env::var(name).ok())
}

/// Load configuration through an arbitrary variable lookup.
pub fn load_with<F>(lookup: F) -> Result<Config>
where
    F: Fn(&str) -> Option<String>,
{
    // ---
    let defaults = Config::default();

    let bind_addr = parse_env!(lookup, "BIND_ADDR", IpAddr, defaults.bind_addr);
    let port = parse_env!(lookup, "PORT", u16, defaults.port);
    let listen_backlog = parse_env!(lookup, "LISTEN_BACKLOG", u32, defaults.listen_backlog);
    let log_path = PathBuf::from(string_env!(lookup, "LOG_PATH", "stats.csv"));
    let static_dir = PathBuf::from(string_env!(lookup, "STATIC_DIR", "static"));
    let sample_interval_secs = parse_env!(lookup, "SAMPLE_INTERVAL_SECS", u32, 3600);
    let poll_interval_secs = parse_env!(lookup, "POLL_INTERVAL_SECS", u32, 10);
    let accept_wait_ms = parse_env!(lookup, "ACCEPT_WAIT_MS", u64, 1000);
    let socket_timeout_secs = parse_env!(lookup, "SOCKET_TIMEOUT_SECS", u64, 30);
    let warmup_reads = parse_env!(lookup, "WARMUP_READS", u8, defaults.warmup_reads);
    let utc_offset_minutes = parse_env!(lookup, "UTC_OFFSET_MINUTES", i32, 0);
    let refresh_secs = parse_env!(lookup, "REFRESH_SECS", u32, defaults.refresh_secs);
    let refresh_url = string_env!(lookup, "REFRESH_URL", "/");
    let site_title = string_env!(lookup, "SITE_TITLE", "Plant Tent");
    let sensor_source = match lookup("SENSOR_SOURCE").as_deref().map(str::trim) {
        None | Some("") | Some("simulated") => SensorSource::Simulated,
        Some(path) => SensorSource::File(PathBuf::from(path)),
    };

    if !(1..=MAX_WARMUP_READS).contains(&warmup_reads) {
        return Err(anyhow!(
            "Invalid WARMUP_READS: {} (expected 1..={})",
            warmup_reads,
            MAX_WARMUP_READS
        ));
    }
    if accept_wait_ms == 0 || socket_timeout_secs == 0 {
        return Err(anyhow!("ACCEPT_WAIT_MS and SOCKET_TIMEOUT_SECS must be non-zero"));
    }
    let utc_offset = FixedOffset::east_opt(utc_offset_minutes.saturating_mul(60))
        .ok_or_else(|| anyhow!("Invalid UTC_OFFSET_MINUTES: {}", utc_offset_minutes))?;

    Ok(Config {
        bind_addr,
        port,
        listen_backlog,
        log_path,
        static_dir,
        sample_interval_secs: i64::from(sample_interval_secs),
        poll_interval_secs: i64::from(poll_interval_secs),
        accept_wait: Duration::from_millis(accept_wait_ms),
        socket_timeout: Duration::from_secs(socket_timeout_secs),
        warmup_reads,
        utc_offset,
        refresh_secs,
        refresh_url,
        site_title,
        sensor_source,
    })
}

impl Config {
    /// Log the loaded configuration for debugging purposes.
    pub fn log_config(&self) {
        // ---
        tracing::info!("Configuration loaded:");
        tracing::info!("  BIND_ADDR            : {}:{}", self.bind_addr, self.port);
        tracing::info!("  LISTEN_BACKLOG       : {}", self.listen_backlog);
        tracing::info!("  LOG_PATH             : {}", self.log_path.display());
        tracing::info!("  STATIC_DIR           : {}", self.static_dir.display());
        tracing::info!("  SAMPLE_INTERVAL_SECS : {}", self.sample_interval_secs);
        tracing::info!("  POLL_INTERVAL_SECS   : {}", self.poll_interval_secs);
        tracing::info!("  ACCEPT_WAIT          : {:?}", self.accept_wait);
        tracing::info!("  SOCKET_TIMEOUT       : {:?}", self.socket_timeout);
        tracing::info!("  WARMUP_READS         : {}", self.warmup_reads);
        tracing::info!("  UTC_OFFSET           : {}", self.utc_offset);
        tracing::info!("  REFRESH              : {}s -> {}", self.refresh_secs, self.refresh_url);
        tracing::info!("  SITE_TITLE           : {}", self.site_title);
        tracing::info!("  SENSOR_SOURCE        : {:?}", self.sensor_source);
    }
}
