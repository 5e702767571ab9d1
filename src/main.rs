//! Entry point for the `tent-sensor-dashboard` binary.
//!
//! Startup sequence:
//! - Load `.env` if present, then initialize structured logging
//! - Read configuration from the environment and log it
//! - Build the host collaborators (sensor, clock, static store, indicator)
//! - Bind the listener and run the server loop forever
//!
//! # Environment Variables
//! - `LOG_LEVEL` (optional) – log verbosity (default: `debug`)
//! - `LOG_SPAN_EVENTS` (optional) – span event mode for tracing
//! - `FORCE_COLOR` (optional) – override TTY color detection
//!
//! Every other knob is documented on [`tent_sensor_dashboard::config::load_with`].
use std::env;

use anyhow::Result;
use dotenvy::dotenv;
use is_terminal::IsTerminal;
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;

use tent_sensor_dashboard::collaborators::Collaborators;
use tent_sensor_dashboard::{config, Server};

// ---

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // ---
    dotenv().ok();
    init_tracing();

    tracing::info!(
        "{} v{} starting on {}/{}",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION"),
        env::consts::OS,
        env::consts::ARCH
    );

    let cfg = config::load_from_env()?;
    cfg.log_config();

    let collaborators = Collaborators::from_config(&cfg);
    let server = Server::bind(cfg, collaborators).await?;
    tracing::info!("Listening on {}", server.local_addr()?);

    server.run().await;
    Ok(())
}

// ---

/// Initialize the global tracing subscriber for structured logging.
///
/// - Target, file and line number are included in every event
/// - Color follows `FORCE_COLOR` (`1|true|yes` on, `0|false|no` off),
///   otherwise TTY detection on stdout
/// - `LOG_SPAN_EVENTS` selects span events:
///   - `"full"`       : ENTER, EXIT and CLOSE with timing
///   - `"enter_exit"` : ENTER and EXIT only
///   - unset or other values: CLOSE only
/// - `RUST_LOG` wins when set, otherwise `LOG_LEVEL` picks the level
///
/// Call once, before the first log line.
fn init_tracing() {
    // ---
    let span_events = match env::var("LOG_SPAN_EVENTS").as_deref() {
        Ok("full") => FmtSpan::FULL,
        Ok("enter_exit") => FmtSpan::ENTER | FmtSpan::EXIT,
        _ => FmtSpan::CLOSE,
    };

    let use_color = match env::var("FORCE_COLOR").as_deref() {
        Ok("1") | Ok("true") | Ok("yes") => true,
        Ok("0") | Ok("false") | Ok("no") => false,
        _ => std::io::stdout().is_terminal(),
    };

    let env_filter = if env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        let level = match env::var("LOG_LEVEL").ok().as_deref() {
            Some("trace") => "trace",
            Some("debug") => "debug",
            Some("info") => "info",
            Some("warn") => "warn",
            Some("error") => "error",
            _ => "debug",
        };
        EnvFilter::new(level)
    };

    tracing_subscriber::fmt()
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .with_span_events(span_events)
        .with_env_filter(env_filter)
        .with_ansi(use_color)
        .compact()
        .init();
}
