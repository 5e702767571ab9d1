//! Dashboard server and CSV logger for an environmental sensor.
//!
//! One task owns everything: it polls the sensor, keeps running min/max
//! extremes, appends a row to a CSV log on a fixed interval, and serves a
//! small set of routes to one client at a time. The hardware sits behind the
//! traits in [`collaborators`] so the core runs on any host.
//!
//! Module boundaries follow the same pattern throughout: each module exposes
//! its surface through `pub use` in its parent and keeps helpers private.

pub mod collaborators;
pub mod config;
pub mod csv_log;
pub mod errors;
pub mod extremes;
pub mod http;
pub mod models;
pub mod server;

pub use config::Config;
pub use server::{Server, ServerState};
