//! Fault taxonomy for the dashboard server.
//!
//! None of these faults is fatal. Each one is logged by whoever catches it and
//! the server loop carries on: a sensor fault skips one poll cycle, a storage
//! fault degrades a payload to empty, and a connection fault drops one client.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

// ---

/// A poll produced no trustworthy reading.
#[derive(Debug, Error)]
pub enum SensorFault {
    // ---
    #[error("sensor read failed: {0}")]
    Read(String),

    #[error("gas resistance must be positive, got {0} kOhm")]
    NonPositiveGas(f64),

    #[error("{0} reading is not a finite number")]
    NonFinite(&'static str),
}

/// Log file or static asset storage failed.
#[derive(Debug, Error)]
pub enum StorageFault {
    // ---
    #[error("{} not found", path.display())]
    NotFound { path: PathBuf },

    #[error("failed to {action} {}: {source}", path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to write csv record to {}: {source}", path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}

impl StorageFault {
    // ---
    /// Classify an I/O error, folding `ErrorKind::NotFound` into [`StorageFault::NotFound`].
    pub fn io(action: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        // ---
        let path = path.into();
        if source.kind() == io::ErrorKind::NotFound {
            StorageFault::NotFound { path }
        } else {
            StorageFault::Io {
                action,
                path,
                source,
            }
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageFault::NotFound { .. })
    }
}

/// Accepting, reading from, or writing to a client failed.
#[derive(Debug, Error)]
pub enum ConnectionFault {
    // ---
    #[error("accept failed: {0}")]
    Accept(#[source] io::Error),

    #[error("reading request failed: {0}")]
    Read(#[source] io::Error),

    #[error("sending response failed: {0}")]
    Send(#[source] io::Error),

    #[error("{0} timed out")]
    TimedOut(&'static str),
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    #[test]
    fn missing_file_is_classified_as_not_found() {
        // ---
        let err = io::Error::new(io::ErrorKind::NotFound, "gone");
        let fault = StorageFault::io("open", "stats.csv", err);
        assert!(fault.is_not_found());
        assert_eq!(fault.to_string(), "stats.csv not found");
    }

    #[test]
    fn other_io_errors_keep_their_action() {
        // ---
        let err = io::Error::new(io::ErrorKind::PermissionDenied, "read-only");
        let fault = StorageFault::io("append to", "stats.csv", err);
        assert!(!fault.is_not_found());
        assert_eq!(fault.to_string(), "failed to append to stats.csv: read-only");
    }
}
