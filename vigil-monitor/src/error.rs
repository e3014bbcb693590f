//! Error types for vigil-monitor.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can arise while starting or reconciling monitors.
///
/// Transient races (a file vanishing between stat and read, a permission
/// denied read) never surface here; they are absorbed by the poll loop.
#[derive(Debug, Error)]
pub enum MonitorError {
    /// An I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The polling thread could not be spawned.
    #[error("failed to spawn poller thread for {path}: {source}")]
    Spawn {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A registered factory refused to build a child monitor.
    #[error("factory for {path} failed: {source}")]
    Factory {
        path: PathBuf,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

/// Convenience constructor for [`MonitorError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> MonitorError {
    MonitorError::Io {
        path: path.into(),
        source,
    }
}

impl MonitorError {
    /// Wrap any error raised by a child factory.
    pub fn factory(
        path: impl Into<PathBuf>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        MonitorError::Factory {
            path: path.into(),
            source: source.into(),
        }
    }
}
