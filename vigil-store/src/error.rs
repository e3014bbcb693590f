//! Error types for vigil-store.

use std::path::PathBuf;

use thiserror::Error;

/// All errors that can arise from store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A value could not be represented in the document format. Nothing was
    /// written and the in-memory document is unchanged.
    #[error("{key}: value of type {type_name} is not serializable as YAML: {reason}")]
    Unserializable {
        key: String,
        type_name: &'static str,
        reason: String,
    },

    /// A stored value does not decode into the requested type.
    #[error("{key}: stored value does not decode: {source}")]
    Decode {
        key: String,
        #[source]
        source: serde_yaml::Error,
    },

    /// The backing file is not a YAML mapping of string keys.
    #[error("malformed document at {path}: {source}")]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// YAML emission failed while persisting.
    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// An I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The inter-process lock could not be taken.
    #[error("failed to lock {path}: {source}")]
    Lock {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The reactive thread could not be started.
    #[error("monitor error: {0}")]
    Monitor(#[from] vigil_monitor::MonitorError),

    /// The path has no file name component.
    #[error("not a document path: {path}")]
    InvalidPath { path: PathBuf },

    /// `dirs::home_dir()` returned `None`.
    #[error("cannot determine home directory; set $HOME or equivalent")]
    HomeNotFound,
}

/// Convenience constructor for [`StoreError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> StoreError {
    StoreError::Io {
        path: path.into(),
        source,
    }
}
