//! # vigil-store
//!
//! Persistent YAML key/value documents with inter-process locking.
//!
//! - One [`Store`] per canonical path per process, via [`StoreRegistry`].
//! - Writes are idempotent, atomic on disk, and rolled back on failure.
//! - An optional reactive thread reports external edits as per-key diffs.

pub mod document;
pub mod error;
pub mod lock;
pub mod paths;
mod reactive;
pub mod registry;
pub mod store;

pub use document::{Document, KeyChange};
pub use error::StoreError;
pub use lock::{FileLock, FileLockGuard};
pub use registry::StoreRegistry;
pub use serde_yaml::Value;
pub use store::{ChangeCallback, Store};
