//! Content-fingerprint change detection for a single file.
//!
//! Every observation starts with a `stat`. Only when the modification time
//! moved is the file read and hashed, and only a new SHA-256 digest counts as
//! a change. A touch that leaves the bytes alone is therefore invisible.

use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use sha2::{Digest, Sha256};

/// SHA-256 hex digest of a file's bytes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn of(bytes: &[u8]) -> Self {
        let mut h = Sha256::new();
        h.update(bytes);
        Self(hex::encode(h.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Outcome of one [`ChangeProbe::observe`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Observation {
    /// Same timestamp, or a new timestamp over identical bytes.
    Unchanged,
    /// The content digest differs from the last one seen.
    Changed,
    /// The file is gone, either at stat time or before it could be read.
    Missing,
    /// The file could not be read this cycle (e.g. permission denied).
    Skipped,
}

/// Remembers the last timestamp and fingerprint seen for one path.
#[derive(Debug, Clone)]
pub struct ChangeProbe {
    path: PathBuf,
    last_seen: Option<SystemTime>,
    fingerprint: Option<Fingerprint>,
}

impl ChangeProbe {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            last_seen: None,
            fingerprint: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn fingerprint(&self) -> Option<&Fingerprint> {
        self.fingerprint.as_ref()
    }

    /// Record the current state without reporting it.
    pub fn prime(&mut self) {
        let _ = self.observe();
    }

    /// Stat the file and, if its timestamp moved, compare content digests.
    ///
    /// The timestamp is committed only once the content has been read, so a
    /// skipped cycle is retried on the next call.
    pub fn observe(&mut self) -> Observation {
        let modified = match fs::metadata(&self.path).and_then(|m| m.modified()) {
            Ok(modified) => modified,
            Err(err) if err.kind() == ErrorKind::NotFound => return Observation::Missing,
            Err(err) => {
                tracing::warn!(path = %self.path.display(), error = %err, "stat failed");
                return Observation::Skipped;
            }
        };

        if self.last_seen == Some(modified) {
            return Observation::Unchanged;
        }

        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == ErrorKind::NotFound => return Observation::Missing,
            Err(err) if err.kind() == ErrorKind::PermissionDenied => {
                tracing::debug!(path = %self.path.display(), "read denied, retrying next cycle");
                return Observation::Skipped;
            }
            Err(err) => {
                tracing::warn!(path = %self.path.display(), error = %err, "read failed");
                return Observation::Skipped;
            }
        };
        self.last_seen = Some(modified);

        let digest = Fingerprint::of(&bytes);
        if self.fingerprint.as_ref() == Some(&digest) {
            return Observation::Unchanged;
        }
        self.fingerprint = Some(digest);
        Observation::Changed
    }
}
