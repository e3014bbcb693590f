//! Where documents and their lock files live.
//!
//! ```text
//! ~/.vigil/
//!   <watched file name>.yaml        (one document per watched file)
//!   .filelock.<watched file name>.yaml
//! ```
//!
//! Helpers taking an explicit `home` are the ones tests use; the no-arg
//! forms resolve `dirs::home_dir()` and delegate.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{io_err, StoreError};

pub const STATE_DIR_NAME: &str = ".vigil";
pub const LOCK_PREFIX: &str = ".filelock.";

/// `<home>/.vigil`
pub fn state_dir_at(home: &Path) -> PathBuf {
    home.join(STATE_DIR_NAME)
}

/// `~/.vigil` (resolved through `dirs::home_dir()`).
pub fn state_dir() -> Result<PathBuf, StoreError> {
    dirs::home_dir()
        .map(|home| state_dir_at(&home))
        .ok_or(StoreError::HomeNotFound)
}

/// `<state_dir>/<base name of watched>.yaml`. Pure, no I/O.
pub fn document_path_at(state_dir: &Path, watched: &Path) -> PathBuf {
    let name = watched
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    state_dir.join(format!("{name}.yaml"))
}

/// Zero-byte lock target next to `document`: `.filelock.<name>`.
pub fn lock_path(document: &Path) -> PathBuf {
    let name = document
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    document.with_file_name(format!("{LOCK_PREFIX}{name}"))
}

/// Absolute, symlink-free form of `path`, used as the sharing key.
///
/// An existing document is resolved in full, so a symlinked document maps to
/// its target. Otherwise only the parent directory has to exist, so a
/// document that has not been created yet still has a canonical path.
pub fn canonical_path(path: &Path) -> Result<PathBuf, StoreError> {
    let Some(file_name) = path.file_name() else {
        return Err(StoreError::InvalidPath {
            path: path.to_path_buf(),
        });
    };
    if path.exists() {
        return fs::canonicalize(path).map_err(|e| io_err(path, e));
    }
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let dir = fs::canonicalize(parent).map_err(|e| io_err(parent, e))?;
    Ok(dir.join(file_name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn document_path_uses_full_base_name() {
        let state = Path::new("/home/me/.vigil");
        assert_eq!(
            document_path_at(state, Path::new("/photos/cat.png")),
            PathBuf::from("/home/me/.vigil/cat.png.yaml")
        );
    }

    #[test]
    fn lock_file_is_dot_prefixed_sibling() {
        assert_eq!(
            lock_path(Path::new("/data/settings.yaml")),
            PathBuf::from("/data/.filelock.settings.yaml")
        );
    }

    #[test]
    fn canonical_path_resolves_dot_dot_before_file_exists() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir(tmp.path().join("sub")).unwrap();

        let direct = canonical_path(&tmp.path().join("doc.yaml")).unwrap();
        let roundabout = canonical_path(&tmp.path().join("sub").join("..").join("doc.yaml")).unwrap();
        assert_eq!(direct, roundabout);
        assert!(direct.is_absolute());
    }

    #[test]
    fn canonical_path_resolves_symlinked_document() {
        let tmp = TempDir::new().unwrap();
        let real = tmp.path().join("real.yaml");
        fs::write(&real, "a: 1\n").unwrap();
        std::os::unix::fs::symlink(&real, tmp.path().join("link.yaml")).unwrap();

        assert_eq!(
            canonical_path(&tmp.path().join("link.yaml")).unwrap(),
            canonical_path(&real).unwrap()
        );
    }

    #[test]
    fn canonical_path_rejects_missing_parent() {
        let tmp = TempDir::new().unwrap();
        let err = canonical_path(&tmp.path().join("nope").join("doc.yaml")).unwrap_err();
        assert!(matches!(err, StoreError::Io { .. }), "got: {err}");
    }

    #[test]
    fn canonical_path_rejects_dot_dot_file_name() {
        let err = canonical_path(Path::new("a/..")).unwrap_err();
        assert!(matches!(err, StoreError::InvalidPath { .. }));
    }
}
