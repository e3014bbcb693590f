//! Inter-process advisory lock over a zero-byte sentinel file.
//!
//! Uses `flock(2)`. Locks belong to the open file description, so two
//! [`FileLock`] acquisitions exclude each other even inside one process.

use std::fs::{File, OpenOptions};
use std::io::{self, ErrorKind};
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};

use crate::error::StoreError;
use crate::paths::lock_path;

/// Named lock scoped to one document path.
#[derive(Debug, Clone)]
pub struct FileLock {
    path: PathBuf,
}

/// Held lock; released on drop.
#[derive(Debug)]
pub struct FileLockGuard {
    file: File,
}

impl FileLock {
    pub fn for_document(document: &Path) -> Self {
        Self {
            path: lock_path(document),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Block until the exclusive lock is held.
    pub fn acquire(&self) -> Result<FileLockGuard, StoreError> {
        let file = self.open()?;
        loop {
            match flock(&file, libc::LOCK_EX) {
                Ok(()) => return Ok(FileLockGuard { file }),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(source) => {
                    return Err(StoreError::Lock {
                        path: self.path.clone(),
                        source,
                    })
                }
            }
        }
    }

    /// Take the lock only if nobody holds it.
    pub fn try_acquire(&self) -> Result<Option<FileLockGuard>, StoreError> {
        let file = self.open()?;
        match flock(&file, libc::LOCK_EX | libc::LOCK_NB) {
            Ok(()) => Ok(Some(FileLockGuard { file })),
            Err(err) if err.kind() == ErrorKind::WouldBlock => Ok(None),
            Err(source) => Err(StoreError::Lock {
                path: self.path.clone(),
                source,
            }),
        }
    }

    fn open(&self) -> Result<File, StoreError> {
        OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&self.path)
            .map_err(|source| StoreError::Lock {
                path: self.path.clone(),
                source,
            })
    }
}

impl Drop for FileLockGuard {
    fn drop(&mut self) {
        let _ = flock(&self.file, libc::LOCK_UN);
    }
}

fn flock(file: &File, operation: libc::c_int) -> io::Result<()> {
    // SAFETY: the descriptor is owned by `file` and stays open for the call.
    let rc = unsafe { libc::flock(file.as_raw_fd(), operation) };
    if rc == 0 {
        Ok(())
    } else {
        Err(io::Error::last_os_error())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn lock_file_is_created_empty() {
        let tmp = TempDir::new().unwrap();
        let lock = FileLock::for_document(&tmp.path().join("doc.yaml"));
        let _guard = lock.acquire().unwrap();
        let meta = std::fs::metadata(lock.path()).unwrap();
        assert_eq!(meta.len(), 0);
        assert_eq!(lock.path().file_name().unwrap(), ".filelock.doc.yaml");
    }

    #[test]
    fn held_lock_excludes_second_holder() {
        let tmp = TempDir::new().unwrap();
        let doc = tmp.path().join("doc.yaml");
        let first = FileLock::for_document(&doc);
        let second = FileLock::for_document(&doc);

        let guard = first.acquire().unwrap();
        assert!(second.try_acquire().unwrap().is_none());
        drop(guard);
        assert!(second.try_acquire().unwrap().is_some());
    }

    #[test]
    fn missing_directory_is_a_lock_error() {
        let tmp = TempDir::new().unwrap();
        let lock = FileLock::for_document(&tmp.path().join("gone").join("doc.yaml"));
        let err = lock.acquire().unwrap_err();
        assert!(matches!(err, StoreError::Lock { .. }), "got: {err}");
    }
}
