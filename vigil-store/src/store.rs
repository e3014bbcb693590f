//! File-backed key/value store.
//!
//! ## Write protocol
//!
//! 1. Convert the value to YAML; failure leaves everything untouched.
//! 2. Compare with the stored value → skip if structurally equal.
//! 3. Take the inter-process lock, snapshot the document, apply.
//! 4. Write `<file>.tmp` and rename over the document.
//! 5. On any failure restore the snapshot; the file was never replaced.
//!
//! Lock order is always the in-process document mutex first, then the file
//! lock.

use std::convert::Infallible;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_yaml::Value;

use vigil_monitor::{ChangeProbe, Poller, POLL_INTERVAL};

use crate::document::{self, Document, KeyChange};
use crate::error::{io_err, StoreError};
use crate::lock::FileLock;
use crate::reactive::ReactiveProbe;
use crate::registry::StoreRegistry;

/// Receives `(key, old, new)` for every key an external edit changed.
///
/// Runs on the store's reactive thread with no store lock held.
pub type ChangeCallback = Arc<dyn Fn(&str, Option<&Value>, Option<&Value>) + Send + Sync>;

pub(crate) struct Inner {
    path: PathBuf,
    lock: FileLock,
    doc: Mutex<Document>,
    reactive: Mutex<Option<Poller<Infallible>>>,
}

/// Handle to the one shared document for a canonical path.
///
/// Clones share the same document. Open stores through a
/// [`StoreRegistry`] (or [`Store::open`], which uses the global one).
#[derive(Clone)]
pub struct Store {
    pub(crate) inner: Arc<Inner>,
}

impl Store {
    /// Open `path` through the process-wide registry.
    pub fn open(path: impl AsRef<Path>) -> Result<Store, StoreError> {
        StoreRegistry::global().open(path)
    }

    /// Open `path` through the process-wide registry and report external
    /// edits to `on_change`. Ignored if the store is already open.
    pub fn open_with_callback<F>(path: impl AsRef<Path>, on_change: F) -> Result<Store, StoreError>
    where
        F: Fn(&str, Option<&Value>, Option<&Value>) + Send + Sync + 'static,
    {
        StoreRegistry::global().open_with_callback(path, on_change)
    }

    /// Build a fresh store for an already canonical path.
    ///
    /// Loads the file if present, otherwise persists an empty document so
    /// the file exists on return.
    pub(crate) fn create(
        path: PathBuf,
        on_change: Option<ChangeCallback>,
    ) -> Result<Store, StoreError> {
        let store = Store {
            inner: Arc::new(Inner {
                lock: FileLock::for_document(&path),
                path,
                doc: Mutex::new(Document::new()),
                reactive: Mutex::new(None),
            }),
        };

        if store.path().exists() {
            store.load()?;
        } else {
            store.save()?;
        }

        if let Some(on_change) = on_change {
            store.start_reactive(on_change)?;
        }
        tracing::debug!(path = %store.path().display(), keys = store.len(), "store opened");
        Ok(store)
    }

    fn start_reactive(&self, on_change: ChangeCallback) -> Result<(), StoreError> {
        let mut probe = ChangeProbe::new(self.path());
        probe.prime();
        let reactive = ReactiveProbe::new(Arc::downgrade(&self.inner), probe, on_change);
        let poller = Poller::start(self.path(), reactive, POLL_INTERVAL)?;
        *self.inner.reactive.lock() = Some(poller);
        Ok(())
    }

    /// Canonical path of the backing document.
    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    /// Whether the reactive thread is running.
    pub fn is_reactive(&self) -> bool {
        self.inner
            .reactive
            .lock()
            .as_ref()
            .is_some_and(|p| p.is_alive())
    }

    /// Whether two handles share one document.
    pub fn same_instance(a: &Store, b: &Store) -> bool {
        Arc::ptr_eq(&a.inner, &b.inner)
    }

    /// Current value for `key`, or `None` if absent. No I/O.
    pub fn get(&self, key: &str) -> Option<Value> {
        self.inner.doc.lock().get(key).cloned()
    }

    /// Current value for `key` decoded as `T`.
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StoreError> {
        let Some(value) = self.get(key) else {
            return Ok(None);
        };
        serde_yaml::from_value(value)
            .map(Some)
            .map_err(|source| StoreError::Decode {
                key: key.to_string(),
                source,
            })
    }

    pub fn contains(&self, key: &str) -> bool {
        self.inner.doc.lock().contains_key(key)
    }

    /// Sorted keys.
    pub fn keys(&self) -> Vec<String> {
        self.inner.doc.lock().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.inner.doc.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.doc.lock().is_empty()
    }

    /// Copy of the whole document.
    pub fn snapshot(&self) -> Document {
        self.inner.doc.lock().clone()
    }

    /// Store `value` under `key` and persist. A YAML null removes the key.
    ///
    /// Returns `false` without locking or writing when the value equals the
    /// stored one (absent counts as null).
    pub fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<bool, StoreError> {
        let value = serde_yaml::to_value(value).map_err(|e| unserializable::<T>(key, e))?;

        let mut doc = self.inner.doc.lock();
        if doc.get(key).unwrap_or(&Value::Null) == &value {
            return Ok(false);
        }

        let _guard = self.inner.lock.acquire()?;
        let backup = doc.clone();
        if value.is_null() {
            doc.remove(key);
        } else {
            doc.insert(key.to_string(), value);
        }

        if let Err(err) = write_document(self.path(), &doc) {
            *doc = backup;
            return Err(match err {
                StoreError::Yaml(e) => unserializable::<T>(key, e),
                other => other,
            });
        }
        tracing::debug!(path = %self.path().display(), key, "stored");
        Ok(true)
    }

    /// Remove `key`. Same as setting it to null.
    pub fn delete(&self, key: &str) -> Result<bool, StoreError> {
        self.set(key, &Value::Null)
    }

    /// Replace the in-memory document with the file's content.
    pub fn load(&self) -> Result<(), StoreError> {
        let mut doc = self.inner.doc.lock();
        *doc = self.read_document()?;
        Ok(())
    }

    /// Write the in-memory document to the file.
    pub fn save(&self) -> Result<(), StoreError> {
        let doc = self.inner.doc.lock();
        let _guard = self.inner.lock.acquire()?;
        write_document(self.path(), &doc)
    }

    /// Load and report which keys the file changed.
    pub(crate) fn reload(&self) -> Result<Vec<KeyChange>, StoreError> {
        let mut doc = self.inner.doc.lock();
        let fresh = self.read_document()?;
        let changes = document::diff(&doc, &fresh);
        *doc = fresh;
        Ok(changes)
    }

    /// The file vanished: forget everything and recreate it empty.
    pub(crate) fn reset(&self) -> Vec<KeyChange> {
        let mut doc = self.inner.doc.lock();
        let old = std::mem::take(&mut *doc);
        let persisted = self
            .inner
            .lock
            .acquire()
            .and_then(|_guard| write_document(self.path(), &doc));
        if let Err(err) = persisted {
            tracing::warn!(path = %self.path().display(), error = %err, "could not recreate document");
        }
        document::diff(&old, &doc)
    }

    fn read_document(&self) -> Result<Document, StoreError> {
        let _guard = self.inner.lock.acquire()?;
        let text = fs::read_to_string(self.path()).map_err(|e| io_err(self.path(), e))?;
        document::parse(&text).map_err(|source| StoreError::Malformed {
            path: self.path().to_path_buf(),
            source,
        })
    }
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("path", &self.inner.path)
            .field("reactive", &self.is_reactive())
            .finish()
    }
}

/// Atomic write: `<file>.tmp` in the same directory, then rename.
fn write_document(path: &Path, doc: &Document) -> Result<(), StoreError> {
    let yaml = document::to_yaml(doc)?;
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let tmp = path.with_file_name(format!("{file_name}.tmp"));

    fs::write(&tmp, yaml).map_err(|e| io_err(&tmp, e))?;
    if let Err(e) = fs::rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(io_err(path, e));
    }
    Ok(())
}

fn unserializable<T: ?Sized>(key: &str, err: serde_yaml::Error) -> StoreError {
    StoreError::Unserializable {
        key: key.to_string(),
        type_name: std::any::type_name::<T>(),
        reason: err.to_string(),
    }
}
