//! One live [`Store`] per canonical path.
//!
//! The registry maps canonical paths to weak references, so it never keeps
//! a store alive by itself. Opening holds the registry mutex across the
//! lookup and the construction, making check-then-insert atomic.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock, Weak};

use parking_lot::Mutex;
use serde_yaml::Value;

use crate::error::StoreError;
use crate::paths::canonical_path;
use crate::store::{ChangeCallback, Inner, Store};

#[derive(Default)]
pub struct StoreRegistry {
    stores: Mutex<HashMap<PathBuf, Weak<Inner>>>,
}

impl StoreRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide registry behind [`Store::open`].
    pub fn global() -> &'static StoreRegistry {
        static GLOBAL: OnceLock<StoreRegistry> = OnceLock::new();
        GLOBAL.get_or_init(StoreRegistry::new)
    }

    /// Return the live store for `path`, or create it without a callback.
    pub fn open(&self, path: impl AsRef<Path>) -> Result<Store, StoreError> {
        self.open_inner(path.as_ref(), None)
    }

    /// Return the live store for `path`, or create it with a reactive
    /// thread reporting external edits to `on_change`.
    ///
    /// If the store is already open it is returned as is and `on_change` is
    /// dropped.
    pub fn open_with_callback<F>(&self, path: impl AsRef<Path>, on_change: F) -> Result<Store, StoreError>
    where
        F: Fn(&str, Option<&Value>, Option<&Value>) + Send + Sync + 'static,
    {
        let on_change: ChangeCallback = Arc::new(on_change);
        self.open_inner(path.as_ref(), Some(on_change))
    }

    /// Number of stores still alive.
    pub fn len(&self) -> usize {
        self.stores
            .lock()
            .values()
            .filter(|weak| weak.strong_count() > 0)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn open_inner(&self, path: &Path, on_change: Option<ChangeCallback>) -> Result<Store, StoreError> {
        let canonical = canonical_path(path)?;
        let mut stores = self.stores.lock();

        if let Some(inner) = stores.get(&canonical).and_then(Weak::upgrade) {
            tracing::trace!(path = %canonical.display(), "sharing open store");
            return Ok(Store { inner });
        }

        stores.retain(|_, weak| weak.strong_count() > 0);
        let store = Store::create(canonical.clone(), on_change)?;
        stores.insert(canonical, Arc::downgrade(&store.inner));
        Ok(store)
    }
}
