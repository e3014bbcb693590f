//! Directory membership monitor.
//!
//! The poll thread only compares the directory's modification time. When it
//! moves, a single coarse notification is queued; the listing itself is read
//! and reconciled against the tracked children when the consumer drains.

use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::io::ErrorKind;
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use crate::error::{io_err, MonitorError};
use crate::file::{FileHandler, FileMonitor};
use crate::poller::{Notifier, Poller, Probe, POLL_INTERVAL};
use crate::watch::Watch;

/// Builds the child monitor for a newly seen file, given its absolute path.
pub type Factory = Box<dyn FnMut(&Path) -> Result<Box<dyn Watch>, MonitorError>>;

/// Membership change applied during [`DirMonitor::on_idle`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirChange {
    Added(String),
    Removed(String),
    /// The watched directory itself disappeared; the monitor is dead.
    Deleted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DirEvent {
    Changed,
    Deleted,
}

struct DirProbe {
    path: PathBuf,
    last_seen: Option<SystemTime>,
}

impl Probe for DirProbe {
    type Event = DirEvent;

    fn poll(&mut self, notifier: &Notifier<DirEvent>) -> ControlFlow<()> {
        match fs::metadata(&self.path).and_then(|m| m.modified()) {
            Ok(modified) if self.last_seen != Some(modified) => {
                self.last_seen = Some(modified);
                notifier.notify(DirEvent::Changed);
            }
            Ok(_) => {}
            Err(err) if err.kind() == ErrorKind::NotFound => notifier.notify(DirEvent::Deleted),
            Err(err) => {
                tracing::warn!(path = %self.path.display(), error = %err, "stat failed");
            }
        }
        ControlFlow::Continue(())
    }
}

/// Configures the extension factories of a [`DirMonitor`] before it starts.
pub struct DirMonitorBuilder {
    path: PathBuf,
    interval: Duration,
    factories: HashMap<String, Factory>,
}

impl DirMonitorBuilder {
    /// Poll cadence for the directory and for children built by
    /// [`register_monitor`](Self::register_monitor) afterwards.
    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Route files with extension `ext` to `factory`.
    ///
    /// `ext` is stored lowercase without a leading dot. Matching against
    /// directory entries is case-sensitive.
    pub fn register<F>(mut self, ext: &str, factory: F) -> Self
    where
        F: FnMut(&Path) -> Result<Box<dyn Watch>, MonitorError> + 'static,
    {
        self.factories.insert(normalize_ext(ext), Box::new(factory));
        self
    }

    /// Route files with extension `ext` to a [`FileMonitor`] around the
    /// handler built by `make`.
    pub fn register_monitor<H, F>(self, ext: &str, mut make: F) -> Self
    where
        H: FileHandler + 'static,
        F: FnMut(&Path) -> Result<H, MonitorError> + 'static,
    {
        let interval = self.interval;
        self.register(ext, move |path| {
            let handler = make(path)?;
            let monitor = FileMonitor::with_interval(path, handler, interval)?;
            Ok(Box::new(monitor) as Box<dyn Watch>)
        })
    }

    pub fn start(self) -> Result<DirMonitor, MonitorError> {
        let path = std::path::absolute(&self.path).map_err(|e| io_err(&self.path, e))?;
        let probe = DirProbe {
            path: path.clone(),
            last_seen: None,
        };
        let poller = Poller::start(&path, probe, self.interval)?;
        tracing::info!(path = %path.display(), extensions = ?self.factories.keys().collect::<Vec<_>>(), "watching directory");
        Ok(DirMonitor {
            path,
            factories: self.factories,
            children: HashMap::new(),
            poller,
            deleted: false,
        })
    }
}

/// Keeps one child monitor per directory entry with a registered extension.
///
/// The set of children converges on the matching entries each time a
/// directory change is drained. If the directory is removed the monitor
/// tears down every child and stays dead.
pub struct DirMonitor {
    path: PathBuf,
    factories: HashMap<String, Factory>,
    children: HashMap<String, Box<dyn Watch>>,
    poller: Poller<DirEvent>,
    deleted: bool,
}

impl DirMonitor {
    pub fn builder(path: impl Into<PathBuf>) -> DirMonitorBuilder {
        DirMonitorBuilder {
            path: path.into(),
            interval: POLL_INTERVAL,
            factories: HashMap::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Base names of the tracked children, sorted.
    pub fn children(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.children.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn child(&self, name: &str) -> Option<&dyn Watch> {
        self.children.get(name).map(|c| c.as_ref())
    }

    pub fn is_alive(&self) -> bool {
        self.poller.is_alive()
    }

    /// Apply queued directory notifications, then drain every child.
    pub fn on_idle(&mut self) -> Vec<DirChange> {
        let mut pending = Vec::new();
        self.poller.drain(|event| pending.push(event));

        let mut changes = Vec::new();
        for event in pending {
            match event {
                DirEvent::Changed => self.reconcile(&mut changes),
                DirEvent::Deleted => self.on_delete(&mut changes),
            }
        }

        for child in self.children.values_mut() {
            child.on_idle();
        }
        changes
    }

    pub fn stop(&self) {
        self.poller.stop();
        for child in self.children.values() {
            child.stop();
        }
    }

    fn reconcile(&mut self, changes: &mut Vec<DirChange>) {
        if self.deleted {
            return;
        }
        let present = match self.scan() {
            Ok(present) => present,
            Err(err) => {
                // The next stat will report the loss if the directory is gone.
                tracing::warn!(error = %err, "directory listing failed");
                return;
            }
        };

        for name in &present {
            if self.children.contains_key(name) {
                continue;
            }
            let Some(factory) = extension(name).and_then(|ext| self.factories.get_mut(ext)) else {
                continue;
            };
            let path = self.path.join(name);
            match factory(&path) {
                Ok(child) => {
                    tracing::info!(path = %path.display(), "added");
                    self.children.insert(name.clone(), child);
                    changes.push(DirChange::Added(name.clone()));
                }
                Err(err) => {
                    tracing::warn!(path = %path.display(), error = %err, "could not monitor file");
                }
            }
        }

        let stale: Vec<String> = self
            .children
            .keys()
            .filter(|name| !present.contains(*name))
            .cloned()
            .collect();
        for name in stale {
            if let Some(mut child) = self.children.remove(&name) {
                child.teardown();
                tracing::info!(path = %child.path().display(), "removed");
                changes.push(DirChange::Removed(name));
            }
        }
    }

    fn on_delete(&mut self, changes: &mut Vec<DirChange>) {
        if self.deleted {
            return;
        }
        self.deleted = true;
        tracing::info!(path = %self.path.display(), "directory deleted");
        self.poller.stop();

        let mut names: Vec<String> = self.children.keys().cloned().collect();
        names.sort_unstable();
        for name in names {
            if let Some(mut child) = self.children.remove(&name) {
                child.teardown();
                changes.push(DirChange::Removed(name));
            }
        }
        changes.push(DirChange::Deleted);
    }

    /// Names of regular files whose extension has a factory.
    fn scan(&self) -> Result<BTreeSet<String>, MonitorError> {
        let entries = fs::read_dir(&self.path).map_err(|e| io_err(&self.path, e))?;
        let present = entries
            .filter_map(|e| e.ok())
            .filter_map(|e| e.file_name().into_string().ok())
            .filter(|name| {
                extension(name).is_some_and(|ext| self.factories.contains_key(ext))
            })
            .filter(|name| {
                fs::metadata(self.path.join(name))
                    .map(|m| m.is_file())
                    .unwrap_or(false)
            })
            .collect();
        Ok(present)
    }
}

impl Watch for DirMonitor {
    fn path(&self) -> &Path {
        &self.path
    }

    fn on_idle(&mut self) -> usize {
        DirMonitor::on_idle(self).len()
    }

    fn stop(&self) {
        DirMonitor::stop(self);
    }

    fn is_alive(&self) -> bool {
        DirMonitor::is_alive(self)
    }

    fn teardown(&mut self) {
        self.poller.stop();
        for (_, mut child) in self.children.drain() {
            child.teardown();
        }
    }
}

impl std::fmt::Debug for DirMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirMonitor")
            .field("path", &self.path)
            .field("children", &self.children())
            .field("alive", &self.poller.is_alive())
            .finish()
    }
}

fn normalize_ext(ext: &str) -> String {
    ext.trim_start_matches('.').to_lowercase()
}

fn extension(name: &str) -> Option<&str> {
    Path::new(name).extension().and_then(|e| e.to_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registered_extensions_are_lowercased_without_dot() {
        assert_eq!(normalize_ext(".PNG"), "png");
        assert_eq!(normalize_ext("tiff"), "tiff");
    }

    #[test]
    fn hidden_files_have_no_extension() {
        assert_eq!(extension(".png"), None);
        assert_eq!(extension("a.tar.gz"), Some("gz"));
        assert_eq!(extension("Makefile"), None);
    }
}
