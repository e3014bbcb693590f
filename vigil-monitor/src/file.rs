//! Single-file monitor.

use std::ops::ControlFlow;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::MonitorError;
use crate::poller::{Notifier, Poller, Probe, POLL_INTERVAL};
use crate::probe::{ChangeProbe, Observation};
use crate::watch::Watch;

/// Identity of a monitored file, handed to every [`FileHandler`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInfo {
    path: PathBuf,
    name: String,
}

impl FileInfo {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self { path, name }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Base name without extension.
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Reactions to a file's notifications, run on the consumer thread.
///
/// Deletion is reported every cycle the file stays missing; whether that
/// ends the monitor is up to the implementor or its owner.
pub trait FileHandler {
    fn on_change(&mut self, file: &FileInfo) {
        tracing::debug!(path = %file.path().display(), "changed");
    }

    fn on_delete(&mut self, file: &FileInfo) {
        tracing::debug!(path = %file.path().display(), "deleted");
    }

    /// The owner is about to forget this monitor.
    fn on_teardown(&mut self, _file: &FileInfo) {}
}

/// Handler that only logs.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogHandler;

impl FileHandler for LogHandler {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FileEvent {
    Changed,
    Deleted,
}

struct FileProbe(ChangeProbe);

impl Probe for FileProbe {
    type Event = FileEvent;

    fn poll(&mut self, notifier: &Notifier<FileEvent>) -> ControlFlow<()> {
        match self.0.observe() {
            Observation::Changed => notifier.notify(FileEvent::Changed),
            Observation::Missing => notifier.notify(FileEvent::Deleted),
            Observation::Unchanged | Observation::Skipped => {}
        }
        ControlFlow::Continue(())
    }
}

/// Watches one file's timestamp and content digest.
///
/// The first poll always reports a change, so a handler sees the initial
/// content the same way it sees later edits.
pub struct FileMonitor<H> {
    info: FileInfo,
    poller: Poller<FileEvent>,
    handler: H,
}

impl<H: FileHandler> FileMonitor<H> {
    /// Start watching `path` at the default cadence.
    pub fn start(path: impl Into<PathBuf>, handler: H) -> Result<Self, MonitorError> {
        Self::with_interval(path, handler, POLL_INTERVAL)
    }

    pub fn with_interval(
        path: impl Into<PathBuf>,
        handler: H,
        interval: Duration,
    ) -> Result<Self, MonitorError> {
        let info = FileInfo::new(path);
        let probe = FileProbe(ChangeProbe::new(info.path()));
        let poller = Poller::start(info.path(), probe, interval)?;
        Ok(Self {
            info,
            poller,
            handler,
        })
    }

    pub fn info(&self) -> &FileInfo {
        &self.info
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }

    pub fn handler_mut(&mut self) -> &mut H {
        &mut self.handler
    }

    /// Run queued notifications through the handler, in order.
    pub fn on_idle(&mut self) -> usize {
        let Self {
            info,
            poller,
            handler,
        } = self;
        poller.drain(|event| match event {
            FileEvent::Changed => handler.on_change(info),
            FileEvent::Deleted => handler.on_delete(info),
        })
    }

    pub fn stop(&self) {
        self.poller.stop();
    }

    pub fn is_alive(&self) -> bool {
        self.poller.is_alive()
    }
}

impl<H: FileHandler> Watch for FileMonitor<H> {
    fn path(&self) -> &Path {
        self.info.path()
    }

    fn on_idle(&mut self) -> usize {
        FileMonitor::on_idle(self)
    }

    fn stop(&self) {
        FileMonitor::stop(self);
    }

    fn is_alive(&self) -> bool {
        FileMonitor::is_alive(self)
    }

    fn teardown(&mut self) {
        self.poller.stop();
        self.handler.on_teardown(&self.info);
    }
}

impl<H> std::fmt::Debug for FileMonitor<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileMonitor")
            .field("name", &self.info.name)
            .field("alive", &self.poller.is_alive())
            .finish()
    }
}
