//! # vigil-monitor
//!
//! Polling file and directory monitors.
//!
//! Each monitor runs its own fixed-cadence [`Poller`] thread. Notifications
//! are queued, never executed on the poll thread; the owner calls `on_idle`
//! from its own thread to run them in order.
//!
//! - [`FileMonitor`] reports content changes and deletion of one file.
//! - [`DirMonitor`] keeps one child monitor per matching file in a directory.

pub mod dir;
pub mod error;
pub mod file;
pub mod poller;
pub mod probe;
pub mod watch;

pub use dir::{DirChange, DirMonitor, DirMonitorBuilder, Factory};
pub use error::MonitorError;
pub use file::{FileHandler, FileInfo, FileMonitor, LogHandler};
pub use poller::{Notifier, Poller, Probe, POLL_INTERVAL};
pub use probe::{ChangeProbe, Fingerprint, Observation};
pub use watch::Watch;
