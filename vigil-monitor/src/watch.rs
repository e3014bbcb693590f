//! Object-safe surface shared by every monitor a consumer drives.

use std::path::Path;
use std::thread;

use crate::poller::POLL_INTERVAL;

/// A live monitor whose notifications are drained on the consumer thread.
///
/// [`DirMonitor`](crate::DirMonitor) owns its children as `Box<dyn Watch>`,
/// so factories may return any monitor type.
pub trait Watch {
    /// The watched path.
    fn path(&self) -> &Path;

    /// Run every queued notification on the calling thread.
    ///
    /// Returns the number of notifications handled.
    fn on_idle(&mut self) -> usize;

    /// Ask the poll loop to exit at its next cadence boundary.
    fn stop(&self);

    fn is_alive(&self) -> bool;

    /// Stop polling and release whatever the monitor holds.
    ///
    /// Called by an owner just before it forgets the monitor.
    fn teardown(&mut self);

    /// Drain on a fixed cadence until the monitor dies.
    ///
    /// For consumers without an event loop of their own.
    fn run_forever(&mut self) {
        while self.is_alive() {
            self.on_idle();
            thread::sleep(POLL_INTERVAL);
        }
        self.on_idle();
    }
}
