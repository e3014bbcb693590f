//! Fixed-cadence background polling with a consumer-side drain.
//!
//! A [`Poller`] owns one OS thread that sleeps for a fixed interval, asks its
//! [`Probe`] to look at the world, and repeats until it is stopped. Probes
//! never act on what they see: they push events through a [`Notifier`] into
//! an unbounded FIFO. The owning thread later calls [`Poller::drain`] to
//! consume whatever is queued, on its own thread, in enqueue order.
//!
//! ```text
//! poll thread                         consumer thread
//! ───────────                         ───────────────
//! sleep(interval)
//! probe.poll(&notifier) ──push──▶ [ e1 e2 e3 ] ──drain──▶ handler(e1), handler(e2), …
//! repeat while alive
//! ```

use std::ops::ControlFlow;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{unbounded, Receiver, Sender};

use crate::error::MonitorError;

/// Default cadence of every poll loop.
pub const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// One polling step, executed on the poller's background thread.
///
/// Implementations must not touch consumer-owned state; anything the
/// consumer should react to goes through the notifier. Returning
/// [`ControlFlow::Break`] ends the loop for good.
pub trait Probe: Send + 'static {
    type Event: Send + 'static;

    fn poll(&mut self, notifier: &Notifier<Self::Event>) -> ControlFlow<()>;
}

/// Producer half of a poller's event queue.
#[derive(Debug)]
pub struct Notifier<E> {
    tx: Sender<E>,
}

impl<E> Clone for Notifier<E> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<E> Notifier<E> {
    /// Queue an event. Never blocks; a dropped consumer is ignored.
    pub fn notify(&self, event: E) {
        let _ = self.tx.send(event);
    }
}

/// A running poll loop plus the consumer end of its event queue.
///
/// Dropping a `Poller` stops the loop at its next cadence boundary without
/// waiting for the thread.
#[derive(Debug)]
pub struct Poller<E> {
    alive: Arc<AtomicBool>,
    events: Receiver<E>,
    thread: Option<JoinHandle<()>>,
}

impl<E: Send + 'static> Poller<E> {
    /// Spawn the background loop for `probe`, labelled by the watched `path`.
    pub fn start<P>(path: &Path, probe: P, interval: Duration) -> Result<Self, MonitorError>
    where
        P: Probe<Event = E>,
    {
        let (tx, events) = unbounded();
        let alive = Arc::new(AtomicBool::new(true));
        let notifier = Notifier { tx };

        let thread = {
            let alive = alive.clone();
            thread::Builder::new()
                .name(format!("vigil-poll:{}", path.display()))
                .spawn(move || poll_loop(probe, notifier, alive, interval))
                .map_err(|source| MonitorError::Spawn {
                    path: path.to_path_buf(),
                    source,
                })?
        };

        tracing::trace!(path = %path.display(), ?interval, "poller started");
        Ok(Self {
            alive,
            events,
            thread: Some(thread),
        })
    }

    /// Run `handle` on every event queued right now, oldest first.
    ///
    /// Events pushed while draining are left for the next call, so this
    /// never waits on the poll thread. Returns the number handled.
    pub fn drain(&self, mut handle: impl FnMut(E)) -> usize {
        let queued = self.events.len();
        let mut handled = 0;
        while handled < queued {
            match self.events.try_recv() {
                Ok(event) => {
                    handle(event);
                    handled += 1;
                }
                Err(_) => break,
            }
        }
        handled
    }

    /// Ask the loop to exit after its current sleep.
    pub fn stop(&self) {
        self.alive.store(false, Ordering::Release);
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    /// Stop the loop and wait for its thread to finish.
    ///
    /// Called from the poll thread itself this only stops.
    pub fn join(mut self) {
        self.stop();
        if let Some(handle) = self.thread.take() {
            if handle.thread().id() != thread::current().id() {
                let _ = handle.join();
            }
        }
    }
}

impl<E> Drop for Poller<E> {
    fn drop(&mut self) {
        self.alive.store(false, Ordering::Release);
    }
}

fn poll_loop<P: Probe>(
    mut probe: P,
    notifier: Notifier<P::Event>,
    alive: Arc<AtomicBool>,
    interval: Duration,
) {
    while alive.load(Ordering::Acquire) {
        thread::sleep(interval);
        if !alive.load(Ordering::Acquire) {
            break;
        }
        if probe.poll(&notifier).is_break() {
            alive.store(false, Ordering::Release);
            break;
        }
    }
    tracing::trace!("poll loop exited");
}
