//! Background detection of external edits to a store's file.
//!
//! Runs the same stat-then-fingerprint probe as a file monitor, but instead
//! of queueing notifications it reloads the document and calls the store's
//! callback directly, once per changed key.

use std::convert::Infallible;
use std::ops::ControlFlow;
use std::sync::Weak;

use vigil_monitor::{ChangeProbe, Notifier, Observation, Probe};

use crate::document::KeyChange;
use crate::store::{ChangeCallback, Inner, Store};

pub(crate) struct ReactiveProbe {
    store: Weak<Inner>,
    probe: ChangeProbe,
    on_change: ChangeCallback,
}

impl ReactiveProbe {
    pub(crate) fn new(store: Weak<Inner>, probe: ChangeProbe, on_change: ChangeCallback) -> Self {
        Self {
            store,
            probe,
            on_change,
        }
    }

    fn changes(&mut self, store: &Store) -> ControlFlow<(), Vec<KeyChange>> {
        match self.probe.observe() {
            Observation::Unchanged | Observation::Skipped => ControlFlow::Continue(Vec::new()),
            Observation::Changed => match store.reload() {
                Ok(changes) => ControlFlow::Continue(changes),
                Err(err) => {
                    tracing::warn!(path = %store.path().display(), error = %err, "reload failed, keeping previous document");
                    ControlFlow::Continue(Vec::new())
                }
            },
            Observation::Missing => {
                let dir_exists = store.path().parent().is_some_and(|dir| dir.is_dir());
                if !dir_exists {
                    tracing::info!(path = %store.path().display(), "document directory removed, stopping");
                    return ControlFlow::Break(());
                }
                tracing::info!(path = %store.path().display(), "document deleted, resetting to empty");
                ControlFlow::Continue(store.reset())
            }
        }
    }
}

impl Probe for ReactiveProbe {
    type Event = Infallible;

    fn poll(&mut self, _notifier: &Notifier<Infallible>) -> ControlFlow<()> {
        let Some(inner) = self.store.upgrade() else {
            return ControlFlow::Break(());
        };
        let store = Store { inner };

        let changes = match self.changes(&store) {
            ControlFlow::Continue(changes) => changes,
            ControlFlow::Break(()) => return ControlFlow::Break(()),
        };
        for change in changes {
            tracing::debug!(path = %store.path().display(), key = %change.key, "external change");
            (self.on_change)(&change.key, change.old.as_ref(), change.new.as_ref());
        }
        ControlFlow::Continue(())
    }
}
