pub mod store;
pub mod watch;

use std::path::Path;

use anyhow::{Context, Result};

/// Run `future` on a single-threaded runtime, returning early on Ctrl-C.
///
/// Returns `true` when interrupted.
pub(crate) fn until_interrupted<F>(future: F) -> Result<bool>
where
    F: std::future::Future<Output = Result<()>>,
{
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to build tokio runtime")?;
    runtime.block_on(async {
        tokio::select! {
            result = future => result.map(|()| false),
            signal = tokio::signal::ctrl_c() => {
                signal.context("failed to listen for ctrl-c")?;
                Ok(true)
            }
        }
    })
}

/// Ticker matching the monitors' poll cadence.
pub(crate) fn drain_ticker() -> tokio::time::Interval {
    let mut tick = tokio::time::interval(vigil_monitor::POLL_INTERVAL);
    tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    tick
}

/// Short file name for display.
pub(crate) fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
