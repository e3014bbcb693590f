//! `vigil watch <dir>`: track every matching file in a directory.
//!
//! Each tracked file gets a state document `<state-dir>/<file name>.yaml`
//! holding whether it is `selected`, how many content `changes` were seen,
//! and when the last one happened. Only selected files are echoed.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::Args;
use colored::Colorize;

use vigil_monitor::{DirChange, DirMonitor, FileHandler, FileInfo, MonitorError, Watch};
use vigil_store::{paths, Store, StoreError, Value};

use super::{display_name, drain_ticker, until_interrupted};

/// Files are selected the first time they are seen.
const DEFAULT_SELECTED: bool = true;

/// Arguments for `vigil watch`.
#[derive(Args, Debug)]
pub struct WatchArgs {
    /// Directory to monitor.
    pub path: PathBuf,

    /// Extensions to track, comma-separated, without dots.
    #[arg(long = "ext", value_delimiter = ',', default_values = ["jpg", "png", "tif", "tiff"])]
    pub extensions: Vec<String>,

    /// Where per-file state documents live [default: ~/.vigil].
    #[arg(long)]
    pub state_dir: Option<PathBuf>,
}

impl WatchArgs {
    pub fn run(self) -> Result<()> {
        if !self.path.is_dir() {
            bail!("not a directory: {}", self.path.display());
        }
        let state_dir = match self.state_dir {
            Some(dir) => dir,
            None => paths::state_dir().context("could not determine home directory")?,
        };
        fs::create_dir_all(&state_dir)
            .with_context(|| format!("failed to create {}", state_dir.display()))?;

        let mut builder = DirMonitor::builder(&self.path);
        for ext in &self.extensions {
            let state_dir = state_dir.clone();
            builder = builder.register_monitor(ext, move |path| {
                TrackedFile::open(path, &state_dir).map_err(|e| MonitorError::factory(path, e))
            });
        }
        let mut monitor = builder.start().context("failed to start directory monitor")?;
        println!("watching {}", monitor.path().display());

        let interrupted = until_interrupted(drive(&mut monitor))?;
        if interrupted {
            tracing::info!("interrupted, stopping monitors");
        }
        monitor.teardown();
        Ok(())
    }
}

/// Drain the monitor on the poll cadence until its directory disappears.
async fn drive(monitor: &mut DirMonitor) -> Result<()> {
    let mut tick = drain_ticker();
    loop {
        tick.tick().await;
        for change in monitor.on_idle() {
            match change {
                DirChange::Added(name) => println!("{} {name}", "added".green()),
                DirChange::Removed(name) => println!("{} {name}", "removed".yellow()),
                DirChange::Deleted => {
                    println!("{} {}", "deleted".red(), monitor.path().display())
                }
            }
        }
        if !monitor.is_alive() {
            return Ok(());
        }
    }
}

/// Per-file handler persisting what it observes into the file's document.
struct TrackedFile {
    store: Store,
    missing: bool,
}

impl TrackedFile {
    fn open(path: &Path, state_dir: &Path) -> Result<Self, StoreError> {
        let name = display_name(path);
        let store = Store::open_with_callback(
            paths::document_path_at(state_dir, path),
            move |key, _old, new| {
                if key == "selected" {
                    let state = new.and_then(Value::as_bool).unwrap_or(false);
                    println!("{} {name} = {state}", "selected".cyan());
                }
            },
        )?;
        if store.get("selected").is_none() {
            store.set("selected", &DEFAULT_SELECTED)?;
        }
        Ok(Self {
            store,
            missing: false,
        })
    }

    fn selected(&self) -> bool {
        self.store
            .get("selected")
            .and_then(|v| v.as_bool())
            .unwrap_or(DEFAULT_SELECTED)
    }

    fn record_change(&self) -> Result<u64, StoreError> {
        let changes = self.store.get_as::<u64>("changes")?.unwrap_or(0) + 1;
        self.store.set("changes", &changes)?;
        self.store.set("last_changed", &Utc::now().to_rfc3339())?;
        Ok(changes)
    }
}

impl FileHandler for TrackedFile {
    fn on_change(&mut self, file: &FileInfo) {
        self.missing = false;
        match self.record_change() {
            Ok(count) if self.selected() => {
                println!("{} {} (#{count})", "changed".green(), file.name());
            }
            Ok(_) => {}
            Err(err) => {
                tracing::warn!(path = %file.path().display(), error = %err, "could not record change");
            }
        }
    }

    fn on_delete(&mut self, file: &FileInfo) {
        // Reported every cycle the file stays missing; echo the first.
        if !self.missing {
            self.missing = true;
            println!("{} {}", "deleted".red(), file.name());
        }
    }

    fn on_teardown(&mut self, file: &FileInfo) {
        if let Err(err) = self.store.set("released_at", &Utc::now().to_rfc3339()) {
            tracing::warn!(path = %file.path().display(), error = %err, "could not record release");
        }
    }
}
