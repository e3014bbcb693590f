//! `vigil store ...`: inspect and edit state documents.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Subcommand;
use colored::Colorize;
use tabled::{settings::Style, Table, Tabled};

use vigil_store::{Store, Value};

use super::{drain_ticker, until_interrupted};

#[derive(Subcommand, Debug)]
pub enum StoreCommand {
    /// Print one key as YAML.
    Get { file: PathBuf, key: String },

    /// Set a key. The value is parsed as YAML; `null` removes the key.
    Set {
        file: PathBuf,
        key: String,
        value: String,
    },

    /// Remove a key.
    Delete { file: PathBuf, key: String },

    /// Print every key.
    Show {
        file: PathBuf,
        /// Emit JSON instead of a table.
        #[arg(long)]
        json: bool,
    },

    /// Print external edits to the document as they happen.
    Follow { file: PathBuf },
}

pub fn run(command: StoreCommand) -> Result<()> {
    match command {
        StoreCommand::Get { file, key } => get(file, &key),
        StoreCommand::Set { file, key, value } => set(file, &key, &value),
        StoreCommand::Delete { file, key } => delete(file, &key),
        StoreCommand::Show { file, json } => show(file, json),
        StoreCommand::Follow { file } => follow(file),
    }
}

fn open(file: &PathBuf) -> Result<Store> {
    Store::open(file).with_context(|| format!("failed to open {}", file.display()))
}

fn get(file: PathBuf, key: &str) -> Result<()> {
    let store = open(&file)?;
    let Some(value) = store.get(key) else {
        bail!("no key '{key}' in {}", file.display());
    };
    print!("{}", render_yaml(&value)?);
    Ok(())
}

fn set(file: PathBuf, key: &str, raw: &str) -> Result<()> {
    let value: Value =
        serde_yaml::from_str(raw).with_context(|| format!("'{raw}' is not a YAML value"))?;
    let store = open(&file)?;
    if store.set(key, &value)? {
        println!("{} {key}", "set".green());
    } else {
        println!("{} {key}", "unchanged".dimmed());
    }
    Ok(())
}

fn delete(file: PathBuf, key: &str) -> Result<()> {
    let store = open(&file)?;
    if store.delete(key)? {
        println!("{} {key}", "deleted".yellow());
    } else {
        println!("{} {key}", "absent".dimmed());
    }
    Ok(())
}

#[derive(Tabled)]
struct Row {
    #[tabled(rename = "Key")]
    key: String,
    #[tabled(rename = "Value")]
    value: String,
}

fn show(file: PathBuf, json: bool) -> Result<()> {
    let store = open(&file)?;
    let doc = store.snapshot();

    if json {
        println!("{}", serde_json::to_string_pretty(&doc)?);
        return Ok(());
    }
    if doc.is_empty() {
        println!("{}", "(empty)".dimmed());
        return Ok(());
    }

    let rows = doc
        .iter()
        .map(|(key, value)| {
            Ok(Row {
                key: key.clone(),
                value: render_yaml(value)?.trim_end().to_string(),
            })
        })
        .collect::<Result<Vec<_>>>()?;
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");
    Ok(())
}

fn follow(file: PathBuf) -> Result<()> {
    let store = Store::open_with_callback(&file, |key, old, new| match (old, new) {
        (None, Some(new)) => println!("{} {key}: {}", "+".green(), inline(new)),
        (Some(old), None) => println!("{} {key}: {}", "-".red(), inline(old)),
        (Some(old), Some(new)) => {
            println!("{} {key}: {} -> {}", "~".yellow(), inline(old), inline(new))
        }
        (None, None) => {}
    })
    .with_context(|| format!("failed to open {}", file.display()))?;
    println!("following {}", store.path().display());

    let interrupted = until_interrupted(async {
        let mut tick = drain_ticker();
        while store.is_reactive() {
            tick.tick().await;
        }
        Ok(())
    })?;
    if !interrupted {
        println!("{} {}", "stopped".red(), store.path().display());
    }
    Ok(())
}

fn render_yaml(value: &Value) -> Result<String> {
    serde_yaml::to_string(value).context("failed to render value")
}

/// Single-line rendering for diff output.
fn inline(value: &Value) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| format!("{value:?}"))
}
