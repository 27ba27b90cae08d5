//! `holt` — operator CLI over the Holt inventory store.
//!
//! # Usage
//!
//! ```
//! holt --data-dir /var/lib/holt show my-host --path hardware.cpu
//! holt diff yesterday.json today.json
//! holt history my-host
//! ```

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use chrono::{TimeZone, Utc};
use clap::{Parser, Subcommand};
use holt_core::{Tree, parse_visible_path, serialize};
use holt_store::{HistoryStore, InventoryStore};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

// ─── CLI args ─────────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "holt", about = "Inspect stored Holt inventory trees")]
struct Cli {
  /// Root of the Holt data directory.
  #[arg(long, env = "HOLT_DATA_DIR", default_value = "./var")]
  data_dir: PathBuf,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand)]
enum Command {
  /// Print a stored tree as canonical JSON.
  Show {
    host: String,
    /// Restrict the output to the subtree at this dotted path.
    #[arg(long)]
    path: Option<String>,
    /// Show the status-data tree instead of the inventory tree.
    #[arg(long)]
    status: bool,
  },
  /// Compare two tree files and print stats plus the delta tree.
  Diff { old: PathBuf, new: PathBuf },
  /// List one line per history entry of a host.
  History { host: String },
}

// ─── Entry point ──────────────────────────────────────────────────────────────

fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let Cli { data_dir, command } = Cli::parse();
  match command {
    Command::Show { host, path, status } => {
      show(&data_dir, &host, path.as_deref(), status)
    }
    Command::Diff { old, new } => diff(&old, &new),
    Command::History { host } => history(&data_dir, &host),
  }
}

// ─── Commands ─────────────────────────────────────────────────────────────────

fn show(
  data_dir: &Path,
  host: &str,
  raw_path: Option<&str>,
  status: bool,
) -> anyhow::Result<()> {
  let store = InventoryStore::new(data_dir);
  let tree = if status {
    store.load_status_data_tree(host)
  } else {
    store.load_inventory_tree(host)
  }
  .with_context(|| format!("loading tree for {host}"))?;

  let node = match raw_path {
    None => &tree,
    Some(raw) => tree
      .get_node(&parse_visible_path(raw))
      .with_context(|| format!("no node at path {raw:?}"))?,
  };

  println!(
    "{}",
    serde_json::to_string_pretty(&serialize::serialize_tree(node))?
  );
  Ok(())
}

fn diff(old: &Path, new: &Path) -> anyhow::Result<()> {
  let old_tree = read_tree_file(old)?;
  let new_tree = read_tree_file(new)?;

  let delta = new_tree.difference(&old_tree);
  let stats = delta.get_stats();
  println!(
    "new: {}, changed: {}, removed: {}",
    stats.new, stats.changed, stats.removed
  );
  println!(
    "{}",
    serde_json::to_string_pretty(&serialize::serialize_delta_tree(&delta))?
  );
  Ok(())
}

fn history(data_dir: &Path, host: &str) -> anyhow::Result<()> {
  let history = HistoryStore::new(data_dir)
    .load_history(host, None)
    .with_context(|| format!("loading history for {host}"))?;

  for entry in &history.entries {
    println!(
      "{} -> {}  +{} ~{} -{}",
      format_timestamp(entry.previous_timestamp),
      format_timestamp(entry.current_timestamp),
      entry.stats.new,
      entry.stats.changed,
      entry.stats.removed,
    );
  }
  if !history.corrupted.is_empty() {
    tracing::warn!(
      "{} history file(s) could not be read",
      history.corrupted.len()
    );
  }
  Ok(())
}

// ─── Helpers ──────────────────────────────────────────────────────────────────

fn read_tree_file(path: &Path) -> anyhow::Result<Tree> {
  let raw = std::fs::read_to_string(path)
    .with_context(|| format!("reading {}", path.display()))?;
  serialize::from_json(&raw)
    .with_context(|| format!("parsing {}", path.display()))
}

/// Timestamps before the first archived tree are a sentinel, not a time.
fn format_timestamp(timestamp: i64) -> String {
  if timestamp < 0 {
    return "start".to_string();
  }
  Utc
    .timestamp_opt(timestamp, 0)
    .single()
    .map(|instant| instant.format("%Y-%m-%d %H:%M:%S").to_string())
    .unwrap_or_else(|| timestamp.to_string())
}
