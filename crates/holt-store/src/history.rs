//! Inventory history: the deltas between consecutive stored trees.
//!
//! History pairs every archived tree with its successor (ending at the live
//! tree) and loads or computes the delta for each pair. Computed deltas are
//! cached on disk as `[new, changed, removed, delta_tree]` so repeated
//! history views do not re-diff the same archive files; the pair ending at
//! the live tree is never cached, since the live tree still changes.

use std::{io, path::PathBuf};

use holt_core::{
  DeltaStats, DeltaTree, FilterChoice, Tree,
  serialize::{
    RawDeltaTree, deserialize_delta_tree, serialize_delta_tree,
  },
};

use crate::{
  error::{Error, Result},
  paths::InventoryPaths,
  store::{InventoryStore, load_tree_file, mtime_seconds, save_text_file},
};

/// The delta-cache file format.
type CachedDelta = (usize, usize, usize, RawDeltaTree);

/// The oldest archive entry pairs against nothing; this sentinel marks the
/// missing left side.
const NO_PREVIOUS: i64 = -1;

// ─── History types ───────────────────────────────────────────────────────────

/// One transition between two stored trees.
#[derive(Debug, Clone)]
pub struct HistoryEntry {
  pub previous_timestamp: i64,
  pub current_timestamp:  i64,
  pub stats:              DeltaStats,
  pub delta:              DeltaTree,
}

/// All loadable history of one host, plus the files that failed to load or
/// parse. Corruption is reported, never fatal.
#[derive(Debug)]
pub struct History {
  pub entries:   Vec<HistoryEntry>,
  pub corrupted: Vec<PathBuf>,
}

// ─── HistoryStore ────────────────────────────────────────────────────────────

pub struct HistoryStore {
  store: InventoryStore,
}

impl HistoryStore {
  pub fn new(root: impl Into<PathBuf>) -> Self {
    Self {
      store: InventoryStore::new(root),
    }
  }

  fn paths(&self) -> &InventoryPaths { self.store.paths() }

  /// Load the history of `host`, oldest entry first.
  ///
  /// With `filters`, every delta is projected through the filter choices and
  /// entries whose filtered delta is empty are dropped; stats are recomputed
  /// over the filtered delta.
  pub fn load_history(
    &self,
    host: &str,
    filters: Option<&[FilterChoice]>,
  ) -> Result<History> {
    let (timestamps, mut corrupted) = self.store.archive_timestamps(host)?;

    let mut points: Vec<(i64, PathBuf)> = timestamps
      .into_iter()
      .map(|timestamp| {
        (timestamp, self.paths().archive_tree(host, timestamp))
      })
      .collect();
    let live_path = self.paths().inventory_tree(host);
    if let Some(timestamp) = mtime_seconds(&live_path)? {
      points.push((timestamp, live_path.clone()));
    }
    points.sort_by_key(|(timestamp, _)| *timestamp);

    let mut entries = Vec::new();
    let mut previous_tree = Tree::new();
    let mut previous_timestamp = NO_PREVIOUS;
    for (timestamp, path) in points {
      let current_tree = match load_tree_file(&path) {
        Ok(tree) => tree,
        Err(_) => {
          corrupted.push(path);
          continue;
        }
      };

      let entry = match self.load_cached_delta(
        host,
        previous_timestamp,
        timestamp,
        &mut corrupted,
      ) {
        Some(entry) => entry,
        None => {
          let delta = current_tree.difference(&previous_tree);
          let entry = HistoryEntry {
            previous_timestamp,
            current_timestamp: timestamp,
            stats: delta.get_stats(),
            delta,
          };
          if path != live_path {
            self.save_cached_delta(host, &entry)?;
          }
          entry
        }
      };

      if !entry.stats.is_empty() {
        entries.push(entry);
      }
      previous_tree = current_tree;
      previous_timestamp = timestamp;
    }

    let entries = match filters {
      None => entries,
      Some(choices) => entries
        .into_iter()
        .filter_map(|entry| {
          let delta = entry.delta.filter(choices);
          (delta.count_entries() > 0).then(|| HistoryEntry {
            previous_timestamp: entry.previous_timestamp,
            current_timestamp:  entry.current_timestamp,
            stats:              delta.get_stats(),
            delta,
          })
        })
        .collect(),
    };

    Ok(History { entries, corrupted })
  }

  fn load_cached_delta(
    &self,
    host: &str,
    previous_timestamp: i64,
    current_timestamp: i64,
    corrupted: &mut Vec<PathBuf>,
  ) -> Option<HistoryEntry> {
    let path = self.paths().delta_cache_tree(
      host,
      previous_timestamp,
      current_timestamp,
    );
    let raw = match std::fs::read_to_string(&path) {
      Ok(raw) => raw,
      Err(error) if error.kind() == io::ErrorKind::NotFound => return None,
      Err(_) => {
        corrupted.push(path);
        return None;
      }
    };
    match serde_json::from_str::<CachedDelta>(&raw) {
      Ok((new, changed, removed, raw_delta)) => Some(HistoryEntry {
        previous_timestamp,
        current_timestamp,
        stats: DeltaStats {
          new,
          changed,
          removed,
        },
        delta: deserialize_delta_tree(raw_delta),
      }),
      Err(_) => {
        corrupted.push(path);
        None
      }
    }
  }

  fn save_cached_delta(&self, host: &str, entry: &HistoryEntry) -> Result<()> {
    let path = self.paths().delta_cache_tree(
      host,
      entry.previous_timestamp,
      entry.current_timestamp,
    );
    let cached: CachedDelta = (
      entry.stats.new,
      entry.stats.changed,
      entry.stats.removed,
      serialize_delta_tree(&entry.delta),
    );
    let json = serde_json::to_string(&cached)
      .map_err(|source| Error::Malformed {
        path:   path.clone(),
        source: holt_core::Error::Serialization(source),
      })?;
    save_text_file(&path, &json)
  }
}
