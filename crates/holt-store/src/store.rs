//! Loading and saving inventory trees as canonical JSON files.

use std::{
  io,
  path::{Path, PathBuf},
  time::UNIX_EPOCH,
};

use holt_core::{Tree, serialize};

use crate::{
  error::{Error, Result},
  paths::InventoryPaths,
};

/// Read a tree file; a missing file is an empty tree.
pub(crate) fn load_tree_file(path: &Path) -> Result<Tree> {
  match std::fs::read_to_string(path) {
    Ok(raw) => serialize::from_json(&raw).map_err(|source| Error::Malformed {
      path: path.to_path_buf(),
      source,
    }),
    Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(Tree::new()),
    Err(error) => Err(Error::io(path, error)),
  }
}

pub(crate) fn save_text_file(path: &Path, text: &str) -> Result<()> {
  if let Some(parent) = path.parent() {
    std::fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
  }
  std::fs::write(path, text).map_err(|e| Error::io(path, e))
}

fn remove_file_if_present(path: &Path) -> Result<()> {
  match std::fs::remove_file(path) {
    Ok(()) => Ok(()),
    Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(()),
    Err(error) => Err(Error::io(path, error)),
  }
}

pub(crate) fn mtime_seconds(path: &Path) -> Result<Option<i64>> {
  let metadata = match std::fs::metadata(path) {
    Ok(metadata) => metadata,
    Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(None),
    Err(error) => return Err(Error::io(path, error)),
  };
  let modified = metadata.modified().map_err(|e| Error::io(path, e))?;
  let seconds = modified
    .duration_since(UNIX_EPOCH)
    .map(|duration| duration.as_secs() as i64)
    .unwrap_or(0);
  Ok(Some(seconds))
}

// ─── InventoryStore ──────────────────────────────────────────────────────────

/// Per-host persistence for inventory and status-data trees.
///
/// Serialization against concurrent runs for the same host is the caller's
/// concern; this store reads and writes plain files.
#[derive(Debug, Clone)]
pub struct InventoryStore {
  paths: InventoryPaths,
}

impl InventoryStore {
  pub fn new(root: impl Into<PathBuf>) -> Self {
    Self {
      paths: InventoryPaths::new(root),
    }
  }

  pub fn paths(&self) -> &InventoryPaths { &self.paths }

  // ── Inventory trees ───────────────────────────────────────────────────

  pub fn load_inventory_tree(&self, host: &str) -> Result<Tree> {
    load_tree_file(&self.paths.inventory_tree(host))
  }

  pub fn save_inventory_tree(&self, host: &str, tree: &Tree) -> Result<()> {
    let path = self.paths.inventory_tree(host);
    let json = serialize::to_json(tree).map_err(|source| Error::Malformed {
      path: path.clone(),
      source,
    })?;
    save_text_file(&path, &format!("{json}\n"))?;
    tracing::debug!(host, path = %path.display(), "saved inventory tree");
    Ok(())
  }

  pub fn remove_inventory_tree(&self, host: &str) -> Result<()> {
    remove_file_if_present(&self.paths.inventory_tree(host))
  }

  // ── Status-data trees ─────────────────────────────────────────────────

  pub fn load_status_data_tree(&self, host: &str) -> Result<Tree> {
    load_tree_file(&self.paths.status_data_tree(host))
  }

  pub fn save_status_data_tree(&self, host: &str, tree: &Tree) -> Result<()> {
    let path = self.paths.status_data_tree(host);
    let json = serialize::to_json(tree).map_err(|source| Error::Malformed {
      path: path.clone(),
      source,
    })?;
    save_text_file(&path, &format!("{json}\n"))?;
    tracing::debug!(host, path = %path.display(), "saved status data tree");
    Ok(())
  }

  pub fn remove_status_data_tree(&self, host: &str) -> Result<()> {
    remove_file_if_present(&self.paths.status_data_tree(host))
  }

  // ── Previous trees and archiving ──────────────────────────────────────

  /// The tree a retention pass compares against: the live tree, or — right
  /// after archiving — the newest archive entry.
  pub fn load_previous_inventory_tree(&self, host: &str) -> Result<Tree> {
    let live = self.load_inventory_tree(host)?;
    if !live.is_empty() {
      return Ok(live);
    }
    match self.archive_timestamps(host)?.0.last() {
      Some(timestamp) => {
        load_tree_file(&self.paths.archive_tree(host, *timestamp))
      }
      None => Ok(Tree::new()),
    }
  }

  /// Move the live tree into the archive under its modification time.
  /// A missing live tree is fine; there is nothing to archive then.
  pub fn archive_inventory_tree(&self, host: &str) -> Result<()> {
    let path = self.paths.inventory_tree(host);
    let Some(timestamp) = mtime_seconds(&path)? else {
      return Ok(());
    };
    let archive_host = self.paths.archive_host(host);
    std::fs::create_dir_all(&archive_host)
      .map_err(|e| Error::io(&archive_host, e))?;
    let target = self.paths.archive_tree(host, timestamp);
    std::fs::rename(&path, &target).map_err(|e| Error::io(&path, e))?;
    tracing::debug!(host, target = %target.display(), "archived inventory tree");
    Ok(())
  }

  /// Archive timestamps in ascending order, plus any archive files whose
  /// names do not parse as timestamps.
  pub(crate) fn archive_timestamps(
    &self,
    host: &str,
  ) -> Result<(Vec<i64>, Vec<PathBuf>)> {
    let directory = self.paths.archive_host(host);
    let entries = match std::fs::read_dir(&directory) {
      Ok(entries) => entries,
      Err(error) if error.kind() == io::ErrorKind::NotFound => {
        return Ok((Vec::new(), Vec::new()));
      }
      Err(error) => return Err(Error::io(&directory, error)),
    };

    let mut timestamps = Vec::new();
    let mut unparsable = Vec::new();
    for entry in entries {
      let path = entry.map_err(|e| Error::io(&directory, e))?.path();
      match path
        .file_stem()
        .and_then(|stem| stem.to_str())
        .and_then(|stem| stem.parse::<i64>().ok())
      {
        Some(timestamp) => timestamps.push(timestamp),
        None => unparsable.push(path),
      }
    }
    timestamps.sort_unstable();
    Ok((timestamps, unparsable))
  }
}
