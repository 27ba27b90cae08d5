//! On-disk layout of a Holt data directory.
//!
//! ```text
//! <root>/inventory/<host>.json                       the live tree
//! <root>/status_data/<host>.json                     the status-data tree
//! <root>/archive/<host>/<timestamp>.json             superseded trees
//! <root>/delta_cache/<host>/<previous>_<current>.json computed deltas
//! ```

use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct InventoryPaths {
  root: PathBuf,
}

impl InventoryPaths {
  pub fn new(root: impl Into<PathBuf>) -> Self {
    Self { root: root.into() }
  }

  pub fn root(&self) -> &Path { &self.root }

  pub fn inventory_tree(&self, host: &str) -> PathBuf {
    self.root.join("inventory").join(format!("{host}.json"))
  }

  pub fn status_data_tree(&self, host: &str) -> PathBuf {
    self.root.join("status_data").join(format!("{host}.json"))
  }

  pub fn archive_host(&self, host: &str) -> PathBuf {
    self.root.join("archive").join(host)
  }

  pub fn archive_tree(&self, host: &str, timestamp: i64) -> PathBuf {
    self.archive_host(host).join(format!("{timestamp}.json"))
  }

  pub fn delta_cache_host(&self, host: &str) -> PathBuf {
    self.root.join("delta_cache").join(host)
  }

  pub fn delta_cache_tree(
    &self,
    host: &str,
    previous_timestamp: i64,
    current_timestamp: i64,
  ) -> PathBuf {
    self
      .delta_cache_host(host)
      .join(format!("{previous_timestamp}_{current_timestamp}.json"))
  }
}
