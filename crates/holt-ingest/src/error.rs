//! Error types for `holt-ingest`.

use thiserror::Error;

use crate::item::ItemKind;

#[derive(Debug, Error)]
pub enum Error {
  #[error("item path must not be empty")]
  EmptyPath,

  #[error("invalid path segment: {0:?}")]
  InvalidPathSegment(String),

  #[error("key {0:?} is present in both the inventory and status namespace")]
  ConflictingKey(String),

  #[error("key column {0:?} reappears as a data column")]
  KeyColumnReused(String),

  #[error("a table row needs at least one key column")]
  EmptyKeyColumns,

  #[error("unknown selection {0:?} (expected \"all\" or a list of keys)")]
  UnknownSelection(String),

  #[error(
    "cannot add {offered} at path '{}': this path already carries {existing}",
    .path.join(".")
  )]
  KindCollision {
    path:     Vec<String>,
    existing: ItemKind,
    offered:  ItemKind,
  },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
