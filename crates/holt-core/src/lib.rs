//! Core tree model for the Holt inventory system.
//!
//! Holds the structured-data tree a monitored host's inventory is stored
//! in — attributes and identity-keyed tables at named, nested paths — plus
//! the algebra over such trees: filtering, merging, diffing, and the
//! retention pass that carries not-yet-expired values forward from one
//! inventory run to the next.
//!
//! This crate is deliberately free of I/O, async, and filesystem concerns.
//! All other crates depend on it; it depends only on serde.

pub mod attributes;
pub mod delta;
pub mod error;
pub mod filter;
mod merge;
pub mod retention;
pub mod serialize;
pub mod table;
pub mod tree;
pub mod value;

pub use attributes::Attributes;
pub use delta::{DeltaStats, DeltaTree, DeltaValue};
pub use error::{Error, Result};
pub use filter::{FilterChoice, Selection};
pub use retention::{
  CacheInfo, RetentionChoices, RetentionInterval, RetentionSource, UpdateEvent,
};
pub use table::Table;
pub use tree::Tree;
pub use value::{NodePath, RowIdent, Value, parse_visible_path};

// ─── Shared test fixtures ────────────────────────────────────────────────────
