//! Inventory-run ingestion for Holt.
//!
//! The write path of the inventory system: validated plugin items, parsed
//! retention configuration, and the [`TreeAggregator`] that turns one run's
//! item streams into a finished tree plus a save decision.

pub mod aggregator;
pub mod config;
pub mod error;
pub mod item;

pub use aggregator::{ErrorPolicy, RunOutcome, TreeAggregator, UpdateResult};
pub use config::{RawRetentionEntry, RawSelection, RetentionRule, RetentionRules};
pub use error::{Error, Result};
pub use item::{AttributesItem, Item, ItemKind, TableRowItem};
