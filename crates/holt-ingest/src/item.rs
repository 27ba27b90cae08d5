//! Validated inventory items, as produced by inventory plugins.
//!
//! A plugin yields a stream of [`Item`]s: either a set of attribute pairs or
//! one table row, each addressed at a tree path. Validation happens eagerly
//! at construction so a malformed item fails back to the plugin caller one
//! item at a time, before aggregation ever sees it.

use std::{collections::BTreeMap, fmt};

use holt_core::{NodePath, Value};

use crate::error::{Error, Result};

// ─── ItemKind ────────────────────────────────────────────────────────────────

/// What a tree path carries during one inventory run. The first item seen
/// at a path fixes its kind for the rest of the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ItemKind {
  Attributes,
  Table,
}

impl fmt::Display for ItemKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Attributes => write!(f, "attributes"),
      Self::Table => write!(f, "table rows"),
    }
  }
}

fn validate_path(path: &[String]) -> Result<()> {
  if path.is_empty() {
    return Err(Error::EmptyPath);
  }
  for segment in path {
    let valid = !segment.is_empty()
      && segment
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if !valid {
      return Err(Error::InvalidPathSegment(segment.clone()));
    }
  }
  Ok(())
}

fn check_disjoint(
  left: &BTreeMap<String, Value>,
  right: &BTreeMap<String, Value>,
) -> Result<()> {
  for key in left.keys() {
    if right.contains_key(key) {
      return Err(Error::ConflictingKey(key.clone()));
    }
  }
  Ok(())
}

// ─── AttributesItem ──────────────────────────────────────────────────────────

/// Attribute pairs reported at one path. Inventory attributes end up in the
/// persisted inventory tree; status attributes go to the parallel
/// status-data tree and are never part of inventory history.
#[derive(Debug, Clone)]
pub struct AttributesItem {
  path:                 NodePath,
  inventory_attributes: BTreeMap<String, Value>,
  status_attributes:    BTreeMap<String, Value>,
}

impl AttributesItem {
  pub fn new(
    path: NodePath,
    inventory_attributes: BTreeMap<String, Value>,
    status_attributes: BTreeMap<String, Value>,
  ) -> Result<Self> {
    validate_path(&path)?;
    check_disjoint(&inventory_attributes, &status_attributes)?;
    Ok(Self {
      path,
      inventory_attributes,
      status_attributes,
    })
  }

  pub fn path(&self) -> &[String] { &self.path }

  pub fn inventory_attributes(&self) -> &BTreeMap<String, Value> {
    &self.inventory_attributes
  }

  pub fn status_attributes(&self) -> &BTreeMap<String, Value> {
    &self.status_attributes
  }

  pub(crate) fn into_parts(
    self,
  ) -> (NodePath, BTreeMap<String, Value>, BTreeMap<String, Value>) {
    (self.path, self.inventory_attributes, self.status_attributes)
  }
}

// ─── TableRowItem ────────────────────────────────────────────────────────────

/// One table row reported at one path. The key columns define the row's
/// identity and may never reappear as data columns.
#[derive(Debug, Clone)]
pub struct TableRowItem {
  path:              NodePath,
  key_columns:       BTreeMap<String, Value>,
  inventory_columns: BTreeMap<String, Value>,
  status_columns:    BTreeMap<String, Value>,
}

impl TableRowItem {
  pub fn new(
    path: NodePath,
    key_columns: BTreeMap<String, Value>,
    inventory_columns: BTreeMap<String, Value>,
    status_columns: BTreeMap<String, Value>,
  ) -> Result<Self> {
    validate_path(&path)?;
    if key_columns.is_empty() {
      return Err(Error::EmptyKeyColumns);
    }
    for key in key_columns.keys() {
      if inventory_columns.contains_key(key) || status_columns.contains_key(key)
      {
        return Err(Error::KeyColumnReused(key.clone()));
      }
    }
    check_disjoint(&inventory_columns, &status_columns)?;
    Ok(Self {
      path,
      key_columns,
      inventory_columns,
      status_columns,
    })
  }

  pub fn path(&self) -> &[String] { &self.path }

  pub fn key_columns(&self) -> &BTreeMap<String, Value> { &self.key_columns }

  pub fn inventory_columns(&self) -> &BTreeMap<String, Value> {
    &self.inventory_columns
  }

  pub fn status_columns(&self) -> &BTreeMap<String, Value> {
    &self.status_columns
  }

  #[allow(clippy::type_complexity)]
  pub(crate) fn into_parts(
    self,
  ) -> (
    NodePath,
    BTreeMap<String, Value>,
    BTreeMap<String, Value>,
    BTreeMap<String, Value>,
  ) {
    (
      self.path,
      self.key_columns,
      self.inventory_columns,
      self.status_columns,
    )
  }
}

// ─── Item ────────────────────────────────────────────────────────────────────

/// The closed set of things an inventory plugin can yield.
#[derive(Debug, Clone)]
pub enum Item {
  Attributes(AttributesItem),
  TableRow(TableRowItem),
}

impl Item {
  pub fn path(&self) -> &[String] {
    match self {
      Self::Attributes(item) => item.path(),
      Self::TableRow(item) => item.path(),
    }
  }

  pub fn kind(&self) -> ItemKind {
    match self {
      Self::Attributes(_) => ItemKind::Attributes,
      Self::TableRow(_) => ItemKind::Table,
    }
  }
}

impl From<AttributesItem> for Item {
  fn from(item: AttributesItem) -> Self { Self::Attributes(item) }
}

impl From<TableRowItem> for Item {
  fn from(item: TableRowItem) -> Self { Self::TableRow(item) }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
  use super::*;

  fn map<const N: usize>(
    entries: [(&str, &str); N],
  ) -> BTreeMap<String, Value> {
    entries
      .iter()
      .map(|(k, v)| (k.to_string(), Value::from(*v)))
      .collect()
  }

  fn path(raw: &str) -> NodePath { holt_core::parse_visible_path(raw) }

  #[test]
  fn empty_path_is_rejected() {
    let error =
      AttributesItem::new(Vec::new(), map([("a", "1")]), map([])).unwrap_err();
    assert!(matches!(error, Error::EmptyPath));
  }

  #[test]
  fn path_segments_are_restricted() {
    for segment in ["with space", "with.dot", "ümlaut", ""] {
      let error = AttributesItem::new(
        vec!["ok".to_string(), segment.to_string()],
        map([]),
        map([]),
      )
      .unwrap_err();
      assert!(matches!(error, Error::InvalidPathSegment(_)), "{segment:?}");
    }
    assert!(
      AttributesItem::new(path("hardware.cpu-0_a"), map([]), map([])).is_ok()
    );
  }

  #[test]
  fn inventory_and_status_namespaces_must_be_disjoint() {
    let error = AttributesItem::new(
      path("node"),
      map([("shared", "a")]),
      map([("shared", "b")]),
    )
    .unwrap_err();
    assert!(matches!(error, Error::ConflictingKey(_)));
  }

  #[test]
  fn table_row_needs_key_columns() {
    let error =
      TableRowItem::new(path("node"), map([]), map([("c", "1")]), map([]))
        .unwrap_err();
    assert!(matches!(error, Error::EmptyKeyColumns));
  }

  #[test]
  fn key_columns_must_not_reappear_as_data() {
    let error = TableRowItem::new(
      path("node"),
      map([("id", "1")]),
      map([("id", "2")]),
      map([]),
    )
    .unwrap_err();
    assert!(matches!(error, Error::KeyColumnReused(_)));
  }
}
