//! Scalar values, row identities, and tree paths.
//!
//! Inventory data bottoms out in plain scalars: attribute values and table
//! cells. [`Value`] is the closed set of those scalars, with a total order so
//! values can key ordered maps — a table row's identity is a tuple of values.

use std::{cmp::Ordering, fmt};

use serde::{Deserialize, Serialize};

// ─── Value ───────────────────────────────────────────────────────────────────

/// A scalar leaf value. The JSON form is the bare scalar (`null`, `true`,
/// `3`, `2.5`, `"text"`).
///
/// `Int` and `Float` are distinct variants: `Int(1)` never equals
/// `Float(1.0)`. Plugins report a stable type per column, so cross-type
/// coercion would only buy ambiguity.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
  Null,
  Bool(bool),
  Int(i64),
  Float(f64),
  Text(String),
}

impl Value {
  /// Variant rank for cross-variant ordering: null < bool < int < float <
  /// text.
  fn rank(&self) -> u8 {
    match self {
      Self::Null => 0,
      Self::Bool(_) => 1,
      Self::Int(_) => 2,
      Self::Float(_) => 3,
      Self::Text(_) => 4,
    }
  }
}

impl PartialEq for Value {
  fn eq(&self, other: &Self) -> bool { self.cmp(other) == Ordering::Equal }
}

impl Eq for Value {}

impl PartialOrd for Value {
  fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
    Some(self.cmp(other))
  }
}

impl Ord for Value {
  fn cmp(&self, other: &Self) -> Ordering {
    match (self, other) {
      (Self::Null, Self::Null) => Ordering::Equal,
      (Self::Bool(a), Self::Bool(b)) => a.cmp(b),
      (Self::Int(a), Self::Int(b)) => a.cmp(b),
      // total_cmp keeps the order total even for NaN, so Value can key
      // ordered maps.
      (Self::Float(a), Self::Float(b)) => a.total_cmp(b),
      (Self::Text(a), Self::Text(b)) => a.cmp(b),
      _ => self.rank().cmp(&other.rank()),
    }
  }
}

impl fmt::Display for Value {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Null => write!(f, "null"),
      Self::Bool(b) => write!(f, "{b}"),
      Self::Int(i) => write!(f, "{i}"),
      Self::Float(x) => write!(f, "{x}"),
      Self::Text(t) => write!(f, "{t}"),
    }
  }
}

impl From<bool> for Value {
  fn from(b: bool) -> Self { Self::Bool(b) }
}

impl From<i64> for Value {
  fn from(i: i64) -> Self { Self::Int(i) }
}

impl From<f64> for Value {
  fn from(x: f64) -> Self { Self::Float(x) }
}

impl From<&str> for Value {
  fn from(s: &str) -> Self { Self::Text(s.to_string()) }
}

impl From<String> for Value {
  fn from(s: String) -> Self { Self::Text(s) }
}

// ─── RowIdent ────────────────────────────────────────────────────────────────

/// The identity of a table row: the values of its key columns, in key-column
/// order. Key columns absent from the row are skipped, not padded — identity
/// uses only what the row actually carries.
#[derive(
  Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct RowIdent(pub Vec<Value>);

impl RowIdent {
  pub fn is_empty(&self) -> bool { self.0.is_empty() }
}

impl fmt::Display for RowIdent {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let mut first = true;
    for value in &self.0 {
      if !first {
        write!(f, ", ")?;
      }
      write!(f, "{value}")?;
      first = false;
    }
    Ok(())
  }
}

// ─── NodePath ────────────────────────────────────────────────────────────────

/// A position in an inventory tree: node names from the root down. The root
/// itself is the empty path.
pub type NodePath = Vec<String>;

/// Parse the dotted path syntax used in configuration (`"hardware.cpu"`)
/// into a [`NodePath`]. Empty segments are dropped.
pub fn parse_visible_path(raw: &str) -> NodePath {
  raw
    .split('.')
    .filter(|part| !part.is_empty())
    .map(str::to_string)
    .collect()
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn scalar_json_forms() {
    assert_eq!(serde_json::to_string(&Value::Null).unwrap(), "null");
    assert_eq!(serde_json::to_string(&Value::Bool(true)).unwrap(), "true");
    assert_eq!(serde_json::to_string(&Value::Int(3)).unwrap(), "3");
    assert_eq!(serde_json::to_string(&Value::Float(2.5)).unwrap(), "2.5");
    assert_eq!(
      serde_json::to_string(&Value::Text("x".into())).unwrap(),
      "\"x\""
    );

    let round: Value = serde_json::from_str("17").unwrap();
    assert_eq!(round, Value::Int(17));
    let round: Value = serde_json::from_str("17.5").unwrap();
    assert_eq!(round, Value::Float(17.5));
    let round: Value = serde_json::from_str("null").unwrap();
    assert_eq!(round, Value::Null);
  }

  #[test]
  fn int_and_float_are_distinct() {
    assert_ne!(Value::Int(1), Value::Float(1.0));
  }

  #[test]
  fn ordering_is_total_across_variants() {
    let mut values = vec![
      Value::Text("a".into()),
      Value::Float(0.5),
      Value::Int(2),
      Value::Bool(false),
      Value::Null,
    ];
    values.sort();
    assert_eq!(
      values,
      vec![
        Value::Null,
        Value::Bool(false),
        Value::Int(2),
        Value::Float(0.5),
        Value::Text("a".into()),
      ]
    );
  }

  #[test]
  fn parse_visible_path_drops_empty_segments() {
    assert_eq!(parse_visible_path("a.b.c"), vec!["a", "b", "c"]);
    assert_eq!(parse_visible_path(".a..b."), vec!["a", "b"]);
    assert!(parse_visible_path("").is_empty());
  }
}
