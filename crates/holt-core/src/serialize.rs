//! The canonical JSON shape of trees and delta trees.
//!
//! Raw structs mirror the stored layout
//! `{"Attributes": {"Pairs", "Retentions"}, "Table": {"KeyColumns", "Rows",
//! "Retentions"}, "Nodes": {…}}` and stay strictly separate from the domain
//! types; conversions rebuild row identities and node paths. Empty members
//! are omitted inside `Attributes`/`Table`, and empty child nodes are
//! dropped entirely.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{
  attributes::Attributes,
  delta::{DeltaAttributes, DeltaTable, DeltaTree, DeltaValue},
  error::Result,
  retention::RetentionInterval,
  table::Table,
  tree::Tree,
  value::{NodePath, RowIdent, Value},
};

// ─── Raw tree shapes ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawAttributes {
  #[serde(rename = "Pairs", default, skip_serializing_if = "BTreeMap::is_empty")]
  pub pairs:      BTreeMap<String, Value>,
  #[serde(
    rename = "Retentions",
    default,
    skip_serializing_if = "BTreeMap::is_empty"
  )]
  pub retentions: BTreeMap<String, RetentionInterval>,
}

/// Table retentions are keyed by row identity, which is a tuple — JSON
/// objects cannot express that, so the wire form is a list of
/// `[ident, {column: interval}]` pairs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawTable {
  #[serde(
    rename = "KeyColumns",
    default,
    skip_serializing_if = "Vec::is_empty"
  )]
  pub key_columns: Vec<String>,
  #[serde(rename = "Rows", default, skip_serializing_if = "Vec::is_empty")]
  pub rows:        Vec<BTreeMap<String, Value>>,
  #[serde(
    rename = "Retentions",
    default,
    skip_serializing_if = "Vec::is_empty"
  )]
  pub retentions:  Vec<(RowIdent, BTreeMap<String, RetentionInterval>)>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawTree {
  #[serde(rename = "Attributes", default)]
  pub attributes: RawAttributes,
  #[serde(rename = "Table", default)]
  pub table:      RawTable,
  #[serde(rename = "Nodes", default)]
  pub nodes:      BTreeMap<String, RawTree>,
}

// ─── Tree conversions ────────────────────────────────────────────────────────

pub fn serialize_tree(tree: &Tree) -> RawTree {
  RawTree {
    attributes: RawAttributes {
      pairs:      tree.attributes.pairs().clone(),
      retentions: tree.attributes.retentions().clone(),
    },
    table: RawTable {
      // Key columns without rows carry no information; drop them like the
      // stored format does.
      key_columns: if tree.table.rows_by_ident().is_empty() {
        Vec::new()
      } else {
        tree.table.key_columns().to_vec()
      },
      rows:        tree.table.rows_by_ident().values().cloned().collect(),
      retentions:  tree
        .table
        .retentions()
        .iter()
        .map(|(ident, by_key)| (ident.clone(), by_key.clone()))
        .collect(),
    },
    nodes: tree
      .nodes_by_name()
      .iter()
      .filter(|(_, node)| !node.is_empty())
      .map(|(name, node)| (name.clone(), serialize_tree(node)))
      .collect(),
  }
}

pub fn deserialize_tree(raw: RawTree) -> Tree {
  deserialize_node(Vec::new(), raw)
}

fn deserialize_node(path: NodePath, raw: RawTree) -> Tree {
  let mut node = Tree::with_path(path.clone());
  node.attributes = Attributes {
    pairs:      raw.attributes.pairs,
    retentions: raw.attributes.retentions,
  };
  // `add` recomputes each row's identity from the key columns, so rows that
  // collide merge exactly as they would during collection.
  node.table = {
    let mut table = Table::default();
    table.add(raw.table.key_columns, raw.table.rows);
    table.retentions = raw.table.retentions.into_iter().collect();
    table
  };
  for (name, raw_child) in raw.nodes {
    let mut child_path = path.clone();
    child_path.push(name.clone());
    node
      .nodes_by_name
      .insert(name, deserialize_node(child_path, raw_child));
  }
  node
}

/// Serialize a tree to its canonical JSON string.
pub fn to_json(tree: &Tree) -> Result<String> {
  Ok(serde_json::to_string(&serialize_tree(tree))?)
}

/// Parse a tree from its canonical JSON string.
pub fn from_json(raw: &str) -> Result<Tree> {
  Ok(deserialize_tree(serde_json::from_str(raw)?))
}

// ─── Raw delta shapes ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawDeltaAttributes {
  #[serde(rename = "Pairs", default, skip_serializing_if = "BTreeMap::is_empty")]
  pub pairs: BTreeMap<String, DeltaValue>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawDeltaTable {
  #[serde(
    rename = "KeyColumns",
    default,
    skip_serializing_if = "Vec::is_empty"
  )]
  pub key_columns: Vec<String>,
  #[serde(rename = "Rows", default, skip_serializing_if = "Vec::is_empty")]
  pub rows:        Vec<BTreeMap<String, DeltaValue>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawDeltaTree {
  #[serde(rename = "Attributes", default)]
  pub attributes: RawDeltaAttributes,
  #[serde(rename = "Table", default)]
  pub table:      RawDeltaTable,
  #[serde(rename = "Nodes", default)]
  pub nodes:      BTreeMap<String, RawDeltaTree>,
}

// ─── Delta tree conversions ──────────────────────────────────────────────────

pub fn serialize_delta_tree(tree: &DeltaTree) -> RawDeltaTree {
  RawDeltaTree {
    attributes: RawDeltaAttributes {
      pairs: tree.attributes.pairs().clone(),
    },
    table: RawDeltaTable {
      key_columns: if tree.table.rows().is_empty() {
        Vec::new()
      } else {
        tree.table.key_columns().to_vec()
      },
      rows:        tree.table.rows().to_vec(),
    },
    nodes: tree
      .nodes_by_name()
      .iter()
      .filter(|(_, node)| node.count_entries() > 0)
      .map(|(name, node)| (name.clone(), serialize_delta_tree(node)))
      .collect(),
  }
}

pub fn deserialize_delta_tree(raw: RawDeltaTree) -> DeltaTree {
  deserialize_delta_node(Vec::new(), raw)
}

fn deserialize_delta_node(path: NodePath, raw: RawDeltaTree) -> DeltaTree {
  let mut node = DeltaTree::default();
  node.path = path.clone();
  node.attributes = DeltaAttributes {
    pairs: raw.attributes.pairs,
  };
  node.table = DeltaTable {
    key_columns: raw.table.key_columns,
    rows:        raw.table.rows,
  };
  for (name, raw_child) in raw.nodes {
    let mut child_path = path.clone();
    child_path.push(name.clone());
    node
      .nodes_by_name
      .insert(name, deserialize_delta_node(child_path, raw_child));
  }
  node
}

// ─── Tests ───────────────────────────────────────────────────────────────────
