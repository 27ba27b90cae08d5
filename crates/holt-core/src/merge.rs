//! Recursive tree merging.
//!
//! Merging prefers the right side wherever both sides carry a value for the
//! same key. Tables merge by row identity; two tables whose key-column sets
//! genuinely differ are re-keyed by the intersection of the two sets before
//! their rows are unioned, which reconciles legacy trees and
//! inventory/status cross-merges.

use std::collections::{BTreeMap, BTreeSet};

use crate::{
  attributes::Attributes,
  table::{Table, make_row_ident},
  tree::Tree,
  value::{RowIdent, Value},
};

fn merge_attributes(left: &Attributes, right: &Attributes) -> Attributes {
  let mut pairs = left.pairs.clone();
  pairs.extend(right.pairs.clone());
  let mut retentions = left.retentions.clone();
  retentions.extend(right.retentions.clone());
  Attributes { pairs, retentions }
}

/// Union rows under the identities both sides already agree on.
fn merge_tables_by_row_ident(
  key_columns: Vec<String>,
  left: &Table,
  right: &Table,
) -> Table {
  let mut rows_by_ident = left.rows_by_ident.clone();
  for (ident, row) in &right.rows_by_ident {
    rows_by_ident
      .entry(ident.clone())
      .or_default()
      .extend(row.clone());
  }

  let mut retentions = left.retentions.clone();
  retentions.extend(right.retentions.clone());

  Table {
    key_columns,
    rows_by_ident,
    retentions,
  }
}

fn merge_tables(left: &Table, right: &Table) -> Table {
  if right.key_columns.is_empty() || left.key_columns == right.key_columns {
    return merge_tables_by_row_ident(left.key_columns.clone(), left, right);
  }
  if left.key_columns.is_empty() {
    return merge_tables_by_row_ident(right.key_columns.clone(), left, right);
  }

  // Both sides carry key columns and they differ: recompute every row's
  // identity from the intersection of the two sets, then union. An empty
  // intersection collapses everything onto the empty identity, right side
  // last.
  let key_columns: Vec<String> = left
    .key_columns
    .iter()
    .collect::<BTreeSet<_>>()
    .intersection(&right.key_columns.iter().collect())
    .map(|column| (*column).clone())
    .collect();

  let mut rows_by_ident: BTreeMap<RowIdent, BTreeMap<String, Value>> =
    BTreeMap::new();
  for row in left
    .rows_by_ident
    .values()
    .chain(right.rows_by_ident.values())
  {
    rows_by_ident
      .entry(make_row_ident(&key_columns, row))
      .or_default()
      .extend(row.clone());
  }

  let mut retentions = left.retentions.clone();
  retentions.extend(right.retentions.clone());

  Table {
    key_columns,
    rows_by_ident,
    retentions,
  }
}

pub(crate) fn merge_trees(left: &Tree, right: &Tree) -> Tree {
  let mut nodes_by_name = BTreeMap::new();
  let names: BTreeSet<&String> = left
    .nodes_by_name
    .keys()
    .chain(right.nodes_by_name.keys())
    .collect();
  for name in names {
    let node =
      match (left.nodes_by_name.get(name), right.nodes_by_name.get(name)) {
        (Some(left_node), Some(right_node)) => {
          merge_trees(left_node, right_node)
        }
        (Some(left_node), None) => left_node.clone(),
        (None, Some(right_node)) => right_node.clone(),
        (None, None) => continue,
      };
    nodes_by_name.insert(name.clone(), node);
  }

  Tree {
    path: left.path.clone(),
    attributes: merge_attributes(&left.attributes, &right.attributes),
    table: merge_tables(&left.table, &right.table),
    nodes_by_name,
  }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
