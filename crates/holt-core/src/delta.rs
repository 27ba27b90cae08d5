//! Delta trees: the result of comparing two inventory trees.
//!
//! Every leaf of a delta tree is an `(old, new)` pair where either side may
//! be absent — an addition has no old value, a removal no new one. Delta
//! trees exist for history display only; they are never merged back into a
//! live tree.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::{
  filter::{FilterChoice, FilterTree},
  table::Table,
  tree::Tree,
  value::{NodePath, Value},
};

// ─── DeltaValue ──────────────────────────────────────────────────────────────

/// One compared leaf. Wire format is the 2-tuple `[old, new]` with `null`
/// for an absent side; a stored `null` value is indistinguishable from an
/// absent one, as in the serialized history format this mirrors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "(Option<Value>, Option<Value>)")]
#[serde(into = "(Option<Value>, Option<Value>)")]
pub struct DeltaValue {
  pub old: Option<Value>,
  pub new: Option<Value>,
}

impl From<(Option<Value>, Option<Value>)> for DeltaValue {
  fn from((old, new): (Option<Value>, Option<Value>)) -> Self {
    Self { old, new }
  }
}

impl From<DeltaValue> for (Option<Value>, Option<Value>) {
  fn from(delta: DeltaValue) -> Self { (delta.old, delta.new) }
}

/// Absent and null collapse to the same thing on the wire, so a null value
/// never counts as an addition or removal.
fn present(value: &Value) -> Option<Value> {
  match value {
    Value::Null => None,
    other => Some(other.clone()),
  }
}

type EncodeAs = fn(&Value) -> DeltaValue;

fn encode_as_new(value: &Value) -> DeltaValue {
  DeltaValue {
    old: None,
    new: present(value),
  }
}

fn encode_as_removed(value: &Value) -> DeltaValue {
  DeltaValue {
    old: present(value),
    new: None,
  }
}

// ─── DeltaStats ──────────────────────────────────────────────────────────────

/// Counts of new, changed, and removed leaf values, aggregated recursively.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeltaStats {
  pub new:     usize,
  pub changed: usize,
  pub removed: usize,
}

impl DeltaStats {
  pub fn is_empty(&self) -> bool {
    self.new == 0 && self.changed == 0 && self.removed == 0
  }

  fn absorb(&mut self, other: DeltaStats) {
    self.new += other.new;
    self.changed += other.changed;
    self.removed += other.removed;
  }
}

fn stats_of(pairs: &BTreeMap<String, DeltaValue>) -> DeltaStats {
  let mut stats = DeltaStats::default();
  for delta in pairs.values() {
    match (&delta.old, &delta.new) {
      (None, Some(_)) => stats.new += 1,
      (Some(_), None) => stats.removed += 1,
      (Some(old), Some(new)) if old != new => stats.changed += 1,
      _ => {}
    }
  }
  stats
}

// ─── Delta containers ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeltaAttributes {
  pub(crate) pairs: BTreeMap<String, DeltaValue>,
}

impl DeltaAttributes {
  pub fn pairs(&self) -> &BTreeMap<String, DeltaValue> { &self.pairs }

  pub fn count_entries(&self) -> usize { self.pairs.len() }

  pub fn get_stats(&self) -> DeltaStats { stats_of(&self.pairs) }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeltaTable {
  pub(crate) key_columns: Vec<String>,
  pub(crate) rows:        Vec<BTreeMap<String, DeltaValue>>,
}

impl DeltaTable {
  pub fn key_columns(&self) -> &[String] { &self.key_columns }

  pub fn rows(&self) -> &[BTreeMap<String, DeltaValue>] { &self.rows }

  pub fn count_entries(&self) -> usize {
    self.rows.iter().map(BTreeMap::len).sum()
  }

  pub fn get_stats(&self) -> DeltaStats {
    let mut stats = DeltaStats::default();
    for row in &self.rows {
      stats.absorb(stats_of(row));
    }
    stats
  }
}

// ─── DeltaTree ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeltaTree {
  pub(crate) path:          NodePath,
  pub attributes:           DeltaAttributes,
  pub table:                DeltaTable,
  pub(crate) nodes_by_name: BTreeMap<String, DeltaTree>,
}

impl DeltaTree {
  pub fn path(&self) -> &[String] { &self.path }

  pub fn nodes_by_name(&self) -> &BTreeMap<String, DeltaTree> {
    &self.nodes_by_name
  }

  pub fn count_entries(&self) -> usize {
    self.attributes.count_entries()
      + self.table.count_entries()
      + self
        .nodes_by_name
        .values()
        .map(DeltaTree::count_entries)
        .sum::<usize>()
  }

  pub fn get_node(&self, path: &[String]) -> Option<&DeltaTree> {
    match path.split_first() {
      None => Some(self),
      Some((name, rest)) => self.nodes_by_name.get(name)?.get_node(rest),
    }
  }

  pub fn get_stats(&self) -> DeltaStats {
    let mut stats = self.attributes.get_stats();
    stats.absorb(self.table.get_stats());
    for node in self.nodes_by_name.values() {
      stats.absorb(node.get_stats());
    }
    stats
  }

  /// Encode a whole live tree one-sidedly — every leaf all-new or
  /// all-removed. Used for children that exist on only one side of a
  /// comparison.
  fn from_tree(tree: &Tree, encode: EncodeAs) -> Self {
    Self {
      path: tree.path.clone(),
      attributes: DeltaAttributes {
        pairs: tree
          .attributes
          .pairs
          .iter()
          .map(|(key, value)| (key.clone(), encode(value)))
          .collect(),
      },
      table: DeltaTable {
        key_columns: tree.table.key_columns.clone(),
        rows:        tree
          .table
          .rows_by_ident
          .values()
          .map(|row| {
            row
              .iter()
              .map(|(key, value)| (key.clone(), encode(value)))
              .collect()
          })
          .collect(),
      },
      nodes_by_name: tree
        .nodes_by_name
        .iter()
        .map(|(name, child)| (name.clone(), Self::from_tree(child, encode)))
        .collect(),
    }
  }

  /// Restrict this delta tree to what `choices` admit.
  pub fn filter(&self, choices: &[FilterChoice]) -> DeltaTree {
    crate::filter::filter_delta_tree(self, &FilterTree::build(choices))
  }
}

// ─── Comparison ──────────────────────────────────────────────────────────────

/// Compare two flat mappings, `left` being the new side. Returns the delta
/// entries and whether anything actually changed. With `keep_identical`,
/// unchanged entries are included as `(v, v)` context but do not count as
/// changes.
fn compare_dicts(
  left: &BTreeMap<String, Value>,
  right: &BTreeMap<String, Value>,
  keep_identical: bool,
) -> (BTreeMap<String, DeltaValue>, bool) {
  let mut compared: BTreeMap<String, DeltaValue> = BTreeMap::new();
  let mut has_changes = false;

  for (key, left_value) in left {
    match right.get(key) {
      Some(right_value) if right_value == left_value => {
        if keep_identical {
          compared.insert(
            key.clone(),
            DeltaValue {
              old: present(left_value),
              new: present(left_value),
            },
          );
        }
      }
      Some(right_value) => {
        compared.insert(
          key.clone(),
          DeltaValue {
            old: present(right_value),
            new: present(left_value),
          },
        );
        has_changes = true;
      }
      None => {
        compared.insert(key.clone(), encode_as_new(left_value));
        has_changes = true;
      }
    }
  }
  for (key, right_value) in right {
    if !left.contains_key(key) {
      compared.insert(key.clone(), encode_as_removed(right_value));
      has_changes = true;
    }
  }

  (compared, has_changes)
}

fn compare_tables(left: &Table, right: &Table) -> DeltaTable {
  let mut rows = Vec::new();

  for (ident, left_row) in &left.rows_by_ident {
    match right.rows_by_ident.get(ident) {
      None => rows.push(
        left_row
          .iter()
          .map(|(key, value)| (key.clone(), encode_as_new(value)))
          .collect(),
      ),
      Some(right_row) => {
        // A row with at least one change carries all its columns — a
        // changed package version without the rest of the row would be
        // useless in history views.
        let (compared, has_changes) = compare_dicts(left_row, right_row, true);
        if has_changes {
          rows.push(compared);
        }
      }
    }
  }
  for (ident, right_row) in &right.rows_by_ident {
    if !left.rows_by_ident.contains_key(ident) {
      rows.push(
        right_row
          .iter()
          .map(|(key, value)| (key.clone(), encode_as_removed(value)))
          .collect(),
      );
    }
  }

  let key_columns: BTreeSet<String> = left
    .key_columns
    .iter()
    .chain(right.key_columns.iter())
    .cloned()
    .collect();
  DeltaTable {
    key_columns: key_columns.into_iter().collect(),
    rows,
  }
}

pub(crate) fn compare_trees(left: &Tree, right: &Tree) -> DeltaTree {
  let mut nodes_by_name = BTreeMap::new();
  let names: BTreeSet<&String> = left
    .nodes_by_name
    .keys()
    .chain(right.nodes_by_name.keys())
    .collect();
  for name in names {
    match (left.nodes_by_name.get(name), right.nodes_by_name.get(name)) {
      (Some(left_child), Some(right_child)) => {
        if left_child == right_child {
          continue;
        }
        let node = compare_trees(left_child, right_child);
        if !node.get_stats().is_empty() {
          nodes_by_name.insert(name.clone(), node);
        }
      }
      (Some(left_child), None) => {
        if !left_child.is_empty() {
          nodes_by_name.insert(
            name.clone(),
            DeltaTree::from_tree(left_child, encode_as_new),
          );
        }
      }
      (None, Some(right_child)) => {
        if !right_child.is_empty() {
          nodes_by_name.insert(
            name.clone(),
            DeltaTree::from_tree(right_child, encode_as_removed),
          );
        }
      }
      (None, None) => {}
    }
  }

  DeltaTree {
    path: left.path.clone(),
    attributes: DeltaAttributes {
      pairs: compare_dicts(&left.attributes.pairs, &right.attributes.pairs, false).0,
    },
    table: compare_tables(&left.table, &right.table),
    nodes_by_name,
  }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
  use super::*;
  use crate::test_fixtures::{filled_tree, pairs, path, row};

  #[test]
  fn empty_trees_compare_to_an_empty_delta() {
    let delta = Tree::new().difference(&Tree::new());
    assert_eq!(delta.get_stats(), DeltaStats::default());
    assert_eq!(delta.count_entries(), 0);
  }

  #[test]
  fn a_tree_compared_with_itself_is_empty() {
    let tree = filled_tree();
    let delta = tree.difference(&tree);
    assert_eq!(delta.get_stats(), DeltaStats::default());
  }

  #[test]
  fn new_pairs_have_no_old_side() {
    let mut new = Tree::new();
    new.add_pairs(&path("node"), pairs([("a", "1")]));
    let delta = new.difference(&Tree::new());

    let node = delta.get_node(&path("node")).unwrap();
    assert_eq!(
      node.attributes.pairs()["a"],
      DeltaValue {
        old: None,
        new: Some("1".into()),
      }
    );
    assert_eq!(delta.get_stats().new, 1);
  }

  #[test]
  fn changed_pairs_carry_both_sides() {
    let mut old = Tree::new();
    old.add_pairs(&path("node"), pairs([("a", "1"), ("same", "x")]));
    let mut new = Tree::new();
    new.add_pairs(&path("node"), pairs([("a", "2"), ("same", "x")]));

    let delta = new.difference(&old);
    let node = delta.get_node(&path("node")).unwrap();
    // Unchanged attribute pairs are omitted entirely.
    assert_eq!(node.attributes.pairs().len(), 1);
    assert_eq!(
      node.attributes.pairs()["a"],
      DeltaValue {
        old: Some("1".into()),
        new: Some("2".into()),
      }
    );
    let stats = delta.get_stats();
    assert_eq!((stats.new, stats.changed, stats.removed), (0, 1, 0));
  }

  #[test]
  fn removed_table_row_is_fully_tagged() {
    let mut old = Tree::new();
    old.add_rows(
      &path("node"),
      ["id".to_string()],
      [
        row([("id", "1"), ("col", "a")]),
        row([("id", "2"), ("col", "b")]),
      ],
    );
    let mut new = Tree::new();
    new.add_rows(&path("node"), ["id".to_string()], [row([("id", "1"), ("col", "a")])]);

    let delta = new.difference(&old);
    let node = delta.get_node(&path("node")).unwrap();
    assert_eq!(node.table.rows().len(), 1);
    let removed = &node.table.rows()[0];
    assert_eq!(
      removed["id"],
      DeltaValue {
        old: Some("2".into()),
        new: None,
      }
    );
    assert_eq!(
      removed["col"],
      DeltaValue {
        old: Some("b".into()),
        new: None,
      }
    );
    assert_eq!(delta.get_stats().removed, 2);
  }

  #[test]
  fn changed_table_row_keeps_unchanged_columns_as_context() {
    let mut old = Tree::new();
    old.add_rows(
      &path("node"),
      ["id".to_string()],
      [row([("id", "pkg"), ("version", "1.0"), ("arch", "amd64")])],
    );
    let mut new = Tree::new();
    new.add_rows(
      &path("node"),
      ["id".to_string()],
      [row([("id", "pkg"), ("version", "2.0"), ("arch", "amd64")])],
    );

    let delta = new.difference(&old);
    let rows = delta.get_node(&path("node")).unwrap().table.rows();
    assert_eq!(rows.len(), 1);
    assert_eq!(
      rows[0]["version"],
      DeltaValue {
        old: Some("1.0".into()),
        new: Some("2.0".into()),
      }
    );
    // The identical columns ride along…
    assert_eq!(
      rows[0]["arch"],
      DeltaValue {
        old: Some("amd64".into()),
        new: Some("amd64".into()),
      }
    );
    // …but only the actual change is counted.
    let stats = delta.get_stats();
    assert_eq!((stats.new, stats.changed, stats.removed), (0, 1, 0));
  }

  #[test]
  fn one_sided_children_are_encoded_wholesale() {
    let delta = Tree::new().difference(&filled_tree());
    let stats = delta.get_stats();
    assert_eq!((stats.new, stats.changed, stats.removed), (0, 0, 12));

    let delta = filled_tree().difference(&Tree::new());
    let stats = delta.get_stats();
    assert_eq!((stats.new, stats.changed, stats.removed), (12, 0, 0));
  }

  #[test]
  fn filtering_a_delta_tree() {
    let delta = filled_tree().difference(&Tree::new());
    let filtered = delta.filter(&[FilterChoice {
      path:    path("path-to-nta.ta"),
      pairs:   crate::filter::Selection::only(["ta0"]),
      columns: crate::filter::Selection::only(["ta1"]),
      nodes:   crate::filter::Selection::Nothing,
    }]);

    assert!(filtered.get_node(&path("path-to-nta.na")).is_none());
    let node = filtered.get_node(&path("path-to-nta.ta")).unwrap();
    assert_eq!(node.attributes.count_entries(), 1);
    assert_eq!(node.table.count_entries(), 2);
  }
}
