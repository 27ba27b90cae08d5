//! The recursive inventory tree node.
//!
//! A tree node combines one [`Attributes`], one [`Table`], and a name-keyed
//! map of children; it knows its own path from the root. One type serves
//! both halves of the build/read split: `&mut` methods grow a tree during an
//! inventory run, `&self` algebra (filter, merge, difference) returns new
//! trees and never mutates.

use std::collections::{BTreeMap, BTreeSet};

use crate::{
  attributes::Attributes,
  delta::DeltaTree,
  filter::{FilterChoice, FilterTree},
  merge,
  retention::{RetentionChoices, UpdateEvent},
  table::Table,
  value::{NodePath, Value},
};

// ─── Tree ────────────────────────────────────────────────────────────────────

/// One node of an inventory tree. The root has the empty path.
///
/// Two trees are equal iff their attributes and tables are equal and, for
/// every child name on either side, the child is either empty/absent on both
/// sides or equal on both sides — an absent child and a present-but-empty
/// child are the same thing.
#[derive(Debug, Clone, Default)]
pub struct Tree {
  pub(crate) path:          NodePath,
  pub attributes:           Attributes,
  pub table:                Table,
  pub(crate) nodes_by_name: BTreeMap<String, Tree>,
}

impl Tree {
  pub fn new() -> Self { Self::default() }

  pub(crate) fn with_path(path: NodePath) -> Self {
    Self {
      path,
      ..Self::default()
    }
  }

  pub fn path(&self) -> &[String] { &self.path }

  pub fn nodes_by_name(&self) -> &BTreeMap<String, Tree> {
    &self.nodes_by_name
  }

  /// Total number of attribute pairs and table cells in this subtree.
  pub fn count_entries(&self) -> usize {
    self.attributes.count_entries()
      + self.table.count_entries()
      + self
        .nodes_by_name
        .values()
        .map(Tree::count_entries)
        .sum::<usize>()
  }

  pub fn is_empty(&self) -> bool { self.count_entries() == 0 }

  // ── Lookup ────────────────────────────────────────────────────────────

  pub fn get_node(&self, path: &[String]) -> Option<&Tree> {
    match path.split_first() {
      None => Some(self),
      Some((name, rest)) => self.nodes_by_name.get(name)?.get_node(rest),
    }
  }

  pub fn get_attribute(&self, path: &[String], key: &str) -> Option<&Value> {
    self.get_node(path)?.attributes.get(key)
  }

  /// The rows of the table at `path`; empty if the path does not exist.
  pub fn get_rows(&self, path: &[String]) -> Vec<&BTreeMap<String, Value>> {
    self.get_node(path).map(|node| node.table.rows()).unwrap_or_default()
  }

  // ── Building ──────────────────────────────────────────────────────────

  /// Descend to the node at `path`, creating missing nodes on the way.
  pub fn setdefault_node(&mut self, path: &[String]) -> &mut Tree {
    match path.split_first() {
      None => self,
      Some((name, rest)) => {
        let child_path = {
          let mut child_path = self.path.clone();
          child_path.push(name.clone());
          child_path
        };
        self
          .nodes_by_name
          .entry(name.clone())
          .or_insert_with(|| Tree::with_path(child_path))
          .setdefault_node(rest)
      }
    }
  }

  /// Merge attribute pairs into the node at `path`.
  pub fn add_pairs<I>(&mut self, path: &[String], pairs: I)
  where
    I: IntoIterator<Item = (String, Value)>,
  {
    self.setdefault_node(path).attributes.add(pairs);
  }

  /// Merge table rows into the node at `path`, registering `key_columns`
  /// even when `rows` is empty.
  pub fn add_rows<K, R>(&mut self, path: &[String], key_columns: K, rows: R)
  where
    K: IntoIterator<Item = String>,
    R: IntoIterator<Item = BTreeMap<String, Value>>,
  {
    self.setdefault_node(path).table.add(key_columns, rows);
  }

  // ── Retention ─────────────────────────────────────────────────────────

  /// Run the retention pass for one path's choices against the previous
  /// tree. The node is created if the current run did not touch it; a
  /// missing previous node acts as an empty one.
  pub fn update_retentions(
    &mut self,
    now: i64,
    previous: &Tree,
    choices: &RetentionChoices,
  ) -> Vec<UpdateEvent> {
    let empty = Tree::new();
    let previous_node = previous.get_node(choices.path()).unwrap_or(&empty);
    let node = self.setdefault_node(choices.path());

    let mut events = Vec::new();
    for choice in choices.pairs() {
      events.extend(node.attributes.update(
        now,
        &previous_node.attributes,
        choices.path(),
        choices.interval(),
        choice,
      ));
    }
    for choice in choices.columns() {
      events.extend(node.table.update(
        now,
        &previous_node.table,
        choices.path(),
        choices.interval(),
        choice,
      ));
    }
    events
  }

  /// Drop all retention metadata from this subtree. Used when no retention
  /// is configured at all, so stale metadata never outlives its
  /// configuration.
  pub fn strip_retentions(&mut self) {
    self.attributes.retentions.clear();
    self.table.retentions.clear();
    for node in self.nodes_by_name.values_mut() {
      node.strip_retentions();
    }
  }

  // ── Algebra ───────────────────────────────────────────────────────────

  /// Restrict this tree to what `choices` admit. Paths no choice mentions
  /// yield nothing.
  pub fn filter(&self, choices: &[FilterChoice]) -> Tree {
    crate::filter::filter_tree(self, &FilterTree::build(choices))
  }

  /// Merge `other` over this tree; on conflicts the right side wins.
  pub fn merge(&self, other: &Tree) -> Tree { merge::merge_trees(self, other) }

  /// Compare this tree (the new state) against `other` (the old state) and
  /// produce the delta tree describing additions, changes, and removals.
  pub fn difference(&self, other: &Tree) -> DeltaTree {
    crate::delta::compare_trees(self, other)
  }
}

impl PartialEq for Tree {
  fn eq(&self, other: &Self) -> bool {
    if self.attributes != other.attributes || self.table != other.table {
      return false;
    }
    let names: BTreeSet<&String> = self
      .nodes_by_name
      .keys()
      .chain(other.nodes_by_name.keys())
      .collect();
    names.into_iter().all(|name| {
      match (self.nodes_by_name.get(name), other.nodes_by_name.get(name)) {
        (Some(left), Some(right)) => left == right,
        (Some(left), None) => left.is_empty(),
        (None, Some(right)) => right.is_empty(),
        (None, None) => true,
      }
    })
  }
}

impl Eq for Tree {}

// ─── Tests ───────────────────────────────────────────────────────────────────
