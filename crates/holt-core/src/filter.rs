//! Path-scoped tree filtering.
//!
//! A [`FilterChoice`] scopes keep/drop decisions to one tree path. A set of
//! choices is assembled into a prefix tree over path segments and applied in
//! one recursive walk; choices registered at the same path OR together, and
//! a nested choice pulls its ancestor chain in regardless of any `nodes`
//! selection. Paths no choice mentions yield nothing.

use std::collections::{BTreeMap, BTreeSet};

use crate::{
  attributes::Attributes,
  delta::{DeltaAttributes, DeltaTable, DeltaTree},
  table::Table,
  tree::Tree,
  value::NodePath,
};

// ─── Selection ───────────────────────────────────────────────────────────────

/// Which keys (or child names) a choice admits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
  Nothing,
  All,
  Only(BTreeSet<String>),
}

impl Selection {
  /// Build an explicit selection from keys.
  pub fn only<I, S>(keys: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    Self::Only(keys.into_iter().map(Into::into).collect())
  }

  pub fn matches(&self, key: &str) -> bool {
    match self {
      Self::Nothing => false,
      Self::All => true,
      Self::Only(keys) => keys.contains(key),
    }
  }
}

/// Keep/drop decisions for one tree path: attribute pairs, table columns,
/// and child node names.
#[derive(Debug, Clone)]
pub struct FilterChoice {
  pub path:    NodePath,
  pub pairs:   Selection,
  pub columns: Selection,
  pub nodes:   Selection,
}

// ─── Choice prefix tree ──────────────────────────────────────────────────────

/// The choices of all paths, nested by path segment so one walk over the
/// data tree sees exactly the locally-registered selections at each node.
#[derive(Debug, Default)]
pub(crate) struct FilterTree {
  by_name: BTreeMap<String, FilterTree>,
  pairs:   Vec<Selection>,
  columns: Vec<Selection>,
  nodes:   Vec<Selection>,
}

impl FilterTree {
  pub(crate) fn build(choices: &[FilterChoice]) -> Self {
    let mut root = Self::default();
    for choice in choices {
      root.append(&choice.path, choice);
    }
    root
  }

  fn append(&mut self, path: &[String], choice: &FilterChoice) {
    match path.split_first() {
      Some((name, rest)) => self
        .by_name
        .entry(name.clone())
        .or_default()
        .append(rest, choice),
      None => {
        self.pairs.push(choice.pairs.clone());
        self.columns.push(choice.columns.clone());
        self.nodes.push(choice.nodes.clone());
      }
    }
  }

  // No selection registered at a node means "leave its local data alone";
  // only registered selections restrict, ORed together.

  fn keeps_pair(&self, key: &str) -> bool {
    self.pairs.is_empty()
      || self.pairs.iter().any(|selection| selection.matches(key))
  }

  fn keeps_column(&self, key: &str) -> bool {
    self.columns.is_empty()
      || self.columns.iter().any(|selection| selection.matches(key))
  }

  fn keeps_node(&self, name: &str) -> bool {
    self.by_name.contains_key(name)
      || self.nodes.iter().any(|selection| selection.matches(name))
  }
}

// ─── Applying ────────────────────────────────────────────────────────────────

fn filter_map<V: Clone>(
  mapping: &BTreeMap<String, V>,
  keep: impl Fn(&str) -> bool,
) -> BTreeMap<String, V> {
  mapping
    .iter()
    .filter(|(key, _)| keep(key))
    .map(|(key, value)| (key.clone(), value.clone()))
    .collect()
}

pub(crate) fn filter_tree(tree: &Tree, filter: &FilterTree) -> Tree {
  let mut nodes_by_name = BTreeMap::new();
  for (name, child) in &tree.nodes_by_name {
    if !filter.keeps_node(name) {
      continue;
    }
    let default = FilterTree::default();
    let child_filter = filter.by_name.get(name).unwrap_or(&default);
    let filtered = filter_tree(child, child_filter);
    if !filtered.is_empty() {
      nodes_by_name.insert(name.clone(), filtered);
    }
  }

  Tree {
    path: tree.path.clone(),
    attributes: Attributes {
      pairs:      filter_map(&tree.attributes.pairs, |k| filter.keeps_pair(k)),
      retentions: tree.attributes.retentions.clone(),
    },
    table: Table {
      key_columns:   tree.table.key_columns.clone(),
      rows_by_ident: tree
        .table
        .rows_by_ident
        .iter()
        .filter_map(|(ident, row)| {
          let filtered = filter_map(row, |k| filter.keeps_column(k));
          (!filtered.is_empty()).then(|| (ident.clone(), filtered))
        })
        .collect(),
      retentions:    tree.table.retentions.clone(),
    },
    nodes_by_name,
  }
}

pub(crate) fn filter_delta_tree(
  tree: &DeltaTree,
  filter: &FilterTree,
) -> DeltaTree {
  let mut nodes_by_name = BTreeMap::new();
  for (name, child) in &tree.nodes_by_name {
    if !filter.keeps_node(name) {
      continue;
    }
    let default = FilterTree::default();
    let child_filter = filter.by_name.get(name).unwrap_or(&default);
    let filtered = filter_delta_tree(child, child_filter);
    if filtered.count_entries() > 0 {
      nodes_by_name.insert(name.clone(), filtered);
    }
  }

  DeltaTree {
    path: tree.path.clone(),
    attributes: DeltaAttributes {
      pairs: filter_map(&tree.attributes.pairs, |k| filter.keeps_pair(k)),
    },
    table: DeltaTable {
      key_columns: tree.table.key_columns.clone(),
      rows:        tree
        .table
        .rows
        .iter()
        .filter_map(|row| {
          let filtered = filter_map(row, |k| filter.keeps_column(k));
          (!filtered.is_empty()).then_some(filtered)
        })
        .collect(),
    },
    nodes_by_name,
  }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
