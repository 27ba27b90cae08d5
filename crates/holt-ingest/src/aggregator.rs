//! The per-run tree aggregator.
//!
//! One aggregator exists per host and inventory run. It consumes the item
//! streams of all inventory plugins, integrates them into the in-progress
//! inventory tree (and the parallel status-data tree), tracks which paths
//! qualify for retention, and finally runs the retention pass against the
//! previous on-disk tree to produce the run's save decision.

use std::collections::BTreeMap;

use holt_core::{CacheInfo, NodePath, RetentionChoices, Tree};

use crate::{
  config::RetentionRules,
  error::{Error, Result},
  item::{AttributesItem, Item, ItemKind, TableRowItem},
};

// ─── Policies and results ────────────────────────────────────────────────────

/// How to treat a recoverable aggregation error (an item-kind collision):
/// abort the run, or record it and keep the partial tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorPolicy {
  Propagate,
  ReturnAsValue,
}

/// The retention pass's verdict: whether the tree must be saved because
/// retention changed it, and the human-readable reasons.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateResult {
  pub save_tree: bool,
  pub reason:    String,
}

/// Everything one inventory run produced.
#[derive(Debug)]
pub struct RunOutcome {
  pub inventory:   Tree,
  pub status_data: Tree,
  pub update:      UpdateResult,
  /// Item-kind collisions recorded under [`ErrorPolicy::ReturnAsValue`].
  pub collisions:  Vec<Error>,
}

// ─── TreeAggregator ──────────────────────────────────────────────────────────

pub struct TreeAggregator {
  now:                i64,
  rules:              RetentionRules,
  inventory:          Tree,
  status_data:        Tree,
  kind_by_path:       BTreeMap<NodePath, ItemKind>,
  cache_info_by_path: BTreeMap<(NodePath, ItemKind), CacheInfo>,
  collisions:         Vec<Error>,
}

impl TreeAggregator {
  pub fn new(now: i64, rules: RetentionRules) -> Self {
    Self {
      now,
      rules,
      inventory: Tree::new(),
      status_data: Tree::new(),
      kind_by_path: BTreeMap::new(),
      cache_info_by_path: BTreeMap::new(),
      collisions: Vec::new(),
    }
  }

  pub fn inventory(&self) -> &Tree { &self.inventory }

  pub fn status_data(&self) -> &Tree { &self.status_data }

  /// Consume one plugin invocation's items.
  ///
  /// `cache_info` is the fetch layer's `(cached_at, cache_interval)` if the
  /// data came from a cache; live data stamps `(now, 0)`. `legacy` marks
  /// plugins that cannot report stable row identities — their table rows
  /// are excluded from retention so unstable identities never produce
  /// spurious history diffs.
  ///
  /// A path receives either attributes or table rows within one run, never
  /// both; the first item fixes the kind. Collisions are recoverable: under
  /// [`ErrorPolicy::ReturnAsValue`] the offending item is skipped and
  /// recorded, under [`ErrorPolicy::Propagate`] the error is returned.
  pub fn aggregate<I>(
    &mut self,
    items: I,
    cache_info: Option<CacheInfo>,
    legacy: bool,
    policy: ErrorPolicy,
  ) -> Result<()>
  where
    I: IntoIterator<Item = Item>,
  {
    let cache_info = cache_info.unwrap_or_else(|| CacheInfo::live(self.now));

    for item in items {
      let kind = item.kind();
      match self.kind_by_path.get(item.path()) {
        Some(existing) if *existing != kind => {
          let error = Error::KindCollision {
            path: item.path().to_vec(),
            existing: *existing,
            offered: kind,
          };
          match policy {
            ErrorPolicy::Propagate => return Err(error),
            ErrorPolicy::ReturnAsValue => {
              tracing::warn!("skipping item: {error}");
              self.collisions.push(error);
              continue;
            }
          }
        }
        _ => {
          self.kind_by_path.insert(item.path().to_vec(), kind);
        }
      }

      match item {
        Item::Attributes(item) => self.integrate_attributes(item, cache_info),
        Item::TableRow(item) => {
          self.integrate_table_row(item, cache_info, legacy)
        }
      }
    }
    Ok(())
  }

  fn integrate_attributes(
    &mut self,
    item: AttributesItem,
    cache_info: CacheInfo,
  ) {
    let (path, inventory_attributes, status_attributes) = item.into_parts();
    if !inventory_attributes.is_empty() {
      self.inventory.add_pairs(&path, inventory_attributes);
    }
    if !status_attributes.is_empty() {
      self.status_data.add_pairs(&path, status_attributes);
    }
    if self.rules.wants(&path, ItemKind::Attributes) {
      self
        .cache_info_by_path
        .insert((path, ItemKind::Attributes), cache_info);
    }
  }

  fn integrate_table_row(
    &mut self,
    item: TableRowItem,
    cache_info: CacheInfo,
    legacy: bool,
  ) {
    let (path, key_columns, inventory_columns, status_columns) =
      item.into_parts();

    // The inventory tree always receives the key columns, so the row stays
    // addressable even when the plugin reported no inventory data for it.
    let mut inventory_row = key_columns.clone();
    inventory_row.extend(inventory_columns);
    self
      .inventory
      .add_rows(&path, key_columns.keys().cloned(), [inventory_row]);

    if !status_columns.is_empty() {
      let mut status_row = key_columns.clone();
      status_row.extend(status_columns);
      self
        .status_data
        .add_rows(&path, key_columns.keys().cloned(), [status_row]);
    }

    if !legacy && self.rules.wants(&path, ItemKind::Table) {
      self
        .cache_info_by_path
        .insert((path, ItemKind::Table), cache_info);
    }
  }

  /// Run the retention pass against the previous on-disk tree and hand out
  /// the finished trees.
  pub fn finish(mut self, previous: &Tree) -> RunOutcome {
    if self.rules.is_empty() {
      self.inventory.strip_retentions();
      return RunOutcome {
        inventory:   self.inventory,
        status_data: self.status_data,
        update:      UpdateResult {
          save_tree: false,
          reason:    "No retention intervals found.".to_string(),
        },
        collisions:  self.collisions,
      };
    }

    let rules = std::mem::take(&mut self.rules);
    let mut events = Vec::new();
    for rule in rules.rules() {
      let mut choices = RetentionChoices::new(rule.path.clone(), rule.interval);
      if let Some(selection) = &rule.attributes
        && let Some(cache_info) = self
          .cache_info_by_path
          .get(&(rule.path.clone(), ItemKind::Attributes))
      {
        choices.add_pairs_choice(selection.clone(), *cache_info);
      }
      if let Some(selection) = &rule.columns
        && let Some(cache_info) = self
          .cache_info_by_path
          .get(&(rule.path.clone(), ItemKind::Table))
      {
        choices.add_columns_choice(selection.clone(), *cache_info);
      }
      if choices.is_empty() {
        continue;
      }
      events.extend(self.inventory.update_retentions(
        self.now,
        previous,
        &choices,
      ));
    }

    let update = UpdateResult {
      save_tree: !events.is_empty(),
      reason:    events
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n"),
    };
    RunOutcome {
      inventory: self.inventory,
      status_data: self.status_data,
      update,
      collisions: self.collisions,
    }
  }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
  use std::collections::BTreeMap;

  use holt_core::{
    RetentionInterval, RetentionSource, Value, parse_visible_path,
    serialize::serialize_tree,
  };
  use serde_json::json;

  use super::*;
  use crate::{
    config::{RawRetentionEntry, RetentionRules},
    item::{AttributesItem, TableRowItem},
  };

  fn map<const N: usize>(
    entries: [(&str, &str); N],
  ) -> BTreeMap<String, Value> {
    entries
      .iter()
      .map(|(k, v)| (k.to_string(), Value::from(*v)))
      .collect()
  }

  fn attributes_item<const N: usize>(
    raw_path: &str,
    inventory: [(&str, &str); N],
  ) -> Item {
    AttributesItem::new(parse_visible_path(raw_path), map(inventory), map([]))
      .unwrap()
      .into()
  }

  fn table_row_item<const K: usize, const N: usize>(
    raw_path: &str,
    key_columns: [(&str, &str); K],
    inventory: [(&str, &str); N],
  ) -> Item {
    TableRowItem::new(
      parse_visible_path(raw_path),
      map(key_columns),
      map(inventory),
      map([]),
    )
    .unwrap()
    .into()
  }

  fn rules(raw: serde_json::Value) -> RetentionRules {
    let entries: Vec<RawRetentionEntry> =
      serde_json::from_value(raw).unwrap();
    RetentionRules::parse(&entries).unwrap()
  }

  #[test]
  fn integrates_attributes_at_their_path() {
    let mut aggregator = TreeAggregator::new(100, RetentionRules::default());
    aggregator
      .aggregate(
        [attributes_item("a.b.c", [("foo0", "bar0"), ("foo1", "bar1")])],
        None,
        false,
        ErrorPolicy::Propagate,
      )
      .unwrap();

    assert_eq!(
      serde_json::to_value(serialize_tree(aggregator.inventory())).unwrap(),
      json!({
        "Attributes": {},
        "Table": {},
        "Nodes": {
          "a": {
            "Attributes": {},
            "Table": {},
            "Nodes": {
              "b": {
                "Attributes": {},
                "Table": {},
                "Nodes": {
                  "c": {
                    "Attributes": {"Pairs": {"foo0": "bar0", "foo1": "bar1"}},
                    "Table": {},
                    "Nodes": {},
                  },
                },
              },
            },
          },
        },
      })
    );
  }

  #[test]
  fn integrates_table_rows_merging_by_identity() {
    let mut aggregator = TreeAggregator::new(100, RetentionRules::default());
    aggregator
      .aggregate(
        [
          table_row_item(
            "a.b.c",
            [("foo", "baz")],
            [
              ("col1", "baz val1"),
              ("col2", "baz val2"),
              ("col3", "baz val3"),
            ],
          ),
          table_row_item(
            "a.b.c",
            [("foo", "bar")],
            [("col1", "bar val1"), ("col2", "bar val2")],
          ),
          table_row_item(
            "a.b.c",
            [("foo", "bar")],
            [("col1", "new bar val1"), ("col3", "bar val3")],
          ),
        ],
        None,
        false,
        ErrorPolicy::Propagate,
      )
      .unwrap();

    let rows = aggregator
      .inventory()
      .get_rows(&parse_visible_path("a.b.c"));
    assert_eq!(rows.len(), 2);
    assert!(rows.contains(&&map([
      ("foo", "baz"),
      ("col1", "baz val1"),
      ("col2", "baz val2"),
      ("col3", "baz val3"),
    ])));
    assert!(rows.contains(&&map([
      ("foo", "bar"),
      ("col1", "new bar val1"),
      ("col2", "bar val2"),
      ("col3", "bar val3"),
    ])));
  }

  #[test]
  fn status_attributes_go_to_the_status_tree_only() {
    let mut aggregator = TreeAggregator::new(100, RetentionRules::default());
    let item: Item = AttributesItem::new(
      parse_visible_path("node"),
      map([("inv", "i")]),
      map([("status", "s")]),
    )
    .unwrap()
    .into();
    aggregator
      .aggregate([item], None, false, ErrorPolicy::Propagate)
      .unwrap();

    let path = parse_visible_path("node");
    assert_eq!(
      aggregator.inventory().get_attribute(&path, "inv"),
      Some(&"i".into())
    );
    assert_eq!(aggregator.inventory().get_attribute(&path, "status"), None);
    assert_eq!(
      aggregator.status_data().get_attribute(&path, "status"),
      Some(&"s".into())
    );
    assert_eq!(aggregator.status_data().get_attribute(&path, "inv"), None);
  }

  #[test]
  fn kind_collision_is_recorded_under_return_as_value() {
    let mut aggregator = TreeAggregator::new(100, RetentionRules::default());
    aggregator
      .aggregate(
        [
          attributes_item("a.b.c", [("foo", "bar")]),
          table_row_item("a.b.c", [("foo", "bar")], []),
        ],
        None,
        false,
        ErrorPolicy::ReturnAsValue,
      )
      .unwrap();

    let outcome = aggregator.finish(&Tree::new());
    assert_eq!(outcome.collisions.len(), 1);
    assert!(matches!(
      outcome.collisions[0],
      Error::KindCollision { .. }
    ));
    // The partial tree still carries the first item's data.
    assert_eq!(
      outcome
        .inventory
        .get_attribute(&parse_visible_path("a.b.c"), "foo"),
      Some(&"bar".into())
    );
  }

  #[test]
  fn kind_collision_aborts_under_propagate() {
    let mut aggregator = TreeAggregator::new(100, RetentionRules::default());
    let error = aggregator
      .aggregate(
        [
          attributes_item("a.b.c", [("foo", "bar")]),
          table_row_item("a.b.c", [("foo", "bar")], []),
        ],
        None,
        false,
        ErrorPolicy::Propagate,
      )
      .unwrap_err();
    assert!(matches!(error, Error::KindCollision { .. }));
  }

  #[test]
  fn no_retention_rules_means_no_save() {
    let mut aggregator = TreeAggregator::new(100, RetentionRules::default());
    aggregator
      .aggregate(
        [attributes_item("a.b.c", [("foo", "bar")])],
        None,
        false,
        ErrorPolicy::Propagate,
      )
      .unwrap();

    let outcome = aggregator.finish(&Tree::new());
    assert!(!outcome.update.save_tree);
    assert_eq!(outcome.update.reason, "No retention intervals found.");
  }

  fn previous_with_retention(cached_at: i64, cache_interval: i64) -> Tree {
    holt_core::serialize::deserialize_tree(
      serde_json::from_value(json!({
        "Attributes": {},
        "Table": {},
        "Nodes": {
          "node": {
            "Attributes": {
              "Pairs": {"old": "previous value"},
              "Retentions": {"old": [cached_at, cache_interval, 3]},
            },
            "Table": {},
            "Nodes": {},
          },
        },
      }))
      .unwrap(),
    )
  }

  #[test]
  fn unexpired_previous_attributes_are_carried_forward() {
    // Previous key cached at 10 with retention 3: at now=10 it is still
    // inside its window (10 <= 10 + 0 + 3).
    let previous = previous_with_retention(10, 0);
    let mut aggregator = TreeAggregator::new(
      10,
      rules(json!([{
        "interval": 3,
        "visible_raw_path": "node",
        "attributes": "all",
      }])),
    );
    aggregator
      .aggregate(
        [attributes_item("node", [("new", "current value")])],
        None,
        false,
        ErrorPolicy::Propagate,
      )
      .unwrap();

    let outcome = aggregator.finish(&previous);
    assert!(outcome.update.save_tree);
    assert!(!outcome.update.reason.is_empty());

    let path = parse_visible_path("node");
    assert_eq!(
      outcome.inventory.get_attribute(&path, "old"),
      Some(&"previous value".into())
    );
    let retentions =
      outcome.inventory.get_node(&path).unwrap().attributes.retentions();
    assert_eq!(retentions["old"].source, RetentionSource::Previous);
    // Live data stamps (now, 0) plus the configured interval.
    assert_eq!(
      retentions["new"],
      RetentionInterval::from_config(CacheInfo::new(10, 0), 3)
    );
  }

  #[test]
  fn expired_previous_attributes_are_dropped() {
    // Same previous tree, but far past the keep-until instant.
    let previous = previous_with_retention(10, 0);
    let mut aggregator = TreeAggregator::new(
      1000,
      rules(json!([{
        "interval": 3,
        "visible_raw_path": "node",
        "attributes": "all",
      }])),
    );
    aggregator
      .aggregate(
        [attributes_item("node", [("new", "current value")])],
        None,
        false,
        ErrorPolicy::Propagate,
      )
      .unwrap();

    let outcome = aggregator.finish(&previous);
    let path = parse_visible_path("node");
    assert_eq!(outcome.inventory.get_attribute(&path, "old"), None);
  }

  #[test]
  fn plugin_cache_info_overrides_the_live_stamp() {
    let mut aggregator = TreeAggregator::new(
      100,
      rules(json!([{
        "interval": 3,
        "visible_raw_path": "node",
        "attributes": "all",
      }])),
    );
    aggregator
      .aggregate(
        [attributes_item("node", [("key", "value")])],
        Some(CacheInfo::new(1, 2)),
        false,
        ErrorPolicy::Propagate,
      )
      .unwrap();

    let outcome = aggregator.finish(&Tree::new());
    let retentions = outcome
      .inventory
      .get_node(&parse_visible_path("node"))
      .unwrap()
      .attributes
      .retentions();
    assert_eq!(
      retentions["key"],
      RetentionInterval::from_config(CacheInfo::new(1, 2), 3)
    );
  }

  #[test]
  fn legacy_table_rows_are_excluded_from_retention() {
    let mut aggregator = TreeAggregator::new(
      100,
      rules(json!([{
        "interval": 3,
        "visible_raw_path": "node",
        "columns": "all",
      }])),
    );
    aggregator
      .aggregate(
        [table_row_item("node", [("id", "1")], [("col", "value")])],
        None,
        true,
        ErrorPolicy::Propagate,
      )
      .unwrap();

    let outcome = aggregator.finish(&Tree::new());
    assert!(!outcome.update.save_tree);
    let node = outcome.inventory.get_node(&parse_visible_path("node")).unwrap();
    assert!(node.table.retentions().is_empty());
    // The row itself is still part of the tree.
    assert_eq!(node.table.rows().len(), 1);
  }
}
