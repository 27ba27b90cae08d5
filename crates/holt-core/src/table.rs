//! The identity-keyed table container at one tree path.

use std::collections::{BTreeMap, BTreeSet};

use crate::{
  retention::{RetentionChoice, RetentionInterval, UpdateEvent},
  value::{RowIdent, Value},
};

/// Project the key columns onto a row. Key columns the row does not carry
/// are skipped, so identity is never padded to a fixed width.
pub(crate) fn make_row_ident(
  key_columns: &[String],
  row: &BTreeMap<String, Value>,
) -> RowIdent {
  RowIdent(
    key_columns
      .iter()
      .filter_map(|column| row.get(column).cloned())
      .collect(),
  )
}

// ─── Table ───────────────────────────────────────────────────────────────────

/// A set of rows keyed by identity — the tuple of each row's key-column
/// values. Rows inserted with the same identity merge (later values win per
/// column), they are never duplicated.
///
/// Equality is defined over `rows_by_ident` only; key-column order and
/// retention metadata never make two tables differ.
#[derive(Debug, Clone, Default)]
pub struct Table {
  pub(crate) key_columns:   Vec<String>,
  pub(crate) rows_by_ident: BTreeMap<RowIdent, BTreeMap<String, Value>>,
  pub(crate) retentions:
    BTreeMap<RowIdent, BTreeMap<String, RetentionInterval>>,
}

impl Table {
  pub fn key_columns(&self) -> &[String] { &self.key_columns }

  pub fn rows_by_ident(&self) -> &BTreeMap<RowIdent, BTreeMap<String, Value>> {
    &self.rows_by_ident
  }

  pub fn rows(&self) -> Vec<&BTreeMap<String, Value>> {
    self.rows_by_ident.values().collect()
  }

  pub fn retentions(
    &self,
  ) -> &BTreeMap<RowIdent, BTreeMap<String, RetentionInterval>> {
    &self.retentions
  }

  /// Only row cells carry weight; key columns and retentions alone count
  /// for nothing.
  pub fn count_entries(&self) -> usize {
    self.rows_by_ident.values().map(BTreeMap::len).sum()
  }

  pub fn is_empty(&self) -> bool { self.rows_by_ident.is_empty() }

  /// Union new key columns into the key-column set, kept sorted and
  /// deduplicated.
  pub(crate) fn add_key_columns<I>(&mut self, key_columns: I)
  where
    I: IntoIterator<Item = String>,
  {
    let mut all: BTreeSet<String> = self.key_columns.drain(..).collect();
    all.extend(key_columns);
    self.key_columns = all.into_iter().collect();
  }

  fn add_row(&mut self, ident: RowIdent, row: BTreeMap<String, Value>) {
    if !row.is_empty() {
      self.rows_by_ident.entry(ident).or_default().extend(row);
    }
  }

  /// Union `key_columns` in, then merge each row under its identity as
  /// computed from the just-updated key-column set.
  pub fn add<K, R>(&mut self, key_columns: K, rows: R)
  where
    K: IntoIterator<Item = String>,
    R: IntoIterator<Item = BTreeMap<String, Value>>,
  {
    self.add_key_columns(key_columns);
    for row in rows {
      let ident = make_row_ident(&self.key_columns, &row);
      self.add_row(ident, row);
    }
  }

  /// Retention pass for one configured choice, row identity by row identity.
  ///
  /// Rows only the previous tree knows are carried forward wholesale (their
  /// key-column values re-added so the row stays addressable); rows on both
  /// sides merge column by column with the same carry/stamp rule as
  /// attributes; current-only rows are stamped fresh. Expiring one row's
  /// columns never affects another row.
  pub(crate) fn update(
    &mut self,
    now: i64,
    previous: &Table,
    path: &[String],
    interval: i64,
    choice: &RetentionChoice,
  ) -> Vec<UpdateEvent> {
    let stamp = RetentionInterval::from_config(choice.cache_info, interval);
    self.add_key_columns(previous.key_columns.iter().cloned());

    // Previous rows, restricted to filtered, not-yet-expired columns.
    let previous_filtered: BTreeMap<RowIdent, BTreeMap<String, Value>> =
      previous
        .rows_by_ident
        .iter()
        .filter_map(|(ident, row)| {
          let intervals = previous.retentions.get(ident);
          let filtered: BTreeMap<String, Value> = row
            .iter()
            .filter(|(key, _)| {
              choice.selection.matches(key)
                && intervals
                  .and_then(|by_key| by_key.get(*key))
                  .is_some_and(|interval| now <= interval.keep_until())
            })
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
          (!filtered.is_empty()).then(|| (ident.clone(), filtered))
        })
        .collect();

    // Current rows, restricted to filtered columns.
    let current_filtered: BTreeMap<RowIdent, BTreeMap<String, Value>> = self
      .rows_by_ident
      .iter()
      .filter_map(|(ident, row)| {
        let filtered: BTreeMap<String, Value> = row
          .iter()
          .filter(|(key, _)| choice.selection.matches(key))
          .map(|(key, value)| (key.clone(), value.clone()))
          .collect();
        (!filtered.is_empty()).then(|| (ident.clone(), filtered))
      })
      .collect();

    let mut retentions: BTreeMap<RowIdent, BTreeMap<String, RetentionInterval>> =
      BTreeMap::new();
    let mut events = Vec::new();

    for (ident, filtered_row) in &previous_filtered {
      if current_filtered.contains_key(ident) {
        continue;
      }
      let mut row: BTreeMap<String, Value> = BTreeMap::new();
      for (key, value) in filtered_row {
        row.insert(key.clone(), value.clone());
        retentions.entry(ident.clone()).or_default().insert(
          key.clone(),
          RetentionInterval::from_previous(previous.retentions[ident][key]),
        );
      }
      if !row.is_empty() {
        for column in &previous.key_columns {
          if let Some(value) = previous.rows_by_ident[ident].get(column) {
            row.insert(column.clone(), value.clone());
          }
        }
        let message = row.keys().cloned().collect::<Vec<_>>().join(", ");
        self.add_row(ident.clone(), row);
        events.push(UpdateEvent::Table {
          path: path.to_vec(),
          ident: ident.clone(),
          title: "Added row".to_string(),
          message,
        });
      }
    }

    for (ident, previous_row) in &previous_filtered {
      let Some(current_row) = current_filtered.get(ident) else {
        continue;
      };
      let mut row: BTreeMap<String, Value> = BTreeMap::new();
      for key in previous_row.keys() {
        if current_row.contains_key(key) {
          continue;
        }
        row.insert(key.clone(), previous.rows_by_ident[ident][key].clone());
        retentions.entry(ident.clone()).or_default().insert(
          key.clone(),
          RetentionInterval::from_previous(previous.retentions[ident][key]),
        );
      }
      for key in current_row.keys() {
        retentions
          .entry(ident.clone())
          .or_default()
          .insert(key.clone(), stamp);
      }
      if !row.is_empty() {
        for column in &previous.key_columns {
          if let Some(value) = previous.rows_by_ident[ident].get(column) {
            row.insert(column.clone(), value.clone());
          }
        }
        let own_key_values: Vec<(String, Value)> = self
          .key_columns
          .iter()
          .filter_map(|column| {
            self
              .rows_by_ident
              .get(ident)
              .and_then(|own| own.get(column))
              .map(|value| (column.clone(), value.clone()))
          })
          .collect();
        row.extend(own_key_values);
        let message = row.keys().cloned().collect::<Vec<_>>().join(", ");
        self.add_row(ident.clone(), row);
        events.push(UpdateEvent::Table {
          path: path.to_vec(),
          ident: ident.clone(),
          title: "Added row".to_string(),
          message,
        });
      }
    }

    for (ident, current_row) in &current_filtered {
      if previous_filtered.contains_key(ident) {
        continue;
      }
      for key in current_row.keys() {
        retentions
          .entry(ident.clone())
          .or_default()
          .insert(key.clone(), stamp);
      }
    }

    if !retentions.is_empty() {
      for (ident, by_key) in &retentions {
        let message = by_key
          .iter()
          .map(|(key, interval)| format!("{key} ({})", interval.keep_until()))
          .collect::<Vec<_>>()
          .join(", ");
        events.push(UpdateEvent::Table {
          path: path.to_vec(),
          ident: ident.clone(),
          title: "Keep until".to_string(),
          message,
        });
      }
      self.retentions = retentions;
    }

    events
  }
}

impl PartialEq for Table {
  fn eq(&self, other: &Self) -> bool {
    self.rows_by_ident == other.rows_by_ident
  }
}

impl Eq for Table {}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{filter::Selection, retention::CacheInfo, test_fixtures::row};

  fn columns<const N: usize>(names: [&str; N]) -> Vec<String> {
    names.iter().map(|n| n.to_string()).collect()
  }

  #[test]
  fn rows_with_equal_identity_merge() {
    let mut table = Table::default();
    table.add(
      columns(["foo"]),
      [row([
        ("foo", "bar0"),
        ("col0", "bar0 val0"),
        ("col1", "bar0 val1"),
      ])],
    );
    table.add(
      columns(["foo"]),
      [row([("foo", "bar0"), ("col1", "2. bar0 val1")])],
    );

    assert_eq!(table.rows_by_ident.len(), 1);
    let merged = &table.rows_by_ident[&RowIdent(vec![Value::from("bar0")])];
    assert_eq!(
      *merged,
      row([
        ("foo", "bar0"),
        ("col0", "bar0 val0"),
        ("col1", "2. bar0 val1"),
      ])
    );
  }

  #[test]
  fn identity_ignores_non_key_column_order() {
    let key_columns = columns(["a", "b"]);
    let left = row([("a", "1"), ("b", "2"), ("x", "foo"), ("y", "bar")]);
    let right = row([("y", "bar"), ("x", "foo"), ("b", "2"), ("a", "1")]);
    assert_eq!(
      make_row_ident(&key_columns, &left),
      make_row_ident(&key_columns, &right)
    );
  }

  #[test]
  fn identity_skips_missing_key_columns() {
    let key_columns = columns(["a", "b"]);
    let partial = row([("b", "2"), ("x", "foo")]);
    assert_eq!(
      make_row_ident(&key_columns, &partial),
      RowIdent(vec![Value::from("2")])
    );
  }

  #[test]
  fn add_unions_and_sorts_key_columns() {
    let mut table = Table::default();
    table.add(columns(["b"]), []);
    table.add(columns(["a", "b", "c"]), []);
    assert_eq!(table.key_columns, columns(["a", "b", "c"]));
  }

  #[test]
  fn update_carries_previous_only_columns_into_current_row() {
    // Mirrors a run where the previous tree knows columns the current run
    // no longer reports.
    let mut previous = Table::default();
    previous.add(
      columns(["kc"]),
      [row([
        ("kc", "KC"),
        ("c1", "C1: prev C1"),
        ("c2", "C2: only prev"),
      ])],
    );
    let ident = RowIdent(vec![Value::from("KC")]);
    previous.retentions.insert(
      ident.clone(),
      [
        (
          "c1".to_string(),
          RetentionInterval::from_config(CacheInfo::new(1, 2), 3),
        ),
        (
          "c2".to_string(),
          RetentionInterval::from_config(CacheInfo::new(1, 2), 3),
        ),
      ]
      .into_iter()
      .collect(),
    );

    let mut current = Table::default();
    current.add(
      columns(["kc"]),
      [row([("kc", "KC"), ("c1", "C1: cur"), ("c3", "C3: only cur")])],
    );

    let choice = RetentionChoice {
      selection:  Selection::All,
      cache_info: CacheInfo::new(4, 5),
    };
    let events = current.update(0, &previous, &[], 6, &choice);

    assert_eq!(current.key_columns, columns(["kc"]));
    assert_eq!(
      current.rows_by_ident[&ident],
      row([
        ("kc", "KC"),
        ("c1", "C1: cur"),
        ("c2", "C2: only prev"),
        ("c3", "C3: only cur"),
      ])
    );
    let by_key = &current.retentions[&ident];
    assert_eq!(
      by_key["c1"],
      RetentionInterval::from_config(CacheInfo::new(4, 5), 6)
    );
    assert_eq!(
      by_key["c2"],
      RetentionInterval::from_previous(RetentionInterval::from_config(
        CacheInfo::new(1, 2),
        3
      ))
    );
    assert_eq!(
      by_key["c3"],
      RetentionInterval::from_config(CacheInfo::new(4, 5), 6)
    );
    assert_eq!(
      by_key["kc"],
      RetentionInterval::from_config(CacheInfo::new(4, 5), 6)
    );
    // One row merge plus one keep-until report.
    assert_eq!(events.len(), 2);
  }

  #[test]
  fn update_with_explicit_key_selection() {
    let mut previous = Table::default();
    previous.add(
      columns(["kc"]),
      [row([
        ("kc", "KC"),
        ("c1", "C1: prev C1"),
        ("c2", "C2: only prev"),
      ])],
    );
    let ident = RowIdent(vec![Value::from("KC")]);
    previous.retentions.insert(
      ident.clone(),
      [
        (
          "c1".to_string(),
          RetentionInterval::from_config(CacheInfo::new(1, 2), 3),
        ),
        (
          "c2".to_string(),
          RetentionInterval::from_config(CacheInfo::new(1, 2), 3),
        ),
      ]
      .into_iter()
      .collect(),
    );

    let mut current = Table::default();
    current.add(
      columns(["kc"]),
      [row([("kc", "KC"), ("c3", "C3: only cur")])],
    );

    let choice = RetentionChoice {
      selection:  Selection::only(["c2", "c3"]),
      cache_info: CacheInfo::new(4, 5),
    };
    current.update(0, &previous, &[], 6, &choice);

    let by_key = &current.retentions[&ident];
    assert_eq!(by_key.len(), 2);
    assert_eq!(
      by_key["c2"],
      RetentionInterval::from_previous(RetentionInterval::from_config(
        CacheInfo::new(1, 2),
        3
      ))
    );
    assert_eq!(
      by_key["c3"],
      RetentionInterval::from_config(CacheInfo::new(4, 5), 6)
    );
    assert_eq!(
      current.rows_by_ident[&ident],
      row([("kc", "KC"), ("c2", "C2: only prev"), ("c3", "C3: only cur")])
    );
  }

  #[test]
  fn update_expiry_is_per_row_identity() {
    // Two rows with separate retention windows; only the unexpired one is
    // carried forward.
    let mut previous = Table::default();
    previous.add(
      columns(["id"]),
      [
        row([("id", "fresh"), ("old", "keep me")]),
        row([("id", "stale"), ("old", "drop me")]),
      ],
    );
    previous.retentions.insert(
      RowIdent(vec![Value::from("fresh")]),
      [(
        "old".to_string(),
        RetentionInterval::from_config(CacheInfo::new(100, 0), 100),
      )]
      .into_iter()
      .collect(),
    );
    previous.retentions.insert(
      RowIdent(vec![Value::from("stale")]),
      [(
        "old".to_string(),
        RetentionInterval::from_config(CacheInfo::new(1, 0), 1),
      )]
      .into_iter()
      .collect(),
    );

    let mut current = Table::default();
    current.add(columns(["id"]), []);
    let choice = RetentionChoice {
      selection:  Selection::All,
      cache_info: CacheInfo::new(150, 0),
    };
    current.update(150, &previous, &[], 1, &choice);

    assert!(
      current
        .rows_by_ident
        .contains_key(&RowIdent(vec![Value::from("fresh")]))
    );
    assert!(
      !current
        .rows_by_ident
        .contains_key(&RowIdent(vec![Value::from("stale")]))
    );
  }
}
