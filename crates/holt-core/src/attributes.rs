//! The flat attributes container at one tree path.

use std::collections::{BTreeMap, BTreeSet};

use crate::{
  retention::{RetentionChoice, RetentionInterval, UpdateEvent},
  value::Value,
};

// ─── Attributes ──────────────────────────────────────────────────────────────

/// A flat key→scalar mapping, with optional per-key retention metadata.
///
/// Equality is defined purely over `pairs`: retention metadata never makes
/// two attribute sets differ. A key may appear in `retentions` without a
/// live pair — that records eligibility, nothing more.
#[derive(Debug, Clone, Default)]
pub struct Attributes {
  pub(crate) pairs:      BTreeMap<String, Value>,
  pub(crate) retentions: BTreeMap<String, RetentionInterval>,
}

impl Attributes {
  pub fn pairs(&self) -> &BTreeMap<String, Value> { &self.pairs }

  pub fn get(&self, key: &str) -> Option<&Value> { self.pairs.get(key) }

  pub fn retentions(&self) -> &BTreeMap<String, RetentionInterval> {
    &self.retentions
  }

  /// Only `pairs` carries weight; retentions without pairs count for
  /// nothing.
  pub fn count_entries(&self) -> usize { self.pairs.len() }

  pub fn is_empty(&self) -> bool { self.pairs.is_empty() }

  /// Merge a mapping into `pairs`. Later calls overwrite the same keys —
  /// last write wins within one run.
  pub fn add<I>(&mut self, pairs: I)
  where
    I: IntoIterator<Item = (String, Value)>,
  {
    self.pairs.extend(pairs);
  }

  /// Retention pass for one configured choice.
  ///
  /// Previous keys that pass the filter and are not yet expired, and are not
  /// reported by the current run, are copied forward with their old window
  /// (source `previous`). Every filtered key of the current run is stamped
  /// with a fresh window (source `current`). The computed retention map
  /// replaces the stored one when non-empty.
  pub(crate) fn update(
    &mut self,
    now: i64,
    previous: &Attributes,
    path: &[String],
    interval: i64,
    choice: &RetentionChoice,
  ) -> Vec<UpdateEvent> {
    let stamp = RetentionInterval::from_config(choice.cache_info, interval);

    let kept: BTreeSet<&String> = previous
      .pairs
      .keys()
      .filter(|key| {
        choice.selection.matches(key)
          && previous
            .retentions
            .get(*key)
            .is_some_and(|interval| now <= interval.keep_until())
      })
      .collect();
    let current: BTreeSet<&String> = self
      .pairs
      .keys()
      .filter(|key| choice.selection.matches(key))
      .collect();

    let mut carried: BTreeMap<String, Value> = BTreeMap::new();
    let mut retentions: BTreeMap<String, RetentionInterval> = BTreeMap::new();
    for key in kept.difference(&current) {
      carried.insert((*key).clone(), previous.pairs[*key].clone());
      retentions.insert(
        (*key).clone(),
        RetentionInterval::from_previous(previous.retentions[*key]),
      );
    }
    for key in &current {
      retentions.insert((*key).clone(), stamp);
    }

    let mut events = Vec::new();
    if !carried.is_empty() {
      let message = carried.keys().cloned().collect::<Vec<_>>().join(", ");
      self.add(carried);
      events.push(UpdateEvent::Attributes {
        path:    path.to_vec(),
        title:   "Added pairs".to_string(),
        message,
      });
    }
    if !retentions.is_empty() {
      let message = retentions
        .iter()
        .map(|(key, interval)| format!("{key} ({})", interval.keep_until()))
        .collect::<Vec<_>>()
        .join(", ");
      self.retentions = retentions;
      events.push(UpdateEvent::Attributes {
        path:    path.to_vec(),
        title:   "Keep until".to_string(),
        message,
      });
    }

    events
  }
}

impl PartialEq for Attributes {
  fn eq(&self, other: &Self) -> bool { self.pairs == other.pairs }
}

impl Eq for Attributes {}

// ─── Tests ───────────────────────────────────────────────────────────────────
