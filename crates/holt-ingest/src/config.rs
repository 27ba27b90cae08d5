//! Retention configuration.
//!
//! Operators configure retention as a list of entries, each scoping an
//! interval to one visible tree path and naming which attribute keys and/or
//! table columns it covers. An entry without the respective field configures
//! nothing for that kind.

use holt_core::{NodePath, Selection, parse_visible_path};
use serde::Deserialize;

use crate::{
  error::{Error, Result},
  item::ItemKind,
};

// ─── Raw form ────────────────────────────────────────────────────────────────

/// `"all"` or an explicit list of keys, as written in configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawSelection {
  Keyword(String),
  Keys(Vec<String>),
}

/// One configuration record, as deserialized from the operator's config.
#[derive(Debug, Clone, Deserialize)]
pub struct RawRetentionEntry {
  pub interval:         i64,
  pub visible_raw_path: String,
  #[serde(default)]
  pub attributes:       Option<RawSelection>,
  #[serde(default)]
  pub columns:          Option<RawSelection>,
}

fn parse_selection(raw: &RawSelection) -> Result<Selection> {
  match raw {
    RawSelection::Keyword(keyword) if keyword == "all" => Ok(Selection::All),
    RawSelection::Keyword(keyword) => {
      Err(Error::UnknownSelection(keyword.clone()))
    }
    RawSelection::Keys(keys) => Ok(Selection::only(keys.iter().cloned())),
  }
}

// ─── Parsed rules ────────────────────────────────────────────────────────────

/// One parsed retention rule.
#[derive(Debug, Clone)]
pub struct RetentionRule {
  pub path:       NodePath,
  pub interval:   i64,
  pub attributes: Option<Selection>,
  pub columns:    Option<Selection>,
}

/// All parsed retention rules of one run's configuration.
#[derive(Debug, Clone, Default)]
pub struct RetentionRules {
  rules: Vec<RetentionRule>,
}

impl RetentionRules {
  pub fn parse(raw: &[RawRetentionEntry]) -> Result<Self> {
    let mut rules = Vec::with_capacity(raw.len());
    for entry in raw {
      rules.push(RetentionRule {
        path:       parse_visible_path(&entry.visible_raw_path),
        interval:   entry.interval,
        attributes: entry.attributes.as_ref().map(parse_selection).transpose()?,
        columns:    entry.columns.as_ref().map(parse_selection).transpose()?,
      });
    }
    Ok(Self { rules })
  }

  pub fn is_empty(&self) -> bool { self.rules.is_empty() }

  pub fn rules(&self) -> &[RetentionRule] { &self.rules }

  /// Whether any rule configures retention for this path and kind.
  pub(crate) fn wants(&self, path: &[String], kind: ItemKind) -> bool {
    self.rules.iter().any(|rule| {
      rule.path == path
        && match kind {
          ItemKind::Attributes => rule.attributes.is_some(),
          ItemKind::Table => rule.columns.is_some(),
        }
    })
  }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
  use super::*;

  fn entry(raw: serde_json::Value) -> RawRetentionEntry {
    serde_json::from_value(raw).unwrap()
  }

  #[test]
  fn parses_all_and_explicit_keys() {
    let rules = RetentionRules::parse(&[
      entry(serde_json::json!({
        "interval": 3,
        "visible_raw_path": "path-to.node",
        "attributes": "all",
      })),
      entry(serde_json::json!({
        "interval": 5,
        "visible_raw_path": "path-to.other",
        "columns": ["some", "keys"],
      })),
    ])
    .unwrap();

    assert_eq!(rules.rules().len(), 2);
    assert_eq!(rules.rules()[0].attributes, Some(Selection::All));
    assert_eq!(
      rules.rules()[1].columns,
      Some(Selection::only(["some", "keys"]))
    );
  }

  #[test]
  fn unknown_keyword_is_rejected() {
    let error = RetentionRules::parse(&[entry(serde_json::json!({
      "interval": 3,
      "visible_raw_path": "path-to.node",
      "attributes": "everything",
    }))])
    .unwrap_err();
    assert!(matches!(error, Error::UnknownSelection(_)));
  }

  #[test]
  fn an_entry_without_a_field_configures_nothing_for_that_kind() {
    let rules = RetentionRules::parse(&[entry(serde_json::json!({
      "interval": 3,
      "visible_raw_path": "path-to.node",
    }))])
    .unwrap();

    let path = holt_core::parse_visible_path("path-to.node");
    assert!(!rules.wants(&path, ItemKind::Attributes));
    assert!(!rules.wants(&path, ItemKind::Table));
  }

  #[test]
  fn wants_is_scoped_by_path_and_kind() {
    let rules = RetentionRules::parse(&[entry(serde_json::json!({
      "interval": 3,
      "visible_raw_path": "path-to.node",
      "attributes": "all",
    }))])
    .unwrap();

    let configured = holt_core::parse_visible_path("path-to.node");
    let other = holt_core::parse_visible_path("path-to.foo");
    assert!(rules.wants(&configured, ItemKind::Attributes));
    assert!(!rules.wants(&configured, ItemKind::Table));
    assert!(!rules.wants(&other, ItemKind::Attributes));
  }
}
