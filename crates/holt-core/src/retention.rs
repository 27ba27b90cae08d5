//! Retention intervals and update reporting.
//!
//! A retention interval is the time window during which a previously
//! collected value stays valid for display even if the current inventory run
//! did not report it: `keep_until = cached_at + cache_interval +
//! retention_interval`, and a value is retained at `now` iff
//! `now <= keep_until`.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::{
  filter::Selection,
  value::{NodePath, RowIdent},
};

// ─── RetentionInterval ───────────────────────────────────────────────────────

/// Whether a stamped interval was carried forward from the previous tree or
/// written fresh during the current run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RetentionSource {
  Previous,
  Current,
}

/// The retention window attached to one attribute key or one table cell.
///
/// Wire format is the 4-tuple `[cached_at, cache_interval,
/// retention_interval, source]`; a 3-tuple from older trees deserializes
/// with source `current`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionInterval {
  pub cached_at:          i64,
  pub cache_interval:     i64,
  pub retention_interval: i64,
  pub source:             RetentionSource,
}

impl RetentionInterval {
  /// A fresh interval stamped from configuration during the current run.
  pub fn from_config(cache_info: CacheInfo, retention_interval: i64) -> Self {
    Self {
      cached_at: cache_info.cached_at,
      cache_interval: cache_info.cache_interval,
      retention_interval,
      source: RetentionSource::Current,
    }
  }

  /// Carry an interval forward from the previous tree unchanged, marked as
  /// originating there.
  pub fn from_previous(previous: Self) -> Self {
    Self {
      source: RetentionSource::Previous,
      ..previous
    }
  }

  /// The last instant at which the value is still considered valid.
  pub fn keep_until(&self) -> i64 {
    self.cached_at + self.cache_interval + self.retention_interval
  }
}

impl Serialize for RetentionInterval {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    (
      self.cached_at,
      self.cache_interval,
      self.retention_interval,
      self.source,
    )
      .serialize(serializer)
  }
}

/// Accepts the current 4-tuple and the legacy 3-tuple wire forms.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawRetentionInterval {
  Tagged(i64, i64, i64, RetentionSource),
  Legacy(i64, i64, i64),
}

impl<'de> Deserialize<'de> for RetentionInterval {
  fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
    Ok(match RawRetentionInterval::deserialize(deserializer)? {
      RawRetentionInterval::Tagged(
        cached_at,
        cache_interval,
        retention_interval,
        source,
      ) => Self {
        cached_at,
        cache_interval,
        retention_interval,
        source,
      },
      RawRetentionInterval::Legacy(cached_at, cache_interval, retention_interval) => {
        Self {
          cached_at,
          cache_interval,
          retention_interval,
          source: RetentionSource::Current,
        }
      }
    })
  }
}

// ─── CacheInfo ───────────────────────────────────────────────────────────────

/// Where a plugin's data came from: the fetch time and the cache's validity
/// period. Data that was not cache-backed uses `(now, 0)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheInfo {
  pub cached_at:      i64,
  pub cache_interval: i64,
}

impl CacheInfo {
  pub fn new(cached_at: i64, cache_interval: i64) -> Self {
    Self {
      cached_at,
      cache_interval,
    }
  }

  /// The fallback for data collected live during this run.
  pub fn live(now: i64) -> Self { Self::new(now, 0) }
}

// ─── Retention choices ───────────────────────────────────────────────────────

/// One retention choice: which keys qualify, and the cache info to stamp
/// them with.
#[derive(Debug, Clone)]
pub struct RetentionChoice {
  pub selection:  Selection,
  pub cache_info: CacheInfo,
}

/// All retention choices gathered for one tree path in one inventory run.
/// Attribute pairs and table columns are configured independently.
#[derive(Debug, Clone)]
pub struct RetentionChoices {
  path:     NodePath,
  interval: i64,
  pairs:    Vec<RetentionChoice>,
  columns:  Vec<RetentionChoice>,
}

impl RetentionChoices {
  pub fn new(path: NodePath, interval: i64) -> Self {
    Self {
      path,
      interval,
      pairs: Vec::new(),
      columns: Vec::new(),
    }
  }

  pub fn path(&self) -> &[String] { &self.path }

  pub fn interval(&self) -> i64 { self.interval }

  pub fn pairs(&self) -> &[RetentionChoice] { &self.pairs }

  pub fn columns(&self) -> &[RetentionChoice] { &self.columns }

  pub fn add_pairs_choice(&mut self, selection: Selection, cache_info: CacheInfo) {
    self.pairs.push(RetentionChoice {
      selection,
      cache_info,
    });
  }

  pub fn add_columns_choice(&mut self, selection: Selection, cache_info: CacheInfo) {
    self.columns.push(RetentionChoice {
      selection,
      cache_info,
    });
  }

  pub fn is_empty(&self) -> bool {
    self.pairs.is_empty() && self.columns.is_empty()
  }
}

// ─── UpdateEvent ─────────────────────────────────────────────────────────────

/// What a retention update changed, for operator-facing reporting. Emitted
/// only when something actually changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateEvent {
  Attributes {
    path:    NodePath,
    title:   String,
    message: String,
  },
  Table {
    path:    NodePath,
    ident:   RowIdent,
    title:   String,
    message: String,
  },
}

impl fmt::Display for UpdateEvent {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Attributes { title, message, .. } => {
        write!(f, "[Attributes] {title}: {message}")
      }
      Self::Table {
        ident,
        title,
        message,
        ..
      } => write!(f, "[Table] '{ident}': {title}: {message}"),
    }
  }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
