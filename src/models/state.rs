//! Durable watcher state: seen identifiers, last run, resume cursor and
//! known-repository status.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::RepoStatus;

/// Current on-disk layout version.
pub const STATE_VERSION: u32 = 1;

/// Identifiers already reported as new, with the time each was first seen.
///
/// Grows monotonically during normal operation; only [`SeenSet::compact`]
/// removes entries.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct SeenSet {
    entries: BTreeMap<String, DateTime<Utc>>,
}

impl SeenSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    /// Insert an identifier. Returns `true` if it was not present.
    ///
    /// An existing entry keeps its original first-seen time.
    pub fn insert(&mut self, id: impl Into<String>, seen_at: DateTime<Utc>) -> bool {
        let id = id.into();
        if self.entries.contains_key(&id) {
            return false;
        }
        self.entries.insert(id, seen_at);
        true
    }

    pub fn first_seen(&self, id: &str) -> Option<DateTime<Utc>> {
        self.entries.get(id).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn is_superset_of(&self, other: &SeenSet) -> bool {
        other.ids().all(|id| self.contains(id))
    }

    /// Apply a retention policy, returning the number of entries removed.
    pub fn compact(&mut self, policy: &RetentionPolicy, now: DateTime<Utc>) -> usize {
        let before = self.entries.len();

        // A horizon before the representable range keeps everything.
        if let Some(horizon) = policy.max_age.and_then(|age| now.checked_sub_signed(age)) {
            self.entries.retain(|_, seen_at| *seen_at >= horizon);
        }

        if let Some(max_entries) = policy.max_entries {
            if self.entries.len() > max_entries {
                let mut by_age: Vec<(DateTime<Utc>, String)> = self
                    .entries
                    .iter()
                    .map(|(id, seen_at)| (*seen_at, id.clone()))
                    .collect();
                by_age.sort();

                let excess = self.entries.len() - max_entries;
                for (_, id) in by_age.into_iter().take(excess) {
                    self.entries.remove(&id);
                }
            }
        }

        before - self.entries.len()
    }
}

/// Growth bound for the seen set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetentionPolicy {
    /// Drop identifiers first seen before `now - max_age`
    pub max_age: Option<chrono::Duration>,
    /// Keep at most this many identifiers, oldest dropped first
    pub max_entries: Option<usize>,
}

impl RetentionPolicy {
    pub fn is_disabled(&self) -> bool {
        self.max_age.is_none() && self.max_entries.is_none()
    }
}

/// Position of a pass that stopped early on a rate limit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct QueryCursor {
    /// Query string the next cycle starts from
    pub next_query: String,
    /// Start time of the first cycle of this pass
    pub started_at: DateTime<Utc>,
}

/// The durable record committed once per successful cycle.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WatchState {
    #[serde(default = "default_version")]
    pub version: u32,

    #[serde(default)]
    pub seen: SeenSet,

    /// Start time of the most recent pass that covered every query
    #[serde(default)]
    pub last_run_at: Option<DateTime<Utc>>,

    /// Set while a pass is incomplete
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cursor: Option<QueryCursor>,

    /// Last observed status of each known repository, by `owner/repo`
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub known: BTreeMap<String, RepoStatus>,
}

fn default_version() -> u32 {
    STATE_VERSION
}

impl Default for WatchState {
    fn default() -> Self {
        Self {
            version: STATE_VERSION,
            seen: SeenSet::new(),
            last_run_at: None,
            cursor: None,
            known: BTreeMap::new(),
        }
    }
}

impl WatchState {
    /// Index of the query a new cycle should start at.
    ///
    /// Falls back to the first query when the cursor names a query that is
    /// no longer configured.
    pub fn resume_index(&self, queries: &[String]) -> usize {
        self.cursor
            .as_ref()
            .and_then(|cursor| queries.iter().position(|q| *q == cursor.next_query))
            .unwrap_or(0)
    }
}
