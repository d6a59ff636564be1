//! Novelty detection against the seen set.
//!
//! Computes which results of a cycle have never been reported before and the
//! seen set that would result from reporting them. Nothing is committed
//! here; the caller decides when the updated set becomes durable.

use std::collections::HashSet;

use crate::models::{ResultRecord, SeenSet};

/// Outcome of classifying one cycle's batch.
#[derive(Debug, Clone, Default)]
pub struct Classification {
    /// Previously unseen results in first-seen order
    pub new_records: Vec<ResultRecord>,
    /// Input seen set plus every identifier in `new_records`
    pub seen: SeenSet,
    /// Results dropped by the ignore list
    pub ignored: usize,
}

impl Classification {
    /// Check if there is anything to report.
    pub fn has_new(&self) -> bool {
        !self.new_records.is_empty()
    }

    pub fn new_count(&self) -> usize {
        self.new_records.len()
    }
}

/// Classifier for separating new results from already-reported ones.
#[derive(Debug, Clone, Default)]
pub struct DedupEngine {
    /// Locators that are known in advance and never reported
    ignored_urls: HashSet<String>,
}

impl DedupEngine {
    /// Create an engine without an ignore list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an engine that skips the given locators.
    pub fn with_ignored_urls<I, S>(urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            ignored_urls: urls
                .into_iter()
                .map(|u| normalize_url(u.as_ref()))
                .collect(),
        }
    }

    /// Classify a batch against a seen set.
    ///
    /// A record is new iff its identifier is absent from `seen`. Repeated
    /// identifiers within the batch are reported once, at their first
    /// position; batch order is query order, then page order.
    pub fn classify(&self, batch: &[ResultRecord], seen: &SeenSet) -> Classification {
        let mut updated = seen.clone();
        let mut new_records = Vec::new();
        let mut ignored = 0;

        for record in batch {
            if !self.ignored_urls.is_empty()
                && self.ignored_urls.contains(&normalize_url(&record.url))
            {
                ignored += 1;
                continue;
            }
            if updated.insert(record.id.clone(), record.discovered_at) {
                new_records.push(record.clone());
            }
        }

        Classification {
            new_records,
            seen: updated,
            ignored,
        }
    }
}

/// Convenience function to classify without an ignore list.
pub fn classify(batch: &[ResultRecord], seen: &SeenSet) -> Classification {
    DedupEngine::new().classify(batch, seen)
}

fn normalize_url(url: &str) -> String {
    url.trim().trim_end_matches('/').to_ascii_lowercase()
}
