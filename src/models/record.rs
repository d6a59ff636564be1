//! Search result data structure.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One matched item returned by a search query.
///
/// Identity is the `id` alone; the other fields are minimal reporting
/// metadata and may drift between runs (renamed repositories, moved URLs).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResultRecord {
    /// Stable platform identifier
    pub id: String,

    /// Human-readable locator
    pub url: String,

    /// Short description, e.g. `owner/repo` or `owner/repo:path`
    pub label: String,

    /// Query string that produced this record
    pub query: String,

    /// When this process first saw the record
    pub discovered_at: DateTime<Utc>,
}

impl ResultRecord {
    /// Format a record for display using a template.
    ///
    /// Supported placeholders:
    /// - `{id}`, `{url}`, `{label}`, `{query}`, `{discovered_at}`
    pub fn format(&self, template: &str) -> String {
        template
            .replace("{id}", &self.id)
            .replace("{url}", &self.url)
            .replace("{label}", &self.label)
            .replace("{query}", &self.query)
            .replace("{discovered_at}", &self.discovered_at.to_rfc3339())
    }
}
