//! Liveness of known repositories.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Whether a known repository is still reachable.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RepoStatus {
    Active,
    /// Not found or withheld (404, 410, 451)
    Removed,
}

impl fmt::Display for RepoStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RepoStatus::Active => "active",
            RepoStatus::Removed => "removed",
        })
    }
}

/// A known repository whose status differs from the last committed one.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StatusChange {
    /// `owner/repo`, lowercase
    pub repo: String,
    pub url: String,
    /// `None` the first time the repository is checked
    pub previous: Option<RepoStatus>,
    pub current: RepoStatus,
    pub observed_at: DateTime<Utc>,
}

impl StatusChange {
    /// Compare an observation with the committed status.
    ///
    /// A first observation of an active repository is the baseline and not
    /// a change; a first observation of a removed one is.
    pub fn detect(
        repo: &str,
        url: &str,
        previous: Option<RepoStatus>,
        current: RepoStatus,
        observed_at: DateTime<Utc>,
    ) -> Option<Self> {
        let changed = match previous {
            None => current == RepoStatus::Removed,
            Some(previous) => previous != current,
        };
        changed.then(|| Self {
            repo: repo.to_string(),
            url: url.to_string(),
            previous,
            current,
            observed_at,
        })
    }

    /// `removed`, or `restored` for a removed repository that came back.
    pub fn event(&self) -> &'static str {
        match self.current {
            RepoStatus::Removed => "removed",
            RepoStatus::Active => "restored",
        }
    }
}

/// Extract the lowercase `owner/repo` slug from a repository URL.
///
/// Accepts `https://github.com/owner/repo`, with an optional trailing slash
/// or `.git` suffix. Deeper paths (files, issues) are rejected.
pub fn repo_slug(url: &str) -> Option<String> {
    let parsed = url::Url::parse(url.trim()).ok()?;
    if !matches!(parsed.host_str(), Some("github.com") | Some("www.github.com")) {
        return None;
    }

    let segments: Vec<&str> = parsed
        .path_segments()?
        .filter(|segment| !segment.is_empty())
        .collect();
    match segments.as_slice() {
        [owner, repo] => {
            let repo = repo.strip_suffix(".git").unwrap_or(repo);
            Some(format!("{owner}/{repo}").to_ascii_lowercase())
        }
        _ => None,
    }
}
