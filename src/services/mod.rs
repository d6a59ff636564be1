//! Service layer for the watcher.
//!
//! This module contains the search API boundary:
//! - Search abstraction (`SearchApi`)
//! - Known-repository liveness (`RepoStatusApi`)
//! - GitHub implementation (`GitHubClient`)
//! - Quota tracking (`RateLimiter`)

mod github;
mod rate_limit;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::BoxStream;

use crate::error::SearchError;
use crate::models::{RepoStatus, ResultRecord};

pub use github::{GitHubClient, classify_status, classify_transport, next_page_url};
pub use rate_limit::{DEFAULT_RETRY_AFTER, RateLimitSnapshot, RateLimiter};

/// Lazy, finite sequence of results for one query.
pub type RecordStream<'a> = BoxStream<'a, Result<ResultRecord, SearchError>>;

/// A rate-limit-aware search endpoint.
///
/// Each call starts a fresh sequence at the first page; dropping the stream
/// stops further requests. An error item ends the sequence.
pub trait SearchApi: Send + Sync {
    fn search<'a>(&'a self, query: &'a str, since: Option<DateTime<Utc>>) -> RecordStream<'a>;
}

/// Liveness lookup for a known repository.
#[async_trait]
pub trait RepoStatusApi: Send + Sync {
    /// Status of `owner/repo`; failures use the same classification as search.
    async fn repo_status(&self, repo: &str) -> Result<RepoStatus, SearchError>;
}
