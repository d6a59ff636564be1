//! Quota tracking for the search API.
//!
//! Every response carries the caller's remaining request budget and the time
//! it resets. The tracker keeps the latest values and refuses to issue a
//! request once the budget is spent, so callers get a synchronous
//! `RateLimited` signal instead of a hidden blocking wait.

use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use reqwest::header::HeaderMap;

use crate::error::SearchError;

const HEADER_LIMIT: &str = "x-ratelimit-limit";
const HEADER_REMAINING: &str = "x-ratelimit-remaining";
const HEADER_RESET: &str = "x-ratelimit-reset";
const HEADER_RETRY_AFTER: &str = "retry-after";

/// Wait used when the platform signals throttling without a usable reset time.
pub const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(60);

/// Quota signal parsed from one response.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RateLimitSnapshot {
    pub limit: Option<u32>,
    pub remaining: Option<u32>,
    pub reset_at: Option<DateTime<Utc>>,
    pub retry_after: Option<Duration>,
}

impl RateLimitSnapshot {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        fn number<T: std::str::FromStr>(headers: &HeaderMap, name: &str) -> Option<T> {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse().ok())
        }

        Self {
            limit: number(headers, HEADER_LIMIT),
            remaining: number(headers, HEADER_REMAINING),
            reset_at: number::<i64>(headers, HEADER_RESET)
                .and_then(|secs| Utc.timestamp_opt(secs, 0).single()),
            retry_after: number::<u64>(headers, HEADER_RETRY_AFTER).map(Duration::from_secs),
        }
    }

    /// Whether the response reports a spent quota.
    pub fn is_exhausted(&self) -> bool {
        self.remaining == Some(0) || self.retry_after.is_some()
    }

    /// How long to wait before the quota is usable again.
    pub fn wait_time(&self, now: DateTime<Utc>) -> Duration {
        if let Some(retry_after) = self.retry_after {
            return retry_after;
        }
        self.reset_at
            .and_then(|reset| (reset - now).to_std().ok())
            .filter(|wait| !wait.is_zero())
            .unwrap_or(DEFAULT_RETRY_AFTER)
    }
}

/// Latest snapshot and when it was received.
#[derive(Debug, Clone, Copy, Default)]
struct Observed {
    snapshot: RateLimitSnapshot,
    at: Option<DateTime<Utc>>,
}

/// Shared quota tracker for one client.
#[derive(Debug, Default)]
pub struct RateLimiter {
    reserve: u32,
    latest: Mutex<Observed>,
}

impl RateLimiter {
    /// Create a tracker that refuses requests at or below `reserve` remaining calls.
    pub fn new(reserve: u32) -> Self {
        Self {
            reserve,
            latest: Mutex::new(Observed::default()),
        }
    }

    /// Record the quota reported by a response received at `now`.
    pub fn observe(&self, snapshot: RateLimitSnapshot, now: DateTime<Utc>) {
        let mut latest = self.latest.lock().unwrap_or_else(|e| e.into_inner());
        if snapshot.remaining.is_some() || snapshot.retry_after.is_some() {
            *latest = Observed {
                snapshot,
                at: Some(now),
            };
        }
    }

    pub fn snapshot(&self) -> RateLimitSnapshot {
        self.latest.lock().unwrap_or_else(|e| e.into_inner()).snapshot
    }

    /// Fail with `RateLimited` if the next request would exceed the budget.
    ///
    /// Without a reset time the refusal lapses `retry-after` (or
    /// [`DEFAULT_RETRY_AFTER`]) after the snapshot was observed, since no
    /// fresh snapshot can arrive while requests are refused.
    pub fn check(&self, now: DateTime<Utc>) -> Result<(), SearchError> {
        let Observed { snapshot, at } = *self.latest.lock().unwrap_or_else(|e| e.into_inner());

        let Some(remaining) = snapshot.remaining else {
            return Ok(());
        };
        if remaining > self.reserve {
            return Ok(());
        }

        let ready_at = match (snapshot.reset_at, at) {
            (Some(reset), _) => Some(reset),
            (None, Some(observed)) => {
                let wait = snapshot.retry_after.unwrap_or(DEFAULT_RETRY_AFTER);
                chrono::Duration::from_std(wait)
                    .ok()
                    .and_then(|wait| observed.checked_add_signed(wait))
            }
            (None, None) => None,
        };

        match ready_at {
            // Quota window already rolled over.
            Some(ready) if ready <= now => Ok(()),
            Some(ready) => Err(SearchError::rate_limited(
                (ready - now).to_std().unwrap_or(DEFAULT_RETRY_AFTER),
            )),
            None => Ok(()),
        }
    }
}
