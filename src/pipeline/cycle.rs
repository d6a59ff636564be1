//! One run cycle: gather results for every query and the status of every
//! known repository, then classify, report and commit them as a single unit.
//!
//! Gathering never touches durable state. Everything that mutates state
//! happens in [`CycleRunner::commit`], after all queries of the cycle have
//! finished, so one cycle produces at most one commit.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::StreamExt;

use crate::error::{Result, SearchError};
use crate::models::{
    QueryCursor, RepoStatus, ResultRecord, RetentionPolicy, STATE_VERSION, StatusChange,
    WatchState, repo_slug,
};
use crate::pipeline::dedup::DedupEngine;
use crate::pipeline::stop::StopSignal;
use crate::report::ReportFanout;
use crate::services::{RepoStatusApi, SearchApi};
use crate::storage::StateStore;

/// Results of the Running phase, ready to be committed.
#[derive(Debug, Clone)]
pub struct Gathered {
    /// All results in query order, then page order
    pub batch: Vec<ResultRecord>,
    /// Start of the pass these results belong to
    pub pass_started_at: DateTime<Utc>,
    /// Queries fully or partially executed this cycle
    pub queries_run: usize,
    /// Set when the platform throttled us before the pass finished
    pub rate_limit: Option<RateLimitStop>,
    /// Known repositories checked this cycle
    pub observations: Vec<RepoObservation>,
}

/// One status lookup of a known repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoObservation {
    pub repo: String,
    pub url: String,
    pub status: RepoStatus,
    pub observed_at: DateTime<Utc>,
}

/// Where a throttled pass stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitStop {
    pub retry_after: Duration,
    /// Query to start from on the next cycle
    pub next_query: String,
}

/// Outcome of the Running phase.
#[derive(Debug)]
pub enum GatherOutcome {
    /// Results are ready for commit (possibly partial on rate limiting)
    Ready(Gathered),
    /// A retryable failure; nothing may be committed
    Transient(String),
    /// A stop was requested; nothing may be committed
    Cancelled,
}

/// Summary of a committed cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub fetched: usize,
    pub new: usize,
    pub ignored: usize,
    pub queries_run: usize,
    pub delivery_failures: usize,
    pub compacted: usize,
    pub repos_checked: usize,
    /// Known repositories that were removed or restored
    pub status_changes: usize,
    pub seen_total: usize,
    /// Pass finished every query and advanced the last-run timestamp
    pub pass_complete: bool,
}

/// Executes cycles against one search API, store and set of sinks.
pub struct CycleRunner {
    api: Arc<dyn SearchApi>,
    store: Arc<dyn StateStore>,
    sinks: ReportFanout,
    engine: DedupEngine,
    queries: Vec<String>,
    retention: RetentionPolicy,
    status_api: Option<Arc<dyn RepoStatusApi>>,
    /// `(owner/repo, url)` of each known repository
    known: Vec<(String, String)>,
    state: WatchState,
}

impl CycleRunner {
    /// Load the committed state and prepare a runner.
    pub async fn open(
        api: Arc<dyn SearchApi>,
        store: Arc<dyn StateStore>,
        sinks: ReportFanout,
        engine: DedupEngine,
        queries: Vec<String>,
    ) -> Result<Self> {
        let state = store.load().await?;
        Ok(Self {
            api,
            store,
            sinks,
            engine,
            queries,
            retention: RetentionPolicy::default(),
            status_api: None,
            known: Vec::new(),
            state,
        })
    }

    /// Apply a retention policy at every commit.
    pub fn with_retention(mut self, retention: RetentionPolicy) -> Self {
        self.retention = retention;
        self
    }

    /// Check the status of these repositories once per completed pass.
    ///
    /// Locators that are not `github.com/owner/repo` URLs are skipped.
    pub fn with_known_repos<I, S>(mut self, api: Arc<dyn RepoStatusApi>, urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for url in urls {
            let url = url.as_ref();
            match repo_slug(url) {
                Some(repo) if !self.known.iter().any(|(known, _)| *known == repo) => {
                    self.known.push((repo, url.trim().to_string()));
                }
                Some(_) => {}
                None => log::debug!("Not a repository URL, status not tracked: {}", url),
            }
        }
        self.status_api = Some(api);
        self
    }

    /// Repositories whose status is tracked.
    pub fn known_repos(&self) -> impl Iterator<Item = &str> {
        self.known.iter().map(|(repo, _)| repo.as_str())
    }

    /// Last committed state.
    pub fn state(&self) -> &WatchState {
        &self.state
    }

    pub fn queries(&self) -> &[String] {
        &self.queries
    }

    /// Running phase: execute the queries in order and collect their results.
    ///
    /// Starts at the query a previous throttled pass stopped at. A fatal
    /// search failure is returned as an error.
    pub async fn gather(&self, stop: &StopSignal) -> Result<GatherOutcome> {
        let now = Utc::now();
        let resumed = self
            .state
            .cursor
            .as_ref()
            .filter(|cursor| self.queries.contains(&cursor.next_query));
        let start = self.state.resume_index(&self.queries);
        let pass_started_at = resumed.map_or(now, |cursor| cursor.started_at);
        let since = self.state.last_run_at;

        if resumed.is_some() {
            log::info!(
                "Resuming pass at query {}/{} ('{}')",
                start + 1,
                self.queries.len(),
                self.queries[start]
            );
        }

        let mut batch = Vec::new();
        let mut queries_run = 0;

        for query in &self.queries[start..] {
            if stop.is_stopped() {
                return Ok(GatherOutcome::Cancelled);
            }
            queries_run += 1;

            let mut results = self.api.search(query, since);
            let mut count = 0usize;
            loop {
                if stop.is_stopped() {
                    return Ok(GatherOutcome::Cancelled);
                }
                match results.next().await {
                    None => break,
                    Some(Ok(record)) => {
                        count += 1;
                        batch.push(record);
                    }
                    Some(Err(SearchError::RateLimited { retry_after })) => {
                        log::warn!(
                            "Rate limited during '{}' after {} result(s); {} gathered this cycle",
                            query,
                            count,
                            batch.len()
                        );
                        return Ok(GatherOutcome::Ready(Gathered {
                            batch,
                            pass_started_at,
                            queries_run,
                            rate_limit: Some(RateLimitStop {
                                retry_after,
                                next_query: query.clone(),
                            }),
                            observations: Vec::new(),
                        }));
                    }
                    Some(Err(SearchError::Transient(message))) => {
                        return Ok(GatherOutcome::Transient(format!("'{query}': {message}")));
                    }
                    Some(Err(fatal @ SearchError::Fatal(_))) => {
                        log::error!("Query '{}' failed permanently: {}", query, fatal);
                        return Err(fatal.into());
                    }
                }
            }
            log::debug!("Query '{}' returned {} result(s)", query, count);
        }

        let Some(observations) = self.check_known(stop).await else {
            return Ok(GatherOutcome::Cancelled);
        };
        if stop.is_stopped() {
            return Ok(GatherOutcome::Cancelled);
        }

        Ok(GatherOutcome::Ready(Gathered {
            batch,
            pass_started_at,
            queries_run,
            rate_limit: None,
            observations,
        }))
    }

    /// Look up every known repository. `None` if a stop was requested.
    ///
    /// A failed lookup leaves that repository's committed status untouched;
    /// a rate limit skips the rest until the next pass.
    async fn check_known(&self, stop: &StopSignal) -> Option<Vec<RepoObservation>> {
        let mut observations = Vec::new();
        let Some(api) = &self.status_api else {
            return Some(observations);
        };

        for (repo, url) in &self.known {
            if stop.is_stopped() {
                return None;
            }
            match api.repo_status(repo).await {
                Ok(status) => {
                    log::debug!("Known repository {} is {}", repo, status);
                    observations.push(RepoObservation {
                        repo: repo.clone(),
                        url: url.clone(),
                        status,
                        observed_at: Utc::now(),
                    });
                }
                Err(SearchError::RateLimited { retry_after }) => {
                    log::warn!(
                        "Rate limited during status checks; {} of {} checked, rest deferred ({}s)",
                        observations.len(),
                        self.known.len(),
                        retry_after.as_secs()
                    );
                    break;
                }
                Err(e) => log::warn!("Status check for {} failed: {}", repo, e),
            }
        }
        Some(observations)
    }

    /// Committing phase: classify, report, then persist.
    ///
    /// Reporting happens before the commit: a crash in between repeats the
    /// report on the next cycle instead of losing it.
    pub async fn commit(&mut self, gathered: Gathered) -> Result<CycleReport> {
        let classification = self.engine.classify(&gathered.batch, &self.state.seen);
        let changes: Vec<StatusChange> = gathered
            .observations
            .iter()
            .filter_map(|o| {
                let previous = self.state.known.get(&o.repo).copied();
                StatusChange::detect(&o.repo, &o.url, previous, o.status, o.observed_at)
            })
            .collect();

        let mut failures = self.sinks.deliver(&classification.new_records).await;
        failures.extend(self.sinks.deliver_status(&changes).await);

        let mut next = WatchState {
            version: STATE_VERSION,
            seen: classification.seen,
            last_run_at: self.state.last_run_at,
            cursor: None,
            known: self.state.known.clone(),
        };
        if self.status_api.is_some() {
            next.known
                .retain(|repo, _| self.known.iter().any(|(known, _)| known == repo));
        }
        for observation in &gathered.observations {
            next.known.insert(observation.repo.clone(), observation.status);
        }
        match &gathered.rate_limit {
            Some(limit) => {
                next.cursor = Some(QueryCursor {
                    next_query: limit.next_query.clone(),
                    started_at: gathered.pass_started_at,
                });
            }
            None => next.last_run_at = Some(gathered.pass_started_at),
        }

        let compacted = if self.retention.is_disabled() {
            0
        } else {
            next.seen.compact(&self.retention, Utc::now())
        };
        if compacted > 0 {
            log::info!("Retention policy removed {} seen identifier(s)", compacted);
        }

        if next != self.state {
            self.store.commit(&next).await?;
        }
        self.state = next;

        Ok(CycleReport {
            fetched: gathered.batch.len(),
            new: classification.new_records.len(),
            ignored: classification.ignored,
            queries_run: gathered.queries_run,
            delivery_failures: failures.len(),
            compacted,
            repos_checked: gathered.observations.len(),
            status_changes: changes.len(),
            seen_total: self.state.seen.len(),
            pass_complete: gathered.rate_limit.is_none(),
        })
    }
}
