//! The watcher's run loop.
//!
//! ```text
//! Idle ──tick──▶ Running ──▶ Committing ──▶ Idle          (success)
//!                   │
//!                   └──▶ Backoff ──▶ Idle                  (transient / rate limited)
//!                   └──▶ halt                              (fatal / store failure)
//! ```
//!
//! Exactly one cycle runs at a time. A stop request aborts a pending sleep
//! immediately and lets a running cycle finish its current request, then
//! drops the cycle before it reaches the commit.

use std::fmt;
use std::time::Duration;

use chrono::Utc;

use crate::error::Result;
use crate::pipeline::backoff::Backoff;
use crate::pipeline::cycle::{CycleReport, CycleRunner, GatherOutcome};
use crate::pipeline::stop::StopSignal;
use crate::utils::log::{header, summary};

/// Scheduler phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Running,
    Committing,
    Backoff,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Idle => "idle",
            Phase::Running => "running",
            Phase::Committing => "committing",
            Phase::Backoff => "backoff",
        };
        f.write_str(name)
    }
}

/// Result of one scheduled cycle and the delay chosen after it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Every query ran and the results were committed
    Completed(CycleReport),
    /// Partial results were committed; the pass resumes after `retry_after`
    RateLimited {
        report: CycleReport,
        retry_after: Duration,
    },
    /// Nothing was committed; retried with backoff
    Transient(String),
    /// Stopped before commit
    Cancelled,
}

/// Drives cycles at the configured cadence.
pub struct Scheduler {
    runner: CycleRunner,
    backoff: Backoff,
    stop: StopSignal,
    phase: Phase,
    run_on_start: bool,
}

impl Scheduler {
    pub fn new(runner: CycleRunner, backoff: Backoff, stop: StopSignal) -> Self {
        Self {
            runner,
            backoff,
            stop,
            phase: Phase::Idle,
            run_on_start: true,
        }
    }

    /// Wait one interval before the first cycle instead of running at once.
    pub fn delay_first_cycle(mut self) -> Self {
        self.run_on_start = false;
        self
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn runner(&self) -> &CycleRunner {
        &self.runner
    }

    pub fn backoff(&self) -> &Backoff {
        &self.backoff
    }

    fn enter(&mut self, phase: Phase) {
        if self.phase != phase {
            log::debug!("Scheduler: {} -> {}", self.phase, phase);
            self.phase = phase;
        }
    }

    /// Run one cycle and return its outcome.
    ///
    /// Errors are halting conditions: a fatal search failure or a state
    /// store failure.
    pub async fn run_once(&mut self) -> Result<CycleOutcome> {
        self.enter(Phase::Running);
        let outcome = self.cycle().await;
        if outcome.is_err() {
            self.enter(Phase::Idle);
        }
        outcome
    }

    async fn cycle(&mut self) -> Result<CycleOutcome> {
        let gathered = match self.runner.gather(&self.stop).await? {
            GatherOutcome::Ready(gathered) => gathered,
            GatherOutcome::Transient(message) => {
                self.enter(Phase::Backoff);
                return Ok(CycleOutcome::Transient(message));
            }
            GatherOutcome::Cancelled => {
                self.enter(Phase::Idle);
                return Ok(CycleOutcome::Cancelled);
            }
        };

        if self.stop.is_stopped() {
            self.enter(Phase::Idle);
            return Ok(CycleOutcome::Cancelled);
        }

        self.enter(Phase::Committing);
        let rate_limit = gathered.rate_limit.clone();
        let report = self.runner.commit(gathered).await?;

        Ok(match rate_limit {
            Some(limit) => {
                self.enter(Phase::Backoff);
                CycleOutcome::RateLimited {
                    report,
                    retry_after: limit.retry_after,
                }
            }
            None => {
                self.enter(Phase::Idle);
                CycleOutcome::Completed(report)
            }
        })
    }

    /// Delay before the next cycle given the last outcome (jitter excluded).
    pub fn next_delay(&mut self, outcome: &CycleOutcome) -> Duration {
        match outcome {
            CycleOutcome::Completed(_) => self.backoff.on_success(),
            CycleOutcome::RateLimited { retry_after, .. } => {
                self.backoff.on_rate_limited(*retry_after)
            }
            CycleOutcome::Transient(_) => self.backoff.on_transient(),
            CycleOutcome::Cancelled => Duration::ZERO,
        }
    }

    /// Loop until stopped. Returns `Ok(())` on stop and `Err` on a halting
    /// failure.
    pub async fn run(mut self) -> Result<()> {
        header("ghwatch scheduler started");
        log::info!(
            "{} queries, interval {}s, state has {} seen identifier(s)",
            self.runner.queries().len(),
            self.backoff.config().interval.as_secs(),
            self.runner.state().seen.len()
        );

        if !self.run_on_start {
            let delay = self.backoff.config().interval + self.backoff.jitter();
            log::info!("First cycle in {}s", delay.as_secs());
            if !self.stop.sleep(delay).await {
                return self.stopped();
            }
        }

        loop {
            let outcome = match self.run_once().await {
                Ok(outcome) => outcome,
                Err(e) => {
                    log::error!("Halting: {}", e);
                    return Err(e);
                }
            };

            if outcome == CycleOutcome::Cancelled {
                return self.stopped();
            }

            let base = self.next_delay(&outcome);
            let delay = match &outcome {
                CycleOutcome::Transient(_) => {
                    (base + self.backoff.jitter()).min(self.backoff.config().max_backoff)
                }
                _ => base + self.backoff.jitter(),
            };
            report_outcome(&outcome, delay, self.backoff.failures());

            if !self.stop.sleep(delay).await {
                return self.stopped();
            }
            self.enter(Phase::Idle);
        }
    }

    fn stopped(&mut self) -> Result<()> {
        self.enter(Phase::Idle);
        log::info!("Stop requested, scheduler halted");
        Ok(())
    }
}

fn report_outcome(outcome: &CycleOutcome, delay: Duration, failures: u32) {
    let next_wake = chrono::Duration::from_std(delay)
        .ok()
        .map(|d| (Utc::now() + d).to_rfc3339())
        .unwrap_or_else(|| "unknown".to_string());

    match outcome {
        CycleOutcome::Completed(report) => {
            summary(
                "Cycle complete",
                &[
                    ("Queries", report.queries_run.to_string()),
                    ("Fetched", report.fetched.to_string()),
                    ("New", report.new.to_string()),
                    ("Ignored", report.ignored.to_string()),
                    ("Known repos checked", report.repos_checked.to_string()),
                    ("Status changes", report.status_changes.to_string()),
                    ("Seen total", report.seen_total.to_string()),
                    ("Next run", next_wake),
                ],
            );
            if report.delivery_failures > 0 {
                log::error!(
                    "{} report sink(s) failed; results were still recorded as seen",
                    report.delivery_failures
                );
            }
        }
        CycleOutcome::RateLimited { report, retry_after } => {
            log::warn!(
                "Rate limited after {} quer(y/ies): {} fetched, {} new committed; retry after {}s, next run {}",
                report.queries_run,
                report.fetched,
                report.new,
                retry_after.as_secs(),
                next_wake
            );
        }
        CycleOutcome::Transient(message) => {
            log::warn!(
                "Cycle failed ({} in a row): {}; retrying at {}",
                failures,
                message,
                next_wake
            );
        }
        CycleOutcome::Cancelled => {}
    }
}
