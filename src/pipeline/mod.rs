//! Pipeline stages of the watcher.
//!
//! - `dedup`: classify a batch against the seen set
//! - `cycle`: gather one cycle's results and commit them
//! - `backoff`: choose the delay before the next cycle
//! - `scheduler`: the run loop tying it together

pub mod backoff;
pub mod cycle;
pub mod dedup;
pub mod scheduler;
pub mod stop;

pub use backoff::{Backoff, BackoffConfig};
pub use cycle::{CycleReport, CycleRunner, GatherOutcome, Gathered, RateLimitStop, RepoObservation};
pub use dedup::{Classification, DedupEngine, classify};
pub use scheduler::{CycleOutcome, Phase, Scheduler};
pub use stop::StopSignal;
