// src/models/mod.rs

//! Domain models for the watcher.
//!
//! This module contains all data structures used throughout the application,
//! organized by their primary purpose.

mod config;
mod record;
mod state;
mod status;

// Re-export all public types
pub use config::{
    Config, GithubConfig, LoggingConfig, ReportConfig, SearchKind, StorageConfig, WatchConfig,
};
pub use record::ResultRecord;
pub use state::{QueryCursor, RetentionPolicy, STATE_VERSION, SeenSet, WatchState};
pub use status::{RepoStatus, StatusChange, repo_slug};
