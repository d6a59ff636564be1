//! Storage abstractions for durable watcher state.
//!
//! The state is a single record (seen identifiers, last completed run and an
//! optional resume cursor) replaced as a whole on every commit.
//!
//! ## Directory Structure
//!
//! ```text
//! state/
//! ├── ghwatch_state.json        # Committed state
//! └── ghwatch_state.json.tmp    # Commit in progress (ignored on load)
//! ```

pub mod local;
pub mod memory;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::WatchState;

// Re-export for convenience
pub use local::JsonStateStore;
pub use memory::MemoryStateStore;

/// Trait for durable state backends.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Load the last committed state, or an empty state on first run.
    async fn load(&self) -> Result<WatchState>;

    /// Replace the committed state.
    ///
    /// A subsequent `load` observes either the previous or the new record,
    /// never a mix of both.
    async fn commit(&self, state: &WatchState) -> Result<()>;
}
