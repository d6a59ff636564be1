//! In-memory state store.
//!
//! Used for dry runs, where a cycle must behave normally but leave the
//! durable state untouched, and in tests.

use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::WatchState;
use crate::storage::StateStore;

#[derive(Debug, Default)]
pub struct MemoryStateStore {
    state: Mutex<WatchState>,
    commits: Mutex<usize>,
}

impl MemoryStateStore {
    pub fn new(initial: WatchState) -> Self {
        Self {
            state: Mutex::new(initial),
            commits: Mutex::new(0),
        }
    }

    /// Number of commits received so far.
    pub fn commit_count(&self) -> usize {
        *self.commits.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Copy of the last committed state.
    pub fn snapshot(&self) -> WatchState {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn load(&self) -> Result<WatchState> {
        Ok(self.snapshot())
    }

    async fn commit(&self, state: &WatchState) -> Result<()> {
        *self.state.lock().unwrap_or_else(|e| e.into_inner()) = state.clone();
        *self.commits.lock().unwrap_or_else(|e| e.into_inner()) += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[tokio::test]
    async fn test_commit_is_visible_to_load() {
        let store = MemoryStateStore::default();
        let mut state = WatchState::default();
        state.seen.insert("repo:1", Utc::now());

        store.commit(&state).await.unwrap();

        assert_eq!(store.load().await.unwrap(), state);
        assert_eq!(store.commit_count(), 1);
    }
}
