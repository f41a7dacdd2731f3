use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use bakehouse_ledger::LedgerBook;
use bakehouse_types::{Agent, Bake, Submission};

/// The complete durable state the escrow core owns: agents, bakes,
/// submissions, and the BP ledger. Cloned wholesale per transaction.
#[derive(Debug, Clone, Default)]
pub struct WorldState {
    pub agents: HashMap<Uuid, Agent>,
    pub bakes: HashMap<Uuid, Bake>,
    pub submissions: HashMap<Uuid, Submission>,
    pub ledger: LedgerBook,
}

impl WorldState {
    pub fn submissions_for_bake(&self, bake_id: Uuid) -> Vec<&Submission> {
        self.submissions
            .values()
            .filter(|s| s.bake_id == bake_id)
            .collect()
    }

    pub fn submission_count(&self, bake_id: Uuid) -> usize {
        self.submissions
            .values()
            .filter(|s| s.bake_id == bake_id)
            .count()
    }

    pub fn submission_by(&self, bake_id: Uuid, agent_id: Uuid) -> Option<&Submission> {
        self.submissions
            .values()
            .find(|s| s.bake_id == bake_id && s.agent_id == agent_id)
    }
}

/// Returned by `commit` when another transaction committed in between.
#[derive(Debug, thiserror::Error)]
#[error("store version moved from {expected} to {actual}")]
pub struct CommitConflict {
    pub expected: u64,
    pub actual: u64,
}

/// Versioned snapshot/commit store. A transaction is: take a snapshot,
/// validate and mutate the clone, commit against the snapshot's version.
/// The compare-and-swap on the version is what makes each unit atomic
/// under concurrency; a conflicting commit leaves the store untouched.
#[async_trait]
pub trait StateStore: Send + Sync {
    async fn snapshot(&self) -> (u64, WorldState);
    async fn commit(
        &self,
        expected_version: u64,
        state: WorldState,
    ) -> Result<(), CommitConflict>;
}

/// In-memory store (default).
#[derive(Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<(u64, WorldState)>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StateStore for MemoryStore {
    async fn snapshot(&self) -> (u64, WorldState) {
        let guard = self.inner.read().await;
        (guard.0, guard.1.clone())
    }

    async fn commit(
        &self,
        expected_version: u64,
        state: WorldState,
    ) -> Result<(), CommitConflict> {
        let mut guard = self.inner.write().await;
        if guard.0 != expected_version {
            return Err(CommitConflict {
                expected: expected_version,
                actual: guard.0,
            });
        }
        *guard = (expected_version + 1, state);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_snapshot_commit_roundtrip() {
        let store = MemoryStore::new();
        let (version, mut state) = store.snapshot().await;
        assert_eq!(version, 0);

        let agent = Agent::new("baker");
        state.agents.insert(agent.id, agent.clone());
        store.commit(version, state).await.unwrap();

        let (version, state) = store.snapshot().await;
        assert_eq!(version, 1);
        assert!(state.agents.contains_key(&agent.id));
    }

    #[tokio::test]
    async fn test_stale_commit_is_rejected() {
        let store = MemoryStore::new();
        let (v1, mut s1) = store.snapshot().await;
        let (v2, mut s2) = store.snapshot().await;
        assert_eq!(v1, v2);

        let a = Agent::new("first");
        s1.agents.insert(a.id, a);
        store.commit(v1, s1).await.unwrap();

        let b = Agent::new("second");
        s2.agents.insert(b.id, b.clone());
        let err = store.commit(v2, s2).await.unwrap_err();
        assert_eq!(err.expected, v2);
        assert_eq!(err.actual, v2 + 1);

        // The losing commit left no trace.
        let (_, state) = store.snapshot().await;
        assert!(!state.agents.contains_key(&b.id));
        assert_eq!(state.agents.len(), 1);
    }
}
