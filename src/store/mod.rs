//! Collaborator seams used by the tally engine and the snapshot reader.
//!
//! Every backend (SQLite in [`crate::db`], the in-memory stores in [`memory`],
//! Redis in `redis`) implements these traits so the engine can be built over
//! whichever mix the deployment wants.

pub mod memory;
#[cfg(feature = "redis")]
pub mod redis;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::StoreResult;
use crate::models::{Poll, ScoreEntry, VoteRecord, VoterId};

/// Read side of the poll catalog. Creation is plain persistence and lives
/// here only so the service has something to vote on.
#[async_trait]
pub trait PollCatalog: Send + Sync {
    async fn get_poll_with_options(&self, poll_id: Uuid) -> StoreResult<Option<Poll>>;

    async fn create_poll(&self, poll: &Poll) -> StoreResult<()>;
}

/// Durable record of each voter's active choice per poll.
#[async_trait]
pub trait VoteLedger: Send + Sync {
    async fn find(&self, voter_id: &VoterId, poll_id: Uuid) -> StoreResult<Option<VoteRecord>>;

    /// Fails with [`crate::error::StoreError::Conflict`] when a record already
    /// exists for the same (voter, poll) pair.
    async fn create(&self, record: &VoteRecord) -> StoreResult<()>;

    /// Removes `record` only if it is still the active one (same option).
    /// Returns whether a row was removed.
    async fn delete(&self, record: &VoteRecord) -> StoreResult<bool>;
}

/// Per-poll option scores. Adjustments are relative only, never overwrites.
#[async_trait]
pub trait ScoreStore: Send + Sync {
    /// Atomically adds `delta` and returns the new score.
    async fn increment(&self, poll_id: Uuid, option_id: Uuid, delta: i64) -> StoreResult<i64>;

    async fn decrement(&self, poll_id: Uuid, option_id: Uuid, delta: i64) -> StoreResult<i64> {
        self.increment(poll_id, option_id, -delta).await
    }

    /// Every option that has seen an adjustment, ordered by score then id.
    /// Options never voted on may be missing.
    async fn range_read(&self, poll_id: Uuid) -> StoreResult<Vec<ScoreEntry>>;
}

pub(crate) fn sort_entries(entries: &mut [ScoreEntry]) {
    entries.sort_by(|a, b| a.score.cmp(&b.score).then_with(|| a.option_id.cmp(&b.option_id)));
}
