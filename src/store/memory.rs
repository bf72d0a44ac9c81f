//! In-process stores. Used by tests and by `SCORE_BACKEND=memory`.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::{Mutex, RwLock};

use async_trait::async_trait;
use uuid::Uuid;

use super::{PollCatalog, ScoreStore, VoteLedger, sort_entries};
use crate::error::{StoreError, StoreResult};
use crate::models::{Poll, ScoreEntry, VoteRecord, VoterId};

fn poisoned() -> StoreError {
    StoreError::Backend("Lock poisoned".into())
}

#[derive(Debug, Default)]
pub struct MemoryCatalog {
    polls: RwLock<HashMap<Uuid, Poll>>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PollCatalog for MemoryCatalog {
    async fn get_poll_with_options(&self, poll_id: Uuid) -> StoreResult<Option<Poll>> {
        let polls = self.polls.read().map_err(|_| poisoned())?;
        Ok(polls.get(&poll_id).cloned())
    }

    async fn create_poll(&self, poll: &Poll) -> StoreResult<()> {
        let mut polls = self.polls.write().map_err(|_| poisoned())?;
        polls.insert(poll.id, poll.clone());
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct MemoryLedger {
    records: Mutex<HashMap<(VoterId, Uuid), VoteRecord>>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.lock().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl VoteLedger for MemoryLedger {
    async fn find(&self, voter_id: &VoterId, poll_id: Uuid) -> StoreResult<Option<VoteRecord>> {
        let records = self.records.lock().map_err(|_| poisoned())?;
        Ok(records.get(&(voter_id.clone(), poll_id)).cloned())
    }

    async fn create(&self, record: &VoteRecord) -> StoreResult<()> {
        let mut records = self.records.lock().map_err(|_| poisoned())?;
        match records.entry((record.voter_id.clone(), record.poll_id)) {
            Entry::Occupied(_) => Err(StoreError::Conflict),
            Entry::Vacant(slot) => {
                slot.insert(record.clone());
                Ok(())
            }
        }
    }

    async fn delete(&self, record: &VoteRecord) -> StoreResult<bool> {
        let mut records = self.records.lock().map_err(|_| poisoned())?;
        let key = (record.voter_id.clone(), record.poll_id);
        match records.get(&key) {
            Some(current) if current.option_id == record.option_id => {
                records.remove(&key);
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[derive(Debug, Default)]
pub struct MemoryScoreStore {
    scores: Mutex<HashMap<Uuid, HashMap<Uuid, i64>>>,
}

impl MemoryScoreStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ScoreStore for MemoryScoreStore {
    async fn increment(&self, poll_id: Uuid, option_id: Uuid, delta: i64) -> StoreResult<i64> {
        let mut scores = self.scores.lock().map_err(|_| poisoned())?;
        let score = scores
            .entry(poll_id)
            .or_default()
            .entry(option_id)
            .or_insert(0);
        *score += delta;
        Ok(*score)
    }

    async fn range_read(&self, poll_id: Uuid) -> StoreResult<Vec<ScoreEntry>> {
        let scores = self.scores.lock().map_err(|_| poisoned())?;
        let mut entries: Vec<ScoreEntry> = scores
            .get(&poll_id)
            .map(|options| {
                options
                    .iter()
                    .map(|(&option_id, &score)| ScoreEntry { option_id, score })
                    .collect()
            })
            .unwrap_or_default();
        sort_entries(&mut entries);
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn ledger_rejects_second_record_for_same_pair() {
        let ledger = MemoryLedger::new();
        let voter = VoterId::mint();
        let poll_id = Uuid::new_v4();

        ledger
            .create(&VoteRecord::new(voter.clone(), poll_id, Uuid::new_v4()))
            .await
            .unwrap();
        let second = ledger
            .create(&VoteRecord::new(voter.clone(), poll_id, Uuid::new_v4()))
            .await;

        assert!(matches!(second, Err(StoreError::Conflict)));
        assert_eq!(ledger.len(), 1);
    }

    #[tokio::test]
    async fn ledger_delete_ignores_stale_record() {
        let ledger = MemoryLedger::new();
        let voter = VoterId::mint();
        let poll_id = Uuid::new_v4();
        let current = VoteRecord::new(voter.clone(), poll_id, Uuid::new_v4());
        ledger.create(&current).await.unwrap();

        let stale = VoteRecord::new(voter.clone(), poll_id, Uuid::new_v4());
        assert!(!ledger.delete(&stale).await.unwrap());
        assert!(ledger.delete(&current).await.unwrap());
        assert!(ledger.find(&voter, poll_id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn range_read_is_ordered_and_scoped_to_poll() {
        let store = MemoryScoreStore::new();
        let poll_id = Uuid::new_v4();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());

        store.increment(poll_id, a, 3).await.unwrap();
        store.increment(poll_id, b, 1).await.unwrap();
        store.increment(Uuid::new_v4(), a, 7).await.unwrap();
        assert_eq!(store.decrement(poll_id, a, 1).await.unwrap(), 2);

        let entries = store.range_read(poll_id).await.unwrap();
        assert_eq!(
            entries,
            vec![
                ScoreEntry { option_id: b, score: 1 },
                ScoreEntry { option_id: a, score: 2 },
            ]
        );
        assert!(store.range_read(Uuid::new_v4()).await.unwrap().is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_increments_are_not_lost() {
        let store = Arc::new(MemoryScoreStore::new());
        let poll_id = Uuid::new_v4();
        let option_id = Uuid::new_v4();

        let handles: Vec<_> = (0..64)
            .map(|_| {
                let store = Arc::clone(&store);
                tokio::spawn(async move { store.increment(poll_id, option_id, 1).await })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let entries = store.range_read(poll_id).await.unwrap();
        assert_eq!(entries, vec![ScoreEntry { option_id, score: 64 }]);
    }
}
