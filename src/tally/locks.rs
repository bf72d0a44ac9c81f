use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use uuid::Uuid;

use crate::models::VoterId;

type Key = (VoterId, Uuid);

/// Async mutex per (voter, poll). Entries are removed once nobody holds or
/// waits on them, so the map only tracks in-flight submissions.
#[derive(Default)]
pub(super) struct VoterLocks {
    slots: Mutex<HashMap<Key, Arc<AsyncMutex<()>>>>,
}

impl VoterLocks {
    fn slots(&self) -> MutexGuard<'_, HashMap<Key, Arc<AsyncMutex<()>>>> {
        self.slots.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub(super) async fn lock(&self, voter_id: &VoterId, poll_id: Uuid) -> VoterGuard<'_> {
        let key = (voter_id.clone(), poll_id);
        let slot = Arc::clone(self.slots().entry(key.clone()).or_default());
        let held = Arc::clone(&slot).lock_owned().await;

        VoterGuard {
            locks: self,
            key,
            slot,
            held: Some(held),
        }
    }

    #[cfg(test)]
    pub(super) fn in_flight(&self) -> usize {
        self.slots().len()
    }
}

pub(super) struct VoterGuard<'a> {
    locks: &'a VoterLocks,
    key: Key,
    slot: Arc<AsyncMutex<()>>,
    held: Option<OwnedMutexGuard<()>>,
}

impl Drop for VoterGuard<'_> {
    fn drop(&mut self) {
        self.held.take();
        let mut slots = self.locks.slots();
        // The map's copy plus ours: nobody else is waiting.
        if Arc::strong_count(&self.slot) == 2 {
            slots.remove(&self.key);
        }
    }
}
