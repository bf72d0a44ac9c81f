//! # Tally Engine
//!
//! Applies one vote submission: checks the voter's current record in the
//! ledger, adjusts the score table and publishes the new score on the bus.
//!
//! Transitions:
//! - no record: create it, `+1` on the chosen option, one event
//! - record on the same option: [`TallyError::DuplicateVote`], nothing changes
//! - record on another option: delete it and `-1` the old option (event),
//!   then create the new record and `+1` the new option (event)
//!
//! Each ledger change is paired with its score adjustment. If the adjustment
//! fails the ledger change is rolled back, so a pair applies fully or not at
//! all. The two pairs of a revote are not one transaction.
//!
//! A submission runs on its own task, so it finishes even when the caller
//! (usually an HTTP request whose client went away) stops waiting.

mod locks;

use std::sync::Arc;

use log::{error, info, warn};
use uuid::Uuid;

use crate::bus::FanoutBus;
use crate::error::{StoreError, TallyError, TallyResult};
use crate::models::{TallyEvent, VoteRecord, VoterId};
use crate::store::{PollCatalog, ScoreStore, VoteLedger};
use locks::VoterLocks;

const MAX_CONFLICT_ATTEMPTS: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoteOutcome {
    pub voter_id: VoterId,
    pub accepted: bool,
    /// The voter id was minted by this call and must be handed to the client.
    pub new_voter: bool,
    /// Option the voter moved away from, for revotes.
    pub previous_option: Option<Uuid>,
}

#[derive(Clone)]
pub struct TallyEngine {
    core: Arc<EngineCore>,
}

struct EngineCore {
    catalog: Arc<dyn PollCatalog>,
    ledger: Arc<dyn VoteLedger>,
    scores: Arc<dyn ScoreStore>,
    bus: Arc<FanoutBus>,
    voter_locks: VoterLocks,
}

impl TallyEngine {
    pub fn new(
        catalog: Arc<dyn PollCatalog>,
        ledger: Arc<dyn VoteLedger>,
        scores: Arc<dyn ScoreStore>,
        bus: Arc<FanoutBus>,
    ) -> Self {
        Self {
            core: Arc::new(EngineCore {
                catalog,
                ledger,
                scores,
                bus,
                voter_locks: VoterLocks::default(),
            }),
        }
    }

    pub async fn submit_vote(
        &self,
        poll_id: Uuid,
        voter_id: Option<VoterId>,
        option_id: Uuid,
    ) -> TallyResult<VoteOutcome> {
        let core = Arc::clone(&self.core);
        let task = tokio::spawn(async move { core.submit_vote(poll_id, voter_id, option_id).await });

        match task.await {
            Ok(result) => result,
            Err(e) => {
                error!("Vote task for poll {} failed: {}", poll_id, e);
                Err(StoreError::Backend(format!("vote task failed: {}", e)).into())
            }
        }
    }
}

impl EngineCore {
    async fn submit_vote(
        &self,
        poll_id: Uuid,
        voter_id: Option<VoterId>,
        option_id: Uuid,
    ) -> TallyResult<VoteOutcome> {
        let poll = self
            .catalog
            .get_poll_with_options(poll_id)
            .await?
            .ok_or(TallyError::PollNotFound)?;
        if !poll.has_option(option_id) {
            return Err(TallyError::OptionNotFound);
        }

        let (voter_id, new_voter) = match voter_id {
            Some(voter_id) => (voter_id, false),
            None => (VoterId::mint(), true),
        };

        let _guard = self.voter_locks.lock(&voter_id, poll_id).await;

        let mut attempt = 1;
        loop {
            match self.apply(&voter_id, new_voter, poll_id, option_id).await {
                Err(TallyError::Storage(StoreError::Conflict)) if attempt < MAX_CONFLICT_ATTEMPTS => {
                    warn!(
                        "Ledger conflict for voter {} on poll {}, retrying (attempt {})",
                        voter_id.redacted(),
                        poll_id,
                        attempt
                    );
                    attempt += 1;
                }
                Ok(previous_option) => {
                    return Ok(VoteOutcome {
                        voter_id,
                        accepted: true,
                        new_voter,
                        previous_option,
                    });
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn apply(
        &self,
        voter_id: &VoterId,
        new_voter: bool,
        poll_id: Uuid,
        option_id: Uuid,
    ) -> TallyResult<Option<Uuid>> {
        let existing = if new_voter {
            None
        } else {
            self.ledger.find(voter_id, poll_id).await?
        };

        let previous_option = match existing {
            Some(previous) if previous.option_id == option_id => {
                info!(
                    "Duplicate vote from {} on poll {} option {}",
                    voter_id.redacted(),
                    poll_id,
                    option_id
                );
                return Err(TallyError::DuplicateVote);
            }
            Some(previous) => {
                self.retract(&previous).await?;
                Some(previous.option_id)
            }
            None => None,
        };

        self.record(VoteRecord::new(voter_id.clone(), poll_id, option_id))
            .await?;

        match previous_option {
            Some(old) => info!("Revote on poll {}: {} -> {}", poll_id, old, option_id),
            None => info!("New vote on poll {} for option {}", poll_id, option_id),
        }

        Ok(previous_option)
    }

    /// Delete `previous` and take its point away.
    async fn retract(&self, previous: &VoteRecord) -> TallyResult<()> {
        if !self.ledger.delete(previous).await? {
            // Someone else replaced or removed it since we read it.
            return Err(StoreError::Conflict.into());
        }

        let votes = match self
            .scores
            .decrement(previous.poll_id, previous.option_id, 1)
            .await
        {
            Ok(votes) => votes,
            Err(e) => {
                error!(
                    "Score decrement failed for poll {} option {}: {}",
                    previous.poll_id, previous.option_id, e
                );
                if let Err(undo) = self.ledger.create(previous).await {
                    error!("Failed to restore vote record after decrement failure: {}", undo);
                }
                return Err(e.into());
            }
        };

        self.bus.publish(TallyEvent {
            poll_id: previous.poll_id,
            option_id: previous.option_id,
            votes,
        });
        Ok(())
    }

    /// Store `record` and give its option a point.
    async fn record(&self, record: VoteRecord) -> TallyResult<()> {
        self.ledger.create(&record).await?;

        let votes = match self
            .scores
            .increment(record.poll_id, record.option_id, 1)
            .await
        {
            Ok(votes) => votes,
            Err(e) => {
                error!(
                    "Score increment failed for poll {} option {}: {}",
                    record.poll_id, record.option_id, e
                );
                if let Err(undo) = self.ledger.delete(&record).await {
                    error!("Failed to remove vote record after increment failure: {}", undo);
                }
                return Err(e.into());
            }
        };

        self.bus.publish(TallyEvent {
            poll_id: record.poll_id,
            option_id: record.option_id,
            votes,
        });
        Ok(())
    }
}
