//! Picks the ledger and score store for a `SCORE_BACKEND` setting.
//!
//! The ledger and the score table have to live and die together: a vote
//! record that outlives its score (or the reverse) breaks the count. So the
//! in-memory score store is paired with the in-memory ledger, never with the
//! durable SQLite one.

use std::sync::Arc;

use log::{info, warn};

use crate::config::{Config, ScoreBackend};
use crate::db::Database;
use crate::error::{StoreError, StoreResult};
use crate::store::memory::{MemoryLedger, MemoryScoreStore};
use crate::store::{PollCatalog, ScoreStore, VoteLedger};

pub struct Backends {
    pub catalog: Arc<dyn PollCatalog>,
    pub ledger: Arc<dyn VoteLedger>,
    pub scores: Arc<dyn ScoreStore>,
}

impl Backends {
    pub async fn from_config(config: &Config, database: Arc<Database>) -> StoreResult<Self> {
        let catalog: Arc<dyn PollCatalog> = database.clone();

        let (ledger, scores): (Arc<dyn VoteLedger>, Arc<dyn ScoreStore>) = match config.score_backend {
            ScoreBackend::Sqlite => (database.clone(), database),
            ScoreBackend::Memory => {
                warn!("Votes and scores are kept in memory and will not survive a restart");
                (Arc::new(MemoryLedger::new()), Arc::new(MemoryScoreStore::new()))
            }
            #[cfg(feature = "redis")]
            ScoreBackend::Redis => {
                let store = crate::store::redis::RedisScoreStore::connect(&config.redis_url).await?;
                info!("Using Redis score store at {}", config.redis_url);
                (database, Arc::new(store))
            }
            #[cfg(not(feature = "redis"))]
            ScoreBackend::Redis => {
                return Err(StoreError::Backend(
                    "SCORE_BACKEND=redis requires the `redis` feature".into(),
                ));
            }
        };

        info!("Score backend: {}", config.score_backend);
        Ok(Self {
            catalog,
            ledger,
            scores,
        })
    }
}
