//! Redis sorted-set score store.
//!
//! One sorted set per poll, keyed by the poll id; members are option ids and
//! the member score is the vote count. `ZINCRBY` gives the atomic relative
//! adjustment, `ZRANGE .. WITHSCORES` the ordered range read.

use async_trait::async_trait;
use log::warn;
use redis::{
    AsyncCommands, Client,
    aio::{ConnectionManager, ConnectionManagerConfig},
};
use uuid::Uuid;

use super::{ScoreStore, sort_entries};
use crate::error::{StoreError, StoreResult};
use crate::models::ScoreEntry;

impl From<redis::RedisError> for StoreError {
    fn from(e: redis::RedisError) -> Self {
        StoreError::Backend(e.to_string())
    }
}

const MAX_RETRY_DELAY_MS: u64 = 100;

#[derive(Clone)]
pub struct RedisScoreStore {
    connection: ConnectionManager,
}

impl RedisScoreStore {
    pub async fn connect(redis_url: &str) -> StoreResult<Self> {
        let config = ConnectionManagerConfig::new()
            .set_number_of_retries(1)
            .set_max_delay(MAX_RETRY_DELAY_MS);

        let client = Client::open(redis_url)?;
        let connection = client.get_connection_manager_with_config(config).await?;

        Ok(Self { connection })
    }
}

#[async_trait]
impl ScoreStore for RedisScoreStore {
    async fn increment(&self, poll_id: Uuid, option_id: Uuid, delta: i64) -> StoreResult<i64> {
        let mut conn = self.connection.clone();
        let score: f64 = conn
            .zincr(poll_id.to_string(), option_id.to_string(), delta)
            .await?;
        Ok(score as i64)
    }

    async fn range_read(&self, poll_id: Uuid) -> StoreResult<Vec<ScoreEntry>> {
        let mut conn = self.connection.clone();
        let rows: Vec<(String, f64)> = conn.zrange_withscores(poll_id.to_string(), 0, -1).await?;

        Ok(entries_from_rows(poll_id, rows))
    }
}

/// Map `ZRANGE .. WITHSCORES` rows to entries, skipping members that are not
/// option ids.
fn entries_from_rows(poll_id: Uuid, rows: Vec<(String, f64)>) -> Vec<ScoreEntry> {
    let mut entries: Vec<ScoreEntry> = rows
        .into_iter()
        .filter_map(|(member, score)| match Uuid::parse_str(&member) {
            Ok(option_id) => Some(ScoreEntry {
                option_id,
                score: score as i64,
            }),
            Err(e) => {
                warn!("Skipping non-uuid member {} in poll {}: {}", member, poll_id, e);
                None
            }
        })
        .collect();

    // Redis orders ties by member bytes; keep the uuid order the other stores use.
    sort_entries(&mut entries);
    entries
}
