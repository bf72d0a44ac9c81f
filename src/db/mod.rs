use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::info;
use sqlx::{
    Row, Sqlite,
    migrate::MigrateDatabase,
    sqlite::{SqlitePool, SqlitePoolOptions, SqliteRow},
};
use uuid::Uuid;

use crate::error::{StoreError, StoreResult};
use crate::models::{Poll, PollOption, ScoreEntry, VoteRecord, VoterId};
use crate::store::{PollCatalog, ScoreStore, VoteLedger, sort_entries};

/// SQLite-backed catalog, vote ledger and score table.
pub struct Database {
    pool: SqlitePool,
}

fn parse_uuid(raw: &str, column: &str) -> StoreResult<Uuid> {
    Uuid::parse_str(raw).map_err(|e| StoreError::Backend(format!("Bad {} '{}': {}", column, raw, e)))
}

fn parse_time(raw: &str) -> StoreResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::Backend(format!("Failed to parse voted_at: {}", e)))
}

impl Database {
    pub async fn new(db_url: &str) -> StoreResult<Self> {
        // Create database if it doesn't exist
        if !Sqlite::database_exists(db_url).await.unwrap_or(false) {
            info!("Creating database at {}", db_url);
            Sqlite::create_database(db_url).await?;
        }

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(db_url)
            .await?;

        Self::init_schema(&pool).await?;

        Ok(Self { pool })
    }

    /// Private in-memory database. Pinned to a single connection since every
    /// `:memory:` connection is its own database.
    pub async fn in_memory() -> StoreResult<Self> {
        let pool = SqlitePoolOptions::new()
            .min_connections(1)
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;

        Self::init_schema(&pool).await?;

        Ok(Self { pool })
    }

    async fn init_schema(pool: &SqlitePool) -> StoreResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS polls (
                id TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                created_at TEXT NOT NULL
            );
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS poll_options (
                id TEXT PRIMARY KEY,
                poll_id TEXT NOT NULL,
                title TEXT NOT NULL,
                position INTEGER NOT NULL,
                FOREIGN KEY (poll_id) REFERENCES polls(id) ON DELETE CASCADE
            );
            "#,
        )
        .execute(pool)
        .await?;

        // One active vote per (session, poll); the primary key is the
        // conflict detector for racing first votes.
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS votes (
                session_id TEXT NOT NULL,
                poll_id TEXT NOT NULL,
                option_id TEXT NOT NULL,
                voted_at TEXT NOT NULL,
                PRIMARY KEY (session_id, poll_id)
            );
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS scores (
                poll_id TEXT NOT NULL,
                option_id TEXT NOT NULL,
                score INTEGER NOT NULL,
                PRIMARY KEY (poll_id, option_id)
            );
            "#,
        )
        .execute(pool)
        .await?;

        Ok(())
    }

    fn vote_from_row(row: &SqliteRow) -> StoreResult<VoteRecord> {
        Ok(VoteRecord {
            voter_id: VoterId::from(row.get::<String, _>("session_id")),
            poll_id: parse_uuid(&row.get::<String, _>("poll_id"), "poll_id")?,
            option_id: parse_uuid(&row.get::<String, _>("option_id"), "option_id")?,
            voted_at: parse_time(&row.get::<String, _>("voted_at"))?,
        })
    }
}

#[async_trait]
impl PollCatalog for Database {
    async fn get_poll_with_options(&self, poll_id: Uuid) -> StoreResult<Option<Poll>> {
        let poll_row = sqlx::query("SELECT id, title FROM polls WHERE id = ?")
            .bind(poll_id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        let Some(poll_row) = poll_row else {
            return Ok(None);
        };

        let options = sqlx::query(
            r#"
            SELECT id, title
            FROM poll_options
            WHERE poll_id = ?
            ORDER BY position
            "#,
        )
        .bind(poll_id.to_string())
        .fetch_all(&self.pool)
        .await?
        .iter()
        .map(|row| {
            Ok(PollOption {
                id: parse_uuid(&row.get::<String, _>("id"), "option id")?,
                title: row.get::<String, _>("title"),
            })
        })
        .collect::<StoreResult<Vec<_>>>()?;

        Ok(Some(Poll {
            id: parse_uuid(&poll_row.get::<String, _>("id"), "poll id")?,
            title: poll_row.get::<String, _>("title"),
            options,
        }))
    }

    async fn create_poll(&self, poll: &Poll) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("INSERT INTO polls (id, title, created_at) VALUES (?, ?, ?)")
            .bind(poll.id.to_string())
            .bind(&poll.title)
            .bind(Utc::now().to_rfc3339())
            .execute(&mut *tx)
            .await?;

        for (i, option) in poll.options.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO poll_options (id, poll_id, title, position)
                VALUES (?, ?, ?, ?)
                "#,
            )
            .bind(option.id.to_string())
            .bind(poll.id.to_string())
            .bind(&option.title)
            .bind(i as i64)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }
}

#[async_trait]
impl VoteLedger for Database {
    async fn find(&self, voter_id: &VoterId, poll_id: Uuid) -> StoreResult<Option<VoteRecord>> {
        let row = sqlx::query(
            r#"
            SELECT session_id, poll_id, option_id, voted_at
            FROM votes
            WHERE session_id = ? AND poll_id = ?
            "#,
        )
        .bind(voter_id.as_str())
        .bind(poll_id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::vote_from_row).transpose()
    }

    async fn create(&self, record: &VoteRecord) -> StoreResult<()> {
        let result = sqlx::query(
            r#"
            INSERT INTO votes (session_id, poll_id, option_id, voted_at)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(record.voter_id.as_str())
        .bind(record.poll_id.to_string())
        .bind(record.option_id.to_string())
        .bind(record.voted_at.to_rfc3339())
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                Err(StoreError::Conflict)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, record: &VoteRecord) -> StoreResult<bool> {
        let result = sqlx::query(
            r#"
            DELETE FROM votes
            WHERE session_id = ? AND poll_id = ? AND option_id = ?
            "#,
        )
        .bind(record.voter_id.as_str())
        .bind(record.poll_id.to_string())
        .bind(record.option_id.to_string())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl ScoreStore for Database {
    async fn increment(&self, poll_id: Uuid, option_id: Uuid, delta: i64) -> StoreResult<i64> {
        let row = sqlx::query(
            r#"
            INSERT INTO scores (poll_id, option_id, score)
            VALUES (?, ?, ?)
            ON CONFLICT(poll_id, option_id)
            DO UPDATE SET score = score + excluded.score
            RETURNING score
            "#,
        )
        .bind(poll_id.to_string())
        .bind(option_id.to_string())
        .bind(delta)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.get::<i64, _>("score"))
    }

    async fn range_read(&self, poll_id: Uuid) -> StoreResult<Vec<ScoreEntry>> {
        let mut entries = sqlx::query(
            r#"
            SELECT option_id, score
            FROM scores
            WHERE poll_id = ?
            "#,
        )
        .bind(poll_id.to_string())
        .fetch_all(&self.pool)
        .await?
        .iter()
        .map(|row| {
            Ok(ScoreEntry {
                option_id: parse_uuid(&row.get::<String, _>("option_id"), "option_id")?,
                score: row.get::<i64, _>("score"),
            })
        })
        .collect::<StoreResult<Vec<_>>>()?;

        sort_entries(&mut entries);
        Ok(entries)
    }
}
