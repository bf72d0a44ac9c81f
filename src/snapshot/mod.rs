use std::collections::HashMap;
use std::sync::Arc;

use uuid::Uuid;

use crate::error::{TallyError, TallyResult};
use crate::models::{OptionScore, PollResults, PollSnapshot};
use crate::store::{PollCatalog, ScoreStore};

/// Builds the full result set for a poll: catalog options in their stored
/// order, each paired with its current score.
pub struct SnapshotReader {
    catalog: Arc<dyn PollCatalog>,
    scores: Arc<dyn ScoreStore>,
}

impl SnapshotReader {
    pub fn new(catalog: Arc<dyn PollCatalog>, scores: Arc<dyn ScoreStore>) -> Self {
        Self { catalog, scores }
    }

    pub async fn read_snapshot(&self, poll_id: Uuid) -> TallyResult<PollSnapshot> {
        let poll = self
            .catalog
            .get_poll_with_options(poll_id)
            .await?
            .ok_or(TallyError::PollNotFound)?;

        let votes: HashMap<Uuid, i64> = self
            .scores
            .range_read(poll_id)
            .await?
            .into_iter()
            .map(|entry| (entry.option_id, entry.score))
            .collect();

        // Options nobody has voted for are not in the score table.
        let options = poll
            .options
            .into_iter()
            .map(|option| OptionScore {
                score: votes.get(&option.id).copied().unwrap_or(0),
                id: option.id,
                title: option.title,
            })
            .collect();

        Ok(PollSnapshot {
            poll: PollResults {
                id: poll.id,
                title: poll.title,
                options,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Poll;
    use crate::store::memory::{MemoryCatalog, MemoryScoreStore};

    #[tokio::test]
    async fn unvoted_options_report_zero() {
        let catalog = Arc::new(MemoryCatalog::new());
        let scores = Arc::new(MemoryScoreStore::new());
        let poll = Poll::new("Lunch?".into(), vec!["pizza".into(), "tacos".into(), "soup".into()]);
        catalog.create_poll(&poll).await.unwrap();
        scores.increment(poll.id, poll.options[1].id, 2).await.unwrap();

        let reader = SnapshotReader::new(catalog, scores);
        let snapshot = reader.read_snapshot(poll.id).await.unwrap();

        let got: Vec<(&str, i64)> = snapshot
            .poll
            .options
            .iter()
            .map(|o| (o.title.as_str(), o.score))
            .collect();
        assert_eq!(got, vec![("pizza", 0), ("tacos", 2), ("soup", 0)]);
        assert_eq!(snapshot.poll.id, poll.id);
        assert_eq!(snapshot.poll.title, "Lunch?");
    }

    #[tokio::test]
    async fn missing_poll_is_reported() {
        let reader = SnapshotReader::new(
            Arc::new(MemoryCatalog::new()),
            Arc::new(MemoryScoreStore::new()),
        );

        let result = reader.read_snapshot(Uuid::new_v4()).await;
        assert!(matches!(result, Err(TallyError::PollNotFound)));
    }

    #[tokio::test]
    async fn serializes_to_query_shape() {
        let catalog = Arc::new(MemoryCatalog::new());
        let poll = Poll::new("Q".into(), vec!["A".into()]);
        catalog.create_poll(&poll).await.unwrap();

        let reader = SnapshotReader::new(catalog, Arc::new(MemoryScoreStore::new()));
        let snapshot = reader.read_snapshot(poll.id).await.unwrap();

        assert_eq!(
            serde_json::to_value(&snapshot).unwrap(),
            serde_json::json!({
                "poll": {
                    "id": poll.id.to_string(),
                    "title": "Q",
                    "options": [
                        { "id": poll.options[0].id.to_string(), "title": "A", "score": 0 }
                    ]
                }
            })
        );
    }
}
