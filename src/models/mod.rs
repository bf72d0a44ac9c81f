use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Poll {
    pub id: Uuid,
    pub title: String,
    pub options: Vec<PollOption>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PollOption {
    pub id: Uuid,
    pub title: String,
}

impl Poll {
    pub fn new(title: String, options: Vec<String>) -> Self {
        let options = options
            .into_iter()
            .map(|title| PollOption {
                id: Uuid::new_v4(),
                title,
            })
            .collect();

        Self {
            id: Uuid::new_v4(),
            title,
            options,
        }
    }

    pub fn has_option(&self, option_id: Uuid) -> bool {
        self.options.iter().any(|option| option.id == option_id)
    }
}

/// Opaque anonymous voter token. Issued once per browser and echoed back on
/// every later vote; nothing in the engine looks inside it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VoterId(String);

impl VoterId {
    pub fn mint() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short prefix that is safe to put in logs.
    pub fn redacted(&self) -> &str {
        let end = self
            .0
            .char_indices()
            .nth(8)
            .map(|(idx, _)| idx)
            .unwrap_or(self.0.len());
        &self.0[..end]
    }
}

impl From<String> for VoterId {
    fn from(token: String) -> Self {
        Self(token)
    }
}

impl fmt::Display for VoterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A voter's current choice within one poll. At most one exists per
/// (voter, poll) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteRecord {
    pub voter_id: VoterId,
    pub poll_id: Uuid,
    pub option_id: Uuid,
    pub voted_at: DateTime<Utc>,
}

impl VoteRecord {
    pub fn new(voter_id: VoterId, poll_id: Uuid, option_id: Uuid) -> Self {
        Self {
            voter_id,
            poll_id,
            option_id,
            voted_at: Utc::now(),
        }
    }
}

/// One row of a score range read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreEntry {
    pub option_id: Uuid,
    pub score: i64,
}

/// Emitted once per score adjustment; never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TallyEvent {
    #[serde(skip)]
    pub poll_id: Uuid,
    #[serde(rename = "pollOptionId")]
    pub option_id: Uuid,
    pub votes: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollSnapshot {
    pub poll: PollResults,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollResults {
    pub id: Uuid,
    pub title: String,
    pub options: Vec<OptionScore>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionScore {
    pub id: Uuid,
    pub title: String,
    pub score: i64,
}
