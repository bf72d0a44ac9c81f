use thiserror::Error;

/// Failures reported by the catalog, ledger and score collaborators.
#[derive(Error, Debug)]
pub enum StoreError {
    /// A concurrent writer claimed the same ledger key first.
    #[error("Conflicting write on an existing vote record")]
    Conflict,

    #[error("Storage backend error: {0}")]
    Backend(String),

    #[error("Database error: {0}")]
    Sqlx(#[from] sqlx::Error),
}

#[derive(Error, Debug)]
pub enum TallyError {
    #[error("Poll not found")]
    PollNotFound,

    #[error("Poll option not found")]
    OptionNotFound,

    #[error("User had already voted with this option!")]
    DuplicateVote,

    #[error(transparent)]
    Storage(#[from] StoreError),
}

pub type StoreResult<T> = Result<T, StoreError>;
pub type TallyResult<T> = Result<T, TallyError>;
