//! HTTP surface: poll snapshot query, vote command, live results socket and
//! a minimal poll catalog endpoint.

mod error;
mod live;
mod routes;
mod session;

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};

use crate::bus::FanoutBus;
use crate::snapshot::SnapshotReader;
use crate::store::{PollCatalog, ScoreStore, VoteLedger};
use crate::tally::TallyEngine;

pub use error::ApiError;
pub use session::{SESSION_COOKIE, SESSION_MAX_AGE_SECS};

/// Shared handles injected into every handler.
pub struct AppState {
    pub catalog: Arc<dyn PollCatalog>,
    pub engine: TallyEngine,
    pub snapshots: SnapshotReader,
    pub bus: Arc<FanoutBus>,
}

impl AppState {
    pub fn new(
        catalog: Arc<dyn PollCatalog>,
        ledger: Arc<dyn VoteLedger>,
        scores: Arc<dyn ScoreStore>,
        bus: Arc<FanoutBus>,
    ) -> Self {
        Self {
            engine: TallyEngine::new(
                Arc::clone(&catalog),
                ledger,
                Arc::clone(&scores),
                Arc::clone(&bus),
            ),
            snapshots: SnapshotReader::new(Arc::clone(&catalog), scores),
            catalog,
            bus,
        }
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/polls", post(routes::create_poll))
        .route("/polls/{poll_id}", get(routes::get_poll))
        .route("/polls/{poll_id}/votes", post(routes::vote_on_poll))
        .route("/polls/{poll_id}/results", get(live::poll_results))
        .with_state(state)
}
