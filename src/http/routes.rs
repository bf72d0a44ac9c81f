use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
    http::{HeaderMap, StatusCode, header::SET_COOKIE},
    response::{IntoResponse, Response},
};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::AppState;
use super::error::ApiError;
use super::session::{session_cookie, voter_from_headers};
use crate::models::{Poll, PollSnapshot};

#[derive(Debug, Deserialize)]
pub struct CreatePollRequest {
    pub title: String,
    pub options: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePollResponse {
    pub poll_id: Uuid,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteRequest {
    pub poll_option_id: String,
}

pub(super) fn parse_id(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| ApiError::Malformed)
}

pub async fn create_poll(
    State(state): State<Arc<AppState>>,
    body: Result<Json<CreatePollRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(request) = body.map_err(|_| ApiError::Malformed)?;
    if request.title.trim().is_empty() {
        return Err(ApiError::Malformed);
    }

    let poll = Poll::new(request.title, request.options);
    state
        .catalog
        .create_poll(&poll)
        .await
        .map_err(crate::error::TallyError::from)?;
    info!("Created poll {} with {} option(s)", poll.id, poll.options.len());

    Ok((
        StatusCode::CREATED,
        Json(CreatePollResponse { poll_id: poll.id }),
    )
        .into_response())
}

pub async fn get_poll(
    State(state): State<Arc<AppState>>,
    Path(poll_id): Path<String>,
) -> Result<Json<PollSnapshot>, ApiError> {
    let poll_id = parse_id(&poll_id)?;
    let snapshot = state.snapshots.read_snapshot(poll_id).await?;
    Ok(Json(snapshot))
}

pub async fn vote_on_poll(
    State(state): State<Arc<AppState>>,
    Path(poll_id): Path<String>,
    headers: HeaderMap,
    body: Result<Json<VoteRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let poll_id = parse_id(&poll_id)?;
    let Json(request) = body.map_err(|_| ApiError::Malformed)?;
    let option_id = parse_id(&request.poll_option_id)?;

    let outcome = state
        .engine
        .submit_vote(poll_id, voter_from_headers(&headers), option_id)
        .await?;

    if !outcome.new_voter {
        return Ok(StatusCode::CREATED.into_response());
    }

    match session_cookie(&outcome.voter_id) {
        Some(cookie) => Ok((StatusCode::CREATED, [(SET_COOKIE, cookie)]).into_response()),
        None => {
            warn!("Could not encode session cookie for poll {}", poll_id);
            Ok(StatusCode::CREATED.into_response())
        }
    }
}
