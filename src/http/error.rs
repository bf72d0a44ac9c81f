use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use log::error;
use thiserror::Error;

use crate::error::TallyError;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Malformed payload")]
    Malformed,

    #[error(transparent)]
    Tally(#[from] TallyError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::Malformed => StatusCode::BAD_REQUEST,
            ApiError::Tally(TallyError::PollNotFound)
            | ApiError::Tally(TallyError::OptionNotFound)
            | ApiError::Tally(TallyError::DuplicateVote) => StatusCode::BAD_REQUEST,
            ApiError::Tally(TallyError::Storage(e)) => {
                error!("Request failed on storage: {}", e);
                return (StatusCode::INTERNAL_SERVER_ERROR, "Internal error").into_response();
            }
        };

        (status, self.to_string()).into_response()
    }
}
