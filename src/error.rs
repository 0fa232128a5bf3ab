use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::engine::BidError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Internal server error: {0}")]
    Internal(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Bad request: {0}")]
    BadRequest(String),
    #[error(transparent)]
    Bid(#[from] BidError),
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, error_message) = match self {
            AppError::Config(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "CONFIG", msg),
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL", msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg),
            AppError::Bid(err) => (bid_error_status(&err), err.code(), err.to_string()),
        };

        let body = Json(json!({
            "error": error_message,
            "code": code,
        }));

        (status, body).into_response()
    }
}

fn bid_error_status(err: &BidError) -> StatusCode {
    match err {
        BidError::AuctionNotFound => StatusCode::NOT_FOUND,
        BidError::AuctionClosed => StatusCode::CONFLICT,
        BidError::SelfDealing => StatusCode::FORBIDDEN,
        BidError::InvalidAmount => StatusCode::BAD_REQUEST,
        BidError::InvalidDeadline => StatusCode::BAD_REQUEST,
        BidError::BidTooLow { .. } => StatusCode::CONFLICT,
        BidError::AlreadyLeading => StatusCode::CONFLICT,
        BidError::Busy => StatusCode::SERVICE_UNAVAILABLE,
        BidError::StoreUnavailable(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}
