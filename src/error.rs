use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use tracing::error;

use crate::indicators::IndicatorError;
use crate::market_data::{FetchError, NotEnoughPoints};
use crate::period::UnknownPeriod;
use crate::store::StoreError;

/// Unified error type for API responses.
///
/// Every component error lands in exactly one of three buckets: bad input
/// (400), nothing to serve (404), or an upstream/storage failure (500).
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Upstream(String),
    #[error("{0}")]
    Storage(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Upstream(_) | Self::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self, "request failed");
        }
        let body = json!({ "error": self.to_string() });
        (status, axum::Json(body)).into_response()
    }
}

impl From<UnknownPeriod> for ApiError {
    fn from(e: UnknownPeriod) -> Self {
        Self::BadRequest(e.to_string())
    }
}

impl From<FetchError> for ApiError {
    fn from(e: FetchError) -> Self {
        match e {
            FetchError::Empty => Self::NotFound("No data found from provider".to_string()),
            other => Self::Upstream(other.to_string()),
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        Self::Storage(format!("Failed to store data in database: {e}"))
    }
}

impl From<IndicatorError> for ApiError {
    fn from(e: IndicatorError) -> Self {
        Self::BadRequest(e.to_string())
    }
}

impl From<NotEnoughPoints> for ApiError {
    fn from(e: NotEnoughPoints) -> Self {
        Self::BadRequest(e.to_string())
    }
}

impl From<tokio::task::JoinError> for ApiError {
    fn from(e: tokio::task::JoinError) -> Self {
        Self::Storage(format!("database task failed: {e}"))
    }
}
