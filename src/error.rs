//! Request-level error taxonomy and its mapping to HTTP responses.
//!
//! Handlers return [`AppResult`] and propagate with `?`; the status code and
//! `{"error": ...}` body are decided exactly once, in [`IntoResponse`].

use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::store::StoreError;

/// Application error type
#[derive(Error, Debug)]
pub enum AppError {
    /// Missing or malformed input (400).
    #[error("{0}")]
    Validation(String),

    /// Credentials did not match any user (401).
    #[error("{0}")]
    Authentication(String),

    /// No row matched the requested id, or no route matched (404).
    #[error("{0}")]
    NotFound(String),

    /// Known path, unsupported method (405).
    #[error("Method not allowed")]
    MethodNotAllowed,

    /// Anything the store reported that the request cannot recover from (500).
    ///
    /// The raw store message is exposed in the response body.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl AppError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// The error returned for any request that does not match a route.
    pub fn unknown_endpoint() -> Self {
        Self::NotFound("Endpoint not found".to_string())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Authentication(_) => StatusCode::UNAUTHORIZED,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            AppError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::Validation(format!("Invalid JSON body: {}", rejection.body_text()))
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::Validation(format!("Invalid query string: {}", rejection.body_text()))
    }
}

/// A path segment that fails to decode means the route did not match.
impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        tracing::debug!("Path rejected: {}", rejection.body_text());
        AppError::unknown_endpoint()
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        match &self {
            AppError::Store(e) => tracing::error!("Store error: {:?}", e),
            AppError::Authentication(_) => tracing::warn!("Authentication failed"),
            other => tracing::debug!("Request rejected ({}): {}", status, other),
        }

        let body = Json(json!({
            "error": self.to_string(),
        }));

        (status, body).into_response()
    }
}

/// Result type alias for handler results
pub type AppResult<T> = std::result::Result<T, AppError>;
