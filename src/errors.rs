use axum::{
    Json,
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::validation::ValidationError;

/// Failures surfaced by the contact store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Contact {0} not found")]
    NotFound(i64),

    #[error("Contact with email {0} already exists")]
    DuplicateEmail(String),

    #[error("Contact store unavailable: {0}")]
    Unavailable(#[source] sqlx::Error),

    #[error("Database error: {0}")]
    Database(#[source] sqlx::Error),
}

impl StoreError {
    /// Classify a backend error. Unique violations are left to the caller,
    /// which knows the email involved.
    pub fn from_sqlx(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed => StoreError::Unavailable(err),
            other => StoreError::Database(other),
        }
    }

    pub fn from_write(err: sqlx::Error, email: &str) -> Self {
        match &err {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                StoreError::DuplicateEmail(email.to_string())
            }
            _ => StoreError::from_sqlx(err),
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Error returned from HTTP handlers.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("{0}")]
    InvalidBody(String),
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::InvalidBody(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::InvalidBody(rejection.body_text())
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    detail: String,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Store(StoreError::NotFound(_)) => StatusCode::NOT_FOUND,
            ApiError::Store(StoreError::DuplicateEmail(_)) => StatusCode::BAD_REQUEST,
            ApiError::Store(StoreError::Unavailable(_)) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Store(StoreError::Database(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Validation(_) | ApiError::InvalidBody(_) => StatusCode::UNPROCESSABLE_ENTITY,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("Request failed: {:?}", self);
        }

        let detail = match &self {
            // Backend details stay in the log
            ApiError::Store(StoreError::Database(_)) => "Internal server error".to_string(),
            other => other.to_string(),
        };

        (status, Json(ErrorBody { detail })).into_response()
    }
}
