use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

/// Failures reported by the entity store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,

    /// A uniqueness or exclusion rule rejected the write.
    #[error("constraint violated: {0}")]
    Conflict(String),

    /// The row changed after the caller read it.
    #[error("record changed since it was read")]
    Stale,

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => StoreError::NotFound,
            sqlx::Error::Database(db) => match db.code().as_deref() {
                // unique_violation, exclusion_violation
                Some("23505") | Some("23P01") => StoreError::Conflict(db.message().to_string()),
                _ => StoreError::Unavailable(err.to_string()),
            },
            _ => StoreError::Unavailable(err.to_string()),
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Outcome kinds of a rejected operation. Each carries one readable reason.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    InvalidInput(String),

    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    RateLimited(String),

    #[error("{context}: {source}")]
    Unavailable {
        context: String,
        #[source]
        source: StoreError,
    },
}

pub type ServiceResult<T> = Result<T, ServiceError>;

impl ServiceError {
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }
    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }
    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Wraps a store failure with the operation that failed, keeping its kind.
    pub fn store(context: &'static str) -> impl FnOnce(StoreError) -> ServiceError {
        move |err| match err {
            StoreError::NotFound => ServiceError::NotFound(format!("{context}: record not found")),
            StoreError::Conflict(msg) => ServiceError::Conflict(format!("{context}: {msg}")),
            StoreError::Stale => {
                ServiceError::Conflict(format!("{context}: record changed since it was read"))
            }
            source @ StoreError::Unavailable(_) => {
                error!(error = %source, context, "store failure");
                ServiceError::Unavailable {
                    context: context.to_string(),
                    source,
                }
            }
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ServiceError::NotFound(_) => "NOT_FOUND",
            ServiceError::Forbidden(_) => "FORBIDDEN",
            ServiceError::Conflict(_) => "CONFLICT",
            ServiceError::InvalidInput(_) => "INVALID_INPUT",
            ServiceError::Unauthorized(_) => "UNAUTHORIZED",
            ServiceError::RateLimited(_) => "RATE_LIMITED",
            ServiceError::Unavailable { .. } => "UNAVAILABLE",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
            ServiceError::Forbidden(_) => StatusCode::FORBIDDEN,
            ServiceError::Conflict(_) => StatusCode::CONFLICT,
            ServiceError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            ServiceError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ServiceError::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
            ServiceError::Unavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    code: &'static str,
    message: String,
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status();
        // Store details stay in the logs.
        let message = match &self {
            ServiceError::Unavailable { context, .. } => context.clone(),
            other => other.to_string(),
        };
        let body = ErrorBody {
            code: self.code(),
            message,
        };
        (status, Json(body)).into_response()
    }
}
