use crate::{
    db::errors::DbError,
    types::{Operation, Permission},
};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde_json::json;
use tracing::{error, warn};
use uuid::Uuid;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned by API handlers.
///
/// Each variant renders as `{"error": <code>, "message": <text>}`; storage details are logged,
/// never sent to the client.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Authentication required: {reason}")]
    AuthFailed { reason: String },

    #[error("Forbidden: {reason}")]
    Forbidden { reason: String },

    #[error("Insufficient permissions to {action} {resource}")]
    InsufficientPermissions {
        required: Permission,
        action: Operation,
        resource: String,
    },

    #[error("{resource} with ID {id} not found")]
    NotFound { resource: String, id: String },

    #[error("Payment method {method} is not available")]
    InvalidMethod { method: String },

    #[error("Insufficient credits. Required: {required}, available: {available}")]
    InsufficientFunds { required: i64, available: i64 },

    #[error("Missing required fields: {}", fields.join(", "))]
    MissingFields { fields: Vec<&'static str> },

    #[error("Code generation failed: {message}")]
    ProviderError { message: String },

    #[error("{message}")]
    BadRequest { message: String },

    #[error("{message}")]
    Conflict { message: String },

    #[error("Credits could not be awarded for payment {payment_id}")]
    AwardFailed { payment_id: Uuid },

    #[error("Internal error during {operation}")]
    Internal { operation: String },

    #[error(transparent)]
    Database(DbError),
}

impl From<DbError> for Error {
    fn from(e: DbError) -> Self {
        match e {
            DbError::InsufficientFunds { requested, available } => Error::InsufficientFunds {
                required: requested,
                available,
            },
            other => Error::Database(other),
        }
    }
}

impl Error {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::AuthFailed { .. } => StatusCode::UNAUTHORIZED,
            Error::Forbidden { .. } | Error::InsufficientPermissions { .. } => StatusCode::FORBIDDEN,
            Error::NotFound { .. } => StatusCode::NOT_FOUND,
            Error::InvalidMethod { .. }
            | Error::InsufficientFunds { .. }
            | Error::MissingFields { .. }
            | Error::ProviderError { .. }
            | Error::BadRequest { .. } => StatusCode::BAD_REQUEST,
            Error::Conflict { .. } => StatusCode::CONFLICT,
            Error::AwardFailed { .. } | Error::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            Error::Database(db) => match db {
                DbError::NotFound => StatusCode::NOT_FOUND,
                DbError::InsufficientFunds { .. } => StatusCode::BAD_REQUEST,
                DbError::UniqueViolation { .. } => StatusCode::CONFLICT,
                DbError::CheckViolation { .. } | DbError::ForeignKeyViolation { .. } => StatusCode::BAD_REQUEST,
                DbError::InvalidData(_) | DbError::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    /// Stable machine-readable code for the response body
    pub fn code(&self) -> &'static str {
        match self {
            Error::AuthFailed { .. } => "auth_failed",
            Error::Forbidden { .. } | Error::InsufficientPermissions { .. } => "forbidden",
            Error::NotFound { .. } => "not_found",
            Error::InvalidMethod { .. } => "invalid_method",
            Error::InsufficientFunds { .. } => "insufficient_funds",
            Error::MissingFields { .. } => "missing_fields",
            Error::ProviderError { .. } => "provider_error",
            Error::BadRequest { .. } => "bad_request",
            Error::Conflict { .. } => "conflict",
            Error::AwardFailed { .. } => "award_failed",
            Error::Internal { .. } => "internal_error",
            Error::Database(db) => match db {
                DbError::NotFound => "not_found",
                DbError::InsufficientFunds { .. } => "insufficient_funds",
                DbError::UniqueViolation { .. } => "conflict",
                DbError::CheckViolation { .. } | DbError::ForeignKeyViolation { .. } => "bad_request",
                DbError::InvalidData(_) | DbError::Other(_) => "storage_error",
            },
        }
    }

    /// Message safe to show to the client
    pub fn user_message(&self) -> String {
        match self {
            Error::AuthFailed { .. } => "Authentication required".to_string(),
            Error::ProviderError { .. } => "Code generation failed, no credits were charged. Please try again.".to_string(),
            Error::Internal { .. } => "Internal server error".to_string(),
            Error::Database(db) => match db {
                DbError::NotFound => "Resource not found".to_string(),
                DbError::InsufficientFunds { requested, available } => {
                    format!("Insufficient credits. Required: {requested}, available: {available}")
                }
                DbError::UniqueViolation { .. } => "Resource already exists".to_string(),
                DbError::CheckViolation { .. } | DbError::ForeignKeyViolation { .. } => "Request violates a data constraint".to_string(),
                DbError::InvalidData(_) | DbError::Other(_) => "Internal server error".to_string(),
            },
            other => other.to_string(),
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!("Request failed: {:#}", self);
        } else if let Error::ProviderError { message } = &self {
            warn!("Completion provider failure: {}", message);
        }

        let body = json!({
            "error": self.code(),
            "message": self.user_message(),
        });
        (status, Json(body)).into_response()
    }
}
