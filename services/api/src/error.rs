//! services/api/src/error.rs
//!
//! Defines the primary error type for the entire API service, and the
//! translation of domain failures into HTTP responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use stylecal_core::{CalendarError, JobError, RuleAdminError};
use tracing::error;
use utoipa::ToSchema;

use crate::config::ConfigError;

/// The primary error type for the `api` service.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Represents an error that occurred during configuration loading.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Represents an error from the underlying database library.
    #[error("Database Error: {0}")]
    Database(#[from] sqlx::Error),

    /// Represents a failed schema migration at startup.
    #[error("Migration Error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Represents a standard Input/Output error (e.g., binding to a network socket).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A catch-all for any other unexpected errors.
    #[error("An unexpected internal error occurred: {0}")]
    Internal(String),
}

//=========================================================================================
// HTTP Error Responses
//=========================================================================================

/// The JSON body of every error response.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    /// Stable machine-readable failure kind, e.g. `reconnect_required`.
    pub code: &'static str,
    pub message: String,
    /// Owning category of a duplicate keyword.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// Status returned by the calendar provider, when one was received.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upstream_status: Option<u16>,
}

/// An error a handler returns; rendered as `status` + [`ErrorBody`].
#[derive(Debug)]
pub struct HttpError {
    pub status: StatusCode,
    pub body: ErrorBody,
}

impl HttpError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            body: ErrorBody {
                code,
                message: message.into(),
                category: None,
                upstream_status: None,
            },
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "validation_failed", message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "unauthorized", message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "internal_error", message)
    }

    fn with_category(mut self, category: String) -> Self {
        self.body.category = Some(category);
        self
    }

    fn with_upstream_status(mut self, status: Option<u16>) -> Self {
        self.body.upstream_status = status;
        self
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

impl From<CalendarError> for HttpError {
    fn from(err: CalendarError) -> Self {
        match err {
            CalendarError::NotConnected => Self::new(StatusCode::CONFLICT, "not_connected", err.to_string()),
            CalendarError::RefreshFailed(ref e) => {
                Self::new(StatusCode::UNAUTHORIZED, "reconnect_required", err.to_string())
                    .with_upstream_status(e.status)
            }
            CalendarError::GrantFailed(ref e) => {
                Self::new(StatusCode::BAD_GATEWAY, "grant_failed", err.to_string())
                    .with_upstream_status(e.status)
            }
            CalendarError::UpstreamFetch(ref e) => {
                Self::new(StatusCode::BAD_GATEWAY, "upstream_fetch_failed", err.to_string())
                    .with_upstream_status(e.status)
            }
            CalendarError::Write(ref e) => {
                error!("Calendar storage failure: {}", e);
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, "write_failed", err.to_string())
            }
        }
    }
}

impl From<RuleAdminError> for HttpError {
    fn from(err: RuleAdminError) -> Self {
        match err {
            RuleAdminError::Validation(message) => Self::bad_request(message),
            RuleAdminError::DuplicateKeyword { ref category, .. } => {
                let category = category.to_string();
                Self::new(StatusCode::CONFLICT, "duplicate_keyword", err.to_string()).with_category(category)
            }
            RuleAdminError::NotFound(_) => Self::new(StatusCode::NOT_FOUND, "not_found", err.to_string()),
            RuleAdminError::Store(ref e) => {
                error!("Rule storage failure: {}", e);
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, "write_failed", err.to_string())
            }
        }
    }
}

impl From<JobError> for HttpError {
    fn from(err: JobError) -> Self {
        match err {
            JobError::AlreadyRunning(_) => Self::new(StatusCode::CONFLICT, "already_running", err.to_string()),
            JobError::Failed(_) | JobError::LeaseLost(_) => {
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, "job_failed", err.to_string())
            }
            JobError::Store(ref e) => {
                error!("Lease storage failure: {}", e);
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, "write_failed", err.to_string())
            }
        }
    }
}
