//! crates/stylecal_core/src/error.rs
//!
//! Failure kinds surfaced by the calendar pipeline, rule administration and
//! background jobs. Each variant maps to one action the caller can take.

use crate::domain::Category;
use crate::ports::{PortError, ProviderError};

/// Failures of the credential → fetch → classify → store pipeline.
#[derive(Debug, thiserror::Error)]
pub enum CalendarError {
    /// No usable credential; the user has to start the OAuth grant.
    #[error("calendar is not connected")]
    NotConnected,

    /// The refresh-token exchange failed; only a new consent fixes this.
    #[error("token refresh failed, reconnect the calendar: {0}")]
    RefreshFailed(ProviderError),

    /// The authorization-code exchange failed while connecting.
    #[error("authorization code exchange failed: {0}")]
    GrantFailed(ProviderError),

    /// The provider rejected the events call after a valid token was obtained.
    #[error("failed to fetch calendar events: {0}")]
    UpstreamFetch(ProviderError),

    /// A persistence read or write failed; nothing may be assumed synced.
    #[error("storage failure: {0}")]
    Write(#[from] PortError),
}

/// Failures of keyword administration.
#[derive(Debug, thiserror::Error)]
pub enum RuleAdminError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("keyword \"{keyword}\" already exists under category \"{category}\"")]
    DuplicateKeyword { keyword: String, category: Category },

    #[error("keyword {0} not found")]
    NotFound(String),

    #[error("storage failure: {0}")]
    Store(PortError),
}

impl From<PortError> for RuleAdminError {
    fn from(err: PortError) -> Self {
        match err {
            PortError::NotFound(what) => RuleAdminError::NotFound(what),
            other => RuleAdminError::Store(other),
        }
    }
}

/// Failures of lease-guarded jobs.
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error("job '{0}' is already running")]
    AlreadyRunning(String),

    #[error("job failed: {0}")]
    Failed(String),

    /// Another holder took the lease while the job was running.
    #[error("lease for job '{0}' was lost while running")]
    LeaseLost(String),

    #[error("lease storage failure: {0}")]
    Store(#[from] PortError),
}
