//! crates/stylecal_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of specific external implementations like databases or APIs.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use uuid::Uuid;

use crate::domain::{
    AuthSession, CatalogRefreshReport, Category, Credential, EventUpsert, JobLease, Keyword,
    Product, Rule, RuleWithKeywords, SyncedEvent, TokenGrant, User, UserCredentials,
};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all storage-style port operations.
/// This abstracts away the specific errors from external services (e.g., database, processes).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    /// A uniqueness constraint rejected the write.
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
    #[error("Unauthorized")]
    Unauthorized,
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

/// A failed call to the OAuth/calendar provider.
///
/// `status` is the upstream HTTP status when a response was received, `None`
/// for transport failures (DNS, timeout, refused connection).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("provider request failed{}: {detail}", .status.map(|s| format!(" ({s})")).unwrap_or_default())]
pub struct ProviderError {
    pub status: Option<u16>,
    pub detail: String,
}

impl ProviderError {
    pub fn transport(detail: impl Into<String>) -> Self {
        Self {
            status: None,
            detail: detail.into(),
        }
    }

    pub fn http(status: u16, detail: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            detail: detail.into(),
        }
    }
}

//=========================================================================================
// Persistence Ports (Traits)
//=========================================================================================

#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn create_user_with_email(&self, email: &str, hashed_password: &str) -> PortResult<User>;

    async fn get_user_by_id(&self, user_id: Uuid) -> PortResult<User>;

    async fn get_user_by_email(&self, email: &str) -> PortResult<UserCredentials>;

    async fn create_auth_session(
        &self,
        session_id: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()>;

    async fn validate_auth_session(&self, session_id: &str) -> PortResult<AuthSession>;

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()>;
}

#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Returns `None` when the user never connected this provider.
    async fn get_credential(&self, user_id: Uuid, provider: &str) -> PortResult<Option<Credential>>;

    /// Inserts or overwrites the credential for (user_id, provider).
    async fn save_credential(&self, credential: &Credential) -> PortResult<()>;
}

#[async_trait]
pub trait EventStore: Send + Sync {
    /// Insert-or-update keyed by (user_id, external_event_id).
    async fn upsert_event(&self, event: &EventUpsert) -> PortResult<SyncedEvent>;

    async fn list_events_for_user(&self, user_id: Uuid) -> PortResult<Vec<SyncedEvent>>;
}

#[async_trait]
pub trait RuleStore: Send + Sync {
    /// Every rule with every keyword, enabled or not.
    async fn list_rules(&self) -> PortResult<Vec<RuleWithKeywords>>;

    /// Looks a normalized keyword up across all rules, including disabled ones.
    async fn find_keyword(&self, keyword: &str) -> PortResult<Option<(Keyword, Category)>>;

    /// Returns the rule for `category`, creating it or re-enabling it as needed.
    async fn ensure_rule(&self, category: Category) -> PortResult<Rule>;

    /// Fails with `PortError::Conflict` when the keyword already exists.
    async fn insert_keyword(&self, rule_id: Uuid, keyword: &str) -> PortResult<Keyword>;

    async fn set_keyword_enabled(&self, keyword_id: Uuid, enabled: bool) -> PortResult<Keyword>;
}

#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// All products in the catalog's natural (insertion) order.
    async fn list_products(&self) -> PortResult<Vec<Product>>;
}

#[async_trait]
pub trait LeaseStore: Send + Sync {
    /// Takes the lease if it is free or expired at `now`. Returns false when
    /// another holder owns an unexpired lease.
    async fn try_acquire(&self, lease: &JobLease, now: DateTime<Utc>) -> PortResult<bool>;

    /// Moves the expiry of a lease still owned by `holder`. Returns false when
    /// the lease is gone or belongs to someone else.
    async fn renew(&self, job_key: &str, holder: &str, expires_at: DateTime<Utc>) -> PortResult<bool>;

    /// Releases the lease if it is still owned by `holder`.
    async fn release(&self, job_key: &str, holder: &str) -> PortResult<()>;
}

//=========================================================================================
// Provider Ports (Traits)
//=========================================================================================

#[async_trait]
pub trait OAuthProvider: Send + Sync {
    /// The consent URL a user is redirected to when connecting the calendar.
    /// `state` is echoed back unchanged on the callback.
    fn authorization_url(&self, state: &str, login_hint: Option<&str>) -> String;

    /// Exchanges an authorization code for the first token set.
    async fn exchange_code(&self, code: &str) -> Result<TokenGrant, ProviderError>;

    /// Exchanges a refresh token for a fresh access token.
    async fn refresh(&self, refresh_token: &str) -> Result<TokenGrant, ProviderError>;
}

/// Parameters of one events-list request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventQuery {
    pub time_min: DateTime<Utc>,
    pub time_max: DateTime<Utc>,
    pub search: Option<String>,
    pub max_results: Option<u32>,
    pub page_token: Option<String>,
}

/// One page of raw provider items.
#[derive(Debug, Clone, Default)]
pub struct EventPage {
    pub items: Vec<Value>,
    pub next_page_token: Option<String>,
}

#[async_trait]
pub trait CalendarApi: Send + Sync {
    /// Lists single-occurrence, start-ordered events within the query window.
    async fn list_events(&self, access_token: &str, query: &EventQuery) -> Result<EventPage, ProviderError>;
}

#[async_trait]
pub trait CatalogRefresher: Send + Sync {
    /// Runs the external scrape and import steps for one run id, stopping at
    /// the first failing step.
    async fn refresh(&self, run_id: &str) -> PortResult<CatalogRefreshReport>;
}
