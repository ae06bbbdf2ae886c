//! crates/stylecal_core/src/domain.rs
//!
//! Defines the core data structures for the application.
//! Apart from the provider wire shape, these structs are independent of any
//! database or serialization format.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Provider name under which calendar credentials are stored.
pub const GOOGLE_CALENDAR_PROVIDER: &str = "google-calendar";

//=========================================================================================
// Occasion Categories
//=========================================================================================

/// The closed set of occasion categories an event can be classified into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Formal,
    Casual,
    Streetwear,
}

impl Category {
    pub const ALL: [Category; 3] = [Category::Formal, Category::Casual, Category::Streetwear];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Formal => "formal",
            Category::Casual => "casual",
            Category::Streetwear => "streetwear",
        }
    }

    /// Priority given to a rule created on demand for this category.
    pub fn default_priority(&self) -> i32 {
        match self {
            Category::Formal => 3,
            Category::Casual => 2,
            Category::Streetwear => 1,
        }
    }

    /// Human-readable rule name, e.g. "Formal Events".
    pub fn rule_name(&self) -> &'static str {
        match self {
            Category::Formal => "Formal Events",
            Category::Casual => "Casual Events",
            Category::Streetwear => "Streetwear Events",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown category '{0}' (expected one of formal, casual, streetwear)")]
pub struct UnknownCategory(pub String);

impl FromStr for Category {
    type Err = UnknownCategory;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "formal" => Ok(Category::Formal),
            "casual" => Ok(Category::Casual),
            "streetwear" => Ok(Category::Streetwear),
            other => Err(UnknownCategory(other.to_string())),
        }
    }
}

//=========================================================================================
// Users and Login Sessions
//=========================================================================================

// Represents a user - the identity anchor for credentials and events.
#[derive(Debug, Clone)]
pub struct User {
    pub user_id: Uuid,
    pub email: Option<String>,
}

// Only used internally for login/signup - contains sensitive data
#[derive(Debug, Clone)]
pub struct UserCredentials {
    pub user_id: Uuid,
    pub email: String,
    pub hashed_password: String,
}

// Represents a browser login session (auth cookie)
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub id: String,
    pub user_id: Uuid,
    pub expires_at: DateTime<Utc>,
}

//=========================================================================================
// OAuth Credentials
//=========================================================================================

/// Stored OAuth token material for one (user, provider) pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    pub user_id: Uuid,
    pub provider: String,
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: Option<i64>,
    pub scope: Option<String>,
    pub token_type: Option<String>,
}

/// A successful response from the provider's token endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TokenGrant {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub token_type: Option<String>,
}

impl Credential {
    /// Builds the credential stored after the first authorization-code grant.
    pub fn from_grant(user_id: Uuid, provider: &str, grant: TokenGrant, now: DateTime<Utc>) -> Self {
        Self {
            user_id,
            provider: provider.to_string(),
            expires_at: grant.expires_in.map(|secs| now.timestamp() + secs),
            access_token: grant.access_token,
            refresh_token: grant.refresh_token,
            scope: grant.scope,
            token_type: grant.token_type,
        }
    }

    /// Folds a refresh response into this credential.
    ///
    /// Fields the provider omitted (a non-rotated refresh token, scope, token
    /// type, expiry) keep their stored values.
    pub fn refreshed_with(&self, grant: TokenGrant, now: DateTime<Utc>) -> Self {
        Self {
            user_id: self.user_id,
            provider: self.provider.clone(),
            access_token: grant.access_token,
            refresh_token: grant.refresh_token.or_else(|| self.refresh_token.clone()),
            expires_at: grant
                .expires_in
                .map(|secs| now.timestamp() + secs)
                .or(self.expires_at),
            scope: grant.scope.or_else(|| self.scope.clone()),
            token_type: grant.token_type.or_else(|| self.token_type.clone()),
        }
    }
}

//=========================================================================================
// Calendar Events
//=========================================================================================

/// Start or end of an event as the provider sends it.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProviderEventTime {
    #[serde(default, rename = "dateTime")]
    pub date_time: Option<String>,
    #[serde(default)]
    pub date: Option<String>,
}

impl ProviderEventTime {
    /// Resolves to an instant, preferring the precise timestamp over the all-day
    /// date. The boolean is true when the all-day date was used.
    pub fn resolve(&self) -> Option<(DateTime<Utc>, bool)> {
        if let Some(ts) = self
            .date_time
            .as_deref()
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        {
            return Some((ts.with_timezone(&Utc), false));
        }
        self.date
            .as_deref()
            .and_then(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok())
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|naive| (naive.and_utc(), true))
    }
}

/// One item of the provider's event list, as sent on the wire.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderEvent {
    pub id: String,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub start: Option<ProviderEventTime>,
    #[serde(default)]
    pub end: Option<ProviderEventTime>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

/// Title used when the provider sends an event without one.
pub const UNTITLED_EVENT: &str = "Untitled event";

/// A normalized upstream event. Produced fresh on every fetch, never stored as-is.
#[derive(Debug, Clone, PartialEq)]
pub struct ExternalEvent {
    pub external_id: String,
    pub title: String,
    pub description: String,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub all_day: bool,
    pub location: Option<String>,
    pub cancelled: bool,
    pub raw_payload: Value,
}

impl ExternalEvent {
    /// Normalizes a provider item, keeping the untouched payload alongside.
    pub fn from_provider(event: ProviderEvent, raw_payload: Value) -> Self {
        let start = event.start.as_ref().and_then(ProviderEventTime::resolve);
        let end = event.end.as_ref().and_then(ProviderEventTime::resolve);
        Self {
            external_id: event.id,
            title: event
                .summary
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| UNTITLED_EVENT.to_string()),
            description: event.description.unwrap_or_default(),
            start_time: start.map(|(ts, _)| ts),
            end_time: end.map(|(ts, _)| ts),
            all_day: start.is_some_and(|(_, all_day)| all_day),
            location: event.location.filter(|l| !l.trim().is_empty()),
            cancelled: event.status.as_deref() == Some("cancelled"),
            raw_payload,
        }
    }
}

/// A persisted event, unique on (user_id, external_event_id).
#[derive(Debug, Clone, PartialEq)]
pub struct SyncedEvent {
    pub id: Uuid,
    pub user_id: Uuid,
    pub external_event_id: String,
    pub title: String,
    pub description: String,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub location: Option<String>,
    pub occasion_label: Option<Category>,
    pub raw_payload: Value,
    pub updated_at: DateTime<Utc>,
}

/// The mutable fields written by one upsert.
#[derive(Debug, Clone, PartialEq)]
pub struct EventUpsert {
    pub user_id: Uuid,
    pub external_event_id: String,
    pub title: String,
    pub description: String,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub location: Option<String>,
    pub occasion_label: Option<Category>,
    pub raw_payload: Value,
}

impl EventUpsert {
    pub fn new(user_id: Uuid, event: &ExternalEvent, occasion_label: Option<Category>) -> Self {
        Self {
            user_id,
            external_event_id: event.external_id.clone(),
            title: event.title.clone(),
            description: event.description.clone(),
            start_time: event.start_time,
            end_time: event.end_time,
            location: event.location.clone(),
            occasion_label,
            raw_payload: event.raw_payload.clone(),
        }
    }
}

/// An upcoming event together with its occasion.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassifiedEvent {
    pub event: ExternalEvent,
    pub occasion: Option<Category>,
}

//=========================================================================================
// Classification Rules
//=========================================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    pub id: Uuid,
    pub name: String,
    pub target_category: Category,
    pub priority: i32,
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
}

/// A trigger word owned by exactly one rule. Stored trimmed and lower-cased.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Keyword {
    pub id: Uuid,
    pub rule_id: Uuid,
    pub keyword: String,
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleWithKeywords {
    pub rule: Rule,
    pub keywords: Vec<Keyword>,
}

//=========================================================================================
// Product Catalog
//=========================================================================================

/// A catalog product. Owned by the catalog import; only ever read here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Product {
    pub id: i64,
    pub brand: Option<String>,
    pub category: Option<String>,
    pub is_fashion: Option<bool>,
    pub name: Option<String>,
    pub image: Option<String>,
    pub url: String,
}

/// Recommendation output for one upcoming event.
#[derive(Debug, Clone, PartialEq)]
pub struct EventRecommendation {
    pub event_id: String,
    pub title: String,
    pub category: Option<Category>,
    pub pool: Vec<Product>,
}

//=========================================================================================
// Catalog Refresh Job
//=========================================================================================

/// Captured result of one external step of a catalog refresh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepOutput {
    pub step: String,
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl StepOutput {
    pub fn succeeded(&self) -> bool {
        self.exit_code == 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogRefreshReport {
    pub run_id: String,
    pub steps: Vec<StepOutput>,
}

/// Lease record guarding a job type across instances.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobLease {
    pub job_key: String,
    pub holder: String,
    pub expires_at: DateTime<Utc>,
}

impl JobLease {
    pub fn new(job_key: &str, holder: &str, now: DateTime<Utc>, ttl: Duration) -> Self {
        Self {
            job_key: job_key.to_string(),
            holder: holder.to_string(),
            expires_at: now + ttl,
        }
    }
}
