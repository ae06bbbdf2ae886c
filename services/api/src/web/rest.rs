//! services/api/src/web/rest.rs
//!
//! The master definition for the OpenAPI specification, and the JSON payloads
//! shared by the REST handlers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use stylecal_core::domain::{
    CatalogRefreshReport, ClassifiedEvent, EventRecommendation, Keyword, Product, RuleWithKeywords,
    StepOutput, SyncedEvent,
};
use stylecal_core::SyncReport;
use utoipa::{IntoParams, OpenApi, ToSchema};
use uuid::Uuid;

use crate::error::ErrorBody;
use crate::web::{admin, auth, calendar};

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        auth::signup_handler,
        auth::login_handler,
        auth::logout_handler,
        calendar::connect_handler,
        calendar::callback_handler,
        calendar::sync_handler,
        calendar::list_events_handler,
        calendar::synced_events_handler,
        calendar::recommendations_handler,
        admin::list_rules_handler,
        admin::add_keyword_handler,
        admin::remove_keyword_handler,
        admin::catalog_refresh_handler,
    ),
    components(
        schemas(
            auth::SignupRequest,
            auth::LoginRequest,
            auth::AuthResponse,
            ErrorBody,
            EventResponse,
            EventListResponse,
            SyncResponse,
            StoredEventResponse,
            ProductResponse,
            RecommendationResponse,
            KeywordResponse,
            RuleResponse,
            AddKeywordRequest,
            StepResponse,
            CatalogRefreshResponse,
        )
    ),
    tags(
        (name = "auth", description = "Account signup and login."),
        (name = "calendar", description = "Calendar connection, sync and occasion-based recommendations."),
        (name = "admin", description = "Classification rules and catalog jobs. Requires the x-admin-token header.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// Calendar Payloads
//=========================================================================================

/// An upcoming event with its occasion label.
#[derive(Debug, Serialize, ToSchema)]
pub struct EventResponse {
    pub id: String,
    pub title: String,
    pub description: String,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub all_day: bool,
    pub location: Option<String>,
    /// One of `formal`, `casual`, `streetwear`; absent when no rule matched.
    pub occasion_label: Option<String>,
}

impl From<ClassifiedEvent> for EventResponse {
    fn from(c: ClassifiedEvent) -> Self {
        Self {
            id: c.event.external_id,
            title: c.event.title,
            description: c.event.description,
            start: c.event.start_time,
            end: c.event.end_time,
            all_day: c.event.all_day,
            location: c.event.location,
            occasion_label: c.occasion.map(|o| o.to_string()),
        }
    }
}

/// Upcoming events, or `connected: false` when the calendar was never linked.
#[derive(Debug, Serialize, ToSchema)]
pub struct EventListResponse {
    pub connected: bool,
    pub events: Vec<EventResponse>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct EventListQuery {
    /// Free-text query forwarded to the calendar provider.
    pub q: Option<String>,
    /// Lower bound; ignored when earlier than now.
    pub from: Option<DateTime<Utc>>,
    /// Upper bound; ignored when past the sync window.
    pub to: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct CallbackQuery {
    pub code: Option<String>,
    /// Must match the value set by `/calendar/connect`.
    pub state: Option<String>,
    /// Set by the provider when the user denied consent.
    pub error: Option<String>,
}

/// A row written by "sync now".
#[derive(Debug, Serialize, ToSchema)]
pub struct StoredEventResponse {
    pub id: Uuid,
    pub external_event_id: String,
    pub title: String,
    pub description: String,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub location: Option<String>,
    pub occasion_label: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl From<SyncedEvent> for StoredEventResponse {
    fn from(e: SyncedEvent) -> Self {
        Self {
            id: e.id,
            external_event_id: e.external_event_id,
            title: e.title,
            description: e.description,
            start: e.start_time,
            end: e.end_time,
            location: e.location,
            occasion_label: e.occasion_label.map(|o| o.to_string()),
            updated_at: e.updated_at,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SyncResponse {
    pub synced: usize,
    pub events: Vec<StoredEventResponse>,
}

impl From<SyncReport> for SyncResponse {
    fn from(report: SyncReport) -> Self {
        Self {
            synced: report.synced,
            events: report.events.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ProductResponse {
    pub id: i64,
    pub brand: Option<String>,
    pub category: Option<String>,
    pub name: Option<String>,
    pub image: Option<String>,
    pub url: String,
}

impl From<Product> for ProductResponse {
    fn from(p: Product) -> Self {
        Self {
            id: p.id,
            brand: p.brand,
            category: p.category,
            name: p.name,
            image: p.image,
            url: p.url,
        }
    }
}

/// One upcoming event with its matched product pool.
#[derive(Debug, Serialize, ToSchema)]
pub struct RecommendationResponse {
    pub event_id: String,
    pub title: String,
    pub category: Option<String>,
    pub products: Vec<ProductResponse>,
}

impl From<EventRecommendation> for RecommendationResponse {
    fn from(r: EventRecommendation) -> Self {
        Self {
            event_id: r.event_id,
            title: r.title,
            category: r.category.map(|c| c.to_string()),
            products: r.pool.into_iter().map(Into::into).collect(),
        }
    }
}

//=========================================================================================
// Admin Payloads
//=========================================================================================

#[derive(Debug, Serialize, ToSchema)]
pub struct KeywordResponse {
    pub id: Uuid,
    pub keyword: String,
    pub enabled: bool,
}

impl From<Keyword> for KeywordResponse {
    fn from(k: Keyword) -> Self {
        Self {
            id: k.id,
            keyword: k.keyword,
            enabled: k.enabled,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RuleResponse {
    pub id: Uuid,
    pub name: String,
    pub target_category: String,
    pub priority: i32,
    pub keywords: Vec<KeywordResponse>,
}

impl From<RuleWithKeywords> for RuleResponse {
    fn from(r: RuleWithKeywords) -> Self {
        Self {
            id: r.rule.id,
            name: r.rule.name,
            target_category: r.rule.target_category.to_string(),
            priority: r.rule.priority,
            keywords: r.keywords.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AddKeywordRequest {
    /// One of `formal`, `casual`, `streetwear`.
    pub category: String,
    pub keyword: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct StepResponse {
    pub step: String,
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl From<StepOutput> for StepResponse {
    fn from(s: StepOutput) -> Self {
        Self {
            step: s.step,
            exit_code: s.exit_code,
            stdout: s.stdout,
            stderr: s.stderr,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CatalogRefreshResponse {
    pub ok: bool,
    pub run_id: String,
    /// Name of the step that exited non-zero, if any.
    pub failed_step: Option<String>,
    pub steps: Vec<StepResponse>,
}

impl From<CatalogRefreshReport> for CatalogRefreshResponse {
    fn from(report: CatalogRefreshReport) -> Self {
        let failed_step = report
            .steps
            .iter()
            .find(|s| !s.succeeded())
            .map(|s| s.step.clone());
        Self {
            ok: failed_step.is_none(),
            run_id: report.run_id,
            failed_step,
            steps: report.steps.into_iter().map(Into::into).collect(),
        }
    }
}
