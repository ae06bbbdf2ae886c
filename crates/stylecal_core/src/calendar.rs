//! crates/stylecal_core/src/calendar.rs
//!
//! The calendar pipeline: token → fetch → classify → (store | match).
//!
//! Within one operation every step completes before the next one starts.
//! Separate operations share no in-memory state.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::info;
use uuid::Uuid;

use crate::domain::{Category, ClassifiedEvent, Credential, EventRecommendation, EventUpsert, ExternalEvent, SyncedEvent};
use crate::error::CalendarError;
use crate::fetch::{EventFetcher, EventWindow, FetchRequest, DEFAULT_WINDOW_DAYS};
use crate::matcher;
use crate::ports::{CatalogStore, EventStore};
use crate::rules::{RuleAdmin, RuleSnapshot};
use crate::tokens::TokenRefresher;

/// Tunables of the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalendarSettings {
    pub window_days: i64,
    /// Maximum number of events returned by listings and recommendations.
    pub list_limit: usize,
}

impl Default for CalendarSettings {
    fn default() -> Self {
        Self {
            window_days: DEFAULT_WINDOW_DAYS,
            list_limit: 10,
        }
    }
}

/// Optional narrowing of an event listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpcomingFilter {
    /// Free-text query forwarded to the provider.
    pub search: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

impl UpcomingFilter {
    pub fn search(search: impl Into<String>) -> Self {
        Self {
            search: Some(search.into()),
            ..Self::default()
        }
    }
}

/// Result of one "sync now" call.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncReport {
    pub synced: usize,
    pub events: Vec<SyncedEvent>,
}

/// Writes normalized events, idempotent on (user_id, external_event_id).
#[derive(Clone)]
pub struct SyncWriter {
    store: Arc<dyn EventStore>,
}

impl SyncWriter {
    pub fn new(store: Arc<dyn EventStore>) -> Self {
        Self { store }
    }

    pub async fn upsert(
        &self,
        user_id: Uuid,
        event: &ExternalEvent,
        occasion_label: Option<Category>,
    ) -> Result<SyncedEvent, CalendarError> {
        Ok(self
            .store
            .upsert_event(&EventUpsert::new(user_id, event, occasion_label))
            .await?)
    }

    pub async fn list(&self, user_id: Uuid) -> Result<Vec<SyncedEvent>, CalendarError> {
        Ok(self.store.list_events_for_user(user_id).await?)
    }
}

#[derive(Clone)]
pub struct CalendarService {
    tokens: TokenRefresher,
    fetcher: EventFetcher,
    rules: RuleAdmin,
    writer: SyncWriter,
    catalog: Arc<dyn CatalogStore>,
    settings: CalendarSettings,
}

impl CalendarService {
    pub fn new(
        tokens: TokenRefresher,
        fetcher: EventFetcher,
        rules: RuleAdmin,
        writer: SyncWriter,
        catalog: Arc<dyn CatalogStore>,
        settings: CalendarSettings,
    ) -> Self {
        Self {
            tokens,
            fetcher,
            rules,
            writer,
            catalog,
            settings,
        }
    }

    pub fn authorization_url(&self, state: &str, login_hint: Option<&str>) -> String {
        self.tokens.authorization_url(state, login_hint)
    }

    /// Completes the OAuth grant for `user_id`.
    pub async fn connect(&self, user_id: Uuid, code: &str, now: DateTime<Utc>) -> Result<Credential, CalendarError> {
        self.tokens.connect(user_id, code, now).await
    }

    /// Fetches the whole upcoming window and upserts every event.
    pub async fn sync_now(&self, user_id: Uuid, now: DateTime<Utc>) -> Result<SyncReport, CalendarError> {
        let request = FetchRequest::new(EventWindow::upcoming(now, self.settings.window_days));
        let events = self.fetch(user_id, &request, now).await?;
        let snapshot = self.rules.snapshot().await?;

        let mut synced = Vec::with_capacity(events.len());
        for event in &events {
            let occasion = snapshot.classify_event(&event.title, &event.description);
            synced.push(self.writer.upsert(user_id, event, occasion).await?);
        }

        info!("Synced {} calendar events for user {}", synced.len(), user_id);
        Ok(SyncReport {
            synced: synced.len(),
            events: synced,
        })
    }

    /// Lists the next events with their occasion, without storing anything.
    /// The filter can only narrow the default window.
    pub async fn list_upcoming(
        &self,
        user_id: Uuid,
        filter: UpcomingFilter,
        now: DateTime<Utc>,
    ) -> Result<Vec<ClassifiedEvent>, CalendarError> {
        let mut request = self.listing_request(now).with_search(filter.search);
        request.window = request.window.narrowed(filter.from, filter.to);
        let events = self.fetch(user_id, &request, now).await?;
        let snapshot = self.rules.snapshot().await?;
        Ok(classify_all(&snapshot, events))
    }

    /// Per upcoming event, its occasion and the matching product pool.
    pub async fn recommendations(
        &self,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Vec<EventRecommendation>, CalendarError> {
        let events = self.fetch(user_id, &self.listing_request(now), now).await?;
        let (snapshot, catalog) =
            futures::try_join!(self.rules.snapshot(), self.catalog.list_products())?;

        Ok(classify_all(&snapshot, events)
            .iter()
            .map(|c| matcher::recommend(&c.event, c.occasion, &catalog))
            .collect())
    }

    /// Events previously stored by [`Self::sync_now`].
    pub async fn synced_events(&self, user_id: Uuid) -> Result<Vec<SyncedEvent>, CalendarError> {
        self.writer.list(user_id).await
    }

    fn listing_request(&self, now: DateTime<Utc>) -> FetchRequest {
        FetchRequest::new(EventWindow::upcoming(now, self.settings.window_days)).with_limit(self.settings.list_limit)
    }

    async fn fetch(
        &self,
        user_id: Uuid,
        request: &FetchRequest,
        now: DateTime<Utc>,
    ) -> Result<Vec<ExternalEvent>, CalendarError> {
        let token = self.tokens.access_token_for(user_id, now).await?;
        self.fetcher
            .fetch_upcoming(&token.access_token, request)
            .await
            .map_err(CalendarError::UpstreamFetch)
    }
}

fn classify_all(snapshot: &RuleSnapshot, events: Vec<ExternalEvent>) -> Vec<ClassifiedEvent> {
    events
        .into_iter()
        .map(|event| ClassifiedEvent {
            occasion: snapshot.classify_event(&event.title, &event.description),
            event,
        })
        .collect()
}
