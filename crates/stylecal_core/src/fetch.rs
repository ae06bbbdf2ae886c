//! crates/stylecal_core/src/fetch.rs
//!
//! Retrieves upcoming events from the calendar provider for a bounded time
//! window and turns the raw items into normalized [`ExternalEvent`]s.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde_json::Value;
use tracing::{debug, warn};

use crate::domain::{ExternalEvent, ProviderEvent};
use crate::ports::{CalendarApi, EventQuery, ProviderError};

/// Default look-ahead of every fetch.
pub const DEFAULT_WINDOW_DAYS: i64 = 7;

/// Upper bound on pages followed for a single fetch.
const MAX_PAGES: usize = 10;

/// A half-open time range `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl EventWindow {
    /// `[now, now + days)`.
    pub fn upcoming(now: DateTime<Utc>, days: i64) -> Self {
        Self {
            start: now,
            end: now + Duration::days(days),
        }
    }

    /// Narrows this window to the requested bounds. Requests can only shrink
    /// the window, never widen it.
    pub fn narrowed(
        self,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Self {
        let start = start.map_or(self.start, |s| s.max(self.start));
        let end = end.map_or(self.end, |e| e.min(self.end));
        Self { start, end }
    }

    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }
}

/// What to fetch: a window, an optional provider-side text search and an
/// optional cap on the number of returned events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub window: EventWindow,
    pub search: Option<String>,
    pub limit: Option<usize>,
}

impl FetchRequest {
    pub fn new(window: EventWindow) -> Self {
        Self {
            window,
            search: None,
            limit: None,
        }
    }

    pub fn with_search(mut self, search: Option<String>) -> Self {
        self.search = search.filter(|s| !s.trim().is_empty());
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Parses one raw provider item. Items without an id are dropped.
pub fn normalize_item(raw: Value) -> Option<ExternalEvent> {
    match serde_json::from_value::<ProviderEvent>(raw.clone()) {
        Ok(event) => Some(ExternalEvent::from_provider(event, raw)),
        Err(e) => {
            warn!("Skipping malformed calendar item: {}", e);
            None
        }
    }
}

/// Fetches and normalizes events through a [`CalendarApi`].
#[derive(Clone)]
pub struct EventFetcher {
    api: Arc<dyn CalendarApi>,
}

impl EventFetcher {
    pub fn new(api: Arc<dyn CalendarApi>) -> Self {
        Self { api }
    }

    /// Returns the non-cancelled events of the window in provider (start
    /// time) order.
    pub async fn fetch_upcoming(
        &self,
        access_token: &str,
        request: &FetchRequest,
    ) -> Result<Vec<ExternalEvent>, ProviderError> {
        if request.window.is_empty() || request.limit == Some(0) {
            return Ok(Vec::new());
        }

        let mut events = Vec::new();
        let mut page_token = None;

        for _ in 0..MAX_PAGES {
            let query = EventQuery {
                time_min: request.window.start,
                time_max: request.window.end,
                search: request.search.clone(),
                max_results: request.limit.map(|l| l as u32),
                page_token: page_token.take(),
            };
            let page = self.api.list_events(access_token, &query).await?;

            events.extend(
                page.items
                    .into_iter()
                    .filter_map(normalize_item)
                    .filter(|event| !event.cancelled),
            );

            if let Some(limit) = request.limit {
                if events.len() >= limit {
                    events.truncate(limit);
                    break;
                }
            }
            match page.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        debug!("Fetched {} upcoming events", events.len());
        Ok(events)
    }
}
