//! services/api/src/adapters/google.rs
//!
//! Adapters for Google's OAuth token endpoint and the Calendar v3 events API.
//! They implement the `OAuthProvider` and `CalendarApi` ports from the `core`
//! crate on top of a shared `reqwest` client.

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::Deserialize;
use serde_json::Value;
use stylecal_core::domain::TokenGrant;
use stylecal_core::ports::{CalendarApi, EventPage, EventQuery, OAuthProvider, ProviderError};
use tracing::{debug, info};
use url::Url;

use crate::config::GoogleSettings;

/// Read-only access to the user's calendars.
pub const CALENDAR_READONLY_SCOPE: &str = "https://www.googleapis.com/auth/calendar.readonly";

/// Partial response selector for the events list.
const EVENT_FIELDS: &str = "items(id,summary,description,start,end,location,status),nextPageToken";

/// Reads the body of a finished request, turning non-success statuses into
/// errors that carry the upstream status and body.
async fn read_body(response: Response) -> Result<String, ProviderError> {
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| ProviderError::transport(format!("failed to read response: {}", e)))?;
    if !status.is_success() {
        return Err(ProviderError::http(status.as_u16(), body));
    }
    Ok(body)
}

//=========================================================================================
// OAuth
//=========================================================================================

/// An adapter that implements the `OAuthProvider` port against Google's OAuth 2.0 endpoints.
#[derive(Clone)]
pub struct GoogleOAuthAdapter {
    client: Client,
    client_id: String,
    client_secret: String,
    redirect_uri: String,
    auth_url: Url,
    token_url: String,
}

impl GoogleOAuthAdapter {
    /// Fails when the configured authorization endpoint is not a valid URL.
    pub fn new(client: Client, settings: &GoogleSettings) -> Result<Self, url::ParseError> {
        Ok(Self {
            client,
            client_id: settings.client_id.clone(),
            client_secret: settings.client_secret.clone(),
            redirect_uri: settings.redirect_uri.clone(),
            auth_url: Url::parse(&settings.auth_url)?,
            token_url: settings.token_url.clone(),
        })
    }

    async fn post_token_form(&self, params: &[(&str, &str)]) -> Result<TokenGrant, ProviderError> {
        let response = self
            .client
            .post(&self.token_url)
            .form(params)
            .send()
            .await
            .map_err(|e| ProviderError::transport(format!("token request failed: {}", e)))?;
        let status = response.status().as_u16();
        let body = read_body(response).await?;
        serde_json::from_str::<TokenGrant>(&body)
            .map_err(|e| ProviderError::http(status, format!("invalid token response: {}", e)))
    }
}

#[async_trait]
impl OAuthProvider for GoogleOAuthAdapter {
    fn authorization_url(&self, state: &str, login_hint: Option<&str>) -> String {
        let mut url = self.auth_url.clone();
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("client_id", &self.client_id)
                .append_pair("redirect_uri", &self.redirect_uri)
                .append_pair("response_type", "code")
                .append_pair("scope", CALENDAR_READONLY_SCOPE)
                .append_pair("access_type", "offline")
                .append_pair("prompt", "consent")
                .append_pair("state", state);
            if let Some(hint) = login_hint {
                query.append_pair("login_hint", hint);
            }
        }
        url.to_string()
    }

    async fn exchange_code(&self, code: &str) -> Result<TokenGrant, ProviderError> {
        let grant = self
            .post_token_form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("code", code),
                ("grant_type", "authorization_code"),
                ("redirect_uri", self.redirect_uri.as_str()),
            ])
            .await?;
        info!("Exchanged authorization code for calendar tokens");
        Ok(grant)
    }

    async fn refresh(&self, refresh_token: &str) -> Result<TokenGrant, ProviderError> {
        let grant = self
            .post_token_form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("refresh_token", refresh_token),
                ("grant_type", "refresh_token"),
            ])
            .await?;
        info!("Refreshed calendar access token");
        Ok(grant)
    }
}

//=========================================================================================
// Calendar Events
//=========================================================================================

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct EventsResponse {
    #[serde(default)]
    items: Vec<Value>,
    #[serde(default)]
    next_page_token: Option<String>,
}

/// An adapter that implements the `CalendarApi` port for the user's primary calendar.
#[derive(Clone)]
pub struct GoogleCalendarAdapter {
    client: Client,
    events_url: String,
}

impl GoogleCalendarAdapter {
    pub fn new(client: Client, api_base: &str) -> Self {
        Self {
            client,
            events_url: format!("{}/calendars/primary/events", api_base.trim_end_matches('/')),
        }
    }
}

#[async_trait]
impl CalendarApi for GoogleCalendarAdapter {
    async fn list_events(&self, access_token: &str, query: &EventQuery) -> Result<EventPage, ProviderError> {
        let mut params: Vec<(&str, String)> = vec![
            ("timeMin", query.time_min.to_rfc3339()),
            ("timeMax", query.time_max.to_rfc3339()),
            ("singleEvents", "true".to_string()),
            ("orderBy", "startTime".to_string()),
            ("fields", EVENT_FIELDS.to_string()),
        ];
        if let Some(max) = query.max_results {
            params.push(("maxResults", max.to_string()));
        }
        if let Some(search) = &query.search {
            params.push(("q", search.clone()));
        }
        if let Some(token) = &query.page_token {
            params.push(("pageToken", token.clone()));
        }

        let response = self
            .client
            .get(&self.events_url)
            .bearer_auth(access_token)
            .query(&params)
            .send()
            .await
            .map_err(|e| ProviderError::transport(format!("events request failed: {}", e)))?;
        let status = response.status().as_u16();
        let body = read_body(response).await?;
        let page: EventsResponse = serde_json::from_str(&body)
            .map_err(|e| ProviderError::http(status, format!("invalid events response: {}", e)))?;

        debug!("Fetched {} calendar items", page.items.len());
        Ok(EventPage {
            items: page.items,
            next_page_token: page.next_page_token,
        })
    }
}
