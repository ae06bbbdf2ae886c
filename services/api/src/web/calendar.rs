//! services/api/src/web/calendar.rs
//!
//! Calendar connection, sync, listing and recommendation endpoints. All of
//! them run behind `require_auth`.

use axum::{
    extract::{Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Redirect},
    Extension, Json,
};
use chrono::Utc;
use std::sync::Arc;
use stylecal_core::{CalendarError, UpcomingFilter};
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{ErrorBody, HttpError};
use crate::web::middleware::{read_cookie, AuthUser};
use crate::web::rest::{
    CallbackQuery, EventListQuery, EventListResponse, EventResponse, RecommendationResponse,
    StoredEventResponse, SyncResponse,
};
use crate::web::state::AppState;

/// Cookie binding an OAuth round trip to the browser that started it.
const OAUTH_STATE_COOKIE: &str = "oauth_state";

/// How long a started grant may take before the callback is rejected.
const OAUTH_STATE_MAX_AGE_SECS: i64 = 600;

fn oauth_state_cookie(value: &str, max_age: i64) -> String {
    format!(
        "{}={}; HttpOnly; Secure; SameSite=Lax; Path=/calendar; Max-Age={}",
        OAUTH_STATE_COOKIE, value, max_age
    )
}

/// Start the OAuth grant for the calendar.
#[utoipa::path(
    get,
    path = "/calendar/connect",
    responses(
        (status = 303, description = "Redirect to the provider consent screen"),
        (status = 401, description = "Not logged in", body = ErrorBody)
    ),
    tag = "calendar"
)]
pub async fn connect_handler(
    State(state): State<Arc<AppState>>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
) -> impl IntoResponse {
    // The hint only pre-selects the account, so a lookup failure is not fatal.
    let email = match state.accounts.get_user_by_id(user_id).await {
        Ok(user) => user.email,
        Err(e) => {
            warn!("Could not load user {} for login hint: {}", user_id, e);
            None
        }
    };
    let oauth_state = Uuid::new_v4().simple().to_string();
    let url = state.calendar.authorization_url(&oauth_state, email.as_deref());
    (
        [(header::SET_COOKIE, oauth_state_cookie(&oauth_state, OAUTH_STATE_MAX_AGE_SECS))],
        Redirect::to(&url),
    )
}

/// Finish the OAuth grant and store the credential.
#[utoipa::path(
    get,
    path = "/calendar/callback",
    params(CallbackQuery),
    responses(
        (status = 303, description = "Credential stored, redirect to the app"),
        (status = 400, description = "Missing code, or state not matching this browser", body = ErrorBody),
        (status = 502, description = "Code exchange failed", body = ErrorBody)
    ),
    tag = "calendar"
)]
pub async fn callback_handler(
    State(state): State<Arc<AppState>>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
    headers: HeaderMap,
    Query(query): Query<CallbackQuery>,
) -> Result<impl IntoResponse, HttpError> {
    let expected = read_cookie(&headers, OAUTH_STATE_COOKIE);
    if expected.is_none() || query.state.as_deref() != expected {
        warn!("OAuth callback for user {} with missing or foreign state", user_id);
        return Err(HttpError::new(
            StatusCode::BAD_REQUEST,
            "invalid_state",
            "Authorization state does not match; start the connection again",
        ));
    }
    if let Some(error) = query.error {
        return Err(HttpError::bad_request(format!("Authorization was not granted: {error}")));
    }
    let code = query
        .code
        .filter(|c| !c.is_empty())
        .ok_or_else(|| HttpError::bad_request("Missing authorization code"))?;

    state.calendar.connect(user_id, &code, Utc::now()).await?;
    info!("Calendar connected for user {}", user_id);
    Ok((
        [(header::SET_COOKIE, oauth_state_cookie("", 0))],
        Redirect::to(&state.config.post_connect_redirect),
    ))
}

/// Fetch the upcoming window and store every event with its occasion label.
#[utoipa::path(
    post,
    path = "/calendar/sync",
    responses(
        (status = 200, description = "Events synced", body = SyncResponse),
        (status = 401, description = "Token refresh failed, reconnect required", body = ErrorBody),
        (status = 409, description = "Calendar not connected", body = ErrorBody),
        (status = 502, description = "Calendar provider failed", body = ErrorBody),
        (status = 500, description = "Events could not be stored", body = ErrorBody)
    ),
    tag = "calendar"
)]
pub async fn sync_handler(
    State(state): State<Arc<AppState>>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
) -> Result<Json<SyncResponse>, HttpError> {
    let report = state.calendar.sync_now(user_id, Utc::now()).await?;
    Ok(Json(report.into()))
}

/// List the next upcoming events with their occasion labels.
#[utoipa::path(
    get,
    path = "/calendar/events",
    params(EventListQuery),
    responses(
        (status = 200, description = "Upcoming events, or connected=false", body = EventListResponse),
        (status = 401, description = "Token refresh failed, reconnect required", body = ErrorBody),
        (status = 502, description = "Calendar provider failed", body = ErrorBody)
    ),
    tag = "calendar"
)]
pub async fn list_events_handler(
    State(state): State<Arc<AppState>>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
    Query(query): Query<EventListQuery>,
) -> Result<Json<EventListResponse>, HttpError> {
    let filter = UpcomingFilter {
        search: query.q,
        from: query.from,
        to: query.to,
    };
    match state.calendar.list_upcoming(user_id, filter, Utc::now()).await {
        Ok(events) => Ok(Json(EventListResponse {
            connected: true,
            events: events.into_iter().map(EventResponse::from).collect(),
        })),
        Err(CalendarError::NotConnected) => Ok(Json(EventListResponse {
            connected: false,
            events: Vec::new(),
        })),
        Err(e) => Err(e.into()),
    }
}

/// Events stored by previous syncs.
#[utoipa::path(
    get,
    path = "/calendar/synced",
    responses(
        (status = 200, description = "Stored events", body = [StoredEventResponse])
    ),
    tag = "calendar"
)]
pub async fn synced_events_handler(
    State(state): State<Arc<AppState>>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
) -> Result<Json<Vec<StoredEventResponse>>, HttpError> {
    let events = state.calendar.synced_events(user_id).await?;
    Ok(Json(events.into_iter().map(Into::into).collect()))
}

/// Per upcoming event, its occasion and the matching fashion products.
#[utoipa::path(
    get,
    path = "/recommendations",
    responses(
        (status = 200, description = "Recommendations per event", body = [RecommendationResponse]),
        (status = 401, description = "Token refresh failed, reconnect required", body = ErrorBody),
        (status = 409, description = "Calendar not connected", body = ErrorBody),
        (status = 502, description = "Calendar provider failed", body = ErrorBody)
    ),
    tag = "calendar"
)]
pub async fn recommendations_handler(
    State(state): State<Arc<AppState>>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
) -> Result<impl IntoResponse, HttpError> {
    let recommendations = state.calendar.recommendations(user_id, Utc::now()).await?;
    let body: Vec<RecommendationResponse> = recommendations.into_iter().map(Into::into).collect();
    Ok((StatusCode::OK, Json(body)))
}
