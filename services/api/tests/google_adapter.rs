use api_lib::adapters::{GoogleCalendarAdapter, GoogleOAuthAdapter};
use api_lib::config::GoogleSettings;
use chrono::{TimeZone, Utc};
use serde_json::json;
use stylecal_core::ports::{CalendarApi, EventQuery, OAuthProvider};
use url::Url;
use wiremock::matchers::{body_string_contains, header, method, path, query_param, query_param_is_missing};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn settings(server: &MockServer) -> GoogleSettings {
    GoogleSettings {
        client_id: "client-id".into(),
        client_secret: "client-secret".into(),
        redirect_uri: "http://localhost:3000/calendar/callback".into(),
        auth_url: "https://accounts.example.com/o/oauth2/v2/auth".into(),
        token_url: format!("{}/token", server.uri()),
        calendar_api_base: format!("{}/calendar/v3", server.uri()),
        http_timeout_secs: 5,
    }
}

fn oauth(server: &MockServer) -> GoogleOAuthAdapter {
    GoogleOAuthAdapter::new(reqwest::Client::new(), &settings(server)).unwrap()
}

fn query() -> EventQuery {
    EventQuery {
        time_min: Utc.with_ymd_and_hms(2026, 4, 20, 8, 0, 0).unwrap(),
        time_max: Utc.with_ymd_and_hms(2026, 4, 27, 8, 0, 0).unwrap(),
        search: None,
        max_results: None,
        page_token: None,
    }
}

#[tokio::test]
async fn authorization_url_requests_offline_readonly_consent() {
    let server = MockServer::start().await;
    let url = Url::parse(&oauth(&server).authorization_url("state-123", Some("ana@example.com"))).unwrap();

    let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
    let get = |k: &str| pairs.iter().find(|(key, _)| key == k).map(|(_, v)| v.as_str());
    assert_eq!(get("response_type"), Some("code"));
    assert_eq!(get("scope"), Some("https://www.googleapis.com/auth/calendar.readonly"));
    assert_eq!(get("access_type"), Some("offline"));
    assert_eq!(get("prompt"), Some("consent"));
    assert_eq!(get("login_hint"), Some("ana@example.com"));
    assert_eq!(get("state"), Some("state-123"));
    assert_eq!(get("redirect_uri"), Some("http://localhost:3000/calendar/callback"));
}

#[tokio::test]
async fn refresh_posts_refresh_grant_and_parses_tokens() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("grant_type=refresh_token"))
        .and(body_string_contains("refresh_token=stored-refresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "fresh-token",
            "expires_in": 3599,
            "scope": "https://www.googleapis.com/auth/calendar.readonly",
            "token_type": "Bearer"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let grant = oauth(&server).refresh("stored-refresh").await.unwrap();
    assert_eq!(grant.access_token, "fresh-token");
    assert_eq!(grant.expires_in, Some(3599));
    assert_eq!(grant.refresh_token, None);
}

#[tokio::test]
async fn rejected_refresh_carries_status_and_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(400).set_body_string(r#"{"error":"invalid_grant"}"#))
        .expect(1)
        .mount(&server)
        .await;

    let err = oauth(&server).refresh("revoked").await.unwrap_err();
    assert_eq!(err.status, Some(400));
    assert!(err.detail.contains("invalid_grant"));
}

#[tokio::test]
async fn code_exchange_uses_authorization_code_grant() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("grant_type=authorization_code"))
        .and(body_string_contains("code=auth-code"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "first-token",
            "refresh_token": "first-refresh",
            "expires_in": 3600
        })))
        .expect(1)
        .mount(&server)
        .await;

    let grant = oauth(&server).exchange_code("auth-code").await.unwrap();
    assert_eq!(grant.refresh_token.as_deref(), Some("first-refresh"));
}

#[tokio::test]
async fn events_request_sends_bearer_and_window() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/calendar/v3/calendars/primary/events"))
        .and(header("authorization", "Bearer access-1"))
        .and(query_param("singleEvents", "true"))
        .and(query_param("orderBy", "startTime"))
        .and(query_param("timeMin", "2026-04-20T08:00:00+00:00"))
        .and(query_param("q", "wedding"))
        .and(query_param("maxResults", "10"))
        .and(query_param_is_missing("pageToken"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [
                { "id": "e1", "summary": "Wedding", "status": "confirmed",
                  "start": { "dateTime": "2026-04-21T09:00:00Z" } }
            ],
            "nextPageToken": "page-2"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let api = GoogleCalendarAdapter::new(reqwest::Client::new(), &settings(&server).calendar_api_base);
    let mut q = query();
    q.search = Some("wedding".into());
    q.max_results = Some(10);

    let page = api.list_events("access-1", &q).await.unwrap();
    assert_eq!(page.items.len(), 1);
    assert_eq!(page.items[0]["id"], "e1");
    assert_eq!(page.next_page_token.as_deref(), Some("page-2"));
}

#[tokio::test]
async fn events_failure_reports_upstream_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/calendar/v3/calendars/primary/events"))
        .respond_with(ResponseTemplate::new(503).set_body_string("backend unavailable"))
        .expect(1)
        .mount(&server)
        .await;

    let api = GoogleCalendarAdapter::new(reqwest::Client::new(), &settings(&server).calendar_api_base);
    let err = api.list_events("access-1", &query()).await.unwrap_err();
    assert_eq!(err.status, Some(503));
    assert_eq!(err.detail, "backend unavailable");
}

#[tokio::test]
async fn empty_calendar_has_no_items() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/calendar/v3/calendars/primary/events"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .mount(&server)
        .await;

    let api = GoogleCalendarAdapter::new(reqwest::Client::new(), &settings(&server).calendar_api_base);
    let page = api.list_events("access-1", &query()).await.unwrap();
    assert!(page.items.is_empty());
    assert!(page.next_page_token.is_none());
}
