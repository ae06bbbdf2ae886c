//! In-memory implementations of the core ports for pipeline tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use serde_json::{json, Value};
use stylecal_core::domain::{
    Category, Credential, EventUpsert, Keyword, Product, Rule, RuleWithKeywords, SyncedEvent,
    TokenGrant, GOOGLE_CALENDAR_PROVIDER,
};
use stylecal_core::fetch::EventFetcher;
use stylecal_core::ports::{
    CalendarApi, CatalogStore, CredentialStore, EventPage, EventQuery, EventStore, OAuthProvider,
    PortError, PortResult, ProviderError, RuleStore,
};
use stylecal_core::{CalendarService, CalendarSettings, RuleAdmin, SyncWriter, TokenRefresher};
use uuid::Uuid;

pub fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 4, 20, 8, 0, 0).unwrap()
}

//=========================================================================================
// Storage
//=========================================================================================

#[derive(Default)]
pub struct MemoryStore {
    pub credentials: Mutex<HashMap<(Uuid, String), Credential>>,
    pub events: Mutex<Vec<SyncedEvent>>,
    pub rules: Mutex<Vec<Rule>>,
    pub keywords: Mutex<Vec<Keyword>>,
    pub products: Mutex<Vec<Product>>,
    pub fail_event_writes: Mutex<bool>,
}

impl MemoryStore {
    pub fn add_rule(&self, category: Category, priority: i32, keywords: &[&str]) -> Uuid {
        let id = Uuid::new_v4();
        let created_at = now() + chrono::Duration::seconds(self.rules.lock().unwrap().len() as i64);
        self.rules.lock().unwrap().push(Rule {
            id,
            name: category.rule_name().to_string(),
            target_category: category,
            priority,
            enabled: true,
            created_at,
        });
        for k in keywords {
            self.keywords.lock().unwrap().push(Keyword {
                id: Uuid::new_v4(),
                rule_id: id,
                keyword: k.to_string(),
                enabled: true,
                created_at,
            });
        }
        id
    }

    pub fn seed_default_rules(&self) {
        self.add_rule(Category::Formal, 3, &["interview", "wedding", "ceremony", "meeting"]);
        self.add_rule(Category::Casual, 2, &["shopping", "outing", "hangout"]);
        self.add_rule(Category::Streetwear, 1, &["concert", "social"]);
    }

    pub fn add_product(&self, category: Option<&str>, is_fashion: Option<bool>) -> i64 {
        let mut products = self.products.lock().unwrap();
        let id = products.len() as i64 + 1;
        products.push(Product {
            id,
            brand: Some("Tomaz".into()),
            category: category.map(str::to_string),
            is_fashion,
            name: Some(format!("Product {id}")),
            image: None,
            url: format!("https://shop.example/p/{id}"),
        });
        id
    }

    pub fn connect(&self, user_id: Uuid, expires_in: i64) {
        self.credentials.lock().unwrap().insert(
            (user_id, GOOGLE_CALENDAR_PROVIDER.to_string()),
            Credential {
                user_id,
                provider: GOOGLE_CALENDAR_PROVIDER.to_string(),
                access_token: "stored-token".into(),
                refresh_token: Some("refresh-token".into()),
                expires_at: Some(now().timestamp() + expires_in),
                scope: Some("https://www.googleapis.com/auth/calendar.readonly".into()),
                token_type: Some("Bearer".into()),
            },
        );
    }

    pub fn stored_events(&self, user_id: Uuid) -> Vec<SyncedEvent> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.user_id == user_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl CredentialStore for MemoryStore {
    async fn get_credential(&self, user_id: Uuid, provider: &str) -> PortResult<Option<Credential>> {
        Ok(self
            .credentials
            .lock()
            .unwrap()
            .get(&(user_id, provider.to_string()))
            .cloned())
    }

    async fn save_credential(&self, credential: &Credential) -> PortResult<()> {
        self.credentials.lock().unwrap().insert(
            (credential.user_id, credential.provider.clone()),
            credential.clone(),
        );
        Ok(())
    }
}

#[async_trait]
impl EventStore for MemoryStore {
    async fn upsert_event(&self, event: &EventUpsert) -> PortResult<SyncedEvent> {
        if *self.fail_event_writes.lock().unwrap() {
            return Err(PortError::Unexpected("connection reset".into()));
        }
        let mut events = self.events.lock().unwrap();
        let existing = events
            .iter_mut()
            .find(|e| e.user_id == event.user_id && e.external_event_id == event.external_event_id);
        let row = match existing {
            Some(row) => {
                row.title = event.title.clone();
                row.description = event.description.clone();
                row.start_time = event.start_time;
                row.end_time = event.end_time;
                row.location = event.location.clone();
                row.occasion_label = event.occasion_label;
                row.raw_payload = event.raw_payload.clone();
                row.clone()
            }
            None => {
                let row = SyncedEvent {
                    id: Uuid::new_v4(),
                    user_id: event.user_id,
                    external_event_id: event.external_event_id.clone(),
                    title: event.title.clone(),
                    description: event.description.clone(),
                    start_time: event.start_time,
                    end_time: event.end_time,
                    location: event.location.clone(),
                    occasion_label: event.occasion_label,
                    raw_payload: event.raw_payload.clone(),
                    updated_at: now(),
                };
                events.push(row.clone());
                row
            }
        };
        Ok(row)
    }

    async fn list_events_for_user(&self, user_id: Uuid) -> PortResult<Vec<SyncedEvent>> {
        Ok(self.stored_events(user_id))
    }
}

#[async_trait]
impl RuleStore for MemoryStore {
    async fn list_rules(&self) -> PortResult<Vec<RuleWithKeywords>> {
        let keywords = self.keywords.lock().unwrap();
        Ok(self
            .rules
            .lock()
            .unwrap()
            .iter()
            .map(|rule| RuleWithKeywords {
                rule: rule.clone(),
                keywords: keywords.iter().filter(|k| k.rule_id == rule.id).cloned().collect(),
            })
            .collect())
    }

    async fn find_keyword(&self, keyword: &str) -> PortResult<Option<(Keyword, Category)>> {
        let rules = self.rules.lock().unwrap();
        Ok(self
            .keywords
            .lock()
            .unwrap()
            .iter()
            .find(|k| k.keyword == keyword)
            .and_then(|k| {
                rules
                    .iter()
                    .find(|r| r.id == k.rule_id)
                    .map(|r| (k.clone(), r.target_category))
            }))
    }

    async fn ensure_rule(&self, category: Category) -> PortResult<Rule> {
        let existing = {
            let mut rules = self.rules.lock().unwrap();
            rules.iter_mut().find(|r| r.target_category == category).map(|r| {
                r.enabled = true;
                r.clone()
            })
        };
        match existing {
            Some(rule) => Ok(rule),
            None => {
                let id = self.add_rule(category, category.default_priority(), &[]);
                let rules = self.rules.lock().unwrap();
                Ok(rules.iter().find(|r| r.id == id).cloned().expect("rule just inserted"))
            }
        }
    }

    async fn insert_keyword(&self, rule_id: Uuid, keyword: &str) -> PortResult<Keyword> {
        let mut keywords = self.keywords.lock().unwrap();
        if keywords.iter().any(|k| k.keyword == keyword) {
            return Err(PortError::Conflict(keyword.to_string()));
        }
        let created = Keyword {
            id: Uuid::new_v4(),
            rule_id,
            keyword: keyword.to_string(),
            enabled: true,
            created_at: now(),
        };
        keywords.push(created.clone());
        Ok(created)
    }

    async fn set_keyword_enabled(&self, keyword_id: Uuid, enabled: bool) -> PortResult<Keyword> {
        let mut keywords = self.keywords.lock().unwrap();
        let keyword = keywords
            .iter_mut()
            .find(|k| k.id == keyword_id)
            .ok_or_else(|| PortError::NotFound(keyword_id.to_string()))?;
        keyword.enabled = enabled;
        Ok(keyword.clone())
    }
}

#[async_trait]
impl CatalogStore for MemoryStore {
    async fn list_products(&self) -> PortResult<Vec<Product>> {
        Ok(self.products.lock().unwrap().clone())
    }
}

//=========================================================================================
// Provider
//=========================================================================================

#[derive(Default)]
pub struct FakeGoogle {
    pub items: Mutex<Vec<Value>>,
    pub refresh_calls: AtomicUsize,
    pub list_calls: AtomicUsize,
    pub seen_tokens: Mutex<Vec<String>>,
    pub queries: Mutex<Vec<EventQuery>>,
    pub events_status: Mutex<Option<u16>>,
    pub refresh_fails: Mutex<bool>,
}

impl FakeGoogle {
    pub fn push_event(&self, id: &str, summary: &str, status: &str) {
        self.items.lock().unwrap().push(json!({
            "id": id,
            "summary": summary,
            "status": status,
            "start": { "dateTime": "2026-04-21T09:00:00Z" },
            "end": { "dateTime": "2026-04-21T10:00:00Z" },
            "location": "Kuala Lumpur"
        }));
    }

    pub fn refresh_calls(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl OAuthProvider for FakeGoogle {
    fn authorization_url(&self, state: &str, login_hint: Option<&str>) -> String {
        format!(
            "https://accounts.example/auth?state={}&login_hint={}",
            state,
            login_hint.unwrap_or_default()
        )
    }

    async fn exchange_code(&self, code: &str) -> Result<TokenGrant, ProviderError> {
        if code == "bad-code" {
            return Err(ProviderError::http(400, "invalid_grant"));
        }
        Ok(TokenGrant {
            access_token: "granted-token".into(),
            // Providers skip the refresh token on repeat consent.
            refresh_token: (code != "repeat-consent").then(|| "granted-refresh".into()),
            expires_in: Some(3599),
            scope: Some("https://www.googleapis.com/auth/calendar.readonly".into()),
            token_type: Some("Bearer".into()),
        })
    }

    async fn refresh(&self, _refresh_token: &str) -> Result<TokenGrant, ProviderError> {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        if *self.refresh_fails.lock().unwrap() {
            return Err(ProviderError::http(400, "invalid_grant"));
        }
        Ok(TokenGrant {
            access_token: "refreshed-token".into(),
            refresh_token: None,
            expires_in: Some(3600),
            scope: None,
            token_type: None,
        })
    }
}

#[async_trait]
impl CalendarApi for FakeGoogle {
    async fn list_events(&self, access_token: &str, query: &EventQuery) -> Result<EventPage, ProviderError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        self.seen_tokens.lock().unwrap().push(access_token.to_string());
        self.queries.lock().unwrap().push(query.clone());
        if let Some(status) = *self.events_status.lock().unwrap() {
            return Err(ProviderError::http(status, "backend error"));
        }
        let mut items = self.items.lock().unwrap().clone();
        if let Some(max) = query.max_results {
            items.truncate(max as usize);
        }
        Ok(EventPage {
            items,
            next_page_token: None,
        })
    }
}

//=========================================================================================
// Wiring
//=========================================================================================

pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub google: Arc<FakeGoogle>,
    pub service: CalendarService,
    pub rules: RuleAdmin,
}

pub fn harness() -> Harness {
    let store = Arc::new(MemoryStore::default());
    let google = Arc::new(FakeGoogle::default());
    let rules = RuleAdmin::new(store.clone());
    let service = CalendarService::new(
        TokenRefresher::new(store.clone(), google.clone()),
        EventFetcher::new(google.clone()),
        rules.clone(),
        SyncWriter::new(store.clone()),
        store.clone(),
        CalendarSettings::default(),
    );
    Harness {
        store,
        google,
        service,
        rules,
    }
}
