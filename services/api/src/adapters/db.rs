//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, the concrete implementation of
//! the storage ports from the `core` crate. It handles all interactions with
//! the PostgreSQL database using `sqlx`.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::{FromRow, PgPool};
use stylecal_core::domain::{
    AuthSession, Category, Credential, EventUpsert, JobLease, Keyword, Product, Rule,
    RuleWithKeywords, SyncedEvent, User, UserCredentials,
};
use stylecal_core::ports::{
    AccountStore, CatalogStore, CredentialStore, EventStore, LeaseStore, PortError, PortResult,
    RuleStore,
};
use uuid::Uuid;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements every storage port.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }
}

fn unexpected(e: sqlx::Error) -> PortError {
    PortError::Unexpected(e.to_string())
}

fn is_unique_violation(e: &sqlx::Error) -> bool {
    e.as_database_error().is_some_and(|d| d.is_unique_violation())
}

fn parse_category(raw: &str) -> PortResult<Category> {
    raw.parse::<Category>()
        .map_err(|e| PortError::Unexpected(format!("corrupt category column: {e}")))
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct UserRecord {
    user_id: Uuid,
    email: Option<String>,
}
impl UserRecord {
    fn to_domain(self) -> User {
        User {
            user_id: self.user_id,
            email: self.email,
        }
    }
}

#[derive(FromRow)]
struct UserCredentialsRecord {
    user_id: Uuid,
    email: String,
    hashed_password: String,
}

#[derive(FromRow)]
struct AuthSessionRecord {
    id: String,
    user_id: Uuid,
    expires_at: DateTime<Utc>,
}

#[derive(FromRow)]
struct CredentialRecord {
    user_id: Uuid,
    provider: String,
    access_token: String,
    refresh_token: Option<String>,
    expires_at: Option<i64>,
    scope: Option<String>,
    token_type: Option<String>,
}
impl CredentialRecord {
    fn to_domain(self) -> Credential {
        Credential {
            user_id: self.user_id,
            provider: self.provider,
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expires_at: self.expires_at,
            scope: self.scope,
            token_type: self.token_type,
        }
    }
}

#[derive(FromRow)]
struct SyncedEventRecord {
    id: Uuid,
    user_id: Uuid,
    external_event_id: String,
    title: String,
    description: String,
    start_time: Option<DateTime<Utc>>,
    end_time: Option<DateTime<Utc>>,
    location: Option<String>,
    occasion_label: Option<String>,
    raw_payload: Value,
    updated_at: DateTime<Utc>,
}
impl SyncedEventRecord {
    fn to_domain(self) -> PortResult<SyncedEvent> {
        Ok(SyncedEvent {
            id: self.id,
            user_id: self.user_id,
            external_event_id: self.external_event_id,
            title: self.title,
            description: self.description,
            start_time: self.start_time,
            end_time: self.end_time,
            location: self.location,
            occasion_label: self.occasion_label.as_deref().map(parse_category).transpose()?,
            raw_payload: self.raw_payload,
            updated_at: self.updated_at,
        })
    }
}

#[derive(FromRow)]
struct RuleRecord {
    id: Uuid,
    name: String,
    target_category: String,
    priority: i32,
    enabled: bool,
    created_at: DateTime<Utc>,
}
impl RuleRecord {
    fn to_domain(self) -> PortResult<Rule> {
        Ok(Rule {
            id: self.id,
            name: self.name,
            target_category: parse_category(&self.target_category)?,
            priority: self.priority,
            enabled: self.enabled,
            created_at: self.created_at,
        })
    }
}

#[derive(FromRow)]
struct KeywordRecord {
    id: Uuid,
    rule_id: Uuid,
    keyword: String,
    enabled: bool,
    created_at: DateTime<Utc>,
}
impl KeywordRecord {
    fn to_domain(self) -> Keyword {
        Keyword {
            id: self.id,
            rule_id: self.rule_id,
            keyword: self.keyword,
            enabled: self.enabled,
            created_at: self.created_at,
        }
    }
}

#[derive(FromRow)]
struct OwnedKeywordRecord {
    #[sqlx(flatten)]
    keyword: KeywordRecord,
    target_category: String,
}

#[derive(FromRow)]
struct ProductRecord {
    id: i64,
    brand: Option<String>,
    category: Option<String>,
    is_fashion: Option<bool>,
    name: Option<String>,
    image: Option<String>,
    url: String,
}
impl ProductRecord {
    fn to_domain(self) -> Product {
        Product {
            id: self.id,
            brand: self.brand,
            category: self.category,
            is_fashion: self.is_fashion,
            name: self.name,
            image: self.image,
            url: self.url,
        }
    }
}

const SYNCED_EVENT_COLUMNS: &str = "id, user_id, external_event_id, title, description, start_time, \
     end_time, location, occasion_label, raw_payload, updated_at";

const KEYWORD_COLUMNS: &str = "id, rule_id, keyword, enabled, created_at";

//=========================================================================================
// `AccountStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl AccountStore for DbAdapter {
    async fn create_user_with_email(&self, email: &str, hashed_password: &str) -> PortResult<User> {
        let record = sqlx::query_as::<_, UserRecord>(
            "INSERT INTO users (email, hashed_password) VALUES ($1, $2) RETURNING user_id, email",
        )
        .bind(email)
        .bind(hashed_password)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                PortError::Conflict(format!("Email {} is already registered", email))
            } else {
                unexpected(e)
            }
        })?;
        Ok(record.to_domain())
    }

    async fn get_user_by_id(&self, user_id: Uuid) -> PortResult<User> {
        let record = sqlx::query_as::<_, UserRecord>("SELECT user_id, email FROM users WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| match e {
                sqlx::Error::RowNotFound => PortError::NotFound(format!("User {} not found", user_id)),
                _ => unexpected(e),
            })?;
        Ok(record.to_domain())
    }

    async fn get_user_by_email(&self, email: &str) -> PortResult<UserCredentials> {
        let record = sqlx::query_as::<_, UserCredentialsRecord>(
            "SELECT user_id, email, hashed_password FROM users \
             WHERE email = $1 AND hashed_password IS NOT NULL",
        )
        .bind(email)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => PortError::NotFound(format!("User {} not found", email)),
            _ => unexpected(e),
        })?;
        Ok(UserCredentials {
            user_id: record.user_id,
            email: record.email,
            hashed_password: record.hashed_password,
        })
    }

    async fn create_auth_session(
        &self,
        session_id: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()> {
        sqlx::query("INSERT INTO auth_sessions (id, user_id, expires_at) VALUES ($1, $2, $3)")
            .bind(session_id)
            .bind(user_id)
            .bind(expires_at)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }

    async fn validate_auth_session(&self, session_id: &str) -> PortResult<AuthSession> {
        let record = sqlx::query_as::<_, AuthSessionRecord>(
            "SELECT id, user_id, expires_at FROM auth_sessions WHERE id = $1 AND expires_at > NOW()",
        )
        .bind(session_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => PortError::Unauthorized,
            _ => unexpected(e),
        })?;
        Ok(AuthSession {
            id: record.id,
            user_id: record.user_id,
            expires_at: record.expires_at,
        })
    }

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()> {
        sqlx::query("DELETE FROM auth_sessions WHERE id = $1")
            .bind(session_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }
}

//=========================================================================================
// `CredentialStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl CredentialStore for DbAdapter {
    async fn get_credential(&self, user_id: Uuid, provider: &str) -> PortResult<Option<Credential>> {
        let record = sqlx::query_as::<_, CredentialRecord>(
            "SELECT user_id, provider, access_token, refresh_token, expires_at, scope, token_type \
             FROM credentials WHERE user_id = $1 AND provider = $2",
        )
        .bind(user_id)
        .bind(provider)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(record.map(CredentialRecord::to_domain))
    }

    async fn save_credential(&self, credential: &Credential) -> PortResult<()> {
        sqlx::query(
            "INSERT INTO credentials \
                 (user_id, provider, access_token, refresh_token, expires_at, scope, token_type) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             ON CONFLICT (user_id, provider) DO UPDATE SET \
                 access_token = EXCLUDED.access_token, \
                 refresh_token = COALESCE(EXCLUDED.refresh_token, credentials.refresh_token), \
                 expires_at = EXCLUDED.expires_at, \
                 scope = EXCLUDED.scope, \
                 token_type = EXCLUDED.token_type, \
                 updated_at = NOW()",
        )
        .bind(credential.user_id)
        .bind(&credential.provider)
        .bind(&credential.access_token)
        .bind(&credential.refresh_token)
        .bind(credential.expires_at)
        .bind(&credential.scope)
        .bind(&credential.token_type)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(())
    }
}

//=========================================================================================
// `EventStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl EventStore for DbAdapter {
    async fn upsert_event(&self, event: &EventUpsert) -> PortResult<SyncedEvent> {
        let sql = format!(
            "INSERT INTO synced_events \
                 (user_id, external_event_id, title, description, start_time, end_time, \
                  location, occasion_label, raw_payload) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
             ON CONFLICT (user_id, external_event_id) DO UPDATE SET \
                 title = EXCLUDED.title, \
                 description = EXCLUDED.description, \
                 start_time = EXCLUDED.start_time, \
                 end_time = EXCLUDED.end_time, \
                 location = EXCLUDED.location, \
                 occasion_label = EXCLUDED.occasion_label, \
                 raw_payload = EXCLUDED.raw_payload, \
                 updated_at = NOW() \
             RETURNING {SYNCED_EVENT_COLUMNS}"
        );
        let record = sqlx::query_as::<_, SyncedEventRecord>(&sql)
            .bind(event.user_id)
            .bind(&event.external_event_id)
            .bind(&event.title)
            .bind(&event.description)
            .bind(event.start_time)
            .bind(event.end_time)
            .bind(&event.location)
            .bind(event.occasion_label.map(|c| c.as_str()))
            .bind(&event.raw_payload)
            .fetch_one(&self.pool)
            .await
            .map_err(unexpected)?;
        record.to_domain()
    }

    async fn list_events_for_user(&self, user_id: Uuid) -> PortResult<Vec<SyncedEvent>> {
        let sql = format!(
            "SELECT {SYNCED_EVENT_COLUMNS} FROM synced_events WHERE user_id = $1 \
             ORDER BY start_time ASC NULLS LAST, external_event_id ASC"
        );
        let records = sqlx::query_as::<_, SyncedEventRecord>(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await
            .map_err(unexpected)?;
        records.into_iter().map(SyncedEventRecord::to_domain).collect()
    }
}

//=========================================================================================
// `RuleStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl RuleStore for DbAdapter {
    async fn list_rules(&self) -> PortResult<Vec<RuleWithKeywords>> {
        let rules = sqlx::query_as::<_, RuleRecord>(
            "SELECT id, name, target_category, priority, enabled, created_at FROM event_rules",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;

        let keywords = sqlx::query_as::<_, KeywordRecord>(&format!(
            "SELECT {KEYWORD_COLUMNS} FROM event_keywords ORDER BY created_at ASC, keyword ASC"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;

        let mut by_rule: HashMap<Uuid, Vec<Keyword>> = HashMap::new();
        for record in keywords {
            by_rule.entry(record.rule_id).or_default().push(record.to_domain());
        }

        rules
            .into_iter()
            .map(|record| {
                let rule = record.to_domain()?;
                Ok(RuleWithKeywords {
                    keywords: by_rule.remove(&rule.id).unwrap_or_default(),
                    rule,
                })
            })
            .collect()
    }

    async fn find_keyword(&self, keyword: &str) -> PortResult<Option<(Keyword, Category)>> {
        let record = sqlx::query_as::<_, OwnedKeywordRecord>(
            "SELECT k.id, k.rule_id, k.keyword, k.enabled, k.created_at, r.target_category \
             FROM event_keywords k JOIN event_rules r ON r.id = k.rule_id \
             WHERE k.keyword = $1",
        )
        .bind(keyword)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;

        record
            .map(|r| Ok((r.keyword.to_domain(), parse_category(&r.target_category)?)))
            .transpose()
    }

    async fn ensure_rule(&self, category: Category) -> PortResult<Rule> {
        let record = sqlx::query_as::<_, RuleRecord>(
            "INSERT INTO event_rules (name, target_category, priority) VALUES ($1, $2, $3) \
             ON CONFLICT (target_category) DO UPDATE SET enabled = TRUE \
             RETURNING id, name, target_category, priority, enabled, created_at",
        )
        .bind(category.rule_name())
        .bind(category.as_str())
        .bind(category.default_priority())
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;
        record.to_domain()
    }

    async fn insert_keyword(&self, rule_id: Uuid, keyword: &str) -> PortResult<Keyword> {
        let record = sqlx::query_as::<_, KeywordRecord>(&format!(
            "INSERT INTO event_keywords (rule_id, keyword) VALUES ($1, $2) RETURNING {KEYWORD_COLUMNS}"
        ))
        .bind(rule_id)
        .bind(keyword)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                PortError::Conflict(keyword.to_string())
            } else {
                unexpected(e)
            }
        })?;
        Ok(record.to_domain())
    }

    async fn set_keyword_enabled(&self, keyword_id: Uuid, enabled: bool) -> PortResult<Keyword> {
        let record = sqlx::query_as::<_, KeywordRecord>(&format!(
            "UPDATE event_keywords SET enabled = $2 WHERE id = $1 RETURNING {KEYWORD_COLUMNS}"
        ))
        .bind(keyword_id)
        .bind(enabled)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => PortError::NotFound(format!("Keyword {} not found", keyword_id)),
            _ => unexpected(e),
        })?;
        Ok(record.to_domain())
    }
}

//=========================================================================================
// `CatalogStore` and `LeaseStore` Trait Implementations
//=========================================================================================

#[async_trait]
impl CatalogStore for DbAdapter {
    async fn list_products(&self) -> PortResult<Vec<Product>> {
        let records = sqlx::query_as::<_, ProductRecord>(
            "SELECT id, brand, category, is_fashion, name, image, url FROM products ORDER BY id ASC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(records.into_iter().map(ProductRecord::to_domain).collect())
    }
}

#[async_trait]
impl LeaseStore for DbAdapter {
    async fn try_acquire(&self, lease: &JobLease, now: DateTime<Utc>) -> PortResult<bool> {
        // The update branch only fires for an expired lease.
        let result = sqlx::query(
            "INSERT INTO job_leases (job_key, holder, expires_at) VALUES ($1, $2, $3) \
             ON CONFLICT (job_key) DO UPDATE SET \
                 holder = EXCLUDED.holder, expires_at = EXCLUDED.expires_at \
             WHERE job_leases.expires_at <= $4",
        )
        .bind(&lease.job_key)
        .bind(&lease.holder)
        .bind(lease.expires_at)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(result.rows_affected() == 1)
    }

    async fn renew(&self, job_key: &str, holder: &str, expires_at: DateTime<Utc>) -> PortResult<bool> {
        let result = sqlx::query("UPDATE job_leases SET expires_at = $3 WHERE job_key = $1 AND holder = $2")
            .bind(job_key)
            .bind(holder)
            .bind(expires_at)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(result.rows_affected() == 1)
    }

    async fn release(&self, job_key: &str, holder: &str) -> PortResult<()> {
        sqlx::query("DELETE FROM job_leases WHERE job_key = $1 AND holder = $2")
            .bind(job_key)
            .bind(holder)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }
}
