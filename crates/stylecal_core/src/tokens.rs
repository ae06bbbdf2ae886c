//! crates/stylecal_core/src/tokens.rs
//!
//! OAuth credential lifecycle: creation from the first grant and proactive
//! refresh before expiry.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::domain::{Credential, GOOGLE_CALENDAR_PROVIDER};
use crate::error::CalendarError;
use crate::ports::{CredentialStore, OAuthProvider};

/// Seconds before expiry at which a token is already treated as expired.
pub const REFRESH_SKEW_SECS: i64 = 60;

/// Freshness of a stored access token at a given instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenState {
    /// Usable as-is.
    Fresh,
    /// Expired or within the skew buffer of expiring.
    Expiring,
    /// No access token was ever stored.
    Missing,
}

pub fn token_state(credential: &Credential, now: DateTime<Utc>) -> TokenState {
    if credential.access_token.trim().is_empty() {
        return TokenState::Missing;
    }
    match credential.expires_at {
        Some(expires_at) if expires_at - now.timestamp() <= REFRESH_SKEW_SECS => TokenState::Expiring,
        // Tokens without a known expiry are used until the provider says otherwise.
        _ => TokenState::Fresh,
    }
}

/// How the returned token was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    NotNeeded,
    Refreshed,
    /// Refreshed upstream, but writing the new token set back failed.
    RefreshedUnpersisted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidToken {
    pub access_token: String,
    pub outcome: RefreshOutcome,
}

/// Hands out valid access tokens, refreshing through the provider when needed.
///
/// Two concurrent refreshes for the same user are tolerated: both write an
/// equally valid token set and the last write wins.
#[derive(Clone)]
pub struct TokenRefresher {
    credentials: Arc<dyn CredentialStore>,
    oauth: Arc<dyn OAuthProvider>,
    provider: String,
}

impl TokenRefresher {
    pub fn new(credentials: Arc<dyn CredentialStore>, oauth: Arc<dyn OAuthProvider>) -> Self {
        Self {
            credentials,
            oauth,
            provider: GOOGLE_CALENDAR_PROVIDER.to_string(),
        }
    }

    pub fn authorization_url(&self, state: &str, login_hint: Option<&str>) -> String {
        self.oauth.authorization_url(state, login_hint)
    }

    /// Exchanges an authorization code and stores the resulting credential.
    pub async fn connect(
        &self,
        user_id: Uuid,
        code: &str,
        now: DateTime<Utc>,
    ) -> Result<Credential, CalendarError> {
        let grant = self
            .oauth
            .exchange_code(code)
            .await
            .map_err(CalendarError::GrantFailed)?;
        let mut credential = Credential::from_grant(user_id, &self.provider, grant, now);
        if credential.refresh_token.is_none() {
            // Re-consent may omit the refresh token; the old one stays valid.
            credential.refresh_token = self
                .credentials
                .get_credential(user_id, &self.provider)
                .await?
                .and_then(|existing| existing.refresh_token);
        }
        self.credentials.save_credential(&credential).await?;
        info!("Stored {} credential for user {}", self.provider, user_id);
        Ok(credential)
    }

    /// Loads the user's credential and returns a valid access token for it.
    pub async fn access_token_for(
        &self,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<ValidToken, CalendarError> {
        let credential = self
            .credentials
            .get_credential(user_id, &self.provider)
            .await?
            .ok_or(CalendarError::NotConnected)?;
        self.ensure_valid_token(&credential, now).await
    }

    /// Returns a usable access token, performing at most one refresh call.
    ///
    /// The returned token is authoritative for the current call even if the
    /// refreshed credential could not be written back.
    pub async fn ensure_valid_token(
        &self,
        credential: &Credential,
        now: DateTime<Utc>,
    ) -> Result<ValidToken, CalendarError> {
        if token_state(credential, now) == TokenState::Fresh {
            return Ok(ValidToken {
                access_token: credential.access_token.clone(),
                outcome: RefreshOutcome::NotNeeded,
            });
        }

        let Some(refresh_token) = credential.refresh_token.as_deref() else {
            return Err(CalendarError::NotConnected);
        };

        let grant = self.oauth.refresh(refresh_token).await.map_err(|e| {
            warn!("Token refresh failed for user {}: {}", credential.user_id, e);
            CalendarError::RefreshFailed(e)
        })?;

        let updated = credential.refreshed_with(grant, now);
        let outcome = match self.credentials.save_credential(&updated).await {
            Ok(()) => {
                info!("Refreshed access token for user {}", credential.user_id);
                RefreshOutcome::Refreshed
            }
            Err(e) => {
                error!(
                    "Refreshed access token for user {} but failed to persist it: {}",
                    credential.user_id, e
                );
                RefreshOutcome::RefreshedUnpersisted
            }
        };

        Ok(ValidToken {
            access_token: updated.access_token,
            outcome,
        })
    }
}
