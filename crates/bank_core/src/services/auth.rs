//! crates/bank_core/src/services/auth.rs
//!
//! Credential checks and cached sessions.
//!
//! Sessions live in the cache under `auth:session:<token>` with a sliding
//! expiration: every successful lookup pushes the expiry out again.

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error};
use uuid::Uuid;

use crate::domain::{normalize_document, Credentials, Session};
use crate::error::{ServiceError, ServiceResult};
use crate::ports::{AccountRepository, CacheStore, SecretHasher};
use crate::validation::validate;

/// How long a session survives without being used.
pub const SESSION_TTL: Duration = Duration::from_secs(60 * 60);

const SESSION_KEY_PREFIX: &str = "auth:session:";

fn session_cache_key(token: &str) -> String {
    format!("{SESSION_KEY_PREFIX}{token}")
}

#[derive(Clone)]
pub struct AuthService {
    accounts: Arc<dyn AccountRepository>,
    cache: Arc<dyn CacheStore>,
    hasher: Arc<dyn SecretHasher>,
    session_ttl: Duration,
}

impl AuthService {
    pub fn new(
        accounts: Arc<dyn AccountRepository>,
        cache: Arc<dyn CacheStore>,
        hasher: Arc<dyn SecretHasher>,
    ) -> Self {
        Self {
            accounts,
            cache,
            hasher,
            session_ttl: SESSION_TTL,
        }
    }

    pub fn with_session_ttl(mut self, ttl: Duration) -> Self {
        self.session_ttl = ttl;
        self
    }

    /// Checks credentials and opens a new session.
    ///
    /// An unknown document and a wrong secret both yield
    /// [`ServiceError::InvalidCredentials`].
    pub async fn auth(&self, credentials: Credentials) -> ServiceResult<Session> {
        validate(&credentials)?;
        let document = normalize_document(&credentials.document);

        let account = match self.accounts.get_by_id_or_document(&document).await {
            Ok(Some(account)) => account,
            Ok(None) => return Err(ServiceError::InvalidCredentials),
            Err(e) => {
                error!("Failed to load account for login: {:?}", e);
                return Err(ServiceError::CannotAuth);
            }
        };
        if !self
            .hasher
            .verify(&credentials.secret, &account.secret, &account.secret_salt)
        {
            return Err(ServiceError::InvalidCredentials);
        }

        let session = Session {
            token: Uuid::new_v4().to_string(),
            account: account.without_secret(),
            created_at: Utc::now(),
        };
        let payload = serde_json::to_string(&session).map_err(|e| {
            error!("Failed to encode session: {:?}", e);
            ServiceError::CannotAuth
        })?;
        self.cache
            .set(&session_cache_key(&session.token), &payload, self.session_ttl)
            .await
            .map_err(|e| {
                error!("Failed to store session: {:?}", e);
                ServiceError::CannotAuth
            })?;

        debug!(account_id = %session.account.id, "Session opened");
        Ok(session)
    }

    /// Resolves a token to its session and refreshes the session's expiry.
    pub async fn get_session_by_token(&self, token: &str) -> ServiceResult<Session> {
        let payload = self
            .cache
            .get_updating(&session_cache_key(token), self.session_ttl)
            .await
            .map_err(|e| {
                if e.is_missing() {
                    return ServiceError::SessionNotFound;
                }
                error!("Failed to read session: {:?}", e);
                ServiceError::CannotGetSession
            })?;

        serde_json::from_str(&payload).map_err(|e| {
            error!("Failed to decode cached session: {:?}", e);
            ServiceError::CannotGetSession
        })
    }
}
