//! Sessions: who is signed in, the upstream credential, and who owns them.
//!
//! The store owns every [`Session`]; everything else holds `Arc<Session>`
//! references and only reads them. A new sign-in produces a new reference, so
//! identity comparison (`Arc::ptr_eq`) is enough to notice a change.

pub mod augmenter;

use async_trait::async_trait;
use base64ct::{Base64UrlUnpadded, Encoding};
use rand::{RngCore, rngs::OsRng};
use serde::{Deserialize, Serialize};
use std::{
    collections::HashMap,
    fmt,
    sync::Arc,
    time::{SystemTime, UNIX_EPOCH},
};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::debug;
use utoipa::ToSchema;

pub use augmenter::{RequestAugmenter, attach_credential};

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub struct Principal {
    pub id: String,
    pub email: String,
}

#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub principal: Principal,
    access_token: String,
    pub expires_at_unix: i64,
}

impl Session {
    #[must_use]
    pub fn new(principal: Principal, access_token: impl Into<String>, expires_at_unix: i64) -> Self {
        Self {
            principal,
            access_token: access_token.into(),
            expires_at_unix,
        }
    }

    #[must_use]
    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    #[must_use]
    pub const fn is_expired_at(&self, now_unix: i64) -> bool {
        self.expires_at_unix <= now_unix
    }

    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(now_unix())
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("principal", &self.principal)
            .field("access_token", &"[REDACTED]")
            .field("expires_at_unix", &self.expires_at_unix)
            .finish()
    }
}

/// Seconds since the Unix epoch, saturating instead of failing on clock skew.
#[must_use]
pub fn now_unix() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| i64::try_from(elapsed.as_secs()).unwrap_or(i64::MAX))
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to generate session id: {0}")]
    Entropy(String),
    #[error("session store unavailable: {0}")]
    Unavailable(String),
}

/// Owner of established sessions, keyed by the opaque id in the cookie.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Stores the session and returns the id that names it.
    async fn insert(&self, session: Session) -> Result<String, StoreError>;

    /// Expired sessions are reported as absent.
    async fn load(&self, id: &str) -> Result<Option<Arc<Session>>, StoreError>;

    async fn remove(&self, id: &str) -> Result<(), StoreError>;
}

#[derive(Debug, Default)]
pub struct MemorySessionStore {
    sessions: RwLock<HashMap<String, Arc<Session>>>,
}

impl MemorySessionStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Drops every session expired at `now_unix` and returns how many went.
    pub async fn purge_expired_at(&self, now_unix: i64) -> usize {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, session| !session.is_expired_at(now_unix));
        before - sessions.len()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn insert(&self, session: Session) -> Result<String, StoreError> {
        let id = generate_session_id()?;
        let purged = self.purge_expired_at(now_unix()).await;
        if purged > 0 {
            debug!(purged, "purged expired sessions");
        }
        self.sessions
            .write()
            .await
            .insert(id.clone(), Arc::new(session));
        Ok(id)
    }

    async fn load(&self, id: &str) -> Result<Option<Arc<Session>>, StoreError> {
        let found = self.sessions.read().await.get(id).cloned();
        match found {
            Some(session) if session.is_expired() => {
                debug!("dropping expired session");
                self.sessions.write().await.remove(id);
                Ok(None)
            }
            other => Ok(other),
        }
    }

    async fn remove(&self, id: &str) -> Result<(), StoreError> {
        self.sessions.write().await.remove(id);
        Ok(())
    }
}

/// 32 random bytes, base64url without padding.
fn generate_session_id() -> Result<String, StoreError> {
    let mut bytes = [0u8; 32];
    OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(|err| StoreError::Entropy(err.to_string()))?;
    Ok(Base64UrlUnpadded::encode_string(&bytes))
}
