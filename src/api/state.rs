//! Shared server state handed to handlers through an `Extension` layer.

use std::sync::Arc;

use crate::auth::Authenticator;
use crate::client::ApiClient;
use crate::guard::RouteGuard;
use crate::session::SessionStore;

const DEFAULT_SESSION_TTL_SECONDS: i64 = 12 * 60 * 60;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CookieConfig {
    ttl_seconds: i64,
    secure: bool,
}

impl Default for CookieConfig {
    fn default() -> Self {
        Self {
            ttl_seconds: DEFAULT_SESSION_TTL_SECONDS,
            secure: false,
        }
    }
}

impl CookieConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub const fn with_ttl_seconds(mut self, seconds: i64) -> Self {
        self.ttl_seconds = seconds;
        self
    }

    /// Only set when the site is served over HTTPS.
    #[must_use]
    pub const fn with_secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    #[must_use]
    pub const fn ttl_seconds(&self) -> i64 {
        self.ttl_seconds
    }

    #[must_use]
    pub const fn secure(&self) -> bool {
        self.secure
    }
}

pub struct AppState {
    guard: RouteGuard,
    sessions: Arc<dyn SessionStore>,
    authenticator: Arc<dyn Authenticator>,
    api: ApiClient,
    cookies: CookieConfig,
}

impl AppState {
    #[must_use]
    pub fn new(
        guard: RouteGuard,
        sessions: Arc<dyn SessionStore>,
        authenticator: Arc<dyn Authenticator>,
        api: ApiClient,
        cookies: CookieConfig,
    ) -> Self {
        Self {
            guard,
            sessions,
            authenticator,
            api,
            cookies,
        }
    }

    #[must_use]
    pub const fn guard(&self) -> &RouteGuard {
        &self.guard
    }

    #[must_use]
    pub fn sessions(&self) -> &dyn SessionStore {
        self.sessions.as_ref()
    }

    #[must_use]
    pub fn authenticator(&self) -> Arc<dyn Authenticator> {
        Arc::clone(&self.authenticator)
    }

    #[must_use]
    pub const fn api(&self) -> &ApiClient {
        &self.api
    }

    #[must_use]
    pub const fn cookies(&self) -> &CookieConfig {
        &self.cookies
    }
}
