use crate::{
    api::{self, AppState, CookieConfig},
    auth::HttpAuthenticator,
    client::ApiClient,
    guard::{GuardConfig, RouteGuard},
    session::MemorySessionStore,
};
use anyhow::{Context, Result};
use std::{sync::Arc, time::Duration};
use tracing::{debug, info};

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub api_url: String,
    pub session_ttl_seconds: i64,
    pub cookie_secure: bool,
    pub locales: Vec<String>,
}

/// Execute the server action.
/// # Errors
/// Returns an error if the upstream API URL is invalid or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    let api = ApiClient::new(&args.api_url).context("invalid FRONTGATE_API_URL")?;
    debug!(api = %api.base_url(), "upstream API configured");

    let ttl = Duration::from_secs(u64::try_from(args.session_ttl_seconds).unwrap_or_default());
    let authenticator = HttpAuthenticator::new(api.clone(), ttl);

    let guard = RouteGuard::new(GuardConfig::new().with_locales(args.locales));
    let cookies = CookieConfig::new()
        .with_ttl_seconds(args.session_ttl_seconds)
        .with_secure(args.cookie_secure);

    let state = Arc::new(AppState::new(
        guard,
        Arc::new(MemorySessionStore::new()),
        Arc::new(authenticator),
        api,
        cookies,
    ));

    info!(
        port = args.port,
        secure_cookie = args.cookie_secure,
        "starting frontgate"
    );
    api::new(args.port, state).await
}
