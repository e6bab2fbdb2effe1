//! Session cookie handling and sign-out.

use axum::{
    extract::Extension,
    http::{
        HeaderMap, HeaderValue, StatusCode,
        header::{COOKIE, InvalidHeaderValue, SET_COOKIE},
    },
    response::IntoResponse,
};
use std::sync::Arc;
use tracing::{debug, error};

use crate::api::state::{AppState, CookieConfig};

pub const SESSION_COOKIE_NAME: &str = "frontgate_session";

#[utoipa::path(
    post,
    path = "/auth/sign-out",
    responses(
        (status = 204, description = "Session cleared")
    ),
    tag = "auth"
)]
pub async fn sign_out(
    headers: HeaderMap,
    state: Extension<Arc<AppState>>,
) -> impl IntoResponse {
    if let Some(id) = extract_session_id(&headers) {
        if let Err(err) = state.sessions().remove(&id).await {
            error!("Failed to remove session: {err}");
        } else {
            debug!("session removed");
        }
    }

    // The cookie is cleared even when no session was found.
    let mut response_headers = HeaderMap::new();
    if let Ok(cookie) = clear_session_cookie(state.cookies()) {
        response_headers.insert(SET_COOKIE, cookie);
    }
    (StatusCode::NO_CONTENT, response_headers)
}

/// `HttpOnly` cookie naming the session id.
pub(crate) fn session_cookie(
    config: &CookieConfig,
    id: &str,
) -> Result<HeaderValue, InvalidHeaderValue> {
    let ttl_seconds = config.ttl_seconds();
    let mut cookie = format!(
        "{SESSION_COOKIE_NAME}={id}; Path=/; HttpOnly; SameSite=Lax; Max-Age={ttl_seconds}"
    );
    if config.secure() {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

pub(crate) fn clear_session_cookie(
    config: &CookieConfig,
) -> Result<HeaderValue, InvalidHeaderValue> {
    let mut cookie = format!("{SESSION_COOKIE_NAME}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0");
    if config.secure() {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

pub(crate) fn extract_session_id(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|header| header.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| key.trim() == SESSION_COOKIE_NAME)
        .map(|(_, value)| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
