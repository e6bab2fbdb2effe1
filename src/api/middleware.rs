//! Route guard middleware and the session extractor built on it.

use axum::{
    extract::{Extension, FromRequestParts, Request},
    http::{HeaderMap, request::Parts},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use std::sync::Arc;
use tracing::debug;

use super::handlers::session::extract_session_id;
use super::state::AppState;
use crate::error::AppError;
use crate::guard::GuardDecision;
use crate::session::{Session, StoreError};

/// The session resolved by [`guard_routes`] for this request.
#[derive(Clone, Debug)]
pub struct CurrentSession(pub Arc<Session>);

impl<S: Send + Sync> FromRequestParts<S> for CurrentSession {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Self>()
            .cloned()
            .ok_or_else(|| AppError::unauthorized("Sign in to continue."))
    }
}

/// Resolves the session named by the request cookie.
///
/// Returns `Ok(None)` when the cookie is missing or names no live session.
///
/// # Errors
/// Returns the store error when the lookup itself fails.
pub async fn current_session(
    state: &AppState,
    headers: &HeaderMap,
) -> Result<Option<Arc<Session>>, StoreError> {
    let Some(id) = extract_session_id(headers) else {
        return Ok(None);
    };
    state.sessions().load(&id).await
}

/// Looks the session up once, redirects when the guard says so, and otherwise
/// leaves the session in the request extensions for handlers.
pub async fn guard_routes(
    Extension(state): Extension<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();
    if state.guard().bypasses(&path) {
        return next.run(request).await;
    }

    let lookup = current_session(&state, request.headers()).await;
    match state.guard().evaluate_lookup(&path, &lookup) {
        GuardDecision::RedirectTo(target) => {
            debug!(from = %path, to = %target, "guard redirect");
            Redirect::temporary(&target).into_response()
        }
        GuardDecision::Allow => {
            if let Ok(Some(session)) = lookup {
                request.extensions_mut().insert(CurrentSession(session));
            }
            next.run(request).await
        }
    }
}
