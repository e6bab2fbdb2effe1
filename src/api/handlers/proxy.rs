//! Authenticated pass-through to the upstream API.
//!
//! Each request gets a forked client whose only interceptor is a
//! [`RequestAugmenter`] bound to the caller's session. Caller-supplied
//! `Authorization` and `Cookie` headers are never forwarded.

use axum::{
    body::{Body, Bytes},
    extract::{Extension, Path},
    http::{
        HeaderMap, Method, Uri,
        header::{ACCEPT, ACCEPT_LANGUAGE, CONTENT_TYPE},
    },
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use tracing::{debug, instrument, warn};

use crate::api::{middleware::current_session, state::AppState};
use crate::error::AppError;
use crate::session::RequestAugmenter;

#[instrument(skip_all, fields(path = %path))]
pub async fn proxy(
    state: Extension<Arc<AppState>>,
    Path(path): Path<String>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let session = current_session(&state, &headers).await.unwrap_or_else(|err| {
        warn!("Session lookup failed, forwarding without credentials: {err}");
        None
    });

    let client = state.api().fork();
    let mut augmenter = RequestAugmenter::new(client.interceptors());
    augmenter.observe(session);

    let mut target = format!("/{}", path.trim_start_matches('/'));
    if let Some(query) = uri.query() {
        target.push('?');
        target.push_str(query);
    }

    let mut request = client.prepare(method, &target);
    for name in [ACCEPT, ACCEPT_LANGUAGE, CONTENT_TYPE] {
        if let Some(value) = headers.get(&name) {
            request.headers.insert(name, value.clone());
        }
    }
    if !body.is_empty() {
        request.body = Some(body.to_vec());
    }

    let response = match client.execute(Ok(request)).await {
        Ok(response) => response,
        Err(err) => {
            warn!("Upstream request failed: {err}");
            return AppError::from(&err).into_response();
        }
    };
    augmenter.deactivate();

    relay(response).await
}

async fn relay(response: reqwest::Response) -> Response {
    let status = response.status();
    let content_type = response.headers().get(CONTENT_TYPE).cloned();
    debug!(%status, "upstream responded");

    let bytes = match response.bytes().await {
        Ok(bytes) => bytes,
        Err(err) => {
            warn!("Failed to read upstream body: {err}");
            return AppError::bad_gateway("The upstream API is unavailable.").into_response();
        }
    };

    let mut relayed = Response::new(Body::from(bytes));
    *relayed.status_mut() = status;
    if let Some(content_type) = content_type {
        relayed.headers_mut().insert(CONTENT_TYPE, content_type);
    }
    relayed
}
