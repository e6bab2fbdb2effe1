//! HTTP server: routes, middleware stack and the listener loop.
//!
//! Every route sits behind [`middleware::guard_routes`], which performs the one
//! session lookup per request and answers guard redirects before handlers run.

use anyhow::Result;
use axum::{
    Extension, Router,
    body::Body,
    extract::MatchedPath,
    http::{HeaderName, HeaderValue, Request},
    middleware::from_fn,
    routing::{any, get, options},
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    request_id::PropagateRequestIdLayer, set_header::SetRequestHeaderLayer, trace::TraceLayer,
};
use tracing::{Span, info, info_span};
use ulid::Ulid;
use utoipa_axum::router::OpenApiRouter;

pub mod handlers;
pub mod middleware;
mod openapi;
pub mod state;

#[cfg(test)]
mod tests;

pub use openapi::openapi;
pub use state::{AppState, CookieConfig};

use handlers::{apps, health, proxy, root};

#[must_use]
pub fn router() -> OpenApiRouter {
    openapi::api_router()
}

/// The complete application with its middleware stack.
pub fn app(state: Arc<AppState>) -> Router {
    let (router, _openapi) = router().split_for_parts();
    router
        .route("/", get(root::root))
        .route("/health", options(health::health))
        .route("/apps/{*rest}", get(apps::apps))
        .route("/dashboard", get(apps::apps))
        .route("/api/{*path}", any(proxy::proxy))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestHeaderLayer::if_not_present(
                    HeaderName::from_static("x-request-id"),
                    |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
                ))
                .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                    "x-request-id",
                )))
                .layer(TraceLayer::new_for_http().make_span_with(make_span))
                .layer(Extension(state))
                .layer(from_fn(middleware::guard_routes)),
        )
}

/// Serves until Ctrl-C.
///
/// # Errors
/// Returns an error if the port cannot be bound or the server fails.
pub async fn new(port: u16, state: Arc<AppState>) -> Result<()> {
    let app = app(state);

    let listener = TcpListener::bind(format!("::0:{port}")).await?;

    info!("Listening on [::]:{}", port);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Gracefully shutdown");
        })
        .await?;

    Ok(())
}

fn make_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");
    let matched_path = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path(), MatchedPath::as_str);

    info_span!(
        "http.request",
        http.method = %request.method(),
        http.route = matched_path,
        request_id
    )
}
