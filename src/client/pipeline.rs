//! Request interceptors shared by every call an [`ApiClient`](super::ApiClient) makes.
//!
//! Hooks run in registration order. A request that failed to build travels
//! through each hook's error callback instead of its request callback, so a
//! hook can observe or rewrite failures without ever seeing a half-built
//! request.

use reqwest::{Method, header::HeaderMap};
use std::fmt;
use std::sync::{
    Arc, Mutex, PoisonError,
    atomic::{AtomicU64, Ordering},
};
use tracing::trace;

use super::errors::ApiError;

/// A request before it is handed to the HTTP connection pool.
#[derive(Clone, Debug)]
pub struct OutboundRequest {
    pub method: Method,
    pub url: String,
    pub headers: HeaderMap,
    pub body: Option<Vec<u8>>,
}

impl OutboundRequest {
    #[must_use]
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: HeaderMap::new(),
            body: None,
        }
    }
}

pub type OnRequest =
    Arc<dyn Fn(OutboundRequest) -> Result<OutboundRequest, ApiError> + Send + Sync>;
pub type OnError = Arc<dyn Fn(ApiError) -> ApiError + Send + Sync>;

/// Identifies one registration so it can be removed later.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct HookHandle(u64);

/// Anything that accepts request/error hook pairs.
pub trait RequestPipeline: Send + Sync {
    fn register_request_hook(&self, on_request: OnRequest, on_error: OnError) -> HookHandle;

    /// Returns `false` when the handle was already gone.
    fn deregister_request_hook(&self, handle: HookHandle) -> bool;
}

#[derive(Clone)]
struct Hook {
    handle: HookHandle,
    on_request: OnRequest,
    on_error: OnError,
}

#[derive(Default)]
pub struct Interceptors {
    next: AtomicU64,
    hooks: Mutex<Vec<Hook>>,
}

impl Interceptors {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Runs every registered hook over `request`.
    ///
    /// # Errors
    /// Returns the error produced by the last hook in the chain, or the
    /// original error when no hook is registered.
    pub fn apply(
        &self,
        request: Result<OutboundRequest, ApiError>,
    ) -> Result<OutboundRequest, ApiError> {
        // Hooks may register or deregister from inside a callback.
        let hooks: Vec<Hook> = self.lock().clone();
        trace!(hooks = hooks.len(), "applying request hooks");

        hooks.iter().fold(request, |acc, hook| match acc {
            Ok(request) => (hook.on_request)(request),
            Err(err) => Err((hook.on_error)(err)),
        })
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Hook>> {
        self.hooks.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl RequestPipeline for Interceptors {
    fn register_request_hook(&self, on_request: OnRequest, on_error: OnError) -> HookHandle {
        let handle = HookHandle(self.next.fetch_add(1, Ordering::Relaxed));
        self.lock().push(Hook {
            handle,
            on_request,
            on_error,
        });
        handle
    }

    fn deregister_request_hook(&self, handle: HookHandle) -> bool {
        let mut hooks = self.lock();
        let before = hooks.len();
        hooks.retain(|hook| hook.handle != handle);
        hooks.len() != before
    }
}

impl fmt::Debug for Interceptors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Interceptors")
            .field("hooks", &self.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{Context, Result};
    use reqwest::header::HeaderValue;

    fn tag(value: &'static str) -> OnRequest {
        Arc::new(move |mut request: OutboundRequest| -> Result<OutboundRequest, ApiError> {
            request
                .headers
                .append("x-order", HeaderValue::from_static(value));
            Ok(request)
        })
    }

    fn passthrough() -> OnError {
        Arc::new(|err: ApiError| err)
    }

    #[test]
    fn hooks_run_in_registration_order() -> Result<()> {
        let pipeline = Interceptors::new();
        pipeline.register_request_hook(tag("first"), passthrough());
        pipeline.register_request_hook(tag("second"), passthrough());

        let request = pipeline.apply(Ok(OutboundRequest::new(Method::GET, "http://x/")))?;
        let order: Vec<&str> = request
            .headers
            .get_all("x-order")
            .iter()
            .filter_map(|v| v.to_str().ok())
            .collect();
        assert_eq!(order, vec!["first", "second"]);
        Ok(())
    }

    #[test]
    fn deregistered_hooks_stop_running() -> Result<()> {
        let pipeline = Interceptors::new();
        let handle = pipeline.register_request_hook(tag("gone"), passthrough());
        assert!(pipeline.deregister_request_hook(handle));
        assert!(!pipeline.deregister_request_hook(handle));
        assert!(pipeline.is_empty());

        let request = pipeline.apply(Ok(OutboundRequest::new(Method::GET, "http://x/")))?;
        assert!(request.headers.get("x-order").is_none());
        Ok(())
    }

    #[test]
    fn build_failures_go_through_error_hooks() -> Result<()> {
        let pipeline = Interceptors::new();
        pipeline.register_request_hook(
            Arc::new(|_: OutboundRequest| -> Result<OutboundRequest, ApiError> {
                Err(ApiError::Config("should not run".to_string()))
            }),
            Arc::new(|err: ApiError| ApiError::Network(format!("wrapped: {err}"))),
        );

        let err = pipeline
            .apply(Err(ApiError::Serialization("bad body".to_string())))
            .err()
            .context("expected an error")?;
        assert_eq!(
            err,
            ApiError::Network("wrapped: Request error: bad body".to_string())
        );
        Ok(())
    }
}
