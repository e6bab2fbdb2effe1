//! Bearer credential injection that tracks the current session.
//!
//! A [`RequestAugmenter`] keeps exactly one registration in its pipeline. The
//! hook captures the session it was registered for, so requests sent after a
//! sign-out or token rotation never carry a stale credential.

use reqwest::header::{AUTHORIZATION, HeaderValue};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, warn};

use super::Session;
use crate::client::{
    ApiError, HookHandle, Interceptors, OnError, OnRequest, OutboundRequest, RequestPipeline,
};

/// Sets `Authorization: Bearer <token>` when the session carries a token.
/// Requests are returned untouched otherwise.
#[must_use]
pub fn attach_credential(session: Option<&Session>, mut request: OutboundRequest) -> OutboundRequest {
    let Some(token) = session
        .map(Session::access_token)
        .filter(|token| !token.is_empty())
    else {
        return request;
    };

    match HeaderValue::from_str(&format!("Bearer {token}")) {
        Ok(mut value) => {
            value.set_sensitive(true);
            request.headers.insert(AUTHORIZATION, value);
        }
        Err(err) => warn!("Session token is not a valid header value: {err}"),
    }
    request
}

struct Registration {
    handle: HookHandle,
    session: Option<Arc<Session>>,
}

pub struct RequestAugmenter<P: RequestPipeline + ?Sized = Interceptors> {
    pipeline: Arc<P>,
    current: Option<Registration>,
}

impl<P: RequestPipeline + ?Sized> RequestAugmenter<P> {
    /// Nothing is registered until the first [`observe`](Self::observe).
    #[must_use]
    pub fn new(pipeline: Arc<P>) -> Self {
        Self {
            pipeline,
            current: None,
        }
    }

    /// Re-registers when `session` is a different reference from the one the
    /// live hook captured. The same reference again is a no-op.
    pub fn observe(&mut self, session: Option<Arc<Session>>) {
        if let Some(current) = &self.current
            && same_reference(current.session.as_ref(), session.as_ref())
        {
            return;
        }

        self.deactivate();

        let captured = session.clone();
        let on_request: OnRequest =
            Arc::new(move |request: OutboundRequest| -> Result<OutboundRequest, ApiError> {
                Ok(attach_credential(captured.as_deref(), request))
            });
        let on_error: OnError = Arc::new(|err: ApiError| err);

        let handle = self.pipeline.register_request_hook(on_request, on_error);
        debug!(
            authenticated = session.is_some(),
            "registered credential hook"
        );
        self.current = Some(Registration { handle, session });
    }

    /// Removes the live registration, if any.
    pub fn deactivate(&mut self) {
        if let Some(registration) = self.current.take() {
            self.pipeline.deregister_request_hook(registration.handle);
        }
    }

    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.current.is_some()
    }

    #[must_use]
    pub fn handle(&self) -> Option<HookHandle> {
        self.current.as_ref().map(|registration| registration.handle)
    }

    /// Observes every value published on `sessions` until the sender is
    /// dropped, then deactivates.
    pub async fn follow(mut self, mut sessions: watch::Receiver<Option<Arc<Session>>>) {
        loop {
            let session = sessions.borrow_and_update().clone();
            self.observe(session);
            if sessions.changed().await.is_err() {
                break;
            }
        }
        self.deactivate();
    }
}

impl<P: RequestPipeline + ?Sized> Drop for RequestAugmenter<P> {
    fn drop(&mut self) {
        self.deactivate();
    }
}

fn same_reference(a: Option<&Arc<Session>>, b: Option<&Arc<Session>>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => Arc::ptr_eq(a, b),
        _ => false,
    }
}
