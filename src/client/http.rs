//! JSON helpers over `reqwest` with one timeout policy and sanitized errors.
//!
//! Every request goes through the client's [`Interceptors`] before it is sent.
//! The helpers never store credentials; anything sensitive is attached by a
//! registered hook or by the caller.

use reqwest::{Method, Response, StatusCode, header::CONTENT_TYPE};
use serde::{Serialize, de::DeserializeOwned};
use std::{sync::Arc, time::Duration};
use tracing::{debug, instrument};
use url::Url;

use super::errors::ApiError;
use super::pipeline::{Interceptors, OutboundRequest};
use crate::APP_USER_AGENT;

/// Default request timeout applied to every call.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
/// Maximum number of error body characters surfaced to callers.
const MAX_ERROR_CHARS: usize = 200;

#[derive(Clone, Debug)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    interceptors: Arc<Interceptors>,
}

impl ApiClient {
    /// # Errors
    /// Returns `ApiError::Config` if the base URL does not parse or the HTTP
    /// client cannot be built.
    pub fn new(base_url: &str) -> Result<Self, ApiError> {
        let base_url = base_url.trim();
        Url::parse(base_url)
            .map_err(|err| ApiError::Config(format!("Invalid API base URL {base_url}: {err}")))?;

        let http = reqwest::Client::builder()
            .user_agent(APP_USER_AGENT)
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(|err| ApiError::Config(format!("Failed to build HTTP client: {err}")))?;

        Ok(Self {
            http,
            base_url: base_url.to_string(),
            interceptors: Arc::new(Interceptors::new()),
        })
    }

    /// Same connection pool and base URL, fresh interceptor registry.
    #[must_use]
    pub fn fork(&self) -> Self {
        Self {
            http: self.http.clone(),
            base_url: self.base_url.clone(),
            interceptors: Arc::new(Interceptors::new()),
        }
    }

    #[must_use]
    pub fn interceptors(&self) -> Arc<Interceptors> {
        Arc::clone(&self.interceptors)
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    #[must_use]
    pub fn url(&self, path: &str) -> String {
        build_url_with_base(&self.base_url, path)
    }

    #[must_use]
    pub fn prepare(&self, method: Method, path: &str) -> OutboundRequest {
        OutboundRequest::new(method, self.url(path))
    }

    /// # Errors
    /// Returns `ApiError::Serialization` if `body` cannot be encoded.
    pub fn prepare_json<B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        body: &B,
    ) -> Result<OutboundRequest, ApiError> {
        let payload = serde_json::to_vec(body)
            .map_err(|err| ApiError::Serialization(format!("Failed to encode request: {err}")))?;
        let mut request = self.prepare(method, path);
        request.headers.insert(
            CONTENT_TYPE,
            reqwest::header::HeaderValue::from_static("application/json"),
        );
        request.body = Some(payload);
        Ok(request)
    }

    /// Runs the interceptors and sends the request.
    ///
    /// # Errors
    /// Returns whatever the interceptors produce for a failed build, or a
    /// `Network`/`Timeout` error if the request cannot be sent.
    #[instrument(skip_all)]
    pub async fn execute(
        &self,
        request: Result<OutboundRequest, ApiError>,
    ) -> Result<Response, ApiError> {
        let request = self.interceptors.apply(request)?;
        debug!(method = %request.method, url = %request.url, "outbound request");

        let mut builder = self
            .http
            .request(request.method, &request.url)
            .headers(request.headers);
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        builder.send().await.map_err(map_request_error)
    }

    /// # Errors
    /// Returns an `ApiError` on transport failure, non-success status or an
    /// undecodable body.
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let response = self.execute(Ok(self.prepare(Method::GET, path))).await?;
        handle_json_response(response).await
    }

    /// Like [`get_json`](Self::get_json) but treats 204 and 401 as "nothing there".
    ///
    /// # Errors
    /// Returns an `ApiError` on transport failure, other non-success statuses
    /// or an undecodable body.
    pub async fn get_optional_json<T: DeserializeOwned>(
        &self,
        path: &str,
    ) -> Result<Option<T>, ApiError> {
        let response = self.execute(Ok(self.prepare(Method::GET, path))).await?;
        handle_optional_json_response(response).await
    }

    /// # Errors
    /// Returns an `ApiError` on encoding or transport failure, non-success
    /// status or an undecodable body.
    pub async fn post_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let request = self.prepare_json(Method::POST, path, body);
        let response = self.execute(request).await?;
        handle_json_response(response).await
    }
}

/// Joins a base URL and a path with exactly one slash between them.
pub(crate) fn build_url_with_base(base_url: &str, path: &str) -> String {
    let base = base_url.trim().trim_end_matches('/');
    let path = path.trim();

    if base.is_empty() {
        path.to_string()
    } else {
        format!("{}/{}", base, path.trim_start_matches('/'))
    }
}

fn map_request_error(err: reqwest::Error) -> ApiError {
    if err.is_timeout() {
        ApiError::Timeout("Request timed out. Please try again.".to_string())
    } else {
        ApiError::Network(format!("Unable to reach the server: {err}"))
    }
}

/// Decodes a JSON body or turns a non-success status into `ApiError::Http`.
pub(crate) async fn handle_json_response<T: DeserializeOwned>(
    response: Response,
) -> Result<T, ApiError> {
    if response.status().is_success() {
        response
            .json::<T>()
            .await
            .map_err(|err| ApiError::Parse(format!("Failed to decode response: {err}")))
    } else {
        Err(http_error(response).await)
    }
}

async fn handle_optional_json_response<T: DeserializeOwned>(
    response: Response,
) -> Result<Option<T>, ApiError> {
    match response.status() {
        StatusCode::NO_CONTENT | StatusCode::UNAUTHORIZED => Ok(None),
        status if status.is_success() => response
            .json::<T>()
            .await
            .map(Some)
            .map_err(|err| ApiError::Parse(format!("Failed to decode response: {err}"))),
        _ => Err(http_error(response).await),
    }
}

pub(crate) async fn http_error(response: Response) -> ApiError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    ApiError::Http {
        status,
        message: sanitize_body(&body),
    }
}

fn sanitize_body(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        "Request failed.".to_string()
    } else {
        trimmed.chars().take(MAX_ERROR_CHARS).collect()
    }
}
