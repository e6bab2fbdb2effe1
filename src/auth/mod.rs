//! Exchange of an identifier and secret for a [`Session`].

use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, instrument, warn};

use crate::client::{ApiClient, ApiError, handle_json_response};
use crate::session::{Principal, Session, now_unix};

/// Upstream endpoint that trades credentials for an access token.
pub const LOGIN_PATH: &str = "/adminLogin";

#[derive(Debug)]
pub struct Credentials {
    pub email: String,
    pub password: SecretString,
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("credentials rejected: {0}")]
    Rejected(String),
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error("unexpected login response: {0}")]
    InvalidResponse(String),
    #[error("invalid sign-in request: {0}")]
    InvalidRequest(String),
}

#[async_trait]
pub trait Authenticator: Send + Sync {
    async fn authenticate(&self, credentials: &Credentials) -> Result<Session, AuthError>;
}

#[derive(Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
struct LoginResponse {
    success: bool,
    data: Option<LoginData>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoginData {
    id: String,
    email: String,
    access_token: String,
}

/// Calls the upstream login endpoint; sessions live for `session_ttl`.
#[derive(Clone, Debug)]
pub struct HttpAuthenticator {
    api: ApiClient,
    session_ttl: Duration,
}

impl HttpAuthenticator {
    #[must_use]
    pub const fn new(api: ApiClient, session_ttl: Duration) -> Self {
        Self { api, session_ttl }
    }

    fn expires_at(&self) -> i64 {
        let ttl = i64::try_from(self.session_ttl.as_secs()).unwrap_or(i64::MAX);
        now_unix().saturating_add(ttl)
    }
}

#[async_trait]
impl Authenticator for HttpAuthenticator {
    #[instrument(skip_all)]
    async fn authenticate(&self, credentials: &Credentials) -> Result<Session, AuthError> {
        let body = LoginRequest {
            username: &credentials.email,
            password: credentials.password.expose_secret(),
        };
        let response = self
            .api
            .execute(self.api.prepare_json(Method::POST, LOGIN_PATH, &body))
            .await?;

        if matches!(
            response.status(),
            StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN
        ) {
            debug!(status = %response.status(), "login refused upstream");
            return Err(AuthError::Rejected("Invalid credentials".to_string()));
        }

        let login: LoginResponse = handle_json_response(response).await?;
        if !login.success {
            return Err(AuthError::Rejected("Invalid credentials".to_string()));
        }

        let data = login
            .data
            .ok_or_else(|| AuthError::InvalidResponse("missing data".to_string()))?;
        if data.access_token.is_empty() {
            warn!("login succeeded without an access token");
            return Err(AuthError::Rejected("No access token issued".to_string()));
        }

        Ok(Session::new(
            Principal {
                id: data.id,
                email: data.email,
            },
            data.access_token,
            self.expires_at(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{Context, Result};
    use axum::{Json, Router, http::StatusCode as AxumStatus, response::IntoResponse, routing::post};
    use serde_json::{Value, json};
    use tokio::net::TcpListener;

    async fn login(Json(body): Json<Value>) -> axum::response::Response {
        match body["password"].as_str() {
            Some("secret1") if body["username"] == "ada@example.com" => Json(json!({
                "success": true,
                "data": { "id": "u-1", "email": "ada@example.com", "accessToken": "abc" }
            }))
            .into_response(),
            Some("no-token") => Json(json!({
                "success": true,
                "data": { "id": "u-1", "email": "ada@example.com", "accessToken": "" }
            }))
            .into_response(),
            Some("soft-fail") => Json(json!({ "success": false })).into_response(),
            Some("boom") => (AxumStatus::INTERNAL_SERVER_ERROR, "database down").into_response(),
            _ => AxumStatus::UNAUTHORIZED.into_response(),
        }
    }

    async fn authenticator() -> Result<HttpAuthenticator> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        tokio::spawn(async move {
            let _ = axum::serve(listener, Router::new().route(LOGIN_PATH, post(login))).await;
        });
        let api = ApiClient::new(&format!("http://{addr}"))?;
        Ok(HttpAuthenticator::new(api, Duration::from_secs(60)))
    }

    fn credentials(password: &str) -> Credentials {
        Credentials {
            email: "ada@example.com".to_string(),
            password: SecretString::from(password.to_string()),
        }
    }

    #[tokio::test]
    async fn successful_login_builds_a_session() -> Result<()> {
        let auth = authenticator().await?;
        let before = now_unix();
        let session = auth.authenticate(&credentials("secret1")).await?;
        assert_eq!(session.principal.id, "u-1");
        assert_eq!(session.access_token(), "abc");
        assert!(session.expires_at_unix >= before + 60);
        Ok(())
    }

    #[tokio::test]
    async fn refusals_are_rejections() -> Result<()> {
        let auth = authenticator().await?;
        for password in ["wrong", "soft-fail", "no-token"] {
            let err = auth
                .authenticate(&credentials(password))
                .await
                .err()
                .context("expected a rejection")?;
            assert!(matches!(err, AuthError::Rejected(_)), "{password}: {err}");
        }
        Ok(())
    }

    #[tokio::test]
    async fn upstream_failures_are_api_errors() -> Result<()> {
        let auth = authenticator().await?;
        let err = auth
            .authenticate(&credentials("boom"))
            .await
            .err()
            .context("expected an error")?;
        assert!(matches!(
            err,
            AuthError::Api(ApiError::Http { status: 500, .. })
        ));
        Ok(())
    }
}
