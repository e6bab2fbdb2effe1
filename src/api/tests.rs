use super::*;
use crate::auth::{AuthError, Authenticator, Credentials};
use crate::client::ApiClient;
use crate::guard::RouteGuard;
use crate::session::{MemorySessionStore, Principal, Session, SessionStore, StoreError};
use anyhow::{Context, Result};
use async_trait::async_trait;
use axum::{
    http::{
        Method, StatusCode,
        header::{CONTENT_TYPE, COOKIE, LOCATION, SET_COOKIE},
    },
    response::Response,
};
use secrecy::ExposeSecret;
use serde_json::{Value, json};
use tower::ServiceExt;

struct StubAuthenticator;

#[async_trait]
impl Authenticator for StubAuthenticator {
    async fn authenticate(&self, credentials: &Credentials) -> Result<Session, AuthError> {
        if credentials.password.expose_secret() == "secret1" {
            Ok(Session::new(
                Principal {
                    id: "u-1".to_string(),
                    email: credentials.email.clone(),
                },
                "abc",
                i64::MAX,
            ))
        } else {
            Err(AuthError::Rejected("Invalid credentials".to_string()))
        }
    }
}

struct FailingStore;

#[async_trait]
impl SessionStore for FailingStore {
    async fn insert(&self, _session: Session) -> Result<String, StoreError> {
        Err(StoreError::Unavailable("offline".to_string()))
    }

    async fn load(&self, _id: &str) -> Result<Option<Arc<Session>>, StoreError> {
        Err(StoreError::Unavailable("offline".to_string()))
    }

    async fn remove(&self, _id: &str) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("offline".to_string()))
    }
}

fn state_with(sessions: Arc<dyn SessionStore>) -> Result<Arc<AppState>> {
    Ok(Arc::new(AppState::new(
        RouteGuard::default(),
        sessions,
        Arc::new(StubAuthenticator),
        ApiClient::new("http://127.0.0.1:9")?,
        CookieConfig::new().with_ttl_seconds(3600),
    )))
}

fn state() -> Result<Arc<AppState>> {
    state_with(Arc::new(MemorySessionStore::new()))
}

async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    cookie: Option<&str>,
    body: Option<Value>,
) -> Result<Response> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(COOKIE, cookie);
    }
    let request = match body {
        Some(body) => builder
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(serde_json::to_vec(&body)?))?,
        None => builder.body(Body::empty())?,
    };
    Ok(app.clone().oneshot(request).await?)
}

async fn json_body(response: Response) -> Result<Value> {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await?;
    Ok(serde_json::from_slice(&bytes)?)
}

fn location(response: &Response) -> Option<&str> {
    response
        .headers()
        .get(LOCATION)
        .and_then(|value| value.to_str().ok())
}

fn session_cookie(response: &Response) -> Result<String> {
    let header = response
        .headers()
        .get(SET_COOKIE)
        .context("missing set-cookie")?
        .to_str()?;
    let pair = header.split(';').next().context("empty cookie")?;
    Ok(pair.to_string())
}

async fn signed_in(app: &Router) -> Result<String> {
    let response = send(
        app,
        Method::POST,
        "/auth/sign-in",
        None,
        Some(json!({ "email": "ada@example.com", "password": "secret1" })),
    )
    .await?;
    assert_eq!(response.status(), StatusCode::OK);
    session_cookie(&response)
}

#[tokio::test]
async fn anonymous_protected_paths_redirect_to_sign_in() -> Result<()> {
    let app = app(state()?);
    for path in ["/dashboard", "/apps", "/apps/settings", "/th/apps/settings"] {
        let response = send(&app, Method::GET, path, None, None).await?;
        assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT, "{path}");
        assert_eq!(location(&response), Some("/auth/sign-in"), "{path}");
    }
    Ok(())
}

#[tokio::test]
async fn public_paths_are_served() -> Result<()> {
    let app = app(state()?);
    for path in ["/", "/contact", "/auth/sign-in", "/auth/sign-up", "/health"] {
        let response = send(&app, Method::GET, path, None, None).await?;
        assert_eq!(response.status(), StatusCode::OK, "{path}");
    }
    Ok(())
}

#[tokio::test]
async fn request_id_is_propagated() -> Result<()> {
    let app = app(state()?);
    let response = send(&app, Method::GET, "/health", None, None).await?;
    let id = response
        .headers()
        .get("x-request-id")
        .context("missing x-request-id")?
        .to_str()?;
    assert!(ulid::Ulid::from_string(id).is_ok());
    Ok(())
}

#[tokio::test]
async fn sign_in_form_is_described() -> Result<()> {
    let app = app(state()?);
    let response = send(&app, Method::GET, "/auth/sign-in", None, None).await?;
    let body = json_body(response).await?;
    let names: Vec<&str> = body["fields"]
        .as_array()
        .context("fields")?
        .iter()
        .filter_map(|field| field["name"].as_str())
        .collect();
    assert_eq!(names, vec!["email", "password"]);
    Ok(())
}

#[tokio::test]
async fn invalid_sign_in_is_unprocessable() -> Result<()> {
    let app = app(state()?);
    let response = send(
        &app,
        Method::POST,
        "/auth/sign-in",
        None,
        Some(json!({ "email": "not-an-email", "password": "123" })),
    )
    .await?;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = json_body(response).await?;
    assert_eq!(body["errors"]["email"], "Please enter a valid email address.");
    assert_eq!(
        body["errors"]["password"],
        "Password must be at least 6 characters."
    );
    Ok(())
}

#[tokio::test]
async fn malformed_payload_is_a_bad_request() -> Result<()> {
    let app = app(state()?);
    let request = Request::builder()
        .method(Method::POST)
        .uri("/auth/sign-in")
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))?;
    let response = app.oneshot(request).await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn wrong_password_is_unauthorized() -> Result<()> {
    let app = app(state()?);
    let response = send(
        &app,
        Method::POST,
        "/auth/sign-in",
        None,
        Some(json!({ "email": "ada@example.com", "password": "wrong-password" })),
    )
    .await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(response.headers().get(SET_COOKIE).is_none());
    let body = json_body(response).await?;
    assert_eq!(body["message"], "Invalid email or password.");
    assert_eq!(body["statusCode"], 401);
    Ok(())
}

#[tokio::test]
async fn session_cookie_opens_the_apps_area() -> Result<()> {
    let app = app(state()?);
    let cookie = signed_in(&app).await?;
    assert!(cookie.starts_with("frontgate_session="));

    let response = send(&app, Method::GET, "/apps", Some(&cookie), None).await?;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await?;
    assert_eq!(body["principal"]["email"], "ada@example.com");

    let response = send(&app, Method::GET, "/dashboard", Some(&cookie), None).await?;
    assert_eq!(response.status(), StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn signed_in_visitors_skip_the_sign_in_page() -> Result<()> {
    let app = app(state()?);
    let cookie = signed_in(&app).await?;
    for path in ["/auth/sign-in", "/en/auth/sign-up"] {
        let response = send(&app, Method::GET, path, Some(&cookie), None).await?;
        assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT, "{path}");
        assert_eq!(location(&response), Some("/apps"), "{path}");
    }
    Ok(())
}

#[tokio::test]
async fn sign_out_clears_the_session() -> Result<()> {
    let app = app(state()?);
    let cookie = signed_in(&app).await?;

    let response = send(&app, Method::POST, "/auth/sign-out", Some(&cookie), None).await?;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    let cleared = response
        .headers()
        .get(SET_COOKIE)
        .context("missing set-cookie")?
        .to_str()?;
    assert!(cleared.contains("Max-Age=0"));

    let response = send(&app, Method::GET, "/apps", Some(&cookie), None).await?;
    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    Ok(())
}

#[tokio::test]
async fn store_failures_fail_closed() -> Result<()> {
    let app = app(state_with(Arc::new(FailingStore))?);
    let cookie = "frontgate_session=anything";

    let response = send(&app, Method::GET, "/apps", Some(cookie), None).await?;
    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(location(&response), Some("/auth/sign-in"));

    let response = send(&app, Method::GET, "/auth/sign-in", Some(cookie), None).await?;
    assert_eq!(response.status(), StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn contact_submission() -> Result<()> {
    let app = app(state()?);
    let response = send(
        &app,
        Method::POST,
        "/contact",
        None,
        Some(json!({ "name": "Ada", "email": "ada@example.com", "message": "Hello there, friend" })),
    )
    .await?;
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let body = json_body(response).await?;
    assert!(body["id"].as_str().is_some_and(|id| !id.is_empty()));

    let response = send(
        &app,
        Method::POST,
        "/contact",
        None,
        Some(json!({ "name": "A", "email": "ada@example.com" })),
    )
    .await?;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = json_body(response).await?;
    assert_eq!(body["errors"]["name"], "Name must be at least 2 characters.");
    assert_eq!(
        body["errors"]["message"],
        "Message must be at least 10 characters."
    );
    assert!(body["errors"].get("email").is_none());
    Ok(())
}

#[tokio::test]
async fn unreachable_upstream_is_a_bad_gateway() -> Result<()> {
    let app = app(state()?);
    let response = send(&app, Method::GET, "/api/users", None, None).await?;
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    Ok(())
}
