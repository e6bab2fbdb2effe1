//! User-facing error reporting.
//!
//! [`AppError`] marks an error as operational: its message and status are safe
//! to show. Anything else is reported as a generic 500 and only logged.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use std::error::Error;
use thiserror::Error;
use tracing::{Level, debug, error};
use utoipa::ToSchema;

use crate::auth::AuthError;
use crate::client::ApiError;
use crate::forms::FieldErrors;

pub const GENERIC_MESSAGE: &str = "Something went wrong";

#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct AppError {
    message: String,
    status: StatusCode,
}

impl AppError {
    #[must_use]
    pub fn new(message: impl Into<String>, status: StatusCode) -> Self {
        Self {
            message: message.into(),
            status,
        }
    }

    #[must_use]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(message, StatusCode::BAD_REQUEST)
    }

    #[must_use]
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(message, StatusCode::UNAUTHORIZED)
    }

    #[must_use]
    pub fn bad_gateway(message: impl Into<String>) -> Self {
        Self::new(message, StatusCode::BAD_GATEWAY)
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<&AuthError> for AppError {
    fn from(err: &AuthError) -> Self {
        match err {
            AuthError::Rejected(_) => Self::unauthorized("Invalid email or password."),
            AuthError::InvalidRequest(message) => Self::bad_request(message.clone()),
            AuthError::Api(api) if api.is_timeout() => Self::new(
                "The sign-in service timed out. Please try again.",
                StatusCode::GATEWAY_TIMEOUT,
            ),
            AuthError::Api(_) | AuthError::InvalidResponse(_) => {
                Self::bad_gateway("The sign-in service is unavailable. Please try again later.")
            }
        }
    }
}

impl From<&ApiError> for AppError {
    fn from(err: &ApiError) -> Self {
        match err {
            ApiError::Timeout(message) => Self::new(message.clone(), StatusCode::GATEWAY_TIMEOUT),
            ApiError::Network(_) | ApiError::Parse(_) | ApiError::Http { .. } => {
                Self::bad_gateway("The upstream API is unavailable.")
            }
            ApiError::Config(_) | ApiError::Serialization(_) => {
                Self::new(GENERIC_MESSAGE, StatusCode::INTERNAL_SERVER_ERROR)
            }
        }
    }
}

/// What the client sees for any failure.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ErrorReport {
    pub message: String,
    pub status_code: u16,
}

/// Client errors are the caller's business; only server-side failures are
/// logged at `error`.
fn severity(status: StatusCode) -> Level {
    if status.is_server_error() {
        Level::ERROR
    } else {
        Level::DEBUG
    }
}

/// Reports operational errors as they are and everything else generically.
#[must_use]
pub fn handle_error(err: &(dyn Error + 'static)) -> ErrorReport {
    if let Some(app) = err.downcast_ref::<AppError>() {
        if severity(app.status) == Level::ERROR {
            error!("Error {}: {}", app.status.as_u16(), app.message);
        } else {
            debug!("Client error {}: {}", app.status.as_u16(), app.message);
        }
        return ErrorReport {
            message: app.message.clone(),
            status_code: app.status.as_u16(),
        };
    }

    error!("Unexpected error: {err}");
    ErrorReport {
        message: GENERIC_MESSAGE.to_string(),
        status_code: StatusCode::INTERNAL_SERVER_ERROR.as_u16(),
    }
}

impl IntoResponse for ErrorReport {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self)).into_response()
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        handle_error(&self).into_response()
    }
}

/// `422` with the field-keyed messages.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub struct ValidationErrors {
    pub errors: FieldErrors,
}

impl IntoResponse for ValidationErrors {
    fn into_response(self) -> Response {
        (StatusCode::UNPROCESSABLE_ENTITY, Json(self)).into_response()
    }
}
