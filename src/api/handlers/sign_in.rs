//! Sign-in and sign-up pages.
//!
//! `GET` returns the form description so a client can render and pre-validate
//! it; `POST /auth/sign-in` runs the same schema server-side before any
//! credential leaves the process.

use axum::{
    Json,
    extract::{Extension, rejection::JsonRejection},
    http::{HeaderMap, StatusCode, header::SET_COOKIE},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use utoipa::ToSchema;

use super::{RawForm, fill_form, raw_fields, session::session_cookie};
use crate::api::state::AppState;
use crate::error::{AppError, ErrorReport, GENERIC_MESSAGE, ValidationErrors, handle_error};
use crate::forms::{
    FormDescription, SubmissionExecutor, SubmissionState, SubmitOutcome,
    sign_in::{self, SignInAction, SignInForm},
};
use crate::session::Principal;

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SignInResponse {
    pub principal: Principal,
    pub redirect_to: String,
}

#[utoipa::path(
    get,
    path = "/auth/sign-in",
    responses(
        (status = 200, description = "Sign-in form fields and rules", body = FormDescription)
    ),
    tag = "auth"
)]
pub async fn sign_in_form() -> Response {
    describe_credentials()
}

#[utoipa::path(
    get,
    path = "/auth/sign-up",
    responses(
        (status = 200, description = "Sign-up form fields and rules", body = FormDescription)
    ),
    tag = "auth"
)]
pub async fn sign_up_form() -> Response {
    describe_credentials()
}

fn describe_credentials() -> Response {
    match sign_in::schema() {
        Ok(schema) => Json(schema.describe()).into_response(),
        Err(err) => handle_error(&err).into_response(),
    }
}

#[utoipa::path(
    post,
    path = "/auth/sign-in",
    request_body = SignInForm,
    responses(
        (status = 200, description = "Signed in; session cookie set", body = SignInResponse),
        (status = 400, description = "Malformed payload", body = ErrorReport),
        (status = 401, description = "Invalid email or password", body = ErrorReport),
        (status = 422, description = "Field validation failed", body = ValidationErrors),
        (status = 502, description = "Sign-in service unavailable", body = ErrorReport),
        (status = 504, description = "Sign-in service timed out", body = ErrorReport)
    ),
    tag = "auth"
)]
#[instrument(skip_all)]
pub async fn sign_in(
    state: Extension<Arc<AppState>>,
    payload: Result<Json<RawForm>, JsonRejection>,
) -> Response {
    let raw = match raw_fields(payload) {
        Ok(raw) => raw,
        Err(err) => return err.into_response(),
    };
    let mut form = match sign_in::schema().and_then(|schema| fill_form(schema, &raw)) {
        Ok(form) => form,
        Err(err) => return handle_error(&err).into_response(),
    };

    let executor = SubmissionExecutor::new(SignInAction::new(state.authenticator()));
    let submission = match form.submit(&executor) {
        Ok(submission) => submission,
        Err(errors) => return ValidationErrors { errors }.into_response(),
    };

    let session = match submission.await {
        SubmitOutcome::Completed(SubmissionState::Succeeded(session)) => session,
        SubmitOutcome::Completed(SubmissionState::Failed(reason)) => {
            warn!("Sign-in failed: {reason}");
            return AppError::from(reason.as_ref()).into_response();
        }
        SubmitOutcome::Ignored | SubmitOutcome::Completed(_) => {
            error!("Sign-in submission did not settle");
            return ErrorReport {
                message: GENERIC_MESSAGE.to_string(),
                status_code: StatusCode::INTERNAL_SERVER_ERROR.as_u16(),
            }
            .into_response();
        }
    };

    let session = Arc::unwrap_or_clone(session);
    let principal = session.principal.clone();
    let id = match state.sessions().insert(session).await {
        Ok(id) => id,
        Err(err) => return handle_error(&err).into_response(),
    };

    let mut headers = HeaderMap::new();
    match session_cookie(state.cookies(), &id) {
        Ok(cookie) => {
            headers.insert(SET_COOKIE, cookie);
        }
        Err(err) => return handle_error(&err).into_response(),
    }

    info!(principal = %principal.id, "session established");
    let body = SignInResponse {
        principal,
        redirect_to: state.guard().config().landing_path().to_string(),
    };
    (StatusCode::OK, headers, Json(body)).into_response()
}
