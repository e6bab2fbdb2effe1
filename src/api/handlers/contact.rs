use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tracing::{error, instrument};

use super::{RawForm, fill_form, raw_fields};
use crate::error::{ErrorReport, GENERIC_MESSAGE, ValidationErrors, handle_error};
use crate::forms::{
    FormDescription, SubmissionExecutor, SubmissionState, SubmitOutcome,
    contact::{self, ContactMessage, ContactReceipt, LogContactAction},
};

#[utoipa::path(
    get,
    path = "/contact",
    responses(
        (status = 200, description = "Contact form fields and rules", body = FormDescription)
    ),
    tag = "contact"
)]
pub async fn contact_form() -> Response {
    match contact::schema() {
        Ok(schema) => Json(schema.describe()).into_response(),
        Err(err) => handle_error(&err).into_response(),
    }
}

#[utoipa::path(
    post,
    path = "/contact",
    request_body = ContactMessage,
    responses(
        (status = 202, description = "Message accepted", body = ContactReceipt),
        (status = 400, description = "Malformed payload", body = ErrorReport),
        (status = 422, description = "Field validation failed", body = ValidationErrors)
    ),
    tag = "contact"
)]
#[instrument(skip_all)]
pub async fn submit_contact(payload: Result<Json<RawForm>, JsonRejection>) -> Response {
    let raw = match raw_fields(payload) {
        Ok(raw) => raw,
        Err(err) => return err.into_response(),
    };
    let mut form = match contact::schema().and_then(|schema| fill_form(schema, &raw)) {
        Ok(form) => form,
        Err(err) => return handle_error(&err).into_response(),
    };

    let executor = SubmissionExecutor::new(LogContactAction);
    let submission = match form.submit(&executor) {
        Ok(submission) => submission,
        Err(errors) => return ValidationErrors { errors }.into_response(),
    };

    match submission.await {
        SubmitOutcome::Completed(SubmissionState::Succeeded(receipt)) => {
            (StatusCode::ACCEPTED, Json(receipt.as_ref().clone())).into_response()
        }
        _ => {
            error!("Contact submission did not settle");
            ErrorReport {
                message: GENERIC_MESSAGE.to_string(),
                status_code: StatusCode::INTERNAL_SERVER_ERROR.as_u16(),
            }
            .into_response()
        }
    }
}
