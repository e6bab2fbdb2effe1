use axum::{Json, response::IntoResponse};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::api::middleware::CurrentSession;
use crate::session::Principal;

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Workspace {
    pub principal: Principal,
    pub expires_at_unix: i64,
}

#[utoipa::path(
    get,
    path = "/apps",
    responses(
        (status = 200, description = "Signed-in principal", body = Workspace),
        (status = 307, description = "No session; redirected to sign-in")
    ),
    tag = "apps"
)]
pub async fn apps(CurrentSession(session): CurrentSession) -> impl IntoResponse {
    Json(Workspace {
        principal: session.principal.clone(),
        expires_at_unix: session.expires_at_unix,
    })
}
