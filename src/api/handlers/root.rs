use axum::{Json, response::IntoResponse};
use serde::Serialize;

#[derive(Serialize)]
struct Index {
    name: &'static str,
    version: &'static str,
    sign_in: &'static str,
}

pub async fn root() -> impl IntoResponse {
    Json(Index {
        name: env!("CARGO_PKG_NAME"),
        version: env!("CARGO_PKG_VERSION"),
        sign_in: crate::guard::SIGN_IN_PATH,
    })
}
