//! Outbound HTTP client used to reach the backend API.

mod errors;
mod http;
mod pipeline;

pub use errors::ApiError;
pub use http::ApiClient;
pub(crate) use http::{handle_json_response, http_error};
pub use pipeline::{
    HookHandle, Interceptors, OnError, OnRequest, OutboundRequest, RequestPipeline,
};
