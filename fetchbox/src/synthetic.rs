//! Responses synthesized by strategies when neither cache nor network can answer.

use fetchbox_core::Response;
use http::StatusCode;
use http::header::{CONTENT_TYPE, HeaderName, HeaderValue};
use serde_json::json;

/// Marks responses served by the interception layer instead of the network.
pub const WORKER_HEADER: HeaderName = HeaderName::from_static("x-fetchbox-worker");

/// Marks synthesized error responses.
pub const CATCH_HEADER: HeaderName = HeaderName::from_static("x-fetchbox-catch");

const YES: HeaderValue = HeaderValue::from_static("yes");

fn json_message(status: StatusCode, message: &str) -> Response {
    let body = json!({ "message": message }).to_string();
    Response::new(status, body)
        .with_header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
        .with_header(CATCH_HEADER, YES)
        .with_header(WORKER_HEADER, YES)
}

/// `500` response with `{"message":"Network Error"}` and both marker headers.
pub fn network_error() -> Response {
    json_message(StatusCode::INTERNAL_SERVER_ERROR, "Network Error")
}

/// `404` response with `{"message":"Not Found"}` and both marker headers.
pub fn cache_miss_payload() -> Response {
    json_message(StatusCode::NOT_FOUND, "Not Found")
}

/// Plain `404 Not found` response.
pub fn not_found() -> Response {
    Response::new(StatusCode::NOT_FOUND, "Not found")
        .with_header(CONTENT_TYPE, HeaderValue::from_static("text/plain"))
}

/// Tags a cache-served response with the worker marker.
pub fn mark_fallback(response: Response) -> Response {
    response.with_header(WORKER_HEADER, YES)
}

/// Whether the response carries the worker marker.
pub fn is_marked(response: &Response) -> bool {
    response.headers().get(WORKER_HEADER) == Some(&YES)
}
