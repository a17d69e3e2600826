//! Response helpers shared by the listener.

use crate::exchange::body::{full, StreamBody};
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::{Response, StatusCode};

static APPLICATION_JSON: HeaderValue = HeaderValue::from_static("application/json");
static TEXT_PLAIN: HeaderValue = HeaderValue::from_static("text/plain");

/// Map a numeric code to a status, falling back to 500 for codes outside
/// the valid range.
pub fn status_or_500(code: u16) -> StatusCode {
    StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}

/// JSON error response: `{"error": "<message>"}`.
pub fn error_response(status: u16, message: &str) -> Response<StreamBody> {
    let body = serde_json::json!({ "error": message }).to_string();
    let mut response = Response::new(full(body));
    *response.status_mut() = status_or_500(status);
    response
        .headers_mut()
        .insert(CONTENT_TYPE, APPLICATION_JSON.clone());
    response
}

/// Plain-text 404 for a path that no route matches.
pub fn not_found(path: &str) -> Response<StreamBody> {
    let mut response = Response::new(full(format!("{path} NOT FOUND\n")));
    *response.status_mut() = StatusCode::NOT_FOUND;
    response.headers_mut().insert(CONTENT_TYPE, TEXT_PLAIN.clone());
    response
}

/// Mark a response body as JSON.
pub fn set_json_content_type<B>(response: &mut Response<B>) {
    response
        .headers_mut()
        .insert(CONTENT_TYPE, APPLICATION_JSON.clone());
}
