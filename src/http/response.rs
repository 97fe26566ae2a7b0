//! Response handling and transformation.
//!
//! The client sees the backend's status code and content type. The body is
//! synthesized and names the backend that served the request.

use axum::body::Body;
use axum::http::{header, HeaderValue, Response, StatusCode};

/// Header naming the backend that served a request.
pub const X_SERVED_BY: &str = "x-served-by";

/// Body returned for a request served by `address`.
pub fn served_by_body(address: &str) -> String {
    format!("Response from server: {}", address)
}

/// Build the client-facing response for a backend reply.
pub fn relay(address: &str, status: StatusCode, content_type: Option<HeaderValue>) -> Response<Body> {
    let mut response = Response::new(Body::from(served_by_body(address)));
    *response.status_mut() = status;

    let headers = response.headers_mut();
    if let Some(content_type) = content_type {
        headers.insert(header::CONTENT_TYPE, content_type);
    }
    if let Ok(value) = HeaderValue::from_str(address) {
        headers.insert(X_SERVED_BY, value);
    }
    response
}
