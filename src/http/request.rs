//! Request handling and transformation.
//!
//! # Responsibilities
//! - Rewrite the inbound URI onto the selected backend
//! - Extract the request ID for logging and propagation
//!
//! # Design Decisions
//! - Path and query are forwarded verbatim; only scheme and authority change
//! - Request ID is assigned by middleware before the handler runs

use axum::http::uri::{Authority, PathAndQuery, Scheme};
use axum::http::{HeaderMap, Uri};
use std::str::FromStr;

pub const X_REQUEST_ID: &str = "x-request-id";

/// Build `http://<address><path>?<query>` from the inbound URI.
pub fn target_uri(address: &str, original: &Uri) -> Result<Uri, axum::http::Error> {
    let path_and_query = original
        .path_and_query()
        .cloned()
        .unwrap_or_else(|| PathAndQuery::from_static("/"));

    let mut parts = axum::http::uri::Parts::default();
    parts.scheme = Some(Scheme::HTTP);
    parts.authority = Some(Authority::from_str(address)?);
    parts.path_and_query = Some(path_and_query);
    Ok(Uri::from_parts(parts)?)
}

/// Request ID assigned by the middleware, or "unknown".
pub fn request_id(headers: &HeaderMap) -> &str {
    headers
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
}
