//! Dispatch errors.
//!
//! Every failure on the request path degrades to `503 Service Unavailable`;
//! nothing here is fatal to the process.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("no healthy backend available")]
    NoHealthyBackend,

    #[error("invalid target uri for {address}: {reason}")]
    InvalidTarget { address: String, reason: String },

    #[error("backend {address} unreachable: {source}")]
    Unreachable {
        address: String,
        #[source]
        source: hyper_util::client::legacy::Error,
    },

    #[error("backend {address} timed out")]
    Timeout { address: String },
}

impl DispatchError {
    /// Backend the failed request was sent to, if one was selected.
    pub fn backend(&self) -> Option<&str> {
        match self {
            DispatchError::NoHealthyBackend => None,
            DispatchError::InvalidTarget { address, .. }
            | DispatchError::Unreachable { address, .. }
            | DispatchError::Timeout { address } => Some(address),
        }
    }
}

impl IntoResponse for DispatchError {
    fn into_response(self) -> Response {
        let message = match self {
            DispatchError::NoHealthyBackend => "No servers available",
            _ => "Server not reachable",
        };
        (StatusCode::SERVICE_UNAVAILABLE, message).into_response()
    }
}
