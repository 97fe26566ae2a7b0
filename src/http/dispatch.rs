//! Request dispatch.
//!
//! # Responsibilities
//! - Select a live backend for each inbound request
//! - Forward the request as a GET with a bounded timeout
//! - Relay the backend status and content type to the caller
//!
//! # Design Decisions
//! - No retry and no reselection: a failed forward is a 503 for this request
//! - The subset used for selection is snapshotted once per request

use axum::body::Body;
use axum::http::{header, HeaderMap, Method, Request, Response, Uri};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::time;

use crate::balancer::Balancer;
use crate::error::DispatchError;
use crate::http::request::{target_uri, X_REQUEST_ID};
use crate::http::response::relay;

#[derive(Clone)]
pub struct Dispatcher {
    balancer: Arc<Balancer>,
    client: Client<HttpConnector, Body>,
    timeout: Duration,
}

impl Dispatcher {
    pub fn new(balancer: Arc<Balancer>, timeout: Duration) -> Self {
        let client = Client::builder(TokioExecutor::new())
            .build(HttpConnector::new());

        Self {
            balancer,
            client,
            timeout,
        }
    }

    pub fn balancer(&self) -> &Arc<Balancer> {
        &self.balancer
    }

    /// Forward one request for `uri` to the next healthy backend.
    pub async fn dispatch(&self, uri: &Uri, headers: &HeaderMap) -> Result<Response<Body>, DispatchError> {
        let address = self.balancer.select().ok_or(DispatchError::NoHealthyBackend)?;

        let invalid = |reason: String| DispatchError::InvalidTarget {
            address: address.clone(),
            reason,
        };

        let target = target_uri(&address, uri).map_err(|e| invalid(e.to_string()))?;

        let mut builder = Request::builder()
            .method(Method::GET)
            .uri(target);
        if let Some(id) = headers.get(X_REQUEST_ID) {
            builder = builder.header(X_REQUEST_ID, id.clone());
        }
        let request = builder.body(Body::empty()).map_err(|e| invalid(e.to_string()))?;

        tracing::debug!(backend = %address, path = %uri.path(), "Forwarding request");

        match time::timeout(self.timeout, self.client.request(request)).await {
            Ok(Ok(response)) => {
                let content_type = response.headers().get(header::CONTENT_TYPE).cloned();
                Ok(relay(&address, response.status(), content_type))
            }
            Ok(Err(source)) => Err(DispatchError::Unreachable { address, source }),
            Err(_) => Err(DispatchError::Timeout { address }),
        }
    }
}
