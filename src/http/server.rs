//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the dispatch handler
//! - Wire up middleware (tracing, request ID)
//! - Bind server to listener
//! - Dispatch every request to the balancing context

use axum::{
    body::Body,
    extract::State,
    http::Request,
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::balancer::Balancer;
use crate::config::TimeoutConfig;
use crate::http::dispatch::Dispatcher;
use crate::http::request::request_id;
use crate::http::response::X_SERVED_BY;
use crate::lifecycle::shutdown;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Dispatcher,
}

/// HTTP server for proxied traffic.
pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    pub fn new(balancer: Arc<Balancer>, timeouts: &TimeoutConfig) -> Self {
        let state = AppState {
            dispatcher: Dispatcher::new(balancer, timeouts.forward()),
        };

        Self {
            router: Self::build_router(state),
        }
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(state: AppState) -> Router {
        Router::new()
            .route("/{*path}", any(proxy_handler))
            .route("/", any(proxy_handler))
            .with_state(state)
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }

    /// The configured router, for in-process use.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Serve until `shutdown` fires, then drain in-flight requests.
    pub async fn run(self, listener: TcpListener, shutdown: broadcast::Receiver<()>) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown::wait(shutdown))
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Main proxy handler.
async fn proxy_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    // The inbound body is never forwarded.
    let (parts, _) = request.into_parts();
    let request_id = request_id(&parts.headers).to_string();

    tracing::debug!(
        request_id = %request_id,
        method = %parts.method,
        path = %parts.uri.path(),
        "Dispatching request"
    );

    match state.dispatcher.dispatch(&parts.uri, &parts.headers).await {
        Ok(response) => {
            tracing::debug!(
                request_id = %request_id,
                status = %response.status(),
                backend = ?response.headers().get(X_SERVED_BY),
                "Request served"
            );
            response
        }
        Err(e) => {
            tracing::warn!(request_id = %request_id, error = %e, "Dispatch failed");
            e.into_response()
        }
    }
}
