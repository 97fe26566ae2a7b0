//! Management surface.
//!
//! Two front ends drive the same balancing context:
//! - an HTTP API under `/admin` (handlers.rs, guarded by auth.rs)
//! - a line-oriented console on stdin (console.rs)

pub mod auth;
pub mod console;
pub mod handlers;

use axum::{
    middleware,
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::broadcast;

use crate::balancer::Balancer;
use crate::lifecycle::shutdown;
use self::auth::admin_auth_middleware;
use self::handlers::*;

/// State shared by the admin handlers.
#[derive(Clone)]
pub struct AdminState {
    pub balancer: Arc<Balancer>,
    /// Bearer token required on every request, if set.
    pub api_key: Option<Arc<str>>,
}

impl AdminState {
    pub fn new(balancer: Arc<Balancer>, api_key: Option<String>) -> Self {
        Self {
            balancer,
            api_key: api_key.map(Arc::from),
        }
    }
}

pub fn setup_admin_router(state: AdminState) -> Router {
    Router::new()
        .route("/admin/status", get(get_status))
        .route("/admin/backends", get(get_backends).post(add_backend))
        .route("/admin/backends/{address}", delete(remove_backend))
        .route("/admin/health-check", post(run_health_check))
        .layer(middleware::from_fn_with_state(state.clone(), admin_auth_middleware))
        .with_state(state)
}

/// Serve the admin API until `shutdown` fires.
pub async fn serve(
    listener: TcpListener,
    state: AdminState,
    shutdown: broadcast::Receiver<()>,
) -> Result<(), std::io::Error> {
    let addr = listener.local_addr()?;
    tracing::info!(address = %addr, "Admin API starting");

    axum::serve(listener, setup_admin_router(state))
        .with_graceful_shutdown(shutdown::wait(shutdown))
        .await?;

    tracing::info!("Admin API stopped");
    Ok(())
}
