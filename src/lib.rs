//! Round-robin HTTP load balancer with active health checking.
//!
//! Requests arriving on the listener are forwarded to the next healthy
//! backend; a background monitor probes every backend's `/health` endpoint
//! and takes failing ones out of rotation until they recover.

pub mod admin;
pub mod balancer;
pub mod config;
pub mod error;
pub mod health;
pub mod http;
pub mod lifecycle;
pub mod load_balancer;
pub mod observability;

pub use balancer::Balancer;
pub use config::schema::BalancerConfig;
pub use error::DispatchError;
pub use http::HttpServer;
pub use lifecycle::Shutdown;

use std::sync::{Mutex, MutexGuard, PoisonError};

/// Lock a mutex, recovering the data if a holder panicked. Critical sections
/// in this crate are single map/vec operations and cannot leave them torn.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
