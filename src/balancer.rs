//! The balancing context.
//!
//! One `Balancer` per listening service, constructed explicitly and shared by
//! `Arc` with the dispatcher and the management surface. It owns the registry,
//! the health monitor and the selection cursor, and exposes the monitor's
//! start/stop lifecycle.

use serde::Serialize;
use std::sync::Arc;

use crate::config::{validate_backend_address, AddressError, HealthCheckConfig};
use crate::health::{HealthMonitor, HealthState};
use crate::load_balancer::{AddOutcome, BackendPool, LoadBalancer, RemoveOutcome, RoundRobin};

/// A registered backend as reported to operators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackendStatus {
    pub address: String,
    pub state: HealthState,
    pub healthy: bool,
}

pub struct Balancer {
    pool: BackendPool,
    selector: Box<dyn LoadBalancer>,
}

impl Balancer {
    /// Round-robin balancer with a fresh health monitor.
    pub fn new(config: HealthCheckConfig) -> Self {
        Self::with_selector(config, Box::new(RoundRobin::new()))
    }

    pub fn with_selector(config: HealthCheckConfig, selector: Box<dyn LoadBalancer>) -> Self {
        let monitor = Arc::new(HealthMonitor::new(config));
        Self {
            pool: BackendPool::new(monitor),
            selector,
        }
    }

    pub fn pool(&self) -> &BackendPool {
        &self.pool
    }

    pub fn monitor(&self) -> &Arc<HealthMonitor> {
        self.pool.monitor()
    }

    /// Register a backend. Malformed addresses are rejected before touching
    /// the registry.
    pub fn add_server(&self, address: &str) -> Result<AddOutcome, AddressError> {
        validate_backend_address(address)?;
        Ok(self.pool.add(address))
    }

    pub fn remove_server(&self, address: &str) -> RemoveOutcome {
        self.pool.remove(address)
    }

    /// Pick the next healthy backend, or None when nothing is live.
    pub fn select(&self) -> Option<String> {
        let healthy = self.pool.healthy();
        let selected = self.selector.next_server(&healthy);
        if selected.is_none() {
            tracing::warn!(registered = self.pool.len(), "No healthy servers available");
        }
        selected
    }

    /// Registered backends with their current health, in registry order.
    pub fn backends(&self) -> Vec<BackendStatus> {
        let states = self.monitor().snapshot();
        self.pool
            .addresses()
            .into_iter()
            .filter_map(|address| {
                let state = *states.get(&address)?;
                Some(BackendStatus {
                    healthy: state.is_routable(),
                    state,
                    address,
                })
            })
            .collect()
    }

    pub fn start(&self) {
        self.monitor().start();
    }

    pub async fn stop(&self) {
        self.monitor().stop().await;
    }

    /// Probe every backend now and wait for the results.
    pub async fn check_now(&self) {
        self.monitor().check_all().await;
    }
}
