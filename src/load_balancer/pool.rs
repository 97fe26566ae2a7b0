//! Backend pool management.
//!
//! # Responsibilities
//! - Own the authoritative set of backend addresses
//! - Keep the health monitor's tracked set in sync with membership
//! - Hand out consistent snapshots (all backends, live backends)

use serde::Serialize;
use std::sync::{Arc, Mutex};

use crate::health::HealthMonitor;
use crate::lock;

/// Result of adding a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AddOutcome {
    Added,
    AlreadyPresent,
}

/// Result of removing a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RemoveOutcome {
    Removed,
    NotPresent,
}

/// The server registry.
///
/// Lock order is always pool, then monitor. Neither lock is held across I/O.
pub struct BackendPool {
    /// Registered addresses in insertion order.
    addresses: Mutex<Vec<String>>,
    monitor: Arc<HealthMonitor>,
}

impl BackendPool {
    pub fn new(monitor: Arc<HealthMonitor>) -> Self {
        Self {
            addresses: Mutex::new(Vec::new()),
            monitor,
        }
    }

    pub fn monitor(&self) -> &Arc<HealthMonitor> {
        &self.monitor
    }

    pub fn add(&self, address: &str) -> AddOutcome {
        let mut addresses = lock(&self.addresses);
        if addresses.iter().any(|a| a == address) {
            tracing::info!(address = %address, "Backend already in the pool");
            return AddOutcome::AlreadyPresent;
        }

        addresses.push(address.to_string());
        self.monitor.add_server(address);
        tracing::info!(address = %address, "Backend added to the pool");
        AddOutcome::Added
    }

    pub fn remove(&self, address: &str) -> RemoveOutcome {
        let mut addresses = lock(&self.addresses);
        let Some(index) = addresses.iter().position(|a| a == address) else {
            tracing::info!(address = %address, "Backend not in the pool");
            return RemoveOutcome::NotPresent;
        };

        addresses.remove(index);
        self.monitor.remove_server(address);
        tracing::info!(address = %address, "Backend removed from the pool");
        RemoveOutcome::Removed
    }

    /// Snapshot of every registered address, in insertion order.
    pub fn addresses(&self) -> Vec<String> {
        lock(&self.addresses).clone()
    }

    /// Snapshot of the healthy subset, in insertion order.
    pub fn healthy(&self) -> Vec<String> {
        let addresses = lock(&self.addresses);
        self.monitor.healthy_among(addresses.iter())
    }

    pub fn len(&self) -> usize {
        lock(&self.addresses).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
