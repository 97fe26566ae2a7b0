//! Backend health state.
//!
//! # States
//! - Unknown: registered, not yet probed (only under the pessimistic policy)
//! - Healthy: backend receives traffic
//! - Unhealthy: backend excluded from load balancing
//!
//! # State Transitions
//! ```text
//! Unknown/Unhealthy → Healthy: probe returned 200 OK
//! Unknown/Healthy → Unhealthy: transport error, timeout or non-200 status
//! ```
//!
//! A single probe decides the state; the next cycle may reverse it.

use serde::Serialize;

use crate::config::InitialHealth;

/// Health State enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthState {
    Unknown,
    Healthy,
    Unhealthy,
}

impl HealthState {
    /// Only a positively confirmed (or optimistically assumed) backend is routable.
    pub fn is_routable(self) -> bool {
        self == HealthState::Healthy
    }
}

impl From<InitialHealth> for HealthState {
    fn from(policy: InitialHealth) -> Self {
        match policy {
            InitialHealth::Healthy => HealthState::Healthy,
            InitialHealth::Unknown => HealthState::Unknown,
        }
    }
}

impl From<bool> for HealthState {
    fn from(healthy: bool) -> Self {
        if healthy {
            HealthState::Healthy
        } else {
            HealthState::Unhealthy
        }
    }
}

/// One liveness map entry.
///
/// The generation changes every time the address is (re-)registered, so a
/// probe started before a remove/add cycle cannot overwrite the new entry.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Liveness {
    pub state: HealthState,
    pub generation: u64,
}
