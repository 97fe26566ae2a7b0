//! Health checking subsystem.
//!
//! # Data Flow
//! ```text
//! Active health checks (active.rs):
//!     Periodic timer
//!     → Spawn one probe task per tracked backend
//!     → Each probe updates the liveness map (state.rs) on completion
//!
//! Readers:
//!     Dispatcher → is_healthy / healthy_among (short lock, no I/O)
//! ```
//!
//! # Design Decisions
//! - The liveness map never leaves the monitor; callers use narrow accessors
//! - One probe result decides the state; no hysteresis
//! - Membership changes and probe updates share one lock
//! - Stopping joins every in-flight probe before returning

pub mod active;
pub mod state;

pub use active::{HealthMonitor, ProbeOutcome};
pub use state::HealthState;
