//! Load balancing subsystem.
//!
//! # Data Flow
//! ```text
//! Inbound request
//!     → pool.rs (registry snapshot filtered by the health monitor)
//!     → round_robin.rs (advance shared cursor, index into the live subset)
//!     → selected backend address, or None when nothing is live
//! ```
//!
//! # Design Decisions
//! - Selection only ever sees the live subset; the registry is never compacted
//! - The subset used for `cursor % len` is the same one indexed into
//! - Membership changes go through the pool, which keeps the monitor in sync

pub mod pool;
pub mod round_robin;

pub use pool::{AddOutcome, BackendPool, RemoveOutcome};
pub use round_robin::RoundRobin;

/// A backend selection strategy over an already-filtered list.
pub trait LoadBalancer: Send + Sync + std::fmt::Debug {
    /// Pick one of `backends`, or None if the slice is empty.
    fn next_server(&self, backends: &[String]) -> Option<String>;
}
