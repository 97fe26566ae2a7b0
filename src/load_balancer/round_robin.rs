//! Round-robin load balancing strategy.

use std::sync::atomic::{AtomicUsize, Ordering};

use crate::load_balancer::LoadBalancer;

/// Round-robin selector.
///
/// Every selection advances a shared cursor by one atomic read-modify-write and
/// picks `backends[cursor % len]` using the advanced value, so concurrent
/// callers never see the same cursor value. The cursor wraps on overflow.
#[derive(Debug, Default)]
pub struct RoundRobin {
    cursor: AtomicUsize,
}

impl RoundRobin {
    pub fn new() -> Self {
        Self::default()
    }

    /// Selector whose cursor starts at `cursor`.
    pub fn starting_at(cursor: usize) -> Self {
        Self {
            cursor: AtomicUsize::new(cursor),
        }
    }

    /// Current cursor value.
    pub fn cursor(&self) -> usize {
        self.cursor.load(Ordering::Relaxed)
    }
}

impl LoadBalancer for RoundRobin {
    fn next_server(&self, backends: &[String]) -> Option<String> {
        if backends.is_empty() {
            return None;
        }

        let cursor = self.cursor.fetch_add(1, Ordering::Relaxed).wrapping_add(1);
        Some(backends[cursor % backends.len()].clone())
    }
}
