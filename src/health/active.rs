//! Active health checking.
//!
//! # Responsibilities
//! - Track the liveness of every registered backend
//! - Periodically probe all backends concurrently
//! - Publish results through narrow, thread-safe accessors
//! - Stop cleanly: no probe outlives `stop()`

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use tokio::sync::broadcast;
use tokio::task::{JoinError, JoinHandle};
use tokio::time::{self, MissedTickBehavior};
use tokio_util::task::TaskTracker;

use crate::config::HealthCheckConfig;
use crate::health::state::{HealthState, Liveness};
use crate::lifecycle::Shutdown;
use crate::lock;

/// Result of a single probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// Backend answered `200 OK`.
    Healthy,
    /// Backend answered with any other status.
    Status(StatusCode),
    /// Connection refused, reset, DNS failure, ...
    Transport(String),
    /// No response within the probe timeout.
    Timeout,
    /// The probe request could not be built for this address.
    InvalidRequest(String),
}

impl ProbeOutcome {
    pub fn is_healthy(&self) -> bool {
        matches!(self, ProbeOutcome::Healthy)
    }
}

impl fmt::Display for ProbeOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProbeOutcome::Healthy => write!(f, "healthy"),
            ProbeOutcome::Status(status) => write!(f, "non-success status {}", status),
            ProbeOutcome::Transport(e) => write!(f, "connection error: {}", e),
            ProbeOutcome::Timeout => write!(f, "timeout"),
            ProbeOutcome::InvalidRequest(e) => write!(f, "invalid probe request: {}", e),
        }
    }
}

/// State shared between the monitor handle, its loop and every probe task.
struct MonitorState {
    config: HealthCheckConfig,
    client: Client<HttpConnector, Body>,
    liveness: Mutex<HashMap<String, Liveness>>,
    generation: AtomicU64,
    /// Every probe task, whether started by the loop or by `check_all`.
    probes: TaskTracker,
}

impl MonitorState {
    /// Spawn one probe per tracked backend.
    fn spawn_cycle(self: &Arc<Self>) -> Vec<JoinHandle<()>> {
        let targets: Vec<(String, u64)> = lock(&self.liveness)
            .iter()
            .map(|(address, entry)| (address.clone(), entry.generation))
            .collect();

        tracing::trace!(backends = targets.len(), "Starting probe cycle");

        targets
            .into_iter()
            .map(|(address, generation)| {
                let state = Arc::clone(self);
                self.probes.spawn(async move {
                    let outcome = state.probe(&address).await;
                    state.record(&address, generation, &outcome);
                })
            })
            .collect()
    }

    async fn probe(&self, address: &str) -> ProbeOutcome {
        let uri = format!("http://{}{}", address, self.config.path);

        let request = match Request::builder()
            .method(Method::GET)
            .uri(uri)
            .header(header::USER_AGENT, "balancer-proxy-health-check")
            .body(Body::empty())
        {
            Ok(req) => req,
            Err(e) => return ProbeOutcome::InvalidRequest(e.to_string()),
        };

        match time::timeout(self.config.timeout(), self.client.request(request)).await {
            Ok(Ok(response)) if response.status() == StatusCode::OK => ProbeOutcome::Healthy,
            Ok(Ok(response)) => ProbeOutcome::Status(response.status()),
            Ok(Err(e)) => ProbeOutcome::Transport(e.to_string()),
            Err(_) => ProbeOutcome::Timeout,
        }
    }

    /// Apply a probe result, unless the backend was deregistered meanwhile.
    fn record(&self, address: &str, generation: u64, outcome: &ProbeOutcome) {
        let next = HealthState::from(outcome.is_healthy());

        let previous = {
            let mut liveness = lock(&self.liveness);
            match liveness.get_mut(address) {
                Some(entry) if entry.generation == generation => {
                    std::mem::replace(&mut entry.state, next)
                }
                _ => {
                    tracing::debug!(address = %address, "Discarding probe result for deregistered backend");
                    return;
                }
            }
        };

        tracing::debug!(address = %address, outcome = %outcome, "Health check completed");

        if previous != next {
            if next.is_routable() {
                tracing::info!(address = %address, previous = ?previous, "Backend is healthy");
            } else {
                tracing::warn!(address = %address, previous = ?previous, outcome = %outcome, "Backend is down");
            }
        }
    }
}

/// Periodic health monitor owning the liveness map.
pub struct HealthMonitor {
    state: Arc<MonitorState>,
    shutdown: Shutdown,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl HealthMonitor {
    pub fn new(config: HealthCheckConfig) -> Self {
        let client = Client::builder(TokioExecutor::new())
            .build(HttpConnector::new());

        Self {
            state: Arc::new(MonitorState {
                config,
                client,
                liveness: Mutex::new(HashMap::new()),
                generation: AtomicU64::new(0),
                probes: TaskTracker::new(),
            }),
            shutdown: Shutdown::new(),
            task: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &HealthCheckConfig {
        &self.state.config
    }

    /// Start tracking `address`. Returns false if it was already tracked.
    pub fn add_server(&self, address: &str) -> bool {
        let mut liveness = lock(&self.state.liveness);
        if liveness.contains_key(address) {
            return false;
        }
        let generation = self.state.generation.fetch_add(1, Ordering::Relaxed);
        liveness.insert(
            address.to_string(),
            Liveness {
                state: self.state.config.initial_state.into(),
                generation,
            },
        );
        true
    }

    /// Stop tracking `address`. Returns false if it was not tracked.
    pub fn remove_server(&self, address: &str) -> bool {
        lock(&self.state.liveness).remove(address).is_some()
    }

    /// True only for a tracked backend currently believed healthy.
    pub fn is_healthy(&self, address: &str) -> bool {
        lock(&self.state.liveness)
            .get(address)
            .is_some_and(|entry| entry.state.is_routable())
    }

    pub fn state_of(&self, address: &str) -> Option<HealthState> {
        lock(&self.state.liveness).get(address).map(|entry| entry.state)
    }

    /// Filter `addresses` down to the healthy ones under a single lock,
    /// preserving their order.
    pub fn healthy_among<'a, I>(&self, addresses: I) -> Vec<String>
    where
        I: IntoIterator<Item = &'a String>,
    {
        let liveness = lock(&self.state.liveness);
        addresses
            .into_iter()
            .filter(|address| {
                liveness
                    .get(address.as_str())
                    .is_some_and(|entry| entry.state.is_routable())
            })
            .cloned()
            .collect()
    }

    /// Tracked addresses, sorted.
    pub fn tracked(&self) -> Vec<String> {
        let mut addresses: Vec<String> = lock(&self.state.liveness).keys().cloned().collect();
        addresses.sort();
        addresses
    }

    /// Current state of every tracked backend.
    pub fn snapshot(&self) -> HashMap<String, HealthState> {
        lock(&self.state.liveness)
            .iter()
            .map(|(address, entry)| (address.clone(), entry.state))
            .collect()
    }

    pub fn is_running(&self) -> bool {
        lock(&self.task)
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Launch the periodic loop in the background.
    pub fn start(&self) {
        let mut task = lock(&self.task);
        if task.as_ref().is_some_and(|handle| !handle.is_finished()) {
            tracing::warn!("Health monitor already running");
            return;
        }

        let shutdown = self.shutdown.subscribe();
        let state = Arc::clone(&self.state);
        *task = Some(tokio::spawn(run(state, shutdown)));
    }

    /// Signal the loop to stop and wait until it and every in-flight probe
    /// have exited, including probes started by `check_all`.
    pub async fn stop(&self) {
        // Trigger under the task lock so a concurrent `start` cannot slip a
        // loop in between that this call would never join.
        let handle = {
            let mut task = lock(&self.task);
            let handle = task.take();
            if handle.is_some() {
                self.shutdown.trigger();
            }
            handle
        };

        match handle {
            Some(handle) => {
                if let Err(e) = handle.await {
                    tracing::error!(error = %e, "Health monitor task failed");
                }
            }
            None => tracing::debug!("Health monitor not running"),
        }

        let probes = &self.state.probes;
        if !probes.is_empty() {
            tracing::debug!(in_flight = probes.len(), "Waiting for in-flight probes");
        }
        probes.close();
        probes.wait().await;
        tracing::info!("Health monitor stopped");
    }

    /// Run one probe cycle now and wait for every probe to finish.
    pub async fn check_all(&self) {
        for probe in self.state.spawn_cycle() {
            log_probe_join(probe.await);
        }
    }
}

async fn run(state: Arc<MonitorState>, mut shutdown: broadcast::Receiver<()>) {
    tracing::info!(
        interval_ms = state.config.interval_ms,
        timeout_ms = state.config.timeout_ms,
        path = %state.config.path,
        "Health monitor starting"
    );

    let mut ticker = time::interval(state.config.interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            // Shutdown wins over a tick that is already due.
            biased;
            _ = shutdown.recv() => {
                tracing::info!("Health monitor received shutdown signal, exiting loop");
                break;
            }
            _ = ticker.tick() => {
                // Probes run detached; `stop` waits on the tracker.
                state.spawn_cycle();
            }
        }
    }
}

fn log_probe_join(result: Result<(), JoinError>) {
    if let Err(e) = result {
        tracing::error!(error = %e, "Probe task failed");
    }
}
