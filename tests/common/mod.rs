//! Shared utilities for integration testing.
#![allow(dead_code)]

use axum::http::StatusCode;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU16, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};

use balancer_proxy::config::{BalancerConfig, HealthCheckConfig, InitialHealth};

/// Read the request head and return the request target (path and query).
async fn read_request_target(stream: &mut BufReader<TcpStream>) -> Option<String> {
    let mut request_line = String::new();
    stream.read_line(&mut request_line).await.ok()?;
    let target = request_line.split_whitespace().nth(1)?.to_string();

    // Drain headers so closing the socket does not reset the connection.
    loop {
        let mut line = String::new();
        match stream.read_line(&mut line).await {
            Ok(0) | Err(_) => break,
            Ok(_) if line == "\r\n" || line == "\n" => break,
            Ok(_) => {}
        }
    }
    Some(target)
}

async fn write_response(stream: &mut BufReader<TcpStream>, status: u16, body: &str) {
    let reason = StatusCode::from_u16(status)
        .ok()
        .and_then(|s| s.canonical_reason())
        .unwrap_or("Unknown");
    let response = format!(
        "HTTP/1.1 {} {}\r\nContent-Type: text/plain; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        reason,
        body.len(),
        body
    );
    let _ = stream.get_mut().write_all(response.as_bytes()).await;
    let _ = stream.get_mut().shutdown().await;
}

/// Start a programmable mock backend on an ephemeral port.
///
/// `f` receives the request target and returns the status and body.
pub async fn start_programmable_backend<F, Fut>(f: F) -> SocketAddr
where
    F: Fn(String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = (u16, String)> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let f = Arc::new(f);

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((socket, _)) => {
                    let f = f.clone();
                    tokio::spawn(async move {
                        let mut stream = BufReader::new(socket);
                        if let Some(target) = read_request_target(&mut stream).await {
                            let (status, body) = f(target).await;
                            write_response(&mut stream, status, &body).await;
                        }
                    });
                }
                Err(_) => break,
            }
        }
    });

    addr
}

/// A mock backend with a switchable `/health` status and request counters.
#[derive(Clone)]
pub struct MockBackend {
    pub addr: SocketAddr,
    health_status: Arc<AtomicU16>,
    probes: Arc<AtomicUsize>,
    hits: Arc<AtomicUsize>,
    last_target: Arc<Mutex<Option<String>>>,
}

impl MockBackend {
    pub async fn start() -> Self {
        Self::start_with_health_delay(Duration::ZERO).await
    }

    /// Backend whose `/health` answers only after `delay`.
    pub async fn start_with_health_delay(delay: Duration) -> Self {
        let health_status = Arc::new(AtomicU16::new(200));
        let probes = Arc::new(AtomicUsize::new(0));
        let hits = Arc::new(AtomicUsize::new(0));
        let last_target = Arc::new(Mutex::new(None));

        let (hs, pr, ht, lt) = (health_status.clone(), probes.clone(), hits.clone(), last_target.clone());
        let addr = start_programmable_backend(move |target| {
            let (hs, pr, ht, lt) = (hs.clone(), pr.clone(), ht.clone(), lt.clone());
            async move {
                if target == "/health" {
                    pr.fetch_add(1, Ordering::SeqCst);
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                    (hs.load(Ordering::SeqCst), "OK\n".to_string())
                } else {
                    ht.fetch_add(1, Ordering::SeqCst);
                    *lt.lock().unwrap() = Some(target.clone());
                    let status = if target.starts_with("/missing") { 404 } else { 200 };
                    (status, format!("hello from {}", target))
                }
            }
        })
        .await;

        Self {
            addr,
            health_status,
            probes,
            hits,
            last_target,
        }
    }

    pub fn address(&self) -> String {
        self.addr.to_string()
    }

    pub fn set_health(&self, status: u16) {
        self.health_status.store(status, Ordering::SeqCst);
    }

    /// Number of `/health` requests received.
    pub fn probes(&self) -> usize {
        self.probes.load(Ordering::SeqCst)
    }

    /// Number of non-health requests received.
    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }

    pub fn last_target(&self) -> Option<String> {
        self.last_target.lock().unwrap().clone()
    }
}

/// An address on loopback with nothing listening.
pub fn unused_addr() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().to_string()
}

pub fn health_config(interval_ms: u64, initial_state: InitialHealth) -> HealthCheckConfig {
    HealthCheckConfig {
        interval_ms,
        timeout_ms: 1_000,
        initial_state,
        ..HealthCheckConfig::default()
    }
}

/// Config binding every listener to an ephemeral loopback port.
pub fn test_config(interval_ms: u64) -> BalancerConfig {
    let mut config = BalancerConfig::default();
    config.listener.bind_address = "127.0.0.1:0".into();
    config.admin.bind_address = "127.0.0.1:0".into();
    config.health_check = health_config(interval_ms, InitialHealth::Healthy);
    config
}

/// Poll `condition` every 10ms until it holds or `timeout` passes.
pub async fn wait_until<F: Fn() -> bool>(timeout: Duration, condition: F) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}

pub fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}
