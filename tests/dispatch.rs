//! Selection and forwarding against live mock backends.

use axum::body::Body;
use axum::http::{header, HeaderMap, Response, StatusCode, Uri};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use balancer_proxy::config::{HealthCheckConfig, InitialHealth, TimeoutConfig};
use balancer_proxy::http::{Dispatcher, HttpServer, X_SERVED_BY};
use balancer_proxy::load_balancer::RoundRobin;
use balancer_proxy::{Balancer, DispatchError, Shutdown};

mod common;

use common::{health_config, http_client, start_programmable_backend, unused_addr, MockBackend};

fn balancer_at(cursor: usize) -> Arc<Balancer> {
    Arc::new(Balancer::with_selector(
        health_config(10_000, InitialHealth::Healthy),
        Box::new(RoundRobin::starting_at(cursor)),
    ))
}

async fn body_text(response: Response<Body>) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), 64 * 1024).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

async fn served_by(dispatcher: &Dispatcher, path: &str) -> String {
    let uri: Uri = path.parse().unwrap();
    let response = dispatcher.dispatch(&uri, &HeaderMap::new()).await.unwrap();
    response.headers()[X_SERVED_BY].to_str().unwrap().to_string()
}

#[tokio::test]
async fn test_consecutive_dispatches_visit_each_backend_once() {
    let backends = vec![
        MockBackend::start().await,
        MockBackend::start().await,
        MockBackend::start().await,
        MockBackend::start().await,
    ];
    let balancer = balancer_at(0);
    for backend in &backends {
        balancer.add_server(&backend.address()).unwrap();
    }
    let dispatcher = Dispatcher::new(balancer, Duration::from_secs(2));

    let mut picks = Vec::new();
    for _ in 0..backends.len() {
        picks.push(served_by(&dispatcher, "/").await);
    }

    // Cursor 0 advances to 1 first: order is b1, b2, b3, b0.
    let expected: Vec<String> = (1..=backends.len())
        .map(|i| backends[i % backends.len()].address())
        .collect();
    assert_eq!(picks, expected);
    assert!(backends.iter().all(|b| b.hits() == 1));
}

#[tokio::test]
async fn test_unhealthy_backend_is_skipped() {
    let a = MockBackend::start().await;
    let b = MockBackend::start().await;
    let c = MockBackend::start().await;
    b.set_health(500);

    let balancer = balancer_at(1);
    for backend in [&a, &b, &c] {
        balancer.add_server(&backend.address()).unwrap();
    }
    balancer.check_now().await;
    assert!(!balancer.monitor().is_healthy(&b.address()));

    let dispatcher = Dispatcher::new(balancer, Duration::from_secs(2));
    let mut picks = Vec::new();
    for _ in 0..5 {
        picks.push(served_by(&dispatcher, "/").await);
    }

    assert_eq!(
        picks,
        [a.address(), c.address(), a.address(), c.address(), a.address()]
    );
    assert_eq!(b.hits(), 0);
}

#[tokio::test]
async fn test_no_healthy_backend_means_no_forwarding() {
    let a = MockBackend::start().await;
    let b = MockBackend::start().await;
    a.set_health(503);
    b.set_health(500);

    let balancer = balancer_at(0);
    balancer.add_server(&a.address()).unwrap();
    balancer.add_server(&b.address()).unwrap();
    balancer.check_now().await;

    let dispatcher = Dispatcher::new(balancer.clone(), Duration::from_secs(2));
    let uri: Uri = "/".parse().unwrap();
    for _ in 0..5 {
        let err = dispatcher.dispatch(&uri, &HeaderMap::new()).await.unwrap_err();
        assert!(matches!(err, DispatchError::NoHealthyBackend));
    }

    assert_eq!(a.hits() + b.hits(), 0);
}

#[tokio::test]
async fn test_relays_status_content_type_and_path() {
    let backend = MockBackend::start().await;
    let balancer = balancer_at(0);
    balancer.add_server(&backend.address()).unwrap();
    let dispatcher = Dispatcher::new(balancer, Duration::from_secs(2));

    let uri: Uri = "/missing/page?x=1".parse().unwrap();
    let response = dispatcher.dispatch(&uri, &HeaderMap::new()).await.unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "text/plain; charset=utf-8");
    assert_eq!(body_text(response).await, format!("Response from server: {}", backend.address()));
    assert_eq!(backend.last_target().as_deref(), Some("/missing/page?x=1"));
}

#[tokio::test]
async fn test_unreachable_backend_is_not_retried() {
    let dead = unused_addr();
    let live = MockBackend::start().await;

    // Optimistic policy and no probing: the dead backend still looks live.
    let balancer = balancer_at(0);
    balancer.add_server(&live.address()).unwrap();
    balancer.add_server(&dead).unwrap();
    let dispatcher = Dispatcher::new(balancer, Duration::from_secs(2));

    // Cursor 0 advances to 1: the dead backend is selected first.
    let uri: Uri = "/".parse().unwrap();
    let err = dispatcher.dispatch(&uri, &HeaderMap::new()).await.unwrap_err();
    assert!(matches!(err, DispatchError::Unreachable { .. }));
    assert_eq!(err.backend(), Some(dead.as_str()));
    assert_eq!(live.hits(), 0);
}

#[tokio::test]
async fn test_slow_backend_times_out() {
    let addr = start_programmable_backend(|_| async {
        tokio::time::sleep(Duration::from_millis(500)).await;
        (200, "late".to_string())
    })
    .await;

    let balancer = balancer_at(0);
    balancer.add_server(&addr.to_string()).unwrap();
    let dispatcher = Dispatcher::new(balancer, Duration::from_millis(100));

    let uri: Uri = "/".parse().unwrap();
    let err = dispatcher.dispatch(&uri, &HeaderMap::new()).await.unwrap_err();
    assert!(matches!(err, DispatchError::Timeout { .. }));
}

#[tokio::test]
async fn test_http_server_maps_failures_to_503() {
    let balancer = Arc::new(Balancer::new(HealthCheckConfig::default()));
    let server = HttpServer::new(balancer.clone(), &TimeoutConfig { forward_ms: 1_000 });
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let proxy_addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();
    let task = tokio::spawn(server.run(listener, shutdown.subscribe()));

    let client = http_client();
    let url = format!("http://{}/", proxy_addr);

    let res = client.get(&url).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert!(res.headers().contains_key("x-request-id"));
    assert_eq!(res.text().await.unwrap(), "No servers available");

    balancer.add_server(&unused_addr()).unwrap();
    let res = client.get(&url).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(res.text().await.unwrap(), "Server not reachable");

    shutdown.trigger();
    task.await.unwrap().unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_dispatch_with_membership_churn() {
    let backends = vec![
        MockBackend::start().await,
        MockBackend::start().await,
        MockBackend::start().await,
        MockBackend::start().await,
    ];
    let mut candidates: Vec<String> = backends.iter().map(MockBackend::address).collect();
    candidates.push(unused_addr());
    let known: Arc<HashSet<String>> = Arc::new(candidates.iter().cloned().collect());

    let balancer = Arc::new(Balancer::new(HealthCheckConfig {
        timeout_ms: 500,
        ..health_config(10_000, InitialHealth::Healthy)
    }));
    for address in &candidates[..2] {
        balancer.add_server(address).unwrap();
    }

    let mutator = {
        let balancer = balancer.clone();
        let candidates = candidates.clone();
        tokio::spawn(async move {
            let mut rng = StdRng::seed_from_u64(7);
            for round in 0..200 {
                let address = &candidates[rng.gen_range(0..candidates.len())];
                if rng.gen_bool(0.5) {
                    balancer.add_server(address).unwrap();
                } else {
                    balancer.remove_server(address);
                }
                if round % 20 == 0 {
                    balancer.check_now().await;
                }
                tokio::task::yield_now().await;
            }
        })
    };

    let dispatcher = Dispatcher::new(balancer.clone(), Duration::from_millis(500));
    let mut workers = Vec::new();
    for _ in 0..8 {
        let dispatcher = dispatcher.clone();
        let known = known.clone();
        workers.push(tokio::spawn(async move {
            let uri: Uri = "/".parse().unwrap();
            for _ in 0..25 {
                match dispatcher.dispatch(&uri, &HeaderMap::new()).await {
                    Ok(response) => {
                        let backend = response.headers()[X_SERVED_BY].to_str().unwrap().to_string();
                        assert!(known.contains(&backend));
                    }
                    Err(DispatchError::NoHealthyBackend) => {}
                    Err(DispatchError::Unreachable { address, .. })
                    | Err(DispatchError::Timeout { address }) => {
                        assert!(known.contains(&address));
                    }
                    Err(e) => panic!("unexpected dispatch error: {e}"),
                }
            }
        }));
    }

    mutator.await.unwrap();
    for worker in workers {
        worker.await.unwrap();
    }

    let mut registered = balancer.pool().addresses();
    registered.sort();
    assert_eq!(registered, balancer.monitor().tracked());
}
