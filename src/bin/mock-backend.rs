//! Mock backend servers for local experiments.
//!
//! Each `--port` gets its own server answering `/` and `/health`. Servers can
//! also be started and stopped at runtime from stdin:
//! ```text
//! start 8081
//! stop 8082
//! ```
//! Stopping a server is the quickest way to watch the balancer evict it.

use axum::{extract::State, http::StatusCode, routing::get, Router};
use clap::Parser;
use std::collections::HashMap;
use std::io::{self, BufRead, Write};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use balancer_proxy::lifecycle::{shutdown, signals, Shutdown};

#[derive(Parser)]
#[command(name = "mock-backend")]
#[command(about = "Start mock backends exposing / and /health", long_about = None)]
struct Args {
    /// Port to serve on at startup; repeatable.
    #[arg(short, long = "port")]
    ports: Vec<u16>,

    /// Answer /health with 503.
    #[arg(long)]
    unhealthy: bool,

    /// Do not read start/stop commands from stdin.
    #[arg(long)]
    no_console: bool,
}

struct MockState {
    port: u16,
    healthy: bool,
}

async fn root(State(state): State<Arc<MockState>>) -> String {
    tracing::info!(port = state.port, "Request received");
    format!("Hello from mock server on port {}!", state.port)
}

async fn health(State(state): State<Arc<MockState>>) -> (StatusCode, &'static str) {
    if state.healthy {
        (StatusCode::OK, "OK\n")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "unhealthy\n")
    }
}

const USAGE: &str = "Type 'start <port>' to start a new server or 'stop <port>' to stop an existing server.\n\
Example: start 8081 or stop 8082";

#[derive(Debug, PartialEq, Eq)]
enum Command {
    Start(u16),
    Stop(u16),
}

fn parse_command(line: &str) -> Result<Command, String> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    let [action, port] = parts.as_slice() else {
        return Err("Invalid command. Please use 'start <port>' or 'stop <port>'.".to_string());
    };
    let port: u16 = port.parse().map_err(|_| format!("Invalid port: {}", port))?;

    match *action {
        "start" => Ok(Command::Start(port)),
        "stop" => Ok(Command::Stop(port)),
        _ => Err("Invalid action. Use 'start' or 'stop'.".to_string()),
    }
}

struct RunningServer {
    shutdown: Shutdown,
    task: JoinHandle<io::Result<()>>,
}

/// Mock servers currently running, keyed by port.
struct ServerSet {
    healthy: bool,
    servers: HashMap<u16, RunningServer>,
}

impl ServerSet {
    fn new(healthy: bool) -> Self {
        Self {
            healthy,
            servers: HashMap::new(),
        }
    }

    async fn start(&mut self, port: u16) -> String {
        if self.servers.get(&port).is_some_and(|s| !s.task.is_finished()) {
            return format!("Server on port {} is already running.", port);
        }

        let addr = SocketAddr::from(([127, 0, 0, 1], port));
        let listener = match tokio::net::TcpListener::bind(addr).await {
            Ok(listener) => listener,
            Err(e) => {
                tracing::error!(address = %addr, error = %e, "Failed to bind mock server");
                return format!("Server on port {} failed: {}", port, e);
            }
        };

        let state = Arc::new(MockState {
            port,
            healthy: self.healthy,
        });
        let app = Router::new()
            .route("/", get(root))
            .route("/health", get(health))
            .with_state(state);

        let shutdown = Shutdown::new();
        let stop = shutdown.subscribe();
        let task = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(shutdown::wait(stop))
                .await
        });
        tracing::info!(address = %addr, "Starting mock server");

        self.servers.insert(port, RunningServer { shutdown, task });
        format!("Starting mock server on port {}", port)
    }

    async fn stop(&mut self, port: u16) -> String {
        let Some(server) = self.servers.remove(&port) else {
            return format!("No server running on port {}.", port);
        };

        server.shutdown.trigger();
        match server.task.await {
            Ok(Ok(())) => format!("Server on port {} has been stopped.", port),
            Ok(Err(e)) => format!("Error stopping server on port {}: {}", port, e),
            Err(e) => format!("Error stopping server on port {}: {}", port, e),
        }
    }

    async fn stop_all(&mut self) {
        let ports: Vec<u16> = self.servers.keys().copied().collect();
        for port in ports {
            let reply = self.stop(port).await;
            tracing::info!("{}", reply);
        }
    }

    async fn execute(&mut self, line: &str) -> Option<String> {
        if line.trim().is_empty() {
            return None;
        }
        let reply = match parse_command(line) {
            Ok(Command::Start(port)) => self.start(port).await,
            Ok(Command::Stop(port)) => self.stop(port).await,
            Err(e) => e,
        };
        Some(reply)
    }
}

/// Forward stdin lines to the runtime from a plain thread.
fn spawn_stdin_reader(tx: mpsc::UnboundedSender<String>) {
    std::thread::spawn(move || {
        let stdin = io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            if tx.send(line).is_err() {
                break;
            }
        }
    });
}

fn prompt() {
    print!("> ");
    let _ = io::stdout().flush();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mock_backend=info".into()),
        )
        .init();

    let mut servers = ServerSet::new(!args.unhealthy);
    for &port in &args.ports {
        println!("{}", servers.start(port).await);
    }

    let (tx, mut commands) = mpsc::unbounded_channel();
    if !args.no_console {
        println!("Mock Server Management CLI");
        println!("{}", USAGE);
        prompt();
        spawn_stdin_reader(tx);
    } else {
        drop(tx);
    }

    let signal = signals::wait_for_signal();
    tokio::pin!(signal);
    let mut console_open = !args.no_console;

    loop {
        tokio::select! {
            _ = &mut signal => break,
            line = commands.recv(), if console_open => match line {
                Some(line) => {
                    if let Some(reply) = servers.execute(&line).await {
                        println!("{}", reply);
                    }
                    prompt();
                }
                // Keep serving until a signal once stdin closes.
                None => console_open = false,
            },
        }
    }

    servers.stop_all().await;
    Ok(())
}
