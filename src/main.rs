//! balancer-proxy
//!
//! ```text
//!                  ┌──────────────────────────────────────────────┐
//!   Client ───────▶│ http::server ──▶ http::dispatch ─────────────┼──▶ Backend
//!                  │                       │                      │
//!                  │                       ▼                      │
//!                  │   load_balancer::pool ──▶ round_robin        │
//!                  │        ▲          │                          │
//!                  │        │          ▼                          │
//!   admin / stdin ─┼────────┘   health::active ── GET /health ────┼──▶ Backends
//!                  └──────────────────────────────────────────────┘
//! ```

use clap::Parser;
use std::io;
use std::path::PathBuf;

use balancer_proxy::admin::console;
use balancer_proxy::config::{load_config, validate_config, BalancerConfig, ConfigError};
use balancer_proxy::lifecycle::{signals, startup, Shutdown};
use balancer_proxy::observability::logging;

#[derive(Parser)]
#[command(name = "balancer-proxy")]
#[command(about = "Round-robin HTTP load balancer with active health checks", long_about = None)]
struct Args {
    /// TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Proxy listen address (overrides the config file).
    #[arg(short, long)]
    bind: Option<String>,

    /// Health check interval in milliseconds.
    #[arg(long)]
    interval_ms: Option<u64>,

    /// Backend to register at startup; repeatable.
    #[arg(long = "backend")]
    backends: Vec<String>,

    /// Do not serve the admin API.
    #[arg(long)]
    no_admin: bool,

    /// Do not read management commands from stdin.
    #[arg(long)]
    no_console: bool,
}

impl Args {
    fn into_config(self) -> Result<(BalancerConfig, bool), ConfigError> {
        let mut config = match &self.config {
            Some(path) => load_config(path)?,
            None => BalancerConfig::default(),
        };

        if let Some(bind) = self.bind {
            config.listener.bind_address = bind;
        }
        if let Some(interval_ms) = self.interval_ms {
            config.health_check.interval_ms = interval_ms;
        }
        for backend in self.backends {
            if !config.backends.contains(&backend) {
                config.backends.push(backend);
            }
        }
        if self.no_admin {
            config.admin.enabled = false;
        }

        validate_config(&config).map_err(ConfigError::Validation)?;
        Ok((config, !self.no_console))
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let (config, console_enabled) = Args::parse().into_config()?;

    logging::init(&config.observability);
    tracing::info!("balancer-proxy v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        interval_ms = config.health_check.interval_ms,
        timeout_ms = config.health_check.timeout_ms,
        initial_state = ?config.health_check.initial_state,
        "Configuration loaded"
    );

    let shutdown = Shutdown::new();
    let running = startup::start(&config, &shutdown).await?;

    if console_enabled {
        let balancer = running.balancer().clone();
        std::thread::spawn(move || {
            if let Err(e) = console::run_console(&balancer, io::stdin().lock(), io::stdout()) {
                tracing::error!(error = %e, "Console failed");
            }
        });
    }

    signals::wait_for_signal().await;
    shutdown.trigger();
    running.wait().await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
