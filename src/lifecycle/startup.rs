//! Startup orchestration.
//!
//! # Responsibilities
//! - Build the balancing context and register configured backends
//! - Bind listeners (proxy, optional admin API)
//! - Start the health monitor, then begin accepting traffic
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Listeners are bound before anything is spawned, so a bind failure
//!   leaves nothing running
//! - Shutdown drains the servers first, then stops the health monitor

use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use crate::admin::{self, AdminState};
use crate::balancer::Balancer;
use crate::config::{AddressError, BalancerConfig};
use crate::http::HttpServer;
use crate::lifecycle::Shutdown;

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid backend in configuration: {0}")]
    Backend(#[from] AddressError),
}

/// Build the balancing context and register the configured backends.
pub fn build_balancer(config: &BalancerConfig) -> Result<Arc<Balancer>, StartupError> {
    let balancer = Arc::new(Balancer::new(config.health_check.clone()));
    for address in &config.backends {
        balancer.add_server(address)?;
    }
    Ok(balancer)
}

async fn bind(address: &str) -> Result<TcpListener, StartupError> {
    TcpListener::bind(address)
        .await
        .map_err(|source| StartupError::Bind {
            address: address.to_string(),
            source,
        })
}

type ServerTask = JoinHandle<Result<(), std::io::Error>>;

/// Handles to the running services.
pub struct Running {
    balancer: Arc<Balancer>,
    proxy_addr: SocketAddr,
    admin_addr: Option<SocketAddr>,
    proxy: ServerTask,
    admin: Option<ServerTask>,
}

/// Start every service. They run until `shutdown` is triggered.
pub async fn start(config: &BalancerConfig, shutdown: &Shutdown) -> Result<Running, StartupError> {
    let balancer = build_balancer(config)?;

    let listener = bind(&config.listener.bind_address).await?;
    let admin_listener = if config.admin.enabled {
        Some(bind(&config.admin.bind_address).await?)
    } else {
        None
    };

    let local_addr = |l: &TcpListener, address: &str| {
        l.local_addr().map_err(|source| StartupError::Bind {
            address: address.to_string(),
            source,
        })
    };
    let proxy_addr = local_addr(&listener, &config.listener.bind_address)?;
    let admin_addr = match &admin_listener {
        Some(l) => Some(local_addr(l, &config.admin.bind_address)?),
        None => None,
    };

    balancer.start();

    let admin = admin_listener.map(|listener| {
        let state = AdminState::new(balancer.clone(), config.admin.api_key.clone());
        tokio::spawn(admin::serve(listener, state, shutdown.subscribe()))
    });

    let server = HttpServer::new(balancer.clone(), &config.timeouts);
    let proxy = tokio::spawn(server.run(listener, shutdown.subscribe()));

    tracing::info!(
        proxy = %proxy_addr,
        admin = ?admin_addr,
        backends = balancer.pool().len(),
        "Balancer started"
    );

    Ok(Running {
        balancer,
        proxy_addr,
        admin_addr,
        proxy,
        admin,
    })
}

impl Running {
    pub fn balancer(&self) -> &Arc<Balancer> {
        &self.balancer
    }

    pub fn proxy_addr(&self) -> SocketAddr {
        self.proxy_addr
    }

    pub fn admin_addr(&self) -> Option<SocketAddr> {
        self.admin_addr
    }

    /// Wait for the servers to drain, then stop the health monitor.
    pub async fn wait(self) -> Result<(), std::io::Error> {
        let proxy = join(self.proxy).await;
        let admin = match self.admin {
            Some(task) => join(task).await,
            None => Ok(()),
        };

        self.balancer.stop().await;
        proxy.and(admin)
    }
}

async fn join(task: ServerTask) -> Result<(), std::io::Error> {
    task.await.map_err(std::io::Error::other)?
}
