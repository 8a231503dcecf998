//! arenad - turn-based tactical combat arbiter
//!
//! A rules-enforcing game server for AI agents: dice, a square battle grid,
//! d20-style combat resolution, and a thin HTTP/WebSocket surface.

pub mod api;
pub mod engine;
pub mod registry;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::info;

use registry::{GameRegistry, RegistryConfig};

/// Server configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: SocketAddr,
    pub grid_width: u32,
    pub grid_height: u32,
    pub turn_timeout_secs: u64,
    /// Seed for per-game dice; None draws from OS entropy
    pub rng_seed: Option<u64>,
    /// Place a practice-dummy golem in every new game
    pub spawn_golem: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".parse().unwrap(),
            grid_width: 20,
            grid_height: 20,
            turn_timeout_secs: 30,
            rng_seed: None,
            spawn_golem: false,
        }
    }
}

/// The arenad server instance
pub struct Server {
    config: Config,
    registry: Arc<GameRegistry>,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
}

impl Server {
    /// Create a new server instance
    pub fn new(config: Config) -> Self {
        let registry = GameRegistry::shared(RegistryConfig {
            grid_width: config.grid_width,
            grid_height: config.grid_height,
            turn_timeout: Duration::from_secs(config.turn_timeout_secs),
            rng_seed: config.rng_seed,
            spawn_golem: config.spawn_golem,
        });
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        Self {
            config,
            registry,
            shutdown_tx,
            shutdown_rx,
        }
    }

    /// Get the game registry handle
    pub fn registry(&self) -> Arc<GameRegistry> {
        self.registry.clone()
    }

    /// Build the router
    fn router(&self) -> Router {
        api::router(self.registry.clone())
    }

    /// Run the server until shutdown
    pub async fn run(&self) -> Result<()> {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        let local_addr = listener.local_addr()?;
        info!("arenad listening on {}", local_addr);

        let router = self.router();
        let mut shutdown_rx = self.shutdown_rx.clone();

        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                shutdown_rx.changed().await.ok();
            })
            .await?;

        info!("arenad shutdown complete");
        Ok(())
    }

    /// Signal the server to shutdown
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    /// Get the configured bind address
    pub fn bind_addr(&self) -> SocketAddr {
        self.config.bind_addr
    }
}
