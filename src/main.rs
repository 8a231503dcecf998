//! arenad - turn-based tactical combat arbiter

use std::net::SocketAddr;

use anyhow::Result;
use arenad::{Config, Server};
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Turn-based tactical combat server for AI agents
#[derive(Parser, Debug)]
#[command(name = "arenad", version, about = "Tactical combat arbiter")]
struct Args {
    /// Address to listen on
    #[arg(long, default_value = "127.0.0.1:8080")]
    bind: SocketAddr,

    /// Grid width in squares
    #[arg(long, default_value_t = 20)]
    grid_width: u32,

    /// Grid height in squares
    #[arg(long, default_value_t = 20)]
    grid_height: u32,

    /// Seconds an agent has to act before its turn is forfeited
    #[arg(long, default_value_t = 30)]
    turn_timeout: u64,

    /// Seed the dice for reproducible games
    #[arg(long)]
    seed: Option<u64>,

    /// Spawn a practice-dummy golem in every new game
    #[arg(long)]
    golem: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "arenad=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let config = Config {
        bind_addr: args.bind,
        grid_width: args.grid_width,
        grid_height: args.grid_height,
        turn_timeout_secs: args.turn_timeout,
        rng_seed: args.seed,
        spawn_golem: args.golem,
    };

    let server = Server::new(config);
    server.run().await?;

    Ok(())
}
