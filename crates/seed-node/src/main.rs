//! Seed node executable.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use seed_node::{logging, ConfigOverrides, NodeConfig, NodeKey, Seeder, CONFIG_FILE};

const VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), " (", env!("VERGEN_GIT_SHA"), ")");

/// Peer-exchange seed node: crawls the network and hands out peer addresses.
#[derive(Parser, Debug)]
#[command(name = "seed-node")]
#[command(version = VERSION)]
struct Args {
    /// Home directory holding config.toml, the node key and the address book
    #[arg(long, env = "HOME_DIR")]
    home: Option<PathBuf>,

    /// Chain id to join (overrides the config file)
    #[arg(long, env = "CHAIN_ID")]
    chain_id: Option<String>,

    /// Comma separated id@host:port seeds (overrides the config file)
    #[arg(long, env = "SEEDS")]
    seeds: Option<String>,

    /// Log level or filter (overrides the config file; RUST_LOG wins over both)
    #[arg(long, env = "LOG_LEVEL")]
    log_level: Option<String>,

    /// Print this node's id and exit
    #[arg(long)]
    show_node_id: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let home = args.home.unwrap_or_else(default_home);
    let overrides = ConfigOverrides {
        chain_id: args.chain_id,
        seeds: args.seeds,
        log_level: args.log_level,
    };
    let config = NodeConfig::load_with_overrides(&home.join(CONFIG_FILE), overrides)
        .context("failed to load configuration")?;

    if args.show_node_id {
        let key = NodeKey::load_or_generate(&home.join(&config.node_key_file))?;
        println!("{}", key.node_id());
        return Ok(());
    }

    logging::init(&config.log_level)?;
    info!(home = %home.display(), "Using home directory");

    let seeder = Seeder::new(config, &home).await?;
    seeder.start().await?;

    info!("Seed node is running. Press Ctrl+C to stop.");
    wait_for_signal().await?;

    seeder.stop().await
}

fn default_home() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".seed-node")
}

#[cfg(unix)]
async fn wait_for_signal() -> Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut term = signal(SignalKind::terminate()).context("failed to install SIGTERM handler")?;
    tokio::select! {
        res = tokio::signal::ctrl_c() => res.context("failed to listen for Ctrl+C")?,
        _ = term.recv() => {}
    }
    Ok(())
}

#[cfg(not(unix))]
async fn wait_for_signal() -> Result<()> {
    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl+C")
}
