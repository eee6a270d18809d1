//! CLI implementation for ethreader
//!
//! Operator tool for reading single blocks from a node. All commands output
//! pretty JSON.

use crate::cache::AssetCache;
use crate::config::{load_config, ReaderConfig, TraceFlavor};
use crate::reader::BlockReader;
use crate::rpc::RpcClient;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// Ethereum block reader
#[derive(Parser)]
#[command(name = "ethreader")]
#[command(about = "Read Ethereum blocks into reconciled balance-change events")]
pub struct Cli {
    /// Path to a JSON config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// RPC endpoint URL (overrides the config file)
    #[arg(short, long)]
    rpc_url: Option<String>,

    /// Trace endpoint flavor (overrides the config file)
    #[arg(long, value_enum)]
    trace_flavor: Option<TraceFlavor>,

    /// Confirmation depth for `irreversible` (overrides the config file)
    #[arg(long)]
    confirmation_depth: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Read and reconcile the block at a height
    Read {
        /// Block number
        height: u64,
    },
    /// Report the last irreversible block
    Irreversible,
}

impl Cli {
    /// Config file values with command-line overrides applied.
    fn resolve_config(&self) -> Result<ReaderConfig> {
        let mut config = match &self.config {
            Some(path) => load_config(path)?,
            None => ReaderConfig::default(),
        };

        if let Some(url) = &self.rpc_url {
            config.node_url = url.clone();
        }
        if let Some(flavor) = self.trace_flavor {
            config.trace_flavor = flavor;
        }
        if let Some(depth) = self.confirmation_depth {
            config.confirmation_depth = depth;
        }

        config.validate()?;
        Ok(config)
    }
}

async fn execute(command: &Commands, config: ReaderConfig) -> Result<Value> {
    let rpc = Arc::new(RpcClient::new(config.node_url.clone(), config.trace_flavor));
    let assets = Arc::new(AssetCache::new(rpc.clone(), config.cache_capacity()?));
    let reader = BlockReader::new(rpc.clone(), rpc, assets, config);

    let result = match command {
        Commands::Read { height } => {
            let outcome = reader
                .read_block(*height)
                .await
                .with_context(|| format!("Failed to read block {}", height))?;
            serde_json::to_value(&outcome)?
        }
        Commands::Irreversible => {
            let block = reader
                .last_irreversible()
                .await
                .context("Failed to get irreversible block")?;
            serde_json::to_value(block)?
        }
    };
    Ok(result)
}

/// Run the CLI command and print JSON output.
pub async fn run() -> Result<()> {
    let cli = Cli::parse();
    let config = cli.resolve_config()?;
    info!(node = %config.node_url, flavor = ?config.trace_flavor, "Connecting to node");

    let result = tokio::select! {
        result = execute(&cli.command, config) => result?,
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, aborting");
            return Ok(());
        }
    };

    // Pretty print JSON
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}
