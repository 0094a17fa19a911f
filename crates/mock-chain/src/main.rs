//! Mock chain server binary.

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use zkbid_circuit::DEFAULT_CIRCUIT_LABEL;
use zkbid_mock_chain::MockChainServer;
use zkbid_module::LedgerGenesisConfig;

#[derive(Parser)]
#[command(name = "zkbid-mock-chain")]
#[command(about = "Local JSON-RPC ledger for sealed-bid auctions")]
struct Cli {
    /// Address to listen on
    #[arg(long, default_value = "127.0.0.1:9944")]
    addr: SocketAddr,

    /// Genesis config (JSON)
    #[arg(long)]
    genesis: Option<PathBuf>,
}

fn load_genesis(path: Option<&PathBuf>) -> Result<LedgerGenesisConfig> {
    let mut genesis: LedgerGenesisConfig = match path {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))?
        }
        None => LedgerGenesisConfig::default(),
    };

    if genesis.vk_hash.is_none() {
        let (_, vk) = zkbid_circuit::setup(DEFAULT_CIRCUIT_LABEL);
        genesis.vk_hash = Some(vk.hash());
        info!("Registered default circuit verification key");
    }
    Ok(genesis)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("zkbid_mock_chain=info".parse()?)
                .add_directive("jsonrpsee=warn".parse()?),
        )
        .init();

    let cli = Cli::parse();
    let genesis = load_genesis(cli.genesis.as_ref())?;
    if let Some(vk_hash) = genesis.vk_hash {
        info!(vk_hash = %hex::encode(vk_hash), "Genesis loaded");
    }

    let server = MockChainServer::new(&genesis)?;
    let (addr, handle) = zkbid_mock_chain::start(cli.addr, server).await?;

    info!("Mock chain listening on {}. Press Ctrl+C to stop.", addr);

    tokio::signal::ctrl_c().await?;

    info!("Shutting down...");
    handle.stop()?;
    handle.stopped().await;

    Ok(())
}
