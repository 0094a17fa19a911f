//! Finalization keeper.
//!
//! Polls the ledger and closes every auction whose reveal window has ended.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use clap::Parser;
use tracing::info;

use zkbid_client::{FileSecretStore, RpcLedger};
use zkbid_settler::{FinalizationService, SettlerConfig};
use zkbid_types::rpc::decode_address;

#[derive(Parser)]
#[command(name = "zkbid-settler")]
#[command(about = "Finalizes sealed-bid auctions once their reveal window ends")]
struct Cli {
    /// Ledger JSON-RPC endpoint
    #[arg(long, env = "ZKBID_RPC")]
    rpc: Option<String>,

    /// Address (hex) submitting finalize calls
    #[arg(long, env = "ZKBID_SETTLER_CALLER")]
    caller: Option<String>,

    /// Polling interval in seconds
    #[arg(long)]
    interval: Option<u64>,

    /// Bid secret file to purge after finalization
    #[arg(long)]
    secrets: Option<PathBuf>,

    /// JSON config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Run a single pass and exit
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("zkbid_settler=info".parse()?),
        )
        .init();

    let cli = Cli::parse();
    let mut config = match &cli.config {
        Some(path) => SettlerConfig::load(path)?,
        None => SettlerConfig::default(),
    };
    if let Some(rpc) = cli.rpc {
        config.rpc_url = rpc;
    }
    if let Some(caller) = cli.caller {
        config.caller = Some(caller);
    }
    if let Some(interval) = cli.interval {
        config.poll_interval_secs = interval;
    }
    if let Some(secrets) = cli.secrets {
        config.secrets_path = Some(secrets);
    }
    config.validate()?;

    let caller = config
        .caller
        .as_deref()
        .ok_or_else(|| anyhow!("a caller address is required"))?;
    let caller = decode_address("caller", caller)?;

    let ledger = Arc::new(RpcLedger::connect(&config.rpc_url)?);
    let mut service = FinalizationService::new(ledger, caller, config.poll_interval());
    if let Some(path) = &config.secrets_path {
        service = service.with_store(Arc::new(FileSecretStore::new(path)));
    }

    if cli.once {
        let settled = service.run_once().await?;
        info!(count = settled.len(), "Finalization pass complete");
        return Ok(());
    }

    info!(rpc = %config.rpc_url, "Starting finalization service");
    service
        .run(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await;
    Ok(())
}
