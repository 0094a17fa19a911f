//! Proof verification service binary.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use clap::Parser;
use tracing::info;

use zkbid_client::{AttestationRelay, PipelineConfig, RpcLedger, SimulatedNetwork};
use zkbid_types::rpc::decode_address;
use zkbid_verifier::VerifierService;

#[derive(Parser)]
#[command(name = "zkbid-verifier")]
#[command(about = "Verifies bid proofs and issues attestations")]
struct Cli {
    /// Address to listen on
    #[arg(long, default_value = "127.0.0.1:8080")]
    addr: SocketAddr,

    /// Ledger RPC endpoint that confirmed attestation roots are published to
    #[arg(long, env = "ZKBID_RPC")]
    relay_rpc: Option<String>,

    /// Relayer address (hex) registered in the ledger's genesis
    #[arg(long, env = "ZKBID_RELAYER")]
    relayer: Option<String>,

    /// Filler leaves added to each attestation batch
    #[arg(long, default_value = "3")]
    filler_leaves: usize,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("zkbid_verifier=info".parse()?)
                .add_directive("zkbid_client=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    let relay: Option<Arc<dyn AttestationRelay>> = match &cli.relay_rpc {
        Some(url) => {
            let relayer = cli
                .relayer
                .as_deref()
                .ok_or_else(|| anyhow!("--relayer is required with --relay-rpc"))?;
            let ledger = RpcLedger::connect(url)?.with_relayer(decode_address("relayer", relayer)?);
            info!(rpc = %url, "Relaying attestation roots");
            Some(Arc::new(ledger))
        }
        None => None,
    };

    let network = Arc::new(SimulatedNetwork::new(relay).with_filler_leaves(cli.filler_leaves));
    let service = Arc::new(VerifierService::new(network, PipelineConfig::default()));

    let listener = tokio::net::TcpListener::bind(cli.addr).await?;
    zkbid_verifier::serve(listener, service, async {
        let _ = tokio::signal::ctrl_c().await;
    })
    .await?;

    info!("Verifier stopped");
    Ok(())
}
