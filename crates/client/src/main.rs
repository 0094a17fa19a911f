//! `zkbid`: command-line bidder for zero-knowledge gated auctions.
//!
//! Talks to the ledger over JSON-RPC. Bid secrets are kept under the data
//! directory between commit and reveal.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use zkbid_circuit::DEFAULT_CIRCUIT_LABEL;
use zkbid_client::{
    AttestationRelay, BidCommitmentManager, CircuitProver, ClientConfig, FileSecretStore,
    HttpVerificationNetwork, Ledger, ManualClock, NewAuction, PhaseClock, ProofPipeline,
    RpcLedger, SimulatedNetwork, VerificationNetwork,
};
use zkbid_types::rpc::decode_address;
use zkbid_types::{Address, Auction, BidSecret, NftAsset, Salt};

#[derive(Parser)]
#[command(name = "zkbid")]
#[command(about = "Sealed-bid auctions gated by zero-knowledge bid proofs")]
struct Cli {
    /// Ledger JSON-RPC endpoint
    #[arg(long, env = "ZKBID_RPC")]
    rpc: Option<String>,

    /// Proof-verification service; bids are attested locally if unset
    #[arg(long, env = "ZKBID_VERIFIER_URL")]
    verifier_url: Option<String>,

    /// Directory holding bid secrets
    #[arg(long, env = "ZKBID_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// JSON config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Address used to publish attestation roots when attesting locally
    #[arg(long, env = "ZKBID_RELAYER")]
    relayer: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new auction
    CreateAuction {
        /// Seller address (hex)
        #[arg(long)]
        sender: String,

        /// Collateral NFT contract (hex)
        #[arg(long)]
        nft_contract: String,

        #[arg(long)]
        token_id: u64,

        #[arg(long, default_value = "1")]
        min_bid: u64,

        /// Defaults to the ledger's current timestamp
        #[arg(long)]
        start_time: Option<u64>,

        /// Commit phase length in seconds
        #[arg(long, default_value = "3600")]
        commit_duration: u64,

        /// Reveal phase length in seconds
        #[arg(long, default_value = "3600")]
        reveal_duration: u64,
    },

    /// Prove and commit a sealed bid; the deposit equals the bid
    Commit {
        #[arg(long)]
        sender: String,

        #[arg(long)]
        auction_id: u64,

        #[arg(long)]
        bid: u64,
    },

    /// Reveal a committed bid
    Reveal {
        #[arg(long)]
        sender: String,

        #[arg(long)]
        auction_id: u64,

        /// Explicit opening; the stored secret is used if omitted
        #[arg(long, requires = "salt")]
        bid: Option<u64>,

        #[arg(long, requires = "bid")]
        salt: Option<String>,
    },

    /// Close an auction and pay out
    Finalize {
        #[arg(long)]
        sender: String,

        #[arg(long)]
        auction_id: u64,
    },

    /// Withdraw credited refunds and proceeds
    Withdraw {
        #[arg(long)]
        sender: String,
    },

    /// Get auction details
    GetAuction {
        #[arg(long)]
        auction_id: u64,
    },

    /// List auctions that are not closed and still within their reveal window
    ListActive,

    /// List all auctions
    ListAuctions {
        #[arg(long, default_value = "0")]
        offset: u64,

        #[arg(long, default_value = "50")]
        limit: u64,
    },

    /// Show the withdrawable balance of an address
    Balance {
        #[arg(long)]
        address: String,
    },

    /// Finalize auctions as their reveal windows end
    WatchFinalize {
        #[arg(long)]
        sender: String,

        /// Poll interval in seconds
        #[arg(long, default_value = "5")]
        interval: u64,
    },

    /// Advance chain time (for testing)
    AdvanceBlock,

    /// Set chain timestamp (for testing)
    SetTimestamp {
        #[arg(long)]
        timestamp: u64,
    },
}

fn parse_address(field: &'static str, s: &str) -> Result<Address> {
    Ok(decode_address(field, s)?)
}

fn load_config(cli: &Cli) -> Result<ClientConfig> {
    let mut config = match &cli.config {
        Some(path) => ClientConfig::load(path)?,
        None => ClientConfig::default(),
    };
    if let Some(rpc) = &cli.rpc {
        config.rpc_url = rpc.clone();
    }
    if let Some(url) = &cli.verifier_url {
        config.verifier_url = Some(url.clone());
    }
    if let Some(dir) = &cli.data_dir {
        config.data_dir = dir.clone();
    }
    Ok(config)
}

/// Client-side clock pinned to the ledger's block timestamp.
struct ChainClock {
    ledger: Arc<RpcLedger>,
    clock: Arc<ManualClock>,
}

impl ChainClock {
    async fn sync(ledger: Arc<RpcLedger>) -> Result<Self> {
        let clock = Arc::new(ManualClock::new(0));
        let chain = Self { ledger, clock };
        chain.refresh().await?;
        Ok(chain)
    }

    async fn refresh(&self) -> Result<u64> {
        let info = self.ledger.block_info().await?;
        self.clock.set(info.timestamp);
        Ok(info.timestamp)
    }

    fn phase_clock(&self) -> PhaseClock {
        PhaseClock::new(self.clock.clone())
    }
}

async fn build_manager(
    config: &ClientConfig,
    ledger: Arc<RpcLedger>,
    clock: PhaseClock,
) -> Result<BidCommitmentManager> {
    let network: Arc<dyn VerificationNetwork> = match &config.verifier_url {
        Some(url) => Arc::new(HttpVerificationNetwork::new(
            url,
            config.pipeline.submit_timeout(),
        )?),
        None => {
            let relay: Arc<dyn AttestationRelay> = ledger.clone();
            Arc::new(SimulatedNetwork::new(Some(relay)))
        }
    };

    let (prover, vk) = CircuitProver::setup(DEFAULT_CIRCUIT_LABEL);
    let pipeline = ProofPipeline::new(Arc::new(prover), network, vk, config.pipeline.clone());

    tokio::fs::create_dir_all(&config.data_dir)
        .await
        .with_context(|| format!("creating {}", config.data_dir.display()))?;
    let store = Arc::new(FileSecretStore::new(config.secrets_path()));

    Ok(BidCommitmentManager::new(
        ledger,
        pipeline,
        store,
        clock,
        &config.pipeline,
    ))
}

fn print_auction(a: &Auction, now: u64) {
    println!("Auction {}:", a.auction_id);
    println!("  Phase: {}", a.phase_at(now));
    println!("  Seller: {}", hex::encode(a.seller));
    println!(
        "  Collateral: {} #{}",
        hex::encode(a.collateral.contract),
        a.collateral.token_id
    );
    println!("  Min Bid: {}", a.min_bid);
    println!("  Start: {}", a.start_time);
    println!("  Commit End: {}", a.commit_end_time);
    println!("  Reveal End: {}", a.reveal_end_time);
    println!("  Commits: {}", a.commits.len());
    if a.closed {
        match a.highest_bidder {
            Some(winner) => println!("  Winner: {}", hex::encode(winner)),
            None => println!("  Closed without a winner"),
        }
    }
}

async fn watch_finalize_cmd(
    ledger: Arc<RpcLedger>,
    sender: Address,
    interval: Duration,
) -> Result<()> {
    let mut ticker = tokio::time::interval(interval);
    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = tokio::signal::ctrl_c() => {
                info!("Stopping finalization watcher");
                return Ok(());
            }
        }

        let pending = match ledger.pending_finalization().await {
            Ok(pending) => pending,
            Err(e) => {
                warn!(error = %e, "Failed to list auctions awaiting finalization");
                continue;
            }
        };
        for auction_id in pending {
            match ledger.finalize_auction(sender, auction_id).await {
                Ok(s) => info!(auction_id, winner = ?s.winner.map(hex::encode), "Auction finalized"),
                Err(e) => warn!(auction_id, error = %e, "Finalization failed"),
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("zkbid=info".parse()?)
                .add_directive("zkbid_client=info".parse()?),
        )
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli)?;
    let mut ledger = RpcLedger::connect(&config.rpc_url)?;
    if let Some(relayer) = &cli.relayer {
        ledger = ledger.with_relayer(parse_address("relayer", relayer)?);
    }
    let ledger = Arc::new(ledger);

    match cli.command {
        Commands::CreateAuction {
            sender,
            nft_contract,
            token_id,
            min_bid,
            start_time,
            commit_duration,
            reveal_duration,
        } => {
            let start_time = match start_time {
                Some(t) => t,
                None => ledger.timestamp().await?,
            };
            let params = NewAuction {
                collateral: NftAsset {
                    contract: parse_address("nft_contract", &nft_contract)?,
                    token_id,
                },
                min_bid,
                start_time,
                commit_duration,
                reveal_duration,
            };
            let auction_id = ledger
                .create_auction(parse_address("sender", &sender)?, params)
                .await?;
            info!(auction_id, "Created auction");
            println!("Auction ID: {}", auction_id);
        }

        Commands::Commit {
            sender,
            auction_id,
            bid,
        } => {
            let chain = ChainClock::sync(ledger.clone()).await?;
            let manager = build_manager(&config, ledger.clone(), chain.phase_clock()).await?;
            let receipt = manager
                .commit(auction_id, parse_address("sender", &sender)?, bid)
                .await
                .map_err(|e| anyhow!("commit failed ({:?}): {}", e.outcome(), e))?;

            println!("Bid committed");
            println!("  Auction ID: {}", receipt.auction_id);
            println!("  Commitment: {}", hex::encode(receipt.commitment));
            println!("  Deposit: {}", receipt.deposit);
            println!("  Attestation: {}", receipt.attestation_id);
        }

        Commands::Reveal {
            sender,
            auction_id,
            bid,
            salt,
        } => {
            let chain = ChainClock::sync(ledger.clone()).await?;
            let manager = build_manager(&config, ledger.clone(), chain.phase_clock()).await?;
            let bidder = parse_address("sender", &sender)?;
            let result = match (bid, salt) {
                (Some(bid_value), Some(salt)) => {
                    let salt: Salt = salt.parse().map_err(|_| anyhow!("invalid salt"))?;
                    manager
                        .reveal_with(auction_id, bidder, BidSecret { bid_value, salt })
                        .await
                }
                _ => manager.reveal(auction_id, bidder).await,
            };
            let receipt = result.map_err(|e| anyhow!("reveal failed ({:?}): {}", e.outcome(), e))?;
            println!("Revealed bid of {} for auction {}", receipt.bid_value, receipt.auction_id);
        }

        Commands::Finalize { sender, auction_id } => {
            let chain = ChainClock::sync(ledger.clone()).await?;
            let manager = build_manager(&config, ledger.clone(), chain.phase_clock()).await?;
            let settlement = manager
                .finalize(auction_id, parse_address("sender", &sender)?)
                .await?;

            println!("Auction {} finalized", settlement.auction_id);
            match (settlement.winner, settlement.winning_bid) {
                (Some(winner), Some(bid)) => {
                    println!("  Winner: {}", hex::encode(winner));
                    println!("  Price: {}", bid);
                }
                _ => println!("  No winning bid"),
            }
            println!("  Refunds: {}", settlement.refunds.len());
            println!("  Forfeited: {}", settlement.forfeited);
        }

        Commands::Withdraw { sender } => {
            let amount = ledger.withdraw(parse_address("sender", &sender)?).await?;
            println!("Withdrew {}", amount);
        }

        Commands::GetAuction { auction_id } => {
            let now = ledger.timestamp().await?;
            match ledger.get_auction(auction_id).await? {
                Some(a) => print_auction(&a, now),
                None => println!("Auction {} not found", auction_id),
            }
        }

        Commands::ListActive => {
            let now = ledger.timestamp().await?;
            let auctions = ledger.get_active_auctions().await?;
            if auctions.is_empty() {
                println!("No active auctions");
            } else {
                println!("Active auctions:");
                for a in auctions {
                    println!(
                        "  [{}] {} - min bid {} ({} commits)",
                        a.auction_id,
                        a.phase_at(now),
                        a.min_bid,
                        a.commits.len()
                    );
                }
            }
        }

        Commands::ListAuctions { offset, limit } => {
            let now = ledger.timestamp().await?;
            let auctions = ledger.list_auctions(offset, limit).await?;
            if auctions.is_empty() {
                println!("No auctions found");
            } else {
                println!("Auctions:");
                for a in auctions {
                    let state = if a.closed {
                        "closed".to_string()
                    } else {
                        a.phase_at(now).to_string()
                    };
                    println!("  [{}] {} ({})", a.auction_id, state, hex::encode(a.seller));
                }
            }
        }

        Commands::Balance { address } => {
            let balance = ledger.balance(&parse_address("address", &address)?).await?;
            println!("Balance: {}", balance);
        }

        Commands::WatchFinalize { sender, interval } => {
            let sender = parse_address("sender", &sender)?;
            watch_finalize_cmd(ledger, sender, Duration::from_secs(interval.max(1))).await?;
        }

        Commands::AdvanceBlock => {
            let info = ledger.advance_block().await?;
            println!("Block advanced: height={}, timestamp={}", info.height, info.timestamp);
        }

        Commands::SetTimestamp { timestamp } => {
            ledger.set_timestamp(timestamp).await?;
            println!("Timestamp set to {}", timestamp);
        }
    }

    Ok(())
}
