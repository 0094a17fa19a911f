//! Finalization service implementation.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use zkbid_client::{Ledger, LedgerError, SecretStore};
use zkbid_types::{Address, Settlement};

#[derive(Debug, Error)]
pub enum SettlerConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("poll interval must be non-zero")]
    ZeroInterval,
}

/// Configuration for the finalization service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SettlerConfig {
    /// Ledger JSON-RPC endpoint
    pub rpc_url: String,
    /// Hex address that signs finalize calls
    pub caller: Option<String>,
    /// Polling interval in seconds
    pub poll_interval_secs: u64,
    /// Bid secret file to purge after finalization
    pub secrets_path: Option<PathBuf>,
}

impl Default for SettlerConfig {
    fn default() -> Self {
        Self {
            rpc_url: "http://127.0.0.1:9944".to_string(),
            caller: None,
            poll_interval_secs: 10,
            secrets_path: None,
        }
    }
}

impl SettlerConfig {
    pub fn load(path: &Path) -> Result<Self, SettlerConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| SettlerConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self =
            serde_json::from_str(&raw).map_err(|source| SettlerConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), SettlerConfigError> {
        if self.poll_interval_secs == 0 {
            return Err(SettlerConfigError::ZeroInterval);
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

/// Closes auctions whose reveal window has ended.
pub struct FinalizationService {
    ledger: Arc<dyn Ledger>,
    caller: Address,
    interval: Duration,
    store: Option<Arc<dyn SecretStore>>,
}

impl FinalizationService {
    pub fn new(ledger: Arc<dyn Ledger>, caller: Address, interval: Duration) -> Self {
        Self {
            ledger,
            caller,
            interval,
            store: None,
        }
    }

    /// Also erase secrets for every auction this service closes.
    pub fn with_store(mut self, store: Arc<dyn SecretStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Finalize every auction currently awaiting it.
    ///
    /// A failure on one auction is logged and does not stop the others; the
    /// next pass retries it.
    pub async fn run_once(&self) -> Result<Vec<Settlement>, LedgerError> {
        let pending = self.ledger.pending_finalization().await?;
        if pending.is_empty() {
            debug!("No auctions awaiting finalization");
            return Ok(Vec::new());
        }

        let mut settled = Vec::with_capacity(pending.len());
        for auction_id in pending {
            match self.ledger.finalize_auction(self.caller, auction_id).await {
                Ok(settlement) => {
                    info!(
                        auction_id,
                        winner = ?settlement.winner.map(hex::encode),
                        winning_bid = ?settlement.winning_bid,
                        refunds = settlement.refunds.len(),
                        forfeited = settlement.forfeited,
                        "Auction finalized"
                    );
                    self.purge(auction_id).await;
                    settled.push(settlement);
                }
                Err(e) => warn!(auction_id, error = %e, "Finalization failed"),
            }
        }
        Ok(settled)
    }

    async fn purge(&self, auction_id: u64) {
        let Some(store) = &self.store else {
            return;
        };
        match store.remove_auction(auction_id).await {
            Ok(0) => {}
            Ok(removed) => debug!(auction_id, removed, "Erased bid secrets"),
            Err(e) => warn!(auction_id, error = %e, "Failed to erase bid secrets"),
        }
    }

    /// Poll until `shutdown` resolves.
    pub async fn run(&self, shutdown: impl Future<Output = ()>) {
        info!(interval = ?self.interval, caller = %hex::encode(self.caller), "Finalization service started");
        tokio::pin!(shutdown);
        let mut ticker = tokio::time::interval(self.interval);
        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                _ = ticker.tick() => {
                    if let Err(e) = self.run_once().await {
                        warn!(error = %e, "Failed to list auctions awaiting finalization");
                    }
                }
            }
        }
        info!("Finalization service stopped");
    }
}
