//! Ledger wrapper with injectable faults.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use zkbid_module::AuctionError;
use zkbid_types::{Address, Auction, Digest, RevealOutcome, Salt, Settlement};

use crate::error::LedgerError;
use crate::ledger::{InMemoryLedger, Ledger, NewAuction};

/// What happens to the next `commit_bid`.
#[derive(Clone, Debug)]
pub enum CommitFault {
    None,
    /// Applied, then reported as a transport failure.
    LoseAck,
    /// Refused by the ledger without being applied.
    Refuse(AuctionError),
    /// Never reaches the ledger.
    Drop,
    /// Never reaches the ledger, and every later read hangs.
    DropThenStall,
}

pub struct FaultyLedger {
    inner: Arc<InMemoryLedger>,
    commit_fault: Mutex<CommitFault>,
    stall_reads: AtomicBool,
}

impl FaultyLedger {
    pub fn new(inner: Arc<InMemoryLedger>, fault: CommitFault) -> Self {
        Self {
            inner,
            commit_fault: Mutex::new(fault),
            stall_reads: AtomicBool::new(false),
        }
    }

    pub fn stall_reads(&self, enabled: bool) {
        self.stall_reads.store(enabled, Ordering::SeqCst);
    }

    async fn maybe_stall(&self) {
        if self.stall_reads.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
    }
}

#[async_trait]
impl Ledger for FaultyLedger {
    async fn create_auction(&self, sender: Address, params: NewAuction) -> Result<u64, LedgerError> {
        self.inner.create_auction(sender, params).await
    }

    async fn commit_bid(
        &self,
        sender: Address,
        auction_id: u64,
        commitment: Digest,
        value: u64,
    ) -> Result<(), LedgerError> {
        let fault = self.commit_fault.lock().clone();
        match fault {
            CommitFault::None => {
                self.inner
                    .commit_bid(sender, auction_id, commitment, value)
                    .await
            }
            CommitFault::LoseAck => {
                self.inner
                    .commit_bid(sender, auction_id, commitment, value)
                    .await?;
                Err(LedgerError::Transport("connection reset".into()))
            }
            CommitFault::Refuse(err) => Err(LedgerError::Rejected(err)),
            CommitFault::Drop => Err(LedgerError::Transport("connection refused".into())),
            CommitFault::DropThenStall => {
                self.stall_reads(true);
                Err(LedgerError::Transport("connection refused".into()))
            }
        }
    }

    async fn reveal_bid(
        &self,
        sender: Address,
        auction_id: u64,
        bid_value: u64,
        salt: Salt,
    ) -> Result<RevealOutcome, LedgerError> {
        self.inner.reveal_bid(sender, auction_id, bid_value, salt).await
    }

    async fn finalize_auction(&self, sender: Address, auction_id: u64) -> Result<Settlement, LedgerError> {
        self.inner.finalize_auction(sender, auction_id).await
    }

    async fn withdraw(&self, sender: Address) -> Result<u64, LedgerError> {
        self.inner.withdraw(sender).await
    }

    async fn verify_proof_attestation(
        &self,
        attestation_id: u64,
        leaf: Digest,
        merkle_path: Vec<Digest>,
        leaf_count: u64,
        index: u64,
    ) -> Result<bool, LedgerError> {
        self.maybe_stall().await;
        self.inner
            .verify_proof_attestation(attestation_id, leaf, merkle_path, leaf_count, index)
            .await
    }

    async fn attestation_root(&self, attestation_id: u64) -> Result<Option<Digest>, LedgerError> {
        self.maybe_stall().await;
        self.inner.attestation_root(attestation_id).await
    }

    async fn get_auction(&self, auction_id: u64) -> Result<Option<Auction>, LedgerError> {
        self.maybe_stall().await;
        self.inner.get_auction(auction_id).await
    }

    async fn get_active_auctions(&self) -> Result<Vec<Auction>, LedgerError> {
        self.inner.get_active_auctions().await
    }

    async fn pending_finalization(&self) -> Result<Vec<u64>, LedgerError> {
        self.inner.pending_finalization().await
    }

    async fn timestamp(&self) -> Result<u64, LedgerError> {
        self.inner.timestamp().await
    }
}
