//! Ledger interface and an in-process ledger.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::debug;

use zkbid_module::{
    apply, handlers::handle_verify_proof_attestation, queries, CallContext, CallOutput,
    LedgerCall, LedgerState,
};
use zkbid_types::{Address, Auction, Digest, NftAsset, RevealOutcome, Salt, Settlement};

use crate::error::LedgerError;
use crate::network::AttestationRelay;
use crate::phase::Clock;

/// Parameters of `createAuction`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewAuction {
    pub collateral: NftAsset,
    pub min_bid: u64,
    pub start_time: u64,
    pub commit_duration: u64,
    pub reveal_duration: u64,
}

/// Calls and queries against the auction ledger. Each call is atomic.
#[async_trait]
pub trait Ledger: Send + Sync {
    async fn create_auction(&self, sender: Address, params: NewAuction) -> Result<u64, LedgerError>;

    /// `commitBid`, paying `value` as the deposit.
    async fn commit_bid(
        &self,
        sender: Address,
        auction_id: u64,
        commitment: Digest,
        value: u64,
    ) -> Result<(), LedgerError>;

    async fn reveal_bid(
        &self,
        sender: Address,
        auction_id: u64,
        bid_value: u64,
        salt: Salt,
    ) -> Result<RevealOutcome, LedgerError>;

    async fn finalize_auction(
        &self,
        sender: Address,
        auction_id: u64,
    ) -> Result<Settlement, LedgerError>;

    async fn withdraw(&self, sender: Address) -> Result<u64, LedgerError>;

    /// Read-only inclusion check against the published attestation root.
    async fn verify_proof_attestation(
        &self,
        attestation_id: u64,
        leaf: Digest,
        merkle_path: Vec<Digest>,
        leaf_count: u64,
        index: u64,
    ) -> Result<bool, LedgerError>;

    async fn attestation_root(&self, attestation_id: u64) -> Result<Option<Digest>, LedgerError>;

    async fn get_auction(&self, auction_id: u64) -> Result<Option<Auction>, LedgerError>;

    async fn get_active_auctions(&self) -> Result<Vec<Auction>, LedgerError>;

    async fn pending_finalization(&self) -> Result<Vec<u64>, LedgerError>;

    /// The ledger's notion of now.
    async fn timestamp(&self) -> Result<u64, LedgerError>;
}

/// Ledger module hosted in-process, timed by a [`Clock`].
pub struct InMemoryLedger {
    state: RwLock<LedgerState>,
    clock: Arc<dyn Clock>,
    transactions: RwLock<Vec<Digest>>,
}

impl InMemoryLedger {
    pub fn new(state: LedgerState, clock: Arc<dyn Clock>) -> Self {
        Self {
            state: RwLock::new(state),
            clock,
            transactions: RwLock::new(Vec::new()),
        }
    }

    /// Hashes of every successfully applied call, in order.
    pub fn transactions(&self) -> Vec<Digest> {
        self.transactions.read().clone()
    }

    pub fn balance_of(&self, user: &Address) -> u64 {
        self.state.read().get_balance(user)
    }

    pub fn escrow_of(&self, user: &Address) -> u64 {
        self.state.read().get_escrow(user)
    }

    fn submit(&self, sender: Address, value: u64, call: LedgerCall) -> Result<CallOutput, LedgerError> {
        let ctx = CallContext {
            sender,
            timestamp: self.clock.now(),
            value,
        };
        let receipt = apply(&mut self.state.write(), &ctx, call)?;
        debug!(tx_hash = %hex::encode(receipt.tx_hash), "Applied ledger call");
        self.transactions.write().push(receipt.tx_hash);
        Ok(receipt.output)
    }
}

fn unexpected(output: CallOutput) -> LedgerError {
    LedgerError::Decode(format!("unexpected call output: {output:?}"))
}

#[async_trait]
impl Ledger for InMemoryLedger {
    async fn create_auction(&self, sender: Address, params: NewAuction) -> Result<u64, LedgerError> {
        let call = LedgerCall::CreateAuction {
            collateral: params.collateral,
            min_bid: params.min_bid,
            start_time: params.start_time,
            commit_duration: params.commit_duration,
            reveal_duration: params.reveal_duration,
        };
        match self.submit(sender, 0, call)? {
            CallOutput::AuctionCreated(id) => Ok(id),
            other => Err(unexpected(other)),
        }
    }

    async fn commit_bid(
        &self,
        sender: Address,
        auction_id: u64,
        commitment: Digest,
        value: u64,
    ) -> Result<(), LedgerError> {
        match self.submit(sender, value, LedgerCall::CommitBid { auction_id, commitment })? {
            CallOutput::Committed => Ok(()),
            other => Err(unexpected(other)),
        }
    }

    async fn reveal_bid(
        &self,
        sender: Address,
        auction_id: u64,
        bid_value: u64,
        salt: Salt,
    ) -> Result<RevealOutcome, LedgerError> {
        let call = LedgerCall::RevealBid {
            auction_id,
            bid_value,
            salt,
        };
        match self.submit(sender, 0, call)? {
            CallOutput::Revealed(outcome) => Ok(outcome),
            other => Err(unexpected(other)),
        }
    }

    async fn finalize_auction(
        &self,
        sender: Address,
        auction_id: u64,
    ) -> Result<Settlement, LedgerError> {
        match self.submit(sender, 0, LedgerCall::FinalizeAuction { auction_id })? {
            CallOutput::Finalized(settlement) => Ok(settlement),
            other => Err(unexpected(other)),
        }
    }

    async fn withdraw(&self, sender: Address) -> Result<u64, LedgerError> {
        match self.submit(sender, 0, LedgerCall::Withdraw)? {
            CallOutput::Withdrawn(amount) => Ok(amount),
            other => Err(unexpected(other)),
        }
    }

    async fn verify_proof_attestation(
        &self,
        attestation_id: u64,
        leaf: Digest,
        merkle_path: Vec<Digest>,
        leaf_count: u64,
        index: u64,
    ) -> Result<bool, LedgerError> {
        Ok(handle_verify_proof_attestation(
            &self.state.read(),
            attestation_id,
            &leaf,
            &merkle_path,
            leaf_count,
            index,
        ))
    }

    async fn attestation_root(&self, attestation_id: u64) -> Result<Option<Digest>, LedgerError> {
        Ok(self.state.read().attestation_root(attestation_id))
    }

    async fn get_auction(&self, auction_id: u64) -> Result<Option<Auction>, LedgerError> {
        Ok(self.state.read().get_auction(auction_id).cloned())
    }

    async fn get_active_auctions(&self) -> Result<Vec<Auction>, LedgerError> {
        Ok(queries::get_active_auctions(&self.state.read(), self.clock.now()))
    }

    async fn pending_finalization(&self) -> Result<Vec<u64>, LedgerError> {
        Ok(queries::get_pending_finalization(&self.state.read(), self.clock.now()))
    }

    async fn timestamp(&self) -> Result<u64, LedgerError> {
        Ok(self.clock.now())
    }
}

/// Roots are published under the ledger's configured relayer, if any.
pub struct InMemoryRelay {
    ledger: Arc<InMemoryLedger>,
    relayer: Address,
}

impl InMemoryRelay {
    pub fn new(ledger: Arc<InMemoryLedger>, relayer: Address) -> Self {
        Self { ledger, relayer }
    }
}

#[async_trait]
impl AttestationRelay for InMemoryRelay {
    async fn publish_root(&self, attestation_id: u64, root: Digest) -> Result<(), LedgerError> {
        match self
            .ledger
            .submit(self.relayer, 0, LedgerCall::PublishAttestationRoot { attestation_id, root })?
        {
            CallOutput::RootPublished => Ok(()),
            other => Err(unexpected(other)),
        }
    }
}
