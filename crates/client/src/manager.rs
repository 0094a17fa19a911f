//! Commit and reveal orchestration for a single bidder.
//!
//! A commit reaches the ledger only after the proof is attested and the
//! attestation is checked against the ledger's published root. The bid
//! secret is stored before the ledger call and dropped again if the call
//! is refused.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::OwnedMutexGuard;
use tracing::{info, warn};

use zkbid_crypto::verify_commitment_opening;
use zkbid_types::{Address, Auction, BidSecret, Digest, Phase, RevealOutcome, Settlement};

use crate::config::PipelineConfig;
use crate::error::{BidError, LedgerError, RejectReason, Stage, StoreError};
use crate::inclusion::AttestationInclusionChecker;
use crate::ledger::Ledger;
use crate::phase::PhaseClock;
use crate::pipeline::{bounded, ProofPipeline};
use crate::store::SecretStore;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommitReceipt {
    pub auction_id: u64,
    pub bidder: Address,
    pub commitment: Digest,
    pub deposit: u64,
    pub attestation_id: u64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RevealReceipt {
    pub auction_id: u64,
    pub bidder: Address,
    pub bid_value: u64,
}

/// One async mutex per `(auction_id, bidder)`.
#[derive(Default)]
struct KeyedLocks {
    locks: Mutex<HashMap<(u64, Address), Arc<tokio::sync::Mutex<()>>>>,
}

impl KeyedLocks {
    async fn lock(&self, auction_id: u64, bidder: Address) -> OwnedMutexGuard<()> {
        let lock = self
            .locks
            .lock()
            .entry((auction_id, bidder))
            .or_default()
            .clone();
        lock.lock_owned().await
    }

    /// Drop idle locks of a finished auction.
    fn forget_auction(&self, auction_id: u64) {
        self.locks
            .lock()
            .retain(|(id, _), lock| *id != auction_id || Arc::strong_count(lock) > 1);
    }
}

pub struct BidCommitmentManager {
    ledger: Arc<dyn Ledger>,
    pipeline: ProofPipeline,
    checker: AttestationInclusionChecker,
    store: Arc<dyn SecretStore>,
    clock: PhaseClock,
    locks: KeyedLocks,
    ledger_timeout: Duration,
}

impl BidCommitmentManager {
    pub fn new(
        ledger: Arc<dyn Ledger>,
        pipeline: ProofPipeline,
        store: Arc<dyn SecretStore>,
        clock: PhaseClock,
        config: &PipelineConfig,
    ) -> Self {
        let checker =
            AttestationInclusionChecker::new(ledger.clone(), pipeline.verification_key().hash())
                .with_ledger_timeout(config.ledger_timeout());
        Self {
            ledger,
            pipeline,
            checker,
            store,
            clock,
            locks: KeyedLocks::default(),
            ledger_timeout: config.ledger_timeout(),
        }
    }

    pub fn clock(&self) -> &PhaseClock {
        &self.clock
    }

    async fn load_auction(
        &self,
        auction_id: u64,
        reject: fn(RejectReason) -> BidError,
    ) -> Result<Auction, BidError> {
        bounded(Stage::Ledger, self.ledger_timeout, self.ledger.get_auction(auction_id))
            .await??
            .ok_or_else(|| reject(RejectReason::AuctionNotFound(auction_id)))
    }

    fn require_phase(
        &self,
        auction: &Auction,
        expected: Phase,
        reject: fn(RejectReason) -> BidError,
    ) -> Result<(), BidError> {
        let got = self.clock.phase(auction);
        if got != expected {
            return Err(reject(RejectReason::WrongPhase { expected, got }));
        }
        Ok(())
    }

    // =========================
    // Commit
    // =========================

    /// Prove, attest, check and record a sealed bid of `bid_value`.
    ///
    /// The deposit equals the bid. Every local rule is checked before the
    /// prover runs, and the ledger is only called once the attestation has
    /// passed the inclusion check.
    pub async fn commit(
        &self,
        auction_id: u64,
        bidder: Address,
        bid_value: u64,
    ) -> Result<CommitReceipt, BidError> {
        let guard = self.locks.lock(auction_id, bidder).await;
        let reject = BidError::CommitRejected;

        let auction = self.load_auction(auction_id, reject).await?;
        if auction.closed {
            self.forget_closed(guard, auction_id);
            return Err(reject(RejectReason::AuctionClosed));
        }
        self.require_phase(&auction, Phase::Commit, reject)?;
        if auction.commit_of(&bidder).is_some() {
            return Err(reject(RejectReason::DuplicateCommit));
        }
        if bid_value < auction.min_bid {
            return Err(reject(RejectReason::BelowMinimum {
                bid: bid_value,
                min_bid: auction.min_bid,
            }));
        }

        // No commit on the ledger, so any stored secret is from an attempt
        // that never landed.
        if self.store.remove(auction_id, &bidder).await?.is_some() {
            warn!(auction_id, "Discarded stale bid secret");
        }

        let submitted = self
            .pipeline
            .submit_bid(&auction, bid_value, auction.min_bid)
            .await?;
        let attestation_id = submitted.attestation.attestation_id;

        if !self
            .checker
            .verify_statement(&submitted.attestation, &submitted.proof.public_signals)
            .await
        {
            return Err(BidError::InclusionCheckFailed { attestation_id });
        }

        // Proving takes time; the window may have closed meanwhile.
        self.require_phase(&auction, Phase::Commit, reject)?;

        let secret = BidSecret {
            bid_value,
            salt: submitted.salt,
        };
        self.store
            .put_if_absent(auction_id, &bidder, secret)
            .await
            .map_err(|e| match e {
                StoreError::AlreadyExists { .. } => reject(RejectReason::DuplicateCommit),
                other => BidError::Store(other),
            })?;

        let receipt = CommitReceipt {
            auction_id,
            bidder,
            commitment: submitted.commitment,
            deposit: bid_value,
            attestation_id,
        };

        let result = bounded(
            Stage::Ledger,
            self.ledger_timeout,
            self.ledger
                .commit_bid(bidder, auction_id, submitted.commitment, bid_value),
        )
        .await;

        match result {
            Ok(Ok(())) => {}
            Ok(Err(LedgerError::Rejected(e))) => {
                self.discard_secret(auction_id, &bidder).await;
                return Err(reject(e.into()));
            }
            Ok(Err(e)) => {
                self.reconcile_commit(&receipt, BidError::Ledger(e)).await?;
            }
            Err(timeout) => {
                self.reconcile_commit(&receipt, timeout).await?;
            }
        }

        info!(auction_id, attestation_id, "Bid committed");
        Ok(receipt)
    }

    /// The commit call failed in transit. Ask the ledger whether it landed.
    async fn reconcile_commit(&self, receipt: &CommitReceipt, cause: BidError) -> Result<(), BidError> {
        let auction_id = receipt.auction_id;
        let landed = bounded(Stage::Ledger, self.ledger_timeout, self.ledger.get_auction(auction_id))
            .await
            .and_then(|r| r.map_err(BidError::from));
        match landed {
            Ok(Some(auction)) => match auction.commit_of(&receipt.bidder) {
                Some(commit) if commit.commitment == receipt.commitment => {
                    info!(auction_id, "Commit landed despite failed acknowledgement");
                    Ok(())
                }
                _ => {
                    self.discard_secret(auction_id, &receipt.bidder).await;
                    Err(cause)
                }
            },
            Ok(None) => {
                self.discard_secret(auction_id, &receipt.bidder).await;
                Err(cause)
            }
            Err(e) => {
                warn!(auction_id, error = %e, "Commit outcome unknown; keeping bid secret");
                Err(cause)
            }
        }
    }

    /// Release `guard` and drop the idle locks of a closed auction.
    fn forget_closed(&self, guard: OwnedMutexGuard<()>, auction_id: u64) {
        drop(guard);
        self.locks.forget_auction(auction_id);
    }

    async fn discard_secret(&self, auction_id: u64, bidder: &Address) {
        if let Err(e) = self.store.remove(auction_id, bidder).await {
            warn!(auction_id, error = %e, "Failed to discard bid secret");
        }
    }

    // =========================
    // Reveal
    // =========================

    /// Reveal using the secret stored at commit time.
    pub async fn reveal(&self, auction_id: u64, bidder: Address) -> Result<RevealReceipt, BidError> {
        let (_guard, commitment) = self.begin_reveal(auction_id, &bidder).await?;
        let secret = self
            .store
            .get(auction_id, &bidder)
            .await?
            .ok_or(BidError::RevealRejected(RejectReason::MissingSecret))?;
        self.submit_reveal(auction_id, bidder, &commitment, secret)
            .await
    }

    /// Reveal with an explicitly supplied opening.
    pub async fn reveal_with(
        &self,
        auction_id: u64,
        bidder: Address,
        secret: BidSecret,
    ) -> Result<RevealReceipt, BidError> {
        let (_guard, commitment) = self.begin_reveal(auction_id, &bidder).await?;
        self.submit_reveal(auction_id, bidder, &commitment, secret)
            .await
    }

    /// Takes the bidder's lock, then checks the reveal can go ahead.
    async fn begin_reveal(
        &self,
        auction_id: u64,
        bidder: &Address,
    ) -> Result<(OwnedMutexGuard<()>, Digest), BidError> {
        let guard = self.locks.lock(auction_id, *bidder).await;
        match self.check_reveal(auction_id, bidder).await {
            Ok(commitment) => Ok((guard, commitment)),
            Err(err) => {
                if matches!(err, BidError::RevealRejected(RejectReason::AuctionClosed)) {
                    self.forget_closed(guard, auction_id);
                }
                Err(err)
            }
        }
    }

    /// Returns the recorded commitment if a reveal is currently allowed.
    async fn check_reveal(&self, auction_id: u64, bidder: &Address) -> Result<Digest, BidError> {
        let reject = BidError::RevealRejected;
        let auction = self.load_auction(auction_id, reject).await?;
        if auction.closed {
            return Err(reject(RejectReason::AuctionClosed));
        }
        self.require_phase(&auction, Phase::Reveal, reject)?;

        let commit = auction
            .commit_of(bidder)
            .ok_or_else(|| reject(RejectReason::NoCommit))?;
        if commit.revealed {
            return Err(reject(RejectReason::AlreadyRevealed));
        }
        if commit.forfeited {
            return Err(reject(RejectReason::Forfeited));
        }
        Ok(commit.commitment)
    }

    async fn submit_reveal(
        &self,
        auction_id: u64,
        bidder: Address,
        commitment: &Digest,
        secret: BidSecret,
    ) -> Result<RevealReceipt, BidError> {
        if !verify_commitment_opening(commitment, secret.bid_value, &secret.salt) {
            warn!(auction_id, "Opening does not match recorded commitment");
        }

        let outcome = bounded(
            Stage::Ledger,
            self.ledger_timeout,
            self.ledger
                .reveal_bid(bidder, auction_id, secret.bid_value, secret.salt),
        )
        .await?
        .map_err(|e| match e {
            LedgerError::Rejected(e) => BidError::RevealRejected(e.into()),
            other => BidError::Ledger(other),
        })?;

        // The commit cannot be revealed again either way.
        self.discard_secret(auction_id, &bidder).await;

        match outcome {
            RevealOutcome::Revealed => {
                info!(auction_id, "Bid revealed");
                Ok(RevealReceipt {
                    auction_id,
                    bidder,
                    bid_value: secret.bid_value,
                })
            }
            RevealOutcome::Forfeited => {
                warn!(auction_id, "Reveal mismatch; deposit forfeited");
                Err(BidError::RevealMismatch { auction_id })
            }
        }
    }

    // =========================
    // Finalize
    // =========================

    /// Close the auction (idempotent) and erase its stored secrets.
    pub async fn finalize(&self, auction_id: u64, caller: Address) -> Result<Settlement, BidError> {
        let reject = BidError::FinalizeRejected;
        let auction = self.load_auction(auction_id, reject).await?;
        if !auction.closed {
            self.require_phase(&auction, Phase::Finalization, reject)?;
        }

        let settlement = bounded(
            Stage::Ledger,
            self.ledger_timeout,
            self.ledger.finalize_auction(caller, auction_id),
        )
        .await?
        .map_err(|e| match e {
            LedgerError::Rejected(e) => reject(e.into()),
            other => BidError::Ledger(other),
        })?;

        match self.store.remove_auction(auction_id).await {
            Ok(0) => {}
            Ok(purged) => info!(auction_id, purged, "Erased bid secrets"),
            Err(e) => warn!(auction_id, error = %e, "Failed to erase bid secrets"),
        }
        self.locks.forget_auction(auction_id);

        info!(
            auction_id,
            winner = ?settlement.winner.map(hex::encode),
            newly_closed = settlement.newly_closed,
            "Auction finalized"
        );
        Ok(settlement)
    }
}
