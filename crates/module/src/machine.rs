//! Per-auction state machine.
//!
//! Phases are a pure function of time. The only stored transition is
//! `closed`, which [`AuctionStateMachine::finalize`] sets exactly once.

use zkbid_crypto::verify_commitment_opening;
use zkbid_types::{Address, Auction, BidCommit, Digest, Phase, RevealOutcome, Salt, Settlement};

use crate::error::AuctionError;

/// Drives a single auction through commit, reveal and finalization.
pub struct AuctionStateMachine<'a> {
    auction: &'a mut Auction,
}

impl<'a> AuctionStateMachine<'a> {
    pub fn new(auction: &'a mut Auction) -> Self {
        Self { auction }
    }

    pub fn auction(&self) -> &Auction {
        self.auction
    }

    /// Phase at `now`.
    pub fn phase(&self, now: u64) -> Phase {
        self.auction.phase_at(now)
    }

    /// Re-derive the phase at `now`. Nothing is stored, so calling this
    /// repeatedly or out of order is harmless.
    pub fn advance(&self, now: u64) -> Phase {
        self.phase(now)
    }

    fn require_phase(&self, now: u64, expected: Phase) -> Result<(), AuctionError> {
        let got = self.phase(now);
        if got != expected {
            return Err(AuctionError::WrongPhase { expected, got });
        }
        Ok(())
    }

    /// Record a sealed commitment with its deposit.
    pub fn record_commit(
        &mut self,
        now: u64,
        bidder: Address,
        commitment: Digest,
        deposit: u64,
    ) -> Result<(), AuctionError> {
        if self.auction.closed {
            return Err(AuctionError::AuctionClosed);
        }
        self.require_phase(now, Phase::Commit)?;

        if self.auction.commit_of(&bidder).is_some() {
            return Err(AuctionError::AlreadyCommitted);
        }

        if deposit < self.auction.min_bid {
            return Err(AuctionError::InsufficientDeposit {
                required: self.auction.min_bid,
                got: deposit,
            });
        }

        self.auction
            .commits
            .push(BidCommit::new(bidder, deposit, commitment));
        Ok(())
    }

    /// Open a commitment.
    ///
    /// A reveal that does not open the stored commitment, or that claims
    /// a value outside `min_bid..=deposit`, forfeits the deposit. Either
    /// way the commit can never be revealed again.
    pub fn record_reveal(
        &mut self,
        now: u64,
        bidder: &Address,
        bid_value: u64,
        salt: &Salt,
    ) -> Result<RevealOutcome, AuctionError> {
        if self.auction.closed {
            return Err(AuctionError::AuctionClosed);
        }
        self.require_phase(now, Phase::Reveal)?;

        let min_bid = self.auction.min_bid;
        let commit = self
            .auction
            .commit_of_mut(bidder)
            .ok_or(AuctionError::NoCommit)?;

        if commit.revealed {
            return Err(AuctionError::AlreadyRevealed);
        }
        if commit.forfeited {
            return Err(AuctionError::CommitForfeited);
        }

        let opens = verify_commitment_opening(&commit.commitment, bid_value, salt);
        if opens && bid_value >= min_bid && bid_value <= commit.deposit {
            commit.revealed = true;
            commit.bid_value = Some(bid_value);
            Ok(RevealOutcome::Revealed)
        } else {
            commit.forfeited = true;
            Ok(RevealOutcome::Forfeited)
        }
    }

    /// Close the auction and compute its settlement.
    ///
    /// Idempotent: on an already-closed auction this reports the recorded
    /// winner with no refunds and `newly_closed == false`.
    pub fn finalize(&mut self, now: u64) -> Result<Settlement, AuctionError> {
        let auction_id = self.auction.auction_id;

        if self.auction.closed {
            let winner = self.auction.highest_bidder;
            let winning_bid = winner
                .and_then(|w| self.auction.commit_of(&w))
                .and_then(|c| c.bid_value);
            return Ok(Settlement {
                auction_id,
                winner,
                winning_bid,
                refunds: Vec::new(),
                forfeited: 0,
                newly_closed: false,
            });
        }

        self.require_phase(now, Phase::Finalization)?;

        // Highest revealed bid; on a tie the earliest commit keeps the lead.
        let mut best: Option<(usize, u64)> = None;
        for (index, commit) in self.auction.commits.iter().enumerate() {
            if let (true, Some(value)) = (commit.revealed, commit.bid_value) {
                if best.map_or(true, |(_, top)| value > top) {
                    best = Some((index, value));
                }
            }
        }

        let mut refunds = Vec::new();
        let mut forfeited = 0u64;
        for (index, commit) in self.auction.commits.iter_mut().enumerate() {
            if best.map(|(i, _)| i) == Some(index) {
                continue;
            }
            if commit.forfeited {
                forfeited = forfeited.saturating_add(commit.deposit);
                continue;
            }
            if !commit.refunded {
                commit.refunded = true;
                refunds.push((commit.bidder, commit.deposit));
            }
        }

        let winner = best.map(|(index, _)| self.auction.commits[index].bidder);
        self.auction.closed = true;
        self.auction.highest_bidder = winner;

        Ok(Settlement {
            auction_id,
            winner,
            winning_bid: best.map(|(_, value)| value),
            refunds,
            forfeited,
            newly_closed: true,
        })
    }
}
