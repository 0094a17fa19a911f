//! Query handlers for the auction ledger.
//!
//! These functions provide read-only access to ledger state.

use serde::{Deserialize, Serialize};

use zkbid_types::{Address, Auction, BidCommit, Digest, Phase};

use crate::state::LedgerState;

/// Query request types.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum LedgerQuery {
    /// Get auction details by ID.
    GetAuction { auction_id: u64 },

    /// Get all auctions (paginated, id order).
    ListAuctions { offset: u64, limit: u64 },

    /// Get a bidder's commitment record.
    GetCommit { auction_id: u64, bidder: Address },

    /// Get user's escrowed deposits.
    GetEscrow { address: Address },

    /// Get user's withdrawable balance.
    GetBalance { address: Address },

    /// Get the published root of an attestation.
    GetAttestationRoot { attestation_id: u64 },

    /// Get the registered verification key hash.
    GetVkHash,
}

/// Query response types.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum LedgerQueryResponse {
    Auction(Option<Auction>),
    AuctionList(Vec<Auction>),
    Commit(Option<BidCommit>),
    Escrow(u64),
    Balance(u64),
    AttestationRoot(Option<Digest>),
    VkHash(Option<Digest>),
}

/// Handle a query.
pub fn handle_query(state: &LedgerState, query: LedgerQuery) -> LedgerQueryResponse {
    match query {
        LedgerQuery::GetAuction { auction_id } => {
            LedgerQueryResponse::Auction(state.get_auction(auction_id).cloned())
        }

        LedgerQuery::ListAuctions { offset, limit } => {
            LedgerQueryResponse::AuctionList(list_auctions(state, offset as usize, limit as usize))
        }

        LedgerQuery::GetCommit { auction_id, bidder } => {
            LedgerQueryResponse::Commit(get_commit(state, auction_id, &bidder))
        }

        LedgerQuery::GetEscrow { address } => {
            LedgerQueryResponse::Escrow(state.get_escrow(&address))
        }

        LedgerQuery::GetBalance { address } => {
            LedgerQueryResponse::Balance(state.get_balance(&address))
        }

        LedgerQuery::GetAttestationRoot { attestation_id } => {
            LedgerQueryResponse::AttestationRoot(state.attestation_root(attestation_id))
        }

        LedgerQuery::GetVkHash => LedgerQueryResponse::VkHash(state.vk_hash),
    }
}

pub fn list_auctions(state: &LedgerState, offset: usize, limit: usize) -> Vec<Auction> {
    state
        .auctions
        .values()
        .skip(offset)
        .take(limit)
        .cloned()
        .collect()
}

pub fn get_commit(state: &LedgerState, auction_id: u64, bidder: &Address) -> Option<BidCommit> {
    state
        .get_auction(auction_id)
        .and_then(|auction| auction.commit_of(bidder))
        .cloned()
}

/// Summary of an auction for listing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuctionSummary {
    pub auction_id: u64,
    pub seller: Address,
    pub phase: Phase,
    pub min_bid: u64,
    pub commit_end_time: u64,
    pub reveal_end_time: u64,
    pub num_commits: usize,
    pub closed: bool,
}

impl AuctionSummary {
    /// Create summary from an auction at `now`.
    pub fn from_auction(auction: &Auction, now: u64) -> Self {
        Self {
            auction_id: auction.auction_id,
            seller: auction.seller,
            phase: auction.phase_at(now),
            min_bid: auction.min_bid,
            commit_end_time: auction.commit_end_time,
            reveal_end_time: auction.reveal_end_time,
            num_commits: auction.commits.len(),
            closed: auction.closed,
        }
    }
}

/// Auctions that are not closed and not past their reveal deadline.
pub fn get_active_auctions(state: &LedgerState, current_time: u64) -> Vec<Auction> {
    state
        .auctions
        .values()
        .filter(|auction| auction.is_active(current_time))
        .cloned()
        .collect()
}

/// Summaries of active auctions.
pub fn get_active_summaries(state: &LedgerState, current_time: u64) -> Vec<AuctionSummary> {
    state
        .auctions
        .values()
        .filter(|auction| auction.is_active(current_time))
        .map(|auction| AuctionSummary::from_auction(auction, current_time))
        .collect()
}

/// Auctions past their reveal deadline that nobody has closed yet.
pub fn get_pending_finalization(state: &LedgerState, current_time: u64) -> Vec<u64> {
    state
        .auctions
        .values()
        .filter(|auction| {
            !auction.closed && auction.phase_at(current_time) == Phase::Finalization
        })
        .map(|auction| auction.auction_id)
        .collect()
}
