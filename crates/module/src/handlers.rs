//! Call handlers for the auction ledger.
//!
//! These functions implement the business logic for each call type.

use std::collections::BTreeMap;

use zkbid_crypto::compute_root;
use zkbid_types::{
    Address, Auction, Digest, NftAsset, RevealOutcome, Salt, Settlement,
};

use crate::error::AuctionError;
use crate::machine::AuctionStateMachine;
use crate::state::LedgerState;

/// Context provided by the runtime for each call.
#[derive(Clone, Debug)]
pub struct CallContext {
    /// Sender of the transaction
    pub sender: Address,
    /// Ledger time of the block including the call
    pub timestamp: u64,
    /// Value attached to the call (for deposits)
    pub value: u64,
}

/// Result type for handlers.
pub type HandlerResult<T> = Result<T, AuctionError>;

/// Handle CreateAuction call.
pub fn handle_create_auction(
    state: &mut LedgerState,
    ctx: &CallContext,
    collateral: NftAsset,
    min_bid: u64,
    start_time: u64,
    commit_duration: u64,
    reveal_duration: u64,
) -> HandlerResult<u64> {
    for duration in [commit_duration, reveal_duration] {
        if !state.rules.allows(duration) {
            return Err(AuctionError::DurationOutOfRange {
                duration,
                min: state.rules.min_duration,
                max: state.rules.max_duration,
            });
        }
    }

    let commit_end_time = start_time
        .checked_add(commit_duration)
        .ok_or(AuctionError::InvalidTiming)?;
    let reveal_end_time = commit_end_time
        .checked_add(reveal_duration)
        .ok_or(AuctionError::InvalidTiming)?;
    if start_time >= commit_end_time || commit_end_time >= reveal_end_time {
        return Err(AuctionError::InvalidTiming);
    }

    let auction_id = state.allocate_auction_id();
    let auction = Auction {
        auction_id,
        seller: ctx.sender,
        collateral,
        min_bid,
        start_time,
        commit_end_time,
        reveal_end_time,
        closed: false,
        highest_bidder: None,
        commits: Vec::new(),
    };
    state.auctions.insert(auction_id, auction);
    Ok(auction_id)
}

/// Handle CommitBid call. The attached value is escrowed as the deposit.
pub fn handle_commit_bid(
    state: &mut LedgerState,
    ctx: &CallContext,
    auction_id: u64,
    commitment: Digest,
) -> HandlerResult<()> {
    // Escrow headroom is checked before the commit is recorded.
    state
        .get_escrow(&ctx.sender)
        .checked_add(ctx.value)
        .ok_or(AuctionError::BalanceOverflow)?;

    let auction = state
        .get_auction_mut(auction_id)
        .ok_or(AuctionError::AuctionNotFound(auction_id))?;

    AuctionStateMachine::new(auction).record_commit(
        ctx.timestamp,
        ctx.sender,
        commitment,
        ctx.value,
    )?;

    state.add_escrow(ctx.sender, ctx.value)
}

/// Handle RevealBid call.
pub fn handle_reveal_bid(
    state: &mut LedgerState,
    ctx: &CallContext,
    auction_id: u64,
    bid_value: u64,
    salt: Salt,
) -> HandlerResult<RevealOutcome> {
    let auction = state
        .get_auction_mut(auction_id)
        .ok_or(AuctionError::AuctionNotFound(auction_id))?;

    AuctionStateMachine::new(auction).record_reveal(ctx.timestamp, &ctx.sender, bid_value, &salt)
}

/// Handle FinalizeAuction call.
///
/// Anyone may finalize. On the closing call, refunds move from escrow to
/// the bidders' balances and the winning and forfeited deposits move to
/// the seller.
pub fn handle_finalize_auction(
    state: &mut LedgerState,
    ctx: &CallContext,
    auction_id: u64,
) -> HandlerResult<Settlement> {
    let auction = state
        .get_auction_mut(auction_id)
        .ok_or(AuctionError::AuctionNotFound(auction_id))?;
    let snapshot = auction.clone();

    let settlement = AuctionStateMachine::new(auction).finalize(ctx.timestamp)?;
    if !settlement.newly_closed {
        return Ok(settlement);
    }

    // (from escrow of, credit to, amount)
    let seller = auction.seller;
    let mut payouts: Vec<(Address, Address, u64)> = settlement
        .refunds
        .iter()
        .map(|(bidder, amount)| (*bidder, *bidder, *amount))
        .collect();
    payouts.extend(
        auction
            .commits
            .iter()
            .filter(|c| c.forfeited || Some(c.bidder) == settlement.winner)
            .map(|c| (c.bidder, seller, c.deposit)),
    );

    if let Err(err) = check_credit_headroom(state, &payouts) {
        state.auctions.insert(auction_id, snapshot);
        return Err(err);
    }

    for (from, to, amount) in payouts {
        state.release_escrow(&from, amount);
        state.credit_balance(to, amount)?;
    }

    Ok(settlement)
}

/// Fails if any recipient's balance would overflow after the payouts.
fn check_credit_headroom(
    state: &LedgerState,
    payouts: &[(Address, Address, u64)],
) -> HandlerResult<()> {
    let mut totals: BTreeMap<Address, u64> = BTreeMap::new();
    for (_, to, amount) in payouts {
        let total = totals.entry(*to).or_insert(0);
        *total = total
            .checked_add(*amount)
            .ok_or(AuctionError::BalanceOverflow)?;
    }
    for (to, total) in totals {
        state
            .get_balance(&to)
            .checked_add(total)
            .ok_or(AuctionError::BalanceOverflow)?;
    }
    Ok(())
}

/// Handle PublishAttestationRoot call.
///
/// Roots are write-once: republishing the same root is a no-op, a
/// different root for a known attestation is rejected.
pub fn handle_publish_attestation_root(
    state: &mut LedgerState,
    ctx: &CallContext,
    attestation_id: u64,
    root: Digest,
) -> HandlerResult<()> {
    if let Some(relayer) = state.relayer {
        if relayer != ctx.sender {
            return Err(AuctionError::NotAuthorized);
        }
    }

    match state.attestation_root(attestation_id) {
        Some(existing) if existing == root => Ok(()),
        Some(_) => Err(AuctionError::AttestationRootConflict(attestation_id)),
        None => {
            state.attestation_roots.insert(attestation_id, root);
            Ok(())
        }
    }
}

/// Handle Withdraw call. Returns the amount paid out.
pub fn handle_withdraw(state: &mut LedgerState, ctx: &CallContext) -> HandlerResult<u64> {
    match state.take_balance(&ctx.sender) {
        0 => Err(AuctionError::NothingToWithdraw),
        amount => Ok(amount),
    }
}

/// Read-only check that `leaf` is included under the published root of
/// `attestation_id`. Unknown attestations and malformed paths are `false`.
pub fn handle_verify_proof_attestation(
    state: &LedgerState,
    attestation_id: u64,
    leaf: &Digest,
    merkle_path: &[Digest],
    leaf_count: u64,
    index: u64,
) -> bool {
    let Some(root) = state.attestation_root(attestation_id) else {
        return false;
    };
    compute_root(leaf, merkle_path, leaf_count, index) == Some(root)
}
