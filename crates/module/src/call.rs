//! Call message types for the auction ledger.

use borsh::{BorshDeserialize, BorshSerialize};
use sha2::{Digest as _, Sha256};

use zkbid_types::{Digest, NftAsset, RevealOutcome, Salt, Settlement};

use crate::error::AuctionError;
use crate::handlers::{self, CallContext, HandlerResult};
use crate::state::LedgerState;

/// State-changing calls accepted by the ledger.
#[derive(Clone, Debug, BorshSerialize, BorshDeserialize)]
pub enum LedgerCall {
    // === Auction Lifecycle ===
    /// Create a new auction owned by the sender.
    CreateAuction {
        collateral: NftAsset,
        min_bid: u64,
        start_time: u64,
        commit_duration: u64,
        reveal_duration: u64,
    },

    /// Commit a sealed bid. The attached value is the deposit.
    CommitBid { auction_id: u64, commitment: Digest },

    /// Open a previously committed bid.
    RevealBid {
        auction_id: u64,
        bid_value: u64,
        salt: Salt,
    },

    /// Close the auction and pay out (permissionless).
    FinalizeAuction { auction_id: u64 },

    /// Withdraw refunds and proceeds.
    Withdraw,

    // === Verification Network Relay ===
    /// Record the aggregation root for an attestation.
    PublishAttestationRoot { attestation_id: u64, root: Digest },
}

/// Result of an applied call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CallOutput {
    AuctionCreated(u64),
    Committed,
    Revealed(RevealOutcome),
    Finalized(Settlement),
    Withdrawn(u64),
    RootPublished,
}

/// Receipt for an applied call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CallReceipt {
    /// Deterministic id of the call: sender, time, value and payload
    pub tx_hash: Digest,
    pub output: CallOutput,
}

/// Apply a call atomically. On error the state is untouched.
pub fn apply(
    state: &mut LedgerState,
    ctx: &CallContext,
    call: LedgerCall,
) -> HandlerResult<CallReceipt> {
    let payload = borsh::to_vec(&call).map_err(|_| AuctionError::EncodingFailed)?;
    let mut hasher = Sha256::new();
    hasher.update(ctx.sender);
    hasher.update(ctx.timestamp.to_le_bytes());
    hasher.update(ctx.value.to_le_bytes());
    hasher.update(&payload);
    let tx_hash: Digest = hasher.finalize().into();

    let output = match call {
        LedgerCall::CreateAuction {
            collateral,
            min_bid,
            start_time,
            commit_duration,
            reveal_duration,
        } => CallOutput::AuctionCreated(handlers::handle_create_auction(
            state,
            ctx,
            collateral,
            min_bid,
            start_time,
            commit_duration,
            reveal_duration,
        )?),
        LedgerCall::CommitBid {
            auction_id,
            commitment,
        } => {
            handlers::handle_commit_bid(state, ctx, auction_id, commitment)?;
            CallOutput::Committed
        }
        LedgerCall::RevealBid {
            auction_id,
            bid_value,
            salt,
        } => CallOutput::Revealed(handlers::handle_reveal_bid(
            state, ctx, auction_id, bid_value, salt,
        )?),
        LedgerCall::FinalizeAuction { auction_id } => {
            CallOutput::Finalized(handlers::handle_finalize_auction(state, ctx, auction_id)?)
        }
        LedgerCall::Withdraw => CallOutput::Withdrawn(handlers::handle_withdraw(state, ctx)?),
        LedgerCall::PublishAttestationRoot {
            attestation_id,
            root,
        } => {
            handlers::handle_publish_attestation_root(state, ctx, attestation_id, root)?;
            CallOutput::RootPublished
        }
    };

    Ok(CallReceipt { tx_hash, output })
}
