//! Ledger module error types.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use zkbid_types::Phase;

/// Errors that can occur in the ledger module.
///
/// Serializable so RPC servers can attach the variant to an error response.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum AuctionError {
    #[error("Auction not found: {0}")]
    AuctionNotFound(u64),

    #[error("Wrong phase. Expected: {expected}, Got: {got}")]
    WrongPhase { expected: Phase, got: Phase },

    #[error("Invalid timing configuration")]
    InvalidTiming,

    #[error("Duration {duration}s outside allowed range {min}..={max}")]
    DurationOutOfRange { duration: u64, min: u64, max: u64 },

    #[error("Auction already closed")]
    AuctionClosed,

    #[error("Already committed a bid")]
    AlreadyCommitted,

    #[error("Insufficient deposit: need {required}, got {got}")]
    InsufficientDeposit { required: u64, got: u64 },

    #[error("No commitment for bidder")]
    NoCommit,

    #[error("Bid already revealed")]
    AlreadyRevealed,

    #[error("Commitment already forfeited")]
    CommitForfeited,

    #[error("Attestation {0} already has a different root")]
    AttestationRootConflict(u64),

    #[error("Nothing to withdraw")]
    NothingToWithdraw,

    #[error("Not authorized")]
    NotAuthorized,

    #[error("Call encoding failed")]
    EncodingFailed,

    #[error("Balance overflow")]
    BalanceOverflow,
}

impl AuctionError {
    /// Stable JSON-RPC error code for this variant.
    pub fn code(&self) -> i32 {
        match self {
            AuctionError::AuctionNotFound(_) => -32001,
            AuctionError::WrongPhase { .. } => -32002,
            AuctionError::InvalidTiming => -32003,
            AuctionError::DurationOutOfRange { .. } => -32004,
            AuctionError::AuctionClosed => -32005,
            AuctionError::AlreadyCommitted => -32006,
            AuctionError::InsufficientDeposit { .. } => -32007,
            AuctionError::NoCommit => -32008,
            AuctionError::AlreadyRevealed => -32009,
            AuctionError::CommitForfeited => -32010,
            AuctionError::AttestationRootConflict(_) => -32011,
            AuctionError::NothingToWithdraw => -32012,
            AuctionError::NotAuthorized => -32013,
            AuctionError::EncodingFailed => -32014,
            AuctionError::BalanceOverflow => -32015,
        }
    }
}
