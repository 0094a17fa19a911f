//! Error types for the bidder-side protocol.
//!
//! Collaborators report their own narrow errors ([`ProverError`],
//! [`NetworkError`], [`LedgerError`], [`StoreError`]). The protocol
//! surfaces everything to callers as a [`BidError`].

use std::fmt;

use thiserror::Error;

use zkbid_module::AuctionError;
use zkbid_types::Phase;

/// External call that a timeout or failure is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Prove,
    Submit,
    Confirm,
    Fetch,
    Ledger,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Prove => "proof generation",
            Stage::Submit => "proof submission",
            Stage::Confirm => "attestation confirmation",
            Stage::Fetch => "inclusion proof fetch",
            Stage::Ledger => "ledger call",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum ProverError {
    #[error("Prover rejected input: {0}")]
    Rejected(String),

    #[error("Prover unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Error)]
pub enum NetworkError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Verification service returned {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Unknown attestation: {0}")]
    UnknownAttestation(u64),

    #[error("Inclusion proof not yet available for attestation {0}")]
    NotAvailable(u64),

    #[error("Malformed response: {0}")]
    Malformed(String),
}

#[derive(Debug, Error)]
pub enum LedgerError {
    /// The ledger executed the call and refused it.
    #[error("Ledger rejected call: {0}")]
    Rejected(#[from] AuctionError),

    /// The call may or may not have been applied.
    #[error("Ledger transport error: {0}")]
    Transport(String),

    #[error("Malformed ledger response: {0}")]
    Decode(String),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Secret already stored for auction {auction_id}")]
    AlreadyExists { auction_id: u64 },

    #[error("Secret store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Secret store is corrupt: {0}")]
    Corrupt(String),
}

/// Why a commit, reveal or finalize was refused before anything was charged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    AuctionNotFound(u64),
    WrongPhase { expected: Phase, got: Phase },
    DuplicateCommit,
    BelowMinimum { bid: u64, min_bid: u64 },
    AuctionClosed,
    NoCommit,
    AlreadyRevealed,
    Forfeited,
    MissingSecret,
    Ledger(AuctionError),
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::AuctionNotFound(id) => write!(f, "auction {id} not found"),
            RejectReason::WrongPhase { expected, got } => {
                write!(f, "auction is in {got} phase, expected {expected}")
            }
            RejectReason::DuplicateCommit => f.write_str("bidder already committed"),
            RejectReason::BelowMinimum { bid, min_bid } => {
                write!(f, "bid {bid} is below minimum {min_bid}")
            }
            RejectReason::AuctionClosed => f.write_str("auction is closed"),
            RejectReason::NoCommit => f.write_str("no commitment for bidder"),
            RejectReason::AlreadyRevealed => f.write_str("bid already revealed"),
            RejectReason::Forfeited => f.write_str("commitment was forfeited"),
            RejectReason::MissingSecret => f.write_str("no stored bid secret"),
            RejectReason::Ledger(e) => write!(f, "{e}"),
        }
    }
}

impl From<AuctionError> for RejectReason {
    fn from(err: AuctionError) -> Self {
        match err {
            AuctionError::AuctionNotFound(id) => RejectReason::AuctionNotFound(id),
            AuctionError::WrongPhase { expected, got } => RejectReason::WrongPhase { expected, got },
            AuctionError::AlreadyCommitted => RejectReason::DuplicateCommit,
            AuctionError::InsufficientDeposit { required, got } => RejectReason::BelowMinimum {
                bid: got,
                min_bid: required,
            },
            AuctionError::AuctionClosed => RejectReason::AuctionClosed,
            AuctionError::NoCommit => RejectReason::NoCommit,
            AuctionError::AlreadyRevealed => RejectReason::AlreadyRevealed,
            AuctionError::CommitForfeited => RejectReason::Forfeited,
            other => RejectReason::Ledger(other),
        }
    }
}

/// What a failed operation means for the bidder's funds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BidOutcome {
    /// Nothing reached the ledger; nothing was charged.
    NotAccepted,
    /// The commitment is on the ledger but its deposit is lost.
    Forfeited,
    /// The ledger call may have been applied; query before retrying.
    Unknown,
}

/// Caller-facing error for every protocol operation.
#[derive(Debug, Error)]
pub enum BidError {
    #[error("Proof generation failed: {0}")]
    ProofGeneration(String),

    #[error("Proof rejected by verification network: {0}")]
    ProofRejected(String),

    #[error("Could not fetch attestation after {attempts} attempts: {reason}")]
    AttestationFetch { attempts: u32, reason: String },

    #[error("Inclusion check failed for attestation {attestation_id}")]
    InclusionCheckFailed { attestation_id: u64 },

    #[error("Commit rejected: {0}")]
    CommitRejected(RejectReason),

    #[error("Reveal rejected: {0}")]
    RevealRejected(RejectReason),

    #[error("Finalize rejected: {0}")]
    FinalizeRejected(RejectReason),

    #[error("Reveal does not match commitment for auction {auction_id}; deposit forfeited")]
    RevealMismatch { auction_id: u64 },

    #[error("Timed out during {0}")]
    Timeout(Stage),

    #[error("Verification network error: {0}")]
    Network(String),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl BidError {
    /// Effect of this failure on the bidder's deposit.
    pub fn outcome(&self) -> BidOutcome {
        match self {
            BidError::RevealMismatch { .. } => BidOutcome::Forfeited,
            BidError::Timeout(Stage::Ledger) => BidOutcome::Unknown,
            BidError::Ledger(LedgerError::Transport(_)) => BidOutcome::Unknown,
            BidError::Ledger(LedgerError::Decode(_)) => BidOutcome::Unknown,
            _ => BidOutcome::NotAccepted,
        }
    }

    /// Transient failures worth retrying as-is.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            BidError::AttestationFetch { .. }
                | BidError::Timeout(_)
                | BidError::Network(_)
                | BidError::Ledger(LedgerError::Transport(_))
        )
    }
}

impl From<ProverError> for BidError {
    fn from(err: ProverError) -> Self {
        BidError::ProofGeneration(err.to_string())
    }
}
