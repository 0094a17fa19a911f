//! Core type definitions for zero-knowledge gated sealed-bid auctions.
//!
//! This crate provides the shared data structures used across the workspace:
//! the auction and bid-commit records kept by the ledger, the time-derived
//! auction [`Phase`], and the proof / attestation values that flow through
//! the bid-commitment gating protocol.

use std::fmt;
use std::str::FromStr;

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DisplayFromStr};

pub mod rpc;

// =========================
// PRIMITIVES
// =========================

/// Generic address type (32 bytes)
pub type Address = [u8; 32];

/// SHA-256 output used for commitments, leaves, roots and block hashes
pub type Digest = [u8; 32];

/// Blinding salt for a bid commitment.
///
/// 128 bits drawn uniformly at random. Rendered as a decimal string when it
/// crosses a process boundary, matching the prover's input encoding.
#[serde_as]
#[derive(
    Clone, Copy, PartialEq, Eq, Hash, BorshSerialize, BorshDeserialize, Serialize, Deserialize,
)]
pub struct Salt(#[serde_as(as = "DisplayFromStr")] pub u128);

impl Salt {
    pub fn to_le_bytes(self) -> [u8; 16] {
        self.0.to_le_bytes()
    }
}

impl fmt::Display for Salt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// Salts are secrets; keep them out of debug output.
impl fmt::Debug for Salt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Salt(..)")
    }
}

impl FromStr for Salt {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<u128>().map(Salt)
    }
}

/// Encode an integer as a 32-byte big-endian public signal.
pub fn u64_to_signal(value: u64) -> Digest {
    let mut out = [0u8; 32];
    out[24..].copy_from_slice(&value.to_be_bytes());
    out
}

/// Decode a 32-byte big-endian public signal back into an integer.
///
/// Returns `None` if the value does not fit in 64 bits.
pub fn signal_to_u64(signal: &Digest) -> Option<u64> {
    if signal[..24].iter().any(|b| *b != 0) {
        return None;
    }
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&signal[24..]);
    Some(u64::from_be_bytes(bytes))
}

// =========================
// AUCTION TYPES
// =========================

/// Auction phase, derived purely from wall-clock time.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, BorshSerialize, BorshDeserialize, Serialize, Deserialize,
)]
pub enum Phase {
    /// Before `start_time`
    NotStarted,
    /// Accepting sealed commitments
    Commit,
    /// Accepting reveals of earlier commitments
    Reveal,
    /// Terminal: the auction can be closed and paid out
    Finalization,
}

impl Phase {
    /// Phase of an auction with the given timestamps at instant `now`.
    ///
    /// Intervals are half-open and left-inclusive, so `commit_end_time`
    /// already belongs to [`Phase::Reveal`] and `reveal_end_time` to
    /// [`Phase::Finalization`].
    pub fn at(start_time: u64, commit_end_time: u64, reveal_end_time: u64, now: u64) -> Self {
        if now < start_time {
            Phase::NotStarted
        } else if now < commit_end_time {
            Phase::Commit
        } else if now < reveal_end_time {
            Phase::Reveal
        } else {
            Phase::Finalization
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::NotStarted => "not_started",
            Phase::Commit => "commit",
            Phase::Reveal => "reveal",
            Phase::Finalization => "finalization",
        };
        f.write_str(name)
    }
}

/// Collateral put up for auction: an NFT identified by contract and token id.
#[derive(Clone, Debug, Default, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct NftAsset {
    pub contract: Address,
    pub token_id: u64,
}

/// A sealed bid recorded on the ledger during the commit phase.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct BidCommit {
    pub bidder: Address,
    /// Amount escrowed with the commitment
    pub deposit: u64,
    /// `H(bid_value, salt)` as produced by the circuit
    pub commitment: Digest,
    pub revealed: bool,
    /// Populated only by a successful reveal
    pub bid_value: Option<u64>,
    pub refunded: bool,
    /// Set when a reveal did not open the commitment
    pub forfeited: bool,
}

impl BidCommit {
    pub fn new(bidder: Address, deposit: u64, commitment: Digest) -> Self {
        Self {
            bidder,
            deposit,
            commitment,
            revealed: false,
            bid_value: None,
            refunded: false,
            forfeited: false,
        }
    }
}

/// Full auction record.
///
/// Timestamps are unix seconds and immutable after creation. `closed` and
/// `highest_bidder` change only during finalization.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct Auction {
    pub auction_id: u64,
    pub seller: Address,
    pub collateral: NftAsset,
    pub min_bid: u64,

    // Timing
    pub start_time: u64,
    pub commit_end_time: u64,
    pub reveal_end_time: u64,

    // Outcome
    pub closed: bool,
    pub highest_bidder: Option<Address>,

    /// Commits in arrival order, at most one per bidder
    pub commits: Vec<BidCommit>,
}

impl Auction {
    /// Current phase at `now`.
    pub fn phase_at(&self, now: u64) -> Phase {
        Phase::at(self.start_time, self.commit_end_time, self.reveal_end_time, now)
    }

    /// `start_time < commit_end_time < reveal_end_time`
    pub fn has_valid_timing(&self) -> bool {
        self.start_time < self.commit_end_time && self.commit_end_time < self.reveal_end_time
    }

    /// Still open and not yet past its reveal deadline.
    pub fn is_active(&self, now: u64) -> bool {
        !self.closed && now < self.reveal_end_time
    }

    pub fn commit_of(&self, bidder: &Address) -> Option<&BidCommit> {
        self.commits.iter().find(|c| &c.bidder == bidder)
    }

    pub fn commit_of_mut(&mut self, bidder: &Address) -> Option<&mut BidCommit> {
        self.commits.iter_mut().find(|c| &c.bidder == bidder)
    }
}

/// Outcome of a reveal as recorded by the ledger.
#[derive(Clone, Copy, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub enum RevealOutcome {
    /// Opening matched; bid value recorded
    Revealed,
    /// Opening did not match; deposit will not be refunded
    Forfeited,
}

/// Result of closing an auction.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct Settlement {
    pub auction_id: u64,
    pub winner: Option<Address>,
    pub winning_bid: Option<u64>,
    /// Refunds issued by this call; empty when the auction was already closed
    pub refunds: Vec<(Address, u64)>,
    /// Total forfeited deposit credited to the seller by this call
    pub forfeited: u64,
    /// `false` when finalization had already happened
    pub newly_closed: bool,
}

// =========================
// PROOFS AND ATTESTATIONS
// =========================

/// Input to the bid-range prover, all integers as decimal strings.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProverInput {
    pub bid: String,
    pub salt: String,
    pub min_bid: String,
}

impl ProverInput {
    pub fn new(bid: u64, salt: Salt, min_bid: u64) -> Self {
        Self {
            bid: bid.to_string(),
            salt: salt.to_string(),
            min_bid: min_bid.to_string(),
        }
    }
}

impl fmt::Debug for ProverInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProverInput")
            .field("min_bid", &self.min_bid)
            .finish_non_exhaustive()
    }
}

/// Opaque proof plus its public-signal vector.
///
/// By convention `public_signals[0]` is the bid commitment.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct Proof {
    pub proof: Vec<u8>,
    pub public_signals: Vec<Digest>,
}

impl Proof {
    /// The commitment carried as the first public signal.
    pub fn commitment(&self) -> Option<&Digest> {
        self.public_signals.first()
    }
}

/// Verification key of the bid-range circuit.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct VerificationKey(pub Vec<u8>);

impl VerificationKey {
    /// Hash under which the key is registered on the ledger.
    pub fn hash(&self) -> Digest {
        use sha2::{Digest as _, Sha256};
        let mut hasher = Sha256::new();
        hasher.update(b"ZKBID_VKEY_V1:");
        hasher.update(&self.0);
        hasher.finalize().into()
    }
}

/// Transaction acknowledgment for a proof submission.
///
/// A missing `attestation_id` means the network accepted the transaction
/// but did not attest the statement.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttestationReceipt {
    pub attestation_id: Option<u64>,
    pub leaf_digest: Digest,
    pub block_hash: Digest,
}

/// Emitted once the network finalizes the batch holding an attestation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttestationConfirmation {
    pub attestation_id: u64,
    pub root: Digest,
}

/// Merkle inclusion proof for one leaf of an attestation batch.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InclusionProof {
    pub leaf: Digest,
    pub path: Vec<Digest>,
    pub leaf_count: u64,
    pub index: u64,
}

/// A confirmed attestation with its inclusion path.
///
/// Borrowed from the verification network for the duration of one bid
/// attempt; never persisted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attestation {
    pub attestation_id: u64,
    pub leaf_digest: Digest,
    pub block_hash: Digest,
    pub path: Vec<Digest>,
    pub leaf_count: u64,
    pub index: u64,
}

impl Attestation {
    pub fn new(attestation_id: u64, block_hash: Digest, inclusion: InclusionProof) -> Self {
        Self {
            attestation_id,
            leaf_digest: inclusion.leaf,
            block_hash,
            path: inclusion.path,
            leaf_count: inclusion.leaf_count,
            index: inclusion.index,
        }
    }
}

/// The opening of a commitment, held by the bidder between commit and reveal.
#[derive(Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct BidSecret {
    pub bid_value: u64,
    pub salt: Salt,
}

impl fmt::Debug for BidSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("BidSecret(..)")
    }
}

// =========================
// HELPER FUNCTIONS
// =========================

/// Compute SHA-256 hash
pub fn sha256(data: &[u8]) -> Digest {
    use sha2::{Digest as _, Sha256};
    Sha256::digest(data).into()
}
