//! JSON-RPC wire types for the ledger.
//!
//! These are JSON-friendly versions of the core auction types: byte strings
//! travel hex-encoded, salts as decimal strings.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    Address, Attestation, Auction, BidCommit, Digest, InclusionProof, NftAsset, Proof, Salt,
    Settlement, VerificationKey,
};

/// Errors decoding wire values back into core types.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RpcDecodeError {
    #[error("Invalid hex in {field}: {reason}")]
    InvalidHex { field: &'static str, reason: String },

    #[error("{field} must be at most {max} bytes")]
    TooLong { field: &'static str, max: usize },

    #[error("{field} must be {expected} bytes")]
    InvalidLength { field: &'static str, expected: usize },

    #[error("Invalid salt encoding")]
    InvalidSalt,
}

fn decode_hex(field: &'static str, s: &str) -> Result<Vec<u8>, RpcDecodeError> {
    hex::decode(s.trim_start_matches("0x")).map_err(|e| RpcDecodeError::InvalidHex {
        field,
        reason: e.to_string(),
    })
}

/// Decode an exactly-32-byte hex value.
pub fn decode_digest(field: &'static str, s: &str) -> Result<Digest, RpcDecodeError> {
    decode_hex(field, s)?
        .try_into()
        .map_err(|_| RpcDecodeError::InvalidLength { field, expected: 32 })
}

/// Decode an address of up to 32 bytes; shorter addresses are zero-padded.
pub fn decode_address(field: &'static str, s: &str) -> Result<Address, RpcDecodeError> {
    let bytes = decode_hex(field, s)?;
    if bytes.len() > 32 {
        return Err(RpcDecodeError::TooLong { field, max: 32 });
    }
    let mut addr = [0u8; 32];
    addr[..bytes.len()].copy_from_slice(&bytes);
    Ok(addr)
}

pub fn decode_salt(s: &str) -> Result<Salt, RpcDecodeError> {
    s.parse().map_err(|_| RpcDecodeError::InvalidSalt)
}

/// Block info response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockInfo {
    pub height: u64,
    pub timestamp: u64,
}

/// Parameters for creating an auction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAuctionParams {
    pub sender: String,
    /// Hex-encoded NFT contract address
    pub nft_contract: String,
    pub token_id: u64,
    pub min_bid: u64,
    pub start_time: u64,
    /// Seconds
    pub commit_duration: u64,
    /// Seconds
    pub reveal_duration: u64,
}

/// Parameters for committing a sealed bid. `value` is the escrowed deposit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitBidParams {
    pub sender: String,
    pub auction_id: u64,
    /// Hex-encoded commitment (32 bytes)
    pub commitment: String,
    pub value: u64,
}

/// Parameters for revealing a bid.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RevealBidParams {
    pub sender: String,
    pub auction_id: u64,
    pub bid_value: u64,
    /// Decimal salt
    pub salt: String,
}

/// Parameters for the read-only attestation pre-check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyAttestationParams {
    pub attestation_id: u64,
    pub leaf: String,
    pub merkle_path: Vec<String>,
    pub leaf_count: u64,
    pub index: u64,
}

/// Parameters for relaying a confirmed attestation root.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishRootParams {
    pub sender: String,
    pub attestation_id: u64,
    pub root: String,
}

/// Bid commit for RPC.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BidCommitRpc {
    pub bidder: String,
    pub deposit: u64,
    pub commitment: String,
    pub revealed: bool,
    pub bid_value: Option<u64>,
    pub refunded: bool,
    pub forfeited: bool,
}

/// Auction for RPC.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuctionRpc {
    pub auction_id: u64,
    pub seller: String,
    pub nft_contract: String,
    pub token_id: u64,
    pub min_bid: u64,
    pub start_time: u64,
    pub commit_end_time: u64,
    pub reveal_end_time: u64,
    pub closed: bool,
    pub highest_bidder: Option<String>,
    pub commits: Vec<BidCommitRpc>,
}

/// Settlement for RPC.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettlementRpc {
    pub auction_id: u64,
    pub winner: Option<String>,
    pub winning_bid: Option<u64>,
    pub refunds: Vec<(String, u64)>,
    pub forfeited: u64,
    pub newly_closed: bool,
}

impl From<&BidCommit> for BidCommitRpc {
    fn from(c: &BidCommit) -> Self {
        Self {
            bidder: hex::encode(c.bidder),
            deposit: c.deposit,
            commitment: hex::encode(c.commitment),
            revealed: c.revealed,
            bid_value: c.bid_value,
            refunded: c.refunded,
            forfeited: c.forfeited,
        }
    }
}

impl TryFrom<BidCommitRpc> for BidCommit {
    type Error = RpcDecodeError;

    fn try_from(c: BidCommitRpc) -> Result<Self, Self::Error> {
        Ok(Self {
            bidder: decode_address("bidder", &c.bidder)?,
            deposit: c.deposit,
            commitment: decode_digest("commitment", &c.commitment)?,
            revealed: c.revealed,
            bid_value: c.bid_value,
            refunded: c.refunded,
            forfeited: c.forfeited,
        })
    }
}

impl From<&Auction> for AuctionRpc {
    fn from(a: &Auction) -> Self {
        Self {
            auction_id: a.auction_id,
            seller: hex::encode(a.seller),
            nft_contract: hex::encode(a.collateral.contract),
            token_id: a.collateral.token_id,
            min_bid: a.min_bid,
            start_time: a.start_time,
            commit_end_time: a.commit_end_time,
            reveal_end_time: a.reveal_end_time,
            closed: a.closed,
            highest_bidder: a.highest_bidder.map(hex::encode),
            commits: a.commits.iter().map(BidCommitRpc::from).collect(),
        }
    }
}

impl TryFrom<AuctionRpc> for Auction {
    type Error = RpcDecodeError;

    fn try_from(a: AuctionRpc) -> Result<Self, Self::Error> {
        Ok(Self {
            auction_id: a.auction_id,
            seller: decode_address("seller", &a.seller)?,
            collateral: NftAsset {
                contract: decode_address("nft_contract", &a.nft_contract)?,
                token_id: a.token_id,
            },
            min_bid: a.min_bid,
            start_time: a.start_time,
            commit_end_time: a.commit_end_time,
            reveal_end_time: a.reveal_end_time,
            closed: a.closed,
            highest_bidder: a
                .highest_bidder
                .as_deref()
                .map(|h| decode_address("highest_bidder", h))
                .transpose()?,
            commits: a
                .commits
                .into_iter()
                .map(BidCommit::try_from)
                .collect::<Result<_, _>>()?,
        })
    }
}

impl From<Settlement> for SettlementRpc {
    fn from(s: Settlement) -> Self {
        Self {
            auction_id: s.auction_id,
            winner: s.winner.map(hex::encode),
            winning_bid: s.winning_bid,
            refunds: s
                .refunds
                .into_iter()
                .map(|(addr, amount)| (hex::encode(addr), amount))
                .collect(),
            forfeited: s.forfeited,
            newly_closed: s.newly_closed,
        }
    }
}

impl TryFrom<SettlementRpc> for Settlement {
    type Error = RpcDecodeError;

    fn try_from(s: SettlementRpc) -> Result<Self, Self::Error> {
        Ok(Self {
            auction_id: s.auction_id,
            winner: s
                .winner
                .as_deref()
                .map(|w| decode_address("winner", w))
                .transpose()?,
            winning_bid: s.winning_bid,
            refunds: s
                .refunds
                .into_iter()
                .map(|(addr, amount)| decode_address("refund", &addr).map(|a| (a, amount)))
                .collect::<Result<_, _>>()?,
            forfeited: s.forfeited,
            newly_closed: s.newly_closed,
        })
    }
}

// =========================
// Proof verification endpoint
// =========================

/// Body of `POST /api/verify-proof`.
///
/// Fields are optional so a missing one is reported as a client error
/// rather than a decode failure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyProofRequest {
    pub proof: Option<String>,
    pub public_signals: Option<Vec<String>>,
    pub vk: Option<String>,
}

impl VerifyProofRequest {
    pub fn new(proof: &Proof, vk: &VerificationKey) -> Self {
        Self {
            proof: Some(hex::encode(&proof.proof)),
            public_signals: Some(proof.public_signals.iter().map(hex::encode).collect()),
            vk: Some(hex::encode(&vk.0)),
        }
    }

    /// Decode into core types. `Ok(None)` if any field is absent.
    pub fn decode(&self) -> Result<Option<(Proof, VerificationKey)>, RpcDecodeError> {
        let (Some(proof), Some(signals), Some(vk)) = (&self.proof, &self.public_signals, &self.vk)
        else {
            return Ok(None);
        };

        let public_signals = signals
            .iter()
            .map(|s| decode_digest("publicSignals", s))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Some((
            Proof {
                proof: decode_hex("proof", proof)?,
                public_signals,
            },
            VerificationKey(decode_hex("vk", vk)?),
        )))
    }
}

/// Successful verify-proof response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifiedProofResponse {
    pub status: String,
    pub attestation_id: u64,
    pub leaf: String,
    pub merkle_path: Vec<String>,
    pub leaf_count: u64,
    pub index: u64,
    pub block_hash: String,
}

pub const STATUS_VERIFIED: &str = "verified";
pub const STATUS_ERROR: &str = "error";

impl From<&Attestation> for VerifiedProofResponse {
    fn from(attestation: &Attestation) -> Self {
        Self {
            status: STATUS_VERIFIED.to_string(),
            attestation_id: attestation.attestation_id,
            leaf: hex::encode(attestation.leaf_digest),
            merkle_path: attestation.path.iter().map(hex::encode).collect(),
            leaf_count: attestation.leaf_count,
            index: attestation.index,
            block_hash: hex::encode(attestation.block_hash),
        }
    }
}

impl TryFrom<VerifiedProofResponse> for Attestation {
    type Error = RpcDecodeError;

    fn try_from(resp: VerifiedProofResponse) -> Result<Self, Self::Error> {
        let path = resp
            .merkle_path
            .iter()
            .map(|s| decode_digest("merklePath", s))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Attestation::new(
            resp.attestation_id,
            decode_digest("blockHash", &resp.block_hash)?,
            InclusionProof {
                leaf: decode_digest("leaf", &resp.leaf)?,
                path,
                leaf_count: resp.leaf_count,
                index: resp.index,
            },
        ))
    }
}

/// Error body returned with a 4xx/5xx status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofErrorResponse {
    pub status: String,
    pub error: String,
}

impl ProofErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            status: STATUS_ERROR.to_string(),
            error: error.into(),
        }
    }
}
