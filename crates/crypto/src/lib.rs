//! Hash-based primitives for the bid-commitment protocol.
//!
//! # Overview
//!
//! 1. **Commitments**: a bid is sealed as `C = H(bid ‖ salt)` with a fresh
//!    128-bit salt. The circuit computes the same function, so a commitment
//!    taken from a proof's public signals can later be opened locally.
//!
//! 2. **Statements**: every verified proof becomes one leaf
//!    `H(vk_hash ‖ public_signals)` in an attestation batch.
//!
//! 3. **Merkle trees**: batches are aggregated into a binary tree. An
//!    inclusion path plus `(index, leaf_count)` recomputes the batch root,
//!    which is compared against the root published on the ledger.

pub mod commitment;
pub mod error;
pub mod merkle;

pub use commitment::{compute_commitment, random_salt, statement_leaf, verify_commitment_opening};
pub use error::CryptoError;
pub use merkle::{compute_root, verify_inclusion, MerkleTree};
