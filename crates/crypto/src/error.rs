//! Error types for cryptographic operations.

use thiserror::Error;

/// Errors that can occur during cryptographic operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CryptoError {
    #[error("Merkle tree needs at least one leaf")]
    EmptyTree,

    #[error("Leaf index {index} out of range for {leaf_count} leaves")]
    IndexOutOfRange { index: u64, leaf_count: u64 },
}
