//! Bid commitments and statement leaves.
//!
//! The commitment must be the exact function the bid-range circuit computes:
//! the ledger recomputes it at reveal time and any divergence forfeits the
//! bid.

use rand::{CryptoRng, RngCore};
use sha2::{Digest as _, Sha256};

use zkbid_types::{Digest, Salt};

const COMMITMENT_DOMAIN: &[u8] = b"ZKBID_BID_COMMITMENT_V1:";
const STATEMENT_DOMAIN: &[u8] = b"ZKBID_STATEMENT_V1:";

/// Commit to a bid value: `H(domain ‖ bid_le ‖ salt_le)`.
pub fn compute_commitment(bid_value: u64, salt: &Salt) -> Digest {
    let mut hasher = Sha256::new();
    hasher.update(COMMITMENT_DOMAIN);
    hasher.update(bid_value.to_le_bytes());
    hasher.update(salt.to_le_bytes());
    hasher.finalize().into()
}

/// Check that `(bid_value, salt)` opens `commitment`.
pub fn verify_commitment_opening(commitment: &Digest, bid_value: u64, salt: &Salt) -> bool {
    compute_commitment(bid_value, salt) == *commitment
}

/// Draw a fresh uniformly random salt.
pub fn random_salt<R: RngCore + CryptoRng>(rng: &mut R) -> Salt {
    let mut bytes = [0u8; 16];
    rng.fill_bytes(&mut bytes);
    Salt(u128::from_le_bytes(bytes))
}

/// Leaf digest of a verified statement under the key with hash `vk_hash`.
///
/// The verification network inserts this value into its attestation tree,
/// so a leaf can only match a proof of this circuit over these signals.
pub fn statement_leaf(vk_hash: &Digest, public_signals: &[Digest]) -> Digest {
    let mut hasher = Sha256::new();
    hasher.update(STATEMENT_DOMAIN);
    hasher.update(vk_hash);
    hasher.update((public_signals.len() as u64).to_le_bytes());
    for signal in public_signals {
        hasher.update(signal);
    }
    hasher.finalize().into()
}
