//! Verification network interface and an in-process simulation.
//!
//! The network verifies a proof, assigns it to an attestation batch, and
//! later confirms the batch by publishing its Merkle root. Only after
//! confirmation can an inclusion proof be fetched.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::{debug, info};

use zkbid_crypto::{statement_leaf, MerkleTree};
use zkbid_types::{
    sha256, AttestationConfirmation, AttestationReceipt, Digest, InclusionProof, Proof,
    VerificationKey,
};

use crate::error::{LedgerError, NetworkError};

/// Submission, confirmation and inclusion-proof retrieval.
#[async_trait]
pub trait VerificationNetwork: Send + Sync {
    /// Submit a proof. Returns once the submission is in a block; an
    /// `attestation_id` of `None` means the proof was not accepted.
    async fn submit(
        &self,
        proof: &Proof,
        vk: &VerificationKey,
    ) -> Result<AttestationReceipt, NetworkError>;

    /// Wait until the attestation's batch is confirmed.
    async fn await_confirmation(
        &self,
        attestation_id: u64,
    ) -> Result<AttestationConfirmation, NetworkError>;

    async fn fetch_inclusion_proof(
        &self,
        attestation_id: u64,
        leaf: &Digest,
    ) -> Result<InclusionProof, NetworkError>;
}

/// Carries confirmed attestation roots onto the ledger.
#[async_trait]
pub trait AttestationRelay: Send + Sync {
    async fn publish_root(&self, attestation_id: u64, root: Digest) -> Result<(), LedgerError>;
}

struct Batch {
    leaves: Vec<Digest>,
    tree: Option<MerkleTree>,
}

#[derive(Default)]
struct NetworkState {
    next_attestation_id: u64,
    open_batch: Option<u64>,
    batches: HashMap<u64, Batch>,
}

/// In-process verification network.
///
/// Proofs are checked with the bid-range circuit verifier. Submissions
/// join the open batch until one of its members awaits confirmation,
/// which seals the batch and relays its root. Each sealed batch is padded
/// with `filler_leaves` unrelated statements.
pub struct SimulatedNetwork {
    state: Mutex<NetworkState>,
    relay: Option<Arc<dyn AttestationRelay>>,
    filler_leaves: usize,
    confirmation_delay: Duration,
    fetch_failures: AtomicU32,
    tamper_paths: AtomicBool,
    withhold_roots: AtomicBool,
}

impl SimulatedNetwork {
    pub fn new(relay: Option<Arc<dyn AttestationRelay>>) -> Self {
        Self {
            state: Mutex::new(NetworkState {
                next_attestation_id: 1,
                ..Default::default()
            }),
            relay,
            filler_leaves: 3,
            confirmation_delay: Duration::ZERO,
            fetch_failures: AtomicU32::new(0),
            tamper_paths: AtomicBool::new(false),
            withhold_roots: AtomicBool::new(false),
        }
    }

    pub fn with_filler_leaves(mut self, count: usize) -> Self {
        self.filler_leaves = count;
        self
    }

    pub fn with_confirmation_delay(mut self, delay: Duration) -> Self {
        self.confirmation_delay = delay;
        self
    }

    /// Make the next `count` inclusion-proof fetches fail.
    pub fn fail_next_fetches(&self, count: u32) {
        self.fetch_failures.store(count, Ordering::SeqCst);
    }

    /// Corrupt every inclusion path handed out from now on.
    pub fn tamper_paths(&self, enabled: bool) {
        self.tamper_paths.store(enabled, Ordering::SeqCst);
    }

    /// Confirm batches without relaying their roots to the ledger.
    pub fn withhold_roots(&self, enabled: bool) {
        self.withhold_roots.store(enabled, Ordering::SeqCst);
    }

    fn filler(attestation_id: u64, i: usize) -> Digest {
        let mut data = b"ZKBID_FILLER_V1:".to_vec();
        data.extend_from_slice(&attestation_id.to_le_bytes());
        data.extend_from_slice(&(i as u64).to_le_bytes());
        sha256(&data)
    }

    fn block_hash(attestation_id: u64) -> Digest {
        let mut data = b"ZKBID_BLOCK_V1:".to_vec();
        data.extend_from_slice(&attestation_id.to_le_bytes());
        sha256(&data)
    }

    /// Seal the batch if needed and return its root.
    fn seal(&self, attestation_id: u64) -> Result<Digest, NetworkError> {
        let mut state = self.state.lock();
        if state.open_batch == Some(attestation_id) {
            state.open_batch = None;
        }
        let filler_leaves = self.filler_leaves;
        let batch = state
            .batches
            .get_mut(&attestation_id)
            .ok_or(NetworkError::UnknownAttestation(attestation_id))?;

        if batch.tree.is_none() {
            for i in 0..filler_leaves {
                batch.leaves.push(Self::filler(attestation_id, i));
            }
            let tree =
                MerkleTree::new(&batch.leaves).map_err(|e| NetworkError::Malformed(e.to_string()))?;
            batch.tree = Some(tree);
        }

        batch
            .tree
            .as_ref()
            .map(MerkleTree::root)
            .ok_or(NetworkError::NotAvailable(attestation_id))
    }
}

#[async_trait]
impl VerificationNetwork for SimulatedNetwork {
    async fn submit(
        &self,
        proof: &Proof,
        vk: &VerificationKey,
    ) -> Result<AttestationReceipt, NetworkError> {
        let leaf_digest = statement_leaf(&vk.hash(), &proof.public_signals);

        if !zkbid_circuit::verify(vk, proof) {
            debug!("Rejected proof submission");
            return Ok(AttestationReceipt {
                attestation_id: None,
                leaf_digest,
                block_hash: sha256(&leaf_digest),
            });
        }

        let mut state = self.state.lock();
        let attestation_id = match state.open_batch {
            Some(id) => id,
            None => {
                let id = state.next_attestation_id;
                state.next_attestation_id += 1;
                state.open_batch = Some(id);
                state.batches.insert(
                    id,
                    Batch {
                        leaves: Vec::new(),
                        tree: None,
                    },
                );
                id
            }
        };
        if let Some(batch) = state.batches.get_mut(&attestation_id) {
            batch.leaves.push(leaf_digest);
        }

        debug!(attestation_id, "Proof included in block");
        Ok(AttestationReceipt {
            attestation_id: Some(attestation_id),
            leaf_digest,
            block_hash: Self::block_hash(attestation_id),
        })
    }

    async fn await_confirmation(
        &self,
        attestation_id: u64,
    ) -> Result<AttestationConfirmation, NetworkError> {
        if !self.confirmation_delay.is_zero() {
            tokio::time::sleep(self.confirmation_delay).await;
        }

        let root = self.seal(attestation_id)?;

        if let Some(relay) = &self.relay {
            if !self.withhold_roots.load(Ordering::SeqCst) {
                relay
                    .publish_root(attestation_id, root)
                    .await
                    .map_err(|e| NetworkError::Transport(e.to_string()))?;
            }
        }

        info!(attestation_id, "Attestation confirmed");
        Ok(AttestationConfirmation {
            attestation_id,
            root,
        })
    }

    async fn fetch_inclusion_proof(
        &self,
        attestation_id: u64,
        leaf: &Digest,
    ) -> Result<InclusionProof, NetworkError> {
        let pending = self.fetch_failures.load(Ordering::SeqCst);
        if pending > 0 {
            self.fetch_failures.store(pending - 1, Ordering::SeqCst);
            return Err(NetworkError::NotAvailable(attestation_id));
        }

        let state = self.state.lock();
        let batch = state
            .batches
            .get(&attestation_id)
            .ok_or(NetworkError::UnknownAttestation(attestation_id))?;
        let tree = batch
            .tree
            .as_ref()
            .ok_or(NetworkError::NotAvailable(attestation_id))?;
        let index = batch
            .leaves
            .iter()
            .position(|l| l == leaf)
            .ok_or(NetworkError::NotAvailable(attestation_id))? as u64;

        let mut path = tree
            .proof(index)
            .map_err(|e| NetworkError::Malformed(e.to_string()))?;
        if self.tamper_paths.load(Ordering::SeqCst) {
            if let Some(first) = path.first_mut() {
                first[0] ^= 0xff;
            }
        }

        Ok(InclusionProof {
            leaf: *leaf,
            path,
            leaf_count: tree.leaf_count(),
            index,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use zkbid_crypto::verify_inclusion;
    use zkbid_types::{ProverInput, Salt};

    fn proof(bid: u64) -> (Proof, VerificationKey) {
        let (pk, vk) = zkbid_circuit::setup(b"network-test");
        let proof = zkbid_circuit::prove(&pk, &ProverInput::new(bid, Salt(bid as u128), 100)).unwrap();
        (proof, vk)
    }

    #[tokio::test]
    async fn test_submit_confirm_fetch() {
        let network = SimulatedNetwork::new(None);
        let (proof, vk) = proof(150);

        let receipt = network.submit(&proof, &vk).await.unwrap();
        let id = receipt.attestation_id.unwrap();
        assert!(matches!(
            network.fetch_inclusion_proof(id, &receipt.leaf_digest).await,
            Err(NetworkError::NotAvailable(_))
        ));

        let confirmation = network.await_confirmation(id).await.unwrap();
        let inclusion = network
            .fetch_inclusion_proof(id, &receipt.leaf_digest)
            .await
            .unwrap();
        assert_eq!(inclusion.leaf_count, 4);
        assert!(verify_inclusion(
            &confirmation.root,
            &inclusion.leaf,
            &inclusion.path,
            inclusion.leaf_count,
            inclusion.index
        ));
    }

    #[tokio::test]
    async fn test_invalid_proof_gets_no_attestation() {
        let network = SimulatedNetwork::new(None);
        let (mut proof, vk) = proof(150);
        proof.proof[0] ^= 1;
        let receipt = network.submit(&proof, &vk).await.unwrap();
        assert_eq!(receipt.attestation_id, None);
    }

    #[tokio::test]
    async fn test_attestation_ids_increase_per_batch() {
        let network = SimulatedNetwork::new(None).with_filler_leaves(0);
        let (p1, vk) = proof(150);
        let (p2, _) = proof(160);
        let (p3, _) = proof(170);

        let a = network.submit(&p1, &vk).await.unwrap().attestation_id.unwrap();
        let b = network.submit(&p2, &vk).await.unwrap().attestation_id.unwrap();
        assert_eq!(a, b);

        network.await_confirmation(a).await.unwrap();
        let c = network.submit(&p3, &vk).await.unwrap().attestation_id.unwrap();
        assert!(c > a);
    }

    #[tokio::test]
    async fn test_fetch_fault_injection() {
        let network = SimulatedNetwork::new(None);
        let (proof, vk) = proof(150);
        let receipt = network.submit(&proof, &vk).await.unwrap();
        let id = receipt.attestation_id.unwrap();
        network.await_confirmation(id).await.unwrap();

        network.fail_next_fetches(1);
        assert!(network.fetch_inclusion_proof(id, &receipt.leaf_digest).await.is_err());
        assert!(network.fetch_inclusion_proof(id, &receipt.leaf_digest).await.is_ok());
    }
}
