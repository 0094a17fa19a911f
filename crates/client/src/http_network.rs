//! Verification network reached through the `POST /api/verify-proof`
//! endpoint.
//!
//! The endpoint runs submission, confirmation and inclusion-proof
//! retrieval in one request, so `submit` does the round trip and the
//! later stages read from the cached response. An entry is evicted once
//! its inclusion proof has been fetched.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::debug;

use zkbid_crypto::compute_root;
use zkbid_types::rpc::{ProofErrorResponse, VerifiedProofResponse, VerifyProofRequest};
use zkbid_types::{
    Attestation, AttestationConfirmation, AttestationReceipt, Digest, InclusionProof, Proof,
    VerificationKey,
};

use crate::error::NetworkError;
use crate::network::VerificationNetwork;

pub const VERIFY_PROOF_PATH: &str = "/api/verify-proof";

pub struct HttpVerificationNetwork {
    client: reqwest::Client,
    endpoint: String,
    /// Responses keyed by `(attestation_id, leaf_digest)`; batched proofs
    /// share an id.
    attestations: Mutex<HashMap<(u64, Digest), Attestation>>,
}

impl HttpVerificationNetwork {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, NetworkError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| NetworkError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            endpoint: format!("{}{}", base_url.trim_end_matches('/'), VERIFY_PROOF_PATH),
            attestations: Mutex::new(HashMap::new()),
        })
    }

    fn remember(&self, attestation: Attestation) {
        self.attestations
            .lock()
            .insert((attestation.attestation_id, attestation.leaf_digest), attestation);
    }

    /// Any cached member of the batch; they all fold to the same root.
    fn any_member(&self, attestation_id: u64) -> Result<Attestation, NetworkError> {
        self.attestations
            .lock()
            .iter()
            .find(|((id, _), _)| *id == attestation_id)
            .map(|(_, a)| a.clone())
            .ok_or(NetworkError::UnknownAttestation(attestation_id))
    }
}

#[async_trait]
impl VerificationNetwork for HttpVerificationNetwork {
    async fn submit(
        &self,
        proof: &Proof,
        vk: &VerificationKey,
    ) -> Result<AttestationReceipt, NetworkError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&VerifyProofRequest::new(proof, vk))
            .send()
            .await
            .map_err(|e| NetworkError::Transport(e.to_string()))?;

        let status = response.status();
        if status.is_client_error() {
            // The service rejected the statement itself.
            let body: ProofErrorResponse = response
                .json()
                .await
                .map_err(|e| NetworkError::Malformed(e.to_string()))?;
            debug!(status = status.as_u16(), error = %body.error, "Proof not verified");
            return Ok(AttestationReceipt {
                attestation_id: None,
                leaf_digest: [0u8; 32],
                block_hash: [0u8; 32],
            });
        }
        if !status.is_success() {
            let message = response
                .json::<ProofErrorResponse>()
                .await
                .map(|body| body.error)
                .unwrap_or_else(|_| status.to_string());
            return Err(NetworkError::Status {
                status: status.as_u16(),
                message,
            });
        }

        let body: VerifiedProofResponse = response
            .json()
            .await
            .map_err(|e| NetworkError::Malformed(e.to_string()))?;
        let attestation =
            Attestation::try_from(body).map_err(|e| NetworkError::Malformed(e.to_string()))?;

        let receipt = AttestationReceipt {
            attestation_id: Some(attestation.attestation_id),
            leaf_digest: attestation.leaf_digest,
            block_hash: attestation.block_hash,
        };
        self.remember(attestation);
        Ok(receipt)
    }

    async fn await_confirmation(
        &self,
        attestation_id: u64,
    ) -> Result<AttestationConfirmation, NetworkError> {
        let a = self.any_member(attestation_id)?;
        let root = compute_root(&a.leaf_digest, &a.path, a.leaf_count, a.index)
            .ok_or_else(|| NetworkError::Malformed("inclusion path does not fold".into()))?;
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
        let mut cache = self.attestations.lock();
        let Some(a) = cache.remove(&(attestation_id, *leaf)) else {
            return Err(if cache.keys().any(|(id, _)| *id == attestation_id) {
                NetworkError::NotAvailable(attestation_id)
            } else {
                NetworkError::UnknownAttestation(attestation_id)
            });
        };
        Ok(InclusionProof {
            leaf: a.leaf_digest,
            path: a.path,
            leaf_count: a.leaf_count,
            index: a.index,
        })
    }
}
