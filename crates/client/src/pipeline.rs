//! Proof generation and attestation.
//!
//! ```text
//! salt ─► prover ─► submit ─► (in block) ─► await confirmation ─► fetch path
//!                     │                                              │
//!                     └─ no attestation id: ProofRejected            └─ retried, then AttestationFetch
//! ```
//!
//! Every external call is bounded by a timeout from [`PipelineConfig`].

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use rand::rngs::OsRng;
use tracing::{debug, info, warn};

use zkbid_crypto::{compute_commitment, random_salt};
use zkbid_types::{Attestation, Auction, Digest, Proof, ProverInput, Salt, VerificationKey};

use crate::config::PipelineConfig;
use crate::error::{BidError, NetworkError, Stage};
use crate::network::VerificationNetwork;
use crate::prover::Prover;

pub(crate) async fn bounded<T, F>(stage: Stage, limit: Duration, fut: F) -> Result<T, BidError>
where
    F: Future<Output = T>,
{
    tokio::time::timeout(limit, fut)
        .await
        .map_err(|_| BidError::Timeout(stage))
}

/// Drives a proof through the verification network to a usable attestation.
pub struct Attestor {
    network: Arc<dyn VerificationNetwork>,
    config: PipelineConfig,
}

impl Attestor {
    pub fn new(network: Arc<dyn VerificationNetwork>, config: PipelineConfig) -> Self {
        Self { network, config }
    }

    pub async fn attest(&self, proof: &Proof, vk: &VerificationKey) -> Result<Attestation, BidError> {
        let receipt = bounded(
            Stage::Submit,
            self.config.submit_timeout(),
            self.network.submit(proof, vk),
        )
        .await?
        .map_err(|e| BidError::Network(e.to_string()))?;

        let attestation_id = receipt.attestation_id.ok_or_else(|| {
            BidError::ProofRejected("no attestation issued for submission".to_string())
        })?;
        debug!(attestation_id, "Proof included in block");

        bounded(
            Stage::Confirm,
            self.config.confirmation_timeout(),
            self.network.await_confirmation(attestation_id),
        )
        .await?
        .map_err(|e| BidError::Network(e.to_string()))?;

        let inclusion = self
            .fetch_with_retry(attestation_id, &receipt.leaf_digest)
            .await?;

        info!(attestation_id, index = inclusion.index, "Attestation ready");
        Ok(Attestation::new(attestation_id, receipt.block_hash, inclusion))
    }

    async fn fetch_with_retry(
        &self,
        attestation_id: u64,
        leaf: &Digest,
    ) -> Result<zkbid_types::InclusionProof, BidError> {
        let attempts = self.config.fetch_attempts.max(1);
        let mut reason = String::new();

        for attempt in 1..=attempts {
            match tokio::time::timeout(
                self.config.fetch_timeout(),
                self.network.fetch_inclusion_proof(attestation_id, leaf),
            )
            .await
            {
                Ok(Ok(inclusion)) if &inclusion.leaf == leaf => return Ok(inclusion),
                Ok(Ok(_)) => reason = "inclusion proof is for a different leaf".to_string(),
                Ok(Err(e @ NetworkError::UnknownAttestation(_))) => {
                    return Err(BidError::AttestationFetch {
                        attempts: attempt,
                        reason: e.to_string(),
                    })
                }
                Ok(Err(e)) => reason = e.to_string(),
                Err(_) => reason = format!("timed out during {}", Stage::Fetch),
            }

            warn!(attestation_id, attempt, %reason, "Inclusion proof fetch failed");
            if attempt < attempts {
                tokio::time::sleep(self.config.fetch_backoff(attempt)).await;
            }
        }

        Err(BidError::AttestationFetch { attempts, reason })
    }
}

/// Output of a successful [`ProofPipeline::submit_bid`].
#[derive(Clone, Debug)]
pub struct SubmittedBid {
    pub attestation: Attestation,
    /// `public_signals[0]`, the value to record on the ledger
    pub commitment: Digest,
    /// Must be persisted by the caller; it cannot be recovered later
    pub salt: Salt,
    pub proof: Proof,
}

/// Local proof generation followed by remote attestation.
pub struct ProofPipeline {
    prover: Arc<dyn Prover>,
    attestor: Attestor,
    vk: VerificationKey,
    config: PipelineConfig,
}

impl ProofPipeline {
    pub fn new(
        prover: Arc<dyn Prover>,
        network: Arc<dyn VerificationNetwork>,
        vk: VerificationKey,
        config: PipelineConfig,
    ) -> Self {
        Self {
            prover,
            attestor: Attestor::new(network, config.clone()),
            vk,
            config,
        }
    }

    pub fn verification_key(&self) -> &VerificationKey {
        &self.vk
    }

    /// Prove `bid_value >= min_bid` under a fresh salt and attest the proof.
    pub async fn submit_bid(
        &self,
        auction: &Auction,
        bid_value: u64,
        min_bid: u64,
    ) -> Result<SubmittedBid, BidError> {
        let salt = random_salt(&mut OsRng);
        self.submit_bid_with_salt(auction, bid_value, min_bid, salt)
            .await
    }

    pub async fn submit_bid_with_salt(
        &self,
        auction: &Auction,
        bid_value: u64,
        min_bid: u64,
        salt: Salt,
    ) -> Result<SubmittedBid, BidError> {
        let input = ProverInput::new(bid_value, salt, min_bid);
        debug!(auction_id = auction.auction_id, "Generating bid proof");

        let proof = bounded(
            Stage::Prove,
            self.config.prover_timeout(),
            self.prover.prove(&input),
        )
        .await??;

        let commitment = *proof
            .commitment()
            .ok_or_else(|| BidError::ProofGeneration("proof has no public signals".into()))?;
        if commitment != compute_commitment(bid_value, &salt) {
            return Err(BidError::ProofGeneration(
                "commitment signal does not match bid opening".into(),
            ));
        }

        let attestation = self.attestor.attest(&proof, &self.vk).await?;

        Ok(SubmittedBid {
            attestation,
            commitment,
            salt,
            proof,
        })
    }
}
