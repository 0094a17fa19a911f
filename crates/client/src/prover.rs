//! Proof generation.

use async_trait::async_trait;

use zkbid_circuit::{CircuitError, ProvingKey};
use zkbid_types::{Proof, ProverInput, VerificationKey};

use crate::error::ProverError;

/// Produces a bid-range proof from `{bid, salt, minBid}`.
#[async_trait]
pub trait Prover: Send + Sync {
    async fn prove(&self, input: &ProverInput) -> Result<Proof, ProverError>;
}

/// Runs the bid-range circuit on the blocking thread pool.
#[derive(Clone, Debug)]
pub struct CircuitProver {
    pk: ProvingKey,
}

impl CircuitProver {
    pub fn new(pk: ProvingKey) -> Self {
        Self { pk }
    }

    /// Key pair for the circuit instance named `label`.
    pub fn setup(label: &[u8]) -> (Self, VerificationKey) {
        let (pk, vk) = zkbid_circuit::setup(label);
        (Self::new(pk), vk)
    }

    pub fn verification_key(&self) -> &VerificationKey {
        self.pk.verification_key()
    }
}

#[async_trait]
impl Prover for CircuitProver {
    async fn prove(&self, input: &ProverInput) -> Result<Proof, ProverError> {
        let pk = self.pk.clone();
        let input = input.clone();
        tokio::task::spawn_blocking(move || zkbid_circuit::prove(&pk, &input))
            .await
            .map_err(|e| ProverError::Unavailable(e.to_string()))?
            .map_err(|e: CircuitError| ProverError::Rejected(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use zkbid_types::Salt;

    #[tokio::test]
    async fn test_circuit_prover_roundtrip() {
        let (prover, vk) = CircuitProver::setup(b"test");
        let proof = prover
            .prove(&ProverInput::new(150, Salt(5), 100))
            .await
            .unwrap();
        assert!(zkbid_circuit::verify(&vk, &proof));
    }

    #[tokio::test]
    async fn test_circuit_prover_rejects_low_bid() {
        let (prover, _) = CircuitProver::setup(b"test");
        let err = prover
            .prove(&ProverInput::new(50, Salt(5), 100))
            .await
            .unwrap_err();
        assert!(matches!(err, ProverError::Rejected(_)));
    }
}
