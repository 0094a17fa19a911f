//! Constraint checks and proof binding for the bid-range circuit.

use sha2::{Digest as _, Sha256};
use thiserror::Error;

use zkbid_crypto::compute_commitment;
use zkbid_types::{u64_to_signal, Digest, Proof, ProverInput, Salt, VerificationKey};

const PROOF_DOMAIN: &[u8] = b"ZKBID_BID_RANGE_PROOF_V1:";
const PUBLIC_SIGNAL_COUNT: usize = 2;

/// Errors raised while synthesising a proof.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CircuitError {
    #[error("Malformed input field {0}")]
    MalformedInput(&'static str),

    #[error("Constraint unsatisfied: bid {bid} below minimum {min_bid}")]
    BidBelowMinimum { bid: u64, min_bid: u64 },
}

/// Proving key; carries the key it is paired with.
#[derive(Clone, Debug)]
pub struct ProvingKey {
    vk: VerificationKey,
}

impl ProvingKey {
    pub fn verification_key(&self) -> &VerificationKey {
        &self.vk
    }
}

/// Label of the deployed bid-range circuit instance.
pub const DEFAULT_CIRCUIT_LABEL: &[u8] = b"zkbid/bid-range/v1";

/// Derive a key pair for a named circuit instance.
pub fn setup(label: &[u8]) -> (ProvingKey, VerificationKey) {
    let mut hasher = Sha256::new();
    hasher.update(b"ZKBID_BID_RANGE_SETUP_V1:");
    hasher.update(label);
    let vk = VerificationKey(hasher.finalize().to_vec());
    (ProvingKey { vk: vk.clone() }, vk)
}

/// Parsed private and public inputs.
#[derive(Clone, PartialEq, Eq)]
pub struct BidRangeWitness {
    pub bid: u64,
    pub salt: Salt,
    pub min_bid: u64,
}

impl BidRangeWitness {
    pub fn parse(input: &ProverInput) -> Result<Self, CircuitError> {
        Ok(Self {
            bid: input
                .bid
                .parse()
                .map_err(|_| CircuitError::MalformedInput("bid"))?,
            salt: input
                .salt
                .parse()
                .map_err(|_| CircuitError::MalformedInput("salt"))?,
            min_bid: input
                .min_bid
                .parse()
                .map_err(|_| CircuitError::MalformedInput("minBid"))?,
        })
    }

    fn public_signals(&self) -> Result<Vec<Digest>, CircuitError> {
        if self.bid < self.min_bid {
            return Err(CircuitError::BidBelowMinimum {
                bid: self.bid,
                min_bid: self.min_bid,
            });
        }
        Ok(vec![
            compute_commitment(self.bid, &self.salt),
            u64_to_signal(self.min_bid),
        ])
    }
}

fn bind(vk: &VerificationKey, public_signals: &[Digest]) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(PROOF_DOMAIN);
    hasher.update(vk.hash());
    for signal in public_signals {
        hasher.update(signal);
    }
    hasher.finalize().to_vec()
}

/// Prove that the witness satisfies the circuit.
pub fn prove(pk: &ProvingKey, input: &ProverInput) -> Result<Proof, CircuitError> {
    let witness = BidRangeWitness::parse(input)?;
    let public_signals = witness.public_signals()?;
    Ok(Proof {
        proof: bind(&pk.vk, &public_signals),
        public_signals,
    })
}

/// Verify a proof against a verification key.
pub fn verify(vk: &VerificationKey, proof: &Proof) -> bool {
    proof.public_signals.len() == PUBLIC_SIGNAL_COUNT
        && proof.proof == bind(vk, &proof.public_signals)
}
