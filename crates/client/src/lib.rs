//! Bidder-side protocol core for zero-knowledge gated sealed-bid auctions.
//!
//! This crate provides:
//! - A phase clock deriving auction phases from a pluggable time source
//! - The proof pipeline: prove, submit, await the attestation, fetch its path
//! - An inclusion checker validating attestations against ledger roots
//! - The commitment manager that drives commit, reveal and finalize
//! - Ledger and verification-network backends, in memory and over the wire

pub mod config;
pub mod error;
pub mod http_network;
pub mod inclusion;
pub mod ledger;
pub mod manager;
pub mod network;
pub mod phase;
pub mod pipeline;
pub mod prover;
pub mod rpc_ledger;
pub mod store;

#[cfg(test)]
mod testing;

pub use config::{ClientConfig, ConfigError, PipelineConfig};
pub use error::{
    BidError, BidOutcome, LedgerError, NetworkError, ProverError, RejectReason, Stage, StoreError,
};
pub use http_network::{HttpVerificationNetwork, VERIFY_PROOF_PATH};
pub use inclusion::AttestationInclusionChecker;
pub use ledger::{InMemoryLedger, InMemoryRelay, Ledger, NewAuction};
pub use manager::{BidCommitmentManager, CommitReceipt, RevealReceipt};
pub use network::{AttestationRelay, SimulatedNetwork, VerificationNetwork};
pub use phase::{phase_at, Clock, ManualClock, PhaseClock, SystemClock};
pub use pipeline::{Attestor, ProofPipeline, SubmittedBid};
pub use prover::{CircuitProver, Prover};
pub use rpc_ledger::RpcLedger;
pub use store::{FileSecretStore, MemorySecretStore, SecretStore};
