//! Bid-range commitment circuit.
//!
//! The circuit proves, for private `(bid, salt)` and public `min_bid`:
//! 1. `bid >= min_bid`
//! 2. `commitment == H(bid ‖ salt)`
//!
//! # Public Signals
//! - `[0]` commitment
//! - `[1]` min_bid (32-byte big-endian)
//!
//! # Private Inputs
//! - bid
//! - salt
//!
//! This crate is a transparent development backend with the same interface as
//! the real prover: proofs are hash bindings of the public signals to the
//! verification key, so it checks wiring and constraints, not zero knowledge.

pub mod bid_range;

pub use bid_range::{
    prove, setup, verify, BidRangeWitness, CircuitError, ProvingKey, DEFAULT_CIRCUIT_LABEL,
};
