//! End-to-end tests for the sealed-bid auction system.
//!
//! These tests exercise the full auction lifecycle across crates:
//! 1. Auction creation on the ledger
//! 2. Bid proving, attestation and inclusion checking
//! 3. Commit, reveal and finalization with payouts
//! 4. The same flow over the mock chain's JSON-RPC and the HTTP verifier

#[cfg(test)]
mod harness;

#[cfg(test)]
mod lifecycle;

#[cfg(test)]
mod ledger_properties;

#[cfg(test)]
mod rpc_flow;
