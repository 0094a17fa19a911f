//! Ledger module for zero-knowledge gated sealed-bid auctions.
//!
//! This module implements the on-chain side of the protocol:
//!
//! - Auction creation with commit / reveal windows
//! - Sealed bid commitments with escrowed deposits
//! - Reveal checks against the stored commitment, with forfeiture
//! - Idempotent finalization and payout
//! - A registry of attestation roots relayed by the verification network
//!
//! # Architecture
//!
//! - `machine`: per-auction phase/state machine
//! - `call`: message types and the single atomic entry point [`apply`]
//! - `handlers`: business logic for each call
//! - `queries`: read-only state access
//! - `state`: ledger state structures
//! - `genesis`: initial configuration
//! - `error`: error types
//!
//! # Example
//!
//! ```ignore
//! use zkbid_module::{apply, CallContext, LedgerCall, LedgerState};
//!
//! let mut state = LedgerState::new();
//! let ctx = CallContext { sender, timestamp, value: 0 };
//! let receipt = apply(&mut state, &ctx, LedgerCall::CreateAuction { .. })?;
//! ```

pub mod call;
pub mod error;
pub mod genesis;
pub mod handlers;
pub mod machine;
pub mod queries;
pub mod state;

pub use call::{apply, CallOutput, CallReceipt, LedgerCall};
pub use error::AuctionError;
pub use genesis::{AuctionRules, GenesisValidationError, LedgerGenesisConfig};
pub use handlers::{CallContext, HandlerResult};
pub use machine::AuctionStateMachine;
pub use queries::{AuctionSummary, LedgerQuery, LedgerQueryResponse};
pub use state::LedgerState;
