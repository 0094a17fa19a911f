//! Permissionless finalization for sealed-bid auctions.
//!
//! Once an auction's reveal window has ended anyone may close it. The
//! service polls the ledger for such auctions, finalizes each one and
//! erases any bid secrets it holds for them.

pub mod service;

pub use service::{FinalizationService, SettlerConfig, SettlerConfigError};
