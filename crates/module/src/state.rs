//! Ledger state structures for the auction module.

use std::collections::{BTreeMap, HashMap};

use zkbid_types::{Address, Auction, Digest};

use crate::error::AuctionError;
use crate::genesis::AuctionRules;

/// Auction ledger state.
///
/// Auctions are kept in a `BTreeMap` so listings come back in id order.
#[derive(Debug, Default)]
pub struct LedgerState {
    /// Next auction ID to assign
    pub next_auction_id: u64,

    /// All auctions by ID
    pub auctions: BTreeMap<u64, Auction>,

    /// Deposits held against open commitments, per bidder
    pub escrow: HashMap<Address, u64>,

    /// Withdrawable balances (refunds and sale proceeds)
    pub balances: HashMap<Address, u64>,

    /// Attestation roots relayed from the verification network
    pub attestation_roots: HashMap<u64, Digest>,

    /// Hash of the registered verification key
    pub vk_hash: Option<Digest>,

    /// Only this address may publish attestation roots, if set
    pub relayer: Option<Address>,

    /// Duration bounds for new auctions
    pub rules: AuctionRules,
}

impl LedgerState {
    /// Create a new, empty ledger state.
    pub fn new() -> Self {
        Self {
            next_auction_id: 1,
            ..Default::default()
        }
    }

    /// Get the next auction ID and increment.
    pub fn allocate_auction_id(&mut self) -> u64 {
        let id = self.next_auction_id;
        self.next_auction_id += 1;
        id
    }

    /// Get auction by ID.
    pub fn get_auction(&self, auction_id: u64) -> Option<&Auction> {
        self.auctions.get(&auction_id)
    }

    /// Get mutable auction by ID.
    pub fn get_auction_mut(&mut self, auction_id: u64) -> Option<&mut Auction> {
        self.auctions.get_mut(&auction_id)
    }

    /// Get user's escrow balance.
    pub fn get_escrow(&self, user: &Address) -> u64 {
        self.escrow.get(user).copied().unwrap_or(0)
    }

    /// Add to user's escrow balance.
    pub fn add_escrow(&mut self, user: Address, amount: u64) -> Result<(), AuctionError> {
        let held = self.escrow.entry(user).or_insert(0);
        *held = held
            .checked_add(amount)
            .ok_or(AuctionError::BalanceOverflow)?;
        Ok(())
    }

    /// Release escrow. Saturates at zero.
    pub fn release_escrow(&mut self, user: &Address, amount: u64) {
        if let Some(balance) = self.escrow.get_mut(user) {
            *balance = balance.saturating_sub(amount);
            if *balance == 0 {
                self.escrow.remove(user);
            }
        }
    }

    /// Withdrawable balance.
    pub fn get_balance(&self, user: &Address) -> u64 {
        self.balances.get(user).copied().unwrap_or(0)
    }

    pub fn credit_balance(&mut self, user: Address, amount: u64) -> Result<(), AuctionError> {
        if amount > 0 {
            let balance = self.balances.entry(user).or_insert(0);
            *balance = balance
                .checked_add(amount)
                .ok_or(AuctionError::BalanceOverflow)?;
        }
        Ok(())
    }

    /// Remove and return the whole withdrawable balance.
    pub fn take_balance(&mut self, user: &Address) -> u64 {
        self.balances.remove(user).unwrap_or(0)
    }

    /// Root published for an attestation, if any.
    pub fn attestation_root(&self, attestation_id: u64) -> Option<Digest> {
        self.attestation_roots.get(&attestation_id).copied()
    }
}
