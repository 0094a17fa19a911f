//! Property tests over the ledger module's call interface.

use proptest::prelude::*;

use zkbid_crypto::compute_commitment;
use zkbid_module::{apply, AuctionError, CallContext, CallOutput, LedgerCall, LedgerState};
use zkbid_types::{Address, NftAsset, RevealOutcome, Salt};

use crate::harness::{FINAL_AT, MIN_BID, REVEAL_AT, SELLER, START};

fn ctx(sender: Address, timestamp: u64, value: u64) -> CallContext {
    CallContext {
        sender,
        timestamp,
        value,
    }
}

fn bidder(i: usize) -> Address {
    let mut addr = [0u8; 32];
    addr[0] = 1;
    addr[1] = i as u8;
    addr
}

fn with_auction() -> (LedgerState, u64) {
    let mut state = LedgerState::new();
    let receipt = apply(
        &mut state,
        &ctx(SELLER, START, 0),
        LedgerCall::CreateAuction {
            collateral: NftAsset::default(),
            min_bid: MIN_BID,
            start_time: START,
            commit_duration: REVEAL_AT - START,
            reveal_duration: FINAL_AT - REVEAL_AT,
        },
    )
    .unwrap();
    match receipt.output {
        CallOutput::AuctionCreated(id) => (state, id),
        other => panic!("unexpected output {:?}", other),
    }
}

fn commit(state: &mut LedgerState, auction_id: u64, who: Address, bid: u64, salt: Salt) {
    apply(
        state,
        &ctx(who, START, bid),
        LedgerCall::CommitBid {
            auction_id,
            commitment: compute_commitment(bid, &salt),
        },
    )
    .unwrap();
}

fn reveal(
    state: &mut LedgerState,
    auction_id: u64,
    who: Address,
    bid_value: u64,
    salt: Salt,
) -> Result<CallOutput, AuctionError> {
    apply(
        state,
        &ctx(who, REVEAL_AT, 0),
        LedgerCall::RevealBid {
            auction_id,
            bid_value,
            salt,
        },
    )
    .map(|r| r.output)
}

proptest! {
    #[test]
    fn matching_opening_reveals(bid in MIN_BID..1_000_000u64, salt in any::<u128>()) {
        let (mut state, id) = with_auction();
        commit(&mut state, id, bidder(0), bid, Salt(salt));

        let out = reveal(&mut state, id, bidder(0), bid, Salt(salt)).unwrap();
        prop_assert_eq!(out, CallOutput::Revealed(RevealOutcome::Revealed));

        let c = state.get_auction(id).unwrap().commit_of(&bidder(0)).unwrap().clone();
        prop_assert!(c.revealed);
        prop_assert_eq!(c.bid_value, Some(bid));
    }

    #[test]
    fn other_opening_never_reveals(
        bid in (MIN_BID + 2)..1_000_000u64,
        salt in any::<u128>(),
        other_salt in any::<u128>(),
        bump in 0u64..3,
    ) {
        prop_assume!(salt != other_salt || bump != 0);
        let (mut state, id) = with_auction();
        commit(&mut state, id, bidder(0), bid, Salt(salt));

        let out = reveal(&mut state, id, bidder(0), bid - bump, Salt(other_salt)).unwrap();
        prop_assert_eq!(out, CallOutput::Revealed(RevealOutcome::Forfeited));

        let c = state.get_auction(id).unwrap().commit_of(&bidder(0)).unwrap().clone();
        prop_assert!(!c.revealed);
        prop_assert!(c.forfeited);

        // No second chance.
        prop_assert_eq!(
            reveal(&mut state, id, bidder(0), bid, Salt(salt)),
            Err(AuctionError::CommitForfeited)
        );
    }

    #[test]
    fn at_most_one_commit_per_bidder(bids in proptest::collection::vec(MIN_BID..10_000u64, 2..5)) {
        let (mut state, id) = with_auction();
        commit(&mut state, id, bidder(0), bids[0], Salt(1));
        for (i, bid) in bids.iter().enumerate().skip(1) {
            let result = apply(
                &mut state,
                &ctx(bidder(0), START, *bid),
                LedgerCall::CommitBid {
                    auction_id: id,
                    commitment: compute_commitment(*bid, &Salt(i as u128)),
                },
            );
            prop_assert_eq!(result.map(|r| r.output), Err(AuctionError::AlreadyCommitted));
        }
        prop_assert_eq!(state.get_auction(id).unwrap().commits.len(), 1);
        prop_assert_eq!(state.get_escrow(&bidder(0)), bids[0]);
    }

    #[test]
    fn finalize_twice_conserves_deposits(
        bids in proptest::collection::vec(MIN_BID..10_000u64, 1..6),
        revealed in proptest::collection::vec(any::<bool>(), 6),
        caller in any::<u8>(),
    ) {
        let (mut state, id) = with_auction();
        for (i, bid) in bids.iter().enumerate() {
            commit(&mut state, id, bidder(i), *bid, Salt(i as u128));
        }
        for (i, bid) in bids.iter().enumerate() {
            if revealed[i] {
                reveal(&mut state, id, bidder(i), *bid, Salt(i as u128)).unwrap();
            }
        }

        let finalize = LedgerCall::FinalizeAuction { auction_id: id };
        let first = apply(&mut state, &ctx([caller; 32], FINAL_AT, 0), finalize.clone()).unwrap();
        let second = apply(&mut state, &ctx([caller; 32], FINAL_AT + 1, 0), finalize).unwrap();

        let (first, second) = match (first.output, second.output) {
            (CallOutput::Finalized(a), CallOutput::Finalized(b)) => (a, b),
            other => panic!("unexpected outputs {:?}", other),
        };
        prop_assert_eq!(first.winner, second.winner);
        prop_assert!(second.refunds.is_empty());
        prop_assert!(!second.newly_closed);

        // Highest revealed bid, earliest on ties.
        let expected = bids
            .iter()
            .enumerate()
            .filter(|(i, _)| revealed[*i])
            .fold(None, |best: Option<(usize, u64)>, (i, bid)| match best {
                Some((_, top)) if *bid <= top => best,
                _ => Some((i, *bid)),
            });
        prop_assert_eq!(first.winner, expected.map(|(i, _)| bidder(i)));

        let total: u64 = bids.iter().sum();
        let paid: u64 = (0..bids.len()).map(|i| state.get_balance(&bidder(i))).sum::<u64>()
            + state.get_balance(&SELLER);
        prop_assert_eq!(paid, total);
        for i in 0..bids.len() {
            prop_assert_eq!(state.get_escrow(&bidder(i)), 0);
        }
    }
}
