//! Full auction lifecycles over the in-memory ledger.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;

use zkbid_client::{
    BidError, BidOutcome, FileSecretStore, HttpVerificationNetwork, InMemoryRelay, Ledger,
    LedgerError, MemorySecretStore, PipelineConfig, RejectReason, SecretStore, SimulatedNetwork,
};
use zkbid_crypto::compute_commitment;
use zkbid_module::AuctionError;
use zkbid_settler::FinalizationService;
use zkbid_verifier::VerifierService;

use crate::harness::*;

#[tokio::test]
async fn test_full_auction_flow() {
    let world = World::new();
    let (manager, store) = world.memory_manager();
    let auction_id = world.create_auction().await;

    // ========================================
    // Commit phase
    // ========================================

    let receipt = manager.commit(auction_id, ALICE, 150).await.unwrap();
    let secret = store.get(auction_id, &ALICE).await.unwrap().unwrap();
    assert_eq!(secret.bid_value, 150);
    assert_eq!(receipt.commitment, compute_commitment(150, &secret.salt));

    let auction = world.ledger.get_auction(auction_id).await.unwrap().unwrap();
    assert_eq!(auction.commit_of(&ALICE).unwrap().commitment, receipt.commitment);

    // Below the minimum: rejected before anything reaches the ledger.
    let txs = world.ledger.transactions().len();
    let err = manager.commit(auction_id, BOB, 50).await.unwrap_err();
    assert!(matches!(
        err,
        BidError::CommitRejected(RejectReason::BelowMinimum { .. })
    ));
    assert_eq!(err.outcome(), BidOutcome::NotAccepted);
    assert_eq!(world.ledger.transactions().len(), txs);

    // Carol commits but never reveals.
    manager.commit(auction_id, CAROL, 120).await.unwrap();
    assert_eq!(world.ledger.escrow_of(&CAROL), 120);

    // ========================================
    // Reveal phase
    // ========================================

    world.clock.set(REVEAL_AT);
    manager.reveal(auction_id, ALICE).await.unwrap();
    let auction = world.ledger.get_auction(auction_id).await.unwrap().unwrap();
    assert!(auction.commit_of(&ALICE).unwrap().revealed);
    assert!(!auction.commit_of(&CAROL).unwrap().revealed);

    // ========================================
    // Finalization
    // ========================================

    world.clock.set(FINAL_AT);
    let settlement = manager.finalize(auction_id, BOB).await.unwrap();
    assert_eq!(settlement.winner, Some(ALICE));
    assert_eq!(settlement.winning_bid, Some(150));
    assert_eq!(settlement.refunds, vec![(CAROL, 120)]);
    assert!(store.is_empty());

    let auction = world.ledger.get_auction(auction_id).await.unwrap().unwrap();
    assert!(auction.closed);
    assert_eq!(auction.highest_bidder, Some(ALICE));

    assert_eq!(world.ledger.withdraw(CAROL).await.unwrap(), 120);
    assert_eq!(world.ledger.withdraw(SELLER).await.unwrap(), 150);
    assert!(matches!(
        world.ledger.withdraw(ALICE).await,
        Err(LedgerError::Rejected(AuctionError::NothingToWithdraw))
    ));
    assert_eq!(world.ledger.escrow_of(&ALICE), 0);
    assert_eq!(world.ledger.escrow_of(&CAROL), 0);

    // A second finalize changes nothing.
    let again = manager.finalize(auction_id, CAROL).await.unwrap();
    assert_eq!(again.winner, Some(ALICE));
    assert!(again.refunds.is_empty());
    assert!(!again.newly_closed);
}

#[tokio::test]
async fn test_equal_bids_earliest_commit_wins() {
    let world = World::new();
    let (manager, _store) = world.memory_manager();
    let auction_id = world.create_auction().await;

    manager.commit(auction_id, BOB, 200).await.unwrap();
    manager.commit(auction_id, ALICE, 200).await.unwrap();

    world.clock.set(REVEAL_AT);
    manager.reveal(auction_id, ALICE).await.unwrap();
    manager.reveal(auction_id, BOB).await.unwrap();

    world.clock.set(FINAL_AT);
    let settlement = manager.finalize(auction_id, SELLER).await.unwrap();
    assert_eq!(settlement.winner, Some(BOB));
    assert_eq!(settlement.refunds, vec![(ALICE, 200)]);
}

#[tokio::test]
async fn test_forfeited_deposit_goes_to_seller() {
    let world = World::new();
    let (manager, _store) = world.memory_manager();
    let auction_id = world.create_auction().await;

    manager.commit(auction_id, ALICE, 150).await.unwrap();
    manager.commit(auction_id, BOB, 300).await.unwrap();

    world.clock.set(REVEAL_AT);
    manager.reveal(auction_id, ALICE).await.unwrap();
    let wrong = zkbid_types::BidSecret {
        bid_value: 300,
        salt: zkbid_types::Salt(0),
    };
    let err = manager.reveal_with(auction_id, BOB, wrong).await.unwrap_err();
    assert!(matches!(err, BidError::RevealMismatch { .. }));
    assert_eq!(err.outcome(), BidOutcome::Forfeited);

    world.clock.set(FINAL_AT);
    let settlement = manager.finalize(auction_id, SELLER).await.unwrap();
    assert_eq!(settlement.winner, Some(ALICE));
    assert_eq!(settlement.forfeited, 300);
    assert!(settlement.refunds.is_empty());
    assert_eq!(world.ledger.balance_of(&SELLER), 450);
    assert_eq!(world.ledger.balance_of(&BOB), 0);
}

#[tokio::test]
async fn test_secret_survives_restart() {
    let world = World::new();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("secrets.json");
    let auction_id = world.create_auction().await;

    {
        let manager = world.manager(Arc::new(FileSecretStore::new(&path)));
        manager.commit(auction_id, ALICE, 180).await.unwrap();
    }

    world.clock.set(REVEAL_AT);
    let store = Arc::new(FileSecretStore::new(&path));
    let manager = world.manager(store.clone());
    let receipt = manager.reveal(auction_id, ALICE).await.unwrap();
    assert_eq!(receipt.bid_value, 180);
    assert!(store.get(auction_id, &ALICE).await.unwrap().is_none());
}

#[tokio::test]
async fn test_concurrent_bidders() {
    let world = World::new();
    let (manager, store) = world.memory_manager();
    let manager = Arc::new(manager);
    let auction_id = world.create_auction().await;

    let mut tasks = JoinSet::new();
    for i in 0..5u8 {
        let manager = manager.clone();
        tasks.spawn(async move {
            let bidder = [i + 1; 32];
            manager.commit(auction_id, bidder, 100 + i as u64).await
        });
    }
    while let Some(result) = tasks.join_next().await {
        result.unwrap().unwrap();
    }

    let auction = world.ledger.get_auction(auction_id).await.unwrap().unwrap();
    assert_eq!(auction.commits.len(), 5);
    assert_eq!(store.len(), 5);

    world.clock.set(REVEAL_AT);
    for i in 0..5u8 {
        manager.reveal(auction_id, [i + 1; 32]).await.unwrap();
    }

    world.clock.set(FINAL_AT);
    let settlement = manager.finalize(auction_id, SELLER).await.unwrap();
    assert_eq!(settlement.winner, Some([5; 32]));
    assert_eq!(settlement.winning_bid, Some(104));
    assert_eq!(settlement.refunds.len(), 4);
}

#[tokio::test]
async fn test_tampered_attestation_never_reaches_ledger() {
    let world = World::new();
    let (manager, store) = world.memory_manager();
    let auction_id = world.create_auction().await;
    world.network.tamper_paths(true);

    let err = manager.commit(auction_id, ALICE, 150).await.unwrap_err();
    assert!(matches!(err, BidError::InclusionCheckFailed { .. }));
    assert_eq!(err.outcome(), BidOutcome::NotAccepted);

    let auction = world.ledger.get_auction(auction_id).await.unwrap().unwrap();
    assert!(auction.commits.is_empty());
    assert_eq!(world.ledger.escrow_of(&ALICE), 0);
    assert!(store.is_empty());

    // The network recovers; the bidder can try again.
    world.network.tamper_paths(false);
    manager.commit(auction_id, ALICE, 150).await.unwrap();
}

#[tokio::test]
async fn test_settler_closes_ended_auctions() {
    let world = World::new();
    let store = Arc::new(MemorySecretStore::new());
    let manager = world.manager(store.clone());
    let first = world.create_auction().await;
    let second = world.create_auction().await;

    manager.commit(first, ALICE, 150).await.unwrap();
    manager.commit(second, BOB, 110).await.unwrap();
    world.clock.set(REVEAL_AT);
    manager.reveal(first, ALICE).await.unwrap();

    let service = FinalizationService::new(world.ledger.clone(), CAROL, Duration::from_secs(1))
        .with_store(store.clone());
    assert!(service.run_once().await.unwrap().is_empty());

    world.clock.set(FINAL_AT);
    let mut settled = service.run_once().await.unwrap();
    settled.sort_by_key(|s| s.auction_id);
    assert_eq!(settled.len(), 2);
    assert_eq!(settled[0].winner, Some(ALICE));
    assert_eq!(settled[1].winner, None);
    assert_eq!(settled[1].refunds, vec![(BOB, 110)]);

    // Bob never revealed; his secret is erased with the auction.
    assert!(store.is_empty());
    assert!(world.ledger.pending_finalization().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_commit_through_http_verifier() {
    let world = World::new();
    let relay = Arc::new(InMemoryRelay::new(world.ledger.clone(), RELAYER));
    let service = Arc::new(VerifierService::new(
        Arc::new(SimulatedNetwork::new(Some(relay))),
        PipelineConfig::default(),
    ));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (stop, stopped) = tokio::sync::oneshot::channel::<()>();
    let server = tokio::spawn(zkbid_verifier::serve(listener, service, async {
        let _ = stopped.await;
    }));

    let network =
        HttpVerificationNetwork::new(&format!("http://{}", addr), Duration::from_secs(10)).unwrap();
    let store: Arc<dyn SecretStore> = Arc::new(MemorySecretStore::new());
    let manager = world.manager_with(Arc::new(network), store);
    let auction_id = world.create_auction().await;

    let receipt = manager.commit(auction_id, ALICE, 250).await.unwrap();
    assert!(world
        .ledger
        .attestation_root(receipt.attestation_id)
        .await
        .unwrap()
        .is_some());

    world.clock.set(REVEAL_AT);
    manager.reveal(auction_id, ALICE).await.unwrap();

    stop.send(()).unwrap();
    server.await.unwrap().unwrap();
}
