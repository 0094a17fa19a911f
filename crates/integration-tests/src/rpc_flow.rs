//! The bidder flow against a live mock chain over JSON-RPC.

use std::sync::Arc;

use jsonrpsee::server::ServerHandle;

use zkbid_client::{
    AttestationRelay, BidCommitmentManager, BidError, CircuitProver, Ledger, LedgerError,
    ManualClock, MemorySecretStore, PhaseClock, ProofPipeline, RejectReason, RpcLedger,
    SimulatedNetwork,
};
use zkbid_crypto::compute_commitment;
use zkbid_mock_chain::MockChainServer;
use zkbid_module::AuctionError;
use zkbid_types::{Phase, Salt};

use crate::harness::*;

struct Node {
    ledger: Arc<RpcLedger>,
    clock: Arc<ManualClock>,
    handle: ServerHandle,
}

impl Node {
    async fn start(vk: &zkbid_types::VerificationKey) -> Self {
        let server = MockChainServer::new(&genesis(vk, Some(START))).unwrap();
        let (addr, handle) = zkbid_mock_chain::start("127.0.0.1:0".parse().unwrap(), server)
            .await
            .unwrap();
        let ledger = RpcLedger::connect(&format!("http://{}", addr))
            .unwrap()
            .with_relayer(RELAYER);
        Self {
            ledger: Arc::new(ledger),
            clock: Arc::new(ManualClock::new(START)),
            handle,
        }
    }

    /// Move chain time and keep the local clock in step.
    async fn set_time(&self, timestamp: u64) {
        assert!(self.ledger.set_timestamp(timestamp).await.unwrap());
        self.clock.set(self.ledger.timestamp().await.unwrap());
    }

    fn manager(&self, prover: CircuitProver, vk: zkbid_types::VerificationKey) -> BidCommitmentManager {
        let relay: Arc<dyn AttestationRelay> = self.ledger.clone();
        let network = Arc::new(SimulatedNetwork::new(Some(relay)));
        let pipeline = ProofPipeline::new(Arc::new(prover), network, vk, pipeline_config());
        BidCommitmentManager::new(
            self.ledger.clone(),
            pipeline,
            Arc::new(MemorySecretStore::new()),
            PhaseClock::new(self.clock.clone()),
            &pipeline_config(),
        )
    }

    async fn stop(self) {
        self.handle.stop().unwrap();
        self.handle.stopped().await;
    }
}

#[tokio::test]
async fn test_bid_lifecycle_over_rpc() {
    let (prover, vk) = CircuitProver::setup(LABEL);
    let node = Node::start(&vk).await;
    let manager = node.manager(prover, vk);

    let auction_id = node.ledger.create_auction(SELLER, new_auction()).await.unwrap();
    let active = node.ledger.get_active_auctions().await.unwrap();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].phase_at(START), Phase::Commit);

    let receipt = manager.commit(auction_id, ALICE, 150).await.unwrap();
    assert!(node
        .ledger
        .attestation_root(receipt.attestation_id)
        .await
        .unwrap()
        .is_some());
    manager.commit(auction_id, BOB, 120).await.unwrap();

    let err = manager.commit(auction_id, ALICE, 160).await.unwrap_err();
    assert!(matches!(err, BidError::CommitRejected(RejectReason::DuplicateCommit)));

    node.set_time(REVEAL_AT).await;
    manager.reveal(auction_id, ALICE).await.unwrap();

    node.set_time(FINAL_AT).await;
    assert_eq!(node.ledger.pending_finalization().await.unwrap(), vec![auction_id]);
    let settlement = manager.finalize(auction_id, CAROL).await.unwrap();
    assert_eq!(settlement.winner, Some(ALICE));
    assert_eq!(settlement.refunds, vec![(BOB, 120)]);

    assert_eq!(node.ledger.balance(&BOB).await.unwrap(), 120);
    assert_eq!(node.ledger.withdraw(SELLER).await.unwrap(), 150);
    assert_eq!(node.ledger.balance(&SELLER).await.unwrap(), 0);
    assert!(node.ledger.get_active_auctions().await.unwrap().is_empty());

    node.stop().await;
}

#[tokio::test]
async fn test_rejections_decode_to_auction_errors() {
    let (_, vk) = CircuitProver::setup(LABEL);
    let node = Node::start(&vk).await;
    let auction_id = node.ledger.create_auction(SELLER, new_auction()).await.unwrap();

    let commitment = compute_commitment(150, &Salt(3));
    node.ledger
        .commit_bid(ALICE, auction_id, commitment, 150)
        .await
        .unwrap();
    let err = node
        .ledger
        .commit_bid(ALICE, auction_id, commitment, 150)
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::Rejected(AuctionError::AlreadyCommitted)));

    let err = node.ledger.finalize_auction(BOB, auction_id).await.unwrap_err();
    assert!(matches!(
        err,
        LedgerError::Rejected(AuctionError::WrongPhase {
            expected: Phase::Finalization,
            got: Phase::Commit,
        })
    ));

    assert!(node.ledger.get_auction(99).await.unwrap().is_none());

    node.stop().await;
}

#[tokio::test]
async fn test_unreachable_ledger_is_transport_error() {
    let ledger = RpcLedger::connect("http://127.0.0.1:9").unwrap();
    assert!(matches!(
        ledger.timestamp().await,
        Err(LedgerError::Transport(_))
    ));
}
