//! Shared fixtures: an in-memory ledger, a simulated verification network
//! relaying roots to it, and a manually driven clock.

use std::sync::Arc;

use zkbid_client::{
    BidCommitmentManager, CircuitProver, InMemoryLedger, InMemoryRelay, Ledger, ManualClock,
    MemorySecretStore, NewAuction, PhaseClock, PipelineConfig, ProofPipeline, SecretStore,
    SimulatedNetwork, VerificationNetwork,
};
use zkbid_module::LedgerGenesisConfig;
use zkbid_types::{Address, NftAsset, VerificationKey};

pub const SELLER: Address = [0xee; 32];
pub const RELAYER: Address = [0x55; 32];
pub const ALICE: Address = [0xa1; 32];
pub const BOB: Address = [0xb0; 32];
pub const CAROL: Address = [0xc4; 32];

pub const START: u64 = 1_000;
pub const REVEAL_AT: u64 = 1_300;
pub const FINAL_AT: u64 = 1_600;
pub const MIN_BID: u64 = 100;

pub const LABEL: &[u8] = b"integration";

pub fn pipeline_config() -> PipelineConfig {
    PipelineConfig {
        fetch_backoff_ms: 1,
        ..PipelineConfig::default()
    }
}

pub fn genesis(vk: &VerificationKey, initial_timestamp: Option<u64>) -> LedgerGenesisConfig {
    LedgerGenesisConfig {
        vk_hash: Some(vk.hash()),
        relayer: Some(RELAYER),
        initial_timestamp,
        ..Default::default()
    }
}

pub fn new_auction() -> NewAuction {
    NewAuction {
        collateral: NftAsset {
            contract: [0xc0; 32],
            token_id: 1,
        },
        min_bid: MIN_BID,
        start_time: START,
        commit_duration: REVEAL_AT - START,
        reveal_duration: FINAL_AT - REVEAL_AT,
    }
}

pub struct World {
    pub ledger: Arc<InMemoryLedger>,
    pub network: Arc<SimulatedNetwork>,
    pub clock: Arc<ManualClock>,
    pub prover: CircuitProver,
    pub vk: VerificationKey,
}

impl World {
    pub fn new() -> Self {
        let clock = Arc::new(ManualClock::new(START));
        let (prover, vk) = CircuitProver::setup(LABEL);
        let state = genesis(&vk, None).build_state().unwrap();
        let ledger = Arc::new(InMemoryLedger::new(state, clock.clone()));
        let relay = Arc::new(InMemoryRelay::new(ledger.clone(), RELAYER));
        let network = Arc::new(SimulatedNetwork::new(Some(relay)));
        Self {
            ledger,
            network,
            clock,
            prover,
            vk,
        }
    }

    pub fn manager_with(
        &self,
        network: Arc<dyn VerificationNetwork>,
        store: Arc<dyn SecretStore>,
    ) -> BidCommitmentManager {
        let pipeline = ProofPipeline::new(
            Arc::new(self.prover.clone()),
            network,
            self.vk.clone(),
            pipeline_config(),
        );
        BidCommitmentManager::new(
            self.ledger.clone(),
            pipeline,
            store,
            PhaseClock::new(self.clock.clone()),
            &pipeline_config(),
        )
    }

    pub fn manager(&self, store: Arc<dyn SecretStore>) -> BidCommitmentManager {
        self.manager_with(self.network.clone(), store)
    }

    pub fn memory_manager(&self) -> (BidCommitmentManager, Arc<MemorySecretStore>) {
        let store = Arc::new(MemorySecretStore::new());
        (self.manager(store.clone()), store)
    }

    pub async fn create_auction(&self) -> u64 {
        self.ledger
            .create_auction(SELLER, new_auction())
            .await
            .unwrap()
    }
}
