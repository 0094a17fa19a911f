//! Mock chain server for local testing of the sealed-bid auction ledger.
//!
//! This provides a JSON-RPC server that simulates on-chain state management
//! for the auction module without requiring a real blockchain. Time only
//! moves through the admin methods, so phase transitions are reproducible.
//!
//! Rejected calls return the ledger's error code with the serialized
//! `AuctionError` attached as error data.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use jsonrpsee::core::async_trait;
use jsonrpsee::proc_macros::rpc;
use jsonrpsee::server::{Server, ServerHandle};
use jsonrpsee::types::error::INVALID_PARAMS_CODE;
use jsonrpsee::types::ErrorObjectOwned;
use parking_lot::RwLock;
use tracing::{debug, info};

use zkbid_module::{
    apply, handlers, queries, AuctionError, CallContext, CallOutput, CallReceipt,
    GenesisValidationError, LedgerCall, LedgerGenesisConfig, LedgerState,
};
use zkbid_types::rpc::{
    decode_address, decode_digest, decode_salt, AuctionRpc, BlockInfo, CommitBidParams,
    CreateAuctionParams, PublishRootParams, RevealBidParams, SettlementRpc,
    VerifyAttestationParams,
};
use zkbid_types::{Address, NftAsset, RevealOutcome};

/// Seconds added by `admin_advanceBlock`.
pub const BLOCK_TIME: u64 = 12;

/// Upper bound on `query_listAuctions` page size.
pub const MAX_PAGE: u64 = 100;

/// Shared chain state.
struct ChainState {
    ledger: LedgerState,
    block_height: u64,
    timestamp: u64,
}

impl ChainState {
    fn advance_block(&mut self) {
        self.block_height += 1;
        self.timestamp += BLOCK_TIME;
    }

    fn block_info(&self) -> BlockInfo {
        BlockInfo {
            height: self.block_height,
            timestamp: self.timestamp,
        }
    }
}

/// RPC API definition for the mock chain.
#[rpc(server)]
pub trait MockChainApi {
    // ============ Admin Methods ============

    /// Advance the chain by one block.
    #[method(name = "admin_advanceBlock")]
    async fn admin_advance_block(&self) -> Result<BlockInfo, ErrorObjectOwned>;

    /// Set the current timestamp (for testing time-dependent logic).
    #[method(name = "admin_setTimestamp")]
    async fn admin_set_timestamp(&self, timestamp: u64) -> Result<bool, ErrorObjectOwned>;

    // ============ Ledger Methods ============

    #[method(name = "ledger_createAuction")]
    async fn ledger_create_auction(
        &self,
        params: CreateAuctionParams,
    ) -> Result<u64, ErrorObjectOwned>;

    /// Commit a sealed bid. Returns the transaction hash.
    #[method(name = "ledger_commitBid")]
    async fn ledger_commit_bid(&self, params: CommitBidParams) -> Result<String, ErrorObjectOwned>;

    #[method(name = "ledger_revealBid")]
    async fn ledger_reveal_bid(
        &self,
        params: RevealBidParams,
    ) -> Result<RevealOutcome, ErrorObjectOwned>;

    #[method(name = "ledger_finalizeAuction")]
    async fn ledger_finalize_auction(
        &self,
        sender: String,
        auction_id: u64,
    ) -> Result<SettlementRpc, ErrorObjectOwned>;

    #[method(name = "ledger_withdraw")]
    async fn ledger_withdraw(&self, sender: String) -> Result<u64, ErrorObjectOwned>;

    /// Read-only inclusion check against a published attestation root.
    #[method(name = "ledger_verifyProofAttestation")]
    async fn ledger_verify_proof_attestation(
        &self,
        params: VerifyAttestationParams,
    ) -> Result<bool, ErrorObjectOwned>;

    // ============ Relay Methods ============

    #[method(name = "relay_publishAttestationRoot")]
    async fn relay_publish_attestation_root(
        &self,
        params: PublishRootParams,
    ) -> Result<bool, ErrorObjectOwned>;

    // ============ Query Methods ============

    /// Get current block info.
    #[method(name = "chain_getBlockInfo")]
    async fn chain_get_block_info(&self) -> Result<BlockInfo, ErrorObjectOwned>;

    #[method(name = "query_getAuction")]
    async fn query_get_auction(&self, auction_id: u64)
        -> Result<Option<AuctionRpc>, ErrorObjectOwned>;

    /// Auctions that are not closed and whose reveal window has not ended.
    #[method(name = "query_getActiveAuctions")]
    async fn query_get_active_auctions(&self) -> Result<Vec<AuctionRpc>, ErrorObjectOwned>;

    #[method(name = "query_listAuctions")]
    async fn query_list_auctions(
        &self,
        offset: u64,
        limit: u64,
    ) -> Result<Vec<AuctionRpc>, ErrorObjectOwned>;

    /// Auctions whose reveal window has ended but that are not yet closed.
    #[method(name = "query_pendingFinalization")]
    async fn query_pending_finalization(&self) -> Result<Vec<u64>, ErrorObjectOwned>;

    #[method(name = "query_getAttestationRoot")]
    async fn query_get_attestation_root(
        &self,
        attestation_id: u64,
    ) -> Result<Option<String>, ErrorObjectOwned>;

    #[method(name = "query_getBalance")]
    async fn query_get_balance(&self, address: String) -> Result<u64, ErrorObjectOwned>;
}

/// Implementation of the mock chain RPC server.
pub struct MockChainServer {
    state: Arc<RwLock<ChainState>>,
}

fn wall_clock() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

impl MockChainServer {
    /// Build the ledger from genesis. The clock starts at the genesis
    /// timestamp, or at the current wall-clock time if none is given.
    pub fn new(genesis: &LedgerGenesisConfig) -> Result<Self, GenesisValidationError> {
        let ledger = genesis.build_state()?;
        let timestamp = genesis.initial_timestamp.unwrap_or_else(wall_clock);
        Ok(Self {
            state: Arc::new(RwLock::new(ChainState {
                ledger,
                block_height: 0,
                timestamp,
            })),
        })
    }

    fn submit(&self, sender: Address, value: u64, call: LedgerCall) -> Result<CallReceipt, ErrorObjectOwned> {
        let mut state = self.state.write();
        let ctx = CallContext {
            sender,
            timestamp: state.timestamp,
            value,
        };
        let receipt = apply(&mut state.ledger, &ctx, call).map_err(rejected)?;
        debug!(tx = %hex::encode(receipt.tx_hash), "Applied call");
        Ok(receipt)
    }
}

/// Rejection by the ledger, carrying the error as data.
fn rejected(err: AuctionError) -> ErrorObjectOwned {
    ErrorObjectOwned::owned(err.code(), err.to_string(), Some(err))
}

fn invalid_params(msg: impl ToString) -> ErrorObjectOwned {
    ErrorObjectOwned::owned(INVALID_PARAMS_CODE, msg.to_string(), None::<()>)
}

fn unexpected(output: CallOutput) -> ErrorObjectOwned {
    ErrorObjectOwned::owned(
        jsonrpsee::types::error::INTERNAL_ERROR_CODE,
        format!("unexpected call output: {:?}", output),
        None::<()>,
    )
}

#[async_trait]
impl MockChainApiServer for MockChainServer {
    async fn admin_advance_block(&self) -> Result<BlockInfo, ErrorObjectOwned> {
        let mut state = self.state.write();
        state.advance_block();
        Ok(state.block_info())
    }

    async fn admin_set_timestamp(&self, timestamp: u64) -> Result<bool, ErrorObjectOwned> {
        let mut state = self.state.write();
        state.timestamp = timestamp;
        info!("Timestamp set to {}", timestamp);
        Ok(true)
    }

    async fn ledger_create_auction(
        &self,
        params: CreateAuctionParams,
    ) -> Result<u64, ErrorObjectOwned> {
        let sender = decode_address("sender", &params.sender).map_err(invalid_params)?;
        let contract = decode_address("nft_contract", &params.nft_contract).map_err(invalid_params)?;
        let call = LedgerCall::CreateAuction {
            collateral: NftAsset {
                contract,
                token_id: params.token_id,
            },
            min_bid: params.min_bid,
            start_time: params.start_time,
            commit_duration: params.commit_duration,
            reveal_duration: params.reveal_duration,
        };

        match self.submit(sender, 0, call)?.output {
            CallOutput::AuctionCreated(auction_id) => {
                info!("Created auction {}", auction_id);
                Ok(auction_id)
            }
            other => Err(unexpected(other)),
        }
    }

    async fn ledger_commit_bid(&self, params: CommitBidParams) -> Result<String, ErrorObjectOwned> {
        let sender = decode_address("sender", &params.sender).map_err(invalid_params)?;
        let commitment = decode_digest("commitment", &params.commitment).map_err(invalid_params)?;
        let receipt = self.submit(
            sender,
            params.value,
            LedgerCall::CommitBid {
                auction_id: params.auction_id,
                commitment,
            },
        )?;
        info!(
            auction_id = params.auction_id,
            deposit = params.value,
            "Bid committed"
        );
        Ok(hex::encode(receipt.tx_hash))
    }

    async fn ledger_reveal_bid(
        &self,
        params: RevealBidParams,
    ) -> Result<RevealOutcome, ErrorObjectOwned> {
        let sender = decode_address("sender", &params.sender).map_err(invalid_params)?;
        let salt = decode_salt(&params.salt).map_err(invalid_params)?;
        let call = LedgerCall::RevealBid {
            auction_id: params.auction_id,
            bid_value: params.bid_value,
            salt,
        };
        match self.submit(sender, 0, call)?.output {
            CallOutput::Revealed(outcome) => {
                info!(auction_id = params.auction_id, ?outcome, "Bid revealed");
                Ok(outcome)
            }
            other => Err(unexpected(other)),
        }
    }

    async fn ledger_finalize_auction(
        &self,
        sender: String,
        auction_id: u64,
    ) -> Result<SettlementRpc, ErrorObjectOwned> {
        let sender = decode_address("sender", &sender).map_err(invalid_params)?;
        match self
            .submit(sender, 0, LedgerCall::FinalizeAuction { auction_id })?
            .output
        {
            CallOutput::Finalized(settlement) => {
                if settlement.newly_closed {
                    info!(auction_id, winning_bid = ?settlement.winning_bid, "Auction finalized");
                }
                Ok(SettlementRpc::from(settlement))
            }
            other => Err(unexpected(other)),
        }
    }

    async fn ledger_withdraw(&self, sender: String) -> Result<u64, ErrorObjectOwned> {
        let sender = decode_address("sender", &sender).map_err(invalid_params)?;
        match self.submit(sender, 0, LedgerCall::Withdraw)?.output {
            CallOutput::Withdrawn(amount) => Ok(amount),
            other => Err(unexpected(other)),
        }
    }

    async fn ledger_verify_proof_attestation(
        &self,
        params: VerifyAttestationParams,
    ) -> Result<bool, ErrorObjectOwned> {
        let leaf = decode_digest("leaf", &params.leaf).map_err(invalid_params)?;
        let path = params
            .merkle_path
            .iter()
            .map(|node| decode_digest("merkle_path", node))
            .collect::<Result<Vec<_>, _>>()
            .map_err(invalid_params)?;

        let state = self.state.read();
        Ok(handlers::handle_verify_proof_attestation(
            &state.ledger,
            params.attestation_id,
            &leaf,
            &path,
            params.leaf_count,
            params.index,
        ))
    }

    async fn relay_publish_attestation_root(
        &self,
        params: PublishRootParams,
    ) -> Result<bool, ErrorObjectOwned> {
        let sender = decode_address("sender", &params.sender).map_err(invalid_params)?;
        let root = decode_digest("root", &params.root).map_err(invalid_params)?;
        let call = LedgerCall::PublishAttestationRoot {
            attestation_id: params.attestation_id,
            root,
        };
        match self.submit(sender, 0, call)?.output {
            CallOutput::RootPublished => {
                info!(attestation_id = params.attestation_id, "Attestation root published");
                Ok(true)
            }
            other => Err(unexpected(other)),
        }
    }

    async fn chain_get_block_info(&self) -> Result<BlockInfo, ErrorObjectOwned> {
        Ok(self.state.read().block_info())
    }

    async fn query_get_auction(
        &self,
        auction_id: u64,
    ) -> Result<Option<AuctionRpc>, ErrorObjectOwned> {
        let state = self.state.read();
        Ok(state.ledger.get_auction(auction_id).map(AuctionRpc::from))
    }

    async fn query_get_active_auctions(&self) -> Result<Vec<AuctionRpc>, ErrorObjectOwned> {
        let state = self.state.read();
        Ok(queries::get_active_auctions(&state.ledger, state.timestamp)
            .iter()
            .map(AuctionRpc::from)
            .collect())
    }

    async fn query_list_auctions(
        &self,
        offset: u64,
        limit: u64,
    ) -> Result<Vec<AuctionRpc>, ErrorObjectOwned> {
        let state = self.state.read();
        let offset = usize::try_from(offset).unwrap_or(usize::MAX);
        let limit = limit.min(MAX_PAGE) as usize;
        Ok(queries::list_auctions(&state.ledger, offset, limit)
            .iter()
            .map(AuctionRpc::from)
            .collect())
    }

    async fn query_pending_finalization(&self) -> Result<Vec<u64>, ErrorObjectOwned> {
        let state = self.state.read();
        Ok(queries::get_pending_finalization(&state.ledger, state.timestamp))
    }

    async fn query_get_attestation_root(
        &self,
        attestation_id: u64,
    ) -> Result<Option<String>, ErrorObjectOwned> {
        let state = self.state.read();
        Ok(state.ledger.attestation_root(attestation_id).map(hex::encode))
    }

    async fn query_get_balance(&self, address: String) -> Result<u64, ErrorObjectOwned> {
        let address = decode_address("address", &address).map_err(invalid_params)?;
        Ok(self.state.read().ledger.get_balance(&address))
    }
}

/// Bind and start the server. Returns the bound address and a handle to
/// stop it.
pub async fn start(
    addr: SocketAddr,
    server: MockChainServer,
) -> std::io::Result<(SocketAddr, ServerHandle)> {
    let rpc = Server::builder().build(addr).await?;
    let local_addr = rpc.local_addr()?;
    let handle = rpc.start(server.into_rpc());
    info!("Mock chain server running on {}", local_addr);
    Ok((local_addr, handle))
}

#[cfg(test)]
mod tests {
    use super::*;

    use zkbid_crypto::{compute_commitment, MerkleTree};
    use zkbid_types::Salt;

    const SELLER: &str = "ee";
    const ALICE: &str = "a1";
    const RELAYER: Address = [0x55; 32];

    fn server() -> MockChainServer {
        MockChainServer::new(&LedgerGenesisConfig {
            relayer: Some(RELAYER),
            initial_timestamp: Some(10_000),
            ..Default::default()
        })
        .unwrap()
    }

    fn create_params(start_time: u64) -> CreateAuctionParams {
        CreateAuctionParams {
            sender: SELLER.to_string(),
            nft_contract: "c0".to_string(),
            token_id: 7,
            min_bid: 100,
            start_time,
            commit_duration: 300,
            reveal_duration: 300,
        }
    }

    #[tokio::test]
    async fn test_clock_controls() {
        let server = server();
        let info = server.chain_get_block_info().await.unwrap();
        assert_eq!((info.height, info.timestamp), (0, 10_000));

        let info = server.admin_advance_block().await.unwrap();
        assert_eq!((info.height, info.timestamp), (1, 10_000 + BLOCK_TIME));

        server.admin_set_timestamp(50_000).await.unwrap();
        assert_eq!(server.chain_get_block_info().await.unwrap().timestamp, 50_000);
    }

    #[tokio::test]
    async fn test_rejection_carries_auction_error() {
        let server = server();
        let err = server
            .ledger_create_auction(CreateAuctionParams {
                commit_duration: 10,
                ..create_params(10_000)
            })
            .await
            .unwrap_err();

        let expected = AuctionError::DurationOutOfRange {
            duration: 10,
            min: 300,
            max: 86_400,
        };
        assert_eq!(err.code(), expected.code());
        let data: AuctionError = serde_json::from_str(err.data().unwrap().get()).unwrap();
        assert_eq!(data, expected);
    }

    #[tokio::test]
    async fn test_bad_hex_is_invalid_params() {
        let server = server();
        let err = server
            .ledger_withdraw("not-hex".to_string())
            .await
            .unwrap_err();
        assert_eq!(err.code(), INVALID_PARAMS_CODE);
    }

    #[tokio::test]
    async fn test_commit_reveal_over_rpc_types() {
        let server = server();
        let id = server.ledger_create_auction(create_params(10_000)).await.unwrap();

        let salt = Salt(99);
        let tx = server
            .ledger_commit_bid(CommitBidParams {
                sender: ALICE.to_string(),
                auction_id: id,
                commitment: hex::encode(compute_commitment(150, &salt)),
                value: 150,
            })
            .await
            .unwrap();
        assert_eq!(tx.len(), 64);

        let active = server.query_get_active_auctions().await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].commits.len(), 1);

        server.admin_set_timestamp(10_300).await.unwrap();
        let outcome = server
            .ledger_reveal_bid(RevealBidParams {
                sender: ALICE.to_string(),
                auction_id: id,
                bid_value: 150,
                salt: salt.to_string(),
            })
            .await
            .unwrap();
        assert_eq!(outcome, RevealOutcome::Revealed);

        assert!(server.query_pending_finalization().await.unwrap().is_empty());
        server.admin_set_timestamp(10_600).await.unwrap();
        assert_eq!(server.query_pending_finalization().await.unwrap(), vec![id]);

        let settlement = server
            .ledger_finalize_auction(ALICE.to_string(), id)
            .await
            .unwrap();
        assert_eq!(settlement.winning_bid, Some(150));
        assert!(server.query_get_active_auctions().await.unwrap().is_empty());
        assert_eq!(server.query_get_balance(SELLER.to_string()).await.unwrap(), 150);
    }

    #[tokio::test]
    async fn test_relay_and_attestation_check() {
        let server = server();
        let leaves = [[1u8; 32], [2u8; 32], [3u8; 32]];
        let tree = MerkleTree::new(&leaves).unwrap();
        let path = tree.proof(1).unwrap();

        let publish = |sender: String| PublishRootParams {
            sender,
            attestation_id: 4,
            root: hex::encode(tree.root()),
        };
        assert!(server
            .relay_publish_attestation_root(publish(ALICE.to_string()))
            .await
            .is_err());
        assert!(server
            .relay_publish_attestation_root(publish(hex::encode(RELAYER)))
            .await
            .unwrap());
        assert_eq!(
            server.query_get_attestation_root(4).await.unwrap(),
            Some(hex::encode(tree.root()))
        );

        let check = |index: u64| VerifyAttestationParams {
            attestation_id: 4,
            leaf: hex::encode(leaves[1]),
            merkle_path: path.iter().map(hex::encode).collect(),
            leaf_count: 3,
            index,
        };
        assert!(server.ledger_verify_proof_attestation(check(1)).await.unwrap());
        assert!(!server.ledger_verify_proof_attestation(check(0)).await.unwrap());
    }

    #[tokio::test]
    async fn test_list_auctions_pages() {
        let server = server();
        for _ in 0..3 {
            server.ledger_create_auction(create_params(10_000)).await.unwrap();
        }
        let page = server.query_list_auctions(1, 5).await.unwrap();
        let ids: Vec<u64> = page.iter().map(|a| a.auction_id).collect();
        assert_eq!(ids, vec![2, 3]);
    }
}
