//! Ledger client over the mock chain's JSON-RPC interface.

use async_trait::async_trait;
use jsonrpsee::core::client::ClientT;
use jsonrpsee::core::ClientError;
use jsonrpsee::http_client::{HttpClient, HttpClientBuilder};
use jsonrpsee::rpc_params;
use serde::de::DeserializeOwned;

use zkbid_module::AuctionError;
use zkbid_types::rpc::{
    AuctionRpc, BlockInfo, CommitBidParams, CreateAuctionParams, PublishRootParams,
    RevealBidParams, SettlementRpc, VerifyAttestationParams,
};
use zkbid_types::{Address, Auction, Digest, RevealOutcome, Salt, Settlement};

use crate::error::LedgerError;
use crate::ledger::{Ledger, NewAuction};
use crate::network::AttestationRelay;

/// [`Ledger`] backed by a JSON-RPC endpoint.
pub struct RpcLedger {
    client: HttpClient,
    /// Sender used when relaying attestation roots
    relayer: Address,
}

impl RpcLedger {
    pub fn connect(url: &str) -> Result<Self, LedgerError> {
        let client = HttpClientBuilder::default()
            .build(url)
            .map_err(|e| LedgerError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            relayer: [0u8; 32],
        })
    }

    pub fn with_relayer(mut self, relayer: Address) -> Self {
        self.relayer = relayer;
        self
    }

    pub async fn block_info(&self) -> Result<BlockInfo, LedgerError> {
        self.call("chain_getBlockInfo", rpc_params![]).await
    }

    pub async fn set_timestamp(&self, timestamp: u64) -> Result<bool, LedgerError> {
        self.call("admin_setTimestamp", rpc_params![timestamp]).await
    }

    pub async fn advance_block(&self) -> Result<BlockInfo, LedgerError> {
        self.call("admin_advanceBlock", rpc_params![]).await
    }

    pub async fn list_auctions(&self, offset: u64, limit: u64) -> Result<Vec<Auction>, LedgerError> {
        let auctions: Vec<AuctionRpc> = self
            .call("query_listAuctions", rpc_params![offset, limit])
            .await?;
        decode_auctions(auctions)
    }

    pub async fn balance(&self, address: &Address) -> Result<u64, LedgerError> {
        self.call("query_getBalance", rpc_params![hex::encode(address)])
            .await
    }

    async fn call<R: DeserializeOwned>(
        &self,
        method: &str,
        params: jsonrpsee::core::params::ArrayParams,
    ) -> Result<R, LedgerError> {
        self.client
            .request(method, params)
            .await
            .map_err(map_client_error)
    }
}

/// Server-side rejections carry the [`AuctionError`] as error data.
fn map_client_error(err: ClientError) -> LedgerError {
    match err {
        ClientError::Call(obj) => {
            match obj
                .data()
                .and_then(|raw| serde_json::from_str::<AuctionError>(raw.get()).ok())
            {
                Some(auction_err) => LedgerError::Rejected(auction_err),
                None => LedgerError::Decode(format!("{} ({})", obj.message(), obj.code())),
            }
        }
        other => LedgerError::Transport(other.to_string()),
    }
}

fn decode_auctions(auctions: Vec<AuctionRpc>) -> Result<Vec<Auction>, LedgerError> {
    auctions
        .into_iter()
        .map(|a| Auction::try_from(a).map_err(|e| LedgerError::Decode(e.to_string())))
        .collect()
}

#[async_trait]
impl Ledger for RpcLedger {
    async fn create_auction(&self, sender: Address, params: NewAuction) -> Result<u64, LedgerError> {
        let params = CreateAuctionParams {
            sender: hex::encode(sender),
            nft_contract: hex::encode(params.collateral.contract),
            token_id: params.collateral.token_id,
            min_bid: params.min_bid,
            start_time: params.start_time,
            commit_duration: params.commit_duration,
            reveal_duration: params.reveal_duration,
        };
        self.call("ledger_createAuction", rpc_params![params]).await
    }

    async fn commit_bid(
        &self,
        sender: Address,
        auction_id: u64,
        commitment: Digest,
        value: u64,
    ) -> Result<(), LedgerError> {
        let params = CommitBidParams {
            sender: hex::encode(sender),
            auction_id,
            commitment: hex::encode(commitment),
            value,
        };
        let _tx_hash: String = self.call("ledger_commitBid", rpc_params![params]).await?;
        Ok(())
    }

    async fn reveal_bid(
        &self,
        sender: Address,
        auction_id: u64,
        bid_value: u64,
        salt: Salt,
    ) -> Result<RevealOutcome, LedgerError> {
        let params = RevealBidParams {
            sender: hex::encode(sender),
            auction_id,
            bid_value,
            salt: salt.to_string(),
        };
        self.call("ledger_revealBid", rpc_params![params]).await
    }

    async fn finalize_auction(
        &self,
        sender: Address,
        auction_id: u64,
    ) -> Result<Settlement, LedgerError> {
        let settlement: SettlementRpc = self
            .call("ledger_finalizeAuction", rpc_params![hex::encode(sender), auction_id])
            .await?;
        Settlement::try_from(settlement).map_err(|e| LedgerError::Decode(e.to_string()))
    }

    async fn withdraw(&self, sender: Address) -> Result<u64, LedgerError> {
        self.call("ledger_withdraw", rpc_params![hex::encode(sender)])
            .await
    }

    async fn verify_proof_attestation(
        &self,
        attestation_id: u64,
        leaf: Digest,
        merkle_path: Vec<Digest>,
        leaf_count: u64,
        index: u64,
    ) -> Result<bool, LedgerError> {
        let params = VerifyAttestationParams {
            attestation_id,
            leaf: hex::encode(leaf),
            merkle_path: merkle_path.iter().map(hex::encode).collect(),
            leaf_count,
            index,
        };
        self.call("ledger_verifyProofAttestation", rpc_params![params])
            .await
    }

    async fn attestation_root(&self, attestation_id: u64) -> Result<Option<Digest>, LedgerError> {
        let root: Option<String> = self
            .call("query_getAttestationRoot", rpc_params![attestation_id])
            .await?;
        root.map(|r| {
            zkbid_types::rpc::decode_digest("root", &r)
                .map_err(|e| LedgerError::Decode(e.to_string()))
        })
        .transpose()
    }

    async fn get_auction(&self, auction_id: u64) -> Result<Option<Auction>, LedgerError> {
        let auction: Option<AuctionRpc> = self
            .call("query_getAuction", rpc_params![auction_id])
            .await?;
        auction
            .map(|a| Auction::try_from(a).map_err(|e| LedgerError::Decode(e.to_string())))
            .transpose()
    }

    async fn get_active_auctions(&self) -> Result<Vec<Auction>, LedgerError> {
        let auctions: Vec<AuctionRpc> = self
            .call("query_getActiveAuctions", rpc_params![])
            .await?;
        decode_auctions(auctions)
    }

    async fn pending_finalization(&self) -> Result<Vec<u64>, LedgerError> {
        self.call("query_pendingFinalization", rpc_params![]).await
    }

    async fn timestamp(&self) -> Result<u64, LedgerError> {
        Ok(self.block_info().await?.timestamp)
    }
}

#[async_trait]
impl AttestationRelay for RpcLedger {
    async fn publish_root(&self, attestation_id: u64, root: Digest) -> Result<(), LedgerError> {
        let params = PublishRootParams {
            sender: hex::encode(self.relayer),
            attestation_id,
            root: hex::encode(root),
        };
        let _: bool = self
            .call("relay_publishAttestationRoot", rpc_params![params])
            .await?;
        Ok(())
    }
}
