//! JSON-RPC client for the EVM chain variants.
//!
//! Blocks, receipts and logs are requested through `raw_request` and decoded
//! into lenient local types, so that fields individual rollups omit or extend
//! (zkEVM receipts, OP deposit transactions) do not break deserialization.
use std::borrow::Cow;

use alloy::providers::{Provider, ProviderBuilder};
use alloy_json_rpc::{RpcRecv, RpcSend};
use alloy_primitives::{Address, B256, Bytes, U64, U128, U256};
use alloy_rpc_client::ClientBuilder;
use async_trait::async_trait;
use chainio::DefaultProvider;
use derive_more::Debug;
use eyre::{Result, WrapErr, bail, eyre};
use primitives::{
    Block, BlockRef, Chain, ChainRole, ChainVariant, Log, Receipt, Transaction, TransferEvent,
    retries::DEFAULT_RETRY_LAYER,
};
use serde::Deserialize;
use serde_json::json;
use tracing::info;
use url::Url;

use crate::client::{Batch, BlockchainClient, Capability, LogFilter, SyncStatus};

/// [`BlockchainClient`] over HTTP JSON-RPC.
#[derive(Debug)]
pub struct RpcClient {
    chain: Chain,
    #[debug(skip)]
    provider: DefaultProvider,
    #[debug(skip)]
    rollup_node: Option<DefaultProvider>,
}

fn connect(url: Url) -> DefaultProvider {
    let client = ClientBuilder::default().layer(DEFAULT_RETRY_LAYER).http(url);
    ProviderBuilder::new().connect_client(client)
}

impl RpcClient {
    /// Create a client for an EVM chain.
    pub fn new(chain: Chain, url: Url) -> Result<Self> {
        if chain.variant() == ChainVariant::StarknetLike {
            bail!("{chain} does not expose an Ethereum JSON-RPC interface");
        }
        info!(chain = %chain, host = url.host_str().unwrap_or_default(), "Connecting JSON-RPC client");
        Ok(Self { chain, provider: connect(url), rollup_node: None })
    }

    /// Serve `optimism_syncStatus` from a separate rollup node endpoint.
    pub fn with_rollup_node(mut self, url: Url) -> Self {
        self.rollup_node = Some(connect(url));
        self
    }

    async fn request<P, R>(&self, method: &'static str, params: P) -> Result<R>
    where
        P: RpcSend,
        R: RpcRecv,
    {
        self.provider
            .raw_request(Cow::Borrowed(method), params)
            .await
            .wrap_err_with(|| format!("{} {method} request failed", self.chain))
    }
}

#[async_trait]
impl BlockchainClient for RpcClient {
    fn chain(&self) -> Chain {
        self.chain
    }

    async fn current_height(&self) -> Result<u64> {
        match self.chain.role() {
            ChainRole::L1 => {
                let header: Option<RpcHeader> =
                    self.request("eth_getBlockByNumber", ("finalized", false)).await?;
                header
                    .map(|h| h.number.to())
                    .ok_or_else(|| eyre!("{} node reports no finalized block", self.chain))
            }
            ChainRole::L2 => {
                let number: U64 = self.request("eth_blockNumber", json!([])).await?;
                Ok(number.to())
            }
        }
    }

    async fn block(&self, block: BlockRef) -> Result<Option<Block>> {
        let block: Option<RpcBlock> = match block {
            BlockRef::Number(number) => {
                self.request("eth_getBlockByNumber", (U64::from(number), true)).await?
            }
            BlockRef::Hash(hash) => self.request("eth_getBlockByHash", (hash, true)).await?,
        };
        Ok(block.map(Into::into))
    }

    async fn block_receipts(&self, block: &Block) -> Result<Option<Vec<Receipt>>> {
        let receipts: Option<Vec<RpcReceipt>> =
            self.request("eth_getBlockReceipts", (U64::from(block.number),)).await?;
        Ok(receipts.map(|receipts| receipts.into_iter().map(Into::into).collect()))
    }

    async fn transaction_receipt(&self, tx_hash: B256) -> Result<Option<Receipt>> {
        let receipt: Option<RpcReceipt> =
            self.request("eth_getTransactionReceipt", (tx_hash,)).await?;
        Ok(receipt.map(Into::into))
    }

    fn transfer_event(&self, log: &Log) -> Option<TransferEvent> {
        chainio::decode_transfer(log)
    }

    fn supports(&self, capability: Capability) -> bool {
        match capability {
            Capability::Logs | Capability::FeeAccounting => true,
            Capability::SyncStatus => self.chain.variant() == ChainVariant::OptimismLike,
            Capability::Batches => self.chain.variant() == ChainVariant::ZkEvmLike,
        }
    }

    async fn logs(&self, filter: &LogFilter) -> Result<Vec<Log>> {
        let params = json!([{
            "fromBlock": U64::from(filter.from_block),
            "toBlock": U64::from(filter.to_block),
            "address": filter.addresses,
            "topics": [filter.topics],
        }]);
        let logs: Vec<RpcLog> = self.request("eth_getLogs", params).await?;
        Ok(logs.into_iter().map(Into::into).collect())
    }

    async fn sync_status(&self) -> Result<SyncStatus> {
        if !self.supports(Capability::SyncStatus) {
            return Err(self.unsupported(Capability::SyncStatus));
        }
        let provider = self.rollup_node.as_ref().unwrap_or(&self.provider);
        provider
            .raw_request(Cow::Borrowed("optimism_syncStatus"), json!([]))
            .await
            .wrap_err_with(|| format!("{} optimism_syncStatus request failed", self.chain))
    }

    async fn batch_by_number(&self, number: u64) -> Result<Option<Batch>> {
        if !self.supports(Capability::Batches) {
            return Err(self.unsupported(Capability::Batches));
        }
        let batch: Option<RpcBatch> =
            self.request("zkevm_getBatchByNumber", (U64::from(number), false)).await?;
        Ok(batch.map(|b| Batch { number: b.number.to(), blocks: b.blocks }))
    }
}

#[derive(Debug, Deserialize)]
struct RpcHeader {
    number: U64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcBlock {
    number: U64,
    hash: B256,
    timestamp: U64,
    base_fee_per_gas: Option<U128>,
    #[serde(default)]
    transactions: Vec<RpcTransaction>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcTransaction {
    hash: B256,
    from: Address,
    to: Option<Address>,
    #[serde(default)]
    value: U256,
    gas_price: Option<U128>,
    max_fee_per_gas: Option<U128>,
    max_priority_fee_per_gas: Option<U128>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcReceipt {
    transaction_hash: B256,
    gas_used: U64,
    effective_gas_price: Option<U128>,
    status: Option<U64>,
    #[serde(default)]
    logs: Vec<RpcLog>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcLog {
    address: Address,
    topics: Vec<B256>,
    data: Bytes,
    block_number: Option<U64>,
    block_hash: Option<B256>,
    transaction_hash: Option<B256>,
    log_index: Option<U64>,
}

#[derive(Debug, Deserialize)]
struct RpcBatch {
    number: U64,
    #[serde(default)]
    blocks: Vec<B256>,
}

impl From<RpcBlock> for Block {
    fn from(block: RpcBlock) -> Self {
        Self {
            number: block.number.to(),
            hash: block.hash,
            timestamp: block.timestamp.to(),
            base_fee_per_gas: block.base_fee_per_gas.map(|fee| fee.to()),
            transactions: block.transactions.into_iter().map(Into::into).collect(),
        }
    }
}

impl From<RpcTransaction> for Transaction {
    fn from(tx: RpcTransaction) -> Self {
        Self {
            hash: tx.hash,
            from: tx.from,
            to: tx.to,
            value: tx.value,
            gas_price: tx.gas_price.map(|p| p.to()),
            max_fee_per_gas: tx.max_fee_per_gas.map(|p| p.to()),
            max_priority_fee_per_gas: tx.max_priority_fee_per_gas.map(|p| p.to()),
        }
    }
}

impl From<RpcReceipt> for Receipt {
    fn from(receipt: RpcReceipt) -> Self {
        Self {
            transaction_hash: receipt.transaction_hash,
            gas_used: receipt.gas_used.to(),
            effective_gas_price: receipt.effective_gas_price.map_or(0, |p| p.to()),
            // pre-Byzantium receipts carry a state root instead of a status
            status: receipt.status.is_none_or(|s| s == U64::from(1)),
            logs: receipt.logs.into_iter().map(Into::into).collect(),
        }
    }
}

impl From<RpcLog> for Log {
    fn from(log: RpcLog) -> Self {
        Self {
            address: log.address,
            topics: log.topics,
            data: log.data,
            block_number: log.block_number.map(|n| n.to()),
            block_hash: log.block_hash,
            transaction_hash: log.transaction_hash,
            log_index: log.log_index.map(|i| i.to()),
        }
    }
}
