//! The chain access capability consumed by the indexing pipeline.
use std::fmt;

use alloy_primitives::{Address, B256};
use async_trait::async_trait;
use eyre::Result;
use primitives::{Block, BlockRef, Chain, Log, Receipt, TransferEvent};
use serde::Deserialize;

/// Optional operations a client may or may not offer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Capability {
    /// `eth_getLogs` style log queries
    Logs,
    /// OP stack `optimism_syncStatus`
    SyncStatus,
    /// zkEVM batch lookups
    Batches,
    /// Gas and fee data on blocks and receipts
    FeeAccounting,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Logs => "logs",
            Self::SyncStatus => "sync_status",
            Self::Batches => "batches",
            Self::FeeAccounting => "fee_accounting",
        };
        f.write_str(name)
    }
}

/// Error returned when a client is asked for an operation it does not offer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Unsupported {
    /// Chain of the client
    pub chain: Chain,
    /// Missing capability
    pub capability: Capability,
}

impl fmt::Display for Unsupported {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} client does not support {}", self.chain, self.capability)
    }
}

impl std::error::Error for Unsupported {}

impl Unsupported {
    /// Returns `true` if the report was caused by a missing capability.
    pub fn is_unsupported(report: &eyre::Report) -> bool {
        report.downcast_ref::<Self>().is_some()
    }
}

/// Inclusive block range log query.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LogFilter {
    /// First block
    pub from_block: u64,
    /// Last block, inclusive
    pub to_block: u64,
    /// Emitting contracts
    pub addresses: Vec<Address>,
    /// Accepted values of the first topic
    pub topics: Vec<B256>,
}

/// L1 block an L2 block was derived from.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct L1Origin {
    /// L1 block hash
    pub hash: B256,
    /// L1 block number
    pub number: u64,
}

/// Pointer to an L2 block as reported by the rollup node.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct L2BlockRef {
    /// L2 block hash
    pub hash: B256,
    /// L2 block number
    pub number: u64,
    /// L2 block timestamp
    pub timestamp: u64,
    /// L1 origin of the block
    pub l1origin: L1Origin,
}

/// Subset of the OP stack rollup node sync status.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct SyncStatus {
    /// Newest L2 block derived from data posted to L1
    pub safe_l2: L2BlockRef,
    /// Newest L2 block derived from finalized L1 data
    pub finalized_l2: L2BlockRef,
}

/// A zkEVM batch and the L2 blocks it contains.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Batch {
    /// Batch number
    pub number: u64,
    /// Hashes of the L2 blocks in the batch, in order
    pub blocks: Vec<B256>,
}

/// Read access to a chain.
///
/// Every variant implements the core block and receipt operations. The
/// remaining operations depend on the chain architecture; check
/// [`BlockchainClient::supports`] before calling them. Unsupported calls fail
/// with [`Unsupported`].
#[async_trait]
pub trait BlockchainClient: Send + Sync + fmt::Debug {
    /// Chain this client talks to.
    fn chain(&self) -> Chain;

    /// Height indexing may progress to: the finalized head on L1, the latest
    /// head on L2s.
    async fn current_height(&self) -> Result<u64>;

    /// Block with its transactions.
    async fn block(&self, block: BlockRef) -> Result<Option<Block>>;

    /// All receipts of a block, if the node can serve them in one call.
    async fn block_receipts(&self, block: &Block) -> Result<Option<Vec<Receipt>>>;

    /// Receipt of a single transaction.
    async fn transaction_receipt(&self, tx_hash: B256) -> Result<Option<Receipt>>;

    /// Interpret a log as a fungible token transfer.
    fn transfer_event(&self, log: &Log) -> Option<TransferEvent>;

    /// Whether an optional operation is available.
    fn supports(&self, capability: Capability) -> bool;

    /// Logs matching the filter.
    async fn logs(&self, _filter: &LogFilter) -> Result<Vec<Log>> {
        Err(self.unsupported(Capability::Logs))
    }

    /// Rollup node sync status.
    async fn sync_status(&self) -> Result<SyncStatus> {
        Err(self.unsupported(Capability::SyncStatus))
    }

    /// Batch by number.
    async fn batch_by_number(&self, _number: u64) -> Result<Option<Batch>> {
        Err(self.unsupported(Capability::Batches))
    }

    /// Error for a missing capability.
    fn unsupported(&self, capability: Capability) -> eyre::Report {
        eyre::Report::new(Unsupported { chain: self.chain(), capability })
    }
}
