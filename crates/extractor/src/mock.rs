//! Scripted in-memory [`BlockchainClient`] for tests.
use std::{
    collections::{BTreeMap, HashMap, HashSet},
    sync::{Mutex, MutexGuard},
};

use alloy_primitives::B256;
use async_trait::async_trait;
use eyre::{Result, eyre};
use primitives::{Block, BlockRef, Chain, ChainVariant, Log, Receipt, TransferEvent};

use crate::client::{Batch, BlockchainClient, Capability, LogFilter, SyncStatus};

#[derive(Debug, Default)]
struct State {
    height: u64,
    blocks: BTreeMap<u64, Block>,
    receipts: HashMap<B256, Receipt>,
    logs: Vec<Log>,
    sync_status: Option<SyncStatus>,
    batches: BTreeMap<u64, Batch>,
    failing_blocks: HashSet<u64>,
    failing_log_ranges: Vec<(u64, u64)>,
    block_receipts_disabled: bool,
    block_requests: Vec<u64>,
    log_requests: Vec<LogFilter>,
}

/// Client whose chain data is set up by the test.
#[derive(Debug)]
pub struct MockClient {
    chain: Chain,
    state: Mutex<State>,
}

impl MockClient {
    /// Empty chain at height zero.
    pub fn new(chain: Chain) -> Self {
        Self { chain, state: Mutex::default() }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Set the height reported by `current_height`.
    pub fn set_height(&self, height: u64) {
        self.state().height = height;
    }

    /// Add a block and the receipts of its transactions.
    pub fn insert_block(&self, block: Block, receipts: Vec<Receipt>) {
        let mut state = self.state();
        for receipt in receipts {
            state.receipts.insert(receipt.transaction_hash, receipt);
        }
        state.height = state.height.max(block.number);
        state.blocks.insert(block.number, block);
    }

    /// Make fetching the given block fail.
    pub fn fail_block(&self, number: u64) {
        self.state().failing_blocks.insert(number);
    }

    /// Make log queries overlapping the range fail.
    pub fn fail_logs(&self, from: u64, to: u64) {
        self.state().failing_log_ranges.push((from, to));
    }

    /// Answer `block_receipts` with `None`, forcing per-transaction lookups.
    pub fn disable_block_receipts(&self) {
        self.state().block_receipts_disabled = true;
    }

    /// Add a log served by `logs`.
    pub fn push_log(&self, log: Log) {
        self.state().logs.push(log);
    }

    /// Set the response of `sync_status`.
    pub fn set_sync_status(&self, status: SyncStatus) {
        self.state().sync_status = Some(status);
    }

    /// Add a batch served by `batch_by_number`.
    pub fn insert_batch(&self, batch: Batch) {
        self.state().batches.insert(batch.number, batch);
    }

    /// Block numbers requested so far, in order.
    pub fn block_requests(&self) -> Vec<u64> {
        self.state().block_requests.clone()
    }

    /// Log filters requested so far, in order.
    pub fn log_requests(&self) -> Vec<LogFilter> {
        self.state().log_requests.clone()
    }
}

#[async_trait]
impl BlockchainClient for MockClient {
    fn chain(&self) -> Chain {
        self.chain
    }

    async fn current_height(&self) -> Result<u64> {
        Ok(self.state().height)
    }

    async fn block(&self, block: BlockRef) -> Result<Option<Block>> {
        let mut state = self.state();
        match block {
            BlockRef::Number(number) => {
                state.block_requests.push(number);
                if state.failing_blocks.contains(&number) {
                    return Err(eyre!("block {number} unavailable"));
                }
                Ok(state.blocks.get(&number).cloned())
            }
            BlockRef::Hash(hash) => Ok(state.blocks.values().find(|b| b.hash == hash).cloned()),
        }
    }

    async fn block_receipts(&self, block: &Block) -> Result<Option<Vec<Receipt>>> {
        let state = self.state();
        if state.block_receipts_disabled {
            return Ok(None);
        }
        Ok(block
            .transactions
            .iter()
            .map(|tx| state.receipts.get(&tx.hash).cloned())
            .collect::<Option<Vec<_>>>())
    }

    async fn transaction_receipt(&self, tx_hash: B256) -> Result<Option<Receipt>> {
        Ok(self.state().receipts.get(&tx_hash).cloned())
    }

    fn transfer_event(&self, log: &Log) -> Option<TransferEvent> {
        chainio::decode_transfer(log)
    }

    fn supports(&self, capability: Capability) -> bool {
        let variant = self.chain.variant();
        match capability {
            Capability::Logs | Capability::FeeAccounting => variant != ChainVariant::StarknetLike,
            Capability::SyncStatus => variant == ChainVariant::OptimismLike,
            Capability::Batches => variant == ChainVariant::ZkEvmLike,
        }
    }

    async fn logs(&self, filter: &LogFilter) -> Result<Vec<Log>> {
        let mut state = self.state();
        state.log_requests.push(filter.clone());
        if state
            .failing_log_ranges
            .iter()
            .any(|&(from, to)| from <= filter.to_block && filter.from_block <= to)
        {
            return Err(eyre!("logs {}..={} unavailable", filter.from_block, filter.to_block));
        }
        Ok(state
            .logs
            .iter()
            .filter(|log| {
                log.block_number.is_some_and(|n| (filter.from_block..=filter.to_block).contains(&n))
            })
            .filter(|log| filter.addresses.is_empty() || filter.addresses.contains(&log.address))
            .filter(|log| {
                filter.topics.is_empty() ||
                    log.topics.first().is_some_and(|t| filter.topics.contains(t))
            })
            .cloned()
            .collect())
    }

    async fn sync_status(&self) -> Result<SyncStatus> {
        if !self.supports(Capability::SyncStatus) {
            return Err(self.unsupported(Capability::SyncStatus));
        }
        self.state().sync_status.ok_or_else(|| eyre!("rollup node unreachable"))
    }

    async fn batch_by_number(&self, number: u64) -> Result<Option<Batch>> {
        if !self.supports(Capability::Batches) {
            return Err(self.unsupported(Capability::Batches));
        }
        Ok(self.state().batches.get(&number).cloned())
    }
}
