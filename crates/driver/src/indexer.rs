//! Per-chain block indexing.
use std::{sync::Arc, time::Duration};

use appraiser::BlockAppraiser;
use async_trait::async_trait;
use clickhouse::BlockValueRepository;
use derive_more::Debug;
use extractor::BlockchainClient;
use eyre::{Context, Result, eyre};
use primitives::{Block, BlockRef, BlockValueRecord, Chain, Receipt};
use tracing::{debug, info, warn};

use crate::scheduler::PeriodicTask;

/// Block indexer settings.
#[derive(Clone, Copy, Debug)]
pub struct IndexerConfig {
    /// First block indexed when nothing is stored for the chain, the head if unset
    pub start_block: Option<u64>,
    /// Blocks per batch, in addition to the first one
    pub max_block_range: u64,
    /// Pause between batches
    pub batch_delay: Duration,
}

/// Appraises every block of a chain from the stored watermark up to the head.
#[derive(Debug)]
pub struct BlockIndexerController {
    chain: Chain,
    client: Arc<dyn BlockchainClient>,
    appraiser: BlockAppraiser,
    #[debug(skip)]
    blocks: Arc<dyn BlockValueRepository>,
    config: IndexerConfig,
}

impl BlockIndexerController {
    /// Create an indexer for the chain served by `client`.
    pub fn new(
        client: Arc<dyn BlockchainClient>,
        appraiser: BlockAppraiser,
        blocks: Arc<dyn BlockValueRepository>,
        config: IndexerConfig,
    ) -> Self {
        Self { chain: client.chain(), client, appraiser, blocks, config }
    }

    /// Next block to index.
    async fn resume_point(&self, head: u64) -> Result<u64> {
        let latest = self.blocks.latest_block_value(self.chain.id()).await?;
        Ok(match latest {
            Some(record) => record.l2_block_number + 1,
            None => self.config.start_block.unwrap_or(head),
        })
    }

    /// Index from the watermark to the current height.
    ///
    /// A failed block stops the run; the records before it are kept and the
    /// next run resumes at the failed block.
    pub async fn index(&self) -> Result<()> {
        let head = self.client.current_height().await.wrap_err("reading chain height")?;
        let mut from = self.resume_point(head).await?;
        if from > head {
            debug!(chain = %self.chain, from, head, "Indexer up to date");
            return Ok(());
        }

        while from <= head {
            let to = from.saturating_add(self.config.max_block_range).min(head);
            let mut records = Vec::with_capacity((to - from + 1) as usize);
            let mut failure = None;
            for number in from..=to {
                match self.index_block(number).await {
                    Ok(record) => records.push(record),
                    Err(e) => {
                        failure = Some(e);
                        break;
                    }
                }
            }

            self.blocks.upsert_block_values(&records).await?;
            if let Some(e) = failure {
                warn!(chain = %self.chain, from, to, records = records.len(), "Block batch halted");
                return Err(e);
            }
            info!(chain = %self.chain, from, to, records = records.len(), "Indexed blocks");

            from = to + 1;
            if from <= head {
                tokio::time::sleep(self.config.batch_delay).await;
            }
        }
        Ok(())
    }

    async fn index_block(&self, number: u64) -> Result<BlockValueRecord> {
        let block = self
            .client
            .block(BlockRef::Number(number))
            .await
            .wrap_err_with(|| format!("fetching {} block {number}", self.chain))?
            .ok_or_else(|| eyre!("{} block {number} not found", self.chain))?;
        let receipts = self.receipts(&block).await?;
        self.appraiser.appraise(&block, &receipts).await
    }

    /// Receipts of the block, one by one when the node has no bulk endpoint.
    async fn receipts(&self, block: &Block) -> Result<Vec<Receipt>> {
        if let Some(receipts) = self.client.block_receipts(block).await? {
            return Ok(receipts);
        }
        let mut receipts = Vec::with_capacity(block.transactions.len());
        for tx in &block.transactions {
            match self.client.transaction_receipt(tx.hash).await? {
                Some(receipt) => receipts.push(receipt),
                None => debug!(chain = %self.chain, tx = %tx.hash, "Receipt missing"),
            }
        }
        Ok(receipts)
    }
}

#[async_trait]
impl PeriodicTask for BlockIndexerController {
    fn name(&self) -> String {
        format!("{}_block_indexer", self.chain)
    }

    async fn run(&self) -> Result<()> {
        self.index().await
    }
}
