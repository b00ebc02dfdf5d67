//! Block level appraisal.
use std::{collections::HashMap, sync::Arc};

use alloy::primitives::TxHash;
use eyre::{Context, Result};
use extractor::{BlockchainClient, Capability};
use primitives::{Block, BlockValueRecord, Chain, Receipt, UnixTime};
use tracing::debug;

use crate::{
    price::PriceService,
    rewards::BlockRewardsHandler,
    summarizer::TransferValueSummarizer,
    tokens::TokenRegistry,
    transfer::{TransactionAppraisal, TransferService},
};

/// Turns a block and its receipts into a [`BlockValueRecord`].
#[derive(Debug)]
pub struct BlockAppraiser {
    chain: Chain,
    transfers: TransferService,
    rewards: Option<BlockRewardsHandler>,
    summarizer: TransferValueSummarizer,
}

impl BlockAppraiser {
    /// Create an appraiser for the chain of `client`.
    ///
    /// Fails when the chain has no fee model.
    pub fn new(
        client: Arc<dyn BlockchainClient>,
        registry: Arc<TokenRegistry>,
        prices: Arc<dyn PriceService>,
    ) -> Result<Self> {
        let rewards = if client.supports(Capability::FeeAccounting) {
            Some(BlockRewardsHandler::new(Arc::clone(&registry), Arc::clone(&prices))?)
        } else {
            None
        };
        Ok(Self {
            chain: registry.chain(),
            transfers: TransferService::new(client, registry, prices),
            rewards,
            summarizer: TransferValueSummarizer,
        })
    }

    /// Appraise `block`.
    ///
    /// Reverted transactions move no value and are skipped; their fees still
    /// count towards the block reward.
    pub async fn appraise(&self, block: &Block, receipts: &[Receipt]) -> Result<BlockValueRecord> {
        let timestamp = UnixTime::try_from(block.timestamp)
            .wrap_err_with(|| format!("block {} has an invalid timestamp", block.number))?;
        let by_hash: HashMap<TxHash, &Receipt> =
            receipts.iter().map(|r| (r.transaction_hash, r)).collect();

        let mut appraisals: Vec<TransactionAppraisal> = Vec::with_capacity(block.transactions.len());
        for tx in &block.transactions {
            let receipt = by_hash.get(&tx.hash).copied();
            if receipt.is_some_and(|r| !r.status) {
                continue;
            }
            appraisals.push(self.transfers.appraise(tx, receipt, timestamp).await);
        }

        let reward = match &self.rewards {
            Some(rewards) => rewards.appraise(block, receipts).await,
            None => None,
        };

        let legs = appraisals.iter().flat_map(|a| a.legs.iter()).chain(reward.as_ref());
        let summary = self.summarizer.summarize(legs);
        debug!(
            block = block.number,
            txs = appraisals.len(),
            contracts = summary.by_contract.len(),
            unmapped = summary.unmapped.len(),
            "Appraised block"
        );

        Ok(BlockValueRecord {
            chain_id: self.chain.id(),
            l2_block_number: block.number,
            l2_block_hash: block.hash,
            l2_block_timestamp: timestamp,
            value_by_contract: summary.by_contract,
            value_by_type: summary.by_type,
            unmapped_by_contract: summary.unmapped,
        })
    }
}
