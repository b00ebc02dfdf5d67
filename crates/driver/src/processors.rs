//! Conversion of decoded settlement events into sync status records.
use std::sync::Arc;

use chainio::DecodedLog;
use extractor::BlockchainClient;
use eyre::{Result, eyre};
use primitives::{
    BlockRef, Chain, Log, SubmissionType, SyncStatusRecord, UnixTime,
    retries::{is_connection_refused, retry_with_backoff_if},
};
use tracing::debug;

/// Resolves Polygon zkEVM batches to their last L2 block.
#[derive(Debug)]
pub struct ZkEvmBatchResolver {
    l1: Arc<dyn BlockchainClient>,
    l2: Arc<dyn BlockchainClient>,
    rollup_id: u32,
}

impl ZkEvmBatchResolver {
    /// Create a resolver for the rollup with id `rollup_id`.
    pub fn new(l1: Arc<dyn BlockchainClient>, l2: Arc<dyn BlockchainClient>, rollup_id: u32) -> Self {
        Self { l1, l2, rollup_id }
    }

    async fn process(
        &self,
        log: &Log,
        rollup_id: Option<u32>,
        batch_number: u64,
        verified: bool,
    ) -> Result<Option<SyncStatusRecord>> {
        if rollup_id.is_some_and(|id| id != self.rollup_id) {
            debug!(rollup_id, batch_number, "Skipping batch of another rollup");
            return Ok(None);
        }

        let batch = retry_with_backoff_if(
            || self.l2.batch_by_number(batch_number),
            |e| is_connection_refused(e),
        )
        .await?
        .ok_or_else(|| eyre!("zkEVM batch {batch_number} not found"))?;
        let last_hash = *batch
            .blocks
            .last()
            .ok_or_else(|| eyre!("zkEVM batch {batch_number} has no blocks"))?;
        let l2_block = self
            .l2
            .block(BlockRef::Hash(last_hash))
            .await?
            .ok_or_else(|| eyre!("zkEVM block {last_hash} not found"))?;

        let l1_number = log.block_number.ok_or_else(|| eyre!("log without block number"))?;
        let l1_block = self
            .l1
            .block(BlockRef::Number(l1_number))
            .await?
            .ok_or_else(|| eyre!("L1 block {l1_number} not found"))?;

        Ok(Some(SyncStatusRecord {
            chain_id: Chain::PolygonZkEvm.id(),
            submission_type: if verified {
                SubmissionType::StateUpdates
            } else {
                SubmissionType::DataSubmission
            },
            l2_block_number: l2_block.number,
            l2_block_hash: Some(l2_block.hash),
            l1_block_number: Some(l1_block.number),
            l1_block_hash: Some(l1_block.hash),
            timestamp: UnixTime::try_from(l1_block.timestamp)?,
        }))
    }
}

/// Routes decoded events to the handler of their chain.
#[derive(Debug, Default)]
pub struct LogProcessors {
    zkevm: Option<ZkEvmBatchResolver>,
}

impl LogProcessors {
    /// Processors for the chains that need no extra lookups.
    pub const fn new() -> Self {
        Self { zkevm: None }
    }

    /// Enable Polygon zkEVM batch resolution.
    pub fn with_zkevm(mut self, resolver: ZkEvmBatchResolver) -> Self {
        self.zkevm = Some(resolver);
        self
    }

    /// Sync status record implied by `decoded`, which was read from `log`.
    pub async fn process(&self, log: &Log, decoded: DecodedLog) -> Result<Option<SyncStatusRecord>> {
        match decoded {
            DecodedLog::OutputProposed { l2_block_number, l1_timestamp, .. } => {
                Ok(Some(SyncStatusRecord {
                    chain_id: Chain::Optimism.id(),
                    submission_type: SubmissionType::StateUpdates,
                    l2_block_number,
                    l2_block_hash: None,
                    l1_block_number: log.block_number,
                    l1_block_hash: log.block_hash,
                    timestamp: UnixTime::try_from(l1_timestamp)?,
                }))
            }
            DecodedLog::ZkEvmBatch { rollup_id, batch_number, aggregator } => {
                let Some(resolver) = &self.zkevm else {
                    debug!(batch_number, "zkEVM client not configured, skipping batch");
                    return Ok(None);
                };
                resolver.process(log, rollup_id, batch_number, aggregator.is_some()).await
            }
            // Starknet blocks are not indexed yet.
            DecodedLog::StarknetStateUpdate { .. } => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{Address, B256, U256};
    use extractor::{Batch, mock::MockClient};
    use primitives::Block;

    fn l1_log(block_number: u64) -> Log {
        Log {
            block_number: Some(block_number),
            block_hash: Some(B256::repeat_byte(0xaa)),
            ..Default::default()
        }
    }

    fn zkevm_setup() -> LogProcessors {
        let l1 = Arc::new(MockClient::new(Chain::Ethereum));
        l1.insert_block(
            Block {
                number: 500,
                hash: B256::repeat_byte(0xaa),
                timestamp: 1_700_000_500,
                ..Default::default()
            },
            vec![],
        );
        let l2 = Arc::new(MockClient::new(Chain::PolygonZkEvm));
        for number in [10, 11] {
            l2.insert_block(
                Block {
                    number,
                    hash: B256::with_last_byte(number as u8),
                    timestamp: 1_700_000_000,
                    ..Default::default()
                },
                vec![],
            );
        }
        l2.insert_batch(Batch {
            number: 7,
            blocks: vec![B256::with_last_byte(10), B256::with_last_byte(11)],
        });
        LogProcessors::new().with_zkevm(ZkEvmBatchResolver::new(l1, l2, 1))
    }

    #[tokio::test]
    async fn output_proposed_is_a_state_update() {
        let decoded = DecodedLog::OutputProposed {
            output_root: B256::ZERO,
            l2_output_index: U256::from(1),
            l2_block_number: 1_234,
            l1_timestamp: 1_700_000_000,
        };

        let record = LogProcessors::new().process(&l1_log(99), decoded).await.unwrap().unwrap();

        assert_eq!(record.chain_id, 10);
        assert_eq!(record.submission_type, SubmissionType::StateUpdates);
        assert_eq!(record.l2_block_number, 1_234);
        assert_eq!(record.l1_block_number, Some(99));
        assert_eq!(record.timestamp, UnixTime::new(1_700_000_000).unwrap());
    }

    #[tokio::test]
    async fn verified_batch_resolves_to_its_last_block() {
        let decoded = DecodedLog::ZkEvmBatch {
            rollup_id: Some(1),
            batch_number: 7,
            aggregator: Some(Address::repeat_byte(1)),
        };

        let record = zkevm_setup().process(&l1_log(500), decoded).await.unwrap().unwrap();

        assert_eq!(record.chain_id, 1101);
        assert_eq!(record.submission_type, SubmissionType::StateUpdates);
        assert_eq!(record.l2_block_number, 11);
        assert_eq!(record.l2_block_hash, Some(B256::with_last_byte(11)));
        assert_eq!(record.timestamp, UnixTime::new(1_700_000_500).unwrap());
    }

    #[tokio::test]
    async fn sequenced_batch_is_a_data_submission() {
        let decoded = DecodedLog::ZkEvmBatch { rollup_id: None, batch_number: 7, aggregator: None };
        let record = zkevm_setup().process(&l1_log(500), decoded).await.unwrap().unwrap();
        assert_eq!(record.submission_type, SubmissionType::DataSubmission);
    }

    #[tokio::test]
    async fn other_rollups_are_ignored() {
        let decoded = DecodedLog::ZkEvmBatch { rollup_id: Some(2), batch_number: 7, aggregator: None };
        assert!(zkevm_setup().process(&l1_log(500), decoded).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn missing_batch_is_an_error() {
        let decoded = DecodedLog::ZkEvmBatch { rollup_id: None, batch_number: 8, aggregator: None };
        assert!(zkevm_setup().process(&l1_log(500), decoded).await.is_err());
    }

    #[tokio::test]
    async fn starknet_updates_produce_nothing() {
        let decoded = DecodedLog::StarknetStateUpdate {
            global_root: U256::ZERO,
            block_number: 1,
            block_hash: U256::ZERO,
        };
        assert!(LogProcessors::new().process(&l1_log(1), decoded).await.unwrap().is_none());
    }
}
