//! L1 settlement log monitoring.
use std::sync::Arc;

use async_trait::async_trait;
use chainio::LogDecoder;
use clickhouse::{MetadataRepository, SyncStatusRepository};
use derive_more::Debug;
use extractor::{BlockchainClient, LogFilter};
use eyre::{Context, Result};
use primitives::{Chain, Log, SyncStatusRecord};
use tracing::{debug, info, warn};

use crate::{processors::LogProcessors, scheduler::PeriodicTask};

/// Metadata job name of the monitor.
pub const L1_LOG_MONITOR_JOB: &str = "l1_log_monitor";
/// Metadata metric holding the last scanned L1 block.
pub const LAST_BLOCK_METRIC: &str = "last_block";

/// L1 log monitor settings.
#[derive(Clone, Copy, Debug)]
pub struct LogMonitorConfig {
    /// First block scanned when no watermark is stored
    pub start_block: u64,
    /// Blocks per `eth_getLogs` request, in addition to the first one
    pub max_block_range: u64,
}

/// Scans settlement contract logs on the L1 and records the finality they imply.
#[derive(Debug)]
pub struct L1LogMonitorController {
    l1: Arc<dyn BlockchainClient>,
    decoder: LogDecoder,
    processors: LogProcessors,
    #[debug(skip)]
    sync: Arc<dyn SyncStatusRepository>,
    #[debug(skip)]
    metadata: Arc<dyn MetadataRepository>,
    config: LogMonitorConfig,
}

impl L1LogMonitorController {
    /// Create a monitor.
    pub fn new(
        l1: Arc<dyn BlockchainClient>,
        decoder: LogDecoder,
        processors: LogProcessors,
        sync: Arc<dyn SyncStatusRepository>,
        metadata: Arc<dyn MetadataRepository>,
        config: LogMonitorConfig,
    ) -> Self {
        Self { l1, decoder, processors, sync, metadata, config }
    }

    async fn watermark(&self) -> Result<Option<u64>> {
        self.metadata.metadata(L1_LOG_MONITOR_JOB, LAST_BLOCK_METRIC).await
    }

    async fn set_watermark(&self, block: u64) -> Result<()> {
        self.metadata.set_metadata(L1_LOG_MONITOR_JOB, LAST_BLOCK_METRIC, block).await
    }

    /// Scan from the watermark to the finalized L1 head.
    pub async fn scan(&self) -> Result<()> {
        let head = self.l1.current_height().await.wrap_err("reading L1 height")?;
        let mut from = self.watermark().await?.map_or(self.config.start_block, |b| b + 1);
        if from > head {
            debug!(from, head, "L1 log monitor up to date");
            return Ok(());
        }

        while from <= head {
            let to = from.saturating_add(self.config.max_block_range).min(head);
            let filter = LogFilter {
                from_block: from,
                to_block: to,
                addresses: self.decoder.addresses(),
                topics: self.decoder.topics(),
            };
            let mut logs = self
                .l1
                .logs(&filter)
                .await
                .wrap_err_with(|| format!("fetching L1 logs {from}..={to}"))?;
            logs.sort_by_key(|log| (log.block_number, log.log_index));

            let (records, failure) = self.process_logs(&logs).await;
            self.sync.upsert_sync_statuses(&records).await?;

            if let Some((block, e)) = failure {
                // Blocks before the failing one are done.
                if block > from {
                    self.set_watermark(block - 1).await?;
                }
                warn!(from, to, failed_block = block, records = records.len(), "L1 log batch halted");
                return Err(e);
            }

            self.set_watermark(to).await?;
            info!(from, to, logs = logs.len(), records = records.len(), "Scanned L1 logs");
            from = to + 1;
        }
        Ok(())
    }

    /// Records derived from `logs`, stopping at the first processing error.
    async fn process_logs(
        &self,
        logs: &[Log],
    ) -> (Vec<SyncStatusRecord>, Option<(u64, eyre::Report)>) {
        let mut records = Vec::new();
        for log in logs {
            let block = log.block_number.unwrap_or_default();
            let decoded = match self.decoder.decode(log) {
                Ok(Some(decoded)) => decoded,
                Ok(None) => continue,
                Err(e) => return (records, Some((block, e))),
            };
            let event = decoded.event_name();
            match self.processors.process(log, decoded).await {
                Ok(Some(record)) => {
                    let supported = Chain::try_from(record.chain_id)
                        .is_ok_and(|chain| chain.supports_submission(record.submission_type));
                    if !supported {
                        warn!(
                            chain_id = record.chain_id,
                            submission_type = %record.submission_type,
                            "Dropping record of unsupported submission type"
                        );
                        continue;
                    }
                    debug!(event, l2_block = record.l2_block_number, "Derived sync status");
                    records.push(record);
                }
                Ok(None) => {}
                Err(e) => {
                    return (records, Some((block, e.wrap_err(format!("processing {event} log")))));
                }
            }
        }
        (records, None)
    }
}

#[async_trait]
impl PeriodicTask for L1LogMonitorController {
    fn name(&self) -> String {
        L1_LOG_MONITOR_JOB.to_owned()
    }

    async fn run(&self) -> Result<()> {
        self.scan().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{Address, B256, U256};
    use alloy_sol_types::SolEvent;
    use chainio::{ContractName, MonitoredContract, contracts::optimism::IL2OutputOracle};
    use clickhouse::MemoryStore;
    use extractor::mock::MockClient;
    use primitives::SubmissionType;

    const ORACLE: Address = Address::repeat_byte(0x10);

    fn output_log(block_number: u64, l2_block: u64) -> Log {
        let event = IL2OutputOracle::OutputProposed {
            outputRoot: B256::repeat_byte(1),
            l2OutputIndex: U256::from(l2_block),
            l2BlockNumber: U256::from(l2_block),
            l1Timestamp: U256::from(1_700_000_000 + block_number),
        };
        let encoded = event.encode_log_data();
        Log {
            address: ORACLE,
            topics: encoded.topics().to_vec(),
            data: encoded.data,
            block_number: Some(block_number),
            ..Default::default()
        }
    }

    fn setup() -> (Arc<MockClient>, Arc<MemoryStore>, L1LogMonitorController) {
        let l1 = Arc::new(MockClient::new(Chain::Ethereum));
        l1.set_height(100);
        let store = Arc::new(MemoryStore::new());
        let decoder = LogDecoder::new(vec![MonitoredContract {
            name: ContractName::L2OutputOracle,
            address: ORACLE,
        }]);
        let monitor = L1LogMonitorController::new(
            l1.clone(),
            decoder,
            LogProcessors::new(),
            store.clone(),
            store.clone(),
            LogMonitorConfig { start_block: 1, max_block_range: 49 },
        );
        (l1, store, monitor)
    }

    #[tokio::test]
    async fn records_outputs_and_advances_watermark() {
        let (l1, store, monitor) = setup();
        l1.push_log(output_log(10, 1_000));
        l1.push_log(output_log(60, 2_000));

        monitor.scan().await.unwrap();

        let records = store.sync_records(Chain::Optimism.id());
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.submission_type == SubmissionType::StateUpdates));
        assert_eq!(store.metadata(L1_LOG_MONITOR_JOB, LAST_BLOCK_METRIC).await.unwrap(), Some(100));

        let ranges: Vec<_> = l1.log_requests().iter().map(|f| (f.from_block, f.to_block)).collect();
        assert_eq!(ranges, vec![(1, 50), (51, 100)]);
    }

    #[tokio::test]
    async fn resumes_from_watermark() {
        let (l1, store, monitor) = setup();
        store.set_metadata(L1_LOG_MONITOR_JOB, LAST_BLOCK_METRIC, 90).await.unwrap();

        monitor.scan().await.unwrap();

        assert_eq!(l1.log_requests()[0].from_block, 91);
    }

    #[tokio::test]
    async fn failed_fetch_leaves_watermark() {
        let (l1, store, monitor) = setup();
        l1.fail_logs(60, 60);

        assert!(monitor.scan().await.is_err());
        assert_eq!(store.metadata(L1_LOG_MONITOR_JOB, LAST_BLOCK_METRIC).await.unwrap(), Some(50));
    }

    #[tokio::test]
    async fn processing_error_stops_before_its_block() {
        let (l1, store, monitor) = setup();
        l1.push_log(output_log(10, 1_000));
        // millisecond timestamp
        let mut bad = output_log(20, 1_500);
        bad.data = IL2OutputOracle::OutputProposed {
            l1Timestamp: U256::from(1_700_000_000_000u64),
            ..Default::default()
        }
        .encode_log_data()
        .data;
        l1.push_log(bad);

        assert!(monitor.scan().await.is_err());
        assert_eq!(store.sync_records(Chain::Optimism.id()).len(), 1);
        assert_eq!(store.metadata(L1_LOG_MONITOR_JOB, LAST_BLOCK_METRIC).await.unwrap(), Some(19));
    }
}
