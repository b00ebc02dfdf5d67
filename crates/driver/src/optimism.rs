//! Finality tracking from the OP stack rollup node.
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use clickhouse::SyncStatusRepository;
use derive_more::Debug;
use extractor::{BlockchainClient, Capability, L2BlockRef, SyncStatus};
use eyre::{Result, eyre};
use primitives::{Chain, SubmissionType, SyncStatusRecord, UnixTime};
use tracing::{debug, info};

use crate::scheduler::PeriodicTask;

/// Emits sync status records when the rollup node's safe or finalized head moves.
///
/// The previous response is kept in the instance; the first poll only
/// establishes it.
#[derive(Debug)]
pub struct OptimismFinalityController {
    client: Arc<dyn BlockchainClient>,
    #[debug(skip)]
    sync: Arc<dyn SyncStatusRepository>,
    previous: Mutex<Option<SyncStatus>>,
}

impl OptimismFinalityController {
    /// Create a poller; `client` must serve the rollup node sync status.
    pub fn new(client: Arc<dyn BlockchainClient>, sync: Arc<dyn SyncStatusRepository>) -> Result<Self> {
        if !client.supports(Capability::SyncStatus) {
            return Err(eyre!("{} client cannot report sync status", client.chain()));
        }
        Ok(Self { client, sync, previous: Mutex::new(None) })
    }

    fn record(
        submission_type: SubmissionType,
        block: &L2BlockRef,
        with_l1: bool,
        observed_at: UnixTime,
    ) -> SyncStatusRecord {
        SyncStatusRecord {
            chain_id: Chain::Optimism.id(),
            submission_type,
            l2_block_number: block.number,
            l2_block_hash: Some(block.hash),
            l1_block_number: with_l1.then_some(block.l1origin.number),
            l1_block_hash: with_l1.then_some(block.l1origin.hash),
            timestamp: observed_at,
        }
    }

    /// Records implied by moving from `previous` to `current`.
    fn diff(previous: &SyncStatus, current: &SyncStatus, now: UnixTime) -> Vec<SyncStatusRecord> {
        let mut records = Vec::new();
        if current.safe_l2.l1origin.number != previous.safe_l2.l1origin.number {
            records.push(Self::record(SubmissionType::DataSubmission, &current.safe_l2, true, now));
        }
        if current.finalized_l2.number != previous.finalized_l2.number {
            records.push(Self::record(
                SubmissionType::L2Finalization,
                &current.finalized_l2,
                false,
                now,
            ));
        }
        records
    }

    /// Poll the rollup node once.
    pub async fn poll(&self) -> Result<()> {
        let current = self.client.sync_status().await?;
        let previous = self
            .previous
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .replace(current);

        let Some(previous) = previous else {
            debug!(
                safe = current.safe_l2.number,
                finalized = current.finalized_l2.number,
                "Initial sync status"
            );
            return Ok(());
        };

        let records = Self::diff(&previous, &current, UnixTime::now());
        if records.is_empty() {
            return Ok(());
        }
        if let Err(e) = self.sync.upsert_sync_statuses(&records).await {
            // Diff against the old state again on the next poll.
            *self.previous.lock().unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(previous);
            return Err(e);
        }
        info!(
            safe = current.safe_l2.number,
            finalized = current.finalized_l2.number,
            records = records.len(),
            "Optimism finality advanced"
        );
        Ok(())
    }
}

#[async_trait]
impl PeriodicTask for OptimismFinalityController {
    fn name(&self) -> String {
        "optimism_finality".to_owned()
    }

    async fn run(&self) -> Result<()> {
        self.poll().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::B256;
    use clickhouse::MemoryStore;
    use extractor::{L1Origin, mock::MockClient};

    fn status(safe: u64, safe_origin: u64, finalized: u64) -> SyncStatus {
        SyncStatus {
            safe_l2: L2BlockRef {
                hash: B256::with_last_byte(safe as u8),
                number: safe,
                timestamp: 0,
                l1origin: L1Origin { hash: B256::repeat_byte(1), number: safe_origin },
            },
            finalized_l2: L2BlockRef { number: finalized, ..Default::default() },
        }
    }

    fn setup() -> (Arc<MockClient>, Arc<MemoryStore>, OptimismFinalityController) {
        let client = Arc::new(MockClient::new(Chain::Optimism));
        let store = Arc::new(MemoryStore::new());
        let controller = OptimismFinalityController::new(client.clone(), store.clone()).unwrap();
        (client, store, controller)
    }

    #[tokio::test]
    async fn first_poll_emits_nothing() {
        let (client, store, controller) = setup();
        client.set_sync_status(status(100, 10, 50));

        controller.poll().await.unwrap();

        assert!(store.sync_records(Chain::Optimism.id()).is_empty());
    }

    #[tokio::test]
    async fn advances_emit_records() {
        let (client, store, controller) = setup();
        client.set_sync_status(status(100, 10, 50));
        controller.poll().await.unwrap();

        client.set_sync_status(status(120, 11, 60));
        controller.poll().await.unwrap();

        let records = store.sync_records(Chain::Optimism.id());
        assert_eq!(records.len(), 2);
        let data = records.iter().find(|r| r.submission_type == SubmissionType::DataSubmission);
        assert_eq!(data.map(|r| (r.l2_block_number, r.l1_block_number)), Some((120, Some(11))));
        let finalized = records.iter().find(|r| r.submission_type == SubmissionType::L2Finalization);
        assert_eq!(finalized.map(|r| (r.l2_block_number, r.l1_block_number)), Some((60, None)));
    }

    #[tokio::test]
    async fn unchanged_origin_emits_nothing() {
        let (client, store, controller) = setup();
        client.set_sync_status(status(100, 10, 50));
        controller.poll().await.unwrap();

        client.set_sync_status(status(105, 10, 50));
        controller.poll().await.unwrap();

        assert!(store.sync_records(Chain::Optimism.id()).is_empty());
    }

    #[test]
    fn requires_sync_status_capability() {
        let client = Arc::new(MockClient::new(Chain::PolygonZkEvm));
        assert!(OptimismFinalityController::new(client, Arc::new(MemoryStore::new())).is_err());
    }
}
