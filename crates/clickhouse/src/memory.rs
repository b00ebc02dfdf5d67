//! In-memory repositories with the same upsert semantics as the ClickHouse tables.
use std::{
    collections::BTreeMap,
    sync::{Mutex, MutexGuard},
};

use alloy::primitives::BlockHash;
use async_trait::async_trait;
use eyre::Result;
use primitives::{
    BlockValueRecord, ChainId, PricePoint, SubmissionType, SyncStatusRecord, UnixTime,
    VarStatusRecord,
};

use crate::{
    reader::Page,
    repository::{
        BlockValueRepository, MetadataRepository, PriceRepository, SyncStatusRepository,
        VarStatusRepository,
    },
};

#[derive(Debug, Default)]
struct Tables {
    block_values: BTreeMap<(ChainId, u64, BlockHash), BlockValueRecord>,
    sync_status: BTreeMap<(ChainId, SubmissionType, u64), SyncStatusRecord>,
    var_status: BTreeMap<(ChainId, UnixTime), VarStatusRecord>,
    metadata: BTreeMap<(String, String), u64>,
    prices: BTreeMap<(String, UnixTime), f64>,
    block_value_writes: usize,
}

/// Repository implementation backed by ordered maps.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn tables(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// All block values of a chain, by block number.
    pub fn block_values(&self, chain_id: ChainId) -> Vec<BlockValueRecord> {
        self.tables()
            .block_values
            .iter()
            .filter(|((chain, _, _), _)| *chain == chain_id)
            .map(|(_, record)| record.clone())
            .collect()
    }

    /// All sync records of a chain.
    pub fn sync_records(&self, chain_id: ChainId) -> Vec<SyncStatusRecord> {
        self.tables()
            .sync_status
            .values()
            .filter(|record| record.chain_id == chain_id)
            .cloned()
            .collect()
    }

    /// All snapshots of a chain, oldest first.
    pub fn var_records(&self, chain_id: ChainId) -> Vec<VarStatusRecord> {
        self.tables()
            .var_status
            .iter()
            .filter(|((chain, _), _)| *chain == chain_id)
            .map(|(_, record)| record.clone())
            .collect()
    }

    /// Number of `upsert_block_values` calls that wrote at least one record.
    pub fn block_value_writes(&self) -> usize {
        self.tables().block_value_writes
    }
}

#[async_trait]
impl BlockValueRepository for MemoryStore {
    async fn upsert_block_values(&self, records: &[BlockValueRecord]) -> Result<()> {
        let mut tables = self.tables();
        if !records.is_empty() {
            tables.block_value_writes += 1;
        }
        for record in records {
            let key = (record.chain_id, record.l2_block_number, record.l2_block_hash);
            tables.block_values.insert(key, record.clone());
        }
        Ok(())
    }

    async fn latest_block_value(&self, chain_id: ChainId) -> Result<Option<BlockValueRecord>> {
        Ok(self.block_values(chain_id).into_iter().max_by_key(|r| r.l2_block_number))
    }

    async fn earliest_block_timestamp(&self, chain_id: ChainId) -> Result<Option<UnixTime>> {
        Ok(self.block_values(chain_id).iter().map(|r| r.l2_block_timestamp).min())
    }

    async fn block_values_between(
        &self,
        chain_id: ChainId,
        after_block: u64,
        until: UnixTime,
    ) -> Result<Vec<BlockValueRecord>> {
        Ok(self
            .block_values(chain_id)
            .into_iter()
            .filter(|r| r.l2_block_number > after_block && r.l2_block_timestamp <= until)
            .collect())
    }
}

#[async_trait]
impl SyncStatusRepository for MemoryStore {
    async fn upsert_sync_statuses(&self, records: &[SyncStatusRecord]) -> Result<()> {
        let mut tables = self.tables();
        for record in records {
            let key = (record.chain_id, record.submission_type, record.l2_block_number);
            tables.sync_status.insert(key, record.clone());
        }
        Ok(())
    }

    async fn latest_sync_status(
        &self,
        chain_id: ChainId,
        submission_type: SubmissionType,
        at_or_before: UnixTime,
    ) -> Result<Option<SyncStatusRecord>> {
        Ok(self
            .sync_records(chain_id)
            .into_iter()
            .filter(|r| r.submission_type == submission_type && r.timestamp <= at_or_before)
            .max_by_key(|r| (r.timestamp, r.l2_block_number)))
    }

    async fn sync_statuses(
        &self,
        chain_id: ChainId,
        submission_type: Option<SubmissionType>,
        page: Page,
    ) -> Result<Vec<SyncStatusRecord>> {
        let mut records: Vec<_> = self
            .sync_records(chain_id)
            .into_iter()
            .filter(|r| submission_type.is_none_or(|t| r.submission_type == t))
            .collect();
        records.sort_by_key(|r| std::cmp::Reverse((r.timestamp, r.l2_block_number)));
        Ok(records
            .into_iter()
            .skip(usize::try_from(page.offset)?)
            .take(usize::try_from(page.limit)?)
            .collect())
    }
}

#[async_trait]
impl VarStatusRepository for MemoryStore {
    async fn upsert_var_statuses(&self, records: &[VarStatusRecord]) -> Result<()> {
        let mut tables = self.tables();
        for record in records {
            tables.var_status.insert((record.chain_id, record.timestamp), record.clone());
        }
        Ok(())
    }

    async fn latest_var_status(&self, chain_id: ChainId) -> Result<Option<VarStatusRecord>> {
        Ok(self.var_records(chain_id).pop())
    }

    async fn earliest_var_status(&self, chain_id: ChainId) -> Result<Option<VarStatusRecord>> {
        Ok(self.var_records(chain_id).into_iter().next())
    }

    async fn var_history(
        &self,
        chain_id: ChainId,
        from: UnixTime,
        to: UnixTime,
    ) -> Result<Vec<VarStatusRecord>> {
        Ok(self
            .var_records(chain_id)
            .into_iter()
            .filter(|r| r.timestamp >= from && r.timestamp <= to)
            .collect())
    }
}

#[async_trait]
impl MetadataRepository for MemoryStore {
    async fn metadata(&self, job_name: &str, metric_name: &str) -> Result<Option<u64>> {
        Ok(self.tables().metadata.get(&(job_name.to_owned(), metric_name.to_owned())).copied())
    }

    async fn set_metadata(&self, job_name: &str, metric_name: &str, value: u64) -> Result<()> {
        self.tables().metadata.insert((job_name.to_owned(), metric_name.to_owned()), value);
        Ok(())
    }
}

#[async_trait]
impl PriceRepository for MemoryStore {
    async fn upsert_prices(&self, points: &[PricePoint]) -> Result<()> {
        let mut tables = self.tables();
        for point in points {
            tables.prices.insert((point.asset_id.clone(), point.timestamp), point.usd);
        }
        Ok(())
    }

    async fn price_at(&self, asset_id: &str, timestamp: UnixTime) -> Result<Option<f64>> {
        Ok(self.tables().prices.get(&(asset_id.to_owned(), timestamp)).copied())
    }

    async fn latest_price_timestamp(&self, asset_id: &str) -> Result<Option<UnixTime>> {
        Ok(self
            .tables()
            .prices
            .keys()
            .filter(|(asset, _)| asset == asset_id)
            .map(|(_, ts)| *ts)
            .max())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::B256;
    use primitives::{AssetValue, ValueMap};

    fn ts(secs: i64) -> UnixTime {
        UnixTime::new(secs).unwrap()
    }

    fn block_value(number: u64, usd: f64) -> BlockValueRecord {
        let mut by_type = ValueMap::new();
        by_type.insert("native_transfer".to_owned(), AssetValue::new(1.0, usd));
        BlockValueRecord {
            chain_id: 10,
            l2_block_number: number,
            l2_block_hash: B256::repeat_byte(number as u8),
            l2_block_timestamp: ts(1_000 + number as i64),
            value_by_type: by_type,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn block_value_upsert_overwrites_instead_of_accumulating() {
        let store = MemoryStore::new();
        store.upsert_block_values(&[block_value(1, 10.0), block_value(2, 5.0)]).await.unwrap();
        store.upsert_block_values(&[block_value(1, 10.0)]).await.unwrap();

        let stored = store.block_values(10);
        assert_eq!(stored.len(), 2);
        assert_eq!(stored[0].value_by_type["native_transfer"].usd, 10.0);
        assert_eq!(store.latest_block_value(10).await.unwrap().unwrap().l2_block_number, 2);
        assert_eq!(store.block_value_writes(), 2);
    }

    #[tokio::test]
    async fn block_values_between_respects_both_bounds() {
        let store = MemoryStore::new();
        let records: Vec<_> = (1..=5).map(|n| block_value(n, 1.0)).collect();
        store.upsert_block_values(&records).await.unwrap();

        let window = store.block_values_between(10, 2, ts(1_004)).await.unwrap();
        assert_eq!(window.iter().map(|r| r.l2_block_number).collect::<Vec<_>>(), vec![3, 4]);
    }

    #[tokio::test]
    async fn latest_sync_status_filters_type_and_time() {
        let store = MemoryStore::new();
        let record = |n: u64, t: i64, submission_type| SyncStatusRecord {
            chain_id: 10,
            submission_type,
            l2_block_number: n,
            l2_block_hash: None,
            l1_block_number: None,
            l1_block_hash: None,
            timestamp: ts(t),
        };
        store
            .upsert_sync_statuses(&[
                record(10, 100, SubmissionType::StateUpdates),
                record(20, 200, SubmissionType::StateUpdates),
                record(30, 150, SubmissionType::DataSubmission),
            ])
            .await
            .unwrap();

        let anchor =
            store.latest_sync_status(10, SubmissionType::StateUpdates, ts(199)).await.unwrap();
        assert_eq!(anchor.map(|r| r.l2_block_number), Some(10));

        let page = store.sync_statuses(10, None, Page { limit: 2, offset: 0 }).await.unwrap();
        assert_eq!(page.iter().map(|r| r.l2_block_number).collect::<Vec<_>>(), vec![20, 30]);
    }

    #[tokio::test]
    async fn metadata_and_prices_are_overwritten() {
        let store = MemoryStore::new();
        assert_eq!(store.metadata("job", "last_block").await.unwrap(), None);
        store.set_metadata("job", "last_block", 5).await.unwrap();
        store.set_metadata("job", "last_block", 7).await.unwrap();
        assert_eq!(store.metadata("job", "last_block").await.unwrap(), Some(7));

        let point =
            |t: i64, usd: f64| PricePoint { asset_id: "ethereum".to_owned(), timestamp: ts(t), usd };
        store.upsert_prices(&[point(3_600, 1.0), point(7_200, 2.0)]).await.unwrap();
        store.upsert_prices(&[point(3_600, 1.5)]).await.unwrap();
        assert_eq!(store.price_at("ethereum", ts(3_600)).await.unwrap(), Some(1.5));
        assert_eq!(store.price_at("ethereum", ts(3_601)).await.unwrap(), None);
        assert_eq!(store.latest_price_timestamp("ethereum").await.unwrap(), Some(ts(7_200)));
    }
}
