//! Typed persistence operations consumed by the pipeline controllers.
//!
//! Every write is an upsert keyed by the record's natural identity, so
//! re-running the same range is idempotent.
use async_trait::async_trait;
use eyre::Result;
use primitives::{
    BlockValueRecord, ChainId, PricePoint, SubmissionType, SyncStatusRecord, UnixTime,
    VarStatusRecord,
};

use crate::{ClickhouseReader, ClickhouseWriter, reader::Page};

/// Block value persistence
#[async_trait]
pub trait BlockValueRepository: Send + Sync {
    /// Upsert records keyed by (chain, block number, block hash).
    async fn upsert_block_values(&self, records: &[BlockValueRecord]) -> Result<()>;

    /// Record with the highest block number.
    async fn latest_block_value(&self, chain_id: ChainId) -> Result<Option<BlockValueRecord>>;

    /// Timestamp of the oldest record.
    async fn earliest_block_timestamp(&self, chain_id: ChainId) -> Result<Option<UnixTime>>;

    /// Records with a block number above `after_block` and a timestamp up to
    /// `until`, ordered by block number.
    async fn block_values_between(
        &self,
        chain_id: ChainId,
        after_block: u64,
        until: UnixTime,
    ) -> Result<Vec<BlockValueRecord>>;
}

/// Sync status persistence
#[async_trait]
pub trait SyncStatusRepository: Send + Sync {
    /// Upsert records keyed by (chain, submission type, L2 block number).
    async fn upsert_sync_statuses(&self, records: &[SyncStatusRecord]) -> Result<()>;

    /// Newest record of the given type observed at or before `at_or_before`.
    async fn latest_sync_status(
        &self,
        chain_id: ChainId,
        submission_type: SubmissionType,
        at_or_before: UnixTime,
    ) -> Result<Option<SyncStatusRecord>>;

    /// Records newest first.
    async fn sync_statuses(
        &self,
        chain_id: ChainId,
        submission_type: Option<SubmissionType>,
        page: Page,
    ) -> Result<Vec<SyncStatusRecord>>;
}

/// Value-at-risk snapshot persistence
#[async_trait]
pub trait VarStatusRepository: Send + Sync {
    /// Upsert snapshots keyed by (chain, timestamp).
    async fn upsert_var_statuses(&self, records: &[VarStatusRecord]) -> Result<()>;

    /// Newest snapshot.
    async fn latest_var_status(&self, chain_id: ChainId) -> Result<Option<VarStatusRecord>>;

    /// Oldest snapshot.
    async fn earliest_var_status(&self, chain_id: ChainId) -> Result<Option<VarStatusRecord>>;

    /// Snapshots in `[from, to]`, oldest first.
    async fn var_history(
        &self,
        chain_id: ChainId,
        from: UnixTime,
        to: UnixTime,
    ) -> Result<Vec<VarStatusRecord>>;
}

/// Job watermarks
#[async_trait]
pub trait MetadataRepository: Send + Sync {
    /// Stored value, if any.
    async fn metadata(&self, job_name: &str, metric_name: &str) -> Result<Option<u64>>;

    /// Overwrite a value.
    async fn set_metadata(&self, job_name: &str, metric_name: &str, value: u64) -> Result<()>;
}

/// Historical prices
#[async_trait]
pub trait PriceRepository: Send + Sync {
    /// Upsert points keyed by (asset id, timestamp).
    async fn upsert_prices(&self, points: &[PricePoint]) -> Result<()>;

    /// Price stored for exactly `timestamp`.
    async fn price_at(&self, asset_id: &str, timestamp: UnixTime) -> Result<Option<f64>>;

    /// Timestamp of the newest stored point.
    async fn latest_price_timestamp(&self, asset_id: &str) -> Result<Option<UnixTime>>;
}

/// ClickHouse backed implementation of every repository.
#[derive(Clone, Debug)]
pub struct ClickhouseStore {
    writer: ClickhouseWriter,
    reader: ClickhouseReader,
}

impl ClickhouseStore {
    /// Combine a writer and a reader on the same database.
    pub const fn new(writer: ClickhouseWriter, reader: ClickhouseReader) -> Self {
        Self { writer, reader }
    }

    /// The underlying writer.
    pub const fn writer(&self) -> &ClickhouseWriter {
        &self.writer
    }

    /// The underlying reader.
    pub const fn reader(&self) -> &ClickhouseReader {
        &self.reader
    }
}

#[async_trait]
impl BlockValueRepository for ClickhouseStore {
    async fn upsert_block_values(&self, records: &[BlockValueRecord]) -> Result<()> {
        self.writer.insert_block_values(records).await
    }

    async fn latest_block_value(&self, chain_id: ChainId) -> Result<Option<BlockValueRecord>> {
        self.reader.get_latest_block_value(chain_id).await
    }

    async fn earliest_block_timestamp(&self, chain_id: ChainId) -> Result<Option<UnixTime>> {
        self.reader.get_earliest_block_timestamp(chain_id).await
    }

    async fn block_values_between(
        &self,
        chain_id: ChainId,
        after_block: u64,
        until: UnixTime,
    ) -> Result<Vec<BlockValueRecord>> {
        self.reader.get_block_values_between(chain_id, after_block, until).await
    }
}

#[async_trait]
impl SyncStatusRepository for ClickhouseStore {
    async fn upsert_sync_statuses(&self, records: &[SyncStatusRecord]) -> Result<()> {
        self.writer.insert_sync_statuses(records).await
    }

    async fn latest_sync_status(
        &self,
        chain_id: ChainId,
        submission_type: SubmissionType,
        at_or_before: UnixTime,
    ) -> Result<Option<SyncStatusRecord>> {
        self.reader.get_latest_sync_status(chain_id, submission_type, at_or_before).await
    }

    async fn sync_statuses(
        &self,
        chain_id: ChainId,
        submission_type: Option<SubmissionType>,
        page: Page,
    ) -> Result<Vec<SyncStatusRecord>> {
        self.reader.get_sync_statuses(chain_id, submission_type, page).await
    }
}

#[async_trait]
impl VarStatusRepository for ClickhouseStore {
    async fn upsert_var_statuses(&self, records: &[VarStatusRecord]) -> Result<()> {
        self.writer.insert_var_statuses(records).await
    }

    async fn latest_var_status(&self, chain_id: ChainId) -> Result<Option<VarStatusRecord>> {
        self.reader.get_latest_var_status(chain_id).await
    }

    async fn earliest_var_status(&self, chain_id: ChainId) -> Result<Option<VarStatusRecord>> {
        self.reader.get_earliest_var_status(chain_id).await
    }

    async fn var_history(
        &self,
        chain_id: ChainId,
        from: UnixTime,
        to: UnixTime,
    ) -> Result<Vec<VarStatusRecord>> {
        self.reader.get_var_history(chain_id, from, to).await
    }
}

#[async_trait]
impl MetadataRepository for ClickhouseStore {
    async fn metadata(&self, job_name: &str, metric_name: &str) -> Result<Option<u64>> {
        self.reader.get_metadata(job_name, metric_name).await
    }

    async fn set_metadata(&self, job_name: &str, metric_name: &str, value: u64) -> Result<()> {
        self.writer.insert_metadata(job_name, metric_name, value).await
    }
}

#[async_trait]
impl PriceRepository for ClickhouseStore {
    async fn upsert_prices(&self, points: &[PricePoint]) -> Result<()> {
        self.writer.insert_prices(points).await
    }

    async fn price_at(&self, asset_id: &str, timestamp: UnixTime) -> Result<Option<f64>> {
        self.reader.get_price(asset_id, timestamp).await
    }

    async fn latest_price_timestamp(&self, asset_id: &str) -> Result<Option<UnixTime>> {
        self.reader.get_latest_price_timestamp(asset_id).await
    }
}
