//! `ClickHouse` reader for varscope.
//! Handles read-only queries, including the ones served to the API layer.

use std::time::Instant;

use clickhouse::{Client, Row, query::Query, sql::Identifier};
use derive_more::Debug;
use eyre::{Context, Result};
use primitives::{
    BlockValueRecord, ChainId, SubmissionType, SyncStatusRecord, UnixTime, VarStatusRecord,
};
use serde::Deserialize;
use tracing::{debug, error};
use url::Url;

use crate::models::{BlockValueRow, MetadataRow, PriceRow, SyncStatusRow, VarStatusRow};

/// Limit/offset pagination
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Page {
    /// Maximum number of rows
    pub limit: u64,
    /// Rows to skip
    pub offset: u64,
}

impl Default for Page {
    fn default() -> Self {
        Self { limit: 100, offset: 0 }
    }
}

#[derive(Row, Deserialize)]
struct TimestampAgg {
    ts: u64,
    n: u64,
}

#[derive(Row, Deserialize)]
struct UsdRow {
    usd: f64,
}

/// `ClickHouse` reader client (read-only operations)
#[derive(Clone, Debug)]
pub struct ClickhouseReader {
    /// Base client
    #[debug(skip)]
    base: Client,
    /// Database name
    db_name: String,
}

impl ClickhouseReader {
    /// Create a new `ClickHouse` reader client
    pub fn new(url: Url, db_name: String, username: String, password: String) -> Result<Self> {
        let client = Client::default().with_url(url).with_user(username).with_password(password);

        Ok(Self { base: client, db_name })
    }

    /// Start a query; the first `?` placeholder is bound to the database name.
    fn query(&self, sql: &str) -> Query {
        self.base.query(sql).bind(Identifier(&self.db_name))
    }

    async fn fetch<R>(&self, sql: &str, query: Query) -> Result<Vec<R>>
    where
        R: Row + for<'b> Deserialize<'b>,
    {
        let start = Instant::now();
        let result = query.fetch_all::<R>().await;

        let duration_ms = start.elapsed().as_millis();
        match &result {
            Ok(rows) => {
                debug!(query = sql, duration_ms, rows = rows.len(), "ClickHouse query executed")
            }
            Err(e) => error!(query = sql, duration_ms, error = %e, "ClickHouse query failed"),
        }
        result.map_err(Into::into)
    }

    /// Block value with the highest block number
    pub async fn get_latest_block_value(
        &self,
        chain_id: ChainId,
    ) -> Result<Option<BlockValueRecord>> {
        let sql = "SELECT ?fields FROM ?.block_values FINAL \
                   WHERE chain_id = ? \
                   ORDER BY l2_block_number DESC LIMIT 1";
        let rows: Vec<BlockValueRow> = self.fetch(sql, self.query(sql).bind(chain_id)).await?;
        rows.into_iter().next().map(BlockValueRecord::try_from).transpose()
    }

    /// Timestamp of the oldest stored block value
    pub async fn get_earliest_block_timestamp(&self, chain_id: ChainId) -> Result<Option<UnixTime>> {
        let sql = "SELECT min(l2_block_timestamp) AS ts, count() AS n \
                   FROM ?.block_values FINAL WHERE chain_id = ?";
        let rows: Vec<TimestampAgg> = self
            .fetch(sql, self.query(sql).bind(chain_id))
            .await
            .context("fetching min(l2_block_timestamp) failed")?;
        match rows.into_iter().next() {
            Some(agg) if agg.n > 0 => Ok(Some(UnixTime::try_from(agg.ts)?)),
            _ => Ok(None),
        }
    }

    /// Block values after `after_block` with a timestamp up to `until`, by block number
    pub async fn get_block_values_between(
        &self,
        chain_id: ChainId,
        after_block: u64,
        until: UnixTime,
    ) -> Result<Vec<BlockValueRecord>> {
        let sql = "SELECT ?fields FROM ?.block_values FINAL \
                   WHERE chain_id = ? AND l2_block_number > ? AND l2_block_timestamp <= ? \
                   ORDER BY l2_block_number ASC";
        let query = self.query(sql).bind(chain_id).bind(after_block).bind(until.as_secs());
        let rows: Vec<BlockValueRow> = self.fetch(sql, query).await?;
        rows.into_iter().map(BlockValueRecord::try_from).collect()
    }

    /// Newest sync record of a submission type observed at or before `at_or_before`
    pub async fn get_latest_sync_status(
        &self,
        chain_id: ChainId,
        submission_type: SubmissionType,
        at_or_before: UnixTime,
    ) -> Result<Option<SyncStatusRecord>> {
        let sql = "SELECT ?fields FROM ?.sync_status FINAL \
                   WHERE chain_id = ? AND submission_type = ? AND timestamp <= ? \
                   ORDER BY timestamp DESC, l2_block_number DESC LIMIT 1";
        let query = self
            .query(sql)
            .bind(chain_id)
            .bind(submission_type.as_str())
            .bind(at_or_before.as_secs());
        let rows: Vec<SyncStatusRow> = self.fetch(sql, query).await?;
        rows.into_iter().next().map(SyncStatusRecord::try_from).transpose()
    }

    /// Sync records of a chain, newest first
    pub async fn get_sync_statuses(
        &self,
        chain_id: ChainId,
        submission_type: Option<SubmissionType>,
        page: Page,
    ) -> Result<Vec<SyncStatusRecord>> {
        let rows: Vec<SyncStatusRow> = match submission_type {
            Some(submission_type) => {
                let sql = "SELECT ?fields FROM ?.sync_status FINAL \
                           WHERE chain_id = ? AND submission_type = ? \
                           ORDER BY timestamp DESC, l2_block_number DESC \
                           LIMIT ? OFFSET ?";
                let query = self
                    .query(sql)
                    .bind(chain_id)
                    .bind(submission_type.as_str())
                    .bind(page.limit)
                    .bind(page.offset);
                self.fetch(sql, query).await?
            }
            None => {
                let sql = "SELECT ?fields FROM ?.sync_status FINAL \
                           WHERE chain_id = ? \
                           ORDER BY timestamp DESC, l2_block_number DESC \
                           LIMIT ? OFFSET ?";
                let query = self.query(sql).bind(chain_id).bind(page.limit).bind(page.offset);
                self.fetch(sql, query).await?
            }
        };
        rows.into_iter().map(SyncStatusRecord::try_from).collect()
    }

    async fn get_edge_var_status(
        &self,
        chain_id: ChainId,
        sql: &'static str,
    ) -> Result<Option<VarStatusRecord>> {
        let rows: Vec<VarStatusRow> = self.fetch(sql, self.query(sql).bind(chain_id)).await?;
        rows.into_iter().next().map(VarStatusRecord::try_from).transpose()
    }

    /// Newest value-at-risk snapshot
    pub async fn get_latest_var_status(&self, chain_id: ChainId) -> Result<Option<VarStatusRecord>> {
        self.get_edge_var_status(
            chain_id,
            "SELECT ?fields FROM ?.var_status FINAL WHERE chain_id = ? \
             ORDER BY timestamp DESC LIMIT 1",
        )
        .await
    }

    /// Oldest value-at-risk snapshot
    pub async fn get_earliest_var_status(
        &self,
        chain_id: ChainId,
    ) -> Result<Option<VarStatusRecord>> {
        self.get_edge_var_status(
            chain_id,
            "SELECT ?fields FROM ?.var_status FINAL WHERE chain_id = ? \
             ORDER BY timestamp ASC LIMIT 1",
        )
        .await
    }

    /// Value-at-risk snapshots in `[from, to]`, oldest first
    pub async fn get_var_history(
        &self,
        chain_id: ChainId,
        from: UnixTime,
        to: UnixTime,
    ) -> Result<Vec<VarStatusRecord>> {
        let sql = "SELECT ?fields FROM ?.var_status FINAL \
                   WHERE chain_id = ? AND timestamp >= ? AND timestamp <= ? \
                   ORDER BY timestamp ASC";
        let query = self.query(sql).bind(chain_id).bind(from.as_secs()).bind(to.as_secs());
        let rows: Vec<VarStatusRow> = self.fetch(sql, query).await?;
        rows.into_iter().map(VarStatusRecord::try_from).collect()
    }

    /// Job metadata value
    pub async fn get_metadata(&self, job_name: &str, metric_name: &str) -> Result<Option<u64>> {
        let sql = "SELECT ?fields FROM ?.metadata FINAL \
                   WHERE job_name = ? AND metric_name = ? LIMIT 1";
        let query = self.query(sql).bind(job_name).bind(metric_name);
        let rows: Vec<MetadataRow> = self.fetch(sql, query).await?;
        Ok(rows.into_iter().next().map(|row| row.value))
    }

    /// Price stored for exactly `timestamp`
    pub async fn get_price(&self, asset_id: &str, timestamp: UnixTime) -> Result<Option<f64>> {
        let sql = "SELECT usd FROM ?.prices FINAL WHERE asset_id = ? AND timestamp = ? LIMIT 1";
        let query = self.query(sql).bind(asset_id).bind(timestamp.as_secs());
        let rows: Vec<UsdRow> = self.fetch(sql, query).await?;
        Ok(rows.into_iter().next().map(|row| row.usd))
    }

    /// Timestamp of the newest stored price of an asset
    pub async fn get_latest_price_timestamp(&self, asset_id: &str) -> Result<Option<UnixTime>> {
        let sql = "SELECT max(timestamp) AS ts, count() AS n FROM ?.prices FINAL WHERE asset_id = ?";
        let rows: Vec<TimestampAgg> = self.fetch(sql, self.query(sql).bind(asset_id)).await?;
        match rows.into_iter().next() {
            Some(agg) if agg.n > 0 => Ok(Some(UnixTime::try_from(agg.ts)?)),
            _ => Ok(None),
        }
    }

    /// Prices of an asset in `[from, to]`, oldest first
    pub async fn get_prices(
        &self,
        asset_id: &str,
        from: UnixTime,
        to: UnixTime,
    ) -> Result<Vec<PriceRow>> {
        let sql = "SELECT ?fields FROM ?.prices FINAL \
                   WHERE asset_id = ? AND timestamp >= ? AND timestamp <= ? \
                   ORDER BY timestamp ASC";
        let query = self.query(sql).bind(asset_id).bind(from.as_secs()).bind(to.as_secs());
        self.fetch(sql, query).await
    }
}
