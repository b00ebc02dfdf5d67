//! `ClickHouse` writer for varscope.
//! Handles database initialization and upserts.

use clickhouse::{Client, Row};
use derive_more::Debug;
use eyre::{Context, Result};
use primitives::{BlockValueRecord, PricePoint, SyncStatusRecord, VarStatusRecord};
use serde::Serialize;
use tracing::{debug, info};
use url::Url;

use crate::{
    models::{BlockValueRow, MetadataRow, PriceRow, SyncStatusRow, VarStatusRow},
    schema::{TABLE_SCHEMAS, TABLES, TableSchema},
};

/// `ClickHouse` writer client (schema management and inserts)
#[derive(Clone, Debug)]
pub struct ClickhouseWriter {
    /// Base client
    #[debug(skip)]
    base: Client,
    /// Database name
    db_name: String,
}

impl ClickhouseWriter {
    /// Create a new `ClickHouse` writer client
    pub fn new(url: Url, db_name: String, username: String, password: String) -> Result<Self> {
        let client = Client::default()
            .with_url(url)
            .with_database(db_name.clone())
            .with_user(username)
            .with_password(password);

        Ok(Self { base: client, db_name })
    }

    /// Create a table with the given schema.
    ///
    /// Every table is a `ReplacingMergeTree` versioned by `inserted_at`, so
    /// writing a row again with the same sorting key replaces it.
    async fn create_table(&self, schema: &TableSchema) -> Result<()> {
        let query = format!(
            "CREATE TABLE IF NOT EXISTS {}.{} (
                {}
            ) ENGINE = ReplacingMergeTree(inserted_at)
            ORDER BY ({})",
            self.db_name, schema.name, schema.columns, schema.order_by
        );

        self.base
            .query(&query)
            .execute()
            .await
            .wrap_err_with(|| format!("Failed to create {} table", schema.name))
    }

    /// Drop a table if it exists
    async fn drop_table(&self, table_name: &str) -> Result<()> {
        self.base
            .query(&format!("DROP TABLE IF EXISTS {}.{}", self.db_name, table_name))
            .execute()
            .await
            .wrap_err_with(|| format!("Failed to drop {table_name} table"))
    }

    /// Initialize database and optionally reset
    pub async fn init_db(&self, reset: bool) -> Result<()> {
        self.init_db_with_migrations(reset, true).await
    }

    /// Initialize database with option to skip table creation
    pub async fn init_db_with_migrations(&self, reset: bool, run_migrations: bool) -> Result<()> {
        self.base
            .query(&format!("CREATE DATABASE IF NOT EXISTS {}", self.db_name))
            .execute()
            .await?;

        if reset {
            for table in TABLES {
                self.drop_table(table).await?;
            }
            info!(db_name = %self.db_name, "Database reset complete");
        }

        if run_migrations {
            self.init_schema().await?;
        }
        Ok(())
    }

    /// Create all tables
    pub async fn init_schema(&self) -> Result<()> {
        for schema in TABLE_SCHEMAS {
            self.create_table(schema).await?;
        }
        info!(db_name = %self.db_name, tables = TABLE_SCHEMAS.len(), "Schema ready");
        Ok(())
    }

    async fn insert_rows<R>(&self, table: &str, rows: &[R]) -> Result<()>
    where
        R: Row + Serialize,
    {
        if rows.is_empty() {
            return Ok(());
        }
        let client = self.base.clone().with_database(&self.db_name);
        let mut insert = client.insert(table)?;
        for row in rows {
            insert.write(row).await?;
        }
        insert.end().await.wrap_err_with(|| format!("Failed to insert into {table}"))?;
        debug!(table, rows = rows.len(), "Inserted rows");
        Ok(())
    }

    /// Upsert block value records
    pub async fn insert_block_values(&self, records: &[BlockValueRecord]) -> Result<()> {
        let rows =
            records.iter().map(BlockValueRow::try_from).collect::<Result<Vec<BlockValueRow>>>()?;
        self.insert_rows("block_values", &rows).await
    }

    /// Upsert sync status records
    pub async fn insert_sync_statuses(&self, records: &[SyncStatusRecord]) -> Result<()> {
        let rows: Vec<SyncStatusRow> = records.iter().map(SyncStatusRow::from).collect();
        self.insert_rows("sync_status", &rows).await
    }

    /// Upsert value-at-risk snapshots
    pub async fn insert_var_statuses(&self, records: &[VarStatusRecord]) -> Result<()> {
        let rows =
            records.iter().map(VarStatusRow::try_from).collect::<Result<Vec<VarStatusRow>>>()?;
        self.insert_rows("var_status", &rows).await
    }

    /// Set a job metadata value
    pub async fn insert_metadata(&self, job_name: &str, metric_name: &str, value: u64) -> Result<()> {
        let row = MetadataRow {
            job_name: job_name.to_owned(),
            metric_name: metric_name.to_owned(),
            value,
        };
        self.insert_rows("metadata", &[row]).await
    }

    /// Upsert price points
    pub async fn insert_prices(&self, points: &[PricePoint]) -> Result<()> {
        let rows: Vec<PriceRow> = points.iter().map(PriceRow::from).collect();
        self.insert_rows("prices", &rows).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use alloy::primitives::B256;
    use clickhouse::test::{Mock, handlers};
    use primitives::{SubmissionType, UnixTime, ValueMap};

    fn writer(mock: &Mock) -> ClickhouseWriter {
        let url = Url::parse(mock.url()).unwrap();
        ClickhouseWriter::new(url, "db".to_owned(), "user".into(), "pass".into()).unwrap()
    }

    #[tokio::test]
    async fn create_table_uses_replacing_merge_tree() {
        let mock = Mock::new();
        let ctl = mock.add(handlers::record_ddl());

        writer(&mock).create_table(&TABLE_SCHEMAS[0]).await.unwrap();
        let query = ctl.query().await;
        assert!(query.contains("CREATE TABLE IF NOT EXISTS db.block_values"));
        assert!(query.contains("ReplacingMergeTree(inserted_at)"));
        assert!(query.contains("ORDER BY (chain_id, l2_block_number, l2_block_hash)"));
    }

    #[tokio::test]
    async fn insert_block_values_writes_json_maps() {
        let mock = Mock::new();
        let ctl = mock.add(handlers::record::<BlockValueRow>());

        let record = BlockValueRecord {
            chain_id: 10,
            l2_block_number: 3,
            l2_block_hash: B256::repeat_byte(3),
            l2_block_timestamp: UnixTime::new(1_700_000_000).unwrap(),
            value_by_contract: ValueMap::new(),
            value_by_type: ValueMap::new(),
            unmapped_by_contract: Default::default(),
        };
        writer(&mock).insert_block_values(&[record]).await.unwrap();

        let rows: Vec<BlockValueRow> = ctl.collect().await;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].l2_block_number, 3);
        assert_eq!(rows[0].l2_block_hash.0, [3u8; 32]);
        assert_eq!(rows[0].value_by_type, "{}");
    }

    #[tokio::test]
    async fn insert_sync_statuses_writes_expected_rows() {
        let mock = Mock::new();
        let ctl = mock.add(handlers::record::<SyncStatusRow>());

        let record = SyncStatusRecord {
            chain_id: 1101,
            submission_type: SubmissionType::DataSubmission,
            l2_block_number: 42,
            l2_block_hash: None,
            l1_block_number: Some(19_000_000),
            l1_block_hash: Some(B256::repeat_byte(1)),
            timestamp: UnixTime::new(1_700_000_100).unwrap(),
        };
        writer(&mock).insert_sync_statuses(&[record]).await.unwrap();

        let rows: Vec<SyncStatusRow> = ctl.collect().await;
        assert_eq!(
            rows,
            vec![SyncStatusRow {
                chain_id: 1101,
                submission_type: "data_submission".to_owned(),
                l2_block_number: 42,
                l2_block_hash: None,
                l1_block_number: Some(19_000_000),
                l1_block_hash: Some([1u8; 32].into()),
                timestamp: 1_700_000_100,
            }]
        );
    }

    #[tokio::test]
    async fn insert_metadata_writes_expected_row() {
        let mock = Mock::new();
        let ctl = mock.add(handlers::record::<MetadataRow>());

        writer(&mock).insert_metadata("l1_log_monitor", "last_block", 123).await.unwrap();

        let rows: Vec<MetadataRow> = ctl.collect().await;
        assert_eq!(
            rows,
            vec![MetadataRow {
                job_name: "l1_log_monitor".to_owned(),
                metric_name: "last_block".to_owned(),
                value: 123,
            }]
        );
    }

    #[tokio::test]
    async fn empty_batches_are_not_sent() {
        let mock = Mock::new();
        writer(&mock).insert_sync_statuses(&[]).await.unwrap();
        writer(&mock).insert_prices(&[]).await.unwrap();
    }
}
