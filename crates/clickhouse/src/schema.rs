//! Schema definitions for ClickHouse tables

/// Table schema definition
#[derive(Debug)]
pub struct TableSchema {
    /// Table name
    pub name: &'static str,
    /// Column definitions
    pub columns: &'static str,
    /// Natural key; rows sharing it are merged keeping the newest `inserted_at`
    pub order_by: &'static str,
}

/// Names of all tables
pub const TABLES: &[&str] = &["block_values", "sync_status", "var_status", "metadata", "prices"];

/// Schema definitions for tables
pub const TABLE_SCHEMAS: &[TableSchema] = &[
    TableSchema {
        name: "block_values",
        columns: "chain_id UInt64,
                 l2_block_number UInt64,
                 l2_block_hash FixedString(32),
                 l2_block_timestamp UInt64,
                 value_by_contract String,
                 value_by_type String,
                 unmapped_by_contract String,
                 inserted_at DateTime64(3) DEFAULT now64()",
        order_by: "chain_id, l2_block_number, l2_block_hash",
    },
    TableSchema {
        name: "sync_status",
        columns: "chain_id UInt64,
                 submission_type LowCardinality(String),
                 l2_block_number UInt64,
                 l2_block_hash Nullable(FixedString(32)),
                 l1_block_number Nullable(UInt64),
                 l1_block_hash Nullable(FixedString(32)),
                 timestamp UInt64,
                 inserted_at DateTime64(3) DEFAULT now64()",
        order_by: "chain_id, submission_type, l2_block_number",
    },
    TableSchema {
        name: "var_status",
        columns: "chain_id UInt64,
                 timestamp UInt64,
                 last_l2_block_number UInt64,
                 last_l2_block_timestamp UInt64,
                 last_sync_l2_block_number UInt64,
                 last_sync_l1_block_number Nullable(UInt64),
                 last_sync_timestamp UInt64,
                 var_by_contract String,
                 var_by_type String,
                 var_total_usd Float64,
                 inserted_at DateTime64(3) DEFAULT now64()",
        order_by: "chain_id, timestamp",
    },
    TableSchema {
        name: "metadata",
        columns: "job_name LowCardinality(String),
                 metric_name LowCardinality(String),
                 value UInt64,
                 inserted_at DateTime64(3) DEFAULT now64()",
        order_by: "job_name, metric_name",
    },
    TableSchema {
        name: "prices",
        columns: "asset_id LowCardinality(String),
                 timestamp UInt64,
                 usd Float64,
                 inserted_at DateTime64(3) DEFAULT now64()",
        order_by: "asset_id, timestamp",
    },
];
