//! Row types of the ClickHouse tables.
//!
//! Map-valued columns hold JSON documents; see [`crate::conversions`].
use clickhouse::Row;
use derive_more::Debug;
use serde::{Deserialize, Serialize};

use crate::types::HashBytes;

/// Row of `block_values`
#[derive(Clone, Debug, Row, Serialize, Deserialize, PartialEq)]
pub struct BlockValueRow {
    /// Chain id
    pub chain_id: u64,
    /// L2 block number
    pub l2_block_number: u64,
    /// L2 block hash
    pub l2_block_hash: HashBytes,
    /// L2 block timestamp
    pub l2_block_timestamp: u64,
    /// JSON map of contract address to value
    pub value_by_contract: String,
    /// JSON map of value type to value
    pub value_by_type: String,
    /// JSON map of contract address to unpriced raw amount
    pub unmapped_by_contract: String,
}

/// Row of `sync_status`
#[derive(Clone, Debug, Row, Serialize, Deserialize, PartialEq, Eq)]
pub struct SyncStatusRow {
    /// Chain id
    pub chain_id: u64,
    /// Submission type name
    pub submission_type: String,
    /// L2 block number
    pub l2_block_number: u64,
    /// L2 block hash
    pub l2_block_hash: Option<HashBytes>,
    /// L1 anchor block number
    pub l1_block_number: Option<u64>,
    /// L1 anchor block hash
    pub l1_block_hash: Option<HashBytes>,
    /// Unix seconds
    pub timestamp: u64,
}

/// Row of `var_status`
#[derive(Clone, Debug, Row, Serialize, Deserialize, PartialEq)]
pub struct VarStatusRow {
    /// Chain id
    pub chain_id: u64,
    /// Snapshot time
    pub timestamp: u64,
    /// Newest L2 block in the snapshot
    pub last_l2_block_number: u64,
    /// Timestamp of the newest L2 block
    pub last_l2_block_timestamp: u64,
    /// Anchor L2 block
    pub last_sync_l2_block_number: u64,
    /// Anchor L1 block
    pub last_sync_l1_block_number: Option<u64>,
    /// Anchor time
    pub last_sync_timestamp: u64,
    /// JSON map of contract address to value
    pub var_by_contract: String,
    /// JSON map of value type to value
    pub var_by_type: String,
    /// Total value at risk in USD
    pub var_total_usd: f64,
}

/// Row of `metadata`
#[derive(Clone, Debug, Row, Serialize, Deserialize, PartialEq, Eq)]
pub struct MetadataRow {
    /// Job owning the value
    pub job_name: String,
    /// Metric name within the job
    pub metric_name: String,
    /// Value
    pub value: u64,
}

/// Row of `prices`
#[derive(Clone, Debug, Row, Serialize, Deserialize, PartialEq)]
pub struct PriceRow {
    /// Price provider asset id
    pub asset_id: String,
    /// Unix seconds
    pub timestamp: u64,
    /// USD price
    pub usd: f64,
}
