//! Conversions between domain records and table rows.
use eyre::{Error, Result, WrapErr};
use primitives::{BlockValueRecord, PricePoint, SyncStatusRecord, UnixTime, VarStatusRecord};

use crate::models::{BlockValueRow, PriceRow, SyncStatusRow, VarStatusRow};

fn to_json<T: serde::Serialize>(value: &T, column: &str) -> Result<String> {
    serde_json::to_string(value).wrap_err_with(|| format!("failed to encode {column}"))
}

fn from_json<T: serde::de::DeserializeOwned>(value: &str, column: &str) -> Result<T> {
    // empty strings come from rows written before a column existed
    if value.is_empty() {
        return serde_json::from_str("{}").wrap_err_with(|| format!("failed to decode {column}"));
    }
    serde_json::from_str(value).wrap_err_with(|| format!("failed to decode {column}"))
}

impl TryFrom<&BlockValueRecord> for BlockValueRow {
    type Error = Error;

    fn try_from(record: &BlockValueRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            chain_id: record.chain_id,
            l2_block_number: record.l2_block_number,
            l2_block_hash: record.l2_block_hash.into(),
            l2_block_timestamp: record.l2_block_timestamp.as_secs(),
            value_by_contract: to_json(&record.value_by_contract, "value_by_contract")?,
            value_by_type: to_json(&record.value_by_type, "value_by_type")?,
            unmapped_by_contract: to_json(&record.unmapped_by_contract, "unmapped_by_contract")?,
        })
    }
}

impl TryFrom<BlockValueRow> for BlockValueRecord {
    type Error = Error;

    fn try_from(row: BlockValueRow) -> Result<Self, Self::Error> {
        Ok(Self {
            chain_id: row.chain_id,
            l2_block_number: row.l2_block_number,
            l2_block_hash: row.l2_block_hash.into(),
            l2_block_timestamp: UnixTime::try_from(row.l2_block_timestamp)?,
            value_by_contract: from_json(&row.value_by_contract, "value_by_contract")?,
            value_by_type: from_json(&row.value_by_type, "value_by_type")?,
            unmapped_by_contract: from_json(&row.unmapped_by_contract, "unmapped_by_contract")?,
        })
    }
}

impl From<&SyncStatusRecord> for SyncStatusRow {
    fn from(record: &SyncStatusRecord) -> Self {
        Self {
            chain_id: record.chain_id,
            submission_type: record.submission_type.as_str().to_owned(),
            l2_block_number: record.l2_block_number,
            l2_block_hash: record.l2_block_hash.map(Into::into),
            l1_block_number: record.l1_block_number,
            l1_block_hash: record.l1_block_hash.map(Into::into),
            timestamp: record.timestamp.as_secs(),
        }
    }
}

impl TryFrom<SyncStatusRow> for SyncStatusRecord {
    type Error = Error;

    fn try_from(row: SyncStatusRow) -> Result<Self, Self::Error> {
        Ok(Self {
            chain_id: row.chain_id,
            submission_type: row.submission_type.parse()?,
            l2_block_number: row.l2_block_number,
            l2_block_hash: row.l2_block_hash.map(Into::into),
            l1_block_number: row.l1_block_number,
            l1_block_hash: row.l1_block_hash.map(Into::into),
            timestamp: UnixTime::try_from(row.timestamp)?,
        })
    }
}

impl TryFrom<&VarStatusRecord> for VarStatusRow {
    type Error = Error;

    fn try_from(record: &VarStatusRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            chain_id: record.chain_id,
            timestamp: record.timestamp.as_secs(),
            last_l2_block_number: record.last_l2_block_number,
            last_l2_block_timestamp: record.last_l2_block_timestamp.as_secs(),
            last_sync_l2_block_number: record.last_sync_l2_block_number,
            last_sync_l1_block_number: record.last_sync_l1_block_number,
            last_sync_timestamp: record.last_sync_timestamp.as_secs(),
            var_by_contract: to_json(&record.var_by_contract, "var_by_contract")?,
            var_by_type: to_json(&record.var_by_type, "var_by_type")?,
            var_total_usd: record.var_total_usd,
        })
    }
}

impl TryFrom<VarStatusRow> for VarStatusRecord {
    type Error = Error;

    fn try_from(row: VarStatusRow) -> Result<Self, Self::Error> {
        Ok(Self {
            chain_id: row.chain_id,
            timestamp: UnixTime::try_from(row.timestamp)?,
            last_l2_block_number: row.last_l2_block_number,
            last_l2_block_timestamp: UnixTime::try_from(row.last_l2_block_timestamp)?,
            last_sync_l2_block_number: row.last_sync_l2_block_number,
            last_sync_l1_block_number: row.last_sync_l1_block_number,
            last_sync_timestamp: UnixTime::try_from(row.last_sync_timestamp)?,
            var_by_contract: from_json(&row.var_by_contract, "var_by_contract")?,
            var_by_type: from_json(&row.var_by_type, "var_by_type")?,
            var_total_usd: row.var_total_usd,
        })
    }
}

impl From<&PricePoint> for PriceRow {
    fn from(point: &PricePoint) -> Self {
        Self {
            asset_id: point.asset_id.clone(),
            timestamp: point.timestamp.as_secs(),
            usd: point.usd,
        }
    }
}

impl TryFrom<PriceRow> for PricePoint {
    type Error = Error;

    fn try_from(row: PriceRow) -> Result<Self, Self::Error> {
        let timestamp = UnixTime::try_from(row.timestamp)?;
        Ok(Self { asset_id: row.asset_id, timestamp, usd: row.usd })
    }
}
