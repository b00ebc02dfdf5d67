//! Records produced by the indexing, finality and value-at-risk pipeline.
use std::{collections::BTreeMap, fmt, str::FromStr};

use alloy_primitives::{B256, BlockHash, U256};
use eyre::{Result, eyre};
use serde::{Deserialize, Serialize};

use crate::{block::ChainAddress, chain::ChainId, time::UnixTime};

/// Kind of L1 evidence anchoring an L2 block.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionType {
    /// Transaction data posted to the L1
    DataSubmission,
    /// Finalized according to the L2 node itself
    L2Finalization,
    /// Validity proof submitted to the L1
    ProofSubmission,
    /// State root/output committed to the L1
    StateUpdates,
}

impl SubmissionType {
    /// Every submission type.
    pub const ALL: [Self; 4] =
        [Self::DataSubmission, Self::L2Finalization, Self::ProofSubmission, Self::StateUpdates];

    /// Stable storage name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::DataSubmission => "data_submission",
            Self::L2Finalization => "l2_finalization",
            Self::ProofSubmission => "proof_submission",
            Self::StateUpdates => "state_updates",
        }
    }
}

impl FromStr for SubmissionType {
    type Err = eyre::Report;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| eyre!("unknown submission type {s}"))
    }
}

impl fmt::Display for SubmissionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Category of value moved in a block.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueType {
    /// Native asset sent as transaction value
    NativeTransfer,
    /// Token transfers touching a single asset
    TokenTransfer,
    /// Token transfers touching several assets, valued at the largest leg
    Swap,
    /// Gas fees paid to the block producer
    BlockReward,
}

impl ValueType {
    /// Every value type.
    pub const ALL: [Self; 4] = [Self::NativeTransfer, Self::TokenTransfer, Self::Swap, Self::BlockReward];

    /// Stable storage name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NativeTransfer => "native_transfer",
            Self::TokenTransfer => "token_transfer",
            Self::Swap => "swap",
            Self::BlockReward => "block_reward",
        }
    }

    /// Network cost rather than user value; never counted as value at risk.
    pub const fn is_network_cost(self) -> bool {
        matches!(self, Self::BlockReward)
    }
}

impl FromStr for ValueType {
    type Err = eyre::Report;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| eyre!("unknown value type {s}"))
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Amount of an asset and its USD value.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AssetValue {
    /// Decimal asset amount
    pub amount: f64,
    /// USD value of `amount`
    pub usd: f64,
}

impl AssetValue {
    /// Create a new value.
    pub const fn new(amount: f64, usd: f64) -> Self {
        Self { amount, usd }
    }

    /// Accumulate another value into this one.
    pub fn add(&mut self, other: Self) {
        self.amount += other.amount;
        self.usd += other.usd;
    }
}

/// Values keyed by contract address or value type name.
pub type ValueMap = BTreeMap<String, AssetValue>;

/// Add every entry of `other` into `target`, summing repeated keys.
pub fn merge_value_maps(target: &mut ValueMap, other: &ValueMap) {
    for (key, value) in other {
        target.entry(key.clone()).or_default().add(*value);
    }
}

/// Sum of USD values over a map.
pub fn total_usd(map: &ValueMap) -> f64 {
    map.values().map(|v| v.usd).sum()
}

/// Value moved in a single L2 block.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BlockValueRecord {
    /// Chain id
    pub chain_id: ChainId,
    /// L2 block number
    pub l2_block_number: u64,
    /// L2 block hash
    pub l2_block_hash: BlockHash,
    /// L2 block timestamp
    pub l2_block_timestamp: UnixTime,
    /// Value keyed by asset contract address
    pub value_by_contract: ValueMap,
    /// Value keyed by [`ValueType`] name
    pub value_by_type: ValueMap,
    /// Raw amounts of assets that could not be priced, keyed by contract address
    pub unmapped_by_contract: BTreeMap<ChainAddress, U256>,
}

/// "L2 block X became final to degree Y at time T".
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncStatusRecord {
    /// Chain id of the L2
    pub chain_id: ChainId,
    /// Kind of evidence
    pub submission_type: SubmissionType,
    /// L2 block number
    pub l2_block_number: u64,
    /// L2 block hash, when the evidence names one
    pub l2_block_hash: Option<BlockHash>,
    /// L1 block anchoring the evidence
    pub l1_block_number: Option<u64>,
    /// Hash of the L1 anchor block
    pub l1_block_hash: Option<B256>,
    /// Time at which the evidence was observed
    pub timestamp: UnixTime,
}

/// Point-in-time value at risk of an L2.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct VarStatusRecord {
    /// Chain id of the L2
    pub chain_id: ChainId,
    /// Snapshot time
    pub timestamp: UnixTime,
    /// Newest unfinalized L2 block included
    pub last_l2_block_number: u64,
    /// Timestamp of `last_l2_block_number`
    pub last_l2_block_timestamp: UnixTime,
    /// L2 block of the finality anchor compared against
    pub last_sync_l2_block_number: u64,
    /// L1 block of the finality anchor, if any
    pub last_sync_l1_block_number: Option<u64>,
    /// Time of the finality anchor
    pub last_sync_timestamp: UnixTime,
    /// Unfinalized value keyed by asset contract address
    pub var_by_contract: ValueMap,
    /// Unfinalized value keyed by [`ValueType`] name
    pub var_by_type: ValueMap,
    /// Total unfinalized USD value, excluding network costs
    pub var_total_usd: f64,
}

/// USD price of an asset at a point in time.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    /// Price provider asset id
    pub asset_id: String,
    /// Time of the price
    pub timestamp: UnixTime,
    /// USD price of one unit
    pub usd: f64,
}

/// Sum of by-type USD totals, skipping network cost categories.
pub fn value_at_risk_total(by_type: &ValueMap) -> f64 {
    by_type
        .iter()
        .filter(|(key, _)| {
            key.parse::<ValueType>().map(|t| !t.is_network_cost()).unwrap_or(true)
        })
        .map(|(_, value)| value.usd)
        .sum()
}
