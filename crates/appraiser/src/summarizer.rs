//! Reduction of per-transaction legs into per-block value maps.
use std::collections::BTreeMap;

use alloy::primitives::U256;
use primitives::{AssetValue, ChainAddress, ValueMap, ValueType};

use crate::transfer::{TransferLeg, to_decimal};

/// Value maps of one block.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BlockSummary {
    /// Priced value keyed by contract address
    pub by_contract: ValueMap,
    /// Priced value keyed by value type
    pub by_type: ValueMap,
    /// Raw amounts that could not be priced
    pub unmapped: BTreeMap<ChainAddress, U256>,
}

/// Sums legs by contract and by value type.
///
/// Raw amounts are added up before converting, so many small transfers of the
/// same asset do not accumulate rounding error.
#[derive(Clone, Copy, Debug, Default)]
pub struct TransferValueSummarizer;

impl TransferValueSummarizer {
    /// Summarize `legs`.
    ///
    /// Block rewards are reported by type only; they are not value held at a
    /// contract.
    pub fn summarize<'a, I>(&self, legs: I) -> BlockSummary
    where
        I: IntoIterator<Item = &'a TransferLeg>,
    {
        let mut grouped: BTreeMap<(ValueType, ChainAddress), TransferLeg> = BTreeMap::new();
        for leg in legs {
            grouped
                .entry((leg.value_type, leg.contract.clone()))
                .and_modify(|acc| acc.raw_amount = acc.raw_amount.saturating_add(leg.raw_amount))
                .or_insert_with(|| leg.clone());
        }

        let mut summary = BlockSummary::default();
        for ((value_type, contract), leg) in grouped {
            let (Some(decimals), Some(price)) = (leg.decimals, leg.price) else {
                let unmapped = summary.unmapped.entry(contract).or_default();
                *unmapped = unmapped.saturating_add(leg.raw_amount);
                continue;
            };
            let amount = to_decimal(leg.raw_amount, decimals);
            let value = AssetValue::new(amount, amount * price);

            summary.by_type.entry(value_type.to_string()).or_default().add(value);
            if value_type != ValueType::BlockReward {
                summary.by_contract.entry(contract.to_string()).or_default().add(value);
            }
        }
        summary
    }
}
