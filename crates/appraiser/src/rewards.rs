//! Gas fee accounting per chain.
use std::{collections::HashMap, sync::Arc};

use alloy::primitives::{TxHash, U256};
use eyre::{Result, eyre};
use primitives::{Block, Chain, ChainAddress, ChainId, Receipt, Transaction, UnixTime, ValueType};

use crate::{price::PriceService, tokens::TokenRegistry, transfer::TransferLeg};

/// How a chain pays its block producer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FeeModel {
    /// Base fee is burned; the producer earns the tips
    TipsOnly,
    /// Base fee is kept by the sequencer together with the tip
    BaseFeePlusTip,
    /// Plain `gas_used * gas_price`
    GasPrice,
    /// Fees show up as ordinary token transfers and are counted there
    Free,
}

impl FeeModel {
    /// Fee model of a chain.
    ///
    /// Unknown chain ids are rejected instead of being treated as fee-free.
    pub fn for_chain(chain_id: ChainId) -> Result<Self> {
        let chain = Chain::try_from(chain_id)
            .map_err(|_| eyre!("no fee model for chain id {chain_id}"))?;
        Ok(match chain {
            Chain::Ethereum => Self::TipsOnly,
            Chain::Optimism => Self::BaseFeePlusTip,
            Chain::PolygonZkEvm => Self::GasPrice,
            Chain::Starknet => Self::Free,
        })
    }

    /// Fee paid by one transaction to the block producer, in native base units.
    pub fn fee(self, base_fee: u128, tx: Option<&Transaction>, receipt: &Receipt) -> U256 {
        let gas_used = U256::from(receipt.gas_used);
        let per_gas = match self {
            Self::Free => 0,
            Self::TipsOnly => receipt.effective_gas_price.saturating_sub(base_fee),
            Self::GasPrice => tx
                .and_then(|tx| tx.gas_price)
                .unwrap_or(receipt.effective_gas_price),
            Self::BaseFeePlusTip => {
                let tip = tx.and_then(|tx| tx.max_priority_fee_per_gas).unwrap_or_default();
                match base_fee.saturating_add(tip) {
                    0 => tx.and_then(|tx| tx.gas_price).unwrap_or(receipt.effective_gas_price),
                    effective => effective,
                }
            }
        };
        gas_used.saturating_mul(U256::from(per_gas))
    }
}

/// Sums the gas fees of a block into a single `block_reward` leg.
#[derive(Debug)]
pub struct BlockRewardsHandler {
    model: FeeModel,
    registry: Arc<TokenRegistry>,
    prices: Arc<dyn PriceService>,
}

impl BlockRewardsHandler {
    /// Create a handler for the chain of `registry`.
    pub fn new(registry: Arc<TokenRegistry>, prices: Arc<dyn PriceService>) -> Result<Self> {
        let model = FeeModel::for_chain(registry.chain().id())?;
        Ok(Self { model, registry, prices })
    }

    /// Fee model in use.
    pub const fn model(&self) -> FeeModel {
        self.model
    }

    /// Total fees of `block`, or `None` when nothing was paid.
    pub async fn appraise(&self, block: &Block, receipts: &[Receipt]) -> Option<TransferLeg> {
        let base_fee = block.base_fee_per_gas.unwrap_or_default();
        let txs: HashMap<TxHash, &Transaction> =
            block.transactions.iter().map(|tx| (tx.hash, tx)).collect();

        let total = receipts.iter().fold(U256::ZERO, |acc, receipt| {
            let tx = txs.get(&receipt.transaction_hash).copied();
            acc.saturating_add(self.model.fee(base_fee, tx, receipt))
        });
        if total.is_zero() {
            return None;
        }

        let native = ChainAddress::native();
        let price = self.prices.price(&native, UnixTime::try_from(block.timestamp).ok()?).await;
        Some(TransferLeg {
            value_type: ValueType::BlockReward,
            contract: native,
            raw_amount: total,
            decimals: Some(self.registry.native_decimals()),
            price,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::price::FixedPriceService;
    use alloy::primitives::B256;

    const GWEI: u128 = 1_000_000_000;

    fn receipt(hash: u8, gas_used: u64, effective_gas_price: u128) -> Receipt {
        Receipt {
            transaction_hash: B256::repeat_byte(hash),
            gas_used,
            effective_gas_price,
            status: true,
            ..Default::default()
        }
    }

    fn handler(chain: Chain) -> BlockRewardsHandler {
        let registry = Arc::new(TokenRegistry::native_only(chain));
        let prices = Arc::new(FixedPriceService::new(Arc::clone(&registry), 2_000.0));
        BlockRewardsHandler::new(registry, prices).unwrap()
    }

    #[test]
    fn unknown_chain_has_no_fee_model() {
        assert!(FeeModel::for_chain(42_161).is_err());
        assert_eq!(FeeModel::for_chain(10).unwrap(), FeeModel::BaseFeePlusTip);
        assert_eq!(FeeModel::for_chain(1101).unwrap(), FeeModel::GasPrice);
    }

    #[test]
    fn base_fee_plus_tip_falls_back_to_gas_price() {
        let legacy = Transaction { gas_price: Some(3 * GWEI), ..Default::default() };
        let fee = FeeModel::BaseFeePlusTip.fee(0, Some(&legacy), &receipt(1, 100, 0));
        assert_eq!(fee, U256::from(300 * GWEI));

        let dynamic =
            Transaction { max_priority_fee_per_gas: Some(GWEI), ..Default::default() };
        let fee = FeeModel::BaseFeePlusTip.fee(2 * GWEI, Some(&dynamic), &receipt(1, 100, 0));
        assert_eq!(fee, U256::from(300 * GWEI));
    }

    #[test]
    fn tips_only_excludes_the_burned_base_fee() {
        let fee = FeeModel::TipsOnly.fee(10 * GWEI, None, &receipt(1, 21_000, 12 * GWEI));
        assert_eq!(fee, U256::from(21_000 * 2 * GWEI));
    }

    #[tokio::test]
    async fn block_fees_are_summed_and_priced() {
        let block = Block {
            number: 1,
            timestamp: 1_700_000_000,
            transactions: vec![
                Transaction { hash: B256::repeat_byte(1), gas_price: Some(GWEI), ..Default::default() },
                Transaction { hash: B256::repeat_byte(2), gas_price: Some(GWEI), ..Default::default() },
            ],
            ..Default::default()
        };
        // 1e6 gas at 1 gwei each = 0.002 ETH in total
        let receipts = [receipt(1, 1_000_000, GWEI), receipt(2, 1_000_000, GWEI)];

        let leg = handler(Chain::PolygonZkEvm).appraise(&block, &receipts).await.unwrap();
        assert_eq!(leg.value_type, ValueType::BlockReward);
        assert_eq!(leg.raw_amount, U256::from(2_000_000 * GWEI));
        assert_eq!(leg.usd(), Some(4.0));
    }

    #[tokio::test]
    async fn starknet_fees_are_not_counted() {
        let block = Block { timestamp: 1_700_000_000, ..Default::default() };
        let leg = handler(Chain::Starknet).appraise(&block, &[receipt(1, 1_000, GWEI)]).await;
        assert!(leg.is_none());
    }
}
