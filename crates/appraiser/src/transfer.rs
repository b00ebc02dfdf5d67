//! Per-transaction transfer appraisal.
use std::{collections::BTreeMap, sync::Arc};

use alloy::primitives::{TxHash, U256, utils::format_units};
use extractor::BlockchainClient;
use primitives::{ChainAddress, Receipt, Transaction, TransferEvent, UnixTime, ValueType};
use tracing::debug;

use crate::{price::PriceService, tokens::TokenRegistry};

/// Raw amount of one asset moved by a transaction, with what is needed to value it.
#[derive(Clone, Debug, PartialEq)]
pub struct TransferLeg {
    /// Category the leg is accounted under
    pub value_type: ValueType,
    /// Asset contract, or the native sentinel
    pub contract: ChainAddress,
    /// Amount in base units
    pub raw_amount: U256,
    /// Decimals of the asset, if registered
    pub decimals: Option<u8>,
    /// USD price of one unit, if known
    pub price: Option<f64>,
}

impl TransferLeg {
    /// Whether the leg can be valued in USD.
    pub const fn is_priced(&self) -> bool {
        self.decimals.is_some() && self.price.is_some()
    }

    /// USD value, or `None` for unmapped legs.
    pub fn usd(&self) -> Option<f64> {
        Some(to_decimal(self.raw_amount, self.decimals?) * self.price?)
    }
}

/// Convert a base unit amount into a decimal amount.
pub fn to_decimal(raw: U256, decimals: u8) -> f64 {
    format_units(raw, decimals).ok().and_then(|s| s.parse().ok()).unwrap_or_default()
}

/// Valued legs of a single transaction.
///
/// A transaction that moved nothing recognizable is still appraised, with no
/// legs and a USD value of zero.
#[derive(Clone, Debug, PartialEq)]
pub struct TransactionAppraisal {
    /// Transaction hash
    pub tx_hash: TxHash,
    /// Legs that contribute value
    pub legs: Vec<TransferLeg>,
}

impl TransactionAppraisal {
    /// Total USD value of the priced legs.
    pub fn usd(&self) -> f64 {
        self.legs.iter().filter_map(TransferLeg::usd).sum()
    }
}

/// Values the native amount carried by a transaction.
#[derive(Debug)]
pub struct NativeTransferHandler {
    registry: Arc<TokenRegistry>,
    prices: Arc<dyn PriceService>,
}

impl NativeTransferHandler {
    /// Create a handler.
    pub fn new(registry: Arc<TokenRegistry>, prices: Arc<dyn PriceService>) -> Self {
        Self { registry, prices }
    }

    /// Appraise `tx` at `timestamp`.
    pub async fn appraise(&self, tx: &Transaction, timestamp: UnixTime) -> TransactionAppraisal {
        let native = ChainAddress::native();
        let price = self.prices.price(&native, timestamp).await;
        let leg = TransferLeg {
            value_type: ValueType::NativeTransfer,
            contract: native,
            raw_amount: tx.value,
            decimals: Some(self.registry.native_decimals()),
            price,
        };
        TransactionAppraisal { tx_hash: tx.hash, legs: vec![leg] }
    }
}

/// Values the token `Transfer` events emitted by a transaction.
#[derive(Debug)]
pub struct TokenTransferHandler {
    client: Arc<dyn BlockchainClient>,
    registry: Arc<TokenRegistry>,
    prices: Arc<dyn PriceService>,
}

impl TokenTransferHandler {
    /// Create a handler.
    pub fn new(
        client: Arc<dyn BlockchainClient>,
        registry: Arc<TokenRegistry>,
        prices: Arc<dyn PriceService>,
    ) -> Self {
        Self { client, registry, prices }
    }

    /// Appraise `tx` from its receipt.
    ///
    /// Amounts are netted per holder, so a token routed through intermediaries
    /// counts once. With a single token involved every leg is priced as a
    /// distribution.
    /// With several tokens the transaction is treated as a swap and only its
    /// largest priced leg counts, so both sides of a trade are not added up.
    pub async fn appraise(
        &self,
        tx: &Transaction,
        receipt: Option<&Receipt>,
        timestamp: UnixTime,
    ) -> TransactionAppraisal {
        let mut balances = HolderBalances::default();
        for log in receipt.map(|r| r.logs.as_slice()).unwrap_or_default() {
            if let Some(transfer) = self.client.transfer_event(log) {
                balances.apply(&transfer);
            }
        }
        let amounts = balances.net_amounts();

        let value_type =
            if amounts.len() > 1 { ValueType::Swap } else { ValueType::TokenTransfer };

        let mut legs = Vec::with_capacity(amounts.len());
        for (contract, raw_amount) in amounts {
            let decimals = self.registry.get(&contract).map(|t| t.decimals);
            let price = match decimals {
                Some(_) => self.prices.price(&contract, timestamp).await,
                None => None,
            };
            legs.push(TransferLeg { value_type, contract, raw_amount, decimals, price });
        }

        if value_type == ValueType::Swap {
            legs = keep_largest_priced_leg(legs);
            debug!(tx_hash = %tx.hash, legs = legs.len(), "Valued swap-like transaction");
        }

        TransactionAppraisal { tx_hash: tx.hash, legs }
    }
}

/// Balance changes per (token, holder) within one transaction.
#[derive(Debug, Default)]
struct HolderBalances {
    /// Received and sent amounts
    changes: BTreeMap<(ChainAddress, ChainAddress), (U256, U256)>,
}

impl HolderBalances {
    fn apply(&mut self, transfer: &TransferEvent) {
        let sent =
            self.changes.entry((transfer.contract.clone(), transfer.from.clone())).or_default();
        sent.1 = sent.1.saturating_add(transfer.raw_amount);
        let received =
            self.changes.entry((transfer.contract.clone(), transfer.to.clone())).or_default();
        received.0 = received.0.saturating_add(transfer.raw_amount);
    }

    /// Amount each token moved: the sum of the holders' net gains.
    ///
    /// Hops through intermediaries cancel out; tokens that return to where
    /// they started are dropped.
    fn net_amounts(&self) -> BTreeMap<ChainAddress, U256> {
        let mut amounts: BTreeMap<ChainAddress, U256> = BTreeMap::new();
        for ((contract, _), (received, sent)) in &self.changes {
            let gain = received.saturating_sub(*sent);
            let total = amounts.entry(contract.clone()).or_default();
            *total = total.saturating_add(gain);
        }
        amounts.retain(|_, amount| !amount.is_zero());
        amounts
    }
}

/// Keep the priced leg with the highest USD value and every unpriced leg.
fn keep_largest_priced_leg(legs: Vec<TransferLeg>) -> Vec<TransferLeg> {
    let (priced, mut unmapped): (Vec<_>, Vec<_>) = legs.into_iter().partition(TransferLeg::is_priced);
    let largest = priced.into_iter().max_by(|a, b| {
        a.usd().unwrap_or_default().total_cmp(&b.usd().unwrap_or_default())
    });
    unmapped.extend(largest);
    unmapped
}

/// Routes a transaction to the native or token handler by its value.
#[derive(Debug)]
pub struct TransferService {
    native: NativeTransferHandler,
    token: TokenTransferHandler,
}

impl TransferService {
    /// Create a service for one chain.
    pub fn new(
        client: Arc<dyn BlockchainClient>,
        registry: Arc<TokenRegistry>,
        prices: Arc<dyn PriceService>,
    ) -> Self {
        Self {
            native: NativeTransferHandler::new(Arc::clone(&registry), Arc::clone(&prices)),
            token: TokenTransferHandler::new(client, registry, prices),
        }
    }

    /// Appraise a transaction of a block mined at `timestamp`.
    pub async fn appraise(
        &self,
        tx: &Transaction,
        receipt: Option<&Receipt>,
        timestamp: UnixTime,
    ) -> TransactionAppraisal {
        if tx.value.is_zero() {
            self.token.appraise(tx, receipt, timestamp).await
        } else {
            self.native.appraise(tx, timestamp).await
        }
    }
}
