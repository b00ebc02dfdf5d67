//! USD pricing of on-chain assets.
use std::{fmt, sync::Arc};

use async_trait::async_trait;
use clickhouse::PriceRepository;
use derive_more::Debug;
use eyre::Result;
use primitives::{ChainAddress, PricePoint, UnixTime};
use tracing::{debug, warn};

use crate::tokens::TokenRegistry;

/// Granularity of stored prices.
pub const PRICE_GRANULARITY_SECS: u64 = 3_600;

/// Looks up the USD price of an asset at a point in time.
///
/// "Not found" means the value is unknown, not that it is zero.
#[async_trait]
pub trait PriceService: Send + Sync + fmt::Debug {
    /// Price of one unit of the asset at `contract` (or the native sentinel).
    async fn price(&self, contract: &ChainAddress, timestamp: UnixTime) -> Option<f64>;
}

/// External source of historical prices, keyed by provider asset id.
#[async_trait]
pub trait PriceProvider: Send + Sync + fmt::Debug {
    /// Price at a single point in time.
    async fn price(&self, asset_id: &str, timestamp: UnixTime) -> Result<Option<f64>>;

    /// Price points in `[from, to]`.
    async fn historical_series(
        &self,
        asset_id: &str,
        from: UnixTime,
        to: UnixTime,
    ) -> Result<Vec<PricePoint>>;
}

/// Prices from the `prices` table, looked up at the start of the hour.
#[derive(Debug)]
pub struct StoredPriceService {
    registry: Arc<TokenRegistry>,
    #[debug(skip)]
    prices: Arc<dyn PriceRepository>,
}

impl StoredPriceService {
    /// Create a service resolving contracts through `registry`.
    pub fn new(registry: Arc<TokenRegistry>, prices: Arc<dyn PriceRepository>) -> Self {
        Self { registry, prices }
    }
}

#[async_trait]
impl PriceService for StoredPriceService {
    async fn price(&self, contract: &ChainAddress, timestamp: UnixTime) -> Option<f64> {
        let token = self.registry.get(contract)?;
        let at = timestamp.floor_to(PRICE_GRANULARITY_SECS);
        match self.prices.price_at(&token.asset_id, at).await {
            Ok(Some(usd)) => Some(usd),
            Ok(None) => {
                debug!(asset = %token.asset_id, timestamp = %at, "No stored price");
                None
            }
            Err(e) => {
                warn!(asset = %token.asset_id, timestamp = %at, error = %e, "Price lookup failed");
                None
            }
        }
    }
}

/// Returns the same price for every registered asset.
#[derive(Debug)]
pub struct FixedPriceService {
    registry: Arc<TokenRegistry>,
    usd: f64,
}

impl FixedPriceService {
    /// Create a service pricing every registered asset at `usd`.
    pub const fn new(registry: Arc<TokenRegistry>, usd: f64) -> Self {
        Self { registry, usd }
    }
}

#[async_trait]
impl PriceService for FixedPriceService {
    async fn price(&self, contract: &ChainAddress, _timestamp: UnixTime) -> Option<f64> {
        self.registry.get(contract).map(|_| self.usd)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clickhouse::MemoryStore;
    use primitives::Chain;

    fn ts(secs: i64) -> UnixTime {
        UnixTime::new(secs).unwrap()
    }

    #[tokio::test]
    async fn stored_prices_are_read_at_hour_granularity() {
        let store = Arc::new(MemoryStore::new());
        store
            .upsert_prices(&[PricePoint {
                asset_id: "ethereum".to_owned(),
                timestamp: ts(1_699_999_200),
                usd: 2_000.0,
            }])
            .await
            .unwrap();
        let registry = Arc::new(TokenRegistry::for_chain(Chain::Optimism).unwrap());
        let service = StoredPriceService::new(registry, store);

        let native = ChainAddress::native();
        assert_eq!(service.price(&native, ts(1_700_000_000)).await, Some(2_000.0));
        assert_eq!(service.price(&native, ts(1_700_003_000)).await, None);
    }

    #[tokio::test]
    async fn unregistered_contracts_have_no_price() {
        let registry = Arc::new(TokenRegistry::for_chain(Chain::Optimism).unwrap());
        let service = FixedPriceService::new(registry, 1.0);
        let unknown: ChainAddress = "0x00000000000000000000000000000000000000ff".parse().unwrap();

        assert_eq!(service.price(&unknown, ts(0)).await, None);
        assert_eq!(service.price(&ChainAddress::native(), ts(0)).await, Some(1.0));
    }
}
