//! Keeps the stored price history current.
use std::sync::Arc;

use appraiser::{PriceProvider, price::PRICE_GRANULARITY_SECS};
use async_trait::async_trait;
use clickhouse::PriceRepository;
use derive_more::Debug;
use eyre::{Result, WrapErr};
use primitives::{PricePoint, UnixTime};
use tracing::{debug, info, warn};

use crate::scheduler::PeriodicTask;

/// Fetches new price points of every tracked asset from a provider.
#[derive(Debug)]
pub struct PriceUpdaterController {
    provider: Arc<dyn PriceProvider>,
    #[debug(skip)]
    prices: Arc<dyn PriceRepository>,
    asset_ids: Vec<String>,
    history_secs: u64,
}

impl PriceUpdaterController {
    /// Create an updater fetching up to `history_days` of history for new assets.
    pub fn new(
        provider: Arc<dyn PriceProvider>,
        prices: Arc<dyn PriceRepository>,
        asset_ids: Vec<String>,
        history_days: u64,
    ) -> Self {
        Self { provider, prices, asset_ids, history_secs: history_days.saturating_mul(86_400) }
    }

    async fn update_asset(&self, asset_id: &str, now: UnixTime) -> Result<usize> {
        let from = match self.prices.latest_price_timestamp(asset_id).await? {
            Some(latest) => latest.add_secs(PRICE_GRANULARITY_SECS)?,
            None => now.saturating_sub_secs(self.history_secs),
        };
        if from > now {
            debug!(asset = asset_id, "Prices up to date");
            return Ok(0);
        }

        let points: Vec<PricePoint> = self
            .provider
            .historical_series(asset_id, from, now)
            .await
            .wrap_err_with(|| format!("fetching {asset_id} prices"))?
            .into_iter()
            .map(|p| PricePoint { timestamp: p.timestamp.floor_to(PRICE_GRANULARITY_SECS), ..p })
            .collect();
        self.prices.upsert_prices(&points).await?;
        Ok(points.len())
    }

    /// Update every asset; a failing asset does not hold back the others.
    pub async fn update(&self, now: UnixTime) -> Result<()> {
        let mut first_error = None;
        for asset_id in &self.asset_ids {
            match self.update_asset(asset_id, now).await {
                Ok(0) => {}
                Ok(points) => info!(asset = %asset_id, points, "Stored prices"),
                Err(e) => {
                    warn!(asset = %asset_id, err = %e, "Price update failed");
                    first_error.get_or_insert(e);
                }
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

#[async_trait]
impl PeriodicTask for PriceUpdaterController {
    fn name(&self) -> String {
        "price_updater".to_owned()
    }

    async fn run(&self) -> Result<()> {
        self.update(UnixTime::now()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clickhouse::MemoryStore;
    use std::sync::Mutex;

    #[derive(std::fmt::Debug, Default)]
    struct HourlyProvider {
        requests: Mutex<Vec<(String, u64, u64)>>,
    }

    #[async_trait]
    impl PriceProvider for HourlyProvider {
        async fn price(&self, _asset_id: &str, _timestamp: UnixTime) -> Result<Option<f64>> {
            Ok(None)
        }

        async fn historical_series(
            &self,
            asset_id: &str,
            from: UnixTime,
            to: UnixTime,
        ) -> Result<Vec<PricePoint>> {
            self.requests.lock().unwrap().push((asset_id.to_owned(), from.as_secs(), to.as_secs()));
            if asset_id == "broken" {
                eyre::bail!("rate limited");
            }
            let first = from.as_secs().div_ceil(3_600) * 3_600;
            Ok((first..=to.as_secs())
                .step_by(3_600)
                // provider timestamps are a few seconds off the hour
                .map(|secs| PricePoint {
                    asset_id: asset_id.to_owned(),
                    timestamp: UnixTime::try_from(secs + 7).unwrap(),
                    usd: 2_000.0,
                })
                .collect())
        }
    }

    fn ts(secs: u64) -> UnixTime {
        UnixTime::try_from(secs).unwrap()
    }

    #[tokio::test]
    async fn fills_history_then_resumes_from_latest() {
        let provider = Arc::new(HourlyProvider::default());
        let store = Arc::new(MemoryStore::new());
        let updater =
            PriceUpdaterController::new(provider.clone(), store.clone(), vec!["ethereum".into()], 1);

        updater.update(ts(200_000)).await.unwrap();
        assert_eq!(store.price_at("ethereum", ts(198_000)).await.unwrap(), Some(2_000.0));
        let latest = store.latest_price_timestamp("ethereum").await.unwrap().unwrap();
        assert_eq!(latest, ts(198_000));

        updater.update(ts(205_000)).await.unwrap();
        let requests = provider.requests.lock().unwrap().clone();
        assert_eq!(requests[0], ("ethereum".to_owned(), 200_000 - 86_400, 200_000));
        assert_eq!(requests[1], ("ethereum".to_owned(), 201_600, 205_000));
    }

    #[tokio::test]
    async fn failing_asset_does_not_block_others() {
        let provider = Arc::new(HourlyProvider::default());
        let store = Arc::new(MemoryStore::new());
        let assets = vec!["broken".to_owned(), "usd-coin".to_owned()];
        let updater = PriceUpdaterController::new(provider, store.clone(), assets, 1);

        assert!(updater.update(ts(200_000)).await.is_err());
        assert!(store.latest_price_timestamp("usd-coin").await.unwrap().is_some());
    }
}
