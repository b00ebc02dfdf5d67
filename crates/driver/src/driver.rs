//! Varscope driver - wires clients, repositories and controllers together

use std::{future::Future, pin::pin, sync::Arc, time::Duration};

use appraiser::{
    BlockAppraiser, FixedPriceService, PriceProvider, PriceService, StoredPriceService,
    TokenRegistry,
};
use chainio::{ContractName, LogDecoder, MonitoredContract};
use clickhouse::{ClickhouseReader, ClickhouseStore, ClickhouseWriter};
use config::Opts;
use extractor::{BlockchainClient, RpcClient};
use eyre::{Context, Result};
use primitives::Chain;
use runtime::shutdown::run_until_shutdown;
use tracing::{error, info, warn};

use crate::{
    indexer::{BlockIndexerController, IndexerConfig},
    log_monitor::{L1LogMonitorController, LogMonitorConfig},
    optimism::OptimismFinalityController,
    price_updater::PriceUpdaterController,
    processors::{LogProcessors, ZkEvmBatchResolver},
    scheduler::{PeriodicTask, TaskScheduler},
    var_updater::VarUpdaterController,
};

/// Contracts the L1 log monitor watches, given which L2s are configured.
pub fn monitored_contracts(opts: &Opts, optimism: bool, zkevm: bool) -> Vec<MonitoredContract> {
    let addresses = &opts.l1_monitor;
    let mut contracts = Vec::new();
    if optimism {
        contracts.push(MonitoredContract {
            name: ContractName::L2OutputOracle,
            address: addresses.l2_output_oracle_address,
        });
    }
    if zkevm {
        contracts.push(MonitoredContract {
            name: ContractName::PolygonRollupManager,
            address: addresses.polygon_rollup_manager_address,
        });
        if let Some(address) = addresses.polygon_zkevm_address {
            contracts.push(MonitoredContract { name: ContractName::PolygonZkEvm, address });
        }
    }
    contracts.push(MonitoredContract {
        name: ContractName::StarknetCore,
        address: addresses.starknet_core_address,
    });
    contracts
}

/// Whether USD values depend on a prices table nothing in this process fills.
///
/// Without a fixed price, appraisal reads stored prices only, and those are
/// written by a price provider passed to [`Driver::with_price_provider`].
pub const fn prices_unfilled(fixed_price_usd: Option<f64>, has_provider: bool) -> bool {
    fixed_price_usd.is_none() && !has_provider
}

/// Driver owning every periodic job of the pipeline
#[derive(Debug)]
pub struct Driver {
    store: Arc<ClickhouseStore>,
    tasks: Vec<(Arc<dyn PeriodicTask>, Duration)>,
    var_updaters: Vec<Arc<VarUpdaterController>>,
    backfill_days: u64,
    backfill_step_secs: u64,
    price_interval: Duration,
    price_history_days: u64,
    asset_ids: Vec<String>,
    fixed_price_usd: Option<f64>,
    price_provider: bool,
}

impl Driver {
    /// Create a new driver with the given configuration
    pub async fn new(opts: Opts) -> Result<Self> {
        info!("Initializing driver");

        let writer = ClickhouseWriter::new(
            opts.clickhouse.url.clone(),
            opts.clickhouse.db.clone(),
            opts.clickhouse.username.clone(),
            opts.clickhouse.password.clone(),
        )?;
        if opts.skip_migrations {
            info!("Skipping database migrations");
        } else {
            info!("Running database migrations");
        }
        writer
            .init_db_with_migrations(opts.reset_db, !opts.skip_migrations)
            .await
            .wrap_err("database initialization failed")?;
        let reader = ClickhouseReader::new(
            opts.clickhouse.url.clone(),
            opts.clickhouse.db.clone(),
            opts.clickhouse.username.clone(),
            opts.clickhouse.password.clone(),
        )?;
        let store = Arc::new(ClickhouseStore::new(writer, reader));

        let l1: Arc<dyn BlockchainClient> =
            Arc::new(RpcClient::new(Chain::Ethereum, opts.rpc.l1_url.clone())?);
        let optimism: Option<Arc<dyn BlockchainClient>> = match &opts.rpc.optimism_url {
            Some(url) => {
                let mut client = RpcClient::new(Chain::Optimism, url.clone())?;
                if let Some(node) = &opts.rpc.optimism_rollup_node_url {
                    client = client.with_rollup_node(node.clone());
                }
                Some(Arc::new(client))
            }
            None => None,
        };
        let zkevm: Option<Arc<dyn BlockchainClient>> = match &opts.rpc.polygon_zkevm_url {
            Some(url) => Some(Arc::new(RpcClient::new(Chain::PolygonZkEvm, url.clone())?)),
            None => None,
        };

        let mut tasks: Vec<(Arc<dyn PeriodicTask>, Duration)> = Vec::new();
        let mut var_updaters = Vec::new();
        let mut asset_ids = Vec::new();

        let indexed = [
            (opts.indexer.index_ethereum.then(|| Arc::clone(&l1)), opts.indexer.ethereum_start_block),
            (optimism.clone(), opts.indexer.optimism_start_block),
            (zkevm.clone(), opts.indexer.polygon_zkevm_start_block),
        ];
        for (client, start_block) in indexed {
            let Some(client) = client else { continue };
            let chain = client.chain();
            let registry = Arc::new(TokenRegistry::for_chain(chain)?);
            asset_ids.extend(registry.asset_ids());
            let prices: Arc<dyn PriceService> = match opts.price.fixed_price_usd {
                Some(usd) => Arc::new(FixedPriceService::new(Arc::clone(&registry), usd)),
                None => {
                    Arc::new(StoredPriceService::new(Arc::clone(&registry), Arc::clone(&store) as _))
                }
            };
            let appraiser = BlockAppraiser::new(Arc::clone(&client), registry, prices)?;
            let config = IndexerConfig {
                start_block,
                max_block_range: opts.indexer.indexer_max_block_range,
                batch_delay: opts.indexer.batch_delay(),
            };
            let indexer = BlockIndexerController::new(client, appraiser, Arc::clone(&store) as _, config);
            tasks.push((Arc::new(indexer), opts.indexer.interval()));

            if chain.finality_submission_type().is_some() {
                let updater = VarUpdaterController::new(
                    chain,
                    Arc::clone(&store) as _,
                    Arc::clone(&store) as _,
                    Arc::clone(&store) as _,
                )?;
                let updater = Arc::new(updater);
                let task: Arc<dyn PeriodicTask> = Arc::clone(&updater) as _;
                tasks.push((task, opts.var.interval()));
                var_updaters.push(updater);
            }
        }
        asset_ids.sort_unstable();
        asset_ids.dedup();

        let decoder =
            LogDecoder::new(monitored_contracts(&opts, optimism.is_some(), zkevm.is_some()));
        let mut processors = LogProcessors::new();
        if let Some(zkevm) = &zkevm {
            processors = processors.with_zkevm(ZkEvmBatchResolver::new(
                Arc::clone(&l1),
                Arc::clone(zkevm),
                opts.l1_monitor.polygon_zkevm_rollup_id,
            ));
        }
        let monitor = L1LogMonitorController::new(
            Arc::clone(&l1),
            decoder,
            processors,
            Arc::clone(&store) as _,
            Arc::clone(&store) as _,
            LogMonitorConfig {
                start_block: opts.l1_monitor.l1_start_block,
                max_block_range: opts.l1_monitor.l1_max_block_range,
            },
        );
        tasks.push((Arc::new(monitor), opts.l1_monitor.interval()));

        if let Some(optimism) = optimism {
            let finality = OptimismFinalityController::new(optimism, Arc::clone(&store) as _)?;
            tasks.push((Arc::new(finality), opts.finality.interval()));
        }

        Ok(Self {
            store,
            tasks,
            var_updaters,
            backfill_days: opts.var.backfill_days,
            backfill_step_secs: opts.var.backfill_step_secs,
            price_interval: opts.price.interval(),
            price_history_days: opts.price.history_days,
            asset_ids,
            fixed_price_usd: opts.price.fixed_price_usd,
            price_provider: false,
        })
    }

    /// Keep the price table filled from `provider`.
    pub fn with_price_provider(mut self, provider: Arc<dyn PriceProvider>) -> Self {
        let updater = PriceUpdaterController::new(
            provider,
            Arc::clone(&self.store) as _,
            self.asset_ids.clone(),
            self.price_history_days,
        );
        self.tasks.push((Arc::new(updater), self.price_interval));
        self.price_provider = true;
        self
    }

    async fn backfill(updaters: &[Arc<VarUpdaterController>], days: u64, step_secs: u64) {
        for updater in updaters {
            if let Err(e) = updater.backfill(days, step_secs).await {
                error!(task = %updater.name(), err = ?e, "Value at risk backfill failed");
            }
        }
    }

    /// Run every job until `shutdown` resolves, then stop them and wait for
    /// in-flight runs.
    pub async fn run<S>(self, shutdown: S) -> Result<()>
    where
        S: Future<Output = ()>,
    {
        let schedulers = self
            .tasks
            .into_iter()
            .map(|(task, period)| TaskScheduler::start(task, period))
            .collect::<Result<Vec<TaskScheduler>>>()?;
        info!(tasks = schedulers.len(), "Driver started");
        if prices_unfilled(self.fixed_price_usd, self.price_provider) {
            warn!(
                "No price provider configured, USD values stay unknown until the prices table \
                 is filled externally"
            );
        }

        let mut shutdown = pin!(shutdown);
        if self.backfill_days > 0 {
            let backfill =
                Self::backfill(&self.var_updaters, self.backfill_days, self.backfill_step_secs);
            if run_until_shutdown(backfill, shutdown.as_mut()).await.is_some() {
                shutdown.await;
            }
        } else {
            shutdown.await;
        }

        info!("Stopping driver");
        for scheduler in schedulers {
            scheduler.stop().await;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn opts(extra: &[&str]) -> Opts {
        let mut args = vec![
            "varscope",
            "--clickhouse-url",
            "http://localhost:8123",
            "--l1-url",
            "http://localhost:8545",
        ];
        args.extend_from_slice(extra);
        Opts::try_parse_from(args).unwrap()
    }

    #[test]
    fn monitors_only_configured_rollups() {
        let contracts = monitored_contracts(&opts(&[]), true, false);
        let names: Vec<_> = contracts.iter().map(|c| c.name).collect();
        assert_eq!(names, vec![ContractName::L2OutputOracle, ContractName::StarknetCore]);
    }

    #[test]
    fn stored_prices_without_provider_are_flagged() {
        let unset = opts(&[]);
        assert!(prices_unfilled(unset.price.fixed_price_usd, false));
        assert!(!prices_unfilled(unset.price.fixed_price_usd, true));

        let fixed = opts(&["--fixed-price-usd", "2000"]);
        assert!(!prices_unfilled(fixed.price.fixed_price_usd, false));
    }

    #[test]
    fn legacy_zkevm_contract_is_optional() {
        let legacy = "0x5132a183e9f3cb7c848b0aac5ae0c4f0491b7ab3";
        let contracts =
            monitored_contracts(&opts(&["--polygon-zkevm-address", legacy]), false, true);
        let names: Vec<_> = contracts.iter().map(|c| c.name).collect();
        assert_eq!(
            names,
            vec![
                ContractName::PolygonRollupManager,
                ContractName::PolygonZkEvm,
                ContractName::StarknetCore
            ]
        );
    }
}
