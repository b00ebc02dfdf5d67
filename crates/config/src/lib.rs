//! Varscope configuration
use std::time::Duration;

use alloy_primitives::Address;
use clap::Parser;
use url::Url;

/// Clickhouse database configuration options
#[derive(Debug, Clone, Parser)]
pub struct ClickhouseOpts {
    /// Clickhouse URL
    #[clap(long = "clickhouse-url", env = "CLICKHOUSE_URL")]
    pub url: Url,
    /// Clickhouse database
    #[clap(long = "clickhouse-db", env = "CLICKHOUSE_DB", default_value = "varscope")]
    pub db: String,
    /// Clickhouse username
    #[clap(long = "clickhouse-username", env = "CLICKHOUSE_USERNAME", default_value = "default")]
    pub username: String,
    /// Clickhouse password
    #[clap(long = "clickhouse-password", env = "CLICKHOUSE_PASSWORD", default_value = "")]
    pub password: String,
}

/// RPC endpoint configuration options
///
/// An L2 without an RPC URL is not indexed.
#[derive(Debug, Clone, Parser)]
pub struct RpcOpts {
    /// Ethereum RPC URL
    #[clap(long, env = "L1_RPC_URL")]
    pub l1_url: Url,
    /// Optimism RPC URL
    #[clap(long, env = "OPTIMISM_RPC_URL")]
    pub optimism_url: Option<Url>,
    /// Optimism rollup node URL serving `optimism_syncStatus`, defaults to the RPC URL
    #[clap(long, env = "OPTIMISM_ROLLUP_NODE_URL")]
    pub optimism_rollup_node_url: Option<Url>,
    /// Polygon zkEVM RPC URL
    #[clap(long, env = "POLYGON_ZKEVM_RPC_URL")]
    pub polygon_zkevm_url: Option<Url>,
}

/// Block indexer configuration options
#[derive(Debug, Clone, Parser)]
pub struct IndexerOpts {
    /// Maximum number of blocks fetched per batch
    #[clap(long, env = "INDEXER_MAX_BLOCK_RANGE", default_value = "20")]
    pub indexer_max_block_range: u64,
    /// Pause between batches in milliseconds
    #[clap(long, env = "INDEXER_BATCH_DELAY_MS", default_value = "200")]
    pub batch_delay_ms: u64,
    /// Indexer interval in seconds
    #[clap(long, env = "INDEXER_INTERVAL_SECS", default_value = "12")]
    pub indexer_interval_secs: u64,
    /// Also index Ethereum blocks
    #[clap(long, env = "INDEX_ETHEREUM")]
    pub index_ethereum: bool,
    /// First Ethereum block indexed when nothing is stored yet, defaults to the head
    #[clap(long, env = "ETHEREUM_START_BLOCK")]
    pub ethereum_start_block: Option<u64>,
    /// First Optimism block indexed when nothing is stored yet, defaults to the head
    #[clap(long, env = "OPTIMISM_START_BLOCK")]
    pub optimism_start_block: Option<u64>,
    /// First Polygon zkEVM block indexed when nothing is stored yet, defaults to the head
    #[clap(long, env = "POLYGON_ZKEVM_START_BLOCK")]
    pub polygon_zkevm_start_block: Option<u64>,
}

impl IndexerOpts {
    /// Indexer interval
    pub const fn interval(&self) -> Duration {
        Duration::from_secs(self.indexer_interval_secs)
    }

    /// Pause between batches
    pub const fn batch_delay(&self) -> Duration {
        Duration::from_millis(self.batch_delay_ms)
    }
}

/// L1 log monitor configuration options
#[derive(Debug, Clone, Parser)]
pub struct L1MonitorOpts {
    /// Optimism `L2OutputOracle` address
    #[clap(
        long,
        env = "L2_OUTPUT_ORACLE_ADDRESS",
        default_value = "0xdfe97868233d1aa22e815a266982f2cf17685a27"
    )]
    pub l2_output_oracle_address: Address,
    /// Polygon rollup manager address
    #[clap(
        long,
        env = "POLYGON_ROLLUP_MANAGER_ADDRESS",
        default_value = "0x5132A183E9F3CB7C848b0AAC5Ae0c4f0491B7aB2"
    )]
    pub polygon_rollup_manager_address: Address,
    /// Legacy Polygon zkEVM contract address, monitored when set
    #[clap(long, env = "POLYGON_ZKEVM_ADDRESS")]
    pub polygon_zkevm_address: Option<Address>,
    /// Rollup id of Polygon zkEVM within the rollup manager
    #[clap(long, env = "POLYGON_ZKEVM_ROLLUP_ID", default_value = "1")]
    pub polygon_zkevm_rollup_id: u32,
    /// Starknet core contract address
    #[clap(
        long,
        env = "STARKNET_CORE_ADDRESS",
        default_value = "0xc662c410C0ECf747543f5bA90660f6ABeBD9C8c4"
    )]
    pub starknet_core_address: Address,
    /// First L1 block scanned when no watermark is stored
    #[clap(long, env = "L1_MONITOR_START_BLOCK", default_value = "0")]
    pub l1_start_block: u64,
    /// Maximum number of blocks per `eth_getLogs` request
    #[clap(long, env = "L1_MONITOR_MAX_BLOCK_RANGE", default_value = "1000")]
    pub l1_max_block_range: u64,
    /// Monitor interval in seconds
    #[clap(long, env = "L1_MONITOR_INTERVAL_SECS", default_value = "60")]
    pub l1_interval_secs: u64,
}

impl L1MonitorOpts {
    /// Monitor interval
    pub const fn interval(&self) -> Duration {
        Duration::from_secs(self.l1_interval_secs)
    }
}

/// Optimism finality poller configuration options
#[derive(Debug, Clone, Parser)]
pub struct FinalityOpts {
    /// Poll interval in seconds
    #[clap(long, env = "FINALITY_INTERVAL_SECS", default_value = "30")]
    pub finality_interval_secs: u64,
}

impl FinalityOpts {
    /// Poll interval
    pub const fn interval(&self) -> Duration {
        Duration::from_secs(self.finality_interval_secs)
    }
}

/// Value-at-risk updater configuration options
#[derive(Debug, Clone, Parser)]
pub struct VarOpts {
    /// Update interval in seconds
    #[clap(long, env = "VAR_INTERVAL_SECS", default_value = "60")]
    pub var_interval_secs: u64,
    /// Days of history to backfill at startup, 0 disables the backfill
    #[clap(long, env = "VAR_BACKFILL_DAYS", default_value = "0")]
    pub backfill_days: u64,
    /// Distance between backfilled snapshots in seconds
    #[clap(long, env = "VAR_BACKFILL_STEP_SECS", default_value = "3600")]
    pub backfill_step_secs: u64,
}

impl VarOpts {
    /// Update interval
    pub const fn interval(&self) -> Duration {
        Duration::from_secs(self.var_interval_secs)
    }
}

/// Price configuration options
#[derive(Debug, Clone, Parser)]
pub struct PriceOpts {
    /// Price every known asset at this USD value instead of reading stored prices
    #[clap(long, env = "FIXED_PRICE_USD")]
    pub fixed_price_usd: Option<f64>,
    /// Price updater interval in seconds
    #[clap(long, env = "PRICE_INTERVAL_SECS", default_value = "3600")]
    pub price_interval_secs: u64,
    /// Days of price history fetched for an asset with no stored prices
    #[clap(long, env = "PRICE_HISTORY_DAYS", default_value = "30")]
    pub history_days: u64,
}

impl PriceOpts {
    /// Price updater interval
    pub const fn interval(&self) -> Duration {
        Duration::from_secs(self.price_interval_secs)
    }
}

/// CLI options for varscope
#[derive(Debug, Clone, Parser)]
pub struct Opts {
    /// Clickhouse database configuration
    #[clap(flatten)]
    pub clickhouse: ClickhouseOpts,

    /// RPC endpoint configuration
    #[clap(flatten)]
    pub rpc: RpcOpts,

    /// Block indexer configuration
    #[clap(flatten)]
    pub indexer: IndexerOpts,

    /// L1 log monitor configuration
    #[clap(flatten)]
    pub l1_monitor: L1MonitorOpts,

    /// Optimism finality configuration
    #[clap(flatten)]
    pub finality: FinalityOpts,

    /// Value-at-risk configuration
    #[clap(flatten)]
    pub var: VarOpts,

    /// Price configuration
    #[clap(flatten)]
    pub price: PriceOpts,

    /// If set, drop & re-create all tables (local/dev only)
    #[clap(long)]
    pub reset_db: bool,

    /// If set, skip table creation
    #[clap(long, env = "SKIP_MIGRATIONS")]
    pub skip_migrations: bool,
}

#[cfg(test)]
mod tests {
    use super::Opts;
    use clap::Parser;

    #[test]
    fn test_verify_cli() {
        use clap::CommandFactory;
        Opts::command().debug_assert()
    }

    #[test]
    fn defaults_are_applied() {
        let opts = Opts::try_parse_from([
            "varscope",
            "--clickhouse-url",
            "http://localhost:8123",
            "--l1-url",
            "http://localhost:8545",
        ])
        .unwrap();

        assert!(opts.rpc.optimism_url.is_none());
        assert_eq!(opts.l1_monitor.polygon_zkevm_rollup_id, 1);
        assert_eq!(opts.var.backfill_step_secs, 3600);
        assert!(opts.price.fixed_price_usd.is_none());
        assert!(!opts.reset_db);
    }
}
