//! Varscope driver crate root
#![allow(clippy::cognitive_complexity)]

/// Wiring of every job from the configuration
pub mod driver;
/// Block indexer
pub mod indexer;
/// L1 event log monitor
pub mod log_monitor;
/// Optimism finality polling
pub mod optimism;
/// Price table filler
pub mod price_updater;
/// Per-contract log processors
pub mod processors;
/// Periodic task scheduling
pub mod scheduler;
/// Value at risk snapshots
pub mod var_updater;

pub use driver::{Driver, monitored_contracts};
pub use scheduler::{PeriodicTask, TaskScheduler};
