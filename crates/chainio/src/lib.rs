//! `ChainIO` holds the contract ABIs the pipeline decodes and a registry that
//! maps monitored L1 addresses to them.
pub mod contracts;
pub mod decoder;

pub use contracts::erc20::decode_transfer;
pub use decoder::{ContractName, DecodedLog, LogDecoder, MonitoredContract};

use alloy::providers::{RootProvider, fillers::FillProvider, utils::JoinedRecommendedFillers};

/// Alias to the default provider with all recommended fillers (read-only).
pub type DefaultProvider = FillProvider<JoinedRecommendedFillers, RootProvider>;
