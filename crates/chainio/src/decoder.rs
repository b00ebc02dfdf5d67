//! Decoding of L1 settlement contract logs.
use std::{fmt, str::FromStr};

use alloy_primitives::{Address, B256, U256};
use alloy_sol_types::SolEvent;
use eyre::{Result, eyre};
use primitives::Log;
use tracing::{debug, warn};

use crate::contracts::{
    optimism::IL2OutputOracle,
    polygon::{IPolygonRollupManager, IPolygonZkEVM},
    starknet::IStarknetCore,
};

/// Settlement contracts with a known ABI.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ContractName {
    /// OP stack `L2OutputOracle`
    L2OutputOracle,
    /// Polygon zkEVM (pre rollup manager)
    PolygonZkEvm,
    /// Polygon `RollupManager` shared by several rollups
    PolygonRollupManager,
    /// Starknet core contract
    StarknetCore,
}

impl ContractName {
    /// Topics of the events we decode from this contract.
    pub fn topics(self) -> Vec<B256> {
        match self {
            Self::L2OutputOracle => vec![IL2OutputOracle::OutputProposed::SIGNATURE_HASH],
            Self::PolygonZkEvm => vec![
                IPolygonZkEVM::SequenceBatches::SIGNATURE_HASH,
                IPolygonZkEVM::VerifyBatchesTrustedAggregator::SIGNATURE_HASH,
            ],
            Self::PolygonRollupManager => vec![
                IPolygonRollupManager::OnSequenceBatches::SIGNATURE_HASH,
                IPolygonRollupManager::VerifyBatchesTrustedAggregator::SIGNATURE_HASH,
            ],
            Self::StarknetCore => vec![IStarknetCore::LogStateUpdate::SIGNATURE_HASH],
        }
    }

    const fn as_str(self) -> &'static str {
        match self {
            Self::L2OutputOracle => "L2OutputOracle",
            Self::PolygonZkEvm => "PolygonZkEVM",
            Self::PolygonRollupManager => "PolygonRollupManager",
            Self::StarknetCore => "StarknetCore",
        }
    }
}

impl FromStr for ContractName {
    type Err = eyre::Report;

    fn from_str(s: &str) -> Result<Self> {
        [Self::L2OutputOracle, Self::PolygonZkEvm, Self::PolygonRollupManager, Self::StarknetCore]
            .into_iter()
            .find(|name| name.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| eyre!("no ABI known for contract {s}"))
    }
}

impl fmt::Display for ContractName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A contract watched on the L1.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MonitoredContract {
    /// ABI to decode its logs with
    pub name: ContractName,
    /// Deployment address
    pub address: Address,
}

/// Settlement events relevant to L2 finality.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DecodedLog {
    /// An OP stack output root was proposed.
    OutputProposed {
        /// Output root
        output_root: B256,
        /// Index of the output in the oracle
        l2_output_index: U256,
        /// L2 block the output commits to
        l2_block_number: u64,
        /// L1 timestamp of the proposal
        l1_timestamp: u64,
    },
    /// A Polygon zkEVM batch was sequenced (no aggregator) or verified (aggregator set).
    ZkEvmBatch {
        /// Rollup id for rollup-manager events
        rollup_id: Option<u32>,
        /// Batch number
        batch_number: u64,
        /// Trusted aggregator that verified the batch
        aggregator: Option<Address>,
    },
    /// A Starknet state update was posted.
    StarknetStateUpdate {
        /// Global state root
        global_root: U256,
        /// Starknet block number
        block_number: u64,
        /// Starknet block hash
        block_hash: U256,
    },
}

impl DecodedLog {
    /// Event name, used in logs.
    pub const fn event_name(&self) -> &'static str {
        match self {
            Self::OutputProposed { .. } => "OutputProposed",
            Self::ZkEvmBatch { aggregator: Some(_), .. } => "VerifyBatchesTrustedAggregator",
            Self::ZkEvmBatch { aggregator: None, .. } => "SequenceBatches",
            Self::StarknetStateUpdate { .. } => "LogStateUpdate",
        }
    }
}

/// Decodes logs of the monitored contracts by looking up their ABI by address.
#[derive(Clone, Debug, Default)]
pub struct LogDecoder {
    contracts: Vec<MonitoredContract>,
}

impl LogDecoder {
    /// Create a decoder for the given contracts.
    pub const fn new(contracts: Vec<MonitoredContract>) -> Self {
        Self { contracts }
    }

    /// Contracts known to this decoder.
    pub fn contracts(&self) -> &[MonitoredContract] {
        &self.contracts
    }

    /// Addresses to request logs for.
    pub fn addresses(&self) -> Vec<Address> {
        self.contracts.iter().map(|c| c.address).collect()
    }

    /// Union of the event topics of every contract.
    pub fn topics(&self) -> Vec<B256> {
        let mut topics: Vec<B256> = self.contracts.iter().flat_map(|c| c.name.topics()).collect();
        topics.sort_unstable();
        topics.dedup();
        topics
    }

    /// Name of the contract deployed at `address`.
    pub fn contract_name(&self, address: Address) -> Option<ContractName> {
        self.contracts.iter().find(|c| c.address == address).map(|c| c.name)
    }

    /// Decode a log.
    ///
    /// Fails only if the log comes from an address without a registered ABI.
    /// Undecodable or uninteresting logs yield `Ok(None)`.
    pub fn decode(&self, log: &Log) -> Result<Option<DecodedLog>> {
        let name = self
            .contract_name(log.address)
            .ok_or_else(|| eyre!("no ABI registered for contract {}", log.address))?;

        match decode_with(name, log) {
            Ok(Some(decoded)) => Ok(Some(decoded)),
            Ok(None) => {
                debug!(contract = %name, topic = ?log.topics.first(), "Skipping unrecognized event");
                Ok(None)
            }
            Err(e) => {
                warn!(
                    contract = %name,
                    tx_hash = ?log.transaction_hash,
                    error = %e,
                    "Failed to decode log, skipping"
                );
                Ok(None)
            }
        }
    }
}

fn decode_with(name: ContractName, log: &Log) -> Result<Option<DecodedLog>> {
    let Some(topic0) = log.topics.first().copied() else {
        return Err(eyre!("log without topics"));
    };
    let topics = log.topics.iter().copied();
    let data = log.data.as_ref();

    let decoded = match name {
        ContractName::L2OutputOracle
            if topic0 == IL2OutputOracle::OutputProposed::SIGNATURE_HASH =>
        {
            let event = IL2OutputOracle::OutputProposed::decode_raw_log(topics, data)?;
            DecodedLog::OutputProposed {
                output_root: event.outputRoot,
                l2_output_index: event.l2OutputIndex,
                l2_block_number: u64::try_from(event.l2BlockNumber)?,
                l1_timestamp: u64::try_from(event.l1Timestamp)?,
            }
        }
        ContractName::PolygonZkEvm if topic0 == IPolygonZkEVM::SequenceBatches::SIGNATURE_HASH => {
            let event = IPolygonZkEVM::SequenceBatches::decode_raw_log(topics, data)?;
            DecodedLog::ZkEvmBatch { rollup_id: None, batch_number: event.numBatch, aggregator: None }
        }
        ContractName::PolygonZkEvm
            if topic0 == IPolygonZkEVM::VerifyBatchesTrustedAggregator::SIGNATURE_HASH =>
        {
            let event = IPolygonZkEVM::VerifyBatchesTrustedAggregator::decode_raw_log(topics, data)?;
            DecodedLog::ZkEvmBatch {
                rollup_id: None,
                batch_number: event.numBatch,
                aggregator: Some(event.aggregator),
            }
        }
        ContractName::PolygonRollupManager
            if topic0 == IPolygonRollupManager::OnSequenceBatches::SIGNATURE_HASH =>
        {
            let event = IPolygonRollupManager::OnSequenceBatches::decode_raw_log(topics, data)?;
            DecodedLog::ZkEvmBatch {
                rollup_id: Some(event.rollupID),
                batch_number: event.lastBatchSequenced,
                aggregator: None,
            }
        }
        ContractName::PolygonRollupManager
            if topic0 == IPolygonRollupManager::VerifyBatchesTrustedAggregator::SIGNATURE_HASH =>
        {
            let event =
                IPolygonRollupManager::VerifyBatchesTrustedAggregator::decode_raw_log(topics, data)?;
            DecodedLog::ZkEvmBatch {
                rollup_id: Some(event.rollupID),
                batch_number: event.numBatch,
                aggregator: Some(event.aggregator),
            }
        }
        ContractName::StarknetCore
            if topic0 == IStarknetCore::LogStateUpdate::SIGNATURE_HASH =>
        {
            let event = IStarknetCore::LogStateUpdate::decode_raw_log(topics, data)?;
            if event.blockNumber.is_negative() {
                return Err(eyre!("negative starknet block number"));
            }
            DecodedLog::StarknetStateUpdate {
                global_root: event.globalRoot,
                block_number: u64::try_from(event.blockNumber.into_raw())?,
                block_hash: event.blockHash,
            }
        }
        _ => return Ok(None),
    };

    Ok(Some(decoded))
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{I256, LogData};

    const ORACLE: Address = Address::repeat_byte(0x10);
    const MANAGER: Address = Address::repeat_byte(0x20);
    const STARKNET: Address = Address::repeat_byte(0x30);

    fn decoder() -> LogDecoder {
        LogDecoder::new(vec![
            MonitoredContract { name: ContractName::L2OutputOracle, address: ORACLE },
            MonitoredContract { name: ContractName::PolygonRollupManager, address: MANAGER },
            MonitoredContract { name: ContractName::StarknetCore, address: STARKNET },
        ])
    }

    fn to_log(address: Address, encoded: LogData) -> Log {
        Log {
            address,
            topics: encoded.topics().to_vec(),
            data: encoded.data,
            block_number: Some(100),
            ..Default::default()
        }
    }

    #[test]
    fn decodes_output_proposed() {
        let event = IL2OutputOracle::OutputProposed {
            outputRoot: B256::repeat_byte(1),
            l2OutputIndex: U256::from(3),
            l2BlockNumber: U256::from(1_000),
            l1Timestamp: U256::from(1_700_000_000u64),
        };
        let log = to_log(ORACLE, event.encode_log_data());

        let decoded = decoder().decode(&log).unwrap().unwrap();
        assert_eq!(
            decoded,
            DecodedLog::OutputProposed {
                output_root: B256::repeat_byte(1),
                l2_output_index: U256::from(3),
                l2_block_number: 1_000,
                l1_timestamp: 1_700_000_000,
            }
        );
    }

    #[test]
    fn verify_and_sequence_are_distinguished_by_aggregator() {
        let verify = IPolygonRollupManager::VerifyBatchesTrustedAggregator {
            rollupID: 1,
            numBatch: 42,
            stateRoot: B256::ZERO,
            exitRoot: B256::ZERO,
            aggregator: Address::repeat_byte(9),
        };
        let sequence =
            IPolygonRollupManager::OnSequenceBatches { rollupID: 1, lastBatchSequenced: 43 };

        let decoder = decoder();
        let verified = decoder.decode(&to_log(MANAGER, verify.encode_log_data())).unwrap();
        let sequenced = decoder.decode(&to_log(MANAGER, sequence.encode_log_data())).unwrap();

        assert_eq!(
            verified,
            Some(DecodedLog::ZkEvmBatch {
                rollup_id: Some(1),
                batch_number: 42,
                aggregator: Some(Address::repeat_byte(9)),
            })
        );
        assert_eq!(
            sequenced,
            Some(DecodedLog::ZkEvmBatch { rollup_id: Some(1), batch_number: 43, aggregator: None })
        );
    }

    #[test]
    fn decodes_starknet_state_update() {
        let event = IStarknetCore::LogStateUpdate {
            globalRoot: U256::from(5),
            blockNumber: I256::try_from(77).unwrap(),
            blockHash: U256::from(6),
        };
        let decoded = decoder().decode(&to_log(STARKNET, event.encode_log_data())).unwrap();
        assert!(matches!(
            decoded,
            Some(DecodedLog::StarknetStateUpdate { block_number: 77, .. })
        ));
    }

    #[test]
    fn undecodable_logs_are_skipped() {
        let mut log = to_log(
            ORACLE,
            IL2OutputOracle::OutputProposed::default().encode_log_data(),
        );
        log.topics.truncate(1);
        assert_eq!(decoder().decode(&log).unwrap(), None);

        let mut foreign_event = log.clone();
        foreign_event.topics = vec![B256::repeat_byte(0xff)];
        assert_eq!(decoder().decode(&foreign_event).unwrap(), None);
    }

    #[test]
    fn unknown_contract_is_an_error() {
        let log = Log { address: Address::repeat_byte(0x99), ..Default::default() };
        assert!(decoder().decode(&log).is_err());
    }

    #[test]
    fn topics_are_deduplicated() {
        let decoder = LogDecoder::new(vec![
            MonitoredContract { name: ContractName::L2OutputOracle, address: ORACLE },
            MonitoredContract { name: ContractName::L2OutputOracle, address: MANAGER },
        ]);
        assert_eq!(decoder.topics().len(), 1);
        assert_eq!("l2outputoracle".parse::<ContractName>().unwrap(), ContractName::L2OutputOracle);
    }
}
