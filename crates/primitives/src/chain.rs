//! Chain identity, roles and client variants.
use std::{fmt, str::FromStr};

use eyre::{Result, eyre};
use serde::{Deserialize, Serialize};

use crate::records::SubmissionType;

/// Numeric chain id.
pub type ChainId = u64;

/// Role of a chain in the settlement hierarchy.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChainRole {
    /// Settlement layer
    L1,
    /// Rollup settling on the L1
    L2,
}

/// Family of node/client a chain is served by.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChainVariant {
    /// Ethereum mainnet style execution client
    L1,
    /// OP stack rollup node
    OptimismLike,
    /// Polygon zkEVM node
    ZkEvmLike,
    /// Starknet full node
    StarknetLike,
}

/// Chains supported by the pipeline.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Chain {
    /// Ethereum mainnet
    Ethereum,
    /// OP Mainnet
    Optimism,
    /// Polygon zkEVM
    PolygonZkEvm,
    /// Starknet mainnet
    Starknet,
}

impl Chain {
    /// Every supported chain.
    pub const ALL: [Self; 4] = [Self::Ethereum, Self::Optimism, Self::PolygonZkEvm, Self::Starknet];

    /// Numeric chain id.
    pub const fn id(self) -> ChainId {
        match self {
            Self::Ethereum => 1,
            Self::Optimism => 10,
            Self::PolygonZkEvm => 1101,
            // "SN_MAIN" as an integer
            Self::Starknet => 0x534e_5f4d_4149_4e,
        }
    }

    /// Lowercase name used in logs and job names.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Ethereum => "ethereum",
            Self::Optimism => "optimism",
            Self::PolygonZkEvm => "polygon_zkevm",
            Self::Starknet => "starknet",
        }
    }

    /// Settlement role.
    pub const fn role(self) -> ChainRole {
        match self {
            Self::Ethereum => ChainRole::L1,
            Self::Optimism | Self::PolygonZkEvm | Self::Starknet => ChainRole::L2,
        }
    }

    /// Client family.
    pub const fn variant(self) -> ChainVariant {
        match self {
            Self::Ethereum => ChainVariant::L1,
            Self::Optimism => ChainVariant::OptimismLike,
            Self::PolygonZkEvm => ChainVariant::ZkEvmLike,
            Self::Starknet => ChainVariant::StarknetLike,
        }
    }

    /// Decimals of the native asset's base unit.
    pub const fn native_decimals(self) -> u8 {
        18
    }

    /// Submission types that are meaningful for this chain's architecture.
    pub const fn submission_types(self) -> &'static [SubmissionType] {
        match self {
            Self::Ethereum => &[],
            Self::Optimism => &[
                SubmissionType::DataSubmission,
                SubmissionType::L2Finalization,
                SubmissionType::StateUpdates,
            ],
            Self::PolygonZkEvm => &[SubmissionType::DataSubmission, SubmissionType::StateUpdates],
            // No separate data submission proof yet.
            Self::Starknet => &[SubmissionType::StateUpdates],
        }
    }

    /// Whether `submission_type` may be recorded for this chain.
    pub fn supports_submission(self, submission_type: SubmissionType) -> bool {
        self.submission_types().contains(&submission_type)
    }

    /// Submission type that marks an L2 block as final for value-at-risk purposes.
    pub const fn finality_submission_type(self) -> Option<SubmissionType> {
        match self {
            Self::Ethereum => None,
            Self::Optimism | Self::PolygonZkEvm | Self::Starknet => {
                Some(SubmissionType::StateUpdates)
            }
        }
    }
}

impl TryFrom<ChainId> for Chain {
    type Error = eyre::Report;

    fn try_from(id: ChainId) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|chain| chain.id() == id)
            .ok_or_else(|| eyre!("unsupported chain id {id}"))
    }
}

impl FromStr for Chain {
    type Err = eyre::Report;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|chain| chain.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| eyre!("unknown chain {s}"))
    }
}

impl fmt::Display for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chain_ids_round_trip() {
        for chain in Chain::ALL {
            assert_eq!(Chain::try_from(chain.id()).unwrap(), chain);
            assert_eq!(chain.name().parse::<Chain>().unwrap(), chain);
        }
        assert!(Chain::try_from(42_161).is_err());
    }

    #[test]
    fn only_ethereum_is_l1() {
        let l1: Vec<_> = Chain::ALL.into_iter().filter(|c| c.role() == ChainRole::L1).collect();
        assert_eq!(l1, vec![Chain::Ethereum]);
    }

    #[test]
    fn starknet_has_no_data_submission() {
        assert!(!Chain::Starknet.supports_submission(SubmissionType::DataSubmission));
        assert!(Chain::Starknet.supports_submission(SubmissionType::StateUpdates));
        assert!(Chain::Optimism.supports_submission(SubmissionType::L2Finalization));
    }
}
