//! Chain-neutral block, transaction, receipt and log types.
use std::{fmt, str::FromStr};

use alloy_primitives::{Address, B256, BlockHash, Bytes, TxHash, U256};
use eyre::{Result, eyre};
use serde::{Deserialize, Serialize};

/// Address of an account or contract on any supported chain.
///
/// EVM chains use 20-byte addresses while Starknet uses field elements, so the
/// address is kept as normalized lowercase `0x` hex.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ChainAddress(String);

impl ChainAddress {
    /// Sentinel used for the chain's native asset.
    pub const NATIVE_HEX: &'static str = "0xeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeee";

    /// The native asset sentinel.
    pub fn native() -> Self {
        Self(Self::NATIVE_HEX.to_owned())
    }

    /// Whether this is the native asset sentinel.
    pub fn is_native(&self) -> bool {
        self.0 == Self::NATIVE_HEX
    }

    /// Normalized hex representation.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for ChainAddress {
    type Err = eyre::Report;

    fn from_str(s: &str) -> Result<Self> {
        let digits = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")).unwrap_or(s);
        if digits.is_empty() || digits.len() > 64 || !digits.chars().all(|c| c.is_ascii_hexdigit())
        {
            return Err(eyre!("invalid address {s}"));
        }
        Ok(Self(format!("0x{}", digits.to_ascii_lowercase())))
    }
}

impl TryFrom<String> for ChainAddress {
    type Error = eyre::Report;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<ChainAddress> for String {
    fn from(value: ChainAddress) -> Self {
        value.0
    }
}

impl From<Address> for ChainAddress {
    fn from(value: Address) -> Self {
        Self(format!("{value:#x}"))
    }
}

impl fmt::Display for ChainAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Block lookup key.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BlockRef {
    /// Lookup by height
    Number(u64),
    /// Lookup by hash
    Hash(BlockHash),
}

/// Block with its embedded transactions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    /// Block number
    pub number: u64,
    /// Block hash
    pub hash: BlockHash,
    /// Block timestamp
    pub timestamp: u64,
    /// Base fee per gas, absent before London or on chains without EIP-1559
    pub base_fee_per_gas: Option<u128>,
    /// Transactions included in the block
    pub transactions: Vec<Transaction>,
}

/// Transaction as embedded in a block.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Transaction hash
    pub hash: TxHash,
    /// Sender
    pub from: Address,
    /// Recipient, absent for contract creation
    pub to: Option<Address>,
    /// Native value transferred in base units
    pub value: U256,
    /// Legacy gas price, or the effective price reported by the node
    pub gas_price: Option<u128>,
    /// EIP-1559 max fee per gas
    pub max_fee_per_gas: Option<u128>,
    /// EIP-1559 max priority fee per gas
    pub max_priority_fee_per_gas: Option<u128>,
}

/// Transaction receipt.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    /// Hash of the transaction the receipt belongs to
    pub transaction_hash: TxHash,
    /// Gas used by the transaction
    pub gas_used: u64,
    /// Effective gas price paid
    pub effective_gas_price: u128,
    /// Whether the transaction succeeded
    pub status: bool,
    /// Emitted logs
    pub logs: Vec<Log>,
}

/// Event log.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Log {
    /// Emitting contract
    pub address: Address,
    /// Indexed topics
    pub topics: Vec<B256>,
    /// Non-indexed data
    pub data: Bytes,
    /// Block the log was emitted in
    pub block_number: Option<u64>,
    /// Hash of the block the log was emitted in
    pub block_hash: Option<BlockHash>,
    /// Transaction that emitted the log
    pub transaction_hash: Option<TxHash>,
    /// Index of the log within the block
    pub log_index: Option<u64>,
}

/// A decoded fungible token transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferEvent {
    /// Sender
    pub from: ChainAddress,
    /// Recipient
    pub to: ChainAddress,
    /// Token contract
    pub contract: ChainAddress,
    /// Amount in the token's base units
    pub raw_amount: U256,
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::address;

    #[test]
    fn address_is_normalized() {
        let addr: ChainAddress = "0xAbCdEf0000000000000000000000000000000001".parse().unwrap();
        assert_eq!(addr.as_str(), "0xabcdef0000000000000000000000000000000001");
        let evm = ChainAddress::from(address!("abcdef0000000000000000000000000000000001"));
        assert_eq!(addr, evm);
    }

    #[test]
    fn felt_addresses_are_accepted() {
        let felt: ChainAddress =
            "0x049d36570d4e46f48e99674bd3fcc84644ddd6b96f7c741b1562b82f9e004dc7".parse().unwrap();
        assert_eq!(felt.as_str().len(), 66);
        assert!("0xzz".parse::<ChainAddress>().is_err());
        assert!("0x".parse::<ChainAddress>().is_err());
    }

    #[test]
    fn native_sentinel() {
        assert!(ChainAddress::native().is_native());
        assert!(!ChainAddress::from(Address::ZERO).is_native());
    }
}
