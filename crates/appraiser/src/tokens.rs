//! Whitelisted assets per chain.
use std::collections::HashMap;

use eyre::Result;
use primitives::{Chain, ChainAddress};

/// Price provider id of ether.
pub const ETHER_ASSET_ID: &str = "ethereum";

/// A priced asset.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TokenInfo {
    /// Ticker, for logs
    pub symbol: String,
    /// Price provider asset id
    pub asset_id: String,
    /// Decimals of the base unit
    pub decimals: u8,
}

impl TokenInfo {
    fn new(symbol: &str, asset_id: &str, decimals: u8) -> Self {
        Self { symbol: symbol.to_owned(), asset_id: asset_id.to_owned(), decimals }
    }
}

/// Assets of one chain that can be priced, keyed by contract address.
///
/// The native asset is registered under [`ChainAddress::native`].
#[derive(Clone, Debug)]
pub struct TokenRegistry {
    chain: Chain,
    tokens: HashMap<ChainAddress, TokenInfo>,
}

impl TokenRegistry {
    /// Registry holding only the native asset.
    pub fn native_only(chain: Chain) -> Self {
        let native = TokenInfo::new("ETH", ETHER_ASSET_ID, chain.native_decimals());
        Self { chain, tokens: HashMap::from([(ChainAddress::native(), native)]) }
    }

    /// Registry with the default whitelist of the chain.
    pub fn for_chain(chain: Chain) -> Result<Self> {
        let mut registry = Self::native_only(chain);
        let defaults: &[(&str, &str, &str, u8)] = match chain {
            Chain::Ethereum => &[
                ("0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48", "USDC", "usd-coin", 6),
                ("0xdAC17F958D2ee523a2206206994597C13D831ec7", "USDT", "tether", 6),
                ("0xC02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2", "WETH", ETHER_ASSET_ID, 18),
            ],
            Chain::Optimism => &[
                ("0x0b2C639c533813f4Aa9D7837cAf62653d097Ff85", "USDC", "usd-coin", 6),
                ("0x94b008aA00579c1307B0EF2c499aD98a8ce58e58", "USDT", "tether", 6),
                ("0x4200000000000000000000000000000000000006", "WETH", ETHER_ASSET_ID, 18),
                ("0x4200000000000000000000000000000000000042", "OP", "optimism", 18),
            ],
            Chain::PolygonZkEvm => &[
                ("0x4F9A0e7FD2Bf6067db6994CF12E4495Df938E6e9", "WETH", ETHER_ASSET_ID, 18),
                ("0xA8CE8aee21bC2A48a5EF670afCc9274C7bbbC035", "USDC", "usd-coin", 6),
            ],
            Chain::Starknet => &[(
                "0x049d36570d4e46f48e99674bd3fcc84644ddd6b96f7c741b1562b82f9e004dc7",
                "ETH",
                ETHER_ASSET_ID,
                18,
            )],
        };
        for (address, symbol, asset_id, decimals) in defaults {
            registry.insert(address.parse()?, TokenInfo::new(symbol, asset_id, *decimals));
        }
        Ok(registry)
    }

    /// Chain of the registry.
    pub const fn chain(&self) -> Chain {
        self.chain
    }

    /// Register or replace an asset.
    pub fn insert(&mut self, contract: ChainAddress, info: TokenInfo) {
        self.tokens.insert(contract, info);
    }

    /// Asset registered at `contract`.
    pub fn get(&self, contract: &ChainAddress) -> Option<&TokenInfo> {
        self.tokens.get(contract)
    }

    /// Decimals of the native asset.
    pub fn native_decimals(&self) -> u8 {
        self.get(&ChainAddress::native()).map_or(self.chain.native_decimals(), |t| t.decimals)
    }

    /// Distinct price provider ids, sorted.
    pub fn asset_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.tokens.values().map(|t| t.asset_id.clone()).collect();
        ids.sort_unstable();
        ids.dedup();
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn addresses_are_matched_case_insensitively() {
        let registry = TokenRegistry::for_chain(Chain::Optimism).unwrap();
        let usdc: ChainAddress = "0x0b2c639c533813f4aa9d7837caf62653d097ff85".parse().unwrap();
        assert_eq!(registry.get(&usdc).map(|t| t.decimals), Some(6));
        assert_eq!(registry.get(&ChainAddress::native()).unwrap().asset_id, ETHER_ASSET_ID);
    }

    #[test]
    fn asset_ids_are_deduplicated() {
        let registry = TokenRegistry::for_chain(Chain::Optimism).unwrap();
        assert_eq!(registry.asset_ids(), vec!["ethereum", "optimism", "tether", "usd-coin"]);
    }

    #[test]
    fn starknet_uses_felt_sized_addresses() {
        let registry = TokenRegistry::for_chain(Chain::Starknet).unwrap();
        let eth: ChainAddress =
            "0x049d36570d4e46f48e99674bd3fcc84644ddd6b96f7c741b1562b82f9e004dc7".parse().unwrap();
        assert!(registry.get(&eth).is_some());
    }
}
