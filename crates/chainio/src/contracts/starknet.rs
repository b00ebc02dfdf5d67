//! Starknet core contract.
use alloy::sol;

sol! {
    #[allow(missing_docs)]
    #[derive(Debug)]
    interface IStarknetCore {
        event LogStateUpdate(uint256 globalRoot, int256 blockNumber, uint256 blockHash);
    }
}
