//! Contract ABIs of the L1 settlement contracts and tokens we decode.
pub mod erc20;
pub mod optimism;
pub mod polygon;
pub mod starknet;
