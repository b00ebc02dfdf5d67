//! Varscope extractor: chain access for the indexing pipeline.
/// Chain client trait and its value types
pub mod client;
/// Scripted client for tests
#[cfg(any(test, feature = "test-util"))]
pub mod mock;
/// JSON-RPC client
pub mod rpc;

pub use client::{
    Batch, BlockchainClient, Capability, L1Origin, L2BlockRef, LogFilter, SyncStatus, Unsupported,
};
pub use rpc::RpcClient;
