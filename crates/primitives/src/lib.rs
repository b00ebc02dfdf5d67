//! Core primitives shared by the varscope crates.
/// Chain-neutral block data
pub mod block;
/// Chain identity
pub mod chain;
/// Indexing and value-at-risk records
pub mod records;
/// RPC retry policies
pub mod retries;
/// Validated timestamps
pub mod time;

pub use block::{Block, BlockRef, ChainAddress, Log, Receipt, Transaction, TransferEvent};
pub use chain::{Chain, ChainId, ChainRole, ChainVariant};
pub use records::{
    AssetValue, BlockValueRecord, PricePoint, SubmissionType, SyncStatusRecord, ValueMap,
    ValueType, VarStatusRecord,
};
pub use time::UnixTime;
