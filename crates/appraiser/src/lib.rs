//! USD appraisal of the value moved in L2 blocks.

/// Block appraisal entry point
pub mod appraiser;
/// Asset pricing
pub mod price;
/// Gas fee accounting
pub mod rewards;
/// Aggregation of transfer legs
pub mod summarizer;
/// Known assets per chain
pub mod tokens;
/// Transaction transfer handlers
pub mod transfer;

pub use appraiser::BlockAppraiser;
pub use price::{FixedPriceService, PriceProvider, PriceService, StoredPriceService};
pub use rewards::{BlockRewardsHandler, FeeModel};
pub use summarizer::{BlockSummary, TransferValueSummarizer};
pub use tokens::{TokenInfo, TokenRegistry};
pub use transfer::{TransactionAppraisal, TransferLeg, TransferService};
