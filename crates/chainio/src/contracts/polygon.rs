//! Polygon zkEVM settlement contracts.
use alloy::sol;

sol! {
    #[allow(missing_docs)]
    #[derive(Debug)]
    interface IPolygonZkEVM {
        event SequenceBatches(uint64 indexed numBatch);
        event VerifyBatchesTrustedAggregator(
            uint64 indexed numBatch,
            bytes32 stateRoot,
            address indexed aggregator
        );
    }
}

sol! {
    #[allow(missing_docs)]
    #[derive(Debug)]
    interface IPolygonRollupManager {
        event OnSequenceBatches(uint32 indexed rollupID, uint64 lastBatchSequenced);
        event VerifyBatchesTrustedAggregator(
            uint32 indexed rollupID,
            uint64 numBatch,
            bytes32 stateRoot,
            bytes32 exitRoot,
            address indexed aggregator
        );
    }
}
