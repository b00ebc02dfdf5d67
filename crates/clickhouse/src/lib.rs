//! Varscope persistence on ClickHouse.

/// Record/row conversions
pub mod conversions;
/// In-memory repositories
#[cfg(any(test, feature = "test-util"))]
pub mod memory;
/// Row types
pub mod models;
/// Read queries
pub mod reader;
/// Repository traits and the ClickHouse store
pub mod repository;
/// Table definitions
pub mod schema;
/// Column helper types
pub mod types;
/// Schema management and inserts
pub mod writer;

#[cfg(any(test, feature = "test-util"))]
pub use memory::MemoryStore;
pub use models::{BlockValueRow, MetadataRow, PriceRow, SyncStatusRow, VarStatusRow};
pub use reader::{ClickhouseReader, Page};
pub use repository::{
    BlockValueRepository, ClickhouseStore, MetadataRepository, PriceRepository,
    SyncStatusRepository, VarStatusRepository,
};
pub use schema::{TABLE_SCHEMAS, TABLES, TableSchema};
pub use types::HashBytes;
pub use writer::ClickhouseWriter;
