//! Time-series table clients
//!
//! This module provides the trait-based boundary the TSDB adapter writes
//! through, plus the table clients shipped with the crate.
//!
//! ## Design
//!
//! - **Trait-based**: `TimeSeriesClient` creates/opens tables, `TimeSeriesTable`
//!   writes, flushes and range-queries points
//! - **Async**: All operations are async for compatibility with Tokio
//! - **Buffered**: Writes are staged until `flush`
//!
//! ## Clients
//!
//! - **SQLite** (default): Embedded database, data survives restarts
//! - **In-Memory**: No persistence, for testing or throwaway runs
//!
//! ## Usage
//!
//! ```no_run
//! use tsdb_table_adapter::config::StorageConfig;
//! use tsdb_table_adapter::storage;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = storage::connect(&StorageConfig::Memory).await?;
//!     let table = client.create_table("argus").await?;
//!     Ok(())
//! }
//! ```

pub mod backend;
pub mod error;
pub mod memory;
pub mod schema;
#[cfg(feature = "storage-sqlite")]
pub mod sqlite;

use std::sync::Arc;

pub use backend::{DataPoint, TimeSeriesClient, TimeSeriesTable};
pub use error::{StorageError, StorageResult};

use crate::config::StorageConfig;

/// Build the table client described by `config`
pub async fn connect(config: &StorageConfig) -> StorageResult<Arc<dyn TimeSeriesClient>> {
    match config {
        StorageConfig::Memory => Ok(Arc::new(memory::MemoryClient::new()) as Arc<dyn TimeSeriesClient>),
        #[cfg(feature = "storage-sqlite")]
        StorageConfig::Sqlite { path } => {
            let client = sqlite::SqliteClient::new(path).await?;
            Ok(Arc::new(client) as Arc<dyn TimeSeriesClient>)
        }
        #[cfg(not(feature = "storage-sqlite"))]
        StorageConfig::Sqlite { .. } => Err(StorageError::InvalidConfig(
            "sqlite backend requested but the storage-sqlite feature is disabled".to_string(),
        )),
    }
}
