//! The query execution capability consumed by the cache

use crate::error::Result;
use crate::table::Table;
use async_trait::async_trait;

/// Anything that can run a SQL statement and hand back its rows
///
/// The cache never looks behind this trait: connection setup, credentials
/// and transport retries belong to the implementation.
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    /// Execute `query` and return the complete result
    async fn execute(&self, query: &str) -> Result<Table>;
}

