//! # trinoq-core
//!
//! Query execution against Trino with a transparent on-disk result cache.
//!
//! ## Features
//!
//! - Cache keys derived from the exact query text (SHA-1, no normalization)
//! - Results stored as Parquet with the Arrow schema embedded, one file per query
//! - Atomic cache writes, lazily created cache directory, no eviction
//! - Cache writes are best-effort: a failed write never loses a result
//! - Corrupt cache entries fail loudly instead of silently re-running
//! - Async Trino REST client with retry on busy coordinators
//!
//! ## Running a query through the cache
//!
//! ```no_run
//! use trinoq_core::cache::{CacheConfig, CachingExecutor, ResultStore};
//! use trinoq_core::{TrinoClient, TrinoConfig};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = TrinoClient::new(TrinoConfig::from_env()?)?;
//!     let store = ResultStore::new(CacheConfig::default())?;
//!     let cache = CachingExecutor::new(store);
//!
//!     let table = cache.run("select 1", &client, false).await?;
//!     println!("{}", table);
//!     Ok(())
//! }
//! ```
//!
//! ## Plugging in another engine
//!
//! The cache only needs a [`QueryExecutor`]:
//!
//! ```
//! use async_trait::async_trait;
//! use trinoq_core::{QueryExecutor, Result, Table};
//!
//! struct Offline;
//!
//! #[async_trait]
//! impl QueryExecutor for Offline {
//!     async fn execute(&self, query: &str) -> Result<Table> {
//!         Err(trinoq_core::TrinoqError::execution(format!("offline: {}", query)))
//!     }
//! }
//! ```

pub mod cache;
pub mod connection;
pub mod error;
pub mod executor;
pub mod report;
pub mod table;

// Re-export main types for convenience
pub use cache::{
    CacheConfig, CacheConfigBuilder, CacheKey, CacheStatus, CachingExecutor, ResultStore,
    RunOutcome,
};
pub use connection::{TrinoClient, TrinoConfig};
pub use error::{Result, TrinoqError};
pub use executor::QueryExecutor;
pub use report::{MemorySink, NullSink, ReportSink, StdoutSink};
pub use table::Table;
