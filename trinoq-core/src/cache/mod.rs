//! # Query Result Cache
//!
//! Transparent on-disk caching of query results.
//!
//! ## Features
//!
//! - **Deterministic keys**: SHA-1 of the raw query text, no normalization
//! - **Durable entries**: one Parquet file per query, Arrow schema embedded
//! - **Atomic writes**: temp file plus rename, readers never see partial files
//! - **Best-effort write-back**: a failed cache write never loses a result
//! - **Loud corruption**: unreadable entries fail the run instead of re-executing
//!
//! Entries are never evicted. Remove files from the cache root by hand to
//! force a re-run, or pass `no_cache` to skip the cache for one call.
//!
//! ## Example
//!
//! ```no_run
//! use trinoq_core::cache::{CacheConfig, CachingExecutor, ResultStore};
//! use trinoq_core::{TrinoClient, TrinoConfig};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let client = TrinoClient::new(TrinoConfig::from_url("https://trino.example.com?user=me")?)?;
//! let store = ResultStore::new(CacheConfig::builder().root("/tmp/druidq").build())?;
//! let cache = CachingExecutor::new(store);
//!
//! // First call runs on Trino and writes the entry, the second reads it back
//! let table = cache.run("select 1", &client, false).await?;
//! let again = cache.run("select 1", &client, false).await?;
//! assert_eq!(table, again);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod executor;
pub mod key;
pub mod store;

pub use config::{CacheConfig, CacheConfigBuilder};
pub use executor::{CacheStatus, CachingExecutor, RunOutcome};
pub use key::{CacheKey, InvalidCacheKey};
pub use store::ResultStore;
