//! Execute-or-fetch orchestration
//!
//! [`CachingExecutor::run`] is the only entry point. Per call it walks
//! `bypass | key -> hit | miss -> execute -> write-back`, strictly in order and
//! without retries:
//!
//! - bypass: the executor runs, nothing is read from or written to the cache
//! - hit: the stored table is returned and the executor is never called
//! - corrupt entry: the read error is returned, the query is not re-run
//! - miss: the executor runs; its failure is returned as-is, its success is
//!   written back best-effort and returned even when the write fails

use crate::cache::key::CacheKey;
use crate::cache::store::ResultStore;
use crate::error::{Result, TrinoqError};
use crate::executor::QueryExecutor;
use crate::report::{ReportSink, StdoutSink};
use crate::table::Table;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// How a single [`CachingExecutor::run`] call was served
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheStatus {
    /// Cache disabled for this call
    Bypass,
    /// Served from the entry at `path`
    Hit { path: PathBuf },
    /// Executed remotely; `saved` tells whether the write-back succeeded
    Miss { path: PathBuf, saved: bool },
}

impl fmt::Display for CacheStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheStatus::Bypass => write!(f, "bypass"),
            CacheStatus::Hit { .. } => write!(f, "hit"),
            CacheStatus::Miss { saved: true, .. } => write!(f, "miss"),
            CacheStatus::Miss { saved: false, .. } => write!(f, "miss (not saved)"),
        }
    }
}

/// Result of a run together with how it was obtained
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub table: Table,
    pub status: CacheStatus,
}

/// Wraps a [`ResultStore`] and reports cache activity to a [`ReportSink`]
pub struct CachingExecutor {
    store: ResultStore,
    sink: Arc<dyn ReportSink>,
    quiet: bool,
}

impl CachingExecutor {
    /// Create an executor reporting to stdout
    pub fn new(store: ResultStore) -> Self {
        Self {
            store,
            sink: Arc::new(StdoutSink),
            quiet: false,
        }
    }

    /// Send status messages to `sink` instead of stdout
    pub fn with_sink(mut self, sink: Arc<dyn ReportSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Suppress status messages
    pub fn quiet(mut self, quiet: bool) -> Self {
        self.quiet = quiet;
        self
    }

    pub fn store(&self) -> &ResultStore {
        &self.store
    }

    /// Run `query`, serving it from the cache when possible
    pub async fn run<E>(&self, query: &str, executor: &E, no_cache: bool) -> Result<Table>
    where
        E: QueryExecutor + ?Sized,
    {
        self.run_detailed(query, executor, no_cache)
            .await
            .map(|outcome| outcome.table)
    }

    /// Like [`run`](Self::run) but also says whether the cache was used
    pub async fn run_detailed<E>(
        &self,
        query: &str,
        executor: &E,
        no_cache: bool,
    ) -> Result<RunOutcome>
    where
        E: QueryExecutor + ?Sized,
    {
        if no_cache {
            debug!("Cache bypassed for this query");
            let table = executor.execute(query).await?;
            return Ok(RunOutcome {
                table,
                status: CacheStatus::Bypass,
            });
        }

        let key = CacheKey::derive(query);
        let path = self.store.path_for(&key);
        debug!("Query fingerprint: {}", key);

        if self.store.exists(&key) {
            match self.load(&key).await {
                Ok(table) => {
                    info!("Cache hit: {}", path.display());
                    self.notify(&format!("Loading cache: {}", path.display()));
                    return Ok(RunOutcome {
                        table,
                        status: CacheStatus::Hit { path },
                    });
                }
                // Removed between the existence check and the read
                Err(TrinoqError::NotFound(_)) => {
                    debug!("Cache entry vanished before it could be read: {}", path.display());
                }
                Err(e) => return Err(e),
            }
        }

        debug!("Cache miss: {}", path.display());
        let table = executor.execute(query).await?;

        let saved = match self.save(&key, &table).await {
            Ok(saved_path) => {
                self.notify(&format!("Saving cache: {}", saved_path.display()));
                true
            }
            Err(e) => {
                warn!("Result not cached: {}", e);
                self.notify(&e.to_string());
                false
            }
        };

        Ok(RunOutcome {
            table,
            status: CacheStatus::Miss { path, saved },
        })
    }

    fn notify(&self, message: &str) {
        self.sink.notify(message, self.quiet);
    }

    async fn load(&self, key: &CacheKey) -> Result<Table> {
        let store = self.store.clone();
        let owned_key = key.clone();

        tokio::task::spawn_blocking(move || store.load(&owned_key))
            .await
            .map_err(|e| TrinoqError::CorruptEntry {
                path: self.store.path_for(key),
                reason: format!("cache read task failed: {}", e),
            })?
    }

    async fn save(&self, key: &CacheKey, table: &Table) -> Result<PathBuf> {
        let store = self.store.clone();
        let owned_key = key.clone();
        let owned_table = table.clone();

        tokio::task::spawn_blocking(move || store.save(&owned_key, &owned_table))
            .await
            .map_err(|e| TrinoqError::WriteFailure {
                path: self.store.path_for(key),
                reason: format!("cache write task failed: {}", e),
            })?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::config::CacheConfig;
    use crate::report::MemorySink;
    use arrow_array::{Int64Array, RecordBatch};
    use arrow_schema::{DataType, Field, Schema};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    struct FixedExecutor {
        calls: AtomicUsize,
        fail: bool,
    }

    impl FixedExecutor {
        fn ok() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail: false,
            }
        }

        fn failing() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail: true,
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl QueryExecutor for FixedExecutor {
        async fn execute(&self, _query: &str) -> Result<Table> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(TrinoqError::execution("Table 'nope' does not exist"));
            }

            let schema = Arc::new(Schema::new(vec![Field::new("col", DataType::Int64, true)]));
            let batch = RecordBatch::try_new(schema, vec![Arc::new(Int64Array::from(vec![1]))])?;
            Ok(Table::from_batch(batch))
        }
    }

    fn caching(dir: &TempDir, sink: Arc<MemorySink>) -> CachingExecutor {
        let store = ResultStore::new(CacheConfig::builder().root(dir.path()).build()).unwrap();
        CachingExecutor::new(store).with_sink(sink)
    }

    #[tokio::test]
    async fn test_miss_then_hit() {
        let dir = TempDir::new().unwrap();
        let sink = Arc::new(MemorySink::new());
        let cache = caching(&dir, sink.clone());
        let executor = FixedExecutor::ok();

        let first = cache.run_detailed("select 1", &executor, false).await.unwrap();
        assert!(matches!(first.status, CacheStatus::Miss { saved: true, .. }));

        let second = cache.run_detailed("select 1", &executor, false).await.unwrap();
        assert!(matches!(second.status, CacheStatus::Hit { .. }));
        assert_eq!(first.table, second.table);
        assert_eq!(executor.calls(), 1);

        let messages = sink.messages();
        assert_eq!(messages.len(), 2);
        assert!(messages[0].starts_with("Saving cache: "));
        assert!(messages[1].starts_with("Loading cache: "));
    }

    #[tokio::test]
    async fn test_executor_failure_propagates_without_write() {
        let dir = TempDir::new().unwrap();
        let sink = Arc::new(MemorySink::new());
        let cache = caching(&dir, sink.clone());
        let executor = FixedExecutor::failing();

        let err = cache.run("select * from nope", &executor, false).await.unwrap_err();
        assert!(matches!(err, TrinoqError::Execution { .. }));
        assert!(cache.store().entries().unwrap().is_empty());
        assert!(sink.messages().is_empty());
    }

    #[tokio::test]
    async fn test_quiet_suppresses_messages() {
        let dir = TempDir::new().unwrap();
        let sink = Arc::new(MemorySink::new());
        let cache = caching(&dir, sink.clone()).quiet(true);
        let executor = FixedExecutor::ok();

        cache.run("select 1", &executor, false).await.unwrap();
        cache.run("select 1", &executor, false).await.unwrap();

        assert_eq!(executor.calls(), 1);
        assert!(sink.messages().is_empty());
    }

    #[test]
    fn test_status_display() {
        assert_eq!(CacheStatus::Bypass.to_string(), "bypass");
        assert_eq!(
            CacheStatus::Miss {
                path: PathBuf::from("x"),
                saved: false
            }
            .to_string(),
            "miss (not saved)"
        );
    }
}
