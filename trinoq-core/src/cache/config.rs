//! Configuration for the result cache

use crate::error::{Result, TrinoqError};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Directory name under the system temp dir used when no root is configured.
/// Shared with earlier releases so their entries stay readable.
pub const DEFAULT_CACHE_DIR_NAME: &str = "druidq";

/// File extension of cache entries
pub const ENTRY_EXTENSION: &str = "parquet";

/// Configuration for the on-disk result cache
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Directory holding one `<key>.parquet` file per cached query
    pub root: PathBuf,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            root: std::env::temp_dir().join(DEFAULT_CACHE_DIR_NAME),
        }
    }
}

impl CacheConfig {
    /// Create a new builder for cache configuration
    pub fn builder() -> CacheConfigBuilder {
        CacheConfigBuilder::default()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.root.as_os_str().is_empty() {
            return Err(TrinoqError::Config(
                "cache root must not be empty".to_string(),
            ));
        }

        Ok(())
    }
}

/// Builder for cache configuration
#[derive(Debug, Default)]
pub struct CacheConfigBuilder {
    root: Option<PathBuf>,
}

impl CacheConfigBuilder {
    /// Set the cache root directory
    pub fn root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = Some(root.into());
        self
    }

    /// Build the cache configuration
    pub fn build(self) -> CacheConfig {
        let defaults = CacheConfig::default();

        CacheConfig {
            root: self.root.unwrap_or(defaults.root),
        }
    }
}
