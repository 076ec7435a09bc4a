//! On-disk result store
//!
//! One Parquet file per cached query, named by the query's [`CacheKey`], in a
//! single flat directory. Files carry the Arrow schema so column types survive
//! the round trip. Writes go to a hidden temporary file in the same directory
//! and are renamed into place, so a reader never sees a half-written entry.

use crate::cache::config::{CacheConfig, ENTRY_EXTENSION};
use crate::cache::key::CacheKey;
use crate::error::{Result, TrinoqError};
use crate::table::Table;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use parquet::file::properties::WriterProperties;
use std::fs::{self, File};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Persistent store of query results keyed by [`CacheKey`]
#[derive(Debug, Clone)]
pub struct ResultStore {
    root: PathBuf,
}

impl ResultStore {
    /// Create a store rooted at the configured directory
    ///
    /// The directory is not created until the first [`save`](Self::save).
    pub fn new(config: CacheConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { root: config.root })
    }

    /// Directory holding the entries
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the entry for `key`, whether or not it exists
    pub fn path_for(&self, key: &CacheKey) -> PathBuf {
        self.root.join(format!("{}.{}", key, ENTRY_EXTENSION))
    }

    /// Check whether an entry exists for `key`
    pub fn exists(&self, key: &CacheKey) -> bool {
        self.path_for(key).is_file()
    }

    /// Load the table stored under `key`
    ///
    /// Fails with [`TrinoqError::NotFound`] when there is no entry and with
    /// [`TrinoqError::CorruptEntry`] when the file is not a readable table.
    pub fn load(&self, key: &CacheKey) -> Result<Table> {
        let path = self.path_for(key);

        let file = match File::open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Err(TrinoqError::NotFound(path)),
            Err(e) => return Err(corrupt(&path, e)),
        };

        let builder = ParquetRecordBatchReaderBuilder::try_new(file).map_err(|e| corrupt(&path, e))?;
        let schema = builder.schema().clone();
        let reader = builder.build().map_err(|e| corrupt(&path, e))?;

        let mut batches = Vec::new();
        for batch in reader {
            batches.push(batch.map_err(|e| corrupt(&path, e))?);
        }

        let table = Table::new(schema, batches).map_err(|e| corrupt(&path, e))?;
        debug!(
            "Loaded cache entry {} ({} rows, {} columns)",
            key,
            table.num_rows(),
            table.num_columns()
        );

        Ok(table)
    }

    /// Persist `table` under `key`, returning the entry path
    ///
    /// Any failure is reported as [`TrinoqError::WriteFailure`]; the previous
    /// entry (if any) is left untouched.
    pub fn save(&self, key: &CacheKey, table: &Table) -> Result<PathBuf> {
        let path = self.path_for(key);

        // Parquet has no representation for a schema without fields
        if table.num_columns() == 0 {
            return Err(write_failure(
                &path,
                "a result without columns cannot be stored as Parquet",
            ));
        }

        match fs::create_dir_all(&self.root) {
            Ok(()) => {}
            // Lost a race with another process creating the same directory
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {}
            Err(e) => return Err(write_failure(&path, e)),
        }

        let mut tmp = tempfile::Builder::new()
            .prefix(&format!(".{}.", key))
            .suffix(".tmp")
            .tempfile_in(&self.root)
            .map_err(|e| write_failure(&path, e))?;

        {
            let props = WriterProperties::builder().build();
            let mut writer = ArrowWriter::try_new(tmp.as_file_mut(), table.schema(), Some(props))
                .map_err(|e| write_failure(&path, e))?;

            for batch in table.batches() {
                writer.write(batch).map_err(|e| write_failure(&path, e))?;
            }

            writer.close().map_err(|e| write_failure(&path, e))?;
        }

        tmp.as_file()
            .sync_all()
            .map_err(|e| write_failure(&path, e))?;
        tmp.persist(&path)
            .map_err(|e| write_failure(&path, e.error))?;

        info!("Saved cache entry {} ({} rows)", key, table.num_rows());
        Ok(path)
    }

    /// Enumerate stored entries by their file names
    ///
    /// Only `<40-hex>.parquet` files count; temporary files and anything else
    /// in the directory are skipped. A missing root means an empty cache.
    pub fn entries(&self) -> Result<Vec<CacheKey>> {
        let read_dir = match fs::read_dir(&self.root) {
            Ok(read_dir) => read_dir,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut keys = Vec::new();
        for entry in read_dir {
            let path = entry?.path();

            if path.extension().and_then(|e| e.to_str()) != Some(ENTRY_EXTENSION) {
                continue;
            }

            if let Some(key) = path
                .file_stem()
                .and_then(|s| s.to_str())
                .and_then(|s| s.parse::<CacheKey>().ok())
            {
                keys.push(key);
            }
        }

        keys.sort();
        Ok(keys)
    }
}

fn corrupt(path: &Path, err: impl std::fmt::Display) -> TrinoqError {
    TrinoqError::CorruptEntry {
        path: path.to_path_buf(),
        reason: err.to_string(),
    }
}

fn write_failure(path: &Path, err: impl std::fmt::Display) -> TrinoqError {
    TrinoqError::WriteFailure {
        path: path.to_path_buf(),
        reason: err.to_string(),
    }
}
