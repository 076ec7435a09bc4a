//! Trino connection management
//!
//! A minimal client for the Trino REST statement protocol: submit a query,
//! follow `nextUri` until the statement finishes, and turn the collected rows
//! into a [`Table`](crate::table::Table).

pub mod client;
pub mod config;
pub mod decode;
pub mod protocol;

pub use client::TrinoClient;
pub use config::{TrinoConfig, TRINO_TOKEN_ENV, TRINO_URL_ENV};
pub use decode::ColumnKind;
