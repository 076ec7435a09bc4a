//! HTTP client for the Trino statement protocol

use crate::connection::config::TrinoConfig;
use crate::connection::decode;
use crate::connection::protocol::{Column, QueryResults};
use crate::error::{Result, TrinoqError};
use crate::executor::QueryExecutor;
use crate::table::Table;
use async_trait::async_trait;
use reqwest::{RequestBuilder, StatusCode};
use serde_json::Value;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Runs statements on a Trino coordinator over its REST protocol
///
/// # Example
/// ```no_run
/// use trinoq_core::{TrinoClient, TrinoConfig};
///
/// #[tokio::main]
/// async fn main() -> anyhow::Result<()> {
///     let client = TrinoClient::new(TrinoConfig::from_env()?)?;
///     let table = client.query("select 1 as col").await?;
///     println!("{}", table);
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct TrinoClient {
    http: reqwest::Client,
    config: TrinoConfig,
}

impl TrinoClient {
    /// Create a client; no request is sent until the first query
    pub fn new(config: TrinoConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| TrinoqError::Config(format!("failed to build HTTP client: {}", e)))?;

        info!(
            "Trino coordinator {} (user: {}, catalog: {:?}, schema: {:?})",
            config.base_url, config.user, config.catalog, config.schema
        );

        Ok(Self { http, config })
    }

    pub fn config(&self) -> &TrinoConfig {
        &self.config
    }

    /// Submit `sql` and follow the statement until all rows are in
    pub async fn query(&self, sql: &str) -> Result<Table> {
        let start = Instant::now();
        let statement_url = self.config.statement_url()?;

        let mut page = self
            .send(|| self.with_headers(self.http.post(statement_url.clone())).body(sql.to_string()))
            .await?;
        debug!("Submitted query {} ({})", page.id, page.state());

        let query_id = page.id.clone();
        let mut columns: Option<Vec<Column>> = None;
        let mut rows: Vec<Vec<Value>> = Vec::new();

        loop {
            if let Some(error) = page.error.take() {
                warn!("Query {} failed: {}", query_id, error.message);
                return Err(TrinoqError::Execution {
                    message: error.message,
                    name: error.error_name,
                });
            }

            if columns.is_none() {
                columns = page.columns.take();
            }
            if let Some(data) = page.data.take() {
                rows.extend(data);
            }

            let Some(next_uri) = page.next_uri.take() else {
                break;
            };

            page = self.send(|| self.with_headers(self.http.get(&next_uri))).await?;
            debug!("Query {} is {} ({} rows so far)", query_id, page.state(), rows.len());
        }

        if page.state() == "FAILED" {
            return Err(TrinoqError::execution(format!(
                "query {} failed without an error description",
                query_id
            )));
        }

        let table = decode::build_table(&columns.unwrap_or_default(), &rows)?;
        info!(
            "Query {} finished: {} rows in {}ms",
            query_id,
            table.num_rows(),
            start.elapsed().as_millis()
        );

        Ok(table)
    }

    fn with_headers(&self, request: RequestBuilder) -> RequestBuilder {
        let mut request = request
            .header("X-Trino-User", &self.config.user)
            .header("X-Trino-Source", &self.config.source);

        if let Some(catalog) = &self.config.catalog {
            request = request.header("X-Trino-Catalog", catalog);
        }
        if let Some(schema) = &self.config.schema {
            request = request.header("X-Trino-Schema", schema);
        }
        if let Some(token) = &self.config.token {
            request = request.bearer_auth(token);
        }

        request
    }

    /// Send a request, asking again while the coordinator reports it is busy
    async fn send<F>(&self, build: F) -> Result<QueryResults>
    where
        F: Fn() -> RequestBuilder,
    {
        let mut attempt = 0;

        loop {
            let response = build()
                .send()
                .await
                .map_err(|e| TrinoqError::Connection(e.to_string()))?;
            let status = response.status();

            if is_transient(status) && attempt < self.config.max_transient_retries {
                let delay = self.config.backoff(attempt);
                attempt += 1;
                warn!(
                    "Coordinator busy (HTTP {}), retrying after {:?} (attempt {}/{})",
                    status.as_u16(),
                    delay,
                    attempt,
                    self.config.max_transient_retries
                );
                tokio::time::sleep(delay).await;
                continue;
            }

            if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
                let body = response.text().await.unwrap_or_default();
                return Err(TrinoqError::Authentication(format!(
                    "HTTP {}: {}",
                    status.as_u16(),
                    body.trim()
                )));
            }

            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(TrinoqError::Connection(format!(
                    "HTTP {}: {}",
                    status.as_u16(),
                    body.trim()
                )));
            }

            return response
                .json::<QueryResults>()
                .await
                .map_err(|e| TrinoqError::Protocol(format!("unreadable response: {}", e)));
        }
    }
}

fn is_transient(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::TOO_MANY_REQUESTS
            | StatusCode::BAD_GATEWAY
            | StatusCode::SERVICE_UNAVAILABLE
            | StatusCode::GATEWAY_TIMEOUT
    )
}

#[async_trait]
impl QueryExecutor for TrinoClient {
    async fn execute(&self, query: &str) -> Result<Table> {
        self.query(query).await
    }
}
