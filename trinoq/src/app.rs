//! One trinoq invocation: load, run through the cache, print, evaluate

use crate::cli::Cli;
use crate::eval::Program;
use crate::query;
use crate::settings::Settings;
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use std::io::Write;
use tracing::debug;
use trinoq_core::{CachingExecutor, QueryExecutor, Table, TrinoClient};

/// What to run, fully resolved before anything touches the network
#[derive(Debug, Clone)]
pub struct Request {
    pub query: String,
    pub eval: Option<EvalRequest>,
    pub no_cache: bool,
}

#[derive(Debug, Clone)]
pub struct EvalRequest {
    /// Text as given, echoed under `In[eval]:`
    pub source: String,
    pub program: Program,
}

impl Request {
    /// Read sources and expand templates against the process environment
    pub fn from_cli(cli: &Cli) -> Result<Self> {
        Self::resolve(cli, |name| std::env::var(name).ok())
    }

    pub fn resolve<F>(cli: &Cli, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let raw = query::read_source(&cli.query)
            .with_context(|| format!("Failed to read query file {}", cli.query))?;
        if raw.trim().is_empty() {
            bail!("Query is empty");
        }

        let query = if cli.no_template {
            raw
        } else {
            query::render(&raw, lookup).context("Failed to expand query template")?
        };

        let eval = match cli.eval_arg() {
            Some(arg) => {
                let source = query::read_source(arg)
                    .with_context(|| format!("Failed to read eval file {}", arg))?;
                let program = Program::parse(&source).context("Invalid eval expression")?;
                Some(EvalRequest { source, program })
            }
            None => None,
        };

        Ok(Self {
            query,
            eval,
            no_cache: cli.no_cache,
        })
    }
}

/// Runs queries on Trino, connecting only when a query actually misses the cache
pub struct RemoteEngine {
    settings: Settings,
}

impl RemoteEngine {
    pub fn new(settings: Settings) -> Self {
        Self { settings }
    }
}

#[async_trait]
impl QueryExecutor for RemoteEngine {
    async fn execute(&self, query: &str) -> trinoq_core::Result<Table> {
        let client = TrinoClient::new(self.settings.trino_config()?)?;
        client.query(query).await
    }
}

/// Run `request` and write the transcript to `out`
///
/// Cache status lines go through the executor's own sink, so with stdout as
/// `out` they appear between the query and the result.
pub async fn run<E, W>(
    request: &Request,
    cache: &CachingExecutor,
    executor: &E,
    out: &mut W,
) -> Result<()>
where
    E: QueryExecutor + ?Sized,
    W: Write,
{
    writeln!(out, "In[query]:")?;
    writeln!(out, "{}", request.query)?;
    out.flush()?;

    let table = cache
        .run(&request.query, executor, request.no_cache)
        .await
        .context("Query did not complete")?;
    debug!("Result has {} rows", table.num_rows());

    writeln!(out)?;
    writeln!(out, "Out[df]:")?;
    writeln!(out, "{}", table.to_pretty_string()?)?;

    if let Some(eval) = &request.eval {
        writeln!(out)?;
        writeln!(out, "In[eval]:")?;
        writeln!(out, "{}", eval.source.trim_end())?;
        writeln!(out, "Out[eval]:")?;

        let values = eval.program.eval(&table).context("Evaluation failed")?;
        for value in values {
            writeln!(out, "{}", value)?;
        }
    }

    out.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    fn cli(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("trinoq").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_resolve_expands_template() {
        let request = Request::resolve(
            &cli(&["select * from t where day = '${DAY}'"]),
            env(&[("DAY", "2024-01-01")]),
        )
        .unwrap();
        assert_eq!(request.query, "select * from t where day = '2024-01-01'");
        assert!(request.eval.is_none());
        assert!(!request.no_cache);
    }

    #[test]
    fn test_resolve_without_template() {
        let request =
            Request::resolve(&cli(&["select '${DAY}'", "--no-template"]), env(&[])).unwrap();
        assert_eq!(request.query, "select '${DAY}'");
    }

    #[test]
    fn test_undefined_variable_fails() {
        let err = Request::resolve(&cli(&["select ${NOPE}"]), env(&[])).unwrap_err();
        assert!(format!("{:#}", err).contains("NOPE"));
    }

    #[test]
    fn test_empty_query_fails() {
        assert!(Request::resolve(&cli(&["   "]), env(&[])).is_err());
    }

    #[test]
    fn test_bad_eval_fails_before_running() {
        let err = Request::resolve(&cli(&["select 1", "-e", "explode()"]), env(&[])).unwrap_err();
        assert!(format!("{:#}", err).contains("unknown function"));
    }

    #[tokio::test]
    async fn test_remote_engine_without_url() {
        let engine = RemoteEngine::new(Settings::default());
        let err = engine.execute("select 1").await.unwrap_err();
        assert!(matches!(err, trinoq_core::TrinoqError::Config(_)));
    }
}
