use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use trinoq::{Cli, RemoteEngine, Request, Settings};
use trinoq_core::{CachingExecutor, ResultStore};

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr; stdout carries the transcript
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "trinoq=warn,trinoq_core=warn".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let settings = Settings::load(&cli)?;
    let request = Request::from_cli(&cli)?;

    let store = ResultStore::new(settings.cache_config())?;
    let cache = CachingExecutor::new(store).quiet(settings.quiet);
    let engine = RemoteEngine::new(settings);

    let mut stdout = std::io::stdout();
    trinoq::run(&request, &cache, &engine, &mut stdout).await
}
