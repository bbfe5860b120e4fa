use statement_digest::{
    config::Config,
    notifier::JsonNotifier,
    source::{DirectorySource, SourceLocation},
    store::Store,
    Pipeline,
};

use anyhow::Context;
use std::env;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let locations = parse_args();
    let config = Config::from_env()?;
    process_objects(&config, &locations).await
}

fn init_tracing() {
    // Logs go to stderr so stdout carries only the summary payload.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| "statement_digest=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn parse_args() -> Vec<SourceLocation> {
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        eprintln!("Usage: {} <container>/<key> [<container>/<key> ...]", args[0]);
        eprintln!("  Objects are read from OBJECT_STORE_ROOT/<container>/<key>");
        std::process::exit(1);
    }

    args[1..]
        .iter()
        .map(|raw| {
            SourceLocation::parse(raw).unwrap_or_else(|| {
                eprintln!("Error: '{}' is not of the form <container>/<key>", raw);
                std::process::exit(1);
            })
        })
        .collect()
}

async fn process_objects(config: &Config, locations: &[SourceLocation]) -> anyhow::Result<()> {
    let store = Arc::new(
        Store::connect(config)
            .await
            .with_context(|| format!("Connecting to {}", config.database_url))?,
    );
    store.migrate().await.context("Preparing transaction store")?;

    let pipeline = Pipeline::new(
        Arc::new(DirectorySource::new(&config.object_store_root)),
        store.clone(),
        store.clone(),
        Arc::new(JsonNotifier::from_config(config)),
    );

    let summaries = pipeline.run_all(locations).await?;

    // Delivery is fire-and-forget for the pipeline; wait here only so the
    // process does not exit before the payload is written.
    pipeline.dispatch(summaries).await?;

    store.close().await;
    Ok(())
}
