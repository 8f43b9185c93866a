mod cli;
mod pipeline;

use anyhow::Context;
use bdagg_core::Config;
use bdagg_rates::CoinGeckoSource;
use bdagg_store::{load_coins, open_source, AggregateSink, DuckDbSink};
use clap::Parser;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::cli::Cli;
use crate::pipeline::Pipeline;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Cli::parse().into_config();
    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("run failed: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(config: Config) -> anyhow::Result<()> {
    let started = Instant::now();
    config.validate()?;

    let source = open_source(&config.storage)?;
    let raw = source
        .download()
        .await
        .with_context(|| format!("downloading {}", source.describe()))?;
    info!(bytes = raw.len(), "downloaded transaction export");

    let coins = load_coins(&config.coin_list_path).await?;

    let warehouse = config.warehouse.clone();
    let sink = tokio::task::spawn_blocking(move || -> bdagg_core::Result<DuckDbSink> {
        let sink = DuckDbSink::open(&warehouse.db_path)?;
        sink.setup_table(&warehouse.table)?;
        Ok(sink)
    })
    .await
    .context("warehouse setup task failed")??;

    let rate_source = Arc::new(CoinGeckoSource::new(&config.rates));
    let table = config.warehouse.table.clone();
    let pipeline = Pipeline::new(config, rate_source);
    let output = pipeline.transform(raw, &coins).await?;

    let records = output.records;
    let written = tokio::task::spawn_blocking(move || sink.upsert(&table, &records))
        .await
        .context("warehouse upsert task failed")??;

    info!(
        events = output.events,
        records = written,
        elapsed_secs = started.elapsed().as_secs_f64(),
        "processed events"
    );
    Ok(())
}
