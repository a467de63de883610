use std::sync::Arc;

use analysis_core::DataProvider;
use analysis_orchestrator::{AnalysisConfig, AnalysisOrchestrator, CachedProvider, StaticUniverse};
use anyhow::{Context, Result};
use clap::Parser;
use yahoo_client::YahooClient;

mod args;

use args::{roe_window, Cli, Command};

fn init_tracing() {
    let json_logging = std::env::var("RUST_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    // stdout carries the JSON result, so logs go to stderr
    if json_logging {
        tracing_subscriber::fmt()
            .json()
            .with_writer(std::io::stderr)
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
            )
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_writer(std::io::stderr)
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
            )
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    std::panic::set_hook(Box::new(|info| {
        eprintln!("PANIC: {info}");
        tracing::error!("PANIC: {info}");
    }));

    let cli = Cli::parse();

    let config = AnalysisConfig::from_env().context("Failed to load configuration")?;
    tracing::debug!(
        "Configuration loaded: {}y lookback, {} workers, {}s task timeout",
        config.scorecard_years,
        config.industry_max_workers,
        config.industry_task_timeout_secs
    );

    let provider = Arc::new(CachedProvider::new(
        YahooClient::new(config.http_timeout()),
        config.cache_ttl(),
    ));
    let sweeper = provider.spawn_sweeper(config.cache_sweep_interval(), config.cache_max_age());

    let orchestrator = AnalysisOrchestrator::new(
        Arc::clone(&provider) as Arc<dyn DataProvider>,
        Arc::new(StaticUniverse::builtin()),
        config,
    );

    let output = match cli.command {
        Command::Company { ticker, score } => {
            let record = orchestrator
                .company_record(&ticker, score.years, &score.overrides()?)
                .await
                .with_context(|| format!("Company analysis failed for {}", ticker))?;
            serde_json::to_value(record)?
        }
        Command::Industry { industry, score } => {
            let record = orchestrator
                .industry_record(&industry, score.years, &score.overrides()?)
                .await;
            if record.scorecard.is_empty() {
                tracing::warn!("No constituent of {} could be analyzed", industry);
            }
            serde_json::to_value(record)?
        }
        Command::Roe {
            ticker,
            years,
            start,
            end,
            no_trend,
        } => {
            let window = roe_window(orchestrator.config().roe_window(), years, start, end, no_trend);
            let analysis = orchestrator
                .roe_history(&ticker, Some(window))
                .await
                .with_context(|| format!("ROE analysis failed for {}", ticker))?;
            serde_json::to_value(analysis)?
        }
        Command::List => serde_json::to_value(orchestrator.suggestions())?,
    };

    sweeper.abort();

    let rendered = if cli.pretty {
        serde_json::to_string_pretty(&output)?
    } else {
        serde_json::to_string(&output)?
    };
    println!("{}", rendered);
    Ok(())
}
