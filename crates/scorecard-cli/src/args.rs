use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use fundamental_analysis::{RoeWindowConfig, ThresholdOverrides};

#[derive(Parser, Debug)]
#[command(name = "scorecard")]
#[command(about = "Fundamental health scorecards for companies and industries", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Pretty-print the JSON output
    #[arg(long, global = true)]
    pub pretty: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Scorecard, valuation and narrative for one company
    Company {
        ticker: String,
        #[command(flatten)]
        score: ScoreArgs,
    },
    /// Aggregate scorecard across an industry roster
    Industry {
        industry: String,
        #[command(flatten)]
        score: ScoreArgs,
    },
    /// Rolling ROE statistics, outliers and trend for one company
    Roe {
        ticker: String,
        /// Rolling window in years
        #[arg(long)]
        years: Option<u32>,
        #[arg(long)]
        start: Option<NaiveDate>,
        #[arg(long)]
        end: Option<NaiveDate>,
        /// Skip the linear trend fit
        #[arg(long)]
        no_trend: bool,
    },
    /// Known industries and companies
    List,
}

#[derive(Args, Debug, Default)]
pub struct ScoreArgs {
    /// CAGR lookback in years
    #[arg(long)]
    pub years: Option<usize>,

    /// Threshold overrides as a JSON object, e.g. '{"roe_min": 0.12}'
    #[arg(long)]
    pub thresholds: Option<String>,

    #[arg(long)]
    pub rev_cagr_min: Option<f64>,
    #[arg(long)]
    pub op_margin_min: Option<f64>,
    #[arg(long)]
    pub nd_eq_max: Option<f64>,
    #[arg(long)]
    pub interest_cover_min: Option<f64>,
    #[arg(long)]
    pub roe_min: Option<f64>,
}

impl ScoreArgs {
    /// Explicit flags win over keys of the `--thresholds` object
    pub fn overrides(&self) -> Result<ThresholdOverrides> {
        let loose = match &self.thresholds {
            Some(raw) => {
                let map: serde_json::Map<String, serde_json::Value> =
                    serde_json::from_str(raw).context("--thresholds must be a JSON object")?;
                ThresholdOverrides::from_loose(&map)
            }
            None => ThresholdOverrides::default(),
        };

        Ok(ThresholdOverrides {
            rev_cagr_min: self.rev_cagr_min.or(loose.rev_cagr_min),
            op_margin_min: self.op_margin_min.or(loose.op_margin_min),
            nd_eq_max: self.nd_eq_max.or(loose.nd_eq_max),
            interest_cover_min: self.interest_cover_min.or(loose.interest_cover_min),
            roe_min: self.roe_min.or(loose.roe_min),
        })
    }
}

/// ROE window from the command line layered over the configured one
pub fn roe_window(
    base: RoeWindowConfig,
    years: Option<u32>,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
    no_trend: bool,
) -> RoeWindowConfig {
    RoeWindowConfig {
        window_years: years.unwrap_or(base.window_years),
        start,
        end,
        trend: !no_trend,
        ..base
    }
}
