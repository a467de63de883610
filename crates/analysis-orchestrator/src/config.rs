use anyhow::{bail, Context, Result};
use fundamental_analysis::{RoeWindowConfig, ValuationModel, ValuationParams};
use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    // Scorecard
    pub scorecard_years: usize,            // 5 (CAGR lookback)
    pub roe_history_years: u32,            // 5 (ROE series in company records)

    // Industry fan-out
    pub industry_max_workers: usize,       // 3
    pub industry_task_timeout_secs: u64,   // 20

    // Provider cache
    pub provider_cache_ttl_secs: u64,      // 300
    pub provider_cache_max_age_secs: u64,  // 600
    pub provider_cache_sweep_secs: u64,    // 60

    // Valuation
    pub peer_ev_ebit_multiple: f64,        // 15.0
    pub target_pe: f64,                    // 18.0
    pub valuation_model: ValuationModel,   // ev_ebit

    // ROE time series
    pub roe_window_years: u32,             // 3
    pub roe_clamp_min: f64,                // -200
    pub roe_clamp_max: f64,                // 200

    // Data provider
    pub yahoo_http_timeout_secs: u64,      // 30
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            scorecard_years: 5,
            roe_history_years: 5,
            industry_max_workers: 3,
            industry_task_timeout_secs: 20,
            provider_cache_ttl_secs: 300,
            provider_cache_max_age_secs: 600,
            provider_cache_sweep_secs: 60,
            peer_ev_ebit_multiple: 15.0,
            target_pe: 18.0,
            valuation_model: ValuationModel::EvEbit,
            roe_window_years: 3,
            roe_clamp_min: -200.0,
            roe_clamp_max: 200.0,
            yahoo_http_timeout_secs: 30,
        }
    }
}

fn parse_var<T>(name: &str, default: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    env::var(name)
        .unwrap_or_else(|_| default.to_string())
        .trim()
        .parse()
        .with_context(|| format!("{} is not valid", name))
}

impl AnalysisConfig {
    pub fn from_env() -> Result<Self> {
        let config = Self {
            scorecard_years: parse_var("SCORECARD_YEARS", "5")?,
            roe_history_years: parse_var("ROE_HISTORY_YEARS", "5")?,

            industry_max_workers: parse_var("INDUSTRY_MAX_WORKERS", "3")?,
            industry_task_timeout_secs: parse_var("INDUSTRY_TASK_TIMEOUT_SECS", "20")?,

            provider_cache_ttl_secs: parse_var("PROVIDER_CACHE_TTL_SECS", "300")?,
            provider_cache_max_age_secs: parse_var("PROVIDER_CACHE_MAX_AGE_SECS", "600")?,
            provider_cache_sweep_secs: parse_var("PROVIDER_CACHE_SWEEP_SECS", "60")?,

            peer_ev_ebit_multiple: parse_var("PEER_EV_EBIT_MULTIPLE", "15.0")?,
            target_pe: parse_var("TARGET_PE", "18.0")?,
            valuation_model: parse_var("VALUATION_MODEL", "ev_ebit")?,

            roe_window_years: parse_var("ROE_WINDOW_YEARS", "3")?,
            roe_clamp_min: parse_var("ROE_CLAMP_MIN", "-200")?,
            roe_clamp_max: parse_var("ROE_CLAMP_MAX", "200")?,

            yahoo_http_timeout_secs: parse_var("YAHOO_HTTP_TIMEOUT_SECS", "30")?,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.scorecard_years == 0 {
            bail!("SCORECARD_YEARS must be at least 1");
        }
        if self.industry_max_workers == 0 {
            bail!("INDUSTRY_MAX_WORKERS must be at least 1");
        }
        if self.industry_task_timeout_secs == 0 {
            bail!("INDUSTRY_TASK_TIMEOUT_SECS must be at least 1");
        }
        if self.provider_cache_max_age_secs < self.provider_cache_ttl_secs {
            bail!(
                "PROVIDER_CACHE_MAX_AGE_SECS ({}) must not be shorter than PROVIDER_CACHE_TTL_SECS ({})",
                self.provider_cache_max_age_secs,
                self.provider_cache_ttl_secs
            );
        }
        if self.provider_cache_sweep_secs == 0 {
            bail!("PROVIDER_CACHE_SWEEP_SECS must be at least 1");
        }
        if !(self.peer_ev_ebit_multiple.is_finite() && self.peer_ev_ebit_multiple > 0.0) {
            bail!("PEER_EV_EBIT_MULTIPLE must be a positive number");
        }
        if !(self.target_pe.is_finite() && self.target_pe > 0.0) {
            bail!("TARGET_PE must be a positive number");
        }
        if !(self.roe_clamp_min.is_finite() && self.roe_clamp_max.is_finite())
            || self.roe_clamp_min >= self.roe_clamp_max
        {
            bail!(
                "ROE clamp band is empty ({}..{})",
                self.roe_clamp_min,
                self.roe_clamp_max
            );
        }
        Ok(())
    }

    pub fn task_timeout(&self) -> Duration {
        Duration::from_secs(self.industry_task_timeout_secs)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.provider_cache_ttl_secs)
    }

    pub fn cache_max_age(&self) -> Duration {
        Duration::from_secs(self.provider_cache_max_age_secs)
    }

    pub fn cache_sweep_interval(&self) -> Duration {
        Duration::from_secs(self.provider_cache_sweep_secs)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.yahoo_http_timeout_secs)
    }

    pub fn valuation_params(&self) -> ValuationParams {
        ValuationParams {
            model: self.valuation_model,
            peer_ev_ebit: self.peer_ev_ebit_multiple,
            target_pe: self.target_pe,
        }
    }

    pub fn roe_window(&self) -> RoeWindowConfig {
        RoeWindowConfig {
            window_years: self.roe_window_years,
            clamp_min: self.roe_clamp_min,
            clamp_max: self.roe_clamp_max,
            ..Default::default()
        }
    }
}
