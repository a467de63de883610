use crate::config::AnalysisConfig;
use analysis_core::{
    AnalysisError, CompanyAnalysis, DataProvider, MetricBundle, ProviderSnapshot, RoePoint, Stage,
};
use fundamental_analysis::roe::trim_to_recent_years;
use fundamental_analysis::{
    analyze_roe, build_scorecard, company_narrative, historical_roe, valuation, FundamentalAnalysisEngine,
    RoeAnalysis, RoeWindowConfig, ThresholdSet,
};
use std::sync::Arc;

/// Normalized ticker, or an error for a blank one
pub(crate) fn normalize_ticker(raw: &str) -> Result<String, AnalysisError> {
    let ticker = raw.trim().to_uppercase();
    if ticker.is_empty() {
        return Err(AnalysisError::InvalidData("empty ticker".to_string()));
    }
    Ok(ticker)
}

/// Single-company pipeline: fetch, derive, assemble.
///
/// A fetch failure is reported as a provider error. Errors raised while deriving or
/// assembling are re-signalled as [`AnalysisError::Failed`] tagged with the stage.
pub struct CompanyAnalyzer {
    provider: Arc<dyn DataProvider>,
    engine: FundamentalAnalysisEngine,
    config: AnalysisConfig,
}

impl CompanyAnalyzer {
    pub fn new(provider: Arc<dyn DataProvider>, config: AnalysisConfig) -> Self {
        Self {
            provider,
            engine: FundamentalAnalysisEngine::new(),
            config,
        }
    }

    pub fn with_engine(mut self, engine: FundamentalAnalysisEngine) -> Self {
        self.engine = engine;
        self
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    pub async fn analyze(
        &self,
        ticker: &str,
        years: usize,
        thresholds: &ThresholdSet,
    ) -> Result<CompanyAnalysis, AnalysisError> {
        let ticker = normalize_ticker(ticker)?;
        tracing::info!("Analyzing {} ({}y lookback)", ticker, years);

        let snapshot = self.fetch(&ticker).await?;
        let metrics = self
            .derive(&snapshot, years)
            .map_err(|e| AnalysisError::failed(&ticker, Stage::Derive, e))?;
        let analysis = self
            .assemble(&ticker, &snapshot, metrics, thresholds)
            .map_err(|e| AnalysisError::failed(&ticker, Stage::Assemble, e))?;

        tracing::info!(
            "Analysis of {} complete: {} green / {} red",
            ticker,
            analysis
                .scorecard
                .iter()
                .filter(|i| i.verdict == analysis_core::Verdict::Green)
                .count(),
            analysis
                .scorecard
                .iter()
                .filter(|i| i.verdict == analysis_core::Verdict::Red)
                .count()
        );
        Ok(analysis)
    }

    /// Rolling ROE analysis with trend fit for one company
    pub async fn roe_history(
        &self,
        ticker: &str,
        window: &RoeWindowConfig,
    ) -> Result<RoeAnalysis, AnalysisError> {
        let ticker = normalize_ticker(ticker)?;
        let snapshot = self.fetch(&ticker).await?;
        let metrics = self
            .derive(&snapshot, self.config.scorecard_years)
            .map_err(|e| AnalysisError::failed(&ticker, Stage::Derive, e))?;
        check_clamp_band(window).map_err(|e| AnalysisError::failed(&ticker, Stage::Assemble, e))?;

        let records = historical_roe(metrics.net_income.as_ref(), metrics.equity.as_ref(), Some(&ticker));
        if records.is_empty() {
            tracing::warn!("{}: not enough aligned periods for an ROE series", ticker);
        }
        Ok(analyze_roe(&records, window))
    }

    async fn fetch(&self, ticker: &str) -> Result<Arc<ProviderSnapshot>, AnalysisError> {
        let snapshot = match self.provider.fetch(ticker).await {
            Ok(snapshot) => snapshot,
            Err(e @ AnalysisError::Provider { .. }) => return Err(e),
            Err(e) => return Err(AnalysisError::provider(ticker, e.to_string())),
        };

        if !snapshot.is_usable() {
            return Err(AnalysisError::provider(ticker, "provider returned no usable data"));
        }
        tracing::debug!(
            "Fetched {}: {} price bars, income={} balance={}",
            ticker,
            snapshot.prices.len(),
            snapshot.statements.income.is_some(),
            snapshot.statements.balance.is_some()
        );
        Ok(snapshot)
    }

    fn derive(&self, snapshot: &ProviderSnapshot, years: usize) -> Result<MetricBundle, AnalysisError> {
        if years == 0 {
            return Err(AnalysisError::InvalidData("lookback must be at least one year".to_string()));
        }
        Ok(self.engine.derive(&snapshot.statements, years))
    }

    fn assemble(
        &self,
        ticker: &str,
        snapshot: &ProviderSnapshot,
        metrics: MetricBundle,
        thresholds: &ThresholdSet,
    ) -> Result<CompanyAnalysis, AnalysisError> {
        let window = self.config.roe_window();
        check_clamp_band(&window)?;

        let scorecard = build_scorecard(&metrics, thresholds);
        let price = valuation::current_price(snapshot);
        let valuation = valuation::estimate(
            &metrics.latest,
            &snapshot.info,
            price,
            &self.config.valuation_params(),
        );
        let narrative = company_narrative(&metrics, snapshot.info.country.as_deref());

        let roe = historical_roe(metrics.net_income.as_ref(), metrics.equity.as_ref(), Some(ticker));
        let roe_history = trim_to_recent_years(&roe, self.config.roe_history_years)
            .iter()
            .map(RoePoint::from)
            .collect();

        Ok(CompanyAnalysis {
            ticker: ticker.to_string(),
            as_of: chrono::Utc::now().date_naive(),
            metrics,
            scorecard,
            valuation,
            narrative,
            sources: vec![self.provider.citation(ticker)],
            roe_history,
        })
    }
}

fn check_clamp_band(window: &RoeWindowConfig) -> Result<(), AnalysisError> {
    if window.clamp_min.is_nan() || window.clamp_max.is_nan() || window.clamp_min > window.clamp_max {
        return Err(AnalysisError::CalculationError(format!(
            "invalid ROE clamp band {}..{}",
            window.clamp_min, window.clamp_max
        )));
    }
    Ok(())
}
