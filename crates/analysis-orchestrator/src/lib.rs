use analysis_core::{
    AnalysisError, AnalysisRecord, CompanyAnalysis, DataProvider, IndustryAnalysis, UniverseEntry, UniverseSource,
};
use fundamental_analysis::{RoeAnalysis, RoeWindowConfig, ThresholdOverrides, ThresholdSet};
use std::sync::Arc;

pub mod cache;
pub mod company;
pub mod config;
pub mod industry;
pub mod universe;

#[cfg(test)]
mod tests;

pub use cache::CachedProvider;
pub use company::CompanyAnalyzer;
pub use config::AnalysisConfig;
pub use industry::{IndustryAggregator, RosterRun};
pub use universe::{IndustryRoster, StaticUniverse};

/// Entry point for company, industry and ROE queries.
///
/// Holds the read-only defaults; each query merges its own threshold overrides on top.
pub struct AnalysisOrchestrator {
    company: Arc<CompanyAnalyzer>,
    industry: IndustryAggregator,
    universe: Arc<dyn UniverseSource>,
    config: AnalysisConfig,
    base_thresholds: ThresholdSet,
}

impl AnalysisOrchestrator {
    pub fn new(
        provider: Arc<dyn DataProvider>,
        universe: Arc<dyn UniverseSource>,
        config: AnalysisConfig,
    ) -> Self {
        let company = Arc::new(CompanyAnalyzer::new(provider, config.clone()));
        let industry = IndustryAggregator::new(Arc::clone(&company), Arc::clone(&universe));

        Self {
            company,
            industry,
            universe,
            config,
            base_thresholds: ThresholdSet::default(),
        }
    }

    pub fn with_thresholds(mut self, thresholds: ThresholdSet) -> Self {
        self.base_thresholds = thresholds;
        self
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    fn thresholds(&self, overrides: &ThresholdOverrides) -> ThresholdSet {
        self.base_thresholds.merge(overrides)
    }

    pub async fn analyze_company(
        &self,
        ticker: &str,
        years: Option<usize>,
        overrides: &ThresholdOverrides,
    ) -> Result<CompanyAnalysis, AnalysisError> {
        let years = years.unwrap_or(self.config.scorecard_years);
        self.company.analyze(ticker, years, &self.thresholds(overrides)).await
    }

    /// Never fails: constituents that fail are skipped, down to an empty result.
    pub async fn analyze_industry(
        &self,
        industry: &str,
        years: Option<usize>,
        overrides: &ThresholdOverrides,
    ) -> IndustryAnalysis {
        let years = years.unwrap_or(self.config.scorecard_years);
        self.industry.analyze(industry, years, &self.thresholds(overrides)).await
    }

    pub async fn company_record(
        &self,
        ticker: &str,
        years: Option<usize>,
        overrides: &ThresholdOverrides,
    ) -> Result<AnalysisRecord, AnalysisError> {
        self.analyze_company(ticker, years, overrides).await.map(AnalysisRecord::from)
    }

    pub async fn industry_record(
        &self,
        industry: &str,
        years: Option<usize>,
        overrides: &ThresholdOverrides,
    ) -> AnalysisRecord {
        AnalysisRecord::from(self.analyze_industry(industry, years, overrides).await)
    }

    pub async fn roe_history(
        &self,
        ticker: &str,
        window: Option<RoeWindowConfig>,
    ) -> Result<RoeAnalysis, AnalysisError> {
        let window = window.unwrap_or_else(|| RoeWindowConfig {
            trend: true,
            ..self.config.roe_window()
        });
        self.company.roe_history(ticker, &window).await
    }

    /// Industries and companies known to the universe
    pub fn suggestions(&self) -> Vec<UniverseEntry> {
        self.universe.entries()
    }
}
