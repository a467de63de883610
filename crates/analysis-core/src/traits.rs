use async_trait::async_trait;
use std::sync::Arc;
use crate::{AnalysisError, ProviderSnapshot, SourceItem, UniverseEntry};

/// Per-ticker access to price history, descriptive info and annual statements
#[async_trait]
pub trait DataProvider: Send + Sync {
    async fn fetch(&self, symbol: &str) -> Result<Arc<ProviderSnapshot>, AnalysisError>;

    /// Citation for the data behind an analysis of `symbol`
    fn citation(&self, symbol: &str) -> SourceItem;
}

#[async_trait]
impl<T: DataProvider + ?Sized> DataProvider for Arc<T> {
    async fn fetch(&self, symbol: &str) -> Result<Arc<ProviderSnapshot>, AnalysisError> {
        (**self).fetch(symbol).await
    }

    fn citation(&self, symbol: &str) -> SourceItem {
        (**self).citation(symbol)
    }
}

/// Ticker universe: known industries and their fixed constituent rosters
pub trait UniverseSource: Send + Sync {
    /// Constituent tickers of an industry; empty when the industry is unknown
    fn constituents(&self, industry: &str) -> Vec<String>;

    /// Suggestion list: known industries followed by known companies
    fn entries(&self) -> Vec<UniverseEntry>;
}
