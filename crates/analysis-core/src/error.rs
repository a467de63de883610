use std::fmt;
use thiserror::Error;

/// Pipeline stage of a single-company analysis
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Fetch,
    Derive,
    Assemble,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Fetch => write!(f, "fetch"),
            Stage::Derive => write!(f, "derive"),
            Stage::Assemble => write!(f, "assemble"),
        }
    }
}

#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Calculation error: {0}")]
    CalculationError(String),

    #[error("API error: {0}")]
    ApiError(String),

    #[error("Provider failure for {symbol}: {message}")]
    Provider { symbol: String, message: String },

    #[error("Analysis failed for {symbol} during {stage}: {source}")]
    Failed {
        symbol: String,
        stage: Stage,
        #[source]
        source: Box<AnalysisError>,
    },

    #[error("Configuration error: {0}")]
    Config(String),
}

impl AnalysisError {
    pub fn provider(symbol: impl Into<String>, message: impl Into<String>) -> Self {
        AnalysisError::Provider {
            symbol: symbol.into(),
            message: message.into(),
        }
    }

    /// Re-signal an error raised inside a pipeline stage, tagged with the ticker
    pub fn failed(symbol: impl Into<String>, stage: Stage, source: AnalysisError) -> Self {
        AnalysisError::Failed {
            symbol: symbol.into(),
            stage,
            source: Box::new(source),
        }
    }

    /// Ticker the error is attributed to, when known
    pub fn symbol(&self) -> Option<&str> {
        match self {
            AnalysisError::Provider { symbol, .. } | AnalysisError::Failed { symbol, .. } => {
                Some(symbol)
            }
            _ => None,
        }
    }
}
