use crate::company::CompanyAnalyzer;
use analysis_core::{
    AnalysisError, CompanyAnalysis, Coverage, IndustryAnalysis, UniverseSource, ValuationBlock, ValuationRow,
};
use fundamental_analysis::{aggregate_scorecards, industry_narrative, median, valuation, ThresholdSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// How one constituent's analysis ended
enum Outcome {
    Completed(usize, Box<CompanyAnalysis>),
    Failed(String, AnalysisError),
    TimedOut(String),
}

/// Completed constituent analyses plus counts of the ones that were skipped
#[derive(Debug, Default)]
pub struct RosterRun {
    pub completed: Vec<CompanyAnalysis>,
    pub coverage: Coverage,
}

/// Fans the company pipeline out over an industry roster and reduces the results.
pub struct IndustryAggregator {
    analyzer: Arc<CompanyAnalyzer>,
    universe: Arc<dyn UniverseSource>,
    max_workers: usize,
    task_timeout: Duration,
}

impl IndustryAggregator {
    pub fn new(analyzer: Arc<CompanyAnalyzer>, universe: Arc<dyn UniverseSource>) -> Self {
        let config = analyzer.config();
        let (max_workers, task_timeout) = (config.industry_max_workers, config.task_timeout());
        Self {
            analyzer,
            universe,
            max_workers,
            task_timeout,
        }
    }

    pub fn with_max_workers(mut self, max_workers: usize) -> Self {
        self.max_workers = max_workers.max(1);
        self
    }

    pub fn with_task_timeout(mut self, task_timeout: Duration) -> Self {
        self.task_timeout = task_timeout;
        self
    }

    pub async fn analyze(&self, industry: &str, years: usize, thresholds: &ThresholdSet) -> IndustryAnalysis {
        let roster = self.universe.constituents(industry);
        tracing::info!("Analyzing industry {} ({} constituents)", industry, roster.len());

        let run = self.run_roster(&roster, years, thresholds).await;
        summarize(industry, run)
    }

    /// Run the company pipeline over `roster` with at most `min(max_workers, n)` analyses
    /// in flight. A task that exceeds the timeout is detached and its result ignored; it
    /// holds its worker slot until it actually finishes.
    pub async fn run_roster(&self, roster: &[String], years: usize, thresholds: &ThresholdSet) -> RosterRun {
        let mut run = RosterRun {
            completed: Vec::new(),
            coverage: Coverage {
                roster_size: roster.len(),
                ..Default::default()
            },
        };
        if roster.is_empty() {
            return run;
        }

        let permits = Arc::new(Semaphore::new(self.max_workers.min(roster.len())));
        let mut tasks = JoinSet::new();

        for (idx, ticker) in roster.iter().cloned().enumerate() {
            let analyzer = Arc::clone(&self.analyzer);
            let permits = Arc::clone(&permits);
            let thresholds = *thresholds;
            let timeout = self.task_timeout;

            tasks.spawn(async move {
                let Ok(permit) = permits.acquire_owned().await else {
                    return Outcome::Failed(ticker, AnalysisError::ApiError("worker pool closed".to_string()));
                };

                // the permit follows the analysis, so a timed-out fetch keeps its worker slot
                let symbol = ticker.clone();
                let inner = tokio::spawn(async move {
                    let _permit = permit;
                    analyzer.analyze(&symbol, years, &thresholds).await
                });

                match tokio::time::timeout(timeout, inner).await {
                    Ok(Ok(Ok(analysis))) => Outcome::Completed(idx, Box::new(analysis)),
                    Ok(Ok(Err(e))) => Outcome::Failed(ticker, e),
                    Ok(Err(join_err)) => Outcome::Failed(
                        ticker,
                        AnalysisError::CalculationError(format!("analysis task aborted: {}", join_err)),
                    ),
                    Err(_) => Outcome::TimedOut(ticker),
                }
            });
        }

        let mut completed: Vec<(usize, CompanyAnalysis)> = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Outcome::Completed(idx, analysis)) => completed.push((idx, *analysis)),
                Ok(Outcome::Failed(ticker, e)) => {
                    tracing::warn!("Skipping {}: {}", ticker, e);
                    run.coverage.failed += 1;
                }
                Ok(Outcome::TimedOut(ticker)) => {
                    tracing::warn!("Skipping {}: timed out after {:?}", ticker, self.task_timeout);
                    run.coverage.timed_out += 1;
                }
                Err(e) => {
                    tracing::error!("Task error: {}", e);
                    run.coverage.failed += 1;
                }
            }
        }

        // completion order is arbitrary; report in roster order
        completed.sort_by_key(|(idx, _)| *idx);
        run.coverage.completed = completed.len();
        run.completed = completed.into_iter().map(|(_, analysis)| analysis).collect();

        tracing::info!(
            "Roster complete: {}/{} analyzed, {} failed, {} timed out",
            run.coverage.completed,
            run.coverage.roster_size,
            run.coverage.failed,
            run.coverage.timed_out
        );
        run
    }
}

/// Reduce a roster run into the industry record. No completed constituents gives the
/// same empty scorecard and sources as an empty roster.
pub fn summarize(industry: &str, run: RosterRun) -> IndustryAnalysis {
    let as_of = chrono::Utc::now().date_naive();
    if run.completed.is_empty() {
        return IndustryAnalysis {
            industry: industry.to_string(),
            as_of,
            scorecard: Vec::new(),
            valuation: ValuationBlock::default(),
            narrative: Default::default(),
            sources: Vec::new(),
            coverage: run.coverage,
        };
    }

    let scorecard = aggregate_scorecards(run.completed.iter().map(|c| c.scorecard.as_slice()));
    let upsides: Vec<f64> = run
        .completed
        .iter()
        .filter_map(|c| c.valuation.upside_pct)
        .collect();
    let median_upside = median(upsides.iter().copied());

    let valuation = ValuationBlock {
        table: vec![ValuationRow::new("Median Upside (peers)", valuation::percent(median_upside))
            .with_note(format!("{} of {} peers with an estimate", upsides.len(), run.completed.len()))],
        fair_value: None,
        current_price: None,
        upside_pct: median_upside,
    };

    IndustryAnalysis {
        industry: industry.to_string(),
        as_of,
        narrative: industry_narrative(&scorecard),
        scorecard,
        valuation,
        sources: run
            .completed
            .iter()
            .flat_map(|c| c.sources.iter().cloned())
            .collect(),
        coverage: run.coverage,
    }
}
