use super::*;
use analysis_core::{
    CompanyInfo, FinancialStatements, FiscalSeries, MetricId, PriceBar, ProviderSnapshot, QueryType, SourceItem,
    StatementTable, Verdict,
};
use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

fn ye(year: i32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, 12, 31).unwrap()
}

fn series(values: &[(i32, f64)]) -> FiscalSeries {
    FiscalSeries::new(values.iter().map(|(y, v)| (ye(*y), *v)))
}

/// A company that passes every default threshold
fn healthy(symbol: &str) -> ProviderSnapshot {
    let income = StatementTable::new()
        .with_row(
            "Total Revenue",
            series(&[(2020, 100.0), (2021, 120.0), (2022, 144.0), (2023, 172.8)]),
        )
        .with_row(
            "Operating Income",
            series(&[(2020, 25.0), (2021, 30.0), (2022, 36.0), (2023, 43.2)]),
        )
        .with_row(
            "Net Income",
            series(&[(2020, 15.0), (2021, 18.0), (2022, 22.0), (2023, 26.0)]),
        )
        .with_row("Interest Expense", series(&[(2023, -2.0)]));
    let balance = StatementTable::new()
        .with_row("Total Debt", series(&[(2023, 60.0)]))
        .with_row("Cash And Cash Equivalents", series(&[(2023, 20.0)]))
        .with_row(
            "Stockholders Equity",
            series(&[(2020, 90.0), (2021, 100.0), (2022, 110.0), (2023, 120.0)]),
        );

    ProviderSnapshot {
        symbol: symbol.to_string(),
        prices: vec![PriceBar {
            date: NaiveDate::from_ymd_opt(2024, 3, 28).unwrap(),
            close: 5.0,
            volume: None,
        }],
        info: CompanyInfo {
            market_cap: Some(500.0),
            shares_outstanding: Some(100.0),
            country: Some("United States".to_string()),
            ..Default::default()
        },
        statements: FinancialStatements {
            income: Some(income),
            balance: Some(balance),
        },
    }
}

/// A company that fails every default threshold
fn struggling(symbol: &str) -> ProviderSnapshot {
    let income = StatementTable::new()
        .with_row("Total Revenue", series(&[(2022, 100.0), (2023, 90.0)]))
        .with_row("Operating Income", series(&[(2022, 4.0), (2023, 3.0)]))
        .with_row("Net Income", series(&[(2022, 1.0), (2023, 1.0)]))
        .with_row("Interest Expense", series(&[(2023, 3.0)]));
    let balance = StatementTable::new()
        .with_row("Total Debt", series(&[(2023, 300.0)]))
        .with_row("Cash", series(&[(2023, 10.0)]))
        .with_row("Stockholders Equity", series(&[(2022, 100.0), (2023, 100.0)]));

    ProviderSnapshot {
        symbol: symbol.to_string(),
        info: CompanyInfo {
            current_price: Some(10.0),
            market_cap: Some(1_000.0),
            shares_outstanding: Some(100.0),
            ..Default::default()
        },
        statements: FinancialStatements {
            income: Some(income),
            balance: Some(balance),
        },
        ..Default::default()
    }
}

#[derive(Default)]
struct FakeProvider {
    snapshots: HashMap<String, ProviderSnapshot>,
    delays: HashMap<String, Duration>,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl FakeProvider {
    fn with(mut self, snapshot: ProviderSnapshot) -> Self {
        self.snapshots.insert(snapshot.symbol.clone(), snapshot);
        self
    }

    fn delayed(mut self, symbol: &str, delay: Duration) -> Self {
        self.delays.insert(symbol.to_string(), delay);
        self
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DataProvider for FakeProvider {
    async fn fetch(&self, symbol: &str) -> Result<Arc<ProviderSnapshot>, AnalysisError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);

        if let Some(delay) = self.delays.get(symbol) {
            tokio::time::sleep(*delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        self.snapshots
            .get(symbol)
            .cloned()
            .map(Arc::new)
            .ok_or_else(|| AnalysisError::ApiError(format!("connection refused for {}", symbol)))
    }

    fn citation(&self, symbol: &str) -> SourceItem {
        SourceItem {
            title: format!("Fake – {}", symbol),
            url: format!("https://example.test/{}", symbol),
        }
    }
}

fn universe(rosters: Vec<(&str, Vec<&str>)>) -> Arc<dyn UniverseSource> {
    Arc::new(StaticUniverse::new(
        rosters
            .into_iter()
            .map(|(key, tickers)| IndustryRoster {
                key: key.to_string(),
                label: key.to_string(),
                tickers: tickers.iter().map(|t| t.to_string()).collect(),
            })
            .collect(),
    ))
}

fn orchestrator(provider: FakeProvider, rosters: Vec<(&str, Vec<&str>)>) -> AnalysisOrchestrator {
    AnalysisOrchestrator::new(Arc::new(provider), universe(rosters), AnalysisConfig::default())
}

#[tokio::test]
async fn test_healthy_company_scores_green() {
    let orch = orchestrator(FakeProvider::default().with(healthy("GOOD")), vec![]);
    let analysis = orch
        .analyze_company("good", None, &ThresholdOverrides::default())
        .await
        .unwrap();

    assert_eq!(analysis.ticker, "GOOD");
    assert!(analysis.scorecard.iter().all(|i| i.verdict == Verdict::Green));
    assert_eq!(analysis.metrics.cagr_window, Some(3));
    assert_eq!(analysis.sources[0].url, "https://example.test/GOOD");
    assert_eq!(analysis.roe_history.len(), 3);
    assert!(analysis.valuation.fair_value.is_some());
}

#[tokio::test]
async fn test_latest_operating_income_missing_is_amber() {
    let mut snapshot = healthy("GAP");
    if let Some(income) = snapshot.statements.income.as_mut() {
        income.insert(
            "Operating Income",
            series(&[(2020, 25.0), (2021, 30.0), (2022, 36.0)]),
        );
    }
    let orch = orchestrator(FakeProvider::default().with(snapshot), vec![]);

    let analysis = orch
        .analyze_company("GAP", None, &ThresholdOverrides::default())
        .await
        .unwrap();

    assert_eq!(analysis.metrics.operating_margin, None);
    let item = analysis
        .scorecard
        .iter()
        .find(|i| i.id == MetricId::OpMargin)
        .unwrap();
    assert_eq!(item.verdict, Verdict::Amber);
    assert_eq!(item.detail.as_deref(), Some("Insufficient data"));
    assert_eq!(item.value, None);
}

#[tokio::test]
async fn test_overrides_change_verdicts() {
    let orch = orchestrator(FakeProvider::default().with(healthy("GOOD")), vec![]);
    let overrides = ThresholdOverrides {
        rev_cagr_min: Some(0.5),
        ..Default::default()
    };
    let analysis = orch.analyze_company("GOOD", None, &overrides).await.unwrap();

    assert_eq!(analysis.scorecard[0].verdict, Verdict::Red);
    assert_eq!(analysis.scorecard[0].threshold, Some(50.0));
}

#[tokio::test]
async fn test_provider_failure_names_the_ticker() {
    let orch = orchestrator(FakeProvider::default(), vec![]);
    let err = orch
        .analyze_company("MISSING", None, &ThresholdOverrides::default())
        .await
        .unwrap_err();

    assert!(matches!(err, AnalysisError::Provider { .. }));
    assert_eq!(err.symbol(), Some("MISSING"));
}

#[tokio::test]
async fn test_unusable_snapshot_is_a_provider_failure() {
    let empty = ProviderSnapshot {
        symbol: "HOLLOW".to_string(),
        ..Default::default()
    };
    let orch = orchestrator(FakeProvider::default().with(empty), vec![]);
    let err = orch
        .analyze_company("HOLLOW", None, &ThresholdOverrides::default())
        .await
        .unwrap_err();

    assert!(matches!(err, AnalysisError::Provider { .. }));
}

#[tokio::test]
async fn test_zero_lookback_fails_in_derive_stage() {
    let orch = orchestrator(FakeProvider::default().with(healthy("GOOD")), vec![]);
    let err = orch
        .analyze_company("GOOD", Some(0), &ThresholdOverrides::default())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        AnalysisError::Failed {
            stage: analysis_core::Stage::Derive,
            ..
        }
    ));
}

#[tokio::test]
async fn test_industry_reduces_mixed_verdicts() {
    let provider = FakeProvider::default()
        .with(healthy("A"))
        .with(healthy("B"))
        .with(struggling("C"))
        .with(struggling("D"));
    let orch = orchestrator(provider, vec![("Mixed", vec!["A", "B", "C", "D"])]);

    let industry = orch
        .analyze_industry("mixed", None, &ThresholdOverrides::default())
        .await;

    assert_eq!(industry.coverage.completed, 4);
    assert_eq!(industry.scorecard.len(), 5);
    assert!(industry.scorecard.iter().all(|i| i.verdict == Verdict::Amber));
    assert!(industry.scorecard.iter().all(|i| i.value == Some(1.0)));
    assert_eq!(industry.sources.len(), 4);
    assert_eq!(industry.sources[0].url, "https://example.test/A");
    assert_eq!(industry.valuation.table[0].metric, "Median Upside (peers)");
    assert!(industry.valuation.upside_pct.is_some());
}

#[tokio::test]
async fn test_all_failures_match_empty_roster() {
    let orch = orchestrator(
        FakeProvider::default(),
        vec![("Broken", vec!["X", "Y", "Z"]), ("Empty", vec![])],
    );

    let broken = orch
        .analyze_industry("Broken", None, &ThresholdOverrides::default())
        .await;
    let empty = orch
        .analyze_industry("Empty", None, &ThresholdOverrides::default())
        .await;
    let unknown = orch
        .analyze_industry("Nothing", None, &ThresholdOverrides::default())
        .await;

    for result in [&broken, &empty, &unknown] {
        assert!(result.scorecard.is_empty());
        assert!(result.sources.is_empty());
        assert!(result.valuation.table.is_empty());
        assert_eq!(result.valuation.upside_pct, None);
    }
    assert_eq!(broken.coverage.failed, 3);
    assert_eq!(empty.coverage.roster_size, 0);
}

#[tokio::test]
async fn test_slow_constituent_is_skipped() {
    let provider = FakeProvider::default()
        .with(healthy("FAST"))
        .with(healthy("SLOW"))
        .delayed("SLOW", Duration::from_secs(30));
    let provider = Arc::new(provider);
    let analyzer = Arc::new(CompanyAnalyzer::new(provider, AnalysisConfig::default()));
    let aggregator = IndustryAggregator::new(analyzer, universe(vec![("Tech", vec!["FAST", "SLOW"])]))
        .with_task_timeout(Duration::from_millis(100));

    let industry = aggregator.analyze("Tech", 5, &ThresholdSet::default()).await;

    assert_eq!(industry.coverage.completed, 1);
    assert_eq!(industry.coverage.timed_out, 1);
    assert_eq!(industry.sources.len(), 1);
    assert!(industry.scorecard.iter().all(|i| i.verdict == Verdict::Green));
}

#[tokio::test]
async fn test_worker_pool_is_bounded() {
    let tickers = ["T1", "T2", "T3", "T4", "T5", "T6"];
    let provider = tickers.iter().fold(FakeProvider::default(), |p, t| {
        p.with(healthy(t)).delayed(t, Duration::from_millis(30))
    });
    let provider = Arc::new(provider);
    let analyzer = Arc::new(CompanyAnalyzer::new(
        Arc::clone(&provider) as Arc<dyn DataProvider>,
        AnalysisConfig::default(),
    ));
    let aggregator = IndustryAggregator::new(analyzer, universe(vec![("Six", tickers.to_vec())])).with_max_workers(2);

    let industry = aggregator.analyze("Six", 5, &ThresholdSet::default()).await;

    assert_eq!(industry.coverage.completed, 6);
    assert!(provider.peak_in_flight.load(Ordering::SeqCst) <= 2);
}

#[tokio::test]
async fn test_timed_out_fetches_keep_their_worker() {
    let tickers = ["S1", "S2", "S3", "S4", "S5", "S6"];
    let provider = tickers.iter().fold(FakeProvider::default(), |p, t| {
        p.with(healthy(t)).delayed(t, Duration::from_millis(200))
    });
    let provider = Arc::new(provider);
    let analyzer = Arc::new(CompanyAnalyzer::new(
        Arc::clone(&provider) as Arc<dyn DataProvider>,
        AnalysisConfig::default(),
    ));
    let aggregator = IndustryAggregator::new(analyzer, universe(vec![("Slow", tickers.to_vec())]))
        .with_max_workers(1)
        .with_task_timeout(Duration::from_millis(20));

    let industry = aggregator.analyze("Slow", 5, &ThresholdSet::default()).await;

    assert_eq!(industry.coverage.timed_out, 6);
    assert!(industry.scorecard.is_empty());
    assert_eq!(provider.peak_in_flight.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_cache_serves_repeat_fetches() {
    let cache = CachedProvider::new(FakeProvider::default().with(healthy("C")), Duration::from_secs(300));
    assert!(cache.is_empty());

    let first = cache.fetch("C").await.unwrap();
    let second = cache.fetch("c").await.unwrap();

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(cache.len(), 1);
}

#[tokio::test]
async fn test_expired_entries_are_refetched_and_swept() {
    let cache = CachedProvider::new(FakeProvider::default().with(healthy("C")), Duration::ZERO);
    cache.fetch("C").await.unwrap();
    cache.fetch("C").await.unwrap();
    assert_eq!(cache.inner().calls(), 2);

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(cache.sweep(Duration::from_millis(5)), 1);
    assert!(cache.is_empty());
}

#[tokio::test]
async fn test_failed_fetches_are_not_cached() {
    let cache = CachedProvider::new(FakeProvider::default(), Duration::from_secs(300));
    assert!(cache.fetch("NOPE").await.is_err());
    assert!(cache.is_empty());
}

#[tokio::test]
async fn test_company_record_shape() {
    let orch = orchestrator(FakeProvider::default().with(healthy("GOOD")), vec![("Solo", vec!["GOOD"])]);

    let record = orch
        .company_record("GOOD", None, &ThresholdOverrides::default())
        .await
        .unwrap();
    assert_eq!(record.meta.query_type, QueryType::Company);
    assert_eq!(record.meta.key, "GOOD");
    assert!(!record.roe_history.is_empty());

    let json = serde_json::to_value(&record).unwrap();
    assert_eq!(json["meta"]["queryType"], "company");
    assert_eq!(json["scorecard"][0]["id"], "rev_cagr");
    assert_eq!(json["valuation"]["table"][0]["metric"], "Current Price");

    let record = orch
        .industry_record("Solo", None, &ThresholdOverrides::default())
        .await;
    assert_eq!(record.meta.query_type, QueryType::Industry);
    assert!(record.roe_history.is_empty());
}

#[tokio::test]
async fn test_roe_history_fits_trend() {
    let orch = orchestrator(FakeProvider::default().with(healthy("GOOD")), vec![]);
    let roe = orch.roe_history("GOOD", None).await.unwrap();

    assert_eq!(roe.observations.len(), 3);
    assert!(roe.trends.contains_key("GOOD"));
    assert!(roe.outliers().next().is_none());
}

#[test]
fn test_suggestions_come_from_universe() {
    let orch = orchestrator(FakeProvider::default(), vec![("Robotics", vec!["ABB"])]);
    let entries = orch.suggestions();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].value, "Robotics");
}
