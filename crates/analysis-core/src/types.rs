use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// One observation of a financial line item
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FiscalPoint {
    pub period_end: NaiveDate,
    pub value: f64,
}

/// Chronologically ordered (oldest first), period-unique series of a single line item.
///
/// Non-finite values are dropped on construction, the same way a vendor table's blank
/// cells are dropped. A later duplicate of a period replaces the earlier one.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<FiscalPoint>", into = "Vec<FiscalPoint>")]
pub struct FiscalSeries {
    points: Vec<FiscalPoint>,
}

impl FiscalSeries {
    pub fn new<I>(points: I) -> Self
    where
        I: IntoIterator<Item = (NaiveDate, f64)>,
    {
        let ordered: BTreeMap<NaiveDate, f64> = points
            .into_iter()
            .filter(|(_, value)| value.is_finite())
            .collect();

        Self {
            points: ordered
                .into_iter()
                .map(|(period_end, value)| FiscalPoint { period_end, value })
                .collect(),
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn points(&self) -> &[FiscalPoint] {
        &self.points
    }

    pub fn iter(&self) -> impl Iterator<Item = &FiscalPoint> {
        self.points.iter()
    }

    pub fn values(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.value).collect()
    }

    pub fn dates(&self) -> Vec<NaiveDate> {
        self.points.iter().map(|p| p.period_end).collect()
    }

    pub fn last(&self) -> Option<&FiscalPoint> {
        self.points.last()
    }

    pub fn last_value(&self) -> Option<f64> {
        self.points.last().map(|p| p.value)
    }

    /// Value reported for an exact period end
    pub fn value_at(&self, period_end: NaiveDate) -> Option<f64> {
        self.points
            .binary_search_by(|p| p.period_end.cmp(&period_end))
            .ok()
            .map(|idx| self.points[idx].value)
    }

    /// Period-aligned sum. A period present on only one side keeps that side's value.
    pub fn add(&self, other: &FiscalSeries) -> FiscalSeries {
        let mut sums: BTreeMap<NaiveDate, f64> = BTreeMap::new();
        for point in self.points.iter().chain(other.points.iter()) {
            *sums.entry(point.period_end).or_insert(0.0) += point.value;
        }
        FiscalSeries::new(sums)
    }
}

impl From<Vec<FiscalPoint>> for FiscalSeries {
    fn from(points: Vec<FiscalPoint>) -> Self {
        FiscalSeries::new(points.into_iter().map(|p| (p.period_end, p.value)))
    }
}

impl From<FiscalSeries> for Vec<FiscalPoint> {
    fn from(series: FiscalSeries) -> Self {
        series.points
    }
}

/// A financial statement addressable by vendor line-item name
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StatementTable {
    rows: HashMap<String, FiscalSeries>,
}

impl StatementTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, series: FiscalSeries) {
        self.rows.insert(name.into(), series);
    }

    pub fn with_row(mut self, name: impl Into<String>, series: FiscalSeries) -> Self {
        self.insert(name, series);
        self
    }

    pub fn row(&self, name: &str) -> Option<&FiscalSeries> {
        self.rows.get(name)
    }

    pub fn row_names(&self) -> impl Iterator<Item = &str> {
        self.rows.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl FromIterator<(String, FiscalSeries)> for StatementTable {
    fn from_iter<T: IntoIterator<Item = (String, FiscalSeries)>>(iter: T) -> Self {
        Self {
            rows: iter.into_iter().collect(),
        }
    }
}

/// Which annual statement a line item lives on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Statement {
    Income,
    Balance,
}

/// Annual statements for one company. Either table may be missing entirely.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FinancialStatements {
    pub income: Option<StatementTable>,
    pub balance: Option<StatementTable>,
}

impl FinancialStatements {
    pub fn table(&self, statement: Statement) -> Option<&StatementTable> {
        match statement {
            Statement::Income => self.income.as_ref(),
            Statement::Balance => self.balance.as_ref(),
        }
    }
}

/// Daily closing price
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    pub date: NaiveDate,
    pub close: f64,
    #[serde(default)]
    pub volume: Option<f64>,
}

/// Descriptive info supplied by the data provider
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanyInfo {
    #[serde(default)]
    pub long_name: Option<String>,
    #[serde(default)]
    pub market_cap: Option<f64>,
    #[serde(default)]
    pub shares_outstanding: Option<f64>,
    #[serde(default)]
    pub current_price: Option<f64>,
    #[serde(default)]
    pub regular_market_price: Option<f64>,
    #[serde(default, rename = "trailingPE")]
    pub trailing_pe: Option<f64>,
    #[serde(default)]
    pub country: Option<String>,
}

/// Everything the provider returns for one ticker
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderSnapshot {
    pub symbol: String,
    pub prices: Vec<PriceBar>,
    pub info: CompanyInfo,
    pub statements: FinancialStatements,
}

impl ProviderSnapshot {
    /// A snapshot with no statements and no prices carries nothing to analyze.
    pub fn is_usable(&self) -> bool {
        let has_table = |t: &Option<StatementTable>| t.as_ref().map_or(false, |t| !t.is_empty());
        has_table(&self.statements.income)
            || has_table(&self.statements.balance)
            || !self.prices.is_empty()
    }

    pub fn last_close(&self) -> Option<f64> {
        self.prices
            .iter()
            .rev()
            .map(|bar| bar.close)
            .find(|close| close.is_finite() && *close > 0.0)
    }
}

/// Per-entity metric bundle. Every metric is `None` when its inputs were absent or the
/// arithmetic was undefined.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetricBundle {
    pub revenue_cagr: Option<f64>,
    /// Effective CAGR window in years (may be shorter than requested)
    pub cagr_window: Option<usize>,
    pub operating_margin: Option<f64>,
    pub net_debt_to_equity: Option<f64>,
    pub interest_coverage: Option<f64>,
    pub roe: Option<f64>,
    #[serde(default)]
    pub latest: LatestFigures,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub net_income: Option<FiscalSeries>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub equity: Option<FiscalSeries>,
}

impl MetricBundle {
    pub fn value(&self, metric: MetricId) -> Option<f64> {
        match metric {
            MetricId::RevCagr => self.revenue_cagr,
            MetricId::OpMargin => self.operating_margin,
            MetricId::NdEq => self.net_debt_to_equity,
            MetricId::IntCover => self.interest_coverage,
            MetricId::Roe => self.roe,
        }
    }
}

/// Latest statement values feeding the valuation estimate
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct LatestFigures {
    pub revenue: Option<f64>,
    pub operating_income: Option<f64>,
    pub net_income: Option<f64>,
    pub total_debt: Option<f64>,
    pub cash: Option<f64>,
    pub equity: Option<f64>,
    pub interest_expense: Option<f64>,
}

/// Scorecard metric identifier. Declaration order is the display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum MetricId {
    #[serde(rename = "rev_cagr")]
    RevCagr,
    #[serde(rename = "op_margin")]
    OpMargin,
    #[serde(rename = "nd_eq")]
    NdEq,
    #[serde(rename = "int_cover")]
    IntCover,
    #[serde(rename = "roe")]
    Roe,
}

impl MetricId {
    pub const ALL: [MetricId; 5] = [
        MetricId::RevCagr,
        MetricId::OpMargin,
        MetricId::NdEq,
        MetricId::IntCover,
        MetricId::Roe,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MetricId::RevCagr => "rev_cagr",
            MetricId::OpMargin => "op_margin",
            MetricId::NdEq => "nd_eq",
            MetricId::IntCover => "int_cover",
            MetricId::Roe => "roe",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            MetricId::RevCagr => "Revenue growth (CAGR)",
            MetricId::OpMargin => "Operating margin",
            MetricId::NdEq => "Net debt / Equity",
            MetricId::IntCover => "Interest coverage",
            MetricId::Roe => "ROE",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.label() == label)
    }
}

/// Scorecard verdict. Amber means "not enough data to judge", never "borderline".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Green,
    Amber,
    Red,
}

impl Verdict {
    /// Ordinal used for industry averaging
    pub fn ordinal(&self) -> u8 {
        match self {
            Verdict::Green => 2,
            Verdict::Amber => 1,
            Verdict::Red => 0,
        }
    }

    pub fn from_average(avg: f64) -> Self {
        match avg {
            a if a >= 1.5 => Verdict::Green,
            a if a >= 1.0 => Verdict::Amber,
            _ => Verdict::Red,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Green => "green",
            Verdict::Amber => "amber",
            Verdict::Red => "red",
        }
    }
}

/// Display unit of a score item's value and threshold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScoreUnit {
    /// Percentage points (fraction x 100)
    Pct,
    /// Multiplier
    X,
    /// Industry ordinal average (green=2, amber=1, red=0)
    Score,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreItem {
    pub id: MetricId,
    pub label: String,
    pub verdict: Verdict,
    #[serde(default)]
    pub detail: Option<String>,
    #[serde(default)]
    pub value: Option<f64>,
    #[serde(default)]
    pub threshold: Option<f64>,
    pub unit: ScoreUnit,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValuationRow {
    pub metric: String,
    pub value: String,
    #[serde(default)]
    pub note: Option<String>,
}

impl ValuationRow {
    pub fn new(metric: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            metric: metric.into(),
            value: value.into(),
            note: None,
        }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValuationBlock {
    pub table: Vec<ValuationRow>,
    pub fair_value: Option<f64>,
    pub current_price: Option<f64>,
    pub upside_pct: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulletItem {
    pub text: String,
    #[serde(default)]
    pub source: Option<String>,
}

impl BulletItem {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            source: None,
        }
    }
}

/// Rule-based pros / cons / risks
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Narrative {
    pub pros: Vec<BulletItem>,
    pub cons: Vec<BulletItem>,
    pub risks: Vec<BulletItem>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceItem {
    pub title: String,
    pub url: String,
}

/// A point of the historical ROE series (percent)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RoePoint {
    pub date: NaiveDate,
    pub roe: f64,
}

/// Result of analyzing one company
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompanyAnalysis {
    pub ticker: String,
    pub as_of: NaiveDate,
    pub metrics: MetricBundle,
    pub scorecard: Vec<ScoreItem>,
    pub valuation: ValuationBlock,
    pub narrative: Narrative,
    pub sources: Vec<SourceItem>,
    pub roe_history: Vec<RoePoint>,
}

/// How many constituents of an industry roster made it into the aggregate
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coverage {
    pub roster_size: usize,
    pub completed: usize,
    pub failed: usize,
    pub timed_out: usize,
}

/// Result of aggregating an industry roster
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndustryAnalysis {
    pub industry: String,
    pub as_of: NaiveDate,
    pub scorecard: Vec<ScoreItem>,
    pub valuation: ValuationBlock,
    pub narrative: Narrative,
    pub sources: Vec<SourceItem>,
    pub coverage: Coverage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryType {
    Company,
    Industry,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisMeta {
    pub query_type: QueryType,
    pub key: String,
    pub as_of: NaiveDate,
}

/// Boundary record shared by company and industry queries
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisRecord {
    pub meta: AnalysisMeta,
    pub scorecard: Vec<ScoreItem>,
    pub valuation: ValuationBlock,
    pub pros: Vec<BulletItem>,
    pub cons: Vec<BulletItem>,
    pub risks: Vec<BulletItem>,
    pub sources: Vec<SourceItem>,
    pub roe_history: Vec<RoePoint>,
}

impl From<CompanyAnalysis> for AnalysisRecord {
    fn from(analysis: CompanyAnalysis) -> Self {
        Self {
            meta: AnalysisMeta {
                query_type: QueryType::Company,
                key: analysis.ticker,
                as_of: analysis.as_of,
            },
            scorecard: analysis.scorecard,
            valuation: analysis.valuation,
            pros: analysis.narrative.pros,
            cons: analysis.narrative.cons,
            risks: analysis.narrative.risks,
            sources: analysis.sources,
            roe_history: analysis.roe_history,
        }
    }
}

impl From<IndustryAnalysis> for AnalysisRecord {
    fn from(analysis: IndustryAnalysis) -> Self {
        Self {
            meta: AnalysisMeta {
                query_type: QueryType::Industry,
                key: analysis.industry,
                as_of: analysis.as_of,
            },
            scorecard: analysis.scorecard,
            valuation: analysis.valuation,
            pros: analysis.narrative.pros,
            cons: analysis.narrative.cons,
            risks: analysis.narrative.risks,
            sources: analysis.sources,
            roe_history: Vec::new(),
        }
    }
}

/// Entry of the ticker universe used for suggestions and roster lookup
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UniverseEntry {
    pub label: String,
    pub value: String,
    #[serde(rename = "type")]
    pub kind: EntryKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Company,
    Industry,
}
