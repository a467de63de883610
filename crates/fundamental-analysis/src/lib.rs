pub mod aggregate;
pub mod metrics;
pub mod narrative;
pub mod roe;
pub mod rows;
pub mod scorecard;
pub mod thresholds;
pub mod valuation;

pub use aggregate::{aggregate_scorecards, median};
pub use narrative::{company_narrative, industry_narrative};
pub use roe::{analyze_roe, historical_roe, RoeAnalysis, RoeObservation, RoeRecord, RoeWindowConfig, TrendLine};
pub use rows::{Candidate, Concept, FallbackSchema, RowResolver};
pub use scorecard::build_scorecard;
pub use thresholds::{ThresholdKey, ThresholdOverrides, ThresholdSet};
pub use valuation::{ValuationModel, ValuationParams};

use analysis_core::{FinancialStatements, FiscalSeries, LatestFigures, MetricBundle};
use metrics::{cagr, last_value, ratio_safe, windowed_first_last};

/// Derives the metric bundle for one company from its annual statements.
#[derive(Debug, Clone, Default)]
pub struct FundamentalAnalysisEngine {
    resolver: RowResolver,
}

impl FundamentalAnalysisEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_schema(schema: FallbackSchema) -> Self {
        Self {
            resolver: RowResolver::new(schema),
        }
    }

    pub fn resolver(&self) -> &RowResolver {
        &self.resolver
    }

    /// Operating income and revenue of the same period: the latest revenue period
    fn calculate_operating_margin(
        &self,
        operating_income: Option<&FiscalSeries>,
        revenue: Option<&FiscalSeries>,
    ) -> Option<f64> {
        let latest = revenue?.last()?;
        ratio_safe(operating_income?.value_at(latest.period_end), Some(latest.value))
    }

    fn calculate_net_debt_to_equity(
        &self,
        debt: Option<f64>,
        cash: Option<f64>,
        equity: Option<f64>,
    ) -> Option<f64> {
        let net_debt = match (debt, cash) {
            (Some(debt), Some(cash)) => Some(debt - cash),
            _ => None,
        };
        ratio_safe(net_debt, equity)
    }

    fn calculate_interest_coverage(&self, ebit: Option<f64>, interest: Option<f64>) -> Option<f64> {
        let interest = interest.map(f64::abs).filter(|i| *i > 0.0)?;
        ratio_safe(ebit, Some(interest))
    }

    /// Trailing-average-equity ROE of the latest net income period, as a fraction.
    /// Absent when that period has no ROE, never an earlier period's value.
    fn calculate_roe(&self, net_income: Option<&FiscalSeries>, equity: Option<&FiscalSeries>) -> Option<f64> {
        let latest = net_income?.last()?.period_end;
        equity?.value_at(latest)?;
        historical_roe(net_income, equity, None)
            .pop()
            .filter(|record| record.date == latest)
            .map(|record| record.roe / 100.0)
    }

    /// Resolve line items and compute every metric. Missing inputs leave the
    /// affected metric `None`; nothing here fails.
    pub fn derive(&self, statements: &FinancialStatements, years: usize) -> MetricBundle {
        let resolve = |concept| self.resolver.resolve(statements, concept);

        let revenue = resolve(Concept::Revenue);
        let operating_income = resolve(Concept::OperatingIncome);
        let net_income = resolve(Concept::NetIncome);
        let interest = resolve(Concept::InterestExpense);
        let debt = resolve(Concept::TotalDebt);
        let cash = resolve(Concept::Cash);
        let equity = resolve(Concept::Equity);

        let latest = LatestFigures {
            revenue: last_value(revenue.as_ref()),
            operating_income: last_value(operating_income.as_ref()),
            net_income: last_value(net_income.as_ref()),
            total_debt: last_value(debt.as_ref()),
            cash: last_value(cash.as_ref()),
            equity: last_value(equity.as_ref()),
            interest_expense: last_value(interest.as_ref()),
        };

        let window = windowed_first_last(revenue.as_ref(), years);
        let revenue_cagr = window.and_then(|w| cagr(Some(w.first), Some(w.last), w.years as f64));

        MetricBundle {
            revenue_cagr,
            cagr_window: window.map(|w| w.years),
            operating_margin: self.calculate_operating_margin(operating_income.as_ref(), revenue.as_ref()),
            net_debt_to_equity: self.calculate_net_debt_to_equity(latest.total_debt, latest.cash, latest.equity),
            interest_coverage: self.calculate_interest_coverage(latest.operating_income, latest.interest_expense),
            roe: self.calculate_roe(net_income.as_ref(), equity.as_ref()),
            latest,
            net_income,
            equity,
        }
    }
}
