//! Annual statement rows from the fundamentals time-series endpoint.

use analysis_core::{FinancialStatements, FiscalSeries, Statement, StatementTable};
use chrono::NaiveDate;
use serde_json::Value;
use std::collections::HashMap;

/// Series requested per ticker and the statement each one lands in
pub const ANNUAL_FIELDS: &[(&str, Statement)] = &[
    ("annualTotalRevenue", Statement::Income),
    ("annualOperatingRevenue", Statement::Income),
    ("annualOperatingIncome", Statement::Income),
    ("annualEBIT", Statement::Income),
    ("annualNetIncome", Statement::Income),
    ("annualNetIncomeCommonStockholders", Statement::Income),
    ("annualInterestExpense", Statement::Income),
    ("annualInterestExpenseNonOperating", Statement::Income),
    ("annualTotalDebt", Statement::Balance),
    ("annualCurrentDebt", Statement::Balance),
    ("annualLongTermDebt", Statement::Balance),
    ("annualCashAndCashEquivalents", Statement::Balance),
    ("annualStockholdersEquity", Statement::Balance),
    ("annualTotalEquityGrossMinorityInterest", Statement::Balance),
    ("annualOrdinarySharesNumber", Statement::Balance),
];

pub const MARKET_CAP_FIELD: &str = "trailingMarketCap";
pub const SHARES_ROW: &str = "Ordinary Shares Number";

/// Row names the vendor's statements use where splitting the camel case gives a different one
const RENAMED: &[(&str, &str)] = &[("annualCurrentDebt", "Short Long Term Debt")];

/// `annualCashAndCashEquivalents` -> `Cash And Cash Equivalents`, `annualEBIT` -> `EBIT`
pub fn row_name(field: &str) -> String {
    if let Some((_, name)) = RENAMED.iter().find(|(f, _)| *f == field) {
        return name.to_string();
    }

    let bare = field
        .strip_prefix("annual")
        .or_else(|| field.strip_prefix("trailing"))
        .unwrap_or(field);
    let chars: Vec<char> = bare.chars().collect();

    let mut name = String::with_capacity(bare.len() + 8);
    for (i, c) in chars.iter().enumerate() {
        if i > 0 && c.is_uppercase() {
            let prev = chars[i - 1];
            let next_lower = chars.get(i + 1).map_or(false, |n| n.is_lowercase());
            if prev.is_lowercase() || (prev.is_uppercase() && next_lower) {
                name.push(' ');
            }
        }
        name.push(*c);
    }
    name
}

/// Points of every series in a time-series payload, keyed by series type.
/// Null slots and entries without a numeric reported value are skipped.
pub fn parse_timeseries(body: &Value) -> HashMap<String, FiscalSeries> {
    let results = body
        .pointer("/timeseries/result")
        .and_then(|r| r.as_array())
        .cloned()
        .unwrap_or_default();

    let mut series = HashMap::new();
    for result in &results {
        let Some(kind) = result.pointer("/meta/type/0").and_then(|t| t.as_str()) else {
            continue;
        };
        let Some(entries) = result.get(kind).and_then(|e| e.as_array()) else {
            continue;
        };

        let points = entries.iter().filter_map(|entry| {
            let date = entry.get("asOfDate")?.as_str()?;
            let date = NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()?;
            let value = entry.pointer("/reportedValue/raw")?.as_f64()?;
            Some((date, value))
        });
        let parsed = FiscalSeries::new(points);
        if !parsed.is_empty() {
            series.insert(kind.to_string(), parsed);
        }
    }
    series
}

/// Sort parsed series into income and balance tables. A table with no rows is absent.
pub fn into_statements(series: &HashMap<String, FiscalSeries>) -> FinancialStatements {
    let mut income = StatementTable::new();
    let mut balance = StatementTable::new();

    for (field, statement) in ANNUAL_FIELDS {
        let Some(points) = series.get(*field) else {
            continue;
        };
        let table = match statement {
            Statement::Income => &mut income,
            Statement::Balance => &mut balance,
        };
        table.insert(row_name(field), points.clone());
    }

    let non_empty = |table: StatementTable| (!table.is_empty()).then_some(table);
    FinancialStatements {
        income: non_empty(income),
        balance: non_empty(balance),
    }
}
