//! Line-item lookup through ordered fallback names.
//!
//! Vendors name the same concept differently ("Total Debt" vs the sum of
//! "Short Long Term Debt" and "Long Term Debt"), so each concept carries an ordered
//! candidate list. The first candidate that resolves wins.

use analysis_core::{AnalysisError, FinancialStatements, FiscalSeries, Statement, StatementTable};
use serde::{Deserialize, Serialize};

/// Canonical financial concepts the analytics consume
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Concept {
    Revenue,
    OperatingIncome,
    NetIncome,
    InterestExpense,
    TotalDebt,
    Cash,
    Equity,
}

/// A single line item, or the period-aligned sum of several
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Candidate {
    Row(String),
    Sum(Vec<String>),
}

impl Candidate {
    fn row(name: &str) -> Self {
        Candidate::Row(name.to_string())
    }

    fn sum(names: &[&str]) -> Self {
        Candidate::Sum(names.iter().map(|n| n.to_string()).collect())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConceptRule {
    pub concept: Concept,
    pub statement: Statement,
    pub candidates: Vec<Candidate>,
}

/// Versioned fallback-name configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FallbackSchema {
    pub version: u32,
    pub rules: Vec<ConceptRule>,
}

impl FallbackSchema {
    pub fn builtin() -> Self {
        use Candidate as C;
        let rule = |concept, statement, candidates| ConceptRule {
            concept,
            statement,
            candidates,
        };

        Self {
            version: 1,
            rules: vec![
                rule(
                    Concept::Revenue,
                    Statement::Income,
                    vec![C::row("Total Revenue"), C::row("Operating Revenue")],
                ),
                rule(
                    Concept::OperatingIncome,
                    Statement::Income,
                    vec![C::row("Operating Income"), C::row("EBIT")],
                ),
                rule(
                    Concept::NetIncome,
                    Statement::Income,
                    vec![C::row("Net Income"), C::row("Net Income Common Stockholders")],
                ),
                rule(
                    Concept::InterestExpense,
                    Statement::Income,
                    vec![C::row("Interest Expense"), C::row("Interest Expense Non Operating")],
                ),
                rule(
                    Concept::TotalDebt,
                    Statement::Balance,
                    vec![
                        C::row("Total Debt"),
                        C::sum(&["Short Long Term Debt", "Long Term Debt"]),
                        C::row("Long Term Debt"),
                    ],
                ),
                rule(
                    Concept::Cash,
                    Statement::Balance,
                    vec![
                        C::row("Cash And Cash Equivalents"),
                        C::row("Cash And Cash Equivalents USD"),
                        C::row("Cash"),
                    ],
                ),
                rule(
                    Concept::Equity,
                    Statement::Balance,
                    vec![
                        C::row("Total Stockholder Equity"),
                        C::row("Stockholders Equity"),
                        C::row("Total Equity Gross Minority Interest"),
                    ],
                ),
            ],
        }
    }

    pub fn from_json(raw: &str) -> Result<Self, AnalysisError> {
        let schema: FallbackSchema = serde_json::from_str(raw)
            .map_err(|e| AnalysisError::Config(format!("invalid fallback schema: {}", e)))?;
        if schema.rules.iter().any(|r| r.candidates.is_empty()) {
            return Err(AnalysisError::Config(
                "fallback schema rule without candidates".to_string(),
            ));
        }
        Ok(schema)
    }

    pub fn rule(&self, concept: Concept) -> Option<&ConceptRule> {
        self.rules.iter().find(|r| r.concept == concept)
    }
}

impl Default for FallbackSchema {
    fn default() -> Self {
        Self::builtin()
    }
}

/// Resolves canonical concepts against vendor statement tables
#[derive(Debug, Clone, Default)]
pub struct RowResolver {
    schema: FallbackSchema,
}

impl RowResolver {
    pub fn new(schema: FallbackSchema) -> Self {
        Self { schema }
    }

    pub fn schema(&self) -> &FallbackSchema {
        &self.schema
    }

    pub fn resolve(&self, statements: &FinancialStatements, concept: Concept) -> Option<FiscalSeries> {
        let rule = self.schema.rule(concept)?;
        self.resolve_in(statements.table(rule.statement), concept)
    }

    /// Resolve against a single table. An absent table resolves to `None`.
    pub fn resolve_in(&self, table: Option<&StatementTable>, concept: Concept) -> Option<FiscalSeries> {
        let table = table?;
        let rule = self.schema.rule(concept)?;

        for candidate in &rule.candidates {
            if let Some(series) = probe(table, candidate) {
                tracing::debug!("Resolved {:?} via {:?}", concept, candidate);
                return Some(series);
            }
        }

        tracing::debug!("No row matched {:?}", concept);
        None
    }
}

fn probe(table: &StatementTable, candidate: &Candidate) -> Option<FiscalSeries> {
    match candidate {
        Candidate::Row(name) => table.row(name).cloned(),
        Candidate::Sum(names) => names
            .iter()
            .filter_map(|name| table.row(name))
            .fold(None, |acc: Option<FiscalSeries>, series| match acc {
                Some(total) => Some(total.add(series)),
                None => Some(series.clone()),
            }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn series(values: &[(i32, f64)]) -> FiscalSeries {
        FiscalSeries::new(
            values
                .iter()
                .map(|(y, v)| (NaiveDate::from_ymd_opt(*y, 12, 31).unwrap(), *v)),
        )
    }

    #[test]
    fn test_first_candidate_wins() {
        let table = StatementTable::new()
            .with_row("Operating Revenue", series(&[(2023, 1.0)]))
            .with_row("Total Revenue", series(&[(2023, 2.0)]));

        let resolver = RowResolver::default();
        let revenue = resolver.resolve_in(Some(&table), Concept::Revenue).unwrap();
        assert_eq!(revenue.last_value(), Some(2.0));
    }

    #[test]
    fn test_debt_falls_back_to_summed_components() {
        let table = StatementTable::new()
            .with_row("Short Long Term Debt", series(&[(2022, 10.0), (2023, 5.0)]))
            .with_row("Long Term Debt", series(&[(2023, 100.0), (2024, 90.0)]));

        let resolver = RowResolver::default();
        let debt = resolver.resolve_in(Some(&table), Concept::TotalDebt).unwrap();
        assert_eq!(debt.values(), vec![10.0, 105.0, 90.0]);
    }

    #[test]
    fn test_summed_component_alone_is_used() {
        let table = StatementTable::new().with_row("Long Term Debt", series(&[(2023, 40.0)]));
        let debt = RowResolver::default()
            .resolve_in(Some(&table), Concept::TotalDebt)
            .unwrap();
        assert_eq!(debt.last_value(), Some(40.0));
    }

    #[test]
    fn test_absent_table_and_missing_row() {
        let resolver = RowResolver::default();
        assert!(resolver.resolve_in(None, Concept::Cash).is_none());

        let table = StatementTable::new().with_row("Goodwill", series(&[(2023, 1.0)]));
        assert!(resolver.resolve_in(Some(&table), Concept::Cash).is_none());
    }

    #[test]
    fn test_existing_but_empty_row_is_returned() {
        let table = StatementTable::new().with_row("Total Debt", FiscalSeries::empty());
        let debt = RowResolver::default().resolve_in(Some(&table), Concept::TotalDebt);
        assert_eq!(debt.map(|s| s.len()), Some(0));
    }

    #[test]
    fn test_schema_from_json() {
        let raw = r#"{
            "version": 2,
            "rules": [
                {"concept": "cash", "statement": "balance", "candidates": ["Cash Only", ["A", "B"]]}
            ]
        }"#;
        let schema = FallbackSchema::from_json(raw).unwrap();
        assert_eq!(schema.version, 2);
        assert_eq!(
            schema.rule(Concept::Cash).unwrap().candidates[1],
            Candidate::Sum(vec!["A".to_string(), "B".to_string()])
        );

        assert!(FallbackSchema::from_json("{\"version\": 1}").is_err());
    }
}
