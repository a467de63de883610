use crate::metrics::{finite, ratio_safe};
use analysis_core::{AnalysisError, CompanyInfo, LatestFigures, ProviderSnapshot, ValuationBlock, ValuationRow};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

const MISSING: &str = "—";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValuationModel {
    /// Peer EV/EBIT multiple applied to the latest operating income
    #[default]
    EvEbit,
    /// Target P/E applied to earnings per share
    Pe,
}

impl FromStr for ValuationModel {
    type Err = AnalysisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ev_ebit" | "ev/ebit" | "evebit" => Ok(ValuationModel::EvEbit),
            "pe" | "p/e" => Ok(ValuationModel::Pe),
            other => Err(AnalysisError::Config(format!("unknown valuation model '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValuationParams {
    pub model: ValuationModel,
    pub peer_ev_ebit: f64,
    pub target_pe: f64,
}

impl Default for ValuationParams {
    fn default() -> Self {
        Self {
            model: ValuationModel::EvEbit,
            peer_ev_ebit: 15.0,
            target_pe: 18.0,
        }
    }
}

/// Last close of the price history, then the info mapping's quoted prices
pub fn current_price(snapshot: &ProviderSnapshot) -> Option<f64> {
    snapshot
        .last_close()
        .or(snapshot.info.current_price)
        .or(snapshot.info.regular_market_price)
        .filter(|p| p.is_finite() && *p > 0.0)
}

/// Upside of a fair value over the current price, in percent
pub fn upside_pct(fair_value: Option<f64>, price: Option<f64>) -> Option<f64> {
    ratio_safe(fair_value, price).map(|r| (r - 1.0) * 100.0)
}

pub fn estimate(
    latest: &LatestFigures,
    info: &CompanyInfo,
    price: Option<f64>,
    params: &ValuationParams,
) -> ValuationBlock {
    match params.model {
        ValuationModel::EvEbit => ev_ebit_estimate(latest, info, price, params.peer_ev_ebit),
        ValuationModel::Pe => pe_estimate(latest, info, price, params.target_pe),
    }
}

fn ev_ebit_estimate(
    latest: &LatestFigures,
    info: &CompanyInfo,
    price: Option<f64>,
    peer_multiple: f64,
) -> ValuationBlock {
    let shares = info.shares_outstanding.filter(|s| *s != 0.0);
    let ebit = latest.operating_income;

    let ev = match (info.market_cap, latest.total_debt, latest.cash) {
        (Some(market_cap), Some(debt), Some(cash)) => finite(market_cap + debt - cash),
        _ => None,
    };
    let ev_ebit = ratio_safe(ev, ebit);

    let fair_equity = ebit
        .map(|ebit| peer_multiple * ebit - latest.total_debt.unwrap_or(0.0) + latest.cash.unwrap_or(0.0))
        .or_else(|| match (shares, price) {
            (Some(_), Some(_)) => info.market_cap,
            _ => None,
        });
    let fair_value = ratio_safe(fair_equity, shares);
    let upside = upside_pct(fair_value, price);

    ValuationBlock {
        table: vec![
            ValuationRow::new("Current Price", money(price)),
            ValuationRow::new("EV/EBIT", multiple(ev_ebit)).with_note("EV = MarketCap + Debt – Cash"),
            ValuationRow::new("Peer EV/EBIT (assumed)", format!("{:.1}x", peer_multiple))
                .with_note("Adjust per sector"),
            ValuationRow::new("Fair Value (per share)", money(fair_value)),
            ValuationRow::new("Upside", percent(upside)),
        ],
        fair_value,
        current_price: price,
        upside_pct: upside,
    }
}

fn pe_estimate(
    latest: &LatestFigures,
    info: &CompanyInfo,
    price: Option<f64>,
    target_pe: f64,
) -> ValuationBlock {
    let trailing_pe = info.trailing_pe.filter(|pe| *pe > 0.0);
    let eps = match trailing_pe {
        Some(_) => ratio_safe(price, trailing_pe),
        None => ratio_safe(latest.net_income, info.shares_outstanding),
    };

    let fair_value = eps.filter(|e| *e > 0.0).and_then(|e| finite(e * target_pe));
    let upside = upside_pct(fair_value, price);

    ValuationBlock {
        table: vec![
            ValuationRow::new("Current Price", money(price)),
            ValuationRow::new("P/E", multiple(ratio_safe(price, eps))).with_note("Price to Earnings"),
            ValuationRow::new("Target P/E", format!("{:.1}x", target_pe)),
            ValuationRow::new("Fair Value (per share)", money(fair_value)),
            ValuationRow::new("Upside", percent(upside)),
        ],
        fair_value,
        current_price: price,
        upside_pct: upside,
    }
}

pub fn money(value: Option<f64>) -> String {
    value.map_or_else(|| MISSING.to_string(), |v| format!("${:.2}", v))
}

pub fn multiple(value: Option<f64>) -> String {
    value.map_or_else(|| MISSING.to_string(), |v| format!("{:.1}x", v))
}

pub fn percent(value: Option<f64>) -> String {
    value.map_or_else(|| MISSING.to_string(), |v| format!("{:.1}%", v))
}
