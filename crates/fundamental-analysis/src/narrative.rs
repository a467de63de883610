use analysis_core::{BulletItem, MetricBundle, Narrative, ScoreItem, Verdict};

const STRONG_GROWTH: f64 = 0.10;
const HIGH_MARGIN: f64 = 0.20;
const SOLID_ROE: f64 = 0.15;
const HIGH_LEVERAGE: f64 = 1.0;
const LOW_COVERAGE: f64 = 4.0;

const BASE_RISK: &str = "Market volatility and sector cyclicality";
const GEOPOLITICAL_RISK: &str = "Geopolitical/export-control exposure";

fn pct(value: f64) -> String {
    format!("{:.1}%", value * 100.0)
}

/// Rule-based pros / cons / risks for one company
pub fn company_narrative(metrics: &MetricBundle, country: Option<&str>) -> Narrative {
    let mut narrative = Narrative::default();

    if let Some(cagr) = metrics.revenue_cagr.filter(|v| *v > STRONG_GROWTH) {
        narrative
            .pros
            .push(BulletItem::new(format!("Strong top-line growth (~{} CAGR)", pct(cagr))));
    }
    if let Some(margin) = metrics.operating_margin.filter(|v| *v > HIGH_MARGIN) {
        narrative
            .pros
            .push(BulletItem::new(format!("High operating margins (~{})", pct(margin))));
    }
    if let Some(roe) = metrics.roe.filter(|v| *v > SOLID_ROE) {
        narrative.pros.push(BulletItem::new(format!("Solid ROE (~{})", pct(roe))));
    }

    if let Some(leverage) = metrics.net_debt_to_equity.filter(|v| *v > HIGH_LEVERAGE) {
        narrative.cons.push(BulletItem::new(format!(
            "Leverage elevated (Net Debt/Equity ~{:.2}x)",
            leverage
        )));
    }
    if let Some(cover) = metrics.interest_coverage.filter(|v| *v < LOW_COVERAGE) {
        narrative
            .cons
            .push(BulletItem::new(format!("Low interest coverage (~{:.1}x)", cover)));
    }

    narrative.risks.push(BulletItem::new(BASE_RISK));
    if country == Some("China") {
        narrative.risks.push(BulletItem::new(GEOPOLITICAL_RISK));
    }

    narrative
}

/// Bullets for an industry, read off its aggregate scorecard. An empty aggregate
/// yields an empty narrative.
pub fn industry_narrative(aggregate: &[ScoreItem]) -> Narrative {
    let mut narrative = Narrative::default();
    if aggregate.is_empty() {
        return narrative;
    }

    for item in aggregate {
        match item.verdict {
            Verdict::Green => narrative
                .pros
                .push(BulletItem::new(format!("{} broadly healthy across peers", item.label))),
            Verdict::Red => narrative
                .cons
                .push(BulletItem::new(format!("{} weak across peers", item.label))),
            Verdict::Amber => {}
        }
    }
    narrative.risks.push(BulletItem::new(BASE_RISK));

    narrative
}

#[cfg(test)]
mod tests {
    use super::*;
    use analysis_core::MetricId;
    use crate::aggregate::aggregate_scorecards;
    use crate::scorecard::score_item;

    #[test]
    fn test_company_rules() {
        let metrics = MetricBundle {
            revenue_cagr: Some(0.12),
            operating_margin: Some(0.20),
            roe: Some(0.30),
            net_debt_to_equity: Some(1.4),
            interest_coverage: Some(2.0),
            ..Default::default()
        };
        let narrative = company_narrative(&metrics, Some("China"));

        let pros: Vec<&str> = narrative.pros.iter().map(|b| b.text.as_str()).collect();
        assert_eq!(pros, vec!["Strong top-line growth (~12.0% CAGR)", "Solid ROE (~30.0%)"]);
        assert_eq!(narrative.cons.len(), 2);
        assert_eq!(narrative.risks.len(), 2);
        assert_eq!(narrative.risks[1].text, GEOPOLITICAL_RISK);
    }

    #[test]
    fn test_absent_metrics_produce_no_bullets() {
        let narrative = company_narrative(&MetricBundle::default(), None);
        assert!(narrative.pros.is_empty());
        assert!(narrative.cons.is_empty());
        assert_eq!(narrative.risks, vec![BulletItem::new(BASE_RISK)]);
    }

    #[test]
    fn test_industry_narrative() {
        assert_eq!(industry_narrative(&[]), Narrative::default());

        let cards = [vec![
            score_item(MetricId::OpMargin, Some(0.3), 0.1),
            score_item(MetricId::Roe, Some(0.01), 0.1),
        ]];
        let aggregate = aggregate_scorecards(cards.iter().map(Vec::as_slice));
        let narrative = industry_narrative(&aggregate);
        assert_eq!(narrative.pros[0].text, "Operating margin broadly healthy across peers");
        assert_eq!(narrative.cons[0].text, "ROE weak across peers");
    }
}
