use crate::thresholds::{ThresholdKey, ThresholdSet};
use analysis_core::{MetricBundle, MetricId, ScoreItem, ScoreUnit, Verdict};

pub const INSUFFICIENT_DATA: &str = "Insufficient data";

pub fn unit_for(metric: MetricId) -> ScoreUnit {
    match metric {
        MetricId::RevCagr | MetricId::OpMargin | MetricId::Roe => ScoreUnit::Pct,
        MetricId::NdEq | MetricId::IntCover => ScoreUnit::X,
    }
}

fn display(value: f64, unit: ScoreUnit) -> f64 {
    match unit {
        ScoreUnit::Pct => value * 100.0,
        _ => value,
    }
}

fn format_value(value: f64, unit: ScoreUnit) -> String {
    match unit {
        ScoreUnit::Pct => format!("{:.1}%", value * 100.0),
        ScoreUnit::X => format!("{:.2}x", value),
        ScoreUnit::Score => format!("{:.2}", value),
    }
}

/// Turn one metric value into a verdict record.
///
/// An absent value is amber with no numeric fields. A present value is green when it
/// satisfies the threshold in the metric's fixed direction, red otherwise.
pub fn score_item(metric: MetricId, value: Option<f64>, threshold: f64) -> ScoreItem {
    let unit = unit_for(metric);
    let base = ScoreItem {
        id: metric,
        label: metric.label().to_string(),
        verdict: Verdict::Amber,
        detail: Some(INSUFFICIENT_DATA.to_string()),
        value: None,
        threshold: None,
        unit,
    };

    let Some(value) = value.filter(|v| v.is_finite()) else {
        return base;
    };

    let direction = ThresholdKey::for_metric(metric).direction();
    let verdict = if direction.holds(value, threshold) {
        Verdict::Green
    } else {
        Verdict::Red
    };

    ScoreItem {
        verdict,
        detail: Some(format!(
            "{} vs threshold {}",
            format_value(value, unit),
            format_value(threshold, unit)
        )),
        value: Some(display(value, unit)),
        threshold: Some(display(threshold, unit)),
        ..base
    }
}

/// Score all five metrics in display order
pub fn build_scorecard(metrics: &MetricBundle, thresholds: &ThresholdSet) -> Vec<ScoreItem> {
    MetricId::ALL
        .into_iter()
        .map(|metric| {
            let threshold = thresholds.get(ThresholdKey::for_metric(metric));
            let mut item = score_item(metric, metrics.value(metric), threshold);
            if metric == MetricId::RevCagr && item.value.is_some() {
                if let (Some(detail), Some(window)) = (item.detail.as_mut(), metrics.cagr_window) {
                    detail.push_str(&format!(" ({}y window)", window));
                }
            }
            item
        })
        .collect()
}
