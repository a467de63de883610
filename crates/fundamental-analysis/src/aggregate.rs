use analysis_core::{MetricId, ScoreItem, ScoreUnit, Verdict};
use std::collections::BTreeMap;

/// Reduce per-company scorecards into one industry scorecard.
///
/// Each verdict maps to its ordinal (green=2, amber=1, red=0), is averaged per metric
/// across the constituents that reported it, then re-bucketed. Metrics nobody reported
/// are omitted. The result does not depend on the order of `scorecards`.
pub fn aggregate_scorecards<'a, I>(scorecards: I) -> Vec<ScoreItem>
where
    I: IntoIterator<Item = &'a [ScoreItem]>,
{
    let mut tallies: BTreeMap<MetricId, (u32, usize)> = BTreeMap::new();
    for card in scorecards {
        for item in card {
            let tally = tallies.entry(item.id).or_insert((0, 0));
            tally.0 += u32::from(item.verdict.ordinal());
            tally.1 += 1;
        }
    }

    tallies
        .into_iter()
        .map(|(metric, (total, count))| {
            let average = f64::from(total) / count as f64;
            ScoreItem {
                id: metric,
                label: metric.label().to_string(),
                verdict: Verdict::from_average(average),
                detail: Some(format!(
                    "Average score {:.2} across {} {}",
                    average,
                    count,
                    if count == 1 { "company" } else { "companies" }
                )),
                value: Some(average),
                threshold: None,
                unit: ScoreUnit::Score,
            }
        })
        .collect()
}

/// Median of the finite values; `None` for an empty input.
pub fn median<I>(values: I) -> Option<f64>
where
    I: IntoIterator<Item = f64>,
{
    let mut sorted: Vec<f64> = values.into_iter().filter(|v| v.is_finite()).collect();
    if sorted.is_empty() {
        return None;
    }
    sorted.sort_by(f64::total_cmp);

    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}
