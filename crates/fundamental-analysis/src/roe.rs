//! Historical return-on-equity series with rolling statistics, outlier flags and
//! linear trend fitting.

use analysis_core::{FiscalSeries, RoePoint};
use chrono::{Datelike, Duration, Months, NaiveDate};
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;
use std::collections::{BTreeMap, HashSet};

const MIN_AVG_EQUITY: f64 = 1e-9;
const SIGMA_FLOOR: f64 = 1e-9;
const OUTLIER_Z: f64 = 3.0;
const MIN_TREND_POINTS: usize = 3;

/// One period of ROE in percent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoeRecord {
    pub date: NaiveDate,
    pub roe: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity: Option<String>,
}

impl From<&RoeRecord> for RoePoint {
    fn from(record: &RoeRecord) -> Self {
        RoePoint {
            date: record.date,
            roe: record.roe,
        }
    }
}

/// Per-period ROE over the periods both series report.
///
/// Each period except the first uses the mean of its own and the prior aligned period's
/// equity. Periods whose average equity is zero or non-finite are omitted. Fewer than two
/// aligned periods yields an empty series.
pub fn historical_roe(
    net_income: Option<&FiscalSeries>,
    equity: Option<&FiscalSeries>,
    entity: Option<&str>,
) -> Vec<RoeRecord> {
    let (Some(net_income), Some(equity)) = (net_income, equity) else {
        return Vec::new();
    };

    let aligned: Vec<(NaiveDate, f64, f64)> = net_income
        .iter()
        .filter_map(|p| equity.value_at(p.period_end).map(|eq| (p.period_end, p.value, eq)))
        .collect();

    if aligned.len() < 2 {
        return Vec::new();
    }

    aligned
        .windows(2)
        .filter_map(|pair| {
            let (_, _, prior_equity) = pair[0];
            let (date, income, current_equity) = pair[1];
            let avg_equity = (current_equity + prior_equity) / 2.0;
            if !avg_equity.is_finite() || avg_equity.abs() < MIN_AVG_EQUITY {
                return None;
            }
            let roe = income / avg_equity * 100.0;
            roe.is_finite().then(|| RoeRecord {
                date,
                roe,
                entity: entity.map(str::to_string),
            })
        })
        .collect()
}

/// Keep the records within `years` years of the latest one
pub fn trim_to_recent_years(records: &[RoeRecord], years: u32) -> Vec<RoeRecord> {
    let Some(latest) = records.iter().map(|r| r.date).max() else {
        return Vec::new();
    };
    let Some(cutoff) = latest.checked_sub_months(Months::new(12 * years)) else {
        return records.to_vec();
    };
    records.iter().filter(|r| r.date >= cutoff).cloned().collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoeWindowConfig {
    /// Trailing calendar window for rolling statistics
    pub window_years: u32,
    pub clamp_min: f64,
    pub clamp_max: f64,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    /// Restrict to these entities when set
    pub entities: Option<Vec<String>>,
    pub trend: bool,
}

impl Default for RoeWindowConfig {
    fn default() -> Self {
        Self {
            window_years: 3,
            clamp_min: -200.0,
            clamp_max: 200.0,
            start: None,
            end: None,
            entities: None,
            trend: false,
        }
    }
}

/// ROE observation annotated with rolling statistics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoeObservation {
    pub date: NaiveDate,
    pub entity: String,
    pub roe: f64,
    pub roe_clamped: f64,
    pub clamped: bool,
    pub rolling_mean: Option<f64>,
    pub rolling_std: Option<f64>,
    pub z_score: f64,
    pub outlier: bool,
    pub fitted: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrendLine {
    /// Percentage points per year
    pub slope: f64,
    pub intercept: f64,
}

impl TrendLine {
    pub fn at(&self, date: NaiveDate) -> f64 {
        self.intercept + self.slope * fractional_year(date)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RoeAnalysis {
    pub observations: Vec<RoeObservation>,
    /// Only entities with enough observations for a fit appear here
    pub trends: BTreeMap<String, TrendLine>,
}

impl RoeAnalysis {
    pub fn outliers(&self) -> impl Iterator<Item = &RoeObservation> {
        self.observations.iter().filter(|o| o.outlier)
    }

    pub fn for_entity<'a>(&'a self, entity: &'a str) -> impl Iterator<Item = &'a RoeObservation> {
        self.observations.iter().filter(move |o| o.entity == entity)
    }
}

pub fn fractional_year(date: NaiveDate) -> f64 {
    f64::from(date.year()) + f64::from(date.ordinal0()) / 365.25
}

/// Clamp, window, flag and optionally fit a set of ROE records.
///
/// Records without an entity tag are grouped under the empty entity name.
pub fn analyze_roe(records: &[RoeRecord], config: &RoeWindowConfig) -> RoeAnalysis {
    let mut seen: HashSet<(NaiveDate, String)> = HashSet::new();
    let mut groups: BTreeMap<String, Vec<(NaiveDate, f64)>> = BTreeMap::new();

    for record in records {
        let entity = record.entity.clone().unwrap_or_default();
        if let Some(allowed) = &config.entities {
            if !allowed.contains(&entity) {
                continue;
            }
        }
        if config.start.map_or(false, |start| record.date < start)
            || config.end.map_or(false, |end| record.date > end)
            || !record.roe.is_finite()
        {
            continue;
        }
        if !seen.insert((record.date, entity.clone())) {
            continue;
        }
        groups.entry(entity).or_default().push((record.date, record.roe));
    }

    let mut analysis = RoeAnalysis::default();
    for (entity, mut points) in groups {
        points.sort_by_key(|(date, _)| *date);
        let mut observations = annotate_entity(&entity, &points, config);

        if config.trend {
            if let Some(trend) = fit_trend(&observations) {
                for obs in observations.iter_mut() {
                    obs.fitted = Some(trend.at(obs.date));
                }
                analysis.trends.insert(entity.clone(), trend);
            }
        }

        analysis.observations.extend(observations);
    }

    tracing::debug!(
        "ROE analysis: {} observations, {} outliers, {} trends",
        analysis.observations.len(),
        analysis.outliers().count(),
        analysis.trends.len()
    );
    analysis
}

fn annotate_entity(entity: &str, points: &[(NaiveDate, f64)], config: &RoeWindowConfig) -> Vec<RoeObservation> {
    let clamped: Vec<f64> = points
        .iter()
        .map(|(_, roe)| roe.max(config.clamp_min).min(config.clamp_max))
        .collect();

    let mu = clamped.as_slice().mean();
    let sigma = match clamped.as_slice().population_std_dev() {
        s if s.is_finite() && s > 0.0 => s,
        _ => SIGMA_FLOOR,
    };

    // None when the window reaches past the calendar range: every earlier point counts
    let span = Duration::try_days(365 * i64::from(config.window_years));
    let min_periods = config.window_years.max(2) as usize;

    points
        .iter()
        .zip(&clamped)
        .enumerate()
        .map(|(idx, (&(date, roe), &value))| {
            let window_start = span.and_then(|span| date.checked_sub_signed(span));
            let window: Vec<f64> = points[..=idx]
                .iter()
                .zip(&clamped)
                .filter(|((d, _), _)| window_start.map_or(true, |start| *d > start))
                .map(|(_, v)| *v)
                .collect();

            let (rolling_mean, rolling_std) = if window.len() >= min_periods {
                (
                    Some(window.as_slice().mean()),
                    Some(window.as_slice().population_std_dev()),
                )
            } else {
                (None, None)
            };

            let z_score = (value - mu) / sigma;
            RoeObservation {
                date,
                entity: entity.to_string(),
                roe,
                roe_clamped: value,
                clamped: roe < config.clamp_min || roe > config.clamp_max,
                rolling_mean,
                rolling_std,
                z_score,
                outlier: z_score.abs() > OUTLIER_Z,
                fitted: None,
            }
        })
        .collect()
}

/// Ordinary least squares of clamped ROE against fractional year
fn fit_trend(observations: &[RoeObservation]) -> Option<TrendLine> {
    if observations.len() < MIN_TREND_POINTS {
        return None;
    }
    let xs: Vec<f64> = observations.iter().map(|o| fractional_year(o.date)).collect();
    let ys: Vec<f64> = observations.iter().map(|o| o.roe_clamped).collect();
    let x_mean = xs.as_slice().mean();
    let y_mean = ys.as_slice().mean();

    let denom: f64 = xs.iter().map(|x| (x - x_mean).powi(2)).sum();
    if denom == 0.0 {
        return None;
    }
    let slope = xs
        .iter()
        .zip(&ys)
        .map(|(x, y)| (x - x_mean) * (y - y_mean))
        .sum::<f64>()
        / denom;

    Some(TrendLine {
        slope,
        intercept: y_mean - slope * x_mean,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ye(year: i32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, 12, 31).unwrap()
    }

    fn series(values: &[(i32, f64)]) -> FiscalSeries {
        FiscalSeries::new(values.iter().map(|(y, v)| (ye(*y), *v)))
    }

    fn records(entity: &str, values: &[f64]) -> Vec<RoeRecord> {
        values
            .iter()
            .enumerate()
            .map(|(i, v)| RoeRecord {
                date: ye(2010 + i as i32),
                roe: *v,
                entity: Some(entity.to_string()),
            })
            .collect()
    }

    #[test]
    fn test_roe_uses_average_equity() {
        let ni = series(&[(2021, 10.0), (2022, 12.0), (2023, 15.0)]);
        let eq = series(&[(2021, 100.0), (2022, 100.0), (2023, 150.0)]);

        let roe = historical_roe(Some(&ni), Some(&eq), Some("ACME"));
        assert_eq!(roe.len(), 2);
        assert_eq!(roe[0].date, ye(2022));
        assert!((roe[0].roe - 12.0).abs() < 1e-9);
        assert!((roe[1].roe - 12.0).abs() < 1e-9);
        assert_eq!(roe[1].entity.as_deref(), Some("ACME"));
    }

    #[test]
    fn test_single_common_period_is_empty() {
        let ni = series(&[(2021, 10.0), (2022, 12.0)]);
        let eq = series(&[(2022, 100.0), (2023, 110.0)]);
        assert!(historical_roe(Some(&ni), Some(&eq), None).is_empty());
        assert!(historical_roe(None, Some(&eq), None).is_empty());
    }

    #[test]
    fn test_zero_average_equity_is_skipped() {
        let ni = series(&[(2021, 1.0), (2022, 2.0), (2023, 3.0)]);
        let eq = series(&[(2021, 50.0), (2022, -50.0), (2023, 50.0)]);
        assert!(historical_roe(Some(&ni), Some(&eq), None).is_empty());
    }

    #[test]
    fn test_outlier_flagging_uses_entity_wide_stats() {
        let mut values = vec![10.0; 10];
        values.push(100.0);
        let analysis = analyze_roe(&records("X", &values), &RoeWindowConfig::default());

        let flagged: Vec<_> = analysis.outliers().collect();
        assert_eq!(flagged.len(), 1);
        assert_eq!(flagged[0].roe, 100.0);
        assert!((flagged[0].z_score - 10f64.sqrt()).abs() < 1e-6);
        assert!(analysis
            .observations
            .iter()
            .filter(|o| !o.outlier)
            .all(|o| o.z_score.abs() < 1.0));
    }

    #[test]
    fn test_values_are_clamped_before_statistics() {
        let analysis = analyze_roe(&records("X", &[500.0, 10.0]), &RoeWindowConfig::default());
        let first = &analysis.observations[0];
        assert_eq!(first.roe_clamped, 200.0);
        assert!(first.clamped);
        assert!(!analysis.observations[1].clamped);
    }

    #[test]
    fn test_rolling_window_is_calendar_based() {
        let mut input = records("X", &[10.0, 20.0, 30.0]);
        // a four year gap drops the earlier points out of a 3y window
        input.push(RoeRecord {
            date: ye(2016),
            roe: 40.0,
            entity: Some("X".to_string()),
        });
        input.push(RoeRecord {
            date: ye(2017),
            roe: 50.0,
            entity: Some("X".to_string()),
        });
        let analysis = analyze_roe(&input, &RoeWindowConfig::default());
        let obs = &analysis.observations;

        // 2010, 2011: below min periods
        assert_eq!(obs[0].rolling_mean, None);
        assert_eq!(obs[1].rolling_mean, None);
        assert_eq!(obs[2].rolling_mean, Some(20.0));
        // 2016 window holds only itself
        assert_eq!(obs[3].rolling_mean, None);
        // 2017 window holds 2016 and 2017, still under three periods
        assert_eq!(obs[4].rolling_mean, None);

        let two_year = RoeWindowConfig {
            window_years: 2,
            ..Default::default()
        };
        let analysis = analyze_roe(&input, &two_year);
        assert_eq!(analysis.observations[4].rolling_mean, Some(45.0));
        assert_eq!(analysis.observations[4].rolling_std, Some(5.0));
    }

    #[test]
    fn test_trend_fit_requires_three_points() {
        let mut input = records("UP", &[10.0, 12.0, 14.0, 16.0]);
        input.extend(records("SHORT", &[5.0, 6.0]));
        let config = RoeWindowConfig {
            trend: true,
            ..Default::default()
        };
        let analysis = analyze_roe(&input, &config);

        assert!(!analysis.trends.contains_key("SHORT"));
        let trend = analysis.trends["UP"];
        assert!((trend.slope - 2.0).abs() < 1e-2);
        assert!(analysis.for_entity("UP").all(|o| o.fitted.is_some()));
        assert!(analysis.for_entity("SHORT").all(|o| o.fitted.is_none()));
    }

    #[test]
    fn test_filters_and_duplicates() {
        let mut input = records("A", &[1.0, 2.0, 3.0]);
        input.push(input[0].clone());
        input.extend(records("B", &[7.0, 8.0]));

        let config = RoeWindowConfig {
            entities: Some(vec!["A".to_string()]),
            start: Some(ye(2011)),
            ..Default::default()
        };
        let analysis = analyze_roe(&input, &config);
        let dates: Vec<NaiveDate> = analysis.observations.iter().map(|o| o.date).collect();
        assert_eq!(dates, vec![ye(2011), ye(2012)]);

        let all = analyze_roe(&input, &RoeWindowConfig::default());
        assert_eq!(all.for_entity("A").count(), 3);
    }

    #[test]
    fn test_huge_window_does_not_overflow() {
        let input = records("A", &[10.0, 12.0, 14.0, 16.0]);
        for window_years in [1_000_000, u32::MAX] {
            let config = RoeWindowConfig {
                window_years,
                ..Default::default()
            };
            let analysis = analyze_roe(&input, &config);

            assert_eq!(analysis.observations.len(), 4);
            assert!(analysis.observations.iter().all(|o| o.rolling_mean.is_none()));
            assert!(analysis.outliers().next().is_none());
        }
    }

    #[test]
    fn test_trim_to_recent_years() {
        let input = records("A", &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0]);
        let trimmed = trim_to_recent_years(&input, 5);
        assert_eq!(trimmed.len(), 6);
        assert_eq!(trimmed[0].date, ye(2011));
        assert!(trim_to_recent_years(&[], 5).is_empty());
    }
}
