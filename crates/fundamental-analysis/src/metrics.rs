//! Pure metric helpers. Every function returns `None` instead of failing when its
//! inputs are absent or the arithmetic is undefined.

use analysis_core::FiscalSeries;

/// First and last observation of a lookback window over a series
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Window {
    pub first: f64,
    pub last: f64,
    /// Effective window length in periods; may be shorter than requested
    pub years: usize,
}

/// Compound annual growth rate, `(last/first)^(1/years) - 1`.
pub fn cagr(first: Option<f64>, last: Option<f64>, years: f64) -> Option<f64> {
    let (first, last) = (first?, last?);
    if first <= 0.0 || years <= 0.0 || !years.is_finite() {
        return None;
    }
    finite((last / first).powf(1.0 / years) - 1.0)
}

/// `numerator / denominator`, absent when either side is absent or the denominator is zero.
pub fn ratio_safe(numerator: Option<f64>, denominator: Option<f64>) -> Option<f64> {
    let (numerator, denominator) = (numerator?, denominator?);
    if denominator == 0.0 {
        return None;
    }
    finite(numerator / denominator)
}

/// Mean of the last `n` observations
pub fn avg_last_n(series: Option<&FiscalSeries>, n: usize) -> Option<f64> {
    let series = series?;
    if n == 0 || series.is_empty() {
        return None;
    }
    let tail = &series.points()[series.len().saturating_sub(n)..];
    finite(tail.iter().map(|p| p.value).sum::<f64>() / tail.len() as f64)
}

/// Clamp the requested lookback to `min(years, len - 1)` and return the window's endpoints.
pub fn windowed_first_last(series: Option<&FiscalSeries>, years: usize) -> Option<Window> {
    let series = series?;
    if series.len() < 2 {
        return None;
    }
    let window = years.min(series.len() - 1);
    if window == 0 {
        return None;
    }
    let points = series.points();
    Some(Window {
        first: points[points.len() - 1 - window].value,
        last: points[points.len() - 1].value,
        years: window,
    })
}

pub fn last_value(series: Option<&FiscalSeries>) -> Option<f64> {
    series.and_then(FiscalSeries::last_value)
}

pub(crate) fn finite(value: f64) -> Option<f64> {
    value.is_finite().then_some(value)
}
