use analysis_core::MetricId;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Comparison a metric value must satisfy against its threshold
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    AtLeast,
    AtMost,
}

impl Direction {
    /// Both directions are inclusive at the boundary.
    pub fn holds(&self, value: f64, threshold: f64) -> bool {
        match self {
            Direction::AtLeast => value >= threshold,
            Direction::AtMost => value <= threshold,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ThresholdKey {
    RevCagrMin,
    OpMarginMin,
    NdEqMax,
    InterestCoverMin,
    RoeMin,
}

impl ThresholdKey {
    pub const ALL: [ThresholdKey; 5] = [
        ThresholdKey::RevCagrMin,
        ThresholdKey::OpMarginMin,
        ThresholdKey::NdEqMax,
        ThresholdKey::InterestCoverMin,
        ThresholdKey::RoeMin,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ThresholdKey::RevCagrMin => "rev_cagr_min",
            ThresholdKey::OpMarginMin => "op_margin_min",
            ThresholdKey::NdEqMax => "nd_eq_max",
            ThresholdKey::InterestCoverMin => "interest_cover_min",
            ThresholdKey::RoeMin => "roe_min",
        }
    }

    pub fn parse(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == key)
    }

    pub fn direction(&self) -> Direction {
        match self {
            ThresholdKey::NdEqMax => Direction::AtMost,
            _ => Direction::AtLeast,
        }
    }

    pub fn default_value(&self) -> f64 {
        match self {
            ThresholdKey::RevCagrMin => 0.05,
            ThresholdKey::OpMarginMin => 0.10,
            ThresholdKey::NdEqMax => 1.0,
            ThresholdKey::InterestCoverMin => 4.0,
            ThresholdKey::RoeMin => 0.10,
        }
    }

    pub fn for_metric(metric: MetricId) -> Self {
        match metric {
            MetricId::RevCagr => ThresholdKey::RevCagrMin,
            MetricId::OpMargin => ThresholdKey::OpMarginMin,
            MetricId::NdEq => ThresholdKey::NdEqMax,
            MetricId::IntCover => ThresholdKey::InterestCoverMin,
            MetricId::Roe => ThresholdKey::RoeMin,
        }
    }
}

/// The five effective thresholds. Fraction-valued except the two multiples.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThresholdSet {
    pub rev_cagr_min: f64,
    pub op_margin_min: f64,
    pub nd_eq_max: f64,
    pub interest_cover_min: f64,
    pub roe_min: f64,
}

impl Default for ThresholdSet {
    fn default() -> Self {
        Self {
            rev_cagr_min: ThresholdKey::RevCagrMin.default_value(),
            op_margin_min: ThresholdKey::OpMarginMin.default_value(),
            nd_eq_max: ThresholdKey::NdEqMax.default_value(),
            interest_cover_min: ThresholdKey::InterestCoverMin.default_value(),
            roe_min: ThresholdKey::RoeMin.default_value(),
        }
    }
}

impl ThresholdSet {
    pub fn get(&self, key: ThresholdKey) -> f64 {
        match key {
            ThresholdKey::RevCagrMin => self.rev_cagr_min,
            ThresholdKey::OpMarginMin => self.op_margin_min,
            ThresholdKey::NdEqMax => self.nd_eq_max,
            ThresholdKey::InterestCoverMin => self.interest_cover_min,
            ThresholdKey::RoeMin => self.roe_min,
        }
    }

    fn slot(&mut self, key: ThresholdKey) -> &mut f64 {
        match key {
            ThresholdKey::RevCagrMin => &mut self.rev_cagr_min,
            ThresholdKey::OpMarginMin => &mut self.op_margin_min,
            ThresholdKey::NdEqMax => &mut self.nd_eq_max,
            ThresholdKey::InterestCoverMin => &mut self.interest_cover_min,
            ThresholdKey::RoeMin => &mut self.roe_min,
        }
    }

    /// Apply overrides on top of this set. Non-finite values are ignored, so merging
    /// the same overrides twice is the same as merging once.
    pub fn merge(&self, overrides: &ThresholdOverrides) -> ThresholdSet {
        let mut merged = *self;
        for key in ThresholdKey::ALL {
            if let Some(value) = overrides.get(key).filter(|v| v.is_finite()) {
                *merged.slot(key) = value;
            }
        }
        merged
    }
}

/// Per-request overrides, one optional field per threshold
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThresholdOverrides {
    pub rev_cagr_min: Option<f64>,
    pub op_margin_min: Option<f64>,
    pub nd_eq_max: Option<f64>,
    pub interest_cover_min: Option<f64>,
    pub roe_min: Option<f64>,
}

impl ThresholdOverrides {
    pub fn get(&self, key: ThresholdKey) -> Option<f64> {
        match key {
            ThresholdKey::RevCagrMin => self.rev_cagr_min,
            ThresholdKey::OpMarginMin => self.op_margin_min,
            ThresholdKey::NdEqMax => self.nd_eq_max,
            ThresholdKey::InterestCoverMin => self.interest_cover_min,
            ThresholdKey::RoeMin => self.roe_min,
        }
    }

    /// Build overrides from loosely typed input. Unknown keys and values that are not
    /// finite JSON numbers are dropped; numeric strings count as non-numeric.
    pub fn from_loose(raw: &Map<String, Value>) -> Self {
        let mut overrides = Self::default();
        for (name, value) in raw {
            let Some(key) = ThresholdKey::parse(name) else {
                continue;
            };
            let parsed = match value {
                Value::Number(n) => n.as_f64(),
                _ => None,
            };
            let Some(parsed) = parsed.filter(|v| v.is_finite()) else {
                continue;
            };
            match key {
                ThresholdKey::RevCagrMin => overrides.rev_cagr_min = Some(parsed),
                ThresholdKey::OpMarginMin => overrides.op_margin_min = Some(parsed),
                ThresholdKey::NdEqMax => overrides.nd_eq_max = Some(parsed),
                ThresholdKey::InterestCoverMin => overrides.interest_cover_min = Some(parsed),
                ThresholdKey::RoeMin => overrides.roe_min = Some(parsed),
            }
        }
        overrides
    }

    pub fn is_empty(&self) -> bool {
        ThresholdKey::ALL.iter().all(|k| self.get(*k).is_none())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_defaults() {
        let set = ThresholdSet::default();
        assert_eq!(set.rev_cagr_min, 0.05);
        assert_eq!(set.nd_eq_max, 1.0);
        assert_eq!(ThresholdKey::NdEqMax.direction(), Direction::AtMost);
        assert_eq!(ThresholdKey::RoeMin.direction(), Direction::AtLeast);
    }

    #[test]
    fn test_merge_is_idempotent() {
        let overrides = ThresholdOverrides {
            op_margin_min: Some(0.2),
            nd_eq_max: Some(f64::NAN),
            ..Default::default()
        };
        let once = ThresholdSet::default().merge(&overrides);
        let twice = once.merge(&overrides);

        assert_eq!(once, twice);
        assert_eq!(once.op_margin_min, 0.2);
        assert_eq!(once.nd_eq_max, 1.0);
    }

    #[test]
    fn test_loose_overrides_ignore_junk() {
        let raw = json!({
            "roe_min": 0.2,
            "interest_cover_min": "6",
            "op_margin_min": "lots",
            "nd_eq_max": null,
            "unknown_key": 3.0
        });
        let overrides = ThresholdOverrides::from_loose(raw.as_object().unwrap());

        assert_eq!(overrides.roe_min, Some(0.2));
        assert_eq!(overrides.interest_cover_min, None);
        assert_eq!(overrides.op_margin_min, None);
        assert_eq!(overrides.nd_eq_max, None);
    }

    #[test]
    fn test_deserialize_ignores_unknown_fields() {
        let overrides: ThresholdOverrides =
            serde_json::from_str(r#"{"rev_cagr_min": 0.08, "extra": true}"#).unwrap();
        assert_eq!(overrides.rev_cagr_min, Some(0.08));
        assert!(!overrides.is_empty());
        assert!(ThresholdOverrides::default().is_empty());
    }
}
