//! Metric values and their display policy

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Sub;

/// Decimal digits shown for non-integral values.
pub const DISPLAY_PRECISION: i32 = 3;

/// One cell of a summary row.
///
/// Values stay full precision; rounding happens only in [`fmt::Display`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetricValue {
    Integer(i64),
    Float(f64),
    /// Statistic over an empty bucket.
    NoData,
}

impl MetricValue {
    /// `NaN` for [`MetricValue::NoData`].
    pub fn as_f64(&self) -> f64 {
        match *self {
            MetricValue::Integer(v) => v as f64,
            MetricValue::Float(v) => v,
            MetricValue::NoData => f64::NAN,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            MetricValue::Integer(v) => Some(v),
            MetricValue::Float(v) if v.fract() == 0.0 && v.abs() < i64::MAX as f64 => Some(v as i64),
            _ => None,
        }
    }

    pub fn is_no_data(&self) -> bool {
        matches!(self, MetricValue::NoData)
    }

    /// Build from a float, mapping `NaN` to [`MetricValue::NoData`].
    pub fn from_f64(value: f64) -> Self {
        if value.is_nan() {
            MetricValue::NoData
        } else {
            MetricValue::Float(value)
        }
    }

    /// Value rounded the way it is displayed.
    pub fn rounded(&self) -> f64 {
        round_to(self.as_f64(), DISPLAY_PRECISION)
    }
}

fn round_to(value: f64, digits: i32) -> f64 {
    let scale = 10f64.powi(digits);
    (value * scale).round() / scale
}

impl From<i64> for MetricValue {
    fn from(value: i64) -> Self {
        MetricValue::Integer(value)
    }
}

impl From<usize> for MetricValue {
    fn from(value: usize) -> Self {
        MetricValue::Integer(value as i64)
    }
}

impl From<f64> for MetricValue {
    fn from(value: f64) -> Self {
        MetricValue::from_f64(value)
    }
}

impl From<Option<f64>> for MetricValue {
    fn from(value: Option<f64>) -> Self {
        value.map_or(MetricValue::NoData, MetricValue::from_f64)
    }
}

/// `self - rhs`. Two empty cells compare as no change; one empty cell has no
/// meaningful difference.
impl Sub for MetricValue {
    type Output = MetricValue;

    fn sub(self, rhs: MetricValue) -> MetricValue {
        match (self, rhs) {
            (MetricValue::NoData, MetricValue::NoData) => MetricValue::Integer(0),
            (MetricValue::NoData, _) | (_, MetricValue::NoData) => MetricValue::NoData,
            (MetricValue::Integer(a), MetricValue::Integer(b)) => {
                MetricValue::Integer(a.saturating_sub(b))
            }
            (a, b) => MetricValue::from_f64(a.as_f64() - b.as_f64()),
        }
    }
}

impl fmt::Display for MetricValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            MetricValue::Integer(v) => write!(f, "{v}"),
            MetricValue::Float(v) if v.fract() == 0.0 && v.abs() < i64::MAX as f64 => {
                write!(f, "{}", v as i64)
            }
            // Integral but past i64; `as` would saturate
            MetricValue::Float(v) if v.fract() == 0.0 => write!(f, "{v:.0}"),
            MetricValue::Float(v) if v.is_finite() => {
                let rounded = round_to(v, DISPLAY_PRECISION);
                let text = format!("{rounded:.3}");
                let text = text.trim_end_matches('0').trim_end_matches('.');
                // -0.0004 rounds to "-0"
                if text == "-0" {
                    f.write_str("0")
                } else {
                    f.write_str(text)
                }
            }
            MetricValue::Float(v) => write!(f, "{v}"),
            MetricValue::NoData => f.write_str("NaN"),
        }
    }
}
