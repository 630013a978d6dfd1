//! Parameter domains observed in training data

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Domain of one parameter: a closed numeric interval or a finite set.
///
/// Serialized in the same shape the training step writes:
/// `{"min": 1.0, "max": 2.0}` or `{"values": ["A", "B"]}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamRange {
    /// Closed interval `[min, max]`
    Numeric {
        /// Lower bound (observed minimum)
        min: f64,
        /// Upper bound (observed maximum)
        max: f64,
    },
    /// Enumerated allowed values
    Categorical {
        /// Observed unique values
        values: Vec<String>,
    },
}

impl ParamRange {
    /// Numeric interval constructor.
    pub fn numeric(min: f64, max: f64) -> Self {
        Self::Numeric { min, max }
    }

    /// Categorical set constructor.
    pub fn categorical<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Categorical {
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    /// True for the numeric variant.
    pub const fn is_numeric(&self) -> bool {
        matches!(self, Self::Numeric { .. })
    }

    /// Interval bounds, if numeric.
    pub const fn bounds(&self) -> Option<(f64, f64)> {
        match self {
            Self::Numeric { min, max } => Some((*min, *max)),
            Self::Categorical { .. } => None,
        }
    }

    /// Allowed values, if categorical.
    pub fn values(&self) -> Option<&[String]> {
        match self {
            Self::Numeric { .. } => None,
            Self::Categorical { values } => Some(values),
        }
    }

    /// Describe why this range is unusable, if it is.
    pub(crate) fn defect(&self) -> Option<String> {
        match self {
            Self::Numeric { min, max } => {
                if !min.is_finite() || !max.is_finite() {
                    Some(format!("bounds must be finite (got min={min}, max={max})"))
                } else if min > max {
                    Some(format!("min ({min}) must be <= max ({max})"))
                } else {
                    None
                }
            }
            Self::Categorical { values } => {
                if values.is_empty() {
                    Some("categorical domain has no values".to_string())
                } else {
                    None
                }
            }
        }
    }
}

/// Per-parameter domain map, keyed by original parameter name.
pub type ParamDomains = BTreeMap<String, ParamRange>;
