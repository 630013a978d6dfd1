//! Raw parameter records: one operating point keyed by original parameter name

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A single raw parameter value.
///
/// Numeric parameters carry `Numeric`, categorical parameters carry
/// `Categorical`. Deserializes untagged, so `150.5` and `"A1B2"` both work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    /// Continuous operating value (temperature, pressure, ...)
    Numeric(f64),
    /// Symbolic value (pattern code, steel grade, ...)
    Categorical(String),
}

impl ParamValue {
    /// Numeric view of the value. Text that parses as a number is accepted.
    pub fn as_numeric(&self) -> Option<f64> {
        match self {
            Self::Numeric(v) => Some(*v),
            Self::Categorical(s) => s.trim().parse().ok(),
        }
    }

    /// Level label used for one-hot encoding.
    ///
    /// Numbers use their shortest display form, so `101.0` encodes as `"101"`.
    pub fn as_level(&self) -> String {
        match self {
            Self::Numeric(v) => format!("{v}"),
            Self::Categorical(s) => s.clone(),
        }
    }
}

impl std::fmt::Display for ParamValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Numeric(v) => write!(f, "{v}"),
            Self::Categorical(s) => write!(f, "{s}"),
        }
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        Self::Numeric(v)
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        Self::Categorical(v.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(v: String) -> Self {
        Self::Categorical(v)
    }
}

/// One operating point: original parameter name → value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParamRecord {
    values: BTreeMap<String, ParamValue>,
}

impl ParamRecord {
    /// Create an empty record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.insert(name, value);
        self
    }

    /// Insert or replace a value.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<ParamValue>) {
        self.values.insert(name.into(), value.into());
    }

    /// Look up a value by parameter name.
    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.values.get(name)
    }

    /// True when the record holds a value for `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// Number of parameters set.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// True when no parameter is set.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterate `(name, value)` pairs in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Overlay `other` on top of `self`; values in `other` win.
    pub fn merge(&mut self, other: &Self) {
        for (k, v) in &other.values {
            self.values.insert(k.clone(), v.clone());
        }
    }
}

impl<K: Into<String>, V: Into<ParamValue>> FromIterator<(K, V)> for ParamRecord {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}
