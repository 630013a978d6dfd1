//! Attribution: why a point was predicted the way it was
//!
//! Attribution algorithms work on encoded columns, but operators reason in
//! original parameters. [`explain`] folds a per-column attribution vector back
//! onto original parameters through the artifact's layout, so a one-hot block
//! reads as a single "Pattern" contribution instead of a dozen dummies.
//!
//! [`PathAttributor`] is the built-in algorithm: decision-path attribution
//! over the ensemble, exact for tree models.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};
use crate::model::{FeatureLayout, RegressionTree};

/// Per-encoded-column signed contributions plus a baseline.
///
/// `baseline + Σ columns` reconstructs the prediction being explained.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributionVector {
    /// One value per encoded column, in layout order
    pub columns: Vec<f64>,
    /// Expected model output before any feature is considered
    pub baseline: f64,
}

impl AttributionVector {
    /// Wrap column-ordered values.
    pub fn new(columns: Vec<f64>, baseline: f64) -> Self {
        Self { columns, baseline }
    }

    /// Build from values keyed by encoded column name (as external
    /// explainers report them). Columns not mentioned contribute zero.
    ///
    /// # Errors
    /// `Configuration` when a name is not an encoded column.
    pub fn from_named(
        values: &BTreeMap<String, f64>,
        baseline: f64,
        layout: &FeatureLayout,
    ) -> Result<Self> {
        let mut columns = vec![0.0; layout.width()];
        for (name, &v) in values {
            let idx = layout.column_index(name).ok_or_else(|| {
                EngineError::config(format!("attribution for unknown column '{name}'"))
            })?;
            columns[idx] = v;
        }
        Ok(Self { columns, baseline })
    }

    /// `baseline + Σ columns`.
    pub fn total(&self) -> f64 {
        self.baseline + self.columns.iter().sum::<f64>()
    }
}

/// Computes an attribution vector for one encoded row.
pub trait Attributor: Send + Sync {
    /// Attribute the model output at `row` to its encoded columns.
    fn attribute(&self, row: &[f64]) -> Result<AttributionVector>;
}

/// Decision-path attribution over a regression-tree ensemble.
///
/// Each split on a row's path credits its feature with the change in node
/// value it caused; the root value is the baseline. Averaged over the
/// ensemble, baseline plus contributions equals the ensemble mean exactly.
#[derive(Debug, Clone, Copy)]
pub struct PathAttributor<'a> {
    trees: &'a [RegressionTree],
    width: usize,
}

impl<'a> PathAttributor<'a> {
    /// Attributor over `trees` for rows of `width` columns.
    pub const fn new(trees: &'a [RegressionTree], width: usize) -> Self {
        Self { trees, width }
    }
}

impl Attributor for PathAttributor<'_> {
    fn attribute(&self, row: &[f64]) -> Result<AttributionVector> {
        if row.len() != self.width {
            return Err(EngineError::config(format!(
                "encoded input has {} columns, model expects {}",
                row.len(),
                self.width
            )));
        }
        if self.trees.is_empty() {
            return Err(EngineError::schema("ensemble has no trees"));
        }
        let mut columns = vec![0.0; self.width];
        let mut baseline = 0.0;
        for tree in self.trees {
            baseline += tree.attribute_row(row, &mut columns);
        }
        let n = self.trees.len() as f64;
        for c in &mut columns {
            *c /= n;
        }
        Ok(AttributionVector {
            columns,
            baseline: baseline / n,
        })
    }
}

/// Contribution of one original parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contribution {
    /// Original parameter name
    pub parameter: String,
    /// Signed contribution (sum over its encoded columns)
    pub value: f64,
}

/// Per-parameter explanation of one prediction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Explanation {
    /// Baseline carried over from the attribution vector
    pub baseline: f64,
    /// Contributions by descending magnitude
    pub contributions: Vec<Contribution>,
}

impl Explanation {
    /// The `k` largest contributions by magnitude.
    pub fn top(&self, k: usize) -> &[Contribution] {
        &self.contributions[..k.min(self.contributions.len())]
    }

    /// `baseline + Σ contributions`.
    pub fn total(&self) -> f64 {
        self.baseline + self.contributions.iter().map(|c| c.value).sum::<f64>()
    }

    /// Contribution of a named parameter.
    pub fn get(&self, parameter: &str) -> Option<f64> {
        self.contributions
            .iter()
            .find(|c| c.parameter == parameter)
            .map(|c| c.value)
    }
}

/// Fold a per-column attribution vector onto original parameters.
///
/// Ties in magnitude keep layout order (numeric parameters first).
///
/// # Errors
/// `Configuration` when the vector width differs from the layout width.
pub fn explain(attribution: &AttributionVector, layout: &FeatureLayout) -> Result<Explanation> {
    if attribution.columns.len() != layout.width() {
        return Err(EngineError::config(format!(
            "attribution has {} columns, layout has {}",
            attribution.columns.len(),
            layout.width()
        )));
    }
    let mut contributions: Vec<Contribution> = layout
        .slots()
        .iter()
        .map(|slot| Contribution {
            parameter: slot.name().to_string(),
            value: slot.columns().iter().map(|&c| attribution.columns[c]).sum(),
        })
        .collect();
    contributions.sort_by(|a, b| b.value.abs().total_cmp(&a.value.abs()));
    Ok(Explanation {
        baseline: attribution.baseline,
        contributions,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_layout() -> FeatureLayout {
        let cols: Vec<String> = ["Temp", "Pattern_A", "Pattern_B", "Pattern_C", "Pressure"]
            .iter()
            .map(|s| (*s).to_string())
            .collect();
        FeatureLayout::build(
            &cols,
            &["Temp".to_string(), "Pressure".to_string()],
            &["Pattern".to_string()],
            None,
        )
        .unwrap()
    }

    #[test]
    fn test_one_hot_block_collapses_to_parameter() {
        let layout = make_layout();
        let attr = AttributionVector::new(vec![0.5, 0.1, -0.4, 0.05, 0.2], 3.0);
        let exp = explain(&attr, &layout).unwrap();
        assert_eq!(exp.contributions.len(), 3);
        assert_eq!(exp.contributions[0].parameter, "Temp");
        assert!((exp.get("Pattern").unwrap() - (-0.25)).abs() < 1e-12);
        assert_eq!(exp.top(2).len(), 2);
        assert_eq!(exp.top(10).len(), 3);
        assert!((exp.total() - attr.total()).abs() < 1e-12);
    }

    #[test]
    fn test_from_named_rejects_unknown_column() {
        let layout = make_layout();
        let mut values = BTreeMap::new();
        values.insert("Pattern_B".to_string(), 1.0);
        let attr = AttributionVector::from_named(&values, 0.0, &layout).unwrap();
        assert_eq!(attr.columns, vec![0.0, 0.0, 1.0, 0.0, 0.0]);

        values.insert("Humidity".to_string(), 1.0);
        assert!(matches!(
            AttributionVector::from_named(&values, 0.0, &layout),
            Err(EngineError::Configuration(_))
        ));
    }

    #[test]
    fn test_width_mismatch_rejected() {
        let layout = make_layout();
        let attr = AttributionVector::new(vec![0.0; 3], 0.0);
        assert!(explain(&attr, &layout).is_err());
    }

    #[test]
    fn test_path_attribution_reconstructs_mean() {
        let trees = vec![
            RegressionTree::stump(0, 150.0, 1.0, 2.0),
            RegressionTree::stump(2, 0.5, 4.0, 8.0),
            RegressionTree::constant(3.0),
        ];
        let attributor = PathAttributor::new(&trees, 5);
        let row = [160.0, 0.0, 1.0, 0.0, 2.0];
        let attr = attributor.attribute(&row).unwrap();
        let mean = (2.0 + 8.0 + 3.0) / 3.0;
        assert!((attr.total() - mean).abs() < 1e-12);

        let exp = explain(&attr, &make_layout()).unwrap();
        assert!((exp.total() - mean).abs() < 1e-12);
        assert_eq!(exp.get("Pressure"), Some(0.0));
    }
}
