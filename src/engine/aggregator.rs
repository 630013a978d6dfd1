//! Ensemble aggregation: per-tree outputs → (mean, dispersion)
//!
//! Batch evaluation walks each tree once over all rows (tree-major), so a
//! grid chunk costs `trees` passes rather than `rows × trees` calls. Trees
//! are evaluated on the rayon pool once the batch is large enough to repay
//! the scheduling overhead; results are gathered back in row order.
//!
//! Dispersion is the population standard deviation (divide by N) of the
//! per-tree outputs.

use rayon::prelude::*;
use statrs::statistics::Statistics;

use crate::error::{EngineError, Result};
use crate::model::RegressionTree;
use crate::types::{EncodedMatrix, Prediction};

/// Rows × trees below which trees are evaluated on the calling thread.
pub const DEFAULT_PARALLEL_THRESHOLD: usize = 4_096;

/// Anything that turns encoded rows into ensemble predictions.
///
/// The grid simulator and the search are written against this trait so
/// they can be driven by stand-in predictors in tests.
pub trait Predictor: Send + Sync {
    /// Encoded width accepted by this predictor.
    fn width(&self) -> usize;

    /// Predict every row of `rows`, in row order.
    fn predict_batch(&self, rows: &EncodedMatrix) -> Result<Vec<Prediction>>;

    /// Predict a single encoded row.
    fn predict(&self, row: &[f64]) -> Result<Prediction> {
        self.predict_batch(&EncodedMatrix::from_row(row))?
            .into_iter()
            .next()
            .ok_or_else(|| EngineError::config("predictor returned no output for a single row"))
    }
}

/// Mean and population standard deviation of per-tree outputs.
pub fn summarize(outputs: &[f64]) -> Prediction {
    let mean = outputs.iter().mean();
    let dispersion = if outputs.len() < 2 {
        0.0
    } else {
        outputs.iter().population_std_dev().max(0.0)
    };
    Prediction { mean, dispersion }
}

/// Regression-tree ensemble predictor.
#[derive(Debug, Clone, Copy)]
pub struct EnsembleAggregator<'a> {
    trees: &'a [RegressionTree],
    width: usize,
    parallel_threshold: usize,
}

impl<'a> EnsembleAggregator<'a> {
    /// Aggregator over `trees` accepting rows of `width` columns.
    pub const fn new(trees: &'a [RegressionTree], width: usize) -> Self {
        Self {
            trees,
            width,
            parallel_threshold: DEFAULT_PARALLEL_THRESHOLD,
        }
    }

    /// Override the rows × trees size above which trees run in parallel.
    #[must_use]
    pub const fn with_parallel_threshold(mut self, threshold: usize) -> Self {
        self.parallel_threshold = threshold;
        self
    }

    /// Number of trees.
    pub const fn len(&self) -> usize {
        self.trees.len()
    }

    /// True for an empty ensemble.
    pub const fn is_empty(&self) -> bool {
        self.trees.is_empty()
    }

    /// Raw per-tree outputs, tree-major: `out[t][r]`.
    pub fn tree_outputs(&self, rows: &EncodedMatrix) -> Result<Vec<Vec<f64>>> {
        self.check_width(rows)?;
        let work = rows.rows().saturating_mul(self.trees.len());
        let outputs = if work >= self.parallel_threshold && self.trees.len() > 1 {
            self.trees.par_iter().map(|t| t.predict_rows(rows)).collect()
        } else {
            self.trees.iter().map(|t| t.predict_rows(rows)).collect()
        };
        Ok(outputs)
    }

    fn check_width(&self, rows: &EncodedMatrix) -> Result<()> {
        if rows.width() == self.width {
            Ok(())
        } else {
            Err(EngineError::config(format!(
                "encoded input has {} columns, model expects {}",
                rows.width(),
                self.width
            )))
        }
    }
}

impl Predictor for EnsembleAggregator<'_> {
    fn width(&self) -> usize {
        self.width
    }

    fn predict_batch(&self, rows: &EncodedMatrix) -> Result<Vec<Prediction>> {
        if self.trees.is_empty() {
            return Err(EngineError::schema("ensemble has no trees"));
        }
        let outputs = self.tree_outputs(rows)?;
        let mut scratch = vec![0.0; outputs.len()];
        let predictions = (0..rows.rows())
            .map(|r| {
                for (slot, tree_out) in scratch.iter_mut().zip(&outputs) {
                    *slot = tree_out[r];
                }
                summarize(&scratch)
            })
            .collect();
        Ok(predictions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_constant_trees(values: &[f64]) -> Vec<RegressionTree> {
        values.iter().map(|&v| RegressionTree::constant(v)).collect()
    }

    #[test]
    fn mean_and_population_dispersion() {
        let trees = make_constant_trees(&[1.0, 2.0, 3.0, 4.0]);
        let agg = EnsembleAggregator::new(&trees, 1);
        let p = agg.predict(&[0.0]).unwrap();
        assert!((p.mean - 2.5).abs() < 1e-12);
        assert!((p.dispersion - 1.25_f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn single_tree_has_zero_dispersion() {
        let trees = make_constant_trees(&[7.0]);
        let p = EnsembleAggregator::new(&trees, 1).predict(&[0.0]).unwrap();
        assert_eq!(p.mean, 7.0);
        assert_eq!(p.dispersion, 0.0);
    }

    #[test]
    fn width_mismatch_is_configuration_error() {
        let trees = make_constant_trees(&[1.0]);
        let agg = EnsembleAggregator::new(&trees, 3);
        assert!(matches!(
            agg.predict(&[0.0, 0.0]),
            Err(EngineError::Configuration(_))
        ));
    }

    #[test]
    fn parallel_and_sequential_agree() {
        let trees: Vec<RegressionTree> = (0..8_i32)
            .map(|i| RegressionTree::stump(0, f64::from(i), 0.0, f64::from(i + 1)))
            .collect();
        let mut rows = EncodedMatrix::with_capacity(50, 1);
        for r in 0..50_i32 {
            rows.push_row(&[f64::from(r) * 0.2]);
        }
        let seq = EnsembleAggregator::new(&trees, 1)
            .with_parallel_threshold(usize::MAX)
            .predict_batch(&rows)
            .unwrap();
        let par = EnsembleAggregator::new(&trees, 1)
            .with_parallel_threshold(0)
            .predict_batch(&rows)
            .unwrap();
        assert_eq!(seq, par);
        assert_eq!(seq.len(), 50);
    }

    #[test]
    fn batch_matches_single_row_predictions() {
        let trees = vec![
            RegressionTree::stump(0, 1.0, 10.0, 20.0),
            RegressionTree::stump(1, 0.5, 1.0, 3.0),
        ];
        let agg = EnsembleAggregator::new(&trees, 2);
        let mut rows = EncodedMatrix::with_capacity(2, 2);
        rows.push_row(&[0.0, 1.0]);
        rows.push_row(&[2.0, 0.0]);
        let batch = agg.predict_batch(&rows).unwrap();
        assert_eq!(batch[0], agg.predict(&[0.0, 1.0]).unwrap());
        assert_eq!(batch[1], agg.predict(&[2.0, 0.0]).unwrap());
        assert!((batch[0].mean - 6.5).abs() < 1e-12);
    }
}
