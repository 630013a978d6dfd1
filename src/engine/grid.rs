//! Exhaustive Grid Simulation over Numeric Parameters
//!
//! Evaluates the ensemble over the full cartesian product of per-parameter
//! value grids and ranks every point by stability and by distance to a
//! target outcome.
//!
//! ## Key Features
//!
//! - **Hard ceiling** checked before any prediction: an oversized grid fails
//!   with `ResourceLimit` and costs nothing
//! - **Soft threshold** that only logs a warning
//! - **Chunked evaluation**: rows are encoded and predicted `chunk_rows` at a
//!   time, so memory stays bounded regardless of grid size
//! - Row-major generation order (last axis varies fastest)

use std::collections::HashSet;

use tracing::{debug, info, warn};

use super::aggregator::Predictor;
use super::aligner::FeatureAligner;
use crate::config::defaults;
use crate::error::{EngineError, Result};
use crate::types::{EncodedMatrix, GridRow, GridTable, ParamRange, ParamRecord};

// ============================================================================
// Axes and limits
// ============================================================================

/// One gridded numeric parameter and its candidate values.
#[derive(Debug, Clone, PartialEq)]
pub struct GridAxis {
    /// Original parameter name
    pub name: String,
    /// Candidate values, in generation order
    pub values: Vec<f64>,
}

impl GridAxis {
    /// Axis with explicit values.
    pub fn new(name: impl Into<String>, values: Vec<f64>) -> Self {
        Self {
            name: name.into(),
            values,
        }
    }

    /// `points` evenly spaced values spanning `[min, max]`, both included.
    ///
    /// A single point yields `min`.
    pub fn linspace(name: impl Into<String>, min: f64, max: f64, points: usize) -> Result<Self> {
        let name = name.into();
        if points == 0 {
            return Err(EngineError::config(format!("axis '{name}' needs at least one point")));
        }
        if !min.is_finite() || !max.is_finite() || min > max {
            return Err(EngineError::config(format!(
                "axis '{name}' has invalid bounds [{min}, {max}]"
            )));
        }
        let values = if points == 1 {
            vec![min]
        } else {
            let step = (max - min) / (points - 1) as f64;
            (0..points)
                .map(|i| if i == points - 1 { max } else { min + step * i as f64 })
                .collect()
        };
        Ok(Self { name, values })
    }

    /// Axis spanning a numeric domain.
    pub fn from_domain(name: impl Into<String>, range: &ParamRange, points: usize) -> Result<Self> {
        let name = name.into();
        let (min, max) = range.bounds().ok_or_else(|| {
            EngineError::config(format!("axis '{name}' must have a numeric domain"))
        })?;
        Self::linspace(name, min, max, points)
    }

    /// Number of values.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// True when the axis has no values.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Resource bounds for one simulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridLimits {
    /// Above this many combinations a warning is logged
    pub warn_combinations: u64,
    /// Above this many combinations the request is refused
    pub max_combinations: u64,
    /// Rows encoded and predicted per batch
    pub chunk_rows: usize,
}

impl Default for GridLimits {
    fn default() -> Self {
        Self {
            warn_combinations: defaults::GRID_WARN_COMBINATIONS,
            max_combinations: defaults::GRID_MAX_COMBINATIONS,
            chunk_rows: defaults::GRID_CHUNK_ROWS,
        }
    }
}

/// A grid simulation request.
#[derive(Debug, Clone)]
pub struct GridRequest {
    /// Gridded numeric parameters
    pub axes: Vec<GridAxis>,
    /// Values for every other required parameter
    pub base: ParamRecord,
    /// Outcome the error column is measured against
    pub target: f64,
}

/// Size of the cartesian product of `axes`, saturating at `u128::MAX`.
pub fn combination_count(axes: &[GridAxis]) -> u128 {
    axes.iter()
        .fold(1u128, |acc, a| acc.saturating_mul(a.len() as u128))
}

// ============================================================================
// Simulator
// ============================================================================

/// Runs grid simulations against a predictor.
pub struct GridSimulator<'a, P: Predictor> {
    aligner: &'a FeatureAligner<'a>,
    predictor: &'a P,
    limits: GridLimits,
}

impl<'a, P: Predictor> GridSimulator<'a, P> {
    /// Simulator with default limits.
    pub fn new(aligner: &'a FeatureAligner<'a>, predictor: &'a P) -> Self {
        Self {
            aligner,
            predictor,
            limits: GridLimits::default(),
        }
    }

    /// Override the resource limits.
    #[must_use]
    pub const fn with_limits(mut self, limits: GridLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Evaluate every grid point.
    ///
    /// # Errors
    /// - `Configuration` for empty, duplicate, non-numeric or unknown axes,
    ///   a non-finite target, or a base record missing a required parameter
    /// - `ResourceLimit` when the grid exceeds the hard ceiling (no
    ///   prediction is made)
    pub fn simulate(&self, request: &GridRequest) -> Result<GridTable> {
        let axis_columns = self.check_axes(request)?;
        if !request.target.is_finite() {
            return Err(EngineError::config("grid target must be finite"));
        }
        if self.predictor.width() != self.aligner.width() {
            return Err(EngineError::config(format!(
                "predictor width {} does not match layout width {}",
                self.predictor.width(),
                self.aligner.width()
            )));
        }

        let combinations = combination_count(&request.axes);
        if combinations > u128::from(self.limits.max_combinations) {
            return Err(EngineError::ResourceLimit {
                combinations,
                ceiling: self.limits.max_combinations,
            });
        }
        if combinations > u128::from(self.limits.warn_combinations) {
            warn!(
                combinations = %combinations,
                threshold = self.limits.warn_combinations,
                "Large grid requested, simulation may take a while"
            );
        }
        // Bounded by max_combinations, which is a u64.
        let total = usize::try_from(combinations).map_err(|_| EngineError::ResourceLimit {
            combinations,
            ceiling: self.limits.max_combinations,
        })?;

        // Encode the base once; each grid row only overwrites axis columns.
        let mut seed_record = request.base.clone();
        for axis in &request.axes {
            seed_record.insert(axis.name.clone(), axis.values[0]);
        }
        let mut encoded = self.aligner.align(&seed_record)?;

        info!(
            axes = request.axes.len(),
            combinations = total,
            target = request.target,
            "Starting grid simulation"
        );

        let chunk_rows = self.limits.chunk_rows.max(1);
        let width = encoded.len();
        let mut rows = Vec::with_capacity(total);
        let mut chunk = EncodedMatrix::with_capacity(chunk_rows.min(total), width);
        let mut chunk_values: Vec<Vec<f64>> = Vec::with_capacity(chunk_rows.min(total));
        let mut odometer = vec![0usize; request.axes.len()];

        for _ in 0..total {
            let mut point = Vec::with_capacity(request.axes.len());
            for ((axis, &col), &idx) in request.axes.iter().zip(&axis_columns).zip(&odometer) {
                let v = axis.values[idx];
                encoded[col] = v;
                point.push(v);
            }
            chunk.push_row(&encoded);
            chunk_values.push(point);

            if chunk.rows() == chunk_rows {
                self.flush(&mut chunk, &mut chunk_values, request.target, &mut rows)?;
            }
            advance(&mut odometer, &request.axes);
        }
        if !chunk.is_empty() {
            self.flush(&mut chunk, &mut chunk_values, request.target, &mut rows)?;
        }

        info!(rows = rows.len(), "Grid simulation complete");
        Ok(GridTable {
            axes: request.axes.iter().map(|a| a.name.clone()).collect(),
            target: request.target,
            rows,
        })
    }

    /// Resolve axis names to encoded columns, rejecting bad axes.
    fn check_axes(&self, request: &GridRequest) -> Result<Vec<usize>> {
        if request.axes.is_empty() {
            return Err(EngineError::config("grid needs at least one axis"));
        }
        let layout = self.aligner.layout();
        let mut seen = HashSet::new();
        let mut columns = Vec::with_capacity(request.axes.len());
        for axis in &request.axes {
            if !seen.insert(axis.name.as_str()) {
                return Err(EngineError::config(format!("axis '{}' listed twice", axis.name)));
            }
            let col = layout.numeric_column(&axis.name).ok_or_else(|| {
                EngineError::config(format!(
                    "axis '{}' is not a numeric parameter of the model",
                    axis.name
                ))
            })?;
            if axis.is_empty() {
                return Err(EngineError::config(format!("axis '{}' has no values", axis.name)));
            }
            if axis.values.iter().any(|v| !v.is_finite()) {
                return Err(EngineError::config(format!(
                    "axis '{}' has non-finite values",
                    axis.name
                )));
            }
            columns.push(col);
        }
        Ok(columns)
    }

    fn flush(
        &self,
        chunk: &mut EncodedMatrix,
        values: &mut Vec<Vec<f64>>,
        target: f64,
        out: &mut Vec<GridRow>,
    ) -> Result<()> {
        let predictions = self.predictor.predict_batch(chunk)?;
        debug!(rows = predictions.len(), done = out.len(), "Grid chunk evaluated");
        for (point, p) in values.drain(..).zip(predictions) {
            let target_error = (p.mean - target).abs();
            out.push(GridRow {
                values: point,
                mean: p.mean,
                dispersion: p.dispersion,
                target_error,
                score: target_error + p.dispersion,
            });
        }
        chunk.clear();
        Ok(())
    }
}

/// Step a mixed-radix counter, last digit fastest.
fn advance(odometer: &mut [usize], axes: &[GridAxis]) {
    for (digit, axis) in odometer.iter_mut().zip(axes).rev() {
        *digit += 1;
        if *digit < axis.len() {
            return;
        }
        *digit = 0;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::model::FeatureLayout;
    use crate::types::Prediction;

    /// Predicts mean = sum of the row; counts batch calls.
    struct CountingPredictor {
        width: usize,
        calls: AtomicUsize,
    }

    impl CountingPredictor {
        fn new(width: usize) -> Self {
            Self {
                width,
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl Predictor for CountingPredictor {
        fn width(&self) -> usize {
            self.width
        }

        fn predict_batch(&self, rows: &EncodedMatrix) -> Result<Vec<Prediction>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(rows
                .iter_rows()
                .map(|r| Prediction {
                    mean: r.iter().sum(),
                    dispersion: 0.1,
                })
                .collect())
        }
    }

    fn make_layout() -> FeatureLayout {
        let cols: Vec<String> = ["A", "B", "C", "Grade_X"]
            .iter()
            .map(|s| (*s).to_string())
            .collect();
        FeatureLayout::build(
            &cols,
            &["A".to_string(), "B".to_string(), "C".to_string()],
            &["Grade".to_string()],
            None,
        )
        .unwrap()
    }

    fn make_base() -> ParamRecord {
        ParamRecord::new().with("C", 100.0).with("Grade", "X")
    }

    #[test]
    fn test_linspace_includes_endpoints() {
        let axis = GridAxis::linspace("A", 0.0, 1.0, 5).unwrap();
        assert_eq!(axis.values, vec![0.0, 0.25, 0.5, 0.75, 1.0]);
        assert_eq!(GridAxis::linspace("A", 3.0, 9.0, 1).unwrap().values, vec![3.0]);
        assert!(GridAxis::linspace("A", 0.0, 1.0, 0).is_err());
    }

    #[test]
    fn test_full_product_in_row_major_order() {
        let layout = make_layout();
        let aligner = FeatureAligner::new(&layout);
        let predictor = CountingPredictor::new(layout.width());
        let sim = GridSimulator::new(&aligner, &predictor).with_limits(GridLimits {
            chunk_rows: 4,
            ..GridLimits::default()
        });
        let request = GridRequest {
            axes: vec![
                GridAxis::new("A", vec![1.0, 2.0, 3.0]),
                GridAxis::new("B", vec![10.0, 20.0, 30.0]),
            ],
            base: make_base(),
            target: 0.0,
        };

        let table = sim.simulate(&request).unwrap();
        assert_eq!(table.len(), 9);
        assert_eq!(table.rows[0].values, vec![1.0, 10.0]);
        assert_eq!(table.rows[1].values, vec![1.0, 20.0]);
        assert_eq!(table.rows[3].values, vec![2.0, 10.0]);

        let unique: HashSet<Vec<u64>> = table
            .rows
            .iter()
            .map(|r| r.values.iter().map(|v| v.to_bits()).collect())
            .collect();
        assert_eq!(unique.len(), 9);

        // 9 rows in chunks of 4
        assert_eq!(predictor.calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_score_columns() {
        let layout = make_layout();
        let aligner = FeatureAligner::new(&layout);
        let predictor = CountingPredictor::new(layout.width());
        let sim = GridSimulator::new(&aligner, &predictor);
        let request = GridRequest {
            axes: vec![GridAxis::new("A", vec![0.0])],
            base: make_base().with("B", 0.0),
            target: 200.0,
        };
        let table = sim.simulate(&request).unwrap();
        let row = &table.rows[0];
        // 0 + 0 + 100 + one-hot 1
        assert_eq!(row.mean, 101.0);
        assert!((row.target_error - 99.0).abs() < 1e-12);
        assert!((row.score - 99.1).abs() < 1e-12);
    }

    #[test]
    fn test_ceiling_refuses_without_predicting() {
        let layout = make_layout();
        let aligner = FeatureAligner::new(&layout);
        let predictor = CountingPredictor::new(layout.width());
        let sim = GridSimulator::new(&aligner, &predictor).with_limits(GridLimits {
            warn_combinations: 10,
            max_combinations: 50,
            chunk_rows: 8,
        });
        let request = GridRequest {
            axes: vec![
                GridAxis::linspace("A", 0.0, 1.0, 10).unwrap(),
                GridAxis::linspace("B", 0.0, 1.0, 10).unwrap(),
            ],
            base: make_base(),
            target: 0.0,
        };
        match sim.simulate(&request) {
            Err(EngineError::ResourceLimit {
                combinations,
                ceiling,
            }) => {
                assert_eq!(combinations, 100);
                assert_eq!(ceiling, 50);
            }
            other => panic!("expected ResourceLimit, got {other:?}"),
        }
        assert_eq!(predictor.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_grid_above_warn_threshold_still_runs_in_full() {
        let layout = make_layout();
        let aligner = FeatureAligner::new(&layout);
        let predictor = CountingPredictor::new(layout.width());
        let sim = GridSimulator::new(&aligner, &predictor).with_limits(GridLimits {
            warn_combinations: 4,
            max_combinations: 27,
            chunk_rows: 5,
        });
        let request = GridRequest {
            axes: vec![
                GridAxis::linspace("A", 0.0, 2.0, 3).unwrap(),
                GridAxis::linspace("B", 0.0, 2.0, 3).unwrap(),
                GridAxis::linspace("C", 0.0, 2.0, 3).unwrap(),
            ],
            base: ParamRecord::new().with("Grade", "X"),
            target: 0.0,
        };

        // 27 combinations: past the warning, exactly at the ceiling
        let table = sim.simulate(&request).unwrap();
        assert_eq!(table.len(), 27);
        assert_eq!(table.rows[26].values, vec![2.0, 2.0, 2.0]);
        for row in &table.rows {
            let expected: f64 = row.values.iter().sum::<f64>() + 1.0;
            assert!((row.mean - expected).abs() < 1e-12);
        }
        // 27 rows in chunks of 5
        assert_eq!(predictor.calls.load(Ordering::SeqCst), 6);
    }

    #[test]
    fn test_rejects_categorical_and_duplicate_axes() {
        let layout = make_layout();
        let aligner = FeatureAligner::new(&layout);
        let predictor = CountingPredictor::new(layout.width());
        let sim = GridSimulator::new(&aligner, &predictor);

        let categorical = GridRequest {
            axes: vec![GridAxis::new("Grade", vec![1.0])],
            base: make_base(),
            target: 0.0,
        };
        assert!(matches!(sim.simulate(&categorical), Err(EngineError::Configuration(_))));

        let duplicate = GridRequest {
            axes: vec![GridAxis::new("A", vec![1.0]), GridAxis::new("A", vec![2.0])],
            base: make_base().with("B", 0.0),
            target: 0.0,
        };
        assert!(matches!(sim.simulate(&duplicate), Err(EngineError::Configuration(_))));
    }

    #[test]
    fn test_missing_base_parameter_fails() {
        let layout = make_layout();
        let aligner = FeatureAligner::new(&layout);
        let predictor = CountingPredictor::new(layout.width());
        let sim = GridSimulator::new(&aligner, &predictor);
        let request = GridRequest {
            axes: vec![GridAxis::new("A", vec![1.0])],
            base: ParamRecord::new().with("Grade", "X"),
            target: 0.0,
        };
        assert!(matches!(sim.simulate(&request), Err(EngineError::Configuration(_))));
        assert_eq!(predictor.calls.load(Ordering::SeqCst), 0);
    }
}
