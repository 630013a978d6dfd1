//! Encoded model input and ensemble prediction output

use serde::{Deserialize, Serialize};

/// Ensemble output for one encoded row.
///
/// `dispersion` is the population standard deviation of per-tree outputs,
/// used as a stability proxy: it measures disagreement among trees, not a
/// probabilistic interval.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    /// Arithmetic mean of per-tree outputs
    pub mean: f64,
    /// Population standard deviation of per-tree outputs (>= 0)
    pub dispersion: f64,
}

/// Row-major matrix of encoded feature rows.
///
/// Every row has exactly `width` columns, in artifact column order.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedMatrix {
    width: usize,
    rows: usize,
    data: Vec<f64>,
}

impl EncodedMatrix {
    /// All-zero matrix with `rows` rows.
    pub fn zeros(rows: usize, width: usize) -> Self {
        Self {
            width,
            rows,
            data: vec![0.0; rows * width],
        }
    }

    /// Empty matrix with room for `rows` rows.
    pub fn with_capacity(rows: usize, width: usize) -> Self {
        Self {
            width,
            rows: 0,
            data: Vec::with_capacity(rows * width),
        }
    }

    /// Single-row matrix wrapping `row`.
    pub fn from_row(row: &[f64]) -> Self {
        Self {
            width: row.len(),
            rows: 1,
            data: row.to_vec(),
        }
    }

    /// Number of columns.
    pub const fn width(&self) -> usize {
        self.width
    }

    /// Number of rows.
    pub const fn rows(&self) -> usize {
        self.rows
    }

    /// True when the matrix has no rows.
    pub const fn is_empty(&self) -> bool {
        self.rows == 0
    }

    /// Borrow row `i`.
    pub fn row(&self, i: usize) -> &[f64] {
        &self.data[i * self.width..(i + 1) * self.width]
    }

    /// Mutably borrow row `i`.
    pub fn row_mut(&mut self, i: usize) -> &mut [f64] {
        &mut self.data[i * self.width..(i + 1) * self.width]
    }

    /// Append a row. `row.len()` must equal `width`.
    pub fn push_row(&mut self, row: &[f64]) {
        debug_assert_eq!(row.len(), self.width);
        self.data.extend_from_slice(row);
        self.rows += 1;
    }

    /// Drop all rows, keeping the allocation.
    pub fn clear(&mut self) {
        self.data.clear();
        self.rows = 0;
    }

    /// Iterate rows in order.
    pub fn iter_rows(&self) -> impl Iterator<Item = &[f64]> {
        (0..self.rows).map(move |i| self.row(i))
    }
}
