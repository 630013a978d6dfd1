//! Grid simulation output table

use serde::{Deserialize, Serialize};

/// One evaluated grid point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridRow {
    /// Axis values, in the table's axis order
    pub values: Vec<f64>,
    /// Predicted mean (`Pred_Mean`)
    pub mean: f64,
    /// Predicted dispersion (`Pred_Std`)
    pub dispersion: f64,
    /// `|mean - target|` (`Target_Error`)
    pub target_error: f64,
    /// `target_error + dispersion` (`Score`)
    pub score: f64,
}

/// Ranking applied to a grid table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GridOrder {
    /// Generation order (last axis varies fastest)
    Generated,
    /// Most stable first
    DispersionAscending,
    /// Closest to target and most stable first
    ScoreAscending,
}

/// Full grid simulation result, rows in generation order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridTable {
    /// Gridded parameter names
    pub axes: Vec<String>,
    /// Target the error column is measured against
    pub target: f64,
    /// Evaluated rows in generation order
    pub rows: Vec<GridRow>,
}

impl GridTable {
    /// Number of evaluated grid points.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// True when the grid is empty.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows in the requested order.
    ///
    /// Sorting is stable: equal keys keep generation order.
    pub fn ordered(&self, order: GridOrder) -> Vec<&GridRow> {
        let mut rows: Vec<&GridRow> = self.rows.iter().collect();
        match order {
            GridOrder::Generated => {}
            GridOrder::DispersionAscending => {
                rows.sort_by(|a, b| a.dispersion.total_cmp(&b.dispersion));
            }
            GridOrder::ScoreAscending => {
                rows.sort_by(|a, b| a.score.total_cmp(&b.score));
            }
        }
        rows
    }

    /// First `k` rows in the requested order.
    pub fn top(&self, k: usize, order: GridOrder) -> Vec<&GridRow> {
        let mut rows = self.ordered(order);
        rows.truncate(k);
        rows
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(v: f64, dispersion: f64, score: f64) -> GridRow {
        GridRow {
            values: vec![v],
            mean: 0.0,
            dispersion,
            target_error: score - dispersion,
            score,
        }
    }

    #[test]
    fn ties_keep_generation_order() {
        let table = GridTable {
            axes: vec!["Temp".into()],
            target: 0.0,
            rows: vec![row(1.0, 0.5, 2.0), row(2.0, 0.1, 2.0), row(3.0, 0.5, 1.0)],
        };

        let by_dispersion: Vec<f64> = table
            .ordered(GridOrder::DispersionAscending)
            .iter()
            .map(|r| r.values[0])
            .collect();
        assert_eq!(by_dispersion, vec![2.0, 1.0, 3.0]);

        let by_score: Vec<f64> = table
            .ordered(GridOrder::ScoreAscending)
            .iter()
            .map(|r| r.values[0])
            .collect();
        assert_eq!(by_score, vec![3.0, 1.0, 2.0]);
    }

    #[test]
    fn top_truncates() {
        let table = GridTable {
            axes: vec!["Temp".into()],
            target: 0.0,
            rows: vec![row(1.0, 0.3, 1.0), row(2.0, 0.2, 1.0), row(3.0, 0.1, 1.0)],
        };
        let top = table.top(2, GridOrder::DispersionAscending);
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].values[0], 3.0);
    }
}
