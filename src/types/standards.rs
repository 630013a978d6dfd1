//! Search trials and the standards table (the durable output)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{ParamRecord, Prediction};

/// Objective tuple of a trial; both components are minimized.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Objectives {
    /// Ensemble dispersion (lower = more stable)
    pub dispersion: f64,
    /// Negated mean (lower = faster)
    pub neg_mean: f64,
}

impl From<Prediction> for Objectives {
    fn from(p: Prediction) -> Self {
        Self {
            dispersion: p.dispersion,
            neg_mean: -p.mean,
        }
    }
}

/// One evaluated candidate within a category search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trial {
    /// Sequence number within the category (0-based)
    pub number: usize,
    /// Proposed values for the optimizable parameters
    pub params: ParamRecord,
    /// Ensemble prediction for the full candidate record
    pub prediction: Prediction,
}

impl Trial {
    /// Objective tuple `(dispersion, -mean)`.
    pub fn objectives(&self) -> Objectives {
        self.prediction.into()
    }

    /// Predicted mean.
    pub const fn mean(&self) -> f64 {
        self.prediction.mean
    }

    /// Predicted dispersion.
    pub const fn dispersion(&self) -> f64 {
        self.prediction.dispersion
    }
}

/// Recommended operating point for one category value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardsRow {
    /// Category axis value this row applies to
    pub category: String,
    /// Winning optimizable parameter values
    pub params: ParamRecord,
    /// Predicted mean at the winning point (`Predicted_Speed`)
    pub predicted_mean: f64,
    /// Predicted dispersion at the winning point (`Predicted_Sigma`)
    pub predicted_dispersion: f64,
    /// Trial number of the winner within its category search
    pub winning_trial: usize,
    /// Size of the Pareto front the winner was selected from
    pub front_size: usize,
}

/// One recommended operating point per category value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardsTable {
    /// Name of the category axis
    pub category_axis: String,
    /// Optimizable parameter columns, numeric first then categorical
    pub parameter_columns: Vec<String>,
    /// Rows in category order
    pub rows: Vec<StandardsRow>,
    /// When the table was produced
    pub generated_at: DateTime<Utc>,
}

impl StandardsTable {
    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// True when no category was searched.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Row for a category value.
    pub fn row(&self, category: &str) -> Option<&StandardsRow> {
        self.rows.iter().find(|r| r.category == category)
    }

    /// Rows by predicted mean, highest first (stable).
    pub fn by_mean_descending(&self) -> Vec<&StandardsRow> {
        let mut rows: Vec<&StandardsRow> = self.rows.iter().collect();
        rows.sort_by(|a, b| b.predicted_mean.total_cmp(&a.predicted_mean));
        rows
    }

    /// Serialize the table to pretty JSON.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
