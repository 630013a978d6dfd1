//! Prediction Engine
//!
//! Everything that turns raw operating parameters into ensemble outputs.
//!
//! ## Architecture
//! - `aligner`: raw record → fixed-width encoded row (one-hot for categoricals)
//! - `aggregator`: encoded rows → (mean, dispersion) over the tree ensemble
//! - `grid`: exhaustive cartesian-product simulation with resource bounds
//! - `attribution`: per-column attribution → per-parameter contributions
//! - `orchestrator`: the [`Engine`] facade that wires them to one artifact

pub mod aggregator;
pub mod aligner;
pub mod attribution;
pub mod grid;
mod orchestrator;

pub use aggregator::{summarize, EnsembleAggregator, Predictor, DEFAULT_PARALLEL_THRESHOLD};
pub use aligner::FeatureAligner;
pub use attribution::{
    explain, AttributionVector, Attributor, Contribution, Explanation, PathAttributor,
};
pub use grid::{combination_count, GridAxis, GridLimits, GridRequest, GridSimulator};
pub use orchestrator::{Engine, PointAssessment};
