//! castline: ensemble-tree process standards engine
//!
//! Estimates a scalar process outcome (e.g. casting speed) and its
//! uncertainty from operating parameters with an ensemble of regression
//! trees, then searches the parameter space for stable operating points.
//!
//! ## Architecture
//!
//! - **Model**: artifact loading, regression trees, explicit feature layout
//! - **Engine**: feature alignment, ensemble aggregation, grid simulation,
//!   attribution, and the [`Engine`] facade tying them together
//! - **Optimization**: per-category multi-objective search producing the
//!   standards table
//! - **Report**: CSV and text output

pub mod config;
pub mod engine;
pub mod error;
pub mod model;
pub mod optimization;
pub mod report;
pub mod types;

// Re-export configuration
pub use config::EngineConfig;

// Re-export the engine surface
pub use engine::{Engine, PointAssessment};
pub use error::{EngineError, Result};
pub use model::ModelArtifact;

// Re-export commonly used types
pub use types::{
    GridTable, ParamDomains, ParamRange, ParamRecord, ParamValue, Prediction, StandardsTable,
};
