//! Shared data structures for the castline engine
//!
//! This module defines the types that flow between the engine stages:
//! - Raw input: ParamValue / ParamRecord (one operating point)
//! - Domains: ParamRange / ParamDomains (observed training ranges)
//! - Encoded input: EncodedMatrix (fixed-width, artifact column order)
//! - Outputs: Prediction, GridTable, Trial, StandardsTable

mod domain;
mod grid;
mod prediction;
mod record;
mod standards;

pub use domain::*;
pub use grid::*;
pub use prediction::*;
pub use record::*;
pub use standards::*;
