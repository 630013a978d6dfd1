//! Operating Standards Search
//!
//! Finds one recommended operating point per category value (e.g. per steel
//! grade) by trading off predicted speed against ensemble disagreement.
//! Entirely model-driven: every candidate is scored by the shared predictor.

mod optimizer;
pub mod pareto;
pub mod sampler;

pub use optimizer::{SearchContext, SearchSettings, StandardsOptimizer, StandardsRequest};
pub use sampler::{ParzenSampler, ParzenSettings, RandomSampler, Sampler, SearchDim, SearchSpace};
