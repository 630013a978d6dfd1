//! Model artifact module
//!
//! The trained ensemble and its encoded feature layout.
//!
//! ## Key Features
//!
//! - Flat-array regression trees with `<=`-left routing
//! - Explicit parameter → column mapping built once at load
//! - Optional per-parameter domain map for search

mod artifact;
mod layout;
mod tree;

pub use artifact::{ArtifactFile, ModelArtifact};
pub use layout::{FeatureLayout, ParamKind, ParamSlot};
pub use tree::{RegressionTree, TreeNode};
