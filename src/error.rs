//! Engine error type
//!
//! Every fallible core operation returns [`EngineError`]. The categories are
//! deliberately few: a bad request, a model artifact that cannot serve the
//! request, or a grid too large to evaluate. Unseen categorical levels are
//! not errors (they encode to an all-zero block).

use std::path::PathBuf;
use thiserror::Error;

/// Result alias for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;

/// Errors raised by the castline engine
#[derive(Debug, Error)]
pub enum EngineError {
    /// A required parameter is missing, or a requested name does not exist
    /// in the model artifact.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The model artifact lacks (or has malformed) fields the operation needs.
    #[error("model artifact schema error: {0}")]
    ArtifactSchema(String),

    /// Requested grid exceeds the hard combination ceiling.
    #[error(
        "grid of {combinations} combinations exceeds the hard ceiling of {ceiling}; \
         reduce grid points or the number of gridded parameters"
    )]
    ResourceLimit {
        /// Size of the requested cartesian product
        combinations: u128,
        /// Configured hard ceiling
        ceiling: u64,
    },

    /// Reading the artifact file failed
    #[error("failed to read model artifact {}: {source}", path.display())]
    Io {
        /// Artifact path
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The artifact file is not valid artifact JSON
    #[error("failed to parse model artifact {}: {source}", path.display())]
    Parse {
        /// Artifact path
        path: PathBuf,
        /// Underlying JSON error
        #[source]
        source: serde_json::Error,
    },
}

impl EngineError {
    pub(crate) fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub(crate) fn schema(msg: impl Into<String>) -> Self {
        Self::ArtifactSchema(msg.into())
    }
}
