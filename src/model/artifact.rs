//! Model artifact: the trained ensemble plus everything needed to encode input
//!
//! The artifact is loaded once and never mutated. Structural problems are
//! reported as `ArtifactSchema` errors at load time so that no later
//! operation has to re-check tree indices or column ownership.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use super::{FeatureLayout, ParamKind, RegressionTree};
use crate::error::{EngineError, Result};
use crate::types::{ParamDomains, ParamRange};

/// On-disk shape of the artifact, as written by the training step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactFile {
    /// The ensemble
    pub trees: Vec<RegressionTree>,
    /// Encoded column names in model order
    pub model_columns: Vec<String>,
    /// Original numeric parameter names
    pub original_cols_numeric: Vec<String>,
    /// Original categorical parameter names
    pub original_cols_categorical: Vec<String>,
    /// Trained-time levels per categorical parameter
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub categories: Option<BTreeMap<String, Vec<String>>>,
    /// Observed domain per parameter
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub param_ranges: Option<ParamDomains>,
    /// Name of the predicted outcome
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
}

/// Validated, immutable model artifact.
#[derive(Debug, Clone)]
pub struct ModelArtifact {
    trees: Vec<RegressionTree>,
    layout: FeatureLayout,
    domains: Option<ParamDomains>,
    target: Option<String>,
}

impl ModelArtifact {
    /// Read and validate an artifact JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|source| EngineError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let file: ArtifactFile =
            serde_json::from_str(&contents).map_err(|source| EngineError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        let artifact = Self::from_file(file)?;
        info!(
            path = %path.display(),
            trees = artifact.trees.len(),
            columns = artifact.layout.width(),
            has_domains = artifact.domains.is_some(),
            "Loaded model artifact"
        );
        Ok(artifact)
    }

    /// Parse and validate artifact JSON held in memory.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let file: ArtifactFile = serde_json::from_str(json)
            .map_err(|e| EngineError::schema(format!("invalid artifact JSON: {e}")))?;
        Self::from_file(file)
    }

    /// Validate a deserialized artifact.
    pub fn from_file(file: ArtifactFile) -> Result<Self> {
        let layout = FeatureLayout::build(
            &file.model_columns,
            &file.original_cols_numeric,
            &file.original_cols_categorical,
            file.categories.as_ref(),
        )?;
        let mut artifact = Self::from_parts(file.trees, layout)?;
        artifact.target = file.target;
        if let Some(domains) = file.param_ranges {
            artifact = artifact.with_domains(domains)?;
        }
        Ok(artifact)
    }

    /// Assemble an artifact from an ensemble and a layout.
    ///
    /// # Errors
    /// `ArtifactSchema` for an empty ensemble or a structurally unsound tree.
    pub fn from_parts(trees: Vec<RegressionTree>, layout: FeatureLayout) -> Result<Self> {
        if trees.is_empty() {
            return Err(EngineError::schema("ensemble has no trees"));
        }
        for (i, tree) in trees.iter().enumerate() {
            tree.validate(layout.width())
                .map_err(|e| EngineError::schema(format!("tree {i}: {e}")))?;
        }
        Ok(Self {
            trees,
            layout,
            domains: None,
            target: None,
        })
    }

    /// Attach (or replace) the per-parameter domain map.
    ///
    /// Every entry must name an artifact parameter, have the parameter's
    /// kind, and be usable (finite ordered bounds, non-empty value set).
    pub fn with_domains(mut self, domains: ParamDomains) -> Result<Self> {
        for (name, range) in &domains {
            let kind = self.layout.kind(name).ok_or_else(|| {
                EngineError::schema(format!("domain given for unknown parameter '{name}'"))
            })?;
            let matches_kind = match range {
                ParamRange::Numeric { .. } => kind == ParamKind::Numeric,
                ParamRange::Categorical { .. } => kind == ParamKind::Categorical,
            };
            if !matches_kind {
                return Err(EngineError::schema(format!(
                    "domain of '{name}' does not match its {kind:?} parameter kind"
                )));
            }
            if let Some(defect) = range.defect() {
                return Err(EngineError::schema(format!("domain of '{name}': {defect}")));
            }
        }
        self.domains = Some(domains);
        Ok(self)
    }

    /// Set the outcome name.
    #[must_use]
    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    /// The ensemble.
    pub fn trees(&self) -> &[RegressionTree] {
        &self.trees
    }

    /// Encoded layout.
    pub const fn layout(&self) -> &FeatureLayout {
        &self.layout
    }

    /// Outcome name, when the artifact records one.
    pub fn target(&self) -> Option<&str> {
        self.target.as_deref()
    }

    /// True when a domain map is attached.
    pub const fn has_domains(&self) -> bool {
        self.domains.is_some()
    }

    /// The domain map.
    ///
    /// # Errors
    /// `ArtifactSchema` when the artifact carries none.
    pub fn domains(&self) -> Result<&ParamDomains> {
        self.domains.as_ref().ok_or_else(|| {
            EngineError::schema(
                "artifact has no parameter domain map (param_ranges); \
                 re-export it with ranges or attach one with with_domains",
            )
        })
    }

    /// Domain of a single parameter.
    pub fn domain(&self, name: &str) -> Result<&ParamRange> {
        self.domains()?.get(name).ok_or_else(|| {
            EngineError::schema(format!("domain map has no entry for '{name}'"))
        })
    }
}
