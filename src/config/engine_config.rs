//! Engine configuration: TOML-backed settings for every engine surface
//!
//! All fields carry serde defaults matching the original analysis constants,
//! so an empty file (or no file at all) yields a working configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use super::defaults;
use crate::engine::GridLimits;
use crate::optimization::{ParzenSettings, SearchSettings};
use crate::types::{ParamDomains, ParamRecord};

// ============================================================================
// Root Config
// ============================================================================

/// Root configuration for the castline engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Model artifact location and input requirements
    #[serde(default)]
    pub model: ModelConfig,

    /// Grid simulation settings
    #[serde(default)]
    pub grid: GridConfig,

    /// Standards search settings
    #[serde(default)]
    pub search: SearchConfig,

    /// Point explanation settings
    #[serde(default)]
    pub explain: ExplainConfig,

    /// Fixed values for parameters that are neither gridded nor optimized
    #[serde(default)]
    pub base: ParamRecord,
}

impl EngineConfig {
    /// Load configuration using the standard search order:
    /// 1. `$CASTLINE_CONFIG` environment variable
    /// 2. `./castline.toml` in the current working directory
    /// 3. Built-in defaults
    pub fn load() -> Self {
        if let Ok(path) = std::env::var(defaults::CONFIG_ENV_VAR) {
            let p = PathBuf::from(&path);
            if p.exists() {
                match Self::load_from_file(&p) {
                    Ok(config) => {
                        info!(path = %p.display(), "Loaded config from {}", defaults::CONFIG_ENV_VAR);
                        return config;
                    }
                    Err(e) => {
                        warn!(path = %p.display(), error = %e, "Failed to load config from env path, falling back");
                    }
                }
            } else {
                warn!(path = %path, "Config path from environment does not exist, falling back");
            }
        }

        let local = PathBuf::from(defaults::CONFIG_FILE);
        if local.exists() {
            match Self::load_from_file(&local) {
                Ok(config) => {
                    info!(path = %local.display(), "Loaded config from working directory");
                    return config;
                }
                Err(e) => {
                    warn!(path = %local.display(), error = %e, "Failed to load local config, using defaults");
                }
            }
        }

        info!("No config file found, using built-in defaults");
        Self::default()
    }

    /// Load from a specific TOML file.
    ///
    /// Unknown keys are reported as warnings (with "did you mean" hints) and
    /// never fail the load; impossible values do.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|source| ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        Self::from_toml_str(&contents).map_err(|e| match e {
            ConfigError::ParseStr(source) => ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            },
            other => other,
        })
    }

    /// Parse and validate TOML text.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        // Two-pass: unknown keys first (warnings only)
        for w in super::validation::validate_unknown_keys(contents) {
            warn!("{}", w);
        }

        let config: Self = toml::from_str(contents).map_err(ConfigError::ParseStr)?;
        config.validate()?;
        for w in super::validation::validate_ranges(&config) {
            warn!("{}", w);
        }
        Ok(config)
    }

    /// Serialize config to a TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::Serialize)
    }

    /// Write config to a file.
    pub fn save_to_file(&self, path: &Path) -> Result<(), ConfigError> {
        let contents = self.to_toml()?;
        std::fs::write(path, contents).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        info!(path = %path.display(), "Engine config saved");
        Ok(())
    }

    /// Reject values no run could use.
    ///
    /// Rules:
    /// - Grid points, chunk size and ceiling must be positive; warn ≤ max
    /// - Grid target must be finite
    /// - Grid ranges must be numeric with finite, ordered bounds
    /// - Search gamma must lie strictly inside (0, 1)
    /// - Trial and candidate budgets must be positive
    /// - The category axis cannot also be optimized
    pub fn validate(&self) -> Result<(), ConfigError> {
        let g = &self.grid;
        let s = &self.search;
        let mut errors: Vec<String> = Vec::new();

        if g.points == 0 {
            errors.push("grid.points must be >= 1".to_string());
        }
        if !g.target.is_finite() {
            errors.push(format!("grid.target must be finite (got {})", g.target));
        }
        if g.max_combinations == 0 {
            errors.push("grid.max_combinations must be >= 1".to_string());
        }
        if g.warn_combinations > g.max_combinations {
            errors.push(format!(
                "grid.warn_combinations ({}) must be <= grid.max_combinations ({})",
                g.warn_combinations, g.max_combinations
            ));
        }
        if g.chunk_rows == 0 {
            errors.push("grid.chunk_rows must be >= 1".to_string());
        }
        Self::check_unique(&g.axes, "grid.axes", &mut errors);
        for (name, range) in &g.ranges {
            if !range.is_numeric() {
                errors.push(format!("grid.ranges.{name} must be {{ min, max }}"));
            } else if let Some(defect) = range.defect() {
                errors.push(format!("grid.ranges.{name}: {defect}"));
            }
        }

        if s.category_axis.trim().is_empty() {
            errors.push("search.category_axis must not be empty".to_string());
        }
        if s.trials_per_category == 0 {
            errors.push("search.trials_per_category must be >= 1".to_string());
        }
        if !(s.gamma > 0.0 && s.gamma < 1.0) {
            errors.push(format!("search.gamma = {} must be in (0, 1)", s.gamma));
        }
        if s.candidates == 0 {
            errors.push("search.candidates must be >= 1".to_string());
        }
        for name in s.optimize_numeric.iter().chain(&s.optimize_categorical) {
            if *name == s.category_axis {
                errors.push(format!(
                    "search: '{name}' is the category axis and cannot also be optimized"
                ));
            }
        }
        Self::check_unique(&s.optimize_numeric, "search.optimize_numeric", &mut errors);
        Self::check_unique(&s.optimize_categorical, "search.optimize_categorical", &mut errors);

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }

    fn check_unique(names: &[String], field: &str, errors: &mut Vec<String>) {
        for (i, name) in names.iter().enumerate() {
            if names[..i].contains(name) {
                errors.push(format!("{field}: '{name}' listed more than once"));
            }
        }
    }

    /// Grid resource limits from the `[grid]` section.
    pub const fn grid_limits(&self) -> GridLimits {
        GridLimits {
            warn_combinations: self.grid.warn_combinations,
            max_combinations: self.grid.max_combinations,
            chunk_rows: self.grid.chunk_rows,
        }
    }

    /// Search settings from the `[search]` section.
    pub const fn search_settings(&self) -> SearchSettings {
        SearchSettings {
            parzen: ParzenSettings {
                startup_trials: self.search.startup_trials,
                gamma: self.search.gamma,
                candidates: self.search.candidates,
            },
            seed: if self.search.randomize_seed {
                None
            } else {
                Some(self.search.seed)
            },
            parallel_categories: self.search.parallel_categories,
        }
    }
}

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Reading or writing the file failed
    #[error("Config I/O error ({}): {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid TOML for this schema
    #[error("Config parse error ({}): {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    /// In-memory TOML text is not valid for this schema
    #[error("Config parse error: {0}")]
    ParseStr(#[source] toml::de::Error),

    /// Serialization failed
    #[error("Config serialization error: {0}")]
    Serialize(#[source] toml::ser::Error),

    /// One or more values are impossible
    #[error("Config validation failed:\n  - {}", .0.join("\n  - "))]
    Validation(Vec<String>),
}

// ============================================================================
// Model
// ============================================================================

/// Model artifact settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Path to the artifact JSON
    #[serde(default = "default_artifact_path")]
    pub artifact_path: PathBuf,

    /// Parameters that may be absent from a record (their columns stay zero)
    #[serde(default)]
    pub optional_parameters: Vec<String>,

    /// Rows × trees above which trees are evaluated in parallel
    #[serde(default = "default_parallel_tree_threshold")]
    pub parallel_tree_threshold: usize,
}

fn default_artifact_path() -> PathBuf {
    PathBuf::from(defaults::ARTIFACT_PATH)
}
fn default_parallel_tree_threshold() -> usize {
    crate::engine::DEFAULT_PARALLEL_THRESHOLD
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            artifact_path: default_artifact_path(),
            optional_parameters: Vec::new(),
            parallel_tree_threshold: default_parallel_tree_threshold(),
        }
    }
}

// ============================================================================
// Grid
// ============================================================================

/// Grid simulation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridConfig {
    /// Values per gridded parameter
    #[serde(default = "default_grid_points")]
    pub points: usize,

    /// Outcome the error column is measured against
    #[serde(default = "default_grid_target")]
    pub target: f64,

    /// Gridded numeric parameters; empty grids every numeric parameter
    #[serde(default)]
    pub axes: Vec<String>,

    /// Soft threshold: log a warning above this many combinations
    #[serde(default = "default_warn_combinations")]
    pub warn_combinations: u64,

    /// Hard ceiling: refuse grids above this many combinations
    #[serde(default = "default_max_combinations")]
    pub max_combinations: u64,

    /// Rows encoded and predicted per batch
    #[serde(default = "default_chunk_rows")]
    pub chunk_rows: usize,

    /// Rows shown per ranking in the summary
    #[serde(default = "default_report_rows")]
    pub report_rows: usize,

    /// Per-axis `{ min, max }` bounds; an axis listed here ignores the
    /// artifact's domain
    #[serde(default, skip_serializing_if = "ParamDomains::is_empty")]
    pub ranges: ParamDomains,
}

fn default_grid_points() -> usize {
    defaults::GRID_POINTS
}
fn default_grid_target() -> f64 {
    defaults::GRID_TARGET
}
fn default_warn_combinations() -> u64 {
    defaults::GRID_WARN_COMBINATIONS
}
fn default_max_combinations() -> u64 {
    defaults::GRID_MAX_COMBINATIONS
}
fn default_chunk_rows() -> usize {
    defaults::GRID_CHUNK_ROWS
}
fn default_report_rows() -> usize {
    defaults::GRID_REPORT_ROWS
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            points: default_grid_points(),
            target: default_grid_target(),
            axes: Vec::new(),
            warn_combinations: default_warn_combinations(),
            max_combinations: default_max_combinations(),
            chunk_rows: default_chunk_rows(),
            report_rows: default_report_rows(),
            ranges: ParamDomains::new(),
        }
    }
}

// ============================================================================
// Search
// ============================================================================

/// Standards search settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Categorical parameter each standards row is keyed by
    #[serde(default = "default_category_axis")]
    pub category_axis: String,

    /// Category values to search; empty searches the whole trained domain
    #[serde(default)]
    pub categories: Vec<String>,

    /// Optimizable numeric parameters; empty optimizes every numeric parameter
    #[serde(default)]
    pub optimize_numeric: Vec<String>,

    /// Optimizable categorical parameters; empty optimizes every categorical
    /// parameter except the category axis
    #[serde(default)]
    pub optimize_categorical: Vec<String>,

    /// Trials per category value
    #[serde(default = "default_trials")]
    pub trials_per_category: usize,

    /// Uniform trials before the Parzen model is used
    #[serde(default = "default_startup_trials")]
    pub startup_trials: usize,

    /// Fraction of ranked trials treated as "good"
    #[serde(default = "default_gamma")]
    pub gamma: f64,

    /// Candidates scored per proposal
    #[serde(default = "default_candidates")]
    pub candidates: usize,

    /// Base seed; category `i` searches with `seed + i`
    #[serde(default = "default_seed")]
    pub seed: u64,

    /// Ignore `seed` and draw sampler seeds from OS entropy
    #[serde(default)]
    pub randomize_seed: bool,

    /// Search categories concurrently
    #[serde(default = "default_true")]
    pub parallel_categories: bool,
}

fn default_category_axis() -> String {
    defaults::SEARCH_CATEGORY_AXIS.to_string()
}
fn default_trials() -> usize {
    defaults::SEARCH_TRIALS_PER_CATEGORY
}
fn default_startup_trials() -> usize {
    defaults::SEARCH_STARTUP_TRIALS
}
fn default_gamma() -> f64 {
    defaults::SEARCH_GAMMA
}
fn default_candidates() -> usize {
    defaults::SEARCH_CANDIDATES
}
fn default_seed() -> u64 {
    defaults::SEARCH_SEED
}
fn default_true() -> bool {
    true
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            category_axis: default_category_axis(),
            categories: Vec::new(),
            optimize_numeric: Vec::new(),
            optimize_categorical: Vec::new(),
            trials_per_category: default_trials(),
            startup_trials: default_startup_trials(),
            gamma: default_gamma(),
            candidates: default_candidates(),
            seed: default_seed(),
            randomize_seed: false,
            parallel_categories: true,
        }
    }
}

// ============================================================================
// Explain
// ============================================================================

/// Point explanation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExplainConfig {
    /// Contributions shown per prediction
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

fn default_top_k() -> usize {
    defaults::EXPLAIN_TOP_K
}

impl Default for ExplainConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
