//! System-wide default constants.
//!
//! Values every config section falls back to. The grid and search budgets
//! match the figures the analysis scripts have always run with.

// ============================================================================
// Model
// ============================================================================

/// Artifact file looked up when no path is configured.
pub const ARTIFACT_PATH: &str = "castline-model.json";

/// Config file looked up in the working directory.
pub const CONFIG_FILE: &str = "castline.toml";

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV_VAR: &str = "CASTLINE_CONFIG";

// ============================================================================
// Grid Simulation
// ============================================================================

/// Evenly spaced values per gridded parameter.
pub const GRID_POINTS: usize = 10;

/// Outcome the grid error column is measured against.
pub const GRID_TARGET: f64 = 200.0;

/// Above this many combinations the simulator logs a warning.
pub const GRID_WARN_COMBINATIONS: u64 = 100_000;

/// Above this many combinations the simulator refuses to run.
pub const GRID_MAX_COMBINATIONS: u64 = 1_000_000;

/// Rows encoded and predicted per batch.
///
/// 16 384 rows × 100 trees keeps the per-tree output buffer near 13 MB.
pub const GRID_CHUNK_ROWS: usize = 16_384;

/// Rows shown per ranking in the simulate summary.
pub const GRID_REPORT_ROWS: usize = 10;

/// CSV written by `castline simulate` when no output path is given.
pub const GRID_OUTPUT_CSV: &str = "simulation_results_table.csv";

// ============================================================================
// Standards Search
// ============================================================================

/// Categorical parameter each standards row is keyed by.
pub const SEARCH_CATEGORY_AXIS: &str = "Steel_Code";

/// Trials evaluated per category value.
pub const SEARCH_TRIALS_PER_CATEGORY: usize = 100;

/// Uniform trials before the Parzen model is used.
pub const SEARCH_STARTUP_TRIALS: usize = 10;

/// Fraction of ranked trials treated as "good".
pub const SEARCH_GAMMA: f64 = 0.25;

/// Candidates drawn from the good density per proposal.
pub const SEARCH_CANDIDATES: usize = 24;

/// Base seed for per-category samplers.
pub const SEARCH_SEED: u64 = 42;

/// CSV written by `castline optimize` when no output path is given.
pub const STANDARDS_OUTPUT_CSV: &str = "optimal_standards_table.csv";

// ============================================================================
// Explanations
// ============================================================================

/// Contributions shown per explained prediction.
pub const EXPLAIN_TOP_K: usize = 3;
