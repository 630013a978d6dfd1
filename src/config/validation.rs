//! Config validation: unknown-key detection with Levenshtein suggestions
//! and range sanity checks.
//!
//! Two-pass parse approach: first deserialize raw TOML into `toml::Value`,
//! walk the key tree, compare against known field names, and emit warnings
//! with "did you mean?" suggestions. Then proceed with normal serde
//! deserialization. Warnings never break existing configs.

use std::collections::HashSet;

use super::EngineConfig;

/// A non-fatal config warning (typo, suspicious value).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationWarning {
    /// Dotted key path the warning is about
    pub field: String,
    /// Human-readable description
    pub message: String,
    /// Closest known key, for typos
    pub suggestion: Option<String>,
}

impl std::fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)?;
        if let Some(ref s) = self.suggestion {
            write!(f, " (did you mean '{s}'?)")?;
        }
        Ok(())
    }
}

// ============================================================================
// Known Config Keys
// ============================================================================

/// Sections whose keys are parameter names, not schema fields.
const FREE_FORM_SECTIONS: [&str; 2] = ["base", "grid.ranges"];

/// Returns the complete set of valid dotted key paths for `EngineConfig`.
///
/// Maintained by hand to match the struct hierarchy in engine_config.rs.
pub fn known_config_keys() -> HashSet<&'static str> {
    let keys: &[&str] = &[
        // [model]
        "model",
        "model.artifact_path",
        "model.optional_parameters",
        "model.parallel_tree_threshold",
        // [grid]
        "grid",
        "grid.points",
        "grid.target",
        "grid.axes",
        "grid.warn_combinations",
        "grid.max_combinations",
        "grid.chunk_rows",
        "grid.report_rows",
        "grid.ranges",
        // [search]
        "search",
        "search.category_axis",
        "search.categories",
        "search.optimize_numeric",
        "search.optimize_categorical",
        "search.trials_per_category",
        "search.startup_trials",
        "search.gamma",
        "search.candidates",
        "search.seed",
        "search.randomize_seed",
        "search.parallel_categories",
        // [explain]
        "explain",
        "explain.top_k",
        // [base]
        "base",
    ];
    keys.iter().copied().collect()
}

// ============================================================================
// TOML Key Walking
// ============================================================================

/// Recursively walks a `toml::Value` tree and collects all dotted key paths.
///
/// For example, a table `{ a = { b = 1, c = 2 } }` yields:
/// `["a", "a.b", "a.c"]`
pub fn walk_toml_keys(value: &toml::Value, prefix: &str) -> Vec<String> {
    let mut keys = Vec::new();
    if let Some(table) = value.as_table() {
        for (k, v) in table {
            let path = if prefix.is_empty() {
                k.clone()
            } else {
                format!("{prefix}.{k}")
            };
            keys.push(path.clone());
            if v.is_table() {
                keys.extend(walk_toml_keys(v, &path));
            }
        }
    }
    keys
}

// ============================================================================
// Levenshtein Distance
// ============================================================================

/// Levenshtein edit distance over chars.
fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];
    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

/// Closest known key within edit distance 3. Ties go to the
/// lexicographically smallest key so suggestions are stable.
pub fn suggest_correction(unknown: &str, known: &HashSet<&str>) -> Option<String> {
    known
        .iter()
        .map(|&k| (levenshtein(unknown, k), k))
        .filter(|(d, _)| *d <= 3)
        .min()
        .map(|(_, k)| k.to_string())
}

// ============================================================================
// Unknown Key Validation (entry point)
// ============================================================================

/// Parse a raw TOML string and return warnings for any unknown config keys.
///
/// Never fails: TOML syntax errors are left for serde to report.
pub fn validate_unknown_keys(raw_toml: &str) -> Vec<ValidationWarning> {
    let Ok(value) = raw_toml.parse::<toml::Value>() else {
        return Vec::new();
    };

    let known = known_config_keys();
    let free_form: Vec<String> = FREE_FORM_SECTIONS.iter().map(|s| format!("{s}.")).collect();
    walk_toml_keys(&value, "")
        .into_iter()
        .filter(|key| {
            !known.contains(key.as_str()) && !free_form.iter().any(|p| key.starts_with(p.as_str()))
        })
        .map(|key| ValidationWarning {
            suggestion: suggest_correction(&key, &known),
            message: format!("Unknown config key '{key}'"),
            field: key,
        })
        .collect()
}

// ============================================================================
// Range Validation
// ============================================================================

/// Suspicious but legal values. Impossible values are rejected by
/// [`EngineConfig::validate`] instead.
pub fn validate_ranges(config: &EngineConfig) -> Vec<ValidationWarning> {
    let mut warnings = Vec::new();
    let g = &config.grid;
    let s = &config.search;

    // Every point multiplies the grid by itself per axis
    if g.points > 100 {
        warnings.push(ValidationWarning {
            field: "grid.points".to_string(),
            message: format!(
                "grid.points = {} grows the grid by {}^k, most grids will hit the ceiling",
                g.points, g.points
            ),
            suggestion: None,
        });
    }

    if g.max_combinations > 10 * super::defaults::GRID_MAX_COMBINATIONS {
        warnings.push(ValidationWarning {
            field: "grid.max_combinations".to_string(),
            message: format!(
                "grid.max_combinations = {} is far above the usual ceiling of {}",
                g.max_combinations,
                super::defaults::GRID_MAX_COMBINATIONS
            ),
            suggestion: None,
        });
    }

    if s.startup_trials >= s.trials_per_category {
        warnings.push(ValidationWarning {
            field: "search.startup_trials".to_string(),
            message: format!(
                "search.startup_trials ({}) >= trials_per_category ({}), the search is purely random",
                s.startup_trials, s.trials_per_category
            ),
            suggestion: None,
        });
    }

    if config.explain.top_k == 0 {
        warnings.push(ValidationWarning {
            field: "explain.top_k".to_string(),
            message: "explain.top_k = 0 hides every contribution".to_string(),
            suggestion: None,
        });
    }

    warnings
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_levenshtein_basics() {
        assert_eq!(levenshtein("points", "points"), 0);
        assert_eq!(levenshtein("pionts", "points"), 2);
        assert_eq!(levenshtein("", "abc"), 3);
        assert_eq!(levenshtein("abc", ""), 3);
    }

    #[test]
    fn test_walk_toml_keys_nested() {
        let toml: toml::Value = r#"
            [grid]
            points = 5
            [search]
            gamma = 0.2
        "#
        .parse()
        .unwrap();
        let keys = walk_toml_keys(&toml, "");
        assert!(keys.contains(&"grid".to_string()));
        assert!(keys.contains(&"grid.points".to_string()));
        assert!(keys.contains(&"search.gamma".to_string()));
    }

    #[test]
    fn test_typo_key_produces_warning_with_suggestion() {
        let toml_str = r#"
[search]
trails_per_category = 50
"#;
        let warnings = validate_unknown_keys(toml_str);
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].field, "search.trails_per_category");
        assert_eq!(
            warnings[0].suggestion.as_deref(),
            Some("search.trials_per_category")
        );
    }

    #[test]
    fn test_base_section_accepts_any_parameter() {
        let toml_str = r#"
[base]
Speed = 1.1
Mold_Width = 1250.0
"#;
        assert!(validate_unknown_keys(toml_str).is_empty());
    }

    #[test]
    fn test_grid_ranges_accept_any_parameter() {
        let toml_str = r#"
[grid]
points = 8

[grid.ranges]
Temp = { min = 120.0, max = 180.0 }
Mold_Width = { min = 900.0, max = 1600.0 }
"#;
        assert!(validate_unknown_keys(toml_str).is_empty());
    }

    #[test]
    fn test_valid_keys_produce_zero_warnings() {
        let toml_str = r#"
[model]
artifact_path = "model.json"

[grid]
points = 8
axes = ["Temp"]

[explain]
top_k = 5
"#;
        let warnings = validate_unknown_keys(toml_str);
        assert!(warnings.is_empty(), "Expected 0 warnings, got: {warnings:?}");
    }

    #[test]
    fn test_unknown_section_has_no_suggestion() {
        let warnings = validate_unknown_keys("[completely_unrelated_section]\nx = 1\n");
        assert_eq!(warnings.len(), 2);
        assert!(warnings.iter().all(|w| w.suggestion.is_none()));
    }

    #[test]
    fn test_range_warnings() {
        let mut config = EngineConfig::default();
        assert!(validate_ranges(&config).is_empty());

        config.search.startup_trials = 200;
        config.grid.points = 500;
        let warnings = validate_ranges(&config);
        assert!(warnings.iter().any(|w| w.field == "search.startup_trials"));
        assert!(warnings.iter().any(|w| w.field == "grid.points"));
    }
}
