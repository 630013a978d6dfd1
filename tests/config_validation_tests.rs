//! Config Validation Tests
//!
//! Typo detection, impossible-value rejection and range warnings for the
//! engine config, exercised independently from the engine itself.

use std::io::Write;

use castline::config::validation::{
    known_config_keys, suggest_correction, validate_ranges, validate_unknown_keys,
};
use castline::config::{ConfigError, EngineConfig};
use castline::ParamValue;

// ============================================================================
// Typo Detection
// ============================================================================

#[test]
fn typo_in_grid_section_warns_with_suggestion() {
    let toml_str = r#"
[grid]
pionts = 12
"#;
    let warnings = validate_unknown_keys(toml_str);
    assert_eq!(warnings.len(), 1, "Expected exactly 1 warning");
    assert_eq!(warnings[0].field, "grid.pionts");
    assert_eq!(warnings[0].suggestion.as_deref(), Some("grid.points"));
}

#[test]
fn valid_config_produces_zero_warnings() {
    let toml_str = r#"
[model]
artifact_path = "models/speed.json"
optional_parameters = ["Flow"]

[grid]
points = 8
target = 1.2
axes = ["Temp", "Pressure"]
warn_combinations = 50000
max_combinations = 500000

[search]
category_axis = "Steel_Code"
optimize_numeric = ["Temp", "Pressure"]
optimize_categorical = ["Pattern"]
trials_per_category = 150
seed = 7

[explain]
top_k = 5

[base]
Mold_Width = 1250.0
Tundish = "T2"
"#;
    let warnings = validate_unknown_keys(toml_str);
    assert!(warnings.is_empty(), "Expected 0 warnings, got: {warnings:?}");
}

#[test]
fn unknown_section_warns() {
    let warnings = validate_unknown_keys("[plotting]\ndpi = 300\n");
    assert!(warnings.iter().any(|w| w.field == "plotting"));
    assert!(warnings.iter().any(|w| w.field == "plotting.dpi"));
}

#[test]
fn multiple_typos_all_warned() {
    let toml_str = r#"
[search]
gama = 0.3
candidtes = 12

[explain]
topk = 2
"#;
    let warnings = validate_unknown_keys(toml_str);
    assert_eq!(warnings.len(), 3);
}

#[test]
fn suggestion_respects_distance_limit() {
    let known = known_config_keys();
    assert_eq!(
        suggest_correction("search.sed", &known).as_deref(),
        Some("search.seed")
    );
    assert!(suggest_correction("totally.different.key", &known).is_none());
}

// ============================================================================
// Parsing & Validation
// ============================================================================

#[test]
fn empty_file_yields_defaults() {
    let config = EngineConfig::from_toml_str("").unwrap();
    assert_eq!(config, EngineConfig::default());
}

#[test]
fn base_section_parses_mixed_values() {
    let config = EngineConfig::from_toml_str(
        r#"
[base]
Mold_Width = 1250.0
Tundish = "T2"
"#,
    )
    .unwrap();
    assert_eq!(config.base.get("Mold_Width"), Some(&ParamValue::Numeric(1250.0)));
    assert_eq!(
        config.base.get("Tundish"),
        Some(&ParamValue::Categorical("T2".into()))
    );
}

#[test]
fn impossible_values_are_rejected_together() {
    let err = EngineConfig::from_toml_str(
        r#"
[grid]
points = 0
warn_combinations = 20
max_combinations = 10

[search]
gamma = 1.5
trials_per_category = 0
"#,
    )
    .unwrap_err();
    match err {
        ConfigError::Validation(errors) => assert!(errors.len() >= 4, "{errors:?}"),
        other => panic!("expected validation error, got {other}"),
    }
}

#[test]
fn category_axis_cannot_be_optimized() {
    let mut config = EngineConfig::default();
    config.search.optimize_categorical = vec![config.search.category_axis.clone()];
    assert!(config.validate().is_err());
}

#[test]
fn range_warnings_are_not_fatal() {
    let config = EngineConfig::from_toml_str(
        r#"
[search]
trials_per_category = 5
startup_trials = 10
"#,
    )
    .unwrap();
    let warnings = validate_ranges(&config);
    assert!(warnings.iter().any(|w| w.field == "search.startup_trials"));
}

// ============================================================================
// Files
// ============================================================================

#[test]
fn save_and_reload_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("castline.toml");

    let mut config = EngineConfig::default();
    config.grid.points = 7;
    config.search.categories = vec!["S1".into(), "S2".into()];
    config.base.insert("Tundish", "T2");
    config.save_to_file(&path).unwrap();

    let loaded = EngineConfig::load_from_file(&path).unwrap();
    assert_eq!(loaded, config);
}

#[test]
fn malformed_file_reports_its_path() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "[grid\npoints = ").unwrap();
    let err = EngineConfig::load_from_file(file.path()).unwrap_err();
    assert!(matches!(err, ConfigError::Parse { .. }));
    assert!(err.to_string().contains(&file.path().display().to_string()));
}

#[test]
fn missing_file_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = EngineConfig::load_from_file(&dir.path().join("absent.toml")).unwrap_err();
    assert!(matches!(err, ConfigError::Io { .. }));
}
