//! Engine: one artifact, one configuration, every surface
//!
//! Owns the shared read-only artifact and hands short-lived aligners and
//! aggregators to the grid simulator and the standards search. Requests can
//! be built from the configuration ([`Engine::grid_request`],
//! [`Engine::standards_request`]) or supplied directly.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::aggregator::{EnsembleAggregator, Predictor};
use super::aligner::FeatureAligner;
use super::attribution::{explain, Attributor, Explanation, PathAttributor};
use super::grid::{GridAxis, GridRequest, GridSimulator};
use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::model::{ModelArtifact, ParamKind};
use crate::optimization::{StandardsOptimizer, StandardsRequest};
use crate::types::{GridTable, ParamRecord, Prediction, StandardsTable};

/// Prediction and explanation of a single operating point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointAssessment {
    /// Ensemble mean and dispersion
    pub prediction: Prediction,
    /// Per-parameter attribution of the mean
    pub explanation: Explanation,
}

/// Shared engine facade.
///
/// Cheap to clone: the artifact is reference-counted and never mutated.
#[derive(Debug, Clone)]
pub struct Engine {
    artifact: Arc<ModelArtifact>,
    config: EngineConfig,
}

impl Engine {
    pub fn new(artifact: Arc<ModelArtifact>, config: EngineConfig) -> Self {
        info!(
            trees = artifact.trees().len(),
            width = artifact.layout().width(),
            domains = artifact.has_domains(),
            "Engine ready"
        );
        Self { artifact, config }
    }

    pub fn artifact(&self) -> &Arc<ModelArtifact> {
        &self.artifact
    }

    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn aligner(&self) -> FeatureAligner<'_> {
        FeatureAligner::new(self.artifact.layout())
            .with_optional(self.config.model.optional_parameters.iter().cloned())
    }

    fn aggregator(&self) -> EnsembleAggregator<'_> {
        EnsembleAggregator::new(self.artifact.trees(), self.artifact.layout().width())
            .with_parallel_threshold(self.config.model.parallel_tree_threshold)
    }

    // ========================================================================
    // Single point
    // ========================================================================

    /// Ensemble prediction for one raw record.
    pub fn predict(&self, record: &ParamRecord) -> Result<Prediction> {
        let row = self.aligner().align(record)?;
        self.aggregator().predict(&row)
    }

    /// Align, predict and explain one record with the built-in
    /// decision-path attributor.
    pub fn assess(&self, record: &ParamRecord) -> Result<PointAssessment> {
        let attributor = PathAttributor::new(self.artifact.trees(), self.artifact.layout().width());
        self.assess_with(record, &attributor)
    }

    /// [`assess`](Self::assess) with a caller-supplied attribution algorithm.
    pub fn assess_with<A: Attributor>(
        &self,
        record: &ParamRecord,
        attributor: &A,
    ) -> Result<PointAssessment> {
        let row = self.aligner().align(record)?;
        let prediction = self.aggregator().predict(&row)?;
        let attribution = attributor.attribute(&row)?;
        let explanation = explain(&attribution, self.artifact.layout())?;
        debug!(
            mean = prediction.mean,
            dispersion = prediction.dispersion,
            baseline = explanation.baseline,
            "Point assessed"
        );
        Ok(PointAssessment {
            prediction,
            explanation,
        })
    }

    // ========================================================================
    // Grid simulation
    // ========================================================================

    /// Grid request from the `[grid]` and `[base]` sections.
    ///
    /// With no configured axes every numeric parameter is gridded. Axis
    /// values span the `[grid.ranges]` bounds when one is set for the axis,
    /// otherwise the artifact's observed domain.
    pub fn grid_request(&self) -> Result<GridRequest> {
        let layout = self.artifact.layout();
        let names: Vec<String> = if self.config.grid.axes.is_empty() {
            layout
                .slots()
                .iter()
                .filter(|s| matches!(s.kind(), ParamKind::Numeric))
                .map(|s| s.name().to_string())
                .collect()
        } else {
            self.config.grid.axes.clone()
        };

        let axes = names
            .into_iter()
            .map(|name| {
                if layout.kind(&name) != Some(ParamKind::Numeric) {
                    return Err(EngineError::config(format!(
                        "grid axis '{name}' is not a numeric model parameter"
                    )));
                }
                let range = match self.config.grid.ranges.get(&name) {
                    Some(range) => range,
                    None => self.artifact.domain(&name)?,
                };
                GridAxis::from_domain(name, range, self.config.grid.points)
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(GridRequest {
            axes,
            base: self.config.base.clone(),
            target: self.config.grid.target,
        })
    }

    /// Simulate the configured grid.
    pub fn simulate(&self) -> Result<GridTable> {
        self.simulate_request(&self.grid_request()?)
    }

    /// Simulate an explicit grid request under the configured limits.
    pub fn simulate_request(&self, request: &GridRequest) -> Result<GridTable> {
        let aligner = self.aligner();
        let aggregator = self.aggregator();
        GridSimulator::new(&aligner, &aggregator)
            .with_limits(self.config.grid_limits())
            .simulate(request)
    }

    // ========================================================================
    // Standards search
    // ========================================================================

    /// Standards request from the `[search]` and `[base]` sections.
    ///
    /// Empty optimize lists expand to every parameter of that kind, leaving
    /// out the category axis.
    pub fn standards_request(&self) -> StandardsRequest {
        let search = &self.config.search;
        let layout = self.artifact.layout();
        let of_kind = |kind: ParamKind| -> Vec<String> {
            layout
                .slots()
                .iter()
                .filter(|s| s.kind() == kind && s.name() != search.category_axis)
                .map(|s| s.name().to_string())
                .collect()
        };

        StandardsRequest {
            category_axis: search.category_axis.clone(),
            categories: search.categories.clone(),
            numeric: if search.optimize_numeric.is_empty() {
                of_kind(ParamKind::Numeric)
            } else {
                search.optimize_numeric.clone()
            },
            categorical: if search.optimize_categorical.is_empty() {
                of_kind(ParamKind::Categorical)
            } else {
                search.optimize_categorical.clone()
            },
            trials_per_category: search.trials_per_category,
            base: self.config.base.clone(),
        }
    }

    /// Run the configured standards search.
    pub fn optimize(&self) -> Result<StandardsTable> {
        self.optimize_request(&self.standards_request())
    }

    /// Run an explicit standards search with the configured settings.
    pub fn optimize_request(&self, request: &StandardsRequest) -> Result<StandardsTable> {
        let aligner = self.aligner();
        let aggregator = self.aggregator();
        StandardsOptimizer::new(&self.artifact, &aligner, &aggregator)
            .with_settings(self.config.search_settings())
            .optimize(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{FeatureLayout, RegressionTree};
    use crate::types::{ParamDomains, ParamRange};

    /// Columns: Temp, Pressure, Grade_G1, Grade_G2, Pattern_A, Pattern_B
    fn make_bare_artifact() -> ModelArtifact {
        let cols: Vec<String> = [
            "Temp",
            "Pressure",
            "Grade_G1",
            "Grade_G2",
            "Pattern_A",
            "Pattern_B",
        ]
        .iter()
        .map(|s| (*s).to_string())
        .collect();
        let layout = FeatureLayout::build(
            &cols,
            &["Temp".to_string(), "Pressure".to_string()],
            &["Grade".to_string(), "Pattern".to_string()],
            None,
        )
        .unwrap();
        let trees = vec![
            RegressionTree::stump(0, 150.0, 180.0, 220.0),
            RegressionTree::stump(1, 5.0, 190.0, 210.0),
            RegressionTree::stump(5, 0.5, 195.0, 205.0),
        ];
        ModelArtifact::from_parts(trees, layout).unwrap()
    }

    fn make_artifact() -> ModelArtifact {
        let mut domains = ParamDomains::new();
        domains.insert("Temp".into(), ParamRange::numeric(100.0, 200.0));
        domains.insert("Pressure".into(), ParamRange::numeric(1.0, 10.0));
        domains.insert("Grade".into(), ParamRange::categorical(["G1", "G2"]));
        domains.insert("Pattern".into(), ParamRange::categorical(["A", "B"]));
        make_bare_artifact().with_domains(domains).unwrap()
    }

    fn make_engine(config: EngineConfig) -> Engine {
        Engine::new(Arc::new(make_artifact()), config)
    }

    fn make_record() -> ParamRecord {
        ParamRecord::new()
            .with("Temp", 160.0)
            .with("Pressure", 3.0)
            .with("Grade", "G1")
            .with("Pattern", "B")
    }

    #[test]
    fn test_predict_matches_tree_mean() {
        let engine = make_engine(EngineConfig::default());
        let p = engine.predict(&make_record()).unwrap();
        // 220 + 190 + 205
        assert!((p.mean - 205.0).abs() < 1e-9);
        assert!(p.dispersion > 0.0);
    }

    #[test]
    fn test_assess_round_trips_to_mean() {
        let engine = make_engine(EngineConfig::default());
        let a = engine.assess(&make_record()).unwrap();
        assert!((a.explanation.total() - a.prediction.mean).abs() < 1e-9);
        assert_eq!(a.explanation.contributions.len(), 4);
        assert_eq!(a.explanation.get("Grade"), Some(0.0));
    }

    #[test]
    fn test_missing_parameter_is_config_error() {
        let engine = make_engine(EngineConfig::default());
        let record = ParamRecord::new().with("Temp", 160.0);
        let err = engine.predict(&record).unwrap_err();
        assert!(matches!(err, EngineError::Configuration(_)));
    }

    #[test]
    fn test_optional_parameter_may_be_absent() {
        let mut config = EngineConfig::default();
        config.model.optional_parameters = vec!["Grade".into()];
        let engine = make_engine(config);
        let record = ParamRecord::new()
            .with("Temp", 160.0)
            .with("Pressure", 3.0)
            .with("Pattern", "B");
        assert!(engine.predict(&record).is_ok());
    }

    #[test]
    fn test_simulate_grids_every_numeric_parameter() {
        let mut config = EngineConfig::default();
        config.grid.points = 4;
        config.base = ParamRecord::new().with("Grade", "G2").with("Pattern", "A");
        let engine = make_engine(config);

        let request = engine.grid_request().unwrap();
        let names: Vec<&str> = request.axes.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["Temp", "Pressure"]);

        let table = engine.simulate().unwrap();
        assert_eq!(table.len(), 16);
    }

    #[test]
    fn test_configured_ranges_bound_grid_without_domains() {
        let mut config = EngineConfig::default();
        config.grid.points = 3;
        config.grid.axes = vec!["Temp".into()];
        config
            .grid
            .ranges
            .insert("Temp".into(), ParamRange::numeric(140.0, 160.0));
        config.base = make_record();
        let engine = Engine::new(Arc::new(make_bare_artifact()), config);

        let request = engine.grid_request().unwrap();
        assert_eq!(request.axes[0].values, vec![140.0, 150.0, 160.0]);
        let table = engine.simulate().unwrap();
        assert_eq!(table.len(), 3);
    }

    #[test]
    fn test_configured_range_overrides_artifact_domain() {
        let mut config = EngineConfig::default();
        config.grid.points = 2;
        config
            .grid
            .ranges
            .insert("Pressure".into(), ParamRange::numeric(2.0, 4.0));
        let request = make_engine(config).grid_request().unwrap();
        assert_eq!(request.axes[0].values, vec![100.0, 200.0]);
        assert_eq!(request.axes[1].values, vec![2.0, 4.0]);
    }

    #[test]
    fn test_grid_without_any_range_is_schema_error() {
        let mut config = EngineConfig::default();
        config.grid.axes = vec!["Temp".into()];
        config.base = make_record();
        let engine = Engine::new(Arc::new(make_bare_artifact()), config);
        assert!(matches!(
            engine.grid_request(),
            Err(EngineError::ArtifactSchema(_))
        ));
    }

    #[test]
    fn test_categorical_grid_axis_rejected() {
        let mut config = EngineConfig::default();
        config.grid.axes = vec!["Pattern".into()];
        let err = make_engine(config).grid_request().unwrap_err();
        assert!(matches!(err, EngineError::Configuration(_)));
    }

    #[test]
    fn test_standards_request_expands_empty_lists() {
        let mut config = EngineConfig::default();
        config.search.category_axis = "Grade".into();
        let request = make_engine(config).standards_request();
        assert_eq!(request.numeric, vec!["Temp", "Pressure"]);
        assert_eq!(request.categorical, vec!["Pattern"]);
    }

    #[test]
    fn test_optimize_one_row_per_grade() {
        let mut config = EngineConfig::default();
        config.search.category_axis = "Grade".into();
        config.search.trials_per_category = 20;
        let table = make_engine(config).optimize().unwrap();
        let categories: Vec<&str> = table.rows.iter().map(|r| r.category.as_str()).collect();
        assert_eq!(categories, vec!["G1", "G2"]);
        assert_eq!(table.parameter_columns, vec!["Temp", "Pressure", "Pattern"]);
    }
}
