//! StandardsOptimizer: per-category multi-objective parameter search
//!
//! For every value of the category axis an isolated search runs a fixed
//! budget of trials, each trial scored by the ensemble as `(dispersion,
//! -mean)`. The Pareto front of the finished search is reduced to a single
//! recommendation: the front member with the highest predicted mean.

use std::collections::HashSet;

use chrono::Utc;
use rayon::prelude::*;
use tracing::{debug, info, warn};

use super::pareto::{pareto_front, select_winner};
use super::sampler::{ParzenSampler, ParzenSettings, Sampler, SearchDim, SearchSpace};
use crate::config::defaults;
use crate::engine::{FeatureAligner, Predictor};
use crate::error::{EngineError, Result};
use crate::model::{ModelArtifact, ParamKind};
use crate::types::{ParamRecord, StandardsRow, StandardsTable, Trial};

/// What to search.
#[derive(Debug, Clone)]
pub struct StandardsRequest {
    /// Categorical parameter whose values each get their own search
    pub category_axis: String,
    /// Category values to search; empty means every value in the axis domain
    pub categories: Vec<String>,
    /// Optimizable numeric parameters
    pub numeric: Vec<String>,
    /// Optimizable categorical parameters
    pub categorical: Vec<String>,
    /// Trials evaluated per category
    pub trials_per_category: usize,
    /// Values for every other required parameter
    pub base: ParamRecord,
}

/// How to search.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchSettings {
    /// Sampler tuning
    pub parzen: ParzenSettings,
    /// Base seed; category `i` uses `seed + i`. `None` draws from entropy.
    pub seed: Option<u64>,
    /// Run categories on the rayon pool
    pub parallel_categories: bool,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            parzen: ParzenSettings::default(),
            seed: Some(defaults::SEARCH_SEED),
            parallel_categories: true,
        }
    }
}

/// Immutable inputs of one category search.
#[derive(Debug, Clone)]
pub struct SearchContext {
    /// Position of the category in the request
    pub index: usize,
    /// Category value held fixed for the whole search
    pub category: String,
    /// Optimizable dimensions
    pub space: SearchSpace,
    /// Base record with the category value injected
    pub fixed: ParamRecord,
    /// Trial budget
    pub trials: usize,
    /// Sampler seed, if deterministic
    pub seed: Option<u64>,
}

/// Runs standards searches against a predictor.
pub struct StandardsOptimizer<'a, P: Predictor> {
    artifact: &'a ModelArtifact,
    aligner: &'a FeatureAligner<'a>,
    predictor: &'a P,
    settings: SearchSettings,
}

impl<'a, P: Predictor> StandardsOptimizer<'a, P> {
    /// Optimizer with default settings.
    pub fn new(
        artifact: &'a ModelArtifact,
        aligner: &'a FeatureAligner<'a>,
        predictor: &'a P,
    ) -> Self {
        Self {
            artifact,
            aligner,
            predictor,
            settings: SearchSettings::default(),
        }
    }

    /// Override the search settings.
    #[must_use]
    pub const fn with_settings(mut self, settings: SearchSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Produce the standards table using the Parzen sampler.
    pub fn optimize(&self, request: &StandardsRequest) -> Result<StandardsTable> {
        let parzen = self.settings.parzen;
        self.optimize_with(request, |ctx| match ctx.seed {
            Some(seed) => ParzenSampler::seeded(seed, parzen),
            None => ParzenSampler::from_entropy(parzen),
        })
    }

    /// Produce the standards table with a caller-supplied sampler factory.
    ///
    /// The factory is called once per category, so no sampler state is
    /// shared between searches.
    ///
    /// # Errors
    /// - `ArtifactSchema` when the artifact has no domain map or lacks an
    ///   entry for a searched parameter
    /// - `Configuration` for unknown or wrongly-typed parameter names, a
    ///   category axis that is not categorical or is also optimizable, a
    ///   zero trial budget, or a base record missing a required parameter
    pub fn optimize_with<S, F>(&self, request: &StandardsRequest, make_sampler: F) -> Result<StandardsTable>
    where
        S: Sampler,
        F: Fn(&SearchContext) -> S + Sync,
    {
        let contexts = self.prepare(request)?;
        info!(
            category_axis = %request.category_axis,
            categories = contexts.len(),
            trials = request.trials_per_category,
            parallel = self.settings.parallel_categories,
            "Starting standards search"
        );

        let rows: Vec<StandardsRow> = if self.settings.parallel_categories {
            contexts
                .par_iter()
                .map(|ctx| self.search_category(ctx, make_sampler(ctx)))
                .collect::<Result<_>>()?
        } else {
            contexts
                .iter()
                .map(|ctx| self.search_category(ctx, make_sampler(ctx)))
                .collect::<Result<_>>()?
        };

        info!(rows = rows.len(), "Standards search complete");
        Ok(StandardsTable {
            category_axis: request.category_axis.clone(),
            parameter_columns: request
                .numeric
                .iter()
                .chain(&request.categorical)
                .cloned()
                .collect(),
            rows,
            generated_at: Utc::now(),
        })
    }

    /// Validate the request and build one context per category.
    pub fn prepare(&self, request: &StandardsRequest) -> Result<Vec<SearchContext>> {
        let domains = self.artifact.domains()?;
        let layout = self.artifact.layout();

        match layout.kind(&request.category_axis) {
            Some(ParamKind::Categorical) => {}
            Some(ParamKind::Numeric) => {
                return Err(EngineError::config(format!(
                    "category axis '{}' is numeric, it must be categorical",
                    request.category_axis
                )))
            }
            None => {
                return Err(EngineError::config(format!(
                    "category axis '{}' is not a model parameter",
                    request.category_axis
                )))
            }
        }
        if request.trials_per_category == 0 {
            return Err(EngineError::config("trials per category must be at least 1"));
        }

        let mut seen = HashSet::new();
        let mut dims = Vec::with_capacity(request.numeric.len() + request.categorical.len());
        for (names, expected) in [
            (&request.numeric, ParamKind::Numeric),
            (&request.categorical, ParamKind::Categorical),
        ] {
            for name in names {
                if *name == request.category_axis {
                    return Err(EngineError::config(format!(
                        "'{name}' is the category axis and cannot also be optimized"
                    )));
                }
                if !seen.insert(name.as_str()) {
                    return Err(EngineError::config(format!(
                        "'{name}' is listed as optimizable more than once"
                    )));
                }
                match layout.kind(name) {
                    Some(kind) if kind == expected => {}
                    Some(kind) => {
                        return Err(EngineError::config(format!(
                            "'{name}' is {kind:?} but was listed as {expected:?}"
                        )))
                    }
                    None => {
                        return Err(EngineError::config(format!(
                            "optimizable parameter '{name}' is not a model parameter"
                        )))
                    }
                }
                let range = domains.get(name).ok_or_else(|| {
                    EngineError::schema(format!("domain map has no entry for '{name}'"))
                })?;
                dims.push(match (range.bounds(), range.values()) {
                    (Some((low, high)), _) => SearchDim::Numeric {
                        name: name.clone(),
                        low,
                        high,
                    },
                    (None, Some(values)) => SearchDim::Categorical {
                        name: name.clone(),
                        choices: values.to_vec(),
                    },
                    (None, None) => {
                        return Err(EngineError::schema(format!("domain of '{name}' is empty")))
                    }
                });
            }
        }
        let space = SearchSpace::new(dims);

        let allowed: Vec<String> = domains
            .get(&request.category_axis)
            .and_then(|r| r.values())
            .map(<[String]>::to_vec)
            .unwrap_or_default();
        let categories = if request.categories.is_empty() {
            if allowed.is_empty() {
                return Err(EngineError::schema(format!(
                    "domain map has no values for category axis '{}'",
                    request.category_axis
                )));
            }
            allowed.clone()
        } else {
            request.categories.clone()
        };
        for category in &categories {
            if !allowed.contains(category) {
                warn!(
                    category_axis = %request.category_axis,
                    category = %category,
                    "Category value not in the trained domain, searching anyway"
                );
            }
        }

        let contexts: Vec<SearchContext> = categories
            .into_iter()
            .enumerate()
            .map(|(index, category)| {
                let mut fixed = request.base.clone();
                fixed.insert(request.category_axis.clone(), category.clone());
                SearchContext {
                    index,
                    category,
                    space: space.clone(),
                    fixed,
                    trials: request.trials_per_category,
                    seed: self.settings.seed.map(|s| s.wrapping_add(index as u64)),
                }
            })
            .collect();

        // Surface a missing base parameter before spending any trials.
        if let Some(ctx) = contexts.first() {
            let mut first = ctx.fixed.clone();
            for dim in ctx.space.dims() {
                match dim {
                    SearchDim::Numeric { name, low, .. } => first.insert(name.clone(), *low),
                    SearchDim::Categorical { name, choices } => {
                        first.insert(name.clone(), choices[0].clone());
                    }
                }
            }
            self.aligner.align(&first)?;
        }

        Ok(contexts)
    }

    /// Run one category's trial budget and pick its recommendation.
    fn search_category<S: Sampler>(&self, ctx: &SearchContext, mut sampler: S) -> Result<StandardsRow> {
        let mut history: Vec<Trial> = Vec::with_capacity(ctx.trials);
        for number in 0..ctx.trials {
            let proposal = sampler.suggest(&ctx.space, &history);
            let mut record = ctx.fixed.clone();
            record.merge(&proposal);
            let encoded = self.aligner.align(&record)?;
            let prediction = self.predictor.predict(&encoded)?;
            debug!(
                category = %ctx.category,
                trial = number,
                mean = prediction.mean,
                dispersion = prediction.dispersion,
                "Trial evaluated"
            );
            history.push(Trial {
                number,
                params: proposal,
                prediction,
            });
        }

        let front = pareto_front(&history);
        let winner = select_winner(&history, &front).ok_or_else(|| {
            EngineError::config(format!("category '{}' produced no trials", ctx.category))
        })?;
        let best = &history[winner];
        info!(
            category = %ctx.category,
            front = front.len(),
            trial = best.number,
            mean = best.mean(),
            dispersion = best.dispersion(),
            "Category standard selected"
        );
        Ok(StandardsRow {
            category: ctx.category.clone(),
            params: best.params.clone(),
            predicted_mean: best.mean(),
            predicted_dispersion: best.dispersion(),
            winning_trial: best.number,
            front_size: front.len(),
        })
    }
}
