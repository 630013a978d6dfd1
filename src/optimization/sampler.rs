//! Candidate Samplers for the Standards Search
//!
//! A sampler proposes the next candidate for one category search, given the
//! trials already evaluated in that search. Samplers hold their own RNG and
//! are never shared between categories.
//!
//! ## Key Features
//!
//! - [`RandomSampler`]: uniform draws, the baseline
//! - [`ParzenSampler`]: multi-objective tree-structured Parzen estimator.
//!   Trials are ranked by non-dominated sorting, the best `gamma` fraction
//!   forms the "good" set, and the candidate maximizing `l(x) / g(x)` among
//!   draws from the good density is proposed.

use rand::distributions::WeightedIndex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal as SampleNormal};
use statrs::distribution::{Continuous, ContinuousCDF, Normal};
use tracing::trace;

use super::pareto::non_dominated_ranks;
use crate::config::defaults;
use crate::types::{Objectives, ParamRecord, ParamValue, Trial};

// ============================================================================
// Search space
// ============================================================================

/// Domain of one optimizable parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum SearchDim {
    /// Closed interval
    Numeric {
        /// Parameter name
        name: String,
        /// Lower bound
        low: f64,
        /// Upper bound
        high: f64,
    },
    /// Finite choice set
    Categorical {
        /// Parameter name
        name: String,
        /// Allowed values
        choices: Vec<String>,
    },
}

impl SearchDim {
    /// Parameter name.
    pub fn name(&self) -> &str {
        match self {
            Self::Numeric { name, .. } | Self::Categorical { name, .. } => name,
        }
    }
}

/// Ordered set of optimizable dimensions: numeric first, then categorical.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchSpace {
    dims: Vec<SearchDim>,
}

impl SearchSpace {
    /// Space over `dims`, in the given order.
    pub fn new(dims: Vec<SearchDim>) -> Self {
        Self { dims }
    }

    /// Dimensions in proposal order.
    pub fn dims(&self) -> &[SearchDim] {
        &self.dims
    }

    /// Number of dimensions.
    pub fn len(&self) -> usize {
        self.dims.len()
    }

    /// True when nothing is optimizable.
    pub fn is_empty(&self) -> bool {
        self.dims.is_empty()
    }

    /// True when `record` assigns an in-domain value to every dimension.
    pub fn contains(&self, record: &ParamRecord) -> bool {
        self.dims.iter().all(|dim| match (dim, record.get(dim.name())) {
            (SearchDim::Numeric { low, high, .. }, Some(v)) => {
                v.as_numeric().is_some_and(|x| x >= *low && x <= *high)
            }
            (SearchDim::Categorical { choices, .. }, Some(v)) => {
                choices.iter().any(|c| *c == v.as_level())
            }
            (_, None) => false,
        })
    }
}

// ============================================================================
// Sampler trait
// ============================================================================

/// Proposes the next candidate of a category search.
pub trait Sampler: Send {
    /// Propose values for every dimension of `space`, given all trials
    /// evaluated so far in this search (in trial order).
    fn suggest(&mut self, space: &SearchSpace, history: &[Trial]) -> ParamRecord;
}

fn uniform_value(dim: &SearchDim, rng: &mut StdRng) -> ParamValue {
    match dim {
        SearchDim::Numeric { low, high, .. } => {
            if high > low {
                ParamValue::Numeric(rng.gen_range(*low..=*high))
            } else {
                ParamValue::Numeric(*low)
            }
        }
        SearchDim::Categorical { choices, .. } => {
            ParamValue::Categorical(choices[rng.gen_range(0..choices.len())].clone())
        }
    }
}

/// Uniform random proposals.
#[derive(Debug, Clone)]
pub struct RandomSampler {
    rng: StdRng,
}

impl RandomSampler {
    /// Seeded sampler.
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Sampler seeded from OS entropy.
    pub fn from_entropy() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }
}

impl Sampler for RandomSampler {
    fn suggest(&mut self, space: &SearchSpace, _history: &[Trial]) -> ParamRecord {
        space
            .dims()
            .iter()
            .map(|dim| (dim.name().to_string(), uniform_value(dim, &mut self.rng)))
            .collect()
    }
}

// ============================================================================
// Parzen estimator
// ============================================================================

/// Tuning knobs of [`ParzenSampler`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParzenSettings {
    /// Uniform trials before the density model kicks in
    pub startup_trials: usize,
    /// Fraction of ranked trials treated as "good", in (0, 1)
    pub gamma: f64,
    /// Joint draws from the good density scored per proposal
    pub candidates: usize,
}

impl Default for ParzenSettings {
    fn default() -> Self {
        Self {
            startup_trials: defaults::SEARCH_STARTUP_TRIALS,
            gamma: defaults::SEARCH_GAMMA,
            candidates: defaults::SEARCH_CANDIDATES,
        }
    }
}

/// Gaussian mixture over `[low, high]` with a uniform prior component.
struct NumericParzen {
    low: f64,
    high: f64,
    centers: Vec<f64>,
    sigma: f64,
}

impl NumericParzen {
    fn fit(observations: &[f64], low: f64, high: f64) -> Self {
        let range = high - low;
        let n = observations.len();
        let sigma = if n == 0 {
            range
        } else {
            let mean = observations.iter().sum::<f64>() / n as f64;
            let var =
                observations.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n as f64;
            // Scott's rule, kept inside [1%, 100%] of the range
            (1.06 * var.sqrt() * (n as f64).powf(-0.2)).clamp(range * 0.01, range)
        };
        Self {
            low,
            high,
            centers: observations.to_vec(),
            sigma,
        }
    }

    /// Prior plus one component per observation, equally weighted.
    fn components(&self) -> f64 {
        (self.centers.len() + 1) as f64
    }

    fn density(&self, x: f64) -> f64 {
        let range = self.high - self.low;
        let mut total = 1.0 / range;
        for &mu in &self.centers {
            if let Ok(kernel) = Normal::new(mu, self.sigma) {
                let mass = kernel.cdf(self.high) - kernel.cdf(self.low);
                if mass > f64::EPSILON {
                    total += kernel.pdf(x) / mass;
                }
            }
        }
        total / self.components()
    }

    fn sample(&self, rng: &mut StdRng) -> f64 {
        let pick = rng.gen_range(0..=self.centers.len());
        if pick == self.centers.len() {
            return rng.gen_range(self.low..=self.high);
        }
        let mu = self.centers[pick];
        let Ok(kernel) = SampleNormal::new(mu, self.sigma) else {
            return mu.clamp(self.low, self.high);
        };
        for _ in 0..32 {
            let x = kernel.sample(rng);
            if x >= self.low && x <= self.high {
                return x;
            }
        }
        mu.clamp(self.low, self.high)
    }
}

/// Smoothed frequency estimate over a choice set.
struct CategoricalParzen {
    weights: Vec<f64>,
}

impl CategoricalParzen {
    fn fit(observations: &[String], choices: &[String]) -> Self {
        let mut counts = vec![1.0; choices.len()];
        for obs in observations {
            if let Some(i) = choices.iter().position(|c| c == obs) {
                counts[i] += 1.0;
            }
        }
        let total: f64 = counts.iter().sum();
        Self {
            weights: counts.into_iter().map(|c| c / total).collect(),
        }
    }
}

/// Multi-objective tree-structured Parzen estimator.
#[derive(Debug, Clone)]
pub struct ParzenSampler {
    rng: StdRng,
    settings: ParzenSettings,
}

impl ParzenSampler {
    /// Seeded sampler.
    pub fn seeded(seed: u64, settings: ParzenSettings) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            settings,
        }
    }

    /// Sampler seeded from OS entropy.
    pub fn from_entropy(settings: ParzenSettings) -> Self {
        Self {
            rng: StdRng::from_entropy(),
            settings,
        }
    }

    /// Split trial indices into (good, bad).
    ///
    /// Order: non-domination rank, then higher mean, then trial order.
    fn split(&self, history: &[Trial]) -> (Vec<usize>, Vec<usize>) {
        let objectives: Vec<Objectives> = history.iter().map(Trial::objectives).collect();
        let ranks = non_dominated_ranks(&objectives);
        let mut order: Vec<usize> = (0..history.len()).collect();
        order.sort_by(|&a, &b| {
            ranks[a]
                .cmp(&ranks[b])
                .then_with(|| history[b].mean().total_cmp(&history[a].mean()))
                .then_with(|| a.cmp(&b))
        });
        let n = history.len();
        let n_good = ((self.settings.gamma * n as f64).ceil() as usize).clamp(1, n - 1);
        let bad = order.split_off(n_good);
        (order, bad)
    }
}

impl Sampler for ParzenSampler {
    fn suggest(&mut self, space: &SearchSpace, history: &[Trial]) -> ParamRecord {
        if history.len() < self.settings.startup_trials.max(2) {
            return space
                .dims()
                .iter()
                .map(|dim| (dim.name().to_string(), uniform_value(dim, &mut self.rng)))
                .collect();
        }

        let (good, bad) = self.split(history);
        let n_candidates = self.settings.candidates.max(1);
        let mut candidates: Vec<ParamRecord> = vec![ParamRecord::new(); n_candidates];
        let mut scores = vec![0.0_f64; n_candidates];

        for dim in space.dims() {
            let name = dim.name();
            match dim {
                SearchDim::Numeric { low, high, .. } => {
                    if high <= low {
                        for c in &mut candidates {
                            c.insert(name, *low);
                        }
                        continue;
                    }
                    let observe = |idx: &[usize]| -> Vec<f64> {
                        idx.iter()
                            .filter_map(|&i| history[i].params.get(name)?.as_numeric())
                            .collect()
                    };
                    let l = NumericParzen::fit(&observe(&good[..]), *low, *high);
                    let g = NumericParzen::fit(&observe(&bad[..]), *low, *high);
                    for (c, score) in candidates.iter_mut().zip(&mut scores) {
                        let x = l.sample(&mut self.rng);
                        *score += l.density(x).ln() - g.density(x).ln();
                        c.insert(name, x);
                    }
                }
                SearchDim::Categorical { choices, .. } => {
                    let observe = |idx: &[usize]| -> Vec<String> {
                        idx.iter()
                            .filter_map(|&i| history[i].params.get(name).map(ParamValue::as_level))
                            .collect()
                    };
                    let l = CategoricalParzen::fit(&observe(&good[..]), choices);
                    let g = CategoricalParzen::fit(&observe(&bad[..]), choices);
                    let Ok(pick) = WeightedIndex::new(&l.weights) else {
                        for c in &mut candidates {
                            c.insert(name, uniform_value(dim, &mut self.rng));
                        }
                        continue;
                    };
                    for (c, score) in candidates.iter_mut().zip(&mut scores) {
                        let i = pick.sample(&mut self.rng);
                        *score += l.weights[i].ln() - g.weights[i].ln();
                        c.insert(name, choices[i].clone());
                    }
                }
            }
        }

        let mut best = 0;
        for (i, s) in scores.iter().enumerate().skip(1) {
            if *s > scores[best] {
                best = i;
            }
        }
        trace!(
            good = good.len(),
            bad = bad.len(),
            score = scores[best],
            "Parzen proposal"
        );
        candidates.swap_remove(best)
    }
}
