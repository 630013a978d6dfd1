//! Pareto dominance over `(dispersion, -mean)` objective pairs
//!
//! Both objectives are minimized: a trial is better when the ensemble agrees
//! more (lower dispersion) and predicts a faster outcome (higher mean).

use crate::types::{Objectives, Trial};

/// True when `a` dominates `b`: no worse on both objectives and strictly
/// better on at least one.
pub fn dominates(a: &Objectives, b: &Objectives) -> bool {
    a.dispersion <= b.dispersion
        && a.neg_mean <= b.neg_mean
        && (a.dispersion < b.dispersion || a.neg_mean < b.neg_mean)
}

/// Indices of the non-dominated trials, in trial order.
pub fn pareto_front(trials: &[Trial]) -> Vec<usize> {
    let objectives: Vec<Objectives> = trials.iter().map(Trial::objectives).collect();
    (0..objectives.len())
        .filter(|&i| !objectives.iter().any(|other| dominates(other, &objectives[i])))
        .collect()
}

/// Non-domination rank of every point (0 = Pareto front).
///
/// Plain peeling: repeatedly strip the current front from the remaining
/// set. Quadratic per layer, which is fine for per-category trial budgets.
pub fn non_dominated_ranks(objectives: &[Objectives]) -> Vec<usize> {
    let mut ranks = vec![usize::MAX; objectives.len()];
    let mut remaining: Vec<usize> = (0..objectives.len()).collect();
    let mut rank = 0;
    while !remaining.is_empty() {
        let front: Vec<usize> = remaining
            .iter()
            .copied()
            .filter(|&i| {
                !remaining
                    .iter()
                    .any(|&j| dominates(&objectives[j], &objectives[i]))
            })
            .collect();
        for &i in &front {
            ranks[i] = rank;
        }
        remaining.retain(|i| ranks[*i] == usize::MAX);
        rank += 1;
    }
    ranks
}

/// Front member with the greatest mean; the first encountered wins ties.
pub fn select_winner(trials: &[Trial], front: &[usize]) -> Option<usize> {
    let mut best: Option<usize> = None;
    for &i in front {
        match best {
            Some(b) if trials[i].mean() <= trials[b].mean() => {}
            _ => best = Some(i),
        }
    }
    best
}
