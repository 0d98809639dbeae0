//! Decisions under missing class calls.
//!
//! - exact posterior probability that an isolate reaches the MDR threshold
//! - expected value of perfect information for each untested class
//! - description-length gain of recurring hyperedges
//! - Shapley attribution of the threshold indicator to the prevalent classes
//!
//! Posterior enumeration is exponential in the number of missing classes
//! and the Shapley value in `top_n`. Both are bounded by the caller through
//! configuration; above [`MAX_ENUMERATED_MISSING`] the posterior switches to
//! the equivalent Bernoulli convolution.

use crate::hypergraph::Hyperedge;
use crate::mdr::{class_priors, count_distribution, upper_tail};
use crate::subsets::combinations;
use amrscope_core::types::{Call, ObservationMatrix};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// Largest missing-class count handled by explicit enumeration.
pub const MAX_ENUMERATED_MISSING: usize = 24;

/// Prior for a missing class with no prevalence estimate.
pub const DEFAULT_MISSING_PRIOR: f64 = 0.5;

/// P(resistant-class count ≥ threshold) for one isolate, with every missing
/// class resistant independently with probability `priors[class]`.
pub fn posterior_mdr_probability(row: &[Call], priors: &[f64], threshold: usize) -> f64 {
    let known = row.iter().filter(|c| **c == Some(true)).count();
    let missing: Vec<f64> = row
        .iter()
        .enumerate()
        .filter(|(_, c)| c.is_none())
        .map(|(i, _)| priors.get(i).copied().unwrap_or(DEFAULT_MISSING_PRIOR))
        .collect();

    if known >= threshold {
        return 1.0;
    }
    if known + missing.len() < threshold {
        return 0.0;
    }
    let need = threshold - known;

    let p = if missing.len() <= MAX_ENUMERATED_MISSING {
        let mut total = 0.0;
        for mask in 0u32..(1u32 << missing.len()) {
            if (mask.count_ones() as usize) < need {
                continue;
            }
            let weight: f64 = missing
                .iter()
                .enumerate()
                .map(|(i, &pc)| if (mask >> i) & 1 == 1 { pc } else { 1.0 - pc })
                .product();
            total += weight;
        }
        total
    } else {
        upper_tail(&count_distribution(&missing), need)
    };
    p.clamp(0.0, 1.0)
}

/// min(p·FN cost, (1 − p)·FP cost).
pub fn bayes_risk(p_mdr: f64, fn_cost: f64, fp_cost: f64) -> f64 {
    (p_mdr * fn_cost).min((1.0 - p_mdr) * fp_cost)
}

/// Parameters of the next-best-test ranking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvpiParams {
    pub threshold: usize,
    /// Cost of calling an MDR isolate non-MDR.
    pub fn_cost: f64,
    /// Cost of calling a non-MDR isolate MDR.
    pub fp_cost: f64,
    /// Per-class test cost overrides; classes not listed cost 1.0.
    pub test_costs: BTreeMap<String, f64>,
}

impl Default for EvpiParams {
    fn default() -> Self {
        Self {
            threshold: 3,
            fn_cost: 5.0,
            fp_cost: 1.0,
            test_costs: BTreeMap::new(),
        }
    }
}

/// Value of testing one missing class of one isolate.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvpiRow {
    pub isolate: String,
    pub candidate_test_class: String,
    pub current_p_mdr: f64,
    pub current_bayes_risk: f64,
    pub expected_bayes_risk_after_test: f64,
    pub evpi_risk_reduction: f64,
    pub test_cost: f64,
    pub evpi_per_cost: f64,
    pub class_prevalence: f64,
    pub current_uncertain: bool,
    pub n_tested: usize,
}

/// Rank the missing classes of every incomplete isolate by the expected
/// reduction in Bayes risk from testing them.
///
/// Rows are ordered by isolate, then EVPI per unit cost and raw EVPI,
/// both descending.
pub fn next_best_test_evpi(classes: &ObservationMatrix, params: &EvpiParams) -> Vec<EvpiRow> {
    if classes.is_empty() {
        return Vec::new();
    }
    let names = classes.column_names();
    let priors = class_priors(classes, DEFAULT_MISSING_PRIOR);
    let costs: Vec<f64> = names
        .iter()
        .map(|c| params.test_costs.get(c).map(|v| v.max(1e-9)).unwrap_or(1.0))
        .collect();
    let risk = |p: f64| bayes_risk(p, params.fn_cost, params.fp_cost);

    let mut rows = Vec::new();
    for (r, isolate) in classes.row_ids().iter().enumerate() {
        let row = classes.row(r);
        if row.iter().all(|c| c.is_some()) {
            continue;
        }
        let p_mdr = posterior_mdr_probability(&row, &priors, params.threshold);
        let risk0 = risk(p_mdr);
        let n_tested = row.iter().filter(|c| c.is_some()).count();

        for (c, call) in row.iter().enumerate() {
            if call.is_some() {
                continue;
            }
            let pc = priors[c];
            let mut resolved = row.clone();
            resolved[c] = Some(true);
            let p1 = posterior_mdr_probability(&resolved, &priors, params.threshold);
            resolved[c] = Some(false);
            let p0 = posterior_mdr_probability(&resolved, &priors, params.threshold);
            let risk_after = pc * risk(p1) + (1.0 - pc) * risk(p0);
            let evpi = (risk0 - risk_after).max(0.0);
            rows.push(EvpiRow {
                isolate: isolate.clone(),
                candidate_test_class: names[c].clone(),
                current_p_mdr: p_mdr,
                current_bayes_risk: risk0,
                expected_bayes_risk_after_test: risk_after,
                evpi_risk_reduction: evpi,
                test_cost: costs[c],
                evpi_per_cost: evpi / costs[c],
                class_prevalence: pc,
                current_uncertain: p_mdr > 0.0 && p_mdr < 1.0,
                n_tested,
            });
        }
    }

    rows.sort_by(|a, b| {
        a.isolate
            .cmp(&b.isolate)
            .then_with(|| desc(a.evpi_per_cost, b.evpi_per_cost))
            .then_with(|| desc(a.evpi_risk_reduction, b.evpi_risk_reduction))
    });
    rows
}

fn desc(a: f64, b: f64) -> Ordering {
    b.partial_cmp(&a).unwrap_or(Ordering::Equal)
}

/// Description-length view of a hyperedge.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompressionRow {
    pub hyperedge: String,
    pub size: usize,
    pub count: usize,
    pub support: f64,
    /// size × log2(total pattern count)
    pub bits_naive: f64,
    /// −log2(support)
    pub bits_mdl: f64,
    pub compression_gain: f64,
}

/// Compression gain of every hyperedge, largest first.
pub fn pattern_mdl_compression(hyperedges: &[Hyperedge]) -> Vec<CompressionRow> {
    if hyperedges.is_empty() {
        return Vec::new();
    }
    let total = hyperedges.iter().map(|h| h.count).sum::<usize>().max(2) as f64;
    let mut rows: Vec<CompressionRow> = hyperedges
        .iter()
        .map(|h| {
            let bits_naive = h.size as f64 * total.log2();
            let bits_mdl = -h.support.max(1e-12).log2();
            CompressionRow {
                hyperedge: h.label(),
                size: h.size,
                count: h.count,
                support: h.support,
                bits_naive,
                bits_mdl,
                compression_gain: bits_naive - bits_mdl,
            }
        })
        .collect();
    rows.sort_by(|a, b| desc(a.compression_gain, b.compression_gain));
    rows
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ShapleyRow {
    pub class: String,
    pub shapley_mdr_contribution: f64,
    pub prevalence: f64,
}

/// Shapley value of each of the `top_n` most prevalent classes for the game
/// v(S) = [Σ_{c∈S} prevalence(c) ≥ threshold].
///
/// Classes never observed rank last and count with prevalence 0.5.
pub fn shapley_pattern_contributions(
    classes: &ObservationMatrix,
    threshold: usize,
    top_n: usize,
) -> Vec<ShapleyRow> {
    let mut ranked: Vec<(String, Option<f64>)> = classes
        .column_names()
        .iter()
        .enumerate()
        .map(|(i, name)| (name.clone(), classes.observed_mean(i)))
        .collect();
    ranked.sort_by(|a, b| match (a.1, b.1) {
        (Some(x), Some(y)) => desc(x, y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });
    ranked.truncate(top_n);
    if ranked.is_empty() {
        return Vec::new();
    }

    let prev: Vec<f64> = ranked
        .iter()
        .map(|(_, p)| p.unwrap_or(DEFAULT_MISSING_PRIOR))
        .collect();
    let n = prev.len();
    let target = threshold as f64;
    let value = |sum: f64| if sum >= target { 1.0 } else { 0.0 };
    let weight = |r: usize| factorial(r) * factorial(n - r - 1) / factorial(n);

    let mut rows: Vec<ShapleyRow> = (0..n)
        .map(|f| {
            let others: Vec<usize> = (0..n).filter(|&i| i != f).collect();
            let mut phi = 0.0;
            for r in 0..=others.len() {
                let w = weight(r);
                for picks in combinations(others.len(), r) {
                    let sum: f64 = picks.iter().map(|&i| prev[others[i]]).sum();
                    phi += w * (value(sum + prev[f]) - value(sum));
                }
            }
            ShapleyRow {
                class: ranked[f].0.clone(),
                shapley_mdr_contribution: phi,
                prevalence: prev[f],
            }
        })
        .collect();
    rows.sort_by(|a, b| desc(a.shapley_mdr_contribution, b.shapley_mdr_contribution));
    rows
}

fn factorial(k: usize) -> f64 {
    (1..=k).map(|i| i as f64).product()
}
