//! Multidrug-resistance classification under missing class calls.
//!
//! Every isolate carries a lower bound (known resistant classes) and an
//! upper bound (known plus missing) on its resistant-class count. Calls are
//! only definite when both bounds agree.

use amrscope_core::special::beta_ppf;
use amrscope_core::types::{Call, CallCounts, ObservationMatrix};
use serde::Serialize;
use std::fmt;

/// Resistance category of an isolate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Category {
    #[serde(rename = "susceptible")]
    Susceptible,
    #[serde(rename = "MDR")]
    Mdr,
    #[serde(rename = "XDR")]
    Xdr,
    #[serde(rename = "PDR")]
    Pdr,
}

impl Category {
    /// Category for `resistant` classes out of `n_classes`.
    ///
    /// XDR (all but at most two classes) also requires the MDR threshold, so
    /// the categories nest: with fewer than `threshold + 2` classes an
    /// isolate below the threshold is never XDR.
    pub fn of(resistant: usize, n_classes: usize, threshold: usize) -> Self {
        if n_classes > 0 && resistant >= n_classes {
            Category::Pdr
        } else if resistant >= threshold && resistant + 2 >= n_classes {
            Category::Xdr
        } else if resistant >= threshold {
            Category::Mdr
        } else {
            Category::Susceptible
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Susceptible => "susceptible",
            Category::Mdr => "MDR",
            Category::Xdr => "XDR",
            Category::Pdr => "PDR",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Known-resistant and missing class counts of one isolate's row.
pub fn resistance_bounds(row: &[Call]) -> (usize, usize) {
    let counts = CallCounts::of(row);
    (counts.positive, counts.missing)
}

/// `Some(true)` definitely MDR, `Some(false)` definitely not, `None` when
/// the missing classes could still decide it.
pub fn identify_mdr(classes: &ObservationMatrix, threshold: usize) -> Vec<Option<bool>> {
    (0..classes.n_rows())
        .map(|row| {
            let (min_res, missing) = resistance_bounds(&classes.row(row));
            if min_res >= threshold {
                Some(true)
            } else if min_res + missing < threshold {
                Some(false)
            } else {
                None
            }
        })
        .collect()
}

/// One isolate's position on the susceptible → PDR spectrum.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpectrumRow {
    pub isolate: String,
    pub n_classes_resistant_min: usize,
    pub n_classes_resistant_max: usize,
    /// Category from the known-resistant count.
    pub category_definite: Category,
    /// Category if every missing class turned out resistant.
    pub category_possible: Category,
    pub n_classes_total: usize,
    pub n_classes_missing: usize,
}

pub fn mdr_spectrum(classes: &ObservationMatrix, threshold: usize) -> Vec<SpectrumRow> {
    let n_classes = classes.n_cols();
    classes
        .row_ids()
        .iter()
        .enumerate()
        .map(|(row, isolate)| {
            let (min_res, missing) = resistance_bounds(&classes.row(row));
            let max_res = min_res + missing;
            SpectrumRow {
                isolate: isolate.clone(),
                n_classes_resistant_min: min_res,
                n_classes_resistant_max: max_res,
                category_definite: Category::of(min_res, n_classes, threshold),
                category_possible: Category::of(max_res, n_classes, threshold),
                n_classes_total: n_classes,
                n_classes_missing: missing,
            }
        })
        .collect()
}

/// Beta posterior summary of a prevalence.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Prevalence {
    pub posterior_mean: f64,
    pub posterior_mode: f64,
    pub ci_lo: f64,
    pub ci_hi: f64,
}

/// Jeffreys prior Beta(0.5, 0.5).
pub const JEFFREYS: (f64, f64) = (0.5, 0.5);

/// Posterior of `positives` out of `total` under a Beta(prior_a, prior_b)
/// prior with an equal-tailed credible interval. `None` when nothing was
/// observed.
pub fn bayesian_prevalence(
    positives: usize,
    total: usize,
    prior_a: f64,
    prior_b: f64,
    credible: f64,
) -> Option<Prevalence> {
    if total == 0 {
        return None;
    }
    let a = prior_a + positives as f64;
    let b = prior_b + (total - positives.min(total)) as f64;
    let mean = a / (a + b);
    let mode = if a > 1.0 && b > 1.0 {
        (a - 1.0) / (a + b - 2.0)
    } else {
        mean
    };
    let tail = (1.0 - credible) / 2.0;
    Some(Prevalence {
        posterior_mean: mean,
        posterior_mode: mode,
        ci_lo: beta_ppf(tail, a, b),
        ci_hi: beta_ppf(1.0 - tail, a, b),
    })
}

/// Per-class prevalence among tested isolates.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PrevalenceRow {
    pub class: String,
    pub positive: usize,
    pub total_observed: usize,
    pub total_all: usize,
    pub missing: usize,
    pub posterior_mean: Option<f64>,
    pub posterior_mode: Option<f64>,
    pub ci_lo: Option<f64>,
    pub ci_hi: Option<f64>,
}

pub fn prevalence_table(classes: &ObservationMatrix, credible: f64) -> Vec<PrevalenceRow> {
    classes
        .column_names()
        .iter()
        .enumerate()
        .map(|(idx, class)| {
            let counts = CallCounts::of(classes.column_at(idx));
            let post = bayesian_prevalence(
                counts.positive,
                counts.observed(),
                JEFFREYS.0,
                JEFFREYS.1,
                credible,
            );
            PrevalenceRow {
                class: class.clone(),
                positive: counts.positive,
                total_observed: counts.observed(),
                total_all: counts.total(),
                missing: counts.missing,
                posterior_mean: post.map(|p| p.posterior_mean),
                posterior_mode: post.map(|p| p.posterior_mode),
                ci_lo: post.map(|p| p.ci_lo),
                ci_hi: post.map(|p| p.ci_hi),
            }
        })
        .collect()
}

/// Observed prevalence of every class, `default` where nothing was observed.
pub fn class_priors(classes: &ObservationMatrix, default: f64) -> Vec<f64> {
    (0..classes.n_cols())
        .map(|idx| classes.observed_mean(idx).unwrap_or(default).clamp(0.0, 1.0))
        .collect()
}

/// Distribution of the number of successes among independent Bernoulli
/// trials with the given probabilities.
pub fn count_distribution(probs: &[f64]) -> Vec<f64> {
    let mut dist = vec![1.0];
    for &p in probs {
        let mut next = vec![0.0; dist.len() + 1];
        for (k, w) in dist.iter().enumerate() {
            next[k] += w * (1.0 - p);
            next[k + 1] += w * p;
        }
        dist = next;
    }
    dist
}

/// P(count ≥ need) under `dist`.
pub fn upper_tail(dist: &[f64], need: usize) -> f64 {
    dist.get(need..).map(|t| t.iter().sum()).unwrap_or(0.0)
}

/// Probability of each resistance category for one isolate.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MdrProbabilityRow {
    pub isolate: String,
    pub observed_resistant_classes: usize,
    pub missing_classes: usize,
    pub p_mdr: f64,
    pub p_xdr: f64,
    pub p_pdr: f64,
}

/// Category probabilities with each missing class drawn from its observed
/// prevalence. A class never observed contributes probability 0.
pub fn mdr_probability(classes: &ObservationMatrix, threshold: usize) -> Vec<MdrProbabilityRow> {
    let n_classes = classes.n_cols();
    let priors = class_priors(classes, 0.0);
    // XDR implies MDR, matching `Category::of`
    let xdr_need = threshold.max(n_classes.saturating_sub(2));

    classes
        .row_ids()
        .iter()
        .enumerate()
        .map(|(row, isolate)| {
            let calls = classes.row(row);
            let known = calls.iter().filter(|c| **c == Some(true)).count();
            let probs: Vec<f64> = calls
                .iter()
                .zip(&priors)
                .filter(|(c, _)| c.is_none())
                .map(|(_, p)| *p)
                .collect();
            let dist = count_distribution(&probs);
            let p_pdr = if n_classes == 0 {
                0.0
            } else {
                upper_tail(&dist, n_classes.saturating_sub(known))
            };
            MdrProbabilityRow {
                isolate: isolate.clone(),
                observed_resistant_classes: known,
                missing_classes: probs.len(),
                p_mdr: upper_tail(&dist, threshold.saturating_sub(known)),
                p_xdr: upper_tail(&dist, xdr_need.saturating_sub(known)),
                p_pdr,
            }
        })
        .collect()
}

/// Isolates with a definite call, definite MDR count and undecided count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct MdrSummary {
    pub n_definite: usize,
    pub n_mdr: usize,
    pub n_uncertain: usize,
}

impl MdrSummary {
    pub fn of(calls: &[Option<bool>]) -> Self {
        let mut s = Self::default();
        for c in calls {
            match c {
                Some(true) => {
                    s.n_definite += 1;
                    s.n_mdr += 1;
                }
                Some(false) => s.n_definite += 1,
                None => s.n_uncertain += 1,
            }
        }
        s
    }

    /// Percentage of definite calls that are MDR.
    pub fn rate(&self) -> Option<f64> {
        if self.n_definite == 0 {
            None
        } else {
            Some(100.0 * self.n_mdr as f64 / self.n_definite as f64)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const R: Call = Some(true);
    const S: Call = Some(false);
    const NA: Call = None;

    fn classes() -> ObservationMatrix {
        ObservationMatrix::from_columns(
            vec!["S1".into(), "S2".into(), "S3".into(), "S4".into()],
            vec![
                ("A".into(), vec![R, R, S, NA]),
                ("B".into(), vec![R, NA, S, NA]),
                ("C".into(), vec![S, NA, S, R]),
                ("D".into(), vec![R, S, S, S]),
            ],
        )
        .unwrap()
    }

    #[test]
    fn identify_mdr_respects_bounds() {
        let calls = identify_mdr(&classes(), 2);
        assert_eq!(calls, vec![Some(true), None, Some(false), None]);
        // known resistant count meeting the threshold is never "not MDR"
        let m = classes();
        for (row, call) in calls.iter().enumerate() {
            let (min_res, _) = resistance_bounds(&m.row(row));
            if min_res >= 2 {
                assert_eq!(*call, Some(true));
            }
        }
    }

    #[test]
    fn category_partition() {
        assert_eq!(Category::of(0, 6, 3), Category::Susceptible);
        assert_eq!(Category::of(3, 6, 3), Category::Mdr);
        assert_eq!(Category::of(4, 6, 3), Category::Xdr);
        assert_eq!(Category::of(6, 6, 3), Category::Pdr);
        // below the MDR threshold is never XDR, even with few classes
        assert_eq!(Category::of(1, 3, 2), Category::Susceptible);
        assert_eq!(Category::of(0, 0, 2), Category::Susceptible);
    }

    #[test]
    fn spectrum_rows() {
        let rows = mdr_spectrum(&classes(), 2);
        assert_eq!(rows[0].n_classes_resistant_min, 3);
        assert_eq!(rows[0].category_definite, Category::Xdr);
        assert_eq!(rows[1].n_classes_resistant_max, 3);
        assert_eq!(rows[1].category_definite, Category::Susceptible);
        assert_eq!(rows[1].category_possible, Category::Xdr);
        assert_eq!(rows[3].n_classes_missing, 2);
        assert!(rows.iter().all(|r| r.n_classes_total == 4));
    }

    #[test]
    fn jeffreys_prevalence_never_collapses() {
        for n in [1, 5, 50, 500] {
            let p = bayesian_prevalence(0, n, 0.5, 0.5, 0.95).unwrap();
            assert!(p.posterior_mean > 0.0);
            assert!(p.ci_lo < p.ci_hi);
        }
        assert!(bayesian_prevalence(0, 0, 0.5, 0.5, 0.95).is_none());
    }

    #[test]
    fn prevalence_interval_brackets_estimate() {
        let p = bayesian_prevalence(30, 100, 0.5, 0.5, 0.95).unwrap();
        assert!((p.posterior_mean - 30.5 / 101.0).abs() < 1e-12);
        assert!((p.posterior_mode - 29.5 / 99.0).abs() < 1e-12);
        assert!(p.ci_lo < 0.3 && 0.3 < p.ci_hi);
        assert!(p.ci_lo > 0.2 && p.ci_hi < 0.4);
    }

    #[test]
    fn prevalence_table_counts() {
        let rows = prevalence_table(&classes(), 0.95);
        assert_eq!(rows[1].class, "B");
        assert_eq!(rows[1].positive, 1);
        assert_eq!(rows[1].total_observed, 2);
        assert_eq!(rows[1].missing, 2);
        assert_eq!(rows[1].total_all, 4);
        assert!(rows[1].posterior_mean.is_some());
    }

    #[test]
    fn convolution_matches_hand_values() {
        let dist = count_distribution(&[0.5, 0.2]);
        assert!((dist[0] - 0.4).abs() < 1e-12);
        assert!((dist[1] - 0.5).abs() < 1e-12);
        assert!((dist[2] - 0.1).abs() < 1e-12);
        assert!((upper_tail(&dist, 1) - 0.6).abs() < 1e-12);
        assert_eq!(upper_tail(&dist, 3), 0.0);
    }

    #[test]
    fn probability_rows() {
        let rows = mdr_probability(&classes(), 2);
        assert_eq!(rows[0].p_mdr, 1.0);
        assert_eq!(rows[2].p_mdr, 0.0);
        // S2: one known, B (prev 0.5) and C (prev 1/3) missing
        let expected = 1.0 - 0.5 * (2.0 / 3.0);
        assert!((rows[1].p_mdr - expected).abs() < 1e-12);
        assert!(rows.iter().all(|r| r.p_pdr <= r.p_xdr && r.p_xdr <= r.p_mdr));
    }

    #[test]
    fn summary_rate() {
        let s = MdrSummary::of(&identify_mdr(&classes(), 2));
        assert_eq!(s, MdrSummary { n_definite: 2, n_mdr: 1, n_uncertain: 2 });
        assert_eq!(s.rate(), Some(50.0));
    }
}
