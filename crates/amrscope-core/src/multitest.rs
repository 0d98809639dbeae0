//! Multiple-testing correction for families of p-values.

use crate::error::AmrError;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// p-value adjustment procedure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PAdjustMethod {
    /// Benjamini–Hochberg false discovery rate.
    #[default]
    FdrBh,
    /// Benjamini–Yekutieli false discovery rate (arbitrary dependence).
    FdrBy,
    /// Bonferroni family-wise error rate.
    Bonferroni,
    /// Holm step-down family-wise error rate.
    Holm,
}

impl PAdjustMethod {
    pub const ALL: [PAdjustMethod; 4] = [
        PAdjustMethod::FdrBh,
        PAdjustMethod::FdrBy,
        PAdjustMethod::Bonferroni,
        PAdjustMethod::Holm,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PAdjustMethod::FdrBh => "fdr_bh",
            PAdjustMethod::FdrBy => "fdr_by",
            PAdjustMethod::Bonferroni => "bonferroni",
            PAdjustMethod::Holm => "holm",
        }
    }
}

impl fmt::Display for PAdjustMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PAdjustMethod {
    type Err = AmrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PAdjustMethod::ALL
            .into_iter()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| {
                AmrError::invalid_config("fdr_method", s, "expected fdr_bh, fdr_by, bonferroni or holm")
            })
    }
}

/// Adjust p-values; output is aligned with the input order.
pub fn adjust_pvalues(pvalues: &[f64], method: PAdjustMethod) -> Vec<f64> {
    let n = pvalues.len();
    if n == 0 {
        return Vec::new();
    }
    let nf = n as f64;

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&i, &j| pvalues[i].partial_cmp(&pvalues[j]).unwrap_or(Ordering::Equal));
    let sorted: Vec<f64> = order.iter().map(|&i| pvalues[i]).collect();

    let adjusted_sorted: Vec<f64> = match method {
        PAdjustMethod::Bonferroni => sorted.iter().map(|p| (p * nf).min(1.0)).collect(),
        PAdjustMethod::Holm => {
            let mut running = 0.0_f64;
            sorted
                .iter()
                .enumerate()
                .map(|(i, p)| {
                    running = running.max((nf - i as f64) * p);
                    running.min(1.0)
                })
                .collect()
        }
        PAdjustMethod::FdrBh | PAdjustMethod::FdrBy => {
            let cm = if method == PAdjustMethod::FdrBy {
                (1..=n).map(|k| 1.0 / k as f64).sum::<f64>()
            } else {
                1.0
            };
            let mut out = vec![0.0; n];
            let mut running = f64::INFINITY;
            for i in (0..n).rev() {
                let candidate = sorted[i] * nf * cm / (i + 1) as f64;
                running = running.min(candidate);
                out[i] = running.min(1.0);
            }
            out
        }
    };

    let mut adjusted = vec![0.0; n];
    for (rank, &idx) in order.iter().enumerate() {
        adjusted[idx] = adjusted_sorted[rank];
    }
    adjusted
}

/// Adjusted p-values plus a rejection flag (adjusted p < α) per test.
pub fn significant(pvalues: &[f64], method: PAdjustMethod, alpha: f64) -> Vec<(f64, bool)> {
    adjust_pvalues(pvalues, method)
        .into_iter()
        .map(|p| (p, p < alpha))
        .collect()
}
