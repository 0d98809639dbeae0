//! Contingency tables over binary calls.
//!
//! Rows index the first variable's level (0, 1), columns the second's.
//! Only pairwise-complete observations are counted.

use crate::special::{chi2_sf, ln_choose};
use crate::types::Call;
use serde::Serialize;

/// Cross-tabulation of two binary columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CrossTab {
    counts: [[u64; 2]; 2],
}

impl CrossTab {
    /// Count pairwise-complete rows of `x` against `y`.
    pub fn from_calls(x: &[Call], y: &[Call]) -> Self {
        let mut counts = [[0u64; 2]; 2];
        for (xi, yi) in x.iter().zip(y) {
            if let (Some(xv), Some(yv)) = (xi, yi) {
                counts[*xv as usize][*yv as usize] += 1;
            }
        }
        Self { counts }
    }

    /// Count only the rows selected by `rows`.
    pub fn from_rows(x: &[Call], y: &[Call], rows: &[usize]) -> Self {
        let mut counts = [[0u64; 2]; 2];
        for &r in rows {
            if let (Some(xv), Some(yv)) = (x[r], y[r]) {
                counts[xv as usize][yv as usize] += 1;
            }
        }
        Self { counts }
    }

    pub fn count(&self, x: bool, y: bool) -> u64 {
        self.counts[x as usize][y as usize]
    }

    pub fn total(&self) -> u64 {
        self.counts.iter().flatten().sum()
    }

    fn row_levels(&self) -> Vec<usize> {
        (0..2)
            .filter(|&r| self.counts[r][0] + self.counts[r][1] > 0)
            .collect()
    }

    fn col_levels(&self) -> Vec<usize> {
        (0..2)
            .filter(|&c| self.counts[0][c] + self.counts[1][c] > 0)
            .collect()
    }

    /// Observed (rows, columns); levels with zero marginal are absent.
    pub fn shape(&self) -> (usize, usize) {
        (self.row_levels().len(), self.col_levels().len())
    }

    /// The full 2×2 table, if both variables show both levels.
    pub fn as_2x2(&self) -> Option<Contingency2x2> {
        if self.shape() != (2, 2) {
            return None;
        }
        Some(Contingency2x2 {
            a: self.counts[0][0],
            b: self.counts[0][1],
            c: self.counts[1][0],
            d: self.counts[1][1],
        })
    }

    /// Observed sub-table restricted to present levels.
    fn observed(&self) -> Vec<Vec<f64>> {
        let cols = self.col_levels();
        self.row_levels()
            .into_iter()
            .map(|r| cols.iter().map(|&c| self.counts[r][c] as f64).collect())
            .collect()
    }
}

/// A complete 2×2 table: `a` = (0,0), `b` = (0,1), `c` = (1,0), `d` = (1,1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Contingency2x2 {
    pub a: u64,
    pub b: u64,
    pub c: u64,
    pub d: u64,
}

impl Contingency2x2 {
    pub fn new(a: u64, b: u64, c: u64, d: u64) -> Self {
        Self { a, b, c, d }
    }

    pub fn total(&self) -> u64 {
        self.a + self.b + self.c + self.d
    }

    /// Expected counts under independence, row-major.
    pub fn expected(&self) -> [f64; 4] {
        let n = self.total() as f64;
        let (r0, r1) = ((self.a + self.b) as f64, (self.c + self.d) as f64);
        let (c0, c1) = ((self.a + self.c) as f64, (self.b + self.d) as f64);
        [r0 * c0 / n, r0 * c1 / n, r1 * c0 / n, r1 * c1 / n]
    }

    pub fn min_expected(&self) -> f64 {
        self.expected().iter().cloned().fold(f64::INFINITY, f64::min)
    }

    /// Phi coefficient; the margin product is floored at 1.
    pub fn phi(&self) -> f64 {
        let (a, b, c, d) = (self.a as f64, self.b as f64, self.c as f64, self.d as f64);
        let den = ((a + b) * (c + d) * (a + c) * (b + d)).max(1.0).sqrt();
        (a * d - b * c) / den
    }

    /// Two-sided Fisher exact p-value: total probability of tables with the
    /// same margins that are no more likely than the observed one.
    pub fn fisher_exact(&self) -> f64 {
        let n = self.total();
        let row0 = self.a + self.b;
        let col0 = self.a + self.c;
        let lo = (row0 + col0).saturating_sub(n);
        let hi = row0.min(col0);
        let ln_denom = ln_choose(n, row0);
        let ln_pmf = |k: u64| ln_choose(col0, k) + ln_choose(n - col0, row0 - k) - ln_denom;

        let observed = ln_pmf(self.a).exp();
        let cutoff = observed * (1.0 + 1e-7);
        let p: f64 = (lo..=hi)
            .map(|k| ln_pmf(k).exp())
            .filter(|&pk| pk <= cutoff)
            .sum();
        p.clamp(0.0, 1.0)
    }

    /// Pearson chi-squared with Yates' continuity correction.
    pub fn chi2(&self) -> Chi2Result {
        let tab = CrossTab {
            counts: [[self.a, self.b], [self.c, self.d]],
        };
        chi2_contingency(&tab).unwrap_or(Chi2Result {
            statistic: 0.0,
            p_value: 1.0,
            dof: 0,
        })
    }
}

/// Outcome of a chi-squared test of independence.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Chi2Result {
    pub statistic: f64,
    pub p_value: f64,
    pub dof: usize,
}

/// Chi-squared test on the observed levels of a cross-tabulation.
///
/// One degree of freedom gets Yates' correction; zero degrees of freedom
/// gives statistic 0 and p = 1. Returns `None` for an empty table.
pub fn chi2_contingency(tab: &CrossTab) -> Option<Chi2Result> {
    let obs = tab.observed();
    let r = obs.len();
    let c = obs.first().map(|row| row.len()).unwrap_or(0);
    if r == 0 || c == 0 {
        return None;
    }
    let n: f64 = obs.iter().flatten().sum();
    let row_sums: Vec<f64> = obs.iter().map(|row| row.iter().sum()).collect();
    let col_sums: Vec<f64> = (0..c).map(|j| obs.iter().map(|row| row[j]).sum()).collect();
    let dof = (r - 1) * (c - 1);
    if dof == 0 {
        return Some(Chi2Result {
            statistic: 0.0,
            p_value: 1.0,
            dof,
        });
    }

    let mut statistic = 0.0;
    for i in 0..r {
        for j in 0..c {
            let expected = row_sums[i] * col_sums[j] / n;
            let mut observed = obs[i][j];
            if dof == 1 {
                let diff = expected - observed;
                observed += diff.signum() * diff.abs().min(0.5);
            }
            statistic += (observed - expected).powi(2) / expected;
        }
    }
    Some(Chi2Result {
        statistic,
        p_value: chi2_sf(statistic, dof as f64),
        dof,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crosstab_drops_incomplete_pairs() {
        let x = [Some(false), Some(true), None, Some(true)];
        let y = [Some(false), Some(true), Some(true), None];
        let t = CrossTab::from_calls(&x, &y);
        assert_eq!(t.total(), 2);
        assert_eq!(t.shape(), (2, 2));
        assert_eq!(t.as_2x2().unwrap(), Contingency2x2::new(1, 0, 0, 1));
    }

    #[test]
    fn single_level_is_not_2x2() {
        let x = [Some(true), Some(true), Some(true)];
        let y = [Some(true), Some(false), Some(true)];
        let t = CrossTab::from_calls(&x, &y);
        assert_eq!(t.shape(), (1, 2));
        assert!(t.as_2x2().is_none());
        let r = chi2_contingency(&t).unwrap();
        assert_eq!(r.dof, 0);
        assert_eq!(r.p_value, 1.0);
        assert!(chi2_contingency(&CrossTab::default()).is_none());
    }

    #[test]
    fn fisher_matches_reference() {
        let t = Contingency2x2::new(8, 2, 1, 5);
        let p = t.fisher_exact();
        assert!((p - 0.034_965_034_965_034_97).abs() < 1e-9, "p = {}", p);
    }

    #[test]
    fn fisher_balanced_table_is_one() {
        let t = Contingency2x2::new(5, 5, 5, 5);
        assert!((t.fisher_exact() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn yates_corrected_statistic() {
        let t = Contingency2x2::new(10, 20, 30, 40);
        let r = t.chi2();
        let expected = 2.25 * (1.0 / 12.0 + 1.0 / 18.0 + 1.0 / 28.0 + 1.0 / 42.0);
        assert!((r.statistic - expected).abs() < 1e-12, "stat = {}", r.statistic);
        assert_eq!(r.dof, 1);
        assert!(r.p_value > 0.4 && r.p_value < 0.6);
    }

    #[test]
    fn phi_sign_and_range() {
        assert!((Contingency2x2::new(10, 0, 0, 10).phi() - 1.0).abs() < 1e-12);
        assert!((Contingency2x2::new(0, 10, 10, 0).phi() + 1.0).abs() < 1e-12);
        assert!(Contingency2x2::new(5, 5, 5, 5).phi().abs() < 1e-12);
    }
}
