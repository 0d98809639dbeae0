//! Conditional independence testing for binary indicators.
//!
//! The unconditional case uses Fisher's exact test when any expected cell
//! count is below 5 and Yates-corrected chi-squared otherwise. Given a
//! conditioning set, rows are stratified by the joint conditioning values
//! and a Cochran–Mantel–Haenszel statistic (1 dof) is pooled over strata.
//!
//! Degenerate inputs never fail: they resolve to p = 1.0 (independent).

use crate::contingency::{chi2_contingency, CrossTab};
use crate::special::chi2_sf;
use crate::types::Call;
use serde::Serialize;
use std::collections::BTreeMap;

/// Minimum expected cell count before falling back to Fisher's exact test.
pub const MIN_EXPECTED_COUNT: f64 = 5.0;

/// Raw result of a single test.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TestOutcome {
    /// A statistic was computed.
    Tested { p_value: f64 },
    /// Nothing testable remained (empty table, all strata degenerate).
    Degenerate,
}

impl TestOutcome {
    /// The p-value, with degenerate outcomes reported as 1.0.
    pub fn p_value(&self) -> f64 {
        match self {
            TestOutcome::Tested { p_value } => *p_value,
            TestOutcome::Degenerate => 1.0,
        }
    }

    /// Independent ⇔ p > α.
    pub fn decide(self, alpha: f64) -> CiDecision {
        let p_value = self.p_value();
        CiDecision {
            independent: p_value > alpha,
            p_value,
        }
    }
}

/// Independence decision at a significance level.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CiDecision {
    pub independent: bool,
    pub p_value: f64,
}

/// A test of X ⊥ Y | Z over binary columns.
///
/// Implementations must be deterministic: the skeleton learner relies on
/// identical answers for identical inputs.
pub trait IndependenceTest {
    fn test(&self, x: &[Call], y: &[Call], z: &[&[Call]]) -> TestOutcome;

    fn decide(&self, x: &[Call], y: &[Call], z: &[&[Call]], alpha: f64) -> CiDecision {
        self.test(x, y, z).decide(alpha)
    }
}

/// Fisher/chi-squared marginally, Cochran–Mantel–Haenszel conditionally.
#[derive(Debug, Clone, Copy, Default)]
pub struct CmhTest;

impl IndependenceTest for CmhTest {
    fn test(&self, x: &[Call], y: &[Call], z: &[&[Call]]) -> TestOutcome {
        if z.is_empty() {
            marginal_test(x, y)
        } else {
            cmh_test(x, y, z)
        }
    }
}

/// Convenience wrapper around [`CmhTest`].
pub fn ci_test(x: &[Call], y: &[Call], z: &[&[Call]], alpha: f64) -> CiDecision {
    CmhTest.decide(x, y, z, alpha)
}

/// Unconditional association test of two binary columns.
pub fn marginal_test(x: &[Call], y: &[Call]) -> TestOutcome {
    let tab = CrossTab::from_calls(x, y);
    if let Some(t) = tab.as_2x2() {
        let p_value = if t.min_expected() < MIN_EXPECTED_COUNT {
            t.fisher_exact()
        } else {
            t.chi2().p_value
        };
        return TestOutcome::Tested { p_value };
    }
    match chi2_contingency(&tab) {
        Some(r) => TestOutcome::Tested { p_value: r.p_value },
        None => TestOutcome::Degenerate,
    }
}

/// Stratified CMH test. Rows with any missing conditioning value belong to
/// no stratum; strata without a full 2×2 table are skipped.
pub fn cmh_test(x: &[Call], y: &[Call], z: &[&[Call]]) -> TestOutcome {
    let mut strata: BTreeMap<Vec<bool>, Vec<usize>> = BTreeMap::new();
    'rows: for row in 0..x.len() {
        let mut key = Vec::with_capacity(z.len());
        for col in z {
            match col[row] {
                Some(v) => key.push(v),
                None => continue 'rows,
            }
        }
        strata.entry(key).or_default().push(row);
    }

    let mut num = 0.0;
    let mut den = 0.0;
    for rows in strata.values() {
        let Some(t) = CrossTab::from_rows(x, y, rows).as_2x2() else {
            continue;
        };
        let (a, b, c, d) = (t.a as f64, t.b as f64, t.c as f64, t.d as f64);
        let n = a + b + c + d;
        if n < 2.0 {
            continue;
        }
        num += a - (a + b) * (a + c) / n;
        den += (a + b) * (c + d) * (a + c) * (b + d) / (n * n * (n - 1.0));
    }

    if den <= 0.0 {
        return TestOutcome::Degenerate;
    }
    let statistic = num * num / den;
    TestOutcome::Tested {
        p_value: chi2_sf(statistic, 1.0),
    }
}
