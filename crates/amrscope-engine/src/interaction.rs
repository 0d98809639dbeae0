//! Higher-order interaction information (co-information).
//!
//! For a feature subset S of size k,
//! II(S) = Σ_{T ⊆ S, T ≠ ∅} (−1)^(k−|T|) H(T),
//! with H the joint Shannon entropy in bits. Positive values mean the
//! subset carries information its pairs miss (synergy), negative values
//! mean the pairs already explain it (redundancy).
//!
//! Reference: McGill (1954) "Multivariate information transmission"

use crate::subsets::combinations;
use amrscope_core::error::Result;
use amrscope_core::types::{Call, ObservationMatrix};
use serde::{Deserialize, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;

/// |II| at or below this is reported as independent.
pub const INTERACTION_EPS: f64 = 0.01;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InteractionParams {
    /// Largest subset order analysed (orders start at 3).
    pub max_order: usize,
    /// Minimum fraction of isolates positive for every feature in the subset.
    pub min_support: f64,
}

impl Default for InteractionParams {
    fn default() -> Self {
        Self {
            max_order: 3,
            min_support: 0.05,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum InteractionType {
    Synergistic,
    Redundant,
    Independent,
}

impl InteractionType {
    pub fn classify(ii: f64) -> Self {
        if ii > INTERACTION_EPS {
            InteractionType::Synergistic
        } else if ii < -INTERACTION_EPS {
            InteractionType::Redundant
        } else {
            InteractionType::Independent
        }
    }
}

impl fmt::Display for InteractionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            InteractionType::Synergistic => "synergistic",
            InteractionType::Redundant => "redundant",
            InteractionType::Independent => "independent",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InteractionRow {
    #[serde(serialize_with = "join_features")]
    pub features: Vec<String>,
    pub order: usize,
    pub interaction_information: f64,
    pub interaction_type: InteractionType,
    pub joint_prevalence: f64,
}

fn join_features<S: Serializer>(features: &[String], s: S) -> std::result::Result<S::Ok, S::Error> {
    s.serialize_str(&features.join(", "))
}

/// Joint Shannon entropy (bits) of the given columns. A missing value is a
/// symbol of its own.
pub fn joint_entropy(cols: &[&[Call]]) -> f64 {
    let n = cols.first().map(|c| c.len()).unwrap_or(0);
    if n == 0 {
        return 0.0;
    }
    // ordered keys keep the floating-point sum stable across calls
    let mut counts: BTreeMap<Vec<Call>, usize> = BTreeMap::new();
    for row in 0..n {
        let key: Vec<Call> = cols.iter().map(|c| c[row]).collect();
        *counts.entry(key).or_insert(0) += 1;
    }
    -counts
        .values()
        .map(|&c| {
            let p = c as f64 / n as f64;
            p * (p + 1e-15).log2()
        })
        .sum::<f64>()
}

/// Inclusion–exclusion over all non-empty sub-subsets of `cols`.
pub fn co_information(cols: &[&[Call]]) -> f64 {
    let k = cols.len();
    let mut ii = 0.0;
    for size in 1..=k {
        let sign = if (k - size) % 2 == 0 { 1.0 } else { -1.0 };
        for picks in combinations(k, size) {
            let sub: Vec<&[Call]> = picks.iter().map(|&i| cols[i]).collect();
            ii += sign * joint_entropy(&sub);
        }
    }
    ii
}

/// Interaction information of every subset of order 3..=max_order whose
/// joint prevalence reaches `min_support`, strongest first.
pub fn interaction_information(
    data: &ObservationMatrix,
    features: &[String],
    params: &InteractionParams,
) -> Result<Vec<InteractionRow>> {
    let cols = data.require_columns(features)?;
    let n = data.n_rows();
    let mut rows = Vec::new();
    if n == 0 {
        return Ok(rows);
    }

    for order in 3..=params.max_order {
        for picks in combinations(features.len(), order) {
            let sub: Vec<&[Call]> = picks.iter().map(|&i| cols[i]).collect();
            let all_positive = (0..n)
                .filter(|&r| sub.iter().all(|c| c[r] == Some(true)))
                .count();
            let joint_prevalence = all_positive as f64 / n as f64;
            if joint_prevalence < params.min_support {
                continue;
            }
            let ii = co_information(&sub);
            rows.push(InteractionRow {
                features: picks.iter().map(|&i| features[i].clone()).collect(),
                order,
                interaction_information: ii,
                interaction_type: InteractionType::classify(ii),
                joint_prevalence,
            });
        }
    }

    rows.sort_by(|a, b| {
        b.interaction_information
            .abs()
            .partial_cmp(&a.interaction_information.abs())
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matrix(cols: Vec<(&str, Vec<Call>)>) -> ObservationMatrix {
        let n = cols[0].1.len();
        ObservationMatrix::from_columns(
            (0..n).map(|i| format!("S{}", i)).collect(),
            cols.into_iter().map(|(n, v)| (n.to_string(), v)).collect(),
        )
        .unwrap()
    }

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn entropy_of_fair_coin() {
        let c = vec![Some(true), Some(false), Some(true), Some(false)];
        assert!((joint_entropy(&[c.as_slice()]) - 1.0).abs() < 1e-9);
        let constant = vec![Some(true); 4];
        assert!(joint_entropy(&[constant.as_slice()]).abs() < 1e-9);
    }

    #[test]
    fn missing_is_its_own_symbol() {
        let c = vec![Some(true), None, Some(false), None];
        assert!((joint_entropy(&[c.as_slice()]) - 1.5).abs() < 1e-9);
    }

    #[test]
    fn entropy_bits_are_stable_across_calls() {
        // many distinct cells, so the summation order matters in the last bits
        let cols: Vec<Vec<Call>> = (0..7usize)
            .map(|k| {
                (0..1009usize)
                    .map(|r| match (r * (k + 3) + r / 7) % (k + 4) {
                        0 => None,
                        x => Some(x % 2 == 1),
                    })
                    .collect()
            })
            .collect();
        let slices: Vec<&[Call]> = cols.iter().map(|c| c.as_slice()).collect();
        let first = joint_entropy(&slices).to_bits();
        for _ in 0..500 {
            assert_eq!(joint_entropy(&slices).to_bits(), first);
        }
    }

    #[test]
    fn identical_copies_are_synergistic() {
        let a = vec![Some(true), Some(false), Some(true), Some(false)];
        let m = matrix(vec![("A", a.clone()), ("B", a.clone()), ("C", a)]);
        let rows = interaction_information(&m, &names(&["A", "B", "C"]), &InteractionParams::default()).unwrap();
        assert_eq!(rows.len(), 1);
        assert!((rows[0].interaction_information - 1.0).abs() < 1e-9);
        assert_eq!(rows[0].interaction_type, InteractionType::Synergistic);
        assert!((rows[0].joint_prevalence - 0.5).abs() < 1e-12);
    }

    #[test]
    fn xor_is_redundant() {
        let a = vec![Some(false), Some(false), Some(true), Some(true)];
        let b = vec![Some(false), Some(true), Some(false), Some(true)];
        let c: Vec<Call> = a.iter().zip(&b).map(|(x, y)| Some(x != y)).collect();
        let m = matrix(vec![("A", a), ("B", b), ("C", c)]);
        let params = InteractionParams {
            max_order: 3,
            min_support: 0.0,
        };
        let rows = interaction_information(&m, &names(&["A", "B", "C"]), &params).unwrap();
        assert!((rows[0].interaction_information + 1.0).abs() < 1e-9);
        assert_eq!(rows[0].interaction_type, InteractionType::Redundant);

        // never all three positive: filtered at the default support
        let rows = interaction_information(&m, &names(&["A", "B", "C"]), &InteractionParams::default()).unwrap();
        assert!(rows.is_empty());
    }

    #[test]
    fn classification_matches_sign() {
        for ii in [-0.5, -0.01, 0.0, 0.005, 0.011, 2.0] {
            let t = InteractionType::classify(ii);
            match t {
                InteractionType::Synergistic => assert!(ii > INTERACTION_EPS),
                InteractionType::Redundant => assert!(ii < -INTERACTION_EPS),
                InteractionType::Independent => assert!(ii.abs() <= INTERACTION_EPS),
            }
        }
    }

    #[test]
    fn sorted_by_magnitude() {
        let a = vec![Some(true), Some(false), Some(true), Some(false), Some(true), Some(true)];
        let b = vec![Some(true), Some(false), Some(true), Some(true), Some(false), Some(true)];
        let c = vec![Some(true), Some(true), Some(false), Some(false), Some(true), Some(true)];
        let d = vec![Some(true), Some(false), Some(true), Some(false), Some(true), Some(true)];
        let m = matrix(vec![("A", a), ("B", b), ("C", c), ("D", d)]);
        let params = InteractionParams {
            max_order: 4,
            min_support: 0.0,
        };
        let rows = interaction_information(&m, &names(&["A", "B", "C", "D"]), &params).unwrap();
        assert_eq!(rows.len(), 5);
        for w in rows.windows(2) {
            assert!(w[0].interaction_information.abs() >= w[1].interaction_information.abs());
        }
    }
}
