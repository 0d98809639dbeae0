//! Drug-level calls to class-level calls.
//!
//! A class call is only definite when the untested drugs could not change
//! it. Otherwise the class stays missing; nothing is imputed.

use amrscope_core::error::{AmrError, Result};
use amrscope_core::types::{Call, ClassMap, ObservationMatrix};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// How drug calls combine into a class call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClassRule {
    /// Resistant if any tested drug is resistant.
    #[default]
    Any,
    /// Resistant only if every drug was tested and all are resistant.
    All,
    /// Resistant if more than half of the tested drugs are resistant.
    Majority,
}

impl ClassRule {
    pub const VALID: &'static str = "any, all, majority";

    pub fn as_str(&self) -> &'static str {
        match self {
            ClassRule::Any => "any",
            ClassRule::All => "all",
            ClassRule::Majority => "majority",
        }
    }
}

impl fmt::Display for ClassRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ClassRule {
    type Err = AmrError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "any" => Ok(ClassRule::Any),
            "all" => Ok(ClassRule::All),
            "majority" => Ok(ClassRule::Majority),
            other => Err(AmrError::InvalidRule {
                rule: other.to_string(),
                valid: Self::VALID.to_string(),
            }),
        }
    }
}

/// Combine one isolate's calls for the drugs of a single class.
pub fn aggregate_calls(calls: &[Call], rule: ClassRule) -> Call {
    if calls.is_empty() {
        return None;
    }
    let n = calls.len();
    let resistant = calls.iter().filter(|c| **c == Some(true)).count();
    let susceptible = calls.iter().filter(|c| **c == Some(false)).count();
    let tested = resistant + susceptible;
    let all_tested = tested == n;

    match rule {
        ClassRule::Any => {
            if resistant >= 1 {
                Some(true)
            } else if all_tested {
                Some(false)
            } else {
                None
            }
        }
        ClassRule::All => {
            if all_tested && resistant == n {
                Some(true)
            } else if susceptible >= 1 {
                // one susceptible drug already breaks "all resistant"
                Some(false)
            } else {
                None
            }
        }
        ClassRule::Majority => {
            if tested > 0 && 2 * resistant > tested {
                Some(true)
            } else if all_tested {
                Some(false)
            } else {
                None
            }
        }
    }
}

/// Aggregate a drug-level matrix into one column per class.
///
/// Columns follow the class map's order. Drugs missing from `drugs` are
/// ignored and a class with no matched drug is dropped.
pub fn build_class_matrix(
    drugs: &ObservationMatrix,
    classes: &ClassMap,
    rule: ClassRule,
) -> Result<ObservationMatrix> {
    let mut out = ObservationMatrix::new(drugs.row_ids().to_vec())?;
    for (class, members) in classes {
        let cols: Vec<&[Call]> = members.iter().filter_map(|d| drugs.column(d)).collect();
        if cols.is_empty() {
            continue;
        }
        let mut scratch = Vec::with_capacity(cols.len());
        let values = (0..drugs.n_rows())
            .map(|row| {
                scratch.clear();
                scratch.extend(cols.iter().map(|col| col[row]));
                aggregate_calls(&scratch, rule)
            })
            .collect();
        out.push_column(class.clone(), values)?;
    }
    Ok(out)
}

/// How well the declared ontology matches the drug columns.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct OntologyCoverage {
    pub n_classes_declared: usize,
    pub n_classes_matched: usize,
    pub n_drugs_declared: usize,
    pub n_drugs_matched: usize,
    pub matched_drug_columns_per_class: BTreeMap<String, Vec<String>>,
    pub unmatched_drug_columns_per_class: BTreeMap<String, Vec<String>>,
}

/// Per-class matched and unmatched drug names.
pub fn ontology_coverage(drugs: &ObservationMatrix, classes: &ClassMap) -> OntologyCoverage {
    let mut cov = OntologyCoverage {
        n_classes_declared: classes.len(),
        ..Default::default()
    };
    for (class, members) in classes {
        let (matched, unmatched): (Vec<String>, Vec<String>) = members
            .iter()
            .cloned()
            .partition(|d| drugs.column_index(d).is_some());
        cov.n_drugs_declared += members.len();
        cov.n_drugs_matched += matched.len();
        if !matched.is_empty() {
            cov.n_classes_matched += 1;
        }
        cov.matched_drug_columns_per_class.insert(class.clone(), matched);
        cov.unmatched_drug_columns_per_class.insert(class.clone(), unmatched);
    }
    cov
}
