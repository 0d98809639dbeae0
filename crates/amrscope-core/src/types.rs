//! Shared types used across all amrscope crates.
//!
//! The observation matrix is column-major: every analysis walks whole
//! feature columns, and missingness is carried as `None` end to end.

use crate::error::{AmrError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};

/// One binary indicator value: `Some(true)` resistant/present,
/// `Some(false)` susceptible/absent, `None` not tested.
pub type Call = Option<bool>;

/// Mapping from class name to its ordered member feature (drug) names.
pub type ClassMap = BTreeMap<String, Vec<String>>;

/// Coerce a raw cell into a call.
///
/// Numeric values map nonzero → 1 and zero → 0. Boolean words are accepted.
/// Anything else (blank, `NA`, free text) stays missing.
pub fn parse_call(raw: &str) -> Call {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    match s.to_ascii_lowercase().as_str() {
        "true" | "yes" => return Some(true),
        "false" | "no" => return Some(false),
        _ => {}
    }
    match s.parse::<f64>() {
        Ok(v) if v.is_nan() => None,
        Ok(v) => Some(v != 0.0),
        Err(_) => None,
    }
}

/// Render a call the way result tables print it.
pub fn call_label(call: Call) -> &'static str {
    match call {
        Some(true) => "1",
        Some(false) => "0",
        None => "",
    }
}

/// Isolate-indexed table of binary calls.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ObservationMatrix {
    row_ids: Vec<String>,
    columns: Vec<String>,
    data: Vec<Vec<Call>>,
    index: HashMap<String, usize>,
}

impl ObservationMatrix {
    /// Create a matrix with the given isolate ids and no columns.
    pub fn new(row_ids: Vec<String>) -> Result<Self> {
        let mut seen = HashSet::with_capacity(row_ids.len());
        for id in &row_ids {
            if !seen.insert(id.as_str()) {
                return Err(AmrError::shape(format!("duplicate isolate id: {}", id)));
            }
        }
        Ok(Self {
            row_ids,
            columns: Vec::new(),
            data: Vec::new(),
            index: HashMap::new(),
        })
    }

    /// Build a matrix from named columns.
    pub fn from_columns(row_ids: Vec<String>, columns: Vec<(String, Vec<Call>)>) -> Result<Self> {
        let mut m = Self::new(row_ids)?;
        for (name, values) in columns {
            m.push_column(name, values)?;
        }
        Ok(m)
    }

    /// Append a column. Only used while the matrix is being assembled.
    pub fn push_column(&mut self, name: impl Into<String>, values: Vec<Call>) -> Result<()> {
        let name = name.into();
        if values.len() != self.row_ids.len() {
            return Err(AmrError::shape(format!(
                "column {} has {} values, expected {}",
                name,
                values.len(),
                self.row_ids.len()
            )));
        }
        if self.index.contains_key(&name) {
            return Err(AmrError::shape(format!("duplicate column: {}", name)));
        }
        self.index.insert(name.clone(), self.columns.len());
        self.columns.push(name);
        self.data.push(values);
        Ok(())
    }

    pub fn n_rows(&self) -> usize {
        self.row_ids.len()
    }

    pub fn n_cols(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.row_ids.is_empty() || self.columns.is_empty()
    }

    pub fn row_ids(&self) -> &[String] {
        &self.row_ids
    }

    pub fn column_names(&self) -> &[String] {
        &self.columns
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub fn column(&self, name: &str) -> Option<&[Call]> {
        self.column_index(name).map(|i| self.data[i].as_slice())
    }

    pub fn column_at(&self, idx: usize) -> &[Call] {
        &self.data[idx]
    }

    /// Look up several columns, failing on the first unknown name.
    pub fn require_columns<S: AsRef<str>>(&self, names: &[S]) -> Result<Vec<&[Call]>> {
        names
            .iter()
            .map(|n| {
                self.column(n.as_ref())
                    .ok_or_else(|| AmrError::unknown_feature(n.as_ref()))
            })
            .collect()
    }

    /// All calls of one isolate, in column order.
    pub fn row(&self, row: usize) -> Vec<Call> {
        self.data.iter().map(|col| col[row]).collect()
    }

    /// Restrict to the named columns, in the given order.
    pub fn select<S: AsRef<str>>(&self, names: &[S]) -> Result<Self> {
        let mut out = Self::new(self.row_ids.clone())?;
        for name in names {
            let col = self
                .column(name.as_ref())
                .ok_or_else(|| AmrError::unknown_feature(name.as_ref()))?;
            out.push_column(name.as_ref(), col.to_vec())?;
        }
        Ok(out)
    }

    /// Place the columns of `other` next to ours. Both must share the
    /// same isolate index.
    pub fn hstack(&self, other: &ObservationMatrix) -> Result<Self> {
        if self.row_ids != other.row_ids {
            return Err(AmrError::shape("cannot join matrices with different isolate index"));
        }
        let mut out = self.clone();
        for (name, col) in other.columns.iter().zip(&other.data) {
            out.push_column(name.clone(), col.clone())?;
        }
        Ok(out)
    }

    /// Reindex rows to `row_ids`. Isolates absent here become all-missing.
    pub fn align_to(&self, row_ids: &[String]) -> Result<Self> {
        let pos: HashMap<&str, usize> = self
            .row_ids
            .iter()
            .enumerate()
            .map(|(i, id)| (id.as_str(), i))
            .collect();
        let mut out = Self::new(row_ids.to_vec())?;
        for (name, col) in self.columns.iter().zip(&self.data) {
            let values = row_ids
                .iter()
                .map(|id| pos.get(id.as_str()).and_then(|&i| col[i]))
                .collect();
            out.push_column(name.clone(), values)?;
        }
        Ok(out)
    }

    /// Fraction of observed values equal to 1, or `None` if nothing observed.
    pub fn observed_mean(&self, idx: usize) -> Option<f64> {
        let counts = CallCounts::of(&self.data[idx]);
        counts.observed_fraction()
    }
}

/// Tally of a column's calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CallCounts {
    pub positive: usize,
    pub negative: usize,
    pub missing: usize,
}

impl CallCounts {
    pub fn of(calls: &[Call]) -> Self {
        let mut c = Self::default();
        for call in calls {
            match call {
                Some(true) => c.positive += 1,
                Some(false) => c.negative += 1,
                None => c.missing += 1,
            }
        }
        c
    }

    pub fn observed(&self) -> usize {
        self.positive + self.negative
    }

    pub fn total(&self) -> usize {
        self.observed() + self.missing
    }

    pub fn observed_fraction(&self) -> Option<f64> {
        let obs = self.observed();
        if obs == 0 {
            None
        } else {
            Some(self.positive as f64 / obs as f64)
        }
    }
}
