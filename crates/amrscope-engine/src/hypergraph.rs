//! Co-resistance patterns as weighted hyperedges.
//!
//! Each isolate's set of resistant classes is one candidate hyperedge.
//! Identical sets are merged and weighted by support, which keeps the
//! multi-way structure a pairwise network loses.
//!
//! Reference: Battiston et al. (2020) "Networks beyond pairwise interactions"

use amrscope_core::types::ObservationMatrix;
use serde::{Deserialize, Serialize, Serializer};
use std::collections::HashMap;

/// Bounds on extracted patterns.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HyperedgeParams {
    pub min_size: usize,
    pub max_size: usize,
    pub min_support: f64,
}

impl Default for HyperedgeParams {
    fn default() -> Self {
        Self {
            min_size: 2,
            max_size: 6,
            min_support: 0.05,
        }
    }
}

/// A distinct set of co-resistant classes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Hyperedge {
    /// Sorted class names.
    #[serde(rename = "hyperedge", serialize_with = "join_members")]
    pub members: Vec<String>,
    pub size: usize,
    pub count: usize,
    /// count / number of isolates
    pub support: f64,
}

impl Hyperedge {
    pub fn label(&self) -> String {
        self.members.join(", ")
    }
}

fn join_members<S: Serializer>(members: &[String], s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&members.join(", "))
}

/// Exact resistant-class sets with size in `[min_size, max_size]` and
/// support ≥ `min_support`, most frequent first. Ties keep first-seen order.
pub fn extract_hyperedges(classes: &ObservationMatrix, params: &HyperedgeParams) -> Vec<Hyperedge> {
    let n = classes.n_rows();
    if n == 0 {
        return Vec::new();
    }

    let mut order: Vec<Vec<String>> = Vec::new();
    let mut counts: HashMap<Vec<String>, usize> = HashMap::new();
    for row in 0..n {
        let mut active: Vec<String> = classes
            .column_names()
            .iter()
            .enumerate()
            .filter(|(idx, _)| classes.column_at(*idx)[row] == Some(true))
            .map(|(_, name)| name.clone())
            .collect();
        if active.len() < params.min_size || active.len() > params.max_size {
            continue;
        }
        active.sort();
        let slot = counts.entry(active.clone()).or_insert(0);
        if *slot == 0 {
            order.push(active);
        }
        *slot += 1;
    }

    let mut edges: Vec<Hyperedge> = order
        .into_iter()
        .map(|members| {
            let count = counts[&members];
            Hyperedge {
                size: members.len(),
                count,
                support: count as f64 / n as f64,
                members,
            }
        })
        .filter(|h| h.support >= params.min_support)
        .collect();
    edges.sort_by(|a, b| b.count.cmp(&a.count));
    edges
}

/// Participation of one class in the hypergraph.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CentralityRow {
    pub class: String,
    /// Number of hyperedges containing the class.
    pub degree: usize,
    /// Sum of supports.
    pub weighted_degree: f64,
    /// Sum of size × support.
    pub size_weighted: f64,
    pub degree_norm: f64,
    pub weighted_degree_norm: f64,
    pub size_weighted_norm: f64,
}

/// Degree, support-weighted and size-weighted centrality for every class
/// in `universe`, each also divided by its maximum. Sorted by size-weighted
/// degree, highest first.
pub fn hypergraph_centrality(hyperedges: &[Hyperedge], universe: &[String]) -> Vec<CentralityRow> {
    let pos: HashMap<&str, usize> = universe
        .iter()
        .enumerate()
        .map(|(i, c)| (c.as_str(), i))
        .collect();
    let mut rows: Vec<CentralityRow> = universe
        .iter()
        .map(|c| CentralityRow {
            class: c.clone(),
            degree: 0,
            weighted_degree: 0.0,
            size_weighted: 0.0,
            degree_norm: 0.0,
            weighted_degree_norm: 0.0,
            size_weighted_norm: 0.0,
        })
        .collect();

    for h in hyperedges {
        for m in &h.members {
            if let Some(&i) = pos.get(m.as_str()) {
                rows[i].degree += 1;
                rows[i].weighted_degree += h.support;
                rows[i].size_weighted += h.support * h.size as f64;
            }
        }
    }

    let norm = |x: f64, max: f64| if max > 0.0 { x / max } else { 0.0 };
    let max_deg = rows.iter().map(|r| r.degree).max().unwrap_or(0) as f64;
    let max_wd = rows.iter().map(|r| r.weighted_degree).fold(0.0, f64::max);
    let max_sw = rows.iter().map(|r| r.size_weighted).fold(0.0, f64::max);
    for r in &mut rows {
        r.degree_norm = norm(r.degree as f64, max_deg);
        r.weighted_degree_norm = norm(r.weighted_degree, max_wd);
        r.size_weighted_norm = norm(r.size_weighted, max_sw);
    }

    rows.sort_by(|a, b| {
        b.size_weighted
            .partial_cmp(&a.size_weighted)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    rows
}
