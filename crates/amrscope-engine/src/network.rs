//! Phenotype ↔ genotype co-resistance network and its motif census.
//!
//! Every pair of features (pheno–pheno, gene–gene, pheno–gene) with a full
//! 2×2 table is tested once; the family of p-values is adjusted together
//! and the significant pairs become edges.
//!
//! Reference: Milo et al. (2002) "Network motifs: simple building blocks of complex networks"

use crate::skeleton::GraphExport;
use crate::subsets::combinations;
use amrscope_core::contingency::CrossTab;
use amrscope_core::error::Result;
use amrscope_core::independence::MIN_EXPECTED_COUNT;
use amrscope_core::multitest::{adjust_pvalues, PAdjustMethod};
use amrscope_core::types::{Call, ObservationMatrix};
use petgraph::graph::{NodeIndex, UnGraph};
use petgraph::visit::EdgeRef;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Which layers an edge connects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EdgeKind {
    #[serde(rename = "pheno-pheno")]
    PhenoPheno,
    #[serde(rename = "gene-gene")]
    GeneGene,
    #[serde(rename = "pheno-gene")]
    PhenoGene,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkParams {
    pub alpha: f64,
    pub fdr_method: PAdjustMethod,
    pub motif_sizes: Vec<usize>,
}

impl Default for NetworkParams {
    fn default() -> Self {
        Self {
            alpha: 0.05,
            fdr_method: PAdjustMethod::FdrBh,
            motif_sizes: vec![3, 4],
        }
    }
}

/// One tested feature pair.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssociationRow {
    pub feature1: String,
    pub feature2: String,
    pub phi: f64,
    pub p_value: f64,
    pub kind: EdgeKind,
    pub p_adj: f64,
    pub significant: bool,
}

/// Edge weight of the significant-association graph.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AssociationEdge {
    pub phi: f64,
    pub p_adj: f64,
    pub kind: EdgeKind,
}

#[derive(Debug, Clone)]
pub struct HybridNetwork {
    pub graph: UnGraph<String, AssociationEdge>,
    /// Every tested pair, significant or not.
    pub tests: Vec<AssociationRow>,
}

impl HybridNetwork {
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn export(&self) -> GraphExport {
        GraphExport {
            directed: false,
            nodes: self.graph.node_weights().cloned().collect(),
            edges: self
                .graph
                .edge_references()
                .map(|e| (self.graph[e.source()].clone(), self.graph[e.target()].clone()))
                .collect(),
        }
    }
}

/// Phi and p-value for one pair, or `None` without a full 2×2 table.
///
/// Fisher's exact test is used when any expected count is below 5.
pub fn association_test(x: &[Call], y: &[Call]) -> Option<(f64, f64)> {
    let table = CrossTab::from_calls(x, y).as_2x2()?;
    let p = if table.min_expected() < MIN_EXPECTED_COUNT {
        table.fisher_exact()
    } else {
        table.chi2().p_value
    };
    Some((table.phi(), p))
}

/// Test all pairs and keep those significant after adjustment.
///
/// The gene layer is reindexed to the phenotype isolates first; isolates
/// without a gene row count as missing.
pub fn build_hybrid_network(
    pheno: &ObservationMatrix,
    genes: Option<&ObservationMatrix>,
    params: &NetworkParams,
) -> Result<HybridNetwork> {
    let genes = genes.map(|g| g.align_to(pheno.row_ids())).transpose()?;
    let mut tests = Vec::new();

    let mut push = |a: &str, x: &[Call], b: &str, y: &[Call], kind: EdgeKind| {
        if let Some((phi, p_value)) = association_test(x, y) {
            tests.push(AssociationRow {
                feature1: a.to_string(),
                feature2: b.to_string(),
                phi,
                p_value,
                kind,
                p_adj: p_value,
                significant: false,
            });
        }
    };

    let pairs_within = |m: &ObservationMatrix| -> Vec<(usize, usize)> {
        combinations(m.n_cols(), 2).map(|c| (c[0], c[1])).collect()
    };

    let pnames = pheno.column_names();
    for (i, j) in pairs_within(pheno) {
        push(&pnames[i], pheno.column_at(i), &pnames[j], pheno.column_at(j), EdgeKind::PhenoPheno);
    }
    if let Some(g) = &genes {
        let gnames = g.column_names();
        for (i, j) in pairs_within(g) {
            push(&gnames[i], g.column_at(i), &gnames[j], g.column_at(j), EdgeKind::GeneGene);
        }
        for (i, p) in pnames.iter().enumerate() {
            for (j, q) in gnames.iter().enumerate() {
                push(p, pheno.column_at(i), q, g.column_at(j), EdgeKind::PhenoGene);
            }
        }
    }

    let raw: Vec<f64> = tests.iter().map(|t| t.p_value).collect();
    for (t, p_adj) in tests.iter_mut().zip(adjust_pvalues(&raw, params.fdr_method)) {
        t.p_adj = p_adj;
        t.significant = p_adj < params.alpha;
    }

    let mut graph = UnGraph::new_undirected();
    let mut index: HashMap<String, NodeIndex> = HashMap::new();
    for t in tests.iter().filter(|t| t.significant) {
        let a = *index
            .entry(t.feature1.clone())
            .or_insert_with(|| graph.add_node(t.feature1.clone()));
        let b = *index
            .entry(t.feature2.clone())
            .or_insert_with(|| graph.add_node(t.feature2.clone()));
        graph.add_edge(
            a,
            b,
            AssociationEdge {
                phi: t.phi,
                p_adj: t.p_adj,
                kind: t.kind,
            },
        );
    }

    Ok(HybridNetwork { graph, tests })
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MotifCount {
    pub motif: String,
    pub count: usize,
}

/// Count connected induced subgraphs of each size by isomorphism signature
/// `n{size}_e{edges}_({degrees, descending})`. Most common first.
pub fn motif_census<N, E>(graph: &UnGraph<N, E>, sizes: &[usize]) -> Vec<MotifCount> {
    let nodes: Vec<NodeIndex> = graph.node_indices().collect();
    let mut order: Vec<String> = Vec::new();
    let mut counts: HashMap<String, usize> = HashMap::new();

    for &size in sizes {
        if size == 0 || size > nodes.len() {
            continue;
        }
        for picks in combinations(nodes.len(), size) {
            let sub: Vec<NodeIndex> = picks.iter().map(|&i| nodes[i]).collect();
            let mut degree = vec![0usize; size];
            let mut adj = vec![Vec::new(); size];
            let mut n_edges = 0;
            for pair in combinations(size, 2) {
                let (a, b) = (pair[0], pair[1]);
                if graph.find_edge(sub[a], sub[b]).is_some() {
                    n_edges += 1;
                    degree[a] += 1;
                    degree[b] += 1;
                    adj[a].push(b);
                    adj[b].push(a);
                }
            }
            if !is_connected(&adj) {
                continue;
            }
            degree.sort_unstable_by(|a, b| b.cmp(a));
            let degs: Vec<String> = degree.iter().map(|d| d.to_string()).collect();
            let label = if size == 1 {
                format!("n1_e{}_({},)", n_edges, degs[0])
            } else {
                format!("n{}_e{}_({})", size, n_edges, degs.join(", "))
            };
            let slot = counts.entry(label.clone()).or_insert(0);
            if *slot == 0 {
                order.push(label);
            }
            *slot += 1;
        }
    }

    let mut out: Vec<MotifCount> = order
        .into_iter()
        .map(|motif| {
            let count = counts[&motif];
            MotifCount { motif, count }
        })
        .collect();
    out.sort_by(|a, b| b.count.cmp(&a.count));
    out
}

fn is_connected(adj: &[Vec<usize>]) -> bool {
    if adj.is_empty() {
        return true;
    }
    let mut seen = vec![false; adj.len()];
    let mut stack = vec![0];
    seen[0] = true;
    while let Some(u) = stack.pop() {
        for &v in &adj[u] {
            if !seen[v] {
                seen[v] = true;
                stack.push(v);
            }
        }
    }
    seen.into_iter().all(|s| s)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("S{}", i)).collect()
    }

    /// A and B agree on 45 of 50 isolates; C alternates independently.
    fn pheno() -> ObservationMatrix {
        let a: Vec<Call> = (0..50).map(|i| Some(i < 25)).collect();
        let b: Vec<Call> = (0..50).map(|i| Some(if i % 10 == 0 { i >= 25 } else { i < 25 })).collect();
        let c: Vec<Call> = (0..50).map(|i| Some(i % 2 == 0)).collect();
        ObservationMatrix::from_columns(
            ids(50),
            vec![("A".into(), a), ("B".into(), b), ("C".into(), c)],
        )
        .unwrap()
    }

    #[test]
    fn significant_pair_becomes_edge() {
        let net = build_hybrid_network(&pheno(), None, &NetworkParams::default()).unwrap();
        assert_eq!(net.tests.len(), 3);
        assert_eq!(net.edge_count(), 1);
        let ab = net.tests.iter().find(|t| t.feature1 == "A" && t.feature2 == "B").unwrap();
        assert!(ab.significant && ab.phi > 0.5);
        assert!(ab.p_adj >= ab.p_value);
        assert_eq!(net.export().edges, vec![("A".to_string(), "B".to_string())]);
    }

    #[test]
    fn gene_layer_is_aligned_and_typed() {
        let p = pheno();
        // gene rows in reverse order plus one isolate unknown to the phenotypes
        let mut gids: Vec<String> = p.row_ids().iter().rev().cloned().collect();
        gids.push("EXTRA".into());
        let a = p.column("A").unwrap();
        let mut g: Vec<Call> = a.iter().rev().cloned().collect();
        g.push(Some(true));
        let genes = ObservationMatrix::from_columns(gids, vec![("blaTEM".into(), g)]).unwrap();

        let net = build_hybrid_network(&p, Some(&genes), &NetworkParams::default()).unwrap();
        let hit = net
            .tests
            .iter()
            .find(|t| t.feature1 == "A" && t.feature2 == "blaTEM")
            .unwrap();
        assert_eq!(hit.kind, EdgeKind::PhenoGene);
        assert!((hit.phi - 1.0).abs() < 1e-12);
        assert!(hit.significant);
    }

    #[test]
    fn constant_features_are_not_tested() {
        let ones = vec![Some(true); 10];
        let mixed: Vec<Call> = (0..10).map(|i| Some(i % 2 == 0)).collect();
        let m = ObservationMatrix::from_columns(
            ids(10),
            vec![("K".into(), ones), ("M".into(), mixed)],
        )
        .unwrap();
        let net = build_hybrid_network(&m, None, &NetworkParams::default()).unwrap();
        assert!(net.tests.is_empty());
        assert_eq!(net.node_count(), 0);
    }

    #[test]
    fn motif_census_triangle_with_tail() {
        let mut g: UnGraph<&str, ()> = UnGraph::new_undirected();
        let a = g.add_node("A");
        let b = g.add_node("B");
        let c = g.add_node("C");
        let d = g.add_node("D");
        g.add_edge(a, b, ());
        g.add_edge(b, c, ());
        g.add_edge(a, c, ());
        g.add_edge(c, d, ());

        let motifs = motif_census(&g, &[3, 4]);
        assert_eq!(
            motifs,
            vec![
                MotifCount { motif: "n3_e2_(2, 1, 1)".into(), count: 2 },
                MotifCount { motif: "n3_e3_(2, 2, 2)".into(), count: 1 },
                MotifCount { motif: "n4_e4_(3, 2, 2, 1)".into(), count: 1 },
            ]
        );
        assert!(motif_census(&g, &[5]).is_empty());
    }
}
