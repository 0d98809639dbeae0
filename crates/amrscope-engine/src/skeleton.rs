//! Constraint-based conditional-independence skeleton (PC algorithm).
//!
//! Starting from the complete graph, edges are removed in phases of
//! increasing conditioning-set size. Within a phase every surviving edge is
//! tested against the subsets of its current neighbourhood, in lexicographic
//! order of feature index; the first subset that renders the pair
//! independent is kept as the separating set. Removals are applied only
//! after the whole phase has been scanned, so a phase sees the graph as it
//! stood when the phase began.
//!
//! Orientation of unshielded triples i – k – j (k ∉ sep(i, j)) is a
//! best-effort completion. The undirected skeleton is the result to
//! interpret; latent confounders (mobile elements, clonal structure) are
//! not ruled out.
//!
//! Reference: Spirtes, Glymour & Scheines (2000) "Causation, Prediction, and Search"

use crate::subsets::combinations;
use amrscope_core::error::{AmrError, Result};
use amrscope_core::independence::{CmhTest, IndependenceTest};
use amrscope_core::types::{Call, ObservationMatrix};
use petgraph::graphmap::DiGraphMap;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};
use tracing::debug;

/// Skeleton learning parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SkeletonParams {
    /// Significance level; independent ⇔ p > alpha.
    pub alpha: f64,
    /// Largest conditioning set tried.
    pub max_cond_set: usize,
}

impl Default for SkeletonParams {
    fn default() -> Self {
        Self {
            alpha: 0.05,
            max_cond_set: 3,
        }
    }
}

/// One row of the edge-test audit table.
///
/// Removed edges carry the separating set and the size of the phase that
/// removed them. Edges surviving the unconditional phase get an audit row
/// with `cond_size == -1`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(into = "EdgeTestRecord")]
pub struct EdgeTest {
    pub node1: String,
    pub node2: String,
    pub removed: bool,
    pub cond_set: Vec<String>,
    pub p_value: f64,
    pub cond_size: i64,
}

impl EdgeTest {
    /// `∅` for marginal independence, `—` for audit rows, otherwise the
    /// comma-joined separating set.
    pub fn cond_set_label(&self) -> String {
        if self.cond_size < 0 {
            "—".to_string()
        } else if self.cond_set.is_empty() {
            "∅".to_string()
        } else {
            self.cond_set.join(",")
        }
    }
}

/// Flat form of [`EdgeTest`] for tabular writers.
#[derive(Debug, Clone, Serialize)]
pub struct EdgeTestRecord {
    pub node1: String,
    pub node2: String,
    pub removed: bool,
    pub cond_set: String,
    pub p_value: f64,
    pub cond_size: i64,
}

impl From<EdgeTest> for EdgeTestRecord {
    fn from(t: EdgeTest) -> Self {
        let cond_set = t.cond_set_label();
        Self {
            node1: t.node1,
            node2: t.node2,
            removed: t.removed,
            cond_set,
            p_value: t.p_value,
            cond_size: t.cond_size,
        }
    }
}

/// Node/edge list of a graph, as written to JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphExport {
    pub directed: bool,
    pub nodes: Vec<String>,
    pub edges: Vec<(String, String)>,
}

/// Partially oriented graph over named features.
///
/// Each skeleton edge starts as a pair of opposite arcs; orientation removes
/// the arcs pointing away from a collider.
#[derive(Debug, Clone)]
pub struct OrientedGraph {
    names: Vec<String>,
    graph: DiGraphMap<usize, ()>,
}

impl OrientedGraph {
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn arc_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn has_arc(&self, from: &str, to: &str) -> bool {
        match (self.position(from), self.position(to)) {
            (Some(a), Some(b)) => self.graph.contains_edge(a, b),
            _ => false,
        }
    }

    /// Arcs as (from, to) names, sorted by feature index.
    pub fn arcs(&self) -> Vec<(String, String)> {
        let mut arcs: Vec<(usize, usize)> = self.graph.all_edges().map(|(a, b, _)| (a, b)).collect();
        arcs.sort_unstable();
        arcs.into_iter()
            .map(|(a, b)| (self.names[a].clone(), self.names[b].clone()))
            .collect()
    }

    pub fn export(&self) -> GraphExport {
        GraphExport {
            directed: true,
            nodes: self.names.clone(),
            edges: self.arcs(),
        }
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }
}

/// Output of [`pc_skeleton`].
#[derive(Debug, Clone)]
pub struct SkeletonResult {
    pub features: Vec<String>,
    /// Undirected skeleton edges as (i, j) feature indices with i < j.
    pub skeleton: Vec<(usize, usize)>,
    /// Separating sets, stored under both orderings of each removed pair.
    pub sepsets: HashMap<(usize, usize), Vec<usize>>,
    pub graph: OrientedGraph,
    pub tests: Vec<EdgeTest>,
}

impl SkeletonResult {
    pub fn has_edge(&self, a: &str, b: &str) -> bool {
        let pos = |n: &str| self.features.iter().position(|f| f == n);
        match (pos(a), pos(b)) {
            (Some(i), Some(j)) => self.skeleton.contains(&(i.min(j), i.max(j))),
            _ => false,
        }
    }

    /// Named separating set of a removed pair.
    pub fn separating_set(&self, a: &str, b: &str) -> Option<Vec<String>> {
        let i = self.features.iter().position(|f| f == a)?;
        let j = self.features.iter().position(|f| f == b)?;
        self.sepsets
            .get(&(i, j))
            .map(|s| s.iter().map(|&k| self.features[k].clone()).collect())
    }

    pub fn edge_names(&self) -> Vec<(String, String)> {
        self.skeleton
            .iter()
            .map(|&(i, j)| (self.features[i].clone(), self.features[j].clone()))
            .collect()
    }
}

/// PC skeleton with the default Cochran–Mantel–Haenszel tester.
pub fn pc_skeleton(
    data: &ObservationMatrix,
    features: &[String],
    params: &SkeletonParams,
) -> Result<SkeletonResult> {
    pc_skeleton_with(&CmhTest, data, features, params)
}

/// PC skeleton over `features`, in the given order, with any tester.
pub fn pc_skeleton_with<T: IndependenceTest + ?Sized>(
    tester: &T,
    data: &ObservationMatrix,
    features: &[String],
    params: &SkeletonParams,
) -> Result<SkeletonResult> {
    let mut seen = HashSet::new();
    for f in features {
        if !seen.insert(f.as_str()) {
            return Err(AmrError::shape(format!("feature listed twice: {}", f)));
        }
    }
    let cols: Vec<&[Call]> = data.require_columns(features)?;
    let n = features.len();

    let mut adj: Vec<BTreeSet<usize>> = (0..n)
        .map(|i| (0..n).filter(|&j| j != i).collect())
        .collect();
    let mut sepsets: HashMap<(usize, usize), Vec<usize>> = HashMap::new();
    let mut tests = Vec::new();

    for size in 0..=params.max_cond_set {
        let edges: Vec<(usize, usize)> = (0..n)
            .flat_map(|u| adj[u].range(u + 1..).map(move |&v| (u, v)))
            .collect();
        if edges.is_empty() {
            break;
        }

        let mut removals = Vec::new();
        for &(u, v) in &edges {
            // BTreeSet union iterates in index order
            let pool: Vec<usize> = adj[u]
                .union(&adj[v])
                .copied()
                .filter(|&w| w != u && w != v)
                .collect();
            if pool.len() < size {
                continue;
            }

            let mut last_p = 1.0;
            let mut found = None;
            for picks in combinations(pool.len(), size) {
                let cond: Vec<usize> = picks.iter().map(|&i| pool[i]).collect();
                let z: Vec<&[Call]> = cond.iter().map(|&w| cols[w]).collect();
                let decision = tester.decide(cols[u], cols[v], &z, params.alpha);
                last_p = decision.p_value;
                if decision.independent {
                    found = Some(cond);
                    break;
                }
            }

            match found {
                Some(cond) => {
                    tests.push(EdgeTest {
                        node1: features[u].clone(),
                        node2: features[v].clone(),
                        removed: true,
                        cond_set: cond.iter().map(|&w| features[w].clone()).collect(),
                        p_value: last_p,
                        cond_size: size as i64,
                    });
                    sepsets.insert((v, u), cond.clone());
                    sepsets.insert((u, v), cond);
                    removals.push((u, v));
                }
                None if size == 0 => {
                    // the only size-0 subset is the empty one, so last_p is
                    // the unconditional p-value
                    tests.push(EdgeTest {
                        node1: features[u].clone(),
                        node2: features[v].clone(),
                        removed: false,
                        cond_set: Vec::new(),
                        p_value: last_p,
                        cond_size: -1,
                    });
                }
                None => {}
            }
        }

        debug!(
            "Skeleton phase {}: {} edges tested, {} removed",
            size,
            edges.len(),
            removals.len()
        );
        for (u, v) in removals {
            adj[u].remove(&v);
            adj[v].remove(&u);
        }
    }

    let graph = orient_triples(features, &adj, &sepsets);
    let skeleton = (0..n)
        .flat_map(|u| adj[u].range(u + 1..).map(move |&v| (u, v)))
        .collect();

    Ok(SkeletonResult {
        features: features.to_vec(),
        skeleton,
        sepsets,
        graph,
        tests,
    })
}

/// Drop k → i and k → j for every unshielded triple i – k – j whose
/// separating set does not contain k.
fn orient_triples(
    features: &[String],
    adj: &[BTreeSet<usize>],
    sepsets: &HashMap<(usize, usize), Vec<usize>>,
) -> OrientedGraph {
    let n = features.len();
    let mut graph = DiGraphMap::<usize, ()>::with_capacity(n, n * n);
    for u in 0..n {
        graph.add_node(u);
    }
    for (u, nbrs) in adj.iter().enumerate() {
        for &v in nbrs {
            graph.add_edge(u, v, ());
        }
    }

    for (k, nbrs) in adj.iter().enumerate() {
        let nbrs: Vec<usize> = nbrs.iter().copied().collect();
        for pair in combinations(nbrs.len(), 2) {
            let (i, j) = (nbrs[pair[0]], nbrs[pair[1]]);
            if adj[i].contains(&j) {
                continue;
            }
            let k_separates = sepsets
                .get(&(i, j))
                .map(|s| s.contains(&k))
                .unwrap_or(false);
            if !k_separates {
                graph.remove_edge(k, i);
                graph.remove_edge(k, j);
            }
        }
    }

    OrientedGraph {
        names: features.to_vec(),
        graph,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use amrscope_core::independence::TestOutcome;

    fn ids(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("S{:03}", i)).collect()
    }

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    /// X, Y independent fair coins (50 rows per cell), Z = X or Y.
    fn collider() -> ObservationMatrix {
        let mut x = Vec::new();
        let mut y = Vec::new();
        let mut z = Vec::new();
        for (xv, yv) in [(false, false), (false, true), (true, false), (true, true)] {
            for _ in 0..50 {
                x.push(Some(xv));
                y.push(Some(yv));
                z.push(Some(xv || yv));
            }
        }
        ObservationMatrix::from_columns(
            ids(200),
            vec![("X".into(), x), ("Y".into(), y), ("Z".into(), z)],
        )
        .unwrap()
    }

    /// Z drives both X and Y; X ⊥ Y | Z exactly.
    fn confounded() -> ObservationMatrix {
        let cells = [
            ((false, false, false), 36),
            ((false, true, false), 12),
            ((true, false, false), 12),
            ((true, true, false), 4),
            ((false, false, true), 4),
            ((false, true, true), 12),
            ((true, false, true), 12),
            ((true, true, true), 36),
        ];
        let (mut x, mut y, mut z) = (Vec::new(), Vec::new(), Vec::new());
        for ((xv, yv, zv), n) in cells {
            for _ in 0..n {
                x.push(Some(xv));
                y.push(Some(yv));
                z.push(Some(zv));
            }
        }
        ObservationMatrix::from_columns(
            ids(128),
            vec![("X".into(), x), ("Y".into(), y), ("Z".into(), z)],
        )
        .unwrap()
    }

    #[test]
    fn collider_is_oriented() {
        let m = collider();
        let res = pc_skeleton(&m, &names(&["X", "Y", "Z"]), &SkeletonParams::default()).unwrap();

        assert!(!res.has_edge("X", "Y"));
        assert!(res.has_edge("X", "Z"));
        assert!(res.has_edge("Y", "Z"));
        assert_eq!(res.separating_set("X", "Y"), Some(vec![]));
        assert_eq!(res.separating_set("Y", "X"), Some(vec![]));

        assert_eq!(
            res.graph.arcs(),
            vec![("X".to_string(), "Z".to_string()), ("Y".to_string(), "Z".to_string())]
        );
        assert!(!res.graph.has_arc("Z", "X"));
    }

    #[test]
    fn confounder_separates_without_orientation() {
        let m = confounded();
        let res = pc_skeleton(&m, &names(&["X", "Y", "Z"]), &SkeletonParams::default()).unwrap();

        assert!(!res.has_edge("X", "Y"));
        assert_eq!(res.separating_set("X", "Y"), Some(vec!["Z".to_string()]));
        assert!(res.has_edge("X", "Z"));
        assert!(res.has_edge("Y", "Z"));
        // Z is in sep(X, Y): every skeleton edge keeps both arcs
        assert_eq!(res.graph.arc_count(), 4);

        let removal = res.tests.iter().find(|t| t.removed).unwrap();
        assert_eq!(removal.cond_size, 1);
        assert_eq!(removal.cond_set_label(), "Z");
        assert_eq!(removal.p_value, 1.0);
    }

    #[test]
    fn audit_rows_for_unconditional_survivors() {
        let m = confounded();
        let res = pc_skeleton(&m, &names(&["X", "Y", "Z"]), &SkeletonParams::default()).unwrap();
        let audit: Vec<&EdgeTest> = res.tests.iter().filter(|t| t.cond_size == -1).collect();
        // all three pairs are marginally dependent
        assert_eq!(audit.len(), 3);
        assert!(audit.iter().all(|t| !t.removed && t.cond_set_label() == "—"));
        assert!(audit.iter().all(|t| t.p_value <= 0.05));
    }

    #[test]
    fn max_cond_zero_keeps_confounded_edge() {
        let m = confounded();
        let params = SkeletonParams {
            alpha: 0.05,
            max_cond_set: 0,
        };
        let res = pc_skeleton(&m, &names(&["X", "Y", "Z"]), &params).unwrap();
        assert!(res.has_edge("X", "Y"));
        assert!(res.sepsets.is_empty());
    }

    #[test]
    fn deterministic_across_runs() {
        let m = confounded();
        let f = names(&["Z", "X", "Y"]);
        let a = pc_skeleton(&m, &f, &SkeletonParams::default()).unwrap();
        let b = pc_skeleton(&m, &f, &SkeletonParams::default()).unwrap();
        assert_eq!(a.skeleton, b.skeleton);
        assert_eq!(a.tests, b.tests);
        assert_eq!(a.graph.arcs(), b.graph.arcs());
    }

    #[test]
    fn unknown_feature_is_an_error() {
        let m = collider();
        let err = pc_skeleton(&m, &names(&["X", "W"]), &SkeletonParams::default()).unwrap_err();
        assert_eq!(err, AmrError::UnknownFeature("W".into()));
    }

    #[test]
    fn empty_and_single_feature() {
        let m = collider();
        let res = pc_skeleton(&m, &[], &SkeletonParams::default()).unwrap();
        assert!(res.skeleton.is_empty() && res.tests.is_empty());
        let res = pc_skeleton(&m, &names(&["X"]), &SkeletonParams::default()).unwrap();
        assert_eq!(res.graph.node_count(), 1);
        assert_eq!(res.graph.arc_count(), 0);
    }

    #[test]
    fn label_rendering() {
        let mut t = EdgeTest {
            node1: "A".into(),
            node2: "B".into(),
            removed: true,
            cond_set: vec![],
            p_value: 0.4,
            cond_size: 0,
        };
        assert_eq!(t.cond_set_label(), "∅");
        t.cond_set = names(&["C", "D"]);
        t.cond_size = 2;
        assert_eq!(t.cond_set_label(), "C,D");
        let rec = EdgeTestRecord::from(t);
        assert_eq!(rec.cond_set, "C,D");
    }

    /// Tester answering from a fixed list of independence statements.
    /// Column `k` is identified by its single `Some(true)` at row `k`.
    struct Scripted {
        independent: Vec<(usize, usize, Vec<usize>)>,
    }

    impl Scripted {
        fn id(col: &[Call]) -> usize {
            col.iter().position(|c| *c == Some(true)).unwrap()
        }
    }

    impl IndependenceTest for Scripted {
        fn test(&self, x: &[Call], y: &[Call], z: &[&[Call]]) -> TestOutcome {
            let (a, b) = (Self::id(x), Self::id(y));
            let mut cond: Vec<usize> = z.iter().map(|c| Self::id(c)).collect();
            cond.sort_unstable();
            let hit = self
                .independent
                .iter()
                .any(|(i, j, s)| (a.min(b), a.max(b)) == (*i, *j) && *s == cond);
            TestOutcome::Tested {
                p_value: if hit { 1.0 } else { 0.0 },
            }
        }
    }

    fn indicator_matrix(labels: &[&str]) -> ObservationMatrix {
        let n = labels.len();
        let cols = labels
            .iter()
            .enumerate()
            .map(|(k, name)| (name.to_string(), (0..n).map(|r| Some(r == k)).collect()))
            .collect();
        ObservationMatrix::from_columns(ids(n), cols).unwrap()
    }

    #[test]
    fn removals_wait_for_the_end_of_the_phase() {
        // A–B and A–C fall at size 1. B–C is separated only by {A}; had A
        // already left the neighbourhood of both, {A} would never be tried.
        let labels = ["A", "B", "C", "D"];
        let m = indicator_matrix(&labels);
        let tester = Scripted {
            independent: vec![(0, 1, vec![2]), (0, 2, vec![1]), (1, 2, vec![0])],
        };
        let params = SkeletonParams {
            alpha: 0.05,
            max_cond_set: 1,
        };
        let res = pc_skeleton_with(&tester, &m, &names(&labels), &params).unwrap();

        assert!(!res.has_edge("A", "B"));
        assert!(!res.has_edge("A", "C"));
        assert!(!res.has_edge("B", "C"));
        assert_eq!(res.separating_set("B", "C"), Some(names(&["A"])));
        assert_eq!(res.separating_set("A", "C"), Some(names(&["B"])));
        assert!(res.has_edge("A", "D"));
        assert_eq!(res.skeleton.len(), 3);
    }

    #[test]
    fn first_separating_subset_is_recorded() {
        // Pool of A–B at size 2 is {C, D, E}: {C,D}, {C,E}, {D,E} in that
        // order. Both {C,E} and {D,E} separate; the first one wins.
        let labels = ["A", "B", "C", "D", "E"];
        let m = indicator_matrix(&labels);
        let tester = Scripted {
            independent: vec![(0, 1, vec![3, 4]), (0, 1, vec![2, 4])],
        };
        let params = SkeletonParams {
            alpha: 0.05,
            max_cond_set: 2,
        };
        let res = pc_skeleton_with(&tester, &m, &names(&labels), &params).unwrap();

        assert!(!res.has_edge("A", "B"));
        assert_eq!(res.separating_set("A", "B"), Some(names(&["C", "E"])));
        let removal = res.tests.iter().find(|t| t.removed).unwrap();
        assert_eq!(removal.cond_size, 2);
        assert_eq!(removal.cond_set_label(), "C,E");
        assert_eq!(res.skeleton.len(), 9);
    }
}
