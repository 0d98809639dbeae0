//! End-to-end analysis of one cohort.
//!
//! classify → spectrum/prevalence → decision tables → hybrid network →
//! skeleton → hypergraph → attribution. The pipeline performs no I/O; the
//! caller persists whatever parts of the [`PipelineReport`] it needs.

use crate::aggregate::{build_class_matrix, ontology_coverage, ClassRule, OntologyCoverage};
use crate::decision::{
    next_best_test_evpi, pattern_mdl_compression, shapley_pattern_contributions, CompressionRow,
    EvpiParams, EvpiRow, ShapleyRow,
};
use crate::hypergraph::{extract_hyperedges, hypergraph_centrality, CentralityRow, Hyperedge, HyperedgeParams};
use crate::interaction::{interaction_information, InteractionParams, InteractionRow};
use crate::mdr::{
    identify_mdr, mdr_probability, mdr_spectrum, prevalence_table, MdrProbabilityRow, MdrSummary,
    PrevalenceRow, SpectrumRow,
};
use crate::network::{build_hybrid_network, motif_census, HybridNetwork, MotifCount, NetworkParams};
use crate::qc::{layer_coverage, qc_binary_features, FeatureQcRow, LayerCoverage, QcParams};
use crate::skeleton::{pc_skeleton, SkeletonParams, SkeletonResult};
use amrscope_core::error::{AmrError, Result};
use amrscope_core::types::{ClassMap, ObservationMatrix};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{info, warn};

/// Name under which the optional gene layer is reported.
pub const GENE_LAYER: &str = "AMR_genes";

/// Everything a run needs besides the data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineOptions {
    pub classes: ClassMap,
    pub class_rule: ClassRule,
    pub mdr_threshold: usize,
    /// Fewer matched classes than this aborts the run.
    pub min_classes_matched: usize,
    /// Credible mass of the prevalence intervals.
    pub confidence: f64,
    pub probabilistic: bool,
    pub causal: bool,
    pub skeleton: SkeletonParams,
    pub hypergraph: bool,
    pub hyperedges: HyperedgeParams,
    pub interaction: InteractionParams,
    pub network: NetworkParams,
    pub gene_qc: QcParams,
    pub fn_cost: f64,
    pub fp_cost: f64,
    pub test_costs: BTreeMap<String, f64>,
    pub shapley_top_n: usize,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            classes: ClassMap::new(),
            class_rule: ClassRule::Any,
            mdr_threshold: 3,
            min_classes_matched: 1,
            confidence: 0.95,
            probabilistic: true,
            causal: true,
            skeleton: SkeletonParams::default(),
            hypergraph: true,
            hyperedges: HyperedgeParams::default(),
            interaction: InteractionParams::default(),
            network: NetworkParams::default(),
            gene_qc: QcParams::default(),
            fn_cost: 5.0,
            fp_cost: 1.0,
            test_costs: BTreeMap::new(),
            shapley_top_n: 10,
        }
    }
}

/// Results of one run.
#[derive(Debug, Clone)]
pub struct PipelineReport {
    pub class_matrix: ObservationMatrix,
    pub coverage: OntologyCoverage,
    pub spectrum: Vec<SpectrumRow>,
    pub prevalence: Vec<PrevalenceRow>,
    pub mdr_probability: Option<Vec<MdrProbabilityRow>>,
    pub evpi: Vec<EvpiRow>,
    pub mdr_summary: MdrSummary,
    pub layer_coverage: Option<LayerCoverage>,
    pub feature_qc: Vec<FeatureQcRow>,
    pub network: HybridNetwork,
    pub motifs: Vec<MotifCount>,
    pub skeleton: Option<SkeletonResult>,
    pub hyperedges: Vec<Hyperedge>,
    pub compression: Vec<CompressionRow>,
    pub centrality: Vec<CentralityRow>,
    pub interactions: Vec<InteractionRow>,
    pub shapley: Vec<ShapleyRow>,
}

pub struct Pipeline {
    options: PipelineOptions,
}

impl Pipeline {
    pub fn new(options: PipelineOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    pub fn run(&self, pheno: &ObservationMatrix, genes: Option<&ObservationMatrix>) -> Result<PipelineReport> {
        self.run_with_progress(pheno, genes, |_| {})
    }

    /// Like [`run`](Self::run), calling `progress` with the name of each stage
    /// as it starts.
    pub fn run_with_progress<F: FnMut(&str)>(
        &self,
        pheno: &ObservationMatrix,
        genes: Option<&ObservationMatrix>,
        mut progress: F,
    ) -> Result<PipelineReport> {
        let o = &self.options;

        progress("classification");
        info!("=== MDR classification ===");
        let class_matrix = build_class_matrix(pheno, &o.classes, o.class_rule)?;
        let coverage = ontology_coverage(pheno, &o.classes);
        if class_matrix.n_cols() == 0 || coverage.n_classes_matched < o.min_classes_matched {
            return Err(AmrError::invalid_config(
                "ontology.classes",
                format!(
                    "{}/{} classes, {}/{} drugs matched",
                    coverage.n_classes_matched,
                    coverage.n_classes_declared,
                    coverage.n_drugs_matched,
                    coverage.n_drugs_declared
                ),
                "MDR classification would be degenerate; class drug names must match the input columns",
            ));
        }
        if coverage.n_classes_matched < o.mdr_threshold {
            warn!(
                "Only {} antibiotic classes matched (threshold={}); MDR calls may be impossible or rare",
                coverage.n_classes_matched, o.mdr_threshold
            );
        }

        let spectrum = mdr_spectrum(&class_matrix, o.mdr_threshold);
        let prevalence = prevalence_table(&class_matrix, o.confidence);
        let mdr_probability = o
            .probabilistic
            .then(|| mdr_probability(&class_matrix, o.mdr_threshold));

        progress("decision");
        let evpi = next_best_test_evpi(
            &class_matrix,
            &EvpiParams {
                threshold: o.mdr_threshold,
                fn_cost: o.fn_cost,
                fp_cost: o.fp_cost,
                test_costs: o.test_costs.clone(),
            },
        );

        let mdr_summary = MdrSummary::of(&identify_mdr(&class_matrix, o.mdr_threshold));
        match mdr_summary.rate() {
            Some(rate) => info!(
                "MDR definite rate: {}/{} ({:.1}%), uncertain: {}",
                mdr_summary.n_mdr, mdr_summary.n_definite, rate, mdr_summary.n_uncertain
            ),
            None => info!("No definite MDR calls, uncertain: {}", mdr_summary.n_uncertain),
        }

        progress("network");
        info!("=== Hybrid co-resistance network ===");
        let (gene_layer, layer_cov, feature_qc) = match genes {
            Some(g) => {
                let cov = layer_coverage(GENE_LAYER, class_matrix.row_ids(), g);
                let aligned = g.align_to(class_matrix.row_ids())?;
                let (kept, report) = qc_binary_features(&aligned, &o.gene_qc)?;
                info!(
                    "Gene layer: {}/{} isolates covered, {}/{} features kept",
                    cov.n_covered,
                    cov.n_reference,
                    kept.n_cols(),
                    aligned.n_cols()
                );
                (Some(kept), Some(cov), report)
            }
            None => (None, None, Vec::new()),
        };

        let network = build_hybrid_network(&class_matrix, gene_layer.as_ref(), &o.network)?;
        info!(
            "Network: {} nodes, {} edges",
            network.node_count(),
            network.edge_count()
        );
        let motifs = if network.edge_count() > 2 {
            motif_census(&network.graph, &o.network.motif_sizes)
        } else {
            Vec::new()
        };

        let skeleton = if o.causal {
            progress("skeleton");
            info!("=== Conditional independence skeleton (PC) ===");
            let combined = match &gene_layer {
                Some(g) => class_matrix.hstack(g)?,
                None => class_matrix.clone(),
            };
            let features = combined.column_names().to_vec();
            let result = pc_skeleton(&combined, &features, &o.skeleton)?;
            info!(
                "Skeleton: {} edges, {} oriented arcs",
                result.skeleton.len(),
                result.graph.arc_count()
            );
            Some(result)
        } else {
            None
        };

        let (hyperedges, compression, centrality, interactions) = if o.hypergraph {
            progress("hypergraph");
            info!("=== Hypergraph MDR ===");
            let hyperedges = extract_hyperedges(&class_matrix, &o.hyperedges);
            let compression = pattern_mdl_compression(&hyperedges);
            let centrality = hypergraph_centrality(&hyperedges, class_matrix.column_names());
            let interactions =
                interaction_information(&class_matrix, class_matrix.column_names(), &o.interaction)?;
            info!(
                "Hyperedges: {}, interactions: {}",
                hyperedges.len(),
                interactions.len()
            );
            (hyperedges, compression, centrality, interactions)
        } else {
            (Vec::new(), Vec::new(), Vec::new(), Vec::new())
        };

        progress("attribution");
        let shapley = shapley_pattern_contributions(&class_matrix, o.mdr_threshold, o.shapley_top_n);

        Ok(PipelineReport {
            class_matrix,
            coverage,
            spectrum,
            prevalence,
            mdr_probability,
            evpi,
            mdr_summary,
            layer_coverage: layer_cov,
            feature_qc,
            network,
            motifs,
            skeleton,
            hyperedges,
            compression,
            centrality,
            interactions,
            shapley,
        })
    }
}
