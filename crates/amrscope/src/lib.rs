//! # amrscope
//!
//! Conditional-independence structure and co-resistance hypergraphs for
//! antimicrobial resistance cohorts.
//!
//! amrscope takes binary resistance calls (drug or class level, with honest
//! missing values) and recovers which resistances travel together, which
//! associations survive conditioning, and which missing test would most
//! sharpen an uncertain MDR call.
//!
//! ## Quick Start
//!
//! ```rust
//! use amrscope::prelude::*;
//!
//! // A seeded cohort with AMP → TET planted
//! let cohort = planted_cohort(200, 42).unwrap();
//!
//! let pipeline = Pipeline::new(PipelineOptions {
//!     classes: cohort.classes.clone(),
//!     ..Default::default()
//! });
//! let report = pipeline.run(&cohort.drugs, None).unwrap();
//!
//! let skeleton = report.skeleton.as_ref().unwrap();
//! assert!(skeleton.has_edge("Penicillins", "Tetracyclines"));
//!
//! for h in report.hyperedges.iter().take(3) {
//!     println!("{} (support: {:.3})", h.label(), h.support);
//! }
//! ```
//!
//! ## Architecture
//!
//! - [`amrscope_core`] - Observation matrix, error type, contingency
//!   statistics, the independence-test seam and p-value adjustment
//! - [`amrscope_engine`] - Class aggregation, MDR classification, PC
//!   skeleton, hypergraph and interaction analysis, decision engine,
//!   hybrid network, QC and the pipeline that chains them
//!
//! ## Key Concepts
//!
//! | Component | Question it answers |
//! |-----------|---------------------|
//! | Class aggregator | Is the isolate resistant to the class? |
//! | CMH tester | Are two features independent within every stratum? |
//! | Skeleton learner | Which associations survive conditioning? |
//! | Hypergraph builder | Which resistance sets co-occur? |
//! | Interaction analyzer | Is a triple synergistic or redundant? |
//! | Decision engine | Which missing test is worth running? |
//!
//! ### Missing data
//!
//! A missing call is never read as susceptible. MDR calls carry lower and
//! upper bounds, and the decision engine turns the gap into a posterior
//! probability and an expected risk reduction per candidate test.
//!
//! ```rust
//! use amrscope::prelude::*;
//!
//! let classes = ObservationMatrix::from_columns(
//!     vec!["S1".into(), "S2".into(), "S3".into()],
//!     vec![
//!         ("A".into(), vec![Some(true), Some(true), Some(false)]),
//!         ("B".into(), vec![Some(true), None, Some(false)]),
//!         ("C".into(), vec![None, Some(false), Some(true)]),
//!     ],
//! ).unwrap();
//!
//! let evpi = next_best_test_evpi(&classes, &EvpiParams { threshold: 2, ..Default::default() });
//! assert!(evpi.iter().all(|r| r.evpi_risk_reduction >= 0.0));
//! ```

// Re-export all subcrates
pub use amrscope_core as core;
pub use amrscope_engine as engine;

/// Prelude module for convenient imports.
///
/// ```rust
/// use amrscope::prelude::*;
/// ```
pub mod prelude {
    // Core types, statistics and errors
    pub use amrscope_core::prelude::*;

    // Classification
    pub use amrscope_engine::aggregate::{
        aggregate_calls, build_class_matrix, ontology_coverage, ClassRule, OntologyCoverage,
    };
    pub use amrscope_engine::mdr::{
        bayesian_prevalence, identify_mdr, mdr_probability, mdr_spectrum, prevalence_table,
        Category, MdrSummary, Prevalence,
    };

    // Structure discovery
    pub use amrscope_engine::skeleton::{pc_skeleton, pc_skeleton_with, SkeletonParams, SkeletonResult};
    pub use amrscope_engine::hypergraph::{
        extract_hyperedges, hypergraph_centrality, Hyperedge, HyperedgeParams,
    };
    pub use amrscope_engine::interaction::{
        interaction_information, InteractionParams, InteractionType,
    };
    pub use amrscope_engine::network::{build_hybrid_network, motif_census, HybridNetwork, NetworkParams};

    // Decisions under missing data
    pub use amrscope_engine::decision::{
        next_best_test_evpi, pattern_mdl_compression, posterior_mdr_probability,
        shapley_pattern_contributions, EvpiParams,
    };

    // QC and orchestration
    pub use amrscope_engine::qc::{layer_coverage, qc_binary_features, QcParams};
    pub use amrscope_engine::pipeline::{Pipeline, PipelineOptions, PipelineReport};
    pub use amrscope_engine::synthetic::{planted_cohort, random_cohort, Cohort, ScalingSpec};
}

/// Version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
