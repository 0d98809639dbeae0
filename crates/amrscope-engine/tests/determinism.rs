//! Determinism
//!
//! Identical inputs and options must give byte-identical results, and the
//! seeded generators must reproduce their cohorts.

use amrscope_engine::pipeline::{Pipeline, PipelineOptions, PipelineReport};
use amrscope_engine::synthetic::{planted_cohort, random_cohort, ScalingSpec};

fn fingerprint(report: &PipelineReport) -> String {
    let skeleton = report.skeleton.as_ref().unwrap();
    serde_json::json!({
        "spectrum": report.spectrum,
        "prevalence": report.prevalence,
        "mdr_probability": report.mdr_probability,
        "evpi": report.evpi,
        "network": report.network.tests,
        "motifs": report.motifs,
        "skeleton_tests": skeleton.tests,
        "arcs": skeleton.graph.arcs(),
        "hyperedges": report.hyperedges,
        "centrality": report.centrality,
        "interactions": report.interactions,
        "shapley": report.shapley,
    })
    .to_string()
}

#[test]
fn repeated_runs_are_identical() {
    let spec = ScalingSpec {
        n_isolates: 150,
        n_drugs: 10,
        n_classes: 5,
        missing_rate: 0.1,
    };
    let cohort = random_cohort(&spec, 2024).unwrap();
    let pipeline = Pipeline::new(PipelineOptions {
        classes: cohort.classes.clone(),
        mdr_threshold: 2,
        ..Default::default()
    });

    let first = fingerprint(&pipeline.run(&cohort.drugs, None).unwrap());
    let second = fingerprint(&pipeline.run(&cohort.drugs, None).unwrap());
    assert_eq!(first, second);
}

#[test]
fn seeded_cohorts_reproduce() {
    assert_eq!(planted_cohort(300, 1).unwrap().drugs, planted_cohort(300, 1).unwrap().drugs);
    let spec = ScalingSpec::default();
    assert_eq!(
        random_cohort(&spec, 3).unwrap().drugs,
        random_cohort(&spec, 3).unwrap().drugs
    );
}
