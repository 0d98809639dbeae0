//! Validation self-check: known-answer tests of the statistical core plus a
//! smoke run of the pipeline, summarised as a JSON report.

use amrscope::core::contingency::Contingency2x2;
use amrscope::core::multitest::{adjust_pvalues, PAdjustMethod};
use amrscope::core::types::{parse_call, ObservationMatrix};
use amrscope::engine::aggregate::{build_class_matrix, ClassRule};
use amrscope::engine::decision::posterior_mdr_probability;
use amrscope::engine::mdr::{class_priors, mdr_probability};
use amrscope::engine::pipeline::{Pipeline, PipelineOptions};
use amrscope::engine::skeleton::{pc_skeleton, SkeletonParams};
use amrscope::engine::synthetic::{planted_cohort, random_cohort, ScalingSpec};
use anyhow::{bail, ensure, Result};
use colored::Colorize;
use serde::Serialize;
use std::path::Path;
use std::time::Instant;

use crate::config::Config;
use crate::io::write_json;
use crate::manifest::{platform, TOOL};

#[derive(Debug, Serialize)]
struct Check {
    name: &'static str,
    ok: bool,
    severity: &'static str,
    detail: Option<String>,
}

#[derive(Debug, Serialize)]
struct Summary {
    n_required_checks: usize,
    n_failed_required: usize,
    n_optional_failed: usize,
}

#[derive(Debug, Serialize)]
struct ChecklistItem {
    id: &'static str,
    label: &'static str,
    required: bool,
    implemented: bool,
}

#[derive(Debug, Serialize)]
struct SelfCheckReport {
    schema_version: &'static str,
    report_type: &'static str,
    tool: &'static str,
    version: &'static str,
    status: &'static str,
    summary: Summary,
    environment: serde_json::Value,
    timing: serde_json::Value,
    functional_checklist: Vec<ChecklistItem>,
    checks: Vec<Check>,
}

fn close(a: f64, b: f64, tol: f64) -> bool {
    (a - b).abs() <= tol
}

fn numeric_sanity() -> Result<()> {
    let m = ObservationMatrix::from_columns(
        (1..=5).map(|i| format!("S{}", i)).collect(),
        vec![("x".into(), ["0", "1", "1", "0", "1"].iter().map(|s| parse_call(s)).collect())],
    )?;
    let mean = m.observed_mean(0).unwrap_or(f64::NAN);
    ensure!(close(mean, 0.6, 1e-12), "mean {} != 0.6", mean);
    Ok(())
}

fn na_loader() -> Result<()> {
    ensure!(parse_call("NA").is_none(), "NA parsed as a value");
    ensure!(parse_call("").is_none(), "empty cell parsed as a value");
    ensure!(parse_call("0") == Some(false), "0 is not susceptible");
    ensure!(parse_call("2") == Some(true), "nonzero is not resistant");
    Ok(())
}

fn fisher_reference() -> Result<()> {
    let p = Contingency2x2::new(3, 1, 1, 3).fisher_exact();
    ensure!(close(p, 0.485714, 1e-5), "Fisher p {} != 0.485714", p);
    Ok(())
}

fn bh_reference() -> Result<()> {
    let adj = adjust_pvalues(&[0.01, 0.04, 0.03, 0.20], PAdjustMethod::FdrBh);
    let want = [0.04, 0.16 / 3.0, 0.16 / 3.0, 0.20];
    ensure!(
        adj.iter().zip(want).all(|(a, b)| close(*a, b, 1e-12)),
        "BH adjusted {:?}",
        adj
    );
    Ok(())
}

fn planted_signal() -> Result<()> {
    let cohort = planted_cohort(500, 42)?;
    let classes = build_class_matrix(&cohort.drugs, &cohort.classes, ClassRule::Any)?;
    let features = classes.column_names().to_vec();
    let res = pc_skeleton(
        &classes,
        &features,
        &SkeletonParams {
            alpha: 0.01,
            max_cond_set: 0,
        },
    )?;
    ensure!(
        res.has_edge("Penicillins", "Tetracyclines"),
        "planted Penicillins–Tetracyclines edge not recovered"
    );
    Ok(())
}

fn posterior_consistency() -> Result<()> {
    let spec = ScalingSpec {
        n_isolates: 60,
        n_drugs: 6,
        n_classes: 6,
        missing_rate: 0.3,
    };
    let cohort = random_cohort(&spec, 11)?;
    let classes = build_class_matrix(&cohort.drugs, &cohort.classes, ClassRule::Any)?;
    let priors = class_priors(&classes, 0.0);
    for (r, row) in mdr_probability(&classes, 3).iter().enumerate() {
        let p = posterior_mdr_probability(&classes.row(r), &priors, 3);
        ensure!(
            close(p, row.p_mdr, 1e-9),
            "{}: enumeration {} vs convolution {}",
            row.isolate,
            p,
            row.p_mdr
        );
    }
    Ok(())
}

fn config_round_trip() -> Result<()> {
    let config = Config::default();
    let (loaded, _) = Config::parse(&config.to_toml()?, false)?;
    ensure!(loaded == config, "default config does not survive save/load");
    Ok(())
}

fn pipeline_smoke() -> Result<()> {
    let cohort = planted_cohort(120, 3)?;
    let report = Pipeline::new(PipelineOptions {
        classes: cohort.classes,
        ..Default::default()
    })
    .run(&cohort.drugs, None)?;
    ensure!(report.spectrum.len() == 120, "spectrum has {} rows", report.spectrum.len());
    Ok(())
}

pub fn run(report_path: Option<String>) -> Result<()> {
    let t0 = Instant::now();
    println!("{} Running self-check...", "→".blue());

    let suite: [(&'static str, fn() -> Result<()>); 8] = [
        ("numeric_sanity_mean", numeric_sanity),
        ("na_aware_parsing", na_loader),
        ("fisher_exact_reference", fisher_reference),
        ("fdr_bh_reference", bh_reference),
        ("planted_signal_recovery", planted_signal),
        ("posterior_matches_convolution", posterior_consistency),
        ("config_round_trip", config_round_trip),
        ("pipeline_smoke", pipeline_smoke),
    ];

    let mut checks = Vec::with_capacity(suite.len());
    for (name, check) in suite {
        let outcome = check();
        match &outcome {
            Ok(()) => println!("  {} {}", "✓".green(), name),
            Err(e) => println!("  {} {}: {:#}", "✗".red(), name, e),
        }
        checks.push(Check {
            name,
            ok: outcome.is_ok(),
            severity: "required",
            detail: outcome.err().map(|e| format!("{:#}", e)),
        });
    }

    let n_failed_required = checks.iter().filter(|c| c.severity == "required" && !c.ok).count();
    let status = if n_failed_required == 0 { "PASS" } else { "FAIL" };
    let item = |id, label| ChecklistItem {
        id,
        label,
        required: true,
        implemented: true,
    };
    let report = SelfCheckReport {
        schema_version: "1.0",
        report_type: "validation_self_check",
        tool: TOOL,
        version: env!("CARGO_PKG_VERSION"),
        status,
        summary: Summary {
            n_required_checks: checks.iter().filter(|c| c.severity == "required").count(),
            n_failed_required,
            n_optional_failed: checks.iter().filter(|c| c.severity == "optional" && !c.ok).count(),
        },
        environment: serde_json::json!({ "platform": platform() }),
        timing: serde_json::json!({ "elapsed_sec": (t0.elapsed().as_secs_f64() * 1e4).round() / 1e4 }),
        functional_checklist: vec![
            item("cli_pipeline", "CLI pipeline entry point"),
            item("na_loader", "NA-aware loader (missing != 0)"),
            item("coverage_qc", "coverage + feature QC reports"),
            item("run_manifest", "run_manifest.json provenance"),
            item("self_check", "self-check validation report"),
            item("benchmark", "synthetic runtime benchmark"),
        ],
        checks,
    };

    if let Some(path) = report_path {
        write_json(Path::new(&path), &report)?;
        println!("  {} Report written to {}", "✓".green(), path);
    }

    println!();
    if report.status == "PASS" {
        println!("{} Self-check passed", "✓".green().bold());
        Ok(())
    } else {
        bail!("{} required check(s) failed", n_failed_required)
    }
}
