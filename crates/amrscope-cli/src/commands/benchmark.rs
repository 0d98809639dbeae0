//! Runtime scaling on random synthetic cohorts.

use amrscope::engine::pipeline::{Pipeline, PipelineOptions};
use amrscope::engine::skeleton::SkeletonParams;
use amrscope::engine::synthetic::{random_cohort, ScalingSpec};
use anyhow::{bail, ensure, Context, Result};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::path::Path;
use std::time::Instant;

use crate::io::write_csv;

#[derive(Debug, Clone)]
pub struct BenchmarkArgs {
    pub isolates: String,
    pub drugs: usize,
    pub classes: usize,
    pub missing: f64,
    pub max_cond_set: usize,
    pub seed: u64,
    pub output: Option<String>,
}

#[derive(Debug, Serialize)]
struct BenchmarkRow {
    n_isolates: usize,
    n_drugs: usize,
    n_classes: usize,
    missing_rate: f64,
    seconds: f64,
    skeleton_edges: usize,
    hyperedges: usize,
    evpi_rows: usize,
}

fn parse_sizes(list: &str) -> Result<Vec<usize>> {
    let sizes = list
        .split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<usize>().with_context(|| format!("Invalid isolate count: {:?}", s)))
        .collect::<Result<Vec<_>>>()?;
    if sizes.is_empty() {
        bail!("No isolate counts given");
    }
    Ok(sizes)
}

fn check_missing_rate(rate: f64) -> Result<()> {
    ensure!(
        rate.is_finite() && (0.0..=1.0).contains(&rate),
        "Missing rate must be between 0 and 1, got {}",
        rate
    );
    Ok(())
}

pub fn run(args: BenchmarkArgs) -> Result<()> {
    let sizes = parse_sizes(&args.isolates)?;
    check_missing_rate(args.missing)?;
    println!(
        "{} Benchmarking {} cohort sizes ({} drugs, {} classes, {:.0}% missing)...",
        "→".blue(),
        sizes.len().to_string().cyan(),
        args.drugs,
        args.classes,
        args.missing * 100.0
    );

    let pb = ProgressBar::new(sizes.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .context("Invalid progress template")?
            .progress_chars("#>-"),
    );

    let mut rows = Vec::with_capacity(sizes.len());
    for &n in &sizes {
        pb.set_message(format!("n={}", n));
        let spec = ScalingSpec {
            n_isolates: n,
            n_drugs: args.drugs,
            n_classes: args.classes,
            missing_rate: args.missing,
        };
        let cohort = random_cohort(&spec, args.seed)?;
        let pipeline = Pipeline::new(PipelineOptions {
            classes: cohort.classes.clone(),
            skeleton: SkeletonParams {
                max_cond_set: args.max_cond_set,
                ..Default::default()
            },
            ..Default::default()
        });

        let t0 = Instant::now();
        let report = pipeline.run(&cohort.drugs, None)?;
        let seconds = t0.elapsed().as_secs_f64();

        rows.push(BenchmarkRow {
            n_isolates: n,
            n_drugs: args.drugs,
            n_classes: args.classes,
            missing_rate: args.missing,
            seconds,
            skeleton_edges: report.skeleton.as_ref().map(|s| s.skeleton.len()).unwrap_or(0),
            hyperedges: report.hyperedges.len(),
            evpi_rows: report.evpi.len(),
        });
        pb.inc(1);
    }
    pb.finish_with_message("done");

    println!();
    println!(
        "  {:>10} {:>10} {:>10} {:>12}",
        "isolates", "seconds", "edges", "hyperedges"
    );
    for row in &rows {
        println!(
            "  {:>10} {:>10.3} {:>10} {:>12}",
            row.n_isolates,
            row.seconds,
            row.skeleton_edges,
            row.hyperedges
        );
    }

    if let Some(out) = args.output {
        write_csv(Path::new(&out), &rows)?;
        println!();
        println!("  {} Results written to {}", "✓".green(), out);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sizes_parse() {
        assert_eq!(parse_sizes("100, 200,,400").unwrap(), vec![100, 200, 400]);
        assert!(parse_sizes("").is_err());
        assert!(parse_sizes("10,x").is_err());
    }

    #[test]
    fn missing_rate_bounds() {
        assert!(check_missing_rate(0.0).is_ok());
        assert!(check_missing_rate(0.05).is_ok());
        assert!(check_missing_rate(1.0).is_ok());
        assert!(check_missing_rate(f64::NAN).is_err());
        assert!(check_missing_rate(-0.1).is_err());
        assert!(check_missing_rate(1.5).is_err());
    }
}
