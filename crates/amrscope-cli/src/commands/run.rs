//! Run the full analysis and write every result table.

use amrscope::engine::aggregate::ontology_coverage;
use amrscope::engine::pipeline::{Pipeline, PipelineReport};
use anyhow::{bail, Context, Result};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::config::Config;
use crate::io::{read_gene_layer, read_wide, write_csv, write_json};
use crate::manifest::RunManifest;

/// Command-line overrides of config values.
#[derive(Debug, Default)]
pub struct Overrides {
    pub input: Option<String>,
    pub genes: Option<String>,
    pub output: Option<String>,
    pub strict: bool,
}

#[derive(Serialize)]
struct MappingRow<'a> {
    class: &'a str,
    n_matched: usize,
    matched_drugs: String,
    n_unmatched: usize,
    unmatched_drugs: String,
}

pub fn run(config_path: Option<String>, overrides: Overrides, verbose: bool) -> Result<()> {
    let (mut config, validation) = Config::load(config_path.as_deref().map(Path::new))?;
    if overrides.strict && !validation.unknown_keys.is_empty() {
        bail!("Unknown config keys: {:?}", validation.unknown_keys);
    }
    if let Some(input) = overrides.input {
        config.input_csv = input;
    }
    if let Some(genes) = overrides.genes {
        config.gene_csv = genes;
    }
    if let Some(output) = overrides.output {
        config.output_dir = output;
    }
    config.check_values()?;
    if config.input_csv.is_empty() {
        bail!("No phenotype CSV: set input_csv in {} or pass --input", crate::config::CONFIG_FILE);
    }
    if config.ontology.classes.is_empty() {
        bail!("ontology.classes is empty: declare at least one class → drug list");
    }

    // Load data
    println!("{} Loading data...", "→".blue());
    let input_path = PathBuf::from(&config.input_csv);
    let pheno = read_wide(&input_path, &config.id_column)?;
    let gene_path = (!config.gene_csv.is_empty()).then(|| PathBuf::from(&config.gene_csv));
    let genes = gene_path
        .as_deref()
        .map(|p| read_gene_layer(p, &config.id_column, &config.gene_layer))
        .transpose()?;
    println!(
        "  {} {} isolates, {} drug columns{}",
        "✓".green(),
        pheno.n_rows().to_string().cyan(),
        pheno.n_cols().to_string().cyan(),
        genes
            .as_ref()
            .map(|g| format!(", {} gene features", g.n_cols()))
            .unwrap_or_default()
    );

    let out = PathBuf::from(&config.output_dir);
    std::fs::create_dir_all(&out)
        .with_context(|| format!("Failed to create {}", out.display()))?;

    // Ontology report goes out before the coverage gate can fail the run
    let coverage = ontology_coverage(&pheno, &config.ontology.classes);
    write_json(&out.join("ontology_mapping_report.json"), &coverage)?;
    let mapping: Vec<MappingRow> = config
        .ontology
        .classes
        .keys()
        .map(|class| {
            let matched = &coverage.matched_drug_columns_per_class[class];
            let unmatched = &coverage.unmatched_drug_columns_per_class[class];
            MappingRow {
                class,
                n_matched: matched.len(),
                matched_drugs: matched.join(";"),
                n_unmatched: unmatched.len(),
                unmatched_drugs: unmatched.join(";"),
            }
        })
        .collect();
    write_csv(&out.join("ontology_mapping_report.csv"), &mapping)?;

    // Analyse
    println!("{} Running analysis...", "→".blue());
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .context("Invalid progress template")?,
    );
    pb.enable_steady_tick(Duration::from_millis(100));
    let pipeline = Pipeline::new(config.pipeline_options());
    let report = pipeline.run_with_progress(&pheno, genes.as_ref(), |stage| {
        pb.set_message(stage.to_string());
    });
    let report = match report {
        Ok(r) => {
            pb.finish_with_message("done");
            r
        }
        Err(e) => {
            pb.abandon_with_message("failed");
            return Err(e).context("Analysis failed");
        }
    };

    // Persist
    let written = write_outputs(&out, &report)?;
    config.save(&out.join("config_used.toml"))?;

    let mut manifest = RunManifest::new(config.seed, &config)?;
    manifest.add_input("phenotype", &input_path)?;
    if let Some(p) = &gene_path {
        manifest.add_input("gene_layer", p)?;
    }
    manifest.add_input("config_used", &out.join("config_used.toml"))?;
    write_json(&out.join("run_manifest.json"), &manifest)?;

    if verbose {
        for name in &written {
            println!("  {} {}", "✓".green(), out.join(name).display());
        }
    }

    let s = &report.mdr_summary;
    println!();
    println!("{} Analysis complete!", "✓".green().bold());
    println!(
        "  Classes matched: {}/{}",
        report.coverage.n_classes_matched.to_string().cyan(),
        report.coverage.n_classes_declared
    );
    println!(
        "  MDR (definite): {}/{}{}",
        s.n_mdr.to_string().cyan(),
        s.n_definite,
        s.rate().map(|r| format!(" ({:.1}%)", r)).unwrap_or_default()
    );
    println!("  Uncertain: {}", s.n_uncertain.to_string().yellow());
    println!(
        "  Network: {} nodes, {} edges",
        report.network.node_count().to_string().cyan(),
        report.network.edge_count().to_string().cyan()
    );
    if let Some(sk) = &report.skeleton {
        println!(
            "  Skeleton: {} edges, {} oriented arcs",
            sk.skeleton.len().to_string().cyan(),
            sk.graph.arc_count().to_string().cyan()
        );
    }
    println!("  Hyperedges: {}", report.hyperedges.len().to_string().cyan());
    println!("  Results: {} ({} files)", out.display(), written.len() + 4);

    Ok(())
}

/// Write every table the report carries; returns the file names.
fn write_outputs(out: &Path, report: &PipelineReport) -> Result<Vec<&'static str>> {
    let mut written = Vec::new();
    let mut csv = |name: &'static str, res: Result<usize>| -> Result<()> {
        res?;
        written.push(name);
        Ok(())
    };

    csv("mdr_spectrum.csv", write_csv(&out.join("mdr_spectrum.csv"), &report.spectrum))?;
    csv("prevalence.csv", write_csv(&out.join("prevalence.csv"), &report.prevalence))?;
    if let Some(p) = &report.mdr_probability {
        csv("mdr_probability.csv", write_csv(&out.join("mdr_probability.csv"), p))?;
    }
    if !report.evpi.is_empty() {
        csv("next_best_test_evpi.csv", write_csv(&out.join("next_best_test_evpi.csv"), &report.evpi))?;
    }
    if let Some(cov) = &report.layer_coverage {
        csv("layer_coverage.csv", write_csv(&out.join("layer_coverage.csv"), std::slice::from_ref(cov)))?;
    }
    if !report.feature_qc.is_empty() {
        csv("feature_qc.csv", write_csv(&out.join("feature_qc.csv"), &report.feature_qc))?;
    }
    csv("network_edges.csv", write_csv(&out.join("network_edges.csv"), &report.network.tests))?;
    if !report.motifs.is_empty() {
        csv("motifs.csv", write_csv(&out.join("motifs.csv"), &report.motifs))?;
    }
    if let Some(sk) = &report.skeleton {
        csv("causal_edges.csv", write_csv(&out.join("causal_edges.csv"), &sk.tests))?;
    }
    if !report.hyperedges.is_empty() {
        csv("hyperedges.csv", write_csv(&out.join("hyperedges.csv"), &report.hyperedges))?;
        csv(
            "hyperedges_mdl_compression.csv",
            write_csv(&out.join("hyperedges_mdl_compression.csv"), &report.compression),
        )?;
    }
    if !report.centrality.is_empty() {
        csv(
            "hypergraph_centrality.csv",
            write_csv(&out.join("hypergraph_centrality.csv"), &report.centrality),
        )?;
    }
    if !report.interactions.is_empty() {
        csv(
            "interaction_information.csv",
            write_csv(&out.join("interaction_information.csv"), &report.interactions),
        )?;
    }
    if !report.shapley.is_empty() {
        csv(
            "mdr_shapley_contributions.csv",
            write_csv(&out.join("mdr_shapley_contributions.csv"), &report.shapley),
        )?;
    }

    write_json(&out.join("co_resistance.json"), &report.network.export())?;
    written.push("co_resistance.json");
    if let Some(sk) = &report.skeleton {
        write_json(&out.join("causal_graph.json"), &sk.graph.export())?;
        written.push("causal_graph.json");
    }
    Ok(written)
}
