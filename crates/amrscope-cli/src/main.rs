//! amrscope CLI - resistance structure discovery from the command line.

mod commands;
mod config;
mod io;
mod manifest;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "amrscope")]
#[command(author, version, about = "amrscope - Co-resistance structure discovery for AMR cohorts", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a new amrscope project
    Init {
        /// Project directory (default: current directory)
        #[arg(short, long)]
        path: Option<String>,

        /// Also write a synthetic phenotype CSV and a matching ontology
        #[arg(long)]
        demo: bool,
    },

    /// Run the full analysis
    Run {
        /// Config file (default: discover amrscope.toml)
        #[arg(short, long)]
        config: Option<String>,

        /// Phenotype CSV, overrides input_csv
        #[arg(short, long)]
        input: Option<String>,

        /// Gene layer CSV, overrides gene_csv
        #[arg(short, long)]
        genes: Option<String>,

        /// Output directory, overrides output_dir
        #[arg(short, long)]
        output: Option<String>,

        /// Fail on unknown config keys
        #[arg(long)]
        strict: bool,
    },

    /// Check a config file against the schema
    ValidateConfig {
        /// Config file (default: discover amrscope.toml)
        path: Option<String>,

        /// Write the validation report as JSON
        #[arg(short, long)]
        report: Option<String>,
    },

    /// Run known-answer checks of the statistical core
    SelfCheck {
        /// Write the self-check report as JSON
        #[arg(short, long)]
        report: Option<String>,
    },

    /// Time the pipeline on random synthetic cohorts
    Benchmark {
        /// Comma-separated isolate counts
        #[arg(short, long, default_value = "200,500,1000")]
        isolates: String,

        /// Drugs per cohort
        #[arg(short, long, default_value = "20")]
        drugs: usize,

        /// Antibiotic classes per cohort
        #[arg(short, long, default_value = "8")]
        classes: usize,

        /// Probability that a call is missing
        #[arg(short, long, default_value = "0.05")]
        missing: f64,

        /// Largest conditioning set of the skeleton search
        #[arg(long, default_value = "3")]
        max_cond_set: usize,

        /// Random seed
        #[arg(short, long, default_value = "42")]
        seed: u64,

        /// Write timings as CSV
        #[arg(short, long)]
        output: Option<String>,
    },
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Init { path, demo } => commands::init::run(path, demo),
        Commands::Run {
            config,
            input,
            genes,
            output,
            strict,
        } => commands::run::run(
            config,
            commands::run::Overrides {
                input,
                genes,
                output,
                strict,
            },
            cli.verbose,
        ),
        Commands::ValidateConfig { path, report } => commands::validate::run(path, report),
        Commands::SelfCheck { report } => commands::self_check::run(report),
        Commands::Benchmark {
            isolates,
            drugs,
            classes,
            missing,
            max_cond_set,
            seed,
            output,
        } => commands::benchmark::run(commands::benchmark::BenchmarkArgs {
            isolates,
            drugs,
            classes,
            missing,
            max_cond_set,
            seed,
            output,
        }),
    }
}
