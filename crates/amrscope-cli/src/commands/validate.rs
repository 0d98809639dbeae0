//! Validate a config file without running the analysis.

use anyhow::{bail, Result};
use colored::Colorize;
use std::path::{Path, PathBuf};

use crate::config::{find_config_file, Config};
use crate::io::write_json;

pub fn run(path: Option<String>, report: Option<String>) -> Result<()> {
    let path = match path.map(PathBuf::from).or_else(find_config_file) {
        Some(p) => p,
        None => bail!("No config given and no {} found", crate::config::CONFIG_FILE),
    };
    println!("{} Validating {}...", "→".blue(), path.display());

    let (config, validation) = match Config::load_from(&path) {
        Ok(loaded) => loaded,
        Err(e) => {
            println!("  {} {:#}", "✗".red(), e);
            println!();
            println!("{} {}", "FAIL".red().bold(), path.display());
            return Err(e);
        }
    };

    println!(
        "  {} schema_version {} (supported: {})",
        "•".blue(),
        validation.schema_version_in.cyan(),
        validation.supported_schema_versions.join(", ")
    );
    if validation.strict {
        println!("  {} strict mode", "•".blue());
    }
    for key in &validation.unknown_keys {
        println!("  {} unknown key ignored: {}", "•".yellow(), key);
    }

    let values = config.check_values();
    match &values {
        Ok(()) => println!("  {} values in range", "✓".green()),
        Err(e) => println!("  {} {}", "✗".red(), e),
    }
    let n_classes = config.ontology.classes.len();
    let n_drugs: usize = config.ontology.classes.values().map(Vec::len).sum();
    println!(
        "  {} ontology: {} classes, {} drugs, MDR threshold {}",
        if n_classes > 0 { "✓".green() } else { "•".yellow() },
        n_classes,
        n_drugs,
        config.ontology.mdr_threshold
    );

    if let Some(out) = report {
        write_json(Path::new(&out), &validation)?;
        println!("  {} Report written to {}", "✓".green(), out);
    }

    println!();
    match values {
        Err(e) => {
            println!("{} {}", "FAIL".red().bold(), path.display());
            Err(e)
        }
        Ok(()) if validation.status == "PASS" => {
            println!("{} {}", "PASS".green().bold(), path.display());
            Ok(())
        }
        Ok(()) => {
            println!("{} {}", "WARN".yellow().bold(), path.display());
            Ok(())
        }
    }
}
