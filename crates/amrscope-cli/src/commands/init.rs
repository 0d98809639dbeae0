//! Initialize a new amrscope project.

use amrscope::engine::synthetic::planted_cohort;
use anyhow::{Context, Result};
use colored::Colorize;
use std::path::{Path, PathBuf};

use crate::config::{Config, CONFIG_FILE};

const DEMO_INPUT: &str = "demo_phenotypes.csv";

pub fn run(path: Option<String>, demo: bool) -> Result<()> {
    let base_path = match path {
        Some(p) => PathBuf::from(p),
        None => std::env::current_dir().context("Failed to read current directory")?,
    };

    println!("{} Initializing amrscope project...", "→".blue());
    std::fs::create_dir_all(&base_path)
        .with_context(|| format!("Failed to create {}", base_path.display()))?;

    let mut config = Config::default();
    if demo {
        let cohort = planted_cohort(200, config.seed)?;
        let demo_path = base_path.join(DEMO_INPUT);
        write_demo(&demo_path, &config.id_column, &cohort.drugs)?;
        println!("  {} Created {}", "✓".green(), demo_path.display());
        config.input_csv = DEMO_INPUT.to_string();
        config.ontology.classes = cohort.classes;
    }

    // Create default config
    let config_path = base_path.join(CONFIG_FILE);
    if !config_path.exists() {
        config.save(&config_path)?;
        println!("  {} Created {}", "✓".green(), config_path.display());
    } else {
        println!("  {} {} already exists", "•".yellow(), config_path.display());
    }

    // Keep results out of version control
    let gitignore_path = base_path.join(".gitignore");
    if !gitignore_path.exists() {
        std::fs::write(&gitignore_path, format!("{}/\n", config.output_dir))?;
        println!("  {} Created {}", "✓".green(), gitignore_path.display());
    }

    println!();
    println!("{} amrscope project initialized!", "✓".green().bold());
    println!();
    println!("Next steps:");
    if demo {
        println!("  {} amrscope run", "1.".blue());
        println!("  {} inspect {}/", "2.".blue(), config.output_dir);
    } else {
        println!("  {} set input_csv and [ontology.classes] in {}", "1.".blue(), CONFIG_FILE);
        println!("  {} amrscope validate-config", "2.".blue());
        println!("  {} amrscope run", "3.".blue());
    }

    Ok(())
}

fn write_demo(path: &Path, id_column: &str, drugs: &amrscope::core::types::ObservationMatrix) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    let mut header = vec![id_column.to_string()];
    header.extend(drugs.column_names().iter().cloned());
    writer.write_record(&header)?;
    for (r, id) in drugs.row_ids().iter().enumerate() {
        let mut record = vec![id.clone()];
        record.extend(drugs.row(r).into_iter().map(|call| match call {
            Some(v) => u8::from(v).to_string(),
            None => String::new(),
        }));
        writer.write_record(&record)?;
    }
    writer.flush()?;
    Ok(())
}
