//! Reproducibility manifest written next to the results.

use anyhow::{Context, Result};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::io::Read;
use std::path::Path;

pub const TOOL: &str = "amrscope";

#[derive(Debug, Clone, Serialize)]
pub struct InputDigest {
    pub name: String,
    pub path: String,
    pub sha256: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunManifest {
    pub tool: String,
    pub tool_version: String,
    pub timestamp: String,
    pub platform: String,
    pub seed: u64,
    pub inputs: Vec<InputDigest>,
    pub config_snapshot: serde_json::Value,
}

impl RunManifest {
    pub fn new<C: Serialize>(seed: u64, config: &C) -> Result<Self> {
        Ok(Self {
            tool: TOOL.to_string(),
            tool_version: env!("CARGO_PKG_VERSION").to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            platform: platform(),
            seed,
            inputs: Vec::new(),
            config_snapshot: serde_json::to_value(config).context("Failed to snapshot config")?,
        })
    }

    /// Record `path` under `name` with its SHA-256.
    pub fn add_input(&mut self, name: &str, path: &Path) -> Result<()> {
        self.inputs.push(InputDigest {
            name: name.to_string(),
            path: path.display().to_string(),
            sha256: sha256_file(path)?,
        });
        Ok(())
    }
}

pub fn platform() -> String {
    format!("{}-{}", std::env::consts::OS, std::env::consts::ARCH)
}

/// Hex SHA-256 of a file, streamed in 64 KiB chunks.
pub fn sha256_file(path: &Path) -> Result<String> {
    let mut file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open {} for hashing", path.display()))?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; 64 * 1024];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hashes_known_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("abc.txt");
        std::fs::write(&path, "abc").unwrap();
        assert_eq!(
            sha256_file(&path).unwrap(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn manifest_records_inputs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pheno.csv");
        std::fs::write(&path, "Strain_ID,AMP\nS1,1\n").unwrap();

        let mut manifest = RunManifest::new(7, &serde_json::json!({"seed": 7})).unwrap();
        manifest.add_input("phenotype", &path).unwrap();
        assert_eq!(manifest.inputs.len(), 1);
        assert_eq!(manifest.inputs[0].sha256.len(), 64);
        assert_eq!(manifest.seed, 7);
        assert_eq!(manifest.config_snapshot["seed"], 7);
    }
}
