//! Configuration management for the amrscope CLI.
//!
//! A run is described by `amrscope.toml`. Unknown keys are reported and
//! ignored unless strict mode is on (`config_strict = true` or
//! `AMRSCOPE_CONFIG_STRICT=1`), in which case they are fatal.

use amrscope::core::multitest::PAdjustMethod;
use amrscope::core::types::ClassMap;
use amrscope::engine::aggregate::ClassRule;
use amrscope::engine::hypergraph::HyperedgeParams;
use amrscope::engine::interaction::InteractionParams;
use amrscope::engine::network::NetworkParams;
use amrscope::engine::pipeline::PipelineOptions;
use amrscope::engine::qc::QcParams;
use amrscope::engine::skeleton::SkeletonParams;
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::warn;

pub const CONFIG_FILE: &str = "amrscope.toml";
pub const SCHEMA_VERSION: &str = "1.1";
pub const SUPPORTED_SCHEMA_VERSIONS: &[&str] = &["1.0", "1.1"];
pub const STRICT_ENV: &str = "AMRSCOPE_CONFIG_STRICT";

/// Tables whose keys are user data rather than settings.
const FREE_FORM: &[&str] = &["ontology.classes", "test_costs"];
/// Keys absent from the default config that are still valid.
const OPTIONAL_KEYS: &[&str] = &["gene_layer.feature_column", "gene_layer.value_column"];

/// amrscope run configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_schema_version")]
    pub schema_version: String,
    #[serde(default)]
    pub config_strict: bool,
    #[serde(default)]
    pub input_csv: String,
    /// Optional gene presence/absence layer.
    #[serde(default)]
    pub gene_csv: String,
    #[serde(default = "default_output_dir")]
    pub output_dir: String,
    #[serde(default = "default_id_column")]
    pub id_column: String,
    /// Fewer matched classes than this aborts the run.
    #[serde(default = "default_min_classes_matched")]
    pub min_classes_matched: usize,
    #[serde(default = "default_confidence")]
    pub confidence: f64,
    #[serde(default = "default_seed")]
    pub seed: u64,
    #[serde(default)]
    pub class_rule: ClassRule,
    /// Per-class test cost for the EVPI ranking; unlisted classes cost 1.
    #[serde(default)]
    pub test_costs: BTreeMap<String, f64>,
    #[serde(default)]
    pub ontology: OntologyConfig,
    #[serde(default)]
    pub causal: CausalConfig,
    #[serde(default)]
    pub hypergraph: HypergraphConfig,
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub gene_layer: GeneLayerConfig,
    #[serde(default)]
    pub probabilistic: ProbabilisticConfig,
    #[serde(default)]
    pub decision: DecisionConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OntologyConfig {
    #[serde(default = "default_mdr_threshold")]
    pub mdr_threshold: usize,
    /// Class name → drug columns of the phenotype CSV.
    #[serde(default)]
    pub classes: ClassMap,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CausalConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_alpha")]
    pub alpha: f64,
    #[serde(default = "default_max_cond_set")]
    pub max_cond_set: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HypergraphConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_min_pattern")]
    pub min_pattern: usize,
    #[serde(default = "default_max_pattern")]
    pub max_pattern: usize,
    #[serde(default = "default_min_support")]
    pub min_support: f64,
    #[serde(default = "default_max_interaction_order")]
    pub max_interaction_order: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkConfig {
    #[serde(default = "default_alpha")]
    pub alpha: f64,
    #[serde(default)]
    pub fdr_method: PAdjustMethod,
    #[serde(default = "default_motif_sizes")]
    pub motif_sizes: Vec<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GeneFormat {
    /// Long when `feature_column` is set, wide otherwise.
    #[default]
    Auto,
    Wide,
    Long,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneLayerConfig {
    #[serde(default)]
    pub format: GeneFormat,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feature_column: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_column: Option<String>,
    #[serde(default = "default_min_prev")]
    pub min_prev: f64,
    #[serde(default = "default_max_prev")]
    pub max_prev: f64,
    #[serde(default = "default_max_missing_frac")]
    pub max_missing_frac: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbabilisticConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionConfig {
    /// Cost of calling an MDR isolate non-MDR.
    #[serde(default = "default_fn_cost")]
    pub fn_cost: f64,
    #[serde(default = "default_fp_cost")]
    pub fp_cost: f64,
    #[serde(default = "default_shapley_top_n")]
    pub shapley_top_n: usize,
}

// Default value functions
fn default_schema_version() -> String { SCHEMA_VERSION.to_string() }
fn default_output_dir() -> String { "mdr_results".to_string() }
fn default_id_column() -> String { "Strain_ID".to_string() }
fn default_min_classes_matched() -> usize { 1 }
fn default_confidence() -> f64 { 0.95 }
fn default_seed() -> u64 { 42 }
fn default_mdr_threshold() -> usize { 3 }
fn default_true() -> bool { true }
fn default_alpha() -> f64 { 0.05 }
fn default_max_cond_set() -> usize { 3 }
fn default_min_pattern() -> usize { 2 }
fn default_max_pattern() -> usize { 6 }
fn default_min_support() -> f64 { 0.05 }
fn default_max_interaction_order() -> usize { 3 }
fn default_motif_sizes() -> Vec<usize> { vec![3, 4] }
fn default_min_prev() -> f64 { 0.01 }
fn default_max_prev() -> f64 { 0.99 }
fn default_max_missing_frac() -> f64 { 0.5 }
fn default_fn_cost() -> f64 { 5.0 }
fn default_fp_cost() -> f64 { 1.0 }
fn default_shapley_top_n() -> usize { 10 }

impl Default for Config {
    fn default() -> Self {
        Self {
            schema_version: default_schema_version(),
            config_strict: false,
            input_csv: String::new(),
            gene_csv: String::new(),
            output_dir: default_output_dir(),
            id_column: default_id_column(),
            min_classes_matched: default_min_classes_matched(),
            confidence: default_confidence(),
            seed: default_seed(),
            class_rule: ClassRule::default(),
            test_costs: BTreeMap::new(),
            ontology: OntologyConfig::default(),
            causal: CausalConfig::default(),
            hypergraph: HypergraphConfig::default(),
            network: NetworkConfig::default(),
            gene_layer: GeneLayerConfig::default(),
            probabilistic: ProbabilisticConfig::default(),
            decision: DecisionConfig::default(),
        }
    }
}

impl Default for OntologyConfig {
    fn default() -> Self {
        Self {
            mdr_threshold: default_mdr_threshold(),
            classes: ClassMap::new(),
        }
    }
}

impl Default for CausalConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            alpha: default_alpha(),
            max_cond_set: default_max_cond_set(),
        }
    }
}

impl Default for HypergraphConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_pattern: default_min_pattern(),
            max_pattern: default_max_pattern(),
            min_support: default_min_support(),
            max_interaction_order: default_max_interaction_order(),
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            alpha: default_alpha(),
            fdr_method: PAdjustMethod::default(),
            motif_sizes: default_motif_sizes(),
        }
    }
}

impl Default for GeneLayerConfig {
    fn default() -> Self {
        Self {
            format: GeneFormat::Auto,
            feature_column: None,
            value_column: None,
            min_prev: default_min_prev(),
            max_prev: default_max_prev(),
            max_missing_frac: default_max_missing_frac(),
        }
    }
}

impl Default for ProbabilisticConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl Default for DecisionConfig {
    fn default() -> Self {
        Self {
            fn_cost: default_fn_cost(),
            fp_cost: default_fp_cost(),
            shapley_top_n: default_shapley_top_n(),
        }
    }
}

impl GeneLayerConfig {
    /// Resolve `auto` against the configured columns.
    pub fn effective_format(&self) -> GeneFormat {
        match self.format {
            GeneFormat::Auto if self.feature_column.is_some() => GeneFormat::Long,
            GeneFormat::Auto => GeneFormat::Wide,
            other => other,
        }
    }
}

/// Outcome of checking a config file against the schema.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConfigValidation {
    pub schema_version_in: String,
    pub schema_version_effective: String,
    pub supported_schema_versions: Vec<String>,
    pub unknown_keys: Vec<String>,
    pub strict: bool,
    /// PASS, or WARN when keys were ignored or the version is unknown.
    pub status: String,
}

impl Config {
    /// Load from `path`, or from the discovered config file, or defaults.
    pub fn load(path: Option<&Path>) -> Result<(Self, ConfigValidation)> {
        let path = match path {
            Some(p) => Some(p.to_path_buf()),
            None => find_config_file(),
        };
        match path {
            Some(path) => Self::load_from(&path),
            None => {
                let config = Config::default();
                let validation = config.clean_validation(strict_from_env());
                Ok((config, validation))
            }
        }
    }

    pub fn load_from(path: &Path) -> Result<(Self, ConfigValidation)> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;
        Self::parse(&content, strict_from_env())
            .with_context(|| format!("Failed to load config: {}", path.display()))
    }

    /// Parse TOML text. `env_strict` forces strict mode regardless of the
    /// file's own `config_strict`.
    pub fn parse(content: &str, env_strict: bool) -> Result<(Self, ConfigValidation)> {
        let raw: toml::Table = toml::from_str(content).context("Invalid TOML")?;
        let schema_in = raw
            .get("schema_version")
            .map(|v| match v {
                toml::Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .unwrap_or_else(|| "1.0".to_string());
        let strict = env_strict
            || matches!(raw.get("config_strict"), Some(toml::Value::Boolean(true)));

        let supported = SUPPORTED_SCHEMA_VERSIONS.contains(&schema_in.as_str());
        if !supported {
            let msg = format!(
                "Unsupported schema_version={:?}. Supported: {:?}",
                schema_in, SUPPORTED_SCHEMA_VERSIONS
            );
            if strict {
                bail!(msg);
            }
            warn!("{}", msg);
        }

        let schema = match toml::Value::try_from(Config::default()).context("Failed to build config schema")? {
            toml::Value::Table(t) => t,
            _ => toml::Table::new(),
        };
        let mut unknown = Vec::new();
        collect_unknown_keys(&raw, &schema, "", &mut unknown);
        unknown.sort();
        unknown.dedup();
        if !unknown.is_empty() {
            let msg = format!("Unknown config keys ignored ({}): {:?}", unknown.len(), unknown);
            if strict {
                bail!(msg);
            }
            warn!("{}", msg);
        }

        let config = toml::Value::Table(raw)
            .try_into::<Config>()
            .context("Config does not match the schema")?;
        let status = if supported && unknown.is_empty() { "PASS" } else { "WARN" };
        let validation = ConfigValidation {
            schema_version_in: schema_in,
            schema_version_effective: config.schema_version.clone(),
            supported_schema_versions: SUPPORTED_SCHEMA_VERSIONS.iter().map(|s| s.to_string()).collect(),
            unknown_keys: unknown,
            strict,
            status: status.to_string(),
        };
        Ok((config, validation))
    }

    fn clean_validation(&self, strict: bool) -> ConfigValidation {
        ConfigValidation {
            schema_version_in: self.schema_version.clone(),
            schema_version_effective: self.schema_version.clone(),
            supported_schema_versions: SUPPORTED_SCHEMA_VERSIONS.iter().map(|s| s.to_string()).collect(),
            unknown_keys: Vec::new(),
            strict: strict || self.config_strict,
            status: "PASS".to_string(),
        }
    }

    /// Range checks that serde cannot express.
    pub fn check_values(&self) -> Result<()> {
        let unit = |name: &str, v: f64| -> Result<()> {
            if !(v > 0.0 && v < 1.0) {
                bail!("{} must lie in (0, 1), got {}", name, v);
            }
            Ok(())
        };
        unit("confidence", self.confidence)?;
        unit("causal.alpha", self.causal.alpha)?;
        unit("network.alpha", self.network.alpha)?;
        if self.ontology.mdr_threshold == 0 {
            bail!("ontology.mdr_threshold must be at least 1");
        }
        let h = &self.hypergraph;
        if h.min_pattern < 2 || h.min_pattern > h.max_pattern {
            bail!(
                "hypergraph patterns need 2 <= min_pattern <= max_pattern, got {}..{}",
                h.min_pattern,
                h.max_pattern
            );
        }
        if !(0.0..=1.0).contains(&h.min_support) {
            bail!("hypergraph.min_support must lie in [0, 1], got {}", h.min_support);
        }
        let g = &self.gene_layer;
        if g.min_prev > g.max_prev {
            bail!("gene_layer.min_prev exceeds gene_layer.max_prev");
        }
        if g.effective_format() == GeneFormat::Long && g.feature_column.is_none() {
            bail!("gene_layer.format = \"long\" requires gene_layer.feature_column");
        }
        if self.decision.fn_cost < 0.0 || self.decision.fp_cost < 0.0 {
            bail!("decision costs must be non-negative");
        }
        Ok(())
    }

    /// The engine view of this config.
    pub fn pipeline_options(&self) -> PipelineOptions {
        PipelineOptions {
            classes: self.ontology.classes.clone(),
            class_rule: self.class_rule,
            mdr_threshold: self.ontology.mdr_threshold,
            min_classes_matched: self.min_classes_matched,
            confidence: self.confidence,
            probabilistic: self.probabilistic.enabled,
            causal: self.causal.enabled,
            skeleton: SkeletonParams {
                alpha: self.causal.alpha,
                max_cond_set: self.causal.max_cond_set,
            },
            hypergraph: self.hypergraph.enabled,
            hyperedges: HyperedgeParams {
                min_size: self.hypergraph.min_pattern,
                max_size: self.hypergraph.max_pattern,
                min_support: self.hypergraph.min_support,
            },
            interaction: InteractionParams {
                max_order: self.hypergraph.max_interaction_order,
                min_support: self.hypergraph.min_support,
            },
            network: NetworkParams {
                alpha: self.network.alpha,
                fdr_method: self.network.fdr_method,
                motif_sizes: self.network.motif_sizes.clone(),
            },
            gene_qc: QcParams {
                min_prev: self.gene_layer.min_prev,
                max_prev: self.gene_layer.max_prev,
                max_missing_frac: self.gene_layer.max_missing_frac,
            },
            fn_cost: self.decision.fn_cost,
            fp_cost: self.decision.fp_cost,
            test_costs: self.test_costs.clone(),
            shapley_top_n: self.decision.shapley_top_n,
        }
    }

    /// Save config to the specified path.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = self.to_toml()?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config: {}", path.display()))?;
        Ok(())
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize config")
    }
}

fn collect_unknown_keys(raw: &toml::Table, schema: &toml::Table, prefix: &str, out: &mut Vec<String>) {
    for (key, value) in raw {
        let path = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{}.{}", prefix, key)
        };
        match schema.get(key) {
            None if OPTIONAL_KEYS.contains(&path.as_str()) => {}
            None => out.push(path),
            Some(_) if FREE_FORM.contains(&path.as_str()) => {}
            Some(toml::Value::Table(sub)) => {
                if let toml::Value::Table(raw_sub) = value {
                    collect_unknown_keys(raw_sub, sub, &path, out);
                }
            }
            Some(_) => {}
        }
    }
}

fn strict_from_env() -> bool {
    std::env::var(STRICT_ENV).map(|v| v == "1").unwrap_or(false)
}

/// Find amrscope.toml in the current or parent directories, then in the
/// user config directory.
pub fn find_config_file() -> Option<PathBuf> {
    if let Ok(mut dir) = std::env::current_dir() {
        loop {
            let config_path = dir.join(CONFIG_FILE);
            if config_path.exists() {
                return Some(config_path);
            }
            if !dir.pop() {
                break;
            }
        }
    }
    let fallback = dirs::config_dir()?.join("amrscope").join(CONFIG_FILE);
    fallback.exists().then_some(fallback)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);

        let mut config = Config::default();
        config.input_csv = "pheno.csv".into();
        config.ontology.classes.insert("Penicillins".into(), vec!["AMP".into(), "AMX".into()]);
        config.test_costs.insert("Penicillins".into(), 2.5);
        config.gene_layer.feature_column = Some("gene".into());
        config.network.fdr_method = PAdjustMethod::Holm;
        config.save(&path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let (loaded, validation) = Config::parse(&content, false).unwrap();
        assert_eq!(loaded, config);
        assert_eq!(validation.status, "PASS");
        assert!(validation.unknown_keys.is_empty());
    }

    #[test]
    fn missing_sections_use_defaults() {
        let (config, validation) = Config::parse("input_csv = \"x.csv\"\n", false).unwrap();
        assert_eq!(config.causal, CausalConfig::default());
        assert_eq!(config.ontology.mdr_threshold, 3);
        assert_eq!(config.id_column, "Strain_ID");
        assert_eq!(validation.schema_version_in, "1.0");
    }

    #[test]
    fn unknown_keys_are_reported() {
        let toml = r#"
            schema_version = "1.1"
            colour = "blue"

            [causal]
            alpha = 0.01
            algorithm = "fci"

            [ontology.classes]
            Penicillins = ["AMP"]

            [gene_layer]
            feature_column = "gene"
        "#;
        let (config, validation) = Config::parse(toml, false).unwrap();
        assert_eq!(validation.unknown_keys, vec!["causal.algorithm", "colour"]);
        assert_eq!(validation.status, "WARN");
        assert_eq!(config.causal.alpha, 0.01);
        assert_eq!(config.gene_layer.effective_format(), GeneFormat::Long);
    }

    #[test]
    fn strict_mode_rejects_unknown_keys() {
        let toml = "config_strict = true\ncolour = \"blue\"\n";
        assert!(Config::parse(toml, false).is_err());
        assert!(Config::parse("colour = \"blue\"\n", true).is_err());
        assert!(Config::parse("colour = \"blue\"\n", false).is_ok());
    }

    #[test]
    fn unsupported_schema_version() {
        let (_, validation) = Config::parse("schema_version = \"9.9\"\n", false).unwrap();
        assert_eq!(validation.status, "WARN");
        assert!(Config::parse("schema_version = \"9.9\"\n", true).is_err());
    }

    #[test]
    fn value_checks() {
        let mut config = Config::default();
        assert!(config.check_values().is_ok());
        config.causal.alpha = 1.5;
        assert!(config.check_values().is_err());

        let mut config = Config::default();
        config.hypergraph.min_pattern = 5;
        config.hypergraph.max_pattern = 3;
        assert!(config.check_values().is_err());

        let mut config = Config::default();
        config.gene_layer.format = GeneFormat::Long;
        assert!(config.check_values().is_err());
    }

    #[test]
    fn pipeline_options_follow_config() {
        let mut config = Config::default();
        config.causal.max_cond_set = 1;
        config.hypergraph.max_interaction_order = 4;
        config.decision.shapley_top_n = 5;
        let opts = config.pipeline_options();
        assert_eq!(opts.skeleton.max_cond_set, 1);
        assert_eq!(opts.interaction.max_order, 4);
        assert_eq!(opts.shapley_top_n, 5);
        assert_eq!(opts.hyperedges.max_size, 6);
    }
}
