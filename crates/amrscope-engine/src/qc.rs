//! Feature-layer quality control and coverage.

use amrscope_core::error::Result;
use amrscope_core::types::{CallCounts, ObservationMatrix};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QcParams {
    pub min_prev: f64,
    pub max_prev: f64,
    pub max_missing_frac: f64,
}

impl Default for QcParams {
    fn default() -> Self {
        Self {
            min_prev: 0.01,
            max_prev: 0.99,
            max_missing_frac: 0.5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureQcRow {
    pub feature: String,
    /// Prevalence among observed isolates.
    pub prevalence: Option<f64>,
    pub missing_frac: f64,
    pub n_observed: usize,
    pub kept: bool,
    pub reason: String,
}

/// Drop features that are mostly missing, ultra-rare or near-invariant.
/// Missing values are left as they are.
pub fn qc_binary_features(
    layer: &ObservationMatrix,
    params: &QcParams,
) -> Result<(ObservationMatrix, Vec<FeatureQcRow>)> {
    let mut report = Vec::with_capacity(layer.n_cols());
    let mut kept = Vec::new();

    for (idx, name) in layer.column_names().iter().enumerate() {
        let counts = CallCounts::of(layer.column_at(idx));
        let missing_frac = if counts.total() == 0 {
            1.0
        } else {
            counts.missing as f64 / counts.total() as f64
        };
        let prevalence = counts.observed_fraction();

        let reason = match prevalence {
            None => "no_observations",
            Some(_) if missing_frac > params.max_missing_frac => "too_missing",
            Some(p) if p < params.min_prev => "too_rare",
            Some(p) if p > params.max_prev => "too_common",
            Some(_) => "ok",
        };
        let keep = reason == "ok";
        if keep {
            kept.push(name.clone());
        }
        report.push(FeatureQcRow {
            feature: name.clone(),
            prevalence,
            missing_frac,
            n_observed: counts.observed(),
            kept: keep,
            reason: reason.to_string(),
        });
    }

    Ok((layer.select(&kept)?, report))
}

/// How many reference isolates a layer actually covers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LayerCoverage {
    pub layer: String,
    pub n_reference: usize,
    pub n_covered: usize,
    pub coverage_frac: f64,
    pub n_features: usize,
}

/// Reference isolates with at least one observed value in `layer`.
pub fn layer_coverage(name: &str, reference_ids: &[String], layer: &ObservationMatrix) -> LayerCoverage {
    let rows: HashMap<&str, usize> = layer
        .row_ids()
        .iter()
        .enumerate()
        .map(|(i, id)| (id.as_str(), i))
        .collect();
    let n_covered = reference_ids
        .iter()
        .filter_map(|id| rows.get(id.as_str()))
        .filter(|&&r| layer.row(r).iter().any(|c| c.is_some()))
        .count();
    let n_reference = reference_ids.len();
    LayerCoverage {
        layer: name.to_string(),
        n_reference,
        n_covered,
        coverage_frac: if n_reference == 0 {
            0.0
        } else {
            n_covered as f64 / n_reference as f64
        },
        n_features: layer.n_cols(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use amrscope_core::types::Call;

    fn layer() -> ObservationMatrix {
        let ids: Vec<String> = (0..10).map(|i| format!("S{}", i)).collect();
        let col = |f: &dyn Fn(usize) -> Call| (0..10).map(f).collect::<Vec<Call>>();
        ObservationMatrix::from_columns(
            ids,
            vec![
                ("ok".into(), col(&|i| Some(i % 3 == 0))),
                ("rare".into(), col(&|_| Some(false))),
                ("common".into(), col(&|_| Some(true))),
                ("sparse".into(), col(&|i| if i < 3 { Some(i == 0) } else { None })),
                ("empty".into(), col(&|_| None)),
            ],
        )
        .unwrap()
    }

    #[test]
    fn qc_reasons() {
        let (kept, report) = qc_binary_features(&layer(), &QcParams::default()).unwrap();
        assert_eq!(kept.column_names(), &["ok".to_string()]);
        let reasons: Vec<&str> = report.iter().map(|r| r.reason.as_str()).collect();
        assert_eq!(reasons, vec!["ok", "too_rare", "too_common", "too_missing", "no_observations"]);
        assert!((report[3].missing_frac - 0.7).abs() < 1e-12);
        assert_eq!(report[4].prevalence, None);
    }

    #[test]
    fn coverage_counts_observed_rows_only() {
        let ids: Vec<String> = vec!["S0".into(), "S1".into(), "X".into()];
        let m = ObservationMatrix::from_columns(
            vec!["S0".into(), "S1".into()],
            vec![("g".into(), vec![Some(true), None])],
        )
        .unwrap();
        let cov = layer_coverage("AMR_genes", &ids, &m);
        assert_eq!(cov.n_reference, 3);
        assert_eq!(cov.n_covered, 1);
        assert!((cov.coverage_frac - 1.0 / 3.0).abs() < 1e-12);
        assert_eq!(cov.n_features, 1);
    }
}
