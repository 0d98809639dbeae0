//! Seeded synthetic cohorts for tests, self-checks and benchmarks.

use amrscope_core::error::{AmrError, Result};
use amrscope_core::types::{Call, ClassMap, ObservationMatrix};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Drug-level calls together with the ontology that groups them.
#[derive(Debug, Clone)]
pub struct Cohort {
    pub drugs: ObservationMatrix,
    pub classes: ClassMap,
}

/// P(TET resistant | AMP resistant) in the planted cohort.
pub const PLANTED_LINK: f64 = 0.95;
/// P(TET resistant | AMP susceptible) in the planted cohort.
pub const PLANTED_BACKGROUND: f64 = 0.08;

fn isolate_ids(n: usize) -> Vec<String> {
    (0..n).map(|i| format!("ISO{:05}", i + 1)).collect()
}

/// Six drugs in four classes with AMP → TET planted at 0.95 vs 0.08.
/// ERY and GEN are independent of everything.
pub fn planted_cohort(n: usize, seed: u64) -> Result<Cohort> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut cols: Vec<Vec<Call>> = vec![Vec::with_capacity(n); 6];
    for _ in 0..n {
        let amp = rng.gen_bool(0.55);
        let tet = rng.gen_bool(if amp { PLANTED_LINK } else { PLANTED_BACKGROUND });
        let amx = rng.gen_bool(0.10);
        let dox = rng.gen_bool(0.10);
        let ery = rng.gen_bool(0.30);
        let genta = rng.gen_bool(0.20);
        for (col, v) in cols.iter_mut().zip([amp, amx, tet, dox, ery, genta]) {
            col.push(Some(v));
        }
    }

    let names = ["AMP", "AMX", "TET", "DOX", "ERY", "GEN"];
    let drugs = ObservationMatrix::from_columns(
        isolate_ids(n),
        names.iter().map(|s| s.to_string()).zip(cols).collect(),
    )?;

    let mut classes = ClassMap::new();
    classes.insert("Penicillins".into(), vec!["AMP".into(), "AMX".into()]);
    classes.insert("Tetracyclines".into(), vec!["TET".into(), "DOX".into()]);
    classes.insert("Macrolides".into(), vec!["ERY".into()]);
    classes.insert("Aminoglycosides".into(), vec!["GEN".into()]);
    Ok(Cohort { drugs, classes })
}

/// Shape of a random scaling cohort.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScalingSpec {
    pub n_isolates: usize,
    pub n_drugs: usize,
    pub n_classes: usize,
    /// Probability that any single call is missing.
    pub missing_rate: f64,
}

impl Default for ScalingSpec {
    fn default() -> Self {
        Self {
            n_isolates: 500,
            n_drugs: 20,
            n_classes: 8,
            missing_rate: 0.05,
        }
    }
}

/// Independent drugs with prevalences drawn from [0.05, 0.6), assigned
/// round-robin to classes.
pub fn random_cohort(spec: &ScalingSpec, seed: u64) -> Result<Cohort> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let n_classes = spec.n_classes.max(1);
    if !spec.missing_rate.is_finite() {
        return Err(AmrError::invalid_config(
            "missing_rate",
            spec.missing_rate.to_string(),
            "must be a finite probability",
        ));
    }
    let missing = spec.missing_rate.clamp(0.0, 1.0);

    let mut columns = Vec::with_capacity(spec.n_drugs);
    let mut classes = ClassMap::new();
    for d in 0..spec.n_drugs {
        let name = format!("D{:03}", d + 1);
        let prevalence = rng.gen_range(0.05..0.6);
        let values: Vec<Call> = (0..spec.n_isolates)
            .map(|_| {
                if rng.gen_bool(missing) {
                    None
                } else {
                    Some(rng.gen_bool(prevalence))
                }
            })
            .collect();
        classes
            .entry(format!("Class{:02}", d % n_classes + 1))
            .or_default()
            .push(name.clone());
        columns.push((name, values));
    }

    Ok(Cohort {
        drugs: ObservationMatrix::from_columns(isolate_ids(spec.n_isolates), columns)?,
        classes,
    })
}
