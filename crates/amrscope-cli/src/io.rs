//! CSV ingestion and result writing.
//!
//! Missing cells stay missing: empty, `NA` and unparsable values become
//! `None`, never 0.

use amrscope::core::types::{parse_call, Call, ObservationMatrix};
use anyhow::{bail, Context, Result};
use csv::ReaderBuilder;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info};

use crate::config::{GeneFormat, GeneLayerConfig};

/// Wide CSV: one row per isolate, `id_column` plus one column per feature.
pub fn read_wide(path: &Path, id_column: &str) -> Result<ObservationMatrix> {
    let mut reader = ReaderBuilder::new()
        .from_path(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;
    let headers: Vec<String> = reader.headers()?.iter().map(|s| s.trim().to_string()).collect();
    let Some(id_idx) = headers.iter().position(|h| h == id_column) else {
        bail!("{}: id column {:?} not found", path.display(), id_column);
    };
    debug!("Headers: {:?}", headers);

    let mut ids = Vec::new();
    let mut columns: Vec<Vec<Call>> = vec![Vec::new(); headers.len()];
    for (line, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("{}: bad record at line {}", path.display(), line + 2))?;
        for (i, col) in columns.iter_mut().enumerate() {
            if i == id_idx {
                continue;
            }
            col.push(parse_call(record.get(i).unwrap_or("")));
        }
        ids.push(record.get(id_idx).unwrap_or("").trim().to_string());
    }

    let named = headers
        .into_iter()
        .zip(columns)
        .enumerate()
        .filter(|(i, _)| *i != id_idx)
        .map(|(_, c)| c)
        .collect();
    let matrix = ObservationMatrix::from_columns(ids, named)
        .with_context(|| format!("Invalid matrix in {}", path.display()))?;
    info!(
        "Loaded {}: {} isolates x {} features",
        path.display(),
        matrix.n_rows(),
        matrix.n_cols()
    );
    Ok(matrix)
}

/// Long CSV: one row per (isolate, feature).
///
/// With a value column, the value is parsed like any call and unlisted
/// pairs are missing. Without one, listed pairs are present and unlisted
/// features of a listed isolate are absent. Repeated pairs resolve to
/// present if any repeat is.
pub fn read_long(
    path: &Path,
    id_column: &str,
    feature_column: &str,
    value_column: Option<&str>,
) -> Result<ObservationMatrix> {
    let mut reader = ReaderBuilder::new()
        .from_path(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;
    let headers: Vec<String> = reader.headers()?.iter().map(|s| s.trim().to_string()).collect();
    let find = |name: &str| -> Result<usize> {
        headers
            .iter()
            .position(|h| h == name)
            .with_context(|| format!("{}: column {:?} not found", path.display(), name))
    };
    let id_idx = find(id_column)?;
    let feat_idx = find(feature_column)?;
    let value_idx = value_column.map(find).transpose()?;

    let mut ids: Vec<String> = Vec::new();
    let mut id_pos: HashMap<String, usize> = HashMap::new();
    let mut features: Vec<String> = Vec::new();
    let mut feat_pos: HashMap<String, usize> = HashMap::new();
    let mut cells: Vec<(usize, usize, Call)> = Vec::new();

    for (line, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("{}: bad record at line {}", path.display(), line + 2))?;
        let id = record.get(id_idx).unwrap_or("").trim().to_string();
        let feature = record.get(feat_idx).unwrap_or("").trim().to_string();
        if feature.is_empty() {
            continue;
        }
        let r = *id_pos.entry(id.clone()).or_insert_with(|| {
            ids.push(id);
            ids.len() - 1
        });
        let c = *feat_pos.entry(feature.clone()).or_insert_with(|| {
            features.push(feature);
            features.len() - 1
        });
        let call = match value_idx {
            Some(v) => parse_call(record.get(v).unwrap_or("")),
            None => Some(true),
        };
        cells.push((r, c, call));
    }

    let fill = if value_idx.is_some() { None } else { Some(false) };
    let mut columns: Vec<Vec<Call>> = vec![vec![fill; ids.len()]; features.len()];
    let mut seen = vec![vec![false; ids.len()]; features.len()];
    for (r, c, call) in cells {
        let slot = &mut columns[c][r];
        *slot = match (seen[c][r], *slot, call) {
            (false, _, new) => new,
            (true, Some(true), _) | (true, _, Some(true)) => Some(true),
            (true, old, None) => old,
            (true, _, new) => new,
        };
        seen[c][r] = true;
    }

    let matrix = ObservationMatrix::from_columns(ids, features.into_iter().zip(columns).collect())
        .with_context(|| format!("Invalid matrix in {}", path.display()))?;
    info!(
        "Loaded {} (long): {} isolates x {} features",
        path.display(),
        matrix.n_rows(),
        matrix.n_cols()
    );
    Ok(matrix)
}

/// Read the gene layer in the configured shape.
pub fn read_gene_layer(path: &Path, id_column: &str, layer: &GeneLayerConfig) -> Result<ObservationMatrix> {
    match (layer.effective_format(), layer.feature_column.as_deref()) {
        (GeneFormat::Long, Some(feature)) => read_long(path, id_column, feature, layer.value_column.as_deref()),
        (GeneFormat::Long, None) => bail!("long gene layer needs gene_layer.feature_column"),
        _ => read_wide(path, id_column),
    }
}

fn round4(value: Value) -> Value {
    match value {
        Value::Number(n) if n.is_f64() => n
            .as_f64()
            .and_then(|x| serde_json::Number::from_f64((x * 1e4).round() / 1e4))
            .map(Value::Number)
            .unwrap_or(Value::Null),
        other => other,
    }
}

fn cell(value: Value) -> String {
    match round4(value) {
        Value::Null => String::new(),
        Value::String(s) => s,
        other => other.to_string(),
    }
}

/// Write serializable rows as CSV with floats rounded to 4 decimals. The
/// header follows the field order of the first row.
pub fn write_csv<T: Serialize>(path: &Path, rows: &[T]) -> Result<usize> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    let mut header: Option<Vec<String>> = None;
    for row in rows {
        let Value::Object(map) = serde_json::to_value(row)? else {
            bail!("{}: rows must serialize as records", path.display());
        };
        if header.is_none() {
            let keys: Vec<String> = map.keys().cloned().collect();
            writer.write_record(&keys)?;
            header = Some(keys);
        }
        writer.write_record(map.into_iter().map(|(_, v)| cell(v)))?;
    }
    writer.flush()?;
    info!("  → {} ({} rows)", path.display(), rows.len());
    Ok(rows.len())
}

pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let content = serde_json::to_string_pretty(value).context("Failed to serialize JSON")?;
    std::fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))?;
    info!("  → {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write(dir: &Path, name: &str, content: &str) -> std::path::PathBuf {
        let path = dir.join(name);
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(content.as_bytes()).unwrap();
        path
    }

    #[test]
    fn wide_csv_keeps_missing_cells() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            dir.path(),
            "pheno.csv",
            "AMP,Strain_ID,TET\n1,S1,0\n,S2,NA\n0.0,S3,yes\n",
        );
        let m = read_wide(&path, "Strain_ID").unwrap();
        assert_eq!(m.row_ids(), ["S1", "S2", "S3"]);
        assert_eq!(m.column_names(), ["AMP", "TET"]);
        assert_eq!(m.column("AMP").unwrap(), [Some(true), None, Some(false)]);
        assert_eq!(m.column("TET").unwrap(), [Some(false), None, Some(true)]);
    }

    #[test]
    fn missing_id_column_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "pheno.csv", "id,AMP\nS1,1\n");
        assert!(read_wide(&path, "Strain_ID").is_err());
    }

    #[test]
    fn long_csv_with_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            dir.path(),
            "genes.csv",
            "Strain_ID,gene,present\nS1,blaTEM,1\nS2,blaTEM,0\nS1,tetM,1\nS2,tetM,\n",
        );
        let m = read_long(&path, "Strain_ID", "gene", Some("present")).unwrap();
        assert_eq!(m.column_names(), ["blaTEM", "tetM"]);
        assert_eq!(m.column("blaTEM").unwrap(), [Some(true), Some(false)]);
        assert_eq!(m.column("tetM").unwrap(), [Some(true), None]);
    }

    #[test]
    fn long_csv_presence_list() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "genes.csv", "Strain_ID,gene\nS1,blaTEM\nS2,tetM\nS1,blaTEM\n");
        let m = read_long(&path, "Strain_ID", "gene", None).unwrap();
        assert_eq!(m.column("blaTEM").unwrap(), [Some(true), Some(false)]);
        assert_eq!(m.column("tetM").unwrap(), [Some(false), Some(true)]);
    }

    #[derive(Serialize)]
    struct Row {
        name: String,
        value: f64,
        count: usize,
        note: Option<f64>,
    }

    #[test]
    fn csv_rows_are_rounded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        let rows = vec![Row {
            name: "a".into(),
            value: 0.123456,
            count: 3,
            note: None,
        }];
        assert_eq!(write_csv(&path, &rows).unwrap(), 1);
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text, "name,value,count,note\na,0.1235,3,\n");
    }
}
