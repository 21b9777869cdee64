// ==============================================================================
// normalizer.rs - Fraction to Percentage Normalization
// ==============================================================================
// Description: Rescales fraction-valued summary metrics (0-1) to percentages
// Author: Matt Barham
// Created: 2026-10-19
// Modified: 2026-10-19
// Version: 1.0.0
// ==============================================================================
// Some Cell Ranger releases emit rate metrics as fractions ("0.978") while
// others emit percentages ("97.8%"). Threshold rules are expressed in
// percentages, so when normalization is enabled the raw summary is rewritten
// to a `<stem>_converted.csv` sibling before it is parsed.
// ==============================================================================

use anyhow::{Context, Result};
use csv::{ReaderBuilder, StringRecord, WriterBuilder};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::models::{MetricValue, ReferenceGenome};

/// Suffix of the normalized sibling file
pub const CONVERTED_SUFFIX: &str = "_converted.csv";

/// Metrics that are sometimes emitted as fractions in [0, 1]
pub const FRACTION_METRICS: &[&str] = &[
    "Valid barcodes",
    "Q30 bases in barcode",
    "Q30 bases in read 1",
    "Q30 bases in read 2",
    "Q30 bases in sample index i1",
    "Fraction of high-quality fragments in cells",
    "Fraction of transposition events in peaks in cells",
    "Percent duplicates",
    "Confidently mapped read pairs",
    "Unmapped read pairs",
    "Non-nuclear read pairs",
    "Fragments in nucleosome-free regions",
    "Fraction of genome in peaks",
    "Fraction of high-quality fragments overlapping TSS",
    "Fraction of high-quality fragments overlapping peaks",
];

/// Result of one normalization pass
#[derive(Debug, Clone)]
pub struct NormalizedSummary {
    /// Path of the written `_converted.csv` file
    pub path: PathBuf,
    /// Columns that were multiplied by 100
    pub rescaled_columns: Vec<String>,
}

/// Sibling path for the normalized file (`summary.csv` -> `summary_converted.csv`)
pub fn converted_path(path: &Path) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!("{}{}", stem, CONVERTED_SUFFIX))
}

/// Whether a column holds a metric from `FRACTION_METRICS`
///
/// Matching ignores case and an optional recognized genome prefix.
pub fn is_fraction_metric(column: &str) -> bool {
    let name = strip_genome_prefix(column.trim());
    FRACTION_METRICS.iter().any(|m| m.eq_ignore_ascii_case(name))
}

fn strip_genome_prefix(column: &str) -> &str {
    for genome in ReferenceGenome::all() {
        if let Some(rest) = column
            .strip_prefix(genome.as_str())
            .and_then(|rest| rest.strip_prefix(' '))
        {
            return rest;
        }
    }
    column
}

/// Multiply by 100, dropping floating-point noise past nine decimals
fn to_percent(value: f64) -> f64 {
    (value * 100.0 * 1e9).round() / 1e9
}

/// Rescale fraction columns in place. Returns the names of rescaled columns.
///
/// A column is rescaled only when no cell carries a `%` sign and its maximum
/// numeric value is <= 1.0, so running this on already-normalized data is a no-op.
pub fn normalize_records(headers: &StringRecord, rows: &mut [StringRecord]) -> Vec<String> {
    let mut rescaled = Vec::new();

    for (idx, column) in headers.iter().enumerate() {
        if !is_fraction_metric(column) {
            continue;
        }

        // An explicit percent sign means the column is already in percent
        if rows
            .iter()
            .filter_map(|row| row.get(idx))
            .any(|raw| raw.contains('%'))
        {
            debug!("Keeping '{}': values carry a percent sign", column);
            continue;
        }

        let max = rows
            .iter()
            .filter_map(|row| row.get(idx))
            .filter_map(|raw| MetricValue::from_raw(raw).as_number())
            .fold(None, |acc: Option<f64>, v| Some(acc.map_or(v, |m| m.max(v))));

        match max {
            Some(max) if max <= 1.0 => {
                debug!("Rescaling '{}' (max {}) to percent", column, max);
                for row in rows.iter_mut() {
                    *row = row
                        .iter()
                        .enumerate()
                        .map(|(i, raw)| match MetricValue::from_raw(raw) {
                            MetricValue::Number(v) if i == idx => to_percent(v).to_string(),
                            _ => raw.to_string(),
                        })
                        .collect();
                }
                rescaled.push(column.to_string());
            }
            _ => {}
        }
    }

    rescaled
}

/// Normalize a summary file and persist the result next to it
pub fn normalize_summary(path: &Path) -> Result<NormalizedSummary> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("Failed to open summary file {:?}", path))?;

    let headers = reader
        .headers()
        .with_context(|| format!("Failed to read header of {:?}", path))?
        .clone();

    let mut rows = reader
        .records()
        .collect::<std::result::Result<Vec<_>, _>>()
        .with_context(|| format!("Failed to read rows of {:?}", path))?;

    let rescaled_columns = normalize_records(&headers, &mut rows);

    let output = converted_path(path);
    let mut writer = WriterBuilder::new()
        .flexible(true)
        .from_path(&output)
        .with_context(|| format!("Failed to create {:?}", output))?;

    writer.write_record(&headers)?;
    for row in &rows {
        writer.write_record(row)?;
    }
    writer
        .flush()
        .with_context(|| format!("Failed to write {:?}", output))?;

    info!(
        "Normalized {:?} -> {:?} ({} column(s) rescaled)",
        path,
        output,
        rescaled_columns.len()
    );

    Ok(NormalizedSummary {
        path: output,
        rescaled_columns,
    })
}
