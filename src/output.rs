// ==============================================================================
// output.rs - QC Report Output Generation
// ==============================================================================
// Description: Consolidated tab-separated QC report and run metadata
// Author: Matt Barham
// Created: 2025-11-06
// Modified: 2026-10-19
// Version: 2.0.0
// ==============================================================================

use anyhow::{Context, Result};
use csv::WriterBuilder;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::models::{GenomeMode, RangeCheck, SampleSummary};
use crate::rules::SampleWarnings;

/// Report file name inside the output directory
pub const REPORT_FILE_NAME: &str = "QC_Summary_CellRanger_Report.tsv";

/// Metadata sidecar file name inside the output directory
pub const METADATA_FILE_NAME: &str = "QC_Summary_CellRanger_Report.json";

pub const SAMPLE_ID_COLUMN: &str = "Sample ID";
pub const WARNINGS_COLUMN: &str = "Warnings";
pub const MAJOR_WARNINGS_COLUMN: &str = "MajorWarnings";
pub const TOTAL_WARNINGS_COLUMN: &str = "Total Warnings";

/// Columns appended after the summary metrics
const WARNING_COLUMNS: [&str; 3] = [WARNINGS_COLUMN, MAJOR_WARNINGS_COLUMN, TOTAL_WARNINGS_COLUMN];

fn is_column(name: &str, column: &str) -> bool {
    name.trim().eq_ignore_ascii_case(column)
}

fn is_warning_column(name: &str) -> bool {
    WARNING_COLUMNS.iter().any(|c| is_column(name, c))
}

/// One evaluated sample
#[derive(Debug, Clone)]
pub struct ReportRow {
    pub summary: SampleSummary,
    pub warnings: SampleWarnings,
}

/// Append-only collection of evaluated samples
#[derive(Debug, Default)]
pub struct ReportTable {
    rows: Vec<ReportRow>,
}

impl ReportTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, summary: SampleSummary, warnings: SampleWarnings) {
        self.rows.push(ReportRow { summary, warnings });
    }

    pub fn rows(&self) -> &[ReportRow] {
        &self.rows
    }

    /// Union of summary columns in first-seen order, then the warning columns
    ///
    /// A summary's own "Sample ID" column keeps its position but carries the
    /// directory-derived identifier. Without one, "Sample ID" is appended
    /// ahead of the warning columns.
    pub fn header(&self) -> Vec<String> {
        let mut header: Vec<String> = Vec::new();

        for row in &self.rows {
            for name in row.summary.column_names() {
                if is_warning_column(name) {
                    continue;
                }
                let name = if is_column(name, SAMPLE_ID_COLUMN) {
                    SAMPLE_ID_COLUMN
                } else {
                    name
                };
                if !header.iter().any(|h| h.eq_ignore_ascii_case(name)) {
                    header.push(name.to_string());
                }
            }
        }

        if !header.iter().any(|h| h == SAMPLE_ID_COLUMN) {
            header.push(SAMPLE_ID_COLUMN.to_string());
        }
        header.extend(WARNING_COLUMNS.iter().map(|c| c.to_string()));
        header
    }

    fn record(row: &ReportRow, header: &[String]) -> Vec<String> {
        header
            .iter()
            .map(|column| match column.as_str() {
                SAMPLE_ID_COLUMN => row.summary.sample_id.clone(),
                WARNINGS_COLUMN => row.warnings.warnings.clone(),
                MAJOR_WARNINGS_COLUMN => row.warnings.major_warnings.clone(),
                TOTAL_WARNINGS_COLUMN => row.warnings.total.to_string(),
                _ => row
                    .summary
                    .get(column)
                    .map(|value| value.to_string())
                    .unwrap_or_default(),
            })
            .collect()
    }

    /// Write the report as TSV into an existing directory, replacing any previous report
    pub fn write_tsv(&self, outdir: &Path) -> Result<PathBuf> {
        let path = outdir.join(REPORT_FILE_NAME);

        let header = self.header();

        let mut writer = WriterBuilder::new()
            .delimiter(b'\t')
            .from_path(&path)
            .with_context(|| format!("Failed to create report {:?}", path))?;

        writer.write_record(&header)?;
        for row in &self.rows {
            writer.write_record(Self::record(row, &header))?;
        }
        writer
            .flush()
            .with_context(|| format!("Failed to write report {:?}", path))?;

        info!("Wrote {} sample(s) to {:?}", self.rows.len(), path);
        Ok(path)
    }
}

/// Run metadata written next to the report
#[derive(Debug, Serialize)]
pub struct ReportMetadata {
    pub generated_at: String,
    pub tool_version: String,
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    pub genome_mode: GenomeMode,
    pub range_check: RangeCheck,
    pub normalized: bool,
    pub samples: Vec<SampleMetadata>,
    pub skipped_directories: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct SampleMetadata {
    pub sample_id: String,
    pub source: PathBuf,
    pub total_warnings: u32,
}

impl ReportMetadata {
    pub fn sample_entries(table: &ReportTable) -> Vec<SampleMetadata> {
        table
            .rows()
            .iter()
            .map(|row| SampleMetadata {
                sample_id: row.summary.sample_id.clone(),
                source: row.summary.source.clone(),
                total_warnings: row.warnings.total,
            })
            .collect()
    }

    pub fn write_json(&self, outdir: &Path) -> Result<PathBuf> {
        let path = outdir.join(METADATA_FILE_NAME);
        let json = serde_json::to_string_pretty(self).context("Failed to serialize metadata")?;
        std::fs::write(&path, json)
            .with_context(|| format!("Failed to write metadata {:?}", path))?;

        info!("Wrote run metadata to {:?}", path);
        Ok(path)
    }
}
