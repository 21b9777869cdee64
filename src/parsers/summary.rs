// ==============================================================================
// summary.rs - Cell Ranger summary.csv Parser
// ==============================================================================
// Description: Parser for per-sample Cell Ranger QC summary files
// Author: Matt Barham
// Created: 2025-11-06
// Modified: 2026-10-19
// Version: 2.0.0
// ==============================================================================
// Format: CSV file with one header row and one data row
// Example:
//   Sample ID,Valid barcodes,Estimated number of cells,Percent duplicates
//   S1,"97.8%","6,432","41.2%"
// ==============================================================================

use csv::ReaderBuilder;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::models::{MetricValue, SampleSummary};

/// Errors that can occur during summary file parsing
#[derive(Error, Debug)]
pub enum SummaryParseError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("CSV parsing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("Summary file {0:?} has no header row")]
    MissingHeader(PathBuf),

    #[error("Summary file {0:?} has no data row")]
    NoDataRow(PathBuf),

    #[error("Summary file {path:?}: header has {expected} columns but data row has {found}")]
    RowLengthMismatch {
        path: PathBuf,
        expected: usize,
        found: usize,
    },
}

/// Summary file parser
pub struct SummaryParser;

impl SummaryParser {
    /// Parse the first data row of a summary file
    ///
    /// # Arguments
    /// * `sample_id` - Identifier attached to the row (the sample directory name)
    /// * `path` - Path to `summary.csv` (or its `_converted.csv` sibling)
    ///
    /// # Cleaning
    /// Every field has `,` and `%` removed before numeric conversion, so
    /// `"1,234%"` becomes `1234`. Fields that still do not parse are kept
    /// as text; empty fields become `MetricValue::Missing`.
    pub fn parse(
        sample_id: &str,
        path: impl AsRef<Path>,
    ) -> Result<SampleSummary, SummaryParseError> {
        let path = path.as_ref();
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_path(path)?;

        let headers = reader.headers()?.clone();
        if headers.is_empty() || headers.iter().all(|h| h.trim().is_empty()) {
            return Err(SummaryParseError::MissingHeader(path.to_path_buf()));
        }

        let record = match reader.records().next() {
            Some(result) => result?,
            None => return Err(SummaryParseError::NoDataRow(path.to_path_buf())),
        };

        if record.len() != headers.len() {
            return Err(SummaryParseError::RowLengthMismatch {
                path: path.to_path_buf(),
                expected: headers.len(),
                found: record.len(),
            });
        }

        let columns = headers
            .iter()
            .zip(record.iter())
            .map(|(name, raw)| (name.trim().to_string(), MetricValue::from_raw(raw)))
            .collect();

        Ok(SampleSummary {
            sample_id: sample_id.to_string(),
            source: path.to_path_buf(),
            columns,
        })
    }
}
