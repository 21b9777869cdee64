// ==============================================================================
// models.rs - QC Summary Data Models
// ==============================================================================
// Description: Data structures for per-sample Cell Ranger QC summaries
// Author: Matt Barham
// Created: 2025-11-12
// Modified: 2026-10-19
// Version: 3.0.0
// ==============================================================================

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Reference genomes recognized for multi-genome alignments
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReferenceGenome {
    GRCh38,
    GRCm39,
}

impl ReferenceGenome {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReferenceGenome::GRCh38 => "GRCh38",
            ReferenceGenome::GRCm39 => "GRCm39",
        }
    }

    /// All recognized genomes, in the order their prefixes are tried
    pub fn all() -> &'static [ReferenceGenome] {
        &[ReferenceGenome::GRCh38, ReferenceGenome::GRCm39]
    }

    /// Exact (case-sensitive) label match
    pub fn from_label(label: &str) -> Option<Self> {
        Self::all().iter().copied().find(|g| g.as_str() == label)
    }
}

/// Which genome-specific columns the rule evaluator consults
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", content = "genome", rename_all = "snake_case")]
pub enum GenomeMode {
    /// No `--genome` given: unqualified column names
    Unqualified,
    /// `"<genome> <metric>"` column names
    Genome(ReferenceGenome),
    /// Label given but not recognized; genome-specific rules are disabled
    Unrecognized(String),
}

impl GenomeMode {
    pub fn from_arg(genome: Option<&str>) -> Self {
        match genome {
            None => GenomeMode::Unqualified,
            Some(label) => match ReferenceGenome::from_label(label) {
                Some(g) => GenomeMode::Genome(g),
                None => GenomeMode::Unrecognized(label.to_string()),
            },
        }
    }
}

impl fmt::Display for GenomeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GenomeMode::Unqualified => write!(f, "none"),
            GenomeMode::Genome(g) => write!(f, "{}", g.as_str()),
            GenomeMode::Unrecognized(label) => write!(f, "{} (unrecognized)", label),
        }
    }
}

/// How two-sided range rules decide whether to fire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum RangeCheck {
    /// `lower < value < upper` fires (historical report behavior)
    #[default]
    Source,
    /// `value < lower || value > upper` fires (what the message text describes)
    Corrected,
}

impl RangeCheck {
    pub fn triggers(&self, lower: f64, upper: f64, value: f64) -> bool {
        match self {
            RangeCheck::Source => lower < value && value < upper,
            RangeCheck::Corrected => value < lower || value > upper,
        }
    }
}

/// A single cleaned summary field
#[derive(Debug, Clone, PartialEq)]
pub enum MetricValue {
    Number(f64),
    /// Non-empty field that did not convert to a number
    Text(String),
    /// Empty field
    Missing,
}

impl MetricValue {
    /// Strip thousands separators and percent signs, then convert if possible
    pub fn from_raw(raw: &str) -> Self {
        let cleaned: String = raw.chars().filter(|c| *c != ',' && *c != '%').collect();
        let cleaned = cleaned.trim();

        if cleaned.is_empty() {
            return MetricValue::Missing;
        }

        match cleaned.parse::<f64>() {
            Ok(v) => MetricValue::Number(v),
            Err(_) => MetricValue::Text(cleaned.to_string()),
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            MetricValue::Number(v) => Some(*v),
            _ => None,
        }
    }
}

impl fmt::Display for MetricValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricValue::Number(v) => write!(f, "{}", v),
            MetricValue::Text(s) => write!(f, "{}", s),
            MetricValue::Missing => Ok(()),
        }
    }
}

/// One sample's summary row, keyed by the original column names
#[derive(Debug, Clone)]
pub struct SampleSummary {
    /// Sample identifier (the sample's directory name)
    pub sample_id: String,

    /// File the row was loaded from
    pub source: PathBuf,

    /// Columns in file order
    pub columns: Vec<(String, MetricValue)>,
}

impl SampleSummary {
    /// Case-insensitive column lookup
    pub fn get(&self, column: &str) -> Option<&MetricValue> {
        self.columns
            .iter()
            .find(|(name, _)| name.trim().eq_ignore_ascii_case(column.trim()))
            .map(|(_, value)| value)
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|(name, _)| name.as_str())
    }
}
