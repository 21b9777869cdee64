// ==============================================================================
// processor.rs - QC Summary Processing Pipeline
// ==============================================================================
// Description: Discovers sample summaries, evaluates QC rules, writes the report
// Author: Matt Barham
// Created: 2025-10-31
// Modified: 2026-10-19
// Version: 3.0.0
// ==============================================================================

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::models::{GenomeMode, RangeCheck};
use crate::normalizer;
use crate::output::{ReportMetadata, ReportTable};
use crate::parsers::SummaryParser;
use crate::rules::RuleEvaluator;
use crate::validator;

/// Summary file location relative to each sample directory
pub const SUMMARY_RELATIVE_PATH: [&str; 2] = ["outs", "summary.csv"];

/// Run configuration, built from the command line
#[derive(Debug, Clone)]
pub struct ReportConfig {
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    pub genome: GenomeMode,
    pub range_check: RangeCheck,
    pub normalize: bool,
    pub write_metadata: bool,
}

/// A sample directory holding a summary file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleInput {
    pub sample_id: String,
    pub summary_path: PathBuf,
}

/// Result of scanning the input directory
#[derive(Debug, Default)]
pub struct SampleDiscovery {
    pub samples: Vec<SampleInput>,
    /// Subdirectories without a summary file
    pub skipped: Vec<String>,
}

/// Path of the summary file for one sample directory
pub fn summary_path(sample_dir: &Path) -> PathBuf {
    SUMMARY_RELATIVE_PATH
        .iter()
        .fold(sample_dir.to_path_buf(), |path, part| path.join(part))
}

/// Enumerate immediate subdirectories of `dir`, sorted by name
pub fn locate_samples(dir: &Path) -> Result<SampleDiscovery> {
    debug!("Locating sample summaries in {:?}", dir);

    let mut discovery = SampleDiscovery::default();

    for entry in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .follow_links(true)
        .sort_by_file_name()
    {
        // Dangling symlinks and unreadable entries are not samples
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Skipping unreadable entry in {:?}: {}", dir, e);
                if let Some(name) = e.path().and_then(|p| p.file_name()) {
                    discovery.skipped.push(name.to_string_lossy().into_owned());
                }
                continue;
            }
        };
        if !entry.file_type().is_dir() {
            continue;
        }

        let sample_id = entry.file_name().to_string_lossy().into_owned();
        let path = summary_path(entry.path());

        if path.is_file() {
            discovery.samples.push(SampleInput {
                sample_id,
                summary_path: path,
            });
        } else {
            debug!("Skipping {:?}: no {}", entry.path(), SUMMARY_RELATIVE_PATH.join("/"));
            discovery.skipped.push(sample_id);
        }
    }

    Ok(discovery)
}

pub struct QcReportProcessor {
    config: ReportConfig,
    evaluator: RuleEvaluator,
}

impl QcReportProcessor {
    pub fn new(config: ReportConfig) -> Self {
        let evaluator = RuleEvaluator::new(config.genome.clone(), config.range_check);
        Self { config, evaluator }
    }

    /// Main processing pipeline. Returns the report path.
    pub fn process(&self) -> Result<PathBuf> {
        validator::validate_directory(&self.config.input_dir, "Input")?;
        validator::validate_directory(&self.config.output_dir, "Output")?;

        info!("Summarizing Cell Ranger results in {:?}", self.config.input_dir);
        info!(
            "Genome mode: {}, range check: {:?}, normalize: {}",
            self.config.genome, self.config.range_check, self.config.normalize
        );
        if let GenomeMode::Unrecognized(label) = &self.config.genome {
            warn!("Unrecognized genome '{}'; genome-specific rules are disabled", label);
        }

        // 1. Locate sample summaries
        let discovery = locate_samples(&self.config.input_dir)?;
        info!(
            "Found {} sample(s) ({} director(ies) without a summary)",
            discovery.samples.len(),
            discovery.skipped.len()
        );

        // 2. Evaluate each sample
        let table = self.build_table(&discovery.samples)?;

        // 3. Write the report once, after every sample succeeded
        let report_path = table.write_tsv(&self.config.output_dir)?;

        if self.config.write_metadata {
            let metadata = ReportMetadata {
                generated_at: chrono::Utc::now().to_rfc3339(),
                tool_version: env!("CARGO_PKG_VERSION").to_string(),
                input_dir: self.config.input_dir.clone(),
                output_dir: self.config.output_dir.clone(),
                genome_mode: self.config.genome.clone(),
                range_check: self.config.range_check,
                normalized: self.config.normalize,
                samples: ReportMetadata::sample_entries(&table),
                skipped_directories: discovery.skipped,
            };
            metadata.write_json(&self.config.output_dir)?;
        }

        Ok(report_path)
    }

    /// Load and evaluate every sample, in discovery order
    pub fn build_table(&self, samples: &[SampleInput]) -> Result<ReportTable> {
        let mut table = ReportTable::new();

        for sample in samples {
            let source = if self.config.normalize {
                normalizer::normalize_summary(&sample.summary_path)?.path
            } else {
                sample.summary_path.clone()
            };

            let summary = SummaryParser::parse(&sample.sample_id, &source)
                .with_context(|| format!("Failed to parse summary for sample '{}'", sample.sample_id))?;

            let warnings = self.evaluator.evaluate(&summary)?;
            info!(
                "{}: {} warning(s) ({} major)",
                sample.sample_id,
                warnings.total,
                warnings.major
            );

            table.push(summary, warnings);
        }

        Ok(table)
    }
}
