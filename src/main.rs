// ==============================================================================
// main.rs - Cell Ranger QC Summary Entry Point
// ==============================================================================
// Description: Summarizes cellranger count results into one QC report
// Author: Matt Barham
// Created: 2025-10-31
// Modified: 2026-10-19
// Version: 2.0.0
// ==============================================================================

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cellranger_qc_summary::models::{GenomeMode, RangeCheck};
use cellranger_qc_summary::processor::{QcReportProcessor, ReportConfig};
use cellranger_qc_summary::validator::existing_directory;

/// Summarize cellranger count results from one or more sample output
/// directories into a single QC report with threshold-based warnings.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Data directory containing one cellranger output directory per sample
    #[arg(long, env = "QC_SUMMARY_DIR", value_parser = existing_directory)]
    dir: PathBuf,

    /// Output directory for the report (must already exist)
    #[arg(long, env = "QC_SUMMARY_OUTDIR", value_parser = existing_directory)]
    outdir: PathBuf,

    /// Genome to report on from a multiple-genome alignment (GRCh38, GRCm39)
    #[arg(long, env = "QC_SUMMARY_GENOME")]
    genome: Option<String>,

    /// Rescale fraction metrics (0-1) to percentages before evaluation
    #[arg(long, env = "QC_SUMMARY_NORMALIZE")]
    normalize: bool,

    /// How two-sided range rules fire
    #[arg(long, env = "QC_SUMMARY_RANGE_CHECK", value_enum, default_value_t = RangeCheck::Source)]
    range_check: RangeCheck,

    /// Also write run metadata as JSON next to the report
    #[arg(long, env = "QC_SUMMARY_METADATA")]
    metadata: bool,
}

fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cellranger_qc_summary=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();

    let config = ReportConfig {
        input_dir: args.dir,
        output_dir: args.outdir,
        genome: GenomeMode::from_arg(args.genome.as_deref()),
        range_check: args.range_check,
        normalize: args.normalize,
        write_metadata: args.metadata,
    };

    let report = QcReportProcessor::new(config).process()?;
    info!("QC summary complete: {:?}", report);

    Ok(())
}
