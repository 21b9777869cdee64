// ==============================================================================
// rules.rs - QC Threshold Rules
// ==============================================================================
// Description: Fixed threshold rules that flag per-sample QC concerns
// Author: Matt Barham
// Created: 2026-10-19
// Modified: 2026-10-19
// Version: 1.0.0
// ==============================================================================
// Rules are evaluated in table order (sequencing, cell, library complexity,
// mapping, targeting). Order only affects message concatenation but is kept
// stable so reports can be diffed across runs.
// ==============================================================================

use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use crate::models::{GenomeMode, MetricValue, RangeCheck, SampleSummary};

/// Errors raised while evaluating rules against a sample
#[derive(Error, Debug, PartialEq)]
pub enum RuleError {
    #[error("Sample '{sample}' is missing required column '{column}'")]
    MissingColumn { sample: String, column: String },

    #[error("Sample '{sample}' column '{column}' is not numeric: '{value}'")]
    NonNumericMetric {
        sample: String,
        column: String,
        value: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Reported under "Warnings"
    Minor,
    /// Reported under "MajorWarnings"
    Major,
}

/// Whether a rule's column depends on the genome mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleScope {
    /// Barcode/read metrics, never genome-qualified
    Sequencing,
    GenomeSpecific,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Comparator {
    LessThan(f64),
    GreaterThan(f64),
    /// Two-sided check; how it fires depends on `RangeCheck`
    OutsideRange { lower: f64, upper: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unit {
    Percent,
    Count,
}

#[derive(Debug, Clone, Copy)]
pub struct ThresholdRule {
    /// Unqualified column name
    pub metric: &'static str,
    /// Column name used instead of `metric` in genome mode
    pub genome_metric: Option<&'static str>,
    /// Message subject when it differs from the column name
    pub label: Option<&'static str>,
    pub scope: RuleScope,
    pub comparator: Comparator,
    pub severity: Severity,
    pub unit: Unit,
}

impl ThresholdRule {
    const fn new(
        metric: &'static str,
        scope: RuleScope,
        comparator: Comparator,
        severity: Severity,
        unit: Unit,
    ) -> Self {
        Self {
            metric,
            genome_metric: None,
            label: None,
            scope,
            comparator,
            severity,
            unit,
        }
    }

    const fn labelled(mut self, label: &'static str) -> Self {
        self.label = Some(label);
        self
    }

    const fn in_genome_mode(mut self, genome_metric: &'static str) -> Self {
        self.genome_metric = Some(genome_metric);
        self
    }

    /// Column to read for this rule, or `None` if the rule is disabled
    pub fn column(&self, mode: &GenomeMode) -> Option<String> {
        match self.scope {
            RuleScope::Sequencing => Some(self.metric.to_string()),
            RuleScope::GenomeSpecific => {
                let metric = match mode {
                    GenomeMode::Genome(_) => self.genome_metric.unwrap_or(self.metric),
                    _ => self.metric,
                };
                resolve_column(mode, metric)
            }
        }
    }

    fn condition(&self) -> String {
        let unit = match self.unit {
            Unit::Percent => "%",
            Unit::Count => "",
        };
        match self.comparator {
            Comparator::LessThan(t) => format!("< {}{}", t, unit),
            Comparator::GreaterThan(t) => format!("> {}{}", t, unit),
            Comparator::OutsideRange { lower, upper } => {
                format!("< {}{} or > {}{}", lower, unit, upper, unit)
            }
        }
    }

    /// Human-readable message for a triggered rule
    pub fn message(&self, mode: &GenomeMode) -> String {
        match (self.scope, mode) {
            (RuleScope::GenomeSpecific, GenomeMode::Genome(genome)) => {
                let subject = self.genome_metric.or(self.label).unwrap_or(self.metric);
                format!("{} {} {}", genome.as_str(), subject, self.condition())
            }
            _ => {
                let subject = self.label.unwrap_or(self.metric);
                format!("{} {}", subject, self.condition())
            }
        }
    }

    pub fn triggers(&self, value: f64, range_check: RangeCheck) -> bool {
        match self.comparator {
            Comparator::LessThan(t) => value < t,
            Comparator::GreaterThan(t) => value > t,
            Comparator::OutsideRange { lower, upper } => range_check.triggers(lower, upper, value),
        }
    }
}

use Comparator::{GreaterThan, LessThan, OutsideRange};
use RuleScope::{GenomeSpecific, Sequencing};
use Severity::{Major, Minor};
use Unit::{Count, Percent};

/// The fixed rule table, in evaluation order
pub const RULES: &[ThresholdRule] = &[
    // Sequencing metrics
    ThresholdRule::new("Valid Barcodes", Sequencing, LessThan(75.0), Minor, Percent),
    ThresholdRule::new("Q30 Bases in Barcode", Sequencing, LessThan(65.0), Minor, Percent),
    ThresholdRule::new("Q30 bases in read 1", Sequencing, LessThan(65.0), Minor, Percent)
        .labelled("Q30 Bases in RNA Read"),
    ThresholdRule::new("Q30 bases in read 2", Sequencing, LessThan(65.0), Minor, Percent)
        .labelled("Q30 Bases in UMI"),
    ThresholdRule::new("Q30 bases in sample index i1", Sequencing, LessThan(90.0), Minor, Percent)
        .labelled("Q30 Bases in UMI"),
    // Cell metrics
    ThresholdRule::new(
        "Estimated Number of Cells",
        GenomeSpecific,
        OutsideRange { lower: 500.0, upper: 10000.0 },
        Minor,
        Count,
    ),
    ThresholdRule::new("Estimated Number of Cells", GenomeSpecific, LessThan(100.0), Major, Count)
        .in_genome_mode("Estimated Number of Cell Partitions"),
    ThresholdRule::new(
        "Fraction of high-quality fragments in cells",
        GenomeSpecific,
        LessThan(40.0),
        Major,
        Percent,
    ),
    ThresholdRule::new(
        "Fraction of transposition events in peaks in cells",
        GenomeSpecific,
        LessThan(15.0),
        Minor,
        Percent,
    ),
    // Library complexity
    ThresholdRule::new("Percent duplicates", GenomeSpecific, LessThan(30.0), Major, Percent),
    // Mapping metrics
    ThresholdRule::new("Confidently mapped read pairs", GenomeSpecific, LessThan(80.0), Minor, Percent),
    ThresholdRule::new("Unmapped read pairs", GenomeSpecific, GreaterThan(5.0), Minor, Percent),
    ThresholdRule::new("Non-nuclear read pairs", GenomeSpecific, GreaterThan(20.0), Minor, Percent),
    ThresholdRule::new(
        "Fragments in nucleosome-free regions",
        GenomeSpecific,
        LessThan(40.0),
        Major,
        Percent,
    ),
    // Targeting metrics
    ThresholdRule::new("Number of peaks", GenomeSpecific, LessThan(45000.0), Major, Count),
    ThresholdRule::new(
        "Fraction of genome in peaks",
        GenomeSpecific,
        OutsideRange { lower: 2.0, upper: 20.0 },
        Major,
        Percent,
    ),
    ThresholdRule::new("TSS enrichment score", GenomeSpecific, LessThan(5.0), Major, Percent),
    ThresholdRule::new(
        "Fraction of high-quality fragments overlapping TSS",
        GenomeSpecific,
        LessThan(15.0),
        Major,
        Percent,
    ),
    ThresholdRule::new(
        "Fraction of high-quality fragments overlapping peaks",
        GenomeSpecific,
        LessThan(15.0),
        Major,
        Percent,
    ),
];

/// Qualified column name for a metric under the given genome mode
///
/// Returns `None` for an unrecognized genome, which disables the rule.
pub fn resolve_column(mode: &GenomeMode, metric: &str) -> Option<String> {
    match mode {
        GenomeMode::Unqualified => Some(metric.to_string()),
        GenomeMode::Genome(genome) => Some(format!("{} {}", genome.as_str(), metric)),
        GenomeMode::Unrecognized(_) => None,
    }
}

/// Finalized warning columns for one sample
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SampleWarnings {
    pub warnings: String,
    pub major_warnings: String,
    /// Number of major warnings (included in `total`)
    pub major: u32,
    pub total: u32,
}

/// Per-sample triggered-rule state
#[derive(Debug, Default)]
pub struct WarningAccumulator {
    minor: Vec<String>,
    major: Vec<String>,
    total: u32,
}

impl WarningAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, severity: Severity, message: String) {
        match severity {
            Severity::Minor => self.minor.push(message),
            Severity::Major => self.major.push(message),
        }
        self.total += 1;
    }

    pub fn finish(self) -> SampleWarnings {
        let join = |messages: Vec<String>| -> String {
            messages.into_iter().map(|m| m + ", ").collect()
        };

        let major = self.major.len() as u32;
        SampleWarnings {
            warnings: join(self.minor),
            major_warnings: join(self.major),
            major,
            total: self.total,
        }
    }
}

/// Evaluates the rule table against sample summaries
#[derive(Debug, Clone)]
pub struct RuleEvaluator {
    mode: GenomeMode,
    range_check: RangeCheck,
}

impl RuleEvaluator {
    pub fn new(mode: GenomeMode, range_check: RangeCheck) -> Self {
        Self { mode, range_check }
    }

    /// Evaluate every rule against one sample
    pub fn evaluate(&self, summary: &SampleSummary) -> Result<SampleWarnings, RuleError> {
        let mut acc = WarningAccumulator::new();

        for rule in RULES {
            let Some(column) = rule.column(&self.mode) else {
                continue;
            };

            let value = match summary.get(&column) {
                Some(MetricValue::Number(v)) => *v,
                // Empty cells compare false, like NaN
                Some(MetricValue::Missing) => continue,
                Some(MetricValue::Text(text)) => {
                    return Err(RuleError::NonNumericMetric {
                        sample: summary.sample_id.clone(),
                        column,
                        value: text.clone(),
                    })
                }
                None => {
                    return Err(RuleError::MissingColumn {
                        sample: summary.sample_id.clone(),
                        column,
                    })
                }
            };

            if rule.triggers(value, self.range_check) {
                let message = rule.message(&self.mode);
                debug!("{}: {} (value {})", summary.sample_id, message, value);
                acc.record(rule.severity, message);
            }
        }

        Ok(acc.finish())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ReferenceGenome;
    use std::path::PathBuf;

    /// Metric values that pass every rule in both range-check readings
    /// (cells and genome-in-peaks sit above the upper bound)
    fn passing_metrics() -> Vec<(&'static str, f64)> {
        vec![
            ("Estimated Number of Cells", 12000.0),
            ("Fraction of high-quality fragments in cells", 60.0),
            ("Fraction of transposition events in peaks in cells", 45.0),
            ("Percent duplicates", 45.0),
            ("Confidently mapped read pairs", 92.0),
            ("Unmapped read pairs", 1.2),
            ("Non-nuclear read pairs", 3.0),
            ("Fragments in nucleosome-free regions", 55.0),
            ("Number of peaks", 120000.0),
            ("Fraction of genome in peaks", 25.0),
            ("TSS enrichment score", 9.5),
            ("Fraction of high-quality fragments overlapping TSS", 30.0),
            ("Fraction of high-quality fragments overlapping peaks", 50.0),
        ]
    }

    fn sequencing_metrics() -> Vec<(&'static str, f64)> {
        vec![
            ("Valid Barcodes", 97.0),
            ("Q30 Bases in Barcode", 90.0),
            ("Q30 bases in read 1", 93.0),
            ("Q30 bases in read 2", 91.0),
            ("Q30 bases in sample index i1", 95.0),
        ]
    }

    fn summary(columns: Vec<(String, f64)>) -> SampleSummary {
        SampleSummary {
            sample_id: "S1".to_string(),
            source: PathBuf::from("S1/outs/summary.csv"),
            columns: columns
                .into_iter()
                .map(|(name, v)| (name, MetricValue::Number(v)))
                .collect(),
        }
    }

    fn unqualified_summary() -> SampleSummary {
        summary(
            sequencing_metrics()
                .into_iter()
                .chain(passing_metrics())
                .map(|(n, v)| (n.to_string(), v))
                .collect(),
        )
    }

    fn set(summary: &mut SampleSummary, column: &str, value: MetricValue) {
        let slot = summary
            .columns
            .iter_mut()
            .find(|(name, _)| name == column)
            .unwrap();
        slot.1 = value;
    }

    fn unqualified() -> RuleEvaluator {
        RuleEvaluator::new(GenomeMode::Unqualified, RangeCheck::Source)
    }

    #[test]
    fn test_resolve_column() {
        assert_eq!(
            resolve_column(&GenomeMode::Unqualified, "Percent duplicates"),
            Some("Percent duplicates".to_string())
        );
        assert_eq!(
            resolve_column(&GenomeMode::Genome(ReferenceGenome::GRCh38), "Percent duplicates"),
            Some("GRCh38 Percent duplicates".to_string())
        );
        assert_eq!(
            resolve_column(&GenomeMode::Genome(ReferenceGenome::GRCm39), "Number of peaks"),
            Some("GRCm39 Number of peaks".to_string())
        );
        assert_eq!(
            resolve_column(&GenomeMode::Unrecognized("hg19".to_string()), "Number of peaks"),
            None
        );
    }

    #[test]
    fn test_rule_messages() {
        let grch38 = GenomeMode::Genome(ReferenceGenome::GRCh38);

        assert_eq!(RULES[0].message(&GenomeMode::Unqualified), "Valid Barcodes < 75%");
        assert_eq!(RULES[2].message(&grch38), "Q30 Bases in RNA Read < 65%");
        assert_eq!(
            RULES[5].message(&GenomeMode::Unqualified),
            "Estimated Number of Cells < 500 or > 10000"
        );
        assert_eq!(
            RULES[6].message(&grch38),
            "GRCh38 Estimated Number of Cell Partitions < 100"
        );
        assert_eq!(RULES[6].message(&GenomeMode::Unqualified), "Estimated Number of Cells < 100");
        assert_eq!(RULES[14].message(&GenomeMode::Unqualified), "Number of peaks < 45000");
        assert_eq!(
            RULES[15].message(&grch38),
            "GRCh38 Fraction of genome in peaks < 2% or > 20%"
        );
    }

    #[test]
    fn test_all_passing_sample() {
        let warnings = unqualified().evaluate(&unqualified_summary()).unwrap();

        assert_eq!(warnings, SampleWarnings::default());
        assert_eq!(warnings.warnings, "");
        assert_eq!(warnings.major_warnings, "");
        assert_eq!(warnings.total, 0);
    }

    #[test]
    fn test_low_valid_barcodes() {
        let mut sample = unqualified_summary();
        set(&mut sample, "Valid Barcodes", MetricValue::Number(70.0));

        let warnings = unqualified().evaluate(&sample).unwrap();

        assert_eq!(warnings.warnings, "Valid Barcodes < 75%, ");
        assert_eq!(warnings.major_warnings, "");
        assert_eq!(warnings.major, 0);
        assert_eq!(warnings.total, 1);
    }

    #[test]
    fn test_low_percent_duplicates_is_major() {
        let mut sample = unqualified_summary();
        set(&mut sample, "Percent duplicates", MetricValue::Number(25.0));

        let warnings = unqualified().evaluate(&sample).unwrap();

        assert_eq!(warnings.warnings, "");
        assert_eq!(warnings.major_warnings, "Percent duplicates < 30%, ");
        assert_eq!(warnings.total, 1);
    }

    #[test]
    fn test_messages_follow_rule_order() {
        let mut sample = unqualified_summary();
        set(&mut sample, "Number of peaks", MetricValue::Number(1000.0));
        set(&mut sample, "Percent duplicates", MetricValue::Number(10.0));
        set(&mut sample, "Unmapped read pairs", MetricValue::Number(9.0));
        set(&mut sample, "Valid Barcodes", MetricValue::Number(50.0));

        let warnings = unqualified().evaluate(&sample).unwrap();

        assert_eq!(warnings.warnings, "Valid Barcodes < 75%, Unmapped read pairs > 5%, ");
        assert_eq!(
            warnings.major_warnings,
            "Percent duplicates < 30%, Number of peaks < 45000, "
        );
        assert_eq!(warnings.major, 2);
        assert_eq!(warnings.total, 4);
    }

    #[test]
    fn test_range_check_source_fires_inside_range() {
        let mut sample = unqualified_summary();
        set(&mut sample, "Fraction of genome in peaks", MetricValue::Number(10.0));

        let warnings = unqualified().evaluate(&sample).unwrap();
        assert_eq!(
            warnings.major_warnings,
            "Fraction of genome in peaks < 2% or > 20%, "
        );

        let corrected = RuleEvaluator::new(GenomeMode::Unqualified, RangeCheck::Corrected);
        let warnings = corrected.evaluate(&sample).unwrap();
        assert_eq!(warnings.major_warnings, "");
    }

    #[test]
    fn test_range_check_corrected_fires_outside_range() {
        let sample = unqualified_summary();

        let corrected = RuleEvaluator::new(GenomeMode::Unqualified, RangeCheck::Corrected);
        let warnings = corrected.evaluate(&sample).unwrap();

        assert_eq!(
            warnings.warnings,
            "Estimated Number of Cells < 500 or > 10000, "
        );
        assert_eq!(
            warnings.major_warnings,
            "Fraction of genome in peaks < 2% or > 20%, "
        );
        assert_eq!(warnings.total, 2);
    }

    #[test]
    fn test_genome_mode_is_exclusive() {
        // Unqualified columns are all failing; prefixed ones all pass
        let mut columns: Vec<(String, f64)> = sequencing_metrics()
            .into_iter()
            .map(|(n, v)| (n.to_string(), v))
            .collect();
        for (name, value) in passing_metrics() {
            columns.push((format!("GRCh38 {}", name), value));
            columns.push((name.to_string(), 0.0));
        }
        columns.push(("GRCh38 Estimated Number of Cell Partitions".to_string(), 12000.0));
        let sample = summary(columns);

        let evaluator = RuleEvaluator::new(
            GenomeMode::Genome(ReferenceGenome::GRCh38),
            RangeCheck::Source,
        );
        let warnings = evaluator.evaluate(&sample).unwrap();

        assert_eq!(warnings, SampleWarnings::default());
    }

    #[test]
    fn test_genome_mode_prefixes_messages() {
        let sample = summary(
            sequencing_metrics()
                .into_iter()
                .map(|(n, v)| (n.to_string(), v))
                .chain(passing_metrics().into_iter().map(|(n, v)| (format!("GRCm39 {}", n), v)))
                .chain(std::iter::once((
                    "GRCm39 Estimated Number of Cell Partitions".to_string(),
                    50.0,
                )))
                .collect(),
        );

        let evaluator = RuleEvaluator::new(
            GenomeMode::Genome(ReferenceGenome::GRCm39),
            RangeCheck::Source,
        );
        let warnings = evaluator.evaluate(&sample).unwrap();

        assert_eq!(
            warnings.major_warnings,
            "GRCm39 Estimated Number of Cell Partitions < 100, "
        );
        assert_eq!(warnings.total, 1);
    }

    #[test]
    fn test_unrecognized_genome_only_checks_sequencing() {
        let mut columns: Vec<(String, f64)> = sequencing_metrics()
            .into_iter()
            .map(|(n, v)| (n.to_string(), v))
            .collect();
        columns[1].1 = 10.0;
        let sample = summary(columns);

        let evaluator = RuleEvaluator::new(
            GenomeMode::Unrecognized("hg19".to_string()),
            RangeCheck::Source,
        );
        let warnings = evaluator.evaluate(&sample).unwrap();

        assert_eq!(warnings.warnings, "Q30 Bases in Barcode < 65%, ");
        assert_eq!(warnings.total, 1);
    }

    #[test]
    fn test_case_insensitive_columns() {
        let columns = sequencing_metrics()
            .into_iter()
            .chain(passing_metrics())
            .map(|(n, v)| (n.to_lowercase(), v))
            .collect();
        let mut sample = summary(columns);
        set(&mut sample, "valid barcodes", MetricValue::Number(70.0));

        let warnings = unqualified().evaluate(&sample).unwrap();

        assert_eq!(warnings.warnings, "Valid Barcodes < 75%, ");
    }

    #[test]
    fn test_missing_column_is_error() {
        let mut sample = unqualified_summary();
        sample.columns.retain(|(name, _)| name != "TSS enrichment score");

        let err = unqualified().evaluate(&sample).unwrap_err();

        assert_eq!(
            err,
            RuleError::MissingColumn {
                sample: "S1".to_string(),
                column: "TSS enrichment score".to_string(),
            }
        );
    }

    #[test]
    fn test_non_numeric_metric_is_error() {
        let mut sample = unqualified_summary();
        set(&mut sample, "Number of peaks", MetricValue::Text("n/a".to_string()));

        let err = unqualified().evaluate(&sample).unwrap_err();

        match err {
            RuleError::NonNumericMetric { column, value, .. } => {
                assert_eq!(column, "Number of peaks");
                assert_eq!(value, "n/a");
            }
            other => panic!("Expected NonNumericMetric error, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_value_does_not_trigger() {
        let mut sample = unqualified_summary();
        set(&mut sample, "Percent duplicates", MetricValue::Missing);

        let warnings = unqualified().evaluate(&sample).unwrap();

        assert_eq!(warnings.total, 0);
    }
}
