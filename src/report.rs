//! Report aggregation
//!
//! [`ReportAggregator`] turns the raw findings of one file scan into a
//! [`FileReport`]: duplicates on the same line and rule collapse into the
//! highest-scoring one, the rest is ordered by (line, rule id, column), and
//! per-category subtotals are filled in for every category.
//!
//! [`BatchAggregator`] does the same one level up for many files.

use crate::models::{Category, Finding, FindingsSummary, Severity};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Findings and scores for one scanned file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileReport {
    pub file: String,
    pub findings: Vec<Finding>,
    pub category_scores: BTreeMap<Category, f64>,
    pub overall_score: f64,
    pub summary: FindingsSummary,
}

fn zeroed_categories() -> BTreeMap<Category, f64> {
    Category::ALL.iter().map(|c| (*c, 0.0)).collect()
}

/// Collects the findings of one file scan
#[derive(Debug)]
pub struct ReportAggregator {
    file: String,
    findings: Vec<Finding>,
}

impl ReportAggregator {
    pub fn new(file: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            findings: Vec::new(),
        }
    }

    pub fn push(&mut self, finding: Finding) {
        self.findings.push(finding);
    }

    pub fn extend(&mut self, findings: impl IntoIterator<Item = Finding>) {
        self.findings.extend(findings);
    }

    pub fn finish(self) -> FileReport {
        let mut findings = self.findings;

        // Highest score first within a (line, rule) group, lowest column on ties,
        // so dedup_by keeps the group's first element.
        findings.sort_by(|a, b| {
            (a.line_start, &a.rule_id)
                .cmp(&(b.line_start, &b.rule_id))
                .then(b.score.total_cmp(&a.score))
                .then(a.column.cmp(&b.column))
        });
        findings.dedup_by(|later, kept| {
            later.line_start == kept.line_start && later.rule_id == kept.rule_id
        });
        findings.sort_by(|a, b| {
            (a.line_start, &a.rule_id, a.column).cmp(&(b.line_start, &b.rule_id, b.column))
        });

        let mut category_scores = zeroed_categories();
        for f in &findings {
            *category_scores.entry(f.category).or_insert(0.0) += f.score;
        }
        let overall_score = category_scores.values().sum();
        let summary = FindingsSummary::from_findings(&findings);

        FileReport {
            file: self.file,
            findings,
            category_scores,
            overall_score,
            summary,
        }
    }
}

/// A file that could not be scanned
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileFailure {
    pub file: String,
    pub error: String,
}

/// Results for a whole batch of files
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchReport {
    pub files: Vec<FileReport>,
    #[serde(default)]
    pub failures: Vec<FileFailure>,
    /// Files never started because the batch was cancelled
    #[serde(default)]
    pub skipped: Vec<String>,
    pub category_scores: BTreeMap<Category, f64>,
    pub overall_score: f64,
    pub summary: FindingsSummary,
}

impl BatchReport {
    pub fn total_findings(&self) -> usize {
        self.summary.total
    }

    /// Drop findings below `min` from the listing. Scores and subtotals
    /// still reflect every finding; the severity summary follows the filter.
    pub fn retain_severity(&mut self, min: Severity) {
        let mut summary = FindingsSummary::default();
        for report in &mut self.files {
            report.findings.retain(|f| f.severity >= min);
            report.summary = FindingsSummary::from_findings(&report.findings);
            summary.high += report.summary.high;
            summary.medium += report.summary.medium;
            summary.low += report.summary.low;
            summary.info += report.summary.info;
            summary.total += report.summary.total;
        }
        self.summary = summary;
    }
}

#[derive(Debug, Default)]
pub struct BatchAggregator {
    files: Vec<FileReport>,
    failures: Vec<FileFailure>,
    skipped: Vec<String>,
}

impl BatchAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_report(&mut self, report: FileReport) {
        self.files.push(report);
    }

    pub fn add_failure(&mut self, failure: FileFailure) {
        self.failures.push(failure);
    }

    pub fn add_skipped(&mut self, file: impl Into<String>) {
        self.skipped.push(file.into());
    }

    pub fn finish(mut self) -> BatchReport {
        self.files.sort_by(|a, b| a.file.cmp(&b.file));
        self.failures.sort_by(|a, b| a.file.cmp(&b.file));
        self.skipped.sort();

        let mut category_scores = zeroed_categories();
        let mut summary = FindingsSummary::default();
        for report in &self.files {
            for (category, score) in &report.category_scores {
                *category_scores.entry(*category).or_insert(0.0) += score;
            }
            summary.high += report.summary.high;
            summary.medium += report.summary.medium;
            summary.low += report.summary.low;
            summary.info += report.summary.info;
            summary.total += report.summary.total;
        }
        let overall_score = category_scores.values().sum();

        BatchReport {
            files: self.files,
            failures: self.failures,
            skipped: self.skipped,
            category_scores,
            overall_score,
            summary,
        }
    }
}
