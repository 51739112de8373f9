//! Core data models for Ambar
//!
//! These models are shared by the scanner, the report aggregator and the
//! reporters. Everything here is plain data and serializes with serde.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Generate a deterministic finding ID based on content hash.
///
/// The ID is a 16-character hex string derived from the rule id, file,
/// line and column, so the same finding keeps its ID across runs.
pub fn deterministic_finding_id(rule: &str, file: &str, line: u32, column: u32) -> String {
    let input = format!("{rule}\n{file}\n{line}\n{column}");
    let digest = Sha256::digest(input.as_bytes());
    format!("{:x}", digest)[..16].to_string()
}

/// Severity levels for findings
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    #[default]
    Info,
    Low,
    Medium,
    High,
}

impl Severity {
    /// Severity band for a computed score
    pub fn from_score(score: f64) -> Self {
        match score {
            s if s >= 8.0 => Severity::High,
            s if s >= 5.0 => Severity::Medium,
            s if s >= 2.0 => Severity::Low,
            _ => Severity::Info,
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Info => write!(f, "info"),
            Severity::Low => write!(f, "low"),
            Severity::Medium => write!(f, "medium"),
            Severity::High => write!(f, "high"),
        }
    }
}

impl std::str::FromStr for Severity {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "info" => Ok(Severity::Info),
            "low" => Ok(Severity::Low),
            "medium" => Ok(Severity::Medium),
            "high" => Ok(Severity::High),
            _ => Err(anyhow::anyhow!(
                "Unknown severity '{}'. Valid values: info, low, medium, high",
                s
            )),
        }
    }
}

/// Anti-pattern family a finding belongs to.
///
/// `Diagnostic` is reserved for findings the engine emits about malformed
/// input; no catalog rule carries it.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    MemoryManagement,
    ContainerUsage,
    StringOperation,
    LoopComplexity,
    Diagnostic,
}

impl Category {
    pub const ALL: [Category; 5] = [
        Category::MemoryManagement,
        Category::ContainerUsage,
        Category::StringOperation,
        Category::LoopComplexity,
        Category::Diagnostic,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Category::MemoryManagement => "Memory Management",
            Category::ContainerUsage => "Container Usage",
            Category::StringOperation => "String Operations",
            Category::LoopComplexity => "Loop Complexity",
            Category::Diagnostic => "Diagnostics",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Category::MemoryManagement => write!(f, "memory_management"),
            Category::ContainerUsage => write!(f, "container_usage"),
            Category::StringOperation => write!(f, "string_operation"),
            Category::LoopComplexity => write!(f, "loop_complexity"),
            Category::Diagnostic => write!(f, "diagnostic"),
        }
    }
}

/// Whether a finding came from well-formed text or from input the scanner
/// had to recover from (unterminated comment, unclosed loop, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Provenance {
    #[default]
    Normal,
    Recovered,
}

/// One reported anti-pattern occurrence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    pub id: String,
    pub rule_id: String,
    pub category: Category,
    pub severity: Severity,
    pub score: f64,
    pub line_start: u32,
    pub line_end: u32,
    /// 0-based byte column of the match in the line
    pub column: u32,
    pub message: String,
    #[serde(default)]
    pub suggestion: Option<String>,
    #[serde(default)]
    pub provenance: Provenance,
}

impl Finding {
    /// Whether the finding spans more than one line
    pub fn is_range(&self) -> bool {
        self.line_end > self.line_start
    }
}

/// Summary of findings by severity
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FindingsSummary {
    pub high: usize,
    pub medium: usize,
    pub low: usize,
    pub info: usize,
    pub total: usize,
}

impl FindingsSummary {
    pub fn from_findings(findings: &[Finding]) -> Self {
        let mut summary = Self::default();
        for f in findings {
            match f.severity {
                Severity::High => summary.high += 1,
                Severity::Medium => summary.medium += 1,
                Severity::Low => summary.low += 1,
                Severity::Info => summary.info += 1,
            }
            summary.total += 1;
        }
        summary
    }
}
