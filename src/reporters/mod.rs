//! Output reporters for Ambar scan results
//!
//! Supports two output formats:
//! - `text` - Terminal output with colors
//! - `json` - Machine-readable JSON

mod json;
mod text;

use crate::report::BatchReport;
use anyhow::{anyhow, Result};
use std::str::FromStr;

/// Supported output formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for OutputFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "txt" | "terminal" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            _ => Err(anyhow!("Unknown format '{}'. Valid formats: text, json", s)),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}

/// Render a batch report using an OutputFormat enum
pub fn report_with_format(report: &BatchReport, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Text => text::render(report),
        OutputFormat::Json => json::render(report),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::report::{BatchAggregator, FileFailure};
    use crate::scanner::{PatternCatalog, RuleOverrides, ScanEngine};

    /// A small batch with findings in two files and one failure
    pub(crate) fn test_report() -> BatchReport {
        let engine = ScanEngine::new(PatternCatalog::builtin(), RuleOverrides::default());
        let mut batch = BatchAggregator::new();
        batch.add_report(
            engine
                .scan_text("src/alloc.cpp", "int* p = new int(5);\ndelete p;\n")
                .unwrap(),
        );
        batch.add_report(
            engine
                .scan_text(
                    "src/loops.cpp",
                    "for (;;) {\n  for (;;) {\n    work();\n  }\n}\n",
                )
                .unwrap(),
        );
        batch.add_failure(FileFailure {
            file: "src/bad.cpp".into(),
            error: "src/bad.cpp: input is not valid UTF-8".into(),
        });
        batch.finish()
    }

    #[test]
    fn test_format_parsing() {
        assert_eq!(OutputFormat::from_str("text").unwrap(), OutputFormat::Text);
        assert_eq!(OutputFormat::from_str("JSON").unwrap(), OutputFormat::Json);
        assert!(OutputFormat::from_str("sarif").is_err());
        assert_eq!(OutputFormat::Json.to_string(), "json");
    }

    #[test]
    fn test_report_dispatch() {
        let report = test_report();
        let json = report_with_format(&report, "json".parse().unwrap()).unwrap();
        assert!(json.starts_with('{'));
        let text = report_with_format(&report, OutputFormat::Text).unwrap();
        assert!(text.contains("src/alloc.cpp"));
    }
}
