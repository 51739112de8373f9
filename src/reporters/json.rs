//! JSON reporter
//!
//! Outputs the full BatchReport as pretty-printed JSON.
//! Useful for machine consumption, piping to jq, or further processing.

use crate::report::BatchReport;
use anyhow::Result;

/// Render report as JSON
pub fn render(report: &BatchReport) -> Result<String> {
    Ok(serde_json::to_string_pretty(report)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reporters::tests::test_report;

    #[test]
    fn test_json_render_valid() {
        let report = test_report();
        let json_str = render(&report).expect("render JSON");
        let parsed: serde_json::Value = serde_json::from_str(&json_str).expect("parse JSON");
        let files = parsed["files"].as_array().expect("files array");
        assert_eq!(files.len(), 2);
        assert_eq!(files[0]["file"], "src/alloc.cpp");
        assert_eq!(files[0]["findings"][0]["rule_id"], "raw-new");
        assert_eq!(files[0]["findings"][0]["severity"], "high");
        assert_eq!(parsed["failures"][0]["file"], "src/bad.cpp");
        assert!(parsed["category_scores"]["loop_complexity"].is_number());
    }

    #[test]
    fn test_json_roundtrip() {
        let report = test_report();
        let json_str = render(&report).expect("render JSON");
        let back: BatchReport = serde_json::from_str(&json_str).expect("parse report");
        assert_eq!(back, report);
    }

    #[test]
    fn test_json_empty_findings() {
        let mut report = test_report();
        for file in &mut report.files {
            file.findings.clear();
        }
        let json_str = render(&report).expect("render JSON");
        let parsed: serde_json::Value = serde_json::from_str(&json_str).expect("parse JSON");
        assert_eq!(
            parsed["files"][0]["findings"]
                .as_array()
                .expect("findings array")
                .len(),
            0
        );
    }
}
