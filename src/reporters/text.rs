//! Text (terminal) reporter with colors and formatting

use crate::models::{Category, Finding, Provenance, Severity};
use crate::report::BatchReport;
use anyhow::Result;

/// Severity colors
fn severity_color(severity: &Severity) -> &'static str {
    match severity {
        Severity::High => "\x1b[91m",   // Light red
        Severity::Medium => "\x1b[33m", // Yellow
        Severity::Low => "\x1b[34m",    // Blue
        Severity::Info => "\x1b[90m",   // Gray
    }
}

/// Reset ANSI color
const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";
const DIM: &str = "\x1b[2m";

/// Severity tag
fn severity_tag(severity: &Severity) -> &'static str {
    match severity {
        Severity::High => "[H]",
        Severity::Medium => "[M]",
        Severity::Low => "[L]",
        Severity::Info => "[I]",
    }
}

/// Render report as formatted terminal output
pub fn render(report: &BatchReport) -> Result<String> {
    let mut out = String::new();

    // Header
    out.push_str(&format!("\n{BOLD}Ambar Analysis{RESET}\n"));
    out.push_str(&format!(
        "{DIM}──────────────────────────────────────{RESET}\n"
    ));
    out.push_str(&format!(
        "Score: {BOLD}{:.1}{RESET}  Files: {}  Findings: {}\n\n",
        report.overall_score,
        report.files.len(),
        report.summary.total
    ));

    // Category subtotals
    out.push_str(&format!("{BOLD}SCORES{RESET}\n"));
    let score_of = |c: &Category| report.category_scores.get(c).copied().unwrap_or(0.0);
    let parts: Vec<String> = Category::ALL
        .iter()
        .filter(|c| **c != Category::Diagnostic || score_of(c) > 0.0)
        .map(|c| format!("{}: {:.1}", c.label(), score_of(c)))
        .collect();
    out.push_str(&format!("  {}\n\n", parts.join("  ")));

    // Findings summary
    let fs = &report.summary;
    out.push_str(&format!("{BOLD}FINDINGS{RESET} ({} total)\n", fs.total));
    let mut summary_parts = Vec::new();
    if fs.high > 0 {
        summary_parts.push(format!("\x1b[91m{} high{RESET}", fs.high));
    }
    if fs.medium > 0 {
        summary_parts.push(format!("\x1b[33m{} medium{RESET}", fs.medium));
    }
    if fs.low > 0 {
        summary_parts.push(format!("\x1b[34m{} low{RESET}", fs.low));
    }
    if fs.info > 0 {
        summary_parts.push(format!("\x1b[90m{} info{RESET}", fs.info));
    }
    if !summary_parts.is_empty() {
        out.push_str(&format!("  {}\n", summary_parts.join(" | ")));
    }
    out.push('\n');

    for file in report.files.iter().filter(|f| !f.findings.is_empty()) {
        out.push_str(&format!(
            "{BOLD}{}{RESET}  {DIM}score {:.1}{RESET}\n",
            file.file, file.overall_score
        ));
        for finding in &file.findings {
            out.push_str(&format_finding(finding));
        }
        out.push('\n');
    }

    if !report.failures.is_empty() {
        out.push_str(&format!("{BOLD}FAILED{RESET} ({})\n", report.failures.len()));
        for failure in &report.failures {
            out.push_str(&format!("  \x1b[31m✗{RESET} {}\n", failure.error));
        }
        out.push('\n');
    }

    if !report.skipped.is_empty() {
        out.push_str(&format!(
            "{DIM}{} files skipped after cancellation{RESET}\n",
            report.skipped.len()
        ));
    }

    if fs.total == 0 && report.failures.is_empty() {
        out.push_str(&format!("{DIM}No anti-patterns found.{RESET}\n"));
    }

    Ok(out)
}

fn format_finding(finding: &Finding) -> String {
    let sev_c = severity_color(&finding.severity);
    let sev_tag = severity_tag(&finding.severity);
    let location = if finding.is_range() {
        format!("{}-{}", finding.line_start, finding.line_end)
    } else {
        format!("{}:{}", finding.line_start, finding.column + 1)
    };
    let recovered = if finding.provenance == Provenance::Recovered {
        format!(" {DIM}(recovered){RESET}")
    } else {
        String::new()
    };

    let mut line = format!(
        "  {sev_c}{}{RESET} {:>9}  {:<24} {}{}\n",
        sev_tag, location, finding.rule_id, finding.message, recovered
    );
    if let Some(suggestion) = &finding.suggestion {
        line.push_str(&format!("  {DIM}{:>13}→ {}{RESET}\n", "", suggestion));
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reporters::tests::test_report;

    #[test]
    fn test_text_render_lists_files_and_rules() {
        let out = render(&test_report()).unwrap();
        assert!(out.contains("Ambar Analysis"));
        assert!(out.contains("src/alloc.cpp"));
        assert!(out.contains("raw-new"));
        assert!(out.contains("raw-delete"));
        assert!(out.contains("loop-nesting"));
        assert!(out.contains("FAILED"));
    }

    #[test]
    fn test_loop_findings_show_line_range() {
        let out = render(&test_report()).unwrap();
        assert!(out.contains("1-5"));
        assert!(out.contains("2-4"));
    }

    #[test]
    fn test_empty_report_message() {
        let mut report = test_report();
        report.failures.clear();
        for file in &mut report.files {
            file.findings.clear();
        }
        report.summary = Default::default();
        let out = render(&report).unwrap();
        assert!(out.contains("No anti-patterns found."));
    }
}
