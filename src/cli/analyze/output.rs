//! Output formatting and fail-threshold handling for the analyze command.

use crate::models::Severity;
use crate::report::BatchReport;
use crate::reporters::{self, OutputFormat};

use anyhow::{Context, Result};
use console::style;
use std::path::Path;

/// Render the report and write it to `output` or stdout
pub(super) fn write_report(
    report: &BatchReport,
    format: OutputFormat,
    output: Option<&Path>,
    quiet_mode: bool,
) -> Result<()> {
    let rendered = reporters::report_with_format(report, format)?;

    match output {
        Some(path) => {
            std::fs::write(path, &rendered)
                .with_context(|| format!("Failed to write report to {}", path.display()))?;
            if !quiet_mode {
                eprintln!(
                    "{} Report written to {}",
                    style("✓").green(),
                    style(path.display()).cyan()
                );
            }
        }
        None => println!("{}", rendered),
    }
    Ok(())
}

/// Whether any finding meets the fail threshold
pub(super) fn meets_fail_threshold(fail_on: Option<Severity>, report: &BatchReport) -> bool {
    let Some(threshold) = fail_on else {
        return false;
    };
    let s = &report.summary;
    match threshold {
        Severity::High => s.high > 0,
        Severity::Medium => s.high + s.medium > 0,
        Severity::Low => s.high + s.medium + s.low > 0,
        Severity::Info => s.total > 0,
    }
}

/// Exit with code 1 when the fail threshold was met
pub(super) fn check_fail_threshold(fail_on: Option<Severity>, met: bool) {
    if let (true, Some(threshold)) = (met, fail_on) {
        eprintln!("Failing due to --fail-on={} threshold", threshold);
        std::process::exit(1);
    }
}
