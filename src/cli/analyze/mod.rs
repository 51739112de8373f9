//! Analyze command implementation
//!
//! Orchestrates a scan:
//! 1. Setup environment, config and overrides   (setup.rs)
//! 2. Collect and read source files              (files.rs)
//! 3. Scan in parallel                           (scanner::batch)
//! 4. Output results (text, json)                (output.rs)

pub(crate) mod files;
mod output;
mod setup;

use files::{collect_source_files, load_inputs};
use output::{check_fail_threshold, meets_fail_threshold, write_report};
use setup::{create_bar_style, setup_environment};

use crate::scanner::{scan_batch, CancellationToken, PatternCatalog, ProgressCallback, ScanEngine};

use anyhow::Result;
use console::style;
use indicatif::ProgressBar;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::info;

/// Flags of the analyze command
#[derive(Debug, Clone, Default)]
pub struct AnalyzeOptions {
    pub format: Option<String>,
    pub output: Option<PathBuf>,
    pub severity: Option<String>,
    pub fail_on: Option<String>,
    pub disable_rules: Vec<String>,
    pub no_progress: bool,
    pub workers: usize,
}

/// Run the analyze command
pub fn run(path: &Path, options: AnalyzeOptions) -> Result<()> {
    let start_time = Instant::now();
    let env = setup_environment(path, &options)?;

    let files = collect_source_files(&env.root, &env.target, &env.project_config)?;
    info!("Found {} source files under {}", files.len(), env.root.display());
    let inputs = load_inputs(&env.root, &files)?;

    let engine = ScanEngine::new(PatternCatalog::builtin(), env.config.overrides.clone());

    let bar = if env.quiet_mode || options.no_progress {
        ProgressBar::hidden()
    } else {
        let bar = ProgressBar::new(inputs.len() as u64);
        bar.set_style(create_bar_style());
        bar.set_message("Scanning...");
        bar
    };
    let progress_bar = bar.clone();
    let progress: ProgressCallback = Box::new(move |_file| progress_bar.inc(1));

    let mut report = scan_batch(
        &engine,
        &inputs,
        env.config.workers,
        &CancellationToken::new(),
        Some(&progress),
    )?;
    bar.finish_and_clear();

    // Fail threshold looks at every finding, not just the displayed ones
    let fail = meets_fail_threshold(env.config.fail_on, &report);
    if let Some(min) = env.config.min_severity {
        report.retain_severity(min);
    }

    write_report(
        &report,
        env.config.format,
        options.output.as_deref(),
        env.quiet_mode,
    )?;

    if !env.quiet_mode {
        eprintln!(
            "{} Scanned {} files in {:.2}s",
            style("✓").green(),
            style(report.files.len()).cyan(),
            start_time.elapsed().as_secs_f64()
        );
    }

    check_fail_threshold(env.config.fail_on, fail);
    Ok(())
}
