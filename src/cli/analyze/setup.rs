//! Environment setup, configuration, and UI helpers for the analyze command.

use crate::config::{load_project_config, ProjectConfig};
use crate::models::Severity;
use crate::reporters::OutputFormat;
use crate::scanner::RuleOverrides;

use anyhow::{Context, Result};
use console::style;
use indicatif::ProgressStyle;
use std::path::{Path, PathBuf};

/// Source file extensions scanned when walking a directory
pub(super) const SUPPORTED_EXTENSIONS: &[&str] = &[
    "c", "h", // C
    "cc", "cpp", "cxx", // C++ sources
    "hh", "hpp", "hxx", "ipp", // C++ headers
];

/// Default worker count; the CLI flag default is replaced by `[defaults] workers`
const DEFAULT_WORKERS: usize = 8;

/// Configuration applied from CLI and project config
#[derive(Debug)]
pub(super) struct AnalysisConfig {
    pub format: OutputFormat,
    pub min_severity: Option<Severity>,
    pub fail_on: Option<Severity>,
    pub workers: usize,
    pub overrides: RuleOverrides,
}

/// Result of environment setup phase
pub(super) struct EnvironmentSetup {
    /// Directory config is read from and file ids are relative to
    pub root: PathBuf,
    /// What was asked for: the root itself or a single file in it
    pub target: PathBuf,
    pub project_config: ProjectConfig,
    pub config: AnalysisConfig,
    pub quiet_mode: bool,
}

/// Phase 1: Validate the target path and set up the analysis environment
pub(super) fn setup_environment(
    path: &Path,
    options: &super::AnalyzeOptions,
) -> Result<EnvironmentSetup> {
    let target = path
        .canonicalize()
        .with_context(|| format!("Path does not exist: {}", path.display()))?;
    let root = if target.is_dir() {
        target.clone()
    } else {
        target
            .parent()
            .map(Path::to_path_buf)
            .with_context(|| format!("File has no parent directory: {}", target.display()))?
    };

    let project_config = load_project_config(&root);
    let config = apply_config_defaults(options, &project_config)?;

    let quiet_mode = config.format == OutputFormat::Json;
    print_header(&target, quiet_mode);

    Ok(EnvironmentSetup {
        root,
        target,
        project_config,
        config,
        quiet_mode,
    })
}

/// Apply CLI defaults from project config. CLI flags win.
pub(super) fn apply_config_defaults(
    options: &super::AnalyzeOptions,
    project_config: &ProjectConfig,
) -> Result<AnalysisConfig> {
    let defaults = &project_config.defaults;

    let format = options
        .format
        .as_deref()
        .or(defaults.format.as_deref())
        .unwrap_or("text")
        .parse::<OutputFormat>()?;

    let min_severity = options
        .severity
        .as_deref()
        .or(defaults.severity.as_deref())
        .map(str::parse::<Severity>)
        .transpose()?;

    let fail_on = options
        .fail_on
        .as_deref()
        .or(defaults.fail_on.as_deref())
        .map(str::parse::<Severity>)
        .transpose()?;

    let workers = if options.workers == DEFAULT_WORKERS {
        defaults.workers.unwrap_or(options.workers).clamp(1, 64)
    } else {
        options.workers
    };

    let mut overrides = project_config.to_overrides();
    overrides
        .disabled
        .extend(options.disable_rules.iter().cloned());

    Ok(AnalysisConfig {
        format,
        min_severity,
        fail_on,
        workers,
        overrides,
    })
}

/// Print analysis header
fn print_header(target: &Path, quiet_mode: bool) {
    // Suppress progress output for machine-readable formats
    if quiet_mode {
        return;
    }
    eprintln!(
        "\n{} {}\n",
        style("Ambar scanning").bold(),
        style(target.display()).cyan()
    );
}

/// Create bar progress style
pub(super) fn create_bar_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        .expect("valid template")
        .progress_chars("█▓▒░  ")
}

#[cfg(test)]
mod tests {
    use super::super::AnalyzeOptions;
    use super::*;

    #[test]
    fn test_cli_flags_win_over_config() {
        let config: ProjectConfig =
            toml::from_str("[defaults]\nformat = \"json\"\nworkers = 2\nfail_on = \"low\"\n")
                .unwrap();
        let options = AnalyzeOptions {
            format: Some("text".into()),
            workers: 3,
            ..Default::default()
        };
        let applied = apply_config_defaults(&options, &config).unwrap();
        assert_eq!(applied.format, OutputFormat::Text);
        assert_eq!(applied.workers, 3);
        assert_eq!(applied.fail_on, Some(Severity::Low));
    }

    #[test]
    fn test_config_defaults_fill_gaps() {
        let config: ProjectConfig =
            toml::from_str("[defaults]\nformat = \"json\"\nworkers = 2\n").unwrap();
        let options = AnalyzeOptions {
            workers: DEFAULT_WORKERS,
            disable_rules: vec!["ordered-map".into()],
            ..Default::default()
        };
        let applied = apply_config_defaults(&options, &config).unwrap();
        assert_eq!(applied.format, OutputFormat::Json);
        assert_eq!(applied.workers, 2);
        assert!(applied.overrides.disabled.contains("ordered-map"));
    }

    #[test]
    fn test_bad_config_severity_is_an_error() {
        let config: ProjectConfig = toml::from_str("[defaults]\nseverity = \"critical\"\n").unwrap();
        assert!(apply_config_defaults(&AnalyzeOptions::default(), &config).is_err());
    }
}
