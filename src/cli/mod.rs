//! CLI command definitions and handlers

pub(crate) mod analyze;
mod init;
mod rules;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Parse and validate workers count (1-64)
fn parse_workers(s: &str) -> Result<usize, String> {
    let n: usize = s
        .parse()
        .map_err(|_| format!("'{}' is not a valid number", s))?;
    if n == 0 {
        Err("workers must be at least 1".to_string())
    } else if n > 64 {
        Err("workers cannot exceed 64".to_string())
    } else {
        Ok(n)
    }
}

/// Ambar - energy anti-pattern scanner for C++
#[derive(Parser, Debug)]
#[command(name = "ambar")]
#[command(
    version,
    about = "Static scanner for energy-hungry C++ anti-patterns: raw memory management, container misuse, string churn, and nested loops",
    long_about = "Ambar scans C and C++ sources for patterns that waste CPU time and memory: \
raw new/delete and malloc/free, std::list and ordered maps, appends without reserve, \
string concatenation in loops, and deeply nested loops. Every finding gets a score; \
scores add up per category and per file.\n\n\
Run without a subcommand to analyze the current directory:\n  \
ambar .",
    after_help = "\
Examples:
  ambar .                              Analyze current directory
  ambar analyze src/ --format json     JSON output for scripting
  ambar analyze . --fail-on high       Exit code 1 if high findings exist
  ambar rules                          List built-in rules
  ambar init                           Write an example ambar.toml"
)]
pub struct Cli {
    /// File or directory to scan (default: current directory)
    #[arg(global = true, default_value = ".")]
    pub path: PathBuf,

    /// Log level (error, warn, info, debug, trace); RUST_LOG takes precedence
    #[arg(long, global = true, default_value = "warn", value_parser = ["error", "warn", "info", "debug", "trace"])]
    pub log_level: String,

    /// Number of parallel workers (1-64)
    #[arg(long, global = true, default_value = "8", value_parser = parse_workers)]
    pub workers: usize,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize an ambar.toml config file with example settings
    Init,

    /// List the built-in rules with their category, base score and context
    Rules,

    /// Scan C/C++ sources for anti-patterns
    #[command(after_help = "\
Examples:
  ambar analyze .                                Analyze current directory
  ambar analyze src/engine.cpp                   Analyze a single file
  ambar analyze . --format json -o report.json   JSON report to a file
  ambar analyze . --severity medium              Only show medium/high findings
  ambar analyze . --disable-rule ordered-map     Skip a rule
  ambar analyze . --fail-on high                 Exit code 1 if high findings (CI mode)")]
    Analyze {
        /// Output format: text, json
        #[arg(long, short = 'f', value_parser = ["text", "json"])]
        format: Option<String>,

        /// Output file path (default: stdout)
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,

        /// Minimum severity to report (high, medium, low, info)
        #[arg(long, value_parser = ["high", "medium", "low", "info"])]
        severity: Option<String>,

        /// Exit with code 1 if findings at this severity or higher exist
        #[arg(long, value_parser = ["high", "medium", "low", "info"])]
        fail_on: Option<String>,

        /// Disable a rule by id (repeatable)
        #[arg(long)]
        disable_rule: Vec<String>,

        /// Hide the progress bar
        #[arg(long)]
        no_progress: bool,
    },
}

/// Run the CLI with parsed arguments
pub fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Some(Commands::Init) => init::run(&cli.path),

        Some(Commands::Rules) => rules::run(&cli.path),

        Some(Commands::Analyze {
            format,
            output,
            severity,
            fail_on,
            disable_rule,
            no_progress,
        }) => analyze::run(
            &cli.path,
            analyze::AnalyzeOptions {
                format,
                output,
                severity,
                fail_on,
                disable_rules: disable_rule,
                no_progress,
                workers: cli.workers,
            },
        ),

        None => analyze::run(
            &cli.path,
            analyze::AnalyzeOptions {
                workers: cli.workers,
                ..Default::default()
            },
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_workers() {
        assert_eq!(parse_workers("4"), Ok(4));
        assert!(parse_workers("0").is_err());
        assert!(parse_workers("65").is_err());
        assert!(parse_workers("many").is_err());
    }

    #[test]
    fn test_cli_parses_analyze_flags() {
        let cli = Cli::try_parse_from([
            "ambar",
            "analyze",
            "src",
            "--format",
            "json",
            "--disable-rule",
            "ordered-map",
            "--disable-rule",
            "raw-new",
            "--fail-on",
            "high",
        ])
        .unwrap();
        assert_eq!(cli.path, PathBuf::from("src"));
        match cli.command {
            Some(Commands::Analyze {
                format,
                disable_rule,
                fail_on,
                ..
            }) => {
                assert_eq!(format.as_deref(), Some("json"));
                assert_eq!(disable_rule, vec!["ordered-map", "raw-new"]);
                assert_eq!(fail_on.as_deref(), Some("high"));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_cli_defaults_to_no_subcommand() {
        let cli = Cli::try_parse_from(["ambar"]).unwrap();
        assert!(cli.command.is_none());
        assert_eq!(cli.path, PathBuf::from("."));
        assert_eq!(cli.workers, 8);
    }

    #[test]
    fn test_cli_rejects_unknown_format() {
        assert!(Cli::try_parse_from(["ambar", "analyze", ".", "--format", "sarif"]).is_err());
    }
}
