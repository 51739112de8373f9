//! Init command - write an example ambar.toml

use crate::config::CONFIG_FILE_NAMES;

use anyhow::{Context, Result};
use console::style;
use std::path::Path;

const EXAMPLE_CONFIG: &str = r#"# Ambar configuration
# Run `ambar rules` to list rule ids and their base scores.

# Per-rule overrides: disable a rule or replace its base score
[rules.string-compare]
enabled = false

[rules.raw-new]
weight = 6.0

[exclude]
# Paths/patterns to skip, relative to this directory
paths = ["**/generated/**"]
# Set to true to also scan third_party/, vendor/, build/ and cmake-build-*/
skip_defaults = false

[defaults]
# Default output format (text, json)
format = "text"
# Minimum severity shown (high, medium, low, info)
severity = "low"
# Parallel workers (1-64)
workers = 8
# Exit with code 1 when findings at this severity or higher exist
# fail_on = "high"
"#;

/// Run the init command
pub fn run(path: &Path) -> Result<()> {
    let root = path
        .canonicalize()
        .with_context(|| format!("Path does not exist: {}", path.display()))?;

    if !root.is_dir() {
        anyhow::bail!("Path is not a directory: {}", root.display());
    }

    let config_path = root.join(CONFIG_FILE_NAMES[0]);
    if config_path.exists() {
        anyhow::bail!(
            "{} already exists; remove it first to regenerate",
            config_path.display()
        );
    }

    std::fs::write(&config_path, EXAMPLE_CONFIG)
        .with_context(|| format!("Failed to write {}", config_path.display()))?;
    println!(
        "{} Created {}",
        style("✓").green(),
        style(config_path.display()).cyan()
    );
    println!(
        "\nNext: run {} to scan this directory",
        style("ambar analyze .").bold()
    );
    Ok(())
}
