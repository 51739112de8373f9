//! Project-level configuration support
//!
//! Loads per-project configuration from `ambar.toml` or `.ambarrc.json` in
//! the scanned root.
//!
//! # Configuration Format
//!
//! ```toml
//! # ambar.toml
//!
//! [rules.raw-new]
//! enabled = true
//! weight = 6.0
//!
//! [rules.string-compare]
//! enabled = false
//!
//! [exclude]
//! paths = ["third_party/", "**/generated/**"]
//!
//! [defaults]
//! format = "text"
//! severity = "low"
//! workers = 8
//! fail_on = "high"
//! ```

use crate::scanner::engine::RuleOverrides;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, warn};

/// Config file names, in lookup order
pub const CONFIG_FILE_NAMES: &[&str] = &["ambar.toml", ".ambarrc.json"];

/// Built-in default exclusion patterns for vendored/build output.
/// These are applied automatically unless `skip_defaults = true` in config.
pub const DEFAULT_EXCLUDE_PATTERNS: &[&str] = &[
    "**/third_party/**",
    "**/third-party/**",
    "**/vendor/**",
    "**/build/**",
    "**/cmake-build-*/**",
];

/// Project-level configuration loaded from ambar.toml or .ambarrc.json
#[derive(Debug, Clone, Deserialize, Default)]
pub struct ProjectConfig {
    /// Per-rule overrides keyed by rule id
    #[serde(default)]
    pub rules: HashMap<String, RuleConfigOverride>,

    /// Path exclusion patterns
    #[serde(default)]
    pub exclude: ExcludeConfig,

    /// Default CLI flags
    #[serde(default)]
    pub defaults: CliDefaults,
}

/// Configuration override for a specific rule
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RuleConfigOverride {
    /// Whether the rule reports (default: true)
    #[serde(default)]
    pub enabled: Option<bool>,

    /// Replacement base score
    #[serde(default)]
    pub weight: Option<f64>,
}

/// Path exclusion configuration
#[derive(Debug, Clone, Deserialize, Default)]
pub struct ExcludeConfig {
    /// Paths/patterns to exclude from analysis
    #[serde(default)]
    pub paths: Vec<String>,

    /// If true, disable built-in default exclusion patterns
    #[serde(default)]
    pub skip_defaults: bool,
}

impl ExcludeConfig {
    /// Returns effective exclusion patterns (defaults + user patterns).
    /// If `skip_defaults` is true, only user patterns are returned.
    pub fn effective_patterns(&self) -> Vec<String> {
        let mut patterns = Vec::new();

        if !self.skip_defaults {
            patterns.extend(DEFAULT_EXCLUDE_PATTERNS.iter().map(|s| s.to_string()));
        }

        for p in &self.paths {
            if !patterns.contains(p) {
                patterns.push(p.clone());
            }
        }

        patterns
    }
}

/// Default CLI flags that can be set in project config
#[derive(Debug, Clone, Deserialize, Default)]
pub struct CliDefaults {
    /// Default output format (text, json)
    #[serde(default)]
    pub format: Option<String>,

    /// Default minimum severity shown
    #[serde(default)]
    pub severity: Option<String>,

    /// Default number of workers
    #[serde(default)]
    pub workers: Option<usize>,

    /// Disable rules by default
    #[serde(default)]
    pub disable_rules: Vec<String>,

    /// Fail-on severity threshold for CI
    #[serde(default)]
    pub fail_on: Option<String>,
}

/// Load project configuration from the scanned root.
///
/// Searches for `ambar.toml`, then `.ambarrc.json`. A file that fails to
/// parse is reported and skipped. Returns default configuration if no usable
/// config file is found.
pub fn load_project_config(root: &Path) -> ProjectConfig {
    let toml_path = root.join(CONFIG_FILE_NAMES[0]);
    if toml_path.exists() {
        match load_toml_config(&toml_path) {
            Ok(config) => {
                debug!("Loaded project config from {}", toml_path.display());
                return config;
            }
            Err(e) => {
                warn!("Failed to load {}: {}", toml_path.display(), e);
            }
        }
    }

    let json_path = root.join(CONFIG_FILE_NAMES[1]);
    if json_path.exists() {
        match load_json_config(&json_path) {
            Ok(config) => {
                debug!("Loaded project config from {}", json_path.display());
                return config;
            }
            Err(e) => {
                warn!("Failed to load {}: {}", json_path.display(), e);
            }
        }
    }

    debug!("No project config found, using defaults");
    ProjectConfig::default()
}

fn load_toml_config(path: &Path) -> anyhow::Result<ProjectConfig> {
    let content = std::fs::read_to_string(path)?;
    let config: ProjectConfig = toml::from_str(&content)?;
    Ok(config)
}

fn load_json_config(path: &Path) -> anyhow::Result<ProjectConfig> {
    let content = std::fs::read_to_string(path)?;
    let config: ProjectConfig = serde_json::from_str(&content)?;
    Ok(config)
}

impl ProjectConfig {
    /// Check if a rule is enabled (defaults to true if not specified)
    pub fn is_rule_enabled(&self, id: &str) -> bool {
        !self.defaults.disable_rules.iter().any(|r| r == id)
            && self
                .rules
                .get(id)
                .and_then(|c| c.enabled)
                .unwrap_or(true)
    }

    /// Engine overrides: weights and disabled rule ids from `[rules]` and
    /// `[defaults] disable_rules`
    pub fn to_overrides(&self) -> RuleOverrides {
        let mut overrides = RuleOverrides::default();
        for (id, rule) in &self.rules {
            if let Some(weight) = rule.weight {
                if weight.is_finite() && weight >= 0.0 {
                    overrides.weights.insert(id.clone(), weight);
                } else {
                    warn!("Ignoring invalid weight {} for rule '{}'", weight, id);
                }
            }
            if rule.enabled == Some(false) {
                overrides.disabled.insert(id.clone());
            }
        }
        overrides
            .disabled
            .extend(self.defaults.disable_rules.iter().cloned());
        overrides
    }

    /// Check if a path (relative to the scanned root) should be excluded
    pub fn should_exclude(&self, path: &Path) -> bool {
        let path_str = path.to_string_lossy().replace('\\', "/");
        self.exclude
            .effective_patterns()
            .iter()
            .any(|pattern| glob_match(pattern, &path_str))
    }
}

/// Simple glob pattern matching
pub fn glob_match(pattern: &str, path: &str) -> bool {
    // **/X/** matches if the path contains X as a directory
    if pattern.starts_with("**/") && pattern.ends_with("/**") {
        let middle = pattern.trim_start_matches("**/").trim_end_matches("/**");
        if middle.contains('*') {
            return path
                .split('/')
                .rev()
                .skip(1)
                .any(|segment| glob_match(middle, segment));
        }
        return path.contains(&format!("/{}/", middle))
            || path.starts_with(&format!("{}/", middle));
    }

    // ** matches any number of path segments
    if pattern.contains("**") {
        let parts: Vec<&str> = pattern.split("**").collect();
        if parts.len() == 2 {
            let prefix = parts[0].trim_end_matches('/');
            let suffix = parts[1].trim_start_matches('/');

            if !prefix.is_empty() && !path.starts_with(prefix) {
                return false;
            }

            if !suffix.is_empty() && !suffix.contains('*') && !path.ends_with(suffix) {
                return false;
            }
            if !suffix.is_empty() && suffix.contains('*') {
                let star_parts: Vec<&str> = suffix.split('*').collect();
                if star_parts.len() == 2 {
                    let (before, after) = (star_parts[0], star_parts[1]);
                    let matches = if before.is_empty() {
                        path.ends_with(after)
                    } else {
                        path.contains(before) && path.ends_with(after)
                    };
                    if !matches {
                        return false;
                    }
                }
            }

            return true;
        }
    }

    // single * matches within a segment
    if pattern.contains('*') {
        let parts: Vec<&str> = pattern.split('*').collect();
        if parts.len() == 2 {
            let (prefix, suffix) = (parts[0], parts[1]);
            return path.len() >= prefix.len() + suffix.len()
                && path.starts_with(prefix)
                && path.ends_with(suffix);
        }
    }

    // "vendor/" only matches "vendor/foo.cpp", not "src/vendor/foo.cpp";
    // use "**/vendor/**" for recursive matching
    path.starts_with(pattern) || path == pattern
}

#[cfg(test)]
mod tests;
