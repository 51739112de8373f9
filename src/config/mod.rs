//! Configuration module for Ambar
//!
//! This module handles:
//! - Project-level configuration (ambar.toml)
//! - Rule weight overrides and disabled rules
//! - CLI defaults

mod project_config;

pub use project_config::{
    glob_match, load_project_config, CliDefaults, ExcludeConfig, ProjectConfig,
    RuleConfigOverride, CONFIG_FILE_NAMES,
};
