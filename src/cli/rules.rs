//! Rules command - list the built-in catalog

use crate::config::{load_project_config, ProjectConfig};
use crate::models::Category;
use crate::scanner::catalog::Rule;
use crate::scanner::PatternCatalog;

use anyhow::Result;
use console::style;
use std::path::Path;

/// Run the rules command. Overrides from the project config at `path`
/// (if any) are shown next to the built-in scores.
pub fn run(path: &Path) -> Result<()> {
    let project_config = load_project_config(path);
    let catalog = PatternCatalog::builtin();

    println!("\n{}\n", style("Ambar rules").bold());
    for category in Category::ALL {
        let rules: Vec<&Rule> = catalog
            .rules()
            .iter()
            .filter(|r| r.category == category)
            .collect();
        if rules.is_empty() {
            continue;
        }
        println!("{}", style(category.label()).bold().underlined());
        for rule in rules {
            println!("  {}", describe_rule(rule, &project_config));
        }
        println!();
    }
    Ok(())
}

fn describe_rule(rule: &Rule, project_config: &ProjectConfig) -> String {
    let id = format!("{:<24}", rule.id);
    if rule.is_exempt() {
        return format!(
            "{} {}",
            style(id).dim(),
            style("exempt: suppresses matches in its category").dim()
        );
    }

    let overrides = project_config.to_overrides();
    let mut score = format!("{:>4.1}", overrides.weight_for(rule));
    if overrides.weights.contains_key(rule.id) {
        score.push_str(&format!(" (built-in {:.1})", rule.base_score));
    }
    let mut line = format!(
        "{} {} {:<18} {}",
        style(id).cyan(),
        score,
        rule.context.to_string(),
        rule.message
    );
    if !project_config.is_rule_enabled(rule.id) {
        line.push_str(&format!(" {}", style("[disabled]").yellow()));
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_describe_rule_shows_overrides() {
        console::set_colors_enabled(false);
        let config: ProjectConfig =
            toml::from_str("[rules.raw-new]\nweight = 6.0\nenabled = false\n").unwrap();
        let catalog = PatternCatalog::builtin();

        let raw_new = describe_rule(catalog.get("raw-new").unwrap(), &config);
        assert!(raw_new.contains("6.0 (built-in 8.0)"));
        assert!(raw_new.contains("[disabled]"));

        let exempt = describe_rule(catalog.get("unordered-map").unwrap(), &config);
        assert!(exempt.contains("exempt"));

        let nesting = describe_rule(catalog.get("loop-nesting").unwrap(), &ProjectConfig::default());
        assert!(nesting.contains("nesting-depth"));
        assert!(!nesting.contains("[disabled]"));
    }
}
