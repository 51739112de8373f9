use super::*;
use std::path::PathBuf;

#[test]
fn test_glob_match() {
    // ** patterns
    assert!(glob_match("**/third_party/**", "src/third_party/zlib/inflate.c"));
    assert!(glob_match("generated/", "generated/model.cpp"));
    assert!(glob_match("*.pb.h", "foo.pb.h"));
    assert!(glob_match("**/cmake-build-*/**", "cmake-build-debug/gen.cpp"));

    // Prefix patterns
    assert!(glob_match("vendor/", "vendor/lib/foo.cpp"));
    assert!(!glob_match("vendor/", "src/vendor/foo.cpp"));
}

#[test]
fn test_default_config() {
    let config = ProjectConfig::default();

    assert!(config.is_rule_enabled("raw-new"));
    assert!(config.is_rule_enabled("unknown-rule"));
    assert!(config.to_overrides().weights.is_empty());
    assert!(config.to_overrides().disabled.is_empty());
}

#[test]
fn test_parse_toml_config() {
    let toml_str = r#"
[rules.raw-new]
weight = 6.0

[rules.string-compare]
enabled = false

[exclude]
paths = ["generated/"]

[defaults]
format = "json"
workers = 4
fail_on = "high"
"#;

    let config: ProjectConfig = toml::from_str(toml_str).unwrap();

    assert!(config.is_rule_enabled("raw-new"));
    assert!(!config.is_rule_enabled("string-compare"));
    assert_eq!(config.defaults.format.as_deref(), Some("json"));
    assert_eq!(config.defaults.workers, Some(4));
    assert_eq!(config.defaults.fail_on.as_deref(), Some("high"));

    let overrides = config.to_overrides();
    assert_eq!(overrides.weights.get("raw-new"), Some(&6.0));
    assert!(overrides.disabled.contains("string-compare"));
}

#[test]
fn test_parse_json_config() {
    let json_str = r#"{
        "rules": { "ordered-map": { "enabled": false } },
        "defaults": { "disable_rules": ["string-from-literal"] }
    }"#;

    let config: ProjectConfig = serde_json::from_str(json_str).unwrap();
    assert!(!config.is_rule_enabled("ordered-map"));
    assert!(!config.is_rule_enabled("string-from-literal"));

    let overrides = config.to_overrides();
    assert!(overrides.disabled.contains("ordered-map"));
    assert!(overrides.disabled.contains("string-from-literal"));
}

#[test]
fn test_negative_weight_ignored() {
    let config: ProjectConfig = toml::from_str("[rules.raw-new]\nweight = -1.0\n").unwrap();
    assert!(config.to_overrides().weights.is_empty());
}

#[test]
fn test_should_exclude() {
    let config: ProjectConfig = toml::from_str("[exclude]\npaths = [\"gen/\"]\n").unwrap();
    assert!(config.should_exclude(&PathBuf::from("gen/parser.cpp")));
    assert!(config.should_exclude(&PathBuf::from("src/third_party/x.h")));
    assert!(!config.should_exclude(&PathBuf::from("src/main.cpp")));

    let config: ProjectConfig =
        toml::from_str("[exclude]\nskip_defaults = true\n").unwrap();
    assert!(!config.should_exclude(&PathBuf::from("src/third_party/x.h")));
}

#[test]
fn test_load_project_config_prefers_toml() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("ambar.toml"), "[defaults]\nformat = \"json\"\n").unwrap();
    std::fs::write(
        dir.path().join(".ambarrc.json"),
        r#"{"defaults": {"format": "text"}}"#,
    )
    .unwrap();

    let config = load_project_config(dir.path());
    assert_eq!(config.defaults.format.as_deref(), Some("json"));
}

#[test]
fn test_load_project_config_falls_back_on_parse_error() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("ambar.toml"), "this is not = = toml").unwrap();
    std::fs::write(
        dir.path().join(".ambarrc.json"),
        r#"{"defaults": {"workers": 2}}"#,
    )
    .unwrap();

    let config = load_project_config(dir.path());
    assert_eq!(config.defaults.workers, Some(2));
}

#[test]
fn test_load_project_config_missing() {
    let dir = tempfile::tempdir().unwrap();
    let config = load_project_config(dir.path());
    assert!(config.rules.is_empty());
    assert!(config.defaults.format.is_none());
}
