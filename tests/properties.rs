//! Property-based tests for the scanning core

use proptest::prelude::*;
use std::collections::BTreeSet;

use ambar::models::Provenance;
use ambar::scanner::{PatternCatalog, RuleOverrides, ScanEngine};

fn engine() -> ScanEngine<'static> {
    ScanEngine::new(PatternCatalog::builtin(), RuleOverrides::default())
}

/// Printable ASCII without a trailing backslash, so a line comment never
/// continues onto the next line
fn comment_body() -> impl Strategy<Value = String> {
    prop::string::string_regex("[ -~]{0,60}")
        .expect("valid regex")
        .prop_map(|s| s.trim_end_matches('\\').to_string())
}

/// Lines drawn from C++-ish fragments, including unbalanced ones
fn cpp_line() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("for (int i = 0; i < n; ++i) {".to_string()),
        Just("while (x) {".to_string()),
        Just("do {".to_string()),
        Just("} while (x);".to_string()),
        Just("}".to_string()),
        Just("{".to_string()),
        Just("int* p = new int[n];".to_string()),
        Just("delete p;".to_string()),
        Just("std::vector<int> v;".to_string()),
        Just("v.reserve(8);".to_string()),
        Just("v.push_back(1);".to_string()),
        Just("std::string s;".to_string()),
        Just("s += \"x\";".to_string()),
        Just("/* open".to_string()),
        Just("close */".to_string()),
        Just("const char* q = \"unterminated".to_string()),
        prop::string::string_regex("[ -~]{0,40}").expect("valid regex"),
    ]
}

fn nested_loops(depth: usize) -> String {
    let mut text = String::new();
    for level in 0..depth {
        text.push_str(&"  ".repeat(level));
        text.push_str(&format!("for (int i{0} = 0; i{0} < n; ++i{0}) {{\n", level));
    }
    text.push_str(&"  ".repeat(depth));
    text.push_str("work();\n");
    for level in (0..depth).rev() {
        text.push_str(&"  ".repeat(level));
        text.push_str("}\n");
    }
    text
}

proptest! {
    #[test]
    fn comment_only_input_has_no_findings(bodies in prop::collection::vec(comment_body(), 0..20)) {
        let text: String = bodies
            .iter()
            .map(|b| format!("// {}\n", b))
            .collect();
        let report = engine().scan_text("comments.cpp", &text).unwrap();
        prop_assert!(report.findings.is_empty(), "{:?}", report.findings);
        prop_assert_eq!(report.overall_score, 0.0);
    }

    #[test]
    fn scanning_is_idempotent(lines in prop::collection::vec(cpp_line(), 0..30)) {
        let text = lines.join("\n");
        let first = engine().scan_text("a.cpp", &text).unwrap();
        let second = engine().scan_text("a.cpp", &text).unwrap();
        prop_assert_eq!(first, second);
    }

    #[test]
    fn arbitrary_input_never_fails_and_stays_in_bounds(lines in prop::collection::vec(cpp_line(), 0..30)) {
        let text = lines.join("\n");
        let line_count = text.lines().count().max(1) as u32;
        let report = engine().scan_text("a.cpp", &text).unwrap();

        let mut seen = BTreeSet::new();
        for finding in &report.findings {
            prop_assert!(finding.line_start >= 1);
            prop_assert!(finding.line_start <= finding.line_end);
            prop_assert!(finding.line_end <= line_count);
            prop_assert!(finding.score >= 0.0);
            prop_assert!(
                seen.insert((finding.line_start, finding.rule_id.clone())),
                "duplicate finding for {:?}",
                (finding.line_start, &finding.rule_id)
            );
        }
        let total: f64 = report.category_scores.values().sum();
        prop_assert!((total - report.overall_score).abs() < 1e-9);
    }

    #[test]
    fn loop_scores_grow_with_depth(depth in 1usize..8) {
        let report = engine().scan_text("loops.cpp", &nested_loops(depth)).unwrap();
        let scores: Vec<f64> = report
            .findings
            .iter()
            .filter(|f| f.rule_id == "loop-nesting")
            .map(|f| f.score)
            .collect();
        let expected: Vec<f64> = (1..=depth).map(|d| 3.0 * d as f64).collect();
        prop_assert_eq!(scores, expected);
        prop_assert!(report.findings.iter().all(|f| f.provenance == Provenance::Normal));
    }

    #[test]
    fn string_append_in_loop_scores_higher(depth in 1usize..4) {
        let outside = "std::string s;\ns += \"x\";\n".to_string();
        let mut inside = String::from("std::string s;\n");
        for _ in 0..depth {
            inside.push_str("while (more()) {\n");
        }
        inside.push_str("s += \"x\";\n");
        for _ in 0..depth {
            inside.push_str("}\n");
        }

        let score = |text: &str| {
            engine()
                .scan_text("s.cpp", text)
                .unwrap()
                .findings
                .iter()
                .find(|f| f.rule_id == "string-append")
                .map(|f| f.score)
        };
        prop_assert_eq!(score(&outside), Some(4.0));
        prop_assert_eq!(score(&inside), Some(8.0));
    }
}
