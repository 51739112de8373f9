//! Matching engine
//!
//! One top-to-bottom pass per file over the normalized lines:
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │ per line                                                 │
//! │  1. lex structural tokens, loop keywords                 │
//! │  2. collect declarations, member calls, rule matches     │
//! │  3. drop matches inside exempt spans                     │
//! │  4. merge everything by (column, rank), apply in order   │
//! │     so the tracker state is exact at every match         │
//! └──────────────────────────────────────────────────────────┘
//! end of input: force-close loops, emit diagnostics
//! ```
//!
//! Loop findings are created when the keyword is seen and their end line is
//! filled in when the tracker reports the scope closed.

use crate::error::{ScanError, ScanResult};
use crate::models::{deterministic_finding_id, Category, Finding, Provenance, Severity};
use crate::report::{FileReport, ReportAggregator};
use crate::scanner::catalog::{
    member_calls, scan_declarations, ContextRequirement, PatternCatalog, Rule, RuleMatch,
    INSIDE_LOOP_MULTIPLIER,
};
use crate::scanner::normalizer::{normalize, RegionKind};
use crate::scanner::scope::{DeclarationKind, LoopKind, LoopScope, Position, ScopeTracker, Token};
use rustc_hash::FxHashMap;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};

/// Score given to every diagnostic finding
pub const DIAGNOSTIC_SCORE: f64 = 0.5;

pub const UNTERMINATED_COMMENT: &str = "unterminated-comment";
pub const UNTERMINATED_LITERAL: &str = "unterminated-literal";
pub const UNCLOSED_LOOP: &str = "unclosed-loop";
pub const UNBALANCED_BRACE: &str = "unbalanced-brace";

/// Ids of findings the engine emits on its own, outside the catalog
pub const DIAGNOSTIC_IDS: &[&str] = &[
    UNTERMINATED_COMMENT,
    UNTERMINATED_LITERAL,
    UNCLOSED_LOOP,
    UNBALANCED_BRACE,
];

/// Per-run rule configuration
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RuleOverrides {
    /// Replacement base scores by rule id
    pub weights: BTreeMap<String, f64>,
    /// Rule ids that produce no findings
    pub disabled: BTreeSet<String>,
}

impl RuleOverrides {
    pub fn is_disabled(&self, id: &str) -> bool {
        self.disabled.contains(id)
    }

    pub fn weight_for(&self, rule: &Rule) -> f64 {
        self.weights.get(rule.id).copied().unwrap_or(rule.base_score)
    }
}

/// Scans single files against a catalog. Holds no per-file state, so one
/// engine can be shared across threads.
#[derive(Debug, Clone)]
pub struct ScanEngine<'a> {
    catalog: &'a PatternCatalog,
    overrides: RuleOverrides,
}

impl<'a> ScanEngine<'a> {
    pub fn new(catalog: &'a PatternCatalog, overrides: RuleOverrides) -> Self {
        for id in overrides.weights.keys().chain(overrides.disabled.iter()) {
            if !catalog.contains(id) && !DIAGNOSTIC_IDS.contains(&id.as_str()) {
                warn!("Unknown rule id '{}' in configuration; ignoring", id);
            }
        }
        Self { catalog, overrides }
    }

    /// Scan raw bytes. Fails only when the input is not UTF-8.
    pub fn scan_bytes(&self, file: &str, bytes: &[u8]) -> ScanResult<FileReport> {
        let text = std::str::from_utf8(bytes).map_err(|e| ScanError::InvalidUtf8 {
            file: file.to_string(),
            valid_up_to: e.valid_up_to(),
        })?;
        self.scan_text(file, text)
    }

    pub fn scan_text(&self, file: &str, text: &str) -> ScanResult<FileReport> {
        let findings = self.find_all(file, text)?;
        let mut aggregator = ReportAggregator::new(file);
        aggregator.extend(findings);
        let report = aggregator.finish();
        debug!(
            "{}: {} findings, score {:.1}",
            file,
            report.findings.len(),
            report.overall_score
        );
        Ok(report)
    }

    /// Raw findings for one file, before dedup and ordering
    pub fn find_all(&self, file: &str, text: &str) -> ScanResult<Vec<Finding>> {
        let source = normalize(text);
        let active: Vec<&Rule> = self
            .catalog
            .rules()
            .iter()
            .filter(|r| r.is_exempt() || !self.overrides.is_disabled(r.id))
            .collect();
        let loop_rule = self
            .catalog
            .loop_rule()
            .filter(|r| !self.overrides.is_disabled(r.id));

        let mut pass = FilePass {
            file,
            engine: self,
            loop_rule,
            tracker: ScopeTracker::new(),
            findings: Vec::new(),
            open_loop_findings: FxHashMap::default(),
        };

        let mut in_directive = false;
        for line in &source.lines {
            let normalized = line.normalized.as_str();
            let directive = in_directive || normalized.trim_start().starts_with('#');
            in_directive = directive && normalized.trim_end().ends_with('\\');
            pass.process_line(line.number, normalized, &active, directive);
        }

        let last_line = source.lines.last().map_or(1, |l| l.number);
        if let Some(region) = &source.unterminated {
            let (id, what) = match region.kind {
                RegionKind::BlockComment => (UNTERMINATED_COMMENT, "block comment"),
                _ => (UNTERMINATED_LITERAL, "literal"),
            };
            pass.diagnostic(
                id,
                Position::new(region.opened_at, 0),
                last_line,
                format!("Unterminated {what} ({}) runs to end of file", region.kind),
            );
        }
        pass.finish(last_line)
    }
}

/// Work item within one line, applied in (column, rank) order
#[derive(Debug)]
enum Event<'r> {
    Structural(Token),
    Loop(LoopKind),
    Declaration(String, DeclarationKind),
    Call(String, String),
    Match(&'r Rule, RuleMatch),
}

impl Event<'_> {
    fn rank(&self) -> u8 {
        match self {
            Event::Structural(_) => 0,
            Event::Loop(_) => 1,
            Event::Declaration(..) => 2,
            Event::Call(..) => 3,
            Event::Match(..) => 4,
        }
    }
}

/// State for scanning one file
struct FilePass<'p, 'a> {
    file: &'p str,
    engine: &'p ScanEngine<'a>,
    loop_rule: Option<&'a Rule>,
    tracker: ScopeTracker,
    findings: Vec<Finding>,
    /// Loop finding index by the scope's opening position
    open_loop_findings: FxHashMap<Position, usize>,
}

impl<'p, 'a> FilePass<'p, 'a> {
    fn process_line(&mut self, number: u32, line: &str, rules: &[&'a Rule], directive: bool) {
        let mut events: Vec<(usize, Event<'a>)> = Vec::new();

        // Directives only feed rule matching; `#define` bodies are not code structure.
        if !directive {
            lex_structure(line, &mut events);
            for decl in scan_declarations(line) {
                events.push((decl.column, Event::Declaration(decl.identifier, decl.kind)));
            }
            for call in member_calls(line) {
                events.push((call.column, Event::Call(call.identifier, call.callee)));
            }
        }

        let mut exempt: Vec<(Category, usize, usize)> = Vec::new();
        let mut matches: Vec<(usize, Event<'a>)> = Vec::new();
        for &rule in rules {
            for m in rule.find_matches(line) {
                if rule.is_exempt() {
                    exempt.push((rule.category, m.start, m.end));
                } else {
                    matches.push((m.start, Event::Match(rule, m)));
                }
            }
        }
        matches.retain(|(start, event)| match event {
            Event::Match(rule, _) => !exempt
                .iter()
                .any(|(cat, s, e)| *cat == rule.category && s <= start && start < e),
            _ => true,
        });
        events.extend(matches);
        events.sort_by_key(|(column, event)| (*column, event.rank()));

        for (column, event) in events {
            let at = Position::new(number, column as u32);
            self.apply(at, event);
            self.resolve_closed();
        }
    }

    fn apply(&mut self, at: Position, event: Event<'a>) {
        match event {
            Event::Structural(token) => self.tracker.on_token(token, at),
            Event::Loop(LoopKind::While) if self.tracker.take_do_tail() => {
                self.tracker.on_token(Token::Other, at);
            }
            Event::Loop(kind) => {
                let depth = self.tracker.enter_loop(kind, at);
                if let Some(rule) = self.loop_rule {
                    let score = self.engine.overrides.weight_for(rule) * depth as f64;
                    let message = format!(
                        "`{}` {}",
                        kind.keyword(),
                        rule.message.replace("{depth}", &depth.to_string())
                    );
                    let idx = self.push(rule.id, rule.category, score, at, message, rule.suggestion);
                    self.open_loop_findings.insert(at, idx);
                }
            }
            Event::Declaration(identifier, kind) => {
                self.tracker.record_declaration(&identifier, kind, at);
            }
            Event::Call(identifier, callee) => {
                self.tracker.record_call(&identifier, &callee, at);
            }
            Event::Match(rule, m) => self.apply_match(rule, m, at),
        }
    }

    fn apply_match(&mut self, rule: &'a Rule, m: RuleMatch, at: Position) {
        if let (Some(kind), Some(identifier)) = (m.requires, m.identifier.as_deref()) {
            if self.tracker.declaration(identifier).map(|d| d.kind) != Some(kind) {
                return;
            }
        }

        let mut score = self.engine.overrides.weight_for(rule);
        match rule.context {
            ContextRequirement::None => {}
            ContextRequirement::NoPriorReserve => {
                if let Some(identifier) = m.identifier.as_deref() {
                    // lists and deques have nothing to reserve
                    let reservable = self
                        .tracker
                        .declaration(identifier)
                        .map_or(true, |d| d.kind.has_reserve());
                    if !reservable || self.tracker.has_prior_reserve(identifier, at) {
                        return;
                    }
                }
            }
            ContextRequirement::InsideLoop => {
                if self.tracker.current_loop_depth() > 0 {
                    score *= INSIDE_LOOP_MULTIPLIER;
                }
            }
            ContextRequirement::NestingDepth => {
                score *= self.tracker.current_loop_depth().max(1) as f64;
            }
        }

        let message = match m.identifier.as_deref() {
            Some(identifier) => format!("{} (`{}`)", rule.message, identifier),
            None => rule.message.to_string(),
        };
        self.push(rule.id, rule.category, score, at, message, rule.suggestion);
    }

    /// Fill in end lines for loops the tracker just closed
    fn resolve_closed(&mut self) {
        for scope in self.tracker.drain_closed() {
            self.close_loop_finding(&scope);
        }
    }

    fn close_loop_finding(&mut self, scope: &LoopScope) {
        if let Some(idx) = self.open_loop_findings.remove(&scope.opened) {
            let finding = &mut self.findings[idx];
            finding.line_end = scope.closed_at.unwrap_or(finding.line_start);
            if scope.forced {
                finding.provenance = Provenance::Recovered;
            }
        }
    }

    fn push(
        &mut self,
        rule_id: &str,
        category: Category,
        score: f64,
        at: Position,
        message: String,
        suggestion: Option<&str>,
    ) -> usize {
        self.findings.push(Finding {
            id: deterministic_finding_id(rule_id, self.file, at.line, at.column),
            rule_id: rule_id.to_string(),
            category,
            severity: Severity::from_score(score),
            score,
            line_start: at.line,
            line_end: at.line,
            column: at.column,
            message,
            suggestion: suggestion.map(str::to_string),
            provenance: Provenance::Normal,
        });
        self.findings.len() - 1
    }

    fn diagnostic(&mut self, id: &str, at: Position, line_end: u32, message: String) {
        if self.engine.overrides.is_disabled(id) {
            return;
        }
        let idx = self.push(id, Category::Diagnostic, DIAGNOSTIC_SCORE, at, message, None);
        let finding = &mut self.findings[idx];
        finding.line_end = line_end.max(at.line);
        finding.provenance = Provenance::Recovered;
    }

    fn finish(mut self, last_line: u32) -> ScanResult<Vec<Finding>> {
        let tracker = std::mem::take(&mut self.tracker);
        let (closed, imbalance) = tracker.finish(last_line);
        for scope in &closed {
            self.close_loop_finding(scope);
        }
        for scope in &imbalance.unclosed_loops {
            self.close_loop_finding(scope);
            self.diagnostic(
                UNCLOSED_LOOP,
                scope.opened,
                last_line,
                format!(
                    "`{}` loop opened on line {} is never closed",
                    scope.kind.keyword(),
                    scope.opened.line
                ),
            );
        }
        for at in &imbalance.unmatched_closes {
            self.diagnostic(
                UNBALANCED_BRACE,
                *at,
                at.line,
                "Closing brace without a matching opening brace".to_string(),
            );
        }
        if let Some(at) = imbalance.unclosed_block {
            self.diagnostic(
                UNBALANCED_BRACE,
                at,
                last_line,
                format!("Brace opened on line {} is never closed", at.line),
            );
        }

        if let Some(opened) = self.open_loop_findings.keys().min() {
            return Err(ScanError::Internal {
                file: self.file.to_string(),
                detail: format!("loop opened at {}:{} was never resolved", opened.line, opened.column),
            });
        }
        Ok(self.findings)
    }
}

fn is_word_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

/// Split a normalized line into structural tokens and loop keywords
fn lex_structure<'r>(line: &str, events: &mut Vec<(usize, Event<'r>)>) {
    let bytes = line.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        if is_word_byte(b) {
            let start = i;
            while i < bytes.len() && is_word_byte(bytes[i]) {
                i += 1;
            }
            let event = match &line[start..i] {
                "for" => Event::Loop(LoopKind::For),
                "while" => Event::Loop(LoopKind::While),
                "do" => Event::Loop(LoopKind::Do),
                "else" => Event::Structural(Token::Else),
                _ => Event::Structural(Token::Other),
            };
            events.push((start, event));
            continue;
        }
        let token = match b {
            b'{' => Some(Token::OpenBrace),
            b'}' => Some(Token::CloseBrace),
            b'(' => Some(Token::OpenParen),
            b')' => Some(Token::CloseParen),
            b';' => Some(Token::Semicolon),
            _ if b.is_ascii_whitespace() => None,
            _ => Some(Token::Other),
        };
        if let Some(token) = token {
            events.push((i, Event::Structural(token)));
        }
        i += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scan(text: &str) -> FileReport {
        ScanEngine::new(PatternCatalog::builtin(), RuleOverrides::default())
            .scan_text("test.cpp", text)
            .unwrap()
    }

    fn rules_of(report: &FileReport) -> Vec<(u32, &str)> {
        report
            .findings
            .iter()
            .map(|f| (f.line_start, f.rule_id.as_str()))
            .collect()
    }

    fn loops(report: &FileReport) -> Vec<&Finding> {
        report
            .findings
            .iter()
            .filter(|f| f.rule_id == "loop-nesting")
            .collect()
    }

    #[test]
    fn test_new_and_delete_at_top_scope() {
        let report = scan("int* p = new int(5); delete p;\nauto q = std::make_unique<int>(5);\n");
        assert_eq!(rules_of(&report), vec![(1, "raw-delete"), (1, "raw-new")]);
        assert!(report
            .findings
            .iter()
            .all(|f| f.category == Category::MemoryManagement));
    }

    #[test]
    fn test_smart_pointer_wrapping_new_is_exempt() {
        let report = scan("std::unique_ptr<Foo> p(new Foo());\nstd::shared_ptr<Foo> s{new Foo};\n");
        assert!(report.findings.is_empty(), "{:?}", rules_of(&report));
    }

    #[test]
    fn test_comment_and_string_content_ignored() {
        let report = scan(
            "// int* p = new int;\n/* for (;;) { for (;;) {} } */\nconst char* s = \"delete p; malloc(3)\";\n",
        );
        assert!(report.findings.is_empty(), "{:?}", rules_of(&report));
    }

    #[test]
    fn test_nested_loop_scores_increase() {
        let report = scan("for (int i = 0; i < n; ++i) {\n  for (int j = 0; j < n; ++j) {\n    work(i, j);\n  }\n}\n");
        let found = loops(&report);
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].score, 3.0);
        assert_eq!(found[1].score, 6.0);
        assert_eq!((found[0].line_start, found[0].line_end), (1, 5));
        assert_eq!((found[1].line_start, found[1].line_end), (2, 4));
    }

    #[test]
    fn test_triple_nesting_is_high() {
        let report = scan("for (;;) {\n  while (x) {\n    do {\n      y();\n    } while (z);\n  }\n}\n");
        let found = loops(&report);
        assert_eq!(found.len(), 3);
        assert_eq!(found[2].score, 9.0);
        assert_eq!(found[2].severity, Severity::High);
        assert_eq!((found[2].line_start, found[2].line_end), (3, 5));
    }

    #[test]
    fn test_loops_on_one_line_dedup_to_deepest() {
        let report = scan("for (;;) { for (;;) { x(); } }\n");
        let found = loops(&report);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].score, 6.0);
        assert_eq!(found[0].column, 11);
    }

    #[test]
    fn test_do_while_tail_not_counted() {
        let report = scan("do {\n  step();\n} while (more());\nwhile (x) { y(); }\n");
        let found = loops(&report);
        assert_eq!(found.len(), 2);
        assert!(found.iter().all(|f| f.score == 3.0));
        assert_eq!((found[0].line_start, found[0].line_end), (1, 3));
    }

    #[test]
    fn test_append_without_reserve() {
        let report = scan("std::vector<int> v;\nv.push_back(1);\n");
        assert_eq!(rules_of(&report), vec![(2, "append-without-reserve")]);

        let report = scan("std::vector<int> v;\nv.reserve(4);\nv.push_back(1);\n");
        assert!(report.findings.is_empty());
    }

    #[test]
    fn test_reserve_order_on_same_line() {
        let report = scan("std::vector<int> v; v.reserve(4); v.push_back(1);\n");
        assert!(report.findings.is_empty());
        let report = scan("std::vector<int> v; v.push_back(1); v.reserve(4);\n");
        assert_eq!(report.findings.len(), 1);
    }

    #[test]
    fn test_reserve_in_enclosing_block_suppresses() {
        let text = "void f() {\n  std::vector<int> v;\n  v.reserve(100);\n  for (int i = 0; i < 100; i++) {\n    v.push_back(i);\n  }\n}\n";
        let report = scan(text);
        assert!(report
            .findings
            .iter()
            .all(|f| f.rule_id != "append-without-reserve"));
    }

    #[test]
    fn test_string_append_inside_loop_doubles() {
        let outside = scan("std::string s;\ns += \"x\";\n");
        let inside = scan("std::string s;\nfor (;;) {\n  s += \"x\";\n}\n");
        let score = |r: &FileReport| {
            r.findings
                .iter()
                .find(|f| f.rule_id == "string-append")
                .map(|f| f.score)
                .unwrap()
        };
        assert_eq!(score(&outside), 4.0);
        assert_eq!(score(&inside), 8.0);
    }

    #[test]
    fn test_append_identifier_requires_string_declaration() {
        let report = scan("int total = 0;\ntotal += count;\n");
        assert!(report.findings.is_empty());
        let report = scan("std::string out;\nout += name;\n");
        assert_eq!(rules_of(&report), vec![(2, "string-append")]);
    }

    #[test]
    fn test_parameter_declarations_end_with_the_function() {
        let text = "void greet(const std::string& out) {\n  log(out);\n}\n\
                    int count(int out, int step) {\n  out += step;\n  return out;\n}\n";
        assert!(scan(text).findings.is_empty());

        let report = scan("void build(std::string out) {\n  out += tail;\n}\n");
        assert_eq!(
            rules_of(&report),
            vec![(1, "string-by-value-param"), (2, "string-append")]
        );
    }

    #[test]
    fn test_append_to_list_or_deque_not_flagged() {
        let report = scan("void f() {\n  std::list<int> l;\n  l.push_back(1);\n}\n");
        assert_eq!(rules_of(&report), vec![(2, "sequential-list")]);

        let report = scan("void f() {\n  std::deque<int> d;\n  d.push_back(1);\n}\n");
        assert!(report.findings.is_empty());
    }

    #[test]
    fn test_parenthesized_type_new() {
        let report = scan("int* p = new (int);\n");
        assert_eq!(rules_of(&report), vec![(1, "raw-new")]);
    }

    #[test]
    fn test_disabled_rule_and_weight_override() {
        let mut overrides = RuleOverrides::default();
        overrides.disabled.insert("raw-delete".into());
        overrides.weights.insert("raw-new".into(), 2.0);
        let engine = ScanEngine::new(PatternCatalog::builtin(), overrides);
        let report = engine.scan_text("a.cpp", "int* p = new int; delete p;\n").unwrap();
        assert_eq!(report.findings.len(), 1);
        assert_eq!(report.findings[0].score, 2.0);
        assert_eq!(report.findings[0].severity, Severity::Low);
    }

    #[test]
    fn test_disabled_loop_rule_keeps_tracking() {
        let mut overrides = RuleOverrides::default();
        overrides.disabled.insert("loop-nesting".into());
        let engine = ScanEngine::new(PatternCatalog::builtin(), overrides);
        let report = engine
            .scan_text("a.cpp", "std::string s;\nfor (;;) {\n  s += \"x\";\n}\n")
            .unwrap();
        assert_eq!(rules_of(&report), vec![(3, "string-append")]);
        assert_eq!(report.findings[0].score, 8.0);
    }

    #[test]
    fn test_unclosed_loop_recovered() {
        let report = scan("void f() {\n  for (int i = 0; i < 3; i++) {\n    g();\n");
        let found = loops(&report);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].provenance, Provenance::Recovered);
        assert_eq!(found[0].line_end, 3);
        let ids: Vec<_> = report.findings.iter().map(|f| f.rule_id.as_str()).collect();
        assert!(ids.contains(&UNCLOSED_LOOP));
        assert!(ids.contains(&UNBALANCED_BRACE));
    }

    #[test]
    fn test_unmatched_close_brace_diagnostic() {
        let report = scan("int x;\n}\n");
        assert_eq!(rules_of(&report), vec![(2, UNBALANCED_BRACE)]);
        assert_eq!(report.findings[0].score, DIAGNOSTIC_SCORE);
        assert_eq!(report.findings[0].severity, Severity::Info);
    }

    #[test]
    fn test_unterminated_comment_diagnostic() {
        let report = scan("int* p = new int;\n/* never closed\nfor (;;) {}\n");
        assert_eq!(
            rules_of(&report),
            vec![(1, "raw-new"), (2, UNTERMINATED_COMMENT)]
        );
        assert_eq!(report.findings[1].line_end, 3);
    }

    #[test]
    fn test_preprocessor_loop_not_tracked() {
        let report = scan("#define REPEAT(n) for (int i = 0; i < n; ++i)\nint x;\n");
        assert!(loops(&report).is_empty());
        assert!(report.findings.is_empty());
    }

    #[test]
    fn test_invalid_utf8_is_an_error() {
        let engine = ScanEngine::new(PatternCatalog::builtin(), RuleOverrides::default());
        let err = engine.scan_bytes("bad.cpp", b"int x;\xff\n").unwrap_err();
        assert_eq!(
            err,
            ScanError::InvalidUtf8 {
                file: "bad.cpp".into(),
                valid_up_to: 6
            }
        );
    }

    #[test]
    fn test_empty_input() {
        let report = scan("");
        assert!(report.findings.is_empty());
        assert_eq!(report.overall_score, 0.0);
    }

    #[test]
    fn test_rescan_is_identical() {
        let text = "std::list<int> l;\nfor (auto x : l) { std::map<int, int> m; }\n";
        assert_eq!(scan(text), scan(text));
    }
}
