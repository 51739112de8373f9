//! Built-in rule catalog
//!
//! A [`PatternCatalog`] is an immutable list of [`Rule`]s. Each rule pairs a
//! [`Recognizer`] (how to find candidate matches in one normalized line)
//! with the context it needs from the scope tracker before it can report.
//!
//! Exempt rules never report. Their matches mark spans on the line inside
//! which same-category matches are dropped, so `std::unique_ptr<T>(new T)`
//! does not count as a raw `new`.

use crate::models::Category;
use crate::scanner::scope::DeclarationKind;
use memchr::memmem;
use regex::Regex;
use std::sync::OnceLock;

/// Multiplier applied to inside-loop rules when the match sits in a loop
pub const INSIDE_LOOP_MULTIPLIER: f64 = 2.0;

/// Id of the rule that scores loop nesting
pub const LOOP_RULE_ID: &str = "loop-nesting";

/// What the engine must check before a match becomes a finding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextRequirement {
    None,
    /// Suppressed when the matched identifier was reserved earlier in scope
    NoPriorReserve,
    /// Score multiplied by [`INSIDE_LOOP_MULTIPLIER`] inside any loop
    InsideLoop,
    /// Score is `base × loop depth`
    NestingDepth,
}

impl std::fmt::Display for ContextRequirement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ContextRequirement::None => write!(f, "none"),
            ContextRequirement::NoPriorReserve => write!(f, "no-prior-reserve"),
            ContextRequirement::InsideLoop => write!(f, "inside-loop"),
            ContextRequirement::NestingDepth => write!(f, "nesting-depth"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Report,
    Exempt,
}

/// How a rule finds candidate matches in a normalized line
#[derive(Debug, Clone)]
pub enum Recognizer {
    /// Plain regex. `column_group` locates the reported column,
    /// `identifier_group` the receiver the context checks look at.
    Pattern {
        regex: Regex,
        column_group: usize,
        identifier_group: Option<usize>,
    },
    /// `new T` or `new T[n]`
    NewExpression { array: bool },
    /// `delete p` or `delete[] p`
    DeleteExpression { array: bool },
    /// `s += "..."`, `s += t` for a string `s`, `s = s + ...`
    StringAppend,
    /// `for` / `while` / `do`. Loops are tokenized by the engine itself,
    /// so this recognizer never yields line matches.
    LoopKeyword,
}

/// A candidate match within one line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleMatch {
    /// Byte offset where the match starts (the reported column)
    pub start: usize,
    pub end: usize,
    pub identifier: Option<String>,
    /// The identifier must be declared with this kind for the match to count
    pub requires: Option<DeclarationKind>,
}

impl RuleMatch {
    fn span(start: usize, end: usize) -> Self {
        Self {
            start,
            end,
            identifier: None,
            requires: None,
        }
    }
}

impl Recognizer {
    /// Find all matches in one normalized line, left to right
    pub fn find(&self, line: &str) -> Vec<RuleMatch> {
        match self {
            Recognizer::Pattern {
                regex,
                column_group,
                identifier_group,
            } => regex
                .captures_iter(line)
                .filter_map(|caps| {
                    let whole = caps.get(0)?;
                    let start = caps.get(*column_group).map_or(whole.start(), |m| m.start());
                    let identifier = identifier_group
                        .and_then(|g| caps.get(g))
                        .map(|m| m.as_str().to_string());
                    Some(RuleMatch {
                        start,
                        end: whole.end(),
                        identifier,
                        requires: None,
                    })
                })
                .collect(),
            Recognizer::NewExpression { array } => find_new_expressions(line)
                .into_iter()
                .filter(|(_, is_array)| is_array == array)
                .map(|(m, _)| m)
                .collect(),
            Recognizer::DeleteExpression { array } => find_delete_expressions(line)
                .into_iter()
                .filter(|(_, is_array)| is_array == array)
                .map(|(m, _)| m)
                .collect(),
            Recognizer::StringAppend => find_string_appends(line),
            Recognizer::LoopKeyword => Vec::new(),
        }
    }
}

/// One catalog entry
#[derive(Debug, Clone)]
pub struct Rule {
    pub id: &'static str,
    pub category: Category,
    pub recognizer: Recognizer,
    pub base_score: f64,
    pub context: ContextRequirement,
    pub disposition: Disposition,
    pub message: &'static str,
    pub suggestion: Option<&'static str>,
    /// Cheap prefilter; a line containing none of these cannot match.
    /// Empty means always try the recognizer.
    pub keywords: &'static [&'static str],
}

impl Rule {
    pub fn is_exempt(&self) -> bool {
        self.disposition == Disposition::Exempt
    }

    /// Whether the keyword prefilter lets this line through
    pub fn could_match(&self, line: &str) -> bool {
        self.keywords.is_empty()
            || self
                .keywords
                .iter()
                .any(|kw| memmem::find(line.as_bytes(), kw.as_bytes()).is_some())
    }

    pub fn find_matches(&self, line: &str) -> Vec<RuleMatch> {
        if !self.could_match(line) {
            return Vec::new();
        }
        self.recognizer.find(line)
    }
}

/// Immutable registry of rules, shared read-only across scans
#[derive(Debug, Clone)]
pub struct PatternCatalog {
    rules: Vec<Rule>,
}

impl PatternCatalog {
    pub fn new(rules: Vec<Rule>) -> Self {
        Self { rules }
    }

    /// The process-wide built-in catalog
    pub fn builtin() -> &'static PatternCatalog {
        static BUILTIN: OnceLock<PatternCatalog> = OnceLock::new();
        BUILTIN.get_or_init(|| PatternCatalog::new(builtin_rules()))
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn get(&self, id: &str) -> Option<&Rule> {
        self.rules.iter().find(|r| r.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    /// The rule scoring loop nesting, if the catalog has one
    pub fn loop_rule(&self) -> Option<&Rule> {
        self.rules
            .iter()
            .find(|r| matches!(r.recognizer, Recognizer::LoopKeyword))
    }
}

fn pattern(re: &str, column_group: usize, identifier_group: Option<usize>) -> Recognizer {
    Recognizer::Pattern {
        regex: Regex::new(re).expect("valid regex"),
        column_group,
        identifier_group,
    }
}

fn builtin_rules() -> Vec<Rule> {
    use Category::*;
    use ContextRequirement as Ctx;

    vec![
        Rule {
            id: "raw-new",
            category: MemoryManagement,
            recognizer: Recognizer::NewExpression { array: false },
            base_score: 8.0,
            context: Ctx::None,
            disposition: Disposition::Report,
            message: "Raw `new` allocation; ownership must be released by hand",
            suggestion: Some("Use std::make_unique or std::make_shared instead"),
            keywords: &["new"],
        },
        Rule {
            id: "raw-array-new",
            category: MemoryManagement,
            recognizer: Recognizer::NewExpression { array: true },
            base_score: 9.0,
            context: Ctx::None,
            disposition: Disposition::Report,
            message: "Raw array `new[]` allocation",
            suggestion: Some("Use std::vector or std::make_unique<T[]> instead"),
            keywords: &["new"],
        },
        Rule {
            id: "raw-delete",
            category: MemoryManagement,
            recognizer: Recognizer::DeleteExpression { array: false },
            base_score: 8.0,
            context: Ctx::None,
            disposition: Disposition::Report,
            message: "Manual `delete`",
            suggestion: Some("Let a smart pointer own the object"),
            keywords: &["delete"],
        },
        Rule {
            id: "raw-array-delete",
            category: MemoryManagement,
            recognizer: Recognizer::DeleteExpression { array: true },
            base_score: 8.0,
            context: Ctx::None,
            disposition: Disposition::Report,
            message: "Manual `delete[]`",
            suggestion: Some("Use std::vector or std::unique_ptr<T[]>"),
            keywords: &["delete"],
        },
        Rule {
            id: "c-malloc",
            category: MemoryManagement,
            recognizer: pattern(
                r"(?:^|[^\w.>])((?:std::)?(?:malloc|calloc|realloc))\s*\(",
                1,
                None,
            ),
            base_score: 9.0,
            context: Ctx::None,
            disposition: Disposition::Report,
            message: "C-style heap allocation",
            suggestion: Some("Use a standard container or std::make_unique"),
            keywords: &["alloc"],
        },
        Rule {
            id: "c-free",
            category: MemoryManagement,
            recognizer: pattern(r"(?:^|[^\w.>])((?:std::)?free)\s*\(", 1, None),
            base_score: 7.0,
            context: Ctx::None,
            disposition: Disposition::Report,
            message: "C-style `free`",
            suggestion: Some("Replace manual allocation with RAII types"),
            keywords: &["free"],
        },
        Rule {
            id: "smart-pointer-factory",
            category: MemoryManagement,
            recognizer: pattern(
                r"\b(?:std::)?(?:make_unique|make_shared|allocate_shared)\b|\b(?:std::)?(?:unique_ptr|shared_ptr)\s*<[^;]*?>\s*(?:[A-Za-z_]\w*\s*)?[({]\s*new\b|\.\s*reset\s*\(\s*new\b",
                0,
                None,
            ),
            base_score: 0.0,
            context: Ctx::None,
            disposition: Disposition::Exempt,
            message: "Smart pointer construction",
            suggestion: None,
            keywords: &["make_", "_ptr", "reset"],
        },
        Rule {
            id: "sequential-list",
            category: ContainerUsage,
            recognizer: pattern(r"\b(?:std::)?list\s*<", 0, None),
            base_score: 5.0,
            context: Ctx::None,
            disposition: Disposition::Report,
            message: "std::list has poor cache locality",
            suggestion: Some("Prefer std::vector or std::deque"),
            keywords: &["list"],
        },
        Rule {
            id: "ordered-map",
            category: ContainerUsage,
            recognizer: pattern(r"\b(?:std::)?(?:multi)?map\s*<", 0, None),
            base_score: 4.0,
            context: Ctx::None,
            disposition: Disposition::Report,
            message: "Ordered map pays for tree rebalancing on every insert",
            suggestion: Some("Use std::unordered_map when ordering is not needed"),
            keywords: &["map"],
        },
        Rule {
            id: "unordered-map",
            category: ContainerUsage,
            recognizer: pattern(r"\b(?:std::)?unordered_(?:multi)?map\s*<", 0, None),
            base_score: 0.0,
            context: Ctx::None,
            disposition: Disposition::Exempt,
            message: "Hash map",
            suggestion: None,
            keywords: &["unordered_"],
        },
        Rule {
            id: "append-without-reserve",
            category: ContainerUsage,
            recognizer: pattern(
                r"([A-Za-z_]\w*)\s*(?:\.|->)\s*(?:push_back|emplace_back)\s*\(",
                1,
                Some(1),
            ),
            base_score: 3.0,
            context: Ctx::NoPriorReserve,
            disposition: Disposition::Report,
            message: "Append without a prior reserve may reallocate repeatedly",
            suggestion: Some("Call reserve() with the expected size first"),
            keywords: &["_back"],
        },
        Rule {
            id: "string-append",
            category: StringOperation,
            recognizer: Recognizer::StringAppend,
            base_score: 4.0,
            context: Ctx::InsideLoop,
            disposition: Disposition::Report,
            message: "String concatenation may reallocate",
            suggestion: Some("Reserve the final size or build with std::ostringstream"),
            keywords: &["+"],
        },
        Rule {
            id: "string-compare",
            category: StringOperation,
            recognizer: pattern(r"([A-Za-z_]\w*)\s*(?:\.|->)\s*compare\s*\(", 1, Some(1)),
            base_score: 2.0,
            context: Ctx::None,
            disposition: Disposition::Report,
            message: "compare() where an equality check would do",
            suggestion: Some("Use == or != for equality"),
            keywords: &["compare"],
        },
        Rule {
            id: "string-from-literal",
            category: StringOperation,
            recognizer: pattern(
                r#"\b((?:std::)?string)\s+([A-Za-z_]\w*)\s*(?:=\s*"|\(\s*"|\{\s*")"#,
                1,
                Some(2),
            ),
            base_score: 1.0,
            context: Ctx::None,
            disposition: Disposition::Report,
            message: "std::string built from a literal allocates at runtime",
            suggestion: Some("Use std::string_view or a constexpr literal when read-only"),
            keywords: &["string"],
        },
        Rule {
            id: "string-by-value-param",
            category: StringOperation,
            recognizer: pattern(
                r"[(,]\s*(?:const\s+)?((?:std::)?string)\s+([A-Za-z_]\w*)\s*[,)]",
                1,
                Some(2),
            ),
            base_score: 3.0,
            context: Ctx::None,
            disposition: Disposition::Report,
            message: "std::string parameter passed by value is copied on every call",
            suggestion: Some("Take const std::string& or std::string_view"),
            keywords: &["string"],
        },
        Rule {
            id: LOOP_RULE_ID,
            category: LoopComplexity,
            recognizer: Recognizer::LoopKeyword,
            base_score: 3.0,
            context: Ctx::NestingDepth,
            disposition: Disposition::Report,
            message: "Loop nested {depth} deep",
            suggestion: Some("Flatten the iteration or hoist invariant work out of inner loops"),
            keywords: &[],
        },
    ]
}

static NEW_EXPR: OnceLock<Regex> = OnceLock::new();
static DELETE_EXPR: OnceLock<Regex> = OnceLock::new();
static APPEND_LITERAL: OnceLock<Regex> = OnceLock::new();
static APPEND_IDENT: OnceLock<Regex> = OnceLock::new();
static SELF_CONCAT: OnceLock<Regex> = OnceLock::new();
static DECLARATION: OnceLock<Regex> = OnceLock::new();
static MEMBER_CALL: OnceLock<Regex> = OnceLock::new();

fn new_expr() -> &'static Regex {
    NEW_EXPR.get_or_init(|| {
        // optional placement args, then the type name; or a parenthesized type
        Regex::new(r"\bnew\b\s*(?:(?:\([^)]*\)\s*)?[A-Za-z_][\w:]*|\([^)]*\))")
            .expect("valid regex")
    })
}

fn delete_expr() -> &'static Regex {
    DELETE_EXPR
        .get_or_init(|| Regex::new(r"\bdelete\b\s*(\[\s*\])?\s*[A-Za-z_(*:]").expect("valid regex"))
}

fn append_literal() -> &'static Regex {
    APPEND_LITERAL
        .get_or_init(|| Regex::new(r#"\b([A-Za-z_]\w*)\s*\+=\s*["']"#).expect("valid regex"))
}

fn append_ident() -> &'static Regex {
    APPEND_IDENT.get_or_init(|| {
        Regex::new(r"\b([A-Za-z_]\w*)\s*\+=\s*[A-Za-z_]").expect("valid regex")
    })
}

fn self_concat() -> &'static Regex {
    SELF_CONCAT.get_or_init(|| {
        Regex::new(r#"\b([A-Za-z_]\w*)\s*=\s*([A-Za-z_]\w*)\s*\+\s*(")?"#).expect("valid regex")
    })
}

fn declaration() -> &'static Regex {
    DECLARATION.get_or_init(|| {
        Regex::new(
            r"\b(?:std::)?(vector|deque|basic_string|string|wstring|u16string|u32string|list|multimap|map)\b",
        )
        .expect("valid regex")
    })
}

fn member_call() -> &'static Regex {
    MEMBER_CALL.get_or_init(|| {
        Regex::new(r"\b([A-Za-z_]\w*)\s*(?:\.|->)\s*([A-Za-z_]\w*)\s*\(").expect("valid regex")
    })
}

/// `operator new` / `operator delete` declare allocation functions
fn preceded_by_operator(line: &str, at: usize) -> bool {
    line[..at].trim_end().ends_with("operator")
}

/// Skip a balanced `<...>` starting at `pos` (which must be `<`).
/// Returns the offset just past the matching `>`, or `None` if unbalanced.
fn skip_angle_brackets(bytes: &[u8], pos: usize) -> Option<usize> {
    let mut depth = 0usize;
    for (i, &b) in bytes.iter().enumerate().skip(pos) {
        match b {
            b'<' => depth += 1,
            b'>' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i + 1);
                }
            }
            b';' | b'{' | b'}' => return None,
            _ => {}
        }
    }
    None
}

fn skip_whitespace(bytes: &[u8], mut pos: usize) -> usize {
    while pos < bytes.len() && bytes[pos].is_ascii_whitespace() {
        pos += 1;
    }
    pos
}

/// Every `new` expression on the line, with whether it allocates an array
fn find_new_expressions(line: &str) -> Vec<(RuleMatch, bool)> {
    let bytes = line.as_bytes();
    new_expr()
        .find_iter(line)
        .filter(|m| !preceded_by_operator(line, m.start()))
        .map(|m| {
            let mut pos = skip_whitespace(bytes, m.end());
            if bytes.get(pos) == Some(&b'<') {
                if let Some(after) = skip_angle_brackets(bytes, pos) {
                    pos = skip_whitespace(bytes, after);
                }
            }
            let array = bytes.get(pos) == Some(&b'[');
            let end = if array { pos + 1 } else { m.end() };
            (RuleMatch::span(m.start(), end), array)
        })
        .collect()
}

fn find_delete_expressions(line: &str) -> Vec<(RuleMatch, bool)> {
    delete_expr()
        .captures_iter(line)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            if preceded_by_operator(line, whole.start()) {
                return None;
            }
            let array = caps.get(1).is_some();
            Some((RuleMatch::span(whole.start(), whole.end()), array))
        })
        .collect()
}

fn find_string_appends(line: &str) -> Vec<RuleMatch> {
    let mut matches: Vec<RuleMatch> = Vec::new();

    for caps in append_literal().captures_iter(line) {
        if let (Some(whole), Some(ident)) = (caps.get(0), caps.get(1)) {
            matches.push(RuleMatch {
                start: ident.start(),
                end: whole.end(),
                identifier: Some(ident.as_str().to_string()),
                requires: None,
            });
        }
    }

    for caps in append_ident().captures_iter(line) {
        if let (Some(whole), Some(ident)) = (caps.get(0), caps.get(1)) {
            matches.push(RuleMatch {
                start: ident.start(),
                end: whole.end(),
                identifier: Some(ident.as_str().to_string()),
                requires: Some(DeclarationKind::String),
            });
        }
    }

    for caps in self_concat().captures_iter(line) {
        let (Some(whole), Some(target), Some(source)) = (caps.get(0), caps.get(1), caps.get(2))
        else {
            continue;
        };
        if target.as_str() != source.as_str() {
            continue;
        }
        // `s = s + "x"` is a string for sure; `n = n + m` needs a declaration
        let requires = if caps.get(3).is_some() {
            None
        } else {
            Some(DeclarationKind::String)
        };
        matches.push(RuleMatch {
            start: target.start(),
            end: whole.end(),
            identifier: Some(target.as_str().to_string()),
            requires,
        });
    }

    matches.sort_by_key(|m| m.start);
    matches
}

/// A declaration found on one line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeclaredName {
    pub identifier: String,
    pub kind: DeclarationKind,
    pub column: usize,
}

fn declaration_kind(type_name: &str) -> DeclarationKind {
    match type_name {
        "vector" => DeclarationKind::DynamicArray,
        "deque" => DeclarationKind::Deque,
        "list" => DeclarationKind::SequentialList,
        "map" | "multimap" => DeclarationKind::OrderedMap,
        _ => DeclarationKind::String,
    }
}

fn is_ident_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_'
}

fn is_ident_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

fn read_identifier(bytes: &[u8], pos: usize) -> Option<(usize, usize)> {
    if !bytes.get(pos).copied().is_some_and(is_ident_start) {
        return None;
    }
    let mut end = pos;
    while end < bytes.len() && is_ident_byte(bytes[end]) {
        end += 1;
    }
    Some((pos, end))
}

/// Container and string declarations on a normalized line, including
/// every name of a declarator list (`std::vector<int> a, b(4);`).
pub fn scan_declarations(line: &str) -> Vec<DeclaredName> {
    let bytes = line.as_bytes();
    let mut found = Vec::new();

    for caps in declaration().captures_iter(line) {
        let (Some(whole), Some(ty)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        // `x.string(` or `ns::list` used as a value
        if whole.start() > 0 && matches!(bytes[whole.start() - 1], b'.' | b'>') {
            continue;
        }
        let kind = declaration_kind(ty.as_str());
        let mut pos = skip_whitespace(bytes, whole.end());
        if bytes.get(pos) == Some(&b'<') {
            match skip_angle_brackets(bytes, pos) {
                Some(after) => pos = after,
                None => continue,
            }
        }

        loop {
            pos = skip_whitespace(bytes, pos);
            while matches!(bytes.get(pos), Some(b'&' | b'*')) {
                pos = skip_whitespace(bytes, pos + 1);
            }
            if line[pos..].starts_with("const ") {
                pos = skip_whitespace(bytes, pos + 5);
            }
            let Some((start, end)) = read_identifier(bytes, pos) else {
                break;
            };
            // a type name starting the next parameter, not a declarator
            let after = skip_whitespace(bytes, end);
            if line[after..].starts_with("::") || bytes.get(after) == Some(&b'<') {
                break;
            }
            found.push(DeclaredName {
                identifier: line[start..end].to_string(),
                kind,
                column: start,
            });
            match skip_initializer(bytes, end) {
                Some(next) => pos = next,
                None => break,
            }
        }
    }

    found.sort_by_key(|d| d.column);
    found
}

/// Skip past a declarator's initializer. Returns the offset after a
/// top-level `,` when another declarator follows.
fn skip_initializer(bytes: &[u8], mut pos: usize) -> Option<usize> {
    let mut depth = 0i32;
    while pos < bytes.len() {
        match bytes[pos] {
            b'(' | b'{' | b'[' => depth += 1,
            b')' | b'}' | b']' => {
                depth -= 1;
                if depth < 0 {
                    return None;
                }
            }
            b',' if depth == 0 => return Some(pos + 1),
            b';' | b':' if depth == 0 => return None,
            _ => {}
        }
        pos += 1;
    }
    None
}

/// A member call `identifier.callee(` / `identifier->callee(`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberCall {
    pub identifier: String,
    pub callee: String,
    pub column: usize,
}

pub fn member_calls(line: &str) -> Vec<MemberCall> {
    if memchr::memchr(b'(', line.as_bytes()).is_none() {
        return Vec::new();
    }
    member_call()
        .captures_iter(line)
        .filter_map(|caps| {
            let ident = caps.get(1)?;
            let callee = caps.get(2)?;
            Some(MemberCall {
                identifier: ident.as_str().to_string(),
                callee: callee.as_str().to_string(),
                column: ident.start(),
            })
        })
        .collect()
}
