//! Loop and lexical-scope tracking
//!
//! The tracker is fed structural tokens (braces, parens, semicolons, words)
//! from normalized text in document order. It keeps:
//!
//! - a stack of open [`LoopScope`]s, so the engine can ask how deeply the
//!   current position is nested in loops;
//! - a stack of brace-delimited blocks, each remembering the container
//!   declarations and `reserve` calls seen in it, for lookback rules.
//!
//! Loop bodies come in several shapes and each closes differently:
//!
//! ```text
//! for (...) { ... }        braced: closes on the `}` matching its `{`
//! for (...) x += 1;        statement: closes on the `;` at its own depth
//! for (...) if (c) {...}   statement: closes after the `}` unless `else` follows
//! for (...) for (...) x;   chained: the outer loop closes with the inner one
//! do { ... } while (c);    the trailing `while` is not a new loop
//! ```

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

/// A point in the source (1-based line, 0-based byte column)
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct Position {
    pub line: u32,
    pub column: u32,
}

impl Position {
    pub fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoopKind {
    For,
    While,
    Do,
}

impl LoopKind {
    pub fn keyword(&self) -> &'static str {
        match self {
            LoopKind::For => "for",
            LoopKind::While => "while",
            LoopKind::Do => "do",
        }
    }
}

/// Where the tracker is in recognizing a loop's body
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Body {
    /// Inside `for`/`while` before the header's closing paren.
    /// `base` is the paren depth outside the header once `(` was seen.
    Header { base: Option<u32> },
    /// Header done; the next token decides the body shape
    Pending,
    Braced,
    Statement,
    /// Statement body ended on a `}` at `line`; closes unless `else` follows
    AwaitElse { line: u32 },
    /// Body is exactly the next loop
    Chained,
}

/// One open (or just closed) loop
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoopScope {
    pub kind: LoopKind,
    pub opened: Position,
    pub closed_at: Option<u32>,
    /// Nesting depth at entry, 1 = outermost
    pub depth: u32,
    /// Brace depth when the loop keyword was seen
    pub brace_depth: u32,
    paren_depth: u32,
    body: Body,
    /// Set when the loop was still open at end of input
    pub forced: bool,
}

/// Structural token kinds the tracker cares about
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token {
    OpenBrace,
    CloseBrace,
    OpenParen,
    CloseParen,
    Semicolon,
    Else,
    /// Any other identifier, literal or operator
    Other,
}

/// What a recorded declaration declares
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeclarationKind {
    DynamicArray,
    String,
    SequentialList,
    Deque,
    OrderedMap,
}

impl DeclarationKind {
    /// Whether the type has a `reserve()` member
    pub fn has_reserve(&self) -> bool {
        matches!(self, DeclarationKind::DynamicArray | DeclarationKind::String)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Declaration {
    pub kind: DeclarationKind,
    pub at: Position,
}

/// Calls that pre-size a container
const RESERVATION_CALLEES: &[&str] = &["reserve"];

#[derive(Debug, Clone, Default)]
struct Block {
    opened_at: Position,
    declarations: FxHashMap<String, Declaration>,
    /// First reservation call per identifier
    reserves: FxHashMap<String, Position>,
}

/// Structural problems found once the input is exhausted
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScopeImbalance {
    /// Loops force-closed at end of input, outermost first
    pub unclosed_loops: Vec<LoopScope>,
    /// Opening position of the outermost block never closed
    pub unclosed_block: Option<Position>,
    /// Closing braces with no matching opener
    pub unmatched_closes: Vec<Position>,
}

impl ScopeImbalance {
    pub fn is_empty(&self) -> bool {
        self.unclosed_loops.is_empty()
            && self.unclosed_block.is_none()
            && self.unmatched_closes.is_empty()
    }
}

/// Per-file scope state. Not shared between scans.
#[derive(Debug, Clone)]
pub struct ScopeTracker {
    loops: Vec<LoopScope>,
    /// `blocks[0]` is file scope and is never popped
    blocks: Vec<Block>,
    paren_depth: u32,
    /// Declarations seen inside parens (parameters, loop headers), waiting
    /// for the block they belong to
    pending: Vec<(String, Declaration)>,
    closed: Vec<LoopScope>,
    unmatched_closes: Vec<Position>,
    awaiting_do_tail: bool,
}

impl Default for ScopeTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl ScopeTracker {
    pub fn new() -> Self {
        Self {
            loops: Vec::new(),
            blocks: vec![Block::default()],
            paren_depth: 0,
            pending: Vec::new(),
            closed: Vec::new(),
            unmatched_closes: Vec::new(),
            awaiting_do_tail: false,
        }
    }

    /// Push a loop opened by the keyword at `at`; returns its nesting depth
    pub fn enter_loop(&mut self, kind: LoopKind, at: Position) -> u32 {
        self.awaiting_do_tail = false;
        self.resolve_await_else(Token::Other);
        if let Some(parent) = self.loops.last_mut() {
            if parent.body == Body::Pending {
                parent.body = Body::Chained;
            }
        }

        let depth = self.loops.len() as u32 + 1;
        self.loops.push(LoopScope {
            kind,
            opened: at,
            closed_at: None,
            depth,
            brace_depth: self.brace_depth(),
            paren_depth: self.paren_depth,
            body: match kind {
                LoopKind::Do => Body::Pending,
                LoopKind::For | LoopKind::While => Body::Header { base: None },
            },
            forced: false,
        });
        depth
    }

    /// Pop the innermost loop, marking it closed on `line`
    pub fn exit_loop(&mut self, line: u32) -> Option<LoopScope> {
        let mut scope = self.loops.pop()?;
        scope.closed_at = Some(line);
        if scope.kind == LoopKind::Do {
            self.awaiting_do_tail = true;
        }
        self.closed.push(scope.clone());
        Some(scope)
    }

    /// Number of currently open loops
    pub fn current_loop_depth(&self) -> u32 {
        self.loops.len() as u32
    }

    pub fn brace_depth(&self) -> u32 {
        (self.blocks.len() - 1) as u32
    }

    /// True exactly once after a `do` loop body closed, so the engine can
    /// treat the following `while` as the do-while tail.
    pub fn take_do_tail(&mut self) -> bool {
        std::mem::take(&mut self.awaiting_do_tail)
    }

    /// Loops closed since the last call, in closing order
    pub fn drain_closed(&mut self) -> Vec<LoopScope> {
        std::mem::take(&mut self.closed)
    }

    /// Feed one structural token
    pub fn on_token(&mut self, token: Token, at: Position) {
        self.awaiting_do_tail = false;
        self.resolve_await_else(token);

        if let Some(top) = self.loops.last_mut() {
            match top.body {
                Body::Header { base: None } if token != Token::OpenParen => {
                    // malformed header such as `while x`; treat as headerless
                    top.body = Body::Pending;
                }
                Body::Pending => {
                    top.body = match token {
                        Token::OpenBrace => Body::Braced,
                        Token::Semicolon => Body::Pending,
                        _ => Body::Statement,
                    };
                }
                _ => {}
            }
        }

        match token {
            Token::OpenBrace => {
                let mut block = Block {
                    opened_at: at,
                    ..Block::default()
                };
                if self.paren_depth == 0 {
                    block.declarations.extend(self.pending.drain(..));
                }
                self.blocks.push(block);
            }
            Token::CloseBrace => self.close_brace(at),
            Token::OpenParen => {
                if let Some(top) = self.loops.last_mut() {
                    if top.body == (Body::Header { base: None }) {
                        top.body = Body::Header {
                            base: Some(self.paren_depth),
                        };
                    }
                }
                self.paren_depth += 1;
            }
            Token::CloseParen => {
                self.paren_depth = self.paren_depth.saturating_sub(1);
                if let Some(top) = self.loops.last_mut() {
                    if top.body == (Body::Header { base: Some(self.paren_depth) }) {
                        top.body = Body::Pending;
                    }
                }
            }
            Token::Semicolon => {
                if self.paren_depth == 0 {
                    // a prototype or a braceless body: the parameters go nowhere
                    self.pending.clear();
                }
                self.end_statement(at.line);
            }
            Token::Else | Token::Other => {}
        }
    }

    /// Record a container/string declaration in the innermost block. Inside
    /// parens it is held for the next block instead, so function parameters
    /// scope to the function body.
    pub fn record_declaration(&mut self, identifier: &str, kind: DeclarationKind, at: Position) {
        if self.paren_depth > 0 {
            self.pending
                .push((identifier.to_string(), Declaration { kind, at }));
            return;
        }
        self.innermost_block()
            .declarations
            .insert(identifier.to_string(), Declaration { kind, at });
    }

    /// Record a member call `identifier.callee(...)`. Only reservation calls
    /// are kept, since nothing else is looked back on.
    pub fn record_call(&mut self, identifier: &str, callee: &str, at: Position) {
        if !RESERVATION_CALLEES.contains(&callee) {
            return;
        }
        self.innermost_block()
            .reserves
            .entry(identifier.to_string())
            .or_insert(at);
    }

    /// Whether a reservation call on `identifier` was recorded before `upto`
    /// in the innermost block or any still-open enclosing block. A
    /// declaration of the same name in a nearer block shadows outer reserves.
    pub fn has_prior_reserve(&self, identifier: &str, upto: Position) -> bool {
        for block in self.blocks.iter().rev() {
            if block.reserves.get(identifier).is_some_and(|at| *at < upto) {
                return true;
            }
            if block
                .declarations
                .get(identifier)
                .is_some_and(|decl| decl.at < upto)
            {
                return false;
            }
        }
        false
    }

    /// Nearest visible declaration of `identifier`
    pub fn declaration(&self, identifier: &str) -> Option<Declaration> {
        self.blocks
            .iter()
            .rev()
            .find_map(|block| block.declarations.get(identifier).copied())
    }

    /// Force-close everything still open at end of input
    pub fn finish(mut self, last_line: u32) -> (Vec<LoopScope>, ScopeImbalance) {
        // A statement body waiting on `else` at EOF is simply finished.
        self.resolve_await_else(Token::Other);

        let mut forced = Vec::new();
        while let Some(mut scope) = self.loops.pop() {
            scope.closed_at = Some(last_line);
            scope.forced = true;
            forced.push(scope);
        }
        forced.reverse();

        let unclosed_block = self.blocks.get(1).map(|block| block.opened_at);
        let imbalance = ScopeImbalance {
            unclosed_loops: forced,
            unclosed_block,
            unmatched_closes: std::mem::take(&mut self.unmatched_closes),
        };
        (std::mem::take(&mut self.closed), imbalance)
    }

    fn innermost_block(&mut self) -> &mut Block {
        // blocks[0] always exists
        let last = self.blocks.len() - 1;
        &mut self.blocks[last]
    }

    /// A statement body that ended on `}` stays open only for `else`
    fn resolve_await_else(&mut self, token: Token) {
        let Some(top) = self.loops.last_mut() else {
            return;
        };
        let Body::AwaitElse { line } = top.body else {
            return;
        };
        if token == Token::Else {
            top.body = Body::Statement;
            return;
        }
        let (brace_depth, paren_depth) = (top.brace_depth, top.paren_depth);
        self.exit_loop(line);
        self.close_enclosing_statements(brace_depth, paren_depth, line);
    }

    fn close_brace(&mut self, at: Position) {
        if self.blocks.len() == 1 {
            self.unmatched_closes.push(at);
            return;
        }
        self.blocks.pop();
        let depth = self.brace_depth();

        while let Some(top) = self.loops.last_mut() {
            if top.brace_depth > depth {
                // body never terminated before its enclosing block closed
                self.exit_loop(at.line);
                continue;
            }
            if top.brace_depth < depth || top.paren_depth != self.paren_depth {
                break;
            }
            match top.body {
                Body::Braced | Body::Chained => {
                    self.exit_loop(at.line);
                }
                Body::Statement => {
                    top.body = Body::AwaitElse { line: at.line };
                    break;
                }
                _ => break,
            }
        }
    }

    fn end_statement(&mut self, line: u32) {
        self.close_enclosing_statements(self.brace_depth(), self.paren_depth, line);
    }

    /// Close every statement-bodied or chained loop sitting at exactly this
    /// brace and paren depth; the statement that formed their body is over.
    fn close_enclosing_statements(&mut self, brace_depth: u32, paren_depth: u32, line: u32) {
        while let Some(top) = self.loops.last() {
            let same_level = top.brace_depth == brace_depth && top.paren_depth == paren_depth;
            let ends = matches!(top.body, Body::Statement | Body::Chained | Body::Pending);
            if !(same_level && ends) {
                break;
            }
            self.exit_loop(line);
        }
    }
}
