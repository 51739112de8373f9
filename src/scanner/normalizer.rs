//! Comment and literal neutralization for C++ source
//!
//! Every physical line is turned into a [`SourceLine`] whose normalized text
//! has the same byte length as the raw text. Comment bytes and the contents of
//! string/char literals are replaced with spaces; quote characters stay in
//! place so rules can still see that a literal is there.
//!
//! The normalizer is a small state machine carried across lines, so block
//! comments and raw strings that span several lines are handled. If the input
//! ends while a comment or literal is still open, the rest of the file stays
//! masked and an [`UnterminatedRegion`] is reported.

use memchr::memmem;
use serde::{Deserialize, Serialize};

/// One physical line of source, before and after normalization
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLine {
    /// 1-based line number
    pub number: u32,
    pub raw: String,
    pub normalized: String,
}

/// Kind of region left open at end of input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegionKind {
    BlockComment,
    StringLiteral,
    CharLiteral,
    RawStringLiteral,
}

impl std::fmt::Display for RegionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RegionKind::BlockComment => write!(f, "block comment"),
            RegionKind::StringLiteral => write!(f, "string literal"),
            RegionKind::CharLiteral => write!(f, "character literal"),
            RegionKind::RawStringLiteral => write!(f, "raw string literal"),
        }
    }
}

/// A comment or literal still open when the input ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnterminatedRegion {
    pub kind: RegionKind,
    /// Line on which the region was opened
    pub opened_at: u32,
}

/// Output of [`normalize`]
#[derive(Debug, Clone, Default)]
pub struct NormalizedSource {
    pub lines: Vec<SourceLine>,
    pub unterminated: Option<UnterminatedRegion>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Mode {
    Normal,
    /// `continued` is set when the comment line ends in a backslash
    LineComment { continued: bool },
    BlockComment,
    String { escaped: bool },
    Char { escaped: bool },
    /// `closing` is the full terminator, e.g. `)xyz"`
    RawString { closing: Vec<u8> },
}

/// Stateful line-by-line normalizer for a single file
#[derive(Debug, Clone)]
pub struct SourceNormalizer {
    mode: Mode,
    opened_at: u32,
}

impl Default for SourceNormalizer {
    fn default() -> Self {
        Self::new()
    }
}

impl SourceNormalizer {
    pub fn new() -> Self {
        Self {
            mode: Mode::Normal,
            opened_at: 0,
        }
    }

    /// Normalize the next physical line. `number` is the 1-based line number
    /// and is only used to remember where an open region started.
    pub fn normalize_line(&mut self, number: u32, line: &str) -> String {
        let bytes = line.as_bytes();
        let len = bytes.len();
        let mut out = bytes.to_vec();
        let mut i = 0;

        if let Mode::LineComment { continued } = self.mode {
            if continued {
                mask_range(&mut out, 0, len);
                self.mode = Mode::LineComment {
                    continued: ends_with_backslash(bytes),
                };
                self.settle_line_comment();
                return into_string(out, line);
            }
            self.mode = Mode::Normal;
        }

        while i < len {
            match &mut self.mode {
                Mode::Normal => {
                    let b = bytes[i];
                    if b == b'/' && i + 1 < len && bytes[i + 1] == b'/' {
                        mask_range(&mut out, i, len);
                        self.mode = Mode::LineComment {
                            continued: ends_with_backslash(bytes),
                        };
                        break;
                    }
                    if b == b'/' && i + 1 < len && bytes[i + 1] == b'*' {
                        mask_range(&mut out, i, i + 2);
                        self.open(Mode::BlockComment, number);
                        i += 2;
                        continue;
                    }
                    if b == b'"' {
                        if let Some(closing) = raw_string_closing(bytes, i) {
                            self.open(Mode::RawString { closing }, number);
                        } else {
                            self.open(Mode::String { escaped: false }, number);
                        }
                        i += 1;
                        continue;
                    }
                    if b == b'\'' && !is_digit_separator(bytes, i) {
                        self.open(Mode::Char { escaped: false }, number);
                        i += 1;
                        continue;
                    }
                    i += 1;
                }

                Mode::LineComment { .. } => break,

                Mode::BlockComment => {
                    if bytes[i] == b'*' && i + 1 < len && bytes[i + 1] == b'/' {
                        mask_range(&mut out, i, i + 2);
                        self.mode = Mode::Normal;
                        i += 2;
                        continue;
                    }
                    out[i] = b' ';
                    i += 1;
                }

                Mode::String { escaped } => {
                    if step_literal(escaped, bytes[i], b'"', &mut out[i]) {
                        self.mode = Mode::Normal;
                    }
                    i += 1;
                }

                Mode::Char { escaped } => {
                    if step_literal(escaped, bytes[i], b'\'', &mut out[i]) {
                        self.mode = Mode::Normal;
                    }
                    i += 1;
                }

                Mode::RawString { closing } => {
                    match memmem::find(&bytes[i..], closing.as_slice()) {
                        Some(offset) => {
                            // keep the closing quote visible
                            let quote_at = i + offset + closing.len() - 1;
                            mask_range(&mut out, i, quote_at);
                            i = quote_at + 1;
                            self.mode = Mode::Normal;
                        }
                        None => {
                            mask_range(&mut out, i, len);
                            i = len;
                        }
                    }
                }
            }
        }

        // A backslash-newline inside a literal is a continuation; the escape
        // does not carry over to the next line's first byte.
        match &mut self.mode {
            Mode::String { escaped } | Mode::Char { escaped } => *escaped = false,
            _ => {}
        }
        self.settle_line_comment();

        into_string(out, line)
    }

    /// Consume the normalizer, reporting any region still open
    pub fn finish(self) -> Option<UnterminatedRegion> {
        let kind = match self.mode {
            Mode::Normal | Mode::LineComment { .. } => return None,
            Mode::BlockComment => RegionKind::BlockComment,
            Mode::String { .. } => RegionKind::StringLiteral,
            Mode::Char { .. } => RegionKind::CharLiteral,
            Mode::RawString { .. } => RegionKind::RawStringLiteral,
        };
        Some(UnterminatedRegion {
            kind,
            opened_at: self.opened_at,
        })
    }

    fn open(&mut self, mode: Mode, line: u32) {
        self.mode = mode;
        self.opened_at = line;
    }

    fn settle_line_comment(&mut self) {
        if self.mode == (Mode::LineComment { continued: false }) {
            self.mode = Mode::Normal;
        }
    }
}

/// Normalize a whole file
pub fn normalize(text: &str) -> NormalizedSource {
    let mut normalizer = SourceNormalizer::new();
    let lines = text
        .lines()
        .enumerate()
        .map(|(idx, raw)| {
            let number = idx as u32 + 1;
            SourceLine {
                number,
                normalized: normalizer.normalize_line(number, raw),
                raw: raw.to_string(),
            }
        })
        .collect();

    NormalizedSource {
        lines,
        unterminated: normalizer.finish(),
    }
}

/// Advance one byte inside a string or char literal. Returns true when the
/// byte is the closing quote, which is left unmasked.
fn step_literal(escaped: &mut bool, byte: u8, quote: u8, slot: &mut u8) -> bool {
    if *escaped {
        *escaped = false;
    } else if byte == b'\\' {
        *escaped = true;
    } else if byte == quote {
        return true;
    }
    *slot = b' ';
    false
}

fn mask_range(out: &mut [u8], start: usize, end: usize) {
    let end = end.min(out.len());
    if start < end {
        out[start..end].fill(b' ');
    }
}

fn into_string(out: Vec<u8>, original: &str) -> String {
    // Only whole ASCII-delimited spans are masked, so this cannot fail in
    // practice; keep the raw line rather than panic.
    String::from_utf8(out).unwrap_or_else(|_| original.to_string())
}

fn ends_with_backslash(bytes: &[u8]) -> bool {
    bytes.last() == Some(&b'\\')
}

/// `1'000'000`: a quote inside a token that starts with a digit
fn is_digit_separator(bytes: &[u8], quote: usize) -> bool {
    let mut start = quote;
    while start > 0 {
        let b = bytes[start - 1];
        if b.is_ascii_alphanumeric() || b == b'_' || b == b'\'' || b == b'.' {
            start -= 1;
        } else {
            break;
        }
    }
    start < quote
        && bytes[start].is_ascii_digit()
        && bytes.get(quote + 1).is_some_and(|b| b.is_ascii_hexdigit())
}

/// If the quote at `quote` opens a raw string (`R"delim(`, optionally with a
/// `u8`/`u`/`U`/`L` prefix), return its closing sequence `)delim"`.
fn raw_string_closing(bytes: &[u8], quote: usize) -> Option<Vec<u8>> {
    if quote == 0 || bytes[quote - 1] != b'R' {
        return None;
    }
    let mut start = quote - 1;
    while start > 0 && (bytes[start - 1].is_ascii_alphanumeric() || bytes[start - 1] == b'_') {
        start -= 1;
    }
    let prefix = &bytes[start..quote - 1];
    if !matches!(prefix, b"" | b"u8" | b"u" | b"U" | b"L") {
        return None;
    }

    const MAX_DELIMITER: usize = 16;
    let rest = &bytes[quote + 1..];
    let open = rest.iter().take(MAX_DELIMITER + 1).position(|&b| b == b'(')?;
    let delimiter = &rest[..open];
    if delimiter
        .iter()
        .any(|&b| b.is_ascii_whitespace() || matches!(b, b')' | b'\\' | b'"'))
    {
        return None;
    }

    let mut closing = Vec::with_capacity(delimiter.len() + 2);
    closing.push(b')');
    closing.extend_from_slice(delimiter);
    closing.push(b'"');
    Some(closing)
}
