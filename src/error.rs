//! Error types for the scanning core

use thiserror::Error;

/// Errors that abort the scan of a single file.
///
/// Malformed C++ (unterminated comments, unbalanced braces) is never an
/// error; the engine recovers and reports a diagnostic finding instead.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScanError {
    #[error("{file}: input is not valid UTF-8 (first invalid byte at offset {valid_up_to})")]
    InvalidUtf8 { file: String, valid_up_to: usize },

    #[error("{file}: internal scanner invariant violated: {detail}")]
    Internal { file: String, detail: String },
}

impl ScanError {
    /// File the error belongs to
    pub fn file(&self) -> &str {
        match self {
            ScanError::InvalidUtf8 { file, .. } | ScanError::Internal { file, .. } => file,
        }
    }
}

pub type ScanResult<T> = Result<T, ScanError>;
