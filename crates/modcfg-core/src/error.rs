//! # Error Types
//!
//! Errors produced by the foundational types. Both enums use `thiserror`
//! and carry enough context to point at the offending input.

use thiserror::Error;

/// Error during canonical text production.
#[derive(Error, Debug)]
pub enum CanonicalizationError {
    /// The value could not be turned into a JSON tree.
    #[error("value is not representable as JSON: {0}")]
    NotJson(#[from] serde_json::Error),

    /// JCS serialization of an already-parsed tree failed.
    #[error("canonical serialization failed: {0}")]
    Serialization(String),
}

/// Error raised when a textual document path cannot be parsed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid document path {path:?} at offset {offset}: {reason}")]
pub struct PathParseError {
    /// The full text that was being parsed.
    pub path: String,
    /// Byte offset of the first offending character.
    pub offset: usize,
    /// What the parser expected.
    pub reason: &'static str,
}

impl PathParseError {
    pub(crate) fn new(path: &str, offset: usize, reason: &'static str) -> Self {
        Self {
            path: path.to_string(),
            offset,
            reason,
        }
    }
}
