//! # Canonical Document Text
//!
//! `CanonicalText` is the single way the engine decides whether two JSON
//! values are "the same value". Objects compare equal regardless of key
//! order and numbers compare by their JCS (RFC 8785) rendering, so `1` and
//! `1.0` are equal while `"1"` and `1` are not.
//!
//! ## Design
//!
//! Unlike a digest pipeline, configuration documents legitimately hold
//! floating-point values, so nothing is rejected here. The constructor
//! accepts anything `Serialize`; already-parsed trees go through
//! [`CanonicalText::of_value`] to skip the intermediate conversion.

use serde::Serialize;
use serde_json::Value;

use crate::error::CanonicalizationError;

/// JCS-canonical JSON text of a value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CanonicalText(String);

impl CanonicalText {
    /// Canonicalize any serializable value.
    pub fn new(obj: &impl Serialize) -> Result<Self, CanonicalizationError> {
        let value = serde_json::to_value(obj)?;
        Self::of_value(&value)
    }

    /// Canonicalize an already-parsed JSON tree.
    pub fn of_value(value: &Value) -> Result<Self, CanonicalizationError> {
        serde_jcs::to_string(value)
            .map(Self)
            .map_err(|e| CanonicalizationError::Serialization(e.to_string()))
    }

    /// Compare two parsed values by their canonical text.
    ///
    /// Values that cannot be canonicalized fall back to structural equality.
    pub fn same_value(a: &Value, b: &Value) -> bool {
        match (Self::of_value(a), Self::of_value(b)) {
            (Ok(a), Ok(b)) => a == b,
            _ => a == b,
        }
    }

    /// Access the canonical text.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume into the underlying string.
    pub fn into_string(self) -> String {
        self.0
    }
}

impl std::fmt::Display for CanonicalText {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CanonicalText {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
