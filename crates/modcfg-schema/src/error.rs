//! # Validation and Schema Definition Errors
//!
//! Validation results are tree-shaped: combinator and sub-schema failures
//! keep their candidates' errors as children instead of flattening them, so
//! callers can suppress noise before presenting them. [`flatten_errors`]
//! turns a result tree into the path-keyed [`ErrorMap`] shown to editors.
//!
//! ## Flattening rules
//!
//! - A `NotOneOf` error is dropped, together with the child list of the
//!   offending candidate, when there is more than one candidate and one of
//!   them failed only with a single `NullExpected`. That is the nullable
//!   object case, where the real errors live in the other candidate.
//! - `NoAdditionalPropertiesAllowed` on the root `$schema` property is
//!   ignored.

use std::collections::BTreeMap;
use std::fmt;

use modcfg_core::DocumentPath;
use thiserror::Error;

use crate::naming::sentence_name;
use crate::node::PrimitiveType;

/// Path text to messages, as surfaced to an editing UI.
pub type ErrorMap = BTreeMap<String, Vec<String>>;

/// Kind of a single validation failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    StringExpected,
    NumberExpected,
    IntegerExpected,
    BooleanExpected,
    ObjectExpected,
    ArrayExpected,
    NullExpected,
    PropertyRequired,
    PatternMismatch,
    StringTooShort,
    StringTooLong,
    NumberTooSmall,
    NumberTooBig,
    NumberNotMultipleOf,
    TooManyItems,
    TooFewItems,
    ItemsNotUnique,
    TooManyItemsInTuple,
    ArrayItemNotValid,
    AdditionalItemNotValid,
    DateTimeExpected,
    DateExpected,
    TimeExpected,
    UriExpected,
    EmailExpected,
    HostnameExpected,
    IpV4Expected,
    IpV6Expected,
    GuidExpected,
    UuidExpected,
    VersionExpected,
    NotAnyOf,
    NotAllOf,
    NotOneOf,
    ExcludedSchemaValidates,
    NoTypeValidates,
    NotInEnumeration,
    AdditionalPropertiesNotValid,
    NoAdditionalPropertiesAllowed,
    TooManyProperties,
    TooFewProperties,
    /// An environment override was set for a property that already consumed
    /// one for this configuration.
    EnvironmentOverrideReapplied,
    /// The environment variable's text could not be coerced to the
    /// property's type.
    EnvironmentOverrideUnparsable,
    /// A save tried to diverge from a non-overridable environment override.
    EnvironmentOverrideConflict,
}

impl ErrorKind {
    /// Identifier of the kind, as used for message derivation.
    pub fn name(&self) -> &'static str {
        match self {
            Self::StringExpected => "StringExpected",
            Self::NumberExpected => "NumberExpected",
            Self::IntegerExpected => "IntegerExpected",
            Self::BooleanExpected => "BooleanExpected",
            Self::ObjectExpected => "ObjectExpected",
            Self::ArrayExpected => "ArrayExpected",
            Self::NullExpected => "NullExpected",
            Self::PropertyRequired => "PropertyRequired",
            Self::PatternMismatch => "PatternMismatch",
            Self::StringTooShort => "StringTooShort",
            Self::StringTooLong => "StringTooLong",
            Self::NumberTooSmall => "NumberTooSmall",
            Self::NumberTooBig => "NumberTooBig",
            Self::NumberNotMultipleOf => "NumberNotMultipleOf",
            Self::TooManyItems => "TooManyItems",
            Self::TooFewItems => "TooFewItems",
            Self::ItemsNotUnique => "ItemsNotUnique",
            Self::TooManyItemsInTuple => "TooManyItemsInTuple",
            Self::ArrayItemNotValid => "ArrayItemNotValid",
            Self::AdditionalItemNotValid => "AdditionalItemNotValid",
            Self::DateTimeExpected => "DateTimeExpected",
            Self::DateExpected => "DateExpected",
            Self::TimeExpected => "TimeExpected",
            Self::UriExpected => "UriExpected",
            Self::EmailExpected => "EmailExpected",
            Self::HostnameExpected => "HostnameExpected",
            Self::IpV4Expected => "IpV4Expected",
            Self::IpV6Expected => "IpV6Expected",
            Self::GuidExpected => "GuidExpected",
            Self::UuidExpected => "UuidExpected",
            Self::VersionExpected => "VersionExpected",
            Self::NotAnyOf => "NotAnyOf",
            Self::NotAllOf => "NotAllOf",
            Self::NotOneOf => "NotOneOf",
            Self::ExcludedSchemaValidates => "ExcludedSchemaValidates",
            Self::NoTypeValidates => "NoTypeValidates",
            Self::NotInEnumeration => "NotInEnumeration",
            Self::AdditionalPropertiesNotValid => "AdditionalPropertiesNotValid",
            Self::NoAdditionalPropertiesAllowed => "NoAdditionalPropertiesAllowed",
            Self::TooManyProperties => "TooManyProperties",
            Self::TooFewProperties => "TooFewProperties",
            Self::EnvironmentOverrideReapplied => "EnvironmentOverrideReapplied",
            Self::EnvironmentOverrideUnparsable => "EnvironmentOverrideUnparsable",
            Self::EnvironmentOverrideConflict => "EnvironmentOverrideConflict",
        }
    }

    /// The message shown for this kind.
    pub fn message(&self) -> String {
        match self {
            Self::EnvironmentOverrideReapplied => {
                "Unable to load environment variables multiple times for the same configuration."
                    .to_string()
            }
            Self::EnvironmentOverrideUnparsable => "Failed to parse environment variable.".to_string(),
            Self::EnvironmentOverrideConflict => {
                "Unable to set value when an environment variable override is in use.".to_string()
            }
            other => sentence_name(other.name()),
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Nested results carried by aggregate errors.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ChildErrors {
    #[default]
    None,
    /// One error list per candidate sub-schema.
    Schemas(Vec<Vec<ValidationError>>),
    /// One error list per declared primitive type.
    Types(Vec<(PrimitiveType, Vec<ValidationError>)>),
}

/// A single structural validation failure.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationError {
    pub kind: ErrorKind,
    /// Name of the property (or `[n]` item) the error belongs to.
    pub property: Option<String>,
    pub path: DocumentPath,
    pub children: ChildErrors,
}

impl ValidationError {
    pub fn new(kind: ErrorKind, property: Option<&str>, path: &DocumentPath) -> Self {
        Self {
            kind,
            property: property.map(str::to_string),
            path: path.clone(),
            children: ChildErrors::None,
        }
    }

    pub fn with_children(mut self, children: ChildErrors) -> Self {
        self.children = children;
        self
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_root() {
            write!(f, "{}", self.kind.message())
        } else {
            write!(f, "{}: {}", self.path, self.kind.message())
        }
    }
}

// ─── Flattening ──────────────────────────────────────────────────────

/// Every error in the tree that should be presented, depth-first.
pub fn presentable_errors(errors: &[ValidationError]) -> Vec<&ValidationError> {
    let mut out = Vec::new();
    collect(errors, &mut out);
    out
}

fn collect<'a>(errors: &'a [ValidationError], out: &mut Vec<&'a ValidationError>) {
    for error in errors {
        match &error.children {
            ChildErrors::None => out.push(error),
            ChildErrors::Types(per_type) => {
                out.push(error);
                for (_, nested) in per_type {
                    collect(nested, out);
                }
            }
            ChildErrors::Schemas(candidates) => {
                let null_only = candidates.iter().position(|nested| {
                    matches!(nested.as_slice(), [only] if only.kind == ErrorKind::NullExpected)
                });
                let suppress = error.kind == ErrorKind::NotOneOf && candidates.len() > 1;
                match null_only.filter(|_| suppress) {
                    Some(skip) => {
                        for (i, nested) in candidates.iter().enumerate() {
                            if i != skip {
                                collect(nested, out);
                            }
                        }
                    }
                    None => {
                        out.push(error);
                        for nested in candidates {
                            collect(nested, out);
                        }
                    }
                }
            }
        }
    }
}

fn is_root_schema_property(error: &ValidationError) -> bool {
    error.kind == ErrorKind::NoAdditionalPropertiesAllowed
        && error.path.len() == 1
        && error.path.last().and_then(|s| s.name()) == Some("$schema")
}

/// Flatten a result tree into a path-keyed map of messages.
pub fn flatten_errors(errors: &[ValidationError]) -> ErrorMap {
    let mut map = ErrorMap::new();
    for error in presentable_errors(errors) {
        if is_root_schema_property(error) {
            continue;
        }
        map.entry(error.path.to_string())
            .or_default()
            .push(error.kind.message());
    }
    map
}

// ─── Schema definition errors ────────────────────────────────────────

/// Fatal problems found while generating a schema.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaDefinitionError {
    /// A map key type that cannot round-trip through text.
    #[error("type \"{key_type}\" is not serializable to text and therefore cannot be used as a key in a map inside configuration \"{owner}\" (property \"{property}\")")]
    UnusableMapKey {
        owner: String,
        property: String,
        key_type: String,
    },

    /// A keyed-section list layout over non-object items.
    #[error("{layout} lists are not supported for non-class list items (property \"{property}\" of \"{owner}\")")]
    ListItemsNotSections {
        owner: String,
        property: String,
        layout: &'static str,
    },

    /// A keyed-section list layout without a primary key.
    #[error("{layout} lists must have a primary key set (property \"{property}\" of \"{owner}\")")]
    ListWithoutPrimaryKey {
        owner: String,
        property: String,
        layout: &'static str,
    },

    /// A checkbox list over non-enum items.
    #[error("checkbox lists are not supported for non-enum list items (property \"{property}\" of \"{owner}\")")]
    CheckboxListNotEnum { owner: String, property: String },

    /// A root type that is not an object.
    #[error("configuration type \"{type_name}\" must be an object")]
    RootNotObject { type_name: String },

    /// A reference that points at no definition.
    #[error("unresolvable schema reference \"{reference}\"")]
    UnresolvableReference { reference: String },
}
