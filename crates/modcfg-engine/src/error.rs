//! # Engine Error Types
//!
//! Top-level error hierarchy for the configuration engine. Validation
//! failures keep the full path-keyed error map so an editor can show every
//! message next to its field.
//!
//! ## Design
//!
//! - [`EngineError`] is what every public operation returns.
//! - [`ConfigurationValidationError`] carries the operation (`load`, `save`
//!   or `validate`) and the [`ErrorMap`]. Nothing is applied when one is
//!   returned.
//! - [`CustomActionError`] is raised before any handler runs, so a failed
//!   dispatch never mutates the configuration.

use std::path::PathBuf;

use modcfg_core::ConfigurationId;
use modcfg_schema::{ErrorMap, SchemaDefinitionError};
use thiserror::Error;

/// Top-level engine error.
#[derive(Error, Debug)]
pub enum EngineError {
    /// A document failed structural or custom validation.
    #[error(transparent)]
    Validation(#[from] ConfigurationValidationError),

    /// No configuration is registered under the given id or type.
    #[error("unknown configuration: {0}")]
    UnknownConfiguration(String),

    /// A cached or supplied value is not of the registered type.
    #[error("configuration \"{configuration}\" holds {expected}, not the requested type")]
    TypeMismatch {
        configuration: String,
        expected: &'static str,
    },

    /// Filesystem access failed.
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A value could not be converted to or from JSON.
    #[error("serialization of configuration \"{configuration}\" failed: {source}")]
    Serialization {
        configuration: String,
        #[source]
        source: serde_json::Error,
    },

    /// The configuration type has an unrepresentable shape.
    #[error(transparent)]
    Schema(#[from] SchemaDefinitionError),

    /// A declared migration rejected the stored text.
    #[error("migration of configuration \"{configuration}\" failed: {reason}")]
    Migration {
        configuration: String,
        reason: String,
    },

    /// A custom action could not be dispatched.
    #[error(transparent)]
    CustomAction(#[from] CustomActionError),

    /// The host module was already attached.
    #[error("the host module has already been attached")]
    AlreadyInitialized,

    /// The configuration type was registered twice.
    #[error("configuration type {type_name} is already registered")]
    AlreadyRegistered { type_name: &'static str },
}

impl EngineError {
    /// The validation error map, when this is a validation failure.
    pub fn validation_errors(&self) -> Option<&ErrorMap> {
        match self {
            Self::Validation(err) => Some(&err.errors),
            _ => None,
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn serialization(configuration: &str, source: serde_json::Error) -> Self {
        Self::Serialization {
            configuration: configuration.to_string(),
            source,
        }
    }
}

/// A load, save or validate call rejected by validation.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{operation} validation failed for configuration \"{configuration}\" ({} path(s))", errors.len())]
pub struct ConfigurationValidationError {
    /// `load`, `save` or `validate`.
    pub operation: &'static str,
    pub id: ConfigurationId,
    /// Display name of the configuration.
    pub configuration: String,
    pub errors: ErrorMap,
}

/// Failure to resolve a custom action.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CustomActionError {
    /// The path is malformed or does not lead to a schema node.
    #[error("Invalid path \"{path}\"")]
    InvalidPath { path: String },

    /// The node at the path declares no actions.
    #[error("No actions found for path \"{path}\"")]
    NoActions { path: String },

    /// The node declares actions, but not this one.
    #[error("Invalid action \"{action}\" for path \"{path}\"")]
    UnknownAction { path: String, action: String },
}
