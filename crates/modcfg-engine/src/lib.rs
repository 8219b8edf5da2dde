//! # modcfg-engine: Configuration Engine
//!
//! Manages the configurations of a modular host: registration, loading,
//! saving, validation and custom actions, with environment overrides and
//! restart tracking layered over schema validation.
//!
//! ## Architecture
//!
//! - **Contracts** (`configuration`): what a module supplies, a
//!   [`Configuration`] type and an optional [`ConfigurationDefinition`].
//! - **Registry** (`registry`): [`ConfigurationInfo`] per type and erased
//!   handlers for the id-based surface.
//! - **Extended validation** (`extended`): binds environment variables,
//!   reconciles overrides on save and tracks restart-required members.
//! - **Persistence** (`document`, `paths`): storage paths, `$schema`
//!   injection and sidecar schema files.
//! - **Service** (`service`): [`ConfigurationService`], the entry point.
//!   [`ConfigurationProvider`] is a typed handle onto it.
//!
//! ## Crate Policy
//!
//! - Every fallible operation returns [`EngineError`]. Validation failures
//!   carry the full path-keyed error map.
//! - Locks are never held across an await point.

pub mod actions;
pub mod configuration;
pub mod document;
pub mod environment;
pub mod error;
pub mod events;
pub mod extended;
pub mod paths;
pub mod provider;
pub mod records;
pub mod registry;
pub mod service;

pub use configuration::{
    ActionResult, Configuration, ConfigurationDefinition, DefaultDefinition, MigrationError,
    SaveLocation,
};
pub use environment::{EnvironmentSource, ProcessEnvironment, StaticEnvironment};
pub use error::{ConfigurationValidationError, CustomActionError, EngineError};
pub use events::ConfigurationEvent;
pub use extended::ValidationMode;
pub use paths::EnginePaths;
pub use provider::{ConfigurationProvider, SavedEvents};
pub use registry::ConfigurationInfo;
pub use service::ConfigurationService;
