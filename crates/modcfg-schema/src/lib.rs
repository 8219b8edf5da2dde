//! # modcfg-schema: Schema Synthesis and Validation
//!
//! Turns configuration types into JSON Schema trees and validates JSON
//! documents against them.
//!
//! ## Architecture
//!
//! - **Reflection** (`reflect`): configuration types implement [`Reflect`]
//!   and describe their members through the [`ClassDef`] / [`EnumDef`]
//!   builders. Nothing is discovered at runtime.
//! - **Generation** (`generate`): [`SchemaGenerator`] walks the shapes and
//!   emits a [`SchemaNode`] tree. Each node carries a
//!   [`BehaviorDescriptor`] under `x-uiDefinition` with presentation,
//!   environment and restart metadata.
//! - **Validation** (`validate`): [`Validator`] evaluates every facet of
//!   every node and returns tree-shaped [`ValidationError`]s. Host-specific
//!   semantics plug in through [`ValidationHook`].
//!
//! ## Crate Policy
//!
//! - Depends only on `modcfg-core` internally.
//! - Schema generation failures are [`SchemaDefinitionError`]s, never
//!   panics.
//! - The validator never mutates the document it checks.

pub mod behavior;
pub mod error;
pub mod format;
pub mod generate;
pub mod naming;
pub mod node;
pub mod reflect;
pub mod validate;

pub use behavior::{
    BehaviorDescriptor, ClassActions, CustomActionDescriptor, ElementType, EnumDefinition,
    PrimaryKey, Theme,
};
pub use error::{
    flatten_errors, ChildErrors, ErrorKind, ErrorMap, SchemaDefinitionError, ValidationError,
};
pub use format::{default_format_validators, FormatValidator};
pub use generate::SchemaGenerator;
pub use naming::{display_name, type_display_name};
pub use node::{PrimitiveType, PropertyMap, SchemaNode, TypeSet, DRAFT_URI};
pub use reflect::{
    ClassDef, CustomAction, EnumDef, ListOptions, PropertyOptions, RecordOptions, Reflect,
    Selectable, TypeShape,
};
pub use validate::{
    NodeVisit, Passive, PropertyNameMatching, ValidationHook, Validator, ValidatorSettings,
    VisitAction,
};
