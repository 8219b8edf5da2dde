//! # modcfg-core: Foundational Types for the Configuration Engine
//!
//! Leaf crate of the modcfg workspace. It defines the primitives every other
//! crate agrees on: how configurations and modules are identified, how a JSON
//! value is reduced to comparable text, and how a location inside a document
//! is written down.
//!
//! ## Key Design Principles
//!
//! 1. **Deterministic identity.** A `ConfigurationId` is a namespaced hash of
//!    the owning module id and the configuration type's full name. The same
//!    type in the same module gets the same id across restarts.
//!
//! 2. **`CanonicalText` for equality.** Whenever two JSON values must be
//!    compared for "same value" (uniqueness, enum membership, override
//!    reconciliation, restart baselines) both sides go through
//!    `CanonicalText::new()`.
//!
//! 3. **Structured paths.** A `DocumentPath` is a list of segments. The
//!    textual form (`list[0].name`, `items['a b']`) is derived from the
//!    segments and parsed back into them; nothing downstream splits strings.
//!
//! ## Crate Policy
//!
//! - No dependencies on other `modcfg-*` crates.
//! - No `unsafe` code.
//! - No `.unwrap()` outside tests.

pub mod canonical;
pub mod error;
pub mod identity;
pub mod path;

pub use canonical::CanonicalText;
pub use error::{CanonicalizationError, PathParseError};
pub use identity::{ConfigurationId, ModuleId, ModuleInfo};
pub use path::{DocumentPath, PathSegment};
