//! # Identity Newtypes
//!
//! Newtype wrappers for the identifiers the engine hands around. A
//! `ConfigurationId` cannot be passed where a `ModuleId` is expected even
//! though both wrap a `Uuid`.
//!
//! ## Derivation
//!
//! Configuration ids are UUID v5 values: the namespace is the owning
//! module's id and the name is `Configuration=<fully qualified type name>`.
//! Two modules shipping a type with the same name therefore never collide,
//! and an id survives process restarts.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier of a module contributing configurations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModuleId(pub Uuid);

/// Identifier of one configuration type within one module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConfigurationId(pub Uuid);

impl ModuleId {
    /// The id used for the host before its own module descriptor is known.
    pub const PLACEHOLDER: ModuleId = ModuleId(Uuid::nil());

    /// Derive a stable module id from a module name.
    pub fn from_name(name: &str) -> Self {
        Self(Uuid::new_v5(&Uuid::NAMESPACE_OID, format!("Module={name}").as_bytes()))
    }

    /// Access the inner UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl ConfigurationId {
    /// The id the built-in host configuration is registered under until the
    /// host module is attached.
    pub const PLACEHOLDER: ConfigurationId = ConfigurationId(Uuid::nil());

    /// Derive the id of `type_name` owned by `module`.
    pub fn derive(module: ModuleId, type_name: &str) -> Self {
        let name = format!("Configuration={type_name}");
        Self(Uuid::new_v5(&module.0, name.as_bytes()))
    }

    /// Whether this is the placeholder id.
    pub fn is_placeholder(&self) -> bool {
        self.0.is_nil()
    }

    /// Access the inner UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl std::fmt::Display for ModuleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::fmt::Display for ConfigurationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Descriptor of a module as supplied by the module loader.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleInfo {
    /// Module id.
    pub id: ModuleId,
    /// Human readable module name.
    pub name: String,
}

impl ModuleInfo {
    /// Build a descriptor with an explicit id.
    pub fn new(id: ModuleId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }

    /// Build a descriptor whose id is derived from the name.
    pub fn named(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            id: ModuleId::from_name(&name),
            name,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_id_is_deterministic() {
        let module = ModuleId::from_name("Renamer");
        let a = ConfigurationId::derive(module, "renamer::RenamerSettings");
        let b = ConfigurationId::derive(module, "renamer::RenamerSettings");
        assert_eq!(a, b);
        assert!(!a.is_placeholder());
    }

    #[test]
    fn test_same_type_name_differs_across_modules() {
        let a = ConfigurationId::derive(ModuleId::from_name("A"), "settings::Settings");
        let b = ConfigurationId::derive(ModuleId::from_name("B"), "settings::Settings");
        assert_ne!(a, b);
    }

    #[test]
    fn test_id_is_version_5() {
        let id = ConfigurationId::derive(ModuleId::from_name("A"), "x::Y");
        assert_eq!(id.as_uuid().get_version_num(), 5);
    }

    #[test]
    fn test_placeholder_is_nil() {
        assert!(ConfigurationId::PLACEHOLDER.is_placeholder());
        assert!(ModuleId::PLACEHOLDER.as_uuid().is_nil());
    }

    #[test]
    fn test_serde_transparent() {
        let id = ModuleId::from_name("Host");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{}\"", id.0));
        let back: ModuleId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }
}
