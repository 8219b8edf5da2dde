//! # Configuration Contracts
//!
//! What a module supplies to the engine: a configuration type and,
//! optionally, a [`ConfigurationDefinition`] with per-type hooks.
//!
//! ## Hooks
//!
//! | Hook | Default |
//! |---|---|
//! | `new_instance` | `T::default()` |
//! | `validate` | no custom errors |
//! | `migrate` | stored text unchanged |
//! | `save_location` | [`SaveLocation::Default`] |
//! | `perform_action` | not supported |
//!
//! Custom validation runs only after structural validation passed, and its
//! errors join the same path-keyed map.

use std::error::Error as StdError;

use modcfg_core::DocumentPath;
use modcfg_schema::{ErrorMap, Reflect, Theme};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// A type the engine can manage as one editable document.
///
/// Implemented for every type with the required capabilities.
pub trait Configuration:
    Reflect + Serialize + DeserializeOwned + Default + Clone + Send + Sync + 'static
{
}

impl<T> Configuration for T where
    T: Reflect + Serialize + DeserializeOwned + Default + Clone + Send + Sync + 'static
{
}

/// Error type returned by migrations.
pub type MigrationError = Box<dyn StdError + Send + Sync>;

/// Where a configuration is stored.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SaveLocation {
    /// `<module dir>/<module id>/<slug of the name>.json`.
    #[default]
    Default,
    /// A file name under the per-module directory. `.json` is appended
    /// when missing; an empty name keeps the configuration in memory.
    FileName(String),
    /// A path relative to the data directory. `.json` is appended when
    /// missing.
    RelativePath(String),
    /// Never written to disk.
    InMemory,
}

/// Result of a custom action, shown to whoever triggered it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionResult {
    pub message: String,
    pub theme: Theme,
    /// Whether the editor should reload the configuration afterwards.
    pub refresh_configuration: bool,
}

impl ActionResult {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            theme: Theme::Default,
            refresh_configuration: true,
        }
    }

    pub fn with_theme(mut self, theme: Theme) -> Self {
        self.theme = theme;
        self
    }

    pub fn without_refresh(mut self) -> Self {
        self.refresh_configuration = false;
        self
    }

    /// The result for definitions that handle no actions.
    pub fn unsupported() -> Self {
        Self::new("Configuration does not support custom actions!")
            .with_theme(Theme::Warning)
            .without_refresh()
    }
}

/// Per-type hooks. Every method has a default.
pub trait ConfigurationDefinition<T: Configuration>: Send + Sync {
    /// Build a fresh instance.
    fn new_instance(&self) -> T {
        T::default()
    }

    /// Business rules evaluated after structural validation passed.
    fn validate(&self, _config: &T) -> ErrorMap {
        ErrorMap::new()
    }

    /// Rewrite stored text written by an older version of the type.
    fn migrate(&self, text: String) -> Result<String, MigrationError> {
        Ok(text)
    }

    fn save_location(&self) -> SaveLocation {
        SaveLocation::Default
    }

    /// Run a declared custom action. `None` means actions are not
    /// supported by this definition.
    fn perform_action(
        &self,
        _config: &mut T,
        _path: &DocumentPath,
        _action: &str,
    ) -> Option<ActionResult> {
        None
    }
}

/// A definition that keeps every default.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultDefinition;

impl<T: Configuration> ConfigurationDefinition<T> for DefaultDefinition {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unsupported_action_result() {
        let result = ActionResult::unsupported();
        assert_eq!(result.message, "Configuration does not support custom actions!");
        assert_eq!(result.theme, Theme::Warning);
        assert!(!result.refresh_configuration);
    }

    #[test]
    fn test_action_result_defaults_to_refresh() {
        let result = ActionResult::new("done");
        assert!(result.refresh_configuration);
        assert_eq!(result.theme, Theme::Default);
    }

    #[test]
    fn test_action_result_wire_keys() {
        let json = serde_json::to_value(ActionResult::new("ok")).unwrap();
        assert_eq!(json["refreshConfiguration"], serde_json::json!(true));
        assert_eq!(json["theme"], serde_json::json!("default"));
    }
}
