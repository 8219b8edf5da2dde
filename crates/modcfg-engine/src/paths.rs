//! # Storage Paths
//!
//! Where configuration files live, and how a [`SaveLocation`] becomes a
//! concrete path.
//!
//! ## Layout
//!
//! ```text
//! <data_dir>/
//!   <relative path>.json              (SaveLocation::RelativePath)
//!   configurations/                   (module_configurations_dir)
//!     <module id>/
//!       <slug>.json                   (SaveLocation::Default)
//!       <slug>.schema.json            (sidecar)
//! ```

use std::path::{Path, PathBuf};

use modcfg_core::ModuleId;

use crate::configuration::SaveLocation;
use crate::environment::{EnvironmentSource, ProcessEnvironment};

/// Variable naming the data directory.
pub const DATA_DIR_VAR: &str = "MODCFG_DATA_DIR";

/// Variable overriding the per-module configuration directory.
pub const MODULE_CONFIG_DIR_VAR: &str = "MODCFG_MODULE_CONFIG_DIR";

/// Directories the engine stores configurations under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnginePaths {
    pub data_dir: PathBuf,
    pub module_configurations_dir: PathBuf,
}

impl EnginePaths {
    /// Paths rooted at `data_dir`.
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        let data_dir = data_dir.into();
        Self {
            module_configurations_dir: data_dir.join("configurations"),
            data_dir,
        }
    }

    /// Paths from the process environment.
    pub fn from_env() -> Self {
        Self::from_source(&ProcessEnvironment)
    }

    /// Paths from `MODCFG_DATA_DIR` (default `./data`) and
    /// `MODCFG_MODULE_CONFIG_DIR`.
    pub fn from_source(env: &dyn EnvironmentSource) -> Self {
        let data_dir = env
            .var(DATA_DIR_VAR)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("./data"));
        let mut paths = Self::new(data_dir);
        if let Some(dir) = env.var(MODULE_CONFIG_DIR_VAR) {
            paths.module_configurations_dir = PathBuf::from(dir);
        }
        paths
    }

    /// The directory holding one module's configurations.
    pub fn module_dir(&self, module: ModuleId) -> PathBuf {
        self.module_configurations_dir.join(module.to_string())
    }

    /// Storage path for a configuration, or `None` when it lives in memory.
    pub fn storage_path(
        &self,
        module: ModuleId,
        name: &str,
        location: &SaveLocation,
    ) -> Option<PathBuf> {
        match location {
            SaveLocation::Default => {
                Some(self.module_dir(module).join(format!("{}.json", slug(name))))
            }
            SaveLocation::FileName(file) if file.is_empty() => None,
            SaveLocation::FileName(file) => Some(self.module_dir(module).join(with_json(file))),
            SaveLocation::RelativePath(path) => Some(self.data_dir.join(with_json(path))),
            SaveLocation::InMemory => None,
        }
    }
}

/// Path of the schema sidecar next to a configuration file.
pub fn sidecar_path(path: &Path) -> PathBuf {
    path.with_extension("schema.json")
}

/// File-name form of a configuration name: invalid path characters
/// removed, spaces turned into `-`, lowercased.
pub fn slug(name: &str) -> String {
    name.chars()
        .filter(|c| !is_invalid_path_char(*c))
        .map(|c| if c == ' ' { '-' } else { c })
        .collect::<String>()
        .to_lowercase()
}

fn is_invalid_path_char(c: char) -> bool {
    c.is_control() || matches!(c, '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*')
}

fn with_json(name: &str) -> String {
    if name.ends_with(".json") {
        name.to_string()
    } else {
        format!("{name}.json")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::StaticEnvironment;

    #[test]
    fn test_slug() {
        assert_eq!(slug("Renamer: Main Rules"), "renamer-main-rules");
        assert_eq!(slug("A/B*C"), "abc");
    }

    #[test]
    fn test_default_layout() {
        let paths = EnginePaths::new("/srv/data");
        let module = ModuleId::from_name("Renamer");
        let path = paths
            .storage_path(module, "Main Rules", &SaveLocation::Default)
            .unwrap();
        assert_eq!(
            path,
            PathBuf::from(format!("/srv/data/configurations/{module}/main-rules.json"))
        );
        assert_eq!(
            sidecar_path(&path),
            PathBuf::from(format!("/srv/data/configurations/{module}/main-rules.schema.json"))
        );
    }

    #[test]
    fn test_custom_locations() {
        let paths = EnginePaths::new("/srv/data");
        let module = ModuleId::from_name("Host");
        assert_eq!(
            paths.storage_path(module, "x", &SaveLocation::RelativePath("settings-server".into())),
            Some(PathBuf::from("/srv/data/settings-server.json"))
        );
        assert_eq!(
            paths.storage_path(module, "x", &SaveLocation::FileName("rules.json".into())),
            Some(paths.module_dir(module).join("rules.json"))
        );
        assert_eq!(paths.storage_path(module, "x", &SaveLocation::FileName(String::new())), None);
        assert_eq!(paths.storage_path(module, "x", &SaveLocation::InMemory), None);
    }

    #[test]
    fn test_from_source() {
        let env = StaticEnvironment::new().with(DATA_DIR_VAR, "/var/lib/modcfg");
        let paths = EnginePaths::from_source(&env);
        assert_eq!(paths.module_configurations_dir, PathBuf::from("/var/lib/modcfg/configurations"));

        let env = env.with(MODULE_CONFIG_DIR_VAR, "/etc/modcfg");
        assert_eq!(
            EnginePaths::from_source(&env).module_configurations_dir,
            PathBuf::from("/etc/modcfg")
        );
        assert_eq!(
            EnginePaths::from_source(&StaticEnvironment::new()).data_dir,
            PathBuf::from("./data")
        );
    }
}
