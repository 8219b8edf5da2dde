//! # Host Settings
//!
//! The host's built-in configuration, registered before the host module is
//! known and re-keyed once it is attached.

use std::collections::BTreeSet;
use std::sync::Arc;

use anyhow::{Context, Result};
use modcfg_core::ModuleInfo;
use modcfg_engine::{
    ConfigurationDefinition, ConfigurationInfo, ConfigurationService, EnginePaths,
    EnvironmentSource,
};
use modcfg_schema::{ClassDef, EnumDef, ErrorMap, Reflect, TypeShape};
use serde::{Deserialize, Serialize};

/// Name of the host module the settings belong to.
pub const HOST_MODULE: &str = "modcfg";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct HostSettings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub plugins: PluginSettings,
}

impl Reflect for HostSettings {
    fn shape() -> TypeShape {
        TypeShape::object_with_defaults::<Self>(|| {
            ClassDef::new()
                .title("Host")
                .description("Settings of the configuration host.")
                .field::<ServerSettings>("Server")
                .field::<LoggingSettings>("Logging")
                .field::<PluginSettings>("Plugins")
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ServerSettings {
    pub port: u16,
    pub bind_address: String,
    pub worker_threads: u8,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            port: 8111,
            bind_address: "127.0.0.1".into(),
            worker_threads: 4,
        }
    }
}

impl Reflect for ServerSettings {
    fn shape() -> TypeShape {
        TypeShape::object_with_defaults::<Self>(|| {
            ClassDef::new()
                .property::<u16>("Port", |p| {
                    p.range(1, 65535)
                        .env("MODCFG_PORT")
                        .requires_restart()
                        .description("Port the host listens on.")
                })
                .property::<String>("BindAddress", |p| {
                    p.min_length(1).env_overridable("MODCFG_BIND_ADDRESS")
                })
                .property::<u8>("WorkerThreads", |p| p.range(1, 64).requires_restart())
        })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl Reflect for LogLevel {
    fn shape() -> TypeShape {
        TypeShape::enumeration::<Self>(|| {
            EnumDef::new()
                .member("Error")
                .variant("Warn", |v| v.title("Warning"))
                .member("Info")
                .member("Debug")
                .member("Trace")
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct LoggingSettings {
    pub level: LogLevel,
    pub json: bool,
}

impl Reflect for LoggingSettings {
    fn shape() -> TypeShape {
        TypeShape::object_with_defaults::<Self>(|| {
            ClassDef::new()
                .property::<LogLevel>("Level", |p| p.env_overridable("MODCFG_LOG_LEVEL"))
                .property::<bool>("Json", |p| p.requires_restart())
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct PluginSettings {
    pub enabled: Vec<String>,
    pub scan_on_startup: bool,
}

impl Reflect for PluginSettings {
    fn shape() -> TypeShape {
        TypeShape::object_with_defaults::<Self>(|| {
            ClassDef::new()
                .field::<Vec<String>>("Enabled")
                .field::<bool>("ScanOnStartup")
        })
    }
}

/// Business rules of the host settings.
#[derive(Debug, Clone, Copy, Default)]
pub struct HostSettingsDefinition;

impl ConfigurationDefinition<HostSettings> for HostSettingsDefinition {
    fn validate(&self, config: &HostSettings) -> ErrorMap {
        let mut errors = ErrorMap::new();
        let mut seen = BTreeSet::new();
        for (index, name) in config.plugins.enabled.iter().enumerate() {
            if !seen.insert(name.as_str()) {
                errors
                    .entry(format!("Plugins.Enabled[{index}]"))
                    .or_default()
                    .push(format!("Plugin \"{name}\" is listed more than once."));
            }
        }
        errors
    }
}

/// A configuration service with the host settings registered and the
/// host module attached.
#[derive(Debug, Clone)]
pub struct Host {
    pub service: Arc<ConfigurationService>,
    pub info: ConfigurationInfo,
}

impl Host {
    /// Open the host over `paths`, reading overrides from `environment`.
    pub fn open(paths: EnginePaths, environment: impl EnvironmentSource + 'static) -> Result<Self> {
        let service = ConfigurationService::new(paths).with_environment(environment);
        service
            .register_host::<HostSettings>(HostSettingsDefinition)
            .context("failed to register host settings")?;
        service
            .attach_host_module(&ModuleInfo::named(HOST_MODULE))
            .context("failed to attach host module")?;
        let info = service.configuration_info_of::<HostSettings>()?;
        tracing::debug!(id = %info.id, path = ?info.path, "host settings registered");
        Ok(Self {
            service: Arc::new(service),
            info,
        })
    }
}
