//! Configuration types shared by the engine integration suites.

#![allow(dead_code)]

use std::sync::Arc;

use modcfg_core::ModuleInfo;
use modcfg_engine::{ConfigurationService, EnginePaths, StaticEnvironment};
use modcfg_schema::{ClassDef, CustomAction, Reflect, TypeShape};
use serde::{Deserialize, Serialize};
use tempfile::TempDir;

/// A counter with an overridable label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Counter {
    pub count: i32,
    pub label: String,
}

impl Default for Counter {
    fn default() -> Self {
        Self {
            count: 3,
            label: "Default".into(),
        }
    }
}

impl Reflect for Counter {
    fn shape() -> TypeShape {
        TypeShape::object_with_defaults::<Self>(|| {
            ClassDef::new()
                .title("Counter")
                .property::<i32>("Count", |p| p.range(1, 5))
                .property::<String>("Label", |p| p.env_overridable("LABEL"))
                .action(CustomAction::new("Reset"))
        })
    }
}

/// Server settings with a locked port and a restart-bound thread count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Server {
    pub port: u16,
    pub threads: u8,
}

impl Default for Server {
    fn default() -> Self {
        Self {
            port: 8080,
            threads: 2,
        }
    }
}

impl Reflect for Server {
    fn shape() -> TypeShape {
        TypeShape::object_with_defaults::<Self>(|| {
            ClassDef::new()
                .title("Server")
                .property::<u16>("Port", |p| p.env("PORT"))
                .property::<u8>("Threads", |p| p.requires_restart())
        })
    }
}

/// A single switch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Toggle {
    pub enabled: bool,
}

impl Reflect for Toggle {
    fn shape() -> TypeShape {
        TypeShape::object_with_defaults::<Self>(|| {
            ClassDef::new().title("Toggle").field::<bool>("Enabled")
        })
    }
}

/// One upstream of a gateway.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Upstream {
    pub host: String,
    pub label: String,
    pub weight: u8,
}

impl Reflect for Upstream {
    fn shape() -> TypeShape {
        TypeShape::object_with_defaults::<Self>(|| {
            ClassDef::new()
                .title("Upstream")
                .property::<String>("Host", |p| p.required())
                .property::<String>("Label", |p| p.env_overridable("UPSTREAM_LABEL"))
                .property::<u8>("Weight", |p| p.requires_restart())
                .action(CustomAction::new("Ping"))
        })
    }
}

/// Nested classes: an optional upstream and a list of them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Gateway {
    pub name: String,
    pub proxy: Option<Upstream>,
    pub upstreams: Vec<Upstream>,
}

impl Reflect for Gateway {
    fn shape() -> TypeShape {
        TypeShape::object_with_defaults::<Self>(|| {
            ClassDef::new()
                .title("Gateway")
                .field::<String>("Name")
                .field::<Option<Upstream>>("Proxy")
                .field::<Vec<Upstream>>("Upstreams")
        })
    }
}

pub fn upstream(host: &str, label: &str, weight: u8) -> Upstream {
    Upstream {
        host: host.into(),
        label: label.into(),
        weight,
    }
}

pub fn service(dir: &TempDir, env: StaticEnvironment) -> Arc<ConfigurationService> {
    Arc::new(ConfigurationService::new(EnginePaths::new(dir.path())).with_environment(env))
}

pub fn module() -> ModuleInfo {
    ModuleInfo::named("Plugin")
}
