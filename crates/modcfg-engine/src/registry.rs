//! # Registry and Dispatch
//!
//! One [`ConfigurationInfo`] per registered type, plus a table of
//! type-erased handlers built at registration time.
//!
//! ## Design
//!
//! - Each entry holds an `Arc<dyn ErasedDefinition>`. The erased surface
//!   of the service (by id, JSON in and out) calls through it; typed calls
//!   downcast it back to the [`TypedDefinition`] they registered. Nothing
//!   inspects types at call time beyond a `TypeId` lookup.
//! - Loaded values are stored as `Arc<dyn Any + Send + Sync>` and handed
//!   out as `Arc<T>`.
//! - Each entry has its own mutex over its loaded value and in-memory
//!   text. Loads and saves of one configuration are serialized; different
//!   configurations proceed in parallel.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, OnceLock};

use modcfg_core::{ConfigurationId, DocumentPath, ModuleId, ModuleInfo};
use modcfg_schema::{ErrorMap, SchemaNode};
use parking_lot::{Mutex, RwLock};
use serde_json::Value;

use crate::configuration::{
    ActionResult, Configuration, ConfigurationDefinition, MigrationError, SaveLocation,
};
use crate::error::EngineError;
use crate::paths::sidecar_path;

/// A loaded configuration value of some registered type.
pub(crate) type Instance = Arc<dyn Any + Send + Sync>;

/// Registration data of one configuration type.
#[derive(Debug, Clone)]
pub struct ConfigurationInfo {
    pub id: ConfigurationId,
    /// Display name.
    pub name: String,
    pub description: String,
    /// Fully qualified Rust type name.
    pub type_name: &'static str,
    /// The owning module.
    pub module: ModuleInfo,
    pub location: SaveLocation,
    /// Storage path, or `None` for in-memory configurations.
    pub path: Option<PathBuf>,
    pub schema: Arc<SchemaNode>,
}

impl ConfigurationInfo {
    pub fn is_in_memory(&self) -> bool {
        self.path.is_none()
    }

    /// Path of the schema sidecar, for file-backed configurations.
    pub fn sidecar_path(&self) -> Option<PathBuf> {
        self.path.as_deref().map(sidecar_path)
    }
}

// ─── Erased handlers ─────────────────────────────────────────────────

/// Operations the service needs from a registered type without knowing it.
pub(crate) trait ErasedDefinition: Send + Sync {
    fn as_any(&self) -> &dyn Any;
    fn create(&self) -> Instance;
    fn from_value(&self, value: Value) -> Result<Instance, EngineError>;
    fn from_text(&self, text: &str) -> Result<Instance, EngineError>;
    fn to_value(&self, instance: &dyn Any) -> Result<Value, EngineError>;
    fn to_text(&self, instance: &dyn Any) -> Result<String, EngineError>;
    fn check(&self, instance: &dyn Any) -> Result<ErrorMap, EngineError>;
    fn migrate(&self, text: String) -> Result<String, MigrationError>;
    fn perform_action(
        &self,
        value: &mut Value,
        path: &DocumentPath,
        action: &str,
    ) -> Result<Option<ActionResult>, EngineError>;
}

/// The handler registered for `T`.
pub(crate) struct TypedDefinition<T: Configuration> {
    pub(crate) definition: Arc<dyn ConfigurationDefinition<T>>,
}

impl<T: Configuration> TypedDefinition<T> {
    fn typed<'a>(&self, instance: &'a dyn Any) -> Result<&'a T, EngineError> {
        instance.downcast_ref::<T>().ok_or_else(mismatch::<T>)
    }
}

fn mismatch<T>() -> EngineError {
    let name = std::any::type_name::<T>();
    EngineError::TypeMismatch {
        configuration: name.to_string(),
        expected: name,
    }
}

fn serialization<T>(source: serde_json::Error) -> EngineError {
    EngineError::serialization(std::any::type_name::<T>(), source)
}

impl<T: Configuration> ErasedDefinition for TypedDefinition<T> {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn create(&self) -> Instance {
        Arc::new(self.definition.new_instance())
    }

    fn from_value(&self, value: Value) -> Result<Instance, EngineError> {
        let config: T = serde_json::from_value(value).map_err(serialization::<T>)?;
        Ok(Arc::new(config))
    }

    fn from_text(&self, text: &str) -> Result<Instance, EngineError> {
        let config: T = serde_json::from_str(text).map_err(serialization::<T>)?;
        Ok(Arc::new(config))
    }

    fn to_value(&self, instance: &dyn Any) -> Result<Value, EngineError> {
        serde_json::to_value(self.typed(instance)?).map_err(serialization::<T>)
    }

    fn to_text(&self, instance: &dyn Any) -> Result<String, EngineError> {
        serde_json::to_string_pretty(self.typed(instance)?).map_err(serialization::<T>)
    }

    fn check(&self, instance: &dyn Any) -> Result<ErrorMap, EngineError> {
        Ok(self.definition.validate(self.typed(instance)?))
    }

    fn migrate(&self, text: String) -> Result<String, MigrationError> {
        self.definition.migrate(text)
    }

    fn perform_action(
        &self,
        value: &mut Value,
        path: &DocumentPath,
        action: &str,
    ) -> Result<Option<ActionResult>, EngineError> {
        let mut config: T = serde_json::from_value(value.clone()).map_err(serialization::<T>)?;
        let result = self.definition.perform_action(&mut config, path, action);
        *value = serde_json::to_value(&config).map_err(serialization::<T>)?;
        Ok(result)
    }
}

// ─── Entries ─────────────────────────────────────────────────────────

/// Mutable per-configuration state, guarded by the entry's mutex.
#[derive(Default)]
pub(crate) struct EntryState {
    pub(crate) loaded: Option<Instance>,
    /// Last saved text of an in-memory configuration.
    pub(crate) saved_in_memory: Option<String>,
}

pub(crate) struct Entry {
    pub(crate) info: ConfigurationInfo,
    pub(crate) definition: Arc<dyn ErasedDefinition>,
    pub(crate) state: Mutex<EntryState>,
    pub(crate) schema_text: OnceLock<String>,
}

impl Entry {
    pub(crate) fn new(info: ConfigurationInfo, definition: Arc<dyn ErasedDefinition>) -> Self {
        Self {
            info,
            definition,
            state: Mutex::new(EntryState::default()),
            schema_text: OnceLock::new(),
        }
    }

    /// The typed handler, when `T` is the registered type.
    pub(crate) fn typed<T: Configuration>(
        &self,
    ) -> Result<&Arc<dyn ConfigurationDefinition<T>>, EngineError> {
        self.definition
            .as_any()
            .downcast_ref::<TypedDefinition<T>>()
            .map(|typed| &typed.definition)
            .ok_or_else(|| EngineError::TypeMismatch {
                configuration: self.info.name.clone(),
                expected: self.info.type_name,
            })
    }

    /// Move this entry's state into a copy registered under a new identity.
    pub(crate) fn rekeyed(&self, info: ConfigurationInfo) -> Entry {
        let state = std::mem::take(&mut *self.state.lock());
        Entry {
            info,
            definition: Arc::clone(&self.definition),
            state: Mutex::new(state),
            schema_text: self.schema_text.clone(),
        }
    }
}

// ─── Registry ────────────────────────────────────────────────────────

#[derive(Default)]
struct Tables {
    entries: HashMap<ConfigurationId, Arc<Entry>>,
    by_type: HashMap<TypeId, ConfigurationId>,
    host_module: Option<ModuleInfo>,
}

#[derive(Default)]
pub(crate) struct Registry {
    tables: RwLock<Tables>,
}

impl Registry {
    pub(crate) fn insert(&self, type_id: TypeId, entry: Entry) -> Result<Arc<Entry>, EngineError> {
        let mut tables = self.tables.write();
        if tables.by_type.contains_key(&type_id) || tables.entries.contains_key(&entry.info.id) {
            return Err(EngineError::AlreadyRegistered {
                type_name: entry.info.type_name,
            });
        }
        let entry = Arc::new(entry);
        tables.by_type.insert(type_id, entry.info.id);
        tables.entries.insert(entry.info.id, Arc::clone(&entry));
        Ok(entry)
    }

    pub(crate) fn by_id(&self, id: ConfigurationId) -> Option<Arc<Entry>> {
        self.tables.read().entries.get(&id).cloned()
    }

    pub(crate) fn by_type(&self, type_id: TypeId) -> Option<Arc<Entry>> {
        let tables = self.tables.read();
        tables
            .by_type
            .get(&type_id)
            .and_then(|id| tables.entries.get(id))
            .cloned()
    }

    pub(crate) fn host_module(&self) -> Option<ModuleInfo> {
        self.tables.read().host_module.clone()
    }

    /// Record the host module and re-key the placeholder entry, if any.
    ///
    /// Returns the old and new id of the re-keyed entry.
    pub(crate) fn attach_host(
        &self,
        module: &ModuleInfo,
        rekey: impl FnOnce(&Entry) -> Entry,
    ) -> Result<Option<(ConfigurationId, ConfigurationId)>, EngineError> {
        let mut tables = self.tables.write();
        if tables.host_module.is_some() {
            return Err(EngineError::AlreadyInitialized);
        }
        tables.host_module = Some(module.clone());

        let Some(placeholder) = tables.entries.remove(&ConfigurationId::PLACEHOLDER) else {
            return Ok(None);
        };
        let entry = Arc::new(rekey(&placeholder));
        let new_id = entry.info.id;
        for id in tables.by_type.values_mut() {
            if *id == ConfigurationId::PLACEHOLDER {
                *id = new_id;
            }
        }
        tables.entries.insert(new_id, entry);
        Ok(Some((ConfigurationId::PLACEHOLDER, new_id)))
    }

    /// Every info: host module first, then by module name, then by name.
    pub(crate) fn infos(&self) -> Vec<ConfigurationInfo> {
        let tables = self.tables.read();
        let host = tables.host_module.as_ref().map(|module| module.id);
        let mut infos: Vec<ConfigurationInfo> =
            tables.entries.values().map(|entry| entry.info.clone()).collect();
        infos.sort_by(|a, b| {
            let a_host = Some(a.module.id) == host || a.id.is_placeholder();
            let b_host = Some(b.module.id) == host || b.id.is_placeholder();
            b_host
                .cmp(&a_host)
                .then_with(|| a.module.name.cmp(&b.module.name))
                .then_with(|| a.name.cmp(&b.name))
        });
        infos
    }

    /// Infos of one module, by name then id.
    pub(crate) fn infos_for(&self, module: ModuleId) -> Vec<ConfigurationInfo> {
        let tables = self.tables.read();
        let mut infos: Vec<ConfigurationInfo> = tables
            .entries
            .values()
            .filter(|entry| entry.info.module.id == module)
            .map(|entry| entry.info.clone())
            .collect();
        infos.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
        infos
    }
}
