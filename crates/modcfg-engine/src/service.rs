//! # Configuration Service
//!
//! Registration, persistence and validation of module configurations.
//!
//! ## Lifecycle
//!
//! ```text
//! register ──► Unloaded ──load──► Loaded ──unload──► Unloaded
//!                  │                 ▲
//!                  └──save───────────┘
//! ```
//!
//! - `load` returns the cached value when there is one. A file-backed
//!   configuration without a file gets a default instance, which is saved
//!   (file and sidecar schema together) and then validated in load mode,
//!   so the stored and in-memory values come from the same pass.
//! - `save` injects the `$schema` reference, validates in save mode, and
//!   skips the write when the result is byte-identical to what is stored.
//!   The cache is refreshed from the value as supplied, before override
//!   reconciliation.
//! - Every failure is all-or-nothing: nothing is written, cached, or
//!   recorded, and no event is published.
//!
//! ## Concurrency
//!
//! Each configuration's loads and saves run under its own mutex, so calls
//! for one configuration are linearized while different configurations
//! proceed in parallel. Events are published while that mutex is held,
//! which keeps them ordered per configuration.

use std::any::TypeId;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::fs;
use std::sync::Arc;

use modcfg_core::{ConfigurationId, ModuleId, ModuleInfo};
use modcfg_schema::{
    flatten_errors, type_display_name, ErrorMap, SchemaGenerator, SchemaNode, Validator,
    ValidatorSettings,
};
use serde_json::Value;
use tokio::sync::broadcast;

use crate::actions::resolve_action_target;
use crate::configuration::{
    ActionResult, Configuration, ConfigurationDefinition, DefaultDefinition,
};
use crate::document::{inject_schema_reference, schema_text, schema_uri};
use crate::environment::{EnvironmentSource, ProcessEnvironment};
use crate::error::{ConfigurationValidationError, EngineError};
use crate::events::{ConfigurationEvent, EventBus};
use crate::extended::{validate_extended, ValidationContext, ValidationMode};
use crate::paths::EnginePaths;
use crate::records::{RecordChanges, Records};
use crate::registry::{
    ConfigurationInfo, Entry, EntryState, Instance, Registry, TypedDefinition,
};

/// A document that passed validation.
struct Validated {
    /// The document with override patches applied.
    document: Value,
    instance: Instance,
    changes: RecordChanges,
    patched: bool,
}

enum Verdict {
    Valid(Validated),
    Invalid(ErrorMap),
}

/// The configuration engine.
pub struct ConfigurationService {
    paths: EnginePaths,
    environment: Arc<dyn EnvironmentSource>,
    settings: ValidatorSettings,
    generator: SchemaGenerator,
    registry: Registry,
    records: Records,
    events: EventBus,
}

impl fmt::Debug for ConfigurationService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigurationService")
            .field("paths", &self.paths)
            .field("settings", &self.settings)
            .field("host_module", &self.registry.host_module())
            .finish_non_exhaustive()
    }
}

impl ConfigurationService {
    /// A service storing under `paths` and reading the process environment.
    pub fn new(paths: EnginePaths) -> Self {
        tracing::info!(
            data_dir = %paths.data_dir.display(),
            module_dir = %paths.module_configurations_dir.display(),
            "configuration service initialized"
        );
        Self {
            paths,
            environment: Arc::new(ProcessEnvironment),
            settings: ValidatorSettings::default(),
            generator: SchemaGenerator::new(),
            registry: Registry::default(),
            records: Records::new(),
            events: EventBus::new(),
        }
    }

    /// Read override variables from `environment` instead.
    pub fn with_environment(mut self, environment: impl EnvironmentSource + 'static) -> Self {
        self.environment = Arc::new(environment);
        self
    }

    pub fn with_validator_settings(mut self, settings: ValidatorSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn paths(&self) -> &EnginePaths {
        &self.paths
    }

    // ─── Registration ────────────────────────────────────────────────

    /// Register `T` for `module` with default hooks.
    pub fn register<T: Configuration>(
        &self,
        module: &ModuleInfo,
    ) -> Result<ConfigurationInfo, EngineError> {
        self.register_with::<T>(module, DefaultDefinition)
    }

    /// Register `T` for `module` with custom hooks.
    pub fn register_with<T: Configuration>(
        &self,
        module: &ModuleInfo,
        definition: impl ConfigurationDefinition<T> + 'static,
    ) -> Result<ConfigurationInfo, EngineError> {
        let id = ConfigurationId::derive(module.id, std::any::type_name::<T>());
        self.register_entry::<T>(id, module.clone(), Arc::new(definition))
    }

    /// Register the host's built-in configuration before the host module
    /// is known. It lives under the placeholder id until
    /// [`attach_host_module`](Self::attach_host_module).
    pub fn register_host<T: Configuration>(
        &self,
        definition: impl ConfigurationDefinition<T> + 'static,
    ) -> Result<ConfigurationInfo, EngineError> {
        let module = self
            .registry
            .host_module()
            .unwrap_or_else(|| ModuleInfo::new(ModuleId::PLACEHOLDER, String::new()));
        let id = if module.id == ModuleId::PLACEHOLDER {
            ConfigurationId::PLACEHOLDER
        } else {
            ConfigurationId::derive(module.id, std::any::type_name::<T>())
        };
        self.register_entry::<T>(id, module, Arc::new(definition))
    }

    fn register_entry<T: Configuration>(
        &self,
        id: ConfigurationId,
        module: ModuleInfo,
        definition: Arc<dyn ConfigurationDefinition<T>>,
    ) -> Result<ConfigurationInfo, EngineError> {
        let type_name = std::any::type_name::<T>();
        let schema = self.generator.generate::<T>()?;
        let name = schema
            .title
            .clone()
            .unwrap_or_else(|| type_display_name(type_name));
        let description = schema.description.clone().unwrap_or_default();
        let location = definition.save_location();
        let path = self.paths.storage_path(module.id, &name, &location);
        let info = ConfigurationInfo {
            id,
            name,
            description,
            type_name,
            module,
            location,
            path,
            schema: Arc::new(schema),
        };
        let entry = self
            .registry
            .insert(TypeId::of::<T>(), Entry::new(info, Arc::new(TypedDefinition { definition })))?;
        tracing::debug!(
            configuration = %entry.info.name,
            id = %entry.info.id,
            module = %entry.info.module.name,
            "registered configuration"
        );
        Ok(entry.info.clone())
    }

    /// Attach the host module, re-keying the built-in configuration from
    /// the placeholder id to its real id. Allowed once.
    pub fn attach_host_module(&self, module: &ModuleInfo) -> Result<(), EngineError> {
        let rekeyed = self.registry.attach_host(module, |placeholder| {
            let mut info = placeholder.info.clone();
            info.id = ConfigurationId::derive(module.id, info.type_name);
            info.module = module.clone();
            info.path = self.paths.storage_path(module.id, &info.name, &info.location);
            placeholder.rekeyed(info)
        })?;
        if let Some((from, to)) = rekeyed {
            self.records.rekey(from, to);
            tracing::debug!(id = %to, "re-keyed host configuration");
        }
        tracing::info!(module = %module.name, id = %module.id, "host module attached");
        Ok(())
    }

    // ─── Registry queries ────────────────────────────────────────────

    /// Every registered configuration: the host module's first, then by
    /// module name, then by name.
    pub fn configuration_infos(&self) -> Vec<ConfigurationInfo> {
        self.registry.infos()
    }

    /// One module's configurations, by name then id.
    pub fn configuration_infos_for(&self, module: ModuleId) -> Vec<ConfigurationInfo> {
        self.registry.infos_for(module)
    }

    pub fn configuration_info(&self, id: ConfigurationId) -> Option<ConfigurationInfo> {
        self.registry.by_id(id).map(|entry| entry.info.clone())
    }

    pub fn configuration_info_of<T: Configuration>(&self) -> Result<ConfigurationInfo, EngineError> {
        self.entry_of::<T>().map(|entry| entry.info.clone())
    }

    fn entry_of<T: Configuration>(&self) -> Result<Arc<Entry>, EngineError> {
        self.registry
            .by_type(TypeId::of::<T>())
            .ok_or_else(|| EngineError::UnknownConfiguration(std::any::type_name::<T>().to_string()))
    }

    fn entry(&self, id: ConfigurationId) -> Result<Arc<Entry>, EngineError> {
        self.registry
            .by_id(id)
            .ok_or_else(|| EngineError::UnknownConfiguration(id.to_string()))
    }

    // ─── New ─────────────────────────────────────────────────────────

    /// A fresh instance from the definition's factory.
    pub fn new_instance<T: Configuration>(&self) -> Result<T, EngineError> {
        let entry = self.entry_of::<T>()?;
        Ok(entry.typed::<T>()?.new_instance())
    }

    pub fn new_value(&self, id: ConfigurationId) -> Result<Value, EngineError> {
        let entry = self.entry(id)?;
        let instance = entry.definition.create();
        entry.definition.to_value(instance.as_ref())
    }

    // ─── Serialization ───────────────────────────────────────────────

    /// Pretty JSON text of a configuration.
    pub fn serialize<T: Configuration>(&self, config: &T) -> Result<String, EngineError> {
        serde_json::to_string_pretty(config)
            .map_err(|source| EngineError::serialization(std::any::type_name::<T>(), source))
    }

    pub fn deserialize<T: Configuration>(&self, text: &str) -> Result<T, EngineError> {
        serde_json::from_str(text)
            .map_err(|source| EngineError::serialization(std::any::type_name::<T>(), source))
    }

    /// Parse `text` as the registered type and return it as JSON.
    pub fn deserialize_value(&self, id: ConfigurationId, text: &str) -> Result<Value, EngineError> {
        let entry = self.entry(id)?;
        let instance = entry.definition.from_text(text)?;
        entry.definition.to_value(instance.as_ref())
    }

    // ─── Schema ──────────────────────────────────────────────────────

    pub fn schema_of<T: Configuration>(&self) -> Result<Arc<SchemaNode>, EngineError> {
        self.entry_of::<T>().map(|entry| Arc::clone(&entry.info.schema))
    }

    /// Schema text served to editors, with a root `$schema` property.
    pub fn get_schema(&self, id: ConfigurationId) -> Result<String, EngineError> {
        let entry = self.entry(id)?;
        self.schema_text(&entry)
    }

    fn schema_text(&self, entry: &Entry) -> Result<String, EngineError> {
        if let Some(text) = entry.schema_text.get() {
            return Ok(text.clone());
        }
        let text = schema_text(&entry.info.schema)
            .map_err(|source| EngineError::serialization(&entry.info.name, source))?;
        Ok(entry.schema_text.get_or_init(|| text).clone())
    }

    /// Write the sidecar schema when it is missing or outdated.
    fn ensure_sidecar(&self, entry: &Entry) -> Result<(), EngineError> {
        let Some(sidecar) = entry.info.sidecar_path() else {
            return Ok(());
        };
        let text = self.schema_text(entry)?;
        if sidecar.exists() {
            let current = fs::read_to_string(&sidecar).map_err(|e| EngineError::io(&sidecar, e))?;
            if current == text {
                return Ok(());
            }
            tracing::trace!(configuration = %entry.info.name, "schema changed, rewriting sidecar");
        }
        if let Some(parent) = sidecar.parent() {
            fs::create_dir_all(parent).map_err(|e| EngineError::io(parent, e))?;
        }
        fs::write(&sidecar, text).map_err(|e| EngineError::io(&sidecar, e))?;
        tracing::trace!(configuration = %entry.info.name, path = %sidecar.display(), "saved schema");
        Ok(())
    }

    // ─── Validation ──────────────────────────────────────────────────

    /// Validate a configuration value without side effects.
    pub fn validate<T: Configuration>(&self, config: &T) -> Result<ErrorMap, EngineError> {
        let entry = self.entry_of::<T>()?;
        let text = self.serialize(config)?;
        let instance: Instance = Arc::new(config.clone());
        self.verdict(&entry, ValidationMode::Plain, &text, Some(instance), None)
            .map(Verdict::into_errors)
    }

    /// Validate JSON text without side effects. An empty map means valid.
    pub fn validate_text(&self, id: ConfigurationId, text: &str) -> Result<ErrorMap, EngineError> {
        let entry = self.entry(id)?;
        self.verdict(&entry, ValidationMode::Plain, text, None, None)
            .map(Verdict::into_errors)
    }

    /// Run structural validation in `mode`, then custom validation when
    /// the structure is sound. Failing paths are logged.
    fn verdict(
        &self,
        entry: &Entry,
        mode: ValidationMode,
        text: &str,
        instance: Option<Instance>,
        baseline: Option<&Value>,
    ) -> Result<Verdict, EngineError> {
        let info = &entry.info;
        let document: Value = serde_json::from_str(text)
            .map_err(|source| EngineError::serialization(&info.name, source))?;
        let records = self.records.snapshot(info.id);
        let validator = Validator::new(&info.schema, &self.settings);
        let unpatched = (mode != ValidationMode::Load).then(|| document.clone());
        let outcome = validate_extended(
            &validator,
            document,
            ValidationContext {
                mode,
                environment: self.environment.as_ref(),
                records: &records,
                baseline,
            },
        );

        let mut errors = flatten_errors(&outcome.errors);
        if !errors.is_empty() {
            log_failures(info, &errors);
            return Ok(Verdict::Invalid(errors));
        }

        let instance = match (instance, unpatched) {
            (Some(instance), _) => instance,
            (None, Some(unpatched)) => entry.definition.from_value(unpatched)?,
            (None, None) => entry.definition.from_value(outcome.document.clone())?,
        };
        for (path, messages) in entry.definition.check(instance.as_ref())? {
            errors.entry(path).or_default().extend(messages);
        }
        if !errors.is_empty() {
            log_failures(info, &errors);
            return Ok(Verdict::Invalid(errors));
        }

        Ok(Verdict::Valid(Validated {
            patched: !outcome.patches.is_empty(),
            document: outcome.document,
            instance,
            changes: outcome.changes,
        }))
    }

    // ─── Load ────────────────────────────────────────────────────────

    /// The loaded value of `T`, shared.
    pub fn load<T: Configuration>(&self) -> Result<Arc<T>, EngineError> {
        let entry = self.entry_of::<T>()?;
        let instance = self.load_entry(&entry)?;
        instance.downcast::<T>().map_err(|_| EngineError::TypeMismatch {
            configuration: entry.info.name.clone(),
            expected: entry.info.type_name,
        })
    }

    /// A private copy of the loaded value of `T`.
    pub fn load_copy<T: Configuration>(&self) -> Result<T, EngineError> {
        self.load::<T>().map(|config| config.as_ref().clone())
    }

    /// The loaded value as JSON.
    pub fn load_value(&self, id: ConfigurationId) -> Result<Value, EngineError> {
        let entry = self.entry(id)?;
        let instance = self.load_entry(&entry)?;
        entry.definition.to_value(instance.as_ref())
    }

    /// Drop the cached value. Override records are kept.
    pub fn unload(&self, id: ConfigurationId) -> Result<bool, EngineError> {
        let entry = self.entry(id)?;
        let evicted = entry.state.lock().loaded.take().is_some();
        Ok(evicted)
    }

    fn load_entry(&self, entry: &Entry) -> Result<Instance, EngineError> {
        let mut state = entry.state.lock();
        if let Some(loaded) = &state.loaded {
            return Ok(Arc::clone(loaded));
        }

        let info = &entry.info;
        let stored = match &info.path {
            Some(path) if path.exists() => {
                Some(fs::read_to_string(path).map_err(|e| EngineError::io(path, e))?)
            }
            Some(_) => None,
            None => state.saved_in_memory.clone(),
        };

        let (text, migrate) = match stored {
            Some(text) => (text, true),
            None => {
                tracing::debug!(configuration = %info.name, "no stored configuration, saving defaults");
                let instance = entry.definition.create();
                let text = entry.definition.to_text(instance.as_ref())?;
                self.save_locked(entry, &mut state, &text, Some(instance))?;
                (text, false)
            }
        };
        let text = if migrate {
            let migrated = entry.definition.migrate(text).map_err(|e| EngineError::Migration {
                configuration: info.name.clone(),
                reason: e.to_string(),
            })?;
            self.ensure_sidecar(entry)?;
            migrated
        } else {
            text
        };

        match self.verdict(entry, ValidationMode::Load, &text, None, None)? {
            Verdict::Invalid(errors) => Err(validation_failure("load", info, errors)),
            Verdict::Valid(validated) => {
                self.commit(info, validated.changes);
                state.loaded = Some(Arc::clone(&validated.instance));
                tracing::debug!(configuration = %info.name, "loaded configuration");
                Ok(validated.instance)
            }
        }
    }

    // ─── Save ────────────────────────────────────────────────────────

    /// Save a configuration value. Returns `false` when the stored
    /// content was already identical.
    pub fn save<T: Configuration>(&self, config: &T) -> Result<bool, EngineError> {
        let entry = self.entry_of::<T>()?;
        let text = self.serialize(config)?;
        let instance: Instance = Arc::new(config.clone());
        let mut state = entry.state.lock();
        self.save_locked(&entry, &mut state, &text, Some(instance))
    }

    /// Save the currently loaded value of `T`.
    pub fn save_loaded<T: Configuration>(&self) -> Result<bool, EngineError> {
        let config = self.load::<T>()?;
        self.save(config.as_ref())
    }

    /// Save JSON text for a configuration.
    pub fn save_text(&self, id: ConfigurationId, text: &str) -> Result<bool, EngineError> {
        let entry = self.entry(id)?;
        let mut state = entry.state.lock();
        self.save_locked(&entry, &mut state, text, None)
    }

    /// Save a JSON value for a configuration.
    pub fn save_value(&self, id: ConfigurationId, value: &Value) -> Result<bool, EngineError> {
        let entry = self.entry(id)?;
        let text = serde_json::to_string_pretty(value)
            .map_err(|source| EngineError::serialization(&entry.info.name, source))?;
        let mut state = entry.state.lock();
        self.save_locked(&entry, &mut state, &text, None)
    }

    fn save_locked(
        &self,
        entry: &Entry,
        state: &mut EntryState,
        text: &str,
        instance: Option<Instance>,
    ) -> Result<bool, EngineError> {
        let info = &entry.info;
        let persisted = match &info.path {
            Some(path) if path.exists() => {
                Some(fs::read_to_string(path).map_err(|e| EngineError::io(path, e))?)
            }
            Some(_) => None,
            None => state.saved_in_memory.clone(),
        };
        let baseline = match persisted.as_deref().map(serde_json::from_str::<Value>) {
            Some(Ok(document)) => Some(document),
            _ => match &state.loaded {
                Some(loaded) => Some(entry.definition.to_value(loaded.as_ref())?),
                None => None,
            },
        };

        let injected = match info.sidecar_path() {
            Some(sidecar) => inject_schema_reference(text, &schema_uri(&sidecar)),
            None => text.to_string(),
        };
        let validated = match self.verdict(
            entry,
            ValidationMode::Save,
            &injected,
            instance,
            baseline.as_ref(),
        )? {
            Verdict::Valid(validated) => validated,
            Verdict::Invalid(errors) => return Err(validation_failure("save", info, errors)),
        };

        let stored = if validated.patched {
            serde_json::to_string_pretty(&validated.document)
                .map_err(|source| EngineError::serialization(&info.name, source))?
        } else {
            injected
        };

        if persisted.as_deref() == Some(stored.as_str()) {
            tracing::trace!(configuration = %info.name, "configuration unchanged, skipping save");
            self.commit(info, validated.changes);
            return Ok(false);
        }

        match &info.path {
            None => {
                tracing::trace!(configuration = %info.name, "saving in-memory configuration");
                state.saved_in_memory = Some(stored);
            }
            Some(path) => {
                if let Some(parent) = path.parent() {
                    fs::create_dir_all(parent).map_err(|e| EngineError::io(parent, e))?;
                }
                self.ensure_sidecar(entry)?;
                tracing::trace!(configuration = %info.name, path = %path.display(), "saving configuration");
                fs::write(path, &stored).map_err(|e| EngineError::io(path, e))?;
            }
        }
        state.loaded = Some(validated.instance);

        self.events.publish(ConfigurationEvent::Saved {
            id: info.id,
            name: info.name.clone(),
        });
        self.commit(info, validated.changes);
        tracing::debug!(configuration = %info.name, "saved configuration");
        Ok(true)
    }

    /// Commit record changes and announce a restart-requirement change.
    fn commit(&self, info: &ConfigurationInfo, changes: RecordChanges) {
        let Some(required) = self.records.commit(info.id, changes) else {
            return;
        };
        if required {
            tracing::info!("a restart is required for some configuration to take effect");
        } else {
            tracing::info!("a restart is no longer required for any configuration to take effect");
        }
        self.events
            .publish(ConfigurationEvent::RestartRequiredChanged { required });
    }

    // ─── Custom actions ──────────────────────────────────────────────

    /// Run the custom action `action` declared at `path` of `config`.
    pub fn perform_action<T: Configuration>(
        &self,
        config: &mut T,
        path: &str,
        action: &str,
    ) -> Result<ActionResult, EngineError> {
        let entry = self.entry_of::<T>()?;
        let target = resolve_action_target(&entry.info.schema, path, action)?;
        let result = entry.typed::<T>()?.perform_action(config, &target, action);
        Ok(result.unwrap_or_else(ActionResult::unsupported))
    }

    /// Run a custom action on a JSON value of a configuration.
    pub fn perform_action_value(
        &self,
        id: ConfigurationId,
        value: &mut Value,
        path: &str,
        action: &str,
    ) -> Result<ActionResult, EngineError> {
        let entry = self.entry(id)?;
        let target = resolve_action_target(&entry.info.schema, path, action)?;
        let result = entry.definition.perform_action(value, &target, action)?;
        Ok(result.unwrap_or_else(ActionResult::unsupported))
    }

    // ─── Status and events ───────────────────────────────────────────

    /// Paths awaiting a restart, per configuration.
    pub fn restart_pending_for(&self) -> BTreeMap<ConfigurationId, BTreeSet<String>> {
        self.records.restart_pending_for()
    }

    pub fn restart_required(&self) -> bool {
        self.records.restart_pending()
    }

    /// Paths holding an environment override, per configuration.
    pub fn loaded_environment_variables(&self) -> BTreeMap<ConfigurationId, BTreeSet<String>> {
        self.records.loaded_environment_variables()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ConfigurationEvent> {
        self.events.subscribe()
    }
}

impl Verdict {
    fn into_errors(self) -> ErrorMap {
        match self {
            Self::Valid(_) => ErrorMap::new(),
            Self::Invalid(errors) => errors,
        }
    }
}

fn log_failures(info: &ConfigurationInfo, errors: &ErrorMap) {
    for (path, messages) in errors {
        tracing::error!(
            configuration = %info.name,
            path = %path,
            "configuration validation failed: {}",
            messages.join(", ")
        );
    }
}

fn validation_failure(operation: &'static str, info: &ConfigurationInfo, errors: ErrorMap) -> EngineError {
    EngineError::Validation(ConfigurationValidationError {
        operation,
        id: info.id,
        configuration: info.name.clone(),
        errors,
    })
}
