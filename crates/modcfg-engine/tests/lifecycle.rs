//! Load, save and persistence behavior of the configuration service.

mod common;

use std::fs;

use common::{module, service, upstream, Counter, Gateway, Server, Toggle};
use modcfg_core::{ConfigurationId, DocumentPath, ModuleInfo};
use modcfg_engine::{
    ActionResult, ConfigurationDefinition, ConfigurationEvent, ConfigurationProvider,
    CustomActionError, DefaultDefinition, EngineError, MigrationError, SaveLocation,
    StaticEnvironment,
};
use modcfg_schema::ErrorMap;
use serde_json::{json, Value};
use tempfile::TempDir;

fn read_json(path: &std::path::Path) -> Value {
    serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap()
}

// ─── Load and save ───────────────────────────────────────────────────

#[test]
fn test_first_load_writes_defaults_and_sidecar() {
    let dir = TempDir::new().unwrap();
    let service = service(&dir, StaticEnvironment::new());
    let info = service.register::<Counter>(&module()).unwrap();

    let loaded = service.load::<Counter>().unwrap();
    assert_eq!(*loaded, Counter::default());

    let path = info.path.clone().unwrap();
    assert!(path.starts_with(dir.path()));
    let stored = read_json(&path);
    assert_eq!(stored["Count"], json!(3));
    assert!(stored["$schema"].as_str().unwrap().starts_with("file://"));

    let sidecar = info.sidecar_path().unwrap();
    assert_eq!(fs::read_to_string(sidecar).unwrap(), service.get_schema(info.id).unwrap());
}

#[test]
fn test_first_key_of_stored_file_is_schema_reference() {
    let dir = TempDir::new().unwrap();
    let service = service(&dir, StaticEnvironment::new());
    let info = service.register::<Counter>(&module()).unwrap();
    service.load::<Counter>().unwrap();

    let stored = read_json(&info.path.unwrap());
    let first = stored.as_object().unwrap().keys().next().cloned();
    assert_eq!(first.as_deref(), Some("$schema"));
}

#[test]
fn test_save_persists_across_services() {
    let dir = TempDir::new().unwrap();
    {
        let service = service(&dir, StaticEnvironment::new());
        service.register::<Counter>(&module()).unwrap();
        let saved = Counter {
            count: 5,
            label: "Kept".into(),
        };
        assert!(service.save(&saved).unwrap());
    }

    let service = service(&dir, StaticEnvironment::new());
    service.register::<Counter>(&module()).unwrap();
    let loaded = service.load_copy::<Counter>().unwrap();
    assert_eq!(loaded.count, 5);
    assert_eq!(loaded.label, "Kept");
}

#[test]
fn test_identical_save_is_skipped() {
    let dir = TempDir::new().unwrap();
    let service = service(&dir, StaticEnvironment::new());
    let info = service.register::<Counter>(&module()).unwrap();
    service.load::<Counter>().unwrap();
    let mut events = service.subscribe();

    let changed = Counter {
        count: 4,
        ..Counter::default()
    };
    assert!(service.save(&changed).unwrap());
    assert_eq!(
        events.try_recv().unwrap(),
        ConfigurationEvent::Saved {
            id: info.id,
            name: info.name.clone(),
        }
    );
    assert_eq!(service.load::<Counter>().unwrap().count, 4);

    assert!(!service.save(&changed).unwrap());
    assert!(events.try_recv().is_err());
}

#[test]
fn test_invalid_save_changes_nothing() {
    let dir = TempDir::new().unwrap();
    let service = service(&dir, StaticEnvironment::new());
    let info = service.register::<Counter>(&module()).unwrap();
    service.load::<Counter>().unwrap();
    let path = info.path.unwrap();
    let before = fs::read_to_string(&path).unwrap();
    let mut events = service.subscribe();

    let err = service
        .save(&Counter {
            count: 0,
            label: "x".into(),
        })
        .unwrap_err();
    let errors = err.validation_errors().unwrap();
    assert_eq!(errors.keys().collect::<Vec<_>>(), vec!["Count"]);
    assert_eq!(errors["Count"], vec!["Number too small"]);

    assert_eq!(fs::read_to_string(&path).unwrap(), before);
    assert_eq!(*service.load::<Counter>().unwrap(), Counter::default());
    assert!(events.try_recv().is_err());
}

#[test]
fn test_malformed_file_fails_only_its_configuration() {
    let dir = TempDir::new().unwrap();
    let service = service(&dir, StaticEnvironment::new());
    let counter = service.register::<Counter>(&module()).unwrap();
    service.register::<Toggle>(&module()).unwrap();

    let path = counter.path.unwrap();
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(&path, r#"{ "Count": 9 }"#).unwrap();

    let err = service.load::<Counter>().unwrap_err();
    assert_eq!(err.validation_errors().unwrap()["Count"], vec!["Number too big"]);
    assert!(matches!(
        service.load::<Toggle>(),
        Ok(toggle) if !toggle.enabled
    ));

    fs::write(&path, "{ not json").unwrap();
    assert!(matches!(
        service.load::<Counter>(),
        Err(EngineError::Serialization { .. })
    ));
}

#[test]
fn test_outdated_sidecar_is_rewritten() {
    let dir = TempDir::new().unwrap();
    let service = service(&dir, StaticEnvironment::new());
    let info = service.register::<Counter>(&module()).unwrap();
    service.load::<Counter>().unwrap();
    let sidecar = info.sidecar_path().unwrap();
    fs::write(&sidecar, "{}").unwrap();

    service.unload(info.id).unwrap();
    service.load::<Counter>().unwrap();
    assert_eq!(fs::read_to_string(sidecar).unwrap(), service.get_schema(info.id).unwrap());
}

#[test]
fn test_unload_evicts_cached_value() {
    let dir = TempDir::new().unwrap();
    let service = service(&dir, StaticEnvironment::new());
    let info = service.register::<Toggle>(&module()).unwrap();
    assert!(!service.unload(info.id).unwrap());
    service.load::<Toggle>().unwrap();

    fs::write(info.path.as_ref().unwrap(), r#"{ "Enabled": true }"#).unwrap();
    assert!(!service.load::<Toggle>().unwrap().enabled);
    assert!(service.unload(info.id).unwrap());
    assert!(service.load::<Toggle>().unwrap().enabled);
}

// ─── Erased surface ──────────────────────────────────────────────────

#[test]
fn test_text_and_value_operations() {
    let dir = TempDir::new().unwrap();
    let service = service(&dir, StaticEnvironment::new());
    let info = service.register::<Counter>(&module()).unwrap();

    assert_eq!(service.new_value(info.id).unwrap(), json!({ "Count": 3, "Label": "Default" }));
    let errors = service.validate_text(info.id, r#"{ "Count": 9 }"#).unwrap();
    assert_eq!(errors["Count"], vec!["Number too big"]);
    assert!(service.validate_text(info.id, r#"{ "Count": 2 }"#).unwrap().is_empty());
    assert!(matches!(
        service.validate_text(info.id, "nope"),
        Err(EngineError::Serialization { .. })
    ));

    assert!(service
        .save_text(info.id, r#"{ "Count": 2, "Label": "Text" }"#)
        .unwrap());
    assert_eq!(
        service.load_value(info.id).unwrap(),
        json!({ "Count": 2, "Label": "Text" })
    );
    assert!(service
        .save_value(info.id, &json!({ "Count": 1, "Label": "Value" }))
        .unwrap());
    assert_eq!(service.load::<Counter>().unwrap().label, "Value");

    let parsed = service
        .deserialize_value(info.id, r#"{ "Count": 4, "Label": "Parsed" }"#)
        .unwrap();
    assert_eq!(parsed["Count"], json!(4));
}

#[test]
fn test_serialize_round_trip() {
    let dir = TempDir::new().unwrap();
    let service = service(&dir, StaticEnvironment::new());
    service.register::<Server>(&module()).unwrap();
    let server = Server {
        port: 443,
        threads: 9,
    };
    let text = service.serialize(&server).unwrap();
    assert_eq!(service.deserialize::<Server>(&text).unwrap(), server);
    assert!(matches!(
        service.deserialize::<Server>("[]"),
        Err(EngineError::Serialization { .. })
    ));
}

#[test]
fn test_unknown_configuration() {
    let dir = TempDir::new().unwrap();
    let service = service(&dir, StaticEnvironment::new());
    assert!(matches!(
        service.load::<Counter>(),
        Err(EngineError::UnknownConfiguration(_))
    ));
    assert!(matches!(
        service.load_value(ConfigurationId::PLACEHOLDER),
        Err(EngineError::UnknownConfiguration(_))
    ));
}

#[test]
fn test_schema_text_declares_schema_property() {
    let dir = TempDir::new().unwrap();
    let service = service(&dir, StaticEnvironment::new());
    let info = service.register::<Counter>(&module()).unwrap();
    let schema: Value = serde_json::from_str(&service.get_schema(info.id).unwrap()).unwrap();
    assert_eq!(schema["properties"]["$schema"]["type"], json!("string"));
    assert!(schema["properties"]["Count"].is_object());
}

// ─── Definitions ─────────────────────────────────────────────────────

struct CounterRules;

impl ConfigurationDefinition<Counter> for CounterRules {
    fn validate(&self, config: &Counter) -> ErrorMap {
        let mut errors = ErrorMap::new();
        if config.label == "reserved" {
            errors.insert("Label".into(), vec!["Label is reserved".into()]);
        }
        errors
    }

    fn migrate(&self, text: String) -> Result<String, MigrationError> {
        if text.contains("\"Broken\"") {
            return Err("cannot migrate".into());
        }
        Ok(text.replace("\"Amount\"", "\"Count\""))
    }

    fn perform_action(
        &self,
        config: &mut Counter,
        path: &DocumentPath,
        action: &str,
    ) -> Option<ActionResult> {
        assert!(path.is_root());
        assert_eq!(action, "Reset");
        config.count = 1;
        Some(ActionResult::new("Counter reset"))
    }
}

#[test]
fn test_custom_validation_after_structure() {
    let dir = TempDir::new().unwrap();
    let service = service(&dir, StaticEnvironment::new());
    service.register_with::<Counter>(&module(), CounterRules).unwrap();

    let reserved = Counter {
        count: 2,
        label: "reserved".into(),
    };
    assert_eq!(service.validate(&reserved).unwrap()["Label"], vec!["Label is reserved"]);
    assert!(service.save(&reserved).unwrap_err().validation_errors().is_some());

    let both = Counter {
        count: 7,
        label: "reserved".into(),
    };
    let errors = service.validate(&both).unwrap();
    assert_eq!(errors.keys().collect::<Vec<_>>(), vec!["Count"]);
}

#[test]
fn test_migration_rewrites_stored_text() {
    let dir = TempDir::new().unwrap();
    let service = service(&dir, StaticEnvironment::new());
    let info = service.register_with::<Counter>(&module(), CounterRules).unwrap();
    let path = info.path.unwrap();
    fs::create_dir_all(path.parent().unwrap()).unwrap();

    fs::write(&path, r#"{ "Amount": 2, "Label": "Old" }"#).unwrap();
    assert_eq!(service.load::<Counter>().unwrap().count, 2);

    service.unload(info.id).unwrap();
    fs::write(&path, r#"{ "Broken": true }"#).unwrap();
    assert!(matches!(
        service.load::<Counter>(),
        Err(EngineError::Migration { .. })
    ));
}

#[test]
fn test_custom_actions() {
    let dir = TempDir::new().unwrap();
    let service = service(&dir, StaticEnvironment::new());
    let info = service.register_with::<Counter>(&module(), CounterRules).unwrap();

    let mut config = Counter::default();
    let result = service.perform_action(&mut config, "", "Reset").unwrap();
    assert_eq!(result.message, "Counter reset");
    assert!(result.refresh_configuration);
    assert_eq!(config.count, 1);

    let mut value = json!({ "Count": 4, "Label": "Json" });
    service
        .perform_action_value(info.id, &mut value, "", "Reset")
        .unwrap();
    assert_eq!(value["Count"], json!(1));

    assert!(matches!(
        service.perform_action(&mut config, "", "Explode"),
        Err(EngineError::CustomAction(CustomActionError::UnknownAction { .. }))
    ));
    assert!(matches!(
        service.perform_action(&mut config, "Label", "Reset"),
        Err(EngineError::CustomAction(CustomActionError::NoActions { .. }))
    ));
}

#[test]
fn test_default_definition_does_not_support_actions() {
    let dir = TempDir::new().unwrap();
    let service = service(&dir, StaticEnvironment::new());
    service.register::<Counter>(&module()).unwrap();
    let mut config = Counter::default();
    let result = service.perform_action(&mut config, "", "Reset").unwrap();
    assert_eq!(result, ActionResult::unsupported());
    assert_eq!(config, Counter::default());
}

struct GatewayRules;

impl ConfigurationDefinition<Gateway> for GatewayRules {
    fn perform_action(
        &self,
        config: &mut Gateway,
        path: &DocumentPath,
        action: &str,
    ) -> Option<ActionResult> {
        assert_eq!(action, "Ping");
        let target = match path.to_string().as_str() {
            "Proxy" => config.proxy.as_mut()?,
            "Upstreams[0]" => config.upstreams.first_mut()?,
            _ => return None,
        };
        target.host = format!("{}:pinged", target.host);
        Some(ActionResult::new("Pong"))
    }
}

#[test]
fn test_actions_on_nested_classes() {
    let dir = TempDir::new().unwrap();
    let service = service(&dir, StaticEnvironment::new());
    service.register_with::<Gateway>(&module(), GatewayRules).unwrap();

    let mut gateway = Gateway {
        proxy: Some(upstream("h", "", 0)),
        upstreams: vec![upstream("a", "", 0)],
        ..Gateway::default()
    };
    let result = service.perform_action(&mut gateway, "Proxy", "Ping").unwrap();
    assert_eq!(result.message, "Pong");
    assert_eq!(gateway.proxy.as_ref().unwrap().host, "h:pinged");

    service.perform_action(&mut gateway, "Upstreams[0]", "Ping").unwrap();
    assert_eq!(gateway.upstreams[0].host, "a:pinged");

    assert!(matches!(
        service.perform_action(&mut gateway, "Proxy", "Reset"),
        Err(EngineError::CustomAction(CustomActionError::UnknownAction { .. }))
    ));
    assert!(matches!(
        service.perform_action(&mut gateway, "Proxy.Host", "Ping"),
        Err(EngineError::CustomAction(CustomActionError::NoActions { .. }))
    ));
}

struct Ephemeral;

impl ConfigurationDefinition<Toggle> for Ephemeral {
    fn save_location(&self) -> SaveLocation {
        SaveLocation::InMemory
    }
}

#[test]
fn test_in_memory_configuration() {
    let dir = TempDir::new().unwrap();
    let service = service(&dir, StaticEnvironment::new());
    let info = service.register_with::<Toggle>(&module(), Ephemeral).unwrap();
    assert!(info.is_in_memory());
    assert!(info.sidecar_path().is_none());

    assert!(!service.load::<Toggle>().unwrap().enabled);
    assert!(!service.save(&Toggle::default()).unwrap());
    assert!(service.save(&Toggle { enabled: true }).unwrap());

    service.unload(info.id).unwrap();
    assert!(service.load::<Toggle>().unwrap().enabled);
    assert!(fs::read_dir(dir.path()).unwrap().next().is_none());
}

// ─── Registry ────────────────────────────────────────────────────────

#[test]
fn test_duplicate_registration_rejected() {
    let dir = TempDir::new().unwrap();
    let service = service(&dir, StaticEnvironment::new());
    service.register::<Toggle>(&module()).unwrap();
    assert!(matches!(
        service.register::<Toggle>(&ModuleInfo::named("Other")),
        Err(EngineError::AlreadyRegistered { .. })
    ));
}

#[test]
fn test_infos_ordered_host_first() {
    let dir = TempDir::new().unwrap();
    let service = service(&dir, StaticEnvironment::new());
    let host = ModuleInfo::named("Server Host");
    service.attach_host_module(&host).unwrap();
    service.register::<Counter>(&ModuleInfo::named("Zeta")).unwrap();
    service.register::<Server>(&ModuleInfo::named("Alpha")).unwrap();
    service.register_host::<Toggle>(DefaultDefinition).unwrap();

    let modules: Vec<String> = service
        .configuration_infos()
        .into_iter()
        .map(|info| info.module.name)
        .collect();
    assert_eq!(modules, vec!["Server Host", "Alpha", "Zeta"]);

    let alpha = service.configuration_infos_for(ModuleInfo::named("Alpha").id);
    assert_eq!(alpha.len(), 1);
    assert_eq!(alpha[0].name, "Server");
}

#[test]
fn test_host_configuration_rekeyed_on_attach() {
    let dir = TempDir::new().unwrap();
    let service = service(&dir, StaticEnvironment::new().with("LABEL", "Env"));
    let placeholder = service.register_host::<Counter>(DefaultDefinition).unwrap();
    assert!(placeholder.id.is_placeholder());
    assert_eq!(service.load::<Counter>().unwrap().label, "Env");

    let host = ModuleInfo::named("Host");
    service.attach_host_module(&host).unwrap();
    let info = service.configuration_info_of::<Counter>().unwrap();
    assert_eq!(info.id, ConfigurationId::derive(host.id, info.type_name));
    assert_eq!(info.module, host);
    assert_ne!(info.path, placeholder.path);
    assert!(service.configuration_info(ConfigurationId::PLACEHOLDER).is_none());

    assert_eq!(service.load::<Counter>().unwrap().label, "Env");
    let overrides = service.loaded_environment_variables();
    assert!(overrides[&info.id].contains("Label"));
    assert!(!overrides.contains_key(&ConfigurationId::PLACEHOLDER));

    assert!(matches!(
        service.attach_host_module(&host),
        Err(EngineError::AlreadyInitialized)
    ));
}

// ─── Provider ────────────────────────────────────────────────────────

#[test]
fn test_provider_sees_only_its_own_saves() {
    let dir = TempDir::new().unwrap();
    let service = service(&dir, StaticEnvironment::new());
    service.register::<Counter>(&module()).unwrap();
    service.register::<Toggle>(&module()).unwrap();
    let provider = ConfigurationProvider::<Counter>::new(service.clone()).unwrap();
    provider.load().unwrap();
    service.load::<Toggle>().unwrap();

    let mut events = provider.subscribe().unwrap();
    service.save(&Toggle { enabled: true }).unwrap();
    assert!(events.try_recv().is_none());

    let mut config = provider.load_copy().unwrap();
    config.count = 5;
    assert!(provider.save(&config).unwrap());
    assert!(matches!(
        events.try_recv(),
        Some(ConfigurationEvent::Saved { name, .. }) if name == "Counter"
    ));
    assert_eq!(provider.load().unwrap().count, 5);
}

#[tokio::test]
async fn test_provider_events_await() {
    let dir = TempDir::new().unwrap();
    let service = service(&dir, StaticEnvironment::new());
    service.register::<Toggle>(&module()).unwrap();
    let provider = ConfigurationProvider::<Toggle>::new(service.clone()).unwrap();
    let mut events = provider.subscribe().unwrap();

    provider.save(&Toggle { enabled: true }).unwrap();
    let info = provider.info().unwrap();
    assert_eq!(
        events.recv().await,
        Some(ConfigurationEvent::Saved {
            id: info.id,
            name: info.name,
        })
    );
}
