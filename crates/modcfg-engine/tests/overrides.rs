//! Environment overrides and restart tracking through the service.

mod common;

use std::fs;

use common::{module, service, upstream, Counter, Gateway, Server};
use modcfg_engine::{ConfigurationEvent, StaticEnvironment};
use serde_json::{json, Value};
use tempfile::TempDir;

fn stored(path: &std::path::Path) -> Value {
    serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap()
}

#[test]
fn test_overridable_label_lifecycle() {
    let dir = TempDir::new().unwrap();
    let service = service(&dir, StaticEnvironment::new().with("LABEL", "Custom"));
    let info = service.register::<Counter>(&module()).unwrap();
    let path = info.path.clone().unwrap();

    let loaded = service.load::<Counter>().unwrap();
    assert_eq!(loaded.count, 3);
    assert_eq!(loaded.label, "Custom");
    assert!(path.exists());
    assert!(info.sidecar_path().unwrap().exists());
    assert_eq!(stored(&path)["Label"], json!("Default"));
    assert!(service.loaded_environment_variables()[&info.id].contains("Label"));

    let before = fs::read_to_string(&path).unwrap();
    let mut events = service.subscribe();

    let err = service
        .save(&Counter {
            count: 0,
            label: "x".into(),
        })
        .unwrap_err();
    assert_eq!(
        err.validation_errors().unwrap().keys().collect::<Vec<_>>(),
        vec!["Count"]
    );
    assert!(service.loaded_environment_variables().contains_key(&info.id));

    let unchanged = Counter {
        count: 3,
        label: "Custom".into(),
    };
    assert!(!service.save(&unchanged).unwrap());
    assert_eq!(fs::read_to_string(&path).unwrap(), before);
    assert!(events.try_recv().is_err());

    let mine = Counter {
        count: 3,
        label: "Mine".into(),
    };
    assert!(service.save(&mine).unwrap());
    assert_eq!(stored(&path)["Label"], json!("Mine"));
    assert!(!service.loaded_environment_variables().contains_key(&info.id));
}

#[test]
fn test_override_applied_once_per_process() {
    let dir = TempDir::new().unwrap();
    let service = service(&dir, StaticEnvironment::new().with("LABEL", "Custom"));
    let info = service.register::<Counter>(&module()).unwrap();
    service.load::<Counter>().unwrap();

    assert!(service.unload(info.id).unwrap());
    let err = service.load::<Counter>().unwrap_err();
    assert_eq!(
        err.validation_errors().unwrap()["Label"],
        vec!["Unable to load environment variables multiple times for the same configuration."]
    );
}

#[test]
fn test_override_reapplied_after_restart() {
    let dir = TempDir::new().unwrap();
    {
        let service = service(&dir, StaticEnvironment::new().with("LABEL", "First"));
        service.register::<Counter>(&module()).unwrap();
        assert_eq!(service.load::<Counter>().unwrap().label, "First");
    }
    let service = service(&dir, StaticEnvironment::new().with("LABEL", "Second"));
    service.register::<Counter>(&module()).unwrap();
    assert_eq!(service.load::<Counter>().unwrap().label, "Second");
}

#[test]
fn test_empty_variable_is_unset() {
    let dir = TempDir::new().unwrap();
    let service = service(&dir, StaticEnvironment::new().with("LABEL", ""));
    service.register::<Counter>(&module()).unwrap();
    assert_eq!(service.load::<Counter>().unwrap().label, "Default");
    assert!(service.loaded_environment_variables().is_empty());
}

#[test]
fn test_locked_port_cannot_be_changed() {
    let dir = TempDir::new().unwrap();
    let service = service(&dir, StaticEnvironment::new().with("PORT", "9000"));
    let info = service.register::<Server>(&module()).unwrap();
    let path = info.path.clone().unwrap();

    let loaded = service.load_copy::<Server>().unwrap();
    assert_eq!(loaded.port, 9000);
    assert!(!service.save(&loaded).unwrap());
    assert_eq!(stored(&path)["Port"], json!(8080));

    let err = service
        .save(&Server {
            port: 8000,
            ..loaded
        })
        .unwrap_err();
    assert_eq!(
        err.validation_errors().unwrap()["Port"],
        vec!["Unable to set value when an environment variable override is in use."]
    );
    assert_eq!(stored(&path)["Port"], json!(8080));
    assert_eq!(service.load::<Server>().unwrap().port, 9000);
}

#[test]
fn test_unparsable_override_fails_load() {
    let dir = TempDir::new().unwrap();
    let service = service(&dir, StaticEnvironment::new().with("PORT", "high"));
    service.register::<Server>(&module()).unwrap();
    let err = service.load::<Server>().unwrap_err();
    assert_eq!(
        err.validation_errors().unwrap()["Port"],
        vec!["Failed to parse environment variable."]
    );
    assert!(service.loaded_environment_variables().is_empty());
}

#[test]
fn test_restart_requirement_transitions() {
    let dir = TempDir::new().unwrap();
    let service = service(&dir, StaticEnvironment::new());
    let info = service.register::<Server>(&module()).unwrap();
    service.load::<Server>().unwrap();
    let mut events = service.subscribe();
    let saved = ConfigurationEvent::Saved {
        id: info.id,
        name: info.name.clone(),
    };

    assert!(service.save(&Server { port: 8080, threads: 4 }).unwrap());
    assert_eq!(events.try_recv().unwrap(), saved);
    assert_eq!(
        events.try_recv().unwrap(),
        ConfigurationEvent::RestartRequiredChanged { required: true }
    );
    assert!(service.restart_required());
    assert!(service.restart_pending_for()[&info.id].contains("Threads"));

    assert!(service.save(&Server { port: 8080, threads: 6 }).unwrap());
    assert_eq!(events.try_recv().unwrap(), saved);
    assert!(events.try_recv().is_err());

    assert!(service.save(&Server { port: 8080, threads: 2 }).unwrap());
    assert_eq!(events.try_recv().unwrap(), saved);
    assert_eq!(
        events.try_recv().unwrap(),
        ConfigurationEvent::RestartRequiredChanged { required: false }
    );
    assert!(!service.restart_required());
    assert!(service.restart_pending_for().is_empty());
}

#[test]
fn test_non_restart_members_do_not_require_restart() {
    let dir = TempDir::new().unwrap();
    let service = service(&dir, StaticEnvironment::new());
    service.register::<Server>(&module()).unwrap();
    service.load::<Server>().unwrap();
    assert!(service.save(&Server { port: 9090, threads: 2 }).unwrap());
    assert!(!service.restart_required());
}

// ─── Nested classes ──────────────────────────────────────────────────

#[test]
fn test_null_optional_class_records_no_overrides() {
    let dir = TempDir::new().unwrap();
    let env = || StaticEnvironment::new().with("UPSTREAM_LABEL", "x");
    let service = service(&dir, env());
    let info = service.register::<Gateway>(&module()).unwrap();
    let path = info.path.clone().unwrap();

    let loaded = service.load_copy::<Gateway>().unwrap();
    assert_eq!(loaded.proxy, None);
    assert_eq!(stored(&path)["Proxy"], Value::Null);
    assert!(service.loaded_environment_variables().is_empty());

    let with_proxy = Gateway {
        proxy: Some(upstream("h", "x", 0)),
        ..loaded
    };
    assert!(service.save(&with_proxy).unwrap());
    assert_eq!(
        stored(&path)["Proxy"],
        json!({ "Host": "h", "Label": "x", "Weight": 0 })
    );

    drop(service);
    let service = common::service(&dir, env());
    let info = service.register::<Gateway>(&module()).unwrap();
    assert_eq!(service.load_copy::<Gateway>().unwrap(), with_proxy);
    assert!(service.loaded_environment_variables()[&info.id].contains("Proxy.Label"));
}

#[test]
fn test_present_optional_class_keeps_stored_value() {
    let dir = TempDir::new().unwrap();
    let stored_gateway = Gateway {
        proxy: Some(upstream("h", "mine", 0)),
        ..Gateway::default()
    };
    {
        let service = service(&dir, StaticEnvironment::new());
        service.register::<Gateway>(&module()).unwrap();
        service.load::<Gateway>().unwrap();
        assert!(service.save(&stored_gateway).unwrap());
    }

    let service = service(&dir, StaticEnvironment::new().with("UPSTREAM_LABEL", "env"));
    let info = service.register::<Gateway>(&module()).unwrap();
    let path = info.path.clone().unwrap();
    let loaded = service.load_copy::<Gateway>().unwrap();
    assert_eq!(loaded.proxy.as_ref().unwrap().label, "env");

    assert!(!service.save(&loaded).unwrap());
    assert_eq!(stored(&path)["Proxy"]["Label"], json!("mine"));
}

#[test]
fn test_overrides_inside_class_lists() {
    let dir = TempDir::new().unwrap();
    {
        let service = service(&dir, StaticEnvironment::new());
        service.register::<Gateway>(&module()).unwrap();
        service.load::<Gateway>().unwrap();
        let gateway = Gateway {
            upstreams: vec![upstream("a", "one", 0), upstream("b", "two", 0)],
            ..Gateway::default()
        };
        assert!(service.save(&gateway).unwrap());
    }

    let service = service(&dir, StaticEnvironment::new().with("UPSTREAM_LABEL", "env"));
    let info = service.register::<Gateway>(&module()).unwrap();
    let path = info.path.clone().unwrap();
    let loaded = service.load_copy::<Gateway>().unwrap();
    assert!(loaded.upstreams.iter().all(|item| item.label == "env"));
    let recorded = service.loaded_environment_variables();
    assert!(recorded[&info.id].contains("Upstreams[0].Label"));
    assert!(recorded[&info.id].contains("Upstreams[1].Label"));

    assert!(!service.save(&loaded).unwrap());
    assert_eq!(stored(&path)["Upstreams"][0]["Label"], json!("one"));
    assert_eq!(stored(&path)["Upstreams"][1]["Label"], json!("two"));
}

#[test]
fn test_restart_tracking_inside_class_lists() {
    let dir = TempDir::new().unwrap();
    let gateway = Gateway {
        upstreams: vec![upstream("a", "one", 0)],
        ..Gateway::default()
    };
    {
        let service = service(&dir, StaticEnvironment::new());
        service.register::<Gateway>(&module()).unwrap();
        service.load::<Gateway>().unwrap();
        assert!(service.save(&gateway).unwrap());
    }

    let service = service(&dir, StaticEnvironment::new());
    let info = service.register::<Gateway>(&module()).unwrap();
    service.load::<Gateway>().unwrap();
    assert!(!service.restart_required());

    let heavier = Gateway {
        upstreams: vec![upstream("a", "one", 5)],
        ..Gateway::default()
    };
    assert!(service.save(&heavier).unwrap());
    assert!(service.restart_required());
    assert!(service.restart_pending_for()[&info.id].contains("Upstreams[0].Weight"));

    assert!(service.save(&gateway).unwrap());
    assert!(!service.restart_required());
}
