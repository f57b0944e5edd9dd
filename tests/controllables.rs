use bevy_ecs::world::World;
use kestrel_scenario::controllables::{
    BuiltinCatalogLoader, Controllable, ControllableError, ControllableEvent, ControllableKind,
    ControllableLoader, ControllablesManager, JsonCatalogLoader,
};
use kestrel_scenario::dirty::DirtyFlag;
use kestrel_scenario::policy::PolicyError;
use std::cell::RefCell;
use std::future::Future;
use std::io::Write;
use std::rc::Rc;
use tempfile::NamedTempFile;

struct FailingLoader;

impl ControllableLoader for FailingLoader {
    fn load_catalog(&self) -> impl Future<Output = anyhow::Result<Vec<ControllableKind>>> {
        async { Err(anyhow::anyhow!("bundle missing")) }
    }
}

fn initialized_manager() -> ControllablesManager {
    let mut manager = ControllablesManager::new();
    pollster::block_on(manager.initialize(&BuiltinCatalogLoader)).expect("initialize");
    manager
}

#[test]
fn register_and_unregister_notify_subscribers() {
    let mut world = World::new();
    let light = world.spawn_empty().id();
    let barrier = world.spawn_empty().id();
    let dirty = DirtyFlag::new();
    let mut manager = initialized_manager().with_dirty_flag(dirty.clone());
    let events = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&events);
    manager.subscribe(move |event| sink.borrow_mut().push(event.clone()));

    manager.instantiate(light, "traffic_light").expect("instantiate light");
    manager.register(Controllable::new(barrier, "barrier", vec!["open".into(), "close".into()], "close")).unwrap();
    assert_eq!(manager.len(), 2);
    assert!(dirty.take());

    let removed = manager.unregister(light).expect("unregister light");
    assert_eq!(removed.kind(), "traffic_light");
    assert_eq!(manager.unregister(light).unwrap_err(), ControllableError::NotRegistered(light));

    assert_eq!(
        *events.borrow(),
        vec![
            ControllableEvent::Registered { entity: light, kind: "traffic_light".into() },
            ControllableEvent::Registered { entity: barrier, kind: "barrier".into() },
            ControllableEvent::Unregistered { entity: light, kind: "traffic_light".into() },
        ]
    );
    assert!(dirty.is_dirty());
}

#[test]
fn duplicate_registration_is_rejected() {
    let mut world = World::new();
    let light = world.spawn_empty().id();
    let mut manager = initialized_manager();
    manager.instantiate(light, "traffic_light").unwrap();
    assert_eq!(manager.instantiate(light, "traffic_light").unwrap_err(), ControllableError::AlreadyRegistered(light));
    assert_eq!(
        manager.instantiate(world.spawn_empty().id(), "drawbridge").unwrap_err(),
        ControllableError::UnknownKind("drawbridge".into())
    );
}

#[test]
fn initialize_runs_once_and_reports_loader_failures() {
    let mut manager = ControllablesManager::new();
    let mut world = World::new();
    assert_eq!(
        manager.instantiate(world.spawn_empty().id(), "traffic_light").unwrap_err(),
        ControllableError::NotInitialized
    );

    let err = pollster::block_on(manager.initialize(&FailingLoader)).unwrap_err();
    assert!(matches!(err, ControllableError::Load(ref message) if message.contains("bundle missing")));
    assert!(!manager.is_initialized());

    pollster::block_on(manager.initialize(&BuiltinCatalogLoader)).unwrap();
    assert_eq!(
        pollster::block_on(manager.initialize(&BuiltinCatalogLoader)).unwrap_err(),
        ControllableError::AlreadyInitialized
    );

    manager.deinitialize();
    assert!(!manager.is_initialized());
    assert!(manager.catalog().is_empty());
}

#[test]
fn deinitialize_unregisters_live_controllables() {
    let mut world = World::new();
    let light = world.spawn_empty().id();
    let barrier = world.spawn_empty().id();
    let dirty = DirtyFlag::new();
    let mut manager = initialized_manager().with_dirty_flag(dirty.clone());
    manager.instantiate(light, "traffic_light").unwrap();
    manager.instantiate(barrier, "barrier").unwrap();
    manager.copy_policy(light, "red=1".to_string());
    dirty.take();

    let events = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&events);
    manager.subscribe(move |event| sink.borrow_mut().push(event.clone()));
    manager.deinitialize();

    assert_eq!(
        *events.borrow(),
        vec![
            ControllableEvent::Unregistered { entity: light, kind: "traffic_light".into() },
            ControllableEvent::Unregistered { entity: barrier, kind: "barrier".into() },
        ]
    );
    assert_eq!(manager.len(), 0);
    assert_eq!(manager.get_copied_policy(light), None);
    assert!(!dirty.is_dirty(), "teardown is not an edit");
}

#[test]
fn missing_catalog_file_keeps_the_context_chain() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("controllables.json");
    let mut manager = ControllablesManager::new();
    let err = pollster::block_on(manager.initialize(&JsonCatalogLoader::new(path.clone()))).unwrap_err();
    let message = match err {
        ControllableError::Load(message) => message,
        other => panic!("expected a load error, got {other:?}"),
    };
    assert!(message.contains("Reading controllable catalog"), "context kept: {message}");
    assert!(message.contains("controllables.json"), "path kept: {message}");
    assert!(!manager.is_initialized());
}

#[test]
fn json_catalog_loader_reads_kinds() {
    let mut file = NamedTempFile::new().expect("temp catalog");
    write!(file, r#"[{{"key":"gate","valid_actions":["open","close"],"default_policy":"open"}}]"#)
        .expect("write catalog");
    let mut manager = ControllablesManager::new();
    pollster::block_on(manager.initialize(&JsonCatalogLoader::new(file.path()))).expect("load json catalog");
    let gate = manager.kind("gate").expect("gate kind");
    assert_eq!(gate.valid_actions, vec!["open".to_string(), "close".to_string()]);
}

#[test]
fn policies_are_validated_against_the_controllable() {
    let mut world = World::new();
    let light = world.spawn_empty().id();
    let mut manager = initialized_manager();
    manager.instantiate(light, "traffic_light").unwrap();
    assert_eq!(manager.get(light).unwrap().policy(), "green=15;yellow=3;red=20;loop");

    manager.set_policy(light, " red = 30 ; green=30; loop ").expect("valid policy");
    assert_eq!(manager.get(light).unwrap().policy(), "red=30;green=30;loop");

    let err = manager.set_policy(light, "open").unwrap_err();
    assert!(matches!(
        err,
        ControllableError::Policy { source: PolicyError::UnsupportedAction { ref action, .. }, .. } if action == "open"
    ));
    assert_eq!(manager.get(light).unwrap().policy(), "red=30;green=30;loop", "rejected policy is not stored");
}

#[test]
fn copied_policy_matches_identity_not_text() {
    let mut world = World::new();
    let light = world.spawn_empty().id();
    let twin = world.spawn_empty().id();
    let mut manager = initialized_manager();
    manager.instantiate(light, "traffic_light").unwrap();
    manager.instantiate(twin, "traffic_light").unwrap();

    let policy = manager.get(light).unwrap().policy().to_string();
    manager.copy_policy(light, policy.clone());
    assert_eq!(manager.get_copied_policy(light), Some(policy.as_str()));
    assert_eq!(manager.get_copied_policy(twin), None, "same text, different target");

    manager.unregister(light).unwrap();
    assert_eq!(manager.get_copied_policy(light), None, "unregistering clears the slot");
}
