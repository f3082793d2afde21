//! Integration tests for void_bridge_scripts driven through the bridge

use std::collections::HashMap;
use std::path::PathBuf;
use parking_lot::Mutex;
use std::sync::Arc;
use void_bridge::prelude::*;
use void_bridge::ffi::{FfiModuleInfo, VOID_BRIDGE_API_VERSION};
use void_bridge::{StaticBackend, StaticModule, TypeDescriptor};
use void_bridge_scripts::{PlayerController, RotatingEntity, Test, MODULE_NAME};

type Store = Arc<Mutex<HashMap<EntityId, Transform>>>;

struct Harness {
    _dir: tempfile::TempDir,
    module_path: PathBuf,
    store: Store,
    log: Arc<Mutex<Vec<String>>>,
    bridge: ScriptBridge,
}

fn harness() -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let module_path = dir.path().join("void_bridge_scripts.module");
    std::fs::write(&module_path, b"").unwrap();

    let backend = StaticBackend::new().with_module(
        &module_path,
        StaticModule::new(MODULE_NAME, void_bridge_scripts::register),
    );
    let mut bridge = ScriptBridge::with_backend(BridgeConfig::default(), Box::new(backend));

    let store: Store = Arc::default();
    let read = store.clone();
    bridge
        .interop()
        .set_get_transform(move |id| read.lock().get(&id).copied().unwrap_or_default());
    let write = store.clone();
    bridge.interop().set_set_transform(move |id, t| {
        write.lock().insert(id, *t);
    });
    let log: Arc<Mutex<Vec<String>>> = Arc::default();
    let sink = log.clone();
    bridge
        .interop()
        .set_log(move |line| sink.lock().push(line.to_string()));

    bridge.load_script_module(&module_path).unwrap();

    Harness {
        _dir: dir,
        module_path,
        store,
        log,
        bridge,
    }
}

fn position(h: &Harness, id: EntityId) -> Vec3 {
    h.store.lock().get(&id).copied().unwrap_or_default().position
}

fn assert_near(actual: Vec3, expected: Vec3) {
    assert!(
        actual.distance(expected) < 1e-5,
        "expected {} but got {}",
        expected,
        actual
    );
}

#[test]
fn test_player_controller_moves_continuously() {
    let mut h = harness();
    let id = EntityId::new(7);

    h.bridge.create_entity_instance(id, PlayerController::TYPE_NAME).unwrap();

    h.bridge.update(id, 0.5).unwrap();
    let first = position(&h, id);
    assert_near(first, PlayerController::orbit_position(0.5, 1.0));

    h.bridge.update(id, 0.5).unwrap();
    let second = position(&h, id);
    assert_near(second, PlayerController::orbit_position(1.0, 1.0));

    // Half a second along a radius-2 orbit at 1 rad/s is a 1 unit arc
    assert!(first.distance(second) <= 1.0);
    assert!(first.distance(second) > 0.9);
}

#[test]
fn test_rotating_entity_turns_45_degrees_per_second() {
    let mut h = harness();
    let id = EntityId::new(3);

    assert_eq!(
        h.bridge.create_entity_instance(id, "RotatingEntity").unwrap(),
        CreateOutcome::Constructed
    );
    h.bridge.start(id).unwrap();
    h.bridge.update(id, 1.0).unwrap();
    h.bridge.update(id, 1.0).unwrap();

    let rotation = h.store.lock()[&id].rotation;
    assert_eq!(rotation, Vec3::new(0.0, 90.0, 0.0));
    assert_eq!(h.bridge.registry().type_name_of(id), Some(RotatingEntity::TYPE_NAME));
}

#[test]
fn test_lifecycle_logs_go_through_host_sink() {
    let mut h = harness();
    let id = EntityId::new(7);
    h.bridge.create_entity_instance(id, PlayerController::TYPE_NAME).unwrap();

    h.bridge.start(id).unwrap();
    h.bridge.stop(id).unwrap();

    let log = h.log.lock();
    assert_eq!(log[0], "[Entity 7] PlayerController started!");
    assert_eq!(log[1], "[Entity 7] Initial Position: (0, 0, 0)");
    assert_eq!(log[2], "[Entity 7] PlayerController stopped!");
}

#[test]
fn test_helper_type_is_not_instantiable() {
    let mut h = harness();
    let err = h
        .bridge
        .create_entity_instance(EntityId::new(1), Test::TYPE_NAME)
        .unwrap_err();

    assert!(matches!(err, BridgeError::TypeMismatch(_)));
    assert!(h.bridge.registry().is_empty());
}

#[test]
fn test_describe_helper_type() {
    let h = harness();
    let json = h.bridge.describe_type_json(Test::TYPE_NAME);
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();

    assert_eq!(value["Name"], "Test");
    assert_eq!(value["FullName"], Test::TYPE_NAME);
    let methods: Vec<&str> = value["Methods"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["Name"].as_str().unwrap())
        .collect();
    assert_eq!(methods, vec!["test_method", "add", "greet", "log_message"]);
}

#[test]
fn test_reload_keeps_player_on_its_orbit() {
    let mut h = harness();
    let id = EntityId::new(7);
    h.bridge.create_entity_instance(id, PlayerController::TYPE_NAME).unwrap();
    h.bridge.start_all();
    h.bridge.update_all(0.5);

    let report = h.bridge.reload_script_module().unwrap();
    assert_eq!(report.unload, UnloadOutcome::Reclaimed);
    assert_eq!(report.restored, 1);
    assert_eq!(report.module.path, h.module_path);

    h.bridge.update_all(0.5);
    assert_near(position(&h, id), PlayerController::orbit_position(1.0, 1.0));
}

#[test]
fn test_full_session() {
    let mut h = harness();
    for (raw, type_name) in [(1, PlayerController::TYPE_NAME), (2, RotatingEntity::TYPE_NAME), (3, "Missing.Type")] {
        h.bridge.create_entity_instance(EntityId::new(raw), type_name).unwrap();
    }

    assert_eq!(h.bridge.start_all(), 0);
    for _ in 0..10 {
        assert_eq!(h.bridge.update_all(1.0 / 60.0), 0);
    }
    assert_eq!(h.bridge.stop_all(), 0);

    h.bridge.clear_all();
    assert_eq!(h.bridge.unload_script_module(), UnloadOutcome::Reclaimed);
    assert_eq!(h.bridge.unload_script_module(), UnloadOutcome::NotLoaded);
}

#[test]
fn test_exported_module_symbols() {
    let info: FfiModuleInfo = void_bridge_scripts::void_script_module_info();
    assert_eq!(info.api_version, VOID_BRIDGE_API_VERSION);
    let name = unsafe { std::ffi::CStr::from_ptr(info.name) };
    assert_eq!(name.to_str().unwrap(), MODULE_NAME);

    let mut catalog = TypeCatalog::new();
    assert!(unsafe { void_bridge_scripts::void_script_module_register(&mut catalog) });
    let descriptor: &TypeDescriptor = &catalog.get("PlayerController").unwrap().descriptor;
    assert_eq!(descriptor.full_name, PlayerController::TYPE_NAME);
    assert_eq!(catalog.len(), 3);
}
