//! Loads this crate's compiled cdylib through the dynamic library backend

use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use void_bridge::prelude::*;
use void_bridge::registry::construct_instance;
use void_bridge_scripts::{PlayerController, MODULE_NAME};

/// The cdylib cargo built next to this test binary
fn compiled_module() -> PathBuf {
    let file_name = format!(
        "{}{}{}",
        std::env::consts::DLL_PREFIX,
        MODULE_NAME,
        std::env::consts::DLL_SUFFIX
    );
    let exe = std::env::current_exe().unwrap();
    let deps = exe.parent().unwrap();
    let profile = deps.parent().unwrap();

    [profile.join(&file_name), deps.join(&file_name)]
        .into_iter()
        .find(|candidate| candidate.is_file())
        .unwrap_or_else(|| panic!("{} was not built into {}", file_name, profile.display()))
}

type Store = Arc<Mutex<HashMap<EntityId, Transform>>>;

fn bridge(shadow_dir: &Path) -> (ScriptBridge, Store) {
    let mut config = BridgeConfig::default();
    config.module.shadow_copy = true;
    config.module.shadow_dir = Some(shadow_dir.to_path_buf());
    config.hot_reload.enabled = false;

    let bridge = ScriptBridge::new(config);
    let store: Store = Arc::default();
    let read = store.clone();
    bridge
        .interop()
        .set_get_transform(move |id| read.lock().get(&id).copied().unwrap_or_default());
    let write = store.clone();
    bridge.interop().set_set_transform(move |id, t| {
        write.lock().insert(id, *t);
    });
    (bridge, store)
}

fn shadow_files(dir: &Path) -> usize {
    std::fs::read_dir(dir).map(|entries| entries.count()).unwrap_or(0)
}

#[test]
fn test_dylib_session_with_reload() {
    let shadow_dir = tempfile::tempdir().unwrap();
    let (mut bridge, store) = bridge(shadow_dir.path());
    let module = compiled_module();
    let id = EntityId::new(7);

    let info = bridge.load_script_module(&module).unwrap();
    assert_eq!(info.name, MODULE_NAME);
    assert_eq!(info.types.len(), 3);
    assert!(info.types.contains(&PlayerController::TYPE_NAME.to_string()));
    assert_eq!(shadow_files(shadow_dir.path()), 1);

    assert_eq!(
        bridge.create_entity_instance(id, PlayerController::TYPE_NAME).unwrap(),
        CreateOutcome::Constructed
    );
    bridge.start_all();
    bridge.update_all(0.5);

    let report = bridge.reload_script_module().unwrap();
    assert_eq!(report.unload, UnloadOutcome::Reclaimed);
    assert_eq!(report.recreated, 1);
    assert_eq!(report.restored, 1);
    assert_eq!(shadow_files(shadow_dir.path()), 1);

    bridge.update_all(0.5);
    let position = store.lock()[&id].position;
    assert!(position.distance(PlayerController::orbit_position(1.0, 1.0)) < 1e-5);

    bridge.stop_all();
    bridge.clear_all();
    assert_eq!(bridge.unload_script_module(), UnloadOutcome::Reclaimed);
    assert_eq!(shadow_files(shadow_dir.path()), 0);
}

#[test]
fn test_dylib_instance_pins_library() {
    let shadow_dir = tempfile::tempdir().unwrap();
    let (mut bridge, store) = bridge(shadow_dir.path());
    let id = EntityId::new(7);
    bridge.load_script_module(compiled_module()).unwrap();

    let resolved = bridge.types().resolve(PlayerController::TYPE_NAME).unwrap();
    let (instance, _) = construct_instance(&resolved, id).unwrap();
    drop(resolved);
    bridge.register_instance(id, instance);

    assert_eq!(
        bridge.unload_script_module(),
        UnloadOutcome::Pinned { live_references: 1 }
    );
    // The library stays mapped while the entry lives
    bridge.update(id, 0.5).unwrap();
    assert!(store.lock().contains_key(&id));
    assert_eq!(shadow_files(shadow_dir.path()), 1);

    bridge.unregister_entity(id);
    assert_eq!(bridge.loader().live_contexts(), 0);
    assert_eq!(shadow_files(shadow_dir.path()), 0);
}
