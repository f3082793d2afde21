//! C ABI for native hosts
//!
//! Every export takes the bridge pointer returned by [`void_bridge_create`],
//! rejects null pointers and catches panics, so no Rust unwinding reaches
//! the host.

use crate::bridge::ScriptBridge;
use crate::config::BridgeConfig;
use crate::entity::EntityId;
use crate::ffi::FfiInteropTable;
use crate::guard::catch_panic;
use crate::interop::string_from_host;
use crate::module::UnloadOutcome;
use crate::registry::CreateOutcome;
use std::ffi::c_char;
use std::path::PathBuf;

/// `void_bridge_unload_script_module` result: nothing was loaded
pub const VOID_BRIDGE_UNLOAD_NOT_LOADED: i32 = 0;
/// `void_bridge_unload_script_module` result: module released
pub const VOID_BRIDGE_UNLOAD_RECLAIMED: i32 = 1;
/// `void_bridge_unload_script_module` result: module still pinned by live entities
pub const VOID_BRIDGE_UNLOAD_PINNED: i32 = 2;
/// `void_bridge_create_entity_instance` result: the script type was built
pub const VOID_BRIDGE_CREATE_CONSTRUCTED: i32 = 0;
/// `void_bridge_create_entity_instance` result: type not found, base entity registered
pub const VOID_BRIDGE_CREATE_FALLBACK: i32 = 1;
/// `void_bridge_create_entity_instance` result: registered with a conflicting sealed identity
pub const VOID_BRIDGE_CREATE_DEGRADED: i32 = 2;
/// Invalid bridge pointer, rejected type, or internal failure
pub const VOID_BRIDGE_ERROR: i32 = -1;

fn with_bridge<R>(bridge: *mut ScriptBridge, fallback: R, f: impl FnOnce(&mut ScriptBridge) -> R) -> R {
    // Safety: the host passes a pointer from `void_bridge_create` and
    // serializes calls into the bridge
    let Some(bridge) = (unsafe { bridge.as_mut() }) else {
        log::error!("Null bridge pointer passed across the C ABI");
        return fallback;
    };
    match catch_panic(|| f(bridge)) {
        Ok(result) => result,
        Err(message) => {
            log::error!("Panic inside the script bridge: {}", message);
            fallback
        }
    }
}

/// Create a bridge. `config_path` may be null for defaults; environment
/// overrides apply either way. Returns null on failure.
#[no_mangle]
pub unsafe extern "C" fn void_bridge_create(config_path: *const c_char) -> *mut ScriptBridge {
    let config_path = string_from_host(config_path).map(PathBuf::from);

    let created = catch_panic(|| {
        let config = match BridgeConfig::load(config_path.as_deref()) {
            Ok(config) => config,
            Err(e) => {
                log::error!("Failed to load bridge config: {}", e);
                return std::ptr::null_mut();
            }
        };

        #[cfg(feature = "hot-reload")]
        let hot_reload = config.hot_reload.enabled;
        #[cfg_attr(not(feature = "hot-reload"), allow(unused_mut))]
        let mut bridge = ScriptBridge::new(config);

        #[cfg(feature = "hot-reload")]
        {
            if hot_reload {
                if let Err(e) = bridge.enable_hot_reload() {
                    log::warn!("Hot-reload unavailable: {}", e);
                }
            }
        }

        Box::into_raw(Box::new(bridge))
    });

    created.unwrap_or(std::ptr::null_mut())
}

/// Shut down and free a bridge
#[no_mangle]
pub unsafe extern "C" fn void_bridge_destroy(bridge: *mut ScriptBridge) {
    if bridge.is_null() {
        return;
    }
    let bridge = Box::from_raw(bridge);
    if let Err(message) = catch_panic(move || drop(bridge)) {
        log::error!("Panic while destroying the script bridge: {}", message);
    }
}

/// Install the host callbacks. The table is copied; `user_data` must stay
/// valid until `void_bridge_clear_interop` or `void_bridge_destroy`.
#[no_mangle]
pub unsafe extern "C" fn void_bridge_set_interop(bridge: *mut ScriptBridge, table: *const FfiInteropTable) -> bool {
    let Some(table) = table.as_ref().copied() else {
        return false;
    };
    with_bridge(bridge, false, |bridge| {
        bridge.interop().install_ffi(table);
        true
    })
}

#[no_mangle]
pub extern "C" fn void_bridge_clear_interop(bridge: *mut ScriptBridge) {
    with_bridge(bridge, (), |bridge| bridge.interop().clear());
}

/// Create and register a script instance.
///
/// Returns one of the `VOID_BRIDGE_CREATE_*` codes; negative means nothing
/// was registered.
#[no_mangle]
pub unsafe extern "C" fn void_bridge_create_entity_instance(
    bridge: *mut ScriptBridge,
    entity: u64,
    type_name: *const c_char,
) -> i32 {
    let Some(type_name) = string_from_host(type_name) else {
        return VOID_BRIDGE_ERROR;
    };
    with_bridge(bridge, VOID_BRIDGE_ERROR, |bridge| {
        match bridge.create_entity_instance(EntityId::new(entity), &type_name) {
            Ok(CreateOutcome::Constructed | CreateOutcome::Injected) => VOID_BRIDGE_CREATE_CONSTRUCTED,
            Ok(CreateOutcome::Fallback) => VOID_BRIDGE_CREATE_FALLBACK,
            Ok(CreateOutcome::Degraded { .. }) => VOID_BRIDGE_CREATE_DEGRADED,
            Err(_) => VOID_BRIDGE_ERROR,
        }
    })
}

#[no_mangle]
pub extern "C" fn void_bridge_unregister_entity(bridge: *mut ScriptBridge, entity: u64) -> bool {
    with_bridge(bridge, false, |bridge| bridge.unregister_entity(EntityId::new(entity)))
}

#[no_mangle]
pub extern "C" fn void_bridge_start(bridge: *mut ScriptBridge, entity: u64) -> bool {
    with_bridge(bridge, false, |bridge| bridge.start(EntityId::new(entity)).is_ok())
}

#[no_mangle]
pub extern "C" fn void_bridge_update(bridge: *mut ScriptBridge, entity: u64, delta_time: f32) -> bool {
    with_bridge(bridge, false, |bridge| bridge.update(EntityId::new(entity), delta_time).is_ok())
}

#[no_mangle]
pub extern "C" fn void_bridge_stop(bridge: *mut ScriptBridge, entity: u64) -> bool {
    with_bridge(bridge, false, |bridge| bridge.stop(EntityId::new(entity)).is_ok())
}

#[no_mangle]
pub extern "C" fn void_bridge_clear_all(bridge: *mut ScriptBridge) {
    with_bridge(bridge, (), ScriptBridge::clear_all);
}

#[no_mangle]
pub unsafe extern "C" fn void_bridge_load_script_module(bridge: *mut ScriptBridge, path: *const c_char) -> bool {
    let Some(path) = string_from_host(path) else {
        return false;
    };
    with_bridge(bridge, false, |bridge| match bridge.load_script_module(&path) {
        Ok(_) => true,
        Err(e) => {
            log::error!("{}", e);
            false
        }
    })
}

/// Returns one of the `VOID_BRIDGE_UNLOAD_*` codes, or `VOID_BRIDGE_ERROR`
#[no_mangle]
pub extern "C" fn void_bridge_unload_script_module(bridge: *mut ScriptBridge) -> i32 {
    with_bridge(bridge, VOID_BRIDGE_ERROR, |bridge| match bridge.unload_script_module() {
        UnloadOutcome::NotLoaded => VOID_BRIDGE_UNLOAD_NOT_LOADED,
        UnloadOutcome::Reclaimed => VOID_BRIDGE_UNLOAD_RECLAIMED,
        UnloadOutcome::Pinned { .. } => VOID_BRIDGE_UNLOAD_PINNED,
    })
}

/// Write the JSON description of a type into `buffer`.
///
/// Returns the required size including the NUL terminator; pass a null
/// buffer or zero size to query it. Returns 0 on invalid arguments.
#[no_mangle]
pub unsafe extern "C" fn void_bridge_describe_type(
    bridge: *mut ScriptBridge,
    type_name: *const c_char,
    buffer: *mut u8,
    buffer_size: usize,
) -> usize {
    let Some(type_name) = string_from_host(type_name) else {
        return 0;
    };
    let buffer = if buffer.is_null() || buffer_size == 0 {
        None
    } else {
        Some(std::slice::from_raw_parts_mut(buffer, buffer_size))
    };
    with_bridge(bridge, 0, |bridge| bridge.describe_type(&type_name, buffer))
}

/// Reload the module if its file changed; true when a reload succeeded
#[cfg(feature = "hot-reload")]
#[no_mangle]
pub extern "C" fn void_bridge_poll_hot_reload(bridge: *mut ScriptBridge) -> bool {
    with_bridge(bridge, false, |bridge| match bridge.poll_hot_reload() {
        Some(Ok(_)) => true,
        Some(Err(e)) => {
            log::error!("{}", e);
            false
        }
        None => false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::BaseEntity;
    use std::ffi::CString;

    fn new_bridge() -> *mut ScriptBridge {
        Box::into_raw(Box::new(ScriptBridge::new(BridgeConfig::default())))
    }

    #[test]
    fn test_null_bridge_is_rejected() {
        let null = std::ptr::null_mut();
        let name = CString::new("Anything").unwrap();

        assert!(!void_bridge_start(null, 1));
        assert!(!void_bridge_update(null, 1, 0.1));
        assert!(!void_bridge_stop(null, 1));
        assert_eq!(void_bridge_unload_script_module(null), VOID_BRIDGE_ERROR);
        unsafe {
            assert_eq!(void_bridge_create_entity_instance(null, 1, name.as_ptr()), VOID_BRIDGE_ERROR);
            assert_eq!(void_bridge_describe_type(null, name.as_ptr(), std::ptr::null_mut(), 0), 0);
            void_bridge_destroy(null);
        }
        void_bridge_clear_all(null);
    }

    #[test]
    fn test_entity_round_trip() {
        let bridge = new_bridge();
        let name = CString::new("Unknown.Type").unwrap();

        unsafe {
            assert_eq!(
                void_bridge_create_entity_instance(bridge, 3, name.as_ptr()),
                VOID_BRIDGE_CREATE_FALLBACK
            );
            assert_eq!(
                void_bridge_create_entity_instance(bridge, 4, std::ptr::null()),
                VOID_BRIDGE_ERROR
            );
        }
        assert!(void_bridge_start(bridge, 3));
        assert!(void_bridge_update(bridge, 3, 0.016));
        assert!(void_bridge_stop(bridge, 3));
        assert!(!void_bridge_update(bridge, 99, 0.016));
        assert!(void_bridge_unregister_entity(bridge, 3));
        assert!(!void_bridge_unregister_entity(bridge, 3));
        assert_eq!(void_bridge_unload_script_module(bridge), VOID_BRIDGE_UNLOAD_NOT_LOADED);

        unsafe { void_bridge_destroy(bridge) };
    }

    #[test]
    fn test_describe_type_size_then_fill() {
        let bridge = new_bridge();
        let name = CString::new(BaseEntity::TYPE_NAME).unwrap();

        unsafe {
            let required = void_bridge_describe_type(bridge, name.as_ptr(), std::ptr::null_mut(), 0);
            assert!(required > 1);

            let mut buffer = vec![0u8; required];
            let written = void_bridge_describe_type(bridge, name.as_ptr(), buffer.as_mut_ptr(), buffer.len());
            assert_eq!(written, required);
            assert_eq!(buffer[required - 1], 0);
            assert!(std::str::from_utf8(&buffer[..required - 1]).unwrap().contains("\"FullName\""));

            void_bridge_destroy(bridge);
        }
    }

    #[test]
    fn test_create_reports_outcome() {
        let bridge = new_bridge();
        let base = CString::new(BaseEntity::TYPE_NAME).unwrap();
        let missing = CString::new("Game.Missing").unwrap();

        unsafe {
            assert_eq!(
                void_bridge_create_entity_instance(bridge, 1, base.as_ptr()),
                VOID_BRIDGE_CREATE_CONSTRUCTED
            );
            assert_eq!(
                void_bridge_create_entity_instance(bridge, 2, missing.as_ptr()),
                VOID_BRIDGE_CREATE_FALLBACK
            );
            assert!((*bridge).registry().contains(EntityId::new(2)));
            void_bridge_destroy(bridge);
        }
    }

    #[test]
    fn test_load_missing_module_fails() {
        let bridge = new_bridge();
        let path = CString::new("/no/such/dir/scripts.so").unwrap();

        unsafe {
            assert!(!void_bridge_load_script_module(bridge, path.as_ptr()));
            assert!(!void_bridge_load_script_module(bridge, std::ptr::null()));
            void_bridge_destroy(bridge);
        }
    }
}
