//! Interop table: host-supplied callbacks into host-owned state
//!
//! The host is the source of truth for transforms. Scripts never cache a
//! transform; every read and write goes through these slots. An empty slot
//! degrades gracefully: reads return [`Transform::IDENTITY`], writes are
//! skipped, component queries answer `false` and log lines go to the `log`
//! facade.

use crate::entity::EntityId;
use crate::ffi::{FfiInteropTable, Transform};
use parking_lot::RwLock;
use std::ffi::{c_void, CStr, CString};
use std::sync::Arc;

/// Transform getter slot
pub type GetTransformSlot = Arc<dyn Fn(EntityId) -> Transform + Send + Sync>;
/// Transform setter slot
pub type SetTransformSlot = Arc<dyn Fn(EntityId, &Transform) + Send + Sync>;
/// Component query slot
pub type HasComponentSlot = Arc<dyn Fn(EntityId, &str) -> bool + Send + Sync>;
/// Log sink slot
pub type LogSlot = Arc<dyn Fn(&str) + Send + Sync>;

/// Process-scoped set of host callback slots
#[derive(Default)]
pub struct InteropTable {
    get_transform: RwLock<Option<GetTransformSlot>>,
    set_transform: RwLock<Option<SetTransformSlot>>,
    has_component: RwLock<Option<HasComponentSlot>>,
    log: RwLock<Option<LogSlot>>,
}

impl InteropTable {
    /// Create a table with every slot empty
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a shared, empty table
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    // ========== Slot Installation ==========

    pub fn set_get_transform(&self, f: impl Fn(EntityId) -> Transform + Send + Sync + 'static) {
        *self.get_transform.write() = Some(Arc::new(f));
    }

    pub fn set_set_transform(&self, f: impl Fn(EntityId, &Transform) + Send + Sync + 'static) {
        *self.set_transform.write() = Some(Arc::new(f));
    }

    pub fn set_has_component(&self, f: impl Fn(EntityId, &str) -> bool + Send + Sync + 'static) {
        *self.has_component.write() = Some(Arc::new(f));
    }

    pub fn set_log(&self, f: impl Fn(&str) + Send + Sync + 'static) {
        *self.log.write() = Some(Arc::new(f));
    }

    /// Install every slot from a C table, replacing what was there.
    ///
    /// # Safety
    /// `table.user_data` and every function pointer must stay valid until
    /// [`InteropTable::clear`] is called or the slots are replaced.
    pub unsafe fn install_ffi(&self, table: FfiInteropTable) {
        let user_data = UserData(table.user_data);

        *self.get_transform.write() = table.get_transform.map(|f| {
            Arc::new(move |id: EntityId| {
                let mut out = Transform::IDENTITY;
                f(user_data.ptr(), id.raw(), &mut out);
                out
            }) as GetTransformSlot
        });

        *self.set_transform.write() = table.set_transform.map(|f| {
            Arc::new(move |id: EntityId, t: &Transform| {
                f(user_data.ptr(), id.raw(), t as *const Transform);
            }) as SetTransformSlot
        });

        *self.has_component.write() = table.has_component.map(|f| {
            Arc::new(move |id: EntityId, kind: &str| match CString::new(kind) {
                Ok(kind) => f(user_data.ptr(), id.raw(), kind.as_ptr()),
                Err(_) => false,
            }) as HasComponentSlot
        });

        *self.log.write() = table.log.map(|f| {
            Arc::new(move |message: &str| {
                // Interior NULs would truncate the line on the host side
                let sanitized = message.replace('\0', "\u{FFFD}");
                if let Ok(message) = CString::new(sanitized) {
                    f(user_data.ptr(), message.as_ptr());
                }
            }) as LogSlot
        });

        log::info!("Installed host interop table ({})", self.describe_slots());
    }

    /// Empty every slot.
    ///
    /// Must happen after the registry is cleared and before the script
    /// module is unloaded.
    pub fn clear(&self) {
        *self.get_transform.write() = None;
        *self.set_transform.write() = None;
        *self.has_component.write() = None;
        *self.log.write() = None;
        log::debug!("Cleared host interop table");
    }

    /// Both transform slots are wired
    pub fn is_initialized(&self) -> bool {
        self.get_transform.read().is_some() && self.set_transform.read().is_some()
    }

    // ========== Slot Calls ==========

    /// Read the host transform, or identity when the slot is empty
    pub fn get_transform(&self, id: EntityId) -> Transform {
        let slot = self.get_transform.read().clone();
        match slot {
            Some(f) => f(id),
            None => Transform::IDENTITY,
        }
    }

    /// Write the host transform; skipped when the slot is empty
    pub fn set_transform(&self, id: EntityId, transform: &Transform) {
        let slot = self.set_transform.read().clone();
        if let Some(f) = slot {
            f(id, transform);
        }
    }

    /// Ask the host whether `id` carries a component of `kind`
    pub fn has_component(&self, id: EntityId, kind: &str) -> bool {
        let slot = self.has_component.read().clone();
        slot.map(|f| f(id, kind)).unwrap_or(false)
    }

    /// Send a line to the host log sink
    pub fn log(&self, message: &str) {
        let slot = self.log.read().clone();
        match slot {
            Some(f) => f(message),
            None => log::info!("{}", message),
        }
    }

    fn describe_slots(&self) -> String {
        let mark = |set: bool| if set { "set" } else { "unset" };
        format!(
            "get_transform={}, set_transform={}, has_component={}, log={}",
            mark(self.get_transform.read().is_some()),
            mark(self.set_transform.read().is_some()),
            mark(self.has_component.read().is_some()),
            mark(self.log.read().is_some()),
        )
    }
}

impl std::fmt::Debug for InteropTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InteropTable")
            .field("slots", &self.describe_slots())
            .finish()
    }
}

/// Host pointer handed back to C callbacks
#[derive(Clone, Copy)]
struct UserData(*mut c_void);

impl UserData {
    fn ptr(self) -> *mut c_void {
        self.0
    }
}

// Safety: the host owns `user_data` and serializes all calls into the bridge
unsafe impl Send for UserData {}
unsafe impl Sync for UserData {}

/// Copy a host string into an owned `String`
pub(crate) unsafe fn string_from_host(ptr: *const std::ffi::c_char) -> Option<String> {
    if ptr.is_null() {
        None
    } else {
        Some(CStr::from_ptr(ptr).to_string_lossy().into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ffi::Vec3;
    use parking_lot::Mutex;
    use std::collections::HashMap;

    #[test]
    fn test_unset_slots_degrade() {
        let table = InteropTable::new();
        assert!(!table.is_initialized());
        assert_eq!(table.get_transform(EntityId::new(3)), Transform::IDENTITY);
        table.set_transform(EntityId::new(3), &Transform::from_position(Vec3::ONE));
        assert_eq!(table.get_transform(EntityId::new(3)), Transform::IDENTITY);
        assert!(!table.has_component(EntityId::new(3), "Transform"));
        table.log("no sink installed");
    }

    #[test]
    fn test_round_trip_through_store() {
        let store: Arc<Mutex<HashMap<EntityId, Transform>>> = Arc::default();
        let table = InteropTable::new();

        let read = store.clone();
        table.set_get_transform(move |id| read.lock().get(&id).copied().unwrap_or_default());
        let write = store.clone();
        table.set_set_transform(move |id, t| {
            write.lock().insert(id, *t);
        });
        assert!(table.is_initialized());

        let t = Transform::new(Vec3::new(1.0, 2.0, 3.0), Vec3::new(0.0, 90.0, 0.0), Vec3::ONE * 2.0);
        table.set_transform(EntityId::new(9), &t);
        assert_eq!(table.get_transform(EntityId::new(9)), t);

        table.clear();
        assert_eq!(table.get_transform(EntityId::new(9)), Transform::IDENTITY);
    }

    #[test]
    fn test_log_sink_receives_lines() {
        let lines: Arc<Mutex<Vec<String>>> = Arc::default();
        let table = InteropTable::new();
        let sink = lines.clone();
        table.set_log(move |msg| sink.lock().push(msg.to_string()));

        table.log("hello");
        assert_eq!(lines.lock().as_slice(), ["hello".to_string()]);
    }

    extern "C" fn ffi_get(user_data: *mut c_void, entity: u64, out: *mut Transform) {
        let offset = unsafe { *(user_data as *const f32) };
        unsafe {
            *out = Transform::from_position(Vec3::new(entity as f32 + offset, 0.0, 0.0));
        }
    }

    extern "C" fn ffi_has(_: *mut c_void, _: u64, kind: *const std::ffi::c_char) -> bool {
        unsafe { CStr::from_ptr(kind) }.to_str() == Ok("Transform")
    }

    #[test]
    fn test_install_ffi_table() {
        let mut offset = 0.5f32;
        let table = InteropTable::new();
        unsafe {
            table.install_ffi(FfiInteropTable {
                user_data: &mut offset as *mut f32 as *mut c_void,
                get_transform: Some(ffi_get),
                has_component: Some(ffi_has),
                ..Default::default()
            });
        }

        assert_eq!(table.get_transform(EntityId::new(2)).position.x, 2.5);
        assert!(table.has_component(EntityId::new(2), "Transform"));
        assert!(!table.has_component(EntityId::new(2), "Rigidbody"));
        assert!(!table.is_initialized());
        table.clear();
    }
}
