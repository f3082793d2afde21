//! Entity script contract
//!
//! A script type is any `Entity` implementor. It holds its identity in an
//! [`EntityBase`] and receives a [`ScriptContext`] on every lifecycle call,
//! through which it reaches host state.

use crate::ffi::Transform;
use crate::interop::InteropTable;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Host-assigned entity identity
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(pub u64);

impl EntityId {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl From<u64> for EntityId {
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}

impl From<EntityId> for u64 {
    fn from(id: EntityId) -> Self {
        id.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Error type script hooks and constructors may return
pub type ScriptError = Box<dyn std::error::Error + Send + Sync>;

/// Result of a lifecycle hook
pub type HookResult = Result<(), ScriptError>;

/// Identity storage embedded in every script type.
///
/// Two-phase: `new` seals the identity at construction, `unbound` leaves it
/// empty until the registry binds it once. Nothing outside this crate can
/// bind an identity.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntityBase {
    id: Option<EntityId>,
    sealed: bool,
}

/// Outcome of binding an identity to an instance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Binding {
    /// Identity was empty and is now set
    Bound,
    /// Identity already matched
    Unchanged,
    /// Identity was sealed to a different value
    Conflict(EntityId),
}

impl EntityBase {
    /// Identity fixed at construction
    pub const fn new(id: EntityId) -> Self {
        Self { id: Some(id), sealed: true }
    }

    /// Identity left empty for the registry to bind
    pub const fn unbound() -> Self {
        Self { id: None, sealed: false }
    }

    /// The bound identity, if any
    pub fn id(&self) -> Option<EntityId> {
        self.id
    }

    pub fn is_bound(&self) -> bool {
        self.id.is_some()
    }

    pub(crate) fn bind(&mut self, id: EntityId) -> Binding {
        match self.id {
            Some(current) if current == id => Binding::Unchanged,
            Some(current) if self.sealed => Binding::Conflict(current),
            _ => {
                self.id = Some(id);
                self.sealed = true;
                Binding::Bound
            }
        }
    }
}

/// Per-call view of host state handed to lifecycle hooks
pub struct ScriptContext<'a> {
    id: EntityId,
    interop: &'a InteropTable,
}

impl<'a> ScriptContext<'a> {
    pub fn new(id: EntityId, interop: &'a InteropTable) -> Self {
        Self { id, interop }
    }

    /// Entity this call is dispatched for
    pub fn id(&self) -> EntityId {
        self.id
    }

    /// Current host transform; never cached
    pub fn transform(&self) -> Transform {
        self.interop.get_transform(self.id)
    }

    pub fn set_transform(&self, transform: Transform) {
        self.interop.set_transform(self.id, &transform);
    }

    /// Read-modify-write of the host transform
    pub fn modify_transform(&self, f: impl FnOnce(&mut Transform)) {
        let mut transform = self.transform();
        f(&mut transform);
        self.set_transform(transform);
    }

    pub fn has_component(&self, kind: &str) -> bool {
        self.interop.has_component(self.id, kind)
    }

    /// Log through the host sink, tagged with the entity
    pub fn log(&self, message: impl fmt::Display) {
        self.interop.log(&format!("[Entity {}] {}", self.id, message));
    }

    pub fn interop(&self) -> &InteropTable {
        self.interop
    }
}

/// Capability set every script type implements
pub trait Entity: Send + 'static {
    fn base(&self) -> &EntityBase;

    fn base_mut(&mut self) -> &mut EntityBase;

    /// Identity, once bound
    fn id(&self) -> Option<EntityId> {
        self.base().id()
    }

    /// Concrete type name for diagnostics
    fn type_name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    fn start(&mut self, _cx: &ScriptContext<'_>) -> HookResult {
        Ok(())
    }

    fn update(&mut self, _cx: &ScriptContext<'_>, _delta_time: f32) -> HookResult {
        Ok(())
    }

    fn stop(&mut self, _cx: &ScriptContext<'_>) -> HookResult {
        Ok(())
    }

    /// State carried across a hot reload
    fn save_state(&self) -> Option<Vec<u8>> {
        None
    }

    /// Restore state saved by a previous build of this type
    fn restore_state(&mut self, _state: &[u8]) -> bool {
        false
    }
}

/// Implement `base`/`base_mut` for a struct holding an [`EntityBase`] field.
///
/// ```ignore
/// impl Entity for Door {
///     void_bridge::entity_base!(base);
/// }
/// ```
#[macro_export]
macro_rules! entity_base {
    ($field:ident) => {
        fn base(&self) -> &$crate::entity::EntityBase {
            &self.$field
        }

        fn base_mut(&mut self) -> &mut $crate::entity::EntityBase {
            &mut self.$field
        }
    };
}

/// Script instance with no behaviour; used when a type name cannot be resolved
#[derive(Debug, Default)]
pub struct BaseEntity {
    base: EntityBase,
}

impl BaseEntity {
    /// Catalog name of the shared base type
    pub const TYPE_NAME: &'static str = "VoidBridge.Entity";

    pub fn new(id: EntityId) -> Self {
        Self { base: EntityBase::new(id) }
    }
}

impl Entity for BaseEntity {
    entity_base!(base);

    fn type_name(&self) -> &'static str {
        Self::TYPE_NAME
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ffi::Vec3;

    #[test]
    fn test_sealed_identity() {
        let mut base = EntityBase::new(EntityId::new(4));
        assert_eq!(base.id(), Some(EntityId::new(4)));
        assert_eq!(base.bind(EntityId::new(4)), Binding::Unchanged);
        assert_eq!(base.bind(EntityId::new(5)), Binding::Conflict(EntityId::new(4)));
        assert_eq!(base.id(), Some(EntityId::new(4)));
    }

    #[test]
    fn test_unbound_identity_binds_once() {
        let mut base = EntityBase::unbound();
        assert!(!base.is_bound());
        assert_eq!(base.bind(EntityId::new(11)), Binding::Bound);
        assert_eq!(base.id(), Some(EntityId::new(11)));
        assert_eq!(base.bind(EntityId::new(12)), Binding::Conflict(EntityId::new(11)));
    }

    #[test]
    fn test_base_entity_hooks_are_noops() {
        let interop = InteropTable::new();
        let cx = ScriptContext::new(EntityId::new(1), &interop);
        let mut entity = BaseEntity::new(EntityId::new(1));

        assert!(entity.start(&cx).is_ok());
        assert!(entity.update(&cx, 0.016).is_ok());
        assert!(entity.stop(&cx).is_ok());
        assert_eq!(entity.type_name(), BaseEntity::TYPE_NAME);
        assert!(entity.save_state().is_none());
    }

    #[test]
    fn test_context_without_host_reads_identity() {
        let interop = InteropTable::new();
        let cx = ScriptContext::new(EntityId::new(8), &interop);
        cx.modify_transform(|t| t.position = Vec3::ONE);
        assert_eq!(cx.transform(), Transform::IDENTITY);
        assert!(!cx.has_component("Transform"));
    }
}
