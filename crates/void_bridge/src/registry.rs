//! Entity instance registry
//!
//! Maps host entity identities to live script instances and dispatches
//! lifecycle calls to them. Instances built from a module's catalog keep
//! that module pinned until their entry is removed.

use crate::catalog::{ConstructResult, ResolvedType, TypeResolver};
use crate::entity::{BaseEntity, Binding, Entity, EntityId, HookResult, ScriptContext};
use crate::error::{BridgeError, Result};
use crate::guard::catch_panic;
use crate::interop::InteropTable;
use crate::module::ModuleRef;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// How [`EntityRegistry::create_instance`] produced the registered instance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateOutcome {
    /// Identity-accepting constructor
    Constructed,
    /// No-argument constructor, identity bound afterwards
    Injected,
    /// Type was not found; a base entity was registered instead
    Fallback,
    /// No-argument constructor sealed a different identity; registered
    /// under the requested key anyway
    Degraded { bound: EntityId },
}

/// Everything needed to rebuild an entry after its module is reloaded
#[derive(Debug, Clone, PartialEq)]
pub struct ReloadSeed {
    pub id: EntityId,
    pub type_name: String,
    pub was_started: bool,
    pub state: Option<Vec<u8>>,
}

/// An instance built from a catalog type, with the pin on the module its
/// code lives in
pub struct ModuleInstance {
    instance: Box<dyn Entity>,
    type_name: String,
    module: Option<ModuleRef>,
}

impl ModuleInstance {
    pub fn instance(&self) -> &dyn Entity {
        self.instance.as_ref()
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn module(&self) -> Option<&ModuleRef> {
        self.module.as_ref()
    }
}

impl fmt::Debug for ModuleInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleInstance")
            .field("type_name", &self.type_name)
            .field("module", &self.module)
            .finish()
    }
}

/// A registry entry
pub struct RegisteredEntity {
    // Declared before `module`: the instance's code lives in the module
    instance: Box<dyn Entity>,
    type_name: String,
    started: bool,
    module: Option<ModuleRef>,
}

impl RegisteredEntity {
    pub fn instance(&self) -> &dyn Entity {
        self.instance.as_ref()
    }

    /// Catalog name the instance was created from
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    pub fn module(&self) -> Option<&ModuleRef> {
        self.module.as_ref()
    }
}

impl fmt::Debug for RegisteredEntity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisteredEntity")
            .field("type_name", &self.type_name)
            .field("started", &self.started)
            .field("module", &self.module)
            .finish()
    }
}

/// Registry of live script instances keyed by entity identity
pub struct EntityRegistry {
    entities: HashMap<EntityId, RegisteredEntity>,
    interop: Arc<InteropTable>,
    trace_lifecycle: bool,
}

impl EntityRegistry {
    pub fn new(interop: Arc<InteropTable>) -> Self {
        Self {
            entities: HashMap::new(),
            interop,
            trace_lifecycle: false,
        }
    }

    /// Log every hook dispatch at debug level
    pub fn set_trace_lifecycle(&mut self, enabled: bool) {
        self.trace_lifecycle = enabled;
    }

    pub fn interop(&self) -> &Arc<InteropTable> {
        &self.interop
    }

    // ========== Registration ==========

    /// Insert or replace the instance at `id`.
    ///
    /// A replaced instance is dropped without lifecycle calls. An unbound
    /// instance is bound to `id`. The entry pins no module; instances of
    /// module types go through [`EntityRegistry::register_instance`].
    pub fn register(&mut self, id: EntityId, mut instance: Box<dyn Entity>) {
        if let Binding::Conflict(bound) = instance.base_mut().bind(id) {
            log::warn!("Registering instance with identity {} under entity {}", bound, id);
        }
        let type_name = instance.type_name().to_string();
        self.insert(id, instance, type_name, None);
    }

    /// Remove the instance at `id`; returns whether one was present
    pub fn unregister(&mut self, id: EntityId) -> bool {
        match self.entities.remove(&id) {
            Some(entry) => {
                log::debug!("Unregistered entity {} ({})", id, entry.type_name);
                true
            }
            None => false,
        }
    }

    /// Register an instance built by [`construct_instance`], keeping the
    /// module it came from pinned for as long as the entry exists.
    pub fn register_instance(&mut self, id: EntityId, instance: ModuleInstance) {
        let ModuleInstance {
            instance: mut entity,
            type_name,
            module,
        } = instance;
        if let Binding::Conflict(bound) = entity.base_mut().bind(id) {
            log::warn!("Registering instance with identity {} under entity {}", bound, id);
        }
        self.insert(id, entity, type_name, module);
    }

    /// Resolve `type_name`, construct an instance and register it at `id`.
    ///
    /// On error nothing is registered and any previous entry at `id` is
    /// left untouched.
    pub fn create_instance(
        &mut self,
        id: EntityId,
        type_name: &str,
        resolver: &dyn TypeResolver,
    ) -> Result<CreateOutcome> {
        let Some(resolved) = resolver.resolve(type_name) else {
            log::warn!(
                "{}; registering {} for entity {}",
                BridgeError::TypeNotFound(type_name.to_string()),
                BaseEntity::TYPE_NAME,
                id
            );
            self.insert(
                id,
                Box::new(BaseEntity::new(id)),
                BaseEntity::TYPE_NAME.to_string(),
                None,
            );
            return Ok(CreateOutcome::Fallback);
        };

        let (instance, outcome) = construct_instance(&resolved, id)?;
        self.insert(id, instance.instance, instance.type_name, instance.module);
        Ok(outcome)
    }

    fn insert(
        &mut self,
        id: EntityId,
        instance: Box<dyn Entity>,
        type_name: String,
        module: Option<ModuleRef>,
    ) {
        log::debug!("Registered entity {} as {}", id, type_name);
        let previous = self.entities.insert(
            id,
            RegisteredEntity {
                instance,
                type_name,
                started: false,
                module,
            },
        );
        if let Some(previous) = previous {
            log::debug!("Replaced previous instance of entity {} ({})", id, previous.type_name);
        }
    }

    /// Drop every entry without calling any hook
    pub fn clear_all(&mut self) {
        let count = self.entities.len();
        self.entities.clear();
        log::info!("Cleared {} entities", count);
    }

    // ========== Lifecycle ==========

    pub fn start(&mut self, id: EntityId) -> Result<()> {
        let result = self.dispatch(id, "start", |entity, cx| entity.start(cx));
        if result.is_ok() {
            if let Some(entry) = self.entities.get_mut(&id) {
                entry.started = true;
            }
        }
        result
    }

    pub fn update(&mut self, id: EntityId, delta_time: f32) -> Result<()> {
        self.dispatch(id, "update", |entity, cx| entity.update(cx, delta_time))
    }

    pub fn stop(&mut self, id: EntityId) -> Result<()> {
        let result = self.dispatch(id, "stop", |entity, cx| entity.stop(cx));
        if let Some(entry) = self.entities.get_mut(&id) {
            entry.started = false;
        }
        result
    }

    /// Start every entry not started yet; returns the number of failures
    pub fn start_all(&mut self) -> usize {
        let pending = self.ids_where(|entry| !entry.started);
        pending.into_iter().filter(|id| self.start(*id).is_err()).count()
    }

    /// Update every started entry; returns the number of failures
    pub fn update_all(&mut self, delta_time: f32) -> usize {
        let started = self.ids_where(|entry| entry.started);
        started
            .into_iter()
            .filter(|id| self.update(*id, delta_time).is_err())
            .count()
    }

    /// Stop every started entry; returns the number of failures
    pub fn stop_all(&mut self) -> usize {
        let started = self.ids_where(|entry| entry.started);
        started.into_iter().filter(|id| self.stop(*id).is_err()).count()
    }

    fn dispatch(
        &mut self,
        id: EntityId,
        hook: &'static str,
        f: impl FnOnce(&mut dyn Entity, &ScriptContext<'_>) -> HookResult,
    ) -> Result<()> {
        let Some(entry) = self.entities.get_mut(&id) else {
            let err = BridgeError::EntityNotFound(id);
            if hook == "update" {
                log::debug!("{}() skipped: {}", hook, err);
            } else {
                log::warn!("{}() skipped: {}", hook, err);
            }
            return Err(err);
        };

        if self.trace_lifecycle {
            log::debug!("{}() -> entity {} ({})", hook, id, entry.type_name);
        } else {
            log::trace!("{}() -> entity {}", hook, id);
        }

        // The registry key is authoritative even for degraded entries
        let cx = ScriptContext::new(id, &self.interop);
        let instance = entry.instance.as_mut();

        match catch_panic(|| f(instance, &cx)) {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => {
                let err = BridgeError::HookFailed {
                    entity: id,
                    hook,
                    message: e.to_string(),
                };
                log::error!("{}", err);
                Err(err)
            }
            Err(message) => {
                let err = BridgeError::HookPanicked {
                    entity: id,
                    hook,
                    message,
                };
                log::error!("{}", err);
                Err(err)
            }
        }
    }

    // ========== Queries ==========

    pub fn contains(&self, id: EntityId) -> bool {
        self.entities.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Registered identities in ascending order
    pub fn ids(&self) -> Vec<EntityId> {
        let mut ids: Vec<EntityId> = self.entities.keys().copied().collect();
        ids.sort();
        ids
    }

    pub fn get(&self, id: EntityId) -> Option<&dyn Entity> {
        self.entities.get(&id).map(RegisteredEntity::instance)
    }

    pub fn entry(&self, id: EntityId) -> Option<&RegisteredEntity> {
        self.entities.get(&id)
    }

    pub fn type_name_of(&self, id: EntityId) -> Option<&str> {
        self.entities.get(&id).map(RegisteredEntity::type_name)
    }

    pub fn is_started(&self, id: EntityId) -> bool {
        self.entities.get(&id).is_some_and(|entry| entry.started)
    }

    /// Entries currently pinning a module context
    pub fn module_pins(&self) -> usize {
        self.entities.values().filter(|entry| entry.module.is_some()).count()
    }

    // ========== Reload Support ==========

    /// Remove every entry pinned to a module, capturing what is needed to
    /// recreate it. Hooks are not called.
    pub fn release_module_entities(&mut self) -> Vec<ReloadSeed> {
        let ids = self.ids_where(|entry| entry.module.is_some());
        let mut seeds = Vec::with_capacity(ids.len());

        for id in ids {
            if let Some(entry) = self.entities.remove(&id) {
                let state = match catch_panic(|| entry.instance.save_state()) {
                    Ok(state) => state,
                    Err(message) => {
                        log::warn!("save_state() panicked on entity {}: {}", id, message);
                        None
                    }
                };
                seeds.push(ReloadSeed {
                    id,
                    type_name: entry.type_name.clone(),
                    was_started: entry.started,
                    state,
                });
            }
        }

        log::debug!("Released {} module entities", seeds.len());
        seeds
    }

    /// Hand saved state to the instance at `id`; returns whether it was accepted
    pub fn restore_state(&mut self, id: EntityId, state: &[u8]) -> bool {
        let Some(entry) = self.entities.get_mut(&id) else {
            return false;
        };
        let instance = entry.instance.as_mut();
        match catch_panic(|| instance.restore_state(state)) {
            Ok(restored) => restored,
            Err(message) => {
                log::warn!("restore_state() panicked on entity {}: {}", id, message);
                false
            }
        }
    }

    fn ids_where(&self, pred: impl Fn(&RegisteredEntity) -> bool) -> Vec<EntityId> {
        let mut ids: Vec<EntityId> = self
            .entities
            .iter()
            .filter(|(_, entry)| pred(entry))
            .map(|(id, _)| *id)
            .collect();
        ids.sort();
        ids
    }
}

impl fmt::Debug for EntityRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityRegistry")
            .field("entities", &self.entities.len())
            .field("module_pins", &self.module_pins())
            .finish()
    }
}

/// Run a constructor, folding errors and panics into a message
/// Build an instance of a resolved entity type for `id`.
///
/// Tries the identity-accepting constructor, then the no-argument
/// constructor followed by an identity bind. The result carries the pin
/// on the type's module; the registry keeps it alongside the entry.
pub fn construct_instance(resolved: &ResolvedType, id: EntityId) -> Result<(ModuleInstance, CreateOutcome)> {
    let full_name = resolved.full_name().to_string();
    let Some(factory) = resolved.entry.factory() else {
        let err = BridgeError::TypeMismatch(full_name);
        log::error!("{}", err);
        return Err(err);
    };

    let pinned = |instance: Box<dyn Entity>| ModuleInstance {
        instance,
        type_name: full_name.clone(),
        module: resolved.module.clone(),
    };
    let mut failures = Vec::new();

    if let Some(construct_with_id) = factory.with_id() {
        match construct(|| construct_with_id(id)) {
            Ok(mut instance) => match instance.base_mut().bind(id) {
                Binding::Bound | Binding::Unchanged => {
                    return Ok((pinned(instance), CreateOutcome::Constructed));
                }
                Binding::Conflict(bound) => {
                    failures.push(format!("identity constructor produced entity {}", bound));
                }
            },
            Err(message) => failures.push(message),
        }
        if let Some(reason) = failures.last() {
            log::warn!(
                "Identity constructor of '{}' failed for entity {}: {}; trying the default constructor",
                full_name,
                id,
                reason
            );
        }
    }

    if let Some(construct_default) = factory.without_id() {
        match construct(|| construct_default()) {
            Ok(mut instance) => {
                let outcome = match instance.base_mut().bind(id) {
                    Binding::Bound | Binding::Unchanged => CreateOutcome::Injected,
                    Binding::Conflict(bound) => {
                        log::warn!(
                            "'{}' sealed identity {} in its default constructor; registering it under entity {} anyway",
                            full_name,
                            bound,
                            id
                        );
                        CreateOutcome::Degraded { bound }
                    }
                };
                return Ok((pinned(instance), outcome));
            }
            Err(message) => failures.push(message),
        }
    }

    if failures.is_empty() {
        failures.push("type declares no constructor".to_string());
    }
    let err = BridgeError::construction_failed(full_name, id, failures.join("; "));
    log::error!("{}", err);
    Err(err)
}

fn construct(f: impl FnOnce() -> ConstructResult) -> std::result::Result<Box<dyn Entity>, String> {
    match catch_panic(f) {
        Ok(Ok(instance)) => Ok(instance),
        Ok(Err(e)) => Err(e.to_string()),
        Err(message) => Err(format!("panicked: {}", message)),
    }
}
