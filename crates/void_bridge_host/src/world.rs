//! Host-owned entity storage
//!
//! The authoritative transforms live here; scripts only see them through
//! the bridge's interop table.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use void_bridge::{EntityId, InteropTable, Transform};

/// A host entity
#[derive(Debug, Clone)]
pub struct HostEntity {
    pub name: String,
    pub transform: Transform,
    pub has_script: bool,
}

/// Shared entity store
#[derive(Debug, Clone, Default)]
pub struct World {
    entities: Arc<RwLock<HashMap<EntityId, HostEntity>>>,
}

impl World {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn spawn(&self, id: EntityId, name: impl Into<String>, transform: Transform) {
        let entity = HostEntity {
            name: name.into(),
            transform,
            has_script: false,
        };
        self.entities.write().insert(id, entity);
    }

    pub fn despawn(&self, id: EntityId) -> bool {
        self.entities.write().remove(&id).is_some()
    }

    pub fn set_has_script(&self, id: EntityId, has_script: bool) {
        if let Some(entity) = self.entities.write().get_mut(&id) {
            entity.has_script = has_script;
        }
    }

    pub fn transform(&self, id: EntityId) -> Option<Transform> {
        self.entities.read().get(&id).map(|e| e.transform)
    }

    pub fn set_transform(&self, id: EntityId, transform: Transform) -> bool {
        match self.entities.write().get_mut(&id) {
            Some(entity) => {
                entity.transform = transform;
                true
            }
            None => false,
        }
    }

    pub fn has_component(&self, id: EntityId, kind: &str) -> bool {
        match self.entities.read().get(&id) {
            Some(entity) => match kind {
                "Transform" => true,
                "Script" => entity.has_script,
                _ => false,
            },
            None => false,
        }
    }

    pub fn name(&self, id: EntityId) -> Option<String> {
        self.entities.read().get(&id).map(|e| e.name.clone())
    }

    pub fn len(&self) -> usize {
        self.entities.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.read().is_empty()
    }

    /// Wire the interop table to this world
    pub fn install(&self, interop: &InteropTable) {
        let world = self.clone();
        interop.set_get_transform(move |id| world.transform(id).unwrap_or_default());

        let world = self.clone();
        interop.set_set_transform(move |id, transform| {
            if !world.set_transform(id, *transform) {
                log::trace!("Dropped transform write for unknown entity {}", id);
            }
        });

        let world = self.clone();
        interop.set_has_component(move |id, kind| world.has_component(id, kind));

        interop.set_log(|message| log::info!(target: "script", "{}", message));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use void_bridge::Vec3;

    #[test]
    fn test_interop_reads_and_writes_world() {
        let world = World::new();
        let interop = InteropTable::new();
        world.install(&interop);
        let id = EntityId::new(1);
        world.spawn(id, "Crate", Transform::from_position(Vec3::new(1.0, 0.0, 0.0)));

        assert_eq!(interop.get_transform(id).position, Vec3::new(1.0, 0.0, 0.0));
        interop.set_transform(id, &Transform::from_position(Vec3::UP));
        assert_eq!(world.transform(id).unwrap().position, Vec3::UP);

        // Unknown entities read as identity and writes are dropped
        interop.set_transform(EntityId::new(2), &Transform::from_position(Vec3::ONE));
        assert_eq!(interop.get_transform(EntityId::new(2)), Transform::IDENTITY);
        assert_eq!(world.len(), 1);
    }

    #[test]
    fn test_components() {
        let world = World::new();
        let id = EntityId::new(3);
        world.spawn(id, "Door", Transform::IDENTITY);

        assert!(world.has_component(id, "Transform"));
        assert!(!world.has_component(id, "Script"));
        world.set_has_script(id, true);
        assert!(world.has_component(id, "Script"));
        assert!(!world.has_component(id, "Rigidbody"));
        assert!(!world.has_component(EntityId::new(4), "Transform"));
    }
}
