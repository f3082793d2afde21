//! Spins its entity around the Y axis

use void_bridge::prelude::*;

pub struct RotatingEntity {
    base: EntityBase,
    /// Degrees per second
    rotation_speed: f32,
}

impl RotatingEntity {
    pub const TYPE_NAME: &'static str = "TestScript.Scene.RotatingEntity";

    pub fn new(id: EntityId) -> Self {
        Self {
            base: EntityBase::new(id),
            rotation_speed: 45.0,
        }
    }
}

impl Entity for RotatingEntity {
    void_bridge::entity_base!(base);

    fn type_name(&self) -> &'static str {
        Self::TYPE_NAME
    }

    fn start(&mut self, cx: &ScriptContext<'_>) -> HookResult {
        cx.log("RotatingEntity started!");
        Ok(())
    }

    fn update(&mut self, cx: &ScriptContext<'_>, delta_time: f32) -> HookResult {
        let step = self.rotation_speed * delta_time;
        cx.modify_transform(|t| t.rotation.y += step);
        Ok(())
    }

    fn stop(&mut self, cx: &ScriptContext<'_>) -> HookResult {
        cx.log("RotatingEntity stopped!");
        Ok(())
    }
}

pub(crate) fn register(catalog: &mut TypeCatalog) {
    catalog
        .entity(RotatingEntity::TYPE_NAME)
        .with_id(|id| Ok(Box::new(RotatingEntity::new(id))))
        .field("rotation_speed", "f32", false)
        .register();
}
