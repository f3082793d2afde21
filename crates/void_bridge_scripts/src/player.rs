//! Player controller: moves its entity around a circle

use serde::{Deserialize, Serialize};
use void_bridge::prelude::*;

/// Radius of the circle the player follows
const ORBIT_RADIUS: f32 = 2.0;

pub struct PlayerController {
    base: EntityBase,
    speed: f32,
    time: f32,
}

/// State carried across a hot reload
#[derive(Serialize, Deserialize)]
struct PlayerState {
    speed: f32,
    time: f32,
}

impl PlayerController {
    pub const TYPE_NAME: &'static str = "TestScript.Scene.PlayerController";

    pub fn new(id: EntityId) -> Self {
        Self {
            base: EntityBase::new(id),
            ..Self::default()
        }
    }

    /// Position on the orbit after `time` seconds
    pub fn orbit_position(time: f32, speed: f32) -> Vec3 {
        Vec3::new(
            (time * speed).cos() * ORBIT_RADIUS,
            0.0,
            (time * speed).sin() * ORBIT_RADIUS,
        )
    }

    /// Seconds accumulated by `update`
    pub fn elapsed(&self) -> f32 {
        self.time
    }
}

impl Default for PlayerController {
    fn default() -> Self {
        Self {
            base: EntityBase::unbound(),
            speed: 1.0,
            time: 0.0,
        }
    }
}

impl Entity for PlayerController {
    void_bridge::entity_base!(base);

    fn type_name(&self) -> &'static str {
        Self::TYPE_NAME
    }

    fn start(&mut self, cx: &ScriptContext<'_>) -> HookResult {
        cx.log("PlayerController started!");
        cx.log(format!("Initial Position: {}", cx.transform().position));
        Ok(())
    }

    fn update(&mut self, cx: &ScriptContext<'_>, delta_time: f32) -> HookResult {
        self.time += delta_time;
        let position = Self::orbit_position(self.time, self.speed);
        cx.modify_transform(|t| t.position = position);
        Ok(())
    }

    fn stop(&mut self, cx: &ScriptContext<'_>) -> HookResult {
        cx.log("PlayerController stopped!");
        cx.log(format!("Final Position: {}", cx.transform().position));
        Ok(())
    }

    fn save_state(&self) -> Option<Vec<u8>> {
        let state = PlayerState {
            speed: self.speed,
            time: self.time,
        };
        bincode::serialize(&state).ok()
    }

    fn restore_state(&mut self, state: &[u8]) -> bool {
        match bincode::deserialize::<PlayerState>(state) {
            Ok(state) => {
                self.speed = state.speed;
                self.time = state.time;
                true
            }
            Err(_) => false,
        }
    }
}

pub(crate) fn register(catalog: &mut TypeCatalog) {
    catalog
        .entity(PlayerController::TYPE_NAME)
        .with_id(|id| Ok(Box::new(PlayerController::new(id))))
        .default_of::<PlayerController>()
        .field("speed", "f32", false)
        .field("time", "f32", false)
        .register();
}
