//! Scene description
//!
//! ```toml
//! [host]
//! module = "void_bridge_scripts"
//! frame_rate = 60
//! frames = 600
//!
//! [bridge.hot_reload]
//! enabled = true
//!
//! [[entity]]
//! id = 7
//! name = "Player"
//! script = "TestScript.Scene.PlayerController"
//! position = [0.0, 0.0, 0.0]
//! ```

use crate::error::{HostError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use void_bridge::{BridgeConfig, EntityId, Transform, Vec3};

/// Frame loop and module settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HostSettings {
    /// Script module path or bare name
    pub module: PathBuf,
    /// Use the scripts linked into this binary instead of loading a library
    pub static_scripts: bool,
    /// Fixed update rate in Hz
    pub frame_rate: u32,
    /// Frames to run; 0 runs until interrupted
    pub frames: u64,
}

impl Default for HostSettings {
    fn default() -> Self {
        Self {
            module: PathBuf::from("void_bridge_scripts"),
            static_scripts: false,
            frame_rate: 60,
            frames: 0,
        }
    }
}

impl HostSettings {
    /// Seconds per frame
    pub fn delta_time(&self) -> f32 {
        1.0 / self.frame_rate.max(1) as f32
    }
}

/// One host entity and the script attached to it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntitySpec {
    pub id: u64,
    #[serde(default)]
    pub name: String,
    /// Script type name; entities without one get no instance
    #[serde(default)]
    pub script: Option<String>,
    #[serde(default)]
    pub position: [f32; 3],
    #[serde(default)]
    pub rotation: [f32; 3],
    #[serde(default = "unit_scale")]
    pub scale: [f32; 3],
}

fn unit_scale() -> [f32; 3] {
    [1.0, 1.0, 1.0]
}

impl EntitySpec {
    pub fn entity_id(&self) -> EntityId {
        EntityId::new(self.id)
    }

    pub fn transform(&self) -> Transform {
        let [px, py, pz] = self.position;
        let [rx, ry, rz] = self.rotation;
        let [sx, sy, sz] = self.scale;
        Transform::new(Vec3::new(px, py, pz), Vec3::new(rx, ry, rz), Vec3::new(sx, sy, sz))
    }
}

/// Complete scene file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Scene {
    pub host: HostSettings,
    pub bridge: BridgeConfig,
    #[serde(rename = "entity")]
    pub entities: Vec<EntitySpec>,
}

impl Scene {
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let scene: Scene = toml::from_str(source).map_err(|e| HostError::Scene(e.to_string()))?;
        scene.validate()?;
        Ok(scene)
    }

    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path)?;
        let scene = Self::from_toml_str(&source)?;
        log::info!("Loaded scene from {} ({} entities)", path.display(), scene.entities.len());
        Ok(scene)
    }

    /// Built-in scene used when no file is given
    pub fn demo() -> Self {
        let entity = |id: u64, name: &str, script: &str, position: [f32; 3]| EntitySpec {
            id,
            name: name.to_string(),
            script: Some(script.to_string()),
            position,
            rotation: [0.0; 3],
            scale: unit_scale(),
        };

        Self {
            host: HostSettings {
                static_scripts: true,
                frames: 300,
                ..Default::default()
            },
            bridge: BridgeConfig::default(),
            entities: vec![
                entity(7, "Player", "TestScript.Scene.PlayerController", [0.0; 3]),
                entity(8, "Windmill", "TestScript.Scene.RotatingEntity", [4.0, 0.0, 0.0]),
            ],
        }
    }

    fn validate(&self) -> Result<()> {
        let mut seen = std::collections::HashSet::new();
        for entity in &self.entities {
            if !seen.insert(entity.id) {
                return Err(HostError::Scene(format!("duplicate entity id {}", entity.id)));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_scene() {
        let scene = Scene::from_toml_str(
            r#"
            [host]
            module = "scripts/libgame.so"
            frame_rate = 30

            [bridge.hot_reload]
            debounce_ms = 100

            [[entity]]
            id = 7
            name = "Player"
            script = "TestScript.Scene.PlayerController"
            position = [1.0, 2.0, 3.0]

            [[entity]]
            id = 9
            "#,
        )
        .unwrap();

        assert_eq!(scene.host.module, PathBuf::from("scripts/libgame.so"));
        assert!((scene.host.delta_time() - 1.0 / 30.0).abs() < f32::EPSILON);
        assert_eq!(scene.bridge.hot_reload.debounce_ms, 100);
        assert_eq!(scene.entities.len(), 2);
        assert_eq!(scene.entities[0].transform().position, Vec3::new(1.0, 2.0, 3.0));
        assert!(scene.entities[1].script.is_none());
        assert_eq!(scene.entities[1].transform(), Transform::IDENTITY);
    }

    #[test]
    fn test_duplicate_ids_are_rejected() {
        let err = Scene::from_toml_str("[[entity]]\nid = 1\n[[entity]]\nid = 1\n").unwrap_err();
        assert!(matches!(err, HostError::Scene(_)));
    }

    #[test]
    fn test_demo_scene() {
        let scene = Scene::demo();
        assert!(scene.host.static_scripts);
        assert_eq!(scene.entities[0].entity_id(), EntityId::new(7));
    }
}
