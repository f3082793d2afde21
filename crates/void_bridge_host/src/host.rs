//! The host: boots a scene, drives the frame loop, shuts down in order

use crate::error::Result;
use crate::scene::Scene;
use crate::world::World;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use void_bridge::{CreateOutcome, EntityId, ScriptBridge, StaticBackend, StaticModule};

/// Runs one scene against the script bridge
pub struct Host {
    scene: Scene,
    world: World,
    bridge: ScriptBridge,
    frame: u64,
}

impl Host {
    /// Create the bridge and wire it to a fresh world
    pub fn new(mut scene: Scene) -> Result<Self> {
        if !scene.host.static_scripts {
            let bridge = ScriptBridge::new(scene.bridge.clone());
            return Self::with_bridge(bridge, scene);
        }

        // Any existing file can stand in for the module path
        let module_path = std::env::current_exe()?;
        let backend = StaticBackend::new().with_module(
            module_path.clone(),
            StaticModule::new(void_bridge_scripts::MODULE_NAME, void_bridge_scripts::register)
                .with_version(env!("CARGO_PKG_VERSION")),
        );
        scene.host.module = module_path;
        let bridge = ScriptBridge::with_backend(scene.bridge.clone(), Box::new(backend));
        Self::with_bridge(bridge, scene)
    }

    /// Use a bridge built by the caller
    pub fn with_bridge(bridge: ScriptBridge, scene: Scene) -> Result<Self> {
        let world = World::new();
        world.install(bridge.interop());
        Ok(Self {
            scene,
            world,
            bridge,
            frame: 0,
        })
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn bridge(&self) -> &ScriptBridge {
        &self.bridge
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// Load the module, spawn entities, attach and start scripts
    pub fn boot(&mut self) -> Result<()> {
        let info = self.bridge.load_script_module(&self.scene.host.module)?;
        log::info!(
            "Script module '{}' v{} provides: {}",
            info.name,
            info.version,
            info.types.join(", ")
        );

        if self.scene.bridge.hot_reload.enabled && !self.scene.host.static_scripts {
            if let Err(e) = self.bridge.enable_hot_reload() {
                log::warn!("Hot-reload unavailable: {}", e);
            }
        }

        for spec in &self.scene.entities {
            let id = spec.entity_id();
            self.world.spawn(id, spec.name.clone(), spec.transform());

            let Some(script) = &spec.script else {
                continue;
            };
            match self.bridge.create_entity_instance(id, script) {
                Ok(CreateOutcome::Fallback) => {
                    log::warn!("Entity {} ('{}') runs without behaviour", id, spec.name);
                    self.world.set_has_script(id, true);
                }
                Ok(_) => self.world.set_has_script(id, true),
                Err(e) => log::error!("Entity {} ('{}') has no script: {}", id, spec.name, e),
            }
        }

        let failures = self.bridge.start_all();
        if failures > 0 {
            log::warn!("{} scripts failed to start", failures);
        }
        log::info!("Scene booted: {} entities, {} scripted", self.world.len(), self.bridge.registry().len());
        Ok(())
    }

    /// Advance one fixed step
    pub fn step(&mut self, delta_time: f32) {
        self.frame += 1;

        if let Some(result) = self.bridge.poll_hot_reload() {
            match result {
                Ok(report) => log::info!(
                    "Hot-reloaded '{}' at frame {} ({} entities rebuilt)",
                    report.module.name,
                    self.frame,
                    report.recreated
                ),
                Err(e) => log::error!("Hot-reload failed: {}", e),
            }
        }

        let failures = self.bridge.update_all(delta_time);
        if failures > 0 {
            log::trace!("{} script updates failed at frame {}", failures, self.frame);
        }
    }

    /// Fixed-step loop until the frame budget is spent or `running` clears
    pub fn run(&mut self, running: &AtomicBool) {
        let delta_time = self.scene.host.delta_time();
        let frame_time = Duration::from_secs_f32(delta_time);
        let budget = self.scene.host.frames;

        log::info!(
            "Running at {} Hz{}",
            self.scene.host.frame_rate,
            if budget > 0 { format!(" for {} frames", budget) } else { String::new() }
        );

        while running.load(Ordering::SeqCst) && (budget == 0 || self.frame < budget) {
            let started = Instant::now();
            self.step(delta_time);

            if self.frame % u64::from(self.scene.host.frame_rate.max(1)) == 0 {
                self.report();
            }

            if let Some(remaining) = frame_time.checked_sub(started.elapsed()) {
                std::thread::sleep(remaining);
            }
        }
    }

    fn report(&self) {
        for id in self.bridge.registry().ids() {
            if let (Some(name), Some(transform)) = (self.world.name(id), self.world.transform(id)) {
                log::debug!(
                    "frame {} | {} ({}) pos {} rot {}",
                    self.frame,
                    name,
                    id,
                    transform.position,
                    transform.rotation
                );
            }
        }
    }

    /// Stop scripts, clear the registry and interop table, unload the module
    pub fn shutdown(&mut self) {
        log::info!("Shutting down after {} frames", self.frame);
        self.bridge.shutdown();
    }
}

/// Flag cleared by Ctrl+C
pub fn interrupt_flag() -> Arc<AtomicBool> {
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();

    if let Err(e) = ctrlc::set_handler(move || {
        log::info!("Received Ctrl+C, shutting down...");
        r.store(false, Ordering::SeqCst);
    }) {
        log::warn!("Failed to set Ctrl+C handler: {}", e);
    }

    running
}

/// Ids of scripted entities in the scene, for reporting
pub fn scripted_ids(scene: &Scene) -> Vec<EntityId> {
    scene
        .entities
        .iter()
        .filter(|spec| spec.script.is_some())
        .map(|spec| spec.entity_id())
        .collect()
}
