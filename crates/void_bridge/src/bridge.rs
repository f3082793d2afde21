//! Host-facing facade
//!
//! [`ScriptBridge`] owns the registry and the module loader and shares the
//! interop table with the host. It is the single entry point a host talks
//! to, either directly from Rust or through [`crate::capi`].

use crate::catalog::TypeResolver;
use crate::config::BridgeConfig;
use crate::entity::{Entity, EntityId};
use crate::error::{BridgeError, Result};
#[cfg(feature = "hot-reload")]
use crate::hot_reload::ModuleWatcher;
use crate::interop::InteropTable;
use crate::module::{ModuleBackend, ModuleInfo, ModuleLoader, UnloadOutcome};
use crate::reflect;
use crate::registry::{CreateOutcome, EntityRegistry, ModuleInstance, ReloadSeed};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Summary of a completed reload
#[derive(Debug, Clone)]
pub struct ReloadReport {
    /// The freshly loaded module
    pub module: ModuleInfo,
    /// What happened to the previous context
    pub unload: UnloadOutcome,
    /// Entities rebuilt from the new module
    pub recreated: usize,
    /// Entities whose saved state was accepted
    pub restored: usize,
    /// Entities that could not be rebuilt
    pub failed: usize,
}

/// The script bridge
pub struct ScriptBridge {
    config: BridgeConfig,
    // Registry entries pin module contexts and must drop before the loader
    registry: EntityRegistry,
    loader: ModuleLoader,
    interop: Arc<InteropTable>,
    /// Module path of the last successful load
    module_path: Option<PathBuf>,
    /// Entities waiting for a module to be recreated from
    pending_seeds: Vec<ReloadSeed>,
    #[cfg(feature = "hot-reload")]
    watcher: Option<ModuleWatcher>,
    shut_down: bool,
}

impl ScriptBridge {
    /// Bridge loading modules as dynamic libraries
    pub fn new(config: BridgeConfig) -> Self {
        let loader = ModuleLoader::new(&config.module);
        Self::with_loader(config, loader)
    }

    /// Bridge with a custom module backend
    pub fn with_backend(config: BridgeConfig, backend: Box<dyn ModuleBackend>) -> Self {
        let loader = ModuleLoader::with_backend(&config.module, backend);
        Self::with_loader(config, loader)
    }

    fn with_loader(config: BridgeConfig, loader: ModuleLoader) -> Self {
        let interop = InteropTable::shared();
        let mut registry = EntityRegistry::new(interop.clone());
        registry.set_trace_lifecycle(config.diagnostics.trace_lifecycle);

        log::info!("Script bridge initialized");

        Self {
            config,
            registry,
            loader,
            interop,
            module_path: None,
            pending_seeds: Vec::new(),
            #[cfg(feature = "hot-reload")]
            watcher: None,
            shut_down: false,
        }
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// The shared interop table; install host callbacks here
    pub fn interop(&self) -> &Arc<InteropTable> {
        &self.interop
    }

    pub fn registry(&self) -> &EntityRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut EntityRegistry {
        &mut self.registry
    }

    pub fn loader(&self) -> &ModuleLoader {
        &self.loader
    }

    /// Resolver over the active module and the core types
    pub fn types(&self) -> &dyn TypeResolver {
        &self.loader
    }

    // ========== Entity Operations ==========

    pub fn register_entity(&mut self, id: EntityId, instance: Box<dyn Entity>) {
        self.registry.register(id, instance);
    }

    /// Register an instance built with [`crate::registry::construct_instance`];
    /// its module stays loaded until the entry is removed
    pub fn register_instance(&mut self, id: EntityId, instance: ModuleInstance) {
        self.registry.register_instance(id, instance);
    }

    pub fn unregister_entity(&mut self, id: EntityId) -> bool {
        self.registry.unregister(id)
    }

    pub fn create_entity_instance(&mut self, id: EntityId, type_name: &str) -> Result<CreateOutcome> {
        self.registry.create_instance(id, type_name, &self.loader)
    }

    pub fn start(&mut self, id: EntityId) -> Result<()> {
        self.registry.start(id)
    }

    pub fn update(&mut self, id: EntityId, delta_time: f32) -> Result<()> {
        self.registry.update(id, delta_time)
    }

    pub fn stop(&mut self, id: EntityId) -> Result<()> {
        self.registry.stop(id)
    }

    pub fn start_all(&mut self) -> usize {
        self.registry.start_all()
    }

    pub fn update_all(&mut self, delta_time: f32) -> usize {
        self.registry.update_all(delta_time)
    }

    pub fn stop_all(&mut self) -> usize {
        self.registry.stop_all()
    }

    pub fn clear_all(&mut self) {
        self.registry.clear_all();
    }

    // ========== Module Operations ==========

    pub fn load_script_module(&mut self, path: impl AsRef<Path>) -> Result<ModuleInfo> {
        let info = self.loader.load_module(path)?;
        self.module_path = Some(info.path.clone());

        #[cfg(feature = "hot-reload")]
        {
            if let Some(watcher) = self.watcher.as_mut() {
                if let Err(e) = watcher.watch(&info.path) {
                    log::warn!("Hot-reload cannot watch {}: {}", info.path.display(), e);
                }
            }
        }

        Ok(info)
    }

    /// Unload the active module.
    ///
    /// Clear the registry first; entries created from the module keep it
    /// resident otherwise.
    pub fn unload_script_module(&mut self) -> UnloadOutcome {
        self.loader.unload_module()
    }

    pub fn describe_type(&self, type_name: &str, buffer: Option<&mut [u8]>) -> usize {
        reflect::describe_type(&self.loader, type_name, buffer)
    }

    pub fn describe_type_json(&self, type_name: &str) -> String {
        reflect::describe_type_json(&self.loader, type_name)
    }

    /// Rebuild every module entity against a fresh load of the module file.
    ///
    /// Started entities are stopped, released, recreated from the new
    /// module and started again. Saved state is handed back when
    /// `hot_reload.preserve_state` is set. If the new load fails the
    /// released entities are kept and rebuilt by the next successful reload.
    pub fn reload_script_module(&mut self) -> Result<ReloadReport> {
        let path = self
            .loader
            .active_path()
            .map(Path::to_path_buf)
            .or_else(|| self.module_path.clone())
            .ok_or(BridgeError::ModuleNotLoaded)?;

        log::info!("Reloading script module: {}", path.display());

        let started: Vec<EntityId> = self
            .registry
            .ids()
            .into_iter()
            .filter(|id| {
                self.registry
                    .entry(*id)
                    .is_some_and(|entry| entry.module().is_some() && entry.is_started())
            })
            .collect();
        for id in &started {
            let _ = self.registry.stop(*id);
        }

        let mut seeds = self.registry.release_module_entities();
        for seed in &mut seeds {
            seed.was_started = started.contains(&seed.id);
        }
        self.pending_seeds.extend(seeds);

        let unload = self.loader.unload_module();

        let module = match self.load_script_module(&path) {
            Ok(info) => info,
            Err(e) => {
                log::error!(
                    "Reload of {} failed, {} entities wait for the next successful load: {}",
                    path.display(),
                    self.pending_seeds.len(),
                    e
                );
                return Err(e);
            }
        };

        let mut report = ReloadReport {
            module,
            unload,
            recreated: 0,
            restored: 0,
            failed: 0,
        };

        for seed in std::mem::take(&mut self.pending_seeds) {
            if let Err(e) = self.registry.create_instance(seed.id, &seed.type_name, &self.loader) {
                log::error!("Could not recreate entity {} after reload: {}", seed.id, e);
                report.failed += 1;
                continue;
            }
            report.recreated += 1;

            if self.config.hot_reload.preserve_state {
                if let Some(state) = &seed.state {
                    if self.registry.restore_state(seed.id, state) {
                        report.restored += 1;
                    }
                }
            }

            if seed.was_started {
                let _ = self.registry.start(seed.id);
            }
        }

        log::info!(
            "Reloaded module '{}': {} recreated, {} restored, {} failed",
            report.module.name,
            report.recreated,
            report.restored,
            report.failed
        );
        Ok(report)
    }

    /// Entities released by a failed reload
    pub fn pending_reload(&self) -> &[ReloadSeed] {
        &self.pending_seeds
    }

    // ========== Hot Reload ==========

    /// Start watching the module file
    #[cfg(feature = "hot-reload")]
    pub fn enable_hot_reload(&mut self) -> Result<()> {
        let mut watcher = ModuleWatcher::new(&self.config.hot_reload)?;
        if let Some(path) = &self.module_path {
            watcher.watch(path)?;
        }
        self.watcher = Some(watcher);
        log::info!("Hot-reload enabled");
        Ok(())
    }

    #[cfg(feature = "hot-reload")]
    pub fn disable_hot_reload(&mut self) {
        if self.watcher.take().is_some() {
            log::info!("Hot-reload disabled");
        }
    }

    #[cfg(feature = "hot-reload")]
    pub fn is_hot_reload_enabled(&self) -> bool {
        self.watcher.is_some()
    }

    /// Call once per frame; reloads when the module file has changed
    #[cfg(feature = "hot-reload")]
    pub fn poll_hot_reload(&mut self) -> Option<Result<ReloadReport>> {
        let changed = self.watcher.as_mut()?.poll()?;
        log::info!("Hot-reloading {}", changed.display());
        Some(self.reload_script_module())
    }

    // ========== Shutdown ==========

    /// Tear down in order: stop all, clear registry, clear interop, unload.
    ///
    /// Called by `Drop`; safe to call more than once.
    pub fn shutdown(&mut self) {
        if self.shut_down {
            return;
        }
        self.shut_down = true;

        let failures = self.registry.stop_all();
        if failures > 0 {
            log::warn!("{} entities failed to stop cleanly", failures);
        }
        self.registry.clear_all();
        self.pending_seeds.clear();
        self.interop.clear();

        #[cfg(feature = "hot-reload")]
        self.disable_hot_reload();

        match self.loader.unload_module() {
            UnloadOutcome::Pinned { live_references } => {
                log::warn!("Module still pinned by {} references at shutdown", live_references);
            }
            UnloadOutcome::Reclaimed | UnloadOutcome::NotLoaded => {}
        }

        log::info!("Script bridge shut down");
    }
}

impl Drop for ScriptBridge {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for ScriptBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptBridge")
            .field("registry", &self.registry)
            .field("loader", &self.loader)
            .field("interop", &self.interop)
            .finish()
    }
}
