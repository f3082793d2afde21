//! # void_bridge - Entity Script Bridge
//!
//! The script side of the bridge between a native game host and gameplay
//! scripts. Scripts live in hot-reloadable modules; the host drives their
//! lifecycle by entity id and owns every transform.
//!
//! ## Overview
//!
//! A script module is a dynamic library exporting a registration function
//! (see [`export_script_module!`]). Loading it fills a [`TypeCatalog`] with
//! constructors for each script type. The host then asks for instances by
//! type name and entity id, and calls start/update/stop on them. Scripts
//! read and write host state through the [`InteropTable`].
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐     ┌─────────────────┐
//! │  Script Module  │────▶│  ModuleLoader   │
//! │ (game_scripts)  │     │ (ModuleContext) │
//! └─────────────────┘     └────────┬────────┘
//!                                  │ TypeCatalog
//!                                  ▼
//! ┌─────────────────┐     ┌─────────────────┐
//! │   Native Host   │────▶│ EntityRegistry  │
//! │ (C ABI / Rust)  │     │ (per entity)    │
//! └────────┬────────┘     └────────┬────────┘
//!          │                       │ ScriptContext
//!          ▼                       ▼
//! ┌─────────────────┐     ┌─────────────────┐
//! │  Host Transform │◀────│  InteropTable   │
//! │     Storage     │     │ (callbacks)     │
//! └─────────────────┘     └─────────────────┘
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use void_bridge::prelude::*;
//!
//! let mut bridge = ScriptBridge::new(BridgeConfig::load(None)?);
//! bridge.interop().set_get_transform(|id| world.transform(id));
//! bridge.interop().set_set_transform(|id, t| world.set_transform(id, *t));
//!
//! bridge.load_script_module("game_scripts")?;
//! bridge.create_entity_instance(EntityId::new(7), "Game.PlayerController")?;
//!
//! bridge.start(EntityId::new(7))?;
//! bridge.update(EntityId::new(7), delta_time)?;
//! ```
//!
//! ## Script Side
//!
//! ```ignore
//! use void_bridge::prelude::*;
//!
//! pub struct Door {
//!     base: EntityBase,
//! }
//!
//! impl Entity for Door {
//!     void_bridge::entity_base!(base);
//!
//!     fn update(&mut self, cx: &ScriptContext<'_>, dt: f32) -> HookResult {
//!         cx.modify_transform(|t| t.rotation.y += 90.0 * dt);
//!         Ok(())
//!     }
//! }
//!
//! fn register(catalog: &mut TypeCatalog) {
//!     catalog
//!         .entity("Game.Door")
//!         .with_id(|id| Ok(Box::new(Door { base: EntityBase::new(id) })))
//!         .register();
//! }
//!
//! void_bridge::export_script_module!("game_scripts", register);
//! ```

pub mod bridge;
pub mod capi;
pub mod catalog;
pub mod config;
pub mod entity;
pub mod error;
pub mod ffi;
pub mod guard;
pub mod interop;
pub mod module;
pub mod reflect;
pub mod registry;
pub mod resolver;

#[cfg(feature = "hot-reload")]
pub mod hot_reload;

pub use bridge::{ReloadReport, ScriptBridge};
pub use catalog::{TypeBuilder, TypeCatalog, TypeDescriptor, TypeResolver};
pub use config::{BridgeConfig, DiagnosticsConfig, HotReloadConfig, ModuleConfig};
pub use entity::{BaseEntity, Entity, EntityBase, EntityId, HookResult, ScriptContext, ScriptError};
pub use error::{BridgeError, Result};
pub use ffi::{Transform, Vec3};
pub use interop::InteropTable;
pub use module::{
    DylibBackend, ModuleBackend, ModuleInfo, ModuleLoader, ModuleRef, StaticBackend, StaticModule,
    UnloadOutcome,
};
pub use registry::{construct_instance, CreateOutcome, EntityRegistry, ModuleInstance, ReloadSeed};
pub use resolver::DependencyResolver;

#[cfg(feature = "hot-reload")]
pub use hot_reload::ModuleWatcher;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::bridge::ScriptBridge;
    pub use crate::catalog::{TypeCatalog, TypeResolver};
    pub use crate::config::BridgeConfig;
    pub use crate::entity::{BaseEntity, Entity, EntityBase, EntityId, HookResult, ScriptContext};
    pub use crate::error::{BridgeError, Result};
    pub use crate::ffi::{Transform, Vec3};
    pub use crate::interop::InteropTable;
    pub use crate::module::UnloadOutcome;
    pub use crate::registry::CreateOutcome;
}
