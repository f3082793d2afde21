//! # void_bridge_scripts - Demo Script Module
//!
//! Gameplay scripts compiled into a hot-reloadable module. Build the crate
//! as a `cdylib` and point the host at it:
//!
//! ```text
//! cargo build -p void_bridge_scripts
//! void-host --module target/debug/libvoid_bridge_scripts.so
//! ```
//!
//! The same types are available in-process through [`register`], which is
//! what the tests and statically linked hosts use.

mod helpers;
mod player;
mod rotating;

pub use helpers::Test;
pub use player::PlayerController;
pub use rotating::RotatingEntity;

use void_bridge::TypeCatalog;

/// Name this module reports to the bridge
pub const MODULE_NAME: &str = "void_bridge_scripts";

/// Register every script type of this module
pub fn register(catalog: &mut TypeCatalog) {
    player::register(catalog);
    rotating::register(catalog);
    helpers::register(catalog);
}

void_bridge::export_script_module!("void_bridge_scripts", register);
