//! Reference native host for the Void Engine script bridge
//!
//! Owns the authoritative entity transforms, wires them into the bridge's
//! interop table and drives script lifecycles from a fixed-step loop.

pub mod error;
pub mod host;
pub mod scene;
pub mod world;

pub use error::{HostError, Result};
pub use host::Host;
pub use scene::{EntitySpec, HostSettings, Scene};
pub use world::World;
