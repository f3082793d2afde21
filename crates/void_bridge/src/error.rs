//! Error types for the script bridge

use crate::entity::EntityId;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for bridge operations
pub type Result<T> = std::result::Result<T, BridgeError>;

/// Errors that can occur in the script bridge
#[derive(Debug, Error)]
pub enum BridgeError {
    /// No instance registered for the entity
    #[error("Entity {0} not found")]
    EntityNotFound(EntityId),

    /// Type name could not be resolved in any catalog
    #[error("Type '{0}' not found")]
    TypeNotFound(String),

    /// Type was resolved but is not an entity script type
    #[error("Type '{0}' is not an entity script type")]
    TypeMismatch(String),

    /// Every construction strategy failed
    #[error("Failed to construct '{type_name}' for entity {entity}: {message}")]
    ConstructionFailed {
        type_name: String,
        entity: EntityId,
        message: String,
    },

    /// A lifecycle hook returned an error
    #[error("{hook}() failed on entity {entity}: {message}")]
    HookFailed {
        entity: EntityId,
        hook: &'static str,
        message: String,
    },

    /// A lifecycle hook panicked
    #[error("{hook}() panicked on entity {entity}: {message}")]
    HookPanicked {
        entity: EntityId,
        hook: &'static str,
        message: String,
    },

    /// Failed to load a script module
    #[error("Failed to load module '{}': {message}", .path.display())]
    LoadFailed {
        path: PathBuf,
        message: String,
    },

    /// Module does not export a required symbol
    #[error("Symbol '{symbol}' not found in module '{module}'")]
    SymbolNotFound {
        module: String,
        symbol: String,
    },

    /// Module was built against an incompatible bridge
    #[error("Version mismatch: module built for {module_version}, bridge is {expected_version}")]
    VersionMismatch {
        module_version: String,
        expected_version: String,
    },

    /// A native library required by the module could not be resolved
    #[error("Native dependency '{name}' of module '{module}' not found")]
    NativeDependencyNotFound {
        module: String,
        name: String,
    },

    /// A module is already active
    #[error("Module '{0}' is already loaded; unload it first")]
    ModuleAlreadyLoaded(String),

    /// Operation requires an active module
    #[error("No script module is loaded")]
    ModuleNotLoaded,

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Hot-reload error
    #[error("Hot-reload failed: {0}")]
    HotReloadFailed(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BridgeError {
    /// Create a load failure
    pub fn load_failed(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        BridgeError::LoadFailed {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a symbol not found error
    pub fn symbol_not_found(module: impl Into<String>, symbol: impl Into<String>) -> Self {
        BridgeError::SymbolNotFound {
            module: module.into(),
            symbol: symbol.into(),
        }
    }

    /// Create a construction failure
    pub fn construction_failed(
        type_name: impl Into<String>,
        entity: EntityId,
        message: impl Into<String>,
    ) -> Self {
        BridgeError::ConstructionFailed {
            type_name: type_name.into(),
            entity,
            message: message.into(),
        }
    }
}
