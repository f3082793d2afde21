//! Host errors

use thiserror::Error;
use void_bridge::BridgeError;

pub type Result<T> = std::result::Result<T, HostError>;

#[derive(Debug, Error)]
pub enum HostError {
    #[error("Bridge error: {0}")]
    Bridge(#[from] BridgeError),

    #[error("Scene error: {0}")]
    Scene(String),

    #[error("Invalid argument: {0}")]
    Args(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
