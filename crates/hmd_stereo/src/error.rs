//! Error types for the stereo session

use hmd_xr::RuntimeError;
use thiserror::Error;

/// Graphics device errors
#[derive(Debug, Error)]
pub enum GraphicsError {
    /// A capability the stereo path needs is missing on this device
    #[error("Graphics capability unavailable: {0}")]
    Unsupported(String),

    /// An eye render target could not be created
    #[error("Render target creation failed ({width}x{height}): {reason}")]
    RenderTarget { width: u32, height: u32, reason: String },
}

/// Stereo session errors
#[derive(Debug, Error)]
pub enum VrError {
    #[error(transparent)]
    Runtime(#[from] RuntimeError),

    #[error(transparent)]
    Graphics(#[from] GraphicsError),

    #[error("Configuration error: {0}")]
    Config(#[from] serde_json::Error),
}

/// Result type for session operations
pub type Result<T> = std::result::Result<T, VrError>;
