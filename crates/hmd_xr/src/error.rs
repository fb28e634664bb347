//! Error types for HMD runtimes

use thiserror::Error;

/// HMD runtime errors
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// No runtime could be loaded or connected to
    #[error("HMD runtime unavailable: {0}")]
    Unavailable(String),

    /// The runtime is up but reports no head-mounted display
    #[error("No HMD found")]
    NoHmd,

    /// An operation was issued before `initialize` succeeded
    #[error("HMD runtime not initialized")]
    NotInitialized,

    /// Pose acquisition failed for this frame
    #[error("Tracking failed: {0}")]
    Tracking(String),

    /// The compositor rejected an eye texture
    #[error("Submit failed for {eye:?} eye: {reason}")]
    Submit { eye: crate::Eye, reason: String },

    /// The runtime cannot do what was asked
    #[error("Unsupported by runtime: {0}")]
    Unsupported(String),

    /// Any other runtime-reported failure
    #[error("HMD runtime error: {0}")]
    Backend(String),
}

/// Result type for runtime operations
pub type Result<T> = std::result::Result<T, RuntimeError>;
