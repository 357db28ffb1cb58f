//! Error types for envencrypt-core

use thiserror::Error;

/// Result type alias for backend and registry operations
pub type Result<T> = std::result::Result<T, CoreError>;

/// Errors surfaced by the backends and the capability registry
///
/// Absence is never an error: a missing credential is `Ok(None)` and a
/// delete with nothing to remove is `Ok(false)`.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("{facility} is not available on this platform")]
    PlatformUnsupported { facility: &'static str },

    #[error("Module '{name}' is not available in this build")]
    ModuleUnavailable { name: String },

    #[error("Protection failed: {0}")]
    ProtectionError(String),

    #[error("Vault error: {0}")]
    VaultError(String),

    #[error("Background task failed: {0}")]
    WorkerError(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

impl CoreError {
    /// Shorthand for a `ModuleUnavailable` error
    pub fn module_unavailable(name: impl Into<String>) -> Self {
        Self::ModuleUnavailable { name: name.into() }
    }
}
