//! Error taxonomy for resource construction.
//!
//! Loaders return `anyhow::Result` like the rest of the engine; every failure
//! they produce is rooted in a [`GfxError`], so callers that need to react to
//! a specific kind of failure can `downcast_ref::<GfxError>()`.

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum GfxError {
    /// The file could not be opened or read.
    #[error("failed to read {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file was read but its content is not a usable image/container.
    #[error("failed to decode {path:?}: {reason}")]
    Decode { path: PathBuf, reason: String },

    #[error("failed to compile shader entry point `{entry_point}`: {message}")]
    ShaderCompile { entry_point: String, message: String },

    /// An array member does not match the first member.
    #[error("texture {index} does not match the first texture: {reason}")]
    Mismatch { index: usize, reason: String },

    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The request exceeds what the device can create.
    #[error("device error: {0}")]
    Device(String),
}

impl GfxError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn decode(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::Decode {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}
