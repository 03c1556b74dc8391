//! Error types for the engine module.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by an engine or while loading one.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Engine binary not found.
    #[error("FFmpeg not found at path: {path}")]
    BinaryNotFound { path: PathBuf },

    /// The engine could not be initialized.
    #[error("Failed to load engine: {reason}")]
    LoadFailed { reason: String },

    /// A virtual file name that would escape the scratch namespace.
    #[error("Invalid virtual file name: {name:?}")]
    InvalidFileName { name: String },

    /// A virtual file that does not exist.
    #[error("Virtual file not found: {name}")]
    FileNotFound { name: String },

    /// The engine ran but reported failure.
    #[error("{reason}")]
    ExecFailed {
        reason: String,
        exit_code: Option<i32>,
    },

    /// I/O error inside the engine.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl EngineError {
    /// Creates a new load failure.
    pub fn load_failed(reason: impl Into<String>) -> Self {
        Self::LoadFailed {
            reason: reason.into(),
        }
    }

    /// Creates a new execution failure.
    pub fn exec_failed(reason: impl Into<String>, exit_code: Option<i32>) -> Self {
        Self::ExecFailed {
            reason: reason.into(),
            exit_code,
        }
    }
}
