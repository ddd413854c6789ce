//! Crate-wide error type.

use thiserror::Error;

/// Errors returned by huti helpers.
///
/// The memoizing cache never surfaces its own failures through this type:
/// key derivation problems are logged and the call proceeds uncached.
#[derive(Debug, Error)]
pub enum HutiError {
    /// Configuration file could not be read or parsed.
    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// An external command ran but exited unsuccessfully.
    #[error("{program} exited with status {code}: {stderr}")]
    Command {
        program: String,
        code: i32,
        stderr: String,
    },

    /// An archive could not be created or unpacked as requested.
    #[error("Archive error: {0}")]
    Archive(String),

    /// An external command could not be found on `PATH`.
    #[error("Command not found: {0}")]
    CommandNotFound(String),
}

/// Result alias used across huti.
pub type Result<T> = std::result::Result<T, HutiError>;
