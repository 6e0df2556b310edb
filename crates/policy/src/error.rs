//! Policy persistence errors.

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum PolicyError {
    #[error("Failed to read policy file at {path}: {reason}")]
    Read { path: PathBuf, reason: String },

    #[error("Failed to parse policy file at {path}: {reason}")]
    Parse { path: PathBuf, reason: String },

    #[error("Failed to write policy file at {path}: {reason}")]
    Write { path: PathBuf, reason: String },
}
