//! Configuration errors.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while loading or interpreting the manifest.
///
/// Target-level variants are stored next to the offending
/// (agent, category) pair and only surface when that pair is synced.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid agent name '{0}': only letters, digits, '-' and '_' are allowed")]
    InvalidAgentName(String),

    #[error("Unknown agent '{0}': not declared in the manifest")]
    UnknownAgent(String),

    #[error("Unknown sync format '{0}' (expected merged, individual or directory)")]
    UnknownFormat(String),

    #[error("Target has no destination: set one of path, paths or glob_paths")]
    MissingDestination,

    #[error("Format '{format}' cannot be used for {category}")]
    FormatMismatch {
        format: &'static str,
        category: &'static str,
    },

    #[error("Could not find {name} in {start} or any parent directory")]
    ManifestNotFound { name: String, start: PathBuf },
}
