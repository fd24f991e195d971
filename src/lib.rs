//! rulesync - AI Agent Content Synchronization
//!
//! Keeps one library of rules, workflows, prompts and skills as the single
//! source of truth and writes it into the locations each AI coding agent
//! reads. Every run is idempotent: unchanged outputs are left alone, and
//! files produced by an earlier run that are no longer produced are removed.
//!
//! Runs are not safe to execute concurrently against the same destinations
//! or state directory.

pub mod assembler;
pub mod backup;
pub mod config;
pub mod diff;
pub mod error;
pub mod frontmatter;
pub mod paths;
pub mod registry;
pub mod syncer;
pub mod templating;
pub mod writer;

pub use config::{Category, Manifest};
pub use error::ConfigError;
pub use syncer::{SyncOptions, SyncResult, Syncer};
