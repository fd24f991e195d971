//! Rotating backups of files about to be overwritten or removed.
//!
//! Snapshots are stored as `<dir>/<parent key>/<basename>.<UTC timestamp>.bak`.
//! The parent key is derived from the destination's directory, so every
//! destination file rotates on its own while the basename stays readable.

use anyhow::{Context, Result};
use chrono::Utc;
use regex::Regex;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

/// Number of snapshots kept per destination file
pub const MAX_BACKUPS: usize = 5;

const BACKUP_SUFFIX: &str = ".bak";

/// Bytes of the parent directory digest used as the slot name
const PARENT_KEY_BYTES: usize = 8;

static STAMP_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{8}T\d{15})(?:-(\d+))?$").unwrap());

/// Directory of rotating backups
#[derive(Debug, Clone)]
pub struct BackupStore {
    dir: PathBuf,
    keep: usize,
}

impl BackupStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            keep: MAX_BACKUPS,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Directory holding the snapshots of files that live next to `path`
    fn slot(&self, path: &Path) -> PathBuf {
        let parent = path.parent().unwrap_or(Path::new(""));
        let digest = Sha256::digest(parent.as_os_str().as_encoded_bytes());
        let key: String = digest[..PARENT_KEY_BYTES]
            .iter()
            .map(|b| format!("{b:02x}"))
            .collect();
        self.dir.join(key)
    }

    /// Copy `path` into the store and prune older snapshots of the same file.
    ///
    /// Returns `None` when there is no regular file to back up.
    pub fn snapshot(&self, path: &Path) -> Result<Option<PathBuf>> {
        if !path.is_file() {
            return Ok(None);
        }
        let Some(basename) = path.file_name().map(|n| n.to_string_lossy().into_owned()) else {
            return Ok(None);
        };

        let slot = self.slot(path);
        fs::create_dir_all(&slot)
            .with_context(|| format!("Failed to create backup directory: {}", slot.display()))?;

        let stamp = Utc::now().format("%Y%m%dT%H%M%S%9f").to_string();
        let mut backup = slot.join(format!("{basename}.{stamp}{BACKUP_SUFFIX}"));
        let mut attempt = 1;
        while backup.exists() {
            backup = slot.join(format!("{basename}.{stamp}-{attempt}{BACKUP_SUFFIX}"));
            attempt += 1;
        }

        fs::copy(path, &backup).with_context(|| {
            format!(
                "Failed to back up {} to {}",
                path.display(),
                backup.display()
            )
        })?;
        tracing::debug!(source = %path.display(), backup = %backup.display(), "Backed up file");

        self.prune(path)?;
        Ok(Some(backup))
    }

    /// Existing snapshots of a destination file, oldest first
    pub fn backups_for(&self, path: &Path) -> Result<Vec<PathBuf>> {
        let slot = self.slot(path);
        let Some(basename) = path.file_name().map(|n| n.to_string_lossy().into_owned()) else {
            return Ok(Vec::new());
        };
        if !slot.is_dir() {
            return Ok(Vec::new());
        }

        let prefix = format!("{basename}.");
        let mut found: Vec<((String, u32), PathBuf)> = Vec::new();

        for entry in fs::read_dir(&slot)
            .with_context(|| format!("Failed to read backup directory: {}", slot.display()))?
        {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            let Some(stamp) = name
                .strip_prefix(&prefix)
                .and_then(|rest| rest.strip_suffix(BACKUP_SUFFIX))
            else {
                continue;
            };
            let Some(caps) = STAMP_RE.captures(stamp) else {
                continue;
            };
            let attempt = caps
                .get(2)
                .and_then(|m| m.as_str().parse().ok())
                .unwrap_or(0);
            found.push(((caps[1].to_string(), attempt), entry.path()));
        }

        found.sort();
        Ok(found.into_iter().map(|(_, path)| path).collect())
    }

    fn prune(&self, path: &Path) -> Result<()> {
        let backups = self.backups_for(path)?;
        let excess = backups.len().saturating_sub(self.keep);

        for old in &backups[..excess] {
            fs::remove_file(old)
                .with_context(|| format!("Failed to remove old backup: {}", old.display()))?;
            tracing::debug!(backup = %old.display(), "Pruned old backup");
        }

        Ok(())
    }
}
