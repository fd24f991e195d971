//! Per-run write path.
//!
//! [`SyncRun`] owns everything a single invocation mutates: the registry of
//! produced files, the backup store and the result counters. Every output
//! file goes through [`SyncRun::write`], which:
//!
//! 1. skips content whose SHA-256 digest matches the file on disk,
//! 2. backs up the existing file when backups are enabled,
//! 3. in dry-run mode only reports the change with a unified diff,
//! 4. otherwise writes `<path>.rulesync.tmp` and renames it into place,
//! 5. marks the destination as produced by this run.

use anyhow::{Context, Result};
use chrono::Utc;
use colored::Colorize;
use sha2::{Digest, Sha256};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::backup::BackupStore;
use crate::diff::unified_diff;
use crate::registry::SyncRegistry;
use crate::syncer::SyncResult;
use crate::templating::{format_timestamp, mask_timestamps};

const TMP_SUFFIX: &str = ".rulesync.tmp";

/// Bytes to write for one destination
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendered {
    pub bytes: Vec<u8>,
    /// Length of a leading header that embeds the run timestamp
    pub stamped_header: Option<usize>,
}

impl Rendered {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            bytes: bytes.into(),
            stamped_header: None,
        }
    }

    /// Content whose first `header_len` bytes carry the run timestamp
    pub fn stamped(bytes: impl Into<Vec<u8>>, header_len: usize) -> Self {
        Self {
            bytes: bytes.into(),
            stamped_header: Some(header_len),
        }
    }

    pub fn is_stamped(&self) -> bool {
        self.stamped_header.is_some()
    }
}

/// Outcome of an individual file write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Created,
    Updated,
    Unchanged,
    WouldCreate,
    WouldUpdate,
}

/// State of one sync invocation
#[derive(Debug)]
pub struct SyncRun {
    dry_run: bool,
    verbose: bool,
    backups: Option<BackupStore>,
    registry: SyncRegistry,
    timestamp: String,
    result: SyncResult,
}

impl SyncRun {
    pub fn new(
        registry: SyncRegistry,
        backups: Option<BackupStore>,
        dry_run: bool,
        verbose: bool,
    ) -> Self {
        Self {
            dry_run,
            verbose,
            backups,
            registry,
            timestamp: format_timestamp(Utc::now()),
            result: SyncResult::default(),
        }
    }

    pub fn dry_run(&self) -> bool {
        self.dry_run
    }

    pub fn verbose(&self) -> bool {
        self.verbose
    }

    /// Value substituted for `{{timestamp}}` during this run
    pub fn timestamp(&self) -> &str {
        &self.timestamp
    }

    pub fn registry(&self) -> &SyncRegistry {
        &self.registry
    }

    pub fn result(&self) -> &SyncResult {
        &self.result
    }

    /// Report a non-fatal problem and keep going
    pub fn warn(&mut self, message: impl AsRef<str>) {
        let message = message.as_ref();
        tracing::warn!(%message, "Sync warning");
        println!("  {} {}", "!".yellow(), message);
        self.result.warnings += 1;
    }

    /// Report a failed unit of work and keep going
    pub fn fail(&mut self, unit: impl AsRef<str>, error: &anyhow::Error) {
        let unit = unit.as_ref();
        tracing::error!(unit = %unit, error = %format!("{error:#}"), "Sync failed");
        eprintln!("  {} {}: {:#}", "✘".red(), unit, error);
        self.result.errors += 1;
    }

    /// Write one destination file, counting the outcome
    pub fn write(&mut self, dest: &Path, rendered: &Rendered) -> Result<WriteOutcome> {
        let existing = read_existing(dest)?;

        if let Some(existing) = &existing
            && same_content(existing, rendered)
        {
            self.registry.mark(dest);
            self.result.unchanged += 1;
            tracing::debug!(path = %dest.display(), "unchanged");
            if self.verbose {
                println!("  {} Unchanged: {}", "✔".green(), dest.display());
            }
            return Ok(WriteOutcome::Unchanged);
        }

        if self.dry_run {
            self.registry.mark(dest);
            let outcome = match &existing {
                Some(existing) => {
                    println!("  {} Would update: {}", "→".cyan(), dest.display());
                    for line in unified_diff(dest, existing, &rendered.bytes).lines() {
                        println!("    {}", line.dimmed());
                    }
                    self.result.updated += 1;
                    WriteOutcome::WouldUpdate
                }
                None => {
                    println!("  {} Would create: {} (new file)", "→".cyan(), dest.display());
                    self.result.created += 1;
                    WriteOutcome::WouldCreate
                }
            };
            return Ok(outcome);
        }

        if existing.is_some()
            && let Some(backups) = &self.backups
            && let Some(backup) = backups.snapshot(dest)?
        {
            println!(
                "  {} Backed up: {} -> {}",
                "!".yellow(),
                dest.display(),
                backup.display()
            );
        }

        atomic_write(dest, &rendered.bytes)?;
        self.registry.mark(dest);

        if existing.is_some() {
            println!("  {} Updated: {}", "✔".green(), dest.display());
            self.result.updated += 1;
            Ok(WriteOutcome::Updated)
        } else {
            println!("  {} Created: {}", "✔".green(), dest.display());
            self.result.created += 1;
            Ok(WriteOutcome::Created)
        }
    }

    /// Write a destination, reporting a failure instead of returning it
    pub fn write_or_report(&mut self, dest: &Path, rendered: &Rendered) -> Option<WriteOutcome> {
        match self.write(dest, rendered) {
            Ok(outcome) => Some(outcome),
            Err(e) => {
                self.fail(dest.display().to_string(), &e);
                None
            }
        }
    }

    /// Remove stale files and persist the registry.
    ///
    /// Stale files are only removed after a complete run without errors;
    /// otherwise the previous registry entries are carried over untouched.
    pub fn finish(mut self, complete: bool) -> Result<SyncResult> {
        let stale = self.registry.stale();
        let sweep = complete && self.result.errors == 0;

        if !sweep {
            if !stale.is_empty() {
                println!(
                    "\n  {} Keeping {} previously synced file(s): {}",
                    "!".yellow(),
                    stale.len(),
                    if complete {
                        "run had errors"
                    } else {
                        "only some agents were synced"
                    }
                );
            }
        } else if !stale.is_empty() {
            println!("\n{}", "Removing stale files".cyan());
            for path in stale {
                if let Err(e) = self.remove_stale(&path) {
                    self.fail(path.display().to_string(), &e);
                    // Still ours; retry on the next run
                    self.registry.mark(&path);
                }
            }
        }

        if !self.dry_run {
            self.registry.persist(!sweep)?;
        }

        Ok(self.result)
    }

    fn remove_stale(&mut self, path: &Path) -> Result<()> {
        if self.dry_run {
            println!("  {} Would remove: {}", "→".cyan(), path.display());
            self.result.removed += 1;
            return Ok(());
        }

        if let Some(backups) = &self.backups
            && let Some(backup) = backups.snapshot(path)?
        {
            println!(
                "  {} Backed up: {} -> {}",
                "!".yellow(),
                path.display(),
                backup.display()
            );
        }

        fs::remove_file(path)
            .with_context(|| format!("Failed to remove stale file: {}", path.display()))?;
        println!("  {} Removed: {}", "✔".green(), path.display());
        self.result.removed += 1;
        Ok(())
    }
}

fn read_existing(path: &Path) -> Result<Option<Vec<u8>>> {
    match fs::read(path) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e).with_context(|| format!("Failed to read destination: {}", path.display())),
    }
}

/// Compare digests.
///
/// For stamped content the timestamps inside the header are masked; the rest
/// of the document must match byte for byte.
fn same_content(existing: &[u8], rendered: &Rendered) -> bool {
    if let Some(len) = rendered.stamped_header
        && let (Some(old_head), Some(new_head)) = (existing.get(..len), rendered.bytes.get(..len))
        && let (Ok(old_head), Ok(new_head)) =
            (std::str::from_utf8(old_head), std::str::from_utf8(new_head))
    {
        return digest(mask_timestamps(old_head).as_bytes())
            == digest(mask_timestamps(new_head).as_bytes())
            && digest(&existing[len..]) == digest(&rendered.bytes[len..]);
    }
    digest(existing) == digest(&rendered.bytes)
}

fn digest(bytes: &[u8]) -> Vec<u8> {
    Sha256::digest(bytes).to_vec()
}

/// Write through a temp file in the destination directory, then rename
fn atomic_write(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.exists()
    {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }

    let tmp = PathBuf::from(format!("{}{TMP_SUFFIX}", path.display()));
    fs::write(&tmp, bytes).with_context(|| format!("Failed to write: {}", tmp.display()))?;
    if let Err(e) = fs::rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(e).with_context(|| format!("Failed to replace: {}", path.display()));
    }
    Ok(())
}
