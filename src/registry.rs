//! Registry of files written by previous runs.
//!
//! Every destination produced during a run is marked; at the end of the run
//! anything the previous run produced that was not marked again is stale.
//! The file format is one absolute path per line, sorted and de-duplicated.

use anyhow::{Context, Result};
use std::collections::BTreeSet;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// File name of the registry inside the state directory
pub const REGISTRY_FILE_NAME: &str = "synced-files";

#[derive(Debug)]
pub struct SyncRegistry {
    path: PathBuf,
    previous: BTreeSet<PathBuf>,
    current: BTreeSet<PathBuf>,
}

impl SyncRegistry {
    /// Load the registry; a missing file means an empty previous set.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let previous = match fs::read_to_string(&path) {
            Ok(content) => content
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(PathBuf::from)
                .collect(),
            Err(e) if e.kind() == ErrorKind::NotFound => BTreeSet::new(),
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("Failed to read sync registry: {}", path.display()));
            }
        };

        Ok(Self {
            path,
            previous,
            current: BTreeSet::new(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Record a destination as produced by this run
    pub fn mark(&mut self, path: &Path) {
        self.current.insert(path.to_path_buf());
    }

    pub fn is_marked(&self, path: &Path) -> bool {
        self.current.contains(path)
    }

    pub fn previous(&self) -> &BTreeSet<PathBuf> {
        &self.previous
    }

    pub fn current(&self) -> &BTreeSet<PathBuf> {
        &self.current
    }

    /// Paths produced before but not during this run that still exist on disk
    pub fn stale(&self) -> Vec<PathBuf> {
        self.previous
            .difference(&self.current)
            .filter(|path| path.is_file())
            .cloned()
            .collect()
    }

    /// Write the current set as the new registry.
    ///
    /// With `keep_previous`, entries of the previous run are carried over so a
    /// partial run cannot orphan files it did not visit.
    pub fn persist(&self, keep_previous: bool) -> Result<()> {
        let mut entries: BTreeSet<&PathBuf> = self.current.iter().collect();
        if keep_previous {
            entries.extend(self.previous.iter());
        }

        let mut body = String::new();
        for entry in entries {
            body.push_str(&entry.to_string_lossy());
            body.push('\n');
        }

        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create registry dir: {}", dir.display()))?;
        }

        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, body)
            .with_context(|| format!("Failed to write sync registry: {}", tmp.display()))?;
        if let Err(e) = fs::rename(&tmp, &self.path) {
            let _ = fs::remove_file(&tmp);
            return Err(e).with_context(|| {
                format!("Failed to replace sync registry: {}", self.path.display())
            });
        }

        Ok(())
    }
}
