//! Destination path resolution
//!
//! Expands the `${VAR}` tokens allowed in manifest paths and enumerates
//! glob patterns into existing directories.

use std::env;
use std::path::{Path, PathBuf};

use crate::config::Destinations;

/// Variables that may appear in destination paths
pub const KNOWN_VARS: [&str; 5] = ["HOME", "USER", "XDG_CONFIG_HOME", "XDG_DATA_HOME", "REPO_ROOT"];

/// Expands destination paths from the manifest.
///
/// Only the exact braced tokens in [`KNOWN_VARS`] are replaced, by plain
/// string substitution. Nothing is ever evaluated.
#[derive(Debug, Clone)]
pub struct PathResolver {
    vars: Vec<(&'static str, String)>,
    repo_root: PathBuf,
}

impl PathResolver {
    /// Capture the variables from the process environment.
    ///
    /// `REPO_ROOT` falls back to `cwd`; the XDG directories fall back to
    /// their usual locations under `HOME`.
    pub fn from_env(cwd: &Path) -> Self {
        let home = env::var("HOME").ok().or_else(|| {
            dirs::home_dir().map(|p| p.display().to_string())
        });
        let var = |name: &str| env::var(name).ok().filter(|v| !v.is_empty());

        let mut vars = Vec::new();
        if let Some(home) = &home {
            vars.push(("HOME", home.clone()));
        }
        if let Some(user) = var("USER") {
            vars.push(("USER", user));
        }
        if let Some(config) = var("XDG_CONFIG_HOME")
            .or_else(|| home.as_ref().map(|h| format!("{h}/.config")))
        {
            vars.push(("XDG_CONFIG_HOME", config));
        }
        if let Some(data) = var("XDG_DATA_HOME")
            .or_else(|| home.as_ref().map(|h| format!("{h}/.local/share")))
        {
            vars.push(("XDG_DATA_HOME", data));
        }
        let repo_root = var("REPO_ROOT").unwrap_or_else(|| cwd.display().to_string());
        vars.push(("REPO_ROOT", repo_root));

        Self::new(vars)
    }

    /// Build a resolver from explicit values. Names outside [`KNOWN_VARS`]
    /// are ignored.
    pub fn new<I, V>(values: I) -> Self
    where
        I: IntoIterator<Item = (&'static str, V)>,
        V: Into<String>,
    {
        let vars: Vec<(&'static str, String)> = values
            .into_iter()
            .filter(|(name, _)| KNOWN_VARS.contains(name))
            .map(|(name, value)| (name, value.into()))
            .collect();
        let repo_root = vars
            .iter()
            .find(|(name, _)| *name == "REPO_ROOT")
            .map(|(_, value)| PathBuf::from(value))
            .unwrap_or_else(|| PathBuf::from("."));

        Self { vars, repo_root }
    }

    /// Replace every known `${VAR}` token in a single left-to-right pass.
    ///
    /// Unknown tokens are left verbatim and substituted values are never
    /// expanded again.
    pub fn expand(&self, text: &str) -> String {
        let mut out = String::with_capacity(text.len());
        let mut rest = text;

        while let Some(start) = rest.find("${") {
            out.push_str(&rest[..start]);
            let after = &rest[start + 2..];
            let Some(end) = after.find('}') else {
                out.push_str(&rest[start..]);
                return out;
            };

            let token = &rest[start..start + 2 + end + 1];
            match self.lookup(&after[..end]) {
                Some(value) => out.push_str(value),
                None => out.push_str(token),
            }
            rest = &after[end + 1..];
        }

        out.push_str(rest);
        out
    }

    fn lookup(&self, name: &str) -> Option<&str> {
        self.vars
            .iter()
            .find(|(known, _)| *known == name)
            .map(|(_, value)| value.as_str())
    }

    /// Expand a path and anchor it at `REPO_ROOT` when relative
    pub fn expand_path(&self, text: &str) -> PathBuf {
        let expanded = PathBuf::from(self.expand(text));
        if expanded.is_absolute() {
            expanded
        } else {
            self.repo_root.join(expanded)
        }
    }

    /// Expand a glob pattern into the directories that currently match it.
    ///
    /// A pattern matching nothing, or an invalid pattern, yields no paths.
    pub fn expand_glob(&self, pattern: &str) -> Vec<PathBuf> {
        let pattern = self.expand_path(pattern);
        let pattern = pattern.to_string_lossy();

        let entries = match glob::glob(&pattern) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!(pattern = %pattern, error = %e, "Invalid glob pattern");
                return Vec::new();
            }
        };

        entries
            .filter_map(|entry| match entry {
                Ok(path) => Some(path),
                Err(e) => {
                    tracing::debug!(error = %e, "Unreadable glob entry");
                    None
                }
            })
            .filter(|path| path.is_dir())
            .collect()
    }

    /// All destination paths of a target: `path`, then `paths`, then `glob_paths`.
    ///
    /// Duplicates are dropped, keeping the first occurrence.
    pub fn target_paths(&self, destinations: &Destinations) -> Vec<PathBuf> {
        let mut out: Vec<PathBuf> = Vec::new();
        let mut push = |path: PathBuf| {
            if !out.contains(&path) {
                out.push(path);
            }
        };

        if let Some(path) = &destinations.path {
            push(self.expand_path(path));
        }
        for path in &destinations.paths {
            push(self.expand_path(path));
        }
        for pattern in &destinations.glob_paths {
            for path in self.expand_glob(pattern) {
                push(path);
            }
        }

        out
    }

    pub fn repo_root(&self) -> &Path {
        &self.repo_root
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn resolver(home: &str, repo: &str) -> PathResolver {
        PathResolver::new([
            ("HOME", home),
            ("USER", "alice"),
            ("XDG_CONFIG_HOME", "/home/alice/.config"),
            ("REPO_ROOT", repo),
        ])
    }

    #[test]
    fn test_expand_known_vars() {
        let r = resolver("/home/alice", "/src/repo");
        assert_eq!(
            r.expand("${HOME}/.claude/${USER}.md"),
            "/home/alice/.claude/alice.md"
        );
        assert_eq!(r.expand("${XDG_CONFIG_HOME}/zed"), "/home/alice/.config/zed");
        assert_eq!(r.expand("${REPO_ROOT}/docs"), "/src/repo/docs");
    }

    #[test]
    fn test_expand_does_not_touch_longer_tokens() {
        let r = resolver("/home/alice", "/src/repo");
        assert_eq!(
            r.expand("${HOME}/x:${HOME_BACKUP}/y"),
            "/home/alice/x:${HOME_BACKUP}/y"
        );
    }

    #[test]
    fn test_expand_leaves_unknown_and_unbraced_tokens() {
        let r = resolver("/home/alice", "/src/repo");
        assert_eq!(r.expand("${SHELL}/$HOME/$(whoami)"), "${SHELL}/$HOME/$(whoami)");
        // XDG_DATA_HOME was not provided
        assert_eq!(r.expand("${XDG_DATA_HOME}/a"), "${XDG_DATA_HOME}/a");
    }

    #[test]
    fn test_expand_value_is_not_reexpanded() {
        let r = PathResolver::new([("HOME", "${USER}"), ("USER", "bob")]);
        assert_eq!(r.expand("${HOME}"), "${USER}");
        assert_eq!(r.expand("${USER}${HOME}"), "bob${USER}");
        assert_eq!(r.expand("$(rm -rf /)"), "$(rm -rf /)");
        assert_eq!(r.expand("${HOME"), "${HOME");
    }

    #[test]
    fn test_relative_paths_anchor_at_repo_root() {
        let r = resolver("/home/alice", "/src/repo");
        assert_eq!(r.expand_path(".cursor/rules"), PathBuf::from("/src/repo/.cursor/rules"));
        assert_eq!(r.expand_path("/abs/x"), PathBuf::from("/abs/x"));
    }

    #[test]
    fn test_expand_glob_keeps_only_directories() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::create_dir_all(root.join("a/prompts")).unwrap();
        fs::create_dir_all(root.join("b/prompts")).unwrap();
        fs::create_dir_all(root.join("c")).unwrap();
        fs::write(root.join("c/prompts"), "not a dir").unwrap();

        let r = resolver("/home/alice", &root.display().to_string());
        let found = r.expand_glob("${REPO_ROOT}/*/prompts");

        assert_eq!(found, vec![root.join("a/prompts"), root.join("b/prompts")]);
    }

    #[test]
    fn test_expand_glob_no_match_is_empty() {
        let temp_dir = TempDir::new().unwrap();
        let r = resolver("/home/alice", &temp_dir.path().display().to_string());
        assert!(r.expand_glob("nothing-*/here").is_empty());
        assert!(r.expand_glob("[").is_empty());
    }

    #[test]
    fn test_target_paths_order_and_dedup() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::create_dir_all(root.join("g1")).unwrap();

        let r = resolver("/home/alice", &root.display().to_string());
        let destinations = Destinations {
            path: Some("${HOME}/one.md".to_string()),
            paths: vec!["two".to_string(), "/home/alice/one.md".to_string()],
            glob_paths: vec!["g*".to_string()],
        };

        assert_eq!(
            r.target_paths(&destinations),
            vec![
                PathBuf::from("/home/alice/one.md"),
                root.join("two"),
                root.join("g1"),
            ]
        );
    }
}
