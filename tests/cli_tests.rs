//! End-to-End CLI Tests for rulesync
//!
//! These tests run the binary against a scratch library and home directory
//! and check both the output and the resulting file system.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

// =============================================================================
// HELPER FUNCTIONS
// =============================================================================

const MANIFEST: &str = r##"
rules:
  files: [general.md, rust.md]
prompts:
  files: [review.md]
skills:
  directories: [pdf]
agents:
  claude:
    description: Claude Code
    targets:
      rules:
        path: ${HOME}/.claude/CLAUDE.md
        header: "# Rules\n<!-- synced {{timestamp}} -->"
        strip_frontmatter: true
      prompts:
        format: individual
        path: ${HOME}/.claude/commands
      skills:
        format: directory
        path: ${HOME}/.claude/skills
  copilot:
    description: GitHub Copilot
    targets:
      prompts:
        format: individual
        path: .github/prompts
        output_extension: .prompt.md
        transform_frontmatter: true
        header: "---\nmode: agent\ndescription: {{name}}\n---"
"##;

struct Project {
    temp_dir: TempDir,
}

impl Project {
    fn new() -> Self {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();

        for dir in ["library/rules", "library/prompts", "library/skills/pdf", "home", "repo"] {
            fs::create_dir_all(root.join(dir)).unwrap();
        }
        fs::write(
            root.join("library/rules/general.md"),
            "---\napplyTo: '**'\n---\n# General\n\nBe concise.\n",
        )
        .unwrap();
        fs::write(root.join("library/rules/rust.md"), "# Rust\n\nUse clippy.\n").unwrap();
        fs::write(
            root.join("library/prompts/review.md"),
            "---\ndescription: Review\n---\nReview the staged diff.\n",
        )
        .unwrap();
        fs::write(root.join("library/skills/pdf/SKILL.md"), "# PDF\n").unwrap();
        fs::write(root.join("library/rulesync.yaml"), MANIFEST).unwrap();

        Self { temp_dir }
    }

    fn root(&self) -> &Path {
        self.temp_dir.path()
    }

    fn home(&self) -> PathBuf {
        self.root().join("home")
    }

    fn repo(&self) -> PathBuf {
        self.root().join("repo")
    }

    fn state(&self) -> PathBuf {
        self.root().join("state")
    }

    fn cmd(&self) -> Command {
        let mut cmd = Command::cargo_bin("rulesync").unwrap();
        cmd.current_dir(self.root().join("library"))
            .env("HOME", self.home())
            .env("REPO_ROOT", self.repo())
            .env("RULESYNC_STATE_DIR", self.state())
            .env("NO_COLOR", "1")
            .env_remove("XDG_CONFIG_HOME")
            .env_remove("XDG_DATA_HOME");
        cmd
    }
}

// =============================================================================
// SYNC TESTS
// =============================================================================

#[test]
fn test_cli_sync_writes_every_target() {
    let project = Project::new();

    project
        .cmd()
        .assert()
        .success()
        .stdout(predicate::str::contains("Sync complete"))
        .stdout(predicate::str::contains("Created: 4"));

    let claude = fs::read_to_string(project.home().join(".claude/CLAUDE.md")).unwrap();
    assert!(claude.starts_with("# Rules\n<!-- synced "));
    assert!(claude.ends_with("# General\n\nBe concise.\n\n---\n\n# Rust\n\nUse clippy.\n"));

    assert!(project.home().join(".claude/commands/review.md").exists());
    assert!(project.home().join(".claude/skills/pdf/SKILL.md").exists());
    assert_eq!(
        fs::read_to_string(project.repo().join(".github/prompts/review.prompt.md")).unwrap(),
        "---\nmode: agent\ndescription: review\n---\nReview the staged diff.\n"
    );
    assert!(project.state().join("synced-files").exists());
}

#[test]
fn test_cli_second_run_changes_nothing() {
    let project = Project::new();
    project.cmd().assert().success();

    let claude_path = project.home().join(".claude/CLAUDE.md");
    let before = fs::read_to_string(&claude_path).unwrap();

    project
        .cmd()
        .assert()
        .success()
        .stdout(predicate::str::contains("Created: 0, Updated: 0, Unchanged: 4"));

    assert_eq!(fs::read_to_string(&claude_path).unwrap(), before);
}

#[test]
fn test_cli_finds_manifest_from_subdirectory() {
    let project = Project::new();
    let nested = project.root().join("library/rules");

    project
        .cmd()
        .current_dir(&nested)
        .assert()
        .success()
        .stdout(predicate::str::contains("Sync complete"));
}

#[test]
fn test_cli_missing_manifest_fails() {
    let project = Project::new();

    project
        .cmd()
        .current_dir(project.home())
        .assert()
        .failure()
        .stderr(predicate::str::contains("Could not find rulesync.yaml"));
}

#[test]
fn test_cli_dry_run_shows_diff_without_writing() {
    let project = Project::new();
    project.cmd().assert().success();

    fs::write(
        project.root().join("library/rules/rust.md"),
        "# Rust\n\nUse clippy and rustfmt.\n",
    )
    .unwrap();
    let claude_path = project.home().join(".claude/CLAUDE.md");
    let before = fs::read_to_string(&claude_path).unwrap();

    project
        .cmd()
        .arg("--dry-run")
        .assert()
        .success()
        .stdout(predicate::str::contains("Would update"))
        .stdout(predicate::str::contains("+Use clippy and rustfmt."))
        .stdout(predicate::str::contains("-Use clippy."));

    assert_eq!(fs::read_to_string(&claude_path).unwrap(), before);
}

#[test]
fn test_cli_removes_stale_outputs() {
    let project = Project::new();
    project.cmd().assert().success();

    let prompt = project.repo().join(".github/prompts/review.prompt.md");
    assert!(prompt.exists());

    let manifest = MANIFEST.replace("files: [review.md]", "files: []");
    fs::write(project.root().join("library/rulesync.yaml"), manifest).unwrap();

    project
        .cmd()
        .assert()
        .success()
        .stdout(predicate::str::contains("Removed: 2"));

    assert!(!prompt.exists());
    assert!(!project.home().join(".claude/commands/review.md").exists());
    assert!(project.home().join(".claude/CLAUDE.md").exists());
}

#[test]
fn test_cli_backup_keeps_previous_version() {
    let project = Project::new();
    project.cmd().assert().success();

    fs::write(project.root().join("library/prompts/review.md"), "Review it.\n").unwrap();
    project.cmd().arg("--backup").assert().success();

    // One slot per destination directory
    let slots: Vec<PathBuf> = fs::read_dir(project.state().join("backups"))
        .unwrap()
        .map(|e| e.unwrap().path())
        .collect();
    assert_eq!(slots.len(), 2);

    let backups: Vec<String> = slots
        .iter()
        .flat_map(|slot| fs::read_dir(slot).unwrap())
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert!(backups.iter().any(|name| name.starts_with("review.md.")));
    assert!(backups.iter().any(|name| name.starts_with("review.prompt.md.")));
}

// =============================================================================
// AGENT FILTER TESTS
// =============================================================================

#[test]
fn test_cli_agent_filter_limits_sync() {
    let project = Project::new();

    project.cmd().args(["--agent", "copilot"]).assert().success();

    assert!(project.repo().join(".github/prompts/review.prompt.md").exists());
    assert!(!project.home().join(".claude").exists());
}

#[test]
fn test_cli_rejects_invalid_agent_name() {
    let project = Project::new();

    project
        .cmd()
        .args(["--agent", "my;agent"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid agent name"));

    assert!(!project.state().join("synced-files").exists());
}

#[test]
fn test_cli_rejects_unknown_agent() {
    let project = Project::new();

    project
        .cmd()
        .args(["-a", "claude,windsurf"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown agent 'windsurf'"));

    assert!(!project.home().join(".claude").exists());
}

// =============================================================================
// ERROR AND LISTING TESTS
// =============================================================================

#[test]
fn test_cli_unknown_format_exits_with_error() {
    let project = Project::new();
    let manifest = MANIFEST.replace("format: directory", "format: zip");
    fs::write(project.root().join("library/rulesync.yaml"), manifest).unwrap();

    project
        .cmd()
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Unknown sync format 'zip'"));

    // Other targets still synced
    assert!(project.home().join(".claude/CLAUDE.md").exists());
}

#[test]
fn test_cli_list_shows_resolved_targets() {
    let project = Project::new();
    let home = project.home().display().to_string();

    project
        .cmd()
        .arg("--list")
        .assert()
        .success()
        .stdout(predicate::str::contains("claude (enabled) - Claude Code"))
        .stdout(predicate::str::contains(format!("{home}/.claude/CLAUDE.md")))
        .stdout(predicate::str::contains("individual"));

    assert!(!project.home().join(".claude").exists());
    assert!(!project.state().exists());
}
