//! Manifest parsing for rulesync
//!
//! Handles the YAML manifest that lists the source documents of each
//! content category and, per agent, where and how they are synchronized.

use anyhow::{Context, Result};
use indexmap::IndexMap;
use regex::Regex;
use serde::Deserialize;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use crate::error::ConfigError;

/// Manifest file names, in lookup order
pub const MANIFEST_FILE_NAMES: &[&str] = &["rulesync.yaml", "rulesync.yml"];

/// Marker file every skill directory must contain
pub const SKILL_MARKER: &str = "SKILL.md";

/// Default output file name for merged targets
pub const DEFAULT_OUTPUT_FILENAME: &str = "rules.md";

/// Default output extension for individual targets
pub const DEFAULT_OUTPUT_EXTENSION: &str = ".md";

static AGENT_NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_-]+$").unwrap());

/// Check an agent name before it is used to query the manifest or build paths.
pub fn validate_agent_name(name: &str) -> Result<(), ConfigError> {
    if AGENT_NAME_RE.is_match(name) {
        Ok(())
    } else {
        Err(ConfigError::InvalidAgentName(name.to_string()))
    }
}

/// Environment variable overriding the state directory
pub const STATE_DIR_ENV: &str = "RULESYNC_STATE_DIR";

/// Per-user directory holding the sync registry and backups
pub fn default_state_dir() -> Result<PathBuf> {
    dirs::config_dir()
        .map(|dir| dir.join("rulesync"))
        .context("Could not determine the user configuration directory")
}

/// A named group of source documents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Category {
    Rules,
    Workflows,
    Prompts,
    Skills,
}

impl Category {
    /// All categories in sync order
    pub const ALL: [Category; 4] = [
        Category::Rules,
        Category::Workflows,
        Category::Prompts,
        Category::Skills,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Category::Rules => "rules",
            Category::Workflows => "workflows",
            Category::Prompts => "prompts",
            Category::Skills => "skills",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.as_str() == name)
    }

    /// Skills are whole directories, every other category is a list of files
    pub fn is_directory_based(self) -> bool {
        self == Category::Skills
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Root manifest structure
#[derive(Debug, Deserialize)]
pub struct Manifest {
    /// Root directory of the content library (relative to the manifest)
    #[serde(default)]
    pub content_dir: Option<String>,

    #[serde(default)]
    pub rules: Option<ContentSet>,

    #[serde(default)]
    pub workflows: Option<ContentSet>,

    #[serde(default)]
    pub prompts: Option<ContentSet>,

    #[serde(default)]
    pub skills: Option<ContentSet>,

    /// Agent configurations, in declaration order
    #[serde(default)]
    pub agents: IndexMap<String, AgentConfig>,

    #[serde(skip)]
    content_root: PathBuf,
}

/// Source documents of one category
#[derive(Debug, Default, Deserialize)]
pub struct ContentSet {
    /// Directory holding the documents, relative to the content root.
    /// Defaults to the category name.
    #[serde(default)]
    pub source_dir: Option<String>,

    /// Document file names (rules, workflows, prompts)
    #[serde(default)]
    pub files: Vec<String>,

    /// Skill directory names (skills)
    #[serde(default)]
    pub directories: Vec<String>,
}

/// Configuration for a single agent
#[derive(Debug, Deserialize)]
pub struct AgentConfig {
    /// Whether this agent is enabled
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Human-readable description
    #[serde(default)]
    pub description: String,

    /// Target definitions keyed by category name
    #[serde(default)]
    pub targets: IndexMap<String, TargetEntry>,
}

fn default_true() -> bool {
    true
}

/// Strategy used to deliver a category to an agent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncFormat {
    Merged,
    Individual,
    Directory,
}

impl SyncFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            SyncFormat::Merged => "merged",
            SyncFormat::Individual => "individual",
            SyncFormat::Directory => "directory",
        }
    }
}

impl fmt::Display for SyncFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a target writes. Every form present is used.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Destinations {
    pub path: Option<String>,
    pub paths: Vec<String>,
    pub glob_paths: Vec<String>,
}

impl Destinations {
    pub fn is_empty(&self) -> bool {
        self.path.is_none() && self.paths.is_empty() && self.glob_paths.is_empty()
    }
}

/// A validated target definition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// Concatenate every source document into one file per destination
    Merged {
        destinations: Destinations,
        header: Option<String>,
        output_filename: String,
        strip_frontmatter: bool,
    },
    /// One output file per source document
    Individual {
        destinations: Destinations,
        /// Frontmatter template used when `transform_frontmatter` is set
        header: Option<String>,
        output_extension: String,
        strip_frontmatter: bool,
        transform_frontmatter: bool,
    },
    /// Mirror each skill directory
    Directory { destinations: Destinations },
}

impl Target {
    pub fn format(&self) -> SyncFormat {
        match self {
            Target::Merged { .. } => SyncFormat::Merged,
            Target::Individual { .. } => SyncFormat::Individual,
            Target::Directory { .. } => SyncFormat::Directory,
        }
    }

    pub fn destinations(&self) -> &Destinations {
        match self {
            Target::Merged { destinations, .. }
            | Target::Individual { destinations, .. }
            | Target::Directory { destinations } => destinations,
        }
    }
}

/// A target as found in the manifest: either usable, or the reason it is not.
///
/// Invalid entries do not prevent the manifest from loading; they fail only
/// the (agent, category) pair they belong to.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "RawTarget")]
pub enum TargetEntry {
    Valid(Target),
    Invalid(ConfigError),
}

#[derive(Debug, Default, Deserialize)]
struct RawTarget {
    #[serde(default)]
    format: Option<String>,
    #[serde(default)]
    path: Option<String>,
    #[serde(default)]
    paths: Vec<String>,
    #[serde(default)]
    glob_paths: Vec<String>,
    #[serde(default)]
    header: Option<String>,
    #[serde(default)]
    output_filename: Option<String>,
    #[serde(default)]
    output_extension: Option<String>,
    #[serde(default)]
    strip_frontmatter: bool,
    #[serde(default)]
    transform_frontmatter: bool,
}

impl From<RawTarget> for TargetEntry {
    fn from(raw: RawTarget) -> Self {
        let format = match raw.format.as_deref().unwrap_or("merged") {
            "merged" => SyncFormat::Merged,
            "individual" => SyncFormat::Individual,
            "directory" => SyncFormat::Directory,
            other => return TargetEntry::Invalid(ConfigError::UnknownFormat(other.to_string())),
        };

        let destinations = Destinations {
            path: raw.path,
            paths: raw.paths,
            glob_paths: raw.glob_paths,
        };
        if destinations.is_empty() {
            return TargetEntry::Invalid(ConfigError::MissingDestination);
        }

        let target = match format {
            SyncFormat::Merged => Target::Merged {
                destinations,
                header: raw.header,
                output_filename: raw
                    .output_filename
                    .unwrap_or_else(|| DEFAULT_OUTPUT_FILENAME.to_string()),
                strip_frontmatter: raw.strip_frontmatter,
            },
            SyncFormat::Individual => Target::Individual {
                destinations,
                header: raw.header,
                output_extension: raw
                    .output_extension
                    .unwrap_or_else(|| DEFAULT_OUTPUT_EXTENSION.to_string()),
                strip_frontmatter: raw.strip_frontmatter,
                transform_frontmatter: raw.transform_frontmatter,
            },
            SyncFormat::Directory => Target::Directory { destinations },
        };
        TargetEntry::Valid(target)
    }
}

impl TargetEntry {
    /// Reject strategies that cannot serve the category they are declared under
    fn check_category(self, category: Category) -> Self {
        let TargetEntry::Valid(target) = self else {
            return self;
        };
        let format = target.format();
        let fits = match format {
            SyncFormat::Directory => category.is_directory_based(),
            SyncFormat::Merged | SyncFormat::Individual => !category.is_directory_based(),
        };
        if fits {
            TargetEntry::Valid(target)
        } else {
            TargetEntry::Invalid(ConfigError::FormatMismatch {
                format: format.as_str(),
                category: category.as_str(),
            })
        }
    }
}

/// Resolved source paths of a category, with the entries that were not found
#[derive(Debug, Default, PartialEq, Eq)]
pub struct SourceSet {
    pub paths: Vec<PathBuf>,
    pub missing: Vec<PathBuf>,
}

impl Manifest {
    /// Load the manifest from a file
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read manifest: {}", path.display()))?;
        let base_dir = path.parent().unwrap_or(Path::new("."));

        Self::parse(&content, base_dir)
            .with_context(|| format!("Failed to parse manifest: {}", path.display()))
    }

    /// Parse manifest text; relative source paths resolve against `base_dir`
    pub fn parse(content: &str, base_dir: &Path) -> Result<Self> {
        let mut manifest: Manifest = serde_yaml::from_str(content)?;

        for name in manifest.agents.keys() {
            validate_agent_name(name)?;
        }

        for (agent_name, agent) in manifest.agents.iter_mut() {
            for (key, entry) in agent.targets.iter_mut() {
                match Category::from_name(key) {
                    Some(category) => *entry = entry.clone().check_category(category),
                    None => {
                        tracing::warn!(agent = %agent_name, category = %key, "Ignoring unknown content category");
                    }
                }
            }
        }

        manifest.content_root = match manifest.content_dir.as_deref() {
            Some(dir) => base_dir.join(dir),
            None => base_dir.to_path_buf(),
        };

        Ok(manifest)
    }

    /// Find the manifest by searching up from `start_dir`
    pub fn find(start_dir: &Path) -> Result<PathBuf> {
        let mut current = start_dir.to_path_buf();

        loop {
            for name in MANIFEST_FILE_NAMES {
                let candidate = current.join(name);
                if candidate.is_file() {
                    return Ok(candidate);
                }
            }

            if !current.pop() {
                return Err(ConfigError::ManifestNotFound {
                    name: MANIFEST_FILE_NAMES[0].to_string(),
                    start: start_dir.to_path_buf(),
                }
                .into());
            }
        }
    }

    /// Root directory of the content library
    pub fn content_root(&self) -> &Path {
        &self.content_root
    }

    pub fn content_set(&self, category: Category) -> Option<&ContentSet> {
        match category {
            Category::Rules => self.rules.as_ref(),
            Category::Workflows => self.workflows.as_ref(),
            Category::Prompts => self.prompts.as_ref(),
            Category::Skills => self.skills.as_ref(),
        }
    }

    /// Directory holding the documents of a category
    pub fn source_dir(&self, category: Category) -> PathBuf {
        let dir = self
            .content_set(category)
            .and_then(|set| set.source_dir.as_deref())
            .unwrap_or(category.as_str());
        self.content_root.join(dir)
    }

    /// Source files of a category, in manifest order
    pub fn content_files(&self, category: Category) -> SourceSet {
        let names = self
            .content_set(category)
            .map(|set| set.files.as_slice())
            .unwrap_or_default();
        self.resolve_sources(category, names, Path::is_file)
    }

    /// Skill source directories, in manifest order
    pub fn skill_directories(&self) -> SourceSet {
        let names = self
            .content_set(Category::Skills)
            .map(|set| set.directories.as_slice())
            .unwrap_or_default();
        self.resolve_sources(Category::Skills, names, Path::is_dir)
    }

    fn resolve_sources(
        &self,
        category: Category,
        names: &[String],
        exists: fn(&Path) -> bool,
    ) -> SourceSet {
        let source_dir = self.source_dir(category);
        let mut set = SourceSet::default();

        for name in names {
            let path = source_dir.join(name);
            if exists(&path) {
                set.paths.push(path);
            } else {
                set.missing.push(path);
            }
        }

        set
    }

    /// Target definition of an agent for a category; `None` means nothing to sync
    pub fn target(&self, agent: &str, category: Category) -> Option<&TargetEntry> {
        self.agents
            .get(agent)
            .and_then(|config| config.targets.get(category.as_str()))
    }
}
