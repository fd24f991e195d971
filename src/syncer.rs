//! Sync orchestration
//!
//! Walks the selected agents and their targets in manifest order and hands
//! each (agent, category) pair to the matching strategy.

use anyhow::Result;
use colored::Colorize;
use std::path::{Path, PathBuf};

use crate::assembler::{self, FrontmatterMode};
use crate::backup::BackupStore;
use crate::config::{Category, Manifest, SyncFormat, Target, TargetEntry, validate_agent_name};
use crate::error::ConfigError;
use crate::paths::PathResolver;
use crate::registry::{REGISTRY_FILE_NAME, SyncRegistry};
use crate::writer::{Rendered, SyncRun};

/// Directory name of backups inside the state directory
pub const BACKUP_DIR_NAME: &str = "backups";

/// Options for the sync operation
#[derive(Debug, Default)]
pub struct SyncOptions {
    /// Show what would be done without making changes
    pub dry_run: bool,
    /// Back up files before overwriting or removing them
    pub backup: bool,
    /// Show detailed output
    pub verbose: bool,
    /// Restrict the run to these agents
    pub agents: Option<Vec<String>>,
}

/// Result of a sync operation
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SyncResult {
    pub created: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub removed: usize,
    pub warnings: usize,
    pub errors: usize,
}

impl SyncResult {
    pub fn has_errors(&self) -> bool {
        self.errors > 0
    }
}

/// One agent as shown by `--list`
#[derive(Debug)]
pub struct AgentListing {
    pub name: String,
    pub enabled: bool,
    pub description: String,
    pub targets: Vec<TargetListing>,
}

#[derive(Debug)]
pub struct TargetListing {
    pub category: Category,
    /// The strategy, or why the target cannot be used
    pub format: Result<SyncFormat, ConfigError>,
    pub destinations: Vec<PathBuf>,
}

/// Performs the synchronization described by a manifest
pub struct Syncer {
    manifest: Manifest,
    resolver: PathResolver,
    state_dir: PathBuf,
}

impl Syncer {
    pub fn new(manifest: Manifest, resolver: PathResolver, state_dir: PathBuf) -> Self {
        Self {
            manifest,
            resolver,
            state_dir,
        }
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    pub fn registry_path(&self) -> PathBuf {
        self.state_dir.join(REGISTRY_FILE_NAME)
    }

    pub fn backup_dir(&self) -> PathBuf {
        self.state_dir.join(BACKUP_DIR_NAME)
    }

    /// Validate an agent filter against the naming rule and the manifest.
    ///
    /// Names are checked before they are used for any lookup.
    pub fn check_agent_filter(&self, agents: &[String]) -> Result<(), ConfigError> {
        for name in agents {
            validate_agent_name(name)?;
            if !self.manifest.agents.contains_key(name) {
                return Err(ConfigError::UnknownAgent(name.clone()));
            }
        }
        Ok(())
    }

    /// Perform the sync operation
    pub fn sync(&self, options: &SyncOptions) -> Result<SyncResult> {
        if let Some(filter) = &options.agents {
            self.check_agent_filter(filter)?;
        }

        let registry = SyncRegistry::load(self.registry_path())?;
        let backups = options
            .backup
            .then(|| BackupStore::new(self.backup_dir()));
        let mut run = SyncRun::new(registry, backups, options.dry_run, options.verbose);

        if options.dry_run {
            println!("{}", "Running in dry-run mode\n".cyan());
        }

        for (agent_name, agent_config) in &self.manifest.agents {
            if let Some(filter) = &options.agents
                && !filter.contains(agent_name)
            {
                continue;
            }

            if !agent_config.enabled {
                if options.verbose {
                    println!("  {} Skipping disabled agent: {}", "○".yellow(), agent_name);
                }
                continue;
            }

            let desc = if agent_config.description.is_empty() {
                String::new()
            } else {
                format!(" - {}", agent_config.description)
            };
            println!("\n{}{}", agent_name.bold(), desc.dimmed());

            for category in Category::ALL {
                if let Err(e) = self.sync_target(&mut run, agent_name, category) {
                    run.fail(format!("{agent_name}/{category}"), &e);
                }
            }
        }

        run.finish(options.agents.is_none())
    }

    /// Sync one category to one agent.
    ///
    /// A missing target is a no-op. Failures of individual files are reported
    /// through the run; an error is returned only when the whole pair fails.
    pub fn sync_target(&self, run: &mut SyncRun, agent: &str, category: Category) -> Result<()> {
        let Some(entry) = self.manifest.target(agent, category) else {
            return Ok(());
        };
        let target = match entry {
            TargetEntry::Valid(target) => target,
            TargetEntry::Invalid(e) => return Err(e.clone().into()),
        };

        if run.verbose() {
            println!(
                "  Processing {} ({})",
                category.as_str().dimmed(),
                target.format()
            );
        }

        let destinations = self.resolver.target_paths(target.destinations());
        if destinations.is_empty() {
            run.warn(format!(
                "No destination found for {agent}/{category}; skipping"
            ));
            return Ok(());
        }

        match target {
            Target::Merged {
                header,
                output_filename,
                strip_frontmatter,
                ..
            } => self.sync_merged(
                run,
                category,
                &destinations,
                header.as_deref(),
                output_filename,
                *strip_frontmatter,
            ),
            Target::Individual {
                header,
                output_extension,
                strip_frontmatter,
                transform_frontmatter,
                ..
            } => self.sync_individual(
                run,
                category,
                &destinations,
                header.as_deref(),
                output_extension,
                FrontmatterMode::from_flags(*strip_frontmatter, *transform_frontmatter),
            ),
            Target::Directory { .. } => self.sync_directory(run, &destinations),
        }
    }

    fn source_files(&self, run: &mut SyncRun, category: Category) -> Vec<PathBuf> {
        let set = self.manifest.content_files(category);
        for missing in &set.missing {
            run.warn(format!("Source does not exist: {}", missing.display()));
        }
        set.paths
    }

    fn sync_merged(
        &self,
        run: &mut SyncRun,
        category: Category,
        destinations: &[PathBuf],
        header: Option<&str>,
        output_filename: &str,
        strip_frontmatter: bool,
    ) -> Result<()> {
        let sources = self.source_files(run, category);
        if sources.is_empty() {
            run.warn(format!("No {category} to merge"));
            return Ok(());
        }

        let document =
            assembler::merged_document(&sources, header, strip_frontmatter, run.timestamp())?;

        for destination in destinations {
            let file = assembler::merged_destination(destination, output_filename);
            run.write_or_report(&file, &document);
        }
        Ok(())
    }

    fn sync_individual(
        &self,
        run: &mut SyncRun,
        category: Category,
        destinations: &[PathBuf],
        template: Option<&str>,
        output_extension: &str,
        mode: FrontmatterMode,
    ) -> Result<()> {
        let sources = self.source_files(run, category);

        for source in &sources {
            let document =
                match assembler::individual_document(source, mode, template, run.timestamp()) {
                    Ok(document) => document,
                    Err(e) => {
                        run.fail(source.display().to_string(), &e);
                        continue;
                    }
                };
            let name = assembler::individual_file_name(source, output_extension);

            for destination in destinations {
                run.write_or_report(&destination.join(&name), &document);
            }
        }
        Ok(())
    }

    fn sync_directory(&self, run: &mut SyncRun, destinations: &[PathBuf]) -> Result<()> {
        let set = self.manifest.skill_directories();
        for missing in &set.missing {
            run.warn(format!("Skill directory does not exist: {}", missing.display()));
        }

        for skill_dir in &set.paths {
            if !assembler::has_skill_marker(skill_dir) {
                run.warn(format!(
                    "Skipping {}: missing {}",
                    skill_dir.display(),
                    crate::config::SKILL_MARKER
                ));
                continue;
            }

            let files = match assembler::skill_files(skill_dir) {
                Ok(files) => files,
                Err(e) => {
                    run.fail(skill_dir.display().to_string(), &e);
                    continue;
                }
            };

            for file in &files {
                let bytes = match std::fs::read(&file.source) {
                    Ok(bytes) => bytes,
                    Err(e) => {
                        run.fail(file.source.display().to_string(), &e.into());
                        continue;
                    }
                };
                let rendered = Rendered::new(bytes);
                for destination in destinations {
                    run.write_or_report(&destination.join(&file.relative), &rendered);
                }
            }
        }
        Ok(())
    }

    /// Describe every agent and where its targets resolve to
    pub fn list(&self) -> Vec<AgentListing> {
        self.manifest
            .agents
            .iter()
            .map(|(name, agent)| AgentListing {
                name: name.clone(),
                enabled: agent.enabled,
                description: agent.description.clone(),
                targets: Category::ALL
                    .into_iter()
                    .filter_map(|category| {
                        let entry = self.manifest.target(name, category)?;
                        Some(match entry {
                            TargetEntry::Valid(target) => TargetListing {
                                category,
                                format: Ok(target.format()),
                                destinations: self.resolver.target_paths(target.destinations()),
                            },
                            TargetEntry::Invalid(e) => TargetListing {
                                category,
                                format: Err(e.clone()),
                                destinations: Vec::new(),
                            },
                        })
                    })
                    .collect(),
            })
            .collect()
    }

    pub fn state_dir(&self) -> &Path {
        &self.state_dir
    }
}
