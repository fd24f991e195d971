//! rulesync CLI
//!
//! Command-line interface for syncing the content library into agent
//! configuration locations.

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use std::env;
use std::path::PathBuf;
use tracing::Level;

use rulesync::config::{self, Manifest, STATE_DIR_ENV};
use rulesync::paths::PathResolver;
use rulesync::{SyncOptions, SyncResult, Syncer};

#[derive(Parser)]
#[command(name = "rulesync")]
#[command(
    author,
    version,
    about = "Sync AI agent rules, workflows, prompts and skills from one library"
)]
struct Cli {
    /// Path to the manifest (default: search upward for rulesync.yaml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Only sync these agents (comma-separated)
    #[arg(short, long = "agent", value_delimiter = ',')]
    agents: Option<Vec<String>>,

    /// Show what would be done without making changes
    #[arg(long)]
    dry_run: bool,

    /// Back up files before overwriting or removing them
    #[arg(long)]
    backup: bool,

    /// List agents and their resolved targets, then exit
    #[arg(long)]
    list: bool,

    /// Show detailed output
    #[arg(short, long)]
    verbose: bool,

    /// Enable debug logging on stderr
    #[arg(long)]
    debug: bool,

    /// Directory for the sync registry and backups
    #[arg(long, env = STATE_DIR_ENV)]
    state_dir: Option<PathBuf>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(if cli.debug { Level::DEBUG } else { Level::WARN })
        .init();

    let cwd = env::current_dir().context("Failed to determine the current directory")?;

    let manifest_path = match cli.config {
        Some(p) => p,
        None => Manifest::find(&cwd)?,
    };
    let manifest = Manifest::load(&manifest_path)?;
    let state_dir = match cli.state_dir {
        Some(dir) => dir,
        None => config::default_state_dir()?,
    };
    tracing::debug!(
        manifest = %manifest_path.display(),
        state_dir = %state_dir.display(),
        "Loaded manifest"
    );

    let syncer = Syncer::new(manifest, PathResolver::from_env(&cwd), state_dir);

    if cli.list {
        print_listing(&syncer);
        return Ok(());
    }

    print_header();
    if cli.verbose {
        println!(
            "Using manifest: {}\n",
            manifest_path.display().to_string().dimmed()
        );
    }

    println!("{}", "➤ Syncing agent content".cyan().bold());
    let options = SyncOptions {
        dry_run: cli.dry_run,
        backup: cli.backup,
        verbose: cli.verbose,
        agents: cli.agents,
    };
    let result = syncer.sync(&options)?;

    print_summary(&result, cli.dry_run);

    if result.has_errors() {
        std::process::exit(1);
    }
    Ok(())
}

fn print_summary(result: &SyncResult, dry_run: bool) {
    let title = if dry_run {
        "✨ Dry run complete!"
    } else {
        "✨ Sync complete!"
    };
    println!("\n{}", title.green().bold());
    println!(
        "  Created: {}, Updated: {}, Unchanged: {}, Removed: {}, Warnings: {}, Errors: {}",
        result.created.to_string().green(),
        result.updated.to_string().yellow(),
        result.unchanged.to_string().dimmed(),
        result.removed.to_string().cyan(),
        if result.warnings > 0 {
            result.warnings.to_string().yellow()
        } else {
            result.warnings.to_string().dimmed()
        },
        if result.errors > 0 {
            result.errors.to_string().red()
        } else {
            result.errors.to_string().dimmed()
        }
    );
}

fn print_listing(syncer: &Syncer) {
    let listing = syncer.list();
    if listing.is_empty() {
        println!("{}", "No agents configured".yellow());
        return;
    }

    for agent in listing {
        let state = if agent.enabled {
            "enabled".green()
        } else {
            "disabled".yellow()
        };
        let desc = if agent.description.is_empty() {
            String::new()
        } else {
            format!(" - {}", agent.description)
        };
        println!("{} ({}){}", agent.name.bold(), state, desc.dimmed());

        for target in agent.targets {
            match target.format {
                Ok(format) => {
                    println!("  {:<10} {}", target.category.as_str(), format.to_string().cyan());
                    if target.destinations.is_empty() {
                        println!("    {} no destination found", "!".yellow());
                    }
                    for dest in target.destinations {
                        println!("    {} {}", "→".cyan(), dest.display());
                    }
                }
                Err(e) => {
                    println!("  {:<10} {} {}", target.category.as_str(), "✘".red(), e);
                }
            }
        }
    }
}

fn print_header() {
    println!(
        "{}",
        r#"
╔═══════════════════════════════════════════════════════════════════╗
║                           rulesync                                ║
║        AI Agent Rules, Prompts and Skills Synchronization         ║
╚═══════════════════════════════════════════════════════════════════╝
"#
        .cyan()
        .bold()
    );
}
