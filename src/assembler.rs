//! Content assembly for the three sync strategies.
//!
//! These functions only read sources and build the bytes to write; all
//! destination I/O goes through [`crate::writer::SyncRun`].

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::config::SKILL_MARKER;
use crate::frontmatter;
use crate::templating::{self, NAME_VAR, TIMESTAMP_VAR};
use crate::writer::Rendered;

/// Separator placed between documents of a merged file
pub const MERGE_SEPARATOR: &str = "\n\n---\n\n";

/// Frontmatter used by `transform_frontmatter` when the target has no header
pub const DEFAULT_FRONTMATTER_TEMPLATE: &str = "---\nname: {{name}}\n---\n";

const MARKDOWN_EXTENSIONS: &[&str] = &["md", "mdc", "markdown"];

/// How an individual document treats its frontmatter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrontmatterMode {
    Keep,
    Strip,
    Transform,
}

impl FrontmatterMode {
    pub fn from_flags(strip: bool, transform: bool) -> Self {
        if transform {
            FrontmatterMode::Transform
        } else if strip {
            FrontmatterMode::Strip
        } else {
            FrontmatterMode::Keep
        }
    }
}

fn read_source(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("Failed to read source: {}", path.display()))
}

/// Render a header template; the flag tells whether it embeds the run timestamp
fn render_header(template: &str, vars: &HashMap<&str, String>) -> (String, bool) {
    (
        templating::substitute(template, vars),
        templating::uses_var(template, TIMESTAMP_VAR),
    )
}

/// Concatenate sources in the given order into one document.
///
/// Each document has its surrounding blank lines trimmed; documents are
/// separated by [`MERGE_SEPARATOR`] and the result ends with one newline.
pub fn merged_document(
    sources: &[PathBuf],
    header: Option<&str>,
    strip_frontmatter: bool,
    timestamp: &str,
) -> Result<Rendered> {
    let mut bodies = Vec::with_capacity(sources.len());
    for source in sources {
        let content = read_source(source)?;
        let body = if strip_frontmatter {
            frontmatter::strip(&content)
        } else {
            content.as_str()
        };
        bodies.push(body.trim_matches(['\n', '\r']).to_string());
    }

    let mut out = String::new();
    let mut stamped_header = None;
    if let Some(template) = header {
        let vars = HashMap::from([(TIMESTAMP_VAR, timestamp.to_string())]);
        let (text, stamped) = render_header(template, &vars);
        out.push_str(text.trim_end_matches(['\n', '\r']));
        if stamped {
            stamped_header = Some(out.len());
        }
        out.push_str("\n\n");
    }
    out.push_str(&bodies.join(MERGE_SEPARATOR));
    out.push('\n');

    Ok(Rendered {
        bytes: out.into_bytes(),
        stamped_header,
    })
}

/// File a merged target writes for a configured destination.
///
/// Markdown file paths are used as is; directories (existing, or any path
/// without a markdown extension) get `output_filename` appended.
pub fn merged_destination(path: &Path, output_filename: &str) -> PathBuf {
    let is_markdown = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| MARKDOWN_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()));

    if is_markdown && !path.is_dir() {
        path.to_path_buf()
    } else {
        path.join(output_filename)
    }
}

/// Build the output document for one source file
pub fn individual_document(
    source: &Path,
    mode: FrontmatterMode,
    template: Option<&str>,
    timestamp: &str,
) -> Result<Rendered> {
    let content = read_source(source)?;

    let rendered = match mode {
        FrontmatterMode::Keep => Rendered::new(content),
        FrontmatterMode::Strip => Rendered::new(frontmatter::strip(&content)),
        FrontmatterMode::Transform => {
            let vars = HashMap::from([
                (NAME_VAR, source_stem(source)),
                (TIMESTAMP_VAR, timestamp.to_string()),
            ]);
            let (text, stamped) =
                render_header(template.unwrap_or(DEFAULT_FRONTMATTER_TEMPLATE), &vars);
            Rendered {
                bytes: frontmatter::replace(&content, &text).into_bytes(),
                stamped_header: stamped.then_some(text.len()),
            }
        }
    };

    Ok(rendered)
}

/// `<source stem><output_extension>`
pub fn individual_file_name(source: &Path, output_extension: &str) -> String {
    format!("{}{}", source_stem(source), output_extension)
}

fn source_stem(source: &Path) -> String {
    source
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Whether a skill directory carries its marker file
pub fn has_skill_marker(skill_dir: &Path) -> bool {
    skill_dir.join(SKILL_MARKER).is_file()
}

/// A file of a skill directory and where it lands under a destination
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkillFile {
    pub source: PathBuf,
    /// `<skill name>/<path inside the skill>`
    pub relative: PathBuf,
}

/// Every file of a skill directory, in a stable order
pub fn skill_files(skill_dir: &Path) -> Result<Vec<SkillFile>> {
    let Some(skill_name) = skill_dir.file_name() else {
        anyhow::bail!("Invalid skill directory: {}", skill_dir.display());
    };

    let mut files = Vec::new();
    for entry in WalkDir::new(skill_dir).min_depth(1).sort_by_file_name() {
        let entry = entry
            .with_context(|| format!("Failed to walk skill directory: {}", skill_dir.display()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let inner = entry.path().strip_prefix(skill_dir)?;
        files.push(SkillFile {
            source: entry.path().to_path_buf(),
            relative: Path::new(skill_name).join(inner),
        });
    }

    Ok(files)
}
