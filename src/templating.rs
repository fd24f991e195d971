use chrono::{DateTime, Utc};
use regex::Regex;
use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::LazyLock;

static TEMPLATE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\{\{([^}]+)\}\}").unwrap());

/// Matches timestamps produced by [`format_timestamp`]
static TIMESTAMP_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}Z").unwrap());

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Variable name of the run timestamp
pub const TIMESTAMP_VAR: &str = "timestamp";

/// Variable name of the source document name
pub const NAME_VAR: &str = "name";

/// Substitutes placeholders in the content with variable values
pub fn substitute(content: &str, vars: &HashMap<&str, String>) -> String {
    TEMPLATE_RE
        .replace_all(content, |caps: &regex::Captures| {
            let key = caps[1].trim();
            vars.get(key)
                .cloned()
                .unwrap_or_else(|| caps[0].to_string())
        })
        .to_string()
}

/// Whether the template references the given variable
pub fn uses_var(content: &str, var: &str) -> bool {
    TEMPLATE_RE
        .captures_iter(content)
        .any(|caps| caps[1].trim() == var)
}

/// Render the value substituted for `{{timestamp}}`
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.format(TIMESTAMP_FORMAT).to_string()
}

/// Replace every rendered timestamp with the `{{timestamp}}` placeholder
pub fn mask_timestamps(content: &str) -> Cow<'_, str> {
    TIMESTAMP_RE.replace_all(content, "{{timestamp}}")
}
