//! Frontmatter handling for source documents.
//!
//! A document has frontmatter only when its first line is exactly `---`;
//! the block runs up to and including the next line that is exactly `---`.
//! Everything else is passed through byte for byte.

const DELIMITER: &str = "---";

/// Split a document into its frontmatter block (delimiters included) and body.
///
/// Concatenating the two halves always reproduces the input.
pub fn split(content: &str) -> (Option<&str>, &str) {
    let mut lines = content.split_inclusive('\n');

    let Some(first) = lines.next() else {
        return (None, content);
    };
    if !is_delimiter(first) {
        return (None, content);
    }

    let mut end = first.len();
    for line in lines {
        end += line.len();
        if is_delimiter(line) {
            return (Some(&content[..end]), &content[end..]);
        }
    }

    // An unterminated block is not frontmatter
    (None, content)
}

/// Document body with any frontmatter removed
pub fn strip(content: &str) -> &str {
    split(content).1
}

/// Replace the frontmatter with a rendered header.
///
/// The header is always terminated by a newline before the body follows.
pub fn replace(content: &str, header: &str) -> String {
    let body = strip(content);
    let mut out = String::with_capacity(header.len() + body.len() + 1);
    out.push_str(header);
    if !header.is_empty() && !header.ends_with('\n') {
        out.push('\n');
    }
    out.push_str(body);
    out
}

fn is_delimiter(line: &str) -> bool {
    line.trim_end_matches('\n').trim_end_matches('\r') == DELIMITER
}
