//! Ini-style `key=value` side files for token substitution.
//!
//! ```ini
//! ; comment
//! # comment
//! [section]      ; headers are accepted and ignored
//! version = 1.2.0
//! ```
//!
//! A line that is not a comment, header or assignment is skipped with a
//! warning.

use indexmap::IndexMap;

/// Parse side-file content into an ordered table.
///
/// The first assignment of a key wins, like properties.
///
/// ```
/// use antler::filters::parse_side_file;
///
/// let table = parse_side_file("; tokens\nkey=replaced\nbogus line\n");
/// assert_eq!(table.get("key").map(String::as_str), Some("replaced"));
/// assert_eq!(table.len(), 1);
/// ```
#[must_use]
pub fn parse_side_file(content: &str) -> IndexMap<String, String> {
    let mut table = IndexMap::new();

    for (line_num, line) in content.lines().enumerate() {
        let trimmed = line.trim();

        if trimmed.is_empty() || trimmed.starts_with([';', '#']) || is_header(trimmed) {
            continue;
        }

        if let Some((key, value)) = parse_assignment(trimmed) {
            table.entry(key).or_insert(value);
        } else {
            tracing::warn!(
                target: "antler::filter",
                "skipping malformed side-file line {}: {}",
                line_num + 1,
                trimmed
            );
        }
    }

    table
}

fn is_header(line: &str) -> bool {
    line.starts_with('[') && line.ends_with(']')
}

/// Parse `key = value`; the key must be non-empty.
fn parse_assignment(line: &str) -> Option<(String, String)> {
    let (key, value) = line.split_once('=')?;
    let key = key.trim();
    if key.is_empty() {
        return None;
    }
    Some((key.to_string(), value.trim().to_string()))
}
