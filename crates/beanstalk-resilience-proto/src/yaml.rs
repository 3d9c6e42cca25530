//! The two YAML shapes the server uses for stats and tube listings.
//!
//! Replies are flat, so a line-based reader is all that is needed.

use std::collections::HashMap;

const HEAD: &[u8] = b"---\n";

/// Parses `key: value` lines. Lines without `": "` are skipped.
pub(crate) fn parse_dict(body: &[u8]) -> HashMap<String, String> {
    lines(body)
        .filter_map(|line| {
            let (key, value) = line.split_once(": ")?;
            Some((key.to_string(), value.to_string()))
        })
        .collect()
}

/// Parses `- item` lines. Other lines are skipped.
pub(crate) fn parse_list(body: &[u8]) -> Vec<String> {
    lines(body)
        .filter_map(|line| line.strip_prefix("- ").map(str::to_string))
        .collect()
}

fn lines(body: &[u8]) -> impl Iterator<Item = &str> {
    let body = body.strip_prefix(HEAD).unwrap_or(body);
    body.split(|&b| b == b'\n')
        .filter_map(|line| std::str::from_utf8(line).ok())
}
