//! Front matter parsing for content files.
//!
//! A front matter block is a YAML mapping fenced by two lines consisting of exactly
//! `---`. The opening fence must be the very first line of the file:
//!
//! ```text
//! ---
//! layout: post
//! title: Hello
//! ---
//! # Hi
//! ```
//!
//! Files without an opening fence have an empty front matter and their whole text
//! is the body.

use std::path::Path;

use serde_json::{Map, Value};

use crate::error::{CoreError, Result};

/// Parsed front matter: string keys mapped to scalar or structured values.
pub type FrontMatter = Map<String, Value>;

/// The delimiter line that opens and closes a front matter block.
pub const FENCE: &str = "---";

/// Returns true when `bytes` start with the front matter fence.
///
/// This only peeks at the first three bytes; it is what the classifier uses to tell a
/// page from a static asset without parsing anything.
pub fn starts_with_fence(bytes: &[u8]) -> bool {
    bytes.starts_with(FENCE.as_bytes())
}

/// Split `content` into the raw front matter block and the body.
///
/// Returns `Ok(None)` when the first line is not a fence. An opening fence without a
/// matching closing fence is an error.
pub fn split_front_matter<'a>(content: &'a str, path: &Path) -> Result<Option<(&'a str, &'a str)>> {
    let mut lines = content.split_inclusive('\n');

    let Some(first) = lines.next() else {
        return Ok(None);
    };
    if trim_line_ending(first) != FENCE {
        return Ok(None);
    }

    let block_start = first.len();
    let mut offset = block_start;
    for line in lines {
        if trim_line_ending(line) == FENCE {
            let block = &content[block_start..offset];
            let body = &content[offset + line.len()..];
            return Ok(Some((block, body)));
        }
        offset += line.len();
    }

    Err(CoreError::front_matter(
        path,
        "front matter block is not closed by a `---` line",
    ))
}

/// Parse front matter and body from a file's text.
pub fn parse_front_matter(content: &str, path: &Path) -> Result<(FrontMatter, String)> {
    let Some((block, body)) = split_front_matter(content, path)? else {
        return Ok((FrontMatter::new(), content.to_string()));
    };

    if block.trim().is_empty() {
        return Ok((FrontMatter::new(), body.to_string()));
    }

    let value: Value =
        serde_yaml::from_str(block).map_err(|e| CoreError::front_matter(path, e.to_string()))?;

    let front_matter = match value {
        Value::Object(map) => map,
        Value::Null => FrontMatter::new(),
        other => {
            return Err(CoreError::front_matter(
                path,
                format!("front matter must be a mapping, found {}", kind_of(&other)),
            ));
        }
    };

    Ok((front_matter, body.to_string()))
}

/// The `published` flag: the literal value when it is a boolean, `true` otherwise.
pub fn is_published(front_matter: &FrontMatter) -> bool {
    front_matter
        .get("published")
        .and_then(Value::as_bool)
        .unwrap_or(true)
}

/// A string-valued field, ignoring values of any other type.
pub fn str_field<'a>(front_matter: &'a FrontMatter, key: &str) -> Option<&'a str> {
    front_matter.get(key).and_then(Value::as_str)
}

fn trim_line_ending(line: &str) -> &str {
    line.trim_end_matches(['\n', '\r'])
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a sequence",
        Value::Object(_) => "a mapping",
    }
}
