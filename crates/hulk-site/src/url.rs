//! Unit URLs and their mapping onto the output tree.

use std::path::{Path, PathBuf};

use hulk_convert::{Context, template};
use serde_json::json;

use crate::classify::PostName;

/// Expand a permalink pattern for a post.
///
/// The pattern may reference `year`, `month`, `day` (zero padded) and `slug`.
pub fn expand_permalink(pattern: &str, post: &PostName) -> Result<String, template::TemplateError> {
    let tokens = json!({
        "year": post.date.format("%Y").to_string(),
        "month": post.date.format("%m").to_string(),
        "day": post.date.format("%d").to_string(),
        "slug": post.slug,
    });
    template::render_str(pattern, &Context::from(&tokens))
}

/// Normalise a URL to start with `/` and carry no trailing `/`, except for the root.
///
/// Returns `None` when a `..` segment would let the URL escape the output root.
pub fn normalize_url(url: &str) -> Option<String> {
    let url = url.replace('\\', "/");
    if url.split('/').any(|segment| segment == "..") {
        return None;
    }

    let trimmed = url.trim_matches('/');
    if trimmed.is_empty() {
        return Some("/".to_string());
    }
    Some(format!("/{trimmed}"))
}

/// Site URL for a path relative to the source root.
pub fn url_from_relative(relative: &Path) -> String {
    format!("/{}", hulk_core::config::to_slash(relative))
}

/// Where a unit with `url` lands under `root`. URLs without a file extension are
/// treated as directories and gain `index.html`.
pub fn destination_for(root: &Path, url: &str) -> PathBuf {
    let relative = url.trim_start_matches('/');
    let mut path = root.to_path_buf();
    path.extend(relative.split('/').filter(|s| !s.is_empty()));

    let has_extension = Path::new(relative).extension().is_some();
    if !has_extension {
        path.push("index.html");
    }
    path
}
