//! New command - create a post or page with starter front matter

use std::{
    fs,
    path::{Path, PathBuf},
};

use chrono::{Local, NaiveDate};
use color_eyre::eyre::{Result, WrapErr, bail};
use hulk_core::Config;

/// What to create.
#[derive(Debug, Clone, PartialEq, Eq, clap::Subcommand)]
pub enum NewContent {
    /// A dated post in the posts directory
    Post {
        /// Post title; the file name slug is derived from it
        title: String,
    },
    /// A page at a path relative to the source root
    Page {
        /// Page path, e.g. docs/install
        path: PathBuf,
    },
}

/// Run the new command.
pub fn run(config_path: &Path, source: Option<&Path>, content: &NewContent) -> Result<()> {
    let config = super::load_config(config_path, source, None)?;
    let today = Local::now().date_naive();
    let (path, body) = plan(&config, content, today)?;

    tracing::info!(?path, "Creating new content");
    create(&path, &body)?;
    println!("Created: {}", path.display());

    Ok(())
}

/// Target file and initial contents for `content`.
fn plan(config: &Config, content: &NewContent, today: NaiveDate) -> Result<(PathBuf, String)> {
    match content {
        NewContent::Post { title } => {
            let slug = slugify(title);
            if slug.is_empty() {
                bail!("Cannot derive a file name from title {title:?}");
            }
            let file = format!("{}-{slug}.md", today.format("%Y-%m-%d"));
            let path = config.source.join(&config.posts).join(file);
            Ok((path, post_front_matter(title)))
        }
        NewContent::Page { path } => {
            if path.is_absolute()
                || path
                    .components()
                    .any(|c| matches!(c, std::path::Component::ParentDir))
            {
                bail!("Page path must stay inside the source: {}", path.display());
            }
            let file = if path.extension().is_some() {
                path.clone()
            } else {
                path.with_extension("md")
            };
            let title = file
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("Untitled")
                .replace(['-', '_'], " ");
            Ok((config.source.join(file), page_front_matter(&title)))
        }
    }
}

fn create(path: &Path, body: &str) -> Result<()> {
    if path.exists() {
        bail!("Refusing to overwrite {}", path.display());
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).wrap_err("Failed to create directories")?;
    }
    fs::write(path, body).wrap_err("Failed to write file")
}

/// Lowercase ASCII words joined by `-`.
fn slugify(title: &str) -> String {
    title
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|word| !word.is_empty())
        .map(str::to_ascii_lowercase)
        .collect::<Vec<_>>()
        .join("-")
}

fn post_front_matter(title: &str) -> String {
    format!(
        r#"---
layout: post
title: "{}"
---

Write your post here.
"#,
        title.replace('"', "\\\"")
    )
}

fn page_front_matter(title: &str) -> String {
    format!(
        r#"---
title: "{}"
---

Write your page here.
"#,
        title.replace('"', "\\\"")
    )
}
