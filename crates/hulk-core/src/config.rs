//! Site configuration management.
//!
//! The configuration is read once per process from `_config.yml` (or `_config.toml`),
//! merged with the built-in defaults and then resolved against the directory that
//! holds the file. Everything downstream consumes the resolved value and never
//! mutates it.

use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{CoreError, Result};

/// Ignore patterns that are always active. Users can append to this list but not
/// remove entries from it.
pub const DEFAULT_IGNORES: &[&str] = &[
    "_config.yml",
    "_config.yaml",
    "_config.toml",
    "node_modules/**",
    "package.json",
    "**/.*",
    ".*/**",
];

/// Main configuration structure for hulk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Root of the source tree.
    #[serde(default = "default_source")]
    pub source: PathBuf,

    /// Root of the rendered output tree.
    #[serde(default = "default_destination")]
    pub destination: PathBuf,

    /// Layouts directory, relative to `source`.
    #[serde(default = "default_layouts")]
    pub layouts: PathBuf,

    /// Posts directory, relative to `source`.
    #[serde(default = "default_posts")]
    pub posts: PathBuf,

    /// Pattern that shapes a post URL from its date and slug.
    #[serde(default = "default_permalink")]
    pub permalink: String,

    /// Public site URL without a trailing slash.
    #[serde(default)]
    pub url: String,

    /// Glob patterns, relative to `source`, for files that are never processed.
    #[serde(default)]
    pub ignore: Vec<String>,

    /// Syntax highlighting theme for fenced code blocks.
    #[serde(default = "default_syntax_theme")]
    pub syntax_theme: String,

    /// User values merged into the global template data.
    #[serde(default)]
    pub global: Map<String, Value>,

    /// Any other top-level keys, also exposed to templates.
    #[serde(default, flatten)]
    pub extra: Map<String, Value>,
}

fn default_source() -> PathBuf {
    PathBuf::from(".")
}

fn default_destination() -> PathBuf {
    PathBuf::from("_site")
}

fn default_layouts() -> PathBuf {
    PathBuf::from("_layouts")
}

fn default_posts() -> PathBuf {
    PathBuf::from("_posts")
}

fn default_permalink() -> String {
    "/{{year}}/{{month}}/{{day}}/{{slug}}.html".to_string()
}

fn default_syntax_theme() -> String {
    "base16-ocean.dark".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            source: default_source(),
            destination: default_destination(),
            layouts: default_layouts(),
            posts: default_posts(),
            permalink: default_permalink(),
            url: String::new(),
            ignore: Vec::new(),
            syntax_theme: default_syntax_theme(),
            global: Map::new(),
            extra: Map::new(),
        }
    }
}

impl Config {
    /// Build a resolved configuration for the given source and destination roots.
    /// Relative roots stay relative to the working directory.
    pub fn new(source: impl Into<PathBuf>, destination: impl Into<PathBuf>) -> Result<Self> {
        Self {
            source: source.into(),
            destination: destination.into(),
            ..Self::default()
        }
        .resolve(Path::new("."))
    }

    /// Load configuration from a YAML or TOML file, chosen by extension.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(CoreError::config(format!(
                "Configuration file not found: {}",
                path.display()
            )));
        }

        debug!(path = %path.display(), "loading configuration");
        let content = std::fs::read_to_string(path)?;
        let config = Self::parse(&content, path)?;
        config.resolve(&config_dir(path))
    }

    /// Load configuration from a file layered under `HULK__*` environment variables.
    pub fn load_with_env(path: &Path) -> Result<Self> {
        debug!(path = %path.display(), "loading configuration with environment overrides");
        let settings = config::Config::builder()
            .add_source(config::File::from(path))
            .add_source(config::Environment::with_prefix("HULK").separator("__"))
            .build()?;

        let config: Config = settings.try_deserialize()?;
        config.resolve(&config_dir(path))
    }

    /// Parse unresolved configuration text. `path` selects the format and names the
    /// file in error messages.
    pub fn parse(content: &str, path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);

        let parsed = match ext.as_deref() {
            Some("toml") => toml::from_str::<Config>(content).map_err(|e| {
                CoreError::config_with_source(
                    format!("Failed to parse config file: {}", path.display()),
                    e,
                )
            })?,
            Some("yml" | "yaml") => {
                // An empty YAML file is a valid "all defaults" configuration.
                if content.trim().is_empty() {
                    Config::default()
                } else {
                    serde_yaml::from_str::<Config>(content).map_err(|e| {
                        CoreError::config_with_source(
                            format!("Failed to parse config file: {}", path.display()),
                            e,
                        )
                    })?
                }
            }
            _ => {
                return Err(CoreError::config(format!(
                    "Unsupported configuration format: {}",
                    path.display()
                )));
            }
        };

        Ok(parsed)
    }

    /// Resolve paths against `base_dir`, merge the ignore list with the defaults, trim
    /// the site URL and validate the result.
    ///
    /// Resolving an already resolved configuration is a no-op.
    pub fn resolve(mut self, base_dir: &Path) -> Result<Self> {
        self.source = normalize(&base_dir.join(&self.source));
        self.destination = normalize(&base_dir.join(&self.destination));

        let mut ignore: Vec<String> = DEFAULT_IGNORES.iter().map(|s| (*s).to_string()).collect();
        for pattern in self.ignore.drain(..) {
            if !ignore.contains(&pattern) {
                ignore.push(pattern);
            }
        }

        if let Ok(relative) = self.destination.strip_prefix(&self.source)
            && !relative.as_os_str().is_empty()
        {
            let pattern = format!("{}/**", to_slash(relative));
            if !ignore.contains(&pattern) {
                ignore.push(pattern);
            }
        }
        self.ignore = ignore;

        if self.url.ends_with('/') {
            self.url.pop();
        }

        self.validate()?;
        Ok(self)
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<()> {
        if self.source == self.destination {
            return Err(CoreError::config(
                "destination must differ from the source directory",
            ));
        }
        if self.source.starts_with(&self.destination) {
            return Err(CoreError::config(format!(
                "destination {} contains the source directory",
                self.destination.display()
            )));
        }

        for (name, dir) in [("layouts", &self.layouts), ("posts", &self.posts)] {
            if dir.as_os_str().is_empty() {
                return Err(CoreError::config(format!("{name} cannot be empty")));
            }
            if dir.is_absolute() || dir.components().any(|c| c == Component::ParentDir) {
                return Err(CoreError::config(format!(
                    "{name} must be a directory inside the source: {}",
                    dir.display()
                )));
            }
        }

        if !self.permalink.contains("slug") {
            return Err(CoreError::config(format!(
                "permalink must reference {{{{slug}}}}: {}",
                self.permalink
            )));
        }

        self.ignore_patterns()?;
        Ok(())
    }

    /// Compile the ignore list.
    pub fn ignore_patterns(&self) -> Result<Vec<glob::Pattern>> {
        self.ignore
            .iter()
            .map(|p| {
                glob::Pattern::new(p).map_err(|e| {
                    CoreError::config_with_source(format!("invalid ignore pattern `{p}`"), e)
                })
            })
            .collect()
    }

    /// User-defined values for the global template data: `global` first, then any
    /// extra top-level keys that `global` does not already define.
    pub fn globals(&self) -> Map<String, Value> {
        let mut globals = self.global.clone();
        for (key, value) in &self.extra {
            globals.entry(key.clone()).or_insert_with(|| value.clone());
        }
        globals
    }

    /// Get the full URL for a site path.
    pub fn url_for(&self, path: &str) -> String {
        let path = path.trim_start_matches('/');
        format!("{}/{path}", self.url)
    }
}

fn config_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// Lexically normalize a path: drop `.` components and fold `..` into its parent.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other),
        }
    }
    if out.as_os_str().is_empty() {
        out.push(".");
    }
    out
}

/// Render a relative path with `/` separators on every platform.
pub fn to_slash(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
