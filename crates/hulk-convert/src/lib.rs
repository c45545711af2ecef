//! Hulk Convert Library
//!
//! Converters turn a content unit's body plus a template context into HTML. A
//! [`ConverterRegistry`] holds them in registration order and always has a
//! pass-through fallback, so looking up a converter never fails.

pub mod html;
pub mod markdown;
pub mod syntax;
pub mod template;

use std::path::Path;

pub use html::HtmlConverter;
pub use markdown::MarkdownConverter;
pub use syntax::SyntaxHighlighter;
pub use template::{Context, Template, TemplateError};
use thiserror::Error;

/// Converter errors.
#[derive(Debug, Error)]
pub enum ConvertError {
    /// Placeholder substitution failed.
    #[error("template error: {0}")]
    Template(#[from] TemplateError),
}

/// Result type for converter operations.
pub type Result<T> = std::result::Result<T, ConvertError>;

/// Capability to render a body with a context.
pub trait Converter: Send + Sync + std::fmt::Debug {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Whether this converter handles the file at `path`.
    fn supports(&self, path: &Path) -> bool;

    /// Render `content` with `context`.
    fn render(&self, content: &str, context: &Context<'_>) -> Result<String>;
}

/// Fallback converter: placeholder substitution only.
#[derive(Debug, Default, Clone, Copy)]
pub struct PassthroughConverter;

impl Converter for PassthroughConverter {
    fn name(&self) -> &'static str {
        "passthrough"
    }

    fn supports(&self, _path: &Path) -> bool {
        true
    }

    fn render(&self, content: &str, context: &Context<'_>) -> Result<String> {
        Ok(template::render_str(content, context)?)
    }
}

/// Ordered converters with a guaranteed fallback.
#[derive(Debug)]
pub struct ConverterRegistry {
    converters: Vec<Box<dyn Converter>>,
    fallback: PassthroughConverter,
}

impl Default for ConverterRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ConverterRegistry {
    /// Registry with the markdown and HTML converters.
    pub fn new() -> Self {
        Self::with_theme(syntax::DEFAULT_THEME)
    }

    /// Registry whose markdown converter highlights code with `theme`.
    pub fn with_theme(theme: &str) -> Self {
        let mut registry = Self::empty();
        registry.register(MarkdownConverter::with_theme(theme));
        registry.register(HtmlConverter);
        registry
    }

    /// Registry holding only the pass-through fallback.
    pub fn empty() -> Self {
        Self {
            converters: Vec::new(),
            fallback: PassthroughConverter,
        }
    }

    /// Append a converter. Earlier registrations take precedence.
    pub fn register(&mut self, converter: impl Converter + 'static) {
        self.converters.push(Box::new(converter));
    }

    /// The first registered converter that supports `path`, else the fallback.
    pub fn for_path(&self, path: &Path) -> &dyn Converter {
        self.converters
            .iter()
            .find(|c| c.supports(path))
            .map_or(&self.fallback as &dyn Converter, |c| c.as_ref())
    }

    /// Number of registered converters, not counting the fallback.
    pub fn len(&self) -> usize {
        self.converters.len()
    }

    /// True when only the fallback is available.
    pub fn is_empty(&self) -> bool {
        self.converters.is_empty()
    }
}

/// Case-insensitive extension check.
pub(crate) fn has_extension(path: &Path, extensions: &[&str]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| extensions.iter().any(|x| ext.eq_ignore_ascii_case(x)))
}
