//! Template variable substitution.
//!
//! A lightweight interpolation pass rather than a full template engine. Placeholders
//! are written `{{ path }}` where `path` is a dotted lookup into a JSON context, for
//! example `{{ page.title }}` or `{{ site.posts.0.url }}`. A trailing `?` marks the
//! variable optional: `{{ page.subtitle? }}` renders nothing when the value is missing.
//!
//! Values come from a [`Context`], a set of borrowed named scopes layered over an
//! optional root object, so a build can share one site-wide value between every unit
//! without copying it.

use serde_json::Value;
use thiserror::Error;

/// Template rendering errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TemplateError {
    /// Missing required variable.
    #[error("missing required variable: {0}")]
    MissingVariable(String),

    /// Invalid template syntax.
    #[error("invalid template syntax: {0}")]
    InvalidSyntax(String),
}

/// Result type for template operations.
pub type Result<T> = std::result::Result<T, TemplateError>;

/// Borrowed lookup scopes for a render.
///
/// The first segment of a placeholder path selects a scope by name; scopes added later
/// shadow earlier ones. Paths whose first segment names no scope are resolved against
/// the root value, if any.
#[derive(Debug, Clone, Default)]
pub struct Context<'a> {
    root: Option<&'a Value>,
    scopes: Vec<(&'a str, &'a Value)>,
}

impl<'a> Context<'a> {
    /// An empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a named scope.
    #[must_use]
    pub fn with(mut self, name: &'a str, value: &'a Value) -> Self {
        self.scopes.push((name, value));
        self
    }

    /// Resolve a dotted path.
    pub fn get(&self, path: &str) -> Option<&'a Value> {
        let (head, tail) = match path.split_once('.') {
            Some((head, tail)) => (head, Some(tail)),
            None => (path, None),
        };

        if let Some((_, value)) = self.scopes.iter().rev().find(|(name, _)| *name == head) {
            return match tail {
                Some(tail) => lookup(*value, tail),
                None => (!value.is_null()).then_some(*value),
            };
        }

        self.root.and_then(|root| lookup(root, path))
    }
}

impl<'a> From<&'a Value> for Context<'a> {
    fn from(root: &'a Value) -> Self {
        Self {
            root: Some(root),
            scopes: Vec::new(),
        }
    }
}

/// A template that supports variable interpolation.
#[derive(Debug, Clone, Copy)]
pub struct Template<'a> {
    content: &'a str,
}

impl<'a> Template<'a> {
    /// Wrap template text.
    #[must_use]
    pub fn new(content: &'a str) -> Self {
        Self { content }
    }

    /// Render the template with the given context.
    ///
    /// Replacement values are never re-scanned, so a value containing `{{` is emitted
    /// literally.
    pub fn render(&self, context: &Context<'_>) -> Result<String> {
        let mut out = String::with_capacity(self.content.len());
        let mut rest = self.content;

        while let Some(start) = rest.find("{{") {
            out.push_str(&rest[..start]);
            let after_open = &rest[start + 2..];
            let end = after_open
                .find("}}")
                .ok_or_else(|| TemplateError::InvalidSyntax("unclosed {{ delimiter".to_string()))?;

            let expr = after_open[..end].trim();
            let (path, optional) = match expr.strip_suffix('?') {
                Some(stripped) => (stripped.trim_end(), true),
                None => (expr, false),
            };
            if path.is_empty() {
                return Err(TemplateError::InvalidSyntax("empty {{ }} placeholder".to_string()));
            }

            match context.get(path) {
                Some(value) => push_value(&mut out, value),
                None if optional => {}
                None => return Err(TemplateError::MissingVariable(path.to_string())),
            }

            rest = &after_open[end + 2..];
        }

        out.push_str(rest);
        Ok(out)
    }
}

/// Render `content` against `context` in one call.
pub fn render_str(content: &str, context: &Context<'_>) -> Result<String> {
    Template::new(content).render(context)
}

/// Resolve a dotted path. Numeric segments index into arrays.
///
/// A `null` value counts as missing so optional placeholders skip it and required
/// ones report it.
pub fn lookup<'v>(context: &'v Value, path: &str) -> Option<&'v Value> {
    let mut current = context;
    for segment in path.split('.') {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    (!current.is_null()).then_some(current)
}

fn push_value(out: &mut String, value: &Value) {
    match value {
        Value::Null => {}
        Value::String(s) => out.push_str(s),
        Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::Number(n) => out.push_str(&n.to_string()),
        Value::Array(_) | Value::Object(_) => out.push_str(&value.to_string()),
    }
}
