//! Markdown converter using pulldown-cmark.

use std::path::Path;

use pulldown_cmark::{CodeBlockKind, CowStr, Event, Options, Parser, Tag, TagEnd, html};
use crate::{
    Converter, Result, has_extension,
    syntax::SyntaxHighlighter,
    template::{self, Context},
};

/// Renders markdown to HTML, highlights fenced code, then substitutes `{{ }}`
/// placeholders in the result.
#[derive(Debug)]
pub struct MarkdownConverter {
    highlighter: SyntaxHighlighter,
    options: Options,
}

impl Default for MarkdownConverter {
    fn default() -> Self {
        Self::new()
    }
}

impl MarkdownConverter {
    /// Create a markdown converter with the default syntax theme.
    pub fn new() -> Self {
        Self::with_highlighter(SyntaxHighlighter::default())
    }

    /// Create a markdown converter with a custom syntax theme.
    pub fn with_theme(theme: &str) -> Self {
        Self::with_highlighter(SyntaxHighlighter::new(theme))
    }

    fn with_highlighter(highlighter: SyntaxHighlighter) -> Self {
        let mut options = Options::empty();
        options.insert(Options::ENABLE_TABLES);
        options.insert(Options::ENABLE_FOOTNOTES);
        options.insert(Options::ENABLE_STRIKETHROUGH);
        options.insert(Options::ENABLE_TASKLISTS);
        options.insert(Options::ENABLE_HEADING_ATTRIBUTES);

        Self {
            highlighter,
            options,
        }
    }

    /// Render markdown to HTML without placeholder substitution.
    pub fn to_html(&self, markdown: &str) -> String {
        let mut events = Vec::new();
        let mut code_block: Option<(Option<String>, String)> = None;

        for event in Parser::new_ext(markdown, self.options) {
            match event {
                Event::Start(Tag::CodeBlock(kind)) => {
                    let lang = match kind {
                        CodeBlockKind::Fenced(info) => fence_language(&info),
                        CodeBlockKind::Indented => None,
                    };
                    code_block = Some((lang, String::new()));
                }
                Event::End(TagEnd::CodeBlock) => {
                    if let Some((lang, code)) = code_block.take() {
                        let highlighted = self.highlighter.highlight(&code, lang.as_deref());
                        events.push(Event::Html(CowStr::from(highlighted)));
                    }
                }
                Event::Text(text) if code_block.is_some() => {
                    if let Some((_, code)) = code_block.as_mut() {
                        code.push_str(&text);
                    }
                }
                other => events.push(other),
            }
        }

        let mut out = String::with_capacity(markdown.len() * 3 / 2);
        html::push_html(&mut out, events.into_iter());
        out
    }
}

impl Converter for MarkdownConverter {
    fn name(&self) -> &'static str {
        "markdown"
    }

    fn supports(&self, path: &Path) -> bool {
        has_extension(path, &["md", "markdown"])
    }

    fn render(&self, content: &str, context: &Context<'_>) -> Result<String> {
        let html = self.to_html(content);
        Ok(template::render_str(&html, context)?)
    }
}

/// The language token of a fence info string such as `rust,ignore` or `python title="x"`.
fn fence_language(info: &str) -> Option<String> {
    info.split(|c: char| c == ',' || c.is_whitespace())
        .next()
        .filter(|lang| !lang.is_empty())
        .map(str::to_string)
}
