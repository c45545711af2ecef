//! Syntax highlighting for fenced code blocks.

use syntect::{
    highlighting::{Theme, ThemeSet},
    html::highlighted_html_for_string,
    parsing::SyntaxSet,
};
use tracing::warn;

/// Theme used when none is configured or the configured one is unknown.
pub const DEFAULT_THEME: &str = "base16-ocean.dark";

/// Syntax highlighter backed by syntect's bundled syntaxes and themes.
#[derive(Debug)]
pub struct SyntaxHighlighter {
    syntax_set: SyntaxSet,
    theme: Theme,
    theme_name: String,
}

impl Default for SyntaxHighlighter {
    fn default() -> Self {
        Self::new(DEFAULT_THEME)
    }
}

impl SyntaxHighlighter {
    /// Create a highlighter for `theme`, falling back to [`DEFAULT_THEME`] with a
    /// warning when syntect does not bundle it.
    pub fn new(theme: &str) -> Self {
        let mut themes = ThemeSet::load_defaults().themes;

        let (theme_name, theme) = match themes.remove(theme) {
            Some(found) => (theme.to_string(), found),
            None => {
                warn!(theme, fallback = DEFAULT_THEME, "unknown syntax theme");
                let fallback = themes.remove(DEFAULT_THEME).unwrap_or_default();
                (DEFAULT_THEME.to_string(), fallback)
            }
        };

        Self {
            syntax_set: SyntaxSet::load_defaults_newlines(),
            theme,
            theme_name,
        }
    }

    /// Name of the theme in use.
    pub fn theme_name(&self) -> &str {
        &self.theme_name
    }

    /// Highlight `code` written in `lang`.
    ///
    /// Unknown languages are highlighted as plain text; if syntect fails the code is
    /// emitted escaped inside `<pre><code>`.
    pub fn highlight(&self, code: &str, lang: Option<&str>) -> String {
        let syntax = lang
            .and_then(|l| self.syntax_set.find_syntax_by_token(l))
            .unwrap_or_else(|| self.syntax_set.find_syntax_plain_text());

        match highlighted_html_for_string(code, &self.syntax_set, syntax, &self.theme) {
            Ok(html) => html,
            Err(err) => {
                warn!(error = %err, lang = lang.unwrap_or("text"), "syntax highlighting failed");
                plain_code_block(code, lang)
            }
        }
    }
}

/// An escaped, unhighlighted code block.
fn plain_code_block(code: &str, lang: Option<&str>) -> String {
    let lang_class = lang
        .map(|l| format!(" class=\"language-{}\"", html_escape(l)))
        .unwrap_or_default();
    format!("<pre><code{lang_class}>{}</code></pre>", html_escape(code))
}

/// Escape HTML special characters.
pub(crate) fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#x27;")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_highlight_rust() {
        let highlighter = SyntaxHighlighter::default();
        let html = highlighter.highlight("fn main() {}\n", Some("rust"));

        assert!(html.contains("<pre"));
        assert!(html.contains("fn"));
    }

    #[test]
    fn test_highlight_unknown_language() {
        let highlighter = SyntaxHighlighter::default();
        let html = highlighter.highlight("some code\n", Some("unknown_lang_xyz"));
        assert!(html.contains("some code"));
    }

    #[test]
    fn test_highlight_escapes_markup() {
        let highlighter = SyntaxHighlighter::default();
        let html = highlighter.highlight("<b>bold</b>\n", None);
        assert!(html.contains("&lt;b&gt;"));
    }

    #[test]
    fn test_unknown_theme_falls_back() {
        let highlighter = SyntaxHighlighter::new("no-such-theme");
        assert_eq!(highlighter.theme_name(), DEFAULT_THEME);
    }

    #[test]
    fn test_known_theme_kept() {
        let highlighter = SyntaxHighlighter::new("InspiredGitHub");
        assert_eq!(highlighter.theme_name(), "InspiredGitHub");
    }

    #[test]
    fn test_plain_code_block() {
        let html = plain_code_block("a < b", Some("rust"));
        assert_eq!(html, "<pre><code class=\"language-rust\">a &lt; b</code></pre>");
    }

    #[test]
    fn test_html_escape() {
        assert_eq!(html_escape("<script>"), "&lt;script&gt;");
        assert_eq!(html_escape("a & b"), "a &amp; b");
    }
}
