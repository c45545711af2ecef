//! HTML converter.

use std::path::Path;

use crate::{
    Converter, Result, has_extension,
    template::{self, Context},
};

/// HTML needs no markup transformation; only placeholders are substituted.
#[derive(Debug, Default, Clone, Copy)]
pub struct HtmlConverter;

impl Converter for HtmlConverter {
    fn name(&self) -> &'static str {
        "html"
    }

    fn supports(&self, path: &Path) -> bool {
        has_extension(path, &["html", "htm"])
    }

    fn render(&self, content: &str, context: &Context<'_>) -> Result<String> {
        Ok(template::render_str(content, context)?)
    }
}
