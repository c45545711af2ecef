//! Content units: layouts, posts and pages.
//!
//! All three share one shape. A unit parses its front matter once at construction,
//! keeps that snapshot untouched, and works on a separate copy (the template data)
//! that rendering extends with derived fields such as `content`.

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};

use hulk_convert::{Context, ConverterRegistry};
use hulk_core::front_matter::{self, FrontMatter};
use serde_json::Value;
use tracing::debug;

use crate::{
    classify::PostName,
    error::{BuildError, Result},
    url,
};

/// Layouts by name (file stem).
pub type Layouts = HashMap<String, ContentUnit>;

/// Which role a unit plays in the build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitKind {
    Layout,
    Post,
    Page,
}

/// A parsed source document.
#[derive(Debug, Clone)]
pub struct ContentUnit {
    kind: UnitKind,
    source_path: PathBuf,
    relative_path: PathBuf,
    front_matter: FrontMatter,
    template_data: Value,
    body: String,
    rendered: Option<String>,
    url: String,
    layout: Option<String>,
    published: bool,
    post: Option<PostName>,
}

impl ContentUnit {
    /// Parse a layout.
    pub fn layout(source_path: PathBuf, relative: &Path, raw: &str) -> Result<Self> {
        let (front_matter, body) = parse(&source_path, raw)?;
        let default_url = url::url_from_relative(relative);
        let kind = UnitKind::Layout;
        Self::build(kind, source_path, relative, front_matter, body, default_url, None)
    }

    /// Parse a page. Its URL is the relative path unless front matter sets `url`.
    pub fn page(source_path: PathBuf, relative: &Path, raw: &str) -> Result<Self> {
        let (front_matter, body) = parse(&source_path, raw)?;
        let default_url = url::url_from_relative(relative);
        let kind = UnitKind::Page;
        Self::build(kind, source_path, relative, front_matter, body, default_url, None)
    }

    /// Parse a post. Its URL is the expanded permalink unless front matter sets `url`.
    pub fn post(
        source_path: PathBuf,
        relative: &Path,
        raw: &str,
        name: PostName,
        permalink: &str,
    ) -> Result<Self> {
        let (front_matter, body) = parse(&source_path, raw)?;
        let default_url = url::expand_permalink(permalink, &name).map_err(|e| {
            BuildError::parse(&source_path, format!("cannot expand permalink `{permalink}`: {e}"))
        })?;

        let mut unit = Self::build(
            UnitKind::Post,
            source_path,
            relative,
            front_matter,
            body,
            default_url,
            Some(name.clone()),
        )?;

        unit.set_data("slug", Value::String(name.slug));
        if !unit.front_matter.contains_key("date") {
            unit.set_data("date", Value::String(name.date.format("%Y-%m-%d").to_string()));
        }
        Ok(unit)
    }

    fn build(
        kind: UnitKind,
        source_path: PathBuf,
        relative: &Path,
        front_matter: FrontMatter,
        body: String,
        default_url: String,
        post: Option<PostName>,
    ) -> Result<Self> {
        let raw_url =
            front_matter::str_field(&front_matter, "url").map_or(default_url, str::to_string);
        let url = url::normalize_url(&raw_url).ok_or_else(|| {
            BuildError::parse(&source_path, format!("url `{raw_url}` escapes the output root"))
        })?;

        let layout = front_matter::str_field(&front_matter, "layout")
            .filter(|name| !name.is_empty())
            .map(str::to_string);
        let published = front_matter::is_published(&front_matter);

        let mut unit = Self {
            kind,
            source_path,
            relative_path: relative.to_path_buf(),
            template_data: Value::Object(front_matter.clone()),
            front_matter,
            body,
            rendered: None,
            url,
            layout,
            published,
            post,
        };
        unit.set_data("url", Value::String(unit.url.clone()));
        Ok(unit)
    }

    pub fn kind(&self) -> UnitKind {
        self.kind
    }

    pub fn source_path(&self) -> &Path {
        &self.source_path
    }

    pub fn relative_path(&self) -> &Path {
        &self.relative_path
    }

    /// Front matter exactly as parsed.
    pub fn front_matter(&self) -> &FrontMatter {
        &self.front_matter
    }

    /// Front matter plus derived fields; always a JSON object.
    pub fn template_data(&self) -> &Value {
        &self.template_data
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    /// Final output, available after [`render`](Self::render).
    pub fn rendered(&self) -> Option<&str> {
        self.rendered.as_deref()
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Name of the layout this unit asks to be wrapped in.
    pub fn layout_name(&self) -> Option<&str> {
        self.layout.as_deref()
    }

    pub fn is_published(&self) -> bool {
        self.published
    }

    /// Date and slug, for posts.
    pub fn post_name(&self) -> Option<&PostName> {
        self.post.as_ref()
    }

    /// Key under which a layout is registered: its file stem.
    pub fn layout_key(&self) -> String {
        self.relative_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    fn set_data(&mut self, key: &str, value: Value) {
        if let Value::Object(map) = &mut self.template_data {
            map.insert(key.to_string(), value);
        }
    }

    /// Render the body with `{ site, page }`, record the result as `page.content`,
    /// then wrap it in the layout chain. A layout name that resolves to nothing leaves
    /// the content unwrapped.
    pub fn render(
        &mut self,
        layouts: &Layouts,
        site: &Value,
        converters: &ConverterRegistry,
    ) -> Result<()> {
        let converter = converters.for_path(&self.source_path);
        let context = Context::new()
            .with("site", site)
            .with("page", &self.template_data);
        let html = converter
            .render(&self.body, &context)
            .map_err(|source| BuildError::Render {
                path: self.source_path.clone(),
                source,
            })?;

        self.set_data("content", Value::String(html.clone()));
        let rendered = self.apply_layouts(html, layouts, site, converters)?;

        debug!(
            path = %self.relative_path.display(),
            converter = converter.name(),
            layout = self.layout.as_deref().unwrap_or("-"),
            "rendered"
        );
        self.rendered = Some(rendered);
        Ok(())
    }

    fn apply_layouts(
        &self,
        html: String,
        layouts: &Layouts,
        site: &Value,
        converters: &ConverterRegistry,
    ) -> Result<String> {
        let mut content = html;
        let mut applied: Vec<&str> = Vec::new();
        let mut next = self.layout.as_deref();

        while let Some(name) = next {
            let Some(layout) = layouts.get(name) else {
                debug!(path = %self.relative_path.display(), layout = name, "layout not found");
                break;
            };
            if applied.contains(&name) {
                return Err(BuildError::LayoutCycle {
                    path: self.source_path.clone(),
                    layout: name.to_string(),
                });
            }
            applied.push(name);

            let inner = Value::String(content);
            let context = Context::new()
                .with("site", site)
                .with("page", &self.template_data)
                .with("content", &inner);
            content = layout.render_as_layout(&context, converters)?;
            next = layout.layout_name();
        }

        Ok(content)
    }

    fn render_as_layout(
        &self,
        context: &Context<'_>,
        converters: &ConverterRegistry,
    ) -> Result<String> {
        converters
            .for_path(&self.source_path)
            .render(&self.body, context)
            .map_err(|source| BuildError::Render {
                path: self.source_path.clone(),
                source,
            })
    }

    /// Output path under `root`.
    pub fn destination_path(&self, root: &Path) -> PathBuf {
        url::destination_for(root, &self.url)
    }

    /// Write the rendered output, creating parent directories first.
    pub async fn write(&self, root: &Path) -> Result<PathBuf> {
        let rendered = self
            .rendered
            .as_deref()
            .ok_or_else(|| BuildError::NotRendered(self.source_path.clone()))?;

        let dest = self.destination_path(root);
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| BuildError::io(parent, e))?;
        }
        tokio::fs::write(&dest, rendered)
            .await
            .map_err(|e| BuildError::io(&dest, e))?;

        debug!(path = %dest.display(), "wrote unit");
        Ok(dest)
    }
}

/// Decode file bytes as UTF-8 text.
pub fn decode(path: &Path, bytes: Vec<u8>) -> Result<String> {
    String::from_utf8(bytes).map_err(|_| BuildError::parse(path, "content is not valid UTF-8"))
}

fn parse(path: &Path, raw: &str) -> Result<(FrontMatter, String)> {
    front_matter::parse_front_matter(raw, path).map_err(|e| BuildError::parse(path, e.to_string()))
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use serde_json::json;

    use super::*;

    const PERMALINK: &str = "/{{year}}/{{month}}/{{day}}/{{slug}}.html";

    fn page(relative: &str, raw: &str) -> ContentUnit {
        ContentUnit::page(Path::new("/src").join(relative), Path::new(relative), raw).expect("page")
    }

    fn layout(relative: &str, raw: &str) -> ContentUnit {
        ContentUnit::layout(Path::new("/src").join(relative), Path::new(relative), raw)
            .expect("layout")
    }

    fn hello_post(raw: &str) -> ContentUnit {
        let relative = "_posts/2020-01-01-hello.md";
        let name = PostName::parse("2020-01-01-hello.md").expect("name");
        let source = Path::new("/src").join(relative);
        ContentUnit::post(source, Path::new(relative), raw, name, PERMALINK)
            .expect("post")
    }

    fn layouts(units: Vec<ContentUnit>) -> Layouts {
        units.into_iter().map(|u| (u.layout_key(), u)).collect()
    }

    #[test]
    fn test_page_construction() {
        let unit = page("docs/intro.md", "---\nlayout: doc\ntitle: Intro\n---\n# Intro\n");

        assert_eq!(unit.kind(), UnitKind::Page);
        assert_eq!(unit.url(), "/docs/intro.md");
        assert_eq!(unit.layout_name(), Some("doc"));
        assert_eq!(unit.body(), "# Intro\n");
        assert!(unit.is_published());
        assert!(unit.rendered().is_none());
        assert_eq!(unit.template_data()["title"], "Intro");
        assert_eq!(unit.template_data()["url"], "/docs/intro.md");
    }

    #[test]
    fn test_front_matter_url_wins() {
        let unit = page("about.md", "---\nurl: /about/\n---\n");
        assert_eq!(unit.url(), "/about");
        assert_eq!(unit.front_matter()["url"], "/about/");
        assert_eq!(unit.template_data()["url"], "/about");
    }

    #[test]
    fn test_escaping_url_is_rejected() {
        let err = ContentUnit::page(
            PathBuf::from("/src/evil.md"),
            Path::new("evil.md"),
            "---\nurl: /../../etc/passwd\n---\n",
        )
        .unwrap_err();
        assert!(err.is_parse());
    }

    #[test]
    fn test_malformed_front_matter_is_parse_error() {
        let err = ContentUnit::page(
            PathBuf::from("/src/bad.md"),
            Path::new("bad.md"),
            "---\ntitle: [oops\n---\n",
        )
        .unwrap_err();
        assert!(err.is_parse());
        assert!(err.to_string().contains("bad.md"));
    }

    #[test]
    fn test_unpublished() {
        let unit = page("draft.md", "---\npublished: false\n---\n");
        assert!(!unit.is_published());
    }

    #[test]
    fn test_post_fields() {
        let unit = hello_post("---\nlayout: post\ntitle: Hello\n---\n# Hi\n");

        assert_eq!(unit.kind(), UnitKind::Post);
        assert_eq!(unit.url(), "/2020/01/01/hello.html");
        assert_eq!(unit.template_data()["slug"], "hello");
        assert_eq!(unit.template_data()["date"], "2020-01-01");
        let name = unit.post_name().expect("post name");
        assert_eq!(name.date, NaiveDate::from_ymd_opt(2020, 1, 1).expect("date"));
    }

    #[test]
    fn test_post_front_matter_date_kept() {
        let unit = hello_post("---\ndate: 2020-01-01 10:30\n---\n");
        assert_eq!(unit.template_data()["date"], "2020-01-01 10:30");
    }

    #[test]
    fn test_post_bad_permalink() {
        let name = PostName::parse("2020-01-01-hello.md").expect("name");
        let err = ContentUnit::post(
            PathBuf::from("/src/_posts/2020-01-01-hello.md"),
            Path::new("_posts/2020-01-01-hello.md"),
            "---\n---\n",
            name,
            "/{{ category }}/{{ slug }}",
        )
        .unwrap_err();
        assert!(err.is_parse());
    }

    #[test]
    fn test_render_with_layout() {
        let mut unit = hello_post("---\nlayout: post\ntitle: Hello\n---\n# Hi\n");
        let layouts = layouts(vec![layout("_layouts/post.html", "<html>{{content}}</html>")]);

        unit.render(&layouts, &json!({}), &ConverterRegistry::new()).expect("render");

        let out = unit.rendered().expect("rendered");
        assert!(out.starts_with("<html>"));
        assert!(out.contains("<h1>Hi</h1>"));
        assert!(out.ends_with("</html>"));
    }

    #[test]
    fn test_render_missing_layout_is_unwrapped() {
        let mut unit = hello_post("---\nlayout: nope\n---\n# Hi\n");
        unit.render(&Layouts::new(), &json!({}), &ConverterRegistry::new()).expect("render");
        assert_eq!(unit.rendered().map(str::trim), Some("<h1>Hi</h1>"));
    }

    #[test]
    fn test_render_sets_content_without_touching_front_matter() {
        let mut unit = page("index.html", "---\ntitle: Home\n---\n<p>{{ page.title }}</p>");
        unit.render(&Layouts::new(), &json!({}), &ConverterRegistry::new()).expect("render");

        assert_eq!(unit.template_data()["content"], "<p>Home</p>");
        assert!(!unit.front_matter().contains_key("content"));
    }

    #[test]
    fn test_render_sees_site_data() {
        let mut unit = page("index.html", "---\n---\n{{ site.title }} at {{ site.url }}");
        let site = json!({ "title": "Blog", "url": "https://example.com" });
        unit.render(&Layouts::new(), &site, &ConverterRegistry::new()).expect("render");
        assert_eq!(unit.rendered(), Some("Blog at https://example.com"));
    }

    #[test]
    fn test_layout_sees_page_data() {
        let mut unit = page("about.md", "---\nlayout: base\ntitle: About\n---\nbody");
        let layouts = layouts(vec![layout(
            "_layouts/base.html",
            "<title>{{ page.title }}</title>{{ content }}",
        )]);
        unit.render(&layouts, &json!({}), &ConverterRegistry::new()).expect("render");
        assert_eq!(unit.rendered(), Some("<title>About</title><p>body</p>\n"));
    }

    #[test]
    fn test_nested_layouts() {
        let mut unit = page("a.html", "---\nlayout: post\n---\nA");
        let layouts = layouts(vec![
            layout(
                "_layouts/post.html",
                "---\nlayout: base\n---\n<article>{{ content }}</article>",
            ),
            layout("_layouts/base.html", "<body>{{ content }}</body>"),
        ]);
        unit.render(&layouts, &json!({}), &ConverterRegistry::new()).expect("render");
        assert_eq!(unit.rendered(), Some("<body><article>A</article></body>"));
    }

    #[test]
    fn test_layout_cycle() {
        let mut unit = page("a.html", "---\nlayout: one\n---\nA");
        let layouts = layouts(vec![
            layout("_layouts/one.html", "---\nlayout: two\n---\n{{ content }}"),
            layout("_layouts/two.html", "---\nlayout: one\n---\n{{ content }}"),
        ]);
        let err = unit
            .render(&layouts, &json!({}), &ConverterRegistry::new())
            .unwrap_err();
        assert!(matches!(err, BuildError::LayoutCycle { ref layout, .. } if layout == "one"));
    }

    #[test]
    fn test_render_error_names_file() {
        let mut unit = page("broken.html", "---\n---\n{{ page.missing }}");
        let err = unit
            .render(&Layouts::new(), &json!({}), &ConverterRegistry::new())
            .unwrap_err();
        assert!(matches!(err, BuildError::Render { .. }));
        assert!(err.to_string().contains("broken.html"));
    }

    #[test]
    fn test_destination_path() {
        let root = Path::new("/out");
        assert_eq!(
            hello_post("---\n---\n").destination_path(root),
            PathBuf::from("/out/2020/01/01/hello.html")
        );
        assert_eq!(
            page("about.md", "---\nurl: /about\n---\n").destination_path(root),
            PathBuf::from("/out/about/index.html")
        );
        assert_eq!(
            page("index.html", "---\n---\n").destination_path(root),
            PathBuf::from("/out/index.html")
        );
    }

    #[test]
    fn test_layout_key() {
        assert_eq!(layout("_layouts/post.html", "").layout_key(), "post");
    }

    #[test]
    fn test_decode_rejects_binary() {
        assert!(decode(Path::new("x.md"), vec![0xff, 0xfe]).unwrap_err().is_parse());
        assert_eq!(decode(Path::new("x.md"), b"ok".to_vec()).expect("utf8"), "ok");
    }

    #[tokio::test]
    async fn test_write_creates_parents() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let mut unit = hello_post("---\n---\nHi");
        unit.render(&Layouts::new(), &json!({}), &ConverterRegistry::new()).expect("render");

        let dest = unit.write(dir.path()).await.expect("write");

        assert_eq!(dest, dir.path().join("2020/01/01/hello.html"));
        let written = std::fs::read_to_string(dest).expect("read");
        assert_eq!(written.trim(), "<p>Hi</p>");
    }

    #[tokio::test]
    async fn test_write_before_render() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let unit = page("index.html", "---\n---\n");
        let err = unit.write(dir.path()).await.unwrap_err();
        assert!(matches!(err, BuildError::NotRendered(_)));
    }
}
