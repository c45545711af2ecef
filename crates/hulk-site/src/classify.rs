//! File classification.
//!
//! Every file found under the source root is assigned exactly one role. The rules
//! are applied in a fixed order:
//!
//! 1. a match against any ignore pattern makes the file ignored;
//! 2. a file under the layouts directory is a layout;
//! 3. a file under the posts directory is a post when its name is `YYYY-MM-DD-slug.ext`
//!    and is ignored otherwise;
//! 4. any other file is a page when its first bytes are the front matter fence and a
//!    static asset when they are not.
//!
//! The first three rules look at the path only. The last one peeks at the content.

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use glob::{MatchOptions, Pattern};
use hulk_core::{Config, config::to_slash, front_matter::starts_with_fence};
use tokio::{fs::File, io::AsyncReadExt};

use crate::error::{BuildError, Result};

/// Size of the single chunk read to tell pages from static assets.
pub const SNIFF_CHUNK: usize = 8 * 1024;

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

/// Date and slug encoded in a post file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostName {
    pub date: NaiveDate,
    pub slug: String,
}

impl PostName {
    /// Parse `YYYY-MM-DD-slug[.ext]`. Returns `None` for anything else, including
    /// dates that do not exist on the calendar.
    pub fn parse(file_name: &str) -> Option<Self> {
        let stem = Path::new(file_name).file_stem()?.to_str()?;
        let bytes = stem.as_bytes();
        if bytes.len() < 12 || bytes[4] != b'-' || bytes[7] != b'-' || bytes[10] != b'-' {
            return None;
        }
        let digits = [0..4, 5..7, 8..10];
        if !digits
            .into_iter()
            .all(|range| bytes[range].iter().all(u8::is_ascii_digit))
        {
            return None;
        }

        let date = NaiveDate::parse_from_str(&stem[..10], "%Y-%m-%d").ok()?;
        let slug = &stem[11..];
        if slug.is_empty() {
            return None;
        }

        Some(Self {
            date,
            slug: slug.to_string(),
        })
    }
}

/// Classification from the path alone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathClass {
    Ignored,
    Layout,
    Post(PostName),
    /// Page or static asset; decided by the file content.
    Content,
}

/// Final classification of a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classified {
    Ignored,
    Layout,
    Post(PostName),
    /// A page, with the file's full content already read.
    Page(Vec<u8>),
    Static,
}

impl Classified {
    /// Role name for logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ignored => "ignored",
            Self::Layout => "layout",
            Self::Post(_) => "post",
            Self::Page(_) => "page",
            Self::Static => "static",
        }
    }
}

/// Applies the classification rules for one configuration.
#[derive(Debug, Clone)]
pub struct Classifier {
    source: PathBuf,
    layouts: PathBuf,
    posts: PathBuf,
    ignore: Vec<Pattern>,
}

impl Classifier {
    /// Compile the ignore patterns of `config`.
    pub fn new(config: &Config) -> Result<Self> {
        Ok(Self {
            source: config.source.clone(),
            layouts: config.layouts.clone(),
            posts: config.posts.clone(),
            ignore: config.ignore_patterns()?,
        })
    }

    /// Source root all paths are relative to.
    pub fn source(&self) -> &Path {
        &self.source
    }

    /// `path` relative to the source root, if it is inside it.
    pub fn relative<'a>(&self, path: &'a Path) -> Option<&'a Path> {
        path.strip_prefix(&self.source).ok()
    }

    /// Whether the relative path matches an ignore pattern.
    pub fn is_ignored(&self, relative: &Path) -> bool {
        let candidate = to_slash(relative);
        self.ignore
            .iter()
            .any(|pattern| pattern.matches_with(&candidate, MATCH_OPTIONS))
    }

    /// Apply the path-only rules to a path relative to the source root.
    pub fn classify_path(&self, relative: &Path) -> PathClass {
        if relative.as_os_str().is_empty() || self.is_ignored(relative) {
            return PathClass::Ignored;
        }

        if relative.starts_with(&self.layouts) {
            return PathClass::Layout;
        }

        if relative.starts_with(&self.posts) {
            return relative
                .file_name()
                .and_then(|name| name.to_str())
                .and_then(PostName::parse)
                .map_or(PathClass::Ignored, PathClass::Post);
        }

        PathClass::Content
    }

    /// Classify an absolute path, reading the file when the path alone is not enough.
    pub async fn classify(&self, path: &Path) -> Result<Classified> {
        let Some(relative) = self.relative(path) else {
            return Ok(Classified::Ignored);
        };

        Ok(match self.classify_path(relative) {
            PathClass::Ignored => Classified::Ignored,
            PathClass::Layout => Classified::Layout,
            PathClass::Post(name) => Classified::Post(name),
            PathClass::Content => match sniff(path).await? {
                Some(content) => Classified::Page(content),
                None => Classified::Static,
            },
        })
    }
}

/// Read one chunk of `path`. When it starts with the front matter fence the rest of
/// the file is read into the same buffer and returned; otherwise the file is closed
/// and `None` is returned.
pub async fn sniff(path: &Path) -> Result<Option<Vec<u8>>> {
    let mut file = File::open(path).await.map_err(|e| BuildError::io(path, e))?;

    let mut buf = vec![0u8; SNIFF_CHUNK];
    let mut filled = 0;
    // A short read is legal, so keep going until the fence can be compared.
    while filled < hulk_core::front_matter::FENCE.len() {
        let n = file
            .read(&mut buf[filled..])
            .await
            .map_err(|e| BuildError::io(path, e))?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    buf.truncate(filled);

    if !starts_with_fence(&buf) {
        return Ok(None);
    }

    file.read_to_end(&mut buf)
        .await
        .map_err(|e| BuildError::io(path, e))?;
    Ok(Some(buf))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classifier() -> Classifier {
        let config = Config::new("/srv/site", "/srv/site/_site").expect("config");
        Classifier::new(&config).expect("classifier")
    }

    #[test]
    fn test_post_name() {
        let name = PostName::parse("2020-01-01-hello.md").expect("valid");
        assert_eq!(name.date, NaiveDate::from_ymd_opt(2020, 1, 1).expect("date"));
        assert_eq!(name.slug, "hello");

        let name = PostName::parse("2021-12-31-multi-part-slug").expect("valid");
        assert_eq!(name.slug, "multi-part-slug");
    }

    #[test]
    fn test_invalid_post_names() {
        for name in [
            "hello.md",
            "2020-01-01.md",
            "2020-01-01-.md",
            "2020-1-01-hello.md",
            "2020-02-30-hello.md",
            "20200101-hello.md",
            "draft-2020-01-01-hello.md",
        ] {
            assert_eq!(PostName::parse(name), None, "{name}");
        }
    }

    #[test]
    fn test_default_ignores() {
        let c = classifier();
        for path in [
            "_config.yml",
            "package.json",
            "node_modules/lib/index.js",
            ".gitignore",
            ".git/HEAD",
            "assets/.DS_Store",
            "_site/index.html",
        ] {
            assert_eq!(c.classify_path(Path::new(path)), PathClass::Ignored, "{path}");
        }
    }

    #[test]
    fn test_ignore_is_case_sensitive() {
        let c = classifier();
        assert_eq!(c.classify_path(Path::new("Package.json")), PathClass::Content);
    }

    #[test]
    fn test_wildcard_matches_leading_dot() {
        let mut config = Config::default();
        config.ignore.push("drafts/*".to_string());
        let config = config.resolve(Path::new("/srv/site")).expect("config");
        let c = Classifier::new(&config).expect("classifier");

        assert!(c.is_ignored(Path::new("drafts/.secret")));
        assert!(c.is_ignored(Path::new("drafts/todo.md")));
        assert!(!c.is_ignored(Path::new("drafts/nested/todo.md")));
    }

    #[test]
    fn test_hash_is_literal() {
        let mut config = Config::default();
        config.ignore.push("#notes.md".to_string());
        let config = config.resolve(Path::new("/srv/site")).expect("config");
        let c = Classifier::new(&config).expect("classifier");

        assert!(c.is_ignored(Path::new("#notes.md")));
        assert!(!c.is_ignored(Path::new("notes.md")));
    }

    #[test]
    fn test_layouts_before_posts() {
        let mut config = Config::default();
        config.posts = PathBuf::from("_layouts/posts");
        let config = config.resolve(Path::new("/srv/site")).expect("config");
        let c = Classifier::new(&config).expect("classifier");

        assert_eq!(
            c.classify_path(Path::new("_layouts/posts/2020-01-01-a.md")),
            PathClass::Layout
        );
    }

    #[test]
    fn test_directory_membership_is_component_wise() {
        let c = classifier();
        assert_eq!(c.classify_path(Path::new("_layouts/post.html")), PathClass::Layout);
        assert_eq!(
            c.classify_path(Path::new("_layouts_old/post.html")),
            PathClass::Content
        );
        assert_eq!(
            c.classify_path(Path::new("_posts_archive/2020-01-01-a.md")),
            PathClass::Content
        );
    }

    #[test]
    fn test_posts_require_date_prefix() {
        let c = classifier();
        assert!(matches!(
            c.classify_path(Path::new("_posts/2020-01-01-hello.md")),
            PathClass::Post(_)
        ));
        assert_eq!(c.classify_path(Path::new("_posts/notes.md")), PathClass::Ignored);
    }

    #[tokio::test]
    async fn test_sniff_page_and_static() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let page = dir.path().join("about.md");
        let asset = dir.path().join("logo.png");
        let tiny = dir.path().join("tiny.txt");
        std::fs::write(&page, "---\ntitle: About\n---\nHello").expect("write");
        std::fs::write(&asset, [0x89, b'P', b'N', b'G', 0, 1, 2]).expect("write");
        std::fs::write(&tiny, "--").expect("write");

        let content = sniff(&page).await.expect("sniff").expect("page");
        assert_eq!(content, b"---\ntitle: About\n---\nHello");
        assert_eq!(sniff(&asset).await.expect("sniff"), None);
        assert_eq!(sniff(&tiny).await.expect("sniff"), None);
    }

    #[tokio::test]
    async fn test_sniff_reads_past_first_chunk() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let page = dir.path().join("long.html");
        let body = "x".repeat(SNIFF_CHUNK * 3);
        std::fs::write(&page, format!("---\n---\n{body}")).expect("write");

        let content = sniff(&page).await.expect("sniff").expect("page");
        assert_eq!(content.len(), SNIFF_CHUNK * 3 + 8);
    }

    #[tokio::test]
    async fn test_classify_absolute_paths() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let config = Config::new(dir.path(), dir.path().join("_site")).expect("config");
        let c = Classifier::new(&config).expect("classifier");

        let page = config.source.join("index.html");
        std::fs::write(&page, "---\n---\n<h1>Home</h1>").expect("write");
        let css = config.source.join("style.css");
        std::fs::write(&css, "body {}").expect("write");

        assert!(matches!(c.classify(&page).await.expect("page"), Classified::Page(_)));
        assert_eq!(c.classify(&css).await.expect("css"), Classified::Static);
        assert_eq!(
            c.classify(Path::new("/elsewhere/x.md")).await.expect("outside"),
            Classified::Ignored
        );
    }
}
