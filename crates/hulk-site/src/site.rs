//! Build orchestration.
//!
//! [`Site`] owns every unit discovered in the source tree and runs the build in
//! strictly sequential phases:
//!
//! ```text
//! reset -> read -> render -> write -> cleanup
//! ```
//!
//! Within a phase the per-file work fans out and is joined before the next phase may
//! start. Calling a phase out of order is an error, and a failed phase leaves the site
//! idle until the next [`Site::reset`].

use std::{
    collections::{HashMap, HashSet, hash_map::Entry},
    fmt, mem,
    path::{Path, PathBuf},
    sync::Arc,
    time::Instant,
};

use chrono::Utc;
use futures::{FutureExt, StreamExt, TryStreamExt, stream};
use hulk_convert::ConverterRegistry;
use hulk_core::{Config, front_matter::starts_with_fence};
use rayon::prelude::*;
use serde_json::{Map, Value};
use tracing::{Instrument, Span, debug, error, info, info_span, warn};
use walkdir::WalkDir;

use crate::{
    classify::{Classified, Classifier},
    error::{BuildError, Result},
    static_file::StaticFile,
    unit::{ContentUnit, Layouts, decode},
};

/// Upper bound on files open at once during a phase.
const IO_CONCURRENCY: usize = 64;

/// Progress of the current build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildState {
    /// Nothing in progress; `reset` is required before reading.
    Idle,
    /// Collections are empty and the global data is fresh.
    Ready,
    Read,
    Rendered,
    Written,
}

impl fmt::Display for BuildState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Ready => "ready",
            Self::Read => "read",
            Self::Rendered => "rendered",
            Self::Written => "written",
        };
        f.write_str(name)
    }
}

/// A file left out of the build: it could not be parsed, or its output path was
/// already claimed by an earlier file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedFile {
    pub path: PathBuf,
    pub reason: String,
}

/// An orphaned output file that could not be removed.
#[derive(Debug)]
pub struct CleanupFailure {
    pub path: PathBuf,
    pub error: std::io::Error,
}

/// Outcome of reconciling the output tree.
#[derive(Debug, Default)]
pub struct CleanupReport {
    /// Orphaned files removed, sorted.
    pub removed: Vec<PathBuf>,
    /// Directories removed because they ended up empty.
    pub pruned_dirs: usize,
    pub failures: Vec<CleanupFailure>,
}

/// Build statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildStats {
    pub layouts: usize,
    pub posts: usize,
    pub pages: usize,
    pub static_files: usize,
    /// Files left out because of parse errors or output collisions.
    pub skipped: usize,
    /// Orphaned output files removed.
    pub removed: usize,
    pub cleanup_failures: usize,
    pub duration_ms: u64,
}

impl BuildStats {
    /// Files produced in the output tree.
    pub fn files_written(&self) -> usize {
        self.posts + self.pages + self.static_files
    }
}

/// Result of loading one discovered file.
enum Loaded {
    Ignored,
    Layout(ContentUnit),
    Post(ContentUnit),
    Page(ContentUnit),
    Static(StaticFile),
    Skipped(SkippedFile),
}

/// Units moved onto the blocking pool for rendering.
struct RenderBatch {
    posts: Vec<ContentUnit>,
    pages: Vec<ContentUnit>,
    layouts: Layouts,
    site: Value,
    converters: Arc<ConverterRegistry>,
}

impl RenderBatch {
    fn run(&mut self, span: Span) -> Result<()> {
        let _span = span.entered();
        let layouts = &self.layouts;
        let converters = self.converters.as_ref();

        let site = &self.site;
        self.posts
            .par_iter_mut()
            .try_for_each(|unit| unit.render(layouts, site, converters))?;

        let listed = self.posts.iter().map(|u| u.template_data().clone()).collect();
        if let Value::Object(data) = &mut self.site {
            data.insert("posts".into(), Value::Array(listed));
        }

        let site = &self.site;
        self.pages
            .par_iter_mut()
            .try_for_each(|unit| unit.render(layouts, site, converters))
    }
}

/// The site being built.
#[derive(Debug)]
pub struct Site {
    config: Config,
    classifier: Classifier,
    converters: Arc<ConverterRegistry>,
    layouts: Layouts,
    posts: Vec<ContentUnit>,
    pages: Vec<ContentUnit>,
    static_files: Vec<StaticFile>,
    template_data: Value,
    skipped: Vec<SkippedFile>,
    state: BuildState,
}

impl Site {
    /// Create a site for a resolved configuration.
    pub fn new(config: Config) -> Result<Self> {
        let classifier = Classifier::new(&config)?;
        let converters = Arc::new(ConverterRegistry::with_theme(&config.syntax_theme));

        let mut site = Self {
            config,
            classifier,
            converters,
            layouts: Layouts::new(),
            posts: Vec::new(),
            pages: Vec::new(),
            static_files: Vec::new(),
            template_data: Value::Null,
            skipped: Vec::new(),
            state: BuildState::Idle,
        };
        site.reset();
        Ok(site)
    }

    /// Replace the converters used to render units.
    #[must_use]
    pub fn with_converters(mut self, converters: ConverterRegistry) -> Self {
        self.converters = Arc::new(converters);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn state(&self) -> BuildState {
        self.state
    }

    pub fn layouts(&self) -> &Layouts {
        &self.layouts
    }

    /// Published posts in discovery order.
    pub fn posts(&self) -> &[ContentUnit] {
        &self.posts
    }

    /// Published pages in discovery order.
    pub fn pages(&self) -> &[ContentUnit] {
        &self.pages
    }

    pub fn static_files(&self) -> &[StaticFile] {
        &self.static_files
    }

    /// Global template data shared by every render.
    pub fn template_data(&self) -> &Value {
        &self.template_data
    }

    /// Files dropped during the last read.
    pub fn skipped(&self) -> &[SkippedFile] {
        &self.skipped
    }

    /// Run a full build: reset, read, render, write, cleanup.
    pub async fn process(&mut self) -> Result<BuildStats> {
        let start = Instant::now();
        info!(
            source = %self.config.source.display(),
            destination = %self.config.destination.display(),
            "starting build"
        );

        self.reset();
        self.read().await?;
        self.render().await?;
        self.write().await?;
        let report = self.cleanup().await?;

        let stats = BuildStats {
            layouts: self.layouts.len(),
            posts: self.posts.len(),
            pages: self.pages.len(),
            static_files: self.static_files.len(),
            skipped: self.skipped.len(),
            removed: report.removed.len(),
            cleanup_failures: report.failures.len(),
            duration_ms: start.elapsed().as_millis() as u64,
        };

        info!(
            posts = stats.posts,
            pages = stats.pages,
            static_files = stats.static_files,
            skipped = stats.skipped,
            removed = stats.removed,
            duration_ms = stats.duration_ms,
            "build complete"
        );
        Ok(stats)
    }

    /// Drop all units and rebuild the global template data.
    ///
    /// `time`, `url`, `posts` and `pages` are set first; configured globals are added
    /// only under keys that are still free.
    pub fn reset(&mut self) {
        self.layouts.clear();
        self.posts.clear();
        self.pages.clear();
        self.static_files.clear();
        self.skipped.clear();

        let mut data = Map::new();
        data.insert("time".into(), Value::String(Utc::now().to_rfc3339()));
        data.insert("url".into(), Value::String(self.config.url.clone()));
        data.insert("posts".into(), Value::Array(Vec::new()));
        data.insert("pages".into(), Value::Array(Vec::new()));
        for (key, value) in self.config.globals() {
            data.entry(key).or_insert(value);
        }

        self.template_data = Value::Object(data);
        self.state = BuildState::Ready;
    }

    /// Discover, classify and parse every file under the source root.
    pub async fn read(&mut self) -> Result<()> {
        self.expect_state("read", BuildState::Ready)?;
        let result = self.read_units().instrument(info_span!("read")).await;
        self.advance(result, BuildState::Read)
    }

    /// Render every post and page against the layouts and the global data.
    ///
    /// Posts render first; their rendered `content` is then published in
    /// `site.posts` so that pages can list it.
    pub async fn render(&mut self) -> Result<()> {
        self.expect_state("render", BuildState::Read)?;
        let result = self.render_units().await;
        self.advance(result, BuildState::Rendered)
    }

    /// Write every post, page and static file. Returns the number of files written.
    pub async fn write(&mut self) -> Result<usize> {
        self.expect_state("write", BuildState::Rendered)?;
        let result = self.write_outputs().instrument(info_span!("write")).await;
        self.advance(result, BuildState::Written)
    }

    /// Remove output files that no current source produces, then prune empty
    /// directories. Files that cannot be removed are reported, not raised.
    pub async fn cleanup(&mut self) -> Result<CleanupReport> {
        self.expect_state("cleanup", BuildState::Written)?;
        let result = self.remove_orphans().instrument(info_span!("cleanup")).await;
        self.advance(result, BuildState::Idle)
    }

    /// Destination of every post, page and static file, with the source producing it.
    pub fn outputs(&self) -> Vec<(PathBuf, &Path)> {
        let root = self.config.destination.as_path();
        self.posts
            .iter()
            .chain(&self.pages)
            .map(|unit| (unit.destination_path(root), unit.source_path()))
            .chain(
                self.static_files
                    .iter()
                    .map(|file| (file.destination_path(root), file.source_path())),
            )
            .collect()
    }

    fn expect_state(&self, operation: &'static str, expected: BuildState) -> Result<()> {
        if self.state == expected {
            Ok(())
        } else {
            Err(BuildError::OutOfOrder {
                operation,
                state: self.state,
            })
        }
    }

    fn advance<T>(&mut self, result: Result<T>, next: BuildState) -> Result<T> {
        self.state = if result.is_ok() { next } else { BuildState::Idle };
        result
    }

    async fn read_units(&mut self) -> Result<()> {
        let source = self.config.source.clone();
        let destination = self.config.destination.clone();
        let files = tokio::task::spawn_blocking(move || discover(&source, &destination)).await??;
        debug!(count = files.len(), "discovered files");

        let loaded: Vec<Loaded> = stream::iter(files)
            .map(|path| self.load(path))
            .buffered(IO_CONCURRENCY)
            .try_collect()
            .await?;

        for item in loaded {
            match item {
                Loaded::Ignored => {}
                Loaded::Layout(unit) => {
                    let key = unit.layout_key();
                    if let Some(previous) = self.layouts.insert(key.clone(), unit) {
                        warn!(
                            layout = %key,
                            replaced = %previous.relative_path().display(),
                            "duplicate layout name, the last one wins"
                        );
                    }
                }
                Loaded::Post(unit) | Loaded::Page(unit) if !unit.is_published() => {
                    debug!(path = %unit.relative_path().display(), "skipping unpublished");
                }
                Loaded::Post(unit) => self.posts.push(unit),
                Loaded::Page(unit) => self.pages.push(unit),
                Loaded::Static(file) => self.static_files.push(file),
                Loaded::Skipped(skipped) => {
                    error!(
                        path = %skipped.path.display(),
                        reason = %skipped.reason,
                        "skipping file"
                    );
                    self.skipped.push(skipped);
                }
            }
        }

        self.drop_output_collisions();

        let posts = self.posts.iter().map(|u| u.template_data().clone()).collect();
        let pages = self.pages.iter().map(|u| u.template_data().clone()).collect();
        if let Value::Object(data) = &mut self.template_data {
            data.insert("posts".into(), Value::Array(posts));
            data.insert("pages".into(), Value::Array(pages));
        }

        info!(
            layouts = self.layouts.len(),
            posts = self.posts.len(),
            pages = self.pages.len(),
            static_files = self.static_files.len(),
            skipped = self.skipped.len(),
            "read complete"
        );
        Ok(())
    }

    /// Keep one producer per output path. Posts claim first, then pages, then static
    /// files, each in discovery order; later claimants are skipped.
    fn drop_output_collisions(&mut self) {
        let root = self.config.destination.clone();
        let mut claimed: HashMap<PathBuf, PathBuf> = HashMap::new();
        let mut dropped = Vec::new();
        let mut claim = |dest: PathBuf, source: &Path| match claimed.entry(dest) {
            Entry::Vacant(slot) => {
                slot.insert(source.to_path_buf());
                true
            }
            Entry::Occupied(first) => {
                dropped.push(SkippedFile {
                    path: source.to_path_buf(),
                    reason: format!(
                        "output {} is already produced by {}",
                        first.key().display(),
                        first.get().display()
                    ),
                });
                false
            }
        };

        self.posts.retain(|unit| claim(unit.destination_path(&root), unit.source_path()));
        self.pages.retain(|unit| claim(unit.destination_path(&root), unit.source_path()));
        self.static_files.retain(|file| claim(file.destination_path(&root), file.source_path()));

        for skipped in dropped {
            warn!(path = %skipped.path.display(), reason = %skipped.reason, "skipping file");
            self.skipped.push(skipped);
        }
    }

    async fn load(&self, path: PathBuf) -> Result<Loaded> {
        let Some(relative) = self.classifier.relative(&path).map(Path::to_path_buf) else {
            return Ok(Loaded::Ignored);
        };

        let classified = self.classifier.classify(&path).await?;
        debug!(path = %relative.display(), class = classified.as_str(), "classified");

        let parsed = match classified {
            Classified::Ignored => return Ok(Loaded::Ignored),
            Classified::Static => return Ok(Loaded::Static(StaticFile::new(path, relative))),
            Classified::Layout => {
                let bytes = read_bytes(&path).await?;
                decode(&path, bytes)
                    .and_then(|raw| ContentUnit::layout(path.clone(), &relative, &raw))
                    .map(Loaded::Layout)
            }
            Classified::Post(name) => {
                let bytes = read_bytes(&path).await?;
                if !starts_with_fence(&bytes) {
                    debug!(path = %relative.display(), "post without front matter, skipping");
                    return Ok(Loaded::Ignored);
                }
                let permalink = &self.config.permalink;
                decode(&path, bytes)
                    .and_then(|raw| {
                        ContentUnit::post(path.clone(), &relative, &raw, name, permalink)
                    })
                    .map(Loaded::Post)
            }
            Classified::Page(bytes) => decode(&path, bytes)
                .and_then(|raw| ContentUnit::page(path.clone(), &relative, &raw))
                .map(Loaded::Page),
        };

        match parsed {
            Err(err) if err.is_parse() => Ok(Loaded::Skipped(SkippedFile {
                path,
                reason: err.to_string(),
            })),
            other => other,
        }
    }

    /// Hand the units to the blocking pool for the rayon fan-out and take them back
    /// afterwards, so no runtime worker is held for the whole phase.
    async fn render_units(&mut self) -> Result<()> {
        let mut batch = RenderBatch {
            posts: mem::take(&mut self.posts),
            pages: mem::take(&mut self.pages),
            layouts: mem::take(&mut self.layouts),
            site: mem::take(&mut self.template_data),
            converters: Arc::clone(&self.converters),
        };
        let span = info_span!("render");

        let (batch, result) = tokio::task::spawn_blocking(move || {
            let result = batch.run(span);
            (batch, result)
        })
        .await?;

        self.posts = batch.posts;
        self.pages = batch.pages;
        self.layouts = batch.layouts;
        self.template_data = batch.site;
        result?;

        info!(count = self.posts.len() + self.pages.len(), "render complete");
        Ok(())
    }

    async fn write_outputs(&self) -> Result<usize> {
        let root = self.config.destination.as_path();

        let units = self
            .posts
            .iter()
            .chain(&self.pages)
            .map(|unit| unit.write(root).boxed());
        let statics = self.static_files.iter().map(|file| file.write(root).boxed());

        let written: Vec<PathBuf> = stream::iter(units.chain(statics))
            .buffer_unordered(IO_CONCURRENCY)
            .try_collect()
            .await?;

        info!(count = written.len(), destination = %root.display(), "write complete");
        Ok(written.len())
    }

    async fn remove_orphans(&self) -> Result<CleanupReport> {
        let root = self.config.destination.clone();
        let source = self.config.source.clone();
        let expected: HashSet<PathBuf> = self.outputs().into_iter().map(|(dest, _)| dest).collect();

        let existing = {
            let root = root.clone();
            let source = source.clone();
            tokio::task::spawn_blocking(move || list_files(&root, &source)).await??
        };
        let orphans: Vec<PathBuf> = existing
            .into_iter()
            .filter(|path| !expected.contains(path))
            .collect();

        let outcomes: Vec<(PathBuf, std::io::Result<()>)> = stream::iter(orphans)
            .map(|path| async move {
                let outcome = tokio::fs::remove_file(&path).await;
                (path, outcome)
            })
            .buffer_unordered(IO_CONCURRENCY)
            .collect()
            .await;

        let mut report = CleanupReport::default();
        for (path, outcome) in outcomes {
            match outcome {
                Ok(()) => {
                    debug!(path = %path.display(), "removed orphaned file");
                    report.removed.push(path);
                }
                Err(error) => {
                    warn!(path = %path.display(), error = %error, "failed to remove orphaned file");
                    report.failures.push(CleanupFailure { path, error });
                }
            }
        }
        report.removed.sort();
        report.pruned_dirs =
            tokio::task::spawn_blocking(move || prune_empty_dirs(&root, &source)).await?;

        info!(
            removed = report.removed.len(),
            failures = report.failures.len(),
            pruned_dirs = report.pruned_dirs,
            "cleanup complete"
        );
        Ok(report)
    }
}

/// Every regular file under `source`, sorted by path, skipping the destination tree.
fn discover(source: &Path, destination: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    let walker = WalkDir::new(source)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| entry.path() != destination);

    for entry in walker {
        let entry = entry?;
        // Symlinks to files count as the files they point at.
        let is_file = entry.file_type().is_file()
            || (entry.path_is_symlink() && entry.path().is_file());
        if is_file {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

/// Every file under `root`, never descending into `source`. A missing root has no
/// files.
fn list_files(root: &Path, source: &Path) -> Result<Vec<PathBuf>> {
    if !root.exists() {
        return Ok(Vec::new());
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(root)
        .into_iter()
        .filter_entry(|entry| entry.path() != source)
    {
        let entry = entry?;
        if !entry.file_type().is_dir() {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

/// Remove empty directories below `root`, deepest first. `root` itself and anything
/// under `source` are kept.
fn prune_empty_dirs(root: &Path, source: &Path) -> usize {
    WalkDir::new(root)
        .min_depth(1)
        .contents_first(true)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_dir() && !entry.path().starts_with(source))
        // Fails harmlessly on directories that still have entries.
        .filter(|entry| std::fs::remove_dir(entry.path()).is_ok())
        .count()
}

async fn read_bytes(path: &Path) -> Result<Vec<u8>> {
    tokio::fs::read(path).await.map_err(|e| BuildError::io(path, e))
}
