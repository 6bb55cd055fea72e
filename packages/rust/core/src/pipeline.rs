//! Per-page pipeline: render → extract → Markdown → file.
//!
//! [`PagePipeline::prepare`] does the network and CPU work and may run
//! concurrently for many pages. [`PagePipeline::persist`] writes one file and
//! is called by a single caller in discovery order. [`PagePipeline::process`]
//! chains both for one URL.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{debug, instrument, warn};

use sitemd_crawler::PageRenderer;
use sitemd_markdown::{ConvertOptions, ExtractOptions};
use sitemd_shared::{FilenameMode, PageUrl, Result, RunConfig, SitemdError, SkipReason};

use crate::sanitize::sanitize;

/// Per-page settings, taken from [`RunConfig`].
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub output_dir: PathBuf,
    pub nav_timeout: Duration,
    pub min_chars: usize,
    pub filename_mode: FilenameMode,
    pub frontmatter: bool,
}

impl From<&RunConfig> for PipelineOptions {
    fn from(config: &RunConfig) -> Self {
        Self {
            output_dir: config.output_dir.clone(),
            nav_timeout: Duration::from_millis(config.nav_timeout_ms),
            min_chars: config.min_extract_chars,
            filename_mode: config.filename_mode,
            frontmatter: config.frontmatter,
        }
    }
}

/// What happened to one page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageOutcome {
    /// Markdown was written to `path`; `chars` is the extracted text length.
    Written { path: PathBuf, chars: usize },
    /// Nothing was written.
    Skipped { reason: SkipReason },
}

impl PageOutcome {
    pub fn is_written(&self) -> bool {
        matches!(self, Self::Written { .. })
    }
}

/// A page converted to Markdown and ready to write.
#[derive(Debug, Clone)]
pub struct PreparedPage {
    pub url: PageUrl,
    pub markdown: String,
    pub chars: usize,
    pub words: usize,
}

/// Renders, extracts and persists pages with one renderer.
pub struct PagePipeline<R> {
    renderer: R,
    opts: PipelineOptions,
}

impl<R: PageRenderer> PagePipeline<R> {
    pub fn new(renderer: R, opts: PipelineOptions) -> Self {
        Self { renderer, opts }
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.opts
    }

    /// Render the page and convert its main content to Markdown.
    ///
    /// Every error returned here is page-scoped: [`SkipReason::for_error`]
    /// maps it to a skip reason.
    #[instrument(skip_all, fields(url = %url, renderer = self.renderer.name()))]
    pub async fn prepare(&self, url: &str) -> Result<PreparedPage> {
        let html = self.renderer.render(url, self.opts.nav_timeout).await?;
        debug!(bytes = html.len(), "rendered");

        let page_url = url.to_string();
        let min_chars = self.opts.min_chars;
        let convert = ConvertOptions {
            source_url: page_url.clone(),
            frontmatter: self.opts.frontmatter,
            fetched_at: self
                .opts
                .frontmatter
                .then(|| chrono::Utc::now().to_rfc3339()),
        };

        // HTML parsing is CPU-bound; keep it off the async workers.
        tokio::task::spawn_blocking(move || {
            let doc = sitemd_markdown::extract(&html, &ExtractOptions { min_chars })?;
            if !doc.meets(min_chars) {
                return Err(SitemdError::LowContent {
                    url: page_url,
                    chars: doc.char_count,
                    min_chars,
                });
            }
            let converted = sitemd_markdown::to_markdown(&doc, &convert)?;
            debug!(url = %page_url, source = ?doc.source, "converted");
            Ok(PreparedPage {
                url: page_url,
                markdown: converted.markdown,
                chars: doc.char_count,
                words: converted.word_count,
            })
        })
        .await
        .map_err(|e| SitemdError::Extraction(format!("extraction task failed: {e}")))?
    }

    /// Write a prepared page, replacing any existing file of the same name.
    ///
    /// The content goes to a hidden temporary file first and is renamed into
    /// place. Errors here are run-fatal.
    pub async fn persist(&self, page: &PreparedPage) -> Result<PathBuf> {
        let filename = sanitize(&page.url, self.opts.filename_mode);
        let target = self.opts.output_dir.join(&filename);
        write_atomic(&self.opts.output_dir, &filename, &page.markdown).await?;
        debug!(
            url = %page.url,
            path = %target.display(),
            chars = page.chars,
            words = page.words,
            "wrote page"
        );
        Ok(target)
    }

    /// Turn the result of [`prepare`](Self::prepare) into an outcome.
    ///
    /// Errors with a [`SkipReason`] become [`PageOutcome::Skipped`] with a
    /// warning; anything else (and any write failure) is returned as an error.
    pub async fn settle(&self, url: &str, prepared: Result<PreparedPage>) -> Result<PageOutcome> {
        match prepared {
            Ok(page) => {
                let path = self.persist(&page).await?;
                Ok(PageOutcome::Written {
                    path,
                    chars: page.chars,
                })
            }
            Err(e) => match SkipReason::for_error(&e) {
                Some(reason) => {
                    warn!(url = %url, %reason, error = %e, "skipping page");
                    Ok(PageOutcome::Skipped { reason })
                }
                None => Err(e),
            },
        }
    }

    /// Render, extract and write one page.
    pub async fn process(&self, url: &str) -> Result<PageOutcome> {
        let prepared = self.prepare(url).await;
        self.settle(url, prepared).await
    }
}

async fn write_atomic(dir: &Path, filename: &str, content: &str) -> Result<()> {
    let target = dir.join(filename);
    let temp = dir.join(format!(".{filename}.tmp"));

    tokio::fs::write(&temp, content)
        .await
        .map_err(|e| SitemdError::io(&temp, e))?;
    if let Err(e) = tokio::fs::rename(&temp, &target).await {
        let _ = tokio::fs::remove_file(&temp).await;
        return Err(SitemdError::io(&target, e));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ScriptedRenderer, article, temp_dir};

    fn pipeline(renderer: ScriptedRenderer, dir: &Path) -> PagePipeline<ScriptedRenderer> {
        let config = RunConfig {
            output_dir: dir.to_path_buf(),
            nav_timeout_ms: 200,
            ..RunConfig::default()
        };
        PagePipeline::new(renderer, PipelineOptions::from(&config))
    }

    #[tokio::test]
    async fn writes_markdown_for_article() {
        let dir = temp_dir();
        let url = "https://example.com/docs/page-one";
        let renderer = ScriptedRenderer::new().page(url, article("Page One"));

        let outcome = pipeline(renderer, &dir).process(url).await.unwrap();

        let expected = dir.join("examplecom_docs_page-one.md");
        match &outcome {
            PageOutcome::Written { path, chars } => {
                assert_eq!(path, &expected);
                assert!(*chars >= 100);
            }
            other => panic!("expected written, got {other:?}"),
        }
        let body = std::fs::read_to_string(&expected).unwrap();
        assert!(body.starts_with("# Page One\n"));
        assert!(!body.contains("Site navigation"));
    }

    #[tokio::test]
    async fn prepared_page_counts_text() {
        let dir = temp_dir();
        let url = "https://example.com/counted";
        let renderer = ScriptedRenderer::new().page(url, article("Counted"));

        let page = pipeline(renderer, &dir).prepare(url).await.unwrap();

        assert_eq!(page.url, url);
        assert!(page.chars >= 100);
        assert!(page.words >= 20, "words = {}", page.words);
    }

    #[tokio::test]
    async fn render_failure_is_skipped() {
        let dir = temp_dir();
        let url = "https://example.com/broken";
        let renderer = ScriptedRenderer::new().fail(url, "net::ERR_NAME_NOT_RESOLVED");

        let outcome = pipeline(renderer, &dir).process(url).await.unwrap();

        assert_eq!(outcome, PageOutcome::Skipped { reason: SkipReason::Render });
        assert!(std::fs::read_dir(&dir).unwrap().next().is_none());
    }

    #[tokio::test]
    async fn render_timeout_is_skipped() {
        let dir = temp_dir();
        let url = "https://example.com/slow";
        let renderer = ScriptedRenderer::new().hang(url);

        let outcome = pipeline(renderer, &dir).process(url).await.unwrap();
        assert_eq!(outcome, PageOutcome::Skipped { reason: SkipReason::Render });
    }

    #[tokio::test]
    async fn thin_page_is_low_content() {
        let dir = temp_dir();
        let url = "https://example.com/spa";
        let renderer = ScriptedRenderer::new()
            .page(url, "<html><body><div id=\"app\">Loading</div></body></html>");

        let p = pipeline(renderer, &dir);
        let err = p.prepare(url).await.unwrap_err();
        assert!(matches!(err, SitemdError::LowContent { min_chars: 100, .. }));

        let outcome = p.settle(url, Err(err)).await.unwrap();
        assert_eq!(outcome, PageOutcome::Skipped { reason: SkipReason::LowContent });
        assert!(!dir.join("examplecom_spa.md").exists());
    }

    #[tokio::test]
    async fn existing_file_is_overwritten() {
        let dir = temp_dir();
        let url = "https://example.com/page";
        std::fs::write(dir.join("examplecom_page.md"), "stale").unwrap();
        let renderer = ScriptedRenderer::new().page(url, article("Fresh"));

        pipeline(renderer, &dir).process(url).await.unwrap();

        let body = std::fs::read_to_string(dir.join("examplecom_page.md")).unwrap();
        assert!(body.contains("# Fresh"));
        let leftovers: Vec<_> = std::fs::read_dir(&dir)
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().starts_with('.'))
            .collect();
        assert!(leftovers.is_empty(), "temp file left behind");
    }

    #[tokio::test]
    async fn frontmatter_is_optional() {
        let dir = temp_dir();
        let url = "https://example.com/fm";
        let renderer = ScriptedRenderer::new().page(url, article("With Frontmatter"));
        let mut opts = PipelineOptions::from(&RunConfig::default());
        opts.output_dir = dir.clone();
        opts.frontmatter = true;

        PagePipeline::new(renderer, opts).process(url).await.unwrap();

        let body = std::fs::read_to_string(dir.join("examplecom_fm.md")).unwrap();
        assert!(body.starts_with("---\nsource_url: \"https://example.com/fm\"\n"));
        assert!(body.contains("title: \"With Frontmatter\""));
        assert!(body.contains("fetched_at: \""));
    }

    #[tokio::test]
    async fn missing_output_dir_is_fatal() {
        let dir = temp_dir().join("does-not-exist");
        let url = "https://example.com/page";
        let renderer = ScriptedRenderer::new().page(url, article("Page"));

        let err = pipeline(renderer, &dir).process(url).await.unwrap_err();
        assert!(matches!(err, SitemdError::Io { .. }));
        assert_eq!(SkipReason::for_error(&err), None);
    }

    #[tokio::test]
    async fn sitemap_errors_are_not_page_skips() {
        let dir = temp_dir();
        let p = pipeline(ScriptedRenderer::new(), &dir);
        let err = SitemdError::sitemap_fetch("https://example.com/sitemap.xml", "HTTP 500");

        let result = p.settle("https://example.com/page", Err(err)).await;
        assert!(matches!(result, Err(SitemdError::SitemapFetch { .. })));
    }

    #[test]
    fn options_follow_run_config() {
        let config = RunConfig {
            nav_timeout_ms: 1500,
            min_extract_chars: 40,
            filename_mode: FilenameMode::Corrected,
            ..RunConfig::default()
        };
        let opts = PipelineOptions::from(&config);
        assert_eq!(opts.nav_timeout, Duration::from_millis(1500));
        assert_eq!(opts.min_chars, 40);
        assert_eq!(opts.filename_mode, FilenameMode::Corrected);
        assert_eq!(opts.output_dir, PathBuf::from("docs"));
    }
}
