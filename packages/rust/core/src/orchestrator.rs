//! End-to-end run: sitemap URL → page URLs → Markdown files.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use futures::StreamExt;
use futures::stream;
use tracing::{info, instrument};

use sitemd_crawler::PageRenderer;
use sitemd_discovery::{ResolverOptions, SitemapResolver};
use sitemd_shared::{PageUrl, Result, RunConfig, SitemdError, SkipReason};

use crate::pipeline::{PageOutcome, PagePipeline, PipelineOptions};
use crate::progress::{ProgressReporter, ResolverProgress};

/// A page that was not written, and why.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedPage {
    pub url: PageUrl,
    pub reason: SkipReason,
}

/// Result of a run.
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    /// Page URLs found in the sitemap tree (duplicates included).
    pub discovered: usize,
    /// Pages written to disk.
    pub written: usize,
    /// Pages skipped, in discovery order.
    pub skipped: Vec<SkippedPage>,
    /// Sitemap nodes that contributed nothing because they failed.
    pub sitemap_failures: usize,
    pub elapsed: Duration,
}

impl RunSummary {
    /// Number of skipped pages with the given reason.
    pub fn skipped_for(&self, reason: SkipReason) -> usize {
        self.skipped.iter().filter(|s| s.reason == reason).count()
    }
}

/// Resolve `sitemap_url` and turn every page it lists into a Markdown file.
///
/// 1. Resolve the sitemap tree (never fails; failed nodes are counted)
/// 2. Stop early with an empty summary if no URLs were found
/// 3. Create the output directory
/// 4. Render and extract up to `concurrency` pages at once, in any order
/// 5. Write results one at a time in discovery order
///
/// Only configuration and filesystem errors end the run with `Err`.
#[instrument(skip_all, fields(url = %sitemap_url, renderer = renderer.name()))]
pub async fn run<R: PageRenderer>(
    sitemap_url: &str,
    config: &RunConfig,
    renderer: R,
    progress: &dyn ProgressReporter,
) -> Result<RunSummary> {
    config.validate()?;
    let start = Instant::now();

    // --- Phase 1: Sitemap resolution ---
    progress.phase("Resolving sitemap");
    let resolver = SitemapResolver::new(&ResolverOptions::from(config))?;
    let resolution = resolver
        .resolve_with(sitemap_url, &ResolverProgress { inner: progress })
        .await;

    let mut summary = RunSummary {
        discovered: resolution.urls.len(),
        sitemap_failures: resolution.failures.len(),
        ..RunSummary::default()
    };

    if resolution.is_empty() {
        info!("no URLs found");
        summary.elapsed = start.elapsed();
        progress.done(&summary);
        return Ok(summary);
    }

    // --- Phase 2: Output directory ---
    tokio::fs::create_dir_all(&config.output_dir)
        .await
        .map_err(|e| SitemdError::io(&config.output_dir, e))?;

    // --- Phase 3: Pages ---
    progress.phase("Processing pages");
    let pipeline = PagePipeline::new(renderer, PipelineOptions::from(config));
    let total = resolution.urls.len();

    let mut prepared = stream::iter(resolution.urls.iter().enumerate())
        .map(|(i, url)| {
            let pipeline = &pipeline;
            async move {
                progress.page_started(url, i + 1, total);
                (i, pipeline.prepare(url).await)
            }
        })
        .buffer_unordered(config.concurrency);

    // A slow page must not hold back later renders, but writes stay in
    // discovery order so a colliding filename goes to the last URL listed.
    let mut ready = BTreeMap::new();
    let mut next = 0;
    while let Some((i, result)) = prepared.next().await {
        ready.insert(i, result);
        while let Some(result) = ready.remove(&next) {
            let url = &resolution.urls[next];
            let outcome = pipeline.settle(url, result).await?;
            progress.page_finished(url, &outcome, next + 1, total);
            match outcome {
                PageOutcome::Written { .. } => summary.written += 1,
                PageOutcome::Skipped { reason } => summary.skipped.push(SkippedPage {
                    url: url.clone(),
                    reason,
                }),
            }
            next += 1;
        }
    }

    summary.elapsed = start.elapsed();
    progress.done(&summary);

    info!(
        discovered = summary.discovered,
        written = summary.written,
        skipped = summary.skipped.len(),
        sitemap_failures = summary.sitemap_failures,
        elapsed_ms = summary.elapsed.as_millis(),
        "run complete"
    );

    Ok(summary)
}
