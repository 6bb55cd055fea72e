//! Run progress reporting.

use sitemd_discovery::{SitemapDocument, SitemapObserver};
use sitemd_shared::SitemdError;

use crate::orchestrator::RunSummary;
use crate::pipeline::PageOutcome;

/// Progress callback for reporting run status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called for every sitemap document fetched and classified.
    fn sitemap_fetched(&self, url: &str, entries: usize);
    /// Called when a page starts rendering. `index` is 1-based discovery order.
    fn page_started(&self, url: &str, index: usize, total: usize);
    /// Called when a page has been written or skipped.
    fn page_finished(&self, url: &str, outcome: &PageOutcome, index: usize, total: usize);
    /// Called when the run completes.
    fn done(&self, summary: &RunSummary);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn sitemap_fetched(&self, _url: &str, _entries: usize) {}
    fn page_started(&self, _url: &str, _index: usize, _total: usize) {}
    fn page_finished(&self, _url: &str, _outcome: &PageOutcome, _index: usize, _total: usize) {}
    fn done(&self, _summary: &RunSummary) {}
}

/// Forwards resolver events to a [`ProgressReporter`].
pub(crate) struct ResolverProgress<'a> {
    pub(crate) inner: &'a dyn ProgressReporter,
}

impl SitemapObserver for ResolverProgress<'_> {
    fn sitemap_fetched(&self, url: &str, document: &SitemapDocument) {
        self.inner.sitemap_fetched(url, document.len());
    }

    // The resolver already logs failures; the summary counts them.
    fn sitemap_failed(&self, _url: &str, _error: &SitemdError) {}
}
