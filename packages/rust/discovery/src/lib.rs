//! Sitemap discovery: expand a sitemap URL into the page URLs it references.
//!
//! A `<urlset>` yields its page locations directly. A `<sitemapindex>` is
//! walked recursively and its children's results are concatenated in entry
//! order. Any failing node (HTTP error, bad XML, unknown root, cycle, depth
//! bound) is logged and contributes nothing; the resolver itself never fails.

mod parser;

use std::collections::HashSet;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use reqwest::Client;
use sitemd_shared::{PageUrl, Result, RunConfig, SitemdError};
use tracing::{debug, info, instrument, warn};

pub use parser::{SitemapDocument, XmlElement, classify, parse_sitemap, parse_xml};

/// Maximum number of redirects to follow when fetching a sitemap.
const MAX_REDIRECTS: usize = 5;

/// Maximum payload accepted for one sitemap (the protocol's uncompressed limit).
const MAX_SITEMAP_SIZE: u64 = 50 * 1024 * 1024;

/// User-Agent string for sitemap requests.
const USER_AGENT: &str = concat!("sitemd/", env!("CARGO_PKG_VERSION"));

// ---------------------------------------------------------------------------
// Resolution
// ---------------------------------------------------------------------------

/// A sitemap node that contributed no URLs because it failed.
#[derive(Debug)]
pub struct SitemapFailure {
    /// The sitemap URL that failed.
    pub url: String,
    /// What went wrong.
    pub error: SitemdError,
}

/// Outcome of resolving a sitemap tree.
#[derive(Debug, Default)]
pub struct Resolution {
    /// Page URLs in discovery order (not deduplicated).
    pub urls: Vec<PageUrl>,
    /// Every node that failed, in the order it was visited.
    pub failures: Vec<SitemapFailure>,
    /// Number of sitemap documents fetched and classified successfully.
    pub sitemaps_fetched: usize,
}

impl Resolution {
    /// Whether no page URLs were found.
    pub fn is_empty(&self) -> bool {
        self.urls.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Observer
// ---------------------------------------------------------------------------

/// Receives per-node progress while a sitemap tree is walked.
pub trait SitemapObserver: Send + Sync {
    /// A sitemap was fetched and classified.
    fn sitemap_fetched(&self, url: &str, document: &SitemapDocument);
    /// A sitemap node failed and contributes no URLs.
    fn sitemap_failed(&self, url: &str, error: &SitemdError);
}

/// Observer that ignores every event.
pub struct NoopObserver;

impl SitemapObserver for NoopObserver {
    fn sitemap_fetched(&self, _url: &str, _document: &SitemapDocument) {}
    fn sitemap_failed(&self, _url: &str, _error: &SitemdError) {}
}

// ---------------------------------------------------------------------------
// Resolver options
// ---------------------------------------------------------------------------

/// Configuration for the sitemap resolver.
#[derive(Debug, Clone)]
pub struct ResolverOptions {
    /// Timeout for a single sitemap request in seconds.
    pub timeout_secs: u64,
    /// Maximum sitemap-index nesting (the root sitemap is depth 0).
    pub max_depth: usize,
}

impl Default for ResolverOptions {
    fn default() -> Self {
        Self::from(&RunConfig::default())
    }
}

impl From<&RunConfig> for ResolverOptions {
    fn from(config: &RunConfig) -> Self {
        Self {
            timeout_secs: config.sitemap_timeout_secs,
            max_depth: config.max_sitemap_depth,
        }
    }
}

// ---------------------------------------------------------------------------
// Resolver
// ---------------------------------------------------------------------------

/// Recursive sitemap / sitemap-index resolver.
pub struct SitemapResolver {
    client: Client,
    max_depth: usize,
}

/// Mutable state threaded through one resolution.
struct Walk<'a> {
    /// Sitemaps on the path from the root to the node being resolved.
    ancestors: HashSet<String>,
    resolution: Resolution,
    observer: &'a dyn SitemapObserver,
}

impl SitemapResolver {
    /// Create a resolver with its own HTTP client.
    pub fn new(opts: &ResolverOptions) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .timeout(Duration::from_secs(opts.timeout_secs))
            .build()
            .map_err(|e| SitemdError::config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            max_depth: opts.max_depth,
        })
    }

    /// Resolve `sitemap_url` into its page URLs.
    #[instrument(skip_all, fields(url = %sitemap_url))]
    pub async fn resolve(&self, sitemap_url: &str) -> Resolution {
        self.resolve_with(sitemap_url, &NoopObserver).await
    }

    /// Resolve `sitemap_url`, reporting each node to `observer`.
    #[instrument(skip_all, fields(url = %sitemap_url))]
    pub async fn resolve_with(
        &self,
        sitemap_url: &str,
        observer: &dyn SitemapObserver,
    ) -> Resolution {
        let mut walk = Walk {
            ancestors: HashSet::new(),
            resolution: Resolution::default(),
            observer,
        };

        self.resolve_node(sitemap_url, 0, &mut walk).await;

        info!(
            urls = walk.resolution.urls.len(),
            sitemaps = walk.resolution.sitemaps_fetched,
            failures = walk.resolution.failures.len(),
            "sitemap resolution complete"
        );

        walk.resolution
    }

    /// Resolve one node, appending its URLs (or its failure) to `walk`.
    fn resolve_node<'a>(
        &'a self,
        url: &'a str,
        depth: usize,
        walk: &'a mut Walk<'_>,
    ) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>> {
        Box::pin(async move {
            if depth > self.max_depth {
                record_failure(
                    walk,
                    url,
                    SitemdError::SitemapDepth {
                        url: url.to_string(),
                        depth: self.max_depth,
                    },
                );
                return;
            }

            // Only an ancestor is a cycle; a sitemap shared by two indexes is
            // resolved under each of them.
            if !walk.ancestors.insert(url.to_string()) {
                record_failure(walk, url, SitemdError::SitemapCycle { url: url.to_string() });
                return;
            }

            self.expand_node(url, depth, walk).await;
            walk.ancestors.remove(url);
        })
    }

    /// Fetch one node and append its URLs, descending into index children.
    async fn expand_node(&self, url: &str, depth: usize, walk: &mut Walk<'_>) {
        info!(url, depth, "fetching sitemap");

        let document = match self.fetch_document(url).await {
            Ok(document) => document,
            Err(e) => {
                record_failure(walk, url, e);
                return;
            }
        };

        walk.resolution.sitemaps_fetched += 1;
        walk.observer.sitemap_fetched(url, &document);
        debug!(url, kind = document.kind(), entries = document.len(), "sitemap classified");

        match document {
            SitemapDocument::UrlSet(urls) => {
                walk.resolution.urls.extend(urls);
            }
            SitemapDocument::SitemapIndex(children) => {
                for child in &children {
                    self.resolve_node(child, depth + 1, walk).await;
                }
            }
        }
    }

    /// Fetch and classify a single sitemap document.
    async fn fetch_document(&self, url: &str) -> Result<SitemapDocument> {
        let xml = self.fetch_xml(url).await?;
        parse_sitemap(url, &xml)
    }

    /// Fetch the raw XML text of a sitemap.
    async fn fetch_xml(&self, url: &str) -> Result<String> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| SitemdError::sitemap_fetch(url, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SitemdError::sitemap_fetch(url, format!("HTTP {status}")));
        }

        if let Some(len) = response.content_length() {
            if len > MAX_SITEMAP_SIZE {
                return Err(SitemdError::sitemap_fetch(
                    url,
                    format!("response too large ({len} bytes, max {MAX_SITEMAP_SIZE})"),
                ));
            }
        }

        let body = response
            .text()
            .await
            .map_err(|e| SitemdError::sitemap_fetch(url, format!("failed to read body: {e}")))?;

        if body.len() as u64 > MAX_SITEMAP_SIZE {
            return Err(SitemdError::sitemap_fetch(
                url,
                format!("response too large ({} bytes, max {MAX_SITEMAP_SIZE})", body.len()),
            ));
        }

        Ok(body)
    }
}

/// Log a failed node and remember it.
fn record_failure(walk: &mut Walk<'_>, url: &str, error: SitemdError) {
    warn!(url, error = %error, "sitemap node failed, contributing no URLs");
    walk.observer.sitemap_failed(url, &error);
    walk.resolution.failures.push(SitemapFailure {
        url: url.to_string(),
        error,
    });
}
