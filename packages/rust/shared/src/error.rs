//! Error types for sitemd.
//!
//! Library crates use [`SitemdError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.
//!
//! Sitemap-node variants are recovered by the resolver. Page-level variants
//! are recovered by the page pipeline through `SkipReason::for_error`; anything
//! without a skip reason ([`SitemdError::Io`], [`SitemdError::Config`]) ends a run.

use std::path::PathBuf;

/// Top-level error type for all sitemd operations.
#[derive(Debug, thiserror::Error)]
pub enum SitemdError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// HTTP failure or non-2xx status while fetching a sitemap.
    #[error("sitemap fetch failed for {url}: {message}")]
    SitemapFetch { url: String, message: String },

    /// Malformed XML or a document that is neither a urlset nor a sitemap index.
    #[error("sitemap parse failed for {url}: {message}")]
    SitemapParse { url: String, message: String },

    /// The sitemap is its own ancestor in the index tree.
    #[error("sitemap {url} references itself through its parents, skipping cycle")]
    SitemapCycle { url: String },

    /// The sitemap index nesting exceeded the configured bound.
    #[error("sitemap {url} exceeds maximum nesting depth {depth}")]
    SitemapDepth { url: String, depth: usize },

    /// Browser launch, navigation failure, or navigation timeout.
    #[error("render failed for {url}: {message}")]
    PageRender { url: String, message: String },

    /// Extraction found less text than the configured threshold.
    #[error("extracted content for {url} too short ({chars} chars, minimum {min_chars})")]
    LowContent {
        url: String,
        chars: usize,
        min_chars: usize,
    },

    /// Main-content extraction error.
    #[error("extraction error: {0}")]
    Extraction(String),

    /// HTML-to-Markdown conversion error.
    #[error("conversion error: {0}")]
    Conversion(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, SitemdError>;

impl SitemdError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a sitemap fetch error.
    pub fn sitemap_fetch(url: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::SitemapFetch {
            url: url.into(),
            message: msg.into(),
        }
    }

    /// Create a sitemap parse error.
    pub fn sitemap_parse(url: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::SitemapParse {
            url: url.into(),
            message: msg.into(),
        }
    }

    /// Create a page render error.
    pub fn render(url: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::PageRender {
            url: url.into(),
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
