//! Page rendering: turn a page URL into its fully rendered HTML.
//!
//! This crate provides:
//! - [`PageRenderer`]: the rendering seam used by the page pipeline
//! - [`ChromeRenderer`]: headless Chromium over CDP, one browser session per page
//! - [`HttpRenderer`]: plain HTTP GET, for sites that need no client-side script

pub mod browser;
pub mod http;

use std::future::Future;
use std::time::Duration;

use sitemd_shared::Result;

pub use browser::{ChromeRenderer, IdleTracker};
pub use http::HttpRenderer;

/// Renders a page to HTML.
///
/// Implementations own whatever session they need for the duration of one
/// call and release it before returning, on success and on failure. Failures
/// (navigation error, timeout, launch failure) are reported as
/// [`sitemd_shared::SitemdError::PageRender`].
pub trait PageRenderer: Send + Sync {
    /// Navigate to `url`, wait for the page to settle within `timeout`, and
    /// return the serialized DOM.
    fn render(&self, url: &str, timeout: Duration) -> impl Future<Output = Result<String>> + Send;

    /// Human-readable renderer name for tracing.
    fn name(&self) -> &str;
}

/// Which renderer the CLI should build.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RendererKind {
    /// Headless Chromium (executes client-side script).
    #[default]
    Chrome,
    /// Plain HTTP fetch.
    Http,
}

impl std::str::FromStr for RendererKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "chrome" | "chromium" => Ok(Self::Chrome),
            "http" => Ok(Self::Http),
            other => Err(format!("invalid renderer '{other}': expected 'chrome' or 'http'")),
        }
    }
}
