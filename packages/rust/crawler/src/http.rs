//! Plain HTTP renderer.
//!
//! Returns the server response body as-is. No script runs, so pages that build
//! their content client-side come back mostly empty and are usually skipped by
//! the extraction threshold.

use std::time::Duration;

use reqwest::Client;
use sitemd_shared::{Result, SitemdError};
use tracing::{debug, instrument};

use crate::PageRenderer;

/// User-Agent string for page requests.
const USER_AGENT: &str = concat!("sitemd/", env!("CARGO_PKG_VERSION"));

/// Renderer that fetches pages with a single GET request.
#[derive(Debug, Clone)]
pub struct HttpRenderer {
    client: Client,
}

impl HttpRenderer {
    /// Create a renderer with its own HTTP client.
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .map_err(|e| SitemdError::config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { client })
    }
}

impl PageRenderer for HttpRenderer {
    #[instrument(skip(self), fields(renderer = "http"))]
    async fn render(&self, url: &str, timeout: Duration) -> Result<String> {
        debug!("fetching page");

        let response = self
            .client
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| SitemdError::render(url, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SitemdError::render(url, format!("HTTP {status}")));
        }

        response
            .text()
            .await
            .map_err(|e| SitemdError::render(url, format!("body read failed: {e}")))
    }

    fn name(&self) -> &str {
        "http"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn renders_response_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/page"))
            .respond_with(
                ResponseTemplate::new(200).set_body_string("<html><body><p>hi</p></body></html>"),
            )
            .mount(&server)
            .await;

        let renderer = HttpRenderer::new().unwrap();
        let html = renderer
            .render(&format!("{}/page", server.uri()), Duration::from_secs(5))
            .await
            .unwrap();
        assert!(html.contains("<p>hi</p>"));
    }

    #[tokio::test]
    async fn non_success_status_is_render_error() {
        let server = MockServer::start().await;
        Mock::given(path("/gone"))
            .respond_with(ResponseTemplate::new(410))
            .mount(&server)
            .await;

        let renderer = HttpRenderer::new().unwrap();
        let err = renderer
            .render(&format!("{}/gone", server.uri()), Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(matches!(err, SitemdError::PageRender { .. }));
        assert!(err.to_string().contains("410"));
    }

    #[tokio::test]
    async fn slow_response_times_out() {
        let server = MockServer::start().await;
        Mock::given(path("/slow"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("late")
                    .set_delay(Duration::from_secs(3)),
            )
            .mount(&server)
            .await;

        let renderer = HttpRenderer::new().unwrap();
        let err = renderer
            .render(&format!("{}/slow", server.uri()), Duration::from_millis(200))
            .await
            .unwrap_err();
        assert!(matches!(err, SitemdError::PageRender { .. }));
    }
}
