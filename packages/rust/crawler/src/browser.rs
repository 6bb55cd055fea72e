//! Headless Chromium renderer.
//!
//! Every [`ChromeRenderer::render`] call launches its own browser process with
//! a private profile directory, opens one tab, navigates, waits for the
//! network to go quiet, serializes the DOM, and tears everything down again.
//! Sessions are never shared between calls, so concurrent renders cannot
//! observe each other's state.

use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::error::CdpError;
use chromiumoxide::page::Page;
use futures::StreamExt;
use sitemd_shared::{BrowserSettings, Result, SitemdError};
use tokio::task::JoinHandle;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use crate::PageRenderer;

/// How long the page must stay unchanged before it counts as idle.
const QUIET_WINDOW: Duration = Duration::from_millis(500);

/// Poll interval for the network-idle check.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// How long to wait for the browser process to exit after `close`.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Snapshot of in-page loading state: resource entry count and `readyState`.
const SNAPSHOT_JS: &str =
    "performance.getEntriesByType('resource').length + ':' + document.readyState";

// ---------------------------------------------------------------------------
// Renderer
// ---------------------------------------------------------------------------

/// Renderer backed by a fresh headless Chromium per page.
#[derive(Debug, Clone)]
pub struct ChromeRenderer {
    settings: BrowserSettings,
}

impl ChromeRenderer {
    /// Create a renderer from browser settings.
    pub fn new(settings: BrowserSettings) -> Self {
        Self { settings }
    }
}

impl PageRenderer for ChromeRenderer {
    #[instrument(skip(self), fields(renderer = "chrome"))]
    async fn render(&self, url: &str, timeout: Duration) -> Result<String> {
        let mut session = BrowserSession::launch(&self.settings)
            .await
            .map_err(|e| SitemdError::render(url, format!("browser launch failed: {e}")))?;

        capture_then_close(&mut session, url, timeout).await
    }

    fn name(&self) -> &str {
        "chrome"
    }
}

// ---------------------------------------------------------------------------
// Browser session
// ---------------------------------------------------------------------------

/// What [`capture_then_close`] needs from a live session.
trait RenderSession: Send + Sync {
    type Error: Display;

    fn capture(&self, url: &str) -> impl Future<Output = std::result::Result<String, Self::Error>> + Send;

    fn close(&mut self) -> impl Future<Output = ()> + Send;
}

/// Capture `url` within `timeout`, then close the session on every path
/// before the outcome is inspected.
async fn capture_then_close<S: RenderSession>(
    session: &mut S,
    url: &str,
    timeout: Duration,
) -> Result<String> {
    let outcome = tokio::time::timeout(timeout, session.capture(url)).await;
    session.close().await;

    match outcome {
        Ok(Ok(html)) => {
            debug!(bytes = html.len(), "page rendered");
            Ok(html)
        }
        Ok(Err(e)) => Err(SitemdError::render(url, e.to_string())),
        Err(_) => Err(SitemdError::render(
            url,
            format!("navigation timed out after {}ms", timeout.as_millis()),
        )),
    }
}

/// One browser process plus the task driving its CDP connection.
///
/// [`BrowserSession::close`] shuts the process down gracefully. If the
/// session is dropped without closing (panic, cancelled future), the CDP
/// task is aborted and `Browser`'s own drop kills the child process.
struct BrowserSession {
    browser: Browser,
    handler: JoinHandle<()>,
    profile_dir: PathBuf,
    closed: bool,
}

impl BrowserSession {
    async fn launch(settings: &BrowserSettings) -> std::result::Result<Self, String> {
        let profile_dir = std::env::temp_dir().join(format!("sitemd-chrome-{}", Uuid::now_v7()));
        let config = browser_config(settings, &profile_dir)?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| e.to_string())?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        Ok(Self {
            browser,
            handler,
            profile_dir,
            closed: false,
        })
    }
}

impl RenderSession for BrowserSession {
    type Error = CdpError;

    /// Navigate a new tab to `url` and return the DOM once the network is idle.
    async fn capture(&self, url: &str) -> std::result::Result<String, CdpError> {
        let page = self.browser.new_page("about:blank").await?;
        page.goto(url).await?;
        wait_for_network_idle(&page).await?;
        page.content().await
    }

    async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        if let Err(e) = self.browser.close().await {
            warn!(error = %e, "browser close failed, killing process");
            let _ = self.browser.kill().await;
        }
        match tokio::time::timeout(SHUTDOWN_GRACE, self.browser.wait()).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => warn!(error = %e, "waiting for browser exit failed"),
            Err(_) => {
                warn!("browser did not exit in time, killing process");
                let _ = self.browser.kill().await;
            }
        }

        self.handler.abort();
        remove_profile_dir(&self.profile_dir);
    }
}

impl Drop for BrowserSession {
    fn drop(&mut self) {
        if !self.closed {
            self.handler.abort();
            remove_profile_dir(&self.profile_dir);
        }
    }
}

fn remove_profile_dir(dir: &Path) {
    if let Err(e) = std::fs::remove_dir_all(dir) {
        if e.kind() != std::io::ErrorKind::NotFound {
            debug!(dir = %dir.display(), error = %e, "could not remove browser profile");
        }
    }
}

/// Build the chromiumoxide launch configuration for one session.
fn browser_config(
    settings: &BrowserSettings,
    profile_dir: &Path,
) -> std::result::Result<BrowserConfig, String> {
    let mut builder = BrowserConfig::builder()
        .user_data_dir(profile_dir)
        .window_size(settings.window_width, settings.window_height);

    if !settings.headless {
        builder = builder.with_head();
    }
    if settings.no_sandbox {
        builder = builder.no_sandbox();
    }
    if let Some(exe) = &settings.chrome_executable {
        builder = builder.chrome_executable(exe);
    }

    builder.build()
}

// ---------------------------------------------------------------------------
// Network idle
// ---------------------------------------------------------------------------

/// Tracks page snapshots until nothing has changed for a quiet window.
#[derive(Debug)]
pub struct IdleTracker {
    quiet_window: Duration,
    last: Option<String>,
    since: Instant,
}

impl IdleTracker {
    /// Create a tracker that requires `quiet_window` of stability.
    pub fn new(quiet_window: Duration) -> Self {
        Self {
            quiet_window,
            last: None,
            since: Instant::now(),
        }
    }

    /// Record a `"<resource count>:<readyState>"` snapshot taken at `now`.
    ///
    /// Returns `true` once the document is `complete` and the snapshot has
    /// not changed for the whole quiet window.
    pub fn observe(&mut self, snapshot: &str, now: Instant) -> bool {
        if self.last.as_deref() != Some(snapshot) {
            self.last = Some(snapshot.to_string());
            self.since = now;
            return false;
        }
        snapshot.ends_with(":complete") && now.duration_since(self.since) >= self.quiet_window
    }
}

/// Poll the page until its loading state stops changing.
///
/// Unbounded on its own; the caller wraps it in the navigation timeout.
async fn wait_for_network_idle(page: &Page) -> std::result::Result<(), CdpError> {
    let mut tracker = IdleTracker::new(QUIET_WINDOW);
    loop {
        let snapshot: String = page
            .evaluate(SNAPSHOT_JS)
            .await?
            .into_value()
            .map_err(CdpError::from)?;

        if tracker.observe(&snapshot, Instant::now()) {
            debug!(%snapshot, "network idle");
            return Ok(());
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idle_requires_complete_and_quiet_window() {
        let start = Instant::now();
        let mut tracker = IdleTracker::new(Duration::from_millis(500));

        assert!(!tracker.observe("3:loading", start));
        assert!(!tracker.observe("3:loading", start + Duration::from_secs(2)));
        assert!(!tracker.observe("5:complete", start + Duration::from_millis(2100)));
        assert!(!tracker.observe("5:complete", start + Duration::from_millis(2400)));
        assert!(tracker.observe("5:complete", start + Duration::from_millis(2600)));
    }

    #[test]
    fn new_resources_reset_the_window() {
        let start = Instant::now();
        let mut tracker = IdleTracker::new(Duration::from_millis(500));

        assert!(!tracker.observe("1:complete", start));
        assert!(!tracker.observe("2:complete", start + Duration::from_millis(450)));
        assert!(!tracker.observe("2:complete", start + Duration::from_millis(900)));
        assert!(tracker.observe("2:complete", start + Duration::from_millis(950)));
    }

    enum Capture {
        Html(&'static str),
        Fail(&'static str),
        Hang,
    }

    struct FakeSession {
        capture: Capture,
        closes: usize,
    }

    impl FakeSession {
        fn new(capture: Capture) -> Self {
            Self { capture, closes: 0 }
        }
    }

    impl RenderSession for FakeSession {
        type Error = String;

        async fn capture(&self, _url: &str) -> std::result::Result<String, String> {
            match self.capture {
                Capture::Html(html) => Ok(html.to_string()),
                Capture::Fail(message) => Err(message.to_string()),
                Capture::Hang => std::future::pending().await,
            }
        }

        async fn close(&mut self) {
            self.closes += 1;
        }
    }

    const URL: &str = "https://example.com/page";

    #[tokio::test]
    async fn session_closed_after_capture() {
        let mut session = FakeSession::new(Capture::Html("<html></html>"));
        let html = capture_then_close(&mut session, URL, Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(html, "<html></html>");
        assert_eq!(session.closes, 1);
    }

    #[tokio::test]
    async fn session_closed_after_navigation_error() {
        let mut session = FakeSession::new(Capture::Fail("net::ERR_NAME_NOT_RESOLVED"));
        let err = capture_then_close(&mut session, URL, Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(matches!(err, SitemdError::PageRender { .. }));
        assert!(err.to_string().contains("ERR_NAME_NOT_RESOLVED"));
        assert_eq!(session.closes, 1);
    }

    #[tokio::test]
    async fn session_closed_after_timeout() {
        let mut session = FakeSession::new(Capture::Hang);
        let err = capture_then_close(&mut session, URL, Duration::from_millis(50))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("timed out after 50ms"));
        assert_eq!(session.closes, 1);
    }

    #[test]
    fn browser_config_builds_with_settings() {
        let settings = BrowserSettings {
            no_sandbox: true,
            window_width: 800,
            window_height: 600,
            ..BrowserSettings::default()
        };
        let dir = std::env::temp_dir().join("sitemd-config-test");
        // Building only fails when no executable can be found, which depends on the host.
        if let Err(e) = browser_config(&settings, &dir) {
            assert!(!e.is_empty());
        }
    }

    /// Needs a local Chrome/Chromium: `cargo test -- --ignored`.
    #[tokio::test]
    #[ignore]
    async fn renders_script_generated_content() {
        use wiremock::matchers::path;
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(path("/app"))
            .respond_with(ResponseTemplate::new(200).insert_header("content-type", "text/html").set_body_string(
                r#"<html><body><div id="root"></div>
                <script>document.getElementById('root').innerHTML = '<h1>Rendered</h1>';</script>
                </body></html>"#,
            ))
            .mount(&server)
            .await;

        let renderer = ChromeRenderer::new(BrowserSettings {
            no_sandbox: true,
            ..BrowserSettings::default()
        });
        let html = renderer
            .render(&format!("{}/app", server.uri()), Duration::from_secs(30))
            .await
            .unwrap();
        assert!(html.contains("<h1>Rendered</h1>"));
    }
}
