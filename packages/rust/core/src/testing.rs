//! Test doubles shared by the pipeline and orchestrator tests.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use sitemd_crawler::PageRenderer;
use sitemd_shared::{Result, SitemdError};

#[derive(Debug, Clone)]
enum Script {
    Html(String),
    Fail(String),
    Hang,
    Delayed(Duration, String),
}

/// In-memory renderer answering from a per-URL script.
#[derive(Debug, Clone, Default)]
pub(crate) struct ScriptedRenderer {
    scripts: HashMap<String, Script>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl ScriptedRenderer {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn page(mut self, url: &str, html: impl Into<String>) -> Self {
        self.scripts.insert(url.to_string(), Script::Html(html.into()));
        self
    }

    pub(crate) fn fail(mut self, url: &str, message: &str) -> Self {
        self.scripts.insert(url.to_string(), Script::Fail(message.to_string()));
        self
    }

    /// Never finishes on its own; resolves to a timeout error.
    pub(crate) fn hang(mut self, url: &str) -> Self {
        self.scripts.insert(url.to_string(), Script::Hang);
        self
    }

    pub(crate) fn delayed(mut self, url: &str, delay: Duration, html: impl Into<String>) -> Self {
        self.scripts
            .insert(url.to_string(), Script::Delayed(delay, html.into()));
        self
    }

    /// URLs rendered so far, in call order.
    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

impl PageRenderer for ScriptedRenderer {
    async fn render(&self, url: &str, timeout: Duration) -> Result<String> {
        self.calls.lock().unwrap().push(url.to_string());
        match self.scripts.get(url).cloned() {
            Some(Script::Html(html)) => Ok(html),
            Some(Script::Fail(message)) => Err(SitemdError::render(url, message)),
            Some(Script::Hang) => {
                tokio::time::sleep(timeout).await;
                Err(SitemdError::render(
                    url,
                    format!("navigation timed out after {}ms", timeout.as_millis()),
                ))
            }
            Some(Script::Delayed(delay, html)) => {
                tokio::time::sleep(delay).await;
                Ok(html)
            }
            None => Err(SitemdError::render(url, "no script for url")),
        }
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// A page with navigation chrome and enough article text to pass extraction.
pub(crate) fn article(title: &str) -> String {
    format!(
        r#"<html><head><title>{title} | Example Docs</title></head><body>
        <nav><a href="/">Site navigation</a></nav>
        <main>
          <h1>{title}</h1>
          <p>This page explains {title} in enough detail to be worth keeping, with
          several sentences of prose, a few commas, and a link to <a href="/guide/">the guide</a>.</p>
          <p>A second paragraph makes sure the extractor sees a real article body.</p>
        </main>
        <footer>Copyright Example</footer>
        </body></html>"#
    )
}

/// Fresh empty directory under the system temp dir.
pub(crate) fn temp_dir() -> PathBuf {
    let dir = std::env::temp_dir().join(format!("sitemd-core-test-{}", uuid::Uuid::now_v7()));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}
