//! sitemd: sitemap to Markdown.
//!
//! Resolves a sitemap (or sitemap index) into page URLs, renders each page in
//! headless Chromium, extracts the main content and writes it to
//! `docs/<sanitized-url>.md`.

mod commands;

use std::process::ExitCode;

use color_eyre::eyre::Result;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    color_eyre::install()?;
    let cli = commands::parse_args();
    commands::init_tracing(&cli);
    commands::run(cli).await
}
