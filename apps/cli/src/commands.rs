//! CLI definition, config merging, tracing setup and the run driver.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use clap::error::ErrorKind;
use color_eyre::eyre::Result;
use indicatif::{ProgressBar, ProgressStyle};
use sitemd_core::{PageOutcome, ProgressReporter, RunSummary};
use sitemd_crawler::{ChromeRenderer, HttpRenderer, PageRenderer, RendererKind};
use sitemd_shared::{
    AppConfig, BrowserSettings, FilenameMode, RunConfig, SkipReason, load_config, load_config_from,
};
use tracing::{info, warn};

/// Exit status for invalid invocations and timed-out runs.
const EXIT_FAILURE: u8 = 1;

/// Exit status after Ctrl-C (128 + SIGINT).
const EXIT_INTERRUPTED: u8 = 130;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// sitemd: mirror every page listed in a sitemap as Markdown.
#[derive(Parser, Debug)]
#[command(
    name = "sitemd",
    version,
    about = "Render every page listed in a sitemap and save its main content as Markdown.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Sitemap or sitemap index URL.
    #[arg(value_name = "SITEMAP_URL")]
    pub url: String,

    /// Output directory for Markdown files.
    #[arg(short, long, value_name = "DIR")]
    pub out: Option<PathBuf>,

    /// Per-page navigation timeout in milliseconds.
    #[arg(long, value_name = "MS")]
    pub nav_timeout_ms: Option<u64>,

    /// Minimum extracted characters for a page to be written.
    #[arg(long, value_name = "N")]
    pub min_chars: Option<usize>,

    /// Pages rendered at the same time.
    #[arg(short = 'j', long, value_name = "N")]
    pub concurrency: Option<usize>,

    /// Filename dot handling: compat (first dot removed) or corrected (all dots removed).
    #[arg(long, value_name = "MODE")]
    pub filename_mode: Option<FilenameMode>,

    /// Prepend YAML frontmatter (source_url, title, fetched_at).
    #[arg(long)]
    pub frontmatter: bool,

    /// Maximum sitemap index nesting depth.
    #[arg(long, value_name = "N")]
    pub max_depth: Option<usize>,

    /// Timeout for each sitemap request, in seconds.
    #[arg(long, value_name = "S")]
    pub sitemap_timeout_secs: Option<u64>,

    /// Stop the whole run after this many seconds.
    #[arg(long, value_name = "S")]
    pub run_timeout_secs: Option<u64>,

    /// Page renderer: chrome (headless Chromium) or http (no script execution).
    #[arg(long, default_value = "chrome", value_name = "RENDERER")]
    pub renderer: RendererKind,

    /// Chrome/Chromium executable (auto-detected when omitted).
    #[arg(long, value_name = "PATH")]
    pub chrome: Option<PathBuf>,

    /// Launch Chromium without its sandbox (needed in some containers).
    #[arg(long)]
    pub no_sandbox: bool,

    /// Config file (defaults to ~/.sitemd/sitemd.toml when present).
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Log format: text (default) or json.
    #[arg(long, default_value = "text")]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Parse arguments; any usage error prints clap's message and exits 1.
pub(crate) fn parse_args() -> Cli {
    match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => e.exit(),
        Err(e) => {
            let _ = e.print();
            std::process::exit(i32::from(EXIT_FAILURE));
        }
    }
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags. `RUST_LOG` overrides `-v`.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "sitemd=info",
        1 => "sitemd=debug",
        _ => "sitemd=trace",
    };

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    // Logs go to stderr so the summary on stdout stays clean.
    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Config merging
// ---------------------------------------------------------------------------

/// Apply CLI flags over the loaded config file.
pub(crate) fn merge_config(cli: &Cli, app: AppConfig) -> (RunConfig, BrowserSettings) {
    let AppConfig { mut run, mut browser } = app;

    if let Some(out) = &cli.out {
        run.output_dir = out.clone();
    }
    if let Some(ms) = cli.nav_timeout_ms {
        run.nav_timeout_ms = ms;
    }
    if let Some(n) = cli.min_chars {
        run.min_extract_chars = n;
    }
    if let Some(n) = cli.concurrency {
        run.concurrency = n;
    }
    if let Some(mode) = cli.filename_mode {
        run.filename_mode = mode;
    }
    if cli.frontmatter {
        run.frontmatter = true;
    }
    if let Some(depth) = cli.max_depth {
        run.max_sitemap_depth = depth;
    }
    if let Some(secs) = cli.sitemap_timeout_secs {
        run.sitemap_timeout_secs = secs;
    }
    if let Some(secs) = cli.run_timeout_secs {
        run.run_timeout_secs = Some(secs);
    }

    if let Some(chrome) = &cli.chrome {
        browser.chrome_executable = Some(chrome.clone());
    }
    if cli.no_sandbox {
        browser.no_sandbox = true;
    }

    (run, browser)
}

// ---------------------------------------------------------------------------
// Run
// ---------------------------------------------------------------------------

/// How a run ended.
enum RunEnd {
    Finished(RunSummary),
    Interrupted,
    TimedOut(u64),
}

/// Load config, build the renderer and drive the run to completion.
pub(crate) async fn run(cli: Cli) -> Result<ExitCode> {
    let app = match &cli.config {
        Some(path) => load_config_from(path)?,
        None => load_config()?,
    };
    let (config, browser) = merge_config(&cli, app);
    config.validate()?;

    info!(
        url = %cli.url,
        out = %config.output_dir.display(),
        concurrency = config.concurrency,
        renderer = ?cli.renderer,
        "starting run"
    );

    let progress = CliProgress::new();
    let end = match cli.renderer {
        RendererKind::Chrome => {
            drive(&cli.url, &config, ChromeRenderer::new(browser), &progress).await?
        }
        RendererKind::Http => drive(&cli.url, &config, HttpRenderer::new()?, &progress).await?,
    };

    match end {
        RunEnd::Finished(summary) => {
            print_summary(&cli.url, &config, &summary);
            Ok(ExitCode::SUCCESS)
        }
        RunEnd::Interrupted => {
            progress.abandon();
            warn!("interrupted, stopping run");
            eprintln!("Interrupted.");
            Ok(ExitCode::from(EXIT_INTERRUPTED))
        }
        RunEnd::TimedOut(secs) => {
            progress.abandon();
            warn!(run_timeout_secs = secs, "run timeout reached, stopping run");
            eprintln!("Run timed out after {secs}s.");
            Ok(ExitCode::from(EXIT_FAILURE))
        }
    }
}

/// Run to completion unless Ctrl-C or the run timeout comes first.
///
/// Dropping the run future on either signal tears down any in-flight
/// browser sessions.
async fn drive<R: PageRenderer>(
    url: &str,
    config: &RunConfig,
    renderer: R,
    progress: &CliProgress,
) -> Result<RunEnd> {
    let run = sitemd_core::run(url, config, renderer, progress);
    let bounded = async {
        match config.run_timeout_secs {
            Some(secs) => tokio::time::timeout(Duration::from_secs(secs), run)
                .await
                .map_err(|_| secs),
            None => Ok(run.await),
        }
    };

    tokio::select! {
        result = bounded => match result {
            Ok(summary) => Ok(RunEnd::Finished(summary?)),
            Err(secs) => Ok(RunEnd::TimedOut(secs)),
        },
        _ = tokio::signal::ctrl_c() => Ok(RunEnd::Interrupted),
    }
}

fn print_summary(url: &str, config: &RunConfig, summary: &RunSummary) {
    println!();
    if summary.discovered == 0 {
        println!("  No URLs found in {url}");
        if summary.sitemap_failures > 0 {
            println!("  ({} sitemap(s) failed, see log)", summary.sitemap_failures);
        }
        println!();
        return;
    }

    println!("  Sitemap:  {url}");
    println!(
        "  Found:    {} page(s), {} sitemap failure(s)",
        summary.discovered, summary.sitemap_failures
    );
    println!(
        "  Written:  {} to {}",
        summary.written,
        config.output_dir.display()
    );
    if !summary.skipped.is_empty() {
        let reasons = [
            SkipReason::Render,
            SkipReason::LowContent,
            SkipReason::Extraction,
            SkipReason::Conversion,
        ]
        .into_iter()
        .filter_map(|r| match summary.skipped_for(r) {
            0 => None,
            n => Some(format!("{r} {n}")),
        })
        .collect::<Vec<_>>()
        .join(", ");
        println!("  Skipped:  {} ({reasons})", summary.skipped.len());
    }
    println!("  Time:     {:.1}s", summary.elapsed.as_secs_f64());
    println!();
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// Spinner while sitemaps resolve, then a bar over the discovered pages.
struct CliProgress {
    bar: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        bar.enable_steady_tick(Duration::from_millis(80));
        Self { bar }
    }

    fn switch_to_bar(&self, total: usize) {
        if self.bar.length() == Some(total as u64) {
            return;
        }
        self.bar.set_length(total as u64);
        self.bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} [{bar:30.cyan/blue}] {pos}/{len} {wide_msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=> "),
        );
    }

    fn abandon(&self) {
        self.bar.abandon();
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.bar.set_message(name.to_string());
    }

    fn sitemap_fetched(&self, url: &str, entries: usize) {
        self.bar.set_message(format!("Sitemap {url} ({entries} entries)"));
    }

    fn page_started(&self, url: &str, _index: usize, total: usize) {
        self.switch_to_bar(total);
        self.bar.set_message(url.to_string());
    }

    fn page_finished(&self, url: &str, outcome: &PageOutcome, _index: usize, _total: usize) {
        self.bar.inc(1);
        if let PageOutcome::Skipped { reason } = outcome {
            self.bar.println(format!("  skipped {url} ({reason})"));
        }
    }

    fn done(&self, _summary: &RunSummary) {
        self.bar.finish_and_clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> std::result::Result<Cli, clap::Error> {
        Cli::try_parse_from(std::iter::once("sitemd").chain(args.iter().copied()))
    }

    #[test]
    fn requires_exactly_one_url() {
        assert_eq!(
            parse(&[]).unwrap_err().kind(),
            ErrorKind::MissingRequiredArgument
        );
        assert!(parse(&["https://a.test/sitemap.xml", "extra"]).is_err());
        assert_eq!(parse(&["https://a.test/sitemap.xml"]).unwrap().url, "https://a.test/sitemap.xml");
    }

    #[test]
    fn defaults_come_from_config() {
        let cli = parse(&["https://a.test/sitemap.xml"]).unwrap();
        let (run, browser) = merge_config(&cli, AppConfig::default());
        assert_eq!(run.output_dir, PathBuf::from("docs"));
        assert_eq!(run.nav_timeout_ms, 60_000);
        assert_eq!(run.min_extract_chars, 100);
        assert_eq!(run.concurrency, 1);
        assert!(!browser.no_sandbox);
        assert_eq!(cli.renderer, RendererKind::Chrome);
    }

    #[test]
    fn flags_override_config() {
        let cli = parse(&[
            "-o", "out", "--nav-timeout-ms", "5000", "--min-chars", "20", "-j", "4",
            "--filename-mode", "corrected", "--frontmatter", "--max-depth", "3",
            "--run-timeout-secs", "600", "--renderer", "http", "--no-sandbox",
            "https://a.test/sitemap.xml",
        ])
        .unwrap();

        let mut app = AppConfig::default();
        app.run.concurrency = 2;
        app.run.min_extract_chars = 300;
        let (run, browser) = merge_config(&cli, app);

        assert_eq!(run.output_dir, PathBuf::from("out"));
        assert_eq!(run.nav_timeout_ms, 5000);
        assert_eq!(run.min_extract_chars, 20);
        assert_eq!(run.concurrency, 4);
        assert_eq!(run.filename_mode, FilenameMode::Corrected);
        assert!(run.frontmatter);
        assert_eq!(run.max_sitemap_depth, 3);
        assert_eq!(run.run_timeout_secs, Some(600));
        assert!(browser.no_sandbox);
        assert_eq!(cli.renderer, RendererKind::Http);
    }

    #[test]
    fn config_values_survive_without_flags() {
        let cli = parse(&["https://a.test/sitemap.xml"]).unwrap();
        let mut app = AppConfig::default();
        app.run.concurrency = 3;
        app.run.frontmatter = true;
        let (run, _) = merge_config(&cli, app);
        assert_eq!(run.concurrency, 3);
        assert!(run.frontmatter);
    }

    #[test]
    fn rejects_unknown_filename_mode() {
        assert!(parse(&["--filename-mode", "lossy", "https://a.test/s.xml"]).is_err());
    }
}
