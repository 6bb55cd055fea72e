//! Application configuration for sitemd.
//!
//! User config lives at `~/.sitemd/sitemd.toml` (optional).
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, SitemdError};
use crate::types::FilenameMode;

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "sitemd.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".sitemd";

// ---------------------------------------------------------------------------
// Config structs (matching sitemd.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Resolver and pipeline settings.
    #[serde(default)]
    pub run: RunConfig,

    /// Headless browser settings.
    #[serde(default)]
    pub browser: BrowserSettings,
}

/// `[run]` section, passed explicitly to the resolver and the page pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Directory that receives one Markdown file per page.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Navigation + network-idle budget per page, in milliseconds.
    #[serde(default = "default_nav_timeout_ms")]
    pub nav_timeout_ms: u64,

    /// Extracted text shorter than this is treated as "no article found".
    #[serde(default = "default_min_extract_chars")]
    pub min_extract_chars: usize,

    /// Number of pages rendered at once. `1` processes strictly in order.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Dot handling in output filenames.
    #[serde(default)]
    pub filename_mode: FilenameMode,

    /// Prepend a YAML frontmatter block to each Markdown file.
    #[serde(default)]
    pub frontmatter: bool,

    /// Maximum sitemap-index nesting followed by the resolver.
    #[serde(default = "default_max_sitemap_depth")]
    pub max_sitemap_depth: usize,

    /// HTTP timeout for a single sitemap fetch, in seconds.
    #[serde(default = "default_sitemap_timeout_secs")]
    pub sitemap_timeout_secs: u64,

    /// Overall run deadline in seconds (unbounded when absent).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_timeout_secs: Option<u64>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            nav_timeout_ms: default_nav_timeout_ms(),
            min_extract_chars: default_min_extract_chars(),
            concurrency: default_concurrency(),
            filename_mode: FilenameMode::default(),
            frontmatter: false,
            max_sitemap_depth: default_max_sitemap_depth(),
            sitemap_timeout_secs: default_sitemap_timeout_secs(),
            run_timeout_secs: None,
        }
    }
}

impl RunConfig {
    /// Reject values that would make the run meaningless.
    pub fn validate(&self) -> Result<()> {
        if self.concurrency == 0 {
            return Err(SitemdError::config("concurrency must be at least 1"));
        }
        if self.nav_timeout_ms == 0 {
            return Err(SitemdError::config("nav_timeout_ms must be greater than 0"));
        }
        if self.sitemap_timeout_secs == 0 {
            return Err(SitemdError::config(
                "sitemap_timeout_secs must be greater than 0",
            ));
        }
        if self.output_dir.as_os_str().is_empty() {
            return Err(SitemdError::config("output_dir must not be empty"));
        }
        Ok(())
    }
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("docs")
}
fn default_nav_timeout_ms() -> u64 {
    60_000
}
fn default_min_extract_chars() -> usize {
    100
}
fn default_concurrency() -> usize {
    1
}
fn default_max_sitemap_depth() -> usize {
    16
}
fn default_sitemap_timeout_secs() -> u64 {
    30
}

/// `[browser]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserSettings {
    /// Explicit Chrome/Chromium binary; auto-detected when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chrome_executable: Option<PathBuf>,

    /// Run without a visible window.
    #[serde(default = "default_true")]
    pub headless: bool,

    /// Pass `--no-sandbox` (needed when running as root in containers).
    #[serde(default)]
    pub no_sandbox: bool,

    /// Viewport width in pixels.
    #[serde(default = "default_window_width")]
    pub window_width: u32,

    /// Viewport height in pixels.
    #[serde(default = "default_window_height")]
    pub window_height: u32,
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            chrome_executable: None,
            headless: true,
            no_sandbox: false,
            window_width: default_window_width(),
            window_height: default_window_height(),
        }
    }
}

fn default_true() -> bool {
    true
}
fn default_window_width() -> u32 {
    1280
}
fn default_window_height() -> u32 {
    800
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.sitemd/`).
pub fn config_dir() -> Result<PathBuf> {
    let home =
        dirs::home_dir().ok_or_else(|| SitemdError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.sitemd/sitemd.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = match config_file_path() {
        Ok(path) => path,
        Err(e) => {
            tracing::debug!(error = %e, "no home directory, using default config");
            return Ok(AppConfig::default());
        }
    };

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| SitemdError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| SitemdError::config(format!("failed to parse {}: {e}", path.display())))
}
