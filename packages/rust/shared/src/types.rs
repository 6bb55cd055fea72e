//! Core domain types shared across sitemd crates.

use serde::{Deserialize, Serialize};

use crate::error::SitemdError;

/// An absolute page URL as listed in a sitemap.
///
/// Identity is the string value; no normalization is performed.
pub type PageUrl = String;

// ---------------------------------------------------------------------------
// FilenameMode
// ---------------------------------------------------------------------------

/// How the filename sanitizer treats dots in a URL.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilenameMode {
    /// Remove only the first `.` (keeps output trees byte-compatible with
    /// earlier runs: `example.com/a.html` → `examplecom_a.html.md`).
    #[default]
    Compat,
    /// Remove every `.` before character filtering.
    Corrected,
}

impl std::fmt::Display for FilenameMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Compat => f.write_str("compat"),
            Self::Corrected => f.write_str("corrected"),
        }
    }
}

impl std::str::FromStr for FilenameMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "compat" => Ok(Self::Compat),
            "corrected" => Ok(Self::Corrected),
            other => Err(format!(
                "invalid filename mode '{other}': expected 'compat' or 'corrected'"
            )),
        }
    }
}

// ---------------------------------------------------------------------------
// SkipReason
// ---------------------------------------------------------------------------

/// Why a page was skipped instead of written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Navigation failed, timed out, or the browser could not be launched.
    Render,
    /// Extraction produced less text than the configured threshold.
    LowContent,
    /// Main-content extraction failed outright.
    Extraction,
    /// HTML-to-Markdown conversion failed.
    Conversion,
}

impl SkipReason {
    /// The skip reason for a page-level error, or `None` if the error is run-fatal
    /// or belongs to another unit of work.
    pub fn for_error(err: &SitemdError) -> Option<Self> {
        match err {
            SitemdError::PageRender { .. } => Some(Self::Render),
            SitemdError::LowContent { .. } => Some(Self::LowContent),
            SitemdError::Extraction(_) => Some(Self::Extraction),
            SitemdError::Conversion(_) => Some(Self::Conversion),
            _ => None,
        }
    }
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Render => "render",
            Self::LowContent => "low-content",
            Self::Extraction => "extraction",
            Self::Conversion => "conversion",
        };
        f.write_str(s)
    }
}
