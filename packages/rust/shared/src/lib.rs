//! Shared types, error model, and configuration for sitemd.
//!
//! This crate is the foundation depended on by all other sitemd crates.
//! It provides:
//! - [`SitemdError`]: the unified error type
//! - Domain types ([`PageUrl`], [`FilenameMode`], [`SkipReason`])
//! - Configuration ([`AppConfig`], [`RunConfig`], [`BrowserSettings`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, BrowserSettings, RunConfig, config_dir, config_file_path, load_config,
    load_config_from,
};
pub use error::{Result, SitemdError};
pub use types::{FilenameMode, PageUrl, SkipReason};
