//! Run orchestration for sitemd.
//!
//! Ties the sitemap resolver, a page renderer and Markdown conversion into a
//! single run that writes one file per discovered page.

pub mod orchestrator;
pub mod pipeline;
pub mod progress;
pub mod sanitize;

#[cfg(test)]
mod testing;

pub use orchestrator::{RunSummary, SkippedPage, run};
pub use pipeline::{PageOutcome, PagePipeline, PipelineOptions, PreparedPage};
pub use progress::{ProgressReporter, SilentProgress};
pub use sanitize::sanitize;
