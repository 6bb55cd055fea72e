//! Rendered HTML to page Markdown.
//!
//! Two steps, kept separate so the caller can apply its own threshold in
//! between:
//! 1. [`extract`] finds the main content region and measures it
//! 2. [`to_markdown`] converts that region with `htmd` and cleans the result

mod cleanup;
pub mod extract;

use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, instrument};
use url::Url;

use sitemd_shared::{Result, SitemdError};

pub use extract::{ContentSource, ExtractOptions, ExtractedDocument, extract};

/// Tags the converter drops entirely.
const SKIPPED_TAGS: &[&str] = &["script", "style", "nav", "iframe", "noscript", "svg", "button"];

/// Options for Markdown conversion.
#[derive(Debug, Clone, Default)]
pub struct ConvertOptions {
    /// Page URL; relative links are resolved against it.
    pub source_url: String,
    /// Prepend a YAML frontmatter block.
    pub frontmatter: bool,
    /// RFC 3339 timestamp for the `fetched_at` frontmatter field.
    pub fetched_at: Option<String>,
}

/// A converted page.
#[derive(Debug, Clone)]
pub struct ConvertResult {
    /// Final document text, ending in a single newline.
    pub markdown: String,
    /// Title from extraction, else the first Markdown H1.
    pub title: Option<String>,
    /// Approximate word count outside code blocks.
    pub word_count: usize,
}

/// Convert an extracted content region to Markdown.
#[instrument(skip_all, fields(url = %opts.source_url))]
pub fn to_markdown(doc: &ExtractedDocument, opts: &ConvertOptions) -> Result<ConvertResult> {
    let (html, tables) = lift_tables(&doc.content_html);

    let converter = htmd::HtmlToMarkdown::builder()
        .skip_tags(SKIPPED_TAGS.to_vec())
        .build();
    let raw = converter
        .convert(&html)
        .map_err(|e| SitemdError::Conversion(format!("htmd conversion failed: {e}")))?;
    let raw = restore_tables(raw, &tables);

    let base_url = Url::parse(&opts.source_url).ok();
    let body = cleanup::run(&raw, base_url.as_ref());

    let title = doc.title.clone().or_else(|| first_h1(&body));
    let word_count = count_words(&body);

    let markdown = if opts.frontmatter {
        let fm = frontmatter(&opts.source_url, title.as_deref(), opts.fetched_at.as_deref());
        format!("{fm}\n{body}")
    } else {
        body
    };

    debug!(word_count, bytes = markdown.len(), "markdown ready");

    Ok(ConvertResult {
        markdown,
        title,
        word_count,
    })
}

// ---------------------------------------------------------------------------
// Tables
// ---------------------------------------------------------------------------

static TABLE_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("table").expect("table selector"));
static ROW_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("tr").expect("tr selector"));
static CELL_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("th, td").expect("cell selector"));

/// Swap each outermost `<table>` for a placeholder paragraph and return the
/// pipe tables to put back after conversion. The converter collapses
/// whitespace in text, so tables cannot travel through it as text.
fn lift_tables(html: &str) -> (String, Vec<String>) {
    let fragment = Html::parse_fragment(html);
    let mut result = html.to_string();
    let mut tables = Vec::new();

    // Nested tables are flattened into their parent's cell text.
    for table in fragment
        .select(&TABLE_SEL)
        .filter(|t| !t.ancestors().filter_map(ElementRef::wrap).any(|a| a.value().name() == "table"))
    {
        let outer = table.html();
        if !result.contains(&outer) {
            continue;
        }
        let token = table_token(tables.len());
        result = result.replacen(&outer, &format!("<p>{token}</p>"), 1);
        tables.push(pipe_table(&table));
    }
    (result, tables)
}

fn restore_tables(mut md: String, tables: &[String]) -> String {
    for (i, table) in tables.iter().enumerate() {
        md = md.replacen(&table_token(i), table.trim(), 1);
    }
    md
}

fn table_token(index: usize) -> String {
    format!("SITEMDTABLE{index}X")
}

fn pipe_table(table: &ElementRef<'_>) -> String {
    let mut rows: Vec<(bool, Vec<String>)> = table
        .select(&ROW_SEL)
        .map(|tr| {
            let is_header = tr.select(&CELL_SEL).all(|c| c.value().name() == "th");
            let cells = tr.select(&CELL_SEL).map(|c| cell_text(&c)).collect::<Vec<_>>();
            (is_header, cells)
        })
        .filter(|(_, cells)| !cells.is_empty())
        .collect();

    let width = rows.iter().map(|(_, cells)| cells.len()).max().unwrap_or(0);
    if width == 0 {
        return String::new();
    }
    for (_, cells) in &mut rows {
        cells.resize(width, String::new());
    }

    // A table without a header row gets an empty one so it stays valid Markdown.
    let header = if rows[0].0 {
        rows.remove(0).1
    } else {
        vec![String::new(); width]
    };

    let line = |cells: &[String]| format!("| {} |\n", cells.join(" | "));
    let mut md = String::new();
    md.push_str(&line(&header));
    md.push_str(&line(&vec!["---".to_string(); width]));
    for (_, cells) in &rows {
        md.push_str(&line(cells));
    }
    md
}

fn cell_text(cell: &ElementRef<'_>) -> String {
    cell.text()
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .replace('|', "\\|")
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn first_h1(md: &str) -> Option<String> {
    static H1_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"(?m)^# (.+)$").expect("valid regex"));
    H1_RE.captures(md).map(|c| c[1].trim().to_string())
}

fn count_words(md: &str) -> usize {
    static FENCE_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"(?s)```.*?```").expect("valid regex"));
    FENCE_RE
        .replace_all(md, "")
        .split_whitespace()
        .filter(|w| !w.chars().all(|c| c == '#' || c == '-' || c == '|'))
        .count()
}

fn frontmatter(source_url: &str, title: Option<&str>, fetched_at: Option<&str>) -> String {
    let mut fm = String::from("---\n");
    fm.push_str(&format!("source_url: \"{}\"\n", yaml_escape(source_url)));
    if let Some(title) = title {
        fm.push_str(&format!("title: \"{}\"\n", yaml_escape(title)));
    }
    if let Some(ts) = fetched_at {
        fm.push_str(&format!("fetched_at: \"{ts}\"\n"));
    }
    fm.push_str("---\n");
    fm
}

fn yaml_escape(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}
