//! Main-content extraction.
//!
//! Locates the primary readable region of a rendered page and strips site
//! chrome from it. Candidates are tried in order, each accepted only if it
//! carries at least `min_chars` of text:
//! 1. Known content containers (documentation generators, `article`, `main`)
//! 2. The block element with the densest paragraph text
//! 3. The whole `<body>` (relaxed fallback)
//!
//! The resulting character count is reported so callers can tell a real
//! article from a near-empty page.

use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};
use tracing::debug;

use sitemd_shared::{Result, SitemdError};

/// Content containers tried before scoring, most specific first.
const CONTENT_SELECTORS: &[&str] = &[
    "article .markdown",   // Docusaurus
    ".vp-doc",             // VitePress
    ".markdown-section",   // GitBook / docsify
    ".rst-content [role=\"main\"]", // ReadTheDocs
    "[role=\"main\"]",
    "article",
    "main",
    "#content",
    ".content",
];

/// Elements removed from the chosen region before conversion.
const CHROME_SELECTOR: &str = "nav, footer, aside, script, style, noscript, form, \
     iframe, [role=\"navigation\"], [aria-hidden=\"true\"], .sidebar, .nav, .toc, .breadcrumbs";

/// Paragraph-like children shorter than this don't count toward a block's score.
const MIN_PARAGRAPH_CHARS: usize = 25;

/// Options for content extraction.
#[derive(Debug, Clone)]
pub struct ExtractOptions {
    /// Text shorter than this means "no meaningful article found here".
    pub min_chars: usize,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self { min_chars: 100 }
    }
}

/// Where the extracted content came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentSource {
    /// A known container matched (the selector is recorded).
    Selector(&'static str),
    /// The highest-scoring block element.
    Scored,
    /// The whole body.
    Body,
}

/// Output of main-content extraction.
#[derive(Debug, Clone)]
pub struct ExtractedDocument {
    /// Content root serialized as HTML, chrome removed.
    pub content_html: String,
    /// Page title: first `<h1>`, else `<title>`.
    pub title: Option<String>,
    /// Whitespace-collapsed character count of the content text.
    pub char_count: usize,
    /// Which strategy produced the content.
    pub source: ContentSource,
}

impl ExtractedDocument {
    /// Whether the content reached the given threshold.
    pub fn meets(&self, min_chars: usize) -> bool {
        self.char_count >= min_chars
    }
}

static CONTENT_SELS: LazyLock<Vec<(&'static str, Selector)>> = LazyLock::new(|| {
    CONTENT_SELECTORS
        .iter()
        .map(|s| (*s, Selector::parse(s).expect("content selector")))
        .collect()
});
static CHROME_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(CHROME_SELECTOR).expect("chrome selector"));
static BLOCK_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div, section, td").expect("block selector"));
static BODY_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("body").expect("body selector"));
static H1_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("h1").expect("h1 selector"));
static TITLE_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("title").expect("title selector"));

/// Extract the main content of a rendered HTML page.
///
/// Never fails for "too little text": the count is reported and the caller
/// decides. Fails only when the document has no body to fall back on.
pub fn extract(html: &str, opts: &ExtractOptions) -> Result<ExtractedDocument> {
    let doc = Html::parse_document(html);
    let title = extract_title(&doc);

    for (sel_str, selector) in CONTENT_SELS.iter() {
        let sel_str: &'static str = *sel_str;
        if let Some(el) = doc.select(selector).next() {
            let candidate = build(&el, title.clone(), ContentSource::Selector(sel_str));
            if candidate.meets(opts.min_chars) {
                debug!(selector = sel_str, chars = candidate.char_count, "content container matched");
                return Ok(candidate);
            }
        }
    }

    if let Some(el) = best_scored_block(&doc) {
        let candidate = build(&el, title.clone(), ContentSource::Scored);
        if candidate.meets(opts.min_chars) {
            debug!(chars = candidate.char_count, "scored block selected");
            return Ok(candidate);
        }
    }

    let body = doc
        .select(&BODY_SEL)
        .next()
        .ok_or_else(|| SitemdError::Extraction("document has no <body>".into()))?;
    let candidate = build(&body, title, ContentSource::Body);
    debug!(chars = candidate.char_count, "falling back to body");
    Ok(candidate)
}

fn build(el: &ElementRef<'_>, title: Option<String>, source: ContentSource) -> ExtractedDocument {
    let content_html = strip_chrome(&el.inner_html());
    let char_count = text_len(&content_html);
    ExtractedDocument {
        content_html,
        title,
        char_count,
        source,
    }
}

/// First `<h1>` text, else the `<title>` text.
fn extract_title(doc: &Html) -> Option<String> {
    [&*H1_SEL, &*TITLE_SEL].into_iter().find_map(|sel| {
        doc.select(sel)
            .next()
            .map(|el| collapse_whitespace(&el.text().collect::<String>()))
            .filter(|t| !t.is_empty())
    })
}

/// Pick the block element whose direct paragraph-like children carry the most text.
fn best_scored_block<'a>(doc: &'a Html) -> Option<ElementRef<'a>> {
    doc.select(&BLOCK_SEL)
        .filter_map(|el| {
            let score = block_score(&el);
            (score > 0).then_some((score, el))
        })
        .max_by_key(|(score, _)| *score)
        .map(|(_, el)| el)
}

/// Paragraph text length plus one point per comma, over direct children only.
fn block_score(el: &ElementRef<'_>) -> usize {
    el.children()
        .filter_map(ElementRef::wrap)
        .filter(|child| matches!(child.value().name(), "p" | "pre" | "blockquote" | "ul" | "ol"))
        .map(|child| {
            let text = collapse_whitespace(&child.text().collect::<String>());
            let len = text.chars().count();
            if len < MIN_PARAGRAPH_CHARS {
                0
            } else {
                len + text.matches(',').count()
            }
        })
        .sum()
}

/// Remove navigation, scripts and similar chrome from an HTML fragment.
fn strip_chrome(html: &str) -> String {
    let fragment = Html::parse_fragment(html);
    let mut result = html.to_string();
    for el in fragment.select(&CHROME_SEL) {
        let outer = el.html();
        if !outer.is_empty() {
            result = result.replace(&outer, "");
        }
    }
    result
}

/// Whitespace-collapsed text length of an HTML fragment.
fn text_len(html: &str) -> usize {
    let fragment = Html::parse_fragment(html);
    let text: String = fragment.root_element().text().collect();
    collapse_whitespace(&text).chars().count()
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}
