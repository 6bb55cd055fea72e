//! XML tree building and sitemap classification.
//!
//! `quick-xml` events are folded into a small element tree, then the tree's
//! root is classified as a `<urlset>` or a `<sitemapindex>` per
//! <https://www.sitemaps.org/protocol.html>:
//! - `<urlset>` → `<url><loc>page</loc></url>` entries
//! - `<sitemapindex>` → `<sitemap><loc>child sitemap</loc></sitemap>` entries

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use sitemd_shared::{PageUrl, Result, SitemdError};
use tracing::debug;

// ---------------------------------------------------------------------------
// XML tree
// ---------------------------------------------------------------------------

/// One element of a parsed XML document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct XmlElement {
    /// Local name (namespace prefix stripped).
    pub name: String,
    /// Attributes as (local name, unescaped value) pairs.
    pub attributes: Vec<(String, String)>,
    /// Concatenated text and CDATA directly inside this element.
    pub text: String,
    /// Child elements in document order.
    pub children: Vec<XmlElement>,
}

impl XmlElement {
    fn from_start(start: &BytesStart<'_>) -> std::result::Result<Self, String> {
        let name = String::from_utf8_lossy(start.local_name().as_ref()).into_owned();
        let mut attributes = Vec::new();
        for attr in start.attributes() {
            let attr = attr.map_err(|e| format!("bad attribute on <{name}>: {e}"))?;
            let key = String::from_utf8_lossy(attr.key.local_name().as_ref()).into_owned();
            let value = attr
                .unescape_value()
                .map_err(|e| format!("bad attribute value on <{name}>: {e}"))?
                .into_owned();
            attributes.push((key, value));
        }
        Ok(Self {
            name,
            attributes,
            ..Self::default()
        })
    }

    /// Iterate over the child group with the given local name.
    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a XmlElement> {
        self.children.iter().filter(move |c| c.name == name)
    }

    /// First child with the given local name.
    pub fn child(&self, name: &str) -> Option<&XmlElement> {
        self.children.iter().find(|c| c.name == name)
    }

    /// The element's text value, whichever form it was written in.
    ///
    /// A leaf may be a bare value (`<loc>https://a</loc>`) or an attributed
    /// node carrying its text alongside attributes
    /// (`<loc xml:lang="en">https://a</loc>`). Both yield the trimmed text.
    /// Empty or whitespace-only text yields `None`.
    pub fn leaf_text(&self) -> Option<&str> {
        let trimmed = self.text.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed)
        }
    }
}

/// Parse XML text into its single root element.
///
/// Fails on malformed markup, mismatched or unclosed tags, more than one root
/// element, or a document without any element.
pub fn parse_xml(xml: &str) -> std::result::Result<XmlElement, String> {
    let xml = xml.trim_start_matches('\u{feff}');
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<XmlElement> = Vec::new();
    let mut root: Option<XmlElement> = None;

    loop {
        let event = reader
            .read_event()
            .map_err(|e| format!("at byte {}: {e}", reader.buffer_position()))?;

        match event {
            Event::Start(ref e) => {
                if stack.is_empty() && root.is_some() {
                    return Err("document has more than one root element".into());
                }
                stack.push(XmlElement::from_start(e)?);
            }
            Event::Empty(ref e) => {
                let element = XmlElement::from_start(e)?;
                attach(&mut stack, &mut root, element)?;
            }
            Event::End(_) => {
                // quick-xml already verified the end name matches.
                let element = stack
                    .pop()
                    .ok_or_else(|| "unexpected closing tag".to_string())?;
                attach(&mut stack, &mut root, element)?;
            }
            Event::Text(ref e) => {
                if let Some(current) = stack.last_mut() {
                    let text = e.unescape().map_err(|e| format!("bad text: {e}"))?;
                    current.text.push_str(&text);
                }
            }
            Event::CData(ref e) => {
                if let Some(current) = stack.last_mut() {
                    current.text.push_str(&String::from_utf8_lossy(e));
                }
            }
            Event::Eof => break,
            // Declarations, comments, processing instructions, doctype
            _ => {}
        }
    }

    if let Some(open) = stack.last() {
        return Err(format!("unexpected end of document inside <{}>", open.name));
    }

    root.ok_or_else(|| "document has no root element".to_string())
}

/// Attach a completed element to its parent, or make it the root.
fn attach(
    stack: &mut [XmlElement],
    root: &mut Option<XmlElement>,
    element: XmlElement,
) -> std::result::Result<(), String> {
    match stack.last_mut() {
        Some(parent) => {
            parent.children.push(element);
            Ok(())
        }
        None if root.is_none() => {
            *root = Some(element);
            Ok(())
        }
        None => Err("document has more than one root element".into()),
    }
}

// ---------------------------------------------------------------------------
// Sitemap classification
// ---------------------------------------------------------------------------

/// The two recognized sitemap document shapes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SitemapDocument {
    /// `<urlset>`: page locations in document order.
    UrlSet(Vec<PageUrl>),
    /// `<sitemapindex>`: child sitemap locations in document order.
    SitemapIndex(Vec<String>),
}

impl SitemapDocument {
    /// Short label for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::UrlSet(_) => "urlset",
            Self::SitemapIndex(_) => "sitemapindex",
        }
    }

    /// Number of entries carried by the document.
    pub fn len(&self) -> usize {
        match self {
            Self::UrlSet(urls) => urls.len(),
            Self::SitemapIndex(children) => children.len(),
        }
    }

    /// Whether the document carries no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Parse and classify a sitemap payload fetched from `url`.
pub fn parse_sitemap(url: &str, xml: &str) -> Result<SitemapDocument> {
    let root = parse_xml(xml).map_err(|msg| SitemdError::sitemap_parse(url, msg))?;
    classify(url, &root)
}

/// Classify a parsed tree by its root element.
pub fn classify(url: &str, root: &XmlElement) -> Result<SitemapDocument> {
    match root.name.as_str() {
        "urlset" => Ok(SitemapDocument::UrlSet(collect_locs(root, "url"))),
        "sitemapindex" => Ok(SitemapDocument::SitemapIndex(collect_locs(root, "sitemap"))),
        other => Err(SitemdError::sitemap_parse(
            url,
            format!("unrecognized root element <{other}>, expected <urlset> or <sitemapindex>"),
        )),
    }
}

/// Collect `<loc>` values of every `entry` child, dropping entries without one.
fn collect_locs(root: &XmlElement, entry: &str) -> Vec<String> {
    root.children_named(entry)
        .filter_map(|e| {
            let loc = e.child("loc").and_then(XmlElement::leaf_text);
            if loc.is_none() {
                debug!(entry, "dropping sitemap entry without <loc>");
            }
            loc.map(str::to_string)
        })
        .collect()
}
