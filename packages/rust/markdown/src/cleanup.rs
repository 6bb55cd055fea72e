//! Post-conversion cleanup for page Markdown.
//!
//! Passes run in order over the whole document. Every pass that rewrites
//! lines skips fenced code blocks, which are kept byte for byte.

use std::sync::LazyLock;

use regex::{Captures, Regex};
use url::Url;

/// Run every cleanup pass on raw converter output.
pub(crate) fn run(md: &str, base_url: Option<&Url>) -> String {
    let md = demote_extra_h1(md);
    let md = fix_fence_languages(&md);
    let md = outside_fences(&md, strip_wrapper_tags);
    let md = outside_fences(&md, drop_permalink_anchors);
    let md = outside_fences(&md, |line| absolutize_links(line, base_url));
    let md = trim_line_ends(&md);
    let md = collapse_blank_lines(&md);
    finish(&md)
}

/// Apply `f` to every line that is not inside a fenced code block.
fn outside_fences(md: &str, mut f: impl FnMut(&str) -> String) -> String {
    let mut in_fence = false;
    md.lines()
        .map(|line| {
            if line.trim_start().starts_with("```") {
                in_fence = !in_fence;
                line.to_string()
            } else if in_fence {
                line.to_string()
            } else {
                f(line)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Keep the first H1; later ones become H2.
fn demote_extra_h1(md: &str) -> String {
    let mut seen_h1 = false;
    outside_fences(md, |line| match line.strip_prefix("# ") {
        Some(text) if seen_h1 => format!("## {text}"),
        Some(_) => {
            seen_h1 = true;
            line.to_string()
        }
        None => line.to_string(),
    })
}

/// `language-js`, `lang-js` and `highlight-js` fence hints become `js`.
fn fix_fence_languages(md: &str) -> String {
    static FENCE_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"(?m)^(\s*)```(?:language-|lang-|highlight-)([\w+#-]+)").expect("valid regex")
    });
    FENCE_RE.replace_all(md, "$1```$2").into_owned()
}

/// Remove layout-only tags the converter passed through, keeping their text.
fn strip_wrapper_tags(line: &str) -> String {
    static WRAPPER_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(
            r"</?(?:div|span|section|article|header|figure|figcaption|details|summary|main|font|center)(?:\s[^>]*)?/?>",
        )
        .expect("valid regex")
    });
    WRAPPER_RE.replace_all(line, "").into_owned()
}

/// Drop empty links such as heading permalinks (`[](#intro)`, `[#](#intro)`, `[¶](#intro)`).
fn drop_permalink_anchors(line: &str) -> String {
    static ANCHOR_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"\s*\[(?:|#|¶|\u{200B})\]\([^)]*\)").expect("valid regex")
    });
    ANCHOR_RE.replace_all(line, "").into_owned()
}

/// Resolve relative link targets against the page URL. Images, anchors and
/// absolute targets are left alone.
fn absolutize_links(line: &str, base_url: Option<&Url>) -> String {
    static LINK_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"(!?)\[([^\]]*)\]\(([^)\s]+)\)").expect("valid regex"));

    let Some(base) = base_url else {
        return line.to_string();
    };

    LINK_RE
        .replace_all(line, |caps: &Captures| {
            let (bang, text, href) = (&caps[1], &caps[2], &caps[3]);
            if !bang.is_empty() || href.starts_with('#') || has_scheme(href) {
                return caps[0].to_string();
            }
            match base.join(href) {
                Ok(resolved) => format!("[{text}]({resolved})"),
                Err(_) => caps[0].to_string(),
            }
        })
        .into_owned()
}

fn has_scheme(href: &str) -> bool {
    Url::parse(href).is_ok()
}

fn trim_line_ends(md: &str) -> String {
    outside_fences(md, |line| line.trim_end().to_string())
}

/// At most one blank line between blocks. Blank lines in code are kept.
fn collapse_blank_lines(md: &str) -> String {
    let mut in_fence = false;
    let mut blank_run = 0;
    let mut kept = Vec::new();
    for line in md.lines() {
        if line.trim_start().starts_with("```") {
            in_fence = !in_fence;
        }
        if !in_fence && line.is_empty() {
            blank_run += 1;
            if blank_run > 1 {
                continue;
            }
        } else {
            blank_run = 0;
        }
        kept.push(line);
    }
    kept.join("\n")
}

/// No leading blank lines, exactly one trailing newline.
fn finish(md: &str) -> String {
    let body = md.trim_start_matches('\n').trim_end_matches('\n');
    format!("{body}\n")
}
