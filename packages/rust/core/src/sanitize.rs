//! URL to output filename.

use std::sync::LazyLock;

use regex::Regex;

use sitemd_shared::FilenameMode;

/// Longest stem kept before the `.md` extension.
pub const MAX_STEM_LEN: usize = 100;

/// Stem used when nothing survives sanitizing.
pub const DEFAULT_STEM: &str = "index";

static UNSAFE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-zA-Z0-9_.-]").expect("valid regex"));

/// Map a page URL to a filesystem-safe Markdown filename.
///
/// Total and pure: the result always matches `^[a-zA-Z0-9_.-]{1,100}\.md$`.
/// Different URLs may map to the same name; no collision handling is done.
///
/// ```
/// use sitemd_core::sanitize::sanitize;
/// use sitemd_shared::FilenameMode;
///
/// assert_eq!(
///     sanitize("https://example.com/docs/page-one", FilenameMode::Compat),
///     "examplecom_docs_page-one.md"
/// );
/// ```
pub fn sanitize(url: &str, mode: FilenameMode) -> String {
    let rest = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))
        .unwrap_or(url);

    let underscored = rest.replace('/', "_");
    let undotted = match mode {
        FilenameMode::Compat => underscored.replacen('.', "", 1),
        FilenameMode::Corrected => underscored.replace('.', ""),
    };

    // Only ASCII survives, so byte and char lengths agree.
    let mut stem = UNSAFE_RE.replace_all(&undotted, "").into_owned();
    stem.truncate(MAX_STEM_LEN);

    if stem.len() > 1 && (stem.ends_with('.') || stem.ends_with('_')) {
        stem.pop();
    }
    if stem.is_empty() {
        stem = DEFAULT_STEM.to_string();
    }

    format!("{stem}.md")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compat(url: &str) -> String {
        sanitize(url, FilenameMode::Compat)
    }

    fn assert_well_formed(name: &str) {
        static SHAPE_RE: LazyLock<Regex> =
            LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9_.-]{1,100}\.md$").unwrap());
        assert!(SHAPE_RE.is_match(name), "malformed filename: {name:?}");
        let stem = name.strip_suffix(".md").unwrap();
        if stem.len() > 1 {
            assert!(!stem.ends_with('_') && !stem.ends_with('.'), "trailing separator: {name:?}");
        }
    }

    #[test]
    fn documented_example() {
        assert_eq!(compat("https://example.com/docs/page-one"), "examplecom_docs_page-one.md");
    }

    #[test]
    fn scheme_does_not_matter() {
        assert_eq!(compat("https://a.b/c"), compat("http://a.b/c"));
        assert_eq!(compat("http://a.b/c"), "ab_c.md");
    }

    #[test]
    fn compat_removes_only_first_dot() {
        assert_eq!(compat("https://docs.example.com/v1.2/intro"), "docsexample.com_v1.2_intro.md");
    }

    #[test]
    fn corrected_removes_every_dot() {
        assert_eq!(
            sanitize("https://docs.example.com/v1.2/intro", FilenameMode::Corrected),
            "docsexamplecom_v12_intro.md"
        );
    }

    #[test]
    fn trailing_slash_is_dropped() {
        assert_eq!(compat("https://example.com/guide/"), "examplecom_guide.md");
    }

    #[test]
    fn only_one_trailing_separator_is_dropped() {
        assert_eq!(compat("https://example.com/a//"), "examplecom_a_.md");
    }

    #[test]
    fn query_and_fragment_characters_removed() {
        assert_eq!(compat("https://example.com/search?q=rust&p=2#top"), "examplecom_searchqrustp2top.md");
    }

    #[test]
    fn non_ascii_removed() {
        assert_eq!(compat("https://example.com/café/naïve"), "examplecom_caf_nave.md");
    }

    #[test]
    fn empty_inputs_use_default_stem() {
        assert_eq!(compat(""), "index.md");
        assert_eq!(compat("https://"), "index.md");
        assert_eq!(compat("https://???"), "index.md");
    }

    #[test]
    fn single_separator_is_kept() {
        // The trailing rule only applies to stems longer than one character.
        assert_eq!(compat("https:///"), "_.md");
    }

    #[test]
    fn long_urls_truncated_to_limit() {
        let url = format!("https://example.com/{}", "a".repeat(300));
        let name = compat(&url);
        assert_eq!(name.len(), MAX_STEM_LEN + ".md".len());
        assert_well_formed(&name);
    }

    #[test]
    fn truncation_then_trailing_rule() {
        // 99 chars of stem followed by '_' at position 100.
        let url = format!("https://{}/x", "b".repeat(99));
        let name = compat(&url);
        assert_eq!(name, format!("{}.md", "b".repeat(99)));
    }

    #[test]
    fn outputs_are_always_well_formed() {
        let inputs = [
            "https://example.com",
            "https://example.com/",
            "http://localhost:8080/a/b/c.html",
            "ftp://weird.host/path",
            "https://example.com/%E2%9C%93/check",
            "https://example.com/..../x",
            "https://example.com/___x",
            "  spaced  url  ",
            ".",
            "_",
            "/",
            "-",
        ];
        for mode in [FilenameMode::Compat, FilenameMode::Corrected] {
            for input in inputs {
                assert_well_formed(&sanitize(input, mode));
            }
        }
    }
}
