//! External resource URL discovery in raw HTML and CSS text.

use std::collections::BTreeSet;
use std::sync::OnceLock;

use regex::Regex;

fn external_url_patterns() -> &'static [Regex] {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS
        .get_or_init(|| {
            vec![
                // src="https://..." or src="//..."
                Regex::new(r#"src=["']((?:https?:)?//[^"']+)["']"#).expect("invalid src regex"),
                // <link ... href="https://..."> but not <a href="...">
                Regex::new(r#"<link\b[^>]*\bhref=["']((?:https?:)?//[^"']+)["']"#)
                    .expect("invalid link href regex"),
                // url(https://...) with optional quotes
                Regex::new(r#"url\(["']?((?:https?:)?//[^"')\s]+)["']?\)"#)
                    .expect("invalid css url regex"),
                // @import "https://..."
                Regex::new(r#"@import\s+["']((?:https?:)?//[^"']+)["']"#)
                    .expect("invalid css import regex"),
            ]
        })
        .as_slice()
}

/// Collect every external resource URL referenced by the given HTML or CSS text.
///
/// Matches `src` attributes, `<link href>` elements, CSS `url(...)` functions
/// and CSS `@import` statements, each capturing `http://`, `https://` and
/// protocol-relative `//` values. Anchor `<a href>` navigation links are not
/// resource references and are never matched.
pub fn find_external_urls(content: &str) -> BTreeSet<String> {
    let mut urls = BTreeSet::new();
    for pattern in external_url_patterns() {
        for caps in pattern.captures_iter(content) {
            if let Some(url) = caps.get(1) {
                urls.insert(url.as_str().to_string());
            }
        }
    }
    urls
}

#[cfg(test)]
mod tests {
    use super::find_external_urls;

    #[test]
    fn finds_script_and_image_sources() {
        let html = r#"<script src="https://cdn.example.com/app.js"></script>
                      <img src='//images.example.com/logo.png'>"#;
        let urls = find_external_urls(html);
        assert!(urls.contains("https://cdn.example.com/app.js"));
        assert!(urls.contains("//images.example.com/logo.png"));
        assert_eq!(urls.len(), 2);
    }

    #[test]
    fn finds_link_hrefs_but_not_anchor_hrefs() {
        let html = r#"<link rel="stylesheet" href="https://cdn.example.com/site.css">
                      <a href="https://example.com/page">visit</a>"#;
        let urls = find_external_urls(html);
        assert!(urls.contains("https://cdn.example.com/site.css"));
        assert_eq!(urls.len(), 1);
    }

    #[test]
    fn finds_css_url_functions_and_imports() {
        let css = r#"@import "https://fonts.example.com/face.css";
                     body { background: url(https://cdn.example.com/bg.png); }
                     .q { background: url("//cdn.example.com/q.png"); }"#;
        let urls = find_external_urls(css);
        assert!(urls.contains("https://fonts.example.com/face.css"));
        assert!(urls.contains("https://cdn.example.com/bg.png"));
        assert!(urls.contains("//cdn.example.com/q.png"));
    }

    #[test]
    fn ignores_local_references() {
        let html = r#"<img src="/assets/logo.png"><link href="style.css">"#;
        assert!(find_external_urls(html).is_empty());
    }

    #[test]
    fn collapses_duplicates_across_patterns() {
        let html = r#"<link href="https://cdn.example.com/a.css">
                      <script src="https://cdn.example.com/a.css"></script>"#;
        assert_eq!(find_external_urls(html).len(), 1);
    }
}
