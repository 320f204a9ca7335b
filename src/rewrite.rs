//! In-memory reference rewriting for bundled documents.
//!
//! Both transforms are idempotent: a document that already went through a
//! pass comes out unchanged when the pass runs again. Source files on disk
//! are never modified; every rewrite happens on an owned copy of the text.

use std::path::Path;
use std::sync::OnceLock;

use regex::{Captures, Regex};

use crate::external::resolve::UrlMapping;
use crate::report::Diagnostics;
use crate::scan::is_ignored_reference;

/// Position of a document within the site tree during rewriting.
#[derive(Debug, Clone, Copy)]
pub struct RewriteContext<'a> {
    /// Site root used to test `index.html` existence.
    pub root: &'a Path,
    /// Site-relative path of the document being rewritten.
    pub rel_path: &'a str,
    /// Directory depth of the document below the site root.
    pub depth: usize,
}

fn root_relative_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    // A second slash marks a protocol-relative external URL, not a root link.
    PATTERN.get_or_init(|| {
        Regex::new(r#"(href="|src="|url\("|url\()/([^/])"#).expect("invalid root link regex")
    })
}

fn index_link_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r#"(href|src)="((?:\.\./)*[^"]*/)""#).expect("invalid index link regex")
    })
}

/// Apply both HTML rewrites: root-relative prefixing, then index-link repair.
pub fn rewrite_html_content(
    content: &str,
    ctx: &RewriteContext<'_>,
    diagnostics: &mut Diagnostics,
) -> String {
    let content = rewrite_root_relative(content, ctx.depth);
    rewrite_index_links(&content, ctx, diagnostics)
}

/// Convert root-relative references into tree-relative ones.
///
/// Every `href="/…`, `src="/…`, `url(/…` and `url("/…` occurrence is prefixed
/// with one `../` per directory level below the site root, so the reference
/// resolves from any depth. Protocol-relative `//host` values are external
/// URLs and are left for the external rewrite to handle.
pub fn rewrite_root_relative(content: &str, depth: usize) -> String {
    let prefix = "../".repeat(depth);
    root_relative_pattern()
        .replace_all(content, |caps: &Captures| {
            format!("{}{}{}", &caps[1], prefix, &caps[2])
        })
        .into_owned()
}

/// Append `index.html` to directory links whose target page exists.
///
/// A quoted `href`/`src` value ending in a path separator is resolved back to
/// the site tree (undoing the `../` prefixes added by
/// [`rewrite_root_relative`]) and checked for an `index.html`. Links without
/// one keep their trailing separator and produce a deduplicated missing-index
/// warning instead.
pub fn rewrite_index_links(
    content: &str,
    ctx: &RewriteContext<'_>,
    diagnostics: &mut Diagnostics,
) -> String {
    index_link_pattern()
        .replace_all(content, |caps: &Captures| {
            let attr = &caps[1];
            let link = &caps[2];
            if is_ignored_reference(link) {
                return caps[0].to_string();
            }

            let target = link.trim_start_matches("../").trim_start_matches('/');
            if ctx.root.join(target).join("index.html").is_file() {
                format!(r#"{attr}="{link}index.html""#)
            } else {
                diagnostics.record_missing_index(ctx.rel_path, link);
                caps[0].to_string()
            }
        })
        .into_owned()
}

/// Replace externally hosted URLs with their bundle-local equivalents.
///
/// Longer URLs are substituted first so a short URL that is a textual prefix
/// of a longer one can never match inside the longer one's occurrence. URLs
/// absent from the mapping (typically failed fetches) are left untouched and
/// keep working online.
pub fn replace_external_urls(content: &str, mapping: &UrlMapping, depth: usize) -> String {
    if mapping.is_empty() {
        return content.to_string();
    }

    let prefix = "../".repeat(depth);
    let mut urls: Vec<&String> = mapping.keys().collect();
    urls.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));

    let mut content = content.to_string();
    for url in urls {
        if let Some(local_path) = mapping.get(url) {
            content = content.replace(url.as_str(), &format!("{prefix}{local_path}"));
        }
    }
    content
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn context<'a>(root: &'a Path, rel_path: &'a str, depth: usize) -> RewriteContext<'a> {
        RewriteContext {
            root,
            rel_path,
            depth,
        }
    }

    #[test]
    fn prefixes_root_relative_references_by_depth() {
        let html = r#"<a href="/about.html">a</a><img src="/img/logo.png">
                      <style>body { background: url(/bg.png); border-image: url("/b.png"); }</style>"#;
        let rewritten = rewrite_root_relative(html, 2);

        assert!(rewritten.contains(r#"href="../../about.html""#));
        assert!(rewritten.contains(r#"src="../../img/logo.png""#));
        assert!(rewritten.contains("url(../../bg.png)"));
        assert!(rewritten.contains(r#"url("../../b.png")"#));
    }

    #[test]
    fn leaves_protocol_relative_urls_alone() {
        let html = r#"<script src="//cdn.example.com/app.js"></script>"#;
        assert_eq!(rewrite_root_relative(html, 2), html);
        assert_eq!(rewrite_root_relative(html, 0), html);
    }

    #[test]
    fn root_relative_rewrite_is_idempotent() {
        let html = r#"<a href="/about/">a</a><img src="/img/logo.png"><i style="background:url(/x.png)"></i>"#;
        for depth in [0, 1, 3] {
            let once = rewrite_root_relative(html, depth);
            assert_eq!(rewrite_root_relative(&once, depth), once);
        }
    }

    #[test]
    fn appends_index_html_when_the_target_page_exists() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("about")).unwrap();
        fs::write(dir.path().join("about/index.html"), "<p>about</p>").unwrap();

        let mut diagnostics = Diagnostics::default();
        let ctx = context(dir.path(), "blog/post/page.html", 2);
        let html = r#"<a href="/about/">about</a>"#;

        let rewritten = rewrite_html_content(html, &ctx, &mut diagnostics);
        assert_eq!(rewritten, r#"<a href="../../about/index.html">about</a>"#);
        assert!(diagnostics.missing_index().is_empty());
    }

    #[test]
    fn records_one_warning_for_a_repeated_missing_index_link() {
        let dir = tempdir().unwrap();

        let mut diagnostics = Diagnostics::default();
        let ctx = context(dir.path(), "blog/post/page.html", 2);
        let html = r#"<a href="/about/">a</a><a href="/about/">b</a>"#;

        let rewritten = rewrite_html_content(html, &ctx, &mut diagnostics);
        assert_eq!(
            rewritten,
            r#"<a href="../../about/">a</a><a href="../../about/">b</a>"#
        );
        assert_eq!(diagnostics.missing_index().len(), 1);
        assert_eq!(
            diagnostics.missing_index()[0],
            "blog/post/page.html -> Link '../../about/' has no index.html"
        );
    }

    #[test]
    fn index_rewrite_skips_external_directory_links() {
        let dir = tempdir().unwrap();

        let mut diagnostics = Diagnostics::default();
        let ctx = context(dir.path(), "index.html", 0);
        let html = r#"<a href="https://example.com/docs/">docs</a>"#;

        let rewritten = rewrite_index_links(html, &ctx, &mut diagnostics);
        assert_eq!(rewritten, html);
        assert!(diagnostics.missing_index().is_empty());
    }

    #[test]
    fn html_rewrite_is_idempotent() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("docs")).unwrap();
        fs::write(dir.path().join("docs/index.html"), "<p>docs</p>").unwrap();

        let mut diagnostics = Diagnostics::default();
        let ctx = context(dir.path(), "a/b/page.html", 2);
        let html = r#"<a href="/docs/">docs</a><a href="/missing/">gone</a><img src="/logo.png">"#;

        let once = rewrite_html_content(html, &ctx, &mut diagnostics);
        let twice = rewrite_html_content(&once, &ctx, &mut diagnostics);
        assert_eq!(once, twice);
        assert_eq!(diagnostics.missing_index().len(), 1);
    }

    #[test]
    fn replaces_mapped_urls_with_depth_prefixed_local_paths() {
        let mut mapping = UrlMapping::new();
        mapping.insert(
            "https://cdn.example.com/a.css?v=2".to_string(),
            "_external/cdn.example.com/a_q_0b1d5e2f.css".to_string(),
        );

        let css = "url(https://cdn.example.com/a.css?v=2)";
        let rewritten = replace_external_urls(css, &mapping, 1);
        assert_eq!(
            rewritten,
            "url(../_external/cdn.example.com/a_q_0b1d5e2f.css)"
        );
    }

    #[test]
    fn longer_urls_are_replaced_before_their_prefixes() {
        let mut mapping = UrlMapping::new();
        mapping.insert(
            "https://cdn.example.com/a".to_string(),
            "_external/cdn.example.com/a".to_string(),
        );
        mapping.insert(
            "https://cdn.example.com/a/b.css".to_string(),
            "_external/cdn.example.com/a/b.css".to_string(),
        );

        let html = r#"<link href="https://cdn.example.com/a/b.css"><a href="https://cdn.example.com/a">x</a>"#;
        let rewritten = replace_external_urls(html, &mapping, 0);
        assert!(rewritten.contains(r#"href="_external/cdn.example.com/a/b.css""#));
        assert!(rewritten.contains(r#"href="_external/cdn.example.com/a""#));
    }

    #[test]
    fn unmapped_urls_stay_untouched() {
        let mapping = UrlMapping::new();
        let html = r#"<script src="https://cdn.example.com/failed.js"></script>"#;
        assert_eq!(replace_external_urls(html, &mapping, 3), html);
    }

    #[test]
    fn external_rewrite_is_idempotent() {
        let mut mapping = UrlMapping::new();
        mapping.insert(
            "https://cdn.example.com/site.css".to_string(),
            "_external/cdn.example.com/site.css".to_string(),
        );

        let html = r#"<link href="https://cdn.example.com/site.css">"#;
        let once = replace_external_urls(html, &mapping, 2);
        assert_eq!(replace_external_urls(&once, &mapping, 2), once);
    }
}
