//! Reference closure computation and unreferenced-asset cleanup.

use std::collections::BTreeSet;
use std::fs;
use std::sync::OnceLock;

use log::{debug, info};
use regex::Regex;

use crate::site::SiteFile;

fn ignored_reference_patterns() -> &'static [Regex] {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS
        .get_or_init(|| {
            vec![
                Regex::new(r"(?i)^https?://").expect("invalid http(s) regex"),
                Regex::new(r"^//").expect("invalid protocol-relative regex"),
                Regex::new(r"(?i)^data:").expect("invalid data URI regex"),
                Regex::new(r"(?i)^mailto:").expect("invalid mailto regex"),
                Regex::new(r"(?i)^javascript:").expect("invalid javascript regex"),
                Regex::new(r"^#").expect("invalid anchor regex"),
            ]
        })
        .as_slice()
}

/// Determine whether a raw reference can never name a file inside the site tree.
///
/// External URLs, data URIs, anchors and script pseudo-links require a network
/// connection or no file at all, so they are excluded from closure and rewrite
/// decisions alike.
pub fn is_ignored_reference(value: &str) -> bool {
    ignored_reference_patterns()
        .iter()
        .any(|pattern| pattern.is_match(value))
}

fn attribute_reference_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r#"(?i)(?:href|src|poster|data-src)=["']([^"'#?]+)"#)
            .expect("invalid attribute regex")
    })
}

fn srcset_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r#"(?i)srcset=["']([^"']+)["']"#).expect("invalid srcset regex")
    })
}

fn css_reference_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r#"(?i)url\(["']?([^"')\s#?]+)"#).expect("invalid css url regex"))
}

/// Compute the set of site-relative paths referenced from HTML and CSS files.
///
/// References are taken from `href`/`src`/`poster`/`data-src` attributes,
/// `srcset` lists and CSS `url(...)` functions, resolved against the
/// containing file's directory (or the site root for root-relative values).
/// Directory-like references contribute an implicit `index.html` member.
/// References resolving outside the site root are dropped. The scan is
/// single-pass: only direct references from the given documents are honored,
/// not references reachable through further stylesheet hops.
pub fn find_referenced_assets(files: &[SiteFile]) -> BTreeSet<String> {
    let mut referenced = BTreeSet::new();

    for file in files {
        if !file.is_document() {
            continue;
        }
        let Ok(bytes) = fs::read(&file.path) else {
            continue;
        };
        let content = String::from_utf8_lossy(&bytes);
        let file_dir = match file.rel_path.rfind('/') {
            Some(i) => &file.rel_path[..i],
            None => "",
        };

        if file.is_html() {
            for caps in attribute_reference_pattern().captures_iter(&content) {
                record_reference(&mut referenced, file_dir, &caps[1]);
            }
            // Inline styles can carry url(...) references too.
            for caps in css_reference_pattern().captures_iter(&content) {
                record_reference(&mut referenced, file_dir, &caps[1]);
            }
            for caps in srcset_pattern().captures_iter(&content) {
                // Entries look like "img.png 2x, img-wide.png 3x"; the first
                // token of each entry is the reference, the rest a descriptor.
                for entry in caps[1].split(',') {
                    if let Some(token) = entry.split_whitespace().next() {
                        record_reference(&mut referenced, file_dir, token);
                    }
                }
            }
        } else {
            for caps in css_reference_pattern().captures_iter(&content) {
                record_reference(&mut referenced, file_dir, &caps[1]);
            }
        }
    }

    referenced
}

fn record_reference(referenced: &mut BTreeSet<String>, file_dir: &str, raw: &str) {
    let reference = raw.trim();
    if reference.is_empty() || is_ignored_reference(reference) {
        return;
    }

    let Some(resolved) = resolve_reference(file_dir, reference) else {
        return;
    };
    if resolved.is_empty() {
        referenced.insert("index.html".to_string());
        return;
    }

    if !has_extension(&resolved) {
        referenced.insert(format!("{resolved}/index.html"));
    }
    referenced.insert(resolved);
}

/// Resolve a reference lexically to a site-root-relative path.
///
/// Root-relative values resolve from the root, everything else from the
/// containing file's directory. `None` means the reference escapes the root.
fn resolve_reference(file_dir: &str, reference: &str) -> Option<String> {
    let (base, path) = match reference.strip_prefix('/') {
        Some(rest) => ("", rest),
        None => (file_dir, reference),
    };

    let mut segments: Vec<&str> = base.split('/').filter(|s| !s.is_empty()).collect();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop()?;
            }
            _ => segments.push(segment),
        }
    }
    Some(segments.join("/"))
}

fn has_extension(path: &str) -> bool {
    let name = path.rsplit('/').next().unwrap_or(path);
    name.rfind('.').is_some_and(|i| i > 0)
}

/// Drop files that are neither documents nor referenced by any document.
///
/// HTML and CSS files are always retained. Nothing is deleted from disk here;
/// the removed paths are only excluded from further processing, and what
/// happens to them when staging the final output is the caller's decision.
pub fn cleanup_unreferenced(files: Vec<SiteFile>) -> (Vec<SiteFile>, Vec<String>) {
    info!("Scanning for referenced assets...");
    let referenced = find_referenced_assets(&files);
    info!(
        "Found {} asset references in HTML/CSS files",
        referenced.len()
    );

    let mut kept = Vec::new();
    let mut removed = Vec::new();
    for file in files {
        if file.is_document() || referenced.contains(&file.rel_path) {
            kept.push(file);
        } else {
            removed.push(file.rel_path);
        }
    }

    if !removed.is_empty() {
        info!("Cleanup: removing {} unreferenced assets", removed.len());
        for rel_path in &removed {
            debug!("  Unreferenced: {rel_path}");
        }
    }

    (kept, removed)
}
