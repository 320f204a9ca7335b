//! External-dependency resolution across a whole site tree.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::fs;
use std::path::Path;

use anyhow::Result;
use log::{debug, info, warn};
use reqwest::blocking::Client;

use crate::external::extract::find_external_urls;
use crate::external::fetch::{build_client, download_resource};
use crate::external::locate::{EXTERNAL_NAMESPACE, url_to_local_path};
use crate::site::collect_site_files;

// Malformed or adversarial stylesheets can import indefinitely; cut the
// rescan off before it can stall the pipeline.
const MAX_CSS_DEPTH: usize = 3;

/// Mapping from external URL (both alias spellings) to a site-relative local path.
pub type UrlMapping = BTreeMap<String, String>;

/// Discover, download and map every external resource referenced by the site.
///
/// The pipeline scans every HTML/CSS file outside the reserved namespace,
/// downloads each discovered URL under `_external/`, rescans downloaded
/// stylesheets for nested imports up to a bounded depth, and finally registers
/// the alternate protocol spelling of every resolved URL. A URL whose fetch
/// fails is simply absent from the returned mapping, leaving its references
/// untouched during rewriting.
pub fn resolve_external_dependencies(root: &Path) -> Result<UrlMapping> {
    let mut mapping = UrlMapping::new();

    info!("Scanning for external dependencies...");
    let namespace_prefix = format!("{EXTERNAL_NAMESPACE}/");
    let mut discovered: BTreeSet<String> = BTreeSet::new();
    for file in collect_site_files(root)? {
        if !file.is_document() || file.rel_path.starts_with(&namespace_prefix) {
            continue;
        }
        match fs::read(&file.path) {
            Ok(bytes) => {
                discovered.extend(find_external_urls(&String::from_utf8_lossy(&bytes)));
            }
            Err(err) => warn!("Failed to scan {}: {err}", file.rel_path),
        }
    }

    if discovered.is_empty() {
        info!("No external dependencies found.");
        return Ok(mapping);
    }

    info!("Found {} external URLs to resolve.", discovered.len());

    let client = build_client()?;
    let mut attempted: BTreeSet<String> = BTreeSet::new();
    let mut css_queue: VecDeque<(String, usize)> = VecDeque::new();

    for url in discovered {
        fetch_and_record(
            &client,
            root,
            &url,
            1,
            &mut mapping,
            &mut attempted,
            &mut css_queue,
        );
    }

    // Depth-bounded rescan of the stylesheets fetched above. The attempted
    // set doubles as a cycle guard for imports the depth bound alone would
    // not break.
    while let Some((local_path, depth)) = css_queue.pop_front() {
        if depth > MAX_CSS_DEPTH {
            continue;
        }

        let content = match fs::read(root.join(&local_path)) {
            Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
            Err(err) => {
                // A concurrent cleanup can remove the file before its rescan.
                debug!("Skipping nested stylesheet {local_path}: {err}");
                continue;
            }
        };

        for url in find_external_urls(&content) {
            fetch_and_record(
                &client,
                root,
                &url,
                depth + 1,
                &mut mapping,
                &mut attempted,
                &mut css_queue,
            );
        }
    }

    register_alias_forms(&mut mapping);

    info!("Resolved {} external dependencies.", mapping.len());
    Ok(mapping)
}

fn fetch_and_record(
    client: &Client,
    root: &Path,
    url: &str,
    depth: usize,
    mapping: &mut UrlMapping,
    attempted: &mut BTreeSet<String>,
    css_queue: &mut VecDeque<(String, usize)>,
) {
    if mapping.contains_key(url) || !attempted.insert(url.to_string()) {
        return;
    }

    let local_path = url_to_local_path(url);
    if download_resource(client, url, &root.join(&local_path)) {
        mapping.insert(url.to_string(), local_path.clone());
        if local_path.ends_with(".css") {
            css_queue.push_back((local_path, depth));
        }
    }
}

/// Register the untried alias spelling of every resolved URL.
///
/// Documents may reference the same resource as `https://host/x` or
/// `//host/x`; after this pass both spellings resolve to the same local path
/// during rewriting.
fn register_alias_forms(mapping: &mut UrlMapping) {
    let mut aliases = Vec::new();
    for (url, local_path) in mapping.iter() {
        if let Some(rest) = url.strip_prefix("https://") {
            aliases.push((format!("//{rest}"), local_path.clone()));
        } else if url.starts_with("//") {
            aliases.push((format!("https:{url}"), local_path.clone()));
        }
    }
    for (alias, local_path) in aliases {
        mapping.entry(alias).or_insert(local_path);
    }
}
