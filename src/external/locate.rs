//! Deterministic mapping from external URLs to bundle-local paths.

use percent_encoding::percent_decode_str;
use sha2::{Digest, Sha256};
use url::Url;

/// Reserved top-level directory receiving downloaded external resources.
///
/// The namespace is excluded from dependency scans so that downloaded files
/// can never feed URLs back into the pipeline.
pub const EXTERNAL_NAMESPACE: &str = "_external";

/// Map an external URL onto a stable site-relative path under [`EXTERNAL_NAMESPACE`].
///
/// The layout is `_external/<host>/<decoded-path>`. `@` characters are
/// replaced since they are hostile to some target filesystems, directory-like
/// paths gain an implicit `index` leaf, and a query string is folded into the
/// filename via a short hash (with a synthetic `.css` extension when the path
/// has none, the common case for stylesheet endpoints). The function is total:
/// any URL degrades to a usable path, and URLs differing only by query string
/// map to distinct, stable locations.
pub fn url_to_local_path(url: &str) -> String {
    let url = normalize_scheme(url);

    let (host, path, query) = match Url::parse(&url) {
        Ok(parsed) => (
            parsed.host_str().unwrap_or_default().to_string(),
            percent_decode_str(parsed.path())
                .decode_utf8_lossy()
                .into_owned(),
            parsed.query().map(|q| q.to_string()),
        ),
        Err(_) => (String::new(), url.clone(), None),
    };

    let mut path = path.trim_start_matches('/').replace('@', "_");

    if let Some(query) = query {
        let suffix = query_hash(&query);
        let (base, extension) = split_extension(&path);
        path = if extension.is_empty() {
            format!("{path}_q_{suffix}.css")
        } else {
            format!("{base}_q_{suffix}{extension}")
        };
    }

    if path.is_empty() || path.ends_with('/') {
        path.push_str("index");
    }

    format!("{EXTERNAL_NAMESPACE}/{host}/{path}")
}

/// Rewrite a protocol-relative URL to its `https://` form.
pub fn normalize_scheme(url: &str) -> String {
    match url.strip_prefix("//") {
        Some(rest) => format!("https://{rest}"),
        None => url.to_string(),
    }
}

fn query_hash(query: &str) -> String {
    let digest = Sha256::digest(query.as_bytes());
    hex::encode(&digest[..4])
}

/// Split off the extension of the final path component, dot included.
///
/// A leading dot names a hidden file, not an extension.
fn split_extension(path: &str) -> (&str, &str) {
    let name_start = path.rfind('/').map_or(0, |i| i + 1);
    match path[name_start..].rfind('.') {
        Some(i) if i > 0 => path.split_at(name_start + i),
        _ => (path, ""),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_to_host_and_decoded_path() {
        assert_eq!(
            url_to_local_path("https://cdn.example.com/lib/app.js"),
            "_external/cdn.example.com/lib/app.js"
        );
        assert_eq!(
            url_to_local_path("https://cdn.example.com/fonts/my%20face.woff2"),
            "_external/cdn.example.com/fonts/my face.woff2"
        );
    }

    #[test]
    fn alias_forms_share_a_local_path() {
        let https = url_to_local_path("https://cdn.example.com/a.css");
        let protocol_relative = url_to_local_path("//cdn.example.com/a.css");
        assert_eq!(https, protocol_relative);
    }

    #[test]
    fn replaces_at_signs() {
        assert_eq!(
            url_to_local_path("https://cdn.example.com/npm/vue@3/dist.js"),
            "_external/cdn.example.com/npm/vue_3/dist.js"
        );
    }

    #[test]
    fn directory_paths_gain_an_index_leaf() {
        assert_eq!(
            url_to_local_path("https://cdn.example.com/widgets/"),
            "_external/cdn.example.com/widgets/index"
        );
        assert_eq!(
            url_to_local_path("https://cdn.example.com"),
            "_external/cdn.example.com/index"
        );
    }

    #[test]
    fn query_strings_fold_into_the_filename() {
        let one = url_to_local_path("https://cdn.example.com/a.css?v=1");
        let two = url_to_local_path("https://cdn.example.com/a.css?v=2");
        let again = url_to_local_path("https://cdn.example.com/a.css?v=2");

        assert_ne!(one, two);
        assert_eq!(two, again);
        assert!(one.starts_with("_external/cdn.example.com/a_q_"));
        assert!(one.ends_with(".css"));
    }

    #[test]
    fn extensionless_query_endpoints_become_stylesheets() {
        let path = url_to_local_path("https://fonts.example.com/css2?family=Inter");
        assert!(path.starts_with("_external/fonts.example.com/css2_q_"));
        assert!(path.ends_with(".css"));
    }

    #[test]
    fn normalizes_protocol_relative_urls() {
        assert_eq!(
            normalize_scheme("//cdn.example.com/a.css"),
            "https://cdn.example.com/a.css"
        );
        assert_eq!(normalize_scheme("http://plain.example.com"), "http://plain.example.com");
    }
}
