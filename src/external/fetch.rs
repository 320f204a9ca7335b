//! Single-resource retrieval into the bundle tree.

use std::fs;
use std::io::Write;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use log::{debug, warn};
use reqwest::blocking::Client;
use tempfile::NamedTempFile;

use crate::external::locate::normalize_scheme;

// Some origins reject requests carrying a default library agent.
const USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64; rv:109.0) Gecko/20100101 Firefox/115.0";

const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Build the HTTP client shared by all resource downloads.
pub fn build_client() -> Result<Client> {
    Client::builder()
        .user_agent(USER_AGENT)
        .timeout(FETCH_TIMEOUT)
        .build()
        .context("failed to build HTTP client")
}

/// Download `url` into `dest`, returning `true` on success.
///
/// The transfer is skipped when the destination already holds data, so
/// repeated runs and retries are idempotent. Protocol-relative URLs are
/// requested over `https://`. Any failure (timeout, non-2xx status, TLS or
/// DNS error) is logged as a warning and reported as `false`; nothing
/// propagates past this boundary.
pub fn download_resource(client: &Client, url: &str, dest: &Path) -> bool {
    if destination_populated(dest) {
        return true;
    }

    let url = normalize_scheme(url);

    if let Some(parent) = dest.parent() {
        if let Err(err) = fs::create_dir_all(parent) {
            warn!("Failed to download {url}: {err}");
            return false;
        }
    }

    match transfer(client, &url, dest) {
        Ok(()) => {
            debug!("Downloaded: {url} -> {}", dest.display());
            true
        }
        Err(err) => {
            warn!("Failed to download {url}: {err:#}");
            false
        }
    }
}

// The idempotence contract is this explicit precondition, not an incidental
// filesystem behavior: present and non-empty means done.
fn destination_populated(dest: &Path) -> bool {
    fs::metadata(dest).is_ok_and(|meta| meta.is_file() && meta.len() > 0)
}

fn transfer(client: &Client, url: &str, dest: &Path) -> Result<()> {
    let response = client.get(url).send()?.error_for_status()?;
    let body = response.bytes()?;

    // Stage next to the destination so the final rename is atomic.
    let dir = dest.parent().unwrap_or_else(|| Path::new("."));
    let mut staged = NamedTempFile::new_in(dir)?;
    staged.write_all(&body)?;
    staged.persist(dest)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn downloads_into_nested_destination() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("GET", "/lib/app.js")
            .with_status(200)
            .with_body("console.log(1);")
            .create();

        let dir = tempdir().unwrap();
        let dest = dir.path().join("_external/host/lib/app.js");
        let client = build_client().unwrap();

        assert!(download_resource(
            &client,
            &format!("{}/lib/app.js", server.url()),
            &dest
        ));
        assert_eq!(fs::read_to_string(&dest).unwrap(), "console.log(1);");
        mock.assert();
    }

    #[test]
    fn skips_populated_destinations_without_a_request() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("GET", "/a.css")
            .with_status(200)
            .with_body("fresh")
            .expect(0)
            .create();

        let dir = tempdir().unwrap();
        let dest = dir.path().join("a.css");
        fs::write(&dest, "already here").unwrap();

        let client = build_client().unwrap();
        assert!(download_resource(
            &client,
            &format!("{}/a.css", server.url()),
            &dest
        ));
        assert_eq!(fs::read_to_string(&dest).unwrap(), "already here");
        mock.assert();
    }

    #[test]
    fn empty_destinations_are_refetched() {
        let mut server = mockito::Server::new();
        let _mock = server
            .mock("GET", "/a.css")
            .with_status(200)
            .with_body("body{}")
            .create();

        let dir = tempdir().unwrap();
        let dest = dir.path().join("a.css");
        fs::write(&dest, "").unwrap();

        let client = build_client().unwrap();
        assert!(download_resource(
            &client,
            &format!("{}/a.css", server.url()),
            &dest
        ));
        assert_eq!(fs::read_to_string(&dest).unwrap(), "body{}");
    }

    #[test]
    fn http_errors_report_failure_without_writing() {
        let mut server = mockito::Server::new();
        let _mock = server.mock("GET", "/gone.png").with_status(404).create();

        let dir = tempdir().unwrap();
        let dest = dir.path().join("gone.png");

        let client = build_client().unwrap();
        assert!(!download_resource(
            &client,
            &format!("{}/gone.png", server.url()),
            &dest
        ));
        assert!(!dest.exists());
    }
}
