//! Site tree enumeration and per-file path bookkeeping.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};

/// A regular file discovered under the site root.
#[derive(Debug, Clone)]
pub struct SiteFile {
    /// Absolute location on disk.
    pub path: PathBuf,
    /// POSIX-style path relative to the site root.
    pub rel_path: String,
    /// Number of directories between the file and the site root.
    pub depth: usize,
    /// Lowercased extension without the leading dot; empty when absent.
    pub extension: String,
}

impl SiteFile {
    /// File stem used as the archive entry title.
    pub fn title(&self) -> String {
        self.path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Whether the file is an HTML or CSS document.
    ///
    /// Documents drive reference scanning and always survive cleanup.
    pub fn is_document(&self) -> bool {
        self.is_html() || self.is_css()
    }

    /// Whether the file is an HTML page.
    pub fn is_html(&self) -> bool {
        matches!(self.extension.as_str(), "html" | "htm")
    }

    /// Whether the file is a stylesheet.
    pub fn is_css(&self) -> bool {
        self.extension == "css"
    }
}

/// Check the structural preconditions on the site root.
///
/// A missing or non-directory root is fatal; nothing may have been processed
/// before this check runs.
pub fn validate_site_root(root: &Path) -> Result<()> {
    if !root.exists() {
        bail!("site path does not exist: {}", root.display());
    }
    if !root.is_dir() {
        bail!("site path is not a directory: {}", root.display());
    }
    Ok(())
}

/// Enumerate every regular file under the site root.
///
/// Dot-files are skipped. Results are sorted by relative path so downstream
/// phases behave identically from run to run.
pub fn collect_site_files(root: &Path) -> Result<Vec<SiteFile>> {
    let mut files = Vec::new();
    collect_into(root, root, &mut files)
        .with_context(|| format!("failed to scan site directory {}", root.display()))?;
    files.sort_by(|a, b| a.rel_path.cmp(&b.rel_path));
    Ok(files)
}

fn collect_into(root: &Path, dir: &Path, files: &mut Vec<SiteFile>) -> std::io::Result<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let file_name = entry.file_name();
        if file_name.to_string_lossy().starts_with('.') {
            continue;
        }

        let path = entry.path();
        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            collect_into(root, &path, files)?;
        } else if file_type.is_file() {
            files.push(site_file(root, path));
        }
    }
    Ok(())
}

fn site_file(root: &Path, path: PathBuf) -> SiteFile {
    let rel_path = path
        .strip_prefix(root)
        .unwrap_or(&path)
        .to_string_lossy()
        .replace('\\', "/");
    let depth = rel_path.matches('/').count();
    let extension = path
        .extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .unwrap_or_default();

    SiteFile {
        path,
        rel_path,
        depth,
        extension,
    }
}
