//! Archive sink boundary and the directory staging backend.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use same_file::is_same_file;

/// Payload of a single archive entry.
#[derive(Debug, Clone)]
pub enum ArchiveContent {
    /// In-memory bytes produced by rewriting or optimization.
    Bytes(Vec<u8>),
    /// Reference to an unmodified source file on disk.
    File(PathBuf),
}

/// One entry handed to the archive writer.
#[derive(Debug, Clone)]
pub struct ArchiveItem {
    /// Archive path of the entry, relative to the bundle root.
    pub path: String,
    /// Human-readable title, conventionally the file stem.
    pub title: String,
    /// Entry payload.
    pub content: ArchiveContent,
    /// MIME type recorded for the entry.
    pub mimetype: String,
}

impl ArchiveItem {
    /// Entry backed by in-memory content.
    pub fn from_content(
        path: impl Into<String>,
        title: impl Into<String>,
        content: impl Into<Vec<u8>>,
        mimetype: impl Into<String>,
    ) -> Self {
        Self {
            path: path.into(),
            title: title.into(),
            content: ArchiveContent::Bytes(content.into()),
            mimetype: mimetype.into(),
        }
    }

    /// Entry backed by an unmodified file on disk.
    pub fn from_file(
        path: impl Into<String>,
        title: impl Into<String>,
        source: impl Into<PathBuf>,
        mimetype: impl Into<String>,
    ) -> Self {
        Self {
            path: path.into(),
            title: title.into(),
            content: ArchiveContent::File(source.into()),
            mimetype: mimetype.into(),
        }
    }
}

/// Destination for finished bundle entries and metadata.
///
/// Implementations keep at most one entry per path and finalize atomically
/// when [`close`](ArchiveSink::close) runs.
pub trait ArchiveSink {
    /// Add one entry to the archive.
    fn add_item(&mut self, item: ArchiveItem) -> Result<()>;
    /// Attach a metadata key/value pair to the archive.
    fn add_metadata(&mut self, key: &str, value: &str) -> Result<()>;
    /// Finalize the archive.
    fn close(&mut self) -> Result<()>;
}

/// Staging sink that lays the bundle out under a directory.
///
/// Rewritten entries are written as fresh files; unmodified entries are
/// hard-linked from the source tree when the filesystem allows it, with a
/// plain copy as fallback. Metadata is persisted as a JSON sidecar on close.
pub struct DirectorySink {
    root: PathBuf,
    metadata: BTreeMap<String, String>,
    written: BTreeSet<String>,
}

/// File name of the metadata sidecar written on close.
pub const METADATA_FILE: &str = "metadata.json";

impl DirectorySink {
    /// Create a sink rooted at `root`, creating the directory as needed.
    pub fn create(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)
            .with_context(|| format!("failed to create output directory {}", root.display()))?;
        Ok(Self {
            root,
            metadata: BTreeMap::new(),
            written: BTreeSet::new(),
        })
    }

    /// Directory receiving the staged bundle.
    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl ArchiveSink for DirectorySink {
    fn add_item(&mut self, item: ArchiveItem) -> Result<()> {
        if !self.written.insert(item.path.clone()) {
            return Ok(());
        }

        let dest = self.root.join(&item.path);
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }

        match item.content {
            ArchiveContent::Bytes(bytes) => fs::write(&dest, bytes)
                .with_context(|| format!("failed to write {}", dest.display()))?,
            ArchiveContent::File(source) => install_entry(&source, &dest).with_context(|| {
                format!("failed to stage {} at {}", source.display(), dest.display())
            })?,
        }
        Ok(())
    }

    fn add_metadata(&mut self, key: &str, value: &str) -> Result<()> {
        self.metadata.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        let path = self.root.join(METADATA_FILE);
        let json = serde_json::to_string_pretty(&self.metadata)?;
        fs::write(&path, json)
            .with_context(|| format!("failed to write {}", path.display()))?;
        Ok(())
    }
}

fn install_entry(source: &Path, destination: &Path) -> std::io::Result<()> {
    if destination.exists() {
        if is_same_file(source, destination)? {
            return Ok(());
        }
        fs::remove_file(destination)?;
    }

    match fs::hard_link(source, destination) {
        Ok(_) => Ok(()),
        Err(err) if err.kind() == ErrorKind::AlreadyExists => Ok(()),
        Err(_) => fs::copy(source, destination).map(|_| ()),
    }
}
