//! Bundle configuration loading, merging and resolution.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use chrono::Local;
use log::{info, warn};
use serde::Deserialize;

use crate::validate::{is_valid_archive_name, is_valid_language_code, sanitize_archive_name};

const DEFAULT_OUTPUT_PATH: &str = "bundle";
const DEFAULT_PUBLISHER: &str = "You";
const DEFAULT_MAX_IMAGE_WIDTH: u32 = 1920;
const DEFAULT_IMAGE_QUALITY: u8 = 85;
const FALLBACK_LANGUAGE: &str = "eng";

/// Raw bundle configuration, as read from JSON or assembled from CLI flags.
///
/// Every field is optional so that two configurations can be layered; see
/// [`BundleConfig::merged_over`]. Required fields are enforced only at
/// [`BundleConfig::resolve`] time.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct BundleConfig {
    /// Path to the compiled website directory.
    pub site_path: Option<PathBuf>,
    /// Output directory receiving the staged bundle and report.
    pub output_path: Option<PathBuf>,
    /// Archive name, also used as the bundle directory name.
    pub name: Option<String>,
    /// Archive title metadata.
    pub title: Option<String>,
    /// Creator metadata.
    pub creator: Option<String>,
    /// Publisher metadata.
    pub publisher: Option<String>,
    /// Description metadata.
    pub description: Option<String>,
    /// ISO 639-3 language code.
    pub language: Option<String>,
    /// Download external resources into the bundle.
    pub resolve_external: Option<bool>,
    /// Drop assets not referenced by any HTML or CSS file.
    pub cleanup: Option<bool>,
    /// Re-encode large images.
    pub optimize_images: Option<bool>,
    /// Maximum image width when optimizing.
    pub max_image_width: Option<u32>,
    /// JPEG quality when optimizing.
    pub image_quality: Option<u8>,
}

/// Behavior toggles for a conversion run, with every default applied.
#[derive(Debug, Clone)]
pub struct ConversionOptions {
    /// Download external resources into the bundle.
    pub resolve_external: bool,
    /// Drop assets not referenced by any HTML or CSS file.
    pub cleanup: bool,
    /// Re-encode large images.
    pub optimize_images: bool,
    /// Maximum image width when optimizing.
    pub max_image_width: u32,
    /// JPEG quality when optimizing.
    pub image_quality: u8,
}

impl Default for ConversionOptions {
    fn default() -> Self {
        Self {
            resolve_external: false,
            cleanup: false,
            optimize_images: false,
            max_image_width: DEFAULT_MAX_IMAGE_WIDTH,
            image_quality: DEFAULT_IMAGE_QUALITY,
        }
    }
}

/// Metadata attached to the finished archive.
#[derive(Debug, Clone)]
pub struct ArchiveMetadata {
    /// Archive name.
    pub name: String,
    /// Archive title.
    pub title: String,
    /// Creator of the content.
    pub creator: String,
    /// Publisher of the archive.
    pub publisher: String,
    /// Description of the content.
    pub description: String,
    /// ISO 639-3 language code.
    pub language: String,
    /// Creation date, `YYYY-MM-DD`.
    pub date: String,
}

impl ArchiveMetadata {
    /// Metadata as capitalized key/value pairs for the archive writer.
    pub fn to_pairs(&self) -> Vec<(&'static str, &str)> {
        vec![
            ("Creator", self.creator.as_str()),
            ("Date", self.date.as_str()),
            ("Description", self.description.as_str()),
            ("Language", self.language.as_str()),
            ("Name", self.name.as_str()),
            ("Publisher", self.publisher.as_str()),
            ("Title", self.title.as_str()),
        ]
    }
}

/// Fully resolved conversion inputs after merging flags, file and defaults.
#[derive(Debug, Clone)]
pub struct ResolvedBundle {
    /// Site root to convert.
    pub site_path: PathBuf,
    /// Output directory for the bundle and report.
    pub output_path: PathBuf,
    /// Metadata for the archive writer.
    pub metadata: ArchiveMetadata,
    /// Behavior toggles.
    pub options: ConversionOptions,
}

impl BundleConfig {
    /// Read configuration from a JSON file.
    pub fn from_path(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("config file not found: {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("invalid JSON in config file {}", path.display()))
    }

    /// Layer this configuration over `base`; present fields win.
    pub fn merged_over(self, base: Self) -> Self {
        Self {
            site_path: self.site_path.or(base.site_path),
            output_path: self.output_path.or(base.output_path),
            name: self.name.or(base.name),
            title: self.title.or(base.title),
            creator: self.creator.or(base.creator),
            publisher: self.publisher.or(base.publisher),
            description: self.description.or(base.description),
            language: self.language.or(base.language),
            resolve_external: self.resolve_external.or(base.resolve_external),
            cleanup: self.cleanup.or(base.cleanup),
            optimize_images: self.optimize_images.or(base.optimize_images),
            max_image_width: self.max_image_width.or(base.max_image_width),
            image_quality: self.image_quality.or(base.image_quality),
        }
    }

    /// Enforce required fields and apply defaults, producing run inputs.
    ///
    /// Missing required metadata is a structural error reported before any
    /// processing begins. Malformed language codes and archive names are
    /// repaired with a warning rather than rejected.
    pub fn resolve(self) -> Result<ResolvedBundle> {
        let required = [
            ("site_path", self.site_path.is_none()),
            ("name", self.name.is_none()),
            ("title", self.title.is_none()),
            ("creator", self.creator.is_none()),
            ("description", self.description.is_none()),
            ("language", self.language.is_none()),
        ];
        let missing: Vec<&str> = required
            .into_iter()
            .filter_map(|(field, absent)| absent.then_some(field))
            .collect();
        if !missing.is_empty() {
            bail!("missing required config fields: {}", missing.join(", "));
        }

        let mut language = self.language.unwrap_or_default();
        if !is_valid_language_code(&language) {
            warn!("Invalid language code '{language}'. Using '{FALLBACK_LANGUAGE}' as fallback.");
            language = FALLBACK_LANGUAGE.to_string();
        }

        let mut name = self.name.unwrap_or_default();
        if !is_valid_archive_name(&name) {
            let sanitized = sanitize_archive_name(&name);
            if sanitized.is_empty() {
                bail!("archive name '{name}' has no valid characters");
            }
            warn!("Invalid archive name '{name}'. Sanitizing...");
            info!("Sanitized archive name: {sanitized}");
            name = sanitized;
        }

        Ok(ResolvedBundle {
            site_path: self.site_path.unwrap_or_default(),
            output_path: self
                .output_path
                .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_PATH)),
            metadata: ArchiveMetadata {
                name,
                title: self.title.unwrap_or_default(),
                creator: self.creator.unwrap_or_default(),
                publisher: self
                    .publisher
                    .unwrap_or_else(|| DEFAULT_PUBLISHER.to_string()),
                description: self.description.unwrap_or_default(),
                language,
                date: Local::now().format("%Y-%m-%d").to_string(),
            },
            options: ConversionOptions {
                resolve_external: self.resolve_external.unwrap_or(false),
                cleanup: self.cleanup.unwrap_or(false),
                optimize_images: self.optimize_images.unwrap_or(false),
                max_image_width: self.max_image_width.unwrap_or(DEFAULT_MAX_IMAGE_WIDTH),
                image_quality: self.image_quality.unwrap_or(DEFAULT_IMAGE_QUALITY),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn minimal() -> BundleConfig {
        BundleConfig {
            site_path: Some(PathBuf::from("_site")),
            name: Some("my-blog".into()),
            title: Some("My Blog".into()),
            creator: Some("Jane".into()),
            description: Some("A blog".into()),
            language: Some("eng".into()),
            ..BundleConfig::default()
        }
    }

    #[test]
    fn loads_configuration_from_json() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bundle.json");
        fs::write(
            &path,
            r#"{"site_path": "_site", "name": "blog", "resolve_external": true}"#,
        )
        .unwrap();

        let config = BundleConfig::from_path(&path).unwrap();
        assert_eq!(config.site_path, Some(PathBuf::from("_site")));
        assert_eq!(config.name.as_deref(), Some("blog"));
        assert_eq!(config.resolve_external, Some(true));
        assert!(config.title.is_none());
    }

    #[test]
    fn rejects_invalid_json() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bundle.json");
        fs::write(&path, "{not json").unwrap();
        assert!(BundleConfig::from_path(&path).is_err());
    }

    #[test]
    fn merge_prefers_the_overlay() {
        let overlay = BundleConfig {
            name: Some("cli-name".into()),
            cleanup: Some(true),
            ..BundleConfig::default()
        };
        let base = BundleConfig {
            name: Some("file-name".into()),
            title: Some("File Title".into()),
            ..BundleConfig::default()
        };

        let merged = overlay.merged_over(base);
        assert_eq!(merged.name.as_deref(), Some("cli-name"));
        assert_eq!(merged.title.as_deref(), Some("File Title"));
        assert_eq!(merged.cleanup, Some(true));
    }

    #[test]
    fn resolve_reports_every_missing_field() {
        let err = BundleConfig::default().resolve().unwrap_err();
        let message = err.to_string();
        assert!(message.contains("site_path"));
        assert!(message.contains("language"));
    }

    #[test]
    fn resolve_applies_defaults() {
        let resolved = minimal().resolve().unwrap();
        assert_eq!(resolved.output_path, PathBuf::from("bundle"));
        assert_eq!(resolved.metadata.publisher, "You");
        assert!(!resolved.options.resolve_external);
        assert_eq!(resolved.options.max_image_width, 1920);
        assert_eq!(resolved.metadata.date.len(), 10);
    }

    #[test]
    fn resolve_repairs_bad_language_and_name() {
        let mut config = minimal();
        config.language = Some("english".into());
        config.name = Some("my blog?".into());

        let resolved = config.resolve().unwrap();
        assert_eq!(resolved.metadata.language, "eng");
        assert_eq!(resolved.metadata.name, "my-blog");
    }

    #[test]
    fn metadata_pairs_use_capitalized_keys() {
        let resolved = minimal().resolve().unwrap();
        let pairs = resolved.metadata.to_pairs();
        assert!(pairs.contains(&("Title", "My Blog")));
        assert!(pairs.contains(&("Language", "eng")));
    }
}
