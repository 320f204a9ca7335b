//! Conversion pipeline orchestration.
//!
//! Phases run in a fixed order: external dependency resolution first (it adds
//! files to the tree), then enumeration, then the optional cleanup filter,
//! then per-file rewriting and hand-off to the archive sink. A failure in one
//! file never aborts the run; it is recorded and the file is skipped.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use log::{error, info};

use crate::archive::{ArchiveItem, ArchiveSink};
use crate::config::{ArchiveMetadata, ConversionOptions};
use crate::external::resolve::{UrlMapping, resolve_external_dependencies};
use crate::mime::mime_for_extension;
use crate::optimize::optimize_image;
use crate::report::Diagnostics;
use crate::rewrite::{
    RewriteContext, replace_external_urls, rewrite_html_content, rewrite_root_relative,
};
use crate::scan::cleanup_unreferenced;
use crate::site::{SiteFile, collect_site_files, validate_site_root};

const HTML_MIME: &str = "text/html";

/// Totals reported after a conversion or analysis run.
#[derive(Debug, Default)]
pub struct ConversionSummary {
    /// Files handed to the archive sink (or analyzed in a dry run).
    pub files_processed: usize,
    /// Unreferenced assets dropped by the cleanup filter.
    pub assets_removed: usize,
    /// External URLs resolved into the bundle.
    pub external_resolved: usize,
    /// Images replaced by an optimized encoding.
    pub images_optimized: usize,
    /// Total bytes saved by image optimization.
    pub bytes_saved: u64,
}

/// Drives the conversion phases over one site tree.
pub struct Converter<'a> {
    root: &'a Path,
    options: ConversionOptions,
}

impl<'a> Converter<'a> {
    /// Create a converter for the site rooted at `root`.
    pub fn new(root: &'a Path, options: ConversionOptions) -> Self {
        Self { root, options }
    }

    /// Run the full pipeline, streaming finished entries into `sink`.
    pub fn run(
        &self,
        sink: &mut dyn ArchiveSink,
        metadata: &ArchiveMetadata,
        diagnostics: &mut Diagnostics,
    ) -> Result<ConversionSummary> {
        validate_site_root(self.root)?;

        let mut summary = ConversionSummary::default();
        let url_mapping = self.resolve_externals(&mut summary)?;

        // Enumerate after resolution so freshly fetched files join the tree.
        let mut files = collect_site_files(self.root)?;
        info!("Found {} files to process", files.len());

        if self.options.cleanup {
            let (kept, removed) = cleanup_unreferenced(files);
            summary.assets_removed = removed.len();
            files = kept;
        }

        for file in &files {
            match self.process_file(file, &url_mapping, &mut summary, diagnostics) {
                Ok(item) => {
                    sink.add_item(item)
                        .with_context(|| format!("failed to archive {}", file.rel_path))?;
                    summary.files_processed += 1;
                }
                Err(err) => {
                    error!("Failed to process file {}: {err:#}", file.rel_path);
                    diagnostics.record_error(&file.rel_path, &error_category(&err));
                }
            }
        }

        info!("=== Adding metadata ===");
        for (key, value) in metadata.to_pairs() {
            sink.add_metadata(key, value)?;
        }
        sink.close()?;

        Ok(summary)
    }

    /// Analyze the site without writing any archive output.
    ///
    /// The analysis mirrors a real run: the same rewrites are computed (and
    /// discarded) so missing-index warnings and MIME coverage come out
    /// identical, and optimization potential is measured when enabled.
    pub fn analyze(&self, diagnostics: &mut Diagnostics) -> Result<ConversionSummary> {
        validate_site_root(self.root)?;

        let mut summary = ConversionSummary::default();
        let files = collect_site_files(self.root)?;
        info!("Found {} files to analyze", files.len());

        for file in &files {
            summary.files_processed += 1;

            if file.is_html() {
                match fs::read(&file.path) {
                    Ok(bytes) => {
                        let ctx = self.context_for(file);
                        rewrite_html_content(&String::from_utf8_lossy(&bytes), &ctx, diagnostics);
                    }
                    Err(err) => {
                        error!("Failed to analyze {}: {err}", file.rel_path);
                        diagnostics
                            .record_error(&file.rel_path, &io_error_category(err.kind()));
                        continue;
                    }
                }
            } else if mime_for_extension(&file.extension).is_none() {
                diagnostics.record_unknown_extension(&file.extension);
            }

            self.note_optimization(file, &mut summary);
        }

        Ok(summary)
    }

    fn resolve_externals(&self, summary: &mut ConversionSummary) -> Result<UrlMapping> {
        if !self.options.resolve_external {
            return Ok(UrlMapping::new());
        }
        let mapping = resolve_external_dependencies(self.root)?;
        summary.external_resolved = mapping.len();
        Ok(mapping)
    }

    fn process_file(
        &self,
        file: &SiteFile,
        url_mapping: &UrlMapping,
        summary: &mut ConversionSummary,
        diagnostics: &mut Diagnostics,
    ) -> Result<ArchiveItem> {
        if file.is_html() {
            let bytes = fs::read(&file.path)
                .with_context(|| format!("failed to read {}", file.path.display()))?;
            let ctx = self.context_for(file);
            let data = rewrite_html_content(&String::from_utf8_lossy(&bytes), &ctx, diagnostics);
            let data = replace_external_urls(&data, url_mapping, file.depth);
            return Ok(ArchiveItem::from_content(
                &file.rel_path,
                file.title(),
                data,
                HTML_MIME,
            ));
        }

        if file.is_css() {
            let bytes = fs::read(&file.path)
                .with_context(|| format!("failed to read {}", file.path.display()))?;
            let data = rewrite_root_relative(&String::from_utf8_lossy(&bytes), file.depth);
            let data = replace_external_urls(&data, url_mapping, file.depth);
            return Ok(ArchiveItem::from_content(
                &file.rel_path,
                file.title(),
                data,
                "text/css",
            ));
        }

        let Some(mime) = mime_for_extension(&file.extension) else {
            diagnostics.record_unknown_extension(&file.extension);
            // No registered type: the archive treats the entry as HTML.
            return Ok(ArchiveItem::from_file(
                &file.rel_path,
                file.title(),
                &file.path,
                HTML_MIME,
            ));
        };

        if self.options.optimize_images && is_optimizable_image(&file.extension) {
            if let Some(optimized) = optimize_image(
                &file.path,
                self.options.max_image_width,
                self.options.image_quality,
            ) {
                summary.images_optimized += 1;
                summary.bytes_saved += optimized.original_size - optimized.new_size;
                return Ok(ArchiveItem::from_content(
                    &file.rel_path,
                    file.title(),
                    optimized.bytes,
                    mime,
                ));
            }
        }

        Ok(ArchiveItem::from_file(
            &file.rel_path,
            file.title(),
            &file.path,
            mime,
        ))
    }

    fn note_optimization(&self, file: &SiteFile, summary: &mut ConversionSummary) {
        if self.options.optimize_images && is_optimizable_image(&file.extension) {
            if let Some(optimized) = optimize_image(
                &file.path,
                self.options.max_image_width,
                self.options.image_quality,
            ) {
                summary.images_optimized += 1;
                summary.bytes_saved += optimized.original_size - optimized.new_size;
            }
        }
    }

    fn context_for<'b>(&'b self, file: &'b SiteFile) -> RewriteContext<'b> {
        RewriteContext {
            root: self.root,
            rel_path: &file.rel_path,
            depth: file.depth,
        }
    }
}

fn is_optimizable_image(extension: &str) -> bool {
    matches!(extension, "jpg" | "jpeg" | "png")
}

fn error_category(err: &anyhow::Error) -> String {
    match err.downcast_ref::<std::io::Error>() {
        Some(io_err) => io_error_category(io_err.kind()),
        None => "Processing error".to_string(),
    }
}

fn io_error_category(kind: std::io::ErrorKind) -> String {
    match kind {
        std::io::ErrorKind::PermissionDenied => "Permission denied".to_string(),
        other => format!("{other:?}"),
    }
}
