//! Command-line entry point for the offline site bundler.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use log::{LevelFilter, error, info, warn};

use offline_site_bundler::archive::DirectorySink;
use offline_site_bundler::config::BundleConfig;
use offline_site_bundler::convert::{ConversionSummary, Converter};
use offline_site_bundler::report::{Diagnostics, write_report};

/// Convert a compiled static website into a self-contained offline bundle.
#[derive(Debug, Parser)]
#[command(name = "site-bundler", version, about)]
struct Cli {
    /// Path to the compiled website directory.
    site_path: Option<PathBuf>,

    /// Output directory for the bundle and report (default: bundle).
    #[arg(long)]
    output_path: Option<PathBuf>,

    /// Archive name, also the bundle directory name.
    #[arg(long)]
    name: Option<String>,

    /// Archive title metadata.
    #[arg(long)]
    title: Option<String>,

    /// Creator name.
    #[arg(long)]
    creator: Option<String>,

    /// Publisher name (default: You).
    #[arg(long)]
    publisher: Option<String>,

    /// Description of the content.
    #[arg(long)]
    description: Option<String>,

    /// ISO 639-3 language code (e.g. eng, fra).
    #[arg(long)]
    language: Option<String>,

    /// Path to a JSON configuration file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Download external resources into the bundle.
    #[arg(long)]
    resolve_external: bool,

    /// Drop assets not referenced by any HTML or CSS file.
    #[arg(long)]
    cleanup: bool,

    /// Optimize images (resize and recompress).
    #[arg(long)]
    optimize_images: bool,

    /// Maximum image width for optimization (default: 1920).
    #[arg(long)]
    max_image_width: Option<u32>,

    /// JPEG quality for optimization (default: 85).
    #[arg(long)]
    image_quality: Option<u8>,

    /// Analyze and report without writing the bundle.
    #[arg(long)]
    dry_run: bool,

    /// Generate an HTML validation report in the output directory.
    #[arg(long)]
    report: bool,

    /// Enable verbose output (debug level).
    #[arg(long)]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(long)]
    quiet: bool,
}

impl Cli {
    fn as_config(&self) -> BundleConfig {
        BundleConfig {
            site_path: self.site_path.clone(),
            output_path: self.output_path.clone(),
            name: self.name.clone(),
            title: self.title.clone(),
            creator: self.creator.clone(),
            publisher: self.publisher.clone(),
            description: self.description.clone(),
            language: self.language.clone(),
            resolve_external: self.resolve_external.then_some(true),
            cleanup: self.cleanup.then_some(true),
            optimize_images: self.optimize_images.then_some(true),
            max_image_width: self.max_image_width,
            image_quality: self.image_quality,
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: bool, quiet: bool) {
    let level = if quiet {
        LevelFilter::Error
    } else if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    env_logger::Builder::from_default_env()
        .filter_level(level)
        .format_target(false)
        .format_timestamp(None)
        .init();
}

fn run(cli: Cli) -> Result<()> {
    let mut config = cli.as_config();
    if let Some(config_path) = &cli.config {
        info!("Loading configuration from {}", config_path.display());
        config = config.merged_over(BundleConfig::from_path(config_path)?);
    }
    let bundle = config.resolve()?;

    let mut diagnostics = Diagnostics::default();
    let converter = Converter::new(&bundle.site_path, bundle.options.clone());

    let summary = if cli.dry_run {
        info!("=== Analyzing Website (Dry Run) ===");
        converter.analyze(&mut diagnostics)?
    } else {
        info!("=== Building Offline Bundle ===");
        let bundle_dir = bundle.output_path.join(&bundle.metadata.name);
        let mut sink = DirectorySink::create(&bundle_dir)?;
        let summary = converter.run(&mut sink, &bundle.metadata, &mut diagnostics)?;
        info!("Output: {}", bundle_dir.display());
        summary
    };

    log_summary(&cli, &summary, &diagnostics);

    if cli.report || cli.dry_run {
        std::fs::create_dir_all(&bundle.output_path)?;
        let report_path = write_report(&diagnostics, &bundle.output_path)?;
        info!("Report saved to: {}", report_path.display());
    }

    Ok(())
}

fn log_summary(cli: &Cli, summary: &ConversionSummary, diagnostics: &Diagnostics) {
    if cli.dry_run {
        info!("=== Dry Run Analysis Complete ===");
        info!("Analyzed {} files", summary.files_processed);
    } else {
        info!("=== Bundle Created Successfully ===");
        info!("Processed {} files", summary.files_processed);
    }

    if summary.external_resolved > 0 {
        info!("Resolved {} external resources", summary.external_resolved);
    }
    if summary.assets_removed > 0 {
        info!("Removed {} unreferenced assets", summary.assets_removed);
    }
    if summary.images_optimized > 0 {
        info!(
            "Optimized {} images, saved {:.2} MB",
            summary.images_optimized,
            summary.bytes_saved as f64 / 1024.0 / 1024.0
        );
    }

    let unknown = diagnostics.unique_unknown_extensions();
    if !unknown.is_empty() {
        warn!("Missing mimetypes for {} extensions:", unknown.len());
        warn!("{}", unknown.join(", "));
    }

    if !diagnostics.missing_index().is_empty() {
        warn!(
            "{} links ending with / but no index.html found:",
            diagnostics.missing_index().len()
        );
        for warning in diagnostics.missing_index() {
            warn!("  {warning}");
        }
    }

    if !diagnostics.errors().is_empty() {
        error!("{} files failed to process:", diagnostics.errors().len());
        for failure in diagnostics.errors() {
            error!("  {failure}");
        }
    }
}
