//! Diagnostics accumulation and the HTML conversion report.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Local;

/// Append-only record of recoverable problems found during a conversion run.
///
/// One accumulator is threaded through the whole pipeline; nothing in it ever
/// aborts a run. The lists feed the end-of-run summary and the HTML report.
#[derive(Debug, Default)]
pub struct Diagnostics {
    missing_index: Vec<String>,
    unknown_extensions: Vec<String>,
    errors: Vec<String>,
}

impl Diagnostics {
    /// Record a directory link with no `index.html` target.
    ///
    /// Warnings are deduplicated by exact message, so a link repeated within
    /// one document is reported once.
    pub fn record_missing_index(&mut self, rel_path: &str, link: &str) {
        let message = format!("{rel_path} -> Link '{link}' has no index.html");
        if !self.missing_index.contains(&message) {
            self.missing_index.push(message);
        }
    }

    /// Record a file extension with no registered MIME type.
    pub fn record_unknown_extension(&mut self, extension: &str) {
        self.unknown_extensions.push(extension.to_string());
    }

    /// Record a file that failed to process, with a short error category.
    pub fn record_error(&mut self, rel_path: &str, category: &str) {
        self.errors.push(format!("{rel_path} ({category})"));
    }

    /// Missing-index warnings in the order they were recorded.
    pub fn missing_index(&self) -> &[String] {
        &self.missing_index
    }

    /// Every unknown extension seen, duplicates included.
    pub fn unknown_extensions(&self) -> &[String] {
        &self.unknown_extensions
    }

    /// Sorted, deduplicated unknown extensions for reporting.
    pub fn unique_unknown_extensions(&self) -> Vec<&str> {
        self.unknown_extensions
            .iter()
            .map(String::as_str)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Per-file processing errors in the order they were recorded.
    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    /// Whether the run finished without any recorded problem.
    pub fn is_clean(&self) -> bool {
        self.missing_index.is_empty() && self.unknown_extensions.is_empty() && self.errors.is_empty()
    }
}

const REPORT_FILE: &str = "conversion_report.html";

const REPORT_STYLE: &str = r#"
        body { font-family: Arial, sans-serif; margin: 20px; background: #f5f5f5; }
        .container { max-width: 1200px; margin: 0 auto; background: white; padding: 20px; border-radius: 8px; }
        h1 { color: #333; border-bottom: 2px solid #4CAF50; padding-bottom: 10px; }
        h2 { color: #555; margin-top: 30px; }
        .summary { display: grid; grid-template-columns: repeat(auto-fit, minmax(200px, 1fr)); gap: 15px; margin: 20px 0; }
        .stat-box { background: #f9f9f9; padding: 15px; border-radius: 5px; border-left: 4px solid #4CAF50; }
        .stat-box.warning { border-left-color: #ff9800; }
        .stat-box.error { border-left-color: #f44336; }
        .stat-number { font-size: 32px; font-weight: bold; color: #333; }
        .stat-label { color: #666; font-size: 14px; }
        .issue-list { background: #fafafa; padding: 15px; border-radius: 5px; margin: 10px 0; }
        .issue-item { padding: 8px; margin: 5px 0; background: white; border-left: 3px solid #ff9800; }
        .error-item { border-left-color: #f44336; }
        code { background: #e0e0e0; padding: 2px 6px; border-radius: 3px; font-family: monospace; }
        .timestamp { color: #999; font-size: 12px; text-align: right; margin-top: 20px; }
"#;

/// Render the conversion report and write it into the output directory.
///
/// Returns the path of the generated file.
pub fn write_report(diagnostics: &Diagnostics, output_dir: &Path) -> Result<PathBuf> {
    let report_path = output_dir.join(REPORT_FILE);
    let html = render_report(diagnostics);
    fs::write(&report_path, html)
        .with_context(|| format!("failed to write report to {}", report_path.display()))?;
    Ok(report_path)
}

fn render_report(diagnostics: &Diagnostics) -> String {
    let unique_unknown = diagnostics.unique_unknown_extensions();

    let missing_section = render_section(
        "Missing Index Pages",
        "Links ending with <code>/</code> but no <code>index.html</code> file found:",
        diagnostics.missing_index(),
        "issue-item",
    );
    let mime_section = render_section(
        "Unknown MIME Types",
        "File extensions without registered MIME types (treated as HTML):",
        &unique_unknown
            .iter()
            .map(|ext| format!("<code>.{ext}</code>"))
            .collect::<Vec<_>>(),
        "issue-item",
    );
    let error_section = render_section(
        "Processing Errors",
        "Files that failed to process:",
        diagnostics.errors(),
        "issue-item error-item",
    );

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Conversion Report</title>
    <style>{style}</style>
</head>
<body>
    <div class="container">
        <h1>Conversion Report</h1>

        <div class="summary">
            <div class="stat-box warning">
                <div class="stat-number">{missing_count}</div>
                <div class="stat-label">Missing Index Pages</div>
            </div>
            <div class="stat-box warning">
                <div class="stat-number">{unknown_count}</div>
                <div class="stat-label">Unknown MIME Types</div>
            </div>
            <div class="stat-box error">
                <div class="stat-number">{error_count}</div>
                <div class="stat-label">Processing Errors</div>
            </div>
        </div>
{missing_section}{mime_section}{error_section}
        <div class="timestamp">Generated: {timestamp}</div>
    </div>
</body>
</html>"#,
        style = REPORT_STYLE,
        missing_count = diagnostics.missing_index().len(),
        unknown_count = unique_unknown.len(),
        error_count = diagnostics.errors().len(),
        missing_section = missing_section,
        mime_section = mime_section,
        error_section = error_section,
        timestamp = Local::now().format("%Y-%m-%d %H:%M:%S"),
    )
}

fn render_section<S: AsRef<str>>(
    heading: &str,
    intro: &str,
    items: &[S],
    item_class: &str,
) -> String {
    if items.is_empty() {
        return String::new();
    }

    let rendered: Vec<String> = items
        .iter()
        .map(|item| format!(r#"<div class="{item_class}">{}</div>"#, item.as_ref()))
        .collect();

    format!(
        r#"
        <h2>{heading} ({count})</h2>
        <p>{intro}</p>
        <div class="issue-list">{items}</div>
"#,
        heading = heading,
        count = items.len(),
        intro = intro,
        items = rendered.join("\n"),
    )
}
