#![doc = include_str!("../README.md")]
#![warn(missing_docs)]

pub mod archive;
pub mod config;
pub mod convert;
pub mod external;
pub mod mime;
pub mod optimize;
pub mod report;
pub mod rewrite;
pub mod scan;
pub mod site;
pub mod validate;

pub use archive::{ArchiveItem, ArchiveSink, DirectorySink};
pub use config::{ArchiveMetadata, BundleConfig, ConversionOptions};
pub use convert::{ConversionSummary, Converter};
pub use external::{EXTERNAL_NAMESPACE, UrlMapping, resolve_external_dependencies};
pub use report::Diagnostics;
