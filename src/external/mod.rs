//! Discovery, retrieval and local mapping of externally hosted resources.

pub mod extract;
pub mod fetch;
pub mod locate;
pub mod resolve;

pub use locate::EXTERNAL_NAMESPACE;
pub use resolve::{UrlMapping, resolve_external_dependencies};
