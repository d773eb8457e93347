//! Project metadata: watched roots and name-to-path resolution.

mod discover;
mod layout;

pub use discover::{discover_source_root, parse_package_header};
pub use layout::{DirLayout, ProjectLayout, UnitPaths};
