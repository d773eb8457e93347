//! Change detection: walk watched roots and compare source mtimes against
//! descriptor watermarks.
//!
//! Scanning is a pure read. It never mutates the descriptor cache and never
//! touches source text; units carry paths only and read lazily when the
//! compiler pulls them.

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::SystemTime;

use jwalk::WalkDir;

use crate::cache::DescriptorCache;
use crate::core::QualifiedName;
use crate::debug;
use crate::project::ProjectLayout;
use crate::source::{ChangeSet, SourceUnit};

/// Files editors drop next to sources that must never be compiled.
const IGNORED_FILES: &[&str] = &[".DS_Store"];

/// Detects new or modified sources under the watched roots.
pub struct ChangeScanner {
    layout: Arc<dyn ProjectLayout>,
    source_suffix: String,
}

impl ChangeScanner {
    pub fn new(layout: Arc<dyn ProjectLayout>, source_suffix: impl Into<String>) -> Self {
        Self {
            layout,
            source_suffix: source_suffix.into(),
        }
    }

    /// One scan over every root. A source is changed when the cache holds no
    /// descriptor for it, or when its mtime is strictly newer than the
    /// descriptor's watermark. Results are sorted by qualified name.
    pub fn scan(&self, cache: &DescriptorCache) -> ChangeSet {
        let mut units = Vec::new();
        for (source_root, output_root) in self.layout.roots() {
            for path in collect_sources(source_root, &self.source_suffix) {
                let Some(name) = QualifiedName::from_source_path(source_root, &path, &self.source_suffix)
                else {
                    continue;
                };
                if self.is_changed(cache, &name, &path) {
                    units.push(SourceUnit::new(name, path, output_root.clone()));
                }
            }
        }
        let set = ChangeSet::new(units);
        if !set.is_empty() {
            debug!("scan"; "{} changed unit(s)", set.len());
        }
        set
    }

    fn is_changed(&self, cache: &DescriptorCache, name: &QualifiedName, path: &Path) -> bool {
        let Some(watermark) = cache.peek_last_modified(name) else {
            return true;
        };
        source_mtime(path).is_none_or(|mtime| mtime > watermark)
    }
}

fn source_mtime(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).and_then(|m| m.modified()).ok()
}

/// Collect every source file under a root, sorted for determinism.
fn collect_sources(root: &Path, suffix: &str) -> Vec<std::path::PathBuf> {
    let mut files: Vec<_> = WalkDir::new(root)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .map(|e| e.path())
        .filter(|p| p.extension().and_then(|e| e.to_str()) == Some(suffix))
        .filter(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .is_none_or(|n| !IGNORED_FILES.contains(&n))
        })
        .collect();
    files.sort();
    files
}
