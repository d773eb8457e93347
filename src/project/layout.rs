//! Name-to-path resolution over watched root pairs.
//!
//! Multi-module project metadata stays external: anything that can answer
//! "qualified name → source root, output root" plugs in as a
//! [`ProjectLayout`]. [`DirLayout`] is the single-module implementation over
//! configured directory pairs.

use std::path::PathBuf;

use crate::core::QualifiedName;

/// Where a unit's source and compiled output live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitPaths {
    pub source_root: PathBuf,
    pub output_root: PathBuf,
}

impl UnitPaths {
    /// Absolute source file for a name.
    pub fn source_file(&self, name: &QualifiedName, suffix: &str) -> PathBuf {
        self.source_root.join(name.source_rel_path(suffix))
    }

    /// Absolute compiled file for a name.
    pub fn compiled_file(&self, name: &QualifiedName, ext: &str) -> PathBuf {
        self.output_root.join(name.compiled_rel_path(ext))
    }
}

/// Resolve qualified names to their project locations.
pub trait ProjectLayout: Send + Sync {
    /// Roots for a name, or None when no watched root holds its source.
    fn locate(&self, name: &QualifiedName, suffix: &str) -> Option<UnitPaths>;

    /// All watched `(source root, output root)` pairs, scan order.
    fn roots(&self) -> &[(PathBuf, PathBuf)];
}

/// Directory-pair layout: each watched source root maps to one output root.
#[derive(Debug, Clone)]
pub struct DirLayout {
    roots: Vec<(PathBuf, PathBuf)>,
}

impl DirLayout {
    pub fn new(roots: Vec<(PathBuf, PathBuf)>) -> Self {
        Self { roots }
    }

    /// Single-root convenience constructor.
    pub fn single(source_root: PathBuf, output_root: PathBuf) -> Self {
        Self::new(vec![(source_root, output_root)])
    }
}

impl ProjectLayout for DirLayout {
    fn locate(&self, name: &QualifiedName, suffix: &str) -> Option<UnitPaths> {
        let rel = name.source_rel_path(suffix);
        self.roots
            .iter()
            .find(|(src, _)| src.join(&rel).is_file())
            .map(|(src, out)| UnitPaths {
                source_root: src.clone(),
                output_root: out.clone(),
            })
    }

    fn roots(&self) -> &[(PathBuf, PathBuf)] {
        &self.roots
    }
}
