//! Qualified type names and their path mappings.
//!
//! A qualified name is a dotted package plus a simple name:
//! `com.example.Foo`. Inner types use `$`: `com.example.Foo$Inner`.
//! Only the outermost type owns a source file; every type (inner ones
//! included) owns its own compiled output.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Fully qualified type name (`com.example.Foo`, inner: `com.example.Foo$Inner`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QualifiedName(String);

impl QualifiedName {
    /// Create from a dotted name. No validation beyond non-emptiness;
    /// callers derive names from paths or parsed source.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Full dotted name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Package part (`com.example`), empty for the default package.
    pub fn package(&self) -> &str {
        match self.0.rfind('.') {
            Some(pos) => &self.0[..pos],
            None => "",
        }
    }

    /// Simple name (`Foo`, `Foo$Inner`).
    pub fn simple_name(&self) -> &str {
        match self.0.rfind('.') {
            Some(pos) => &self.0[pos + 1..],
            None => &self.0,
        }
    }

    /// The outermost type of an inner name (`Foo$Inner` → `Foo`).
    /// Returns a clone of self for top-level names.
    pub fn outermost(&self) -> QualifiedName {
        match self.simple_name().find('$') {
            Some(pos) => {
                let simple = &self.simple_name()[..pos];
                if self.package().is_empty() {
                    Self(simple.to_string())
                } else {
                    Self(format!("{}.{}", self.package(), simple))
                }
            }
            None => self.clone(),
        }
    }

    /// Whether this is an inner type (`Foo$Inner`).
    pub fn is_inner(&self) -> bool {
        self.simple_name().contains('$')
    }

    /// Package as a relative directory path (`com/example`).
    pub fn package_path(&self) -> PathBuf {
        self.package().split('.').filter(|s| !s.is_empty()).collect()
    }

    /// Relative source path under a source root (`com/example/Foo.cls`).
    /// Inner types map to their outermost type's file.
    pub fn source_rel_path(&self, suffix: &str) -> PathBuf {
        let outer = self.outermost();
        self.package_path()
            .join(format!("{}.{suffix}", outer.simple_name()))
    }

    /// Relative compiled path under an output root (`com/example/Foo$Inner.cbin`).
    pub fn compiled_rel_path(&self, ext: &str) -> PathBuf {
        self.package_path()
            .join(format!("{}.{ext}", self.simple_name()))
    }

    /// Derive a qualified name from a source file path relative to its root.
    ///
    /// `root/com/example/Foo.cls` → `com.example.Foo`. Returns None when the
    /// path escapes the root, has no file stem, or carries the wrong suffix.
    pub fn from_source_path(root: &Path, path: &Path, suffix: &str) -> Option<Self> {
        let rel = path.strip_prefix(root).ok()?;
        if rel.extension().and_then(|e| e.to_str()) != Some(suffix) {
            return None;
        }
        let stem = rel.file_stem()?.to_str()?;
        let mut parts: Vec<&str> = rel
            .parent()
            .map(|p| p.iter().filter_map(|c| c.to_str()).collect())
            .unwrap_or_default();
        parts.push(stem);
        Some(Self(parts.join(".")))
    }

    /// Check whether the name falls under any of the given dotted prefixes.
    ///
    /// A prefix matches whole package segments only: `host.` excludes
    /// `host.runtime.Map` but not `hostile.Thing`.
    pub fn starts_with_any(&self, prefixes: &[String]) -> bool {
        prefixes.iter().any(|p| {
            let p = p.trim_end_matches('.');
            self.0 == p || self.0.starts_with(&format!("{p}."))
        })
    }
}

impl fmt::Display for QualifiedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for QualifiedName {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}
