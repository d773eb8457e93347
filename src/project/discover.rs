//! Watched-source-root discovery.
//!
//! The root is inferred from the first readable source file under the
//! working directory: its `package a.b.c;` header names the directory
//! chain the file must sit under, so stripping that chain from the file's
//! directory yields the root. `REKINDLE_SOURCE_ROOT` overrides discovery
//! entirely. Absence is non-fatal: hot reload is disabled and the caller
//! logs once.

use std::path::{Path, PathBuf};

use jwalk::WalkDir;

/// Environment override for the watched source root.
pub const SOURCE_ROOT_ENV: &str = "REKINDLE_SOURCE_ROOT";

/// Find the watched source root under `cwd`, env override first.
pub fn discover_source_root(cwd: &Path, suffix: &str) -> Option<PathBuf> {
    if let Some(from_env) = std::env::var_os(SOURCE_ROOT_ENV) {
        let root = PathBuf::from(from_env);
        return root.is_dir().then_some(root);
    }
    infer_from_tree(cwd, suffix)
}

/// Walk the tree and infer the root from the first source file found.
/// Files are visited in sorted order so discovery is deterministic.
fn infer_from_tree(cwd: &Path, suffix: &str) -> Option<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(cwd)
        .skip_hidden(true)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .map(|e| e.path())
        .filter(|p| p.extension().and_then(|e| e.to_str()) == Some(suffix))
        .collect();
    files.sort();

    files.iter().find_map(|file| infer_root(file))
}

/// Infer the source root for one file from its package header.
fn infer_root(file: &Path) -> Option<PathBuf> {
    let text = std::fs::read_to_string(file).ok()?;
    let package = parse_package_header(&text)?;
    let mut dir = file.parent()?.to_path_buf();

    // Strip package segments from the directory chain, innermost first.
    // A mismatch means the file does not sit where its package says;
    // skip it and let a later file decide.
    for segment in package.split('.').rev() {
        if dir.file_name().and_then(|n| n.to_str()) != Some(segment) {
            return None;
        }
        dir = dir.parent()?.to_path_buf();
    }
    Some(dir)
}

/// Extract the dotted package from a `package a.b.c;` header line.
/// Returns None for the default package or malformed headers.
pub fn parse_package_header(text: &str) -> Option<String> {
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with("//") {
            continue;
        }
        let rest = line.strip_prefix("package")?;
        let rest = rest.trim().strip_suffix(';')?.trim();
        if rest.is_empty() || !rest.split('.').all(is_identifier) {
            return None;
        }
        return Some(rest.to_string());
    }
    None
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
