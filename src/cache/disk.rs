//! Signature-addressed on-disk cache of transformed bytes.
//!
//! Layout:
//! `<output>/../generated-classes/<engine>/enhanced-cache/<package-path>/<Simple>.<sig16>.<ext>`
//!
//! An entry is valid only when its filename encodes the current signature;
//! any mismatch is treated as absence. Stale files are left behind on
//! purpose — a later pipeline-version rollback can still hit them.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::cache::Signature;
use crate::core::QualifiedName;

/// Directory created next to the output dir.
pub const GENERATED_DIR: &str = "generated-classes";
/// Subdirectory holding transformed entries.
pub const CACHE_SUBDIR: &str = "enhanced-cache";

/// Cache IO failure. Callers treat this as a miss and keep serving
/// in-memory bytes; nothing in a reload cycle fails on it.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache io at `{0}`")]
    Io(PathBuf, #[source] io::Error),
}

/// Cache root for one output root and engine.
pub fn cache_root(output_root: &Path, engine: &str) -> PathBuf {
    output_root
        .parent()
        .unwrap_or(output_root)
        .join(GENERATED_DIR)
        .join(engine)
        .join(CACHE_SUBDIR)
}

/// Signature-addressed path of one entry.
pub fn cached_file(
    output_root: &Path,
    engine: &str,
    name: &QualifiedName,
    signature: Signature,
    ext: &str,
) -> PathBuf {
    cache_root(output_root, engine)
        .join(name.package_path())
        .join(format!("{}.{}.{ext}", name.simple_name(), signature.short()))
}

/// Load the entry for the current signature. Missing or unreadable files
/// are both absence.
pub fn load_cached(
    output_root: &Path,
    engine: &str,
    name: &QualifiedName,
    signature: Signature,
    ext: &str,
) -> Option<Vec<u8>> {
    fs::read(cached_file(output_root, engine, name, signature, ext)).ok()
}

/// Persist transformed bytes to the signature-addressed path, then rewrite
/// the compiled file so its mtime advances past the source's (suppresses
/// redundant rescans in later generations).
pub fn write_cached(
    output_root: &Path,
    engine: &str,
    name: &QualifiedName,
    signature: Signature,
    ext: &str,
    bytes: &[u8],
    compiled_file: &Path,
) -> Result<(), CacheError> {
    let path = cached_file(output_root, engine, name, signature, ext);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| CacheError::Io(parent.to_path_buf(), e))?;
    }
    fs::write(&path, bytes).map_err(|e| CacheError::Io(path.clone(), e))?;

    // Touch via rewrite: std exposes no utimes, and identical bytes make
    // this a pure timestamp bump.
    if compiled_file.is_file() {
        let compiled = fs::read(compiled_file)
            .map_err(|e| CacheError::Io(compiled_file.to_path_buf(), e))?;
        fs::write(compiled_file, compiled)
            .map_err(|e| CacheError::Io(compiled_file.to_path_buf(), e))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sig(byte: u8) -> Signature {
        Signature::from_raw([byte; 32])
    }

    #[test]
    fn test_layout() {
        let name = QualifiedName::new("com.example.Foo");
        let path = cached_file(Path::new("/proj/build/classes"), "modelc", &name, sig(0xab), "cbin");
        assert_eq!(
            path,
            Path::new("/proj/build/generated-classes/modelc/enhanced-cache/com/example")
                .join(format!("Foo.{}.cbin", sig(0xab).short()))
        );
    }

    #[test]
    fn test_roundtrip_and_stale_mismatch() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("build/classes");
        let name = QualifiedName::new("com.example.Foo");

        write_cached(&out, "modelc", &name, sig(1), "cbin", b"enhanced", Path::new("/none"))
            .unwrap();
        assert_eq!(
            load_cached(&out, "modelc", &name, sig(1), "cbin"),
            Some(b"enhanced".to_vec())
        );

        // A different signature misses; the stale file stays on disk.
        assert_eq!(load_cached(&out, "modelc", &name, sig(2), "cbin"), None);
        assert!(cached_file(&out, "modelc", &name, sig(1), "cbin").is_file());
    }

    #[test]
    fn test_write_touches_compiled_file() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("build/classes");
        let compiled = dir.path().join("Foo.cbin");
        std::fs::write(&compiled, b"compiled").unwrap();
        let before = std::fs::metadata(&compiled).unwrap().modified().unwrap();

        std::thread::sleep(std::time::Duration::from_millis(20));
        let name = QualifiedName::new("Foo");
        write_cached(&out, "modelc", &name, sig(3), "cbin", b"enhanced", &compiled).unwrap();

        let after = std::fs::metadata(&compiled).unwrap().modified().unwrap();
        assert!(after >= before);
        assert_eq!(std::fs::read(&compiled).unwrap(), b"compiled");
    }
}
