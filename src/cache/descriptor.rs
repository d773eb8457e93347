//! Per-name record of compiled and transformed bytes.

use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::cache::Signature;
use crate::core::QualifiedName;

/// Everything the loader needs to know about one class: where it came from,
/// its compiled bytes, any transformed bytes, and the signature binding the
/// two to the current pipeline.
#[derive(Debug, Clone)]
pub struct ClassDescriptor {
    pub name: QualifiedName,
    /// Source file (the outermost type's file for inner classes).
    pub source_file: PathBuf,
    /// Compiled output file.
    pub compiled_file: PathBuf,
    /// Output root the compiled file lives under (anchors the disk cache).
    pub origin_root: PathBuf,
    pub compiled_bytes: Vec<u8>,
    /// Pipeline output; None until transformed or restored from disk.
    pub transformed_bytes: Option<Vec<u8>>,
    /// hash(pipeline version vector, compiled bytes).
    pub signature: Signature,
    /// Freshness watermark the scanner compares source mtimes against.
    pub last_modified: SystemTime,
}

impl ClassDescriptor {
    pub fn new(
        name: QualifiedName,
        source_file: PathBuf,
        compiled_file: PathBuf,
        origin_root: PathBuf,
        compiled_bytes: Vec<u8>,
        version_vector: &[(String, u32)],
        last_modified: SystemTime,
    ) -> Self {
        let signature = Signature::compute(version_vector, &compiled_bytes);
        Self {
            name,
            source_file,
            compiled_file,
            origin_root,
            compiled_bytes,
            transformed_bytes: None,
            signature,
            last_modified,
        }
    }

    /// Replace compiled bytes after a recompile: transformed bytes are
    /// invalidated, the signature recomputed, and the watermark advanced.
    pub fn refresh(&mut self, compiled_bytes: Vec<u8>, version_vector: &[(String, u32)]) {
        self.signature = Signature::compute(version_vector, &compiled_bytes);
        self.compiled_bytes = compiled_bytes;
        self.transformed_bytes = None;
        self.last_modified = SystemTime::now();
    }

    /// Bytes the loader should define: transformed when present, raw
    /// otherwise.
    pub fn loadable_bytes(&self) -> &[u8] {
        self.transformed_bytes
            .as_deref()
            .unwrap_or(&self.compiled_bytes)
    }

    /// Watermark for descriptors with no compiled output yet: epoch, so any
    /// existing source reads as changed.
    pub fn epoch() -> SystemTime {
        UNIX_EPOCH
    }
}
