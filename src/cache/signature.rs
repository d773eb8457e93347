//! Content + pipeline-version signatures (blake3).
//!
//! A signature identifies one transformed-cache entry: it hashes the ordered
//! pipeline version vector together with the compiled bytes, so editing a
//! source or bumping any stage version silently invalidates every prior
//! entry (stale files are simply never matched, not deleted).

use std::fmt;

/// A 256-bit signature (blake3 output).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Signature([u8; 32]);

impl Signature {
    /// Compute the signature of compiled bytes under a pipeline version
    /// vector. Deterministic: identical inputs yield identical signatures
    /// across runs and processes.
    pub fn compute(version_vector: &[(String, u32)], compiled: &[u8]) -> Self {
        let mut hasher = blake3::Hasher::new();
        for (name, version) in version_vector {
            hasher.update(name.as_bytes());
            hasher.update(&[0]); // separator: name/version must not merge
            hasher.update(&version.to_le_bytes());
        }
        hasher.update(&[0xff]); // separator: vector/bytes boundary
        hasher.update(compiled);
        Self(*hasher.finalize().as_bytes())
    }

    #[inline]
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Full hex form.
    pub fn to_hex(self) -> String {
        hex::encode(self.0)
    }

    /// Short form embedded in cache filenames (16 hex chars).
    pub fn short(self) -> String {
        self.to_hex()[..16].to_string()
    }

    #[cfg(test)]
    pub const fn from_raw(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", &self.to_hex()[..16])
    }
}
