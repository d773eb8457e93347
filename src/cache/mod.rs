//! Descriptor cache: per-name compiled/transformed bytes, signature-addressed
//! disk persistence.

mod descriptor;
mod disk;
mod signature;
mod store;

pub use descriptor::ClassDescriptor;
pub use disk::{CacheError, GENERATED_DIR, cache_root, cached_file, load_cached, write_cached};
pub use signature::Signature;
pub use store::DescriptorCache;
